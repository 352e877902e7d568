use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fpgaforge::backend::placement_for_tag;
use fpgaforge::loader::{parse_xclbin, MmapXclbin};
use fpgaforge::logging::init_logging_from_env;
use fpgaforge::XclbinContainer;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "inspect_xclbin", version)]
#[command(about = "Print the device, kernels and argument banks of an xclbin image", long_about = None)]
struct Cli {
    /// Path to the .xclbin file
    path: PathBuf,

    /// Emit a JSON report instead of text
    #[arg(long)]
    json: bool,

    /// Also list the section table and memory topology
    #[arg(long, short)]
    verbose: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    path: String,
    device: &'a str,
    vendor: &'a str,
    mode: String,
    emulation: Option<String>,
    kernels: Vec<KernelReport<'a>>,
    warnings: Vec<String>,
}

#[derive(Serialize)]
struct KernelReport<'a> {
    name: &'a str,
    args: Vec<ArgReport<'a>>,
}

#[derive(Serialize)]
struct ArgReport<'a> {
    index: usize,
    name: &'a str,
    #[serde(rename = "type")]
    ty: &'a str,
    category: String,
    tag: Option<&'a str>,
    bank_flags: String,
}

fn build_report<'a>(path: &str, container: &'a XclbinContainer) -> Report<'a> {
    let kernels = container
        .kernels
        .iter()
        .map(|kernel| KernelReport {
            name: &kernel.name,
            args: container.args[kernel.arg_range()]
                .iter()
                .map(|arg| ArgReport {
                    index: arg.index,
                    name: &arg.name,
                    ty: &arg.ty,
                    category: arg.category.to_string(),
                    tag: arg.tag.as_deref(),
                    bank_flags: format!("{:#010x}", placement_for_tag(arg.tag.as_deref()).flags),
                })
                .collect(),
        })
        .collect();

    Report {
        path: path.to_string(),
        device: container.device_name(),
        vendor: container.vendor(),
        mode: format!("{:?}", container.header.mode),
        emulation: container.emulation_mode().map(|m| m.to_string()),
        kernels,
        warnings: container.warnings.iter().map(|w| w.to_string()).collect(),
    }
}

fn main() -> anyhow::Result<()> {
    init_logging_from_env()?;
    let cli = Cli::parse();

    let file = MmapXclbin::open(&cli.path)?;
    let container = parse_xclbin(file.as_bytes())
        .with_context(|| format!("parsing {}", cli.path.display()))?;
    let report = build_report(&cli.path.display().to_string(), &container);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Inspecting xclbin: {} ({} bytes)", report.path, file.len());
    println!("\n=== Header ===");
    println!("Device: {}", report.device);
    println!("Vendor: {}", report.vendor);
    println!("Mode: {}", report.mode);
    println!(
        "Emulation: {}",
        report.emulation.as_deref().unwrap_or("none (hardware)")
    );

    if cli.verbose {
        println!("\n=== Sections ({}) ===", container.sections.len());
        for section in &container.sections {
            println!(
                "{:<20} offset {:>10} size {:>10}  {}",
                section.kind.label(),
                section.offset,
                section.size,
                section.name
            );
        }
        println!("\n=== Memory topology ===");
        for (i, region) in container.memory_regions.iter().enumerate() {
            println!(
                "[{}] {:<12} used={} {} KiB @ {:#x}",
                i, region.tag, region.used, region.size_kb, region.base_address
            );
        }
    }

    for kernel in &report.kernels {
        println!("\n=== Kernel {} ===", kernel.name);
        for arg in &kernel.args {
            println!(
                "{:>3}. {:<16} {:<16} {:<12} {:<10} {}",
                arg.index,
                arg.name,
                arg.ty,
                arg.category,
                arg.tag.unwrap_or("-"),
                arg.bank_flags
            );
        }
    }

    if !report.warnings.is_empty() {
        println!("\n=== Warnings ===");
        for warning in &report.warnings {
            println!("{}", warning);
        }
    }
    Ok(())
}
