//! xclbin (AXLF) container loader
//!
//! This module parses a Xilinx accelerator image into everything the host
//! runtime needs before touching a device:
//! - Signature and build mode validation
//! - Target device identity (platform VBNV)
//! - Kernel names and the flat argument table from the embedded XML
//! - Memory bank tags from MEM_TOPOLOGY and CONNECTIVITY
//!
//! # Module Structure
//!
//! - `reader`: bounds-checked little-endian field readers
//! - `header`: magic validation and `axlf_header` decoding
//! - `sections`: section table and section lookup
//! - `metadata`: EMBEDDED_METADATA XML parsing
//! - `topology`: memory topology / connectivity records
//! - `types`: parsed container types
//!
//! # Example
//!
//! ```ignore
//! use fpgaforge::loader::xclbin::parse_xclbin;
//!
//! let bytes = std::fs::read("vadd.xclbin")?;
//! let container = parse_xclbin(&bytes)?;
//! println!("{} targets {}", container.kernels[0].name, container.device_name());
//! ```

mod header;
mod metadata;
mod reader;
mod sections;
mod topology;
mod types;

use thiserror::Error;

use crate::config::EmulationMode;

pub use header::{
    parse_xclbin_header, validate_xclbin_magic, XclbinHeader, XclbinMode, XCLBIN_MAGIC,
    XCLBIN_VENDOR,
};
pub use metadata::{parse_kernel_metadata, KernelMetadata};
pub use reader::ByteReader;
pub use sections::{find_section, parse_section_table, SectionHeader, SectionKind};
pub use topology::{apply_connectivity, parse_connectivity, parse_mem_topology};
pub use types::{
    ArgCategory, ArgInfo, ConnectivityEdge, KernelInfo, MemoryRegion, ParseWarning,
    XclbinContainer,
};

/// Layout constants, exposed for tools that build or inspect images
pub mod layout {
    pub use super::header::{HEADER_OFFSET, SECTION_TABLE_OFFSET};
    pub use super::sections::SECTION_HEADER_SIZE;
    pub use super::topology::{CONNECTION_OFFSET, CONNECTION_SIZE, MEM_DATA_OFFSET, MEM_DATA_SIZE};
}

/// Fatal container parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum XclbinError {
    #[error("Unsupported container format: {0}")]
    UnsupportedFormat(String),
    #[error("Unknown xclbin mode: {0}")]
    UnknownMode(u16),
    #[error("Cannot determine kernel from container: {0}")]
    MissingMetadata(String),
    #[error("Malformed kernel metadata: {0}")]
    MalformedMetadata(String),
    #[error("Malformed section: {0}")]
    MalformedSection(String),
    #[error("Truncated {region}: need {needed} bytes at offset {offset}, have {available}")]
    Truncated {
        region: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
}

/// Emulation mode selected by the metadata `core/@target` attribute
///
/// The header mode field is not always reliable, so this takes precedence.
pub fn target_emulation_mode(target: &str) -> Option<EmulationMode> {
    match target {
        "hw_em" => Some(EmulationMode::Hardware),
        "csim" => Some(EmulationMode::Software),
        _ => None,
    }
}

/// Parse a set of program binaries; exactly one xclbin is expected
pub fn parse_xclbin_binaries<B: AsRef<[u8]>>(binaries: &[B]) -> Result<XclbinContainer, XclbinError> {
    match binaries {
        [binary] => parse_xclbin(binary.as_ref()),
        _ => Err(XclbinError::UnsupportedFormat(format!(
            "expected exactly one binary, found {}",
            binaries.len()
        ))),
    }
}

/// Parse one xclbin image
pub fn parse_xclbin(data: &[u8]) -> Result<XclbinContainer, XclbinError> {
    let header = parse_xclbin_header(data)?;
    let sections = parse_section_table(data, header.section_count)?;

    tracing::debug!(
        "xclbin v{}.{}.{} mode={:?} platform='{}' sections={}",
        header.version.0,
        header.version.1,
        header.version.2,
        header.mode,
        header.platform_vbnv,
        sections.len()
    );

    let payload = find_section(data, &sections, SectionKind::EmbeddedMetadata).ok_or_else(|| {
        XclbinError::MissingMetadata(format!(
            "no EMBEDDED_METADATA section among {} section(s)",
            sections.len()
        ))
    })?;
    let KernelMetadata {
        kernels,
        mut args,
        target,
        mut warnings,
    } = parse_kernel_metadata(payload)?;

    let memory_regions = match find_section(data, &sections, SectionKind::MemTopology) {
        Some(payload) => parse_mem_topology(payload)?,
        None => Vec::new(),
    };
    let connectivity = match find_section(data, &sections, SectionKind::Connectivity) {
        Some(payload) => parse_connectivity(payload)?,
        None => Vec::new(),
    };
    apply_connectivity(&mut args, &memory_regions, &connectivity, &mut warnings);

    let emulation_mode = target
        .as_deref()
        .and_then(target_emulation_mode)
        .or_else(|| header.mode.emulation_mode());

    Ok(XclbinContainer {
        header,
        sections,
        vendor: XCLBIN_VENDOR.to_string(),
        kernels,
        args,
        memory_regions,
        connectivity,
        target,
        emulation_mode,
        warnings,
    })
}
