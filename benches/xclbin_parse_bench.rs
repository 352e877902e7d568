//! Container parse benchmark
//!
//! Measures `parse_xclbin` on generated images of increasing kernel and
//! argument counts, with and without a large bitstream payload.
//!
//! Run with: `cargo bench --bench xclbin_parse_bench`

use std::hint::black_box;
use std::time::{Duration, Instant};

use fpgaforge::loader::parse_xclbin;

#[path = "../tests/common/fixtures.rs"]
mod fixtures;

use fixtures::{XclbinBuilder, MMAP, SCALAR};

const ITERATIONS: usize = 200;

struct BenchResult {
    name: String,
    bytes: usize,
    durations: Vec<Duration>,
}

impl BenchResult {
    fn mean(&self) -> Duration {
        self.durations.iter().sum::<Duration>() / self.durations.len().max(1) as u32
    }

    fn percentile(&self, p: f64) -> Duration {
        let mut sorted = self.durations.clone();
        sorted.sort_unstable();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).copied().unwrap_or_default()
    }

    fn report(&self) {
        println!(
            "{:<32} {:>10} bytes  mean {:>10.2?}  p50 {:>10.2?}  p99 {:>10.2?}",
            self.name,
            self.bytes,
            self.mean(),
            self.percentile(0.5),
            self.percentile(0.99)
        );
    }
}

fn image(kernels: usize, args_per_kernel: usize, bitstream: usize) -> Vec<u8> {
    let mut builder = XclbinBuilder::new();
    for bank in 0..4 {
        builder = builder.region(&format!("bank{}", bank), true);
    }
    let mut index = 0;
    for k in 0..kernels {
        let names: Vec<String> = (0..args_per_kernel).map(|i| format!("arg{}", i)).collect();
        let args: Vec<(&str, &str, u32)> = names
            .iter()
            .enumerate()
            .map(|(i, n)| {
                if i + 1 == args_per_kernel {
                    (n.as_str(), "int", SCALAR)
                } else {
                    (n.as_str(), "int*", MMAP)
                }
            })
            .collect();
        builder = builder.kernel(&format!("krnl_{}", k), &args);
        for _ in 0..args_per_kernel {
            builder = builder.connect(index, (index % 4) as i32);
            index += 1;
        }
    }
    if bitstream > 0 {
        builder = builder.section(0, "bitstream", vec![0x5a; bitstream]);
    }
    builder.build()
}

fn bench(name: &str, data: &[u8]) -> BenchResult {
    // warm-up
    for _ in 0..10 {
        black_box(parse_xclbin(black_box(data)).ok());
    }
    let durations = (0..ITERATIONS)
        .map(|_| {
            let start = Instant::now();
            black_box(parse_xclbin(black_box(data)).ok());
            start.elapsed()
        })
        .collect();
    BenchResult {
        name: name.to_string(),
        bytes: data.len(),
        durations,
    }
}

fn main() {
    println!("=== xclbin parse ({} iterations) ===", ITERATIONS);
    let cases = [
        ("vadd (1 kernel, 3 args)", image(1, 3, 0)),
        ("8 kernels x 8 args", image(8, 8, 0)),
        ("32 kernels x 16 args", image(32, 16, 0)),
        ("vadd + 32 MiB bitstream", image(1, 3, 32 << 20)),
    ];
    for (name, data) in &cases {
        bench(name, data).report();
    }
}
