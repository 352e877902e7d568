//! Common test utilities
//!
//! Shared container fixtures and simulated accelerators for the integration
//! tests. Every test runs against `SimulatedAccelerator`, so no hardware or
//! vendor runtime is needed.
//!
//! # Usage
//!
//! ```ignore
//! mod common;
//! use common::*;
//!
//! let sim = u250_accelerator(&["vadd"]);
//! let mut instance = Instance::new(sim.clone(), &VADD_XCLBIN, RuntimeConfig::new())?;
//! ```

#![allow(dead_code)]

pub mod fixtures;
pub mod tempfile_helpers;

use fpgaforge::backend::{SimDevice, SimPlatform, SimulatedAccelerator};
use once_cell::sync::Lazy;

pub use fixtures::*;
pub use tempfile_helpers::*;

/// The vadd image, built once
pub static VADD_XCLBIN: Lazy<Vec<u8>> = Lazy::new(|| vadd_builder().build());

/// One Xilinx platform with a single U250 exposing `kernels`
pub fn u250_accelerator(kernels: &[&str]) -> SimulatedAccelerator {
    SimulatedAccelerator::new().with_platform(
        SimPlatform::new("Xilinx").with_device(SimDevice::new(U250).with_kernels(kernels.iter().copied())),
    )
}

/// Route test logs through the crate's subscriber when `RUST_LOG` is set
pub fn init_test_logging() {
    if std::env::var_os("RUST_LOG").is_some() {
        fpgaforge::logging::init_logging_default();
    }
}
