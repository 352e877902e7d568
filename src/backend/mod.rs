//! Accelerator backends
//!
//! - `api`: the [`AcceleratorApi`] seam the session drives
//! - `memory_tag`: bank tag to placement flag resolution
//! - `simulated`: in-process device model with a virtual clock
//! - `opencl`: XRT OpenCL binding (feature `xrt`)

pub mod api;
pub mod error;
pub mod memory_tag;
pub mod simulated;

#[cfg(feature = "xrt")]
pub mod opencl;

pub use api::{AcceleratorApi, MemFlags, MigrationDirection, ProfilingInfo, QueueProperties};
pub use error::{check_status, ClStatus, DeviceError, DeviceResult};
pub use memory_tag::{placement_for_tag, resolve_memory_tag, BankPlacement};
pub use simulated::{SimBufferInfo, SimCommand, SimDevice, SimPlatform, SimulatedAccelerator};

#[cfg(feature = "xrt")]
pub use opencl::OpenClRuntime;
