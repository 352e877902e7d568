//! fpgaforge - FPGA accelerator host runtime
//!
//! Loads Xilinx xclbin containers, binds them to a matching accelerator
//! through an OpenCL-style runtime, and drives the load / compute / store
//! pipeline with per-phase profiling.

#![allow(clippy::too_many_arguments)] // FFI entry points take many args
#![allow(clippy::missing_safety_doc)] // FFI bindings documented at module level

pub mod backend;
pub mod config;
pub mod emulation;
pub mod error;
pub mod instance;
pub mod loader;
pub mod logging;
pub mod profiling;
pub mod session;

pub use backend::{AcceleratorApi, BankPlacement, DeviceError, MemFlags, SimulatedAccelerator};
#[cfg(feature = "xrt")]
pub use backend::OpenClRuntime;
pub use config::{EmulationMode, RuntimeConfig};
pub use emulation::{EmconfigBootstrap, EmulationBootstrap, NoEmulation};
pub use error::{ErrorCategory, ForgeResult, FpgaForgeError};
pub use instance::Instance;
pub use loader::{parse_xclbin, XclbinContainer, XclbinError};
pub use profiling::{PipelineProfile, ProfilingCollector};
pub use session::{DeviceSession, ExecutionPipeline, PipelineState};
