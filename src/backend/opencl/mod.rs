//! OpenCL / XRT accelerator binding
//!
//! Implements [`AcceleratorApi`](crate::backend::AcceleratorApi) on top of
//! the OpenCL ICD loader shipped with XRT. Handles release themselves on
//! drop; buffers and events are reference counted by the runtime and clone
//! through `clRetain*`.

pub mod ffi;
mod runtime;

pub use runtime::{ClBuffer, ClContext, ClDevice, ClEvent, ClKernel, ClPlatform, ClProgram, ClQueue, OpenClRuntime};
