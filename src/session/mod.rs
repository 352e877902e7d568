//! Device session
//!
//! Binds one parsed container to one physical device: selects the device,
//! owns the command queue, the program built from the container and one
//! kernel handle per kernel in the container.

pub mod buffers;
pub mod pipeline;

use crate::backend::{AcceleratorApi, DeviceError, DeviceResult, QueueProperties};
use crate::loader::xclbin::XclbinContainer;

pub use buffers::{BufferManager, BufferRecord};
pub use pipeline::{ExecutionPipeline, PipelineError, PipelineState};

/// Session bound to a single device
///
/// Fields drop in declaration order: kernels, program, queue, context.
pub struct DeviceSession<A: AcceleratorApi> {
    kernels: Vec<A::Kernel>,
    program: A::Program,
    queue: A::Queue,
    context: A::Context,
    device: A::Device,
    kernel_names: Vec<String>,
    platform_name: String,
    device_name: String,
    api: A,
}

impl<A: AcceleratorApi> DeviceSession<A> {
    /// Find the device the container targets and load the container on it
    ///
    /// The first platform named like the container vendor and the first
    /// device on it named like the container target win. Devices reporting
    /// "not available" are skipped.
    pub fn open(api: A, container: &XclbinContainer, binary: &[u8]) -> DeviceResult<Self> {
        let vendor = container.vendor();
        let target = container.device_name();
        let mut seen_platforms = Vec::new();
        let mut seen_devices = Vec::new();

        for platform in api.platforms()? {
            let platform_name = api.platform_name(&platform)?;
            tracing::info!("Found platform: {}", platform_name);
            seen_platforms.push(platform_name.clone());
            if platform_name != vendor {
                continue;
            }

            for device in api.accelerator_devices(&platform)? {
                let device_name = api.device_name(&device)?;
                tracing::info!("Found device: {}", device_name);
                seen_devices.push(device_name.clone());
                if device_name != target {
                    continue;
                }

                let context = match api.create_context(&device) {
                    Ok(context) => context,
                    Err(e) if e.is_recoverable() => {
                        tracing::info!("Device {} not available, skipping", device_name);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                tracing::info!("Using {}", device_name);

                return Self::bind(api, container, binary, context, device, platform_name, device_name);
            }
        }

        Err(DeviceError::DeviceNotFound {
            vendor: vendor.to_string(),
            device: target.to_string(),
            platforms: seen_platforms,
            devices: seen_devices,
        })
    }

    fn bind(
        api: A,
        container: &XclbinContainer,
        binary: &[u8],
        context: A::Context,
        device: A::Device,
        platform_name: String,
        device_name: String,
    ) -> DeviceResult<Self> {
        let queue = api.create_queue(&context, &device, QueueProperties::pipelined())?;
        let program = api.create_program(&context, &device, binary).map_err(|e| {
            if let DeviceError::ProgramBuild { binary_status, .. } = &e {
                tracing::error!("Failed to program device {}: binary status {}", device_name, binary_status);
            }
            e
        })?;

        let kernel_names: Vec<String> = container.kernel_names().map(str::to_string).collect();
        let kernels = kernel_names
            .iter()
            .map(|name| api.create_kernel(&program, name))
            .collect::<DeviceResult<Vec<_>>>()?;
        tracing::debug!("Created {} kernel handle(s): {:?}", kernels.len(), kernel_names);

        Ok(DeviceSession {
            kernels,
            program,
            queue,
            context,
            device,
            kernel_names,
            platform_name,
            device_name,
            api,
        })
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn context(&self) -> &A::Context {
        &self.context
    }

    pub fn queue(&self) -> &A::Queue {
        &self.queue
    }

    pub fn device(&self) -> &A::Device {
        &self.device
    }

    pub fn program(&self) -> &A::Program {
        &self.program
    }

    pub fn kernels(&self) -> &[A::Kernel] {
        &self.kernels
    }

    pub fn kernel(&self, index: usize) -> Option<&A::Kernel> {
        self.kernels.get(index)
    }

    pub fn kernel_names(&self) -> &[String] {
        &self.kernel_names
    }

    pub fn platform_name(&self) -> &str {
        &self.platform_name
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl<A: AcceleratorApi> std::fmt::Debug for DeviceSession<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("platform", &self.platform_name)
            .field("device", &self.device_name)
            .field("kernels", &self.kernel_names)
            .finish()
    }
}
