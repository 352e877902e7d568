//! Runtime instance
//!
//! Ties the container, the device session, the argument buffers and the
//! pipeline together:
//!
//! ```ignore
//! let mut instance = Instance::open(OpenClRuntime::new(), "vadd.xclbin", RuntimeConfig::from_env())?;
//! instance.create_buffer_from_slice(0, MemFlags::READ_ONLY, &a)?;
//! instance.create_buffer_from_slice(1, MemFlags::WRITE_ONLY, &vec![0f32; n])?;
//! instance.set_buffer_arg(0)?;
//! instance.set_buffer_arg(1)?;
//! instance.set_scalar_arg(2, n as u64)?;
//! instance.run()?;
//! let out: Vec<f32> = instance.read_host(1)?;
//! ```

use std::path::Path;

use bytemuck::Pod;

use crate::backend::{AcceleratorApi, MemFlags};
use crate::config::RuntimeConfig;
use crate::emulation::{EmconfigBootstrap, EmulationBootstrap, NoEmulation};
use crate::error::{ForgeResult, FpgaForgeError};
use crate::loader::xclbin::{parse_xclbin, ArgCategory, ArgInfo, XclbinContainer};
use crate::loader::MmapXclbin;
use crate::profiling::{PhaseProfile, PipelineProfile, ProfilingCollector};
use crate::session::{BufferManager, DeviceSession, ExecutionPipeline, PipelineState};

/// One container loaded on one device
pub struct Instance<A: AcceleratorApi> {
    // Buffers go before the session that owns their context.
    pipeline: ExecutionPipeline<A>,
    buffers: BufferManager<A>,
    session: DeviceSession<A>,
    container: XclbinContainer,
    config: RuntimeConfig,
}

impl<A: AcceleratorApi> Instance<A> {
    /// Parse `binary` and bind it to the matching device
    ///
    /// In emulation (configured or derived from the container) the emulator
    /// is prepared with [`EmconfigBootstrap`] before the device is bound.
    pub fn new(api: A, binary: &[u8], config: RuntimeConfig) -> ForgeResult<Self> {
        Self::load(api, binary, config, None)
    }

    /// Like [`new`](Self::new), preparing emulation through `bootstrap`
    ///
    /// Pass [`NoEmulation`] to bind an emulation container without touching
    /// the emulator, e.g. on the simulated accelerator.
    pub fn with_bootstrap(
        api: A,
        binary: &[u8],
        config: RuntimeConfig,
        bootstrap: &dyn EmulationBootstrap,
    ) -> ForgeResult<Self> {
        Self::load(api, binary, config, Some(bootstrap))
    }

    // The container is parsed before anything touches the device, so an
    // invalid image fails without enumerating platforms.
    fn load(
        api: A,
        binary: &[u8],
        config: RuntimeConfig,
        bootstrap: Option<&dyn EmulationBootstrap>,
    ) -> ForgeResult<Self> {
        let container = parse_xclbin(binary)?;
        for warning in &container.warnings {
            tracing::debug!("Container warning: {}", warning);
        }

        let config = config.with_derived_emulation_mode(container.emulation_mode());
        let emconfig;
        let bootstrap: &dyn EmulationBootstrap = match bootstrap {
            Some(bootstrap) => bootstrap,
            None if config.is_emulation() => {
                emconfig = EmconfigBootstrap::for_config(&config);
                &emconfig
            }
            None => &NoEmulation,
        };
        bootstrap.prepare(&config, container.device_name())?;

        let session = DeviceSession::open(api, &container, binary)?;
        Ok(Instance {
            pipeline: ExecutionPipeline::new(),
            buffers: BufferManager::new(),
            session,
            container,
            config,
        })
    }

    /// Memory-map `path` and load it as [`new`](Self::new) does
    pub fn open(api: A, path: impl AsRef<Path>, config: RuntimeConfig) -> ForgeResult<Self> {
        let file = MmapXclbin::open(path.as_ref())?;
        Self::load(api, file.as_bytes(), config, None)
    }

    pub fn open_with_bootstrap(
        api: A,
        path: impl AsRef<Path>,
        config: RuntimeConfig,
        bootstrap: &dyn EmulationBootstrap,
    ) -> ForgeResult<Self> {
        let file = MmapXclbin::open(path.as_ref())?;
        Self::with_bootstrap(api, file.as_bytes(), config, bootstrap)
    }

    pub fn container(&self) -> &XclbinContainer {
        &self.container
    }

    /// Configuration with the container's emulation mode folded in
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn session(&self) -> &DeviceSession<A> {
        &self.session
    }

    pub fn buffers(&self) -> &BufferManager<A> {
        &self.buffers
    }

    pub fn pipeline(&self) -> &ExecutionPipeline<A> {
        &self.pipeline
    }

    pub fn state(&self) -> PipelineState {
        self.pipeline.state()
    }

    pub fn args(&self) -> &[ArgInfo] {
        &self.container.args
    }

    /// Create the device buffer for argument `index`, backed by `host`
    ///
    /// Refused while commands are in flight, since replacing a buffer frees
    /// the mirror a pending migration may still use.
    pub fn create_buffer(&mut self, index: usize, flags: MemFlags, host: Vec<u8>) -> ForgeResult<&A::Buffer> {
        self.pipeline.ensure_drained("create_buffer")?;
        Ok(self
            .buffers
            .create_buffer(&self.session, &self.container.args, index, flags, host)?)
    }

    pub fn create_buffer_from_slice<T: Pod>(
        &mut self,
        index: usize,
        flags: MemFlags,
        data: &[T],
    ) -> ForgeResult<&A::Buffer> {
        self.pipeline.ensure_drained("create_buffer")?;
        Ok(self
            .buffers
            .create_buffer_from_slice(&self.session, &self.container.args, index, flags, data)?)
    }

    /// Kernel and kernel-local index of flat argument `index`
    fn locate(&self, index: usize) -> ForgeResult<(&A::Kernel, u32)> {
        let (kernel, local) = self.container.kernel_for_arg(index).ok_or_else(|| {
            FpgaForgeError::InvalidArgument(format!(
                "argument {} out of range ({} arguments)",
                index,
                self.container.args.len()
            ))
        })?;
        let handle = self.session.kernel(kernel).ok_or_else(|| {
            FpgaForgeError::InternalError(format!("no kernel handle for kernel {}", kernel))
        })?;
        Ok((handle, local))
    }

    /// Bind the buffer created for `index` as that kernel argument
    pub fn set_buffer_arg(&mut self, index: usize) -> ForgeResult<()> {
        let buffer = self
            .buffers
            .buffer(index)
            .ok_or(FpgaForgeError::BufferNotFound(index))?;
        let (kernel, local) = self.locate(index)?;
        self.session.api().set_kernel_arg_buffer(kernel, local, buffer)?;
        Ok(())
    }

    /// Set a scalar kernel argument
    pub fn set_scalar_arg<T: Pod>(&mut self, index: usize, value: T) -> ForgeResult<()> {
        if let Some(arg) = self.container.arg(index) {
            if arg.category != ArgCategory::Scalar {
                tracing::debug!(
                    "Argument {} ('{}') is {}, setting it by value",
                    index,
                    arg.name,
                    arg.category
                );
            }
        }
        let (kernel, local) = self.locate(index)?;
        self.session
            .api()
            .set_kernel_arg_bytes(kernel, local, bytemuck::bytes_of(&value))?;
        Ok(())
    }

    /// Host mirror of argument `index`; only available after `finish`
    pub fn host_buffer(&self, index: usize) -> ForgeResult<&[u8]> {
        self.pipeline.ensure_drained("host_buffer")?;
        self.buffers
            .record(index)
            .map(|r| r.host())
            .ok_or(FpgaForgeError::BufferNotFound(index))
    }

    /// Mutable host mirror; changes reach the device on the next `write`
    pub fn host_buffer_mut(&mut self, index: usize) -> ForgeResult<&mut [u8]> {
        self.pipeline.ensure_drained("host_buffer_mut")?;
        self.buffers
            .record_mut(index)
            .map(|r| r.host_mut())
            .ok_or(FpgaForgeError::BufferNotFound(index))
    }

    /// Copy of the host mirror as `T`s
    pub fn read_host<T: Pod>(&self, index: usize) -> ForgeResult<Vec<T>> {
        let bytes = self.host_buffer(index)?;
        if bytes.len() % std::mem::size_of::<T>() != 0 {
            return Err(FpgaForgeError::InvalidArgument(format!(
                "buffer {} holds {} bytes, not a whole number of {}-byte elements",
                index,
                bytes.len(),
                std::mem::size_of::<T>()
            )));
        }
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    /// Overwrite the host mirror with `data`, which must match its size
    pub fn write_host<T: Pod>(&mut self, index: usize, data: &[T]) -> ForgeResult<()> {
        let src: &[u8] = bytemuck::cast_slice(data);
        let dst = self.host_buffer_mut(index)?;
        if dst.len() != src.len() {
            return Err(FpgaForgeError::InvalidArgument(format!(
                "buffer {} holds {} bytes, got {}",
                index,
                dst.len(),
                src.len()
            )));
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    pub fn write(&mut self) -> ForgeResult<()> {
        self.pipeline.write_to_device(&self.session, &self.buffers)?;
        Ok(())
    }

    pub fn exec(&mut self) -> ForgeResult<()> {
        self.pipeline.exec(&self.session)?;
        Ok(())
    }

    pub fn read(&mut self) -> ForgeResult<()> {
        self.pipeline.read_from_device(&self.session, &self.buffers)?;
        Ok(())
    }

    /// Block until every enqueued phase completes
    pub fn finish(&mut self) -> ForgeResult<()> {
        self.pipeline.finish(&self.session)?;
        Ok(())
    }

    /// `write`, `exec`, `read`, `finish`
    pub fn run(&mut self) -> ForgeResult<()> {
        self.write()?;
        self.exec()?;
        self.read()?;
        self.finish()
    }

    /// Timing of the current cycle; call after `finish`
    pub fn profile(&self) -> ForgeResult<PipelineProfile> {
        Ok(ProfilingCollector::collect(
            self.session.api(),
            &self.pipeline,
            &self.buffers,
        )?)
    }

    pub fn load_profile(&self) -> ForgeResult<PhaseProfile> {
        Ok(ProfilingCollector::load(self.session.api(), &self.pipeline, &self.buffers)?)
    }

    pub fn compute_profile(&self) -> ForgeResult<PhaseProfile> {
        Ok(ProfilingCollector::compute(self.session.api(), &self.pipeline)?)
    }

    pub fn store_profile(&self) -> ForgeResult<PhaseProfile> {
        Ok(ProfilingCollector::store(self.session.api(), &self.pipeline, &self.buffers)?)
    }
}

impl<A: AcceleratorApi> Drop for Instance<A> {
    fn drop(&mut self) {
        // Mirrors must outlive every command that references them.
        if self.pipeline.is_busy() {
            if let Err(e) = self.pipeline.finish(&self.session) {
                tracing::warn!("Failed to drain pipeline before release: {}", e);
            }
        }
    }
}

impl<A: AcceleratorApi> std::fmt::Debug for Instance<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("session", &self.session)
            .field("buffers", &self.buffers)
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
