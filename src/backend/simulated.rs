//! In-process accelerator model
//!
//! `SimulatedAccelerator` implements [`AcceleratorApi`] without hardware.
//! Platforms and devices are declared up front; commands are timed on a
//! virtual nanosecond clock:
//!
//! - `queued` is the clock at enqueue, `submitted` is one tick later
//! - `start` is the later of `submitted` and the end of every dependency
//! - `end` is `start` plus the command's duration
//!
//! Migrations take `bytes / bytes_per_ns` and kernels take `kernel_ns`.
//! Timestamps only become visible after `finish`, which also advances the
//! clock past every completed command. No data is copied.
//!
//! Clones share state, so a test can keep one clone for inspection after
//! handing the other to an instance.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::api::{
    AcceleratorApi, MemFlags, MigrationDirection, ProfilingInfo, QueueProperties,
};
use super::error::{ClStatus, DeviceError, DeviceResult};
use super::memory_tag::BankPlacement;

/// Declared device
#[derive(Debug, Clone)]
pub struct SimDevice {
    pub name: String,
    pub available: bool,
    pub kernels: Vec<String>,
    /// Binary status reported when program creation is made to fail
    pub program_failure: Option<ClStatus>,
    pub bytes_per_ns: f64,
    pub kernel_ns: u64,
}

impl SimDevice {
    pub fn new(name: impl Into<String>) -> Self {
        SimDevice {
            name: name.into(),
            available: true,
            kernels: Vec::new(),
            program_failure: None,
            bytes_per_ns: 1.0,
            kernel_ns: 1_000,
        }
    }

    pub fn with_kernels<I, S>(mut self, kernels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kernels = kernels.into_iter().map(Into::into).collect();
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn with_program_failure(mut self, binary_status: ClStatus) -> Self {
        self.program_failure = Some(binary_status);
        self
    }

    pub fn with_bandwidth(mut self, bytes_per_ns: f64) -> Self {
        self.bytes_per_ns = bytes_per_ns;
        self
    }

    pub fn with_kernel_ns(mut self, kernel_ns: u64) -> Self {
        self.kernel_ns = kernel_ns;
        self
    }
}

/// Declared platform
#[derive(Debug, Clone)]
pub struct SimPlatform {
    pub name: String,
    pub devices: Vec<SimDevice>,
}

impl SimPlatform {
    pub fn new(name: impl Into<String>) -> Self {
        SimPlatform {
            name: name.into(),
            devices: Vec::new(),
        }
    }

    pub fn with_device(mut self, device: SimDevice) -> Self {
        self.devices.push(device);
        self
    }
}

/// Submitted command, as recorded in the command log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimCommand {
    Migrate {
        event: u64,
        buffers: Vec<u64>,
        direction: MigrationDirection,
        wait_for: Vec<u64>,
    },
    Task {
        event: u64,
        kernel: String,
        wait_for: Vec<u64>,
    },
    Flush,
    Finish,
}

/// Buffer as seen by the device model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBufferInfo {
    pub size: usize,
    pub flags: MemFlags,
    pub placement: Option<BankPlacement>,
}

#[derive(Debug, Clone, Copy)]
struct SimTimes {
    queued: u64,
    submitted: u64,
    start: u64,
    end: u64,
}

#[derive(Debug)]
struct SimEventRecord {
    queue: u64,
    times: SimTimes,
    complete: bool,
}

#[derive(Debug, Default)]
struct SimState {
    platforms: Vec<SimPlatform>,
    clock_ns: u64,
    next_id: u64,
    enumerations: usize,
    buffers: HashMap<u64, SimBufferInfo>,
    events: HashMap<u64, SimEventRecord>,
    kernel_args: HashMap<(u64, u32), Vec<u8>>,
    commands: Vec<SimCommand>,
    releases: Vec<String>,
}

impl SimState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn device(&self, handle: &SimDeviceHandle) -> DeviceResult<&SimDevice> {
        self.platforms
            .get(handle.platform)
            .and_then(|p| p.devices.get(handle.device))
            .ok_or_else(|| DeviceError::status("device lookup", ClStatus::INVALID_DEVICE))
    }

    /// Place a command on the virtual timeline after its dependencies
    fn schedule(&mut self, queue: u64, wait_for: &[SimEvent], duration: u64) -> DeviceResult<u64> {
        let mut ready = 0;
        for dep in wait_for {
            let record = self.events.get(&dep.id).ok_or_else(|| {
                DeviceError::status("event wait list", ClStatus::INVALID_EVENT_WAIT_LIST)
            })?;
            ready = ready.max(record.times.end);
        }

        let queued = self.clock_ns;
        let submitted = queued + 1;
        let start = submitted.max(ready);
        let times = SimTimes {
            queued,
            submitted,
            start,
            end: start + duration,
        };
        self.clock_ns = submitted + 1;

        let id = self.next_id();
        self.events.insert(
            id,
            SimEventRecord {
                queue,
                times,
                complete: false,
            },
        );
        Ok(id)
    }
}

/// Releases a handle in the shared release log when dropped
#[derive(Debug)]
struct ReleaseGuard {
    state: Arc<Mutex<SimState>>,
    label: String,
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.releases.push(self.label.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPlatformHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimDeviceHandle {
    platform: usize,
    device: usize,
}

#[derive(Debug)]
pub struct SimContext {
    device: SimDeviceHandle,
    _guard: ReleaseGuard,
}

#[derive(Debug)]
pub struct SimQueue {
    id: u64,
    device: SimDeviceHandle,
    _guard: ReleaseGuard,
}

#[derive(Debug)]
pub struct SimProgram {
    kernels: Vec<String>,
    _guard: ReleaseGuard,
}

#[derive(Debug)]
pub struct SimKernel {
    id: u64,
    name: String,
    _guard: ReleaseGuard,
}

impl SimKernel {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBuffer {
    id: u64,
    size: usize,
}

impl SimBuffer {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimEvent {
    id: u64,
}

impl SimEvent {
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Simulated accelerator runtime
#[derive(Debug, Clone, Default)]
pub struct SimulatedAccelerator {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedAccelerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(self, platform: SimPlatform) -> Self {
        if let Ok(mut state) = self.state.lock() {
            state.platforms.push(platform);
        }
        self
    }

    /// Number of times platforms were enumerated
    pub fn enumeration_count(&self) -> usize {
        self.state.lock().map(|s| s.enumerations).unwrap_or_default()
    }

    pub fn commands(&self) -> Vec<SimCommand> {
        self.state
            .lock()
            .map(|s| s.commands.clone())
            .unwrap_or_default()
    }

    /// Handles released so far, in release order (`"kernel vadd"`, `"queue"`, ...)
    pub fn releases(&self) -> Vec<String> {
        self.state
            .lock()
            .map(|s| s.releases.clone())
            .unwrap_or_default()
    }

    pub fn buffer_info(&self, buffer: &SimBuffer) -> Option<SimBufferInfo> {
        self.state.lock().ok()?.buffers.get(&buffer.id).cloned()
    }

    /// All buffers created so far, by creation order
    pub fn buffer_infos(&self) -> Vec<SimBufferInfo> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let mut ids: Vec<_> = state.buffers.keys().copied().collect();
        ids.sort_unstable();
        ids.iter().map(|id| state.buffers[id].clone()).collect()
    }

    pub fn kernel_arg(&self, kernel: &SimKernel, index: u32) -> Option<Vec<u8>> {
        self.state
            .lock()
            .ok()?
            .kernel_args
            .get(&(kernel.id, index))
            .cloned()
    }

    /// Virtual time in nanoseconds
    pub fn clock_ns(&self) -> u64 {
        self.state.lock().map(|s| s.clock_ns).unwrap_or_default()
    }

    fn guard(&self, label: impl Into<String>) -> ReleaseGuard {
        ReleaseGuard {
            state: Arc::clone(&self.state),
            label: label.into(),
        }
    }
}

fn wait_ids(wait_for: &[SimEvent]) -> Vec<u64> {
    wait_for.iter().map(|e| e.id).collect()
}

impl AcceleratorApi for SimulatedAccelerator {
    type Platform = SimPlatformHandle;
    type Device = SimDeviceHandle;
    type Context = SimContext;
    type Queue = SimQueue;
    type Program = SimProgram;
    type Kernel = SimKernel;
    type Buffer = SimBuffer;
    type Event = SimEvent;

    fn platforms(&self) -> DeviceResult<Vec<SimPlatformHandle>> {
        let mut state = self.state.lock()?;
        state.enumerations += 1;
        Ok((0..state.platforms.len()).map(SimPlatformHandle).collect())
    }

    fn platform_name(&self, platform: &SimPlatformHandle) -> DeviceResult<String> {
        let state = self.state.lock()?;
        state
            .platforms
            .get(platform.0)
            .map(|p| p.name.clone())
            .ok_or_else(|| DeviceError::status("platform name", ClStatus::INVALID_PLATFORM))
    }

    fn accelerator_devices(&self, platform: &SimPlatformHandle) -> DeviceResult<Vec<SimDeviceHandle>> {
        let state = self.state.lock()?;
        let declared = state
            .platforms
            .get(platform.0)
            .ok_or_else(|| DeviceError::status("device enumeration", ClStatus::INVALID_PLATFORM))?;
        Ok((0..declared.devices.len())
            .map(|device| SimDeviceHandle {
                platform: platform.0,
                device,
            })
            .collect())
    }

    fn device_name(&self, device: &SimDeviceHandle) -> DeviceResult<String> {
        Ok(self.state.lock()?.device(device)?.name.clone())
    }

    fn create_context(&self, device: &SimDeviceHandle) -> DeviceResult<SimContext> {
        {
            let state = self.state.lock()?;
            let declared = state.device(device)?;
            if !declared.available {
                return Err(DeviceError::DeviceNotAvailable {
                    device: declared.name.clone(),
                });
            }
        }
        Ok(SimContext {
            device: *device,
            _guard: self.guard("context"),
        })
    }

    fn create_queue(
        &self,
        context: &SimContext,
        device: &SimDeviceHandle,
        properties: QueueProperties,
    ) -> DeviceResult<SimQueue> {
        if context.device != *device {
            return Err(DeviceError::status("create queue", ClStatus::INVALID_DEVICE));
        }
        if !properties.profiling {
            tracing::debug!("Simulated queue created without profiling");
        }
        let id = self.state.lock()?.next_id();
        Ok(SimQueue {
            id,
            device: *device,
            _guard: self.guard("queue"),
        })
    }

    fn create_program(
        &self,
        context: &SimContext,
        device: &SimDeviceHandle,
        binary: &[u8],
    ) -> DeviceResult<SimProgram> {
        let state = self.state.lock()?;
        let declared = state.device(device)?;
        if context.device != *device {
            return Err(DeviceError::status("create program", ClStatus::INVALID_DEVICE));
        }
        if let Some(binary_status) = declared.program_failure {
            return Err(DeviceError::ProgramBuild {
                device: declared.name.clone(),
                status: ClStatus::INVALID_BINARY,
                binary_status,
            });
        }
        if binary.is_empty() {
            return Err(DeviceError::ProgramBuild {
                device: declared.name.clone(),
                status: ClStatus::INVALID_VALUE,
                binary_status: ClStatus::INVALID_BINARY,
            });
        }
        let kernels = declared.kernels.clone();
        drop(state);

        Ok(SimProgram {
            kernels,
            _guard: self.guard("program"),
        })
    }

    fn create_kernel(&self, program: &SimProgram, name: &str) -> DeviceResult<SimKernel> {
        if !program.kernels.iter().any(|k| k == name) {
            return Err(DeviceError::KernelNotFound {
                name: name.to_string(),
                status: ClStatus::INVALID_KERNEL_NAME,
            });
        }
        let id = self.state.lock()?.next_id();
        Ok(SimKernel {
            id,
            name: name.to_string(),
            _guard: self.guard(format!("kernel {}", name)),
        })
    }

    unsafe fn create_buffer(
        &self,
        _context: &SimContext,
        flags: MemFlags,
        host: *mut u8,
        size: usize,
        placement: Option<BankPlacement>,
    ) -> DeviceResult<SimBuffer> {
        if size == 0 {
            return Err(DeviceError::status("create buffer", ClStatus::INVALID_BUFFER_SIZE));
        }
        if host.is_null() && flags.contains(MemFlags::USE_HOST_PTR) {
            return Err(DeviceError::status("create buffer", ClStatus::INVALID_HOST_PTR));
        }
        let mut state = self.state.lock()?;
        let id = state.next_id();
        state.buffers.insert(
            id,
            SimBufferInfo {
                size,
                flags,
                placement,
            },
        );
        Ok(SimBuffer { id, size })
    }

    fn buffer_size(&self, buffer: &SimBuffer) -> DeviceResult<usize> {
        Ok(buffer.size)
    }

    fn set_kernel_arg_buffer(&self, kernel: &SimKernel, index: u32, buffer: &SimBuffer) -> DeviceResult<()> {
        let mut state = self.state.lock()?;
        if !state.buffers.contains_key(&buffer.id) {
            return Err(DeviceError::status("set kernel arg", ClStatus::INVALID_MEM_OBJECT));
        }
        state
            .kernel_args
            .insert((kernel.id, index), buffer.id.to_le_bytes().to_vec());
        Ok(())
    }

    fn set_kernel_arg_bytes(&self, kernel: &SimKernel, index: u32, value: &[u8]) -> DeviceResult<()> {
        if value.is_empty() {
            return Err(DeviceError::status("set kernel arg", ClStatus::INVALID_ARG_SIZE));
        }
        self.state
            .lock()?
            .kernel_args
            .insert((kernel.id, index), value.to_vec());
        Ok(())
    }

    fn enqueue_migrate(
        &self,
        queue: &SimQueue,
        buffers: &[SimBuffer],
        direction: MigrationDirection,
        wait_for: &[SimEvent],
    ) -> DeviceResult<SimEvent> {
        if buffers.is_empty() {
            return Err(DeviceError::status("migrate", ClStatus::INVALID_VALUE));
        }
        let mut state = self.state.lock()?;
        let bytes: usize = buffers.iter().map(|b| b.size).sum();
        let bandwidth = state.device(&queue.device)?.bytes_per_ns.max(f64::MIN_POSITIVE);
        let duration = ((bytes as f64 / bandwidth).ceil() as u64).max(1);

        let id = state.schedule(queue.id, wait_for, duration)?;
        state.commands.push(SimCommand::Migrate {
            event: id,
            buffers: buffers.iter().map(|b| b.id).collect(),
            direction,
            wait_for: wait_ids(wait_for),
        });
        tracing::trace!("sim: migrate {:?} {} bytes -> event {}", direction, bytes, id);
        Ok(SimEvent { id })
    }

    fn enqueue_task(&self, queue: &SimQueue, kernel: &SimKernel, wait_for: &[SimEvent]) -> DeviceResult<SimEvent> {
        let mut state = self.state.lock()?;
        let duration = state.device(&queue.device)?.kernel_ns.max(1);
        let id = state.schedule(queue.id, wait_for, duration)?;
        state.commands.push(SimCommand::Task {
            event: id,
            kernel: kernel.name.clone(),
            wait_for: wait_ids(wait_for),
        });
        tracing::trace!("sim: task {} -> event {}", kernel.name, id);
        Ok(SimEvent { id })
    }

    fn flush(&self, _queue: &SimQueue) -> DeviceResult<()> {
        self.state.lock()?.commands.push(SimCommand::Flush);
        Ok(())
    }

    fn finish(&self, queue: &SimQueue) -> DeviceResult<()> {
        let mut state = self.state.lock()?;
        let mut drained = state.clock_ns;
        for record in state.events.values_mut().filter(|r| r.queue == queue.id) {
            record.complete = true;
            drained = drained.max(record.times.end);
        }
        state.clock_ns = drained;
        state.commands.push(SimCommand::Finish);
        Ok(())
    }

    fn event_profiling(&self, event: &SimEvent, info: ProfilingInfo) -> DeviceResult<u64> {
        let state = self.state.lock()?;
        let record = state
            .events
            .get(&event.id)
            .ok_or_else(|| DeviceError::status("event profiling", ClStatus::INVALID_EVENT))?;
        if !record.complete {
            return Err(DeviceError::status(
                "event profiling",
                ClStatus::PROFILING_INFO_NOT_AVAILABLE,
            ));
        }
        let times = record.times;
        Ok(match info {
            ProfilingInfo::Queued => times.queued,
            ProfilingInfo::Submitted => times.submitted,
            ProfilingInfo::Start => times.start,
            ProfilingInfo::End => times.end,
        })
    }
}
