//! Accelerator API seam
//!
//! The host runtime drives the device through [`AcceleratorApi`]. Handles are
//! associated types so a binding can use its own RAII wrappers; every call
//! reports failures as [`DeviceError`](super::DeviceError) with the raw
//! status preserved.

use std::ops::BitOr;

use super::error::DeviceResult;
use super::memory_tag::BankPlacement;

/// Buffer creation flags (OpenCL `cl_mem_flags` bit values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemFlags(pub u64);

impl MemFlags {
    pub const READ_WRITE: MemFlags = MemFlags(1 << 0);
    pub const WRITE_ONLY: MemFlags = MemFlags(1 << 1);
    pub const READ_ONLY: MemFlags = MemFlags(1 << 2);
    pub const USE_HOST_PTR: MemFlags = MemFlags(1 << 3);
    pub const ALLOC_HOST_PTR: MemFlags = MemFlags(1 << 4);
    pub const COPY_HOST_PTR: MemFlags = MemFlags(1 << 5);
    /// Host pointer is a `cl_mem_ext_ptr_t` carrying a bank flag
    pub const EXT_PTR_XILINX: MemFlags = MemFlags(1 << 31);

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn contains(self, other: MemFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Kernel reads the buffer, so it is migrated to the device on load
    pub fn is_loaded(self) -> bool {
        self.contains(MemFlags::READ_ONLY) || self.contains(MemFlags::READ_WRITE)
    }

    /// Kernel writes the buffer, so it is migrated back to the host on store
    pub fn is_stored(self) -> bool {
        self.contains(MemFlags::WRITE_ONLY) || self.contains(MemFlags::READ_WRITE)
    }
}

impl BitOr for MemFlags {
    type Output = MemFlags;

    fn bitor(self, rhs: MemFlags) -> MemFlags {
        MemFlags(self.0 | rhs.0)
    }
}

/// Direction of a memory migration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationDirection {
    HostToDevice,
    DeviceToHost,
}

impl MigrationDirection {
    /// `cl_mem_migration_flags` value
    pub fn flags(self) -> u64 {
        match self {
            MigrationDirection::HostToDevice => 0,
            MigrationDirection::DeviceToHost => 1,
        }
    }
}

/// Event profiling counters, in nanoseconds of device time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilingInfo {
    Queued,
    Submitted,
    Start,
    End,
}

impl ProfilingInfo {
    pub const ALL: [ProfilingInfo; 4] = [
        ProfilingInfo::Queued,
        ProfilingInfo::Submitted,
        ProfilingInfo::Start,
        ProfilingInfo::End,
    ];

    /// `cl_profiling_info` value
    pub fn raw(self) -> u32 {
        match self {
            ProfilingInfo::Queued => 0x1280,
            ProfilingInfo::Submitted => 0x1281,
            ProfilingInfo::Start => 0x1282,
            ProfilingInfo::End => 0x1283,
        }
    }
}

/// Command queue properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueProperties {
    pub out_of_order: bool,
    pub profiling: bool,
}

impl QueueProperties {
    /// Out-of-order with profiling; ordering comes from event dependencies only
    pub fn pipelined() -> Self {
        QueueProperties {
            out_of_order: true,
            profiling: true,
        }
    }

    /// `cl_command_queue_properties` value
    pub fn bits(self) -> u64 {
        let mut bits = 0;
        if self.out_of_order {
            bits |= 1 << 0;
        }
        if self.profiling {
            bits |= 1 << 1;
        }
        bits
    }
}

/// Accelerator execution API
///
/// Enumeration, object creation and command submission. All enqueue calls
/// return immediately; `finish` is the only call that blocks.
pub trait AcceleratorApi {
    type Platform;
    type Device;
    type Context;
    type Queue;
    type Program;
    type Kernel;
    type Buffer: Clone;
    type Event: Clone;

    fn platforms(&self) -> DeviceResult<Vec<Self::Platform>>;
    fn platform_name(&self, platform: &Self::Platform) -> DeviceResult<String>;
    fn accelerator_devices(&self, platform: &Self::Platform) -> DeviceResult<Vec<Self::Device>>;
    fn device_name(&self, device: &Self::Device) -> DeviceResult<String>;

    /// Fails with `DeviceNotAvailable` when the device is busy or locked
    fn create_context(&self, device: &Self::Device) -> DeviceResult<Self::Context>;

    fn create_queue(
        &self,
        context: &Self::Context,
        device: &Self::Device,
        properties: QueueProperties,
    ) -> DeviceResult<Self::Queue>;

    /// Load a prebuilt binary for exactly one device
    ///
    /// Failures are reported as `ProgramBuild` with the binary status.
    fn create_program(
        &self,
        context: &Self::Context,
        device: &Self::Device,
        binary: &[u8],
    ) -> DeviceResult<Self::Program>;

    fn create_kernel(&self, program: &Self::Program, name: &str) -> DeviceResult<Self::Kernel>;

    /// Create a buffer backed by `size` bytes at `host`
    ///
    /// With a placement the host pointer is passed through the vendor
    /// extended-pointer descriptor.
    ///
    /// # Safety
    ///
    /// `host` must point to `size` writable bytes that stay valid, and are
    /// not moved, until the returned buffer and every clone of it are
    /// dropped.
    unsafe fn create_buffer(
        &self,
        context: &Self::Context,
        flags: MemFlags,
        host: *mut u8,
        size: usize,
        placement: Option<BankPlacement>,
    ) -> DeviceResult<Self::Buffer>;

    fn buffer_size(&self, buffer: &Self::Buffer) -> DeviceResult<usize>;

    fn set_kernel_arg_buffer(
        &self,
        kernel: &Self::Kernel,
        index: u32,
        buffer: &Self::Buffer,
    ) -> DeviceResult<()>;

    fn set_kernel_arg_bytes(&self, kernel: &Self::Kernel, index: u32, value: &[u8])
        -> DeviceResult<()>;

    fn enqueue_migrate(
        &self,
        queue: &Self::Queue,
        buffers: &[Self::Buffer],
        direction: MigrationDirection,
        wait_for: &[Self::Event],
    ) -> DeviceResult<Self::Event>;

    /// Single work-item launch
    fn enqueue_task(
        &self,
        queue: &Self::Queue,
        kernel: &Self::Kernel,
        wait_for: &[Self::Event],
    ) -> DeviceResult<Self::Event>;

    fn flush(&self, queue: &Self::Queue) -> DeviceResult<()>;
    fn finish(&self, queue: &Self::Queue) -> DeviceResult<()>;

    /// Fails with `PROFILING_INFO_NOT_AVAILABLE` until the event completes
    fn event_profiling(&self, event: &Self::Event, info: ProfilingInfo) -> DeviceResult<u64>;
}
