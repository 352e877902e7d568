//! OpenCL FFI bindings
//!
//! Only the entry points the host runtime calls. Linking is set up by
//! `build.rs` when the `xrt` feature is enabled.

use std::ffi::{c_char, c_void};

pub type ClInt = i32;
pub type ClUint = u32;
pub type ClBitfield = u64;
pub type ClHandle = *mut c_void;

pub const CL_SUCCESS: ClInt = 0;

pub const CL_DEVICE_TYPE_ACCELERATOR: ClBitfield = 1 << 3;

pub const CL_PLATFORM_NAME: ClUint = 0x0902;
pub const CL_DEVICE_NAME: ClUint = 0x102B;
pub const CL_MEM_SIZE: ClUint = 0x1102;
pub const CL_QUEUE_PROPERTIES: u64 = 0x1093;

/// Extended host pointer descriptor (`cl_mem_ext_ptr_t`)
#[repr(C)]
#[derive(Debug)]
pub struct ClMemExtPtr {
    pub flags: ClUint,
    pub obj: *mut c_void,
    pub param: *mut c_void,
}

pub type ContextNotify =
    Option<unsafe extern "C" fn(*const c_char, *const c_void, usize, *mut c_void)>;

#[allow(dead_code)]
extern "C" {
    pub fn clGetPlatformIDs(num_entries: ClUint, platforms: *mut ClHandle, num_platforms: *mut ClUint) -> ClInt;
    pub fn clGetPlatformInfo(
        platform: ClHandle,
        param_name: ClUint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> ClInt;
    pub fn clGetDeviceIDs(
        platform: ClHandle,
        device_type: ClBitfield,
        num_entries: ClUint,
        devices: *mut ClHandle,
        num_devices: *mut ClUint,
    ) -> ClInt;
    pub fn clGetDeviceInfo(
        device: ClHandle,
        param_name: ClUint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> ClInt;
    pub fn clCreateContext(
        properties: *const isize,
        num_devices: ClUint,
        devices: *const ClHandle,
        notify: ContextNotify,
        user_data: *mut c_void,
        errcode_ret: *mut ClInt,
    ) -> ClHandle;
    pub fn clReleaseContext(context: ClHandle) -> ClInt;
    pub fn clCreateCommandQueueWithProperties(
        context: ClHandle,
        device: ClHandle,
        properties: *const u64,
        errcode_ret: *mut ClInt,
    ) -> ClHandle;
    pub fn clReleaseCommandQueue(queue: ClHandle) -> ClInt;
    pub fn clCreateProgramWithBinary(
        context: ClHandle,
        num_devices: ClUint,
        device_list: *const ClHandle,
        lengths: *const usize,
        binaries: *const *const u8,
        binary_status: *mut ClInt,
        errcode_ret: *mut ClInt,
    ) -> ClHandle;
    pub fn clReleaseProgram(program: ClHandle) -> ClInt;
    pub fn clCreateKernel(program: ClHandle, kernel_name: *const c_char, errcode_ret: *mut ClInt) -> ClHandle;
    pub fn clReleaseKernel(kernel: ClHandle) -> ClInt;
    pub fn clSetKernelArg(kernel: ClHandle, arg_index: ClUint, arg_size: usize, arg_value: *const c_void) -> ClInt;
    pub fn clCreateBuffer(
        context: ClHandle,
        flags: ClBitfield,
        size: usize,
        host_ptr: *mut c_void,
        errcode_ret: *mut ClInt,
    ) -> ClHandle;
    pub fn clGetMemObjectInfo(
        memobj: ClHandle,
        param_name: ClUint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> ClInt;
    pub fn clRetainMemObject(memobj: ClHandle) -> ClInt;
    pub fn clReleaseMemObject(memobj: ClHandle) -> ClInt;
    pub fn clEnqueueMigrateMemObjects(
        queue: ClHandle,
        num_mem_objects: ClUint,
        mem_objects: *const ClHandle,
        flags: ClBitfield,
        num_events_in_wait_list: ClUint,
        event_wait_list: *const ClHandle,
        event: *mut ClHandle,
    ) -> ClInt;
    pub fn clEnqueueTask(
        queue: ClHandle,
        kernel: ClHandle,
        num_events_in_wait_list: ClUint,
        event_wait_list: *const ClHandle,
        event: *mut ClHandle,
    ) -> ClInt;
    pub fn clFlush(queue: ClHandle) -> ClInt;
    pub fn clFinish(queue: ClHandle) -> ClInt;
    pub fn clGetEventProfilingInfo(
        event: ClHandle,
        param_name: ClUint,
        param_value_size: usize,
        param_value: *mut c_void,
        param_value_size_ret: *mut usize,
    ) -> ClInt;
    pub fn clRetainEvent(event: ClHandle) -> ClInt;
    pub fn clReleaseEvent(event: ClHandle) -> ClInt;
}
