//! OpenCL runtime wrapper

use std::ffi::{c_void, CString};
use std::ptr;

use super::ffi::{self, ClHandle, ClMemExtPtr};
use crate::backend::api::{
    AcceleratorApi, MemFlags, MigrationDirection, ProfilingInfo, QueueProperties,
};
use crate::backend::error::{check_status, ClStatus, DeviceError, DeviceResult};
use crate::backend::memory_tag::BankPlacement;

// SAFETY: OpenCL objects are thread-safe per the OpenCL 1.2+ API contract
// (every call except clSetKernelArg). Kernels are only configured from the
// owning session.
macro_rules! cl_object {
    ($name:ident, $release:ident) => {
        #[derive(Debug)]
        pub struct $name {
            handle: ClHandle,
        }

        unsafe impl Send for $name {}
        unsafe impl Sync for $name {}

        impl $name {
            pub fn as_ptr(&self) -> ClHandle {
                self.handle
            }
        }

        impl Drop for $name {
            fn drop(&mut self) {
                if !self.handle.is_null() {
                    let status = unsafe { ffi::$release(self.handle) };
                    if status != ffi::CL_SUCCESS {
                        tracing::warn!(
                            "{} failed: {}",
                            stringify!($release),
                            ClStatus(status)
                        );
                    }
                }
            }
        }
    };
}

macro_rules! cl_shared_object {
    ($name:ident, $retain:ident, $release:ident) => {
        cl_object!($name, $release);

        impl Clone for $name {
            fn clone(&self) -> Self {
                if !self.handle.is_null() {
                    unsafe {
                        ffi::$retain(self.handle);
                    }
                }
                $name {
                    handle: self.handle,
                }
            }
        }
    };
}

cl_object!(ClContext, clReleaseContext);
cl_object!(ClQueue, clReleaseCommandQueue);
cl_object!(ClProgram, clReleaseProgram);
cl_object!(ClKernel, clReleaseKernel);
cl_shared_object!(ClBuffer, clRetainMemObject, clReleaseMemObject);
cl_shared_object!(ClEvent, clRetainEvent, clReleaseEvent);

/// Platform id; not reference counted
#[derive(Debug, Clone, Copy)]
pub struct ClPlatform(ClHandle);

/// Device id; root devices are not reference counted
#[derive(Debug, Clone, Copy)]
pub struct ClDevice(ClHandle);

fn non_null(operation: &'static str, handle: ClHandle, status: i32) -> DeviceResult<ClHandle> {
    check_status(operation, status)?;
    if handle.is_null() {
        return Err(DeviceError::InvalidHandle(format!("{} returned null", operation)));
    }
    Ok(handle)
}

fn raw_handles<T, F: Fn(&T) -> ClHandle>(items: &[T], f: F) -> Vec<ClHandle> {
    items.iter().map(f).collect()
}

/// Read a NUL-terminated string property through a `clGet*Info` style call
fn info_string<F>(operation: &'static str, query: F) -> DeviceResult<String>
where
    F: Fn(usize, *mut c_void, *mut usize) -> i32,
{
    let mut size = 0usize;
    check_status(operation, query(0, ptr::null_mut(), &mut size))?;
    let mut bytes = vec![0u8; size];
    check_status(
        operation,
        query(size, bytes.as_mut_ptr() as *mut c_void, ptr::null_mut()),
    )?;
    if let Some(nul) = bytes.iter().position(|&b| b == 0) {
        bytes.truncate(nul);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// XRT-backed OpenCL runtime
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenClRuntime;

impl OpenClRuntime {
    pub fn new() -> Self {
        OpenClRuntime
    }
}

impl AcceleratorApi for OpenClRuntime {
    type Platform = ClPlatform;
    type Device = ClDevice;
    type Context = ClContext;
    type Queue = ClQueue;
    type Program = ClProgram;
    type Kernel = ClKernel;
    type Buffer = ClBuffer;
    type Event = ClEvent;

    fn platforms(&self) -> DeviceResult<Vec<ClPlatform>> {
        let mut count: u32 = 0;
        check_status("clGetPlatformIDs", unsafe {
            ffi::clGetPlatformIDs(0, ptr::null_mut(), &mut count)
        })?;
        let mut ids = vec![ptr::null_mut(); count as usize];
        check_status("clGetPlatformIDs", unsafe {
            ffi::clGetPlatformIDs(count, ids.as_mut_ptr(), ptr::null_mut())
        })?;
        tracing::debug!("OpenCL: {} platform(s)", ids.len());
        Ok(ids.into_iter().map(ClPlatform).collect())
    }

    fn platform_name(&self, platform: &ClPlatform) -> DeviceResult<String> {
        info_string("clGetPlatformInfo", |size, value, size_ret| unsafe {
            ffi::clGetPlatformInfo(platform.0, ffi::CL_PLATFORM_NAME, size, value, size_ret)
        })
    }

    fn accelerator_devices(&self, platform: &ClPlatform) -> DeviceResult<Vec<ClDevice>> {
        let mut count: u32 = 0;
        let status = unsafe {
            ffi::clGetDeviceIDs(
                platform.0,
                ffi::CL_DEVICE_TYPE_ACCELERATOR,
                0,
                ptr::null_mut(),
                &mut count,
            )
        };
        // A platform without accelerators reports DEVICE_NOT_FOUND
        if ClStatus(status) == ClStatus::DEVICE_NOT_FOUND {
            return Ok(Vec::new());
        }
        check_status("clGetDeviceIDs", status)?;

        let mut ids = vec![ptr::null_mut(); count as usize];
        check_status("clGetDeviceIDs", unsafe {
            ffi::clGetDeviceIDs(
                platform.0,
                ffi::CL_DEVICE_TYPE_ACCELERATOR,
                count,
                ids.as_mut_ptr(),
                ptr::null_mut(),
            )
        })?;
        Ok(ids.into_iter().map(ClDevice).collect())
    }

    fn device_name(&self, device: &ClDevice) -> DeviceResult<String> {
        info_string("clGetDeviceInfo", |size, value, size_ret| unsafe {
            ffi::clGetDeviceInfo(device.0, ffi::CL_DEVICE_NAME, size, value, size_ret)
        })
    }

    fn create_context(&self, device: &ClDevice) -> DeviceResult<ClContext> {
        let mut status = 0;
        let handle = unsafe {
            ffi::clCreateContext(ptr::null(), 1, &device.0, None, ptr::null_mut(), &mut status)
        };
        let handle = non_null("clCreateContext", handle, status)?;
        tracing::debug!("OpenCL: context {:?}", handle);
        Ok(ClContext { handle })
    }

    fn create_queue(
        &self,
        context: &ClContext,
        device: &ClDevice,
        properties: QueueProperties,
    ) -> DeviceResult<ClQueue> {
        let props = [ffi::CL_QUEUE_PROPERTIES, properties.bits(), 0];
        let mut status = 0;
        let handle = unsafe {
            ffi::clCreateCommandQueueWithProperties(context.handle, device.0, props.as_ptr(), &mut status)
        };
        let handle = non_null("clCreateCommandQueueWithProperties", handle, status)?;
        Ok(ClQueue { handle })
    }

    fn create_program(&self, context: &ClContext, device: &ClDevice, binary: &[u8]) -> DeviceResult<ClProgram> {
        let lengths = [binary.len()];
        let binaries = [binary.as_ptr()];
        let mut binary_status = 0;
        let mut status = 0;
        let handle = unsafe {
            ffi::clCreateProgramWithBinary(
                context.handle,
                1,
                &device.0,
                lengths.as_ptr(),
                binaries.as_ptr(),
                &mut binary_status,
                &mut status,
            )
        };
        if status != ffi::CL_SUCCESS || handle.is_null() {
            let device = self.device_name(device).unwrap_or_default();
            return Err(DeviceError::ProgramBuild {
                device,
                status: ClStatus(status),
                binary_status: ClStatus(binary_status),
            });
        }
        tracing::debug!("OpenCL: program loaded ({} bytes)", binary.len());
        Ok(ClProgram { handle })
    }

    fn create_kernel(&self, program: &ClProgram, name: &str) -> DeviceResult<ClKernel> {
        let c_name = CString::new(name)
            .map_err(|_| DeviceError::InvalidHandle(format!("kernel name '{}' contains NUL", name)))?;
        let mut status = 0;
        let handle = unsafe { ffi::clCreateKernel(program.handle, c_name.as_ptr(), &mut status) };
        if status != ffi::CL_SUCCESS || handle.is_null() {
            return Err(DeviceError::KernelNotFound {
                name: name.to_string(),
                status: ClStatus(status),
            });
        }
        Ok(ClKernel { handle })
    }

    unsafe fn create_buffer(
        &self,
        context: &ClContext,
        flags: MemFlags,
        host: *mut u8,
        size: usize,
        placement: Option<BankPlacement>,
    ) -> DeviceResult<ClBuffer> {
        // The descriptor is only read during clCreateBuffer.
        let mut ext = placement.map(|p| ClMemExtPtr {
            flags: p.flags,
            obj: host as *mut c_void,
            param: ptr::null_mut(),
        });
        let (flags, host_ptr) = match ext.as_mut() {
            Some(ext) => (
                flags | MemFlags::EXT_PTR_XILINX,
                ext as *mut ClMemExtPtr as *mut c_void,
            ),
            None => (flags, host as *mut c_void),
        };

        let mut status = 0;
        let handle = ffi::clCreateBuffer(context.handle, flags.bits(), size, host_ptr, &mut status);
        let handle = non_null("clCreateBuffer", handle, status)?;
        tracing::trace!("OpenCL: buffer {:?} ({} bytes, flags {:#x})", handle, size, flags.bits());
        Ok(ClBuffer { handle })
    }

    fn buffer_size(&self, buffer: &ClBuffer) -> DeviceResult<usize> {
        let mut size = 0usize;
        check_status("clGetMemObjectInfo", unsafe {
            ffi::clGetMemObjectInfo(
                buffer.handle,
                ffi::CL_MEM_SIZE,
                std::mem::size_of::<usize>(),
                &mut size as *mut usize as *mut c_void,
                ptr::null_mut(),
            )
        })?;
        Ok(size)
    }

    fn set_kernel_arg_buffer(&self, kernel: &ClKernel, index: u32, buffer: &ClBuffer) -> DeviceResult<()> {
        check_status("clSetKernelArg", unsafe {
            ffi::clSetKernelArg(
                kernel.handle,
                index,
                std::mem::size_of::<ClHandle>(),
                &buffer.handle as *const ClHandle as *const c_void,
            )
        })
    }

    fn set_kernel_arg_bytes(&self, kernel: &ClKernel, index: u32, value: &[u8]) -> DeviceResult<()> {
        check_status("clSetKernelArg", unsafe {
            ffi::clSetKernelArg(kernel.handle, index, value.len(), value.as_ptr() as *const c_void)
        })
    }

    fn enqueue_migrate(
        &self,
        queue: &ClQueue,
        buffers: &[ClBuffer],
        direction: MigrationDirection,
        wait_for: &[ClEvent],
    ) -> DeviceResult<ClEvent> {
        let mems = raw_handles(buffers, |b| b.handle);
        let waits = raw_handles(wait_for, |e| e.handle);
        let mut event = ptr::null_mut();
        let status = unsafe {
            ffi::clEnqueueMigrateMemObjects(
                queue.handle,
                mems.len() as u32,
                mems.as_ptr(),
                direction.flags(),
                waits.len() as u32,
                if waits.is_empty() { ptr::null() } else { waits.as_ptr() },
                &mut event,
            )
        };
        let handle = non_null("clEnqueueMigrateMemObjects", event, status)?;
        Ok(ClEvent { handle })
    }

    fn enqueue_task(&self, queue: &ClQueue, kernel: &ClKernel, wait_for: &[ClEvent]) -> DeviceResult<ClEvent> {
        let waits = raw_handles(wait_for, |e| e.handle);
        let mut event = ptr::null_mut();
        let status = unsafe {
            ffi::clEnqueueTask(
                queue.handle,
                kernel.handle,
                waits.len() as u32,
                if waits.is_empty() { ptr::null() } else { waits.as_ptr() },
                &mut event,
            )
        };
        let handle = non_null("clEnqueueTask", event, status)?;
        Ok(ClEvent { handle })
    }

    fn flush(&self, queue: &ClQueue) -> DeviceResult<()> {
        check_status("clFlush", unsafe { ffi::clFlush(queue.handle) })
    }

    fn finish(&self, queue: &ClQueue) -> DeviceResult<()> {
        check_status("clFinish", unsafe { ffi::clFinish(queue.handle) })
    }

    fn event_profiling(&self, event: &ClEvent, info: ProfilingInfo) -> DeviceResult<u64> {
        let mut value: u64 = 0;
        check_status("clGetEventProfilingInfo", unsafe {
            ffi::clGetEventProfilingInfo(
                event.handle,
                info.raw(),
                std::mem::size_of::<u64>(),
                &mut value as *mut u64 as *mut c_void,
                ptr::null_mut(),
            )
        })?;
        Ok(value)
    }
}
