//! Accelerator API error types

use std::fmt;
use thiserror::Error;

/// Raw status code returned by the accelerator runtime
///
/// Codes follow the OpenCL numbering; `name()` gives the symbolic form for
/// the codes the runtime is expected to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClStatus(pub i32);

impl ClStatus {
    pub const SUCCESS: ClStatus = ClStatus(0);
    pub const DEVICE_NOT_FOUND: ClStatus = ClStatus(-1);
    pub const DEVICE_NOT_AVAILABLE: ClStatus = ClStatus(-2);
    pub const MEM_OBJECT_ALLOCATION_FAILURE: ClStatus = ClStatus(-4);
    pub const OUT_OF_RESOURCES: ClStatus = ClStatus(-5);
    pub const OUT_OF_HOST_MEMORY: ClStatus = ClStatus(-6);
    pub const PROFILING_INFO_NOT_AVAILABLE: ClStatus = ClStatus(-7);
    pub const BUILD_PROGRAM_FAILURE: ClStatus = ClStatus(-11);
    pub const INVALID_VALUE: ClStatus = ClStatus(-30);
    pub const INVALID_PLATFORM: ClStatus = ClStatus(-32);
    pub const INVALID_DEVICE: ClStatus = ClStatus(-33);
    pub const INVALID_CONTEXT: ClStatus = ClStatus(-34);
    pub const INVALID_COMMAND_QUEUE: ClStatus = ClStatus(-36);
    pub const INVALID_HOST_PTR: ClStatus = ClStatus(-37);
    pub const INVALID_MEM_OBJECT: ClStatus = ClStatus(-38);
    pub const INVALID_BINARY: ClStatus = ClStatus(-42);
    pub const INVALID_PROGRAM: ClStatus = ClStatus(-44);
    pub const INVALID_PROGRAM_EXECUTABLE: ClStatus = ClStatus(-45);
    pub const INVALID_KERNEL_NAME: ClStatus = ClStatus(-46);
    pub const INVALID_KERNEL: ClStatus = ClStatus(-48);
    pub const INVALID_ARG_INDEX: ClStatus = ClStatus(-49);
    pub const INVALID_ARG_VALUE: ClStatus = ClStatus(-50);
    pub const INVALID_ARG_SIZE: ClStatus = ClStatus(-51);
    pub const INVALID_KERNEL_ARGS: ClStatus = ClStatus(-52);
    pub const INVALID_EVENT_WAIT_LIST: ClStatus = ClStatus(-57);
    pub const INVALID_EVENT: ClStatus = ClStatus(-58);
    pub const INVALID_OPERATION: ClStatus = ClStatus(-59);
    pub const INVALID_BUFFER_SIZE: ClStatus = ClStatus(-61);

    pub fn is_success(self) -> bool {
        self == ClStatus::SUCCESS
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "CL_SUCCESS",
            -1 => "CL_DEVICE_NOT_FOUND",
            -2 => "CL_DEVICE_NOT_AVAILABLE",
            -4 => "CL_MEM_OBJECT_ALLOCATION_FAILURE",
            -5 => "CL_OUT_OF_RESOURCES",
            -6 => "CL_OUT_OF_HOST_MEMORY",
            -7 => "CL_PROFILING_INFO_NOT_AVAILABLE",
            -11 => "CL_BUILD_PROGRAM_FAILURE",
            -30 => "CL_INVALID_VALUE",
            -32 => "CL_INVALID_PLATFORM",
            -33 => "CL_INVALID_DEVICE",
            -34 => "CL_INVALID_CONTEXT",
            -36 => "CL_INVALID_COMMAND_QUEUE",
            -37 => "CL_INVALID_HOST_PTR",
            -38 => "CL_INVALID_MEM_OBJECT",
            -42 => "CL_INVALID_BINARY",
            -44 => "CL_INVALID_PROGRAM",
            -45 => "CL_INVALID_PROGRAM_EXECUTABLE",
            -46 => "CL_INVALID_KERNEL_NAME",
            -48 => "CL_INVALID_KERNEL",
            -49 => "CL_INVALID_ARG_INDEX",
            -50 => "CL_INVALID_ARG_VALUE",
            -51 => "CL_INVALID_ARG_SIZE",
            -52 => "CL_INVALID_KERNEL_ARGS",
            -57 => "CL_INVALID_EVENT_WAIT_LIST",
            -58 => "CL_INVALID_EVENT",
            -59 => "CL_INVALID_OPERATION",
            -61 => "CL_INVALID_BUFFER_SIZE",
            _ => "CL_UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ClStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Accelerator API errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("{operation} failed: {status}")]
    Status {
        operation: &'static str,
        status: ClStatus,
    },
    #[error("Device '{device}' is not available")]
    DeviceNotAvailable { device: String },
    #[error(
        "No device matches vendor '{vendor}' / device '{device}' (platforms seen: {platforms:?}, devices seen: {devices:?})"
    )]
    DeviceNotFound {
        vendor: String,
        device: String,
        platforms: Vec<String>,
        devices: Vec<String>,
    },
    #[error("Failed to create program on '{device}': {status}, binary status {binary_status}")]
    ProgramBuild {
        device: String,
        status: ClStatus,
        binary_status: ClStatus,
    },
    #[error("Kernel '{name}' not found in program: {status}")]
    KernelNotFound { name: String, status: ClStatus },
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
    #[error("Internal lock poisoned - this indicates a bug: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for DeviceError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        DeviceError::LockPoisoned(err.to_string())
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;

impl DeviceError {
    /// Wrap a non-success status for `operation`
    pub fn status(operation: &'static str, status: ClStatus) -> Self {
        if status == ClStatus::DEVICE_NOT_AVAILABLE {
            return DeviceError::DeviceNotAvailable {
                device: operation.to_string(),
            };
        }
        DeviceError::Status { operation, status }
    }

    /// Raw status code, when the error carries one
    pub fn code(&self) -> Option<ClStatus> {
        match self {
            DeviceError::Status { status, .. }
            | DeviceError::ProgramBuild { status, .. }
            | DeviceError::KernelNotFound { status, .. } => Some(*status),
            DeviceError::DeviceNotAvailable { .. } => Some(ClStatus::DEVICE_NOT_AVAILABLE),
            DeviceError::DeviceNotFound { .. } => Some(ClStatus::DEVICE_NOT_FOUND),
            DeviceError::InvalidHandle(_) | DeviceError::LockPoisoned(_) => None,
        }
    }

    /// Device is present but busy or locked; device selection keeps scanning
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DeviceError::DeviceNotAvailable { .. })
    }
}

/// Turn a raw status into a result
pub fn check_status(operation: &'static str, status: i32) -> DeviceResult<()> {
    let status = ClStatus(status);
    if status.is_success() {
        Ok(())
    } else {
        Err(DeviceError::status(operation, status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names() {
        assert_eq!(ClStatus::INVALID_BINARY.name(), "CL_INVALID_BINARY");
        assert_eq!(ClStatus(-9999).name(), "CL_UNKNOWN_ERROR");
        assert_eq!(
            ClStatus::PROFILING_INFO_NOT_AVAILABLE.to_string(),
            "CL_PROFILING_INFO_NOT_AVAILABLE (-7)"
        );
    }

    #[test]
    fn test_check_status() {
        assert!(check_status("clFinish", 0).is_ok());
        let err = check_status("clFinish", -36).unwrap_err();
        assert_eq!(err.code(), Some(ClStatus::INVALID_COMMAND_QUEUE));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_not_available_is_recoverable() {
        let err = check_status("clCreateContext", -2).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(err.code(), Some(ClStatus::DEVICE_NOT_AVAILABLE));
    }
}
