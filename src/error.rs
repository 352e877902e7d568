//! Unified error handling for fpgaforge
//!
//! Each layer has its own error enum (`XclbinError`, `DeviceError`,
//! `PipelineError`, `EmulationError`, `LoggingError`). [`FpgaForgeError`]
//! wraps them for the public facade and classifies them:
//! - User errors (bad input, actionable by the caller)
//! - Recoverable errors (device busy, retry later)
//! - Device errors (accelerator runtime failures)
//! - Container errors (file I/O, malformed images)
//! - Internal errors (bugs)

use std::fmt;

use crate::backend::DeviceError;
use crate::emulation::EmulationError;
use crate::loader::xclbin::XclbinError;
use crate::logging::LoggingError;
use crate::session::PipelineError;

#[derive(Debug, thiserror::Error)]
pub enum FpgaForgeError {
    // ========== Container Errors ==========
    #[error(transparent)]
    Container(#[from] XclbinError),

    #[error("Container loading failed: {0}")]
    ContainerLoadFailed(String),

    #[error("Memory mapping failed: {0}")]
    MmapError(String),

    // ========== Device Errors ==========
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Emulation setup failed: {0}")]
    Emulation(#[from] EmulationError),

    // ========== User Errors ==========
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No buffer for argument {0}")]
    BufferNotFound(usize),

    // ========== Ambient Errors ==========
    #[error("Logging setup failed: {0}")]
    Logging(#[from] LoggingError),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FpgaForgeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FpgaForgeError::InvalidArgument(_) | FpgaForgeError::BufferNotFound(_) => ErrorCategory::User,

            FpgaForgeError::Pipeline(PipelineError::OutOfOrder { .. } | PipelineError::InFlight { .. }) => {
                ErrorCategory::User
            }

            FpgaForgeError::Device(e) | FpgaForgeError::Pipeline(PipelineError::Device(e))
                if e.is_recoverable() =>
            {
                ErrorCategory::Recoverable
            }

            FpgaForgeError::Device(DeviceError::LockPoisoned(_))
            | FpgaForgeError::Pipeline(PipelineError::Device(DeviceError::LockPoisoned(_)))
            | FpgaForgeError::InternalError(_) => ErrorCategory::Internal,

            FpgaForgeError::Device(_) | FpgaForgeError::Pipeline(_) | FpgaForgeError::Emulation(_) => {
                ErrorCategory::Device
            }

            FpgaForgeError::Container(_)
            | FpgaForgeError::ContainerLoadFailed(_)
            | FpgaForgeError::MmapError(_)
            | FpgaForgeError::IoError(_) => ErrorCategory::Container,

            FpgaForgeError::Logging(_) => ErrorCategory::Internal,
        }
    }

    /// Retrying later may succeed (device busy or locked)
    pub fn is_recoverable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Recoverable)
    }

    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid input or call sequence
    User,
    /// Temporary condition
    Recoverable,
    /// Accelerator runtime or emulator failure
    Device,
    /// Unreadable or malformed container
    Container,
    /// Indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Recoverable => write!(f, "Recoverable"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Container => write!(f, "Container"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

pub type ForgeResult<T> = std::result::Result<T, FpgaForgeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ClStatus;
    use crate::session::PipelineState;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            FpgaForgeError::InvalidArgument("x".into()).category(),
            ErrorCategory::User
        );
        assert_eq!(
            FpgaForgeError::from(XclbinError::UnknownMode(9)).category(),
            ErrorCategory::Container
        );
        assert_eq!(
            FpgaForgeError::from(DeviceError::status("clFinish", ClStatus::INVALID_COMMAND_QUEUE))
                .category(),
            ErrorCategory::Device
        );
        assert_eq!(
            FpgaForgeError::InternalError("bug".into()).category(),
            ErrorCategory::Internal
        );
    }

    #[test]
    fn test_device_unavailable_is_recoverable() {
        let err = FpgaForgeError::from(DeviceError::DeviceNotAvailable {
            device: "u250".into(),
        });
        assert!(err.is_recoverable());
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_out_of_order_is_user_error() {
        let err = FpgaForgeError::from(PipelineError::OutOfOrder {
            operation: "read_from_device",
            state: PipelineState::Idle,
        });
        assert!(err.is_user_error());
        assert!(err.to_string().contains("read_from_device"));
    }

    #[test]
    fn test_container_error_message_passes_through() {
        let err = FpgaForgeError::from(XclbinError::UnsupportedFormat("bad magic".into()));
        assert_eq!(err.to_string(), "Unsupported container format: bad magic");
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Recoverable.to_string(), "Recoverable");
        assert_eq!(ErrorCategory::Container.to_string(), "Container");
    }
}
