//! HIP error types

use thiserror::Error;

/// HIP error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HipError {
    #[error("HIP initialization failed: {0}")]
    InitializationFailed(String),
    #[error("Memory allocation failed: {0}")]
    MemoryAllocationFailed(String),
    #[error("Memory access fault: {0}")]
    MemoryAccessFault(String),
    #[error("Kernel launch failed: {0}")]
    KernelLaunchFailed(String),
    #[error("Device not found")]
    DeviceNotFound,
    #[error("Device error: {0}")]
    DeviceError(String),
    #[error("Generic error: {0}")]
    GenericError(String),
    #[error("Internal lock poisoned - this indicates a bug: {0}")]
    LockPoisoned(String),
}

impl<T> From<std::sync::PoisonError<T>> for HipError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        HipError::LockPoisoned(format!("Lock poisoned: {}", err))
    }
}

/// HIP result type
pub type HipResult<T> = Result<T, HipError>;

impl HipError {
    /// Sticky errors poison the stream they occurred on.
    ///
    /// Once a kernel faults, every later launch and synchronize on the same
    /// stream reports the fault until the stream is recreated.
    pub fn is_sticky(&self) -> bool {
        matches!(
            self,
            HipError::MemoryAccessFault(_) | HipError::DeviceError(_)
        )
    }

    /// Launch-configuration errors are detected on the host before any
    /// work is queued and leave the stream usable.
    pub fn is_launch_config_error(&self) -> bool {
        matches!(self, HipError::KernelLaunchFailed(_))
    }
}
