//! Unified error handling for operators
//!
//! Every failure an operator can raise is an [`OpsError`]. Errors fall into
//! three categories:
//! - Configuration errors (bad arguments, shapes, types or ranks)
//! - Unimplemented features (conversions the backend does not provide)
//! - Device errors (launch failures, faults, allocation failures)
//!
//! None of them is retried. A failing operator aborts the enclosing net run.

use std::fmt;

use crate::backend::hip_backend::HipError;
use crate::backend::miopen::MiopenError;
use crate::tensor::DataType;

/// Unified error type for operators
#[derive(Debug, thiserror::Error)]
pub enum OpsError {
    // ========== Configuration Errors ==========
    /// Argument present but unusable
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Required argument absent
    #[error("Missing argument: {0}")]
    MissingArgument(String),

    /// Input sizes or shapes disagree
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Element type outside an operator's supported set
    #[error("Unsupported type {dtype} for operator {op}")]
    UnsupportedDType { dtype: DataType, op: String },

    /// Tensor rank an operator cannot handle
    #[error("Unsupported rank {rank} for operator {op} (expected {expected})")]
    UnsupportedRank {
        rank: usize,
        expected: usize,
        op: String,
    },

    /// Tensor holds a different element type than requested
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: DataType, actual: DataType },

    /// Tensor read before anything was written to it
    #[error("Tensor has not been allocated: {0}")]
    Unallocated(String),

    /// Operator not present in the registry
    #[error("No operator registered for {op_type} on {device}")]
    OperatorNotFound { op_type: String, device: String },

    /// Second registration of the same (name, device) pair
    #[error("Operator {op_type} already registered on {device}")]
    DuplicateRegistration { op_type: String, device: String },

    /// Blob missing from the workspace
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// Blob holds a different kind of value than requested
    #[error("Blob {name} does not hold a {expected}")]
    BlobType { name: String, expected: &'static str },

    // ========== Queue Errors ==========
    #[error("Queue {0} is closed")]
    QueueClosed(String),

    #[error("Timed out waiting on queue {0}")]
    QueueTimeout(String),

    // ========== Unimplemented ==========
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    // ========== Device Errors ==========
    #[error("HIP error: {0}")]
    Hip(#[from] HipError),

    #[error("{0}")]
    Miopen(#[from] MiopenError),

    /// Lock poisoned (indicates a bug or concurrent access issue)
    #[error("Internal lock poisoned: {0}")]
    LockPoisoned(String),
}

impl OpsError {
    /// Categorize the error for reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            OpsError::Unimplemented(_) => ErrorCategory::Unimplemented,
            OpsError::Hip(_) | OpsError::Miopen(_) | OpsError::LockPoisoned(_) => {
                ErrorCategory::Device
            }
            _ => ErrorCategory::Configuration,
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Configuration)
    }

    pub fn is_device_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Device)
    }

    pub fn unsupported_dtype(dtype: DataType, op: impl Into<String>) -> Self {
        OpsError::UnsupportedDType {
            dtype,
            op: op.into(),
        }
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid configuration, raised before any device work
    Configuration,
    /// Feature the backend does not provide
    Unimplemented,
    /// Device or driver failure
    Device,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Configuration => write!(f, "Configuration"),
            ErrorCategory::Unimplemented => write!(f, "Unimplemented"),
            ErrorCategory::Device => write!(f, "Device"),
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for OpsError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        OpsError::LockPoisoned(err.to_string())
    }
}

/// Helper type alias for Results using OpsError
pub type OpsResult<T> = std::result::Result<T, OpsError>;

/// Return a configuration error unless the condition holds
///
/// # Examples
/// ```ignore
/// enforce!(dy.size() == y.size(), "dY has {} elements, Y has {}", dy.size(), y.size());
/// ```
#[macro_export]
macro_rules! enforce {
    ($cond:expr, $msg:expr) => {
        if !$cond {
            return Err($crate::error::OpsError::InvalidArgument($msg.to_string()));
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::OpsError::InvalidArgument(format!($fmt, $($arg)*)));
        }
    };
}

/// Return a shape mismatch unless both sizes agree
#[macro_export]
macro_rules! enforce_eq_size {
    ($lhs:expr, $rhs:expr, $what:expr) => {{
        let (lhs, rhs) = ($lhs, $rhs);
        if lhs != rhs {
            return Err($crate::error::OpsError::ShapeMismatch(format!(
                "{}: {} vs {}",
                $what, lhs, rhs
            )));
        }
    }};
}
