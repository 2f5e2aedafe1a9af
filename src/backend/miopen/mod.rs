//! Emulated MIOpen normalization library
//!
//! Descriptor-based operators do not drive kernels themselves. They describe
//! their tensors and the normalization to the library through descriptors and
//! call its entry points, which queue work on the context stream.

pub mod descriptors;
pub mod library;

pub use descriptors::{DescriptorCache, LrnDescriptor, LrnMode, TensorDescriptor};
pub use library::{HostMiopen, LrnLibrary};

use thiserror::Error;

use crate::backend::hip_backend::HipError;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MiopenError {
    /// Descriptor or argument rejected by the library
    #[error("MIOpen bad parameter: {0}")]
    BadParam(String),
    /// Tensor type the library has no kernels for
    #[error("MIOpen does not support tensor type {0}")]
    UnsupportedType(String),
    #[error(transparent)]
    Hip(#[from] HipError),
}

pub type MiopenResult<T> = Result<T, MiopenError>;
