//! ROCm/HIP backend module

pub mod hip_backend;
pub mod miopen;

pub use hip_backend::*;
pub use miopen::{HostMiopen, LrnLibrary, MiopenError, MiopenResult};
