//! hipops - HIP operator bindings
//!
//! Elementwise math, casting, packed segment reversal, local response
//! normalization and blob queues, run on an emulated ROCm/HIP device.
//!
//! Operators are built from an [`OperatorDef`] through an
//! [`OperatorRegistry`], bound to blobs of a [`Workspace`], and queue their
//! kernels on the stream of a shared [`HipContext`].

#![allow(clippy::too_many_arguments)] // Kernel launches take many buffers
#![allow(clippy::needless_range_loop)] // Index loops mirror the device kernels

pub mod backend;
pub mod config;
pub mod error;
pub mod kernels;
pub mod logging;
pub mod operators;
pub mod ops;
pub mod queue;
pub mod tensor;

pub use backend::{HipContext, HipError, HipResult, HostMiopen, LrnLibrary, MiopenError};
pub use config::DeviceConfig;
pub use error::{ErrorCategory, OpsError, OpsResult};
pub use ops::{
    DeviceKind, Net, NetDef, Operator, OperatorDef, OperatorRegistry, OperatorSchema, Workspace,
};
pub use queue::BlobsQueue;
pub use tensor::{DataType, Tensor};
