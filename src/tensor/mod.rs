//! Tensors, element types and device storage

pub mod dtype;
pub mod storage;
#[allow(clippy::module_inception)]
pub mod tensor;

pub use dtype::{convert, DataType, Element, FloatElement, Scalar};
pub use storage::{DeviceBuffer, Storage, TypedBuffer};
pub use tensor::Tensor;
