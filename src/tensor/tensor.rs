//! N-dimensional tensor backed by a device buffer
//!
//! Cloning a [`Tensor`] copies the handle, not the data: both clones refer to
//! the same buffer until one of them is resized to a different element count
//! or type, at which point it gets a fresh allocation. Use
//! [`Tensor::deep_clone`] for an independent copy.

use crate::backend::hip_backend::HipError;
use crate::error::{OpsError, OpsResult};
use crate::tensor::dtype::{DataType, Element};
use crate::tensor::storage::{DeviceBuffer, TypedBuffer};

#[derive(Debug, Clone)]
pub struct Tensor {
    dims: Vec<usize>,
    dtype: DataType,
    buffer: Option<DeviceBuffer>,
}

impl Default for Tensor {
    fn default() -> Self {
        Tensor {
            dims: vec![0],
            dtype: DataType::Undefined,
            buffer: None,
        }
    }
}

impl Tensor {
    /// Empty, unallocated tensor of shape `[0]`
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape-only tensor; storage is allocated on first `mutable_data`
    pub fn with_dims(dims: &[usize]) -> Self {
        Tensor {
            dims: dims.to_vec(),
            ..Self::default()
        }
    }

    pub fn from_vec<T: Element>(dims: &[usize], values: Vec<T>) -> OpsResult<Self> {
        let size: usize = dims.iter().product();
        if size != values.len() {
            return Err(OpsError::ShapeMismatch(format!(
                "shape {:?} holds {} elements, got {}",
                dims,
                size,
                values.len()
            )));
        }
        Ok(Tensor {
            dims: dims.to_vec(),
            dtype: T::DTYPE,
            buffer: Some(DeviceBuffer::from_vec(values)),
        })
    }

    /// Rank-0 tensor holding one value
    pub fn scalar<T: Element>(value: T) -> Self {
        Tensor {
            dims: Vec::new(),
            dtype: T::DTYPE,
            buffer: Some(DeviceBuffer::from_vec(vec![value])),
        }
    }

    /// Tensor that adopts an existing buffer
    pub fn from_buffer(dims: &[usize], buffer: DeviceBuffer) -> OpsResult<Self> {
        let size: usize = dims.iter().product();
        if size != buffer.len() {
            return Err(OpsError::ShapeMismatch(format!(
                "shape {:?} holds {} elements, buffer has {}",
                dims,
                size,
                buffer.len()
            )));
        }
        Ok(Tensor {
            dims: dims.to_vec(),
            dtype: buffer.dtype(),
            buffer: Some(buffer),
        })
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total element count
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn dim(&self, i: usize) -> OpsResult<usize> {
        self.dims.get(i).copied().ok_or_else(|| {
            OpsError::InvalidArgument(format!(
                "dimension {} out of range for tensor of rank {}",
                i,
                self.dims.len()
            ))
        })
    }

    pub fn dim32(&self, i: usize) -> OpsResult<i32> {
        let d = self.dim(i)?;
        i32::try_from(d).map_err(|_| {
            OpsError::InvalidArgument(format!("dimension {} ({}) does not fit in i32", i, d))
        })
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn is_type<T: Element>(&self) -> bool {
        self.dtype == T::DTYPE
    }

    pub fn is_allocated(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&DeviceBuffer> {
        self.buffer.as_ref()
    }

    /// Change the shape. Storage is kept only if the element count is unchanged.
    pub fn resize(&mut self, dims: &[usize]) {
        let new_size: usize = dims.iter().product();
        if let Some(buffer) = &self.buffer {
            if buffer.len() != new_size {
                self.buffer = None;
            }
        }
        self.dims = dims.to_vec();
    }

    pub fn resize_like(&mut self, other: &Tensor) {
        self.resize(other.dims());
    }

    /// Typed read handle
    pub fn data<T: Element>(&self) -> OpsResult<TypedBuffer<T>> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| OpsError::Unallocated(format!("tensor of shape {:?}", self.dims)))?;
        if self.dtype != T::DTYPE {
            return Err(OpsError::TypeMismatch {
                expected: T::DTYPE,
                actual: self.dtype,
            });
        }
        Ok(buffer.typed::<T>()?)
    }

    /// Typed write handle, allocating if the current storage does not fit
    pub fn mutable_data<T: Element>(&mut self) -> OpsResult<TypedBuffer<T>> {
        let buffer = self.mutable_data_dyn(T::DTYPE)?;
        Ok(buffer.typed::<T>()?)
    }

    /// Untyped write handle for a runtime element type
    pub fn mutable_data_dyn(&mut self, dtype: DataType) -> OpsResult<DeviceBuffer> {
        let size = self.size();
        if let Some(buffer) = &self.buffer {
            if buffer.dtype() == dtype && buffer.len() == size {
                self.dtype = dtype;
                return Ok(buffer.clone());
            }
        }
        let buffer = DeviceBuffer::allocate(dtype, size).map_err(|e| match e {
            HipError::MemoryAllocationFailed(_) => {
                OpsError::unsupported_dtype(dtype, "tensor allocation")
            }
            other => OpsError::Hip(other),
        })?;
        self.dtype = dtype;
        self.buffer = Some(buffer.clone());
        Ok(buffer)
    }

    /// Host copy of the contents. Pending device work must be synchronized first.
    pub fn to_vec<T: Element>(&self) -> OpsResult<Vec<T>> {
        Ok(self.data::<T>()?.to_vec()?)
    }

    /// Independent copy with its own storage
    pub fn deep_clone(&self) -> OpsResult<Tensor> {
        let buffer = match &self.buffer {
            Some(buffer) => Some(buffer.duplicate()?),
            None => None,
        };
        Ok(Tensor {
            dims: self.dims.clone(),
            dtype: self.dtype,
            buffer,
        })
    }

    /// Whether two tensors share storage
    pub fn shares_data_with(&self, other: &Tensor) -> bool {
        match (&self.buffer, &other.buffer) {
            (Some(a), Some(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}
