//! Device-side storage
//!
//! A [`DeviceBuffer`] is a reference-counted allocation of one element type.
//! Queued kernels hold their own reference, so a tensor that is resized while
//! work is in flight gets a new buffer and the in-flight work keeps the old
//! one alive until it completes.

use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use half::f16;

use crate::backend::hip_backend::{HipError, HipResult};
use crate::tensor::dtype::{DataType, Element};

/// Backing memory of one buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Storage {
    Float(Vec<f32>),
    Int32(Vec<i32>),
    Bool(Vec<bool>),
    Uint8(Vec<u8>),
    Int8(Vec<i8>),
    Uint16(Vec<u16>),
    Int16(Vec<i16>),
    Int64(Vec<i64>),
    Float16(Vec<f16>),
    Double(Vec<f64>),
}

macro_rules! with_storage {
    ($storage:expr, $v:ident => $body:expr) => {
        match $storage {
            Storage::Float($v) => $body,
            Storage::Int32($v) => $body,
            Storage::Bool($v) => $body,
            Storage::Uint8($v) => $body,
            Storage::Int8($v) => $body,
            Storage::Uint16($v) => $body,
            Storage::Int16($v) => $body,
            Storage::Int64($v) => $body,
            Storage::Float16($v) => $body,
            Storage::Double($v) => $body,
        }
    };
}

impl Storage {
    /// Zero-filled storage, `None` for types without a device representation
    pub fn zeroed(dtype: DataType, len: usize) -> Option<Storage> {
        let storage = match dtype {
            DataType::Float => Storage::Float(vec![0.0; len]),
            DataType::Int32 => Storage::Int32(vec![0; len]),
            DataType::Bool => Storage::Bool(vec![false; len]),
            DataType::Uint8 => Storage::Uint8(vec![0; len]),
            DataType::Int8 => Storage::Int8(vec![0; len]),
            DataType::Uint16 => Storage::Uint16(vec![0; len]),
            DataType::Int16 => Storage::Int16(vec![0; len]),
            DataType::Int64 => Storage::Int64(vec![0; len]),
            DataType::Float16 => Storage::Float16(vec![f16::ZERO; len]),
            DataType::Double => Storage::Double(vec![0.0; len]),
            DataType::Undefined | DataType::Byte | DataType::String => return None,
        };
        Some(storage)
    }

    pub fn dtype(&self) -> DataType {
        match self {
            Storage::Float(_) => DataType::Float,
            Storage::Int32(_) => DataType::Int32,
            Storage::Bool(_) => DataType::Bool,
            Storage::Uint8(_) => DataType::Uint8,
            Storage::Int8(_) => DataType::Int8,
            Storage::Uint16(_) => DataType::Uint16,
            Storage::Int16(_) => DataType::Int16,
            Storage::Int64(_) => DataType::Int64,
            Storage::Float16(_) => DataType::Float16,
            Storage::Double(_) => DataType::Double,
        }
    }

    pub fn len(&self) -> usize {
        with_storage!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src[src_offset..src_offset + count]` into `self[dst_offset..]`.
    /// Both sides must hold the same element type.
    pub fn copy_range_from(
        &mut self,
        dst_offset: usize,
        src: &Storage,
        src_offset: usize,
        count: usize,
    ) -> HipResult<()> {
        if self.dtype() != src.dtype() {
            return Err(HipError::MemoryAccessFault(format!(
                "copy between {} and {} buffers",
                src.dtype(),
                self.dtype()
            )));
        }
        if src_offset + count > src.len() || dst_offset + count > self.len() {
            return Err(HipError::MemoryAccessFault(format!(
                "copy of {} elements out of bounds (src {} of {}, dst {} of {})",
                count,
                src_offset,
                src.len(),
                dst_offset,
                self.len()
            )));
        }
        macro_rules! copy_variant {
            ($($variant:ident),*) => {
                match (self, src) {
                    $((Storage::$variant(dst), Storage::$variant(src)) => {
                        dst[dst_offset..dst_offset + count]
                            .copy_from_slice(&src[src_offset..src_offset + count]);
                    })*
                    _ => unreachable!("element types checked above"),
                }
            };
        }
        copy_variant!(Float, Int32, Bool, Uint8, Int8, Uint16, Int16, Int64, Float16, Double);
        Ok(())
    }
}

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// A reference-counted device allocation
#[derive(Clone)]
pub struct DeviceBuffer {
    id: u64,
    dtype: DataType,
    len: usize,
    inner: Arc<RwLock<Storage>>,
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("id", &self.id)
            .field("dtype", &self.dtype)
            .field("len", &self.len)
            .finish()
    }
}

impl DeviceBuffer {
    /// Allocate a zero-filled buffer
    pub fn allocate(dtype: DataType, len: usize) -> HipResult<Self> {
        let storage = Storage::zeroed(dtype, len).ok_or_else(|| {
            HipError::MemoryAllocationFailed(format!("no device representation for {}", dtype))
        })?;
        Ok(Self::from_storage(storage))
    }

    pub fn from_storage(storage: Storage) -> Self {
        DeviceBuffer {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            dtype: storage.dtype(),
            len: storage.len(),
            inner: Arc::new(RwLock::new(storage)),
        }
    }

    pub fn from_vec<T: Element>(values: Vec<T>) -> Self {
        Self::from_storage(T::into_storage(values))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn read(&self) -> HipResult<RwLockReadGuard<'_, Storage>> {
        Ok(self.inner.read()?)
    }

    pub fn write(&self) -> HipResult<RwLockWriteGuard<'_, Storage>> {
        Ok(self.inner.write()?)
    }

    /// Whether both handles refer to the same allocation
    pub fn ptr_eq(&self, other: &DeviceBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Fresh allocation holding a copy of this one
    pub fn duplicate(&self) -> HipResult<DeviceBuffer> {
        let storage = self.read()?.clone();
        Ok(Self::from_storage(storage))
    }

    pub fn typed<T: Element>(&self) -> HipResult<TypedBuffer<T>> {
        if self.dtype != T::DTYPE {
            return Err(HipError::GenericError(format!(
                "buffer {} holds {}, requested {}",
                self.id,
                self.dtype,
                T::DTYPE
            )));
        }
        Ok(TypedBuffer {
            buffer: self.clone(),
            _marker: PhantomData,
        })
    }
}

/// A [`DeviceBuffer`] whose element type has been checked
pub struct TypedBuffer<T> {
    buffer: DeviceBuffer,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedBuffer<T> {
    fn clone(&self) -> Self {
        TypedBuffer {
            buffer: self.buffer.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TypedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.buffer.fmt(f)
    }
}

impl<T: Element> TypedBuffer<T> {
    pub fn buffer(&self) -> &DeviceBuffer {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn ptr_eq(&self, other: &DeviceBuffer) -> bool {
        self.buffer.ptr_eq(other)
    }

    pub fn with_slice<R>(&self, f: impl FnOnce(&[T]) -> R) -> HipResult<R> {
        let guard = self.buffer.read()?;
        let slice = T::slice(&guard).ok_or_else(|| self.type_fault())?;
        Ok(f(slice))
    }

    pub fn with_slice_mut<R>(&self, f: impl FnOnce(&mut [T]) -> R) -> HipResult<R> {
        let mut guard = self.buffer.write()?;
        let fault = self.type_fault();
        let slice = T::slice_mut(&mut guard).ok_or(fault)?;
        Ok(f(slice))
    }

    /// Copy the contents back to the host
    pub fn to_vec(&self) -> HipResult<Vec<T>> {
        self.with_slice(|s| s.to_vec())
    }

    fn type_fault(&self) -> HipError {
        HipError::MemoryAccessFault(format!(
            "buffer {} no longer holds {}",
            self.buffer.id(),
            T::DTYPE
        ))
    }
}
