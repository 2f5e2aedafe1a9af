//! Tensor and normalization descriptors

use crate::backend::miopen::{MiopenError, MiopenResult};
use crate::kernels::LrnParams;
use crate::tensor::DataType;

/// Dense NCHW tensor description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorDescriptor {
    pub dtype: DataType,
    pub n: usize,
    pub c: usize,
    pub h: usize,
    pub w: usize,
}

impl TensorDescriptor {
    pub fn dims(&self) -> [usize; 4] {
        [self.n, self.c, self.h, self.w]
    }

    pub fn num_elements(&self) -> usize {
        self.n * self.c * self.h * self.w
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LrnMode {
    /// Normalize across neighbouring channels
    CrossChannel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LrnDescriptor {
    pub mode: LrnMode,
    pub params: LrnParams,
}

impl LrnDescriptor {
    pub fn new(params: LrnParams) -> MiopenResult<Self> {
        if params.size == 0 {
            return Err(MiopenError::BadParam(
                "LRN window size must be at least 1".to_string(),
            ));
        }
        Ok(LrnDescriptor {
            mode: LrnMode::CrossChannel,
            params,
        })
    }
}

/// Tensor descriptor reused until the input shape or type changes
#[derive(Debug, Default)]
pub struct DescriptorCache {
    key: Option<(Vec<usize>, DataType)>,
    descriptor: Option<TensorDescriptor>,
    rebuilds: u64,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor, rebuilding it with `build` when
    /// `(dims, dtype)` differs from the last call
    pub fn get_or_rebuild<F>(
        &mut self,
        dims: &[usize],
        dtype: DataType,
        build: F,
    ) -> MiopenResult<&TensorDescriptor>
    where
        F: FnOnce() -> MiopenResult<TensorDescriptor>,
    {
        let stale = match &self.key {
            Some((cached_dims, cached_dtype)) => {
                cached_dims.as_slice() != dims || *cached_dtype != dtype
            }
            None => true,
        };
        if stale || self.descriptor.is_none() {
            tracing::debug!(?dims, %dtype, "setting tensor descriptor");
            self.descriptor = Some(build()?);
            self.key = Some((dims.to_vec(), dtype));
            self.rebuilds += 1;
        }
        self.descriptor
            .as_ref()
            .ok_or_else(|| MiopenError::BadParam("tensor descriptor not set".to_string()))
    }

    /// Number of times the descriptor was (re)built
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}
