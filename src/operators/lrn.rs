//! Descriptor-based local response normalization (`LRN`, `LRNGradient`)
//!
//! Both operators hold one normalization descriptor, built at construction
//! from `size`, `alpha`, `beta` and `bias`, and one tensor descriptor that is
//! rebuilt only when the input shape or element type changes. Inputs must be
//! 4-D NCHW tensors of FLOAT or FLOAT16.

use std::sync::Arc;

use half::f16;

use crate::backend::hip_backend::HipContext;
use crate::backend::miopen::{DescriptorCache, HostMiopen, LrnDescriptor, LrnLibrary, TensorDescriptor};
use crate::dispatch_types;
use crate::enforce;
use crate::error::{OpsError, OpsResult};
use crate::kernels::LrnParams;
use crate::ops::{Operator, OperatorBase, OperatorDef, Workspace};
use crate::tensor::{Element, Tensor};

fn lrn_params(def: &OperatorDef) -> OpsResult<LrnParams> {
    let size: i64 = def.get_single_argument("size", 0)?;
    enforce!(size >= 1, "{}: size must be at least 1, got {}", def.op_type, size);
    Ok(LrnParams {
        size: size as usize,
        alpha: def.get_single_argument("alpha", 0.0f32)?,
        beta: def.get_single_argument("beta", 0.0f32)?,
        bias: def.get_single_argument("bias", 1.0f32)?,
    })
}

fn nchw_dims(tensor: &Tensor, op: &str) -> OpsResult<[usize; 4]> {
    match tensor.dims() {
        &[n, c, h, w] => Ok([n, c, h, w]),
        dims => Err(OpsError::UnsupportedRank {
            rank: dims.len(),
            expected: 4,
            op: op.to_string(),
        }),
    }
}

/// Descriptor state shared by the forward and backward operators
struct LrnState {
    library: Arc<dyn LrnLibrary>,
    norm_desc: LrnDescriptor,
    cache: DescriptorCache,
}

impl LrnState {
    fn new(def: &OperatorDef, library: Arc<dyn LrnLibrary>) -> OpsResult<Self> {
        let params = lrn_params(def)?;
        let norm_desc = library.create_lrn_descriptor(params)?;
        Ok(LrnState {
            library,
            norm_desc,
            cache: DescriptorCache::new(),
        })
    }

    fn data_desc(&mut self, tensor: &Tensor, op: &str) -> OpsResult<TensorDescriptor> {
        let dims = nchw_dims(tensor, op)?;
        let dtype = tensor.dtype();
        let library = Arc::clone(&self.library);
        let desc = self
            .cache
            .get_or_rebuild(tensor.dims(), dtype, || {
                library.set_tensor_4d_descriptor(dtype, dims)
            })?;
        Ok(desc.clone())
    }
}

pub struct LrnOp {
    base: OperatorBase,
    state: LrnState,
}

impl LrnOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Self::with_library(def, ws, context, Arc::new(HostMiopen::new()))
    }

    pub fn with_library(
        def: &OperatorDef,
        ws: &mut Workspace,
        context: Arc<HipContext>,
        library: Arc<dyn LrnLibrary>,
    ) -> OpsResult<Self> {
        Ok(LrnOp {
            state: LrnState::new(def, library)?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }

    pub fn descriptor_rebuilds(&self) -> u64 {
        self.state.cache.rebuilds()
    }

    fn run_with_type<T: Element>(&mut self, x: &Tensor, y: &mut Tensor) -> OpsResult<()> {
        let desc = self.state.data_desc(x, "LRN")?;
        let x_buf = x.data::<T>()?.buffer().clone();
        let y_buf = y.mutable_data::<T>()?.buffer().clone();
        self.state.library.lrn_cross_channel_forward(
            self.base.context(),
            &self.state.norm_desc,
            &desc,
            &x_buf,
            &y_buf,
        )?;
        Ok(())
    }
}

impl Operator for LrnOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let x = self.base.input(0)?;
        nchw_dims(&x, "LRN")?;
        let mut y = self.base.output(0)?;
        y.resize_like(&x);
        dispatch_types!(x.dtype(), "LRN", [f32, f16], T => {
            self.run_with_type::<T>(&x, &mut y)
        })?;
        self.base.set_output(0, y)
    }
}

/// `(X, Y, dY) -> dX`
pub struct LrnGradientOp {
    base: OperatorBase,
    state: LrnState,
}

impl LrnGradientOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Self::with_library(def, ws, context, Arc::new(HostMiopen::new()))
    }

    pub fn with_library(
        def: &OperatorDef,
        ws: &mut Workspace,
        context: Arc<HipContext>,
        library: Arc<dyn LrnLibrary>,
    ) -> OpsResult<Self> {
        Ok(LrnGradientOp {
            state: LrnState::new(def, library)?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }

    pub fn descriptor_rebuilds(&self) -> u64 {
        self.state.cache.rebuilds()
    }

    fn run_with_type<T: Element>(
        &mut self,
        x: &Tensor,
        y: &Tensor,
        dy: &Tensor,
        dx: &mut Tensor,
    ) -> OpsResult<()> {
        let desc = self.state.data_desc(dy, "LRNGradient")?;
        let x_buf = x.data::<T>()?.buffer().clone();
        let y_buf = y.data::<T>()?.buffer().clone();
        let dy_buf = dy.data::<T>()?.buffer().clone();
        let dx_buf = dx.mutable_data::<T>()?.buffer().clone();
        self.state.library.lrn_cross_channel_backward(
            self.base.context(),
            &self.state.norm_desc,
            &desc,
            &y_buf,
            &dy_buf,
            &x_buf,
            &dx_buf,
        )?;
        Ok(())
    }
}

impl Operator for LrnGradientOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let x = self.base.input(0)?;
        let y = self.base.input(1)?;
        let dy = self.base.input(2)?;
        nchw_dims(&dy, "LRNGradient")?;
        enforce!(
            x.dims() == dy.dims() && y.dims() == dy.dims(),
            "LRNGradient: X {:?}, Y {:?} and dY {:?} must have the same shape",
            x.dims(),
            y.dims(),
            dy.dims()
        );
        let mut dx = self.base.output(0)?;
        dx.resize_like(&dy);
        dispatch_types!(dy.dtype(), "LRNGradient", [f32, f16], T => {
            self.run_with_type::<T>(&x, &y, &dy, &mut dx)
        })?;
        self.base.set_output(0, dx)
    }
}

pub fn create_lrn(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(LrnOp::new(def, ws, context)?))
}

pub fn create_lrn_gradient(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(LrnGradientOp::new(def, ws, context)?))
}
