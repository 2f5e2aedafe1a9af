//! `Softplus` and its gradient

use std::sync::Arc;

use crate::backend::hip_backend::HipContext;
use crate::dispatch_types;
use crate::enforce_eq_size;
use crate::error::OpsResult;
use crate::kernels::math;
use crate::ops::{Operator, OperatorBase, OperatorDef, UnaryFunctor, Workspace};
use crate::tensor::FloatElement;

#[derive(Debug, Clone, Copy)]
pub struct SoftplusFunctor;

impl UnaryFunctor for SoftplusFunctor {
    const OP_TYPE: &'static str = "Softplus";

    fn from_def(_def: &OperatorDef) -> OpsResult<Self> {
        Ok(SoftplusFunctor)
    }

    #[inline]
    fn call<T: FloatElement>(&self, x: T) -> T {
        math::softplus(x)
    }
}

/// `(Y, dY) -> dX` with `dX = dY * (1 - e^-Y)`
pub struct SoftplusGradientOp {
    base: OperatorBase,
}

impl SoftplusGradientOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Ok(SoftplusGradientOp {
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for SoftplusGradientOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let y = self.base.input(0)?;
        let dy = self.base.input(1)?;
        enforce_eq_size!(dy.size(), y.size(), "SoftplusGradient dY and Y sizes");
        let mut dx = self.base.output(0)?;
        dx.resize_like(&y);

        let ctx = self.base.context();
        dispatch_types!(y.dtype(), "SoftplusGradient", [f32], T => {
            let n = y.size();
            let (y_data, dy_data) = (y.data::<T>()?, dy.data::<T>()?);
            let dx_data = dx.mutable_data::<T>()?;
            ctx.launch_map2("SoftplusGradient", n, y_data, dy_data, dx_data, |y: T, dy: T| {
                math::softplus_gradient(y, dy)
            })?;
            Ok(())
        })?;
        self.base.set_output(0, dx)
    }
}

pub fn create_softplus_gradient(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(SoftplusGradientOp::new(def, ws, context)?))
}
