//! Generic unary elementwise operator
//!
//! [`UnaryElementwiseOp`] is the adapter every `X -> Y` elementwise operator
//! is built from. On each run it
//! 1. reads `X` and sizes `Y` like it,
//! 2. dispatches on the element type of `X`,
//! 3. returns without device work when `X` is empty,
//! 4. otherwise queues one grid-stride kernel applying the functor.
//!
//! Only the per-element function differs between operators.

use std::sync::Arc;

use crate::backend::hip_backend::HipContext;
use crate::dispatch_types;
use crate::error::OpsResult;
use crate::ops::def::OperatorDef;
use crate::ops::operator::{Operator, OperatorBase};
use crate::ops::workspace::Workspace;
use crate::tensor::{FloatElement, Tensor};

/// Per-element function of a unary operator
pub trait UnaryFunctor: Clone + Send + Sync + 'static {
    const OP_TYPE: &'static str;

    /// Read the functor's arguments once, at construction
    fn from_def(def: &OperatorDef) -> OpsResult<Self>;

    fn call<T: FloatElement>(&self, x: T) -> T;
}

pub struct UnaryElementwiseOp<F> {
    base: OperatorBase,
    functor: F,
}

impl<F: UnaryFunctor> UnaryElementwiseOp<F> {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        let functor = F::from_def(def)?;
        Ok(UnaryElementwiseOp {
            base: OperatorBase::new(def, ws, context)?,
            functor,
        })
    }

    fn launch(&self, x: &Tensor, y: &mut Tensor) -> OpsResult<()> {
        let ctx = self.base.context();
        dispatch_types!(x.dtype(), F::OP_TYPE, [f32], T => {
            let x_data = x.data::<T>()?;
            let y_data = y.mutable_data::<T>()?;
            let n = x.size();
            if n == 0 {
                ctx.note_empty_launch(F::OP_TYPE);
                return Ok(());
            }
            let functor = self.functor.clone();
            ctx.launch_map(F::OP_TYPE, n, x_data, y_data, move |v: T| functor.call(v))?;
            Ok(())
        })
    }
}

impl<F: UnaryFunctor> Operator for UnaryElementwiseOp<F> {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let x = self.base.input(0)?;
        let mut y = self.base.output(0)?;
        y.resize_like(&x);
        self.launch(&x, &mut y)?;
        self.base.set_output(0, y)
    }
}

/// Registry constructor for a unary elementwise operator
pub fn create_unary_op<F: UnaryFunctor>(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(UnaryElementwiseOp::<F>::new(def, ws, context)?))
}
