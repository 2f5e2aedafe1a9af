//! `CosineEmbeddingCriterion` and its gradient
//!
//! `S` holds cosine similarities (FLOAT) and `Y` the pair labels (INT32,
//! `1` for similar pairs). Both take the `margin` argument, default `0`.

use std::sync::Arc;

use crate::backend::hip_backend::HipContext;
use crate::enforce_eq_size;
use crate::error::OpsResult;
use crate::kernels::math;
use crate::ops::{Operator, OperatorBase, OperatorDef, Workspace};

pub struct CosineEmbeddingCriterionOp {
    base: OperatorBase,
    margin: f32,
}

impl CosineEmbeddingCriterionOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Ok(CosineEmbeddingCriterionOp {
            margin: def.get_single_argument("margin", 0.0f32)?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for CosineEmbeddingCriterionOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let s = self.base.input(0)?;
        let y = self.base.input(1)?;
        enforce_eq_size!(
            s.size(),
            y.size(),
            "The embedding and label should have the same size"
        );
        let mut output = self.base.output(0)?;
        output.resize_like(&s);

        let (s_data, y_data) = (s.data::<f32>()?, y.data::<i32>()?);
        let out_data = output.mutable_data::<f32>()?;
        let margin = self.margin;
        self.base.context().launch_map2(
            "CosineEmbeddingCriterion",
            s.size(),
            s_data,
            y_data,
            out_data,
            move |s: f32, y: i32| math::cosine_embedding_loss(s, y, margin),
        )?;
        self.base.set_output(0, output)
    }
}

/// `(S, Y, dOutput) -> dS`
pub struct CosineEmbeddingCriterionGradientOp {
    base: OperatorBase,
    margin: f32,
}

impl CosineEmbeddingCriterionGradientOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Ok(CosineEmbeddingCriterionGradientOp {
            margin: def.get_single_argument("margin", 0.0f32)?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for CosineEmbeddingCriterionGradientOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let s = self.base.input(0)?;
        let y = self.base.input(1)?;
        let d_output = self.base.input(2)?;
        enforce_eq_size!(
            s.size(),
            y.size(),
            "The embedding and label should have the same size"
        );
        enforce_eq_size!(s.size(), d_output.size(), "S and dOutput sizes");
        let mut ds = self.base.output(0)?;
        ds.resize_like(&s);

        let s_data = s.data::<f32>()?;
        let y_data = y.data::<i32>()?;
        let d_data = d_output.data::<f32>()?;
        let ds_data = ds.mutable_data::<f32>()?;
        let margin = self.margin;
        self.base.context().launch_map3(
            "CosineEmbeddingCriterionGradient",
            s.size(),
            s_data,
            y_data,
            d_data,
            ds_data,
            move |s: f32, y: i32, d: f32| math::cosine_embedding_gradient(s, y, d, margin),
        )?;
        self.base.set_output(0, ds)
    }
}

pub fn create_cosine_embedding_criterion(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(CosineEmbeddingCriterionOp::new(def, ws, context)?))
}

pub fn create_cosine_embedding_criterion_gradient(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(CosineEmbeddingCriterionGradientOp::new(
        def, ws, context,
    )?))
}
