//! Sequential nets
//!
//! A [`NetDef`] lists input fills and operators; a [`Net`] instantiates the
//! operators once against a workspace and runs them in order on one device
//! context, synchronizing at the end of each run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::hip_backend::HipContext;
use crate::dispatch_types;
use crate::error::{OpsError, OpsResult};
use crate::ops::def::OperatorDef;
use crate::ops::operator::Operator;
use crate::ops::registry::OperatorRegistry;
use crate::ops::workspace::Workspace;
use crate::tensor::{DataType, Element, Scalar, Tensor};
use half::f16;

/// Host values to place in the workspace before a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorFill {
    pub name: String,
    pub dims: Vec<usize>,
    /// Element type name, e.g. `FLOAT` or `INT32`
    #[serde(default = "default_fill_dtype")]
    pub dtype: String,
    pub values: Vec<f64>,
}

fn default_fill_dtype() -> String {
    DataType::Float.name().to_string()
}

impl TensorFill {
    pub fn to_tensor(&self) -> OpsResult<Tensor> {
        let dtype = DataType::from_name(&self.dtype).ok_or_else(|| {
            OpsError::InvalidArgument(format!("{}: unknown dtype {}", self.name, self.dtype))
        })?;
        dispatch_types!(
            dtype,
            "TensorFill",
            [f32, i32, bool, u8, i8, u16, i16, i64, f16, f64],
            T => { tensor_from_f64::<T>(&self.dims, &self.values) }
        )
    }
}

fn tensor_from_f64<T: Element>(dims: &[usize], values: &[f64]) -> OpsResult<Tensor> {
    let values: Vec<T> = values.iter().map(|&v| T::from_scalar(Scalar::Float(v))).collect();
    Tensor::from_vec(dims, values)
}

/// Tensor contents widened to `f64`, for display
pub fn tensor_values_f64(tensor: &Tensor) -> OpsResult<Vec<f64>> {
    dispatch_types!(
        tensor.dtype(),
        "tensor_values_f64",
        [f32, i32, bool, u8, i8, u16, i16, i64, f16, f64],
        T => {
            Ok(tensor
                .to_vec::<T>()?
                .into_iter()
                .map(|v| f64::from_scalar(v.to_scalar()))
                .collect())
        }
    )
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<TensorFill>,
    pub ops: Vec<OperatorDef>,
    /// Blobs reported after a run
    #[serde(default)]
    pub outputs: Vec<String>,
}

pub struct Net {
    name: String,
    ops: Vec<Box<dyn Operator>>,
    context: Arc<HipContext>,
}

impl Net {
    /// Feed the input fills and construct every operator
    pub fn new(
        def: &NetDef,
        registry: &OperatorRegistry,
        ws: &mut Workspace,
        context: Arc<HipContext>,
    ) -> OpsResult<Self> {
        for fill in &def.inputs {
            ws.feed_tensor(&fill.name, fill.to_tensor()?)?;
        }
        let ops = def
            .ops
            .iter()
            .map(|op| registry.create_operator(op, ws, Arc::clone(&context)))
            .collect::<OpsResult<Vec<_>>>()?;
        tracing::debug!(net = %def.name, ops = ops.len(), "net created");
        Ok(Net {
            name: def.name.clone(),
            ops,
            context,
        })
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Run every operator in order, then wait for the device.
    /// The first failure aborts the run.
    pub fn run(&mut self) -> OpsResult<()> {
        for op in self.ops.iter_mut() {
            if let Err(err) = op.run() {
                tracing::error!(
                    net = %self.name,
                    op_type = %op.base().op_type(),
                    category = %err.category(),
                    error = %err,
                    "operator failed"
                );
                return Err(err);
            }
        }
        self.context.synchronize()?;
        Ok(())
    }
}
