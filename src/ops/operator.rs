//! Operator interface
//!
//! An operator is constructed once from its [`OperatorDef`], resolving its
//! input and output blobs in the workspace, and then run any number of times.
//! Running only queues device work on the context's stream; it never waits
//! for that work to finish.

use std::sync::Arc;

use crate::backend::hip_backend::HipContext;
use crate::error::{OpsError, OpsResult};
use crate::ops::def::{FromArgument, OperatorDef};
use crate::ops::workspace::{Blob, BlobRef, Workspace};
use crate::queue::BlobsQueue;
use crate::tensor::Tensor;

/// A constructed operator bound to one device context
pub trait Operator: Send {
    fn base(&self) -> &OperatorBase;

    /// Device-specific body
    fn run_on_device(&mut self) -> OpsResult<()>;

    fn run(&mut self) -> OpsResult<()> {
        let span = tracing::trace_span!(
            "operator",
            op_type = %self.base().def().op_type,
            name = %self.base().def().name
        );
        let _enter = span.enter();
        tracing::trace!("running operator");
        self.run_on_device()
    }
}

/// Blob bindings, arguments and device context shared by every operator
#[derive(Debug)]
pub struct OperatorBase {
    def: OperatorDef,
    inputs: Vec<BlobRef>,
    outputs: Vec<BlobRef>,
    context: Arc<HipContext>,
}

impl OperatorBase {
    /// Resolve inputs (which must exist) and outputs (created if missing)
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        let inputs = def
            .inputs
            .iter()
            .map(|name| ws.get_blob(name))
            .collect::<OpsResult<Vec<_>>>()?;
        let outputs = def.outputs.iter().map(|name| ws.create_blob(name)).collect();
        Ok(OperatorBase {
            def: def.clone(),
            inputs,
            outputs,
            context,
        })
    }

    pub fn def(&self) -> &OperatorDef {
        &self.def
    }

    pub fn op_type(&self) -> &str {
        &self.def.op_type
    }

    pub fn context(&self) -> &Arc<HipContext> {
        &self.context
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn get_single_argument<T: FromArgument>(&self, name: &str, default: T) -> OpsResult<T> {
        self.def.get_single_argument(name, default)
    }

    /// Handle to input tensor `i`
    pub fn input(&self, i: usize) -> OpsResult<Tensor> {
        let blob = self.input_blob(i)?;
        let guard = blob.read()?;
        match &*guard {
            Blob::Tensor(t) => Ok(t.clone()),
            _ => Err(self.blob_type_error(&self.def.inputs, i, "tensor")),
        }
    }

    /// Handle to output tensor `i`; an empty slot yields a fresh tensor
    pub fn output(&self, i: usize) -> OpsResult<Tensor> {
        let blob = self.output_blob(i)?;
        let guard = blob.read()?;
        match &*guard {
            Blob::Tensor(t) => Ok(t.clone()),
            Blob::Empty => Ok(Tensor::new()),
            Blob::Queue(_) => Err(self.blob_type_error(&self.def.outputs, i, "tensor")),
        }
    }

    pub fn set_output(&self, i: usize, tensor: Tensor) -> OpsResult<()> {
        let blob = self.output_blob(i)?;
        *blob.write()? = Blob::Tensor(tensor);
        Ok(())
    }

    pub fn input_queue(&self, i: usize) -> OpsResult<Arc<BlobsQueue>> {
        let blob = self.input_blob(i)?;
        let guard = blob.read()?;
        match &*guard {
            Blob::Queue(q) => Ok(Arc::clone(q)),
            _ => Err(self.blob_type_error(&self.def.inputs, i, "queue")),
        }
    }

    pub fn set_output_queue(&self, i: usize, queue: Arc<BlobsQueue>) -> OpsResult<()> {
        let blob = self.output_blob(i)?;
        *blob.write()? = Blob::Queue(queue);
        Ok(())
    }

    fn input_blob(&self, i: usize) -> OpsResult<&BlobRef> {
        self.inputs.get(i).ok_or_else(|| {
            OpsError::InvalidArgument(format!(
                "{}: input {} requested, operator has {}",
                self.def.op_type,
                i,
                self.inputs.len()
            ))
        })
    }

    fn output_blob(&self, i: usize) -> OpsResult<&BlobRef> {
        self.outputs.get(i).ok_or_else(|| {
            OpsError::InvalidArgument(format!(
                "{}: output {} requested, operator has {}",
                self.def.op_type,
                i,
                self.outputs.len()
            ))
        })
    }

    fn blob_type_error(&self, names: &[String], i: usize, expected: &'static str) -> OpsError {
        OpsError::BlobType {
            name: names.get(i).cloned().unwrap_or_default(),
            expected,
        }
    }
}

/// Input/output arity accepted by an operator type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorSchema {
    pub min_inputs: usize,
    pub max_inputs: usize,
    pub min_outputs: usize,
    pub max_outputs: usize,
}

impl OperatorSchema {
    pub fn exact(inputs: usize, outputs: usize) -> Self {
        OperatorSchema {
            min_inputs: inputs,
            max_inputs: inputs,
            min_outputs: outputs,
            max_outputs: outputs,
        }
    }

    pub fn range(inputs: (usize, usize), outputs: (usize, usize)) -> Self {
        OperatorSchema {
            min_inputs: inputs.0,
            max_inputs: inputs.1,
            min_outputs: outputs.0,
            max_outputs: outputs.1,
        }
    }

    pub fn verify(&self, def: &OperatorDef) -> OpsResult<()> {
        let (n_in, n_out) = (def.inputs.len(), def.outputs.len());
        if n_in < self.min_inputs || n_in > self.max_inputs {
            return Err(OpsError::InvalidArgument(format!(
                "{} takes {}..={} inputs, got {}",
                def.op_type, self.min_inputs, self.max_inputs, n_in
            )));
        }
        if n_out < self.min_outputs || n_out > self.max_outputs {
            return Err(OpsError::InvalidArgument(format!(
                "{} takes {}..={} outputs, got {}",
                def.op_type, self.min_outputs, self.max_outputs, n_out
            )));
        }
        Ok(())
    }
}
