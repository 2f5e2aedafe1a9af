//! Operators over [`BlobsQueue`]
//!
//! Enqueue waits for the device context so the stored copies hold finished
//! results. The `Safe` variants report a closed (or timed out) queue through
//! a trailing boolean `status` output instead of failing the net.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::hip_backend::HipContext;
use crate::enforce;
use crate::error::{OpsError, OpsResult};
use crate::ops::{Operator, OperatorBase, OperatorDef, Workspace};
use crate::queue::BlobsQueue;
use crate::tensor::Tensor;

/// `() -> queue`
pub struct CreateBlobsQueueOp {
    base: OperatorBase,
    name: String,
    capacity: usize,
    num_blobs: usize,
    enforce_unique_name: bool,
    field_names: Vec<String>,
}

impl CreateBlobsQueueOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        let name = if def.name.is_empty() {
            def.outputs.first().cloned().unwrap_or_default()
        } else {
            def.name.clone()
        };
        Ok(CreateBlobsQueueOp {
            name,
            capacity: def.get_single_argument("capacity", 1usize)?,
            num_blobs: def.get_single_argument("num_blobs", 1usize)?,
            enforce_unique_name: def.get_single_argument("enforce_unique_name", false)?,
            field_names: def.get_single_argument("field_names", Vec::new())?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for CreateBlobsQueueOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let queue = BlobsQueue::new(
            &self.name,
            self.capacity,
            self.num_blobs,
            self.enforce_unique_name,
            self.field_names.clone(),
        )?;
        self.base.set_output_queue(0, Arc::new(queue))
    }
}

/// Inputs `1..` as one record of deep copies
fn snapshot_record(base: &OperatorBase, count: usize) -> OpsResult<Vec<Tensor>> {
    base.context().synchronize()?;
    (1..=count).map(|i| base.input(i)?.deep_clone()).collect()
}

/// Enqueued blobs pass through unchanged: input `i + 1` is output `i`
fn enforce_inplace(def: &OperatorDef, count: usize) -> OpsResult<()> {
    for (input, output) in def.inputs[1..].iter().zip(&def.outputs[..count]) {
        enforce!(
            input == output,
            "{}: output '{}' must be the input blob '{}'",
            def.op_type,
            output,
            input
        );
    }
    Ok(())
}

/// Outputs match the queue's blobs, checked before a record is taken
fn enforce_record_arity(op_type: &str, queue: &BlobsQueue, outputs: usize) -> OpsResult<()> {
    enforce!(
        queue.num_blobs() == outputs,
        "{}: queue '{}' holds {} blobs per record, not {}",
        op_type,
        queue.name(),
        queue.num_blobs(),
        outputs
    );
    Ok(())
}

/// `(queue, b1..bn) -> (b1..bn)`
pub struct EnqueueBlobsOp {
    base: OperatorBase,
}

impl EnqueueBlobsOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        enforce!(
            def.inputs.len() == def.outputs.len() + 1,
            "EnqueueBlobs: {} inputs for {} outputs",
            def.inputs.len(),
            def.outputs.len()
        );
        enforce_inplace(def, def.outputs.len())?;
        Ok(EnqueueBlobsOp {
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for EnqueueBlobsOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let queue = self.base.input_queue(0)?;
        let record = snapshot_record(&self.base, self.base.num_outputs())?;
        queue.blocking_write(record)
    }
}

fn timeout_argument(def: &OperatorDef) -> OpsResult<Option<Duration>> {
    let secs: f64 = def.get_single_argument("timeout_secs", 0.0)?;
    enforce!(secs >= 0.0, "{}: timeout_secs must not be negative", def.op_type);
    if secs == 0.0 {
        return Ok(None);
    }
    Duration::try_from_secs_f64(secs).map(Some).map_err(|e| {
        OpsError::InvalidArgument(format!("{}: timeout_secs {}: {}", def.op_type, secs, e))
    })
}

/// `queue -> (b1..bn)`
pub struct DequeueBlobsOp {
    base: OperatorBase,
    timeout: Option<Duration>,
}

impl DequeueBlobsOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Ok(DequeueBlobsOp {
            timeout: timeout_argument(def)?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for DequeueBlobsOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let queue = self.base.input_queue(0)?;
        enforce_record_arity("DequeueBlobs", &queue, self.base.num_outputs())?;
        let record = queue.blocking_read(self.timeout)?;
        for (i, tensor) in record.into_iter().enumerate() {
            self.base.set_output(i, tensor)?;
        }
        Ok(())
    }
}

/// `queue -> ()`
pub struct CloseBlobsQueueOp {
    base: OperatorBase,
}

impl CloseBlobsQueueOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Ok(CloseBlobsQueueOp {
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for CloseBlobsQueueOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        self.base.input_queue(0)?.close()
    }
}

fn is_queue_exhausted(err: &OpsError) -> bool {
    matches!(err, OpsError::QueueClosed(_) | OpsError::QueueTimeout(_))
}

/// `(queue, b1..bn) -> (b1..bn, status)`
pub struct SafeEnqueueBlobsOp {
    base: OperatorBase,
}

impl SafeEnqueueBlobsOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        enforce!(
            !def.outputs.is_empty() && def.inputs.len() == def.outputs.len(),
            "SafeEnqueueBlobs: {} inputs for {} outputs",
            def.inputs.len(),
            def.outputs.len()
        );
        enforce_inplace(def, def.outputs.len() - 1)?;
        Ok(SafeEnqueueBlobsOp {
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for SafeEnqueueBlobsOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let queue = self.base.input_queue(0)?;
        let status_index = self.base.num_outputs() - 1;
        let record = snapshot_record(&self.base, status_index)?;
        let closed = match queue.blocking_write(record) {
            Ok(()) => false,
            Err(err) if is_queue_exhausted(&err) => true,
            Err(err) => return Err(err),
        };
        self.base.set_output(status_index, Tensor::scalar(closed))
    }
}

/// Join tensors along their first dimension
fn concat_first_dim(parts: &[Tensor]) -> OpsResult<Tensor> {
    let first = parts
        .first()
        .ok_or_else(|| OpsError::InvalidArgument("nothing to concatenate".to_string()))?;
    enforce!(first.ndim() >= 1, "cannot concatenate rank-0 tensors");
    let inner = &first.dims()[1..];
    let mut leading = 0;
    for part in parts {
        enforce!(
            part.ndim() == first.ndim() && &part.dims()[1..] == inner,
            "records have shapes {:?} and {:?}",
            first.dims(),
            part.dims()
        );
        if part.dtype() != first.dtype() {
            return Err(OpsError::TypeMismatch {
                expected: first.dtype(),
                actual: part.dtype(),
            });
        }
        leading += part.dims()[0];
    }

    let mut dims = first.dims().to_vec();
    dims[0] = leading;
    let mut out = Tensor::with_dims(&dims);
    let buffer = out.mutable_data_dyn(first.dtype())?;
    let mut storage = buffer.write()?;
    let mut offset = 0;
    for part in parts {
        let count = part.size();
        if let Some(src) = part.buffer() {
            storage.copy_range_from(offset, &*src.read()?, 0, count)?;
        }
        offset += count;
    }
    drop(storage);
    Ok(out)
}

/// `queue -> (b1..bn, status)`, reading up to `num_records` records
pub struct SafeDequeueBlobsOp {
    base: OperatorBase,
    num_records: usize,
    timeout: Option<Duration>,
}

impl SafeDequeueBlobsOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        let num_records: usize = def.get_single_argument("num_records", 1)?;
        enforce!(num_records >= 1, "SafeDequeueBlobs: num_records must be positive");
        enforce!(!def.outputs.is_empty(), "SafeDequeueBlobs needs a status output");
        Ok(SafeDequeueBlobsOp {
            num_records,
            timeout: timeout_argument(def)?,
            base: OperatorBase::new(def, ws, context)?,
        })
    }
}

impl Operator for SafeDequeueBlobsOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let queue = self.base.input_queue(0)?;
        let status_index = self.base.num_outputs() - 1;
        enforce_record_arity("SafeDequeueBlobs", &queue, status_index)?;

        let mut records = Vec::with_capacity(self.num_records);
        for _ in 0..self.num_records {
            match queue.blocking_read(self.timeout) {
                Ok(record) => records.push(record),
                Err(err) if is_queue_exhausted(&err) => break,
                Err(err) => return Err(err),
            }
        }

        // A partial batch is still data; only an empty read is exhausted
        let exhausted = records.is_empty();
        if !exhausted {
            if records.len() == 1 {
                for (i, tensor) in records.swap_remove(0).into_iter().enumerate() {
                    self.base.set_output(i, tensor)?;
                }
            } else {
                for i in 0..status_index {
                    let parts: Vec<Tensor> = records.iter().map(|r| r[i].clone()).collect();
                    self.base.set_output(i, concat_first_dim(&parts)?)?;
                }
            }
        }
        self.base.set_output(status_index, Tensor::scalar(exhausted))
    }
}

macro_rules! queue_creator {
    ($fn_name:ident, $op:ty) => {
        pub fn $fn_name(
            def: &OperatorDef,
            ws: &mut Workspace,
            context: Arc<HipContext>,
        ) -> OpsResult<Box<dyn Operator>> {
            Ok(Box::new(<$op>::new(def, ws, context)?))
        }
    };
}

queue_creator!(create_create_blobs_queue, CreateBlobsQueueOp);
queue_creator!(create_enqueue_blobs, EnqueueBlobsOp);
queue_creator!(create_dequeue_blobs, DequeueBlobsOp);
queue_creator!(create_close_blobs_queue, CloseBlobsQueueOp);
queue_creator!(create_safe_enqueue_blobs, SafeEnqueueBlobsOp);
queue_creator!(create_safe_dequeue_blobs, SafeDequeueBlobsOp);
