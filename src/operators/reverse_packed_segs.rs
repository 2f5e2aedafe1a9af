//! `ReversePackedSegs`: `(DATA, LENGTHS) -> reversed`
//!
//! `DATA` is `[max_length, batch_size, block_size]` and `LENGTHS` holds one
//! segment count per batch column.

use std::sync::Arc;

use crate::backend::hip_backend::HipContext;
use crate::dispatch_types;
use crate::enforce;
use crate::error::OpsResult;
use crate::kernels::{launch_reverse_packed_segs, PackedSegsShape};
use crate::ops::{Operator, OperatorBase, OperatorDef, Workspace};
use crate::tensor::{Element, Tensor};

const DATA: usize = 0;
const LENGTHS: usize = 1;

pub struct ReversePackedSegsOp {
    base: OperatorBase,
}

impl ReversePackedSegsOp {
    pub fn new(def: &OperatorDef, ws: &mut Workspace, context: Arc<HipContext>) -> OpsResult<Self> {
        Ok(ReversePackedSegsOp {
            base: OperatorBase::new(def, ws, context)?,
        })
    }

    fn run_with_types<T: Element, L: Element>(
        &self,
        shape: PackedSegsShape,
        data: &Tensor,
        lengths: &Tensor,
        output: &mut Tensor,
    ) -> OpsResult<()> {
        let data_ptr = data.data::<T>()?;
        let lengths_ptr = lengths.data::<L>()?;
        let out_ptr = output.mutable_data::<T>()?;
        launch_reverse_packed_segs(self.base.context(), shape, lengths_ptr, data_ptr, out_ptr)?;
        Ok(())
    }
}

impl Operator for ReversePackedSegsOp {
    fn base(&self) -> &OperatorBase {
        &self.base
    }

    fn run_on_device(&mut self) -> OpsResult<()> {
        let data = self.base.input(DATA)?;
        let lengths = self.base.input(LENGTHS)?;
        enforce!(
            data.ndim() == 3,
            "DATA should be 3-D tensor <lengths, segments, embeddings>, got {:?}",
            data.dims()
        );
        enforce!(lengths.ndim() == 1, "LENGTH should be 1-D, got {:?}", lengths.dims());

        let dims = data.dims();
        let shape = PackedSegsShape {
            max_length: dims[0],
            batch_size: dims[1],
            block_size: dims[2],
        };
        enforce!(
            lengths.dims()[0] == shape.batch_size,
            "lengths size {} should be equal to batch size {}",
            lengths.dims()[0],
            shape.batch_size
        );

        let mut output = self.base.output(0)?;
        output.resize(dims);
        dispatch_types!(data.dtype(), "ReversePackedSegs", [f32, f64, i32, i64, bool], T => {
            dispatch_types!(lengths.dtype(), "ReversePackedSegs", [i32, i64], L => {
                self.run_with_types::<T, L>(shape, &data, &lengths, &mut output)
            })
        })?;
        self.base.set_output(0, output)
    }
}

pub fn create_reverse_packed_segs(
    def: &OperatorDef,
    ws: &mut Workspace,
    context: Arc<HipContext>,
) -> OpsResult<Box<dyn Operator>> {
    Ok(Box::new(ReversePackedSegsOp::new(def, ws, context)?))
}
