//! Packed segment reversal
//!
//! Data is laid out `[max_length, batch_size, block_size]`. For every batch
//! column `b` the first `lengths[b]` segments are reversed and the padding
//! segments after them are copied through unchanged.
//!
//! One block of the grid handles one `(batch, segment)` pair and its threads
//! copy the `block_size` elements of that segment.

use rayon::prelude::*;

use crate::backend::hip_backend::{HipContext, HipError, HipResult, LaunchConfig, HIP_NUM_THREADS};
use crate::tensor::{Element, TypedBuffer};

/// Extents of a packed-segments tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedSegsShape {
    pub max_length: usize,
    pub batch_size: usize,
    pub block_size: usize,
}

impl PackedSegsShape {
    pub fn num_elements(&self) -> usize {
        self.max_length * self.batch_size * self.block_size
    }

    /// One block per `(batch, segment)` pair
    pub fn grid(&self) -> usize {
        self.max_length * self.batch_size
    }
}

/// Segment of the input that lands in `segment` of the output
#[inline]
pub fn source_segment(segment: usize, seg_length: i64) -> i64 {
    if (segment as i64) < seg_length {
        seg_length - 1 - segment as i64
    } else {
        segment as i64
    }
}

/// Queue the reversal of `data` into `out`
///
/// `lengths[b] <= max_length` is a precondition. A length beyond it makes
/// the kernel read outside the data tensor, which faults the stream.
pub fn launch_reverse_packed_segs<T, L>(
    ctx: &HipContext,
    shape: PackedSegsShape,
    lengths: TypedBuffer<L>,
    data: TypedBuffer<T>,
    out: TypedBuffer<T>,
) -> HipResult<()>
where
    T: Element,
    L: Element,
{
    if shape.num_elements() == 0 {
        ctx.note_empty_launch("ReversePackedSegs");
        return Ok(());
    }
    let grid = u32::try_from(shape.grid()).map_err(|_| {
        HipError::KernelLaunchFailed(format!("grid of {} blocks is too large", shape.grid()))
    })?;
    let config = LaunchConfig::linear(grid, HIP_NUM_THREADS);

    ctx.launch("ReversePackedSegs", config, move |_config| {
        let lengths: Vec<i64> = lengths
            .to_vec()?
            .into_iter()
            .map(|l| i64::from_scalar(l.to_scalar()))
            .collect();
        if lengths.len() < shape.batch_size {
            return Err(HipError::MemoryAccessFault(format!(
                "{} lengths for batch of {}",
                lengths.len(),
                shape.batch_size
            )));
        }
        let src = data.to_vec()?;
        let mut guard = out.buffer().write()?;
        let dst = T::slice_mut(&mut guard)
            .ok_or_else(|| HipError::MemoryAccessFault("output type changed".to_string()))?;
        if src.len() < shape.num_elements() || dst.len() < shape.num_elements() {
            return Err(HipError::MemoryAccessFault(
                "packed segments buffer smaller than its shape".to_string(),
            ));
        }

        let block = shape.block_size;
        let batch_size = shape.batch_size;
        dst[..shape.num_elements()]
            .par_chunks_mut(block)
            .enumerate()
            .try_for_each(|(row, dst_block)| {
                let segment = row / batch_size;
                let batch = row % batch_size;
                let src_segment = source_segment(segment, lengths[batch]);
                if src_segment < 0 || src_segment as usize >= shape.max_length {
                    return Err(HipError::MemoryAccessFault(format!(
                        "segment length {} exceeds max_length {} in batch {}",
                        lengths[batch], shape.max_length, batch
                    )));
                }
                let offset = (src_segment as usize * batch_size + batch) * block;
                dst_block.copy_from_slice(&src[offset..offset + block]);
                Ok(())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::tensor::DeviceBuffer;

    #[test]
    fn test_source_segment() {
        assert_eq!(source_segment(0, 2), 1);
        assert_eq!(source_segment(1, 2), 0);
        assert_eq!(source_segment(2, 2), 2);
        assert_eq!(source_segment(0, 0), 0);
    }

    #[test]
    fn test_reverse_two_batches() {
        let ctx = HipContext::new(DeviceConfig::default()).unwrap();
        let shape = PackedSegsShape {
            max_length: 3,
            batch_size: 2,
            block_size: 2,
        };
        // data[seg][batch] = [10 * seg + batch, 10 * seg + batch]
        let data: Vec<i32> = (0..3)
            .flat_map(|s| (0..2).flat_map(move |b| [10 * s + b; 2]))
            .collect();
        let data = DeviceBuffer::from_vec(data);
        let lengths = DeviceBuffer::from_vec(vec![3i64, 1]);
        let out = DeviceBuffer::allocate(crate::tensor::DataType::Int32, 12).unwrap();

        launch_reverse_packed_segs(
            &ctx,
            shape,
            lengths.typed::<i64>().unwrap(),
            data.typed::<i32>().unwrap(),
            out.typed::<i32>().unwrap(),
        )
        .unwrap();
        ctx.synchronize().unwrap();

        let out = out.typed::<i32>().unwrap().to_vec().unwrap();
        // Batch 0 fully reversed, batch 1 has length 1 and is unchanged
        assert_eq!(out, vec![20, 20, 1, 1, 10, 10, 11, 11, 0, 0, 21, 21]);
    }

    #[test]
    fn test_length_beyond_max_faults() {
        let ctx = HipContext::new(DeviceConfig::default()).unwrap();
        let shape = PackedSegsShape {
            max_length: 2,
            batch_size: 1,
            block_size: 1,
        };
        let data = DeviceBuffer::from_vec(vec![1.0f32, 2.0]);
        let lengths = DeviceBuffer::from_vec(vec![5i32]);
        let out = DeviceBuffer::allocate(crate::tensor::DataType::Float, 2).unwrap();

        launch_reverse_packed_segs(
            &ctx,
            shape,
            lengths.typed::<i32>().unwrap(),
            data.typed::<f32>().unwrap(),
            out.typed::<f32>().unwrap(),
        )
        .unwrap();
        assert!(matches!(
            ctx.synchronize(),
            Err(HipError::MemoryAccessFault(_))
        ));
    }
}
