//! Normalization library interface and its host implementation

use std::fmt::Debug;

use half::f16;

use crate::backend::hip_backend::HipContext;
use crate::backend::miopen::{LrnDescriptor, MiopenError, MiopenResult, TensorDescriptor};
use crate::kernels::{lrn_backward, lrn_forward, LrnParams};
use crate::tensor::{DataType, DeviceBuffer, FloatElement};

/// Entry points a descriptor-based LRN operator calls
///
/// Forward and backward only queue work on the context stream; results are
/// visible after the context synchronizes.
pub trait LrnLibrary: Send + Sync + Debug {
    /// Describe a dense NCHW tensor
    fn set_tensor_4d_descriptor(
        &self,
        dtype: DataType,
        dims: [usize; 4],
    ) -> MiopenResult<TensorDescriptor>;

    fn create_lrn_descriptor(&self, params: LrnParams) -> MiopenResult<LrnDescriptor>;

    /// `y = lrn(x)`
    fn lrn_cross_channel_forward(
        &self,
        ctx: &HipContext,
        lrn: &LrnDescriptor,
        desc: &TensorDescriptor,
        x: &DeviceBuffer,
        y: &DeviceBuffer,
    ) -> MiopenResult<()>;

    /// `dx` from the forward input `x`, its output `y` and `dy`
    #[allow(clippy::too_many_arguments)]
    fn lrn_cross_channel_backward(
        &self,
        ctx: &HipContext,
        lrn: &LrnDescriptor,
        desc: &TensorDescriptor,
        y: &DeviceBuffer,
        dy: &DeviceBuffer,
        x: &DeviceBuffer,
        dx: &DeviceBuffer,
    ) -> MiopenResult<()>;
}

/// Library implementation running the LRN kernels on the emulated device
#[derive(Debug, Default, Clone, Copy)]
pub struct HostMiopen;

impl HostMiopen {
    pub fn new() -> Self {
        HostMiopen
    }
}

fn check_buffer(name: &str, buffer: &DeviceBuffer, desc: &TensorDescriptor) -> MiopenResult<()> {
    if buffer.dtype() != desc.dtype {
        return Err(MiopenError::BadParam(format!(
            "{} is {}, descriptor says {}",
            name,
            buffer.dtype(),
            desc.dtype
        )));
    }
    if buffer.len() < desc.num_elements() {
        return Err(MiopenError::BadParam(format!(
            "{} holds {} elements, descriptor needs {}",
            name,
            buffer.len(),
            desc.num_elements()
        )));
    }
    Ok(())
}

fn queue_forward<T: FloatElement>(
    ctx: &HipContext,
    params: LrnParams,
    desc: &TensorDescriptor,
    x: &DeviceBuffer,
    y: &DeviceBuffer,
) -> MiopenResult<()> {
    let n = desc.num_elements();
    let dims = desc.dims();
    let (x, y) = (x.typed::<T>()?, y.typed::<T>()?);
    ctx.launch("LRNCrossChannelForward", ctx.launch_config(n), move |_config| {
        let x = x.to_vec()?;
        y.with_slice_mut(|y| lrn_forward(&params, dims, &x[..n], &mut y[..n]))
    })?;
    Ok(())
}

fn queue_backward<T: FloatElement>(
    ctx: &HipContext,
    params: LrnParams,
    desc: &TensorDescriptor,
    buffers: [&DeviceBuffer; 4],
) -> MiopenResult<()> {
    let n = desc.num_elements();
    let dims = desc.dims();
    let [y, dy, x, dx] = buffers;
    let (y, dy, x, dx) = (y.typed::<T>()?, dy.typed::<T>()?, x.typed::<T>()?, dx.typed::<T>()?);
    ctx.launch("LRNCrossChannelBackward", ctx.launch_config(n), move |_config| {
        let (x, y, dy) = (x.to_vec()?, y.to_vec()?, dy.to_vec()?);
        dx.with_slice_mut(|dx| lrn_backward(&params, dims, &x[..n], &y[..n], &dy[..n], &mut dx[..n]))
    })?;
    Ok(())
}

impl LrnLibrary for HostMiopen {
    fn set_tensor_4d_descriptor(
        &self,
        dtype: DataType,
        dims: [usize; 4],
    ) -> MiopenResult<TensorDescriptor> {
        if !matches!(dtype, DataType::Float | DataType::Float16) {
            return Err(MiopenError::UnsupportedType(dtype.to_string()));
        }
        let [n, c, h, w] = dims;
        Ok(TensorDescriptor { dtype, n, c, h, w })
    }

    fn create_lrn_descriptor(&self, params: LrnParams) -> MiopenResult<LrnDescriptor> {
        LrnDescriptor::new(params)
    }

    fn lrn_cross_channel_forward(
        &self,
        ctx: &HipContext,
        lrn: &LrnDescriptor,
        desc: &TensorDescriptor,
        x: &DeviceBuffer,
        y: &DeviceBuffer,
    ) -> MiopenResult<()> {
        check_buffer("x", x, desc)?;
        check_buffer("y", y, desc)?;
        if desc.num_elements() == 0 {
            ctx.note_empty_launch("LRNCrossChannelForward");
            return Ok(());
        }
        match desc.dtype {
            DataType::Float => queue_forward::<f32>(ctx, lrn.params, desc, x, y),
            DataType::Float16 => queue_forward::<f16>(ctx, lrn.params, desc, x, y),
            other => Err(MiopenError::UnsupportedType(other.to_string())),
        }
    }

    fn lrn_cross_channel_backward(
        &self,
        ctx: &HipContext,
        lrn: &LrnDescriptor,
        desc: &TensorDescriptor,
        y: &DeviceBuffer,
        dy: &DeviceBuffer,
        x: &DeviceBuffer,
        dx: &DeviceBuffer,
    ) -> MiopenResult<()> {
        for (name, buffer) in [("y", y), ("dy", dy), ("x", x), ("dx", dx)] {
            check_buffer(name, buffer, desc)?;
        }
        if desc.num_elements() == 0 {
            ctx.note_empty_launch("LRNCrossChannelBackward");
            return Ok(());
        }
        let buffers = [y, dy, x, dx];
        match desc.dtype {
            DataType::Float => queue_backward::<f32>(ctx, lrn.params, desc, buffers),
            DataType::Float16 => queue_backward::<f16>(ctx, lrn.params, desc, buffers),
            other => Err(MiopenError::UnsupportedType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    const PARAMS: LrnParams = LrnParams {
        size: 3,
        alpha: 1e-2,
        beta: 0.75,
        bias: 2.0,
    };

    #[test]
    fn test_forward_queues_on_stream() {
        let ctx = HipContext::new(DeviceConfig::default()).unwrap();
        let lib = HostMiopen::new();
        let desc = lib.set_tensor_4d_descriptor(DataType::Float, [1, 2, 1, 2]).unwrap();
        let lrn = lib.create_lrn_descriptor(PARAMS).unwrap();
        let x = DeviceBuffer::from_vec(vec![1.0f32, 2.0, 3.0, 4.0]);
        let y = DeviceBuffer::allocate(DataType::Float, 4).unwrap();

        lib.lrn_cross_channel_forward(&ctx, &lrn, &desc, &x, &y).unwrap();
        ctx.synchronize().unwrap();

        let mut expected = vec![0.0f32; 4];
        lrn_forward(&PARAMS, [1, 2, 1, 2], &[1.0f32, 2.0, 3.0, 4.0], &mut expected);
        assert_eq!(y.typed::<f32>().unwrap().to_vec().unwrap(), expected);
        assert_eq!(ctx.stats().kernels_launched, 1);
    }

    #[test]
    fn test_rejects_mismatched_buffers() {
        let ctx = HipContext::new(DeviceConfig::default()).unwrap();
        let lib = HostMiopen::new();
        let desc = lib.set_tensor_4d_descriptor(DataType::Float, [1, 2, 2, 2]).unwrap();
        let lrn = lib.create_lrn_descriptor(PARAMS).unwrap();
        let short = DeviceBuffer::allocate(DataType::Float, 4).unwrap();
        let wrong_type = DeviceBuffer::allocate(DataType::Float16, 8).unwrap();
        let y = DeviceBuffer::allocate(DataType::Float, 8).unwrap();

        assert!(matches!(
            lib.lrn_cross_channel_forward(&ctx, &lrn, &desc, &short, &y),
            Err(MiopenError::BadParam(_))
        ));
        assert!(matches!(
            lib.lrn_cross_channel_forward(&ctx, &lrn, &desc, &wrong_type, &y),
            Err(MiopenError::BadParam(_))
        ));
        assert_eq!(ctx.stats().kernels_launched, 0);
    }

    #[test]
    fn test_descriptor_rejects_integer_types() {
        let lib = HostMiopen::new();
        assert!(matches!(
            lib.set_tensor_4d_descriptor(DataType::Int32, [1, 1, 1, 1]),
            Err(MiopenError::UnsupportedType(_))
        ));
    }
}
