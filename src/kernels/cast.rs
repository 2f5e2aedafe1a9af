//! Element type conversion kernel

use crate::backend::hip_backend::{HipContext, HipResult};
use crate::tensor::{convert, Element, TypedBuffer};

/// Queue `out[i] = input[i] as D` for the first `n` elements
pub fn launch_cast<S: Element, D: Element>(
    ctx: &HipContext,
    n: usize,
    input: TypedBuffer<S>,
    out: TypedBuffer<D>,
) -> HipResult<()> {
    ctx.launch_map("Cast", n, input, out, convert::<S, D>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::tensor::{DataType, DeviceBuffer};
    use half::f16;

    fn cast<S: Element, D: Element>(values: Vec<S>) -> Vec<D> {
        let ctx = HipContext::new(DeviceConfig::default()).unwrap();
        let n = values.len();
        let input = DeviceBuffer::from_vec(values);
        let out = DeviceBuffer::allocate(D::DTYPE, n).unwrap();
        launch_cast(&ctx, n, input.typed::<S>().unwrap(), out.typed::<D>().unwrap()).unwrap();
        ctx.synchronize().unwrap();
        out.typed::<D>().unwrap().to_vec().unwrap()
    }

    #[test]
    fn test_float_to_int_truncates() {
        assert_eq!(cast::<f32, i32>(vec![1.9, -1.9, 0.0]), vec![1, -1, 0]);
    }

    #[test]
    fn test_bool_conversions() {
        assert_eq!(cast::<f32, bool>(vec![0.0, 0.5, -2.0]), vec![false, true, true]);
        assert_eq!(cast::<bool, i64>(vec![true, false]), vec![1, 0]);
    }

    #[test]
    fn test_half_widening() {
        let out = cast::<f16, f32>(vec![f16::from_f32(0.5), f16::from_f32(-3.0)]);
        assert_eq!(out, vec![0.5, -3.0]);
    }

    #[test]
    fn test_allocate_reports_dtype() {
        let out = DeviceBuffer::allocate(DataType::Int16, 3).unwrap();
        assert_eq!(out.dtype(), DataType::Int16);
    }
}
