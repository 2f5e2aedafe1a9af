//! Runtime type dispatch
//!
//! Operators are written once, generic over the element type, and
//! instantiated for a fixed list of types. [`dispatch_types!`] picks the
//! instantiation matching a runtime [`DataType`](crate::tensor::DataType)
//! and fails with `UnsupportedDType` for anything outside the list.
//!
//! ```ignore
//! dispatch_types!(x.dtype(), "Sqr", [f32], T => {
//!     launch_sqr::<T>(ctx, &x, &mut y)
//! })
//! ```
//!
//! The body must evaluate to an `OpsResult`. Dispatches nest, so a cast can
//! resolve its destination type and then its source type.

/// Bind `$T` to the listed type matching `$dtype` and evaluate `$body`
#[macro_export]
macro_rules! dispatch_types {
    ($dtype:expr, $op:expr, [$($ty:ty),+ $(,)?], $T:ident => $body:block) => {{
        let dtype: $crate::tensor::DataType = $dtype;
        'dispatch: {
            $(
                if dtype == <$ty as $crate::tensor::Element>::DTYPE {
                    #[allow(dead_code)]
                    type $T = $ty;
                    break 'dispatch $body;
                }
            )+
            Err($crate::error::OpsError::unsupported_dtype(dtype, $op))
        }
    }};
}
