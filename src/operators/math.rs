//! `Sqr`, `Sign` and `Pow`

use crate::error::OpsResult;
use crate::kernels::math;
use crate::ops::{OperatorDef, UnaryFunctor};
use crate::tensor::FloatElement;

#[derive(Debug, Clone, Copy)]
pub struct SqrFunctor;

impl UnaryFunctor for SqrFunctor {
    const OP_TYPE: &'static str = "Sqr";

    fn from_def(_def: &OperatorDef) -> OpsResult<Self> {
        Ok(SqrFunctor)
    }

    #[inline]
    fn call<T: FloatElement>(&self, x: T) -> T {
        math::sqr(x)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SignFunctor;

impl UnaryFunctor for SignFunctor {
    const OP_TYPE: &'static str = "Sign";

    fn from_def(_def: &OperatorDef) -> OpsResult<Self> {
        Ok(SignFunctor)
    }

    #[inline]
    fn call<T: FloatElement>(&self, x: T) -> T {
        math::sign(x)
    }
}

/// `y = x ^ exponent`, `exponent` is required
#[derive(Debug, Clone, Copy)]
pub struct PowFunctor {
    exponent: f32,
}

impl UnaryFunctor for PowFunctor {
    const OP_TYPE: &'static str = "Pow";

    fn from_def(def: &OperatorDef) -> OpsResult<Self> {
        Ok(PowFunctor {
            exponent: def.get_required_argument("exponent")?,
        })
    }

    #[inline]
    fn call<T: FloatElement>(&self, x: T) -> T {
        math::pow(x, self.exponent)
    }
}
