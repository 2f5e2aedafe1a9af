//! Per-element math functions
//!
//! Each function is the body of one grid-stride kernel. Reduced precision
//! inputs are widened to `f32`, computed, and narrowed back.

use crate::tensor::FloatElement;

/// `x * x`
#[inline]
pub fn sqr<T: FloatElement>(x: T) -> T {
    let v = x.to_f32();
    T::from_f32(v * v)
}

/// `-1` for negative, `+1` for positive, `0` otherwise (including NaN)
#[inline]
pub fn sign<T: FloatElement>(x: T) -> T {
    let v = x.to_f32();
    let s = -((v < 0.0) as i32 as f32) + (v > 0.0) as i32 as f32;
    T::from_f32(s)
}

/// `x ^ exponent`
#[inline]
pub fn pow<T: FloatElement>(x: T, exponent: f32) -> T {
    T::from_f32(x.to_f32().powf(exponent))
}

/// `ln(e^x + 1)`
#[inline]
pub fn softplus<T: FloatElement>(x: T) -> T {
    T::from_f32((x.to_f32().exp() + 1.0).ln())
}

/// `dY * (1 - e^-Y)` where `Y = softplus(X)`
#[inline]
pub fn softplus_gradient<T: FloatElement>(y: T, dy: T) -> T {
    let nexp_y = (-y.to_f32()).exp();
    T::from_f32(dy.to_f32() * (1.0 - nexp_y))
}

/// Cosine embedding criterion for one pair
///
/// Similar pairs (`y == 1`) are penalized by `1 - s`, dissimilar ones by the
/// amount their similarity exceeds `margin`.
#[inline]
pub fn cosine_embedding_loss(s: f32, y: i32, margin: f32) -> f32 {
    if y == 1 {
        1.0 - s
    } else {
        (s - margin).max(0.0)
    }
}

#[inline]
pub fn cosine_embedding_gradient(s: f32, y: i32, d_output: f32, margin: f32) -> f32 {
    let local = if y == 1 {
        -1.0
    } else {
        (s >= margin) as i32 as f32
    };
    d_output * local
}
