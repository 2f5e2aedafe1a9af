//! Cross-channel local response normalization on NCHW data
//!
//! For channel `c` the window covers `[c - pad, c - pad + size)` clipped to
//! the channel range, with `pad = (size - 1) / 2`:
//!
//! ```text
//! scale_c = bias + alpha / size * sum(x_k^2, k in window(c))
//! y_c     = x_c * scale_c^-beta
//! ```
//!
//! Images are independent and are processed in parallel.

use rayon::prelude::*;

use crate::tensor::FloatElement;

/// Normalization parameters shared by forward and backward passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LrnParams {
    pub size: usize,
    pub alpha: f32,
    pub beta: f32,
    pub bias: f32,
}

impl LrnParams {
    fn pre_pad(&self) -> usize {
        (self.size - 1) / 2
    }

    /// Channels `[lo, hi)` normalizing channel `c`
    fn window(&self, c: usize, channels: usize) -> (usize, usize) {
        let lo = c.saturating_sub(self.pre_pad());
        let hi = (c + self.size).saturating_sub(self.pre_pad()).min(channels);
        (lo, hi)
    }

    /// Channels `c'` whose window contains `c`
    fn reverse_window(&self, c: usize, channels: usize) -> (usize, usize) {
        let lo = (c + self.pre_pad() + 1).saturating_sub(self.size);
        let hi = (c + self.pre_pad() + 1).min(channels);
        (lo, hi)
    }
}

/// `scale` for every `(c, hw)` position of one image
fn image_scale<T: FloatElement>(
    params: &LrnParams,
    channels: usize,
    spatial: usize,
    x: &[T],
) -> Vec<f32> {
    let coeff = params.alpha / params.size as f32;
    let mut scale = vec![params.bias; channels * spatial];
    for c in 0..channels {
        let (lo, hi) = params.window(c, channels);
        for k in lo..hi {
            for p in 0..spatial {
                let v = x[k * spatial + p].to_f32();
                scale[c * spatial + p] += coeff * v * v;
            }
        }
    }
    scale
}

/// `[n, c, h, w]` as `(images, channels, spatial)`
fn split_dims(dims: [usize; 4]) -> (usize, usize) {
    (dims[1], dims[2] * dims[3])
}

pub fn lrn_forward<T: FloatElement>(params: &LrnParams, dims: [usize; 4], x: &[T], y: &mut [T]) {
    let (channels, spatial) = split_dims(dims);
    let image = channels * spatial;
    if image == 0 {
        return;
    }
    y.par_chunks_mut(image)
        .zip(x.par_chunks(image))
        .for_each(|(y, x)| {
            let scale = image_scale(params, channels, spatial, x);
            for i in 0..image {
                y[i] = T::from_f32(x[i].to_f32() * scale[i].powf(-params.beta));
            }
        });
}

/// Gradient of [`lrn_forward`] with respect to `x`
///
/// ```text
/// dx_c = dy_c * scale_c^-beta
///      - 2 * alpha * beta / size * x_c * sum(dy_k * y_k / scale_k, c in window(k))
/// ```
pub fn lrn_backward<T: FloatElement>(
    params: &LrnParams,
    dims: [usize; 4],
    x: &[T],
    y: &[T],
    dy: &[T],
    dx: &mut [T],
) {
    let (channels, spatial) = split_dims(dims);
    let image = channels * spatial;
    if image == 0 {
        return;
    }
    let ratio = 2.0 * params.alpha * params.beta / params.size as f32;
    dx.par_chunks_mut(image)
        .zip(x.par_chunks(image))
        .zip(y.par_chunks(image).zip(dy.par_chunks(image)))
        .for_each(|((dx, x), (y, dy))| {
            let scale = image_scale(params, channels, spatial, x);
            for c in 0..channels {
                let (lo, hi) = params.reverse_window(c, channels);
                for p in 0..spatial {
                    let i = c * spatial + p;
                    let accum: f32 = (lo..hi)
                        .map(|k| {
                            let j = k * spatial + p;
                            dy[j].to_f32() * y[j].to_f32() / scale[j]
                        })
                        .sum();
                    let value = dy[i].to_f32() * scale[i].powf(-params.beta)
                        - ratio * x[i].to_f32() * accum;
                    dx[i] = T::from_f32(value);
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: LrnParams = LrnParams {
        size: 3,
        alpha: 0.5,
        beta: 0.75,
        bias: 1.0,
    };

    #[test]
    fn test_windows() {
        assert_eq!(PARAMS.window(0, 4), (0, 2));
        assert_eq!(PARAMS.window(2, 4), (1, 4));
        assert_eq!(PARAMS.window(3, 4), (2, 4));
        assert_eq!(PARAMS.reverse_window(0, 4), (0, 2));
        assert_eq!(PARAMS.reverse_window(3, 4), (2, 4));

        let even = LrnParams { size: 4, ..PARAMS };
        // pad = 1, window(c) = [c - 1, c + 3)
        assert_eq!(even.window(1, 8), (0, 4));
        // c' with c in [c' - 1, c' + 3) => c' in [c - 2, c + 1]
        assert_eq!(even.reverse_window(3, 8), (1, 5));
    }

    #[test]
    fn test_identity_when_alpha_and_beta_zero() {
        let params = LrnParams {
            size: 1,
            alpha: 0.0,
            beta: 0.0,
            bias: 1.0,
        };
        let x = vec![1.0f32, -2.0, 3.0, 4.0];
        let mut y = vec![0.0f32; 4];
        lrn_forward(&params, [1, 2, 1, 2], &x, &mut y);
        assert_eq!(y, x);
    }

    #[test]
    fn test_forward_single_position() {
        let x = vec![1.0f32, 2.0, 3.0];
        let mut y = vec![0.0f32; 3];
        lrn_forward(&PARAMS, [1, 3, 1, 1], &x, &mut y);

        let coeff = PARAMS.alpha / 3.0;
        let scales = [
            1.0 + coeff * (1.0 + 4.0),
            1.0 + coeff * (1.0 + 4.0 + 9.0),
            1.0 + coeff * (4.0 + 9.0),
        ];
        for c in 0..3 {
            let expected = x[c] * f32::powf(scales[c], -PARAMS.beta);
            assert!((y[c] - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let dims = [2, 4, 1, 2];
        let x: Vec<f32> = (0..16).map(|i| (i as f32 * 0.37).sin()).collect();
        let dy: Vec<f32> = (0..16).map(|i| (i as f32 * 0.11).cos()).collect();
        let mut y = vec![0.0f32; 16];
        lrn_forward(&PARAMS, dims, &x, &mut y);
        let mut dx = vec![0.0f32; 16];
        lrn_backward(&PARAMS, dims, &x, &y, &dy, &mut dx);

        let loss = |x: &[f32]| -> f64 {
            let mut y = vec![0.0f32; 16];
            lrn_forward(&PARAMS, dims, x, &mut y);
            y.iter().zip(&dy).map(|(a, b)| (*a as f64) * (*b as f64)).sum()
        };
        let eps = 1e-3f32;
        for i in 0..16 {
            let mut plus = x.clone();
            plus[i] += eps;
            let mut minus = x.clone();
            minus[i] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps as f64);
            assert!(
                (numeric as f32 - dx[i]).abs() < 1e-2,
                "index {}: numeric {} analytic {}",
                i,
                numeric,
                dx[i]
            );
        }
    }
}
