//! Per-channel resampling kernels.
//!
//! Four interpolation policies are provided. `Nearest`, `Linear` and `Area`
//! follow standard resampling semantics. `Additive` is not a smoothing
//! filter: upsampling zero-pads around the original samples and downsampling
//! sums every source pixel that maps into a destination cell, which makes
//! the down/up pair an exact discrete transpose. The solver relies on that
//! transpose property for gradient back-projection; `Area` exists to model
//! realistic sensor aliasing and must never be used where a true adjoint is
//! required.

use ndarray::{Array2, ArrayView2};

use crate::error::{Result, SuperResError};
use crate::float_trait::SrFloat;

/// Interpolation policy for [`crate::image::ImageData::resize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    /// Pixel repetition/selection. Integer upscale by k replicates each
    /// source pixel into a k-by-k destination block.
    Nearest,
    /// Bilinear sampling with edge clamping.
    Linear,
    /// Box average over the source footprint of each destination cell.
    /// Models optical/sensor downsampling; forward-direction only.
    Area,
    /// Zero-pad upsampling / block-sum downsampling. The exact transpose
    /// pair used by the solver.
    Additive,
}

/// Resize target: an explicit size or a uniform scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeTarget {
    /// Explicit destination geometry (rows, cols).
    Size { rows: usize, cols: usize },
    /// Uniform scale factor applied to both dimensions.
    Scale(f64),
}

impl ResizeTarget {
    /// Resolve the target to explicit dimensions for a source geometry.
    pub fn resolve(&self, src_rows: usize, src_cols: usize) -> Result<(usize, usize)> {
        let (rows, cols) = match *self {
            ResizeTarget::Size { rows, cols } => (rows, cols),
            ResizeTarget::Scale(factor) => {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(SuperResError::InvalidResizeTarget { rows: 0, cols: 0 });
                }
                (
                    (src_rows as f64 * factor).round() as usize,
                    (src_cols as f64 * factor).round() as usize,
                )
            }
        };
        if rows == 0 || cols == 0 {
            return Err(SuperResError::InvalidResizeTarget { rows, cols });
        }
        Ok((rows, cols))
    }
}

/// Resample a single channel plane to `(dst_rows, dst_cols)`.
pub fn resize_channel<F: SrFloat>(
    src: ArrayView2<F>,
    dst_rows: usize,
    dst_cols: usize,
    mode: InterpolationMode,
) -> Array2<F> {
    let (src_rows, src_cols) = src.dim();
    if dst_rows == src_rows && dst_cols == src_cols {
        return src.to_owned();
    }
    match mode {
        InterpolationMode::Nearest => resize_nearest(src, dst_rows, dst_cols),
        InterpolationMode::Linear => resize_linear(src, dst_rows, dst_cols),
        InterpolationMode::Area => resize_area(src, dst_rows, dst_cols),
        InterpolationMode::Additive => {
            if dst_rows >= src_rows && dst_cols >= src_cols {
                resize_additive_up(src, dst_rows, dst_cols)
            } else {
                resize_additive_down(src, dst_rows, dst_cols)
            }
        }
    }
}

/// Nearest-neighbor selection: dst(r, c) = src(floor(r*sr/dr), floor(c*sc/dc)).
fn resize_nearest<F: SrFloat>(src: ArrayView2<F>, dst_rows: usize, dst_cols: usize) -> Array2<F> {
    let (src_rows, src_cols) = src.dim();
    Array2::from_shape_fn((dst_rows, dst_cols), |(r, c)| {
        let sr = (r * src_rows / dst_rows).min(src_rows - 1);
        let sc = (c * src_cols / dst_cols).min(src_cols - 1);
        src[[sr, sc]]
    })
}

/// Bilinear sampling at pixel-center-aligned coordinates, edge clamped.
fn resize_linear<F: SrFloat>(src: ArrayView2<F>, dst_rows: usize, dst_cols: usize) -> Array2<F> {
    let (src_rows, src_cols) = src.dim();
    let row_scale = src_rows as f64 / dst_rows as f64;
    let col_scale = src_cols as f64 / dst_cols as f64;

    Array2::from_shape_fn((dst_rows, dst_cols), |(r, c)| {
        // Pixel-center alignment: sample at (i + 0.5) * scale - 0.5.
        let sy = ((r as f64 + 0.5) * row_scale - 0.5).max(0.0);
        let sx = ((c as f64 + 0.5) * col_scale - 0.5).max(0.0);

        let y0 = (sy.floor() as usize).min(src_rows - 1);
        let x0 = (sx.floor() as usize).min(src_cols - 1);
        let y1 = (y0 + 1).min(src_rows - 1);
        let x1 = (x0 + 1).min(src_cols - 1);
        let fy = sy - y0 as f64;
        let fx = sx - x0 as f64;

        let v00 = src[[y0, x0]].to_f64().unwrap_or(0.0);
        let v01 = src[[y0, x1]].to_f64().unwrap_or(0.0);
        let v10 = src[[y1, x0]].to_f64().unwrap_or(0.0);
        let v11 = src[[y1, x1]].to_f64().unwrap_or(0.0);

        let top = v00 * (1.0 - fx) + v01 * fx;
        let bottom = v10 * (1.0 - fx) + v11 * fx;
        F::from_f64_c(top * (1.0 - fy) + bottom * fy)
    })
}

/// Area average: each destination cell takes the coverage-weighted mean of
/// the source pixels its footprint overlaps. Exact for integer downscale
/// (plain k-by-k block mean) and well defined for fractional factors.
fn resize_area<F: SrFloat>(src: ArrayView2<F>, dst_rows: usize, dst_cols: usize) -> Array2<F> {
    let (src_rows, src_cols) = src.dim();
    let row_scale = src_rows as f64 / dst_rows as f64;
    let col_scale = src_cols as f64 / dst_cols as f64;

    Array2::from_shape_fn((dst_rows, dst_cols), |(r, c)| {
        let y_start = r as f64 * row_scale;
        let y_end = (r as f64 + 1.0) * row_scale;
        let x_start = c as f64 * col_scale;
        let x_end = (c as f64 + 1.0) * col_scale;

        let y_first = y_start.floor() as usize;
        let y_last = (y_end.ceil() as usize).min(src_rows);
        let x_first = x_start.floor() as usize;
        let x_last = (x_end.ceil() as usize).min(src_cols);

        let mut accum = 0.0;
        let mut weight_sum = 0.0;
        for sy in y_first..y_last {
            let wy = overlap(sy as f64, sy as f64 + 1.0, y_start, y_end);
            if wy <= 0.0 {
                continue;
            }
            for sx in x_first..x_last {
                let wx = overlap(sx as f64, sx as f64 + 1.0, x_start, x_end);
                if wx <= 0.0 {
                    continue;
                }
                let w = wy * wx;
                accum += src[[sy, sx]].to_f64().unwrap_or(0.0) * w;
                weight_sum += w;
            }
        }
        if weight_sum > 0.0 {
            F::from_f64_c(accum / weight_sum)
        } else {
            F::zero()
        }
    })
}

#[inline]
fn overlap(a_start: f64, a_end: f64, b_start: f64, b_end: f64) -> f64 {
    (a_end.min(b_end) - a_start.max(b_start)).max(0.0)
}

/// Additive upsample: place each source sample at integer stride, zeros
/// elsewhere. dst(r*k, c*k) = src(r, c) with k = dst/src per dimension.
fn resize_additive_up<F: SrFloat>(
    src: ArrayView2<F>,
    dst_rows: usize,
    dst_cols: usize,
) -> Array2<F> {
    let (src_rows, src_cols) = src.dim();
    let stride_r = (dst_rows / src_rows).max(1);
    let stride_c = (dst_cols / src_cols).max(1);

    let mut dst = Array2::zeros((dst_rows, dst_cols));
    for r in 0..src_rows {
        let dr = r * stride_r;
        if dr >= dst_rows {
            break;
        }
        for c in 0..src_cols {
            let dc = c * stride_c;
            if dc >= dst_cols {
                break;
            }
            dst[[dr, dc]] = src[[r, c]];
        }
    }
    dst
}

/// Additive downsample: every source pixel is summed into the destination
/// cell it maps to. The exact transpose of nearest-neighbor upsampling, and
/// the inverse image of the zero-pad upsample above.
fn resize_additive_down<F: SrFloat>(
    src: ArrayView2<F>,
    dst_rows: usize,
    dst_cols: usize,
) -> Array2<F> {
    let (src_rows, src_cols) = src.dim();
    let mut dst = Array2::zeros((dst_rows, dst_cols));
    for r in 0..src_rows {
        let dr = (r * dst_rows / src_rows).min(dst_rows - 1);
        for c in 0..src_cols {
            let dc = (c * dst_cols / src_cols).min(dst_cols - 1);
            dst[[dr, dc]] += src[[r, c]];
        }
    }
    dst
}
