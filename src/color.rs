//! RGB / YCrCb conversion for three-channel images.
//!
//! Uses the float-range ITU-R BT.601 coefficients with a 0.5 chroma offset.
//! The inverse solves the forward relations exactly, so an RGB -> YCrCb ->
//! RGB round trip is exact to floating-point precision (well under the
//! 1/255 pixel tolerance the rest of the pipeline assumes).

use ndarray::Array2;

use crate::float_trait::SrFloat;

/// Channel-interleaved color representation of a three-channel image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    /// Red, green, blue planes in that channel order.
    #[default]
    Rgb,
    /// Luma plane first, then the two chroma planes (Cr, Cb).
    YCrCb,
}

const KR: f64 = 0.299;
const KG: f64 = 0.587;
const KB: f64 = 0.114;
const CR_SCALE: f64 = 0.713;
const CB_SCALE: f64 = 0.564;
const CHROMA_OFFSET: f64 = 0.5;

/// Convert three RGB planes to YCrCb planes.
pub(crate) fn rgb_to_ycrcb<F: SrFloat>(channels: &[Array2<F>]) -> Vec<Array2<F>> {
    debug_assert_eq!(channels.len(), 3);
    let dim = channels[0].dim();
    let mut y = Array2::zeros(dim);
    let mut cr = Array2::zeros(dim);
    let mut cb = Array2::zeros(dim);

    for ((((yv, crv), cbv), rv), (gv, bv)) in y
        .iter_mut()
        .zip(cr.iter_mut())
        .zip(cb.iter_mut())
        .zip(channels[0].iter())
        .zip(channels[1].iter().zip(channels[2].iter()))
    {
        let r = rv.to_f64().unwrap_or(0.0);
        let g = gv.to_f64().unwrap_or(0.0);
        let b = bv.to_f64().unwrap_or(0.0);
        let luma = KR * r + KG * g + KB * b;
        *yv = F::from_f64_c(luma);
        *crv = F::from_f64_c((r - luma) * CR_SCALE + CHROMA_OFFSET);
        *cbv = F::from_f64_c((b - luma) * CB_SCALE + CHROMA_OFFSET);
    }

    vec![y, cr, cb]
}

/// Convert three YCrCb planes back to RGB planes.
pub(crate) fn ycrcb_to_rgb<F: SrFloat>(channels: &[Array2<F>]) -> Vec<Array2<F>> {
    debug_assert_eq!(channels.len(), 3);
    let dim = channels[0].dim();
    let mut r = Array2::zeros(dim);
    let mut g = Array2::zeros(dim);
    let mut b = Array2::zeros(dim);

    for ((((rv, gv), bv), yv), (crv, cbv)) in r
        .iter_mut()
        .zip(g.iter_mut())
        .zip(b.iter_mut())
        .zip(channels[0].iter())
        .zip(channels[1].iter().zip(channels[2].iter()))
    {
        let luma = yv.to_f64().unwrap_or(0.0);
        let cr = crv.to_f64().unwrap_or(0.0);
        let cb = cbv.to_f64().unwrap_or(0.0);
        // Exact inverse of the forward relations.
        let red = luma + (cr - CHROMA_OFFSET) / CR_SCALE;
        let blue = luma + (cb - CHROMA_OFFSET) / CB_SCALE;
        let green = (luma - KR * red - KB * blue) / KG;
        *rv = F::from_f64_c(red);
        *gv = F::from_f64_c(green);
        *bv = F::from_f64_c(blue);
    }

    vec![r, g, b]
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // Matches the 1/255 tolerance used for 8-bit pixel data.
    const PIXEL_TOL: f64 = 1.0 / 255.0;

    fn test_rgb_channels() -> Vec<Array2<f64>> {
        vec![
            array![[0.0, 0.05], [0.25, 0.1]],
            array![[0.2, 0.3], [0.75, 0.65]],
            array![[0.1, 0.2], [0.55, 0.75]],
        ]
    }

    #[test]
    fn test_luma_is_weighted_sum() {
        let rgb = test_rgb_channels();
        let ycrcb = rgb_to_ycrcb(&rgb);
        let expected = 0.299 * 0.0 + 0.587 * 0.2 + 0.114 * 0.1;
        assert!((ycrcb[0][[0, 0]] - expected).abs() < 1e-12);
    }

    #[test]
    fn test_round_trip_within_pixel_tolerance() {
        let rgb = test_rgb_channels();
        let back = ycrcb_to_rgb(&rgb_to_ycrcb(&rgb));
        for (orig, rec) in rgb.iter().zip(back.iter()) {
            for (a, b) in orig.iter().zip(rec.iter()) {
                assert!((a - b).abs() < PIXEL_TOL);
            }
        }
    }

    #[test]
    fn test_gray_pixel_has_neutral_chroma() {
        let gray = vec![
            Array2::from_elem((2, 2), 0.5),
            Array2::from_elem((2, 2), 0.5),
            Array2::from_elem((2, 2), 0.5),
        ];
        let ycrcb = rgb_to_ycrcb(&gray);
        for v in ycrcb[1].iter().chain(ycrcb[2].iter()) {
            assert!((v - 0.5f64).abs() < 1e-12);
        }
        for v in ycrcb[0].iter() {
            assert!((v - 0.5f64).abs() < 1e-12);
        }
    }
}
