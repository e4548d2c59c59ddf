//! Perceptual brightness: the single RGB-to-gray conversion shared by
//! every grayscale-dependent filter.
//!
//! Uses the standard luminance weights `0.299*R + 0.587*G + 0.114*B`.
//! Grayscale, Sobel and Canny all go through [`luma`] so their rounding
//! can never drift apart.

use image::{GrayImage, Luma};

use crate::types::{CHANNELS, FrameMut};

/// Red, green and blue luminance weights.
pub const LUMA_WEIGHTS: [f64; 3] = [0.299, 0.587, 0.114];

/// Luminance of one RGB sample, rounded to the nearest byte.
///
/// The sum is evaluated left to right with separate multiplies. A fused
/// multiply-add rounds differently and moves exact `.5` ties such as
/// `(0, 114, 163)` to the wrong byte.
#[must_use]
#[allow(clippy::suboptimal_flops)]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    let y = wr * f64::from(r) + wg * f64::from(g) + wb * f64::from(b);
    to_byte(y)
}

/// Round half to even and clamp into `0..=255`.
///
/// This is the one float-to-byte conversion used throughout the crate.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_byte(value: f64) -> u8 {
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Build a fresh grayscale image from an RGBA frame. Alpha is ignored.
#[must_use = "returns the grayscale image"]
pub fn luma_image(frame: &FrameMut<'_>) -> GrayImage {
    let dims = frame.dimensions();
    let data = frame.data();
    GrayImage::from_fn(dims.width, dims.height, |x, y| {
        let i = dims.index(x, y) * CHANNELS;
        Luma([luma(data[i], data[i + 1], data[i + 2])])
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PixelBuffer;

    #[test]
    fn weights_sum_to_one() {
        let sum: f64 = LUMA_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12, "weights sum to {sum}");
    }

    #[test]
    fn gray_input_is_a_fixed_point() {
        for v in 0..=255u8 {
            assert_eq!(luma(v, v, v), v, "luma({v},{v},{v}) moved");
        }
    }

    #[test]
    fn primaries_order_by_weight() {
        let r = luma(255, 0, 0);
        let g = luma(0, 255, 0);
        let b = luma(0, 0, 255);
        assert_eq!((r, g, b), (76, 150, 29));
        assert!(
            g > r && r > b,
            "expected green > red > blue luminance, got R={r} G={g} B={b}",
        );
    }

    #[test]
    fn extremes_stay_in_range() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
    }

    #[test]
    fn ties_round_like_a_byte_store() {
        // 114 * 0.587 + 163 * 0.114 = 85.5, which rounds to even.
        assert_eq!(luma(0, 114, 163), 86);
    }

    #[test]
    fn to_byte_rounds_half_to_even_and_clamps() {
        assert_eq!(to_byte(2.5), 2);
        assert_eq!(to_byte(3.5), 4);
        assert_eq!(to_byte(-4.0), 0);
        assert_eq!(to_byte(300.0), 255);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn luma_image_matches_per_pixel_luma() {
        let mut buffer = PixelBuffer::from_fn(3, 2, |x, y| {
            [(x * 80) as u8, (y * 120) as u8, 33, 0]
        });
        let frame = buffer.frame_mut();
        let gray = luma_image(&frame);
        assert_eq!((gray.width(), gray.height()), (3, 2));
        for y in 0..2 {
            for x in 0..3 {
                let expected = luma((x * 80) as u8, (y * 120) as u8, 33);
                assert_eq!(gray.get_pixel(x, y).0[0], expected, "at ({x},{y})");
            }
        }
    }
}
