//! Per-pixel filters: grayscale and color inversion.
//!
//! Both rewrite R, G and B of each pixel from that pixel alone, so they
//! run over pixels in parallel when the `parallel` feature is enabled.

use tracing::trace;

use crate::luma::luma;
use crate::types::FrameMut;

/// Replace R, G and B with the pixel's [`luma`]. Alpha is untouched.
///
/// Idempotent: once R, G and B are equal their luma is the same value.
pub fn grayscale(mut frame: FrameMut<'_>) {
    let dims = frame.dimensions();
    trace!(width = dims.width, height = dims.height, "grayscale");
    frame.for_each_rgb(|rgb| {
        let y = luma(rgb[0], rgb[1], rgb[2]);
        rgb.fill(y);
    });
}

/// Replace each of R, G and B with `255 - value`. Alpha is untouched.
///
/// Involutory: applying it twice restores the original frame exactly.
pub fn invert(mut frame: FrameMut<'_>) {
    let dims = frame.dimensions();
    trace!(width = dims.width, height = dims.height, "invert");
    frame.for_each_rgb(|rgb| {
        for c in rgb {
            *c = !*c;
        }
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PixelBuffer;

    #[allow(clippy::cast_possible_truncation)]
    fn gradient_buffer() -> PixelBuffer {
        PixelBuffer::from_fn(16, 9, |x, y| {
            [
                ((x * 17) % 256) as u8,
                ((y * 29) % 256) as u8,
                (((x + y) * 13) % 256) as u8,
                ((x * y) % 256) as u8,
            ]
        })
    }

    #[test]
    fn grayscale_equalizes_channels() {
        let mut buffer = gradient_buffer();
        grayscale(buffer.frame_mut());
        for px in buffer.data().chunks_exact(4) {
            assert_eq!(px[0], px[1]);
            assert_eq!(px[1], px[2]);
        }
    }

    #[test]
    fn grayscale_is_idempotent() {
        let mut once = gradient_buffer();
        grayscale(once.frame_mut());
        let mut twice = once.clone();
        grayscale(twice.frame_mut());
        assert_eq!(once, twice);
    }

    #[test]
    fn grayscale_preserves_alpha() {
        let original = gradient_buffer();
        let mut buffer = original.clone();
        grayscale(buffer.frame_mut());
        for (before, after) in original.data().chunks_exact(4).zip(buffer.data().chunks_exact(4)) {
            assert_eq!(before[3], after[3]);
        }
    }

    #[test]
    fn grayscale_uses_luma() {
        let mut buffer = PixelBuffer::from_pixel(1, 1, [255, 0, 0, 255]);
        grayscale(buffer.frame_mut());
        assert_eq!(buffer.pixel(0, 0), [76, 76, 76, 255]);
    }

    #[test]
    fn invert_flips_rgb_only() {
        let mut buffer = PixelBuffer::from_pixel(2, 2, [0, 100, 255, 42]);
        invert(buffer.frame_mut());
        assert_eq!(buffer.pixel(1, 1), [255, 155, 0, 42]);
    }

    #[test]
    fn double_invert_is_identity() {
        let original = gradient_buffer();
        let mut buffer = original.clone();
        invert(buffer.frame_mut());
        assert_ne!(buffer, original);
        invert(buffer.frame_mut());
        assert_eq!(buffer, original);
    }

    #[test]
    fn zero_area_frame_is_a_no_op() {
        let mut buffer = PixelBuffer::new(0, 0, Vec::new()).unwrap();
        grayscale(buffer.frame_mut());
        invert(buffer.frame_mut());
        assert!(buffer.data().is_empty());
    }
}
