//! Sobel edge detection: a grayscale map of gradient magnitude.
//!
//! The frame is reduced to [`luma`](crate::luma), convolved with
//! [`SOBEL_X`] and [`SOBEL_Y`] under [`Boundary::Valid`], and each pixel
//! becomes `min(255, sqrt(gx^2 + gy^2))`. Taps falling outside the
//! frame are dropped, so the outer ring reports weaker edges than the
//! same step would inside the frame.

use image::{GrayImage, Luma};
use tracing::trace;

use crate::convolve::{Boundary, Kernel, convolve};
use crate::luma::{luma_image, to_byte};
use crate::types::FrameMut;

/// Horizontal gradient kernel.
pub const SOBEL_X: Kernel<3> = Kernel::new([[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]]);

/// Vertical gradient kernel.
pub const SOBEL_Y: Kernel<3> = Kernel::new([[-1, -2, -1], [0, 0, 0], [1, 2, 1]]);

/// Largest value the edge map can hold.
pub const MAX_MAGNITUDE: f32 = 255.0;

/// Horizontal and vertical gradient sums for every pixel.
#[must_use = "returns the (gx, gy) gradient sums"]
pub fn gradients(gray: &GrayImage, boundary: Boundary) -> (Vec<i32>, Vec<i32>) {
    (
        convolve(gray, &SOBEL_X, boundary),
        convolve(gray, &SOBEL_Y, boundary),
    )
}

/// Euclidean length of a gradient vector.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn magnitude(gx: i32, gy: i32) -> f32 {
    (gx as f32).hypot(gy as f32)
}

/// Compute the Sobel edge map of a grayscale image.
///
/// Each output pixel is the gradient magnitude clipped to
/// [`MAX_MAGNITUDE`] and rounded to a byte.
#[must_use = "returns the edge map"]
pub fn sobel_edge_map(gray: &GrayImage) -> GrayImage {
    let (gx, gy) = gradients(gray, Boundary::Valid);
    let width = gray.width() as usize;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let i = y as usize * width + x as usize;
        let m = magnitude(gx[i], gy[i]).min(MAX_MAGNITUDE);
        Luma([to_byte(f64::from(m))])
    })
}

/// Replace R, G and B with the Sobel edge strength. Alpha is untouched.
pub fn sobel(mut frame: FrameMut<'_>) {
    let dims = frame.dimensions();
    trace!(width = dims.width, height = dims.height, "sobel");
    let gray = luma_image(&frame);
    let edges = sobel_edge_map(&gray);
    frame.write_gray(edges.as_raw());
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PixelBuffer;

    /// 3x3 frame, black except a white bottom row.
    fn bottom_row_frame() -> PixelBuffer {
        PixelBuffer::from_fn(3, 3, |_, y| {
            if y == 2 {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            }
        })
    }

    #[test]
    fn center_of_bottom_step_saturates() {
        let mut buffer = bottom_row_frame();
        let gray = luma_image(&buffer.frame_mut());
        let (gx, gy) = gradients(&gray, Boundary::Valid);
        // Only the bottom row contributes: 255 * (1 + 2 + 1).
        assert_eq!(gx[4], 0);
        assert_eq!(gy[4], 1020);

        sobel(buffer.frame_mut());
        assert_eq!(buffer.pixel(1, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn uniform_frame_has_no_interior_edges() {
        let mut buffer = PixelBuffer::from_pixel(8, 6, [90, 140, 200, 255]);
        sobel(buffer.frame_mut());
        for y in 1..5 {
            for x in 1..7 {
                assert_eq!(buffer.pixel(x, y)[..3], [0, 0, 0], "at ({x},{y})");
            }
        }
    }

    #[test]
    fn uniform_frame_lights_up_border_under_valid_policy() {
        // Dropped taps unbalance the kernel on the outer ring, so a flat
        // non-black frame still shows a border response.
        let mut buffer = PixelBuffer::from_pixel(5, 5, [100, 100, 100, 255]);
        sobel(buffer.frame_mut());
        assert_eq!(buffer.pixel(0, 2)[0], 255);
        assert_eq!(buffer.pixel(2, 2)[0], 0);
    }

    #[test]
    #[allow(clippy::cast_possible_truncation)]
    fn sobel_preserves_alpha() {
        let mut buffer = PixelBuffer::from_fn(4, 4, |x, y| {
            let v = if x < 2 { 0 } else { 255 };
            [v, v, v, (x * 4 + y) as u8]
        });
        sobel(buffer.frame_mut());
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(u32::from(buffer.pixel(x, y)[3]), x * 4 + y);
            }
        }
    }

    #[test]
    fn vertical_step_is_detected() {
        let mut buffer = PixelBuffer::from_fn(6, 6, |x, _| {
            if x < 3 {
                [0, 0, 0, 255]
            } else {
                [40, 40, 40, 255]
            }
        });
        sobel(buffer.frame_mut());
        // |gx| = 40 * 4 = 160 on both sides of the step.
        assert_eq!(buffer.pixel(2, 3)[0], 160);
        assert_eq!(buffer.pixel(3, 3)[0], 160);
        assert_eq!(buffer.pixel(1, 3)[0], 0);
    }

    #[test]
    fn magnitude_is_euclidean() {
        assert!((magnitude(3, 4) - 5.0).abs() < f32::EPSILON);
        assert!(magnitude(0, 0).abs() < f32::EPSILON);
    }

    #[test]
    fn edge_map_rounds_fractional_magnitude() {
        // sqrt(1^2 + 1^2) * 10 = 14.14...
        let gray = GrayImage::from_fn(3, 3, |x, y| Luma([if x == 2 && y == 2 { 10 } else { 0 }]));
        let edges = sobel_edge_map(&gray);
        assert_eq!(edges.get_pixel(1, 1).0[0], 14);
    }
}
