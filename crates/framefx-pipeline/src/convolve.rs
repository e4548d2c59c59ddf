//! 2D convolution of a single-channel image with a small integer kernel.
//!
//! The kernel is centered on each output pixel. What happens where the
//! kernel hangs over the image border is chosen per call with
//! [`Boundary`]:
//!
//! - [`Boundary::Valid`] drops out-of-range taps from the sum, which
//!   attenuates responses along the outer ring (Sobel uses this).
//! - [`Boundary::Clamp`] reads the nearest in-range row/column instead
//!   (the Canny blur uses this).
//!
//! The output is the raw weighted sum. Normalization (dividing by the
//! kernel weight, rounding, clipping) belongs to the caller.
//!
//! Rows are independent, so they are computed in parallel when the
//! `parallel` feature is enabled.

use image::GrayImage;
use tracing::trace;

/// Border policy for taps that fall outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// Skip out-of-range taps entirely.
    Valid,
    /// Clamp out-of-range coordinates to the nearest edge pixel.
    Clamp,
}

impl Boundary {
    /// Resolve `coord + offset` against an axis of length `len`.
    ///
    /// Returns `None` when the tap should be skipped. `len` is non-zero.
    const fn resolve(self, coord: usize, offset: isize, len: usize) -> Option<usize> {
        match self {
            Self::Valid => match coord.checked_add_signed(offset) {
                Some(c) if c < len => Some(c),
                _ => None,
            },
            Self::Clamp => {
                let c = coord.saturating_add_signed(offset);
                Some(if c < len { c } else { len - 1 })
            }
        }
    }
}

/// A square `N x N` integer kernel. `N` must be odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel<const N: usize> {
    weights: [[i32; N]; N],
}

impl<const N: usize> Kernel<N> {
    /// Build a kernel from rows of weights.
    ///
    /// # Panics
    ///
    /// Panics if `N` is even. All kernels in this crate are constants,
    /// so an even size fails at compile time.
    #[must_use]
    pub const fn new(weights: [[i32; N]; N]) -> Self {
        assert!(N % 2 == 1, "kernel size must be odd");
        Self { weights }
    }

    /// Distance from the center tap to the kernel edge.
    #[must_use]
    pub const fn radius(&self) -> usize {
        N / 2
    }

    /// The kernel weights, row by row.
    #[must_use]
    pub const fn weights(&self) -> &[[i32; N]; N] {
        &self.weights
    }

    /// Sum of all weights.
    #[must_use]
    pub fn sum(&self) -> i32 {
        self.weights.iter().flatten().sum()
    }
}

/// Convolve `source` with `kernel` under the given border policy.
///
/// Returns one raw weighted sum per pixel, row-major, the same size as
/// `source`.
#[must_use = "returns the convolution sums"]
pub fn convolve<const N: usize>(
    source: &GrayImage,
    kernel: &Kernel<N>,
    boundary: Boundary,
) -> Vec<i32> {
    let (width, height) = (source.width() as usize, source.height() as usize);
    trace!(width, height, size = N, ?boundary, "convolve");
    let mut out = vec![0i32; width * height];
    if width == 0 || height == 0 {
        return out;
    }
    let src = source.as_raw().as_slice();
    let row_job = |(y, row): (usize, &mut [i32])| {
        convolve_row(src, width, height, y, kernel, boundary, row);
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        out.par_chunks_mut(width).enumerate().for_each(row_job);
    }
    #[cfg(not(feature = "parallel"))]
    {
        out.chunks_mut(width).enumerate().for_each(row_job);
    }
    out
}

fn convolve_row<const N: usize>(
    src: &[u8],
    width: usize,
    height: usize,
    y: usize,
    kernel: &Kernel<N>,
    boundary: Boundary,
    row: &mut [i32],
) {
    let radius = kernel.radius().cast_signed();
    for (x, out) in row.iter_mut().enumerate() {
        let mut sum = 0i32;
        for (ky, weights) in kernel.weights.iter().enumerate() {
            let Some(sy) = boundary.resolve(y, ky.cast_signed() - radius, height) else {
                continue;
            };
            let line = &src[sy * width..(sy + 1) * width];
            for (kx, &weight) in weights.iter().enumerate() {
                if let Some(sx) = boundary.resolve(x, kx.cast_signed() - radius, width) {
                    sum += i32::from(line[sx]) * weight;
                }
            }
        }
        *out = sum;
    }
}
