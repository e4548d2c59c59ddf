//! Shared types for the framefx pixel pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can reference
/// single-channel intermediates without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so hosts can hand decoded images to the
/// pipeline without depending on `image` directly.
pub use image::RgbaImage;

/// Samples per pixel in an interleaved RGBA buffer.
pub const CHANNELS: usize = 4;

/// Image dimensions in pixels.
///
/// Displays and parses as `WIDTHxHEIGHT` (e.g. `1280x720`), the same
/// form hosts use for stream resolution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of pixels (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns `true` if either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Row-major pixel index of `(x, y)`.
    #[must_use]
    pub const fn index(self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Exact RGBA byte length for these dimensions, or `None` if it
    /// does not fit in `usize`.
    #[must_use]
    pub fn rgba_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|pixels| pixels.checked_mul(CHANNELS))
    }

    /// Validate that `len` bytes is exactly one RGBA frame of these
    /// dimensions.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBufferShape`] on any mismatch.
    pub fn check_rgba_len(self, len: usize) -> Result<(), PipelineError> {
        if self.rgba_len() == Some(len) {
            Ok(())
        } else {
            Err(PipelineError::InvalidBufferShape {
                width: self.width,
                height: self.height,
                expected: u64::from(self.width)
                    .saturating_mul(u64::from(self.height))
                    .saturating_mul(CHANNELS as u64),
                actual: len,
            })
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PipelineError::InvalidResolution(s.to_owned());
        let (width, height) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width = width.trim().parse().map_err(|_| invalid())?;
        let height = height.trim().parse().map_err(|_| invalid())?;
        Ok(Self { width, height })
    }
}

/// An owned RGBA frame: `width * height` pixels, 8 bits per channel,
/// interleaved `R, G, B, A`, row-major, no padding.
///
/// The byte length always equals `4 * width * height`; the only way to
/// build one from raw bytes is [`PixelBuffer::new`], which rejects any
/// other length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    image: RgbaImage,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBufferShape`] if `data.len()` is
    /// not exactly `4 * width * height`.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        let dimensions = Dimensions::new(width, height);
        dimensions.check_rgba_len(data.len())?;
        let actual = data.len();
        RgbaImage::from_raw(width, height, data)
            .map(|image| Self { image })
            .ok_or(PipelineError::InvalidBufferShape {
                width,
                height,
                expected: actual as u64,
                actual,
            })
    }

    /// A buffer where every pixel is `rgba`.
    #[must_use]
    pub fn from_pixel(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, image::Rgba(rgba)),
        }
    }

    /// A buffer where pixel `(x, y)` is `f(x, y)`.
    #[must_use]
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        Self {
            image: RgbaImage::from_fn(width, height, |x, y| image::Rgba(f(x, y))),
        }
    }

    /// Frame dimensions.
    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.image.width(), self.image.height())
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// The interleaved RGBA bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// The RGBA sample at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    /// Borrow the buffer as a mutable frame for the filters.
    pub fn frame_mut(&mut self) -> FrameMut<'_> {
        let dimensions = self.dimensions();
        FrameMut {
            data: &mut *self.image,
            dimensions,
        }
    }

    /// Borrow the underlying image.
    #[must_use]
    pub const fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the buffer, returning the underlying image.
    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Consume the buffer, returning the raw RGBA bytes.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.image.into_raw()
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(image: RgbaImage) -> Self {
        Self { image }
    }
}

/// Exclusive borrow of one RGBA frame, shape-checked at construction.
///
/// This is what every filter takes. Hosts that own their pixel memory
/// (e.g. a canvas `ImageData` copy) build one with [`FrameMut::new`];
/// owners of a [`PixelBuffer`] use [`PixelBuffer::frame_mut`].
///
/// Filters only ever write the R, G and B samples of each pixel; alpha
/// passes through untouched.
#[derive(Debug)]
pub struct FrameMut<'a> {
    data: &'a mut [u8],
    dimensions: Dimensions,
}

impl<'a> FrameMut<'a> {
    /// Borrow `data` as a `width x height` RGBA frame.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidBufferShape`] if `data.len()` is
    /// not exactly `4 * width * height`. Nothing is written in that case.
    pub fn new(data: &'a mut [u8], width: u32, height: u32) -> Result<Self, PipelineError> {
        let dimensions = Dimensions::new(width, height);
        dimensions.check_rgba_len(data.len())?;
        Ok(Self { data, dimensions })
    }

    /// Frame dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The interleaved RGBA bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data
    }

    /// Reborrow for a shorter lifetime, so a frame can be passed to
    /// more than one filter in sequence.
    pub fn reborrow(&mut self) -> FrameMut<'_> {
        FrameMut {
            data: &mut *self.data,
            dimensions: self.dimensions,
        }
    }

    /// Apply `f` to the `[R, G, B]` samples of every pixel.
    pub(crate) fn for_each_rgb<F>(&mut self, f: F)
    where
        F: Fn(&mut [u8]) + Sync + Send,
    {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.data
                .par_chunks_exact_mut(CHANNELS)
                .for_each(|pixel| f(&mut pixel[..3]));
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.data
                .chunks_exact_mut(CHANNELS)
                .for_each(|pixel| f(&mut pixel[..3]));
        }
    }

    /// Replace R, G and B of every pixel with the matching single-channel
    /// value. `values` must hold one byte per pixel.
    pub(crate) fn write_gray(&mut self, values: &[u8]) {
        debug_assert_eq!(values.len(), self.dimensions.pixel_count());
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            self.data
                .par_chunks_exact_mut(CHANNELS)
                .zip(values.par_iter())
                .for_each(|(pixel, &v)| pixel[..3].fill(v));
        }
        #[cfg(not(feature = "parallel"))]
        {
            self.data
                .chunks_exact_mut(CHANNELS)
                .zip(values)
                .for_each(|(pixel, &v)| pixel[..3].fill(v));
        }
    }
}

/// Errors that can occur at the pipeline boundary.
///
/// Every error is raised before any pixel is written, so a failed call
/// leaves the caller's buffer exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The byte length does not match the declared width and height.
    #[error(
        "buffer of {actual} bytes does not match a {width}x{height} RGBA frame ({expected} bytes)"
    )]
    InvalidBufferShape {
        /// Declared width in pixels.
        width: u32,
        /// Declared height in pixels.
        height: u32,
        /// Required byte length (`4 * width * height`, saturating).
        expected: u64,
        /// Byte length actually supplied.
        actual: usize,
    },

    /// The effect selector is outside the fixed vocabulary.
    #[error("unknown effect: {0:?}")]
    UnknownEffect(String),

    /// A resolution string is not of the form `WIDTHxHEIGHT`.
    #[error("invalid resolution {0:?}: expected WIDTHxHEIGHT")]
    InvalidResolution(String),
}
