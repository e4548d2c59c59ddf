//! framefx-pipeline: per-frame pixel effects for live camera streams (sans-IO).
//!
//! Takes one RGBA frame at a time and rewrites it in place with one of
//! four effects:
//!
//! - grayscale (perceptual luma)
//! - color inversion
//! - Sobel edge magnitude
//! - Canny edges (blur -> gradient -> non-maximum suppression ->
//!   double threshold -> hysteresis)
//!
//! Alpha is never modified. No filter keeps state between frames.
//!
//! This crate has **no I/O dependencies**: camera acquisition, image
//! decoding and display belong to the host. Timing goes through an
//! injected [`diagnostics::Clock`].

pub mod canny;
pub mod convolve;
pub mod diagnostics;
pub mod effect;
pub mod luma;
pub mod point;
pub mod sobel;
pub mod stats;
pub mod types;

pub use diagnostics::{Clock, FrameDiagnostics, WebClock, process_frame};
pub use effect::{Effect, ViewMode, apply_named};
pub use stats::{FrameRateMeter, FrameStats, Resolution, StreamSettings};
pub use types::{Dimensions, FrameMut, PipelineError, PixelBuffer};

/// Apply `effect` to `frame`, or leave it untouched in [`ViewMode::Raw`].
pub fn process(frame: FrameMut<'_>, effect: Effect, view: ViewMode) {
    match view {
        ViewMode::Raw => {}
        ViewMode::Processed => effect.apply(frame),
    }
}

/// Apply the effect named `effect` to a host-owned RGBA buffer in place.
///
/// Validates the buffer shape first, then the selector, and only then
/// touches pixels.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidBufferShape`] if `data.len()` is not
/// `width * height * 4`.
/// Returns [`PipelineError::UnknownEffect`] if `effect` is not one of
/// `grayscale`, `invert`, `edge-detection`, `canny-edge-detection`.
pub fn apply_effect(
    data: &mut [u8],
    width: u32,
    height: u32,
    effect: &str,
) -> Result<Effect, PipelineError> {
    let frame = FrameMut::new(data, width, height)?;
    apply_named(frame, effect)
}
