//! Effect selection and dispatch.
//!
//! [`Effect`] is the closed set of filters a host can ask for. Hosts
//! that speak strings (a settings form, a worker message) go through
//! [`apply_named`], which rejects an unknown selector before any pixel
//! is touched.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::{FrameMut, PipelineError};
use crate::{canny, point, sobel};

/// One of the four per-frame filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Effect {
    /// Luma grayscale ([`point::grayscale`]).
    Grayscale,
    /// Color inversion ([`point::invert`]).
    Invert,
    /// Sobel gradient magnitude ([`sobel::sobel`]).
    #[default]
    EdgeDetection,
    /// Binary Canny edges ([`canny::canny`]).
    CannyEdgeDetection,
}

impl Effect {
    /// Every effect, in menu order.
    pub const ALL: [Self; 4] = [
        Self::Grayscale,
        Self::Invert,
        Self::EdgeDetection,
        Self::CannyEdgeDetection,
    ];

    /// Wire name of the effect (e.g. `"canny-edge-detection"`).
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Invert => "invert",
            Self::EdgeDetection => "edge-detection",
            Self::CannyEdgeDetection => "canny-edge-detection",
        }
    }

    /// Run the effect on `frame` in place.
    pub fn apply(self, frame: FrameMut<'_>) {
        match self {
            Self::Grayscale => point::grayscale(frame),
            Self::Invert => point::invert(frame),
            Self::EdgeDetection => sobel::sobel(frame),
            Self::CannyEdgeDetection => canny::canny(frame),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Effect {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|effect| effect.name() == s)
            .ok_or_else(|| PipelineError::UnknownEffect(s.to_owned()))
    }
}

/// Whether the host shows the camera frame as captured or after the
/// selected effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Show the frame unmodified.
    Raw,
    /// Show the frame after the selected effect.
    #[default]
    Processed,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Processed => "processed",
        })
    }
}

/// Parse `name` as an [`Effect`] and apply it to `frame`.
///
/// # Errors
///
/// Returns [`PipelineError::UnknownEffect`] if `name` is not one of the
/// wire names. The frame is left unmodified in that case.
pub fn apply_named(frame: FrameMut<'_>, name: &str) -> Result<Effect, PipelineError> {
    let effect: Effect = name.parse()?;
    effect.apply(frame);
    Ok(effect)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::PixelBuffer;

    fn sample() -> PixelBuffer {
        PixelBuffer::from_fn(8, 8, |x, y| {
            if x < 4 {
                [10, 20, 30, 200]
            } else if y < 4 {
                [240, 120, 60, 200]
            } else {
                [90, 90, 90, 200]
            }
        })
    }

    #[test]
    fn names_roundtrip_through_from_str() {
        for effect in Effect::ALL {
            assert_eq!(effect.name().parse::<Effect>().unwrap(), effect);
            assert_eq!(effect.to_string(), effect.name());
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "sepia".parse::<Effect>(),
            Err(PipelineError::UnknownEffect("sepia".to_owned())),
        );
        // Names are case-sensitive wire identifiers.
        assert!("Grayscale".parse::<Effect>().is_err());
    }

    #[test]
    fn serde_uses_wire_names() {
        assert_eq!(
            serde_json::to_string(&Effect::CannyEdgeDetection).unwrap(),
            "\"canny-edge-detection\""
        );
        assert_eq!(
            serde_json::from_str::<Effect>("\"edge-detection\"").unwrap(),
            Effect::EdgeDetection
        );
        assert_eq!(serde_json::to_string(&ViewMode::Raw).unwrap(), "\"raw\"");
        assert_eq!(
            serde_json::from_str::<ViewMode>("\"processed\"").unwrap(),
            ViewMode::Processed
        );
    }

    #[test]
    fn defaults() {
        assert_eq!(Effect::default(), Effect::EdgeDetection);
        assert_eq!(ViewMode::default(), ViewMode::Processed);
    }

    #[test]
    fn apply_matches_direct_filter_call() {
        let cases: [(Effect, fn(FrameMut<'_>)); 4] = [
            (Effect::Grayscale, point::grayscale),
            (Effect::Invert, point::invert),
            (Effect::EdgeDetection, sobel::sobel),
            (Effect::CannyEdgeDetection, canny::canny),
        ];
        for (effect, filter) in cases {
            let mut via_effect = sample();
            effect.apply(via_effect.frame_mut());
            let mut direct = sample();
            filter(direct.frame_mut());
            assert_eq!(via_effect, direct, "{effect} diverged");
        }
    }

    #[test]
    fn apply_named_dispatches() {
        let mut buffer = sample();
        let effect = apply_named(buffer.frame_mut(), "invert").unwrap();
        assert_eq!(effect, Effect::Invert);
        assert_eq!(buffer.pixel(0, 0), [245, 235, 225, 200]);
    }

    #[test]
    fn apply_named_unknown_leaves_buffer_untouched() {
        let original = sample();
        let mut buffer = original.clone();
        let err = apply_named(buffer.frame_mut(), "unknown").unwrap_err();
        assert_eq!(err, PipelineError::UnknownEffect("unknown".to_owned()));
        assert_eq!(buffer, original);
    }
}
