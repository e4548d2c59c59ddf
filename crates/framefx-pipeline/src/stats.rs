//! Per-frame statistics and stream settings a host displays alongside
//! the processed image.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Dimensions;

/// Capture resolution, written `"WxH"` (e.g. `"1280x720"`).
pub type Resolution = Dimensions;

/// Capture settings requested from the frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSettings {
    /// Requested frame size.
    #[serde(with = "resolution_serde")]
    pub resolution: Resolution,
    /// Requested frames per second.
    pub frame_rate: u32,
}

impl StreamSettings {
    /// Resolutions offered to the user, largest first.
    pub const RESOLUTION_PRESETS: [Resolution; 4] = [
        Dimensions::new(1920, 1080),
        Dimensions::new(1280, 720),
        Dimensions::new(640, 480),
        Dimensions::new(320, 240),
    ];

    /// Frame rates offered to the user, fastest first.
    pub const FRAME_RATE_PRESETS: [u32; 3] = [30, 24, 15];

    /// Target time between frames, or `None` for a zero frame rate.
    #[must_use]
    pub fn frame_interval(&self) -> Option<Duration> {
        (self.frame_rate > 0).then(|| Duration::from_secs(1) / self.frame_rate)
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            resolution: Dimensions::new(1280, 720),
            frame_rate: 15,
        }
    }
}

/// Serde support for [`Resolution`] as its `"WxH"` string.
mod resolution_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::Resolution;

    pub fn serialize<S: Serializer>(
        resolution: &Resolution,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(resolution)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Resolution, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Serde support for a `Duration` as fractional milliseconds, the unit
/// hosts display frame processing time in.
mod millis_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_secs_f64() * 1000.0).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(ms / 1000.0).map_err(|_| {
            serde::de::Error::custom(
                "milliseconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Statistics reported with each displayed frame.
///
/// Serializes as `{"fps", "resolution", "processingTime"}` with the
/// resolution as `"WxH"` and the processing time in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    /// Frames per second over the most recent complete window.
    pub fps: f64,
    /// Size of the frame that was processed. For frames that did not
    /// come from a configured stream (an uploaded still, say) this is
    /// the frame's own size rather than a preset.
    #[serde(with = "resolution_serde")]
    pub resolution: Resolution,
    /// Wall time spent processing this frame (milliseconds on the wire).
    #[serde(with = "millis_serde")]
    pub processing_time: Duration,
}

impl FrameStats {
    /// Processing time rounded to whole milliseconds, for display.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn processing_time_ms(&self) -> u64 {
        (self.processing_time.as_secs_f64() * 1000.0).round() as u64
    }
}

/// Windowed frame-rate counter.
///
/// Frames are counted until at least [`FrameRateMeter::WINDOW`] has
/// passed since the window started. The rate over that window becomes
/// the reported fps and a new window begins. Until the first window
/// closes the reported rate is `0`.
///
/// Timestamps are supplied by the caller (any monotonic clock, as an
/// offset from a fixed origin), so the meter itself does no I/O.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRateMeter {
    window_start: Duration,
    frames: u32,
    fps: f64,
}

impl FrameRateMeter {
    /// Minimum window length.
    pub const WINDOW: Duration = Duration::from_secs(1);

    /// A meter whose first window starts at `now`.
    #[must_use]
    pub const fn starting_at(now: Duration) -> Self {
        Self {
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Record one frame at `now` and return the current rate.
    ///
    /// A timestamp earlier than the window start counts as zero elapsed
    /// time.
    pub fn tick(&mut self, now: Duration) -> f64 {
        self.frames += 1;
        let elapsed = now.saturating_sub(self.window_start);
        if elapsed >= Self::WINDOW {
            let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
            self.fps = f64::from(self.frames) * 1000.0 / elapsed_ms;
            debug!(frames = self.frames, elapsed_ms, fps = self.fps, "frame rate window closed");
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    /// Start a fresh window at `now` and forget the last rate.
    pub const fn reset(&mut self, now: Duration) {
        *self = Self::starting_at(now);
    }

    /// The most recently computed rate.
    #[must_use]
    pub const fn fps(&self) -> f64 {
        self.fps
    }
}

impl Default for FrameRateMeter {
    fn default() -> Self {
        Self::starting_at(Duration::ZERO)
    }
}
