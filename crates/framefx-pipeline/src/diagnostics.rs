//! Per-frame diagnostics: timing and metrics for each processing stage.
//!
//! [`process_frame`] runs an effect exactly like [`crate::process`] but
//! times every stage with an injected [`Clock`] and records what each
//! stage did. Hosts use the total for the frame's displayed processing
//! time; the bench CLI prints the whole breakdown.
//!
//! Duration measurements use [`std::time::Duration`]. [`WebClock`]
//! captures timestamps through the `web-time` crate, which uses
//! `performance.now()` on WASM and `std::time::Instant` on native.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::canny::{Canny, CannyStage};
use crate::effect::{Effect, ViewMode};
use crate::luma::luma_image;
use crate::point;
use crate::sobel::{MAX_MAGNITUDE, sobel_edge_map};
use crate::stats::FrameStats;
use crate::types::{Dimensions, FrameMut};

/// Serde support for `std::time::Duration` as fractional seconds.
pub(crate) mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
///
/// Injected so the library never reads a clock on its own; tests use a
/// fake clock with scripted durations.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// Current timestamp.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// [`Clock`] backed by [`web_time::Instant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl Clock for WebClock {
    type Instant = web_time::Instant;

    fn now(&self) -> Self::Instant {
        web_time::Instant::now()
    }

    fn elapsed(&self, since: &Self::Instant) -> Duration {
        since.elapsed()
    }
}

/// Diagnostics collected from processing a single frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// The selected effect.
    pub effect: Effect,
    /// The view mode. In [`ViewMode::Raw`] no stages run.
    pub view: ViewMode,
    /// Frame dimensions.
    pub dimensions: Dimensions,
    /// Stages in execution order.
    pub stages: Vec<StageDiagnostics>,
    /// Total wall-clock duration of the call (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Stage name (e.g. `"blur"`).
    pub name: String,
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luma extraction.
    Luma {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// A per-pixel filter (grayscale, invert).
    PointFilter {
        /// Pixels rewritten.
        pixel_count: u64,
    },
    /// Sobel magnitude map.
    SobelMagnitude {
        /// Pixels with a non-zero response.
        nonzero_pixel_count: u64,
        /// Pixels clipped at the maximum magnitude.
        saturated_pixel_count: u64,
    },
    /// Canny Gaussian blur.
    Blur {
        /// Kernel side length.
        kernel_size: usize,
        /// Normalization divisor.
        divisor: i32,
    },
    /// Canny gradient field.
    Gradient {
        /// Largest gradient magnitude.
        max_magnitude: f32,
    },
    /// Canny non-maximum suppression.
    Suppression {
        /// Pixels with a non-zero magnitude after thinning.
        retained_pixel_count: u64,
    },
    /// Canny double threshold.
    Threshold {
        /// Weak threshold.
        low_threshold: f32,
        /// Strong threshold.
        high_threshold: f32,
        /// Strong seed pixels.
        strong_pixel_count: u64,
        /// Weak candidate pixels.
        weak_pixel_count: u64,
    },
    /// Canny hysteresis.
    Hysteresis {
        /// Weak pixels promoted to strong.
        promoted_pixel_count: u64,
        /// Edge pixels in the final map.
        edge_pixel_count: u64,
    },
    /// Writing the result back into the frame.
    Render {
        /// Pixels written.
        pixel_count: u64,
    },
}

impl FrameDiagnostics {
    /// Look up a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageDiagnostics> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Per-frame statistics for display, given the host's current rate.
    #[must_use]
    pub const fn stats(&self, fps: f64) -> FrameStats {
        FrameStats {
            fps,
            resolution: self.dimensions,
            processing_time: self.total_duration,
        }
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Frame Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!("Effect: {} ({} view)", self.effect, self.view));
        lines.push(format!(
            "Frame: {} ({} pixels)",
            self.dimensions,
            self.dimensions.pixel_count(),
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        if self.stages.is_empty() {
            lines.push("No processing stages ran.".to_owned());
            return lines.join("\n");
        }

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for stage in &self.stages {
            let ms = duration_ms(stage.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&stage.metrics);
            lines.push(format!("{:<24} {ms:>8.3}ms {pct:>9.1}%  {details}", stage.name));
        }
        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
pub(crate) fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Luma { width, height } => format!("{width}x{height}"),
        StageMetrics::PointFilter { pixel_count } | StageMetrics::Render { pixel_count } => {
            format!("{pixel_count} px")
        }
        StageMetrics::SobelMagnitude {
            nonzero_pixel_count,
            saturated_pixel_count,
        } => format!("nonzero={nonzero_pixel_count} saturated={saturated_pixel_count}"),
        StageMetrics::Blur {
            kernel_size,
            divisor,
        } => format!("{kernel_size}x{kernel_size} /{divisor}"),
        StageMetrics::Gradient { max_magnitude } => format!("max={max_magnitude:.1}"),
        StageMetrics::Suppression {
            retained_pixel_count,
        } => format!("retained={retained_pixel_count}"),
        StageMetrics::Threshold {
            low_threshold,
            high_threshold,
            strong_pixel_count,
            weak_pixel_count,
        } => format!(
            "low={low_threshold:.1} high={high_threshold:.1} strong={strong_pixel_count} weak={weak_pixel_count}",
        ),
        StageMetrics::Hysteresis {
            promoted_pixel_count,
            edge_pixel_count,
        } => format!("promoted={promoted_pixel_count} edges={edge_pixel_count}"),
    }
}

/// Collects stage timings against a [`Clock`].
struct Recorder<'c, C: Clock> {
    clock: &'c C,
    stages: Vec<StageDiagnostics>,
}

impl<'c, C: Clock> Recorder<'c, C> {
    const fn new(clock: &'c C) -> Self {
        Self {
            clock,
            stages: Vec::new(),
        }
    }

    /// Time `run`, then record its metrics under `name`.
    fn time<T>(
        &mut self,
        name: &str,
        run: impl FnOnce() -> T,
        metrics: impl FnOnce(&T) -> StageMetrics,
    ) -> T {
        let start = self.clock.now();
        let out = run();
        let duration = self.clock.elapsed(&start);
        self.stages.push(StageDiagnostics {
            name: name.to_owned(),
            duration,
            metrics: metrics(&out),
        });
        out
    }

    /// Time one Canny stage transition.
    fn stage<S: CannyStage>(&mut self, advance: impl FnOnce() -> S) -> S {
        self.time(S::NAME, advance, S::metrics)
    }
}

/// Run `effect` on `frame` (or nothing in [`ViewMode::Raw`]) and
/// collect per-stage diagnostics.
///
/// The frame ends up exactly as [`crate::process`] would leave it.
pub fn process_frame<C: Clock>(
    mut frame: FrameMut<'_>,
    effect: Effect,
    view: ViewMode,
    clock: &C,
) -> FrameDiagnostics {
    let dimensions = frame.dimensions();
    let pixel_count = dimensions.pixel_count() as u64;
    let start = clock.now();
    let mut rec = Recorder::new(clock);

    if view == ViewMode::Processed {
        match effect {
            Effect::Grayscale => rec.time(
                "grayscale",
                || point::grayscale(frame.reborrow()),
                |_| StageMetrics::PointFilter { pixel_count },
            ),
            Effect::Invert => rec.time(
                "invert",
                || point::invert(frame.reborrow()),
                |_| StageMetrics::PointFilter { pixel_count },
            ),
            Effect::EdgeDetection => {
                let gray = rec.time(
                    "grayscale",
                    || luma_image(&frame),
                    |g| StageMetrics::Luma {
                        width: g.width(),
                        height: g.height(),
                    },
                );
                let edges = rec.time(
                    "sobel",
                    || sobel_edge_map(&gray),
                    |e| StageMetrics::SobelMagnitude {
                        nonzero_pixel_count: count_pixels(e, |v| v > 0),
                        saturated_pixel_count: count_pixels(e, |v| f32::from(v) >= MAX_MAGNITUDE),
                    },
                );
                rec.time(
                    "render",
                    || frame.write_gray(edges.as_raw()),
                    |_| StageMetrics::Render { pixel_count },
                );
            }
            Effect::CannyEdgeDetection => {
                let gray = rec.stage(|| Canny::new(&frame));
                let blurred = rec.stage(|| gray.blur());
                let differentiated = rec.stage(|| blurred.differentiate());
                let suppressed = rec.stage(|| differentiated.suppress());
                let thresholded = rec.stage(|| suppressed.threshold());
                let linked = rec.stage(|| thresholded.link());
                rec.time(
                    "render",
                    || frame.write_gray(linked.render().as_raw()),
                    |_| StageMetrics::Render { pixel_count },
                );
            }
        }
    }

    let total_duration = clock.elapsed(&start);
    debug!(
        %effect,
        %view,
        %dimensions,
        total_ms = duration_ms(total_duration),
        "frame processed",
    );
    FrameDiagnostics {
        effect,
        view,
        dimensions,
        stages: rec.stages,
        total_duration,
    }
}

/// Count pixels of a grayscale image whose value satisfies `pred`.
fn count_pixels(image: &image::GrayImage, pred: impl Fn(u8) -> bool) -> u64 {
    image.pixels().filter(|p| pred(p.0[0])).count() as u64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::types::PixelBuffer;

    /// Clock that advances by 1 ms every time it is read.
    #[derive(Default)]
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn sample() -> PixelBuffer {
        PixelBuffer::from_fn(16, 16, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                [20, 40, 60, 255]
            } else {
                [220, 200, 180, 255]
            }
        })
    }

    fn stage_names(diag: &FrameDiagnostics) -> Vec<&str> {
        diag.stages.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        let ms = duration_ms(d);
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn raw_view_runs_nothing() {
        let original = sample();
        let mut buffer = original.clone();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::CannyEdgeDetection,
            ViewMode::Raw,
            &StepClock::default(),
        );
        assert!(diag.stages.is_empty());
        assert_eq!(buffer, original);
        assert!(diag.report().contains("No processing stages ran."));
    }

    #[test]
    fn diagnostics_leave_same_pixels_as_plain_apply() {
        for effect in Effect::ALL {
            let mut timed = sample();
            process_frame(
                timed.frame_mut(),
                effect,
                ViewMode::Processed,
                &StepClock::default(),
            );
            let mut plain = sample();
            effect.apply(plain.frame_mut());
            assert_eq!(timed, plain, "{effect} diverged under diagnostics");
        }
    }

    #[test]
    fn canny_stages_recorded_in_order() {
        let mut buffer = sample();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::CannyEdgeDetection,
            ViewMode::Processed,
            &StepClock::default(),
        );
        assert_eq!(
            stage_names(&diag),
            [
                "grayscale",
                "blur",
                "gradient",
                "suppression",
                "threshold",
                "hysteresis",
                "render"
            ],
        );
    }

    #[test]
    fn sobel_stages_recorded_in_order() {
        let mut buffer = sample();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::EdgeDetection,
            ViewMode::Processed,
            &StepClock::default(),
        );
        assert_eq!(stage_names(&diag), ["grayscale", "sobel", "render"]);
        let Some(StageMetrics::SobelMagnitude {
            nonzero_pixel_count,
            ..
        }) = diag.stage("sobel").map(|s| &s.metrics)
        else {
            unreachable!("sobel stage missing");
        };
        assert!(*nonzero_pixel_count > 0);
    }

    #[test]
    fn stage_durations_come_from_clock() {
        let mut buffer = sample();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::Invert,
            ViewMode::Processed,
            &StepClock::default(),
        );
        // Each stage reads the clock twice; the total spans every read.
        assert_eq!(diag.stages[0].duration, Duration::from_millis(1));
        assert_eq!(diag.total_duration, Duration::from_millis(3));
        assert_eq!(
            diag.stage("invert").unwrap().metrics,
            StageMetrics::PointFilter { pixel_count: 256 }
        );
    }

    #[test]
    fn stats_carry_dimensions_and_total() {
        let mut buffer = sample();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::Grayscale,
            ViewMode::Processed,
            &StepClock::default(),
        );
        let stats = diag.stats(12.5);
        assert_eq!(stats.resolution, Dimensions::new(16, 16));
        assert_eq!(stats.processing_time, diag.total_duration);
        assert!((stats.fps - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn report_lists_every_stage() {
        let mut buffer = sample();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::CannyEdgeDetection,
            ViewMode::Processed,
            &StepClock::default(),
        );
        let report = diag.report();
        assert!(report.contains("Frame Diagnostics Report"));
        assert!(report.contains("canny-edge-detection (processed view)"));
        assert!(report.contains("16x16 (256 pixels)"));
        for stage in &diag.stages {
            assert!(report.contains(&stage.name), "report missing {}", stage.name);
        }
        assert!(report.contains("low=20.0 high=50.0"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let mut buffer = sample();
        let diag = process_frame(
            buffer.frame_mut(),
            Effect::Invert,
            ViewMode::Processed,
            &StepClock::default(),
        );
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["effect"], "invert");
        assert_eq!(json["view"], "processed");
        assert_eq!(json["total_duration"], 0.003);
        let back: FrameDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.stages.len(), 1);
        assert!((back.total_duration.as_secs_f64() - 0.003).abs() < 1e-9);
    }

    #[test]
    fn web_clock_is_monotonic() {
        let clock = WebClock;
        let start = clock.now();
        let first = clock.elapsed(&start);
        let second = clock.elapsed(&start);
        assert!(second >= first, "{second:?} < {first:?}");
        assert!(second < Duration::from_secs(60));
    }
}
