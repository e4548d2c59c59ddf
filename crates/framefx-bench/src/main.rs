//! framefx-bench: CLI tool for running frame effects on image files.
//!
//! Decodes an image, treats it as a camera frame, runs one effect on it
//! (optionally many times) and prints per-stage diagnostics. Useful for:
//!
//! - Measuring per-stage durations to find bottlenecks
//! - Checking how an effect behaves at each capture resolution
//! - Producing reference output images
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin framefx-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=framefx_pipeline=debug` (or pass `--verbose`) to see
//! the pipeline's own log output on stderr.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use framefx_pipeline::diagnostics::{Clock, FrameDiagnostics, WebClock};
use framefx_pipeline::{Effect, FrameRateMeter, PixelBuffer, Resolution, StreamSettings, ViewMode};
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Run framefx effects on an image and report diagnostics.
///
/// The image is decoded, optionally resized to a capture resolution,
/// and processed as a single RGBA camera frame.
#[derive(Parser)]
#[command(name = "framefx-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Effect to apply.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_EFFECT)]
    effect: EffectArg,

    /// Show the raw frame or the processed frame.
    #[arg(long, value_enum, default_value_t = View::Processed)]
    view: View,

    /// Resize the input to this capture resolution first (e.g. 1280x720).
    #[arg(long)]
    resolution: Option<Resolution>,

    /// Target frame rate, reported next to the achieved rate.
    #[arg(long, default_value_t = DEFAULT_FRAME_RATE)]
    frame_rate: u32,

    /// Write the processed frame to this PNG file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full bench config as a JSON string.
    ///
    /// When provided, `--effect`, `--view`, `--resolution` and
    /// `--frame-rate` are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Log pipeline debug output to stderr (overridden by `RUST_LOG`).
    #[arg(short, long)]
    verbose: bool,
}

/// Effect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EffectArg {
    /// Luma grayscale.
    Grayscale,
    /// Color inversion.
    Invert,
    /// Sobel edge magnitude.
    EdgeDetection,
    /// Binary Canny edges.
    CannyEdgeDetection,
}

/// View mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    /// Leave the frame untouched.
    Raw,
    /// Apply the effect.
    Processed,
}

/// Maps an [`Effect`] to the local CLI [`EffectArg`] enum.
const fn effect_arg_from_pipeline(effect: Effect) -> EffectArg {
    match effect {
        Effect::Grayscale => EffectArg::Grayscale,
        Effect::Invert => EffectArg::Invert,
        Effect::EdgeDetection => EffectArg::EdgeDetection,
        Effect::CannyEdgeDetection => EffectArg::CannyEdgeDetection,
    }
}

/// The CLI default effect. Must match [`Effect::default`].
const CLI_DEFAULT_EFFECT: EffectArg = effect_arg_from_pipeline(Effect::EdgeDetection);

/// Default target frame rate.
const DEFAULT_FRAME_RATE: u32 = 15;

/// Everything that decides what one bench run does to the frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct BenchConfig {
    effect: Effect,
    view: ViewMode,
    /// Capture settings; `None` keeps the image at its native size.
    settings: Option<StreamSettings>,
    /// Target frame rate, independent of any resize. Falls back to
    /// `settings.frameRate`, then [`DEFAULT_FRAME_RATE`].
    frame_rate: Option<u32>,
}

impl BenchConfig {
    fn frame_rate(&self) -> u32 {
        self.frame_rate
            .or_else(|| self.settings.map(|s| s.frame_rate))
            .unwrap_or(DEFAULT_FRAME_RATE)
    }
}

/// Build a [`BenchConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<BenchConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(BenchConfig {
        effect: match cli.effect {
            EffectArg::Grayscale => Effect::Grayscale,
            EffectArg::Invert => Effect::Invert,
            EffectArg::EdgeDetection => Effect::EdgeDetection,
            EffectArg::CannyEdgeDetection => Effect::CannyEdgeDetection,
        },
        view: match cli.view {
            View::Raw => ViewMode::Raw,
            View::Processed => ViewMode::Processed,
        },
        settings: cli.resolution.map(|resolution| StreamSettings {
            resolution,
            frame_rate: cli.frame_rate,
        }),
        frame_rate: Some(cli.frame_rate),
    })
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Decode `path` into an RGBA frame, resized to `settings` if given.
fn load_frame(
    path: &std::path::Path,
    settings: Option<StreamSettings>,
) -> Result<PixelBuffer, String> {
    let decoded =
        image::open(path).map_err(|e| format!("Error decoding {}: {e}", path.display()))?;
    let mut rgba = decoded.to_rgba8();
    if let Some(StreamSettings { resolution, .. }) = settings
        && (rgba.width(), rgba.height()) != (resolution.width, resolution.height)
    {
        debug!(
            width = rgba.width(),
            height = rgba.height(),
            to = %resolution,
            "resizing input",
        );
        rgba = image::imageops::resize(
            &rgba,
            resolution.width,
            resolution.height,
            FilterType::Triangle,
        );
    }
    Ok(PixelBuffer::from(rgba))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let source = match load_frame(&cli.image_path, config.settings) {
        Ok(frame) => frame,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({})",
        cli.image_path.display(),
        source.dimensions(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let clock = WebClock;
    let origin = clock.now();
    let mut meter = FrameRateMeter::starting_at(Duration::ZERO);
    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mut frame = source.clone();
        let diagnostics =
            framefx_pipeline::process_frame(frame.frame_mut(), config.effect, config.view, &clock);
        let stats = diagnostics.stats(meter.tick(clock.elapsed(&origin)));
        info!(
            run,
            fps = stats.fps,
            processing_ms = stats.processing_time_ms(),
            "frame done",
        );

        if cli.json {
            match serde_json::to_string_pretty(&diagnostics) {
                Ok(json) => println!("{json}"),
                Err(e) => {
                    eprintln!("Error serializing diagnostics: {e}");
                    return ExitCode::FAILURE;
                }
            }
        } else {
            println!("{}", diagnostics.report());
        }

        // Write the output image on the first run only.
        if run == 0
            && let Some(ref output) = cli.output
        {
            match frame.into_image().save_with_format(output, image::ImageFormat::Png) {
                Ok(()) => eprintln!("PNG written to {}", output.display()),
                Err(e) => {
                    eprintln!("Error writing PNG to {}: {e}", output.display());
                }
            }
        }

        all_diagnostics.push(diagnostics);

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics, config.frame_rate());
    }

    ExitCode::SUCCESS
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[FrameDiagnostics], target_fps: u32) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");
    if mean > 0.0 {
        let budget_ms = 1000.0 / f64::from(target_fps.max(1));
        println!(
            "Sustainable rate: {:.1} fps (target {target_fps} fps, budget {budget_ms:.1}ms)",
            1000.0 / mean,
        );
    }

    // Per-stage means, in first-run order.
    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for stage in &all_diagnostics[0].stages {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(|d| d.stage(&stage.name))
            .map(|s| s.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{:<24} {stage_mean:>10.3}ms", stage.name);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("framefx-bench").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_pipeline_defaults() {
        let cli = parse(&["frame.png"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.effect, Effect::default());
        assert_eq!(config.view, ViewMode::default());
        assert_eq!(config.settings, None);
        assert_eq!(cli.runs, 1);
        assert_eq!(cli.frame_rate, StreamSettings::default().frame_rate);
    }

    #[test]
    fn flags_map_to_config() {
        let cli = parse(&[
            "frame.png",
            "--effect",
            "canny-edge-detection",
            "--view",
            "raw",
            "--resolution",
            "640x480",
            "--frame-rate",
            "30",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.effect, Effect::CannyEdgeDetection);
        assert_eq!(config.view, ViewMode::Raw);
        assert_eq!(
            config.settings,
            Some(StreamSettings {
                resolution: Resolution::new(640, 480),
                frame_rate: 30,
            })
        );
        assert_eq!(config.frame_rate(), 30);
    }

    #[test]
    fn frame_rate_applies_without_resolution() {
        let cli = parse(&["frame.png", "--frame-rate", "30"]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.settings, None);
        assert_eq!(config.frame_rate(), 30);
    }

    #[test]
    fn value_enum_names_match_wire_names() {
        for effect in Effect::ALL {
            let arg = effect_arg_from_pipeline(effect);
            let name = arg.to_possible_value().unwrap();
            assert_eq!(name.get_name(), effect.name());
        }
    }

    #[test]
    fn bad_resolution_is_rejected() {
        let result =
            Cli::try_parse_from(["framefx-bench", "frame.png", "--resolution", "huge"]);
        assert!(result.is_err());
    }

    #[test]
    fn zero_runs_is_rejected() {
        let result = Cli::try_parse_from(["framefx-bench", "frame.png", "--runs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "frame.png",
            "--effect",
            "invert",
            "--config-json",
            r#"{"effect":"grayscale","settings":{"resolution":"320x240","frameRate":24}}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.effect, Effect::Grayscale);
        assert_eq!(config.view, ViewMode::Processed);
        assert_eq!(config.frame_rate(), 24);
    }

    #[test]
    fn malformed_config_json_is_an_error() {
        let cli = parse(&["frame.png", "--config-json", r#"{"effect":"sepia"}"#]);
        let err = config_from_cli(&cli).unwrap_err();
        assert!(err.starts_with("Error parsing --config-json"), "{err}");
    }
}
