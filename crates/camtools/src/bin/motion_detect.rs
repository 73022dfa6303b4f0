//! Flag frames of an image sequence that differ from a moving-average
//! background.

use camtools::cli::{self, CliError};
use camtools::detect::save_rgb;
use camtools::motion::{FrameSource, ImageSequence, MotionDetector, MotionError, MotionParams};
use clap::{ArgAction, Parser};
use log::info;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(author, version, about = "Detect motion in an image sequence")]
struct Args {
    /// Directory or glob mask of frames, read in sorted order.
    #[arg(short, long, default_value = "../resources/traffic/*.png")]
    input: String,

    /// Write frames flagged as motion here as `motion_NNNNN.png`.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// JSON file with detector parameter overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn try_main() -> Result<(), CliError> {
    let args = Args::parse();
    cli::init_logging(args.verbose);

    let params: MotionParams = cli::load_json_config(args.config.as_deref())?;
    info!("Input: {}", args.input);
    let mut source = ImageSequence::open(&args.input)?;
    if let Some((w, h)) = source.resolution() {
        info!("Resolution: {w}x{h}");
    }
    if let Some(dir) = &args.out_dir {
        cli::ensure_dir(dir)?;
    }

    let start = Instant::now();
    let mut detector = MotionDetector::new(params);
    let summary = detector.run(&mut source, |report, frame| {
        if report.reset {
            info!(
                "frame {}: camera adjusting ({:.2}% changed), background reset",
                report.index, report.motion_percent
            );
        }
        if !report.motion {
            return Ok(());
        }
        info!("frame {}: motion {:.2}%", report.index, report.motion_percent);
        if let Some(dir) = &args.out_dir {
            let path = dir.join(format!("motion_{:05}.png", report.index));
            save_rgb(&path, frame.clone()).map_err(|err| MotionError::Io {
                path,
                source: std::io::Error::other(err),
            })?;
        }
        Ok(())
    })?;

    let elapsed = start.elapsed().as_secs_f64();
    info!(
        "{} frames, {} with motion, {} background resets",
        summary.frames, summary.frames_with_motion, summary.resets
    );
    if elapsed > 0.0 {
        info!(
            "Elapsed time: {elapsed:.2} seconds, {:.1} FPS",
            summary.frames as f64 / elapsed
        );
    }
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
