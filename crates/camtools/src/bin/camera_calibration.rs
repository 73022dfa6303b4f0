//! Calibrate a camera from chessboard images matched by a file mask.
//!
//! Every image with a complete pattern gets a `<name>_output.bmp` with the
//! corners drawn in; the solved model is written to `calibration.json`, and
//! every input is undistorted into `<name>_undistort_output.bmp`.

use camtools::calib::{
    board_object_points, calibrate_camera, crop, optimal_new_camera_matrix, reprojection_error,
    undistort_image, CalibrationFile, CalibrationOptions, PlanarView,
};
use camtools::chessboard::{draw_chessboard_corners, ChessboardConfig, ChessboardFinder};
use camtools::cli::{self, CliError};
use camtools::core::RgbImage;
use camtools::detect::{gray_view, load_gray, save_gray, save_rgb};
use clap::{ArgAction, Parser};
use log::{debug, error, info, warn};
use nalgebra::Point2;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Parser)]
#[command(author, version, about = "Calibrate a camera using a series of chessboard images")]
struct Args {
    /// Glob mask selecting the input images.
    #[arg(short = 'i', long = "in-mask", default_value = "../resources/2015*.jpg")]
    in_mask: String,

    /// Directory for annotated, undistorted and calibration output.
    #[arg(short = 'o', long = "out-dir", default_value = "../output/")]
    out_dir: PathBuf,

    /// Inner corners per row and column, `COLS,ROWS`.
    #[arg(short = 'p', long, default_value = "7,5", value_parser = cli::parse_pattern)]
    pattern: (u32, u32),

    /// Chessboard square size in the unit of the translation vectors.
    #[arg(long, default_value_t = 1.0)]
    square_size: f64,

    /// Free scaling of the undistorted view: 0 keeps valid pixels only, 1 keeps all.
    #[arg(long, default_value_t = 1.0)]
    alpha: f64,

    /// JSON file with `chessboard` and `calibration` overrides.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CalibrationConfig {
    chessboard: ChessboardConfig,
    calibration: CalibrationOptions,
}

struct Detections {
    views: Vec<PlanarView>,
    width: u32,
    height: u32,
}

fn collect_views(
    files: &[PathBuf],
    out_dir: &Path,
    finder: &ChessboardFinder,
    square_size: f64,
) -> Result<Detections, CliError> {
    let (cols, rows) = finder.pattern();
    let object = board_object_points(cols, rows, square_size);
    let mut views = Vec::new();
    let mut size: Option<(u32, u32)> = None;

    for file in files {
        let img = load_gray(file)?;
        let corners = match finder.find(&gray_view(&img)) {
            Ok(corners) => corners,
            Err(err) => {
                error!("Chessboard not found in: {}", file.display());
                debug!("{err}");
                continue;
            }
        };
        info!("Chessboard found in: {}", file.display());

        let (w, h) = *size.get_or_insert(img.dimensions());
        if (w, h) != img.dimensions() {
            warn!(
                "skipping {}: size {}x{} differs from {w}x{h}",
                file.display(),
                img.width(),
                img.height()
            );
            continue;
        }

        let mut vis = RgbImage::from_gray(&gray_view(&img));
        draw_chessboard_corners(&mut vis, cols, rows, &corners, true);
        let out = out_dir.join(format!("{}_output.bmp", cli::file_stem(file)));
        save_rgb(&out, vis)?;

        let image = corners
            .iter()
            .map(|p| Point2::new(p.x as f64, p.y as f64))
            .collect();
        views.push(PlanarView::new(object.clone(), image));
    }

    info!("Images passed chessboard detection: {}", views.len());
    let (width, height) = size.unwrap_or((0, 0));
    Ok(Detections {
        views,
        width,
        height,
    })
}

fn undistort_all(
    files: &[PathBuf],
    out_dir: &Path,
    calibration: &CalibrationFile,
    alpha: f64,
) -> Result<(), CliError> {
    let camera = calibration.camera();
    let distortion = calibration.distortion();
    for file in files {
        let img = load_gray(file)?;
        let (new_camera, roi) =
            optimal_new_camera_matrix(&camera, &distortion, img.width(), img.height(), alpha);
        let undistorted = undistort_image(&gray_view(&img), &camera, &distortion, &new_camera);
        let out = if roi.is_empty() {
            undistorted
        } else {
            crop(&undistorted.view(), &roi)
        };
        let path = out_dir.join(format!("{}_undistort_output.bmp", cli::file_stem(file)));
        save_gray(&path, out)?;
        debug!("wrote {}", path.display());
    }
    Ok(())
}

fn try_main() -> Result<(), CliError> {
    let args = Args::parse();
    cli::init_logging(args.verbose);

    info!("Input mask: {}", args.in_mask);
    info!("Output dir: {}", args.out_dir.display());
    let (cols, rows) = args.pattern;
    info!("Pattern size: {cols}x{rows}");

    let config: CalibrationConfig = cli::load_json_config(args.config.as_deref())?;
    let start = Instant::now();

    let files = cli::list_files(&args.in_mask)?;
    if files.is_empty() {
        return Err(CliError::NoInput(args.in_mask));
    }
    cli::ensure_dir(&args.out_dir)?;

    let finder = ChessboardFinder::new(cols, rows, config.chessboard)?;
    let detections = collect_views(&files, &args.out_dir, &finder, args.square_size)?;
    let result = calibrate_camera(
        &detections.views,
        detections.width,
        detections.height,
        &config.calibration,
    )?;

    let error = reprojection_error(&detections.views, &result);
    info!("Mean reprojection error: {error}");
    info!("RMS: {}", result.rms);
    let k = result.camera.to_matrix();
    info!("Camera matrix:");
    for r in 0..3 {
        info!("  [{:12.6} {:12.6} {:12.6}]", k[(r, 0)], k[(r, 1)], k[(r, 2)]);
    }
    info!("Distortion coefficients: {:?}", result.distortion.to_array());

    let calibration_path = args.out_dir.join("calibration.json");
    CalibrationFile::from_result(&result, Some(error)).write_json(&calibration_path)?;
    info!("Calibration written to {}", calibration_path.display());
    let calibration = CalibrationFile::load_json(&calibration_path)?;

    undistort_all(&files, &args.out_dir, &calibration, args.alpha)?;
    info!("Elapsed time: {:.2} seconds", start.elapsed().as_secs_f64());
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
