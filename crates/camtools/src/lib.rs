//! High-level facade for the `camtools-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying crates (`core`, `chessboard`, `calib`,
//!   `motion`);
//! - (feature `image`) adapters between `image` buffers and the workspace's
//!   view types, plus end-to-end chessboard helpers in [`detect`];
//! - (feature `cli`) the shared pieces of the `camera-calibration` and
//!   `motion-detect` binaries in [`cli`].
//!
//! ## Quickstart
//!
//! ```no_run
//! use camtools::chessboard::{ChessboardConfig, ChessboardFinder};
//! use camtools::detect;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let img = detect::load_gray("board.png")?;
//! let finder = ChessboardFinder::new(7, 5, ChessboardConfig::default())?;
//! let corners = detect::find_chessboard(&img, &finder)?;
//! println!("{} corners", corners.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `camtools::core`: image views, corners, homography, ChESS glue, logger.
//! - `camtools::chessboard`: grid assembly, sub-pixel refinement, drawing.
//! - `camtools::calib`: intrinsics, distortion, poses, undistortion, JSON IO.
//! - `camtools::motion`: moving-average motion detector and frame sources.

pub use camtools_calib as calib;
pub use camtools_chessboard as chessboard;
pub use camtools_core as core;
pub use camtools_motion as motion;

pub use camtools_calib::{CalibrationFile, CalibrationResult, CameraMatrix, Distortion};
pub use camtools_chessboard::{ChessboardConfig, ChessboardFinder};
pub use camtools_core::{Corner, GrayImage, GrayImageView, RgbImage, RgbImageView};
pub use camtools_motion::{MotionDetector, MotionParams};

#[cfg(feature = "image")]
pub mod detect;

#[cfg(feature = "cli")]
pub mod cli;
