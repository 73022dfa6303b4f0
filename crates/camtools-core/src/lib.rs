//! Core types and utilities shared by the camtools crates.
//!
//! This crate is small and purely computational. It does *not* depend on any
//! image codec: callers hand in row-major pixel buffers through
//! [`GrayImageView`] / [`RgbImageView`].
//!
//! - [`detect_chess_corners`] runs the `chess-corners` ChESS detector and
//!   adapts its output into [`Corner`]s that seed chessboard detection.
//! - [`Homography`] and [`estimate_homography`] map between the
//!   board plane and the image.
//! - [`init_with_level`] installs the workspace logger used by the binaries.

mod chess;
mod corner;
mod homography;
mod image;
mod logger;

pub use chess::{adapt_chess_corner, default_chess_config, detect_chess_corners};
pub use chess_corners::{ChessConfig, ChessError, ThresholdMode};
pub use corner::{Corner, GridCoords, LabeledCorner, TargetDetection, TargetKind};
pub use homography::{estimate_homography, Homography};
pub use image::{
    sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, RgbImage, RgbImageView,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
