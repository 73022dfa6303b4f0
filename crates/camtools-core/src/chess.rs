//! Glue between the `chess-corners` ChESS detector and [`Corner`].
//!
//! ChESS ("Chess-board Extraction by Subtraction and Summation") scores
//! X-junctions from a 16-sample ring; `chess-corners` adds thresholding,
//! non-maximum suppression, sub-pixel refinement and a two-axis fit that
//! gives the local grid directions.

use crate::{Corner, GrayImageView};
use chess_corners::{
    find_chess_corners_u8, ChessConfig, ChessError, CornerDescriptor, ThresholdMode,
};
use nalgebra::Point2;
use std::f32::consts::PI;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Single-scale ChESS settings used throughout camtools: relative threshold of
/// 0.2 of the strongest response and a 2 px suppression radius.
pub fn default_chess_config() -> ChessConfig {
    let mut cfg = ChessConfig::single_scale();
    cfg.threshold_mode = ThresholdMode::Relative;
    cfg.threshold_value = 0.2;
    cfg.nms_radius = 2;
    cfg
}

/// Convert a `chess-corners` descriptor into a [`Corner`].
///
/// The descriptor reports the two grid axes so that turning from `axes[0]`
/// to `axes[1]` crosses a dark sector; the bright diagonal is the bisector
/// rotated by a quarter turn.
pub fn adapt_chess_corner(c: &CornerDescriptor) -> Corner {
    let [a0, a1] = c.axes;
    Corner {
        position: Point2::new(c.x, c.y),
        orientation: (0.5 * (a0.angle + a1.angle + PI)).rem_euclid(PI),
        strength: c.response,
    }
}

/// Run ChESS on a grayscale view and adapt the result into [`Corner`]s.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, cfg), fields(width = img.width, height = img.height))
)]
pub fn detect_chess_corners(
    img: &GrayImageView<'_>,
    cfg: &ChessConfig,
) -> Result<Vec<Corner>, ChessError> {
    let raw = find_chess_corners_u8(img.data, img.width as u32, img.height as u32, cfg)?;
    log::debug!("ChESS: {} corners", raw.len());
    Ok(raw.iter().map(adapt_chess_corner).collect())
}
