use crate::detector::{ChessboardDetectionResult, ChessboardDetector};
use crate::params::{ChessboardParams, GridGraphParams};
use crate::subpix::{refine_corners_subpix, SubPixParams};
use camtools_core::{default_chess_config, detect_chess_corners, ChessConfig, Corner, GrayImageView};
use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ChessboardError {
    #[error("pattern must have at least 2x2 inner corners, got {cols}x{rows}")]
    InvalidPattern { cols: u32, rows: u32 },
    #[error("image too small for corner detection ({width}x{height})")]
    ImageTooSmall { width: usize, height: usize },
    #[error("chessboard {cols}x{rows} not found ({corners} ChESS corners)")]
    NotFound { cols: u32, rows: u32, corners: usize },
    #[error("ChESS detection failed: {0}")]
    Corners(String),
}

/// Tunables for the full image-to-corners pipeline, loadable from JSON.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChessboardConfig {
    /// `chess-corners` detector settings.
    pub chess: ChessConfig,
    pub grid_search: GridGraphParams,
    pub subpix: SubPixParams,
    /// Skip sub-pixel refinement and return the ChESS positions.
    pub skip_subpix: bool,
}

impl Default for ChessboardConfig {
    fn default() -> Self {
        Self {
            chess: default_chess_config(),
            grid_search: GridGraphParams::default(),
            subpix: SubPixParams::default(),
            skip_subpix: false,
        }
    }
}

/// Locates a complete `cols × rows` inner-corner pattern in grayscale images.
#[derive(Clone, Debug)]
pub struct ChessboardFinder {
    cols: u32,
    rows: u32,
    config: ChessboardConfig,
}

impl ChessboardFinder {
    pub fn new(cols: u32, rows: u32, config: ChessboardConfig) -> Result<Self, ChessboardError> {
        if cols < 2 || rows < 2 || cols.checked_mul(rows).is_none() {
            return Err(ChessboardError::InvalidPattern { cols, rows });
        }
        Ok(Self { cols, rows, config })
    }

    fn corners(&self, img: &GrayImageView<'_>) -> Result<Vec<Corner>, ChessboardError> {
        detect_chess_corners(img, &self.config.chess)
            .map_err(|e| ChessboardError::Corners(e.to_string()))
    }

    pub fn pattern(&self) -> (u32, u32) {
        (self.cols, self.rows)
    }

    pub fn config(&self) -> &ChessboardConfig {
        &self.config
    }

    /// Grid detection without the completeness requirement on the output.
    pub fn detect(
        &self,
        img: &GrayImageView<'_>,
    ) -> Result<Option<ChessboardDetectionResult>, ChessboardError> {
        let corners = self.corners(img)?;
        Ok(
            ChessboardDetector::new(ChessboardParams::for_pattern(self.cols, self.rows))
                .with_grid_search(self.config.grid_search.clone())
                .detect_from_corners(&corners),
        )
    }

    /// Row-major corner positions (`cols` per row), refined to sub-pixel
    /// accuracy.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, img), fields(width = img.width, height = img.height))
    )]
    pub fn find(&self, img: &GrayImageView<'_>) -> Result<Vec<Point2<f32>>, ChessboardError> {
        if img.width < 16 || img.height < 16 {
            return Err(ChessboardError::ImageTooSmall {
                width: img.width,
                height: img.height,
            });
        }

        let corners = self.corners(img)?;
        let not_found = ChessboardError::NotFound {
            cols: self.cols,
            rows: self.rows,
            corners: corners.len(),
        };

        let detector = ChessboardDetector::new(ChessboardParams::for_pattern(self.cols, self.rows))
            .with_grid_search(self.config.grid_search.clone());
        let Some(result) = detector.detect_from_corners(&corners) else {
            return Err(not_found);
        };
        let Some(mut points) = result.ordered_points(self.cols, self.rows) else {
            return Err(not_found);
        };

        if !self.config.skip_subpix {
            refine_corners_subpix(img, &mut points, &self.config.subpix);
        }
        debug!("pattern {}x{} located", self.cols, self.rows);
        Ok(points)
    }
}
