//! Chessboard inner-corner detection built on top of `camtools-core`.
//!
//! ## Quickstart
//!
//! ```
//! use camtools_chessboard::{ChessboardConfig, ChessboardFinder};
//! use camtools_core::GrayImage;
//!
//! let finder = ChessboardFinder::new(7, 5, ChessboardConfig::default()).unwrap();
//! let img = GrayImage::new(64, 48);
//! assert!(finder.find(&img.view()).is_err());
//! ```
//!
//! Pipeline:
//! 1. ChESS corners with orientations (`camtools_core::detect_chess_corners`).
//! 2. Board axis from the quadruple-angle mean of corner orientations.
//! 3. For each corner, up to 4 neighbours (right/left/up/down) from a kNN
//!    query, accepted when orientations and edge direction agree.
//! 4. BFS over each connected component assigns integer `(i, j)` coordinates.
//! 5. The largest component matching the expected pattern (either way round)
//!    with enough corners is kept and emitted in row-major order.
//! 6. Iterative sub-pixel refinement of the ordered points.

mod detector;
mod draw;
mod finder;
mod geom;
mod gridgraph;
mod params;
mod subpix;

pub use detector::{estimate_grid_axis, ChessboardDetectionResult, ChessboardDetector};
pub use draw::draw_chessboard_corners;
pub use finder::{ChessboardConfig, ChessboardError, ChessboardFinder};
pub use gridgraph::{
    assign_grid_coordinates, connected_components, GridGraph, NeighborDirection, NodeNeighbor,
};
pub use params::{ChessboardParams, GridGraphParams};
pub use subpix::{refine_corners_subpix, SubPixParams};
