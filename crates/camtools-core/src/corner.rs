use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// X-junction reported by the ChESS detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    /// Sub-pixel position (centre of mass of the response peak).
    pub position: Point2<f32>,
    /// Angle of the bright diagonal in radians, modulo π.
    pub orientation: f32,
    /// ChESS response at the peak.
    pub strength: f32,
}

/// Board-space lattice index: `i` along the board's first axis, `j` along the
/// second.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct GridCoords {
    pub i: i32,
    pub j: i32,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Chessboard,
}

/// Corner assigned to a lattice position of a detected board.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabeledCorner {
    pub position: Point2<f32>,
    /// Lattice index, shifted so the board's minimum is `(0, 0)`.
    pub grid: Option<GridCoords>,
    /// Corner strength relative to the strongest board corner, in `[0, 1]`.
    pub confidence: f32,
}

/// All labelled corners of one board found in an image.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetDetection {
    pub kind: TargetKind,
    pub corners: Vec<LabeledCorner>,
}
