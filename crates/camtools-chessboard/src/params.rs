use serde::{Deserialize, Serialize};

/// Which corner pairs may become grid edges.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GridGraphParams {
    /// Edge length window in pixels.
    pub min_spacing_pix: f32,
    pub max_spacing_pix: f32,
    /// Nearest corners examined per node (including the node itself).
    pub k_neighbors: usize,
    /// Slack on the 90° diagonal swap and the 45° edge angle, in degrees.
    pub orientation_tolerance_deg: f32,
}

impl Default for GridGraphParams {
    fn default() -> Self {
        Self {
            min_spacing_pix: 8.0,
            max_spacing_pix: 200.0,
            k_neighbors: 8,
            orientation_tolerance_deg: 22.5,
        }
    }
}

/// Acceptance rules for an assembled grid.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ChessboardParams {
    /// ChESS corners below this response are ignored.
    pub min_strength: f32,
    /// Smallest component worth labelling.
    pub min_corners: usize,
    /// Inner-corner rows the board must span, if known.
    pub expected_rows: Option<u32>,
    /// Inner-corner columns the board must span, if known.
    pub expected_cols: Option<u32>,
    /// Share of the expected `cols × rows` corners that must be labelled.
    pub completeness_threshold: f32,
}

impl Default for ChessboardParams {
    fn default() -> Self {
        Self {
            min_strength: 0.0,
            min_corners: 9,
            expected_rows: None,
            expected_cols: None,
            completeness_threshold: 0.7,
        }
    }
}

impl ChessboardParams {
    /// A `cols × rows` inner-corner pattern that has to be seen in full,
    /// as calibration needs every corner.
    pub fn for_pattern(cols: u32, rows: u32) -> Self {
        Self {
            min_corners: cols.saturating_mul(rows) as usize,
            expected_rows: Some(rows),
            expected_cols: Some(cols),
            completeness_threshold: 1.0,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_requires_every_corner() {
        let p = ChessboardParams::for_pattern(7, 5);
        assert_eq!(p.min_corners, 35);
        assert_eq!((p.expected_cols, p.expected_rows), (Some(7), Some(5)));
        assert_eq!(p.completeness_threshold, 1.0);
    }

    #[test]
    fn huge_pattern_saturates() {
        let p = ChessboardParams::for_pattern(u32::MAX, 3);
        assert_eq!(p.min_corners, u32::MAX as usize);
    }
}
