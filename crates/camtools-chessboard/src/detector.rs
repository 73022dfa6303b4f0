use crate::gridgraph::{assign_grid_coordinates, connected_components, GridGraph};
use crate::params::{ChessboardParams, GridGraphParams};
use camtools_core::{Corner, GridCoords, LabeledCorner, TargetDetection, TargetKind};
use log::{debug, info};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Estimate the board's "right" axis from ChESS corner orientations.
///
/// Corner diagonals alternate between θ and θ + π/2 across the board, so the
/// mean is taken in quadruple-angle space. The grid axis sits 45° from the
/// diagonals; the result is folded into `[-π/4, π/4)` so that a roughly
/// upright board keeps image x as its "right" direction.
pub fn estimate_grid_axis(corners: &[Corner]) -> Option<f32> {
    let mut sum = Vector2::<f32>::zeros();
    let mut weight_sum = 0.0f32;

    for c in corners {
        let w = c.strength.max(0.0);
        if w <= 0.0 {
            continue;
        }
        let four_theta = 4.0 * c.orientation;
        sum += w * Vector2::new(four_theta.cos(), four_theta.sin());
        weight_sum += w;
    }

    if weight_sum <= 0.0 {
        return None;
    }
    let mean = sum / weight_sum;
    if mean.norm_squared() < 1e-6 {
        return None;
    }

    let diagonal = 0.25 * mean.y.atan2(mean.x);
    let axis = (diagonal + FRAC_PI_4).rem_euclid(FRAC_PI_2);
    Some(if axis >= FRAC_PI_4 { axis - FRAC_PI_2 } else { axis })
}

/// Output of a successful chessboard detection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChessboardDetectionResult {
    /// Labeled corners with grid coordinates starting at (0, 0).
    pub detection: TargetDetection,
    /// Indices into the input corner slice, aligned with `detection.corners`.
    pub inliers: Vec<usize>,
    /// Grid extent along the detected "right" axis.
    pub grid_cols: u32,
    /// Grid extent along the detected "down" axis.
    pub grid_rows: u32,
    /// Board axis angle used for labeling (radians).
    pub grid_axis: f32,
}

impl ChessboardDetectionResult {
    /// Complete row-major list of corner positions for a `cols × rows`
    /// pattern, `cols` corners per row.
    ///
    /// A board found rotated by 90° is turned, not mirrored, into the
    /// requested layout. Returns `None` unless every corner of the pattern is present.
    pub fn ordered_points(&self, cols: u32, rows: u32) -> Option<Vec<Point2<f32>>> {
        let turned = if self.grid_cols == cols && self.grid_rows == rows {
            false
        } else if self.grid_cols == rows && self.grid_rows == cols {
            true
        } else {
            return None;
        };

        let n = cols.checked_mul(rows)? as usize;
        let mut out: Vec<Option<Point2<f32>>> = vec![None; n];
        for c in &self.detection.corners {
            let g = c.grid?;
            let (col, row) = if turned {
                (g.j, rows as i32 - 1 - g.i)
            } else {
                (g.i, g.j)
            };
            if col < 0 || row < 0 || col >= cols as i32 || row >= rows as i32 {
                return None;
            }
            out[row as usize * cols as usize + col as usize] = Some(c.position);
        }
        out.into_iter().collect()
    }
}

/// Chessboard detector using ChESS orientations and a 4-connected grid graph.
pub struct ChessboardDetector {
    pub params: ChessboardParams,
    pub grid_search: GridGraphParams,
}

struct Candidate {
    coords: Vec<(usize, GridCoords)>,
    cols: u32,
    rows: u32,
}

impl ChessboardDetector {
    pub fn new(params: ChessboardParams) -> Self {
        Self {
            params,
            grid_search: GridGraphParams::default(),
        }
    }

    pub fn with_grid_search(mut self, grid_search: GridGraphParams) -> Self {
        self.grid_search = grid_search;
        self
    }

    /// Find the best chessboard in a cloud of ChESS corners.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, corners), fields(num_corners = corners.len()))
    )]
    pub fn detect_from_corners(&self, corners: &[Corner]) -> Option<ChessboardDetectionResult> {
        // 1. Filter by strength, remembering the original indices.
        let strong: Vec<(usize, Corner)> = corners
            .iter()
            .cloned()
            .enumerate()
            .filter(|(_, c)| c.strength >= self.params.min_strength)
            .collect();

        debug!(
            "{} of {} ChESS corners pass the strength filter",
            strong.len(),
            corners.len()
        );
        if strong.len() < self.params.min_corners {
            return None;
        }
        let strong_corners: Vec<Corner> = strong.iter().map(|(_, c)| c.clone()).collect();

        // 2. Board axis from orientations.
        let Some(axis) = estimate_grid_axis(&strong_corners) else {
            info!("failed to estimate grid axis from orientations");
            return None;
        };

        // 3. Grid graph and components.
        let mut graph = GridGraph::new(&strong_corners, &self.grid_search, axis);
        graph.symmetrize();
        let components = connected_components(&graph);
        debug!("grid graph has {} components", components.len());

        // 4. Pick the largest component that fits the expected pattern.
        let best = components
            .iter()
            .filter(|comp| comp.len() >= self.params.min_corners)
            .filter_map(|comp| self.evaluate_component(&graph, comp))
            .max_by_key(|cand| cand.coords.len())?;

        let max_strength = strong_corners
            .iter()
            .map(|c| c.strength)
            .fold(0.0f32, f32::max);
        let scale = if max_strength > 0.0 {
            1.0 / max_strength
        } else {
            0.0
        };

        let mut labeled = Vec::with_capacity(best.coords.len());
        let mut inliers = Vec::with_capacity(best.coords.len());
        for (local_idx, g) in &best.coords {
            let (orig_idx, c) = &strong[*local_idx];
            labeled.push(LabeledCorner {
                position: c.position,
                grid: Some(*g),
                confidence: (c.strength * scale).clamp(0.0, 1.0),
            });
            inliers.push(*orig_idx);
        }

        info!(
            "chessboard grid {}x{} with {} corners",
            best.cols,
            best.rows,
            labeled.len()
        );

        Some(ChessboardDetectionResult {
            detection: TargetDetection {
                kind: TargetKind::Chessboard,
                corners: labeled,
            },
            inliers,
            grid_cols: best.cols,
            grid_rows: best.rows,
            grid_axis: axis,
        })
    }

    fn evaluate_component(&self, graph: &GridGraph, component: &[usize]) -> Option<Candidate> {
        let mut coords = assign_grid_coordinates(graph, component);
        if coords.len() < self.params.min_corners {
            return None;
        }

        let min_i = coords.iter().map(|(_, g)| g.i).min()?;
        let min_j = coords.iter().map(|(_, g)| g.j).min()?;
        let max_i = coords.iter().map(|(_, g)| g.i).max()?;
        let max_j = coords.iter().map(|(_, g)| g.j).max()?;
        for (_, g) in coords.iter_mut() {
            g.i -= min_i;
            g.j -= min_j;
        }
        let cols = (max_i - min_i + 1) as u32;
        let rows = (max_j - min_j + 1) as u32;

        if let (Some(er), Some(ec)) = (self.params.expected_rows, self.params.expected_cols) {
            let fits = (cols == ec && rows == er) || (cols == er && rows == ec);
            if !fits {
                debug!("component {cols}x{rows} does not match expected {ec}x{er}");
                return None;
            }
            let completeness = coords.len() as f32 / (er * ec) as f32;
            if completeness < self.params.completeness_threshold {
                debug!("component completeness {completeness:.2} below threshold");
                return None;
            }
        }

        coords.sort_by_key(|(_, g)| (g.j, g.i));
        Some(Candidate { coords, cols, rows })
    }
}
