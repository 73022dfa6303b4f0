//! Neighbour graph over ChESS corners and grid labelling.
//!
//! Two corners are linked when they look like adjacent X-junctions of one
//! board: swapped bright diagonals, a plausible spacing, and an edge running
//! at 45° to both diagonals. Edges are classified in the board frame given by
//! the grid axis, so each node keeps at most one neighbour per direction.

use crate::geom::{angle_diff_abs, axis_vec_diff, is_orthogonal};
use crate::params::GridGraphParams;
use camtools_core::{Corner, GridCoords};
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::Vector2;
use std::collections::{HashMap, HashSet, VecDeque};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

/// Edge direction in the board frame; `Down` is the grid axis turned by +90°
/// (image y grows downwards).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NeighborDirection {
    Right,
    Left,
    Up,
    Down,
}

impl NeighborDirection {
    /// Grid step taken when following an edge in this direction.
    pub fn step(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Left => (-1, 0),
            Self::Up => (0, -1),
            Self::Down => (0, 1),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Right => Self::Left,
            Self::Left => Self::Right,
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    /// Direction of the image vector `d` for a board whose "right" axis has
    /// angle `axis` (radians).
    pub fn classify(d: &Vector2<f32>, axis: f32) -> Self {
        let (s, c) = axis.sin_cos();
        let along = c * d.x + s * d.y;
        let across = c * d.y - s * d.x;
        match (along.abs() > across.abs(), along >= 0.0, across >= 0.0) {
            (true, true, _) => Self::Right,
            (true, false, _) => Self::Left,
            (false, _, true) => Self::Down,
            (false, _, false) => Self::Up,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NodeNeighbor {
    pub direction: NeighborDirection,
    /// Index of the neighbouring corner.
    pub index: usize,
    pub distance: f32,
    /// Sum of angular deviations from an ideal grid edge; lower is better.
    pub score: f32,
}

/// Pairwise acceptance test for candidate edges.
struct EdgeRules<'a> {
    params: &'a GridGraphParams,
    tolerance: f32,
    axis: f32,
}

impl EdgeRules<'_> {
    fn check(&self, a: &Corner, b: &Corner, b_index: usize) -> Option<NodeNeighbor> {
        if !is_orthogonal(a.orientation, b.orientation, self.tolerance) {
            return None;
        }

        let d = b.position - a.position;
        let distance = d.norm();
        if !(self.params.min_spacing_pix..=self.params.max_spacing_pix).contains(&distance) {
            return None;
        }

        let edge = d.y.atan2(d.x);
        let dev_a = (axis_vec_diff(a.orientation, edge) - FRAC_PI_4).abs();
        let dev_b = (axis_vec_diff(b.orientation, edge) - FRAC_PI_4).abs();
        if dev_a > self.tolerance || dev_b > self.tolerance {
            return None;
        }
        let skew = (FRAC_PI_2 - angle_diff_abs(a.orientation, b.orientation)).abs();

        Some(NodeNeighbor {
            direction: NeighborDirection::classify(&d, self.axis),
            index: b_index,
            distance,
            score: dev_a + dev_b + skew,
        })
    }
}

/// Whether `candidate` should replace `current` in a direction slot: the
/// nearer one wins, and within 10% of each other the better-aligned one.
fn prefer(candidate: &NodeNeighbor, current: &NodeNeighbor) -> bool {
    let ratio = candidate.distance / current.distance.max(f32::EPSILON);
    if (ratio - 1.0).abs() < 0.1 {
        candidate.score < current.score
    } else {
        candidate.distance < current.distance
    }
}

/// 4-connected neighbour graph over ChESS corners.
pub struct GridGraph {
    /// Accepted neighbours per corner, at most one per direction.
    pub neighbors: Vec<Vec<NodeNeighbor>>,
}

impl GridGraph {
    pub fn new(corners: &[Corner], params: &GridGraphParams, axis_angle: f32) -> Self {
        if corners.is_empty() {
            return Self {
                neighbors: Vec::new(),
            };
        }
        let rules = EdgeRules {
            params,
            tolerance: params.orientation_tolerance_deg.to_radians(),
            axis: axis_angle,
        };
        let points: Vec<[f32; 2]> = corners
            .iter()
            .map(|c| [c.position.x, c.position.y])
            .collect();
        let tree: KdTree<f32, 2> = (&points).into();

        let neighbors = corners
            .iter()
            .enumerate()
            .map(|(i, corner)| {
                let mut slots: [Option<NodeNeighbor>; 4] = [None, None, None, None];
                let nearest = tree.nearest_n::<SquaredEuclidean>(&points[i], params.k_neighbors);
                for j in nearest.into_iter().map(|nn| nn.item as usize) {
                    if j == i {
                        continue;
                    }
                    let Some(candidate) = rules.check(corner, &corners[j], j) else {
                        continue;
                    };
                    let slot = &mut slots[candidate.direction as usize];
                    if slot.as_ref().is_none_or(|current| prefer(&candidate, current)) {
                        *slot = Some(candidate);
                    }
                }
                slots.into_iter().flatten().collect()
            })
            .collect();

        Self { neighbors }
    }

    /// Keep only edges that the other endpoint reports back in the opposite
    /// direction.
    pub fn symmetrize(&mut self) {
        let edges: HashSet<(usize, usize, NeighborDirection)> = self
            .neighbors
            .iter()
            .enumerate()
            .flat_map(|(i, list)| list.iter().map(move |n| (i, n.index, n.direction)))
            .collect();
        for (i, list) in self.neighbors.iter_mut().enumerate() {
            list.retain(|n| edges.contains(&(n.index, i, n.direction.opposite())));
        }
    }
}

/// Connected components of the graph, each listed in BFS order.
pub fn connected_components(graph: &GridGraph) -> Vec<Vec<usize>> {
    let mut seen = vec![false; graph.neighbors.len()];
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for root in 0..graph.neighbors.len() {
        if seen[root] {
            continue;
        }
        seen[root] = true;
        queue.push_back(root);
        let mut component = Vec::new();
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for n in &graph.neighbors[node] {
                if !seen[n.index] {
                    seen[n.index] = true;
                    queue.push_back(n.index);
                }
            }
        }
        components.push(component);
    }
    components
}

/// Integer grid coordinates for the corners of one component, found by BFS
/// from its first node at `(0, 0)`.
///
/// A grid cell belongs to the first corner that reaches it; later claims on
/// the same cell are ignored.
pub fn assign_grid_coordinates(graph: &GridGraph, component: &[usize]) -> Vec<(usize, GridCoords)> {
    let Some(&root) = component.first() else {
        return Vec::new();
    };
    let mut labels: HashMap<usize, GridCoords> = HashMap::new();
    let mut cells: HashSet<GridCoords> = HashSet::new();
    let mut order = Vec::new();
    let mut queue = VecDeque::from([(root, GridCoords { i: 0, j: 0 })]);

    while let Some((node, at)) = queue.pop_front() {
        if labels.contains_key(&node) || !cells.insert(at) {
            continue;
        }
        labels.insert(node, at);
        order.push((node, at));
        for n in &graph.neighbors[node] {
            let (di, dj) = n.direction.step();
            let next = GridCoords {
                i: at.i + di,
                j: at.j + dj,
            };
            queue.push_back((n.index, next));
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn corner(x: f32, y: f32, orientation: f32) -> Corner {
        Corner {
            position: Point2::new(x, y),
            orientation,
            strength: 1.0,
        }
    }

    /// `cols × rows` X-junctions with alternating diagonals.
    fn lattice(cols: usize, rows: usize, spacing: f32) -> Vec<Corner> {
        (0..rows)
            .flat_map(|j| {
                (0..cols).map(move |i| {
                    let o = if (i + j) % 2 == 0 {
                        FRAC_PI_4
                    } else {
                        3.0 * FRAC_PI_4
                    };
                    corner(i as f32 * spacing, j as f32 * spacing, o)
                })
            })
            .collect()
    }

    fn params(max_spacing: f32, k: usize) -> GridGraphParams {
        GridGraphParams {
            min_spacing_pix: 5.0,
            max_spacing_pix: max_spacing,
            k_neighbors: k,
            ..Default::default()
        }
    }

    fn neighbor(graph: &GridGraph, node: usize, dir: NeighborDirection) -> Option<usize> {
        graph.neighbors[node]
            .iter()
            .find(|n| n.direction == dir)
            .map(|n| n.index)
    }

    #[test]
    fn interior_corner_links_four_ways() {
        let graph = GridGraph::new(&lattice(3, 3, 12.0), &params(18.0, 8), 0.0);
        assert_eq!(graph.neighbors[4].len(), 4);
        assert_eq!(neighbor(&graph, 4, NeighborDirection::Right), Some(5));
        assert_eq!(neighbor(&graph, 4, NeighborDirection::Left), Some(3));
        assert_eq!(neighbor(&graph, 4, NeighborDirection::Up), Some(1));
        assert_eq!(neighbor(&graph, 4, NeighborDirection::Down), Some(7));
        assert!(graph.neighbors[4]
            .iter()
            .all(|n| (n.distance - 12.0).abs() < 1e-4));
        // Corner nodes see two neighbours; diagonals are never linked.
        assert_eq!(graph.neighbors[0].len(), 2);
        assert_eq!(neighbor(&graph, 0, NeighborDirection::Down), Some(3));
    }

    #[test]
    fn parallel_diagonals_are_not_linked() {
        let corners = [corner(0.0, 0.0, FRAC_PI_4), corner(12.0, 0.0, FRAC_PI_4)];
        let graph = GridGraph::new(&corners, &params(18.0, 2), 0.0);
        assert!(graph.neighbors.iter().all(Vec::is_empty));
    }

    #[test]
    fn spacing_window_is_enforced() {
        let corners = [
            corner(0.0, 0.0, FRAC_PI_4),
            corner(40.0, 0.0, 3.0 * FRAC_PI_4),
            corner(0.0, 3.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(18.0, 3), 0.0);
        assert!(graph.neighbors[0].is_empty());
    }

    #[test]
    fn nearer_candidate_wins_its_direction() {
        let corners = [
            corner(0.0, 0.0, FRAC_PI_4),
            corner(10.0, 0.0, 3.0 * FRAC_PI_4),
            corner(15.0, 0.0, 3.0 * FRAC_PI_4 + 0.05),
            corner(-10.0, 0.0, 3.0 * FRAC_PI_4),
        ];
        let graph = GridGraph::new(&corners, &params(18.0, 4), 0.0);
        assert_eq!(graph.neighbors[0].len(), 2);
        assert_eq!(neighbor(&graph, 0, NeighborDirection::Right), Some(1));
        assert_eq!(neighbor(&graph, 0, NeighborDirection::Left), Some(3));
    }

    #[test]
    fn classification_follows_grid_axis() {
        let down = Vector2::new(0.0, 10.0);
        assert_eq!(NeighborDirection::classify(&down, 0.0), NeighborDirection::Down);
        assert_eq!(
            NeighborDirection::classify(&down, FRAC_PI_2),
            NeighborDirection::Right
        );
        let up_left = Vector2::new(-2.0, -10.0);
        assert_eq!(NeighborDirection::classify(&up_left, 0.1), NeighborDirection::Up);
    }

    #[test]
    fn one_sided_edges_are_dropped() {
        let mut graph = GridGraph {
            neighbors: vec![
                vec![NodeNeighbor {
                    direction: NeighborDirection::Right,
                    index: 1,
                    distance: 10.0,
                    score: 0.0,
                }],
                vec![],
            ],
        };
        graph.symmetrize();
        assert!(graph.neighbors[0].is_empty());
    }

    #[test]
    fn separate_patches_form_separate_components() {
        let mut corners = lattice(2, 2, 12.0);
        corners.extend(lattice(2, 2, 12.0).into_iter().map(|mut c| {
            c.position.x += 200.0;
            c
        }));
        let mut graph = GridGraph::new(&corners, &params(18.0, 8), 0.0);
        graph.symmetrize();
        let comps = connected_components(&graph);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0], vec![0, 1, 2, 3]);
    }

    #[test]
    fn coordinates_follow_lattice_offsets() {
        let cols = 4;
        let mut graph = GridGraph::new(&lattice(cols, 3, 10.0), &params(15.0, 8), 0.0);
        graph.symmetrize();
        let comps = connected_components(&graph);
        assert_eq!(comps.len(), 1);

        let coords = assign_grid_coordinates(&graph, &comps[0]);
        assert_eq!(coords.len(), 12);
        let (root, g0) = coords[0];
        for (idx, g) in coords {
            let di = (idx % cols) as i32 - (root % cols) as i32;
            let dj = (idx / cols) as i32 - (root / cols) as i32;
            assert_eq!((g.i - g0.i, g.j - g0.j), (di, dj));
        }
    }
}
