//! Iterative sub-pixel corner refinement.
//!
//! For the true corner `q`, every image gradient `g(p)` in a small window is
//! orthogonal to `p - q`: either `p` lies in a flat region (`g = 0`) or on an
//! edge through `q`. Summing `g gᵀ (p - q) = 0` over the window gives a 2×2
//! linear system which is re-solved around the updated estimate until the
//! step falls below `epsilon`.

use camtools_core::{sample_bilinear, GrayImageView};
use nalgebra::{Matrix2, Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SubPixParams {
    /// Half side of the search window; the window is `2*half_window + 1` wide.
    pub half_window: u32,
    /// Maximum number of iterations per corner.
    pub max_iters: u32,
    /// Stop when the update is shorter than this (pixels).
    pub epsilon: f32,
}

impl Default for SubPixParams {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iters: 30,
            epsilon: 0.1,
        }
    }
}

fn gaussian_weights(half: i32) -> Vec<f32> {
    let coeff = 1.0 / (half * half) as f32;
    (-half..=half)
        .map(|i| (-(i * i) as f32 * coeff).exp())
        .collect()
}

fn window_inside(img: &GrayImageView<'_>, p: Point2<f32>, half: i32) -> bool {
    let margin = (half + 2) as f32;
    p.x - margin >= 0.0
        && p.y - margin >= 0.0
        && p.x + margin <= (img.width - 1) as f32
        && p.y + margin <= (img.height - 1) as f32
}

fn refine_one(
    img: &GrayImageView<'_>,
    start: Point2<f32>,
    params: &SubPixParams,
    weights: &[f32],
) -> Point2<f32> {
    let half = params.half_window as i32;
    let eps2 = params.epsilon * params.epsilon;
    let mut cur = start;

    for _ in 0..params.max_iters {
        if !window_inside(img, cur, half) {
            break;
        }

        let mut a = Matrix2::<f32>::zeros();
        let mut b = Vector2::<f32>::zeros();
        for j in -half..=half {
            for i in -half..=half {
                let w = weights[(i + half) as usize] * weights[(j + half) as usize];
                let x = cur.x + i as f32;
                let y = cur.y + j as f32;
                let gx = 0.5 * (sample_bilinear(img, x + 1.0, y) - sample_bilinear(img, x - 1.0, y));
                let gy = 0.5 * (sample_bilinear(img, x, y + 1.0) - sample_bilinear(img, x, y - 1.0));
                let gxx = gx * gx * w;
                let gxy = gx * gy * w;
                let gyy = gy * gy * w;
                a[(0, 0)] += gxx;
                a[(0, 1)] += gxy;
                a[(1, 0)] += gxy;
                a[(1, 1)] += gyy;
                b.x += gxx * i as f32 + gxy * j as f32;
                b.y += gxy * i as f32 + gyy * j as f32;
            }
        }

        let Some(inv) = a.try_inverse() else {
            break;
        };
        let step = inv * b;
        cur += step;

        // Runaway estimates fall back to the detector position.
        if (cur - start).norm() > half as f32 {
            return start;
        }
        if step.norm_squared() <= eps2 {
            break;
        }
    }
    cur
}

/// Refine corner positions in place.
///
/// Corners whose search window leaves the image are left unchanged.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(img, points, params), fields(n = points.len()))
)]
pub fn refine_corners_subpix(
    img: &GrayImageView<'_>,
    points: &mut [Point2<f32>],
    params: &SubPixParams,
) {
    let weights = gaussian_weights(params.half_window as i32);
    for p in points.iter_mut() {
        *p = refine_one(img, *p, params, &weights);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camtools_core::GrayImage;

    /// Anti-aliased X-junction at `(cx, cy)` in pixel-centre coordinates.
    fn render_junction(w: usize, h: usize, cx: f32, cy: f32) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        let ss = 8;
        for y in 0..h {
            for x in 0..w {
                let mut acc = 0.0f32;
                for sy in 0..ss {
                    for sx in 0..ss {
                        let px = x as f32 - 0.5 + (sx as f32 + 0.5) / ss as f32;
                        let py = y as f32 - 0.5 + (sy as f32 + 0.5) / ss as f32;
                        acc += if (px - cx) * (py - cy) > 0.0 { 220.0 } else { 30.0 };
                    }
                }
                img.data[y * w + x] = (acc / (ss * ss) as f32).round() as u8;
            }
        }
        img
    }

    #[test]
    fn converges_to_true_junction() {
        let img = render_junction(48, 48, 23.3, 24.6);
        let mut pts = [Point2::new(22.0_f32, 25.5)];
        refine_corners_subpix(&img.view(), &mut pts, &SubPixParams::default());
        assert!((pts[0].x - 23.3).abs() < 0.15, "x={}", pts[0].x);
        assert!((pts[0].y - 24.6).abs() < 0.15, "y={}", pts[0].y);
    }

    #[test]
    fn border_points_are_untouched() {
        let img = render_junction(48, 48, 23.3, 24.6);
        let mut pts = [Point2::new(2.0_f32, 3.0)];
        refine_corners_subpix(&img.view(), &mut pts, &SubPixParams::default());
        assert_eq!(pts[0], Point2::new(2.0, 3.0));
    }

    #[test]
    fn flat_region_keeps_start() {
        let img = GrayImage {
            width: 40,
            height: 40,
            data: vec![90; 1600],
        };
        let mut pts = [Point2::new(20.0_f32, 20.0)];
        refine_corners_subpix(&img.view(), &mut pts, &SubPixParams::default());
        assert_eq!(pts[0], Point2::new(20.0, 20.0));
    }
}
