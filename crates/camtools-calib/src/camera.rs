//! Pinhole camera with Brown–Conrady distortion.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Intrinsics with zero skew.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraMatrix {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl CameraMatrix {
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(self.fx, 0.0, self.cx, 0.0, self.fy, self.cy, 0.0, 0.0, 1.0)
    }

    /// Build from a 3×3 matrix, ignoring any skew term.
    pub fn from_matrix(k: &Matrix3<f64>) -> Self {
        Self {
            fx: k[(0, 0)],
            fy: k[(1, 1)],
            cx: k[(0, 2)],
            cy: k[(1, 2)],
        }
    }

    /// Normalised image coordinates to pixels.
    #[inline]
    pub fn to_pixel(&self, n: &Vector2<f64>) -> Point2<f64> {
        Point2::new(self.fx * n.x + self.cx, self.fy * n.y + self.cy)
    }

    /// Pixels to normalised image coordinates.
    #[inline]
    pub fn to_normalized(&self, p: &Point2<f64>) -> Vector2<f64> {
        Vector2::new((p.x - self.cx) / self.fx, (p.y - self.cy) / self.fy)
    }
}

/// Five-coefficient radial/tangential lens model (`k1 k2 p1 p2 k3` order).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Distortion {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

const UNDISTORT_ITERS: usize = 100;
const UNDISTORT_TOL: f64 = 1e-9;
/// Iterates leaving this normalised radius have run away.
const UNDISTORT_MAX_RADIUS: f64 = 1e3;

impl Distortion {
    pub fn to_array(&self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }

    pub fn from_array(c: [f64; 5]) -> Self {
        Self {
            k1: c[0],
            k2: c[1],
            p1: c[2],
            p2: c[3],
            k3: c[4],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.to_array().iter().all(|c| *c == 0.0)
    }

    pub fn distort(&self, n: &Vector2<f64>) -> Vector2<f64> {
        let (x, y) = (n.x, n.y);
        let r2 = x * x + y * y;
        let radial = 1.0 + r2 * (self.k1 + r2 * (self.k2 + r2 * self.k3));
        let xy = x * y;
        Vector2::new(
            x * radial + 2.0 * self.p1 * xy + self.p2 * (r2 + 2.0 * x * x),
            y * radial + self.p1 * (r2 + 2.0 * y * y) + 2.0 * self.p2 * xy,
        )
    }

    /// Fixed-point inverse of [`Distortion::distort`].
    ///
    /// Best effort: where the lens model folds over and has no inverse, the
    /// iterate with the smallest residual is returned. Use
    /// [`Distortion::try_undistort`] to detect that case.
    pub fn undistort(&self, d: &Vector2<f64>) -> Vector2<f64> {
        self.solve_undistort(d).0
    }

    /// Inverse of [`Distortion::distort`], or `None` when the iteration does
    /// not converge to a finite point.
    pub fn try_undistort(&self, d: &Vector2<f64>) -> Option<Vector2<f64>> {
        let (n, residual) = self.solve_undistort(d);
        (residual <= UNDISTORT_TOL && n.iter().all(|v| v.is_finite())).then_some(n)
    }

    fn solve_undistort(&self, d: &Vector2<f64>) -> (Vector2<f64>, f64) {
        if self.is_zero() {
            return (*d, 0.0);
        }
        let mut n = *d;
        let mut best = (*d, f64::INFINITY);
        for _ in 0..UNDISTORT_ITERS {
            let err = self.distort(&n) - d;
            let residual = err.norm();
            if !residual.is_finite() {
                break;
            }
            if residual < best.1 {
                best = (n, residual);
            }
            if residual <= UNDISTORT_TOL * 1e-3 {
                break;
            }
            n -= err;
            let radius = n.norm();
            if !radius.is_finite() || radius >= UNDISTORT_MAX_RADIUS {
                break;
            }
        }
        best
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewPose {
    pub rvec: Vector3<f64>,
    pub tvec: Vector3<f64>,
}

impl ViewPose {
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rvec)
    }

    #[inline]
    pub fn transform(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.tvec
    }
}

/// Object points of a planar board with `cols × rows` inner corners, row-major.
pub fn board_object_points(cols: u32, rows: u32, square_size: f64) -> Vec<Point3<f64>> {
    (0..rows)
        .flat_map(|r| {
            (0..cols).map(move |c| Point3::new(c as f64 * square_size, r as f64 * square_size, 0.0))
        })
        .collect()
}

/// Project object points through `pose`, the lens model and `camera`.
pub fn project_points(
    object: &[Point3<f64>],
    pose: &ViewPose,
    camera: &CameraMatrix,
    distortion: &Distortion,
) -> Vec<Point2<f64>> {
    let rot = pose.rotation();
    object
        .iter()
        .map(|p| {
            let pc = rot * p + pose.tvec;
            let n = Vector2::new(pc.x / pc.z, pc.y / pc.z);
            camera.to_pixel(&distortion.distort(&n))
        })
        .collect()
}
