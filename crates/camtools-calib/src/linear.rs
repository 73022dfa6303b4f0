//! Closed-form initialisation: Zhang intrinsics and planar pose.

use crate::camera::{CameraMatrix, ViewPose};
use crate::error::CalibError;
use nalgebra::{DMatrix, Matrix3, Rotation3, SVector};

/// Zhang's `v_ij` row built from columns `i` and `j` of a homography.
fn v_ij(h: &Matrix3<f64>, i: usize, j: usize) -> SVector<f64, 6> {
    let hi = h.column(i);
    let hj = h.column(j);
    SVector::<f64, 6>::from_row_slice(&[
        hi[0] * hj[0],
        hi[0] * hj[1] + hi[1] * hj[0],
        hi[1] * hj[1],
        hi[2] * hj[0] + hi[0] * hj[2],
        hi[2] * hj[1] + hi[1] * hj[2],
        hi[2] * hj[2],
    ])
}

/// Estimate intrinsics from board-to-image homographies, skew fixed at 0.
///
/// Pixel coordinates are recentred on the image centre and scaled before
/// solving, which keeps the `B` system well conditioned.
pub fn estimate_intrinsics(
    homographies: &[Matrix3<f64>],
    image_width: u32,
    image_height: u32,
) -> Result<CameraMatrix, CalibError> {
    if homographies.len() < 3 {
        return Err(CalibError::NotEnoughViews {
            needed: 3,
            got: homographies.len(),
        });
    }
    if image_width == 0 || image_height == 0 {
        return Err(CalibError::InvalidImageSize {
            width: image_width,
            height: image_height,
        });
    }

    let s = 0.5 * (image_width as f64 + image_height as f64);
    let (c0x, c0y) = (0.5 * image_width as f64, 0.5 * image_height as f64);
    let norm = Matrix3::new(1.0 / s, 0.0, -c0x / s, 0.0, 1.0 / s, -c0y / s, 0.0, 0.0, 1.0);

    let m = homographies.len();
    let mut v = DMatrix::<f64>::zeros(2 * m + 1, 6);
    for (k, h) in homographies.iter().enumerate() {
        let hn = norm * h;
        let hn = hn / hn.column(0).norm().max(hn.column(1).norm());
        let v11 = v_ij(&hn, 0, 0);
        let v22 = v_ij(&hn, 1, 1);
        let v12 = v_ij(&hn, 0, 1);
        v.row_mut(2 * k).copy_from(&v12.transpose());
        v.row_mut(2 * k + 1).copy_from(&(v11 - v22).transpose());
    }
    // Zero skew: B12 = 0.
    v[(2 * m, 1)] = 1.0;

    let svd = v.svd(false, true);
    let v_t = svd
        .v_t
        .ok_or(CalibError::Degenerate("SVD of the intrinsics system failed"))?;
    let b = v_t.row(v_t.nrows() - 1);
    let sign = if b[0] < 0.0 { -1.0 } else { 1.0 };
    let (b11, b12, b22, b13, b23, b33) = (
        sign * b[0],
        sign * b[1],
        sign * b[2],
        sign * b[3],
        sign * b[4],
        sign * b[5],
    );

    let denom = b11 * b22 - b12 * b12;
    if b11 <= 0.0 || denom <= 1e-12 * (b11 * b11 + b22 * b22) {
        return Err(CalibError::Degenerate("views do not constrain the focal length"));
    }
    let v0 = (b12 * b13 - b11 * b23) / denom;
    let lambda = b33 - (b13 * b13 + v0 * (b12 * b13 - b11 * b23)) / b11;
    if lambda <= 0.0 {
        return Err(CalibError::Degenerate("intrinsics system has the wrong sign"));
    }
    let alpha = (lambda / b11).sqrt();
    let beta = (lambda * b11 / denom).sqrt();
    let u0 = -b13 * alpha * alpha / lambda;

    Ok(CameraMatrix {
        fx: alpha * s,
        fy: beta * s,
        cx: u0 * s + c0x,
        cy: v0 * s + c0y,
    })
}

/// Pose of the board plane `Z = 0` given intrinsics and its homography.
///
/// The rotation is projected onto SO(3) and the board is placed in front of
/// the camera.
pub fn estimate_pose(camera: &CameraMatrix, h: &Matrix3<f64>) -> Result<ViewPose, CalibError> {
    let k_inv = camera
        .to_matrix()
        .try_inverse()
        .ok_or(CalibError::Degenerate("camera matrix is singular"))?;

    let r1 = k_inv * h.column(0);
    let r2 = k_inv * h.column(1);
    let t = k_inv * h.column(2);
    let mut lambda = 2.0 / (r1.norm() + r2.norm());
    if !lambda.is_finite() {
        return Err(CalibError::Degenerate("homography has zero columns"));
    }
    if t.z * lambda < 0.0 {
        lambda = -lambda;
    }

    let r1 = r1 * lambda;
    let r2 = r2 * lambda;
    let r3 = r1.cross(&r2);
    let r = Matrix3::from_columns(&[r1, r2, r3]);

    let svd = r.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(CalibError::Degenerate("rotation SVD failed"));
    };
    let mut r_orth = u * v_t;
    if r_orth.determinant() < 0.0 {
        let mut u_flipped = u;
        u_flipped.column_mut(2).neg_mut();
        r_orth = u_flipped * v_t;
    }

    let rot = Rotation3::from_matrix_unchecked(r_orth);
    Ok(ViewPose {
        rvec: rot.scaled_axis(),
        tvec: t * lambda,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn camera() -> CameraMatrix {
        CameraMatrix {
            fx: 820.0,
            fy: 800.0,
            cx: 330.0,
            cy: 235.0,
        }
    }

    fn homography(cam: &CameraMatrix, pose: &ViewPose) -> Matrix3<f64> {
        let r = pose.rotation();
        let m = r.matrix();
        let cols = [m.column(0).into_owned(), m.column(1).into_owned(), pose.tvec];
        cam.to_matrix() * Matrix3::from_columns(&cols)
    }

    fn poses() -> Vec<ViewPose> {
        vec![
            ViewPose {
                rvec: Vector3::new(0.2, -0.1, 0.05),
                tvec: Vector3::new(-60.0, -40.0, 500.0),
            },
            ViewPose {
                rvec: Vector3::new(-0.15, 0.25, -0.1),
                tvec: Vector3::new(-50.0, -30.0, 450.0),
            },
            ViewPose {
                rvec: Vector3::new(0.05, 0.3, 0.2),
                tvec: Vector3::new(-70.0, -45.0, 550.0),
            },
        ]
    }

    #[test]
    fn recovers_intrinsics_from_exact_homographies() {
        let cam = camera();
        let hs: Vec<_> = poses().iter().map(|p| homography(&cam, p)).collect();
        let est = estimate_intrinsics(&hs, 640, 480).unwrap();
        assert_relative_eq!(est.fx, cam.fx, epsilon = 1e-4);
        assert_relative_eq!(est.fy, cam.fy, epsilon = 1e-4);
        assert_relative_eq!(est.cx, cam.cx, epsilon = 1e-4);
        assert_relative_eq!(est.cy, cam.cy, epsilon = 1e-4);
    }

    #[test]
    fn intrinsics_need_three_views() {
        let cam = camera();
        let hs: Vec<_> = poses().iter().take(2).map(|p| homography(&cam, p)).collect();
        assert!(matches!(
            estimate_intrinsics(&hs, 640, 480),
            Err(CalibError::NotEnoughViews { needed: 3, got: 2 })
        ));
    }

    #[test]
    fn recovers_pose_up_to_homography_scale() {
        let cam = camera();
        for pose in poses() {
            let h = homography(&cam, &pose) * -3.5;
            let est = estimate_pose(&cam, &h).unwrap();
            assert_relative_eq!(est.rvec, pose.rvec, epsilon = 1e-7);
            assert_relative_eq!(est.tvec, pose.tvec, epsilon = 1e-5);
        }
    }
}
