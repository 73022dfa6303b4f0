//! Joint reprojection refinement on top of `tiny-solver`.
//!
//! Parameter blocks: `intrinsics` `[fx, fy, cx, cy]`, `distortion`
//! `[k1, k2, p1, p2, k3]` and one `pose_<i>` `[rx, ry, rz, tx, ty, tz]` per
//! view (axis-angle rotation, board to camera).

use crate::calibrate::{CalibrationOptions, PlanarView};
use crate::camera::{CameraMatrix, Distortion, ViewPose};
use crate::error::CalibError;
use log::debug;
use nalgebra::{convert, DVector, RealField, Vector3};
use std::collections::HashMap;
use tiny_solver::factors::Factor;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::LevenbergMarquardtOptimizer;

const INTRINSICS: &str = "intrinsics";
const DISTORTION: &str = "distortion";

fn pose_key(view: usize) -> String {
    format!("pose_{view}")
}

#[inline]
fn lit<T: RealField>(v: f64) -> T {
    convert::<f64, T>(v)
}

/// Rotate `p` by the axis-angle vector `r`.
fn rotate<T: RealField>(r: &Vector3<T>, p: &Vector3<T>) -> Vector3<T> {
    let theta2 = r.norm_squared();
    if theta2 < lit(1e-16) {
        return p + r.cross(p);
    }
    let theta = theta2.sqrt();
    let k = r / theta.clone();
    let (s, c) = (theta.clone().sin(), theta.cos());
    let along = k.dot(p) * (T::one() - c.clone());
    p * c + k.cross(p) * s + k * along
}

/// Pinhole projection with Brown–Conrady distortion, generic over the scalar
/// so `tiny-solver` can differentiate it with dual numbers.
fn project<T: RealField>(
    k: &DVector<T>,
    d: &DVector<T>,
    pose: &DVector<T>,
    object: &Vector3<f64>,
) -> (T, T) {
    let r = Vector3::new(pose[0].clone(), pose[1].clone(), pose[2].clone());
    let t = Vector3::new(pose[3].clone(), pose[4].clone(), pose[5].clone());
    let p = Vector3::new(lit(object.x), lit(object.y), lit(object.z));
    let pc = rotate(&r, &p) + t;

    let x = pc.x.clone() / pc.z.clone();
    let y = pc.y.clone() / pc.z.clone();
    let two: T = lit(2.0);
    let r2 = x.clone() * x.clone() + y.clone() * y.clone();
    let radial = T::one()
        + r2.clone()
            * (d[0].clone() + r2.clone() * (d[1].clone() + r2.clone() * d[4].clone()));
    let xy = x.clone() * y.clone();
    let xd = x.clone() * radial.clone()
        + two.clone() * d[2].clone() * xy.clone()
        + d[3].clone() * (r2.clone() + two.clone() * x.clone() * x);
    let yd = y.clone() * radial
        + d[2].clone() * (r2 + two.clone() * y.clone() * y)
        + two * d[3].clone() * xy;

    (
        k[0].clone() * xd + k[2].clone(),
        k[1].clone() * yd + k[3].clone(),
    )
}

/// Pixel residual of one board corner.
#[derive(Debug, Clone)]
struct ReprojectionFactor {
    object: Vector3<f64>,
    image: [f64; 2],
}

impl<T: RealField> Factor<T> for ReprojectionFactor {
    fn residual_func(&self, params: &[DVector<T>]) -> DVector<T> {
        debug_assert_eq!(params.len(), 3, "expected [intrinsics, distortion, pose]");
        let (u, v) = project(&params[0], &params[1], &params[2], &self.object);
        DVector::from_vec(vec![u - lit(self.image[0]), v - lit(self.image[1])])
    }
}

fn block(solution: &HashMap<String, DVector<f64>>, key: &str) -> Result<DVector<f64>, CalibError> {
    solution
        .get(key)
        .cloned()
        .ok_or_else(|| CalibError::Refinement(format!("missing parameter block {key}")))
}

/// Refined model returned by [`refine_reprojection`].
pub(crate) struct Refined {
    pub camera: CameraMatrix,
    pub distortion: Distortion,
    pub poses: Vec<ViewPose>,
}

/// Minimise the summed squared reprojection error over intrinsics,
/// distortion and every view pose with Levenberg–Marquardt.
///
/// `p1`/`p2` and `k3` stay at their initial values when the options fix
/// them.
pub(crate) fn refine_reprojection(
    views: &[PlanarView],
    camera: &CameraMatrix,
    distortion: &Distortion,
    poses: &[ViewPose],
    options: &CalibrationOptions,
) -> Result<Refined, CalibError> {
    let mut problem = Problem::new();
    let mut initial = HashMap::new();
    initial.insert(
        INTRINSICS.to_string(),
        DVector::from_vec(vec![camera.fx, camera.fy, camera.cx, camera.cy]),
    );
    initial.insert(
        DISTORTION.to_string(),
        DVector::from_vec(distortion.to_array().to_vec()),
    );

    for (i, (view, pose)) in views.iter().zip(poses).enumerate() {
        let key = pose_key(i);
        initial.insert(
            key.clone(),
            DVector::from_vec(vec![
                pose.rvec.x,
                pose.rvec.y,
                pose.rvec.z,
                pose.tvec.x,
                pose.tvec.y,
                pose.tvec.z,
            ]),
        );
        for (obj, img) in view.object.iter().zip(&view.image) {
            let factor = ReprojectionFactor {
                object: obj.coords,
                image: [img.x, img.y],
            };
            problem.add_residual_block(
                2,
                &[INTRINSICS, DISTORTION, key.as_str()],
                Box::new(factor),
                None,
            );
        }
    }

    if options.zero_tangent {
        problem.fix_variable(DISTORTION, 2);
        problem.fix_variable(DISTORTION, 3);
    }
    if options.fix_k3 {
        problem.fix_variable(DISTORTION, 4);
    }

    let opts = OptimizerOptions {
        max_iteration: options.max_iters,
        min_abs_error_decrease_threshold: 1e-12,
        min_rel_error_decrease_threshold: 1e-12,
        min_error_threshold: 1e-16,
        ..OptimizerOptions::default()
    };

    let solution = LevenbergMarquardtOptimizer::default()
        .optimize(&problem, &initial, Some(opts))
        .ok_or_else(|| CalibError::Refinement("Levenberg-Marquardt step failed".to_string()))?;

    let k = block(&solution, INTRINSICS)?;
    let d = block(&solution, DISTORTION)?;
    let mut refined_poses = Vec::with_capacity(views.len());
    for i in 0..views.len() {
        let p = block(&solution, &pose_key(i))?;
        refined_poses.push(ViewPose {
            rvec: Vector3::new(p[0], p[1], p[2]),
            tvec: Vector3::new(p[3], p[4], p[5]),
        });
    }
    debug!(
        "refined fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        k[0], k[1], k[2], k[3]
    );

    Ok(Refined {
        camera: CameraMatrix {
            fx: k[0],
            fy: k[1],
            cx: k[2],
            cy: k[3],
        },
        distortion: Distortion::from_array([d[0], d[1], d[2], d[3], d[4]]),
        poses: refined_poses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::project_points;
    use nalgebra::Point3;

    #[test]
    fn generic_projection_matches_camera_model() {
        let cam = CameraMatrix {
            fx: 600.0,
            fy: 590.0,
            cx: 320.0,
            cy: 240.0,
        };
        let dist = Distortion {
            k1: -0.2,
            k2: 0.05,
            p1: 0.001,
            p2: -0.0007,
            k3: 0.01,
        };
        let pose = ViewPose {
            rvec: Vector3::new(0.2, -0.3, 0.1),
            tvec: Vector3::new(-50.0, 20.0, 400.0),
        };
        let obj = Point3::new(30.0, 60.0, 0.0);
        let expected = project_points(&[obj], &pose, &cam, &dist)[0];

        let k = DVector::from_vec(vec![cam.fx, cam.fy, cam.cx, cam.cy]);
        let d = DVector::from_vec(dist.to_array().to_vec());
        let p = DVector::from_vec(vec![0.2, -0.3, 0.1, -50.0, 20.0, 400.0]);
        let (u, v) = project(&k, &d, &p, &obj.coords);
        assert!((u - expected.x).abs() < 1e-9, "{u} vs {}", expected.x);
        assert!((v - expected.y).abs() < 1e-9, "{v} vs {}", expected.y);
    }

    #[test]
    fn small_rotation_uses_first_order_form() {
        let r = Vector3::new(1e-10, 0.0, 0.0);
        let p = Vector3::new(0.0, 1.0, 0.0);
        let q = rotate(&r, &p);
        assert!((q - Vector3::new(0.0, 1.0, 1e-10)).norm() < 1e-15);
    }
}
