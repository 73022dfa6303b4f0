use crate::camera::{project_points, CameraMatrix, Distortion, ViewPose};
use crate::error::CalibError;
use crate::linear::{estimate_intrinsics, estimate_pose};
use crate::refine::refine_reprojection;
use camtools_core::estimate_homography;
use log::{debug, info};
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Object/image correspondences of one board view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlanarView {
    /// Board points on the `Z = 0` plane.
    pub object: Vec<Point3<f64>>,
    /// Matching image points in pixels.
    pub image: Vec<Point2<f64>>,
}

impl PlanarView {
    pub fn new(object: Vec<Point3<f64>>, image: Vec<Point2<f64>>) -> Self {
        Self { object, image }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    /// Keep `k3` at zero.
    pub fix_k3: bool,
    /// Keep `p1` and `p2` at zero.
    pub zero_tangent: bool,
    pub max_iters: usize,
}

impl Default for CalibrationOptions {
    fn default() -> Self {
        Self {
            fix_k3: false,
            zero_tangent: false,
            max_iters: 100,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub camera: CameraMatrix,
    pub distortion: Distortion,
    /// One pose per input view, in input order.
    pub poses: Vec<ViewPose>,
    /// `sqrt(Σ‖e‖² / N_points)` over all views.
    pub rms: f64,
    /// RMS of the closed-form initialisation, before refinement.
    pub initial_rms: f64,
    pub image_width: u32,
    pub image_height: u32,
}

const MIN_VIEWS: usize = 3;

fn validate(views: &[PlanarView]) -> Result<(), CalibError> {
    if views.len() < MIN_VIEWS {
        return Err(CalibError::NotEnoughViews {
            needed: MIN_VIEWS,
            got: views.len(),
        });
    }
    for (i, v) in views.iter().enumerate() {
        if v.object.len() != v.image.len() || v.object.len() < 4 {
            return Err(CalibError::MismatchedPoints {
                view: i,
                object: v.object.len(),
                image: v.image.len(),
            });
        }
    }
    Ok(())
}

fn view_homography(i: usize, view: &PlanarView) -> Result<nalgebra::Matrix3<f64>, CalibError> {
    let board: Vec<Point2<f64>> = view.object.iter().map(|p| Point2::new(p.x, p.y)).collect();
    estimate_homography(&board, &view.image)
        .map(|h| h.to_matrix())
        .ok_or(CalibError::Homography { view: i })
}

/// Calibrate a camera from planar board views.
///
/// Homographies seed Zhang's closed-form intrinsics, which seed per-view
/// poses; everything is then refined jointly with `tiny-solver`'s
/// Levenberg–Marquardt, distortion starting at zero.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(views, options), fields(views = views.len()))
)]
pub fn calibrate_camera(
    views: &[PlanarView],
    image_width: u32,
    image_height: u32,
    options: &CalibrationOptions,
) -> Result<CalibrationResult, CalibError> {
    validate(views)?;

    let homographies = views
        .iter()
        .enumerate()
        .map(|(i, v)| view_homography(i, v))
        .collect::<Result<Vec<_>, _>>()?;
    let camera0 = estimate_intrinsics(&homographies, image_width, image_height)?;
    debug!(
        "initial intrinsics fx={:.2} fy={:.2} cx={:.2} cy={:.2}",
        camera0.fx, camera0.fy, camera0.cx, camera0.cy
    );

    let poses0 = homographies
        .iter()
        .map(|h| estimate_pose(&camera0, h))
        .collect::<Result<Vec<_>, _>>()?;
    let distortion0 = Distortion::default();
    let initial_rms = rms_over(views, &poses0, &camera0, &distortion0);
    debug!("initial rms {initial_rms:.4} px");

    let refined = refine_reprojection(views, &camera0, &distortion0, &poses0, options)?;
    let rms = rms_over(views, &refined.poses, &refined.camera, &refined.distortion);
    info!(
        "calibrated {} views, rms {:.4} px (initial {:.4} px)",
        views.len(),
        rms,
        initial_rms
    );

    Ok(CalibrationResult {
        camera: refined.camera,
        distortion: refined.distortion,
        poses: refined.poses,
        rms,
        initial_rms,
        image_width,
        image_height,
    })
}

fn rms_over(
    views: &[PlanarView],
    poses: &[ViewPose],
    camera: &CameraMatrix,
    distortion: &Distortion,
) -> f64 {
    let mut total = 0.0;
    let mut points = 0usize;
    for (view, pose) in views.iter().zip(poses) {
        let proj = project_points(&view.object, pose, camera, distortion);
        total += proj
            .iter()
            .zip(&view.image)
            .map(|(p, o)| (p - o).norm_squared())
            .sum::<f64>();
        points += view.object.len();
    }
    if points == 0 {
        return 0.0;
    }
    (total / points as f64).sqrt()
}

/// Root-mean-square reprojection distance over all points of `views`,
/// recomputed from the calibrated parameters.
pub fn reprojection_error(views: &[PlanarView], result: &CalibrationResult) -> f64 {
    rms_over(views, &result.poses, &result.camera, &result.distortion)
}
