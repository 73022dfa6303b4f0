//! Camera calibration from planar chessboard views.
//!
//! [`calibrate_camera`] takes per-view object/image correspondences and
//! returns intrinsics, five-coefficient distortion and one pose per view:
//!
//! 1. a board-to-image homography per view (`camtools_core`'s normalised DLT);
//! 2. Zhang's closed-form intrinsics with zero skew ([`estimate_intrinsics`]);
//! 3. a planar pose per view ([`estimate_pose`]);
//! 4. joint Levenberg–Marquardt refinement of all parameters (`tiny-solver`,
//!    forward-mode dual-number Jacobians).
//!
//! The resulting model drives [`undistort_points`], [`undistort_image`] and
//! [`optimal_new_camera_matrix`], and is persisted as a [`CalibrationFile`].

mod calibrate;
mod camera;
mod error;
mod io;
mod linear;
mod refine;
mod undistort;

pub use calibrate::{
    calibrate_camera, reprojection_error, CalibrationOptions, CalibrationResult, PlanarView,
};
pub use camera::{board_object_points, project_points, CameraMatrix, Distortion, ViewPose};
pub use error::CalibError;
pub use io::CalibrationFile;
pub use linear::{estimate_intrinsics, estimate_pose};
pub use undistort::{crop, optimal_new_camera_matrix, undistort_image, undistort_points, Roi};
