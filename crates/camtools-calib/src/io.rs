use crate::calibrate::CalibrationResult;
use crate::camera::{CameraMatrix, Distortion};
use crate::error::CalibError;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Persisted calibration: camera matrix rows and `k1 k2 p1 p2 k3`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationFile {
    pub camera_matrix: [[f64; 3]; 3],
    pub dist_coeffs: [f64; 5],
    pub rms: f64,
    #[serde(default)]
    pub reprojection_error: Option<f64>,
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default)]
    pub views: usize,
}

impl CalibrationFile {
    pub fn from_result(result: &CalibrationResult, reprojection_error: Option<f64>) -> Self {
        let k = result.camera.to_matrix();
        Self {
            camera_matrix: [
                [k[(0, 0)], k[(0, 1)], k[(0, 2)]],
                [k[(1, 0)], k[(1, 1)], k[(1, 2)]],
                [k[(2, 0)], k[(2, 1)], k[(2, 2)]],
            ],
            dist_coeffs: result.distortion.to_array(),
            rms: result.rms,
            reprojection_error,
            image_width: result.image_width,
            image_height: result.image_height,
            views: result.poses.len(),
        }
    }

    pub fn camera(&self) -> CameraMatrix {
        let m = &self.camera_matrix;
        CameraMatrix::from_matrix(&Matrix3::new(
            m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
        ))
    }

    pub fn distortion(&self) -> Distortion {
        Distortion::from_array(self.dist_coeffs)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| CalibError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| CalibError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CalibError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| CalibError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}
