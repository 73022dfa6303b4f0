use serde::{Deserialize, Serialize};

/// Tunables of the moving-average motion detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionParams {
    /// Box-blur kernel side in pixels.
    pub blur_kernel: usize,
    /// Weight of the newest frame in the running average.
    pub alpha: f32,
    /// Gray-level difference above which a pixel counts as changed.
    pub threshold: u8,
    /// Changed-pixel percentage above which the camera is assumed to be
    /// adjusting and the background is reset.
    pub reset_percent: f64,
    /// Changed-pixel percentage above which a frame is reported as motion.
    pub motion_percent: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            blur_kernel: 8,
            alpha: 0.03,
            threshold: 25,
            reset_percent: 25.0,
            motion_percent: 0.5,
        }
    }
}
