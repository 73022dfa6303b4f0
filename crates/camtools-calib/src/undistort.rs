//! Point and image undistortion.

use crate::camera::{CameraMatrix, Distortion};
use camtools_core::{sample_bilinear_u8, GrayImage, GrayImageView};
use log::warn;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Pixel rectangle `[x, x + width) × [y, y + height)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Remove lens distortion from pixel coordinates.
///
/// Results are expressed in `new_camera` pixels, or in `camera` pixels when
/// no new matrix is given.
pub fn undistort_points(
    points: &[Point2<f64>],
    camera: &CameraMatrix,
    distortion: &Distortion,
    new_camera: Option<&CameraMatrix>,
) -> Vec<Point2<f64>> {
    let target = new_camera.unwrap_or(camera);
    points
        .iter()
        .map(|p| target.to_pixel(&distortion.undistort(&camera.to_normalized(p))))
        .collect()
}

/// Axis-aligned rectangle in normalised coordinates.
#[derive(Clone, Copy, Debug)]
struct NormRect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

const BORDER_SAMPLES: usize = 9;
const ROI_EPS: f64 = 1e-6;

impl NormRect {
    fn is_valid(&self) -> bool {
        [self.x0, self.y0, self.x1, self.y1]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 > self.x0
            && self.y1 > self.y0
    }
}

/// Outer (enclosing every undistorted pixel) and inner (only valid pixels)
/// rectangles of the undistorted image, in normalised coordinates.
///
/// Border samples the lens model cannot invert are skipped; a side without
/// any invertible sample stays infinite.
fn undistorted_rects(
    camera: &CameraMatrix,
    distortion: &Distortion,
    width: u32,
    height: u32,
) -> (NormRect, NormRect) {
    let n = BORDER_SAMPLES;
    let mut outer = NormRect {
        x0: f64::INFINITY,
        y0: f64::INFINITY,
        x1: f64::NEG_INFINITY,
        y1: f64::NEG_INFINITY,
    };
    let mut inner = NormRect {
        x0: f64::NEG_INFINITY,
        y0: f64::NEG_INFINITY,
        x1: f64::INFINITY,
        y1: f64::INFINITY,
    };
    let sx = (width.max(1) - 1) as f64 / (n - 1) as f64;
    let sy = (height.max(1) - 1) as f64 / (n - 1) as f64;

    for i in 0..n {
        for j in 0..n {
            let p = Point2::new(j as f64 * sx, i as f64 * sy);
            let Some(u) = distortion.try_undistort(&camera.to_normalized(&p)) else {
                continue;
            };
            outer.x0 = outer.x0.min(u.x);
            outer.y0 = outer.y0.min(u.y);
            outer.x1 = outer.x1.max(u.x);
            outer.y1 = outer.y1.max(u.y);
            if j == 0 {
                inner.x0 = inner.x0.max(u.x);
            }
            if j == n - 1 {
                inner.x1 = inner.x1.min(u.x);
            }
            if i == 0 {
                inner.y0 = inner.y0.max(u.y);
            }
            if i == n - 1 {
                inner.y1 = inner.y1.min(u.y);
            }
        }
    }
    (inner, outer)
}

fn full_frame(width: u32, height: u32) -> Roi {
    Roi {
        x: 0,
        y: 0,
        width,
        height,
    }
}

/// Camera matrix for undistorted output of the same size.
///
/// `alpha = 0` scales so that only valid pixels remain; `alpha = 1` keeps
/// every source pixel, leaving black borders. The returned [`Roi`] bounds the
/// all-valid region of the undistorted image.
///
/// Lens models that fold over inside the frame have no usable inverse at the
/// border; `camera` and the full frame are returned unchanged then.
pub fn optimal_new_camera_matrix(
    camera: &CameraMatrix,
    distortion: &Distortion,
    width: u32,
    height: u32,
    alpha: f64,
) -> (CameraMatrix, Roi) {
    let alpha = alpha.clamp(0.0, 1.0);
    let (inner, outer) = undistorted_rects(camera, distortion, width, height);
    if !inner.is_valid() || !outer.is_valid() {
        warn!("distortion model is not invertible at the image border; keeping the camera matrix");
        return (*camera, full_frame(width, height));
    }
    let w = (width.max(1) - 1) as f64;
    let h = (height.max(1) - 1) as f64;

    let fit = |r: &NormRect| {
        let fx = w / (r.x1 - r.x0);
        let fy = h / (r.y1 - r.y0);
        (fx, fy, -fx * r.x0, -fy * r.y0)
    };
    let (fx0, fy0, cx0, cy0) = fit(&inner);
    let (fx1, fy1, cx1, cy1) = fit(&outer);
    let new_camera = CameraMatrix {
        fx: fx0 * (1.0 - alpha) + fx1 * alpha,
        fy: fy0 * (1.0 - alpha) + fy1 * alpha,
        cx: cx0 * (1.0 - alpha) + cx1 * alpha,
        cy: cy0 * (1.0 - alpha) + cy1 * alpha,
    };
    if !(new_camera.fx.is_finite() && new_camera.fy.is_finite())
        || new_camera.fx <= 0.0
        || new_camera.fy <= 0.0
    {
        warn!("degenerate undistorted extent; keeping the camera matrix");
        return (*camera, full_frame(width, height));
    }

    let to_px = |x: f64, y: f64| new_camera.to_pixel(&Vector2::new(x, y));
    let a = to_px(inner.x0, inner.y0);
    let b = to_px(inner.x1, inner.y1);
    let x0 = (a.x - ROI_EPS).ceil().clamp(0.0, width as f64);
    let y0 = (a.y - ROI_EPS).ceil().clamp(0.0, height as f64);
    let x1 = ((b.x + ROI_EPS).floor() + 1.0).clamp(x0, width as f64);
    let y1 = ((b.y + ROI_EPS).floor() + 1.0).clamp(y0, height as f64);
    let roi = Roi {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    };
    (new_camera, roi)
}

/// Undistort a grayscale image: every output pixel is traced back through
/// `new_camera`, the lens model and `camera`, then sampled bilinearly.
/// Pixels that map outside the source are black.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = src.width, height = src.height))
)]
pub fn undistort_image(
    src: &GrayImageView<'_>,
    camera: &CameraMatrix,
    distortion: &Distortion,
    new_camera: &CameraMatrix,
) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    let (w, h) = (src.width as f64, src.height as f64);
    for v in 0..src.height {
        for u in 0..src.width {
            let n = new_camera.to_normalized(&Point2::new(u as f64, v as f64));
            let s = camera.to_pixel(&distortion.distort(&n));
            if s.x < -0.5 || s.y < -0.5 || s.x > w - 0.5 || s.y > h - 0.5 {
                continue;
            }
            let sx = s.x.clamp(0.0, w - 1.0) as f32;
            let sy = s.y.clamp(0.0, h - 1.0) as f32;
            out.data[v * src.width + u] = sample_bilinear_u8(src, sx, sy);
        }
    }
    out
}

/// Copy the `roi` region into a new image; the region is clipped to `src`.
pub fn crop(src: &GrayImageView<'_>, roi: &Roi) -> GrayImage {
    let x0 = (roi.x as usize).min(src.width);
    let y0 = (roi.y as usize).min(src.height);
    let x1 = (x0 + roi.width as usize).min(src.width);
    let y1 = (y0 + roi.height as usize).min(src.height);
    let mut out = GrayImage::new(x1 - x0, y1 - y0);
    for (dst_row, y) in (y0..y1).enumerate() {
        let src_row = &src.data[y * src.width + x0..y * src.width + x1];
        out.data[dst_row * out.width..(dst_row + 1) * out.width].copy_from_slice(src_row);
    }
    out
}
