use camtools_core::{RgbImage, RgbImageView};

/// Running weighted average of RGB frames in `f32`.
#[derive(Clone, Debug)]
pub struct MovingAverage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl MovingAverage {
    /// All-zero background of the given size.
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height * 3],
        }
    }

    /// `avg = (1 - alpha) * avg + alpha * frame`.
    pub fn accumulate(&mut self, frame: &RgbImageView<'_>, alpha: f32) {
        debug_assert_eq!(frame.data.len(), self.data.len());
        for (a, &v) in self.data.iter_mut().zip(frame.data) {
            *a = (1.0 - alpha) * *a + alpha * v as f32;
        }
    }

    /// Replace the background with `frame`.
    pub fn reset(&mut self, frame: &RgbImageView<'_>) {
        debug_assert_eq!(frame.data.len(), self.data.len());
        for (a, &v) in self.data.iter_mut().zip(frame.data) {
            *a = v as f32;
        }
    }

    /// Saturating `|round(x)|` per channel.
    pub fn to_u8(&self) -> RgbImage {
        RgbImage {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .map(|v| v.round().abs().min(255.0) as u8)
                .collect(),
        }
    }
}
