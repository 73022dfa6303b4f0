use crate::background::MovingAverage;
use crate::error::MotionError;
use crate::filters::{abs_diff_rgb, box_blur_rgb, count_non_zero, rgb_to_gray, threshold_binary};
use crate::params::MotionParams;
use crate::source::FrameSource;
use camtools_core::{RgbImage, RgbImageView};
use log::{debug, info};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outcome for one processed frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Zero-based frame index.
    pub index: usize,
    /// Percentage of pixels that differ from the background.
    pub motion_percent: f64,
    /// Frame counts as motion.
    pub motion: bool,
    /// Background was reset to this frame.
    pub reset: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSummary {
    pub frames: usize,
    pub frames_with_motion: usize,
    pub resets: usize,
}

/// Moving-average frame differencing.
///
/// Each frame is blurred and folded into an `f32` running average. Pixels
/// whose gray-level distance to the average exceeds the threshold are counted.
/// A large changed fraction means the camera itself is adjusting, so the
/// background restarts from the current frame instead of reporting motion.
pub struct MotionDetector {
    params: MotionParams,
    background: Option<MovingAverage>,
    summary: MotionSummary,
}

impl MotionDetector {
    pub fn new(params: MotionParams) -> Self {
        Self {
            params,
            background: None,
            summary: MotionSummary::default(),
        }
    }

    pub fn params(&self) -> &MotionParams {
        &self.params
    }

    pub fn summary(&self) -> &MotionSummary {
        &self.summary
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, frame), fields(index = self.summary.frames))
    )]
    pub fn process(&mut self, frame: &RgbImageView<'_>) -> Result<FrameReport, MotionError> {
        let work = box_blur_rgb(frame, self.params.blur_kernel);
        let background = self
            .background
            .get_or_insert_with(|| MovingAverage::zeros(frame.width, frame.height));
        if (background.width, background.height) != (frame.width, frame.height) {
            return Err(MotionError::FrameSize {
                width: background.width,
                height: background.height,
                got_width: frame.width,
                got_height: frame.height,
            });
        }

        background.accumulate(&work.view(), self.params.alpha);
        let scaled = background.to_u8();
        let diff = abs_diff_rgb(&work.view(), &scaled.view());
        let gray = rgb_to_gray(&diff.view());
        let mask = threshold_binary(&gray.view(), self.params.threshold, 255);

        let total = (frame.width * frame.height).max(1);
        let motion_percent = 100.0 * count_non_zero(&mask.view()) as f64 / total as f64;

        let reset = motion_percent > self.params.reset_percent;
        if reset {
            background.reset(&work.view());
            self.summary.resets += 1;
            debug!(
                "frame {}: {:.2}% changed, background reset",
                self.summary.frames, motion_percent
            );
        }
        let motion = !reset && motion_percent > self.params.motion_percent;
        if motion {
            self.summary.frames_with_motion += 1;
        }

        let report = FrameReport {
            index: self.summary.frames,
            motion_percent,
            motion,
            reset,
        };
        self.summary.frames += 1;
        Ok(report)
    }

    /// Process every frame of `source`, calling `on_frame` after each one.
    ///
    /// A source error ends the run like the end of the stream; the frames
    /// processed so far are kept in the summary.
    pub fn run<S, F>(&mut self, source: &mut S, mut on_frame: F) -> Result<MotionSummary, MotionError>
    where
        S: FrameSource + ?Sized,
        F: FnMut(&FrameReport, &RgbImage) -> Result<(), MotionError>,
    {
        loop {
            let frame = match source.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    info!("No frame captured: {err}");
                    break;
                }
            };
            let report = self.process(&frame.view())?;
            on_frame(&report, &frame)?;
        }
        Ok(self.summary.clone())
    }
}
