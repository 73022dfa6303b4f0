//! Motion detection against a moving-average background.
//!
//! ```
//! use camtools_core::RgbImage;
//! use camtools_motion::{MotionDetector, MotionParams};
//!
//! let mut detector = MotionDetector::new(MotionParams::default());
//! let frame = RgbImage::new(32, 24);
//! let report = detector.process(&frame.view()).unwrap();
//! assert_eq!(report.index, 0);
//! ```
//!
//! Frames come from any [`FrameSource`]; with the default `image` feature,
//! [`ImageSequence`] decodes a directory or glob mask of still images.

mod background;
mod detector;
mod error;
mod filters;
mod params;
mod source;

pub use background::MovingAverage;
pub use detector::{FrameReport, MotionDetector, MotionSummary};
pub use error::MotionError;
pub use filters::{abs_diff_rgb, box_blur_rgb, count_non_zero, rgb_to_gray, threshold_binary};
pub use params::MotionParams;
pub use source::{FrameQueue, FrameSource};

#[cfg(feature = "image")]
pub use source::ImageSequence;
