//! Frame sources feeding the motion detector.

use crate::error::MotionError;
use camtools_core::RgbImage;
use std::collections::VecDeque;

#[cfg(feature = "image")]
use std::path::{Path, PathBuf};

/// Sequential supplier of RGB frames.
pub trait FrameSource {
    /// Next frame, `Ok(None)` at the end of the stream.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, MotionError>;

    /// Frame size if known before reading.
    fn resolution(&self) -> Option<(usize, usize)> {
        None
    }
}

/// In-memory frame queue.
#[derive(Debug, Default)]
pub struct FrameQueue {
    frames: VecDeque<RgbImage>,
}

impl From<Vec<RgbImage>> for FrameQueue {
    fn from(frames: Vec<RgbImage>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for FrameQueue {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, MotionError> {
        Ok(self.frames.pop_front())
    }

    fn resolution(&self) -> Option<(usize, usize)> {
        self.frames.front().map(|f| (f.width, f.height))
    }
}

#[cfg(feature = "image")]
const FRAME_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm"];

/// Frames decoded from image files in lexicographic path order.
#[cfg(feature = "image")]
#[derive(Debug)]
pub struct ImageSequence {
    paths: VecDeque<PathBuf>,
    resolution: Option<(usize, usize)>,
}

#[cfg(feature = "image")]
impl ImageSequence {
    /// Open a directory (every image file inside) or a glob mask.
    pub fn open(input: &str) -> Result<Self, MotionError> {
        let dir = Path::new(input);
        let mut paths = if dir.is_dir() {
            list_dir(dir)?
        } else {
            list_glob(input)?
        };
        if paths.is_empty() {
            return Err(MotionError::NoFrames(input.to_string()));
        }
        paths.sort();
        let resolution = image::image_dimensions(&paths[0])
            .ok()
            .map(|(w, h)| (w as usize, h as usize));
        log::debug!("{} frames in {input}", paths.len());
        Ok(Self {
            paths: paths.into(),
            resolution,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(feature = "image")]
fn is_frame_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

#[cfg(feature = "image")]
fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, MotionError> {
    let entries = std::fs::read_dir(dir).map_err(|source| MotionError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut out = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| MotionError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if is_frame_file(&path) {
            out.push(path);
        }
    }
    Ok(out)
}

#[cfg(feature = "image")]
fn list_glob(pattern: &str) -> Result<Vec<PathBuf>, MotionError> {
    let entries = glob::glob(pattern).map_err(|source| MotionError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut out = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => out.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("skipping unreadable path: {e}"),
        }
    }
    Ok(out)
}

#[cfg(feature = "image")]
impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, MotionError> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let decoded = image::open(&path)
            .map_err(|source| MotionError::Decode {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        Ok(Some(RgbImage {
            width: decoded.width() as usize,
            height: decoded.height() as usize,
            data: decoded.into_raw(),
        }))
    }

    fn resolution(&self) -> Option<(usize, usize)> {
        self.resolution
    }
}

#[cfg(all(test, feature = "image"))]
mod tests {
    use super::*;

    fn write_frame(dir: &Path, name: &str, v: u8) {
        let img = image::RgbImage::from_pixel(6, 4, image::Rgb([v, v, v]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn directory_frames_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "b.png", 20);
        write_frame(dir.path(), "a.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let mut seq = ImageSequence::open(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(seq.len(), 2);
        assert_eq!(seq.resolution(), Some((6, 4)));
        assert_eq!(seq.next_frame().unwrap().unwrap().data[0], 10);
        assert_eq!(seq.next_frame().unwrap().unwrap().data[0], 20);
        assert!(seq.next_frame().unwrap().is_none());
    }

    #[test]
    fn glob_mask_selects_files() {
        let dir = tempfile::tempdir().unwrap();
        write_frame(dir.path(), "f_001.png", 1);
        write_frame(dir.path(), "f_002.png", 2);
        write_frame(dir.path(), "other.png", 3);
        let mask = format!("{}/f_*.png", dir.path().display());
        let seq = ImageSequence::open(&mask).unwrap();
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn empty_input_cannot_be_opened() {
        let dir = tempfile::tempdir().unwrap();
        let mask = format!("{}/*.png", dir.path().display());
        let err = ImageSequence::open(&mask).unwrap_err();
        assert!(err.to_string().starts_with("Unable to open"));
    }

    #[test]
    fn corrupt_frame_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let mut seq = ImageSequence::open(dir.path().to_str().unwrap()).unwrap();
        assert!(matches!(seq.next_frame(), Err(MotionError::Decode { .. })));
    }
}
