use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum MotionError {
    #[error("frame size {got_width}x{got_height} differs from {width}x{height}")]
    FrameSize {
        width: usize,
        height: usize,
        got_width: usize,
        got_height: usize,
    },

    #[error("Unable to open {0}: no frames found")]
    NoFrames(String),

    #[cfg(feature = "image")]
    #[error("invalid input pattern {pattern}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[cfg(feature = "image")]
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
