use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum CalibError {
    #[error("need at least {needed} views, got {got}")]
    NotEnoughViews { needed: usize, got: usize },

    #[error("view {view}: {object} object points but {image} image points")]
    MismatchedPoints {
        view: usize,
        object: usize,
        image: usize,
    },

    #[error("view {view}: homography estimation failed")]
    Homography { view: usize },

    #[error("degenerate view configuration: {0}")]
    Degenerate(&'static str),

    #[error("nonlinear refinement failed: {0}")]
    Refinement(String),

    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: u32, height: u32 },

    #[error("calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("calibration file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
