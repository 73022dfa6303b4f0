//! Pieces shared by the `camera-calibration` and `motion-detect` binaries.

use crate::detect::DetectError;
use crate::{calib, chessboard, motion};
use log::LevelFilter;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("invalid pattern {0:?}: expected COLS,ROWS")]
    Pattern(String),

    #[error("invalid input mask {mask}: {source}")]
    Mask {
        mask: String,
        source: glob::PatternError,
    },

    #[error("no input images match {0}")]
    NoInput(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Detect(#[from] DetectError),

    #[error(transparent)]
    Chessboard(#[from] chessboard::ChessboardError),

    #[error(transparent)]
    Calib(#[from] calib::CalibError),

    #[error(transparent)]
    Motion(#[from] motion::MotionError),
}

/// Largest accepted inner-corner count along one board side.
pub const MAX_PATTERN_SIDE: u32 = 1000;

/// Parse `COLS,ROWS` (also accepts `x` as separator). Each side must lie in
/// `2..=MAX_PATTERN_SIDE`.
pub fn parse_pattern(s: &str) -> Result<(u32, u32), CliError> {
    let bad = || CliError::Pattern(s.to_string());
    let (cols, rows) = s.split_once([',', 'x']).ok_or_else(bad)?;
    let cols = cols.trim().parse::<u32>().map_err(|_| bad())?;
    let rows = rows.trim().parse::<u32>().map_err(|_| bad())?;
    let side = 2..=MAX_PATTERN_SIDE;
    if !side.contains(&cols) || !side.contains(&rows) {
        return Err(bad());
    }
    Ok((cols, rows))
}

/// Files matching a glob mask, sorted by path.
pub fn list_files(mask: &str) -> Result<Vec<PathBuf>, CliError> {
    let entries = glob::glob(mask).map_err(|source| CliError::Mask {
        mask: mask.to_string(),
        source,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("skipping unreadable path: {e}");
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Read a JSON config, or the defaults when no path is given.
pub fn load_json_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, CliError> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Create `dir` (and parents) if it does not exist yet.
pub fn ensure_dir(dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(dir).map_err(|source| CliError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// File stem for output naming, `frame` if the path has none.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string())
}

pub fn level_from_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the workspace logger, or a `tracing` subscriber that also
/// captures `log` records when the `tracing` feature is on.
pub fn init_logging(verbose: u8) {
    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init();
        let default = match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        };
        crate::core::init_tracing(default, false);
    }

    #[cfg(not(feature = "tracing"))]
    {
        let _ = crate::core::init_with_level(level_from_verbosity(verbose));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_parsing() {
        assert_eq!(parse_pattern("7,5").unwrap(), (7, 5));
        assert_eq!(parse_pattern(" 9 x 6 ").unwrap(), (9, 6));
        assert!(matches!(parse_pattern("7"), Err(CliError::Pattern(_))));
        assert!(matches!(parse_pattern("a,5"), Err(CliError::Pattern(_))));
        assert!(matches!(parse_pattern("1,5"), Err(CliError::Pattern(_))));
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        assert_eq!(parse_pattern("1000,2").unwrap(), (1000, 2));
        assert!(matches!(
            parse_pattern("1001,5"),
            Err(CliError::Pattern(_))
        ));
        assert!(matches!(
            parse_pattern("70000,70000"),
            Err(CliError::Pattern(_))
        ));
    }

    #[test]
    fn files_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.jpg", "a.jpg", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let files = list_files(&format!("{}/*.jpg", dir.path().display())).unwrap();
        let names: Vec<String> = files.iter().map(|p| file_stem(p)).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(matches!(list_files("[unclosed"), Err(CliError::Mask { .. })));
    }

    #[test]
    fn config_defaults_and_overrides() {
        let cfg: motion::MotionParams = load_json_config(None).unwrap();
        assert_eq!(cfg, motion::MotionParams::default());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("motion.json");
        std::fs::write(&path, r#"{ "threshold": 40 }"#).unwrap();
        let cfg: motion::MotionParams = load_json_config(Some(&path)).unwrap();
        assert_eq!(cfg.threshold, 40);
        assert_eq!(cfg.blur_kernel, 8);

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_json_config::<motion::MotionParams>(Some(&path)),
            Err(CliError::Config { .. })
        ));
    }

    #[test]
    fn verbosity_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::Info);
        assert_eq!(level_from_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_from_verbosity(5), LevelFilter::Trace);
    }
}
