use crate::{chessboard, core};
use chess_corners::{find_chess_corners_image, ChessConfig, ChessError, CornerDescriptor};
use nalgebra::Point2;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Errors produced by the high-level facade helpers.
#[derive(thiserror::Error, Debug)]
pub enum DetectError {
    #[error("invalid grayscale image buffer length (expected {expected} bytes, got {got})")]
    InvalidGrayBuffer { expected: usize, got: usize },

    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: ::image::ImageError,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: ::image::ImageError,
    },

    #[error(transparent)]
    Corners(#[from] ChessError),

    #[error(transparent)]
    Chessboard(#[from] chessboard::ChessboardError),
}

pub use crate::core::default_chess_config;

/// Borrow an `image::GrayImage` as a `camtools-core` view.
pub fn gray_view(img: &::image::GrayImage) -> core::GrayImageView<'_> {
    core::GrayImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

pub fn rgb_view(img: &::image::RgbImage) -> core::RgbImageView<'_> {
    core::RgbImageView {
        width: img.width() as usize,
        height: img.height() as usize,
        data: img.as_raw(),
    }
}

/// Move a `camtools-core` gray buffer into an `image::GrayImage`.
pub fn to_image_gray(img: core::GrayImage) -> Result<::image::GrayImage, DetectError> {
    let (width, height) = (img.width, img.height);
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(DetectError::InvalidDimensions { width, height });
    };
    ::image::GrayImage::from_raw(w, h, img.data)
        .ok_or(DetectError::InvalidDimensions { width, height })
}

pub fn to_image_rgb(img: core::RgbImage) -> Result<::image::RgbImage, DetectError> {
    let (width, height) = (img.width, img.height);
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(DetectError::InvalidDimensions { width, height });
    };
    ::image::RgbImage::from_raw(w, h, img.data)
        .ok_or(DetectError::InvalidDimensions { width, height })
}

/// Decode any supported image file and convert it to 8-bit luma.
pub fn load_gray(path: impl AsRef<Path>) -> Result<::image::GrayImage, DetectError> {
    let path = path.as_ref();
    ::image::open(path)
        .map(|img| img.to_luma8())
        .map_err(|source| DetectError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Encode a gray buffer; the format follows the file extension.
pub fn save_gray(path: impl AsRef<Path>, img: core::GrayImage) -> Result<(), DetectError> {
    let path = path.as_ref();
    to_image_gray(img)?
        .save(path)
        .map_err(|source| DetectError::Write {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save_rgb(path: impl AsRef<Path>, img: core::RgbImage) -> Result<(), DetectError> {
    let path = path.as_ref();
    to_image_rgb(img)?
        .save(path)
        .map_err(|source| DetectError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Detect raw ChESS corners using `chess-corners`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(img, cfg), fields(width = img.width(), height = img.height()))
)]
pub fn detect_chess_corners_raw(
    img: &::image::GrayImage,
    cfg: &ChessConfig,
) -> Result<Vec<CornerDescriptor>, DetectError> {
    Ok(find_chess_corners_image(img, cfg)?)
}

/// Detect ChESS corners and adapt them into `camtools-core::Corner`.
pub fn detect_corners(
    img: &::image::GrayImage,
    cfg: &ChessConfig,
) -> Result<Vec<core::Corner>, DetectError> {
    Ok(detect_chess_corners_raw(img, cfg)?
        .iter()
        .map(core::adapt_chess_corner)
        .collect())
}

/// Run the chessboard detector end-to-end: ChESS corners -> chessboard grid.
#[cfg_attr(
    feature = "tracing",
    instrument(
        level = "info",
        skip(img, chess_cfg, params),
        fields(width = img.width(), height = img.height())
    )
)]
pub fn detect_chessboard(
    img: &::image::GrayImage,
    chess_cfg: &ChessConfig,
    params: chessboard::ChessboardParams,
) -> Result<Option<chessboard::ChessboardDetectionResult>, DetectError> {
    let corners = detect_corners(img, chess_cfg)?;
    Ok(chessboard::ChessboardDetector::new(params).detect_from_corners(&corners))
}

/// Complete, row-major, sub-pixel corner list of the finder's pattern.
pub fn find_chessboard(
    img: &::image::GrayImage,
    finder: &chessboard::ChessboardFinder,
) -> Result<Vec<Point2<f32>>, DetectError> {
    Ok(finder.find(&gray_view(img))?)
}

/// Build an `image::GrayImage` from a raw grayscale buffer.
pub fn gray_image_from_slice(
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<::image::GrayImage, DetectError> {
    let (w, h) = (width as usize, height as usize);
    let Some(expected) = w.checked_mul(h) else {
        return Err(DetectError::InvalidDimensions {
            width: w,
            height: h,
        });
    };
    if pixels.len() != expected {
        return Err(DetectError::InvalidGrayBuffer {
            expected,
            got: pixels.len(),
        });
    }
    ::image::GrayImage::from_raw(width, height, pixels.to_vec()).ok_or(
        DetectError::InvalidDimensions {
            width: w,
            height: h,
        },
    )
}
