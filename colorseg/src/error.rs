use std::path::PathBuf;

use thiserror::Error;

/// The error type for `colorseg` operations.
///
/// Every fatal condition in the segmentation pipeline is represented here;
/// errors propagate to the caller unchanged, there is no retry logic anywhere
/// in the crate.
#[derive(Error, Debug)]
pub enum SegmentationError {
    /// The input file is missing, unreadable, or not decodable as an image.
    #[error("failed to load image at '{path}': {source}")]
    ImageLoad {
        /// Path of the image that could not be loaded.
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An artifact could not be written to disk.
    #[error("failed to save image at '{path}': {source}")]
    ImageSave {
        /// Path of the image that could not be written.
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// The output directory could not be created.
    #[error("failed to create output directory '{path}': {source}")]
    OutputDirectory {
        /// Directory that could not be created.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pixel population is too small or not varied enough for a stable
    /// mixture fit.
    #[error(
        "insufficient data to fit the mixture model: {required} distinct samples required, {available} available"
    )]
    InsufficientData {
        /// Usable (distinct) samples found in the population.
        available: usize,
        /// Samples required, one per mixture component.
        required: usize,
    },

    /// A covariance matrix is not positive definite, so its density is
    /// undefined. The original script never checked for this; the check is
    /// deliberate here since a singular matrix cannot be inverted.
    #[error("covariance matrix is singular (not positive definite), density evaluation is undefined")]
    SingularCovariance,

    /// A logically inconsistent configuration was provided.
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Two arrays that must share a shape do not.
    #[error("dimension mismatch: expected {expected_height}x{expected_width}, got {actual_height}x{actual_width}")]
    DimensionMismatch {
        expected_height: usize,
        expected_width: usize,
        actual_height: usize,
        actual_width: usize,
    },
}

/// A specialized `Result` type for `colorseg` operations.
pub type SegmentationResult<T> = Result<T, SegmentationError>;
