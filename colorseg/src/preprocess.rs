//! Image loading and preprocessing.
//!
//! Decoding, the deterministic resize, and the conversions between 8-bit
//! images and the `(H*W, 3)` floating point pixel matrix the models consume.

use std::path::Path;

use image::{imageops, imageops::FilterType, RgbImage};
use ndarray::Array2;

use crate::error::{SegmentationError, SegmentationResult};

/// Load an image from disk and convert it to 8-bit RGB.
pub fn load_image(path: &Path) -> SegmentationResult<RgbImage> {
    let image = image::open(path).map_err(|source| SegmentationError::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(image.to_rgb8())
}

/// Resize to the target dimensions with the Triangle filter.
///
/// The filter kernel is scaled by the downsampling ratio, which makes this
/// the crate's closest match to area-averaging interpolation. The refinement
/// threshold was tuned against images resized this way, so the filter choice
/// is part of the pipeline contract.
pub fn resize_image(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.width() == width && image.height() == height {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Flatten an image into a `(H*W, 3)` matrix of pixel color vectors in
/// row-major pixel order. The layout is reversible: row `y * W + x` holds
/// pixel `(x, y)`.
pub fn image_to_pixels(image: &RgbImage) -> Array2<f64> {
    let width = image.width() as usize;
    let n_pixels = width * image.height() as usize;
    Array2::from_shape_fn((n_pixels, 3), |(i, channel)| {
        let x = (i % width) as u32;
        let y = (i / width) as u32;
        f64::from(image.get_pixel(x, y).0[channel])
    })
}
