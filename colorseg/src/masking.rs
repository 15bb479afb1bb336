//! Mask construction and application.
//!
//! Small function-interface operations shared by the two pipeline stages:
//! turning hard labels into a rough mask, blacking out non-cluster pixels,
//! evaluating the per-pixel probability map, thresholding it into the
//! refined mask, and rendering the map for visualization.

use image::{GrayImage, Rgb, RgbImage};
use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::error::{SegmentationError, SegmentationResult};
use crate::models::MultivariateNormal;

/// Build the `{0,1}` rough mask from per-pixel hard labels.
///
/// `labels` is in row-major pixel order and must hold `height * width`
/// entries; entry `(y, x)` of the mask is 1 iff the pixel's label equals
/// `component`.
pub fn rough_mask(
    labels: ArrayView1<'_, usize>,
    component: usize,
    height: usize,
    width: usize,
) -> SegmentationResult<Array2<u8>> {
    if labels.len() != height * width {
        return Err(SegmentationError::DimensionMismatch {
            expected_height: height,
            expected_width: width,
            actual_height: labels.len(),
            actual_width: 1,
        });
    }
    Ok(Array2::from_shape_fn((height, width), |(y, x)| {
        u8::from(labels[y * width + x] == component)
    }))
}

/// Zero out every pixel whose mask entry is 0; pixels inside the mask keep
/// their original color.
pub fn apply_mask(image: &RgbImage, mask: &Array2<u8>) -> SegmentationResult<RgbImage> {
    let (height, width) = mask.dim();
    if image.width() as usize != width || image.height() as usize != height {
        return Err(SegmentationError::DimensionMismatch {
            expected_height: height,
            expected_width: width,
            actual_height: image.height() as usize,
            actual_width: image.width() as usize,
        });
    }
    Ok(RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if mask[[y as usize, x as usize]] != 0 {
            *image.get_pixel(x, y)
        } else {
            Rgb([0, 0, 0])
        }
    }))
}

/// Evaluate the component density for every pixel color vector and reshape
/// the result back into an `(height, width)` map.
///
/// The pixel matrix is expected to come from the *masked* image, so zeroed
/// background pixels are evaluated like any other vector; far from the
/// component mean their density underflows to 0.
pub fn probability_map(
    pixels: ArrayView2<'_, f64>,
    component: &MultivariateNormal,
    height: usize,
    width: usize,
) -> SegmentationResult<Array2<f64>> {
    if pixels.nrows() != height * width {
        return Err(SegmentationError::DimensionMismatch {
            expected_height: height,
            expected_width: width,
            actual_height: pixels.nrows(),
            actual_width: pixels.ncols(),
        });
    }
    Ok(Array2::from_shape_fn((height, width), |(y, x)| {
        component.pdf(pixels.row(y * width + x))
    }))
}

/// Threshold a probability map into a `{0,1}` mask; 1 iff the density is
/// strictly greater than `threshold`.
pub fn threshold_map(map: &Array2<f64>, threshold: f64) -> Array2<u8> {
    map.mapv(|density| u8::from(density > threshold))
}

/// Min-max rescale a probability map into an 8-bit grayscale rendering.
///
/// The minimum density maps to 0 and the maximum to 255. A constant map has
/// no dynamic range and renders as all zeros.
pub fn normalize_map(map: &Array2<f64>) -> GrayImage {
    let min = map.iter().copied().fold(f64::INFINITY, f64::min);
    let max = map.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    let (height, width) = map.dim();
    GrayImage::from_fn(width as u32, height as u32, |x, y| {
        let value = if range > 0.0 {
            ((map[[y as usize, x as usize]] - min) / range * 255.0).round() as u8
        } else {
            0
        };
        image::Luma([value])
    })
}
