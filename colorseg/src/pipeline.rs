//! The two-stage segmentation pipeline.
//!
//! Stage one clusters pixel colors with a Gaussian mixture and cuts a rough
//! foreground mask; stage two re-scores the masked pixels against the
//! cluster-of-interest density and thresholds the result into the refined
//! mask. Data flows one way, each stage produces a fresh derived array, and
//! nothing is retried.

use image::{DynamicImage, RgbImage};
use log::{info, warn};
use ndarray::{Array2, ArrayView1};

use crate::config::{ClusterSelection, SegmentationConfig};
use crate::error::{SegmentationError, SegmentationResult};
use crate::masking;
use crate::models::{GaussianMixture, MultivariateNormal};
use crate::preprocess;
use crate::sink::{Artifact, ArtifactSink};

/// The outcome of one segmentation run.
///
/// All 2D arrays share the resized image's height/width; both images share
/// its full shape.
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// The input after the deterministic resize.
    pub resized: RgbImage,
    /// Hard cluster assignment mask from the mixture fit.
    pub rough_mask: Array2<u8>,
    /// Per-pixel density of the masked colors under the cluster of interest.
    pub probability_map: Array2<f64>,
    /// Thresholded probability map.
    pub refined_mask: Array2<u8>,
    /// The resized input with non-cluster pixels blacked out by the refined
    /// mask.
    pub foreground: RgbImage,
    /// Index of the cluster of interest within the fitted mixture.
    pub component: usize,
    /// The fitted mixture model.
    pub mixture: GaussianMixture,
}

impl Segmentation {
    /// Number of pixels inside the refined mask.
    pub fn foreground_pixel_count(&self) -> usize {
        self.refined_mask.iter().filter(|&&v| v != 0).count()
    }
}

/// Runs the fixed stage sequence described by a [`SegmentationConfig`].
#[derive(Debug, Clone)]
pub struct SegmentationPipeline {
    config: SegmentationConfig,
}

impl SegmentationPipeline {
    /// Validate the configuration and build a pipeline.
    pub fn new(config: SegmentationConfig) -> SegmentationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration.
    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Load the configured input image and segment it.
    pub fn run(&self, sink: &mut dyn ArtifactSink) -> SegmentationResult<Segmentation> {
        let image = preprocess::load_image(&self.config.input.image_path)?;
        self.segment(&image, sink)
    }

    /// Segment an already-loaded image.
    pub fn segment(
        &self,
        image: &RgbImage,
        sink: &mut dyn ArtifactSink,
    ) -> SegmentationResult<Segmentation> {
        let resized = preprocess::resize_image(
            image,
            self.config.input.resize_width,
            self.config.input.resize_height,
        );
        let height = resized.height() as usize;
        let width = resized.width() as usize;
        sink.publish(Artifact::Resized, &DynamicImage::ImageRgb8(resized.clone()))?;

        // Stage one: rough clustering.
        let pixels = preprocess::image_to_pixels(&resized);
        let mixture = GaussianMixture::fit(pixels.view(), &self.config.mixture)?;
        info!(
            "mixture fit: {} iterations, converged: {}, mean log-likelihood {:.6}",
            mixture.iterations(),
            mixture.converged(),
            mixture.log_likelihood()
        );
        let labels = mixture.predict(pixels.view())?;
        let component = resolve_component(&self.config.refinement.cluster_selection, &mixture)?;

        let rough_mask = masking::rough_mask(labels.view(), component, height, width)?;
        if rough_mask.iter().all(|&v| v == 0) {
            warn!(
                "cluster of interest {component} has no pixels after rough clustering; \
                 the refined mask will be empty"
            );
        }
        let rough_foreground = masking::apply_mask(&resized, &rough_mask)?;
        sink.publish(
            Artifact::RoughForeground,
            &DynamicImage::ImageRgb8(rough_foreground.clone()),
        )?;

        // Stage two: density refinement over the masked pixels.
        let (mean, covariance) =
            mixture
                .component(component)
                .ok_or_else(|| SegmentationError::InvalidConfiguration {
                    reason: format!(
                        "cluster index {} is out of range for {} components",
                        component,
                        mixture.n_components()
                    ),
                })?;
        let density = MultivariateNormal::new(mean.to_owned(), covariance)?;
        let masked_pixels = preprocess::image_to_pixels(&rough_foreground);
        let probability_map =
            masking::probability_map(masked_pixels.view(), &density, height, width)?;
        sink.publish(
            Artifact::ProbabilityMap,
            &DynamicImage::ImageLuma8(masking::normalize_map(&probability_map)),
        )?;

        let refined_mask =
            masking::threshold_map(&probability_map, self.config.refinement.probability_threshold);
        let foreground = masking::apply_mask(&resized, &refined_mask)?;
        sink.publish(
            Artifact::RefinedForeground,
            &DynamicImage::ImageRgb8(foreground.clone()),
        )?;
        sink.finish()?;

        Ok(Segmentation {
            resized,
            rough_mask,
            probability_map,
            refined_mask,
            foreground,
            component,
            mixture,
        })
    }
}

/// Pick the cluster of interest from a fitted mixture.
fn resolve_component(
    selection: &ClusterSelection,
    mixture: &GaussianMixture,
) -> SegmentationResult<usize> {
    match selection {
        ClusterSelection::Index(index) => {
            if *index < mixture.n_components() {
                Ok(*index)
            } else {
                Err(SegmentationError::InvalidConfiguration {
                    reason: format!(
                        "cluster index {} is out of range for {} components",
                        index,
                        mixture.n_components()
                    ),
                })
            }
        }
        ClusterSelection::ClosestTo(color) => {
            let reference = [
                f64::from(color[0]),
                f64::from(color[1]),
                f64::from(color[2]),
            ];
            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (j, mean) in mixture.means().rows().into_iter().enumerate() {
                let dist = squared_color_distance(mean, &reference);
                if dist < best_dist {
                    best = j;
                    best_dist = dist;
                }
            }
            Ok(best)
        }
    }
}

fn squared_color_distance(mean: ArrayView1<'_, f64>, reference: &[f64; 3]) -> f64 {
    mean.iter()
        .zip(reference.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum()
}
