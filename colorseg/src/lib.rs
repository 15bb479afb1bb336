//! Fine segmentation of color-cluster foregrounds.
//!
//! The image is first roughly clustered into a foreground and a background
//! class with a two-component Gaussian mixture; the foreground class is then
//! refined to the pixels that belong to the cluster of interest with high
//! probability density. Pixels with much lower density are pushed back to
//! the background class.

mod config;
mod error;
mod masking;
mod models;
mod pipeline;
mod preprocess;
mod sink;

#[cfg(test)]
mod tests;

pub use config::{
    ClusterSelection, InputConfig, MixtureConfig, RefinementConfig, SegmentationConfig,
};
pub use error::{SegmentationError, SegmentationResult};
pub use masking::{apply_mask, normalize_map, probability_map, rough_mask, threshold_map};
pub use models::{GaussianMixture, MultivariateNormal};
pub use pipeline::{Segmentation, SegmentationPipeline};
pub use preprocess::{image_to_pixels, load_image, resize_image};
pub use sink::{Artifact, ArtifactSink, DirectorySink, NullSink};
