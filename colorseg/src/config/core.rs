//! Core configuration structures for the segmentation pipeline.
//!
//! This module contains the primary configuration structures that define
//! the pipeline's input handling, mixture fitting, and density refinement
//! behavior.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{SegmentationError, SegmentationResult};

use super::enums::ClusterSelection;

/// Main configuration for the segmentation pipeline.
///
/// This struct aggregates all other configuration modules for the pipeline,
/// including input handling, mixture model fitting, and mask refinement. It
/// is JSON-(de)serializable so a full run can be described by a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Input and preprocessing configuration.
    pub input: InputConfig,
    /// Mixture model fitting configuration.
    pub mixture: MixtureConfig,
    /// Density refinement configuration.
    pub refinement: RefinementConfig,
}

/// Input and preprocessing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Path of the image to segment.
    pub image_path: PathBuf,
    /// Width the input is resized to before clustering.
    pub resize_width: u32,
    /// Height the input is resized to before clustering.
    pub resize_height: u32,
}

/// Mixture model fitting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixtureConfig {
    /// Number of mixture components. The pipeline separates foreground from
    /// background, so this stays at 2.
    pub n_components: usize,
    /// Seed for the component initialization. Identical seeds and inputs
    /// produce bit-identical fits.
    pub random_seed: u64,
    /// Upper bound on EM iterations.
    pub max_iterations: usize,
    /// Convergence tolerance on the change in mean log-likelihood.
    pub tolerance: f64,
    /// Regularization added to covariance diagonals each M-step. Keeps
    /// single-color components from collapsing to a singular covariance.
    pub reg_covar: f64,
}

/// Density refinement configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Density threshold above which a pixel stays in the refined mask.
    ///
    /// The default was tuned empirically for 8-bit color magnitudes at the
    /// default 1200x800 resize and is not portable across image scales or
    /// color depths.
    pub probability_threshold: f64,
    /// How the cluster of interest is chosen after fitting.
    pub cluster_selection: ClusterSelection,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            image_path: PathBuf::new(),
            resize_width: 1200,
            resize_height: 800,
        }
    }
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            n_components: 2,
            random_seed: 0,
            max_iterations: 100,
            tolerance: 1e-4,
            reg_covar: 1e-6,
        }
    }
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            probability_threshold: 5e-9,
            cluster_selection: ClusterSelection::default(),
        }
    }
}

impl SegmentationConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the input configuration.
    pub fn with_input(mut self, input: InputConfig) -> Self {
        self.input = input;
        self
    }

    /// Replace the mixture configuration.
    pub fn with_mixture(mut self, mixture: MixtureConfig) -> Self {
        self.mixture = mixture;
        self
    }

    /// Replace the refinement configuration.
    pub fn with_refinement(mut self, refinement: RefinementConfig) -> Self {
        self.refinement = refinement;
        self
    }

    /// Validate the configuration and return appropriate errors for invalid
    /// settings.
    pub fn validate(&self) -> SegmentationResult<()> {
        if self.input.resize_width == 0 || self.input.resize_height == 0 {
            return Err(SegmentationError::InvalidConfiguration {
                reason: format!(
                    "resize dimensions must be non-zero, got {}x{}",
                    self.input.resize_width, self.input.resize_height
                ),
            });
        }
        if self.mixture.n_components == 0 {
            return Err(SegmentationError::InvalidConfiguration {
                reason: "at least one mixture component is required".to_string(),
            });
        }
        if !(self.mixture.tolerance > 0.0) {
            return Err(SegmentationError::InvalidConfiguration {
                reason: format!(
                    "convergence tolerance must be positive, got {}",
                    self.mixture.tolerance
                ),
            });
        }
        if !(self.mixture.reg_covar >= 0.0) {
            return Err(SegmentationError::InvalidConfiguration {
                reason: format!(
                    "covariance regularization must be non-negative, got {}",
                    self.mixture.reg_covar
                ),
            });
        }
        if !self.refinement.probability_threshold.is_finite()
            || self.refinement.probability_threshold < 0.0
        {
            return Err(SegmentationError::InvalidConfiguration {
                reason: format!(
                    "probability threshold must be finite and non-negative, got {}",
                    self.refinement.probability_threshold
                ),
            });
        }
        if let ClusterSelection::Index(index) = self.refinement.cluster_selection {
            if index >= self.mixture.n_components {
                return Err(SegmentationError::InvalidConfiguration {
                    reason: format!(
                        "cluster index {} is out of range for {} components",
                        index, self.mixture.n_components
                    ),
                });
            }
        }
        Ok(())
    }
}

impl InputConfig {
    /// Create an input configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path of the image to segment.
    pub fn with_image_path(mut self, image_path: impl Into<PathBuf>) -> Self {
        self.image_path = image_path.into();
        self
    }

    /// Set the resize target dimensions.
    pub fn with_resize(mut self, width: u32, height: u32) -> Self {
        self.resize_width = width;
        self.resize_height = height;
        self
    }
}

impl MixtureConfig {
    /// Create a mixture configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of mixture components.
    pub fn with_n_components(mut self, n_components: usize) -> Self {
        self.n_components = n_components;
        self
    }

    /// Set the initialization seed.
    pub fn with_random_seed(mut self, random_seed: u64) -> Self {
        self.random_seed = random_seed;
        self
    }

    /// Set the EM iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set the covariance regularization term.
    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }
}

impl RefinementConfig {
    /// Create a refinement configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the density threshold.
    pub fn with_probability_threshold(mut self, probability_threshold: f64) -> Self {
        self.probability_threshold = probability_threshold;
        self
    }

    /// Set the cluster selection strategy.
    pub fn with_cluster_selection(mut self, cluster_selection: ClusterSelection) -> Self {
        self.cluster_selection = cluster_selection;
        self
    }
}
