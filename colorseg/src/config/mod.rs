//! Configuration module for the segmentation pipeline.
//!
//! This module provides configuration structures and enums for the pipeline.
//! It is organized into two main submodules:
//! - `core`: Contains the main configuration structures
//! - `enums`: Contains all enumeration types used in configurations

pub mod core;
pub mod enums;

pub use core::{InputConfig, MixtureConfig, RefinementConfig, SegmentationConfig};
pub use enums::ClusterSelection;
