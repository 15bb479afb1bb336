//! Enumeration types used in configurations.

use serde::{Deserialize, Serialize};

/// Strategy for choosing the cluster of interest after fitting.
///
/// Mixture fitting does not guarantee any component ordering across runs or
/// library implementations, so relying on a fixed index couples the caller to
/// an arbitrary fitting outcome. `ClosestTo` ranks the fitted components by
/// squared Euclidean distance of their mean to a reference color instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterSelection {
    /// Select the component at a fixed index, as the original pipeline did.
    Index(usize),
    /// Select the component whose mean is closest to this RGB reference color.
    ClosestTo([u8; 3]),
}

impl ClusterSelection {
    /// Reference color for pure blue in RGB component order.
    pub const BLUE: [u8; 3] = [0, 0, 255];
}

impl Default for ClusterSelection {
    fn default() -> Self {
        Self::ClosestTo(Self::BLUE)
    }
}
