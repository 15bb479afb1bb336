//! Multivariate normal density evaluation.
//!
//! The covariance matrix is factorized once at construction; every density
//! query then costs a single forward substitution. The factorization doubles
//! as the singularity check: a matrix that is not positive definite has no
//! Cholesky factor and no well-defined density.

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{SegmentationError, SegmentationResult};

const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// A multivariate normal distribution with a cached Cholesky factorization
/// of its covariance matrix.
#[derive(Debug, Clone)]
pub struct MultivariateNormal {
    mean: Array1<f64>,
    /// Lower-triangular factor L with covariance = L * L^T.
    chol_lower: Array2<f64>,
    /// ln((2 pi)^(-d/2) * |covariance|^(-1/2)), the log normalization term.
    log_norm: f64,
}

impl MultivariateNormal {
    /// Build a distribution from a mean vector and covariance matrix.
    ///
    /// Fails with [`SegmentationError::SingularCovariance`] when the matrix
    /// is not positive definite (the |covariance| close to zero case) and
    /// with [`SegmentationError::DimensionMismatch`] when the matrix shape
    /// does not match the mean length.
    pub fn new(mean: Array1<f64>, covariance: &Array2<f64>) -> SegmentationResult<Self> {
        let dim = mean.len();
        if covariance.nrows() != dim || covariance.ncols() != dim {
            return Err(SegmentationError::DimensionMismatch {
                expected_height: dim,
                expected_width: dim,
                actual_height: covariance.nrows(),
                actual_width: covariance.ncols(),
            });
        }

        let chol_lower = cholesky(covariance).ok_or(SegmentationError::SingularCovariance)?;
        let log_det_sqrt: f64 = (0..dim).map(|i| chol_lower[[i, i]].ln()).sum();
        let log_norm = -0.5 * dim as f64 * LN_2PI - log_det_sqrt;

        Ok(Self {
            mean,
            chol_lower,
            log_norm,
        })
    }

    /// Mean vector of the distribution.
    pub fn mean(&self) -> ArrayView1<'_, f64> {
        self.mean.view()
    }

    /// Natural logarithm of the density at `x`.
    pub fn log_pdf(&self, x: ArrayView1<'_, f64>) -> f64 {
        let dim = self.mean.len();
        // Forward substitution: solve L z = (x - mean). The squared norm of z
        // is then the Mahalanobis distance term of the exponent.
        let mut z = vec![0.0; dim];
        for i in 0..dim {
            let mut s = x[i] - self.mean[i];
            for j in 0..i {
                s -= self.chol_lower[[i, j]] * z[j];
            }
            z[i] = s / self.chol_lower[[i, i]];
        }
        let mahalanobis_sq: f64 = z.iter().map(|v| v * v).sum();
        self.log_norm - 0.5 * mahalanobis_sq
    }

    /// Density at `x`. Never negative; underflows to 0 for points far from
    /// the mean.
    pub fn pdf(&self, x: ArrayView1<'_, f64>) -> f64 {
        self.log_pdf(x).exp()
    }
}

/// Cholesky factorization of a symmetric matrix, `None` when the matrix is
/// not positive definite.
fn cholesky(matrix: &Array2<f64>) -> Option<Array2<f64>> {
    let dim = matrix.nrows();
    let mut lower = Array2::zeros((dim, dim));
    for i in 0..dim {
        for j in 0..=i {
            let mut s = matrix[[i, j]];
            for k in 0..j {
                s -= lower[[i, k]] * lower[[j, k]];
            }
            if i == j {
                if !s.is_finite() || s <= 0.0 {
                    return None;
                }
                lower[[i, i]] = s.sqrt();
            } else {
                lower[[i, j]] = s / lower[[j, j]];
            }
        }
    }
    Some(lower)
}
