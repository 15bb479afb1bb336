//! Gaussian mixture fitting over pixel color vectors.
//!
//! The fit is a plain expectation-maximization loop: seeded k-means++
//! initialization, hard initial assignment, then alternating E and M steps
//! until the mean log-likelihood stops moving. Responsibilities are computed
//! in log space with log-sum-exp normalization. Component index ordering is
//! an arbitrary fitting outcome; callers must not attach meaning to it.

use std::collections::HashSet;

use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::MixtureConfig;
use crate::error::{SegmentationError, SegmentationResult};

use super::multivariate_normal::MultivariateNormal;

/// A fitted two-or-more component Gaussian mixture model.
///
/// Immutable after fitting. Exposes the per-component parameters the density
/// refinement stage needs: mean vectors and covariance matrices.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    weights: Array1<f64>,
    means: Array2<f64>,
    covariances: Vec<Array2<f64>>,
    converged: bool,
    iterations: usize,
    log_likelihood: f64,
}

impl GaussianMixture {
    /// Fit the mixture to `data`, one row per sample.
    ///
    /// Deterministic for a given seed and data. Fails with
    /// [`SegmentationError::InsufficientData`] when the population holds
    /// fewer samples, or fewer distinct samples, than components; a
    /// population of identical vectors therefore fails here rather than
    /// producing a meaningless single-point fit.
    pub fn fit(data: ArrayView2<'_, f64>, config: &MixtureConfig) -> SegmentationResult<Self> {
        let n_samples = data.nrows();
        let n_components = config.n_components;

        if n_samples < n_components {
            return Err(SegmentationError::InsufficientData {
                available: n_samples,
                required: n_components,
            });
        }
        let distinct = count_distinct_rows(data, n_components);
        if distinct < n_components {
            return Err(SegmentationError::InsufficientData {
                available: distinct,
                required: n_components,
            });
        }

        let mut rng = StdRng::seed_from_u64(config.random_seed);
        let centers = kmeans_plus_plus(data, n_components, &mut rng);

        // Hard assignment to the nearest seed center stands in for the first
        // E step; EM proper starts from the parameters it induces.
        let mut responsibilities = Array2::zeros((n_samples, n_components));
        for (i, x) in data.rows().into_iter().enumerate() {
            let mut nearest = 0;
            let mut nearest_dist = f64::INFINITY;
            for (j, center) in centers.rows().into_iter().enumerate() {
                let dist = squared_distance(x, center);
                if dist < nearest_dist {
                    nearest = j;
                    nearest_dist = dist;
                }
            }
            responsibilities[[i, nearest]] = 1.0;
        }

        let (mut weights, mut means, mut covariances) =
            m_step(data, responsibilities.view(), config.reg_covar);

        let mut converged = false;
        let mut iterations = 0;
        let mut log_likelihood = f64::NEG_INFINITY;
        for _ in 0..config.max_iterations {
            let (responsibilities, mean_log_likelihood) =
                e_step(data, &weights, &means, &covariances)?;
            (weights, means, covariances) = m_step(data, responsibilities.view(), config.reg_covar);
            iterations += 1;
            let delta = (mean_log_likelihood - log_likelihood).abs();
            log_likelihood = mean_log_likelihood;
            debug!("EM iteration {iterations}: mean log-likelihood {log_likelihood:.6}");
            if delta < config.tolerance {
                converged = true;
                break;
            }
        }
        if !converged {
            warn!(
                "EM did not converge within {} iterations (last mean log-likelihood {log_likelihood:.6})",
                config.max_iterations
            );
        }

        Ok(Self {
            weights,
            means,
            covariances,
            converged,
            iterations,
            log_likelihood,
        })
    }

    /// Hard component label per sample: the component with the highest
    /// posterior responsibility.
    pub fn predict(&self, data: ArrayView2<'_, f64>) -> SegmentationResult<Array1<usize>> {
        let weighted = weighted_log_prob(data, &self.weights, &self.means, &self.covariances)?;
        let labels = Array1::from_shape_fn(data.nrows(), |i| {
            let mut best = 0;
            let mut best_value = f64::NEG_INFINITY;
            for (j, &value) in weighted.row(i).iter().enumerate() {
                if value > best_value {
                    best = j;
                    best_value = value;
                }
            }
            best
        });
        Ok(labels)
    }

    /// Number of mixture components.
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    /// Mixing weights, one per component; they sum to 1.
    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    /// Component mean vectors, one row per component.
    pub fn means(&self) -> &Array2<f64> {
        &self.means
    }

    /// Component covariance matrices.
    pub fn covariances(&self) -> &[Array2<f64>] {
        &self.covariances
    }

    /// Mean vector and covariance matrix of one component.
    pub fn component(&self, index: usize) -> Option<(ArrayView1<'_, f64>, &Array2<f64>)> {
        (index < self.n_components()).then(|| (self.means.row(index), &self.covariances[index]))
    }

    /// Whether the EM loop met the tolerance before the iteration cap.
    pub fn converged(&self) -> bool {
        self.converged
    }

    /// EM iterations actually run.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Mean per-sample log-likelihood at the last E step.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }
}

/// Count distinct rows, stopping early once `limit` are found.
fn count_distinct_rows(data: ArrayView2<'_, f64>, limit: usize) -> usize {
    let mut seen = HashSet::new();
    for row in data.rows() {
        seen.insert(row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>());
        if seen.len() >= limit {
            break;
        }
    }
    seen.len()
}

fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

/// k-means++ seeding: the first center is uniform, each further center is
/// drawn with probability proportional to its squared distance from the
/// centers chosen so far.
fn kmeans_plus_plus(data: ArrayView2<'_, f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let (n_samples, dim) = data.dim();
    let mut centers = Array2::zeros((k, dim));

    let first = rng.random_range(0..n_samples);
    centers.row_mut(0).assign(&data.row(first));

    let mut min_sq_dist: Vec<f64> = data
        .rows()
        .into_iter()
        .map(|x| squared_distance(x, centers.row(0)))
        .collect();

    for c in 1..k {
        let total: f64 = min_sq_dist.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.random::<f64>() * total;
            let mut chosen = n_samples - 1;
            for (i, &weight) in min_sq_dist.iter().enumerate() {
                target -= weight;
                if target <= 0.0 && weight > 0.0 {
                    chosen = i;
                    break;
                }
            }
            chosen
        } else {
            // Every point coincides with a chosen center already.
            rng.random_range(0..n_samples)
        };
        centers.row_mut(c).assign(&data.row(chosen));
        for (i, x) in data.rows().into_iter().enumerate() {
            let dist = squared_distance(x, centers.row(c));
            if dist < min_sq_dist[i] {
                min_sq_dist[i] = dist;
            }
        }
    }

    centers
}

/// Per-sample, per-component ln(weight * density).
fn weighted_log_prob(
    data: ArrayView2<'_, f64>,
    weights: &Array1<f64>,
    means: &Array2<f64>,
    covariances: &[Array2<f64>],
) -> SegmentationResult<Array2<f64>> {
    let n_samples = data.nrows();
    let n_components = weights.len();
    let mut out = Array2::zeros((n_samples, n_components));
    for j in 0..n_components {
        let component = MultivariateNormal::new(means.row(j).to_owned(), &covariances[j])?;
        let log_weight = weights[j].ln();
        for (i, x) in data.rows().into_iter().enumerate() {
            out[[i, j]] = log_weight + component.log_pdf(x);
        }
    }
    Ok(out)
}

/// E step: posterior responsibilities and the mean per-sample log-likelihood.
fn e_step(
    data: ArrayView2<'_, f64>,
    weights: &Array1<f64>,
    means: &Array2<f64>,
    covariances: &[Array2<f64>],
) -> SegmentationResult<(Array2<f64>, f64)> {
    let mut responsibilities = weighted_log_prob(data, weights, means, covariances)?;
    let mut total = 0.0;
    for mut row in responsibilities.rows_mut() {
        let norm = log_sum_exp(&row.to_vec());
        total += norm;
        row.mapv_inplace(|v| (v - norm).exp());
    }
    let mean_log_likelihood = total / data.nrows() as f64;
    Ok((responsibilities, mean_log_likelihood))
}

fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// M step: re-estimate weights, means, and regularized covariances from the
/// responsibilities.
fn m_step(
    data: ArrayView2<'_, f64>,
    responsibilities: ArrayView2<'_, f64>,
    reg_covar: f64,
) -> (Array1<f64>, Array2<f64>, Vec<Array2<f64>>) {
    let (n_samples, dim) = data.dim();
    let n_components = responsibilities.ncols();

    let mut weights = Array1::zeros(n_components);
    let mut means = Array2::zeros((n_components, dim));
    let mut covariances = Vec::with_capacity(n_components);

    for j in 0..n_components {
        let resp = responsibilities.column(j);
        // Guard against an empty component; its covariance degenerates to
        // the regularization term alone.
        let resp_total = resp.sum() + 10.0 * f64::EPSILON;
        weights[j] = resp.sum() / n_samples as f64;

        let mut mean = Array1::<f64>::zeros(dim);
        for (i, x) in data.rows().into_iter().enumerate() {
            mean.scaled_add(resp[i], &x);
        }
        mean /= resp_total;

        let mut covariance = Array2::<f64>::zeros((dim, dim));
        for (i, x) in data.rows().into_iter().enumerate() {
            if resp[i] == 0.0 {
                continue;
            }
            for a in 0..dim {
                let da = x[a] - mean[a];
                for b in 0..=a {
                    covariance[[a, b]] += resp[i] * da * (x[b] - mean[b]);
                }
            }
        }
        for a in 0..dim {
            for b in 0..a {
                covariance[[a, b]] /= resp_total;
                covariance[[b, a]] = covariance[[a, b]];
            }
            covariance[[a, a]] = covariance[[a, a]] / resp_total + reg_covar;
        }

        means.row_mut(j).assign(&mean);
        covariances.push(covariance);
    }

    (weights, means, covariances)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn two_cluster_data() -> Array2<f64> {
        arr2(&[
            [0.0, 0.0, 250.0],
            [2.0, 1.0, 252.0],
            [1.0, 2.0, 254.0],
            [0.0, 1.0, 251.0],
            [250.0, 250.0, 250.0],
            [252.0, 251.0, 252.0],
            [254.0, 252.0, 254.0],
            [251.0, 250.0, 251.0],
        ])
    }

    #[test]
    fn test_fit_separates_well_separated_clusters() {
        let data = two_cluster_data();
        let mixture =
            GaussianMixture::fit(data.view(), &MixtureConfig::new()).expect("fit should succeed");

        assert!(mixture.converged(), "EM should converge on separable data");

        let labels = mixture.predict(data.view()).expect("predict should succeed");
        // The first four samples form one cluster, the last four the other.
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[0], labels[3]);
        assert_eq!(labels[4], labels[5]);
        assert_eq!(labels[4], labels[6]);
        assert_eq!(labels[4], labels[7]);
        assert_ne!(labels[0], labels[4], "clusters must be distinguished");

        // One component mean sits near blue, the other near white.
        let blue_component = labels[0];
        let blue_mean = mixture.means().row(blue_component);
        assert!(blue_mean[2] > 240.0 && blue_mean[0] < 10.0, "blue mean off: {blue_mean}");
        let white_mean = mixture.means().row(labels[4]);
        assert!(white_mean[0] > 240.0, "white mean off: {white_mean}");
    }

    #[test]
    fn test_weights_sum_to_one() {
        let data = two_cluster_data();
        let mixture =
            GaussianMixture::fit(data.view(), &MixtureConfig::new()).expect("fit should succeed");
        let total: f64 = mixture.weights().sum();
        assert!(
            (total - 1.0).abs() < 1e-9,
            "mixing weights must sum to 1, got {total}"
        );
    }

    #[test]
    fn test_fit_is_reproducible_for_a_fixed_seed() {
        let data = two_cluster_data();
        let config = MixtureConfig::new().with_random_seed(7);
        let first = GaussianMixture::fit(data.view(), &config).expect("fit should succeed");
        let second = GaussianMixture::fit(data.view(), &config).expect("fit should succeed");

        assert_eq!(first.means(), second.means(), "means must be bit-identical");
        assert_eq!(
            first.weights(),
            second.weights(),
            "weights must be bit-identical"
        );
        assert_eq!(
            first.covariances(),
            second.covariances(),
            "covariances must be bit-identical"
        );
        assert_eq!(
            first.predict(data.view()).expect("predict"),
            second.predict(data.view()).expect("predict"),
            "labels must be bit-identical"
        );
    }

    #[test]
    fn test_identical_samples_are_insufficient() {
        let data = arr2(&[
            [128.0, 128.0, 128.0],
            [128.0, 128.0, 128.0],
            [128.0, 128.0, 128.0],
            [128.0, 128.0, 128.0],
        ]);
        let result = GaussianMixture::fit(data.view(), &MixtureConfig::new());
        match result {
            Err(SegmentationError::InsufficientData {
                available,
                required,
            }) => {
                assert_eq!(available, 1);
                assert_eq!(required, 2);
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_too_few_samples_are_insufficient() {
        let data = arr2(&[[1.0, 2.0, 3.0]]);
        let result = GaussianMixture::fit(data.view(), &MixtureConfig::new());
        assert!(
            matches!(result, Err(SegmentationError::InsufficientData { .. })),
            "a single sample cannot support two components"
        );
    }

    #[test]
    fn test_two_distinct_samples_fit_exactly() {
        // Each component captures one point; covariance degenerates to the
        // regularization term.
        let data = arr2(&[
            [0.0, 0.0, 255.0],
            [255.0, 255.0, 255.0],
            [0.0, 0.0, 255.0],
            [255.0, 255.0, 255.0],
        ]);
        let config = MixtureConfig::new();
        let mixture = GaussianMixture::fit(data.view(), &config).expect("fit should succeed");

        let labels = mixture.predict(data.view()).expect("predict");
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[1], labels[3]);
        assert_ne!(labels[0], labels[1]);

        let (mean, covariance) = mixture
            .component(labels[0])
            .expect("component index from predict is valid");
        assert!(
            (mean[2] - 255.0).abs() < 1e-9,
            "exact cluster mean expected, got {mean}"
        );
        assert!(
            (covariance[[0, 0]] - config.reg_covar).abs() < 1e-12,
            "covariance should reduce to reg_covar, got {covariance}"
        );
    }
}
