//! 2-D projection of an n x d embedding matrix via PCA, t-SNE, or a
//! simplified UMAP-style neighbor embedding.
//!
//! Output row i always corresponds to input row i. The pairwise-distance
//! matrix behind t-SNE and UMAP is an embarrassingly-parallel map over rows;
//! everything else is deterministic given the fixed seed.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::info;

use crate::models::{ReportError, ReportResult};

const SEED: u64 = 42;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionMethod {
    Pca,
    /// Exact t-SNE; `perplexity` defaults to 30.
    Tsne { perplexity: f64 },
    /// Simplified UMAP-style layout; `n_neighbors` defaults to 15.
    Umap { n_neighbors: usize },
}

impl ProjectionMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ProjectionMethod::Pca => "pca",
            ProjectionMethod::Tsne { .. } => "tsne",
            ProjectionMethod::Umap { .. } => "umap",
        }
    }
}

pub const DEFAULT_PERPLEXITY: f64 = 30.0;
pub const DEFAULT_NEIGHBORS: usize = 15;

/// Project `matrix` (n rows, d features) to n x 2.
pub fn project(matrix: &Array2<f64>, method: ProjectionMethod) -> ReportResult<Array2<f64>> {
    let n = matrix.nrows();
    if n < 2 {
        return Err(ReportError::StatisticalPrecondition(format!(
            "projection needs at least 2 rows, got {}",
            n
        )));
    }
    if matrix.ncols() == 0 {
        return Err(ReportError::Data("projection input has no feature columns".into()));
    }
    if let Some((row, _)) = matrix
        .indexed_iter()
        .find(|(_, v)| !v.is_finite())
        .map(|(idx, _)| idx)
    {
        return Err(ReportError::Data(format!(
            "non-finite value in embedding matrix at row {}",
            row
        )));
    }

    info!(
        "Projecting {} x {} matrix with {}",
        n,
        matrix.ncols(),
        method.name()
    );

    match method {
        ProjectionMethod::Pca => Ok(pca_2d(matrix)),
        ProjectionMethod::Tsne { perplexity } => Ok(tsne_2d(matrix, perplexity)),
        ProjectionMethod::Umap { n_neighbors } => Ok(umap_2d(matrix, n_neighbors)),
    }
}

fn center_columns(matrix: &Array2<f64>) -> Array2<f64> {
    // `project` has already rejected empty input.
    let means = matrix
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(matrix.ncols()));
    matrix - &means.insert_axis(Axis(0))
}

/// Top-2 principal component scores via power iteration with deflation on the
/// centered data. Component signs are fixed so the largest-magnitude loading
/// is positive, keeping reruns byte-identical.
fn pca_2d(matrix: &Array2<f64>) -> Array2<f64> {
    let centered = center_columns(matrix);
    let d = centered.ncols();
    let mut deflated = centered.clone();
    let mut scores = Array2::<f64>::zeros((matrix.nrows(), 2));

    let mut rng = StdRng::seed_from_u64(SEED);
    for comp in 0..2.min(d) {
        let mut v: Array1<f64> = Array1::from_iter((0..d).map(|_| rng.gen::<f64>() - 0.5));
        let norm = v.dot(&v).sqrt();
        if norm > 0.0 {
            v /= norm;
        }
        for _ in 0..300 {
            // v <- X^T (X v), normalized: converges to the leading right
            // singular vector of the deflated matrix.
            let projected = deflated.dot(&v);
            let mut next = deflated.t().dot(&projected);
            let norm = next.dot(&next).sqrt();
            if norm <= f64::EPSILON {
                break;
            }
            next /= norm;
            let delta = (&next - &v).mapv(f64::abs).sum();
            v = next;
            if delta < 1e-12 {
                break;
            }
        }

        let mut max_abs = 0.0;
        let mut max_sign = 1.0;
        for &loading in v.iter() {
            if loading.abs() > max_abs {
                max_abs = loading.abs();
                max_sign = loading.signum();
            }
        }
        if max_sign < 0.0 {
            v.mapv_inplace(|x| -x);
        }

        let component_scores = deflated.dot(&v);
        scores.column_mut(comp).assign(&component_scores);

        // Deflate: remove the explained direction before the next component.
        for (mut row, &score) in deflated.axis_iter_mut(Axis(0)).zip(component_scores.iter()) {
            row.zip_mut_with(&v, |r, &load| *r -= score * load);
        }
    }
    scores
}

/// Squared Euclidean distances, computed as a parallel map over rows.
fn pairwise_sq_distances(matrix: &Array2<f64>) -> Vec<Vec<f64>> {
    let n = matrix.nrows();
    (0..n)
        .into_par_iter()
        .map(|i| {
            let row_i = matrix.row(i);
            (0..n)
                .map(|j| {
                    if i == j {
                        0.0
                    } else {
                        let diff = &row_i - &matrix.row(j);
                        diff.dot(&diff)
                    }
                })
                .collect()
        })
        .collect()
}

/// Exact t-SNE: per-point bandwidths tuned to the target perplexity by
/// bisection, symmetrized affinities, gradient descent with momentum and
/// early exaggeration, PCA initialization.
fn tsne_2d(matrix: &Array2<f64>, perplexity: f64) -> Array2<f64> {
    let n = matrix.nrows();
    let perplexity = perplexity.clamp(2.0, ((n - 1) as f64 / 3.0).max(2.0));
    let sq_dist = pairwise_sq_distances(matrix);

    // Conditional affinities p(j|i) at the bandwidth matching perplexity.
    let target_entropy = perplexity.ln();
    let p_cond: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            let mut beta = 1.0;
            let mut beta_min = f64::NEG_INFINITY;
            let mut beta_max = f64::INFINITY;
            let mut row = vec![0.0; n];
            for _ in 0..50 {
                let mut sum = 0.0;
                for j in 0..n {
                    row[j] = if i == j { 0.0 } else { (-beta * sq_dist[i][j]).exp() };
                    sum += row[j];
                }
                if sum <= 0.0 {
                    break;
                }
                let mut entropy = 0.0;
                for value in row.iter_mut() {
                    *value /= sum;
                    if *value > 1e-12 {
                        entropy -= *value * value.ln();
                    }
                }
                let diff = entropy - target_entropy;
                if diff.abs() < 1e-5 {
                    break;
                }
                if diff > 0.0 {
                    beta_min = beta;
                    beta = if beta_max.is_infinite() { beta * 2.0 } else { (beta + beta_max) / 2.0 };
                } else {
                    beta_max = beta;
                    beta = if beta_min.is_infinite() { beta / 2.0 } else { (beta + beta_min) / 2.0 };
                }
            }
            row
        })
        .collect();

    // Symmetrize.
    let mut p = vec![vec![0.0; n]; n];
    let norm = 2.0 * n as f64;
    for i in 0..n {
        for j in 0..n {
            p[i][j] = ((p_cond[i][j] + p_cond[j][i]) / norm).max(1e-12);
        }
    }

    let init = pca_2d(matrix);
    let scale = init.mapv(f64::abs).iter().cloned().fold(0.0, f64::max).max(1e-12);
    let mut y: Vec<[f64; 2]> = (0..n)
        .map(|i| [init[[i, 0]] / scale * 1e-4, init[[i, 1]] / scale * 1e-4])
        .collect();
    let mut velocity = vec![[0.0f64; 2]; n];

    let iterations = 500;
    let exaggeration_until = 100;
    let learning_rate = 100.0;

    for iter in 0..iterations {
        let exaggeration = if iter < exaggeration_until { 4.0 } else { 1.0 };
        let momentum = if iter < exaggeration_until { 0.5 } else { 0.8 };

        // Student-t low-dimensional affinities.
        let mut q_num = vec![vec![0.0; n]; n];
        let mut q_sum = 0.0;
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let num = 1.0 / (1.0 + dx * dx + dy * dy);
                q_num[i][j] = num;
                q_num[j][i] = num;
                q_sum += 2.0 * num;
            }
        }
        let q_sum = q_sum.max(1e-12);

        for i in 0..n {
            let mut grad = [0.0f64; 2];
            for j in 0..n {
                if i == j {
                    continue;
                }
                let q = (q_num[i][j] / q_sum).max(1e-12);
                let mult = (exaggeration * p[i][j] - q) * q_num[i][j];
                grad[0] += 4.0 * mult * (y[i][0] - y[j][0]);
                grad[1] += 4.0 * mult * (y[i][1] - y[j][1]);
            }
            for k in 0..2 {
                velocity[i][k] = momentum * velocity[i][k] - learning_rate * grad[k];
            }
        }
        for i in 0..n {
            y[i][0] += velocity[i][0];
            y[i][1] += velocity[i][1];
        }
    }

    let mut out = Array2::<f64>::zeros((n, 2));
    for i in 0..n {
        out[[i, 0]] = y[i][0];
        out[[i, 1]] = y[i][1];
    }
    out
}

/// Simplified UMAP-style layout: exponential affinities over the k-neighbor
/// graph, PCA initialization, attract/repel gradient steps.
fn umap_2d(matrix: &Array2<f64>, n_neighbors: usize) -> Array2<f64> {
    let n = matrix.nrows();
    // n - 1 can be below the usual minimum of 2 neighbors, so bound from
    // above first.
    let k = n_neighbors.min(n - 1).max(1);
    let sq_dist = pairwise_sq_distances(matrix);

    // k-nearest neighbors with local connectivity: rho is the nearest
    // distance, sigma the mean of the k neighbor distances.
    let mut weights = vec![vec![0.0; n]; n];
    for i in 0..n {
        let mut neighbors: Vec<(usize, f64)> = (0..n)
            .filter(|&j| j != i)
            .map(|j| (j, sq_dist[i][j].sqrt()))
            .collect();
        neighbors.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        neighbors.truncate(k);
        let rho = neighbors.first().map(|(_, d)| *d).unwrap_or(0.0);
        let sigma = (neighbors.iter().map(|(_, d)| *d).sum::<f64>() / k as f64 - rho).max(1e-9);
        for (j, d) in neighbors {
            weights[i][j] = (-(d - rho).max(0.0) / sigma).exp();
        }
    }
    // Symmetrize by fuzzy union.
    for i in 0..n {
        for j in (i + 1)..n {
            let w = weights[i][j] + weights[j][i] - weights[i][j] * weights[j][i];
            weights[i][j] = w;
            weights[j][i] = w;
        }
    }

    let init = pca_2d(matrix);
    let spread = init.mapv(f64::abs).iter().cloned().fold(0.0, f64::max).max(1e-12);
    let mut y: Vec<[f64; 2]> = (0..n)
        .map(|i| [init[[i, 0]] / spread * 10.0, init[[i, 1]] / spread * 10.0])
        .collect();

    let epochs = 200;
    let min_dist = 0.1;
    let mut rng = StdRng::seed_from_u64(SEED);

    for epoch in 0..epochs {
        let alpha = 1.0 - epoch as f64 / epochs as f64;
        for i in 0..n {
            for j in 0..n {
                if i == j || weights[i][j] <= 0.0 {
                    continue;
                }
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let dist = (dx * dx + dy * dy).sqrt().max(1e-9);
                // Attractive move along the edge.
                let pull = alpha * weights[i][j] * (dist - min_dist).max(0.0) / dist;
                y[i][0] -= pull * dx * 0.1;
                y[i][1] -= pull * dy * 0.1;
            }
            // A few random repulsive samples per point.
            for _ in 0..5 {
                let j = rng.gen_range(0..n);
                if j == i || weights[i][j] > 0.0 {
                    continue;
                }
                let dx = y[i][0] - y[j][0];
                let dy = y[i][1] - y[j][1];
                let dist_sq = (dx * dx + dy * dy).max(1e-4);
                let push = alpha / (1.0 + dist_sq);
                y[i][0] += push * dx * 0.1;
                y[i][1] += push * dy * 0.1;
            }
        }
    }

    let mut out = Array2::<f64>::zeros((n, 2));
    for i in 0..n {
        out[[i, 0]] = y[i][0];
        out[[i, 1]] = y[i][1];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_clusters() -> Array2<f64> {
        let mut rows = Vec::new();
        for i in 0..10 {
            let jitter = i as f64 * 0.01;
            rows.push([0.0 + jitter, 0.0 - jitter, 0.1 * jitter]);
        }
        for i in 0..10 {
            let jitter = i as f64 * 0.01;
            rows.push([10.0 + jitter, 10.0 - jitter, 5.0 + 0.1 * jitter]);
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((20, 3), flat).unwrap()
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let m = array![[1.0, 2.0], [f64::NAN, 3.0]];
        let err = project(&m, ProjectionMethod::Pca).unwrap_err();
        assert!(matches!(err, ReportError::Data(_)));
    }

    #[test]
    fn output_rows_correspond_to_input_rows() {
        let m = two_clusters();
        for method in [
            ProjectionMethod::Pca,
            ProjectionMethod::Tsne { perplexity: 5.0 },
            ProjectionMethod::Umap { n_neighbors: 5 },
        ] {
            let out = project(&m, method).unwrap();
            assert_eq!(out.nrows(), m.nrows());
            assert_eq!(out.ncols(), 2);
            assert!(out.iter().all(|v| v.is_finite()), "{:?}", method);
        }
    }

    #[test]
    fn pca_first_component_captures_the_dominant_axis() {
        // Points along the line y = x with small orthogonal noise.
        let mut flat = Vec::new();
        for i in 0..50 {
            let t = i as f64 / 10.0;
            let noise = if i % 2 == 0 { 0.01 } else { -0.01 };
            flat.extend_from_slice(&[t + noise, t - noise]);
        }
        let m = Array2::from_shape_vec((50, 2), flat).unwrap();
        let scores = project(&m, ProjectionMethod::Pca).unwrap();
        let pc1_var: f64 = scores.column(0).iter().map(|v| v * v).sum();
        let pc2_var: f64 = scores.column(1).iter().map(|v| v * v).sum();
        assert!(pc1_var > 100.0 * pc2_var, "{} vs {}", pc1_var, pc2_var);
    }

    #[test]
    fn pca_is_deterministic_across_runs() {
        let m = two_clusters();
        let a = project(&m, ProjectionMethod::Pca).unwrap();
        let b = project(&m, ProjectionMethod::Pca).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn clusters_stay_separated_after_projection() {
        let m = two_clusters();
        let out = project(&m, ProjectionMethod::Tsne { perplexity: 5.0 }).unwrap();
        // Mean distance between clusters should exceed within-cluster spread.
        let centroid = |range: std::ops::Range<usize>| {
            let len = range.len() as f64;
            let (mut cx, mut cy) = (0.0, 0.0);
            for i in range {
                cx += out[[i, 0]];
                cy += out[[i, 1]];
            }
            (cx / len, cy / len)
        };
        let (ax, ay) = centroid(0..10);
        let (bx, by) = centroid(10..20);
        let between = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
        let spread_a: f64 = (0..10)
            .map(|i| ((out[[i, 0]] - ax).powi(2) + (out[[i, 1]] - ay).powi(2)).sqrt())
            .sum::<f64>()
            / 10.0;
        assert!(between > spread_a, "between {} spread {}", between, spread_a);
    }

    #[test]
    fn two_row_input_projects_with_every_method() {
        // Smallest accepted input; the neighbor count must shrink to fit.
        let m = array![[0.0, 0.0], [1.0, 1.0]];
        for method in [
            ProjectionMethod::Pca,
            ProjectionMethod::Tsne { perplexity: 30.0 },
            ProjectionMethod::Umap { n_neighbors: 15 },
        ] {
            let out = project(&m, method).unwrap();
            assert_eq!(out.nrows(), 2);
            assert!(out.iter().all(|v| v.is_finite()), "{:?}", method);
        }
    }

    #[test]
    fn too_few_rows_is_a_precondition_error() {
        let m = array![[1.0, 2.0]];
        let err = project(&m, ProjectionMethod::Pca).unwrap_err();
        assert!(matches!(err, ReportError::StatisticalPrecondition(_)));
    }
}
