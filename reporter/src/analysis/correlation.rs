//! Bivariate correlation: Pearson r, Spearman rho, Kendall tau-b with
//! two-sided p-values on complete-case pairs.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::models::{ReportError, ReportResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrMethod {
    Pearson,
    Spearman,
    Kendall,
}

impl CorrMethod {
    pub fn name(&self) -> &'static str {
        match self {
            CorrMethod::Pearson => "Pearson",
            CorrMethod::Spearman => "Spearman",
            CorrMethod::Kendall => "Kendall",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Correlation {
    pub method: CorrMethod,
    pub r: f64,
    /// Two-sided p-value. `None` when undefined: fewer than 3 pairs or a
    /// degenerate |r| = 1 fit.
    pub p: Option<f64>,
    pub n: usize,
}

/// Drop pairs where either value is non-finite, keeping the two vectors
/// aligned. The same mask covers both axes.
pub fn complete_cases(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    x.iter()
        .zip(y.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(a, b)| (*a, *b))
        .unzip()
}

/// Correlation between two equal-length vectors of complete-case pairs.
/// Fewer than 2 pairs is an error; with exactly 2 pairs r is reported and the
/// p-value flagged undefined (no degrees of freedom for a test).
pub fn correlate(x: &[f64], y: &[f64], method: CorrMethod) -> ReportResult<Correlation> {
    if x.len() != y.len() {
        return Err(ReportError::Data(format!(
            "correlation input length mismatch: {} vs {} values",
            x.len(),
            y.len()
        )));
    }
    let n = x.len();
    if n < 2 {
        return Err(ReportError::StatisticalPrecondition(format!(
            "correlation needs at least 2 paired observations, got {}",
            n
        )));
    }

    let (r, p) = match method {
        CorrMethod::Pearson => {
            let r = pearson_r(x, y)?;
            (r, t_test_p(r, n))
        }
        CorrMethod::Spearman => {
            let rx = rank_with_ties(x);
            let ry = rank_with_ties(y);
            let r = pearson_r(&rx, &ry)?;
            (r, t_test_p(r, n))
        }
        CorrMethod::Kendall => kendall_tau_b(x, y),
    };

    Ok(Correlation { method, r, p, n })
}

fn pearson_r(x: &[f64], y: &[f64]) -> ReportResult<f64> {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return Err(ReportError::StatisticalPrecondition(
            "correlation undefined: one input vector is constant".into(),
        ));
    }
    Ok((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

/// Two-sided p from the t distribution with n-2 degrees of freedom. `None`
/// when n < 3 or |r| = 1 (the t statistic diverges).
fn t_test_p(r: f64, n: usize) -> Option<f64> {
    if n < 3 {
        return None;
    }
    let denom = 1.0 - r * r;
    if denom <= f64::EPSILON {
        return None;
    }
    let df = (n - 2) as f64;
    let t = r * (df / denom).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Average ranks, ties sharing the mean of their covered positions.
pub fn rank_with_ties(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Positions i..=j share the same value.
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }
    ranks
}

/// Sizes of the tied runs (length > 1) in `values`. Shared with the rank
/// tests, which need the same tie terms for their variance corrections.
pub(crate) fn tie_counts(values: &[f64]) -> Vec<usize> {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mut counts = Vec::new();
    let mut i = 0;
    while i < sorted.len() {
        let mut j = i;
        while j + 1 < sorted.len() && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        if j > i {
            counts.push(j - i + 1);
        }
        i = j + 1;
    }
    counts
}

/// Kendall tau-b with tie correction in both the coefficient and the variance
/// of S behind the normal-approximation two-sided p-value.
fn kendall_tau_b(x: &[f64], y: &[f64]) -> (f64, Option<f64>) {
    let n = x.len();
    let mut concordant = 0i64;
    let mut discordant = 0i64;
    let mut ties_x = 0i64;
    let mut ties_y = 0i64;
    for i in 0..n {
        for j in (i + 1)..n {
            let dx = x[i] - x[j];
            let dy = y[i] - y[j];
            if dx == 0.0 && dy == 0.0 {
                continue;
            } else if dx == 0.0 {
                ties_x += 1;
            } else if dy == 0.0 {
                ties_y += 1;
            } else if dx * dy > 0.0 {
                concordant += 1;
            } else {
                discordant += 1;
            }
        }
    }

    let s = (concordant - discordant) as f64;
    let n0 = (n * (n - 1) / 2) as f64;
    let denom = ((n0 - ties_x as f64) * (n0 - ties_y as f64)).sqrt();
    if denom <= 0.0 {
        return (0.0, None);
    }
    let tau = (s / denom).clamp(-1.0, 1.0);

    if n < 3 {
        return (tau, None);
    }
    // Tie-corrected variance of S: the no-tie term minus per-variable tie
    // terms, plus the two cross terms.
    let nf = n as f64;
    let tx = tie_counts(x);
    let ty = tie_counts(y);
    let term = |groups: &[usize], f: &dyn Fn(f64) -> f64| -> f64 {
        groups.iter().map(|&t| f(t as f64)).sum()
    };
    let v0 = nf * (nf - 1.0) * (2.0 * nf + 5.0);
    let vt = term(&tx, &|t| t * (t - 1.0) * (2.0 * t + 5.0));
    let vu = term(&ty, &|t| t * (t - 1.0) * (2.0 * t + 5.0));
    let v1 = term(&tx, &|t| t * (t - 1.0)) * term(&ty, &|t| t * (t - 1.0))
        / (2.0 * nf * (nf - 1.0));
    let v2 = term(&tx, &|t| t * (t - 1.0) * (t - 2.0)) * term(&ty, &|t| t * (t - 1.0) * (t - 2.0))
        / (9.0 * nf * (nf - 1.0) * (nf - 2.0));
    let var_s = (v0 - vt - vu) / 18.0 + v1 + v2;
    if var_s <= 0.0 {
        return (tau, None);
    }
    let z = s / var_s.sqrt();
    let p = Normal::new(0.0, 1.0)
        .ok()
        .map(|dist| (2.0 * (1.0 - dist.cdf(z.abs()))).clamp(0.0, 1.0));
    (tau, p)
}

/// Least-squares line for the scatter fit overlay.
pub fn linear_fit(x: &[f64], y: &[f64]) -> ReportResult<(f64, f64)> {
    if x.len() < 2 {
        return Err(ReportError::StatisticalPrecondition(
            "linear fit needs at least 2 points".into(),
        ));
    }
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (a, b) in x.iter().zip(y.iter()) {
        cov += (a - mean_x) * (b - mean_y);
        var_x += (a - mean_x) * (a - mean_x);
    }
    if var_x <= 0.0 {
        return Err(ReportError::StatisticalPrecondition(
            "linear fit undefined for constant x".into(),
        ));
    }
    let slope = cov / var_x;
    Ok((slope, mean_y - slope * mean_x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_is_symmetric() {
        let x = [1.0, 2.5, 3.0, 4.2, 5.1, 6.0];
        let y = [2.0, 1.0, 4.0, 3.5, 6.0, 5.5];
        for method in [CorrMethod::Pearson, CorrMethod::Spearman, CorrMethod::Kendall] {
            let a = correlate(&x, &y, method).unwrap();
            let b = correlate(&y, &x, method).unwrap();
            assert!((a.r - b.r).abs() < 1e-12, "{:?}: {} vs {}", method, a.r, b.r);
        }
    }

    #[test]
    fn two_point_line_has_perfect_r_and_undefined_p() {
        // ipTM vs -log10(kd) over a two-row round-1 subset.
        let x = [0.8, 0.9];
        let y = [7.0, 9.0];
        let c = correlate(&x, &y, CorrMethod::Pearson).unwrap();
        assert!((c.r - 1.0).abs() < 1e-12);
        assert!(c.p.is_none());
        assert_eq!(c.n, 2);
    }

    #[test]
    fn single_observation_is_a_precondition_error() {
        let err = correlate(&[1.0], &[2.0], CorrMethod::Pearson).unwrap_err();
        assert!(matches!(err, ReportError::StatisticalPrecondition(_)));
    }

    #[test]
    fn pearson_matches_known_value() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [2.0, 4.0, 5.0, 4.0, 5.0];
        let c = correlate(&x, &y, CorrMethod::Pearson).unwrap();
        assert!((c.r - 0.7745966692414834).abs() < 1e-9);
        let p = c.p.unwrap();
        assert!((p - 0.1240).abs() < 5e-3, "p = {}", p);
    }

    #[test]
    fn spearman_is_rank_invariant() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 8.0, 27.0, 64.0, 125.0]; // monotone transform
        let c = correlate(&x, &y, CorrMethod::Spearman).unwrap();
        assert!((c.r - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kendall_handles_ties() {
        let x = [1.0, 1.0, 2.0, 3.0];
        let y = [1.0, 2.0, 2.0, 3.0];
        let c = correlate(&x, &y, CorrMethod::Kendall).unwrap();
        assert!(c.r > 0.0 && c.r <= 1.0);
    }

    #[test]
    fn kendall_p_matches_the_normal_approximation_without_ties() {
        // 12 concordant and 3 discordant pairs: S = 9, tau = 0.6,
        // var(S) = 6*5*17/18, z = 9/sqrt(var), two-sided p ~ 0.091.
        let x = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let y = [2.0, 1.0, 4.0, 3.0, 6.0, 5.0];
        let c = correlate(&x, &y, CorrMethod::Kendall).unwrap();
        assert!((c.r - 0.6).abs() < 1e-12);
        let p = c.p.unwrap();
        assert!((p - 0.091).abs() < 2e-3, "p = {}", p);
    }

    #[test]
    fn kendall_p_stays_defined_under_heavy_ties() {
        let x = [1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 3.0, 3.0];
        let y = [1.0, 2.0, 1.0, 2.0, 3.0, 2.0, 3.0, 3.0];
        let c = correlate(&x, &y, CorrMethod::Kendall).unwrap();
        assert!(c.r > 0.0);
        let p = c.p.unwrap();
        assert!(p > 0.0 && p <= 1.0, "p = {}", p);
    }

    #[test]
    fn ranks_average_over_ties() {
        let ranks = rank_with_ties(&[10.0, 20.0, 20.0, 30.0]);
        assert_eq!(ranks, vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn complete_cases_drop_pairs_jointly() {
        let x = [1.0, f64::NAN, 3.0, 4.0];
        let y = [1.0, 2.0, f64::INFINITY, 4.0];
        let (cx, cy) = complete_cases(&x, &y);
        assert_eq!(cx, vec![1.0, 4.0]);
        assert_eq!(cy, vec![1.0, 4.0]);
    }
}
