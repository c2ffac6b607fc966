//! Kruskal-Wallis omnibus test with optional pairwise Mann-Whitney post-hoc.
//!
//! The post-hoc runs only when the omnibus test is significant (p < 0.05);
//! pairwise p-values carry a Bonferroni correction and a rank-biserial effect
//! size r = 1 - 2U/(n1*n2).

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use tracing::warn;

use crate::analysis::correlation::{rank_with_ties, tie_counts};
use crate::models::{ReportError, ReportResult};

const ALPHA: f64 = 0.05;

#[derive(Debug, Clone, Serialize)]
pub struct PairwiseTest {
    pub group_a: String,
    pub group_b: String,
    pub n_a: usize,
    pub n_b: usize,
    pub u: f64,
    pub p: f64,
    pub p_adjusted: f64,
    /// Rank-biserial correlation; positive when group A ranks lower.
    pub effect_r: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupComparison {
    pub h: f64,
    pub df: usize,
    pub p: f64,
    pub group_sizes: Vec<(String, usize)>,
    pub pairwise: Vec<PairwiseTest>,
}

impl GroupComparison {
    /// Annotation text for the chart overlay.
    pub fn summary(&self) -> String {
        format!(
            "Kruskal-Wallis H = {:.2} (df = {}, p = {})",
            self.h,
            self.df,
            format_p(self.p)
        )
    }
}

pub fn format_p(p: f64) -> String {
    if p < 0.001 {
        format!("{:.1e}", p)
    } else {
        format!("{:.3}", p)
    }
}

/// Significance stars for pairwise annotations.
pub fn stars(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        "ns"
    }
}

/// Kruskal-Wallis across named groups. Groups with fewer than 2 finite
/// observations are skipped with a warning; at least two usable groups must
/// remain.
pub fn kruskal_wallis(groups: &[(String, Vec<f64>)]) -> ReportResult<GroupComparison> {
    let usable: Vec<(&String, Vec<f64>)> = groups
        .iter()
        .filter_map(|(name, values)| {
            let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
            if finite.len() < 2 {
                warn!(
                    "Skipping group '{}' with {} usable observations",
                    name,
                    finite.len()
                );
                None
            } else {
                Some((name, finite))
            }
        })
        .collect();

    if usable.len() < 2 {
        return Err(ReportError::StatisticalPrecondition(format!(
            "group comparison needs at least 2 groups with 2+ observations, got {}",
            usable.len()
        )));
    }

    let pooled: Vec<f64> = usable.iter().flat_map(|(_, v)| v.iter().copied()).collect();
    let n = pooled.len() as f64;
    let ranks = rank_with_ties(&pooled);

    let mut h = 0.0;
    let mut offset = 0;
    for (_, values) in &usable {
        let ni = values.len() as f64;
        let rank_sum: f64 = ranks[offset..offset + values.len()].iter().sum();
        h += rank_sum * rank_sum / ni;
        offset += values.len();
    }
    h = 12.0 / (n * (n + 1.0)) * h - 3.0 * (n + 1.0);

    // Tie correction over the pooled sample.
    let tie_term: f64 = tie_counts(&pooled)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let correction = 1.0 - tie_term / (n * n * n - n);
    if correction > 0.0 {
        h /= correction;
    }

    let df = usable.len() - 1;
    let chi = ChiSquared::new(df as f64)
        .map_err(|e| ReportError::Data(format!("chi-squared distribution: {}", e)))?;
    let p = (1.0 - chi.cdf(h)).clamp(0.0, 1.0);

    let pairwise = if p < ALPHA {
        pairwise_mann_whitney(&usable)
    } else {
        Vec::new()
    };

    Ok(GroupComparison {
        h,
        df,
        p,
        group_sizes: usable
            .iter()
            .map(|(name, v)| ((*name).clone(), v.len()))
            .collect(),
        pairwise,
    })
}

fn pairwise_mann_whitney(groups: &[(&String, Vec<f64>)]) -> Vec<PairwiseTest> {
    let mut tests = Vec::new();
    let m = groups.len() * (groups.len() - 1) / 2;
    for i in 0..groups.len() {
        for j in (i + 1)..groups.len() {
            let (name_a, a) = &groups[i];
            let (name_b, b) = &groups[j];
            let (u, p) = mann_whitney_u(a, b);
            let effect_r = 1.0 - 2.0 * u / (a.len() as f64 * b.len() as f64);
            tests.push(PairwiseTest {
                group_a: (*name_a).clone(),
                group_b: (*name_b).clone(),
                n_a: a.len(),
                n_b: b.len(),
                u,
                p,
                p_adjusted: (p * m as f64).min(1.0),
                effect_r,
            });
        }
    }
    tests
}

/// Two-sided Mann-Whitney U via the normal approximation with tie and
/// continuity corrections. Returns (U for the first group, p-value).
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> (f64, f64) {
    let n1 = a.len() as f64;
    let n2 = b.len() as f64;
    let pooled: Vec<f64> = a.iter().chain(b.iter()).copied().collect();
    let ranks = rank_with_ties(&pooled);
    let rank_sum_a: f64 = ranks[..a.len()].iter().sum();
    let u = rank_sum_a - n1 * (n1 + 1.0) / 2.0;

    let n = n1 + n2;
    let tie_term: f64 = tie_counts(&pooled)
        .into_iter()
        .map(|t| {
            let t = t as f64;
            t * t * t - t
        })
        .sum();
    let sigma_sq = n1 * n2 / 12.0 * ((n + 1.0) - tie_term / (n * (n - 1.0)));
    if sigma_sq <= 0.0 {
        return (u, 1.0);
    }
    let mean_u = n1 * n2 / 2.0;
    let z = (u - mean_u - 0.5 * (u - mean_u).signum()) / sigma_sq.sqrt();
    let p = match Normal::new(0.0, 1.0) {
        Ok(dist) => (2.0 * (1.0 - dist.cdf(z.abs()))).clamp(0.0, 1.0),
        Err(_) => 1.0,
    };
    (u, p)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(groups: &[(&str, &[f64])]) -> Vec<(String, Vec<f64>)> {
        groups
            .iter()
            .map(|(n, v)| (n.to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn identical_groups_are_not_significant() {
        let groups = named(&[
            ("a", &[1.0, 2.0, 3.0, 4.0, 5.0]),
            ("b", &[1.0, 2.0, 3.0, 4.0, 5.0]),
        ]);
        let result = kruskal_wallis(&groups).unwrap();
        assert!(result.p > 0.9, "p = {}", result.p);
        assert!(result.pairwise.is_empty());
        assert_eq!(result.df, 1);
    }

    #[test]
    fn separated_groups_trigger_post_hoc() {
        let groups = named(&[
            ("low", &[1.0, 2.0, 3.0, 2.5, 1.5, 2.2, 1.8, 2.7]),
            ("high", &[10.0, 11.0, 12.0, 10.5, 11.5, 12.5, 10.2, 11.8]),
        ]);
        let result = kruskal_wallis(&groups).unwrap();
        assert!(result.p < 0.01, "p = {}", result.p);
        assert_eq!(result.pairwise.len(), 1);
        let pair = &result.pairwise[0];
        // "low" has all the low ranks: U = 0, rank-biserial r = 1.
        assert!((pair.u - 0.0).abs() < 1e-9);
        assert!((pair.effect_r - 1.0).abs() < 1e-9);
        assert!(pair.p_adjusted <= 1.0);
    }

    #[test]
    fn tiny_groups_are_skipped_not_fatal() {
        let groups = named(&[
            ("singleton", &[1.0]),
            ("a", &[1.0, 2.0, 3.0, 4.0]),
            ("b", &[2.0, 3.0, 4.0, 5.0]),
        ]);
        let result = kruskal_wallis(&groups).unwrap();
        assert_eq!(result.df, 1);
        assert_eq!(result.group_sizes.len(), 2);
    }

    #[test]
    fn fewer_than_two_groups_is_a_precondition_error() {
        let groups = named(&[("only", &[1.0, 2.0, 3.0])]);
        let err = kruskal_wallis(&groups).unwrap_err();
        assert!(matches!(err, ReportError::StatisticalPrecondition(_)));
    }

    #[test]
    fn mann_whitney_u_is_symmetric_in_total() {
        let a = [1.0, 2.0, 3.0];
        let b = [4.0, 5.0];
        let (u_a, _) = mann_whitney_u(&a, &b);
        let (u_b, _) = mann_whitney_u(&b, &a);
        assert!((u_a + u_b - (a.len() * b.len()) as f64).abs() < 1e-9);
    }

    #[test]
    fn stars_thresholds() {
        assert_eq!(stars(0.0001), "***");
        assert_eq!(stars(0.005), "**");
        assert_eq!(stars(0.03), "*");
        assert_eq!(stars(0.5), "ns");
    }
}
