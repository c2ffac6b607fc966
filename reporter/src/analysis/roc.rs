//! ROC curve and AUC for a binary outcome against a continuous score.
//!
//! The sweep walks thresholds from the best-scoring end downward and
//! integrates AUC with the trapezoidal rule. The "best" end is fixed by the
//! metric's semantic direction, never inferred from the data, so a
//! lower-is-better metric (KD, PAE) cannot silently flip its curve.

use serde::Serialize;

use crate::models::{Direction, ReportError, ReportResult};

/// FPR/TPR pairs, the thresholds that produced them, and the final AUC.
#[derive(Debug, Clone, Serialize)]
pub struct RocCurve {
    pub fprs: Vec<f64>,
    pub tprs: Vec<f64>,
    pub thresholds: Vec<f64>,
    pub auc: f64,
    pub n_pos: usize,
    pub n_neg: usize,
}

/// Compute the ROC curve for `scores` against boolean `labels`.
///
/// For a `LowerIsBetter` metric the scores are negated before the sweep, so
/// AUC > 0.5 always means "the metric separates positives in its stated
/// direction". Reported thresholds are on the original scale.
pub fn compute_roc(scores: &[f64], labels: &[bool], direction: Direction) -> ReportResult<RocCurve> {
    if scores.len() != labels.len() {
        return Err(ReportError::Data(format!(
            "ROC input length mismatch: {} scores vs {} labels",
            scores.len(),
            labels.len()
        )));
    }
    if let Some(bad) = scores.iter().position(|s| !s.is_finite()) {
        return Err(ReportError::Data(format!(
            "non-finite score at row {} feeding ROC computation",
            bad
        )));
    }

    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(ReportError::StatisticalPrecondition(format!(
            "ROC needs both classes, got {} positives and {} negatives",
            n_pos, n_neg
        )));
    }

    let sign = match direction {
        Direction::HigherIsBetter => 1.0,
        Direction::LowerIsBetter => -1.0,
    };

    let mut pairs: Vec<(f64, bool)> = scores
        .iter()
        .zip(labels.iter())
        .map(|(s, l)| (sign * s, *l))
        .collect();
    pairs.sort_by(|(s1, _), (s2, _)| s2.partial_cmp(s1).unwrap_or(std::cmp::Ordering::Equal));

    let total_pos = n_pos as f64;
    let total_neg = n_neg as f64;

    let mut fprs = vec![0.0];
    let mut tprs = vec![0.0];
    let mut thresholds = vec![f64::INFINITY * sign];

    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut auc = 0.0;
    let mut prev_fpr = 0.0;
    let mut prev_tpr = 0.0;

    let mut i = 0;
    while i < pairs.len() {
        // Consume every row sharing this threshold before emitting a point,
        // so tied scores cannot order-depend the curve.
        let threshold = pairs[i].0;
        while i < pairs.len() && pairs[i].0 == threshold {
            if pairs[i].1 {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
            i += 1;
        }
        let tpr = tp / total_pos;
        let fpr = fp / total_neg;
        auc += (fpr - prev_fpr) * (tpr + prev_tpr) * 0.5;
        fprs.push(fpr);
        tprs.push(tpr);
        thresholds.push(sign * threshold);
        prev_fpr = fpr;
        prev_tpr = tpr;
    }

    Ok(RocCurve {
        fprs,
        tprs,
        thresholds,
        auc,
        n_pos,
        n_neg,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn perfect_separation_gives_auc_one() {
        let scores = [0.1, 0.2, 0.3, 0.8, 0.9, 0.95];
        let labels = [false, false, false, true, true, true];
        let roc = compute_roc(&scores, &labels, Direction::HigherIsBetter).unwrap();
        assert!((roc.auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn direction_orients_the_curve() {
        // Lower KD means tighter binding: with LowerIsBetter the same data
        // must give the mirrored AUC.
        let scores = [1e-9, 2e-9, 5e-8, 1e-7];
        let labels = [true, true, false, false];
        let as_lower = compute_roc(&scores, &labels, Direction::LowerIsBetter).unwrap();
        let as_higher = compute_roc(&scores, &labels, Direction::HigherIsBetter).unwrap();
        assert!((as_lower.auc - 1.0).abs() < 1e-12);
        assert!((as_higher.auc - 0.0).abs() < 1e-12);
        assert!(((as_lower.auc + as_higher.auc) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn auc_stays_in_unit_interval() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let n = 50;
            let scores: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
            let labels: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.4)).collect();
            if labels.iter().all(|&l| l) || labels.iter().all(|&l| !l) {
                continue;
            }
            let roc = compute_roc(&scores, &labels, Direction::HigherIsBetter).unwrap();
            assert!(roc.auc >= 0.0 && roc.auc <= 1.0);
        }
    }

    #[test]
    fn independent_score_has_auc_near_half() {
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let scores: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
        let labels: Vec<bool> = (0..n).map(|_| rng.gen_bool(0.5)).collect();
        let roc = compute_roc(&scores, &labels, Direction::HigherIsBetter).unwrap();
        assert!((roc.auc - 0.5).abs() < 0.02, "auc = {}", roc.auc);
    }

    #[test]
    fn single_class_is_a_precondition_error() {
        let err = compute_roc(&[0.1, 0.2], &[true, true], Direction::HigherIsBetter).unwrap_err();
        assert!(matches!(err, ReportError::StatisticalPrecondition(_)));
    }

    #[test]
    fn non_finite_scores_are_rejected() {
        let err = compute_roc(
            &[0.1, f64::NAN],
            &[true, false],
            Direction::HigherIsBetter,
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::Data(_)));
    }

    #[test]
    fn tied_scores_share_one_curve_point() {
        let scores = [0.5, 0.5, 0.5, 0.5];
        let labels = [true, false, true, false];
        let roc = compute_roc(&scores, &labels, Direction::HigherIsBetter).unwrap();
        // One threshold point plus the origin.
        assert_eq!(roc.fprs.len(), 2);
        assert!((roc.auc - 0.5).abs() < 1e-12);
    }
}
