//! Filter/transform stage: reduces the loaded table to the working subset for
//! one plot and derives transformed columns.
//!
//! Predicates are conjunctive and applied in a fixed order: round filter,
//! category recodes, exclusion toggles, complete-case requirements, then
//! top-N retention.

use std::collections::HashMap;

use polars::prelude::*;
use tracing::{info, warn};

use crate::data_handling::submissions::MISSING;
use crate::models::{ReportError, ReportResult, RoundFilter};

#[derive(Debug, Clone)]
pub struct TopN {
    pub column: String,
    pub n: usize,
}

#[derive(Debug, Clone)]
pub struct FilterSpec {
    pub round: RoundFilter,
    /// Drop rows whose category reads "Not mentioned".
    pub drop_not_mentioned: bool,
    /// Drop rows whose category reads the missing sentinel.
    pub drop_missing_data: bool,
    /// Numeric columns that must be non-null and finite, dropped pairwise
    /// (one mask across all listed columns).
    pub complete_case: Vec<String>,
    pub top_n: Option<TopN>,
}

impl Default for FilterSpec {
    fn default() -> Self {
        FilterSpec {
            round: RoundFilter::Both,
            drop_not_mentioned: false,
            drop_missing_data: false,
            complete_case: Vec::new(),
            top_n: None,
        }
    }
}

impl FilterSpec {
    /// Apply every predicate. `categorical_columns` are the columns the
    /// exclusion toggles act on. Fails with a `Data` error when the subset
    /// comes out empty.
    pub fn apply(&self, df: &DataFrame, categorical_columns: &[&str]) -> ReportResult<DataFrame> {
        let before = df.height();
        let mut out = self.filter_round(df)?;

        for column in categorical_columns {
            out = recode_levels(&out, column)?;
            if self.drop_not_mentioned {
                out = drop_category(&out, column, "Not mentioned")?;
            }
            if self.drop_missing_data {
                out = drop_category(&out, column, MISSING)?;
            }
        }

        if !self.complete_case.is_empty() {
            out = complete_cases(&out, &self.complete_case)?;
        }

        if let Some(top) = &self.top_n {
            out = retain_top_n(&out, &top.column, top.n)?;
        }

        info!(
            "Filter kept {} of {} rows (round={})",
            out.height(),
            before,
            self.round
        );
        if out.height() == 0 {
            return Err(ReportError::Data(format!(
                "empty result set after filtering (round={}, started with {} rows)",
                self.round, before
            )));
        }
        Ok(out)
    }

    fn filter_round(&self, df: &DataFrame) -> ReportResult<DataFrame> {
        let Some(round) = self.round.round_number() else {
            return Ok(df.clone());
        };
        let col = df
            .column("round")
            .map_err(|_| ReportError::Configuration("round filter requested but no 'round' column exists".into()))?;
        let rounds = col.cast(&DataType::Int64)?;
        let rounds = rounds.i64()?;
        let keep: Vec<bool> = rounds.into_iter().map(|opt| opt == Some(round)).collect();
        Ok(filter_rows(df, &keep)?)
    }
}

fn filter_rows(df: &DataFrame, keep: &[bool]) -> PolarsResult<DataFrame> {
    let mask = BooleanChunked::new(PlSmallStr::from("mask"), keep);
    df.filter(&mask)
}

/// Fixed categorical recodes from the competition annotations: unknown
/// binding strength means the design never expressed, unselected designs get
/// a display name, and the Yes/No de-novo flag becomes its display labels.
pub fn recode_levels(df: &DataFrame, column: &str) -> ReportResult<DataFrame> {
    let mapping: &[(&str, &str)] = match column {
        "binding_strength" => &[("Unknown", "Not expressed")],
        "selected" => &[("No", "Not selected")],
        "de_novo" => &[("Yes", "De novo"), ("No", "Existing binder")],
        _ => return Ok(df.clone()),
    };
    let Ok(col) = df.column(column) else {
        return Ok(df.clone());
    };
    let ca = col.str()?;
    let values: Vec<&str> = ca
        .into_iter()
        .map(|opt| {
            let v = opt.unwrap_or(MISSING);
            mapping
                .iter()
                .find(|(from, _)| *from == v)
                .map(|(_, to)| *to)
                .unwrap_or(v)
        })
        .collect();
    let mut out = df.clone();
    out.replace(column, Series::new(PlSmallStr::from(column), values))?;
    Ok(out)
}

fn drop_category(df: &DataFrame, column: &str, value: &str) -> ReportResult<DataFrame> {
    let Ok(col) = df.column(column) else {
        return Ok(df.clone());
    };
    let ca = col.str()?;
    let keep: Vec<bool> = ca
        .into_iter()
        .map(|opt| opt.map_or(true, |v| v != value))
        .collect();
    Ok(filter_rows(df, &keep)?)
}

/// One joint mask across every listed numeric column: a row survives only if
/// all listed values are present and finite. This keeps bivariate statistics
/// on paired observations instead of two independently cleaned vectors.
fn complete_cases(df: &DataFrame, columns: &[String]) -> ReportResult<DataFrame> {
    let mut keep = vec![true; df.height()];
    for column in columns {
        let col = df.column(column).map_err(|_| {
            ReportError::Configuration(format!("unknown column '{}' in complete-case filter", column))
        })?;
        let ca = col.cast(&DataType::Float64)?;
        let ca = ca.f64()?;
        for (i, opt) in ca.into_iter().enumerate() {
            if !opt.map_or(false, f64::is_finite) {
                keep[i] = false;
            }
        }
    }
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        info!(
            "Complete-case filter on [{}] dropped {} of {} rows",
            columns.join(", "),
            dropped,
            df.height()
        );
    }
    Ok(filter_rows(df, &keep)?)
}

/// Keep only rows whose category is among the `n` most frequent values of
/// `column`. Ties are broken by first appearance in the table.
fn retain_top_n(df: &DataFrame, column: &str, n: usize) -> ReportResult<DataFrame> {
    if n == 0 {
        return Err(ReportError::Configuration(
            "top-N retention requires N >= 1".into(),
        ));
    }
    let col = df.column(column).map_err(|_| {
        ReportError::Configuration(format!("unknown column '{}' in top-N filter", column))
    })?;
    let ca = col.str()?;

    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut first_seen: Vec<&str> = Vec::new();
    for opt in ca.into_iter() {
        let v = opt.unwrap_or(MISSING);
        if !counts.contains_key(v) {
            first_seen.push(v);
        }
        *counts.entry(v).or_insert(0) += 1;
    }

    let mut ranked: Vec<(usize, &str)> = first_seen
        .iter()
        .enumerate()
        .map(|(order, v)| (order, *v))
        .collect();
    ranked.sort_by(|(order_a, a), (order_b, b)| {
        counts[b].cmp(&counts[a]).then(order_a.cmp(order_b))
    });
    let kept: Vec<&str> = ranked.iter().take(n).map(|(_, v)| *v).collect();

    let keep: Vec<bool> = ca
        .into_iter()
        .map(|opt| kept.contains(&opt.unwrap_or(MISSING)))
        .collect();
    Ok(filter_rows(df, &keep)?)
}

/// Policy for `-log10` over non-positive input: the transform never silently
/// produces NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonPositivePolicy {
    /// Fail the invocation, naming the column and offending row count.
    Fail,
    /// Drop the offending rows before transforming.
    Drop,
}

/// Append a `neg_log10_<column>` column, returning the filtered frame and the
/// derived column's name.
pub fn with_neg_log10(
    df: DataFrame,
    column: &str,
    policy: NonPositivePolicy,
) -> ReportResult<(DataFrame, String)> {
    let col = df.column(column).map_err(|_| {
        ReportError::Configuration(format!("unknown column '{}' for -log10 transform", column))
    })?;
    let ca = col.cast(&DataType::Float64)?;
    let ca = ca.f64()?;

    let bad = ca
        .into_iter()
        .filter(|opt| opt.map_or(true, |v| !(v.is_finite() && v > 0.0)))
        .count();

    let df = if bad > 0 {
        match policy {
            NonPositivePolicy::Fail => {
                return Err(ReportError::Data(format!(
                    "-log10({}) undefined for {} of {} rows (non-positive or missing)",
                    column,
                    bad,
                    df.height()
                )));
            }
            NonPositivePolicy::Drop => {
                warn!(
                    "Dropping {} rows with non-positive '{}' before -log10",
                    bad, column
                );
                let keep: Vec<bool> = ca
                    .into_iter()
                    .map(|opt| opt.map_or(false, |v| v.is_finite() && v > 0.0))
                    .collect();
                filter_rows(&df, &keep)?
            }
        }
    } else {
        df
    };

    let name = format!("neg_log10_{}", column);
    let source = df.column(column)?.cast(&DataType::Float64)?;
    let values: Vec<f64> = source
        .f64()?
        .into_no_null_iter()
        .map(|v| -v.log10())
        .collect();
    let mut out = df;
    out.with_column(Series::new(PlSmallStr::from(name.as_str()), values))?;
    Ok((out, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "round" => &[1i64, 1, 2, 1, 2, 1, 1, 2, 1, 1],
            "kd" => &[1e-7, 1e-9, 5e-8, 2e-8, 4e-9, 1e-6, 3e-8, 8e-9, 0.0, 2e-7],
            "binding_strength" => &[
                "Weak", "Medium", "Medium", "Medium", "Strong",
                "Weak", "Medium", "Weak", "Strong", "Medium",
            ],
            "design_category" => &[
                "De novo", "De novo", "Optimized binder", "Not mentioned", "De novo",
                "Missing data", "De novo", "Optimized binder", "De novo", "De novo",
            ],
        )
        .unwrap()
    }

    #[test]
    fn round_filter_keeps_only_requested_round() {
        let spec = FilterSpec {
            round: RoundFilter::One,
            ..FilterSpec::default()
        };
        let out = spec.apply(&sample_frame(), &[]).unwrap();
        let rounds = out.column("round").unwrap().i64().unwrap();
        assert!(rounds.into_no_null_iter().all(|r| r == 1));
        assert_eq!(out.height(), 7);
    }

    #[test]
    fn both_rounds_pass_through() {
        let spec = FilterSpec::default();
        let out = spec.apply(&sample_frame(), &[]).unwrap();
        assert_eq!(out.height(), 10);
    }

    #[test]
    fn exclusion_toggles_are_independent() {
        let spec = FilterSpec {
            drop_not_mentioned: true,
            ..FilterSpec::default()
        };
        let out = spec.apply(&sample_frame(), &["design_category"]).unwrap();
        assert_eq!(out.height(), 9);

        let spec = FilterSpec {
            drop_not_mentioned: true,
            drop_missing_data: true,
            ..FilterSpec::default()
        };
        let out = spec.apply(&sample_frame(), &["design_category"]).unwrap();
        assert_eq!(out.height(), 8);
    }

    #[test]
    fn top_n_retains_most_frequent_categories() {
        let frame = df!(
            "cat" => &["Weak", "Medium", "Weak", "Medium", "Strong", "Medium", "Weak", "Medium", "Strong", "Medium"],
        )
        .unwrap();
        // Frequencies: Medium 5, Weak 3, Strong 2.
        let out = retain_top_n(&frame, "cat", 2).unwrap();
        let kept = out.column("cat").unwrap().str().unwrap();
        let mut seen: Vec<&str> = kept.into_no_null_iter().collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen, vec!["Medium", "Weak"]);
        assert_eq!(out.height(), 8);
    }

    #[test]
    fn top_n_of_zero_is_a_configuration_error() {
        let frame = df!(
            "cat" => &["A", "B"],
        )
        .unwrap();
        let err = retain_top_n(&frame, "cat", 0).unwrap_err();
        assert!(matches!(err, ReportError::Configuration(_)));
    }

    #[test]
    fn top_n_tie_breaks_by_first_seen() {
        let frame = df!(
            "cat" => &["B", "A", "B", "A"],
        )
        .unwrap();
        let out = retain_top_n(&frame, "cat", 1).unwrap();
        let kept = out.column("cat").unwrap().str().unwrap();
        assert!(kept.into_no_null_iter().all(|v| v == "B"));
    }

    #[test]
    fn neg_log10_fails_on_non_positive_input() {
        let err = with_neg_log10(sample_frame(), "kd", NonPositivePolicy::Fail).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("kd"), "error should name the column: {msg}");
        assert!(msg.contains('1'), "error should count offending rows: {msg}");
    }

    #[test]
    fn neg_log10_drop_policy_removes_offending_rows() {
        let (out, name) = with_neg_log10(sample_frame(), "kd", NonPositivePolicy::Drop).unwrap();
        assert_eq!(name, "neg_log10_kd");
        assert_eq!(out.height(), 9);
        // 10^(-(-log10(x))) == x within floating-point tolerance.
        let kd = out.column("kd").unwrap().f64().unwrap();
        let derived = out.column(&name).unwrap().f64().unwrap();
        for (orig, t) in kd.into_no_null_iter().zip(derived.into_no_null_iter()) {
            let back = 10f64.powf(-t);
            assert!((back - orig).abs() <= 1e-12 * orig.abs().max(1e-300));
        }
    }

    #[test]
    fn recode_maps_binding_strength_unknown() {
        let frame = df!(
            "binding_strength" => &["Unknown", "Strong"],
        )
        .unwrap();
        let out = recode_levels(&frame, "binding_strength").unwrap();
        let ca = out.column("binding_strength").unwrap().str().unwrap();
        let values: Vec<&str> = ca.into_no_null_iter().collect();
        assert_eq!(values, vec!["Not expressed", "Strong"]);
    }
}
