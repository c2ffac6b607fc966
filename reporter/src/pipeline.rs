//! One function per plot kind: load the table, apply the filter spec, run the
//! statistics the plot needs, render, and write companion statistics files
//! next to the image.
//!
//! File names are derived from the selected columns
//! (`barplot_<x>_by_<color>.<format>`), so rerunning an invocation overwrites
//! its own artifacts and nothing else.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis::correlation::{self, CorrMethod, Correlation};
use crate::analysis::group_comparison;
use crate::analysis::projection::{self, ProjectionMethod};
use crate::analysis::roc::{self, RocCurve};
use crate::charts::{bar, density, radar, roc as roc_chart, scatter, stacked, violin, PlotLayout};
use crate::data_handling::submissions::{categorical_column, numeric_column, SubmissionDataset};
use crate::filters::{with_neg_log10, FilterSpec, NonPositivePolicy};
use crate::metrics::{level_order, metric_descriptor, palette_for_column, MetricDescriptor, Transform};
use crate::models::{PlotArtifacts, ReportError, ReportResult};

/// Inputs shared by every plot invocation.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub layout: PlotLayout,
    pub filter: FilterSpec,
    pub title: Option<String>,
    pub subtitle: Option<String>,
}

impl RunConfig {
    fn title_or(&self, default: impl Into<String>) -> String {
        self.title.clone().unwrap_or_else(|| default.into())
    }

    fn subtitle_or(&self, default: impl Into<String>) -> String {
        self.subtitle.clone().unwrap_or_else(|| default.into())
    }

    fn artifact(&self, stem: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{}", stem, self.layout.format.extension()))
    }
}

fn load_filtered(
    config: &RunConfig,
    required: &[&str],
    categorical: &[&str],
) -> ReportResult<DataFrame> {
    let mut required: Vec<&str> = required.to_vec();
    if config.filter.round.round_number().is_some() && !required.contains(&"round") {
        required.push("round");
    }
    let df = SubmissionDataset::new(&config.input).load(&required)?;
    config.filter.apply(&df, categorical)
}

/// Resolve a metric column: apply its registered transform (if any) and hand
/// back the frame, the descriptor, and the name of the column to plot.
fn resolve_metric(
    df: DataFrame,
    column: &str,
    policy: NonPositivePolicy,
) -> ReportResult<(DataFrame, MetricDescriptor, String)> {
    let descriptor = metric_descriptor(column);
    match descriptor.transform {
        Some(Transform::NegLog10) => {
            let (df, derived) = with_neg_log10(df, column, policy)?;
            Ok((df, descriptor, derived))
        }
        None => Ok((df, descriptor, column.to_string())),
    }
}

/// Present category levels in display order: the registered order first, then
/// anything else (e.g. the missing sentinel) in first-seen order.
fn ordered_levels(values: &[String], column: &str) -> Vec<String> {
    let mut present: Vec<String> = Vec::new();
    for v in values {
        if !present.contains(v) {
            present.push(v.clone());
        }
    }
    let Some(order) = level_order(column) else {
        return present;
    };
    let mut out: Vec<String> = order
        .iter()
        .filter(|l| present.iter().any(|p| p == *l))
        .map(|l| l.to_string())
        .collect();
    for v in present {
        if !out.contains(&v) {
            out.push(v);
        }
    }
    out
}

fn write_stats_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> ReportResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| ReportError::Data(format!("cannot write {}: {}", path.display(), e)))?;
    writer
        .write_record(header)
        .and_then(|_| rows.iter().try_for_each(|row| writer.write_record(row)))
        .map_err(|e| ReportError::Data(format!("cannot write {}: {}", path.display(), e)))?;
    writer
        .flush()
        .map_err(|e| ReportError::Data(format!("cannot write {}: {}", path.display(), e)))?;
    info!("Wrote {}", path.display());
    Ok(())
}

fn write_stats_json<T: Serialize>(path: &Path, value: &T) -> ReportResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ReportError::Data(format!("cannot serialize statistics: {}", e)))?;
    std::fs::write(path, json)?;
    info!("Wrote {}", path.display());
    Ok(())
}

/// Per-bar percentage annotation, keyed on the color column the way the
/// original report figures were: share of binders, of expressed designs, or of
/// selected designs.
fn percent_labels(
    x_values: &[String],
    color_values: &[String],
    x_levels: &[String],
    color_column: &str,
) -> Vec<String> {
    // Inclusion lists, not negations: the missing sentinel must count toward
    // neither side of the percentage.
    let counted: Option<(&str, Box<dyn Fn(&str) -> bool>)> = match color_column {
        "binding" => Some(("binders", Box::new(|v: &str| v == "Yes"))),
        "binding_strength" => Some((
            "binders",
            Box::new(|v: &str| matches!(v, "Weak" | "Medium" | "Strong")),
        )),
        "expression" => Some((
            "expressed",
            Box::new(|v: &str| matches!(v, "Low" | "Medium" | "High")),
        )),
        "selected" => Some((
            "selected",
            Box::new(|v: &str| matches!(v, "Top 100" | "Adaptyv selection")),
        )),
        _ => None,
    };
    let Some((noun, predicate)) = counted else {
        return vec![String::new(); x_levels.len()];
    };

    x_levels
        .iter()
        .map(|level| {
            let mut total = 0usize;
            let mut hits = 0usize;
            for (x, c) in x_values.iter().zip(color_values.iter()) {
                if x == level {
                    total += 1;
                    if predicate(c) {
                        hits += 1;
                    }
                }
            }
            if total == 0 {
                String::new()
            } else {
                format!("{:.0}% {}", hits as f64 / total as f64 * 100.0, noun)
            }
        })
        .collect()
}

fn cross_tab(
    x_values: &[String],
    color_values: &[String],
    x_levels: &[String],
    color_levels: &[String],
) -> Vec<Vec<u64>> {
    let x_index: HashMap<&str, usize> = x_levels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let mut counts = vec![vec![0u64; x_levels.len()]; color_levels.len()];
    for (x, c) in x_values.iter().zip(color_values.iter()) {
        let (Some(&xi), Some(ci)) = (
            x_index.get(x.as_str()),
            color_levels.iter().position(|l| l == c),
        ) else {
            continue;
        };
        counts[ci][xi] += 1;
    }
    counts
}

fn count_rows(
    x_levels: &[String],
    color_levels: &[String],
    counts: &[Vec<u64>],
) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for (ci, color) in color_levels.iter().enumerate() {
        for (xi, x) in x_levels.iter().enumerate() {
            rows.push(vec![x.clone(), color.clone(), counts[ci][xi].to_string()]);
        }
    }
    rows
}

/// Stacked count bars of `x_column`, segmented by `color_column`.
pub fn run_bar(config: &RunConfig, x_column: &str, color_column: &str) -> ReportResult<PlotArtifacts> {
    let df = load_filtered(config, &[x_column, color_column], &[x_column, color_column])?;
    let x_values = categorical_column(&df, x_column)?;
    let color_values = categorical_column(&df, color_column)?;

    let x_levels = ordered_levels(&x_values, x_column);
    let color_levels = ordered_levels(&color_values, color_column);
    let counts = cross_tab(&x_values, &color_values, &x_levels, &color_levels);
    let palette = palette_for_column(color_column);

    let chart = bar::BarChart {
        title: config.title_or(format!(
            "{} by {}",
            crate::metrics::title_case(x_column),
            crate::metrics::title_case(color_column)
        )),
        subtitle: config.subtitle_or(format!("n = {}", df.height())),
        x_label: crate::metrics::title_case(x_column),
        y_label: "Number of submissions".to_string(),
        x_levels: x_levels.clone(),
        segments: color_levels
            .iter()
            .enumerate()
            .map(|(i, level)| bar::BarSegment {
                label: level.clone(),
                color: palette.color_for(level, i),
                counts: counts[i].clone(),
            })
            .collect(),
        percent_labels: percent_labels(&x_values, &color_values, &x_levels, color_column),
    };

    let image = config.artifact(&format!("barplot_{}_by_{}", x_column, color_column));
    bar::render(&image, &config.layout, &chart)?;

    let stats_csv = image.with_extension("csv");
    write_stats_csv(
        &stats_csv,
        &[x_column, color_column, "count"],
        &count_rows(&x_levels, &color_levels, &counts),
    )?;

    Ok(PlotArtifacts {
        image,
        stats_csv: Some(stats_csv),
        stats_json: None,
    })
}

/// 100%-stacked composition of `color_column` within each `x_column` level.
pub fn run_stacked(
    config: &RunConfig,
    x_column: &str,
    color_column: &str,
) -> ReportResult<PlotArtifacts> {
    let df = load_filtered(config, &[x_column, color_column], &[x_column, color_column])?;
    let x_values = categorical_column(&df, x_column)?;
    let color_values = categorical_column(&df, color_column)?;

    let x_levels = ordered_levels(&x_values, x_column);
    let color_levels = ordered_levels(&color_values, color_column);
    let counts = cross_tab(&x_values, &color_values, &x_levels, &color_levels);
    let palette = palette_for_column(color_column);

    let chart = stacked::StackedChart {
        title: config.title_or(format!(
            "{} composition by {}",
            crate::metrics::title_case(color_column),
            crate::metrics::title_case(x_column)
        )),
        subtitle: config.subtitle_or(format!("n = {}", df.height())),
        x_label: crate::metrics::title_case(x_column),
        x_levels: x_levels.clone(),
        segments: color_levels
            .iter()
            .enumerate()
            .map(|(i, level)| stacked::StackedSegment {
                label: level.clone(),
                color: palette.color_for(level, i),
                counts: counts[i].clone(),
            })
            .collect(),
    };

    let image = config.artifact(&format!("stackedplot_{}_by_{}", x_column, color_column));
    stacked::render(&image, &config.layout, &chart)?;

    let stats_csv = image.with_extension("csv");
    write_stats_csv(
        &stats_csv,
        &[x_column, color_column, "count"],
        &count_rows(&x_levels, &color_levels, &counts),
    )?;

    Ok(PlotArtifacts {
        image,
        stats_csv: Some(stats_csv),
        stats_json: None,
    })
}

fn metric_groups(
    df: &DataFrame,
    value_column: &str,
    group_column: &str,
) -> ReportResult<Vec<(String, Vec<f64>)>> {
    let values = numeric_column(df, value_column)?;
    let groups = categorical_column(df, group_column)?;
    let levels = ordered_levels(&groups, group_column);
    Ok(levels
        .into_iter()
        .map(|level| {
            let members: Vec<f64> = groups
                .iter()
                .zip(values.iter())
                .filter(|(g, v)| *g == &level && v.is_finite())
                .map(|(_, v)| *v)
                .collect();
            (level, members)
        })
        .collect())
}

/// Violin plot of one metric across the levels of `group_column`, annotated
/// with the Kruskal-Wallis omnibus result.
pub fn run_violin(
    config: &RunConfig,
    metric: &str,
    group_column: &str,
    policy: NonPositivePolicy,
) -> ReportResult<PlotArtifacts> {
    let df = load_filtered(config, &[metric, group_column], &[group_column])?;
    let (df, descriptor, value_column) = resolve_metric(df, metric, policy)?;

    let groups = metric_groups(&df, &value_column, group_column)?;
    let comparison = group_comparison::kruskal_wallis(&groups)?;
    info!("{}", comparison.summary());

    let palette = palette_for_column(group_column);
    let chart = violin::ViolinChart {
        title: config.title_or(format!(
            "{} by {}",
            descriptor.label,
            crate::metrics::title_case(group_column)
        )),
        subtitle: config.subtitle_or(format!("n = {}", df.height())),
        y_label: descriptor.label.clone(),
        groups: groups
            .iter()
            .enumerate()
            .filter(|(_, (_, v))| !v.is_empty())
            .map(|(i, (label, values))| violin::ViolinGroup {
                label: format!("{} (n = {})", label, values.len()),
                color: palette.color_for(label, i),
                values: values.clone(),
            })
            .collect(),
        annotation: comparison.summary(),
    };

    let image = config.artifact(&format!("violinplot_{}_by_{}", metric, group_column));
    violin::render(&image, &config.layout, &chart)?;

    let stats_csv = image.with_extension("csv");
    write_stats_csv(
        &stats_csv,
        &["group_a", "group_b", "u", "p", "p_adjusted", "effect_r"],
        &comparison
            .pairwise
            .iter()
            .map(|t| {
                vec![
                    t.group_a.clone(),
                    t.group_b.clone(),
                    format!("{}", t.u),
                    format!("{}", t.p),
                    format!("{}", t.p_adjusted),
                    format!("{}", t.effect_r),
                ]
            })
            .collect::<Vec<_>>(),
    )?;
    let stats_json = image.with_extension("json");
    write_stats_json(&stats_json, &comparison)?;

    Ok(PlotArtifacts {
        image,
        stats_csv: Some(stats_csv),
        stats_json: Some(stats_json),
    })
}

/// Overlaid density curves of one metric per `group_column` level.
pub fn run_density(
    config: &RunConfig,
    metric: &str,
    group_column: &str,
    policy: NonPositivePolicy,
) -> ReportResult<PlotArtifacts> {
    let df = load_filtered(config, &[metric, group_column], &[group_column])?;
    let (df, descriptor, value_column) = resolve_metric(df, metric, policy)?;

    let groups = metric_groups(&df, &value_column, group_column)?;
    let palette = palette_for_column(group_column);
    let series: Vec<density::DensitySeries> = groups
        .iter()
        .enumerate()
        .filter(|(_, (_, v))| v.len() >= 2)
        .map(|(i, (label, values))| density::DensitySeries {
            label: label.clone(),
            color: palette.color_for(label, i),
            values: values.clone(),
        })
        .collect();
    if series.is_empty() {
        return Err(ReportError::StatisticalPrecondition(format!(
            "no group of '{}' has 2+ finite '{}' values",
            group_column, metric
        )));
    }

    let chart = density::DensityChart {
        title: config.title_or(format!(
            "{} distribution by {}",
            descriptor.label,
            crate::metrics::title_case(group_column)
        )),
        subtitle: config.subtitle_or(format!("n = {}", df.height())),
        x_label: descriptor.label.clone(),
        series,
    };

    let image = config.artifact(&format!("densityplot_{}_by_{}", metric, group_column));
    density::render(&image, &config.layout, &chart)?;

    Ok(PlotArtifacts {
        image,
        stats_csv: None,
        stats_json: None,
    })
}

fn correlation_annotation(c: &Correlation) -> String {
    let p = match c.p {
        Some(p) => group_comparison::format_p(p),
        None => "undefined".to_string(),
    };
    format!("{} r = {:.3} (p = {}, n = {})", c.method.name(), c.r, p, c.n)
}

/// Scatterplot of two metrics with a least-squares fit and a correlation
/// annotation, optionally colored by a categorical column.
pub fn run_scatter(
    config: &RunConfig,
    x_metric: &str,
    y_metric: &str,
    color_by: Option<&str>,
    method: CorrMethod,
    policy: NonPositivePolicy,
) -> ReportResult<PlotArtifacts> {
    let mut required = vec![x_metric, y_metric];
    let mut categorical: Vec<&str> = Vec::new();
    if let Some(color) = color_by {
        required.push(color);
        categorical.push(color);
    }
    let df = load_filtered(config, &required, &categorical)?;
    let (df, x_desc, x_column) = resolve_metric(df, x_metric, policy)?;
    let (df, y_desc, y_column) = resolve_metric(df, y_metric, policy)?;

    let xs = numeric_column(&df, &x_column)?;
    let ys = numeric_column(&df, &y_column)?;
    let (cx, cy) = correlation::complete_cases(&xs, &ys);
    let corr = correlation::correlate(&cx, &cy, method)?;
    info!("{}", correlation_annotation(&corr));

    let fit_line = correlation::linear_fit(&cx, &cy).ok().map(|(slope, intercept)| {
        let x_min = cx.iter().cloned().fold(f64::INFINITY, f64::min);
        let x_max = cx.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        [
            (x_min, slope * x_min + intercept),
            (x_max, slope * x_max + intercept),
        ]
    });

    let series = match color_by {
        Some(color) => {
            let labels = categorical_column(&df, color)?;
            let levels = ordered_levels(&labels, color);
            let palette = palette_for_column(color);
            levels
                .iter()
                .enumerate()
                .map(|(i, level)| scatter::ScatterSeries {
                    label: level.clone(),
                    color: palette.color_for(level, i),
                    points: labels
                        .iter()
                        .zip(xs.iter().zip(ys.iter()))
                        .filter(|(l, (x, y))| *l == level && x.is_finite() && y.is_finite())
                        .map(|(_, (x, y))| (*x, *y))
                        .collect(),
                })
                .filter(|s| !s.points.is_empty())
                .collect()
        }
        None => vec![scatter::ScatterSeries {
            label: "Submissions".to_string(),
            color: palette_for_column("").color_for("Submissions", 0),
            points: cx.iter().zip(cy.iter()).map(|(&x, &y)| (x, y)).collect(),
        }],
    };

    let chart = scatter::ScatterChart {
        title: config.title_or(format!("{} vs {}", y_desc.label, x_desc.label)),
        subtitle: config.subtitle_or(format!("n = {}", corr.n)),
        x_label: x_desc.label.clone(),
        y_label: y_desc.label.clone(),
        series,
        fit_line,
        annotation: correlation_annotation(&corr),
        show_legend: color_by.is_some(),
    };

    let image = config.artifact(&format!("scatterplot_{}_vs_{}", y_metric, x_metric));
    scatter::render(&image, &config.layout, &chart)?;

    let stats_json = image.with_extension("json");
    write_stats_json(&stats_json, &corr)?;

    Ok(PlotArtifacts {
        image,
        stats_csv: None,
        stats_json: Some(stats_json),
    })
}

#[derive(Serialize)]
struct RocSummary<'a> {
    metric: &'a str,
    label: &'a str,
    curve: &'a RocCurve,
}

/// ROC curves of one or more metrics against a binary outcome column.
///
/// A metric failing a statistical precondition (single-class outcome after
/// complete-case pairing) is skipped with a warning; the invocation fails only
/// when every requested metric fails.
pub fn run_roc(
    config: &RunConfig,
    metrics: &[String],
    outcome_column: &str,
    positive_value: &str,
) -> ReportResult<PlotArtifacts> {
    if metrics.is_empty() {
        return Err(ReportError::Configuration(
            "roc requires at least one --metric".into(),
        ));
    }
    let mut required: Vec<&str> = metrics.iter().map(String::as_str).collect();
    required.push(outcome_column);
    let df = load_filtered(config, &required, &[outcome_column])?;

    let outcomes = categorical_column(&df, outcome_column)?;
    let palette = palette_for_column("metric");

    let mut curves: Vec<(String, String, RocCurve)> = Vec::new();
    let mut last_error: Option<ReportError> = None;
    for metric in metrics {
        match roc_for_metric(&df, metric, &outcomes, positive_value) {
            Ok((descriptor, curve)) => curves.push((metric.clone(), descriptor.label, curve)),
            Err(e @ ReportError::StatisticalPrecondition(_)) => {
                warn!("Skipping ROC for '{}': {}", metric, e);
                last_error = Some(e);
            }
            Err(e) => return Err(e),
        }
    }
    if curves.is_empty() {
        return Err(last_error.unwrap_or_else(|| {
            ReportError::Data("no ROC curve could be computed".into())
        }));
    }

    curves.sort_by(|(_, _, a), (_, _, b)| {
        b.auc.partial_cmp(&a.auc).unwrap_or(std::cmp::Ordering::Equal)
    });

    let chart = roc_chart::RocChart {
        title: config.title_or(format!(
            "Metric performance predicting {}",
            crate::metrics::title_case(outcome_column)
        )),
        subtitle: config.subtitle_or(roc_subtitle(
            &curves
                .iter()
                .map(|(_, _, c)| (c.n_pos, c.n_neg))
                .collect::<Vec<_>>(),
        )),
        series: curves
            .iter()
            .enumerate()
            .map(|(i, (_, label, curve))| roc_chart::RocSeries {
                label: label.clone(),
                color: palette.color_for(label, i),
                fprs: curve.fprs.clone(),
                tprs: curve.tprs.clone(),
                auc: curve.auc,
            })
            .collect(),
    };

    let image = config.artifact(&format!("rocplot_{}", outcome_column));
    roc_chart::render(&image, &config.layout, &chart)?;

    let stats_csv = image.with_extension("csv");
    write_stats_csv(
        &stats_csv,
        &["metric", "label", "auc", "n_pos", "n_neg"],
        &curves
            .iter()
            .map(|(metric, label, curve)| {
                vec![
                    metric.clone(),
                    label.clone(),
                    format!("{}", curve.auc),
                    curve.n_pos.to_string(),
                    curve.n_neg.to_string(),
                ]
            })
            .collect::<Vec<_>>(),
    )?;
    let stats_json = image.with_extension("json");
    let summaries: Vec<RocSummary> = curves
        .iter()
        .map(|(metric, label, curve)| RocSummary {
            metric,
            label,
            curve,
        })
        .collect();
    write_stats_json(&stats_json, &summaries)?;

    Ok(PlotArtifacts {
        image,
        stats_csv: Some(stats_csv),
        stats_json: Some(stats_json),
    })
}

/// Class counts for the ROC subtitle. Complete-case pairing runs per metric,
/// so curves can sit on different subsets; unequal counts show as a range.
fn roc_subtitle(counts: &[(usize, usize)]) -> String {
    let range = |values: Vec<usize>| {
        let lo = values.iter().copied().min().unwrap_or(0);
        let hi = values.iter().copied().max().unwrap_or(0);
        if lo == hi {
            lo.to_string()
        } else {
            format!("{}-{}", lo, hi)
        }
    };
    format!(
        "{} positives, {} negatives",
        range(counts.iter().map(|(p, _)| *p).collect()),
        range(counts.iter().map(|(_, n)| *n).collect())
    )
}

fn roc_for_metric(
    df: &DataFrame,
    metric: &str,
    outcomes: &[String],
    positive_value: &str,
) -> ReportResult<(MetricDescriptor, RocCurve)> {
    let descriptor = metric_descriptor(metric);
    let raw = numeric_column(df, metric)?;

    // Pair scores with labels, keeping only finite scores. The transform is
    // folded into the orientation: -log10 flips which end is "best", which
    // compute_roc handles through the descriptor's direction on the
    // transformed scale.
    let mut scores = Vec::new();
    let mut labels = Vec::new();
    for (value, outcome) in raw.iter().zip(outcomes.iter()) {
        let score = match descriptor.transform {
            Some(Transform::NegLog10) => {
                if *value > 0.0 && value.is_finite() {
                    -value.log10()
                } else {
                    continue;
                }
            }
            None => {
                if value.is_finite() {
                    *value
                } else {
                    continue;
                }
            }
        };
        scores.push(score);
        labels.push(outcome == positive_value);
    }

    let curve = roc::compute_roc(&scores, &labels, descriptor.direction)?;
    Ok((descriptor, curve))
}

/// Radar chart: per-category mean of each metric, min-max normalized with the
/// better end of every axis pointing outward.
pub fn run_radar(
    config: &RunConfig,
    metrics: &[String],
    category_column: &str,
) -> ReportResult<PlotArtifacts> {
    if metrics.len() < 3 {
        return Err(ReportError::Configuration(format!(
            "radar needs at least 3 metrics, got {}",
            metrics.len()
        )));
    }
    let mut required: Vec<&str> = metrics.iter().map(String::as_str).collect();
    required.push(category_column);
    let df = load_filtered(config, &required, &[category_column])?;

    let categories = categorical_column(&df, category_column)?;
    let levels = ordered_levels(&categories, category_column);

    let descriptors: Vec<MetricDescriptor> =
        metrics.iter().map(|m| metric_descriptor(m)).collect();

    let metric_values: Vec<Vec<f64>> = metrics
        .iter()
        .map(|m| numeric_column(&df, m))
        .collect::<ReportResult<_>>()?;

    // Group means on the transformed scale, one row per category.
    let mut means: Vec<(String, Vec<f64>)> = Vec::new();
    for level in &levels {
        let mut row = Vec::with_capacity(metrics.len());
        for (values, descriptor) in metric_values.iter().zip(descriptors.iter()) {
            let members: Vec<f64> = categories
                .iter()
                .zip(values.iter())
                .filter(|(c, _)| *c == level)
                .filter_map(|(_, v)| match descriptor.transform {
                    Some(Transform::NegLog10) => {
                        (*v > 0.0 && v.is_finite()).then(|| -v.log10())
                    }
                    None => v.is_finite().then_some(*v),
                })
                .collect();
            if members.is_empty() {
                row.push(f64::NAN);
            } else {
                row.push(members.iter().sum::<f64>() / members.len() as f64);
            }
        }
        if row.iter().all(|v| v.is_finite()) {
            means.push((level.clone(), row));
        } else {
            warn!(
                "Skipping radar category '{}': no data for one of the metrics",
                level
            );
        }
    }
    if means.len() < 2 {
        return Err(ReportError::StatisticalPrecondition(format!(
            "radar needs at least 2 categories with complete metric coverage, got {}",
            means.len()
        )));
    }

    // Min-max per axis across the surviving category means; LowerIsBetter
    // axes are inverted so outward always reads "better".
    let normalized: Vec<(String, Vec<f64>)> = {
        let mut axis_min = vec![f64::INFINITY; metrics.len()];
        let mut axis_max = vec![f64::NEG_INFINITY; metrics.len()];
        for (_, row) in &means {
            for (i, v) in row.iter().enumerate() {
                axis_min[i] = axis_min[i].min(*v);
                axis_max[i] = axis_max[i].max(*v);
            }
        }
        means
            .iter()
            .map(|(label, row)| {
                let scaled = row
                    .iter()
                    .enumerate()
                    .map(|(i, v)| {
                        let span = axis_max[i] - axis_min[i];
                        let t = if span > 0.0 { (v - axis_min[i]) / span } else { 0.5 };
                        match descriptors[i].direction {
                            crate::models::Direction::HigherIsBetter => t,
                            crate::models::Direction::LowerIsBetter => 1.0 - t,
                        }
                    })
                    .collect();
                (label.clone(), scaled)
            })
            .collect()
    };

    let palette = palette_for_column(category_column);
    let chart = radar::RadarChart {
        title: config.title_or(format!(
            "Metric profile by {}",
            crate::metrics::title_case(category_column)
        )),
        subtitle: config.subtitle_or(format!("n = {}", df.height())),
        axes: descriptors.iter().map(|d| d.label.clone()).collect(),
        groups: normalized
            .iter()
            .enumerate()
            .map(|(i, (label, values))| radar::RadarGroup {
                label: label.clone(),
                color: palette.color_for(label, i),
                values: values.clone(),
            })
            .collect(),
    };

    let image = config.artifact(&format!("radarplot_by_{}", category_column));
    radar::render(&image, &config.layout, &chart)?;

    let stats_csv = image.with_extension("csv");
    let mut rows = Vec::new();
    for (label, row) in &means {
        for (metric, mean) in metrics.iter().zip(row.iter()) {
            rows.push(vec![label.clone(), metric.clone(), format!("{}", mean)]);
        }
    }
    write_stats_csv(&stats_csv, &[category_column, "metric", "mean"], &rows)?;

    Ok(PlotArtifacts {
        image,
        stats_csv: Some(stats_csv),
        stats_json: None,
    })
}

/// 2-D projection of numeric feature columns, scattered and colored by a
/// categorical column.
pub fn run_projection(
    config: &RunConfig,
    feature_columns: &[String],
    method: ProjectionMethod,
    color_by: Option<&str>,
) -> ReportResult<PlotArtifacts> {
    if feature_columns.len() < 2 {
        return Err(ReportError::Configuration(format!(
            "projection needs at least 2 feature columns, got {}",
            feature_columns.len()
        )));
    }
    let mut required: Vec<&str> = feature_columns.iter().map(String::as_str).collect();
    let mut categorical: Vec<&str> = Vec::new();
    if let Some(color) = color_by {
        required.push(color);
        categorical.push(color);
    }
    let df = load_filtered(config, &required, &categorical)?;

    let features: Vec<Vec<f64>> = feature_columns
        .iter()
        .map(|c| numeric_column(&df, c))
        .collect::<ReportResult<_>>()?;
    let labels = match color_by {
        Some(color) => categorical_column(&df, color)?,
        None => vec!["Submissions".to_string(); df.height()],
    };

    // Joint complete-case mask across every feature column, labels kept in
    // lockstep so projected row i still names the right category.
    let keep: Vec<usize> = (0..df.height())
        .filter(|&i| features.iter().all(|col| col[i].is_finite()))
        .collect();
    if keep.len() < 2 {
        return Err(ReportError::StatisticalPrecondition(format!(
            "projection needs at least 2 complete rows, got {}",
            keep.len()
        )));
    }
    if keep.len() < df.height() {
        info!(
            "Projection uses {} of {} rows with complete features",
            keep.len(),
            df.height()
        );
    }

    let mut matrix = Array2::zeros((keep.len(), feature_columns.len()));
    for (out_row, &src_row) in keep.iter().enumerate() {
        for (col, values) in features.iter().enumerate() {
            matrix[[out_row, col]] = values[src_row];
        }
    }
    let embedded = projection::project(&matrix, method)?;

    let kept_labels: Vec<String> = keep.iter().map(|&i| labels[i].clone()).collect();
    let levels = match color_by {
        Some(color) => ordered_levels(&kept_labels, color),
        None => vec!["Submissions".to_string()],
    };
    let palette = palette_for_column(color_by.unwrap_or(""));
    let series: Vec<scatter::ScatterSeries> = levels
        .iter()
        .enumerate()
        .map(|(i, level)| scatter::ScatterSeries {
            label: level.clone(),
            color: palette.color_for(level, i),
            points: kept_labels
                .iter()
                .enumerate()
                .filter(|(_, l)| *l == level)
                .map(|(row, _)| (embedded[[row, 0]], embedded[[row, 1]]))
                .collect(),
        })
        .filter(|s| !s.points.is_empty())
        .collect();

    let (x_label, y_label) = match method {
        ProjectionMethod::Pca => ("PC1".to_string(), "PC2".to_string()),
        ProjectionMethod::Tsne { .. } => ("t-SNE 1".to_string(), "t-SNE 2".to_string()),
        ProjectionMethod::Umap { .. } => ("UMAP 1".to_string(), "UMAP 2".to_string()),
    };

    let chart = scatter::ScatterChart {
        title: config.title_or(format!("{} projection", method.name().to_uppercase())),
        subtitle: config.subtitle_or(format!("n = {}", keep.len())),
        x_label,
        y_label,
        series,
        fit_line: None,
        annotation: String::new(),
        show_legend: color_by.is_some(),
    };

    let stem = match color_by {
        Some(color) => format!("projection_{}_by_{}", method.name(), color),
        None => format!("projection_{}", method.name()),
    };
    let image = config.artifact(&stem);
    scatter::render(&image, &config.layout, &chart)?;

    let stats_csv = image.with_extension("csv");
    let rows: Vec<Vec<String>> = kept_labels
        .iter()
        .enumerate()
        .map(|(row, label)| {
            vec![
                label.clone(),
                format!("{}", embedded[[row, 0]]),
                format!("{}", embedded[[row, 1]]),
            ]
        })
        .collect();
    write_stats_csv(&stats_csv, &["category", "dim1", "dim2"], &rows)?;

    Ok(PlotArtifacts {
        image,
        stats_csv: Some(stats_csv),
        stats_json: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn percent_labels_count_only_listed_levels() {
        // The missing sentinel counts toward the denominator but never the
        // numerator.
        let x = strings(&["r1", "r1", "r1", "r1", "r2", "r2"]);
        let expr = strings(&["High", "Low", "None", "Missing data", "Medium", "None"]);
        let levels = strings(&["r1", "r2"]);
        let labels = percent_labels(&x, &expr, &levels, "expression");
        assert_eq!(labels, vec!["50% expressed", "50% expressed"]);
    }

    #[test]
    fn percent_labels_cover_binding_strength() {
        let x = strings(&["r1", "r1", "r1", "r1"]);
        let strength = strings(&["Weak", "Strong", "None", "Not expressed"]);
        let levels = strings(&["r1"]);
        let labels = percent_labels(&x, &strength, &levels, "binding_strength");
        assert_eq!(labels, vec!["50% binders"]);
    }

    #[test]
    fn percent_labels_stay_empty_for_unregistered_columns() {
        let x = strings(&["a", "b"]);
        let c = strings(&["p", "q"]);
        let levels = strings(&["a", "b"]);
        let labels = percent_labels(&x, &c, &levels, "design_category");
        assert!(labels.iter().all(String::is_empty));
    }

    #[test]
    fn roc_subtitle_collapses_equal_counts_and_ranges_unequal_ones() {
        assert_eq!(roc_subtitle(&[(12, 30), (12, 30)]), "12 positives, 30 negatives");
        assert_eq!(roc_subtitle(&[(12, 30), (10, 28)]), "10-12 positives, 28-30 negatives");
    }
}
