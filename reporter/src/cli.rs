//! Command-line surface: one subcommand per plot kind over the shared
//! pipeline.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::analysis::correlation::CorrMethod;
use crate::analysis::projection::{ProjectionMethod, DEFAULT_NEIGHBORS, DEFAULT_PERPLEXITY};
use crate::charts::PlotLayout;
use crate::filters::{FilterSpec, NonPositivePolicy, TopN};
use crate::models::{PlotArtifacts, PlotFormat, ReportError, ReportResult, RoundFilter};
use crate::pipeline::{self, RunConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Plots and statistics for protein binder competition submissions.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Submission table (CSV or parquet, by extension).
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory the image and statistics files are written to.
    #[arg(short, long, default_value = "plots")]
    pub output: PathBuf,

    /// Output image format.
    #[arg(long, default_value = "png")]
    pub format: PlotFormat,

    #[arg(long, default_value_t = 1300)]
    pub width: u32,

    #[arg(long, default_value_t = 1100)]
    pub height: u32,

    /// Nominal DPI; scales every font relative to 300.
    #[arg(long, default_value_t = 300)]
    pub res: u32,

    /// Competition round to keep: 1, 2, or both.
    #[arg(long, default_value = "both")]
    pub round: RoundFilter,

    /// Drop rows whose category reads "Not mentioned".
    #[arg(long)]
    pub drop_not_mentioned: bool,

    /// Drop rows whose category reads "Missing data".
    #[arg(long)]
    pub drop_missing_data: bool,

    /// Keep only the N most frequent categories of the grouping column.
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Drop rows with non-positive values instead of failing when a -log10
    /// transform applies.
    #[arg(long)]
    pub drop_non_positive: bool,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub subtitle: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stacked count bars of one categorical column, segmented by another.
    Bar {
        #[arg(long = "x-column")]
        x_column: String,
        #[arg(long = "color-by")]
        color_by: String,
    },
    /// Violin plot of a metric across category levels, with a Kruskal-Wallis
    /// annotation and Mann-Whitney post-hoc statistics.
    Violin {
        #[arg(long)]
        metric: String,
        #[arg(long = "category-column")]
        category_column: String,
    },
    /// Overlaid density curves of a metric per category level.
    Density {
        #[arg(long)]
        metric: String,
        #[arg(long = "category-column")]
        category_column: String,
    },
    /// Scatterplot of two metrics with a fit line and correlation annotation.
    Scatter {
        #[arg(long = "x-column")]
        x_column: String,
        #[arg(long = "y-column")]
        y_column: String,
        #[arg(long = "color-by")]
        color_by: Option<String>,
        /// Correlation method: pearson, spearman, or kendall.
        #[arg(long, default_value = "spearman")]
        method: String,
    },
    /// ROC curves of one or more metrics against a binary outcome column.
    Roc {
        /// Repeatable; metrics failing a statistical precondition are skipped.
        #[arg(long, required = true)]
        metric: Vec<String>,
        #[arg(long = "outcome-column", default_value = "binding")]
        outcome_column: String,
        #[arg(long = "positive-value", default_value = "Yes")]
        positive_value: String,
    },
    /// Radar chart of normalized per-category metric means.
    Radar {
        #[arg(long, required = true)]
        metric: Vec<String>,
        #[arg(long = "category-column")]
        category_column: String,
    },
    /// 100%-stacked composition bars.
    Stacked {
        #[arg(long = "x-column")]
        x_column: String,
        #[arg(long = "color-by")]
        color_by: String,
    },
    /// 2-D projection of numeric feature columns.
    Projection {
        /// Repeatable numeric feature columns.
        #[arg(long = "feature-column", required = true)]
        feature_column: Vec<String>,
        /// pca, tsne, or umap.
        #[arg(long, default_value = "pca")]
        method: String,
        #[arg(long, default_value_t = DEFAULT_PERPLEXITY)]
        perplexity: f64,
        #[arg(long, default_value_t = DEFAULT_NEIGHBORS)]
        neighbors: usize,
        #[arg(long = "color-by")]
        color_by: Option<String>,
    },
}

impl Cli {
    fn run_config(&self) -> RunConfig {
        let common = &self.common;
        RunConfig {
            input: common.input.clone(),
            output_dir: common.output.clone(),
            layout: PlotLayout {
                width: common.width,
                height: common.height,
                res: common.res,
                format: common.format,
            },
            filter: FilterSpec {
                round: common.round,
                drop_not_mentioned: common.drop_not_mentioned,
                drop_missing_data: common.drop_missing_data,
                complete_case: Vec::new(),
                top_n: common.top_n.and_then(|n| {
                    let column = self.command.grouping_column();
                    (!column.is_empty()).then(|| TopN {
                        column: column.to_string(),
                        n,
                    })
                }),
            },
            title: common.title.clone(),
            subtitle: common.subtitle.clone(),
        }
    }

    fn policy(&self) -> NonPositivePolicy {
        if self.common.drop_non_positive {
            NonPositivePolicy::Drop
        } else {
            NonPositivePolicy::Fail
        }
    }

    /// Execute the selected subcommand.
    pub fn run(&self) -> ReportResult<PlotArtifacts> {
        let config = self.run_config();
        match &self.command {
            Command::Bar { x_column, color_by } => pipeline::run_bar(&config, x_column, color_by),
            Command::Violin {
                metric,
                category_column,
            } => pipeline::run_violin(&config, metric, category_column, self.policy()),
            Command::Density {
                metric,
                category_column,
            } => pipeline::run_density(&config, metric, category_column, self.policy()),
            Command::Scatter {
                x_column,
                y_column,
                color_by,
                method,
            } => pipeline::run_scatter(
                &config,
                x_column,
                y_column,
                color_by.as_deref(),
                parse_corr_method(method)?,
                self.policy(),
            ),
            Command::Roc {
                metric,
                outcome_column,
                positive_value,
            } => pipeline::run_roc(&config, metric, outcome_column, positive_value),
            Command::Radar {
                metric,
                category_column,
            } => pipeline::run_radar(&config, metric, category_column),
            Command::Stacked { x_column, color_by } => {
                pipeline::run_stacked(&config, x_column, color_by)
            }
            Command::Projection {
                feature_column,
                method,
                perplexity,
                neighbors,
                color_by,
            } => pipeline::run_projection(
                &config,
                feature_column,
                parse_projection_method(method, *perplexity, *neighbors)?,
                color_by.as_deref(),
            ),
        }
    }
}

impl Command {
    /// Column a `--top-n` filter acts on for this subcommand.
    fn grouping_column(&self) -> &str {
        match self {
            Command::Bar { x_column, .. } | Command::Stacked { x_column, .. } => x_column,
            Command::Violin {
                category_column, ..
            }
            | Command::Density {
                category_column, ..
            }
            | Command::Radar {
                category_column, ..
            } => category_column,
            Command::Scatter { color_by, .. } | Command::Projection { color_by, .. } => {
                color_by.as_deref().unwrap_or("")
            }
            Command::Roc { outcome_column, .. } => outcome_column,
        }
    }
}

fn parse_corr_method(s: &str) -> ReportResult<CorrMethod> {
    match s.to_ascii_lowercase().as_str() {
        "pearson" => Ok(CorrMethod::Pearson),
        "spearman" => Ok(CorrMethod::Spearman),
        "kendall" => Ok(CorrMethod::Kendall),
        other => Err(ReportError::Configuration(format!(
            "unknown correlation method '{}', expected pearson, spearman or kendall",
            other
        ))),
    }
}

fn parse_projection_method(
    s: &str,
    perplexity: f64,
    neighbors: usize,
) -> ReportResult<ProjectionMethod> {
    match s.to_ascii_lowercase().as_str() {
        "pca" => Ok(ProjectionMethod::Pca),
        "tsne" => Ok(ProjectionMethod::Tsne { perplexity }),
        "umap" => Ok(ProjectionMethod::Umap {
            n_neighbors: neighbors,
        }),
        other => Err(ReportError::Configuration(format!(
            "unknown projection method '{}', expected pca, tsne or umap",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bar_invocation() {
        let cli = Cli::parse_from([
            "reporter",
            "--input",
            "submissions.csv",
            "--round",
            "2",
            "bar",
            "--x-column",
            "binding_strength",
            "--color-by",
            "expression",
        ]);
        assert_eq!(cli.common.round, RoundFilter::Two);
        assert!(matches!(cli.command, Command::Bar { .. }));
    }

    #[test]
    fn roc_accepts_repeated_metrics() {
        let cli = Cli::parse_from([
            "reporter",
            "--input",
            "s.csv",
            "roc",
            "--metric",
            "iptm",
            "--metric",
            "pae_interaction",
        ]);
        let Command::Roc { metric, .. } = cli.command else {
            panic!("expected roc");
        };
        assert_eq!(metric, vec!["iptm", "pae_interaction"]);
    }

    #[test]
    fn correlation_method_parsing_rejects_unknown() {
        assert!(parse_corr_method("spearman").is_ok());
        assert!(parse_corr_method("tau").is_err());
    }
}
