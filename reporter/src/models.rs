use std::fmt;
use std::str::FromStr;

use polars::prelude::PolarsError;

/// Round selection applied before any other predicate. "both"/"all" passes
/// every row through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundFilter {
    One,
    Two,
    Both,
}

impl RoundFilter {
    pub fn round_number(&self) -> Option<i64> {
        match self {
            RoundFilter::One => Some(1),
            RoundFilter::Two => Some(2),
            RoundFilter::Both => None,
        }
    }
}

impl FromStr for RoundFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(RoundFilter::One),
            "2" => Ok(RoundFilter::Two),
            "both" | "all" => Ok(RoundFilter::Both),
            other => Err(format!("invalid round filter '{}', expected 1, 2 or both", other)),
        }
    }
}

impl fmt::Display for RoundFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundFilter::One => write!(f, "1"),
            RoundFilter::Two => write!(f, "2"),
            RoundFilter::Both => write!(f, "both"),
        }
    }
}

/// Semantic orientation of a metric. Decides which end of the scale counts as
/// "positive" when sweeping ROC thresholds; never inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlotFormat::Png => "png",
            PlotFormat::Svg => "svg",
        }
    }
}

impl FromStr for PlotFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(PlotFormat::Png),
            "svg" => Ok(PlotFormat::Svg),
            other => Err(format!("invalid plot format '{}', expected png or svg", other)),
        }
    }
}

impl fmt::Display for PlotFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Error taxonomy for one reporting invocation.
///
/// `Configuration` failures (bad flag, unknown column) and `Data` failures
/// (missing file, empty subset, non-finite input) are fatal.
/// `StatisticalPrecondition` (too few observations for a test) only skips the
/// affected sub-plot when several were requested.
#[derive(Debug)]
pub enum ReportError {
    Configuration(String),
    Data(String),
    StatisticalPrecondition(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Configuration(msg) => write!(f, "configuration error: {}", msg),
            ReportError::Data(msg) => write!(f, "data error: {}", msg),
            ReportError::StatisticalPrecondition(msg) => {
                write!(f, "statistical precondition not met: {}", msg)
            }
        }
    }
}

impl std::error::Error for ReportError {}

impl From<PolarsError> for ReportError {
    fn from(e: PolarsError) -> Self {
        ReportError::Data(e.to_string())
    }
}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        ReportError::Data(e.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Paths written by one pipeline run: the image plus optional companions.
#[derive(Debug, Clone)]
pub struct PlotArtifacts {
    pub image: std::path::PathBuf,
    pub stats_csv: Option<std::path::PathBuf>,
    pub stats_json: Option<std::path::PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_filter_parses_canonical_forms() {
        assert_eq!("1".parse::<RoundFilter>().unwrap(), RoundFilter::One);
        assert_eq!("2".parse::<RoundFilter>().unwrap(), RoundFilter::Two);
        assert_eq!("both".parse::<RoundFilter>().unwrap(), RoundFilter::Both);
        assert_eq!("all".parse::<RoundFilter>().unwrap(), RoundFilter::Both);
        assert!("3".parse::<RoundFilter>().is_err());
    }

    #[test]
    fn plot_format_round_trips_extension() {
        assert_eq!("png".parse::<PlotFormat>().unwrap().extension(), "png");
        assert_eq!("SVG".parse::<PlotFormat>().unwrap().extension(), "svg");
        assert!("pdf".parse::<PlotFormat>().is_err());
    }
}
