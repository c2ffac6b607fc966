//! Submission-table loader.
//!
//! Reads one CSV or parquet file of design submissions, checks the columns a
//! plot needs before any stage runs, and collapses the three missing-value
//! spellings found in the annotation exports (null, empty string, literal
//! "NULL") into a single sentinel so downstream filters only reason about one
//! representation.

use std::fs::File;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{info, warn};

use crate::models::{ReportError, ReportResult};

/// Single sentinel every categorical missing value is normalized to at load
/// time.
pub const MISSING: &str = "Missing data";

pub struct SubmissionDataset {
    pub path: PathBuf,
}

impl SubmissionDataset {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SubmissionDataset { path: path.into() }
    }

    /// Load the table, validate that `required_columns` exist, and normalize
    /// missing categoricals. Fails with a `Configuration` error naming every
    /// missing column at once.
    pub fn load(&self, required_columns: &[&str]) -> ReportResult<DataFrame> {
        if !self.path.exists() {
            return Err(ReportError::Data(format!(
                "input file not found: {}",
                self.path.display()
            )));
        }

        let mut df = read_table(&self.path)?;
        info!(
            "Loaded {} rows x {} columns from {}",
            df.height(),
            df.width(),
            self.path.display()
        );

        validate_columns(&df, required_columns, &self.path)?;
        normalize_missing(&mut df)?;
        Ok(df)
    }
}

fn read_table(path: &Path) -> ReportResult<DataFrame> {
    let is_parquet = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("parquet"))
        .unwrap_or(false);

    let df = if is_parquet {
        ParquetReader::new(File::open(path)?).finish()?
    } else {
        CsvReadOptions::default()
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?
    };
    Ok(df)
}

fn validate_columns(df: &DataFrame, required: &[&str], path: &Path) -> ReportResult<()> {
    let present: Vec<&str> = df.get_column_names().iter().map(|c| c.as_str()).collect();
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|c| !present.contains(c))
        .collect();
    if !missing.is_empty() {
        return Err(ReportError::Configuration(format!(
            "missing required column(s) [{}] in {}",
            missing.join(", "),
            path.display()
        )));
    }
    Ok(())
}

/// Rewrite every string column so null, "" and "NULL" all read as [`MISSING`].
fn normalize_missing(df: &mut DataFrame) -> ReportResult<()> {
    let string_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|c| c.dtype() == &DataType::String)
        .map(|c| c.name().to_string())
        .collect();

    for name in string_columns {
        let ca = df.column(&name)?.str()?;
        let mut replaced = 0usize;
        let values: Vec<&str> = ca
            .into_iter()
            .map(|opt| match opt {
                None | Some("") | Some("NULL") => {
                    replaced += 1;
                    MISSING
                }
                Some(v) => v,
            })
            .collect();
        if replaced > 0 {
            info!("Normalized {} missing values in column '{}'", replaced, name);
            df.replace(&name, Series::new(PlSmallStr::from(name.as_str()), values))?;
        }
    }
    Ok(())
}

/// Extract one numeric column as f64, casting if needed. Rows where the value
/// is null are kept as NaN so callers can build complete-case masks that pair
/// up across columns.
pub fn numeric_column(df: &DataFrame, column: &str) -> ReportResult<Vec<f64>> {
    let col = df.column(column).map_err(|_| {
        ReportError::Configuration(format!("unknown numeric column '{}'", column))
    })?;
    let casted = match col.f64() {
        Ok(ca) => ca.clone(),
        Err(_) => {
            warn!("Casting column '{}' from {} to f64", column, col.dtype());
            col.cast(&DataType::Float64)
                .map_err(|e| {
                    ReportError::Data(format!("cannot cast column '{}' to f64: {}", column, e))
                })?
                .f64()?
                .clone()
        }
    };
    Ok(casted
        .into_iter()
        .map(|opt| opt.unwrap_or(f64::NAN))
        .collect())
}

/// Extract one categorical column as owned strings (post-normalization these
/// contain no nulls).
pub fn categorical_column(df: &DataFrame, column: &str) -> ReportResult<Vec<String>> {
    let col = df.column(column).map_err(|_| {
        ReportError::Configuration(format!("unknown categorical column '{}'", column))
    })?;
    let ca = col.str().map_err(|_| {
        ReportError::Data(format!(
            "column '{}' is {} but a categorical column was expected",
            column,
            col.dtype()
        ))
    })?;
    Ok(ca
        .into_iter()
        .map(|opt| opt.unwrap_or(MISSING).to_string())
        .collect())
}
