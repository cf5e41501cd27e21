// External crates
use chrono::{DateTime, NaiveDateTime};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

// Local modules
use crate::constants::{RECORD_COLUMNS, TARGET_COLUMN, TIME_COLUMN};
use crate::error::{ForecastError, Result};
use crate::util::file_utils::read_csv_file;

/// One OHLCV bar as returned by the market-data API and persisted to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// Unix timestamp in seconds
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volumefrom: f64,
    pub volumeto: f64,
}

/// Build a DataFrame with the persisted column layout from fetched records
pub fn records_to_dataframe(records: &[TimeSeriesRecord]) -> PolarsResult<DataFrame> {
    let time: Vec<i64> = records.iter().map(|r| r.time).collect();
    let values: [Vec<f64>; 6] = [
        records.iter().map(|r| r.open).collect(),
        records.iter().map(|r| r.high).collect(),
        records.iter().map(|r| r.low).collect(),
        records.iter().map(|r| r.close).collect(),
        records.iter().map(|r| r.volumefrom).collect(),
        records.iter().map(|r| r.volumeto).collect(),
    ];

    let mut columns: Vec<Column> = vec![Series::new(RECORD_COLUMNS[0].into(), time).into()];
    for (name, column) in RECORD_COLUMNS[1..].iter().zip(values) {
        columns.push(Series::new((*name).into(), column).into());
    }
    DataFrame::new(columns)
}

/// Extract a numeric column as `f64` values. Nulls become NaN.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    if !df.schema().contains(name) {
        return Err(ForecastError::MissingColumn(name.to_string()));
    }
    let column = df.column(name)?.cast(&DataType::Float64)?;
    Ok(column
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Extract the time column as unix seconds
pub fn time_values(df: &DataFrame) -> Result<Vec<i64>> {
    if !df.schema().contains(TIME_COLUMN) {
        return Err(ForecastError::MissingColumn(TIME_COLUMN.to_string()));
    }
    let column = df.column(TIME_COLUMN)?.cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().map(|v| v.unwrap_or(0)).collect())
}

/// Parse a timestamp given either as unix seconds or as a calendar string
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}

/// Rewrite the time column as Int64 unix seconds, whatever it was stored as
fn normalize_time_column(df: &mut DataFrame) -> Result<()> {
    let column = df.column(TIME_COLUMN)?;
    let seconds: Vec<Option<i64>> = match column.dtype() {
        DataType::String => column
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_timestamp))
            .collect(),
        _ => column
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .collect(),
    };
    df.with_column(Series::new(TIME_COLUMN.into(), seconds))?;
    Ok(())
}

/// Loads and preprocesses a stored price CSV into a DataFrame
///
/// The frame is sorted by time ascending, its time column is converted to
/// unix seconds and rows with missing values are dropped.
///
/// # Arguments
///
/// * `full_path` - Path to the CSV file
///
/// # Returns
///
/// Returns the preprocessed DataFrame, `NotFound` for a missing file and
/// `DataUnavailable` for a file without rows
pub fn load_and_preprocess(full_path: &Path) -> Result<DataFrame> {
    log::info!("Loading data from: {}", full_path.display());

    if !full_path.exists() {
        return Err(ForecastError::NotFound(format!(
            "File not found: {}",
            full_path.display()
        )));
    }

    let mut df = read_csv_file(full_path)?;

    // Verify required columns exist
    for col in [TIME_COLUMN, TARGET_COLUMN] {
        if !df.schema().contains(col) {
            return Err(ForecastError::MissingColumn(col.to_string()));
        }
    }

    normalize_time_column(&mut df)?;
    df = df.sort([TIME_COLUMN], SortMultipleOptions::default())?;
    df = df.drop_nulls::<String>(None)?;

    if df.height() == 0 {
        return Err(ForecastError::DataUnavailable(format!(
            "{} contains no usable rows",
            full_path.display()
        )));
    }

    let times = time_values(&df)?;
    let duplicates = times.windows(2).filter(|w| w[0] == w[1]).count();
    if duplicates > 0 {
        log::warn!(
            "{} has {} duplicated timestamps",
            full_path.display(),
            duplicates
        );
    }

    Ok(df)
}
