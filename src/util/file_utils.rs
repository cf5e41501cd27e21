// External crates
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};

// Local modules
use crate::constants::{TARGET_COLUMN, TIME_COLUMN};
use crate::error::{ForecastError, Result};
use crate::util::pre_processor::{
    f64_column, parse_timestamp, records_to_dataframe, time_values, TimeSeriesRecord,
};

/// Map a raw header to the standard lowercase name, if it is a known alias
fn standard_column_name(raw: &str) -> Option<&'static str> {
    let name = match raw.trim().to_lowercase().as_str() {
        "open" | "o" | "openprice" | "open_price" => "open",
        "high" | "h" | "highprice" | "high_price" => "high",
        "low" | "l" | "lowprice" | "low_price" => "low",
        "close" | "c" | "closeprice" | "close_price" => "close",
        "volumefrom" | "volume_from" | "volume" | "vol" => "volumefrom",
        "volumeto" | "volume_to" => "volumeto",
        "timestamp" | "time" | "date" | "datetime" | "t" => "time",
        _ => return None,
    };
    Some(name)
}

/// Rename known column aliases (any case) to the standard names
///
/// A column whose standard name is already taken by another column is left as-is.
pub fn standardize_column_names(df: &mut DataFrame) -> PolarsResult<()> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut renames = Vec::new();
    for name in &names {
        if let Some(standard) = standard_column_name(name) {
            if name != standard && !names.iter().any(|n| n == standard) {
                renames.push((name.clone(), standard));
            }
        }
    }

    if !renames.is_empty() {
        log::debug!("Renaming columns: {:?}", renames);
        for (old_name, new_name) in renames {
            df.rename(&old_name, new_name.into())?;
        }
        // rename leaves the cached schema stale
        df.clear_schema();
    }
    Ok(())
}

/// Read a CSV file into a DataFrame with standardized column names
pub fn read_csv_file<P: AsRef<Path>>(file_path: P) -> PolarsResult<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.as_ref().to_path_buf()))?
        .finish()?;
    standardize_column_names(&mut df)?;
    Ok(df)
}

/// Write any DataFrame to CSV, creating the parent directory if needed
pub fn write_csv_file<P: AsRef<Path>>(df: &mut DataFrame, file_path: P) -> Result<PathBuf> {
    let path = file_path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    log::info!("Data saved to {}", path.display());
    Ok(path.to_path_buf())
}

/// Location of the persisted series for a symbol/currency pair
pub fn data_file_path(data_dir: &Path, symbol: &str, currency: &str) -> PathBuf {
    data_dir.join(format!(
        "crypto_data_{}_{}.csv",
        symbol.to_uppercase(),
        currency.to_uppercase()
    ))
}

/// Persist fetched records to the standard CSV layout
pub fn save_records_csv<P: AsRef<Path>>(
    records: &[TimeSeriesRecord],
    file_path: P,
) -> Result<PathBuf> {
    let mut df = records_to_dataframe(records)?;
    write_csv_file(&mut df, file_path)
}

/// Dump any serializable payload as pretty JSON
pub fn save_to_json<T: serde::Serialize, P: AsRef<Path>>(data: &T, file_path: P) -> Result<()> {
    let path = file_path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Closing price at exactly `query_time` in a preprocessed frame
///
/// `query_time` may be unix seconds or a `%Y-%m-%d %H:%M:%S` string.
pub fn extract_value(df: &DataFrame, query_time: &str) -> Result<(i64, f64)> {
    let wanted = parse_timestamp(query_time).ok_or_else(|| {
        ForecastError::InvalidArgument(format!("Unparsable query_time {}", query_time))
    })?;
    let times = time_values(df)?;
    let closes = f64_column(df, TARGET_COLUMN)?;

    times
        .iter()
        .position(|&t| t == wanted)
        .map(|idx| (wanted, closes[idx]))
        .ok_or_else(|| {
            ForecastError::NotFound(format!("No data found for the {} {}", TIME_COLUMN, query_time))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::pre_processor::load_and_preprocess;
    use tempfile::tempdir;

    fn sample_records() -> Vec<TimeSeriesRecord> {
        (0..5)
            .map(|i| TimeSeriesRecord {
                time: 1_700_000_000 + i * 60,
                open: 100.0 + i as f64,
                high: 101.0 + i as f64,
                low: 99.0 + i as f64,
                close: 100.5 + i as f64,
                volumefrom: 10.0,
                volumeto: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_save_and_load_records_csv() {
        let dir = tempdir().unwrap();
        let path = data_file_path(dir.path(), "eth", "usd");
        assert!(path.ends_with("crypto_data_ETH_USD.csv"));

        save_records_csv(&sample_records(), &path).unwrap();
        let df = load_and_preprocess(&path).unwrap();
        assert_eq!(df.height(), 5);
        assert_eq!(f64_column(&df, "close").unwrap()[4], 104.5);
    }

    #[test]
    fn test_standardize_column_names() {
        let mut df = DataFrame::new(vec![
            Series::new("Timestamp".into(), vec![1i64, 2]).into(),
            Series::new("Close".into(), vec![1.0, 2.0]).into(),
            Series::new("HIGH".into(), vec![1.0, 2.0]).into(),
        ])
        .unwrap();
        assert!(df.schema().contains("Timestamp"));
        standardize_column_names(&mut df).unwrap();
        for col in ["time", "close", "high"] {
            assert!(df.schema().contains(col), "column {} missing", col);
        }
        assert!(!df.schema().contains("Timestamp"));
        assert_eq!(f64_column(&df, "close").unwrap(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_extract_value() {
        let df = records_to_dataframe(&sample_records()).unwrap();
        let (time, close) = extract_value(&df, "1700000060").unwrap();
        assert_eq!(time, 1_700_000_060);
        assert_eq!(close, 101.5);

        assert!(matches!(
            extract_value(&df, "1700000001"),
            Err(ForecastError::NotFound(_))
        ));
        assert!(matches!(
            extract_value(&df, "yesterday"),
            Err(ForecastError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_save_to_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("historical_data.json");
        save_to_json(&sample_records(), &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let back: Vec<TimeSeriesRecord> = serde_json::from_str(&text).unwrap();
        assert_eq!(back.len(), 5);
    }
}
