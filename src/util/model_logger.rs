use anyhow::Result;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::util::metrics::ForecastMetrics;

/// JSON record of one batch forecast run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastExperiment {
    pub timestamp: String,
    pub symbol: String,
    pub currency: String,
    pub strategy: String,
    pub params: Option<String>,
    pub grid_size: usize,
    pub failed_candidates: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: Option<ForecastMetrics>,
    pub training_time_seconds: Option<f64>,
    pub notes: String,
}

impl ForecastExperiment {
    pub fn new(symbol: &str, currency: &str, strategy: &str) -> Self {
        Self {
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            symbol: symbol.to_string(),
            currency: currency.to_string(),
            strategy: strategy.to_string(),
            params: None,
            grid_size: 0,
            failed_candidates: 0,
            train_rows: 0,
            test_rows: 0,
            metrics: None,
            training_time_seconds: None,
            notes: String::new(),
        }
    }

    pub fn set_selection(&mut self, params: &str, grid_size: usize, failed_candidates: usize) {
        self.params = Some(params.to_string());
        self.grid_size = grid_size;
        self.failed_candidates = failed_candidates;
    }

    pub fn set_rows(&mut self, train_rows: usize, test_rows: usize) {
        self.train_rows = train_rows;
        self.test_rows = test_rows;
    }

    pub fn set_metrics(&mut self, metrics: ForecastMetrics) {
        self.metrics = Some(metrics);
    }

    pub fn set_training_time(&mut self, seconds: f64) {
        self.training_time_seconds = Some(seconds);
    }

    pub fn add_note(&mut self, note: &str) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note);
    }

    pub fn save(&self, experiment_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(experiment_dir)?;

        let filename = format!(
            "{}_{}_{}_{}_experiment.json",
            self.symbol,
            self.currency,
            self.strategy,
            Local::now().format("%Y%m%d_%H%M%S%3f"),
        );
        let file_path = experiment_dir.join(filename);

        let json = serde_json::to_string_pretty(&self)?;
        let mut file = fs::File::create(&file_path)?;
        file.write_all(json.as_bytes())?;

        Ok(file_path)
    }
}
