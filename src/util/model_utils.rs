use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde_json::from_str;
use std::path::{Path, PathBuf};

use crate::constants::MODEL_FILE_NAME;
use crate::minute::step_2_model_selection::ForecastStrategy;
use crate::minute::step_4_model_serialization::{load_artifact, ArtifactMetadata, ModelArtifact};

/// Directory holding the models of one symbol and strategy
pub fn get_model_path(model_dir: &Path, symbol: &str, strategy: ForecastStrategy) -> PathBuf {
    model_dir.join(symbol.to_uppercase()).join(strategy.name())
}

/// Base path (without extension) of the artifact for a symbol and strategy
pub fn get_model_file(model_dir: &Path, symbol: &str, strategy: ForecastStrategy) -> PathBuf {
    get_model_path(model_dir, symbol, strategy).join(format!("{}{}", strategy.name(), MODEL_FILE_NAME))
}

/// Load the artifact last saved for a symbol and strategy
pub fn load_trained_model(
    model_dir: &Path,
    symbol: &str,
    strategy: ForecastStrategy,
) -> Result<(ModelArtifact, ArtifactMetadata)> {
    let base = get_model_file(model_dir, symbol, strategy);
    log::info!("Loading model from: {}", base.display());
    load_artifact(&base).context("Failed to load model")
}

/// Check if the saved model was written by this version today
pub fn is_model_version_current(model_base_path: &Path, current_version: &str) -> bool {
    let metadata_path = model_base_path.with_extension("meta.json");
    let Ok(metadata_json) = std::fs::read_to_string(&metadata_path) else {
        return false;
    };
    let Ok(metadata) = from_str::<ArtifactMetadata>(&metadata_json) else {
        return false;
    };
    if metadata.version != current_version {
        return false;
    }
    DateTime::from_timestamp(metadata.timestamp as i64, 0)
        .map(|saved| saved.with_timezone(&Local).date_naive() == Local::now().date_naive())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::built_info;
    use crate::minute::step_4_model_serialization::save_artifact;
    use crate::minute::linear::step_1_linear_model::LinearRegression;
    use crate::minute::step_2_model_selection::TrainedModel;
    use tempfile::tempdir;

    fn artifact() -> ModelArtifact {
        let model = LinearRegression {
            intercept: 1.5,
            coefficients: vec![0.25, 0.75],
        };
        ModelArtifact::new(
            TrainedModel::Linear(model),
            vec!["close_lag_1".to_string(), "close_lag_2".to_string()],
            2,
        )
    }

    #[test]
    fn test_model_save_load() -> Result<()> {
        let temp_dir = tempdir()?;
        let artifact = artifact();
        let metadata = ArtifactMetadata::new(&artifact, "eth", "USD", "OLS");

        let base = get_model_file(temp_dir.path(), &metadata.symbol, metadata.strategy);
        let saved_path = save_artifact(&artifact, &metadata, &base)?;
        assert!(saved_path.starts_with(temp_dir.path().join("ETH").join("linear")));
        assert!(saved_path.with_extension("meta.json").exists());

        let (loaded, loaded_meta) = load_trained_model(temp_dir.path(), "ETH", ForecastStrategy::Linear)?;
        assert_eq!(loaded, artifact);
        assert_eq!(loaded_meta.params, "OLS");
        Ok(())
    }

    #[test]
    fn test_load_missing_model_has_context() {
        let temp_dir = tempdir().unwrap();
        let err = load_trained_model(temp_dir.path(), "BTC", ForecastStrategy::XGBoost).unwrap_err();
        assert!(err.to_string().contains("Failed to load model"));
    }

    #[test]
    fn test_model_version_check() -> Result<()> {
        let temp_dir = tempdir()?;
        let artifact = artifact();
        let metadata = ArtifactMetadata::new(&artifact, "ETH", "USD", "OLS");
        let base = get_model_file(temp_dir.path(), "ETH", ForecastStrategy::Linear);
        save_artifact(&artifact, &metadata, &base)?;
        assert!(is_model_version_current(&base, built_info::PKG_VERSION));
        assert!(!is_model_version_current(&base, "0.0.0-other"));
        assert!(!is_model_version_current(&temp_dir.path().join("missing"), built_info::PKG_VERSION));
        Ok(())
    }
}
