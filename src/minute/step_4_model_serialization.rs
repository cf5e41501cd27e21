// External imports
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

// Internal imports
use super::step_2_model_selection::{ForecastStrategy, TrainedModel};
use crate::built_info;
use crate::error::{ForecastError, Result};

/// A fitted model together with the feature contract it was trained on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub trained_model: TrainedModel,
    /// Training column order
    pub feature_names: Vec<String>,
    /// Zero for exogenous-feature models
    pub lag_count: usize,
}

impl ModelArtifact {
    pub fn new(trained_model: TrainedModel, feature_names: Vec<String>, lag_count: usize) -> Self {
        Self {
            trained_model,
            feature_names,
            lag_count,
        }
    }

    pub fn strategy(&self) -> ForecastStrategy {
        self.trained_model.strategy()
    }

    /// Fails with `FeatureMismatch` unless `names` is the same set as `feature_names`
    pub fn check_features(&self, names: &[String]) -> Result<()> {
        let expected: BTreeSet<&String> = self.feature_names.iter().collect();
        let actual: BTreeSet<&String> = names.iter().collect();
        if expected != actual || names.len() != self.feature_names.len() {
            return Err(ForecastError::FeatureMismatch {
                expected: self.feature_names.clone(),
                actual: names.to_vec(),
            });
        }
        Ok(())
    }

    /// Predict from values labelled by `names`, reordered into training order
    pub fn predict_named(&self, names: &[String], values: &[f64]) -> Result<f64> {
        self.check_features(names)?;
        if values.len() != names.len() {
            return Err(ForecastError::InvalidArgument(format!(
                "{} values for {} feature names",
                values.len(),
                names.len()
            )));
        }
        let ordered: Vec<f64> = self
            .feature_names
            .iter()
            .map(|name| {
                names
                    .iter()
                    .position(|n| n == name)
                    .map(|idx| values[idx])
                    .ok_or_else(|| ForecastError::FeatureMismatch {
                        expected: self.feature_names.clone(),
                        actual: names.to_vec(),
                    })
            })
            .collect::<Result<_>>()?;
        self.trained_model
            .predict_one(ndarray::ArrayView1::from(&ordered[..]))
    }
}

/// Sidecar written next to every artifact as `{name}.meta.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub timestamp: u64,
    pub strategy: ForecastStrategy,
    pub symbol: String,
    pub currency: String,
    pub params: String,
    pub feature_names: Vec<String>,
    pub lag_count: usize,
}

impl ArtifactMetadata {
    pub fn new(artifact: &ModelArtifact, symbol: &str, currency: &str, params: &str) -> Self {
        Self {
            version: built_info::PKG_VERSION.to_string(),
            timestamp: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            strategy: artifact.strategy(),
            symbol: symbol.to_string(),
            currency: currency.to_string(),
            params: params.to_string(),
            feature_names: artifact.feature_names.clone(),
            lag_count: artifact.lag_count,
        }
    }
}

/// Write `{path}.bin` and `{path}.meta.json`, returning the `.bin` path
pub fn save_artifact(
    artifact: &ModelArtifact,
    metadata: &ArtifactMetadata,
    path: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let model_path = path.with_extension("bin");
    let bytes = bincode::serde::encode_to_vec(artifact, bincode::config::standard())?;
    std::fs::write(&model_path, bytes)?;

    let metadata_path = path.with_extension("meta.json");
    std::fs::write(&metadata_path, serde_json::to_string_pretty(metadata)?)?;

    log::info!("Model artifact saved to {}", model_path.display());
    Ok(model_path)
}

/// Read back an artifact written by [`save_artifact`]
pub fn load_artifact(path: impl AsRef<Path>) -> Result<(ModelArtifact, ArtifactMetadata)> {
    let path = path.as_ref();
    let model_path = path.with_extension("bin");
    if !model_path.exists() {
        return Err(ForecastError::NotFound(format!(
            "Model file {} not found. Run a forecast first.",
            model_path.display()
        )));
    }

    let bytes = std::fs::read(&model_path)?;
    let (artifact, _): (ModelArtifact, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;

    let metadata_json = std::fs::read_to_string(path.with_extension("meta.json"))?;
    let metadata: ArtifactMetadata = serde_json::from_str(&metadata_json)?;
    Ok((artifact, metadata))
}
