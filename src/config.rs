use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    CRYPTOCOMPARE_BASE_URL, DATA_DIR, DEFAULT_BIND, DEFAULT_LAG_COUNT, DEFAULT_PORT,
    EXPERIMENT_PATH, LIVE_TICK_SECONDS, MODEL_PATH, TRAIN_RATIO,
};

/// Runtime configuration derived from environment variables, with the
/// defaults from `constants` for anything unset or unparsable.
#[derive(Debug, Clone)]
pub struct ForecastConfig {
    /// CryptoCompare API key. Empty means anonymous requests.
    pub api_key: String,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub experiment_dir: PathBuf,
    pub bind: String,
    pub port: u16,
    pub live_interval: Duration,
    pub lag_count: usize,
    pub train_ratio: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: CRYPTOCOMPARE_BASE_URL.to_string(),
            data_dir: PathBuf::from(DATA_DIR),
            model_dir: PathBuf::from(MODEL_PATH),
            experiment_dir: PathBuf::from(EXPERIMENT_PATH),
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            live_interval: Duration::from_secs(LIVE_TICK_SECONDS),
            lag_count: DEFAULT_LAG_COUNT,
            train_ratio: TRAIN_RATIO,
        }
    }
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl ForecastConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let lag_count = env_parse("FORECAST_LAG_COUNT", defaults.lag_count).max(1);
        let train_ratio = env_parse("FORECAST_TRAIN_RATIO", defaults.train_ratio);
        let train_ratio = if (0.0..=1.0).contains(&train_ratio) {
            train_ratio
        } else {
            log::warn!(
                "FORECAST_TRAIN_RATIO={} is outside [0, 1], using {}",
                train_ratio,
                TRAIN_RATIO
            );
            TRAIN_RATIO
        };

        Self {
            api_key: env_str("CRYPTOCOMPARE_API_KEY", ""),
            base_url: env_str("CRYPTOCOMPARE_BASE_URL", CRYPTOCOMPARE_BASE_URL),
            data_dir: PathBuf::from(env_str("FORECAST_DATA_DIR", DATA_DIR)),
            model_dir: PathBuf::from(env_str("FORECAST_MODEL_DIR", MODEL_PATH)),
            experiment_dir: PathBuf::from(env_str("FORECAST_EXPERIMENT_DIR", EXPERIMENT_PATH)),
            bind: env_str("FORECAST_BIND", DEFAULT_BIND),
            port: env_parse("FORECAST_PORT", DEFAULT_PORT),
            live_interval: Duration::from_secs(env_parse(
                "FORECAST_LIVE_INTERVAL_SECS",
                LIVE_TICK_SECONDS,
            )),
            lag_count,
            train_ratio,
        }
    }
}
