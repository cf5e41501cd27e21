// Raw OHLCV columns persisted for every fetched series
pub const RECORD_COLUMNS: [&str; 7] = [
    "time",
    "open",
    "high",
    "low",
    "close",
    "volumefrom",
    "volumeto",
];

// Exogenous regressors for the ARIMAX strategy, in model column order
pub const EXOGENOUS_COLUMNS: [&str; 4] = ["volumefrom", "volumeto", "high", "low"];

pub const TIME_COLUMN: &str = "time";
pub const TARGET_COLUMN: &str = "close";

// Model parameters
pub const DEFAULT_LAG_COUNT: usize = 3; // Number of past closes fed to lag models
pub const TRAIN_RATIO: f64 = 0.8; // 80% of data for training

// ARIMAX grid: p in 0..=2, d in 0..=1, q in 0..=2
pub const ARIMAX_P_VALUES: [usize; 3] = [0, 1, 2];
pub const ARIMAX_D_VALUES: [usize; 2] = [0, 1];
pub const ARIMAX_Q_VALUES: [usize; 3] = [0, 1, 2];

// XGBoost grid
pub const XGB_MAX_DEPTHS: [usize; 2] = [3, 5];
pub const XGB_LEARNING_RATES: [f64; 2] = [0.05, 0.1];
pub const XGB_N_ESTIMATORS: [usize; 2] = [50, 100];
pub const XGB_SUBSAMPLES: [f64; 2] = [0.8, 1.0];
pub const XGB_MAX_CV_FOLDS: usize = 3;
pub const XGB_SEED: u64 = 42;

// Market data defaults
pub const CRYPTOCOMPARE_BASE_URL: &str = "https://min-api.cryptocompare.com";
pub const CRYPTOCOMPARE_EXCHANGE: &str = "CCCAGG";
pub const DEFAULT_SYMBOL: &str = "ETH";
pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_AGGREGATE: u32 = 10;
pub const DEFAULT_LIMIT: u32 = 2000;
pub const DEFAULT_DAYS_BACK: i64 = 30;

// Live feed
pub const LIVE_TICK_SECONDS: u64 = 60;

// Paths
pub const DATA_DIR: &str = ".";
pub const MODEL_PATH: &str = "models";
pub const EXPERIMENT_PATH: &str = "experiments";
pub const MODEL_FILE_NAME: &str = "_forecast_model";

// Server
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
