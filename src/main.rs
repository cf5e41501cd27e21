// External crates
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// Local modules
use crypto_forecast::api::cryptocompare::{price_ticks, CryptoCompareClient, HistoryQuery};
use crypto_forecast::built_info;
use crypto_forecast::config::ForecastConfig;
use crypto_forecast::constants::{
    DEFAULT_AGGREGATE, DEFAULT_CURRENCY, DEFAULT_DAYS_BACK, DEFAULT_LIMIT, DEFAULT_SYMBOL,
};
use crypto_forecast::live::live_loop::{live_predictions, LivePredictor};
use crypto_forecast::minute::step_2_model_selection::ForecastStrategy;
use crypto_forecast::minute::step_5_pipeline::{run_forecast_from_csv, ForecastRequest};
use crypto_forecast::server;
use crypto_forecast::util::file_utils::{data_file_path, save_records_csv, save_to_json};
use crypto_forecast::util::model_utils::{get_model_file, is_model_version_current, load_trained_model};

#[derive(Parser, Debug)]
#[command(name = "crypto_forecast", version = built_info::PKG_VERSION)]
#[command(about = "Fetch minute crypto prices, forecast closes and stream live predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct PairArgs {
    /// Cryptocurrency symbol, e.g. ETH
    #[arg(short, long, default_value = DEFAULT_SYMBOL)]
    symbol: String,

    /// Quote currency, e.g. USD
    #[arg(short, long, default_value = DEFAULT_CURRENCY)]
    currency: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download minute history and store it as CSV
    Fetch {
        #[command(flatten)]
        pair: PairArgs,

        /// Minutes per bar
        #[arg(short, long, default_value_t = DEFAULT_AGGREGATE)]
        aggregate: u32,

        /// Number of bars to request
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Days of history to look back
        #[arg(short, long, default_value_t = DEFAULT_DAYS_BACK)]
        days_back: i64,
    },
    /// Select, fit and evaluate a model on the stored CSV
    Forecast {
        #[command(flatten)]
        pair: PairArgs,

        /// arimax, xgboost or linear
        #[arg(short, long, default_value = "arimax")]
        model_choice: ForecastStrategy,

        /// Lagged closes used by lag models
        #[arg(long)]
        lag_count: Option<usize>,

        /// Share of rows used for training
        #[arg(long)]
        train_ratio: Option<f64>,
    },
    /// Stream live predictions from a saved lag model
    Live {
        #[command(flatten)]
        pair: PairArgs,

        /// Strategy whose saved artifact is used
        #[arg(short, long, default_value = "linear")]
        model_choice: ForecastStrategy,

        /// Seconds between price polls
        #[arg(short, long)]
        interval_secs: Option<u64>,

        /// Stop after this many ticks
        #[arg(short, long)]
        ticks: Option<usize>,
    },
    /// Run the HTTP server
    Serve {
        #[arg(long)]
        bind: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
}

async fn fetch(config: &ForecastConfig, pair: &PairArgs, query: HistoryQuery) -> Result<()> {
    let client = CryptoCompareClient::from_config(config)?;
    let records = client
        .fetch_historical_data(&pair.symbol, &pair.currency, query)
        .await
        .with_context(|| format!("Failed to fetch data for {} in {}", pair.symbol, pair.currency))?;

    let csv_path = data_file_path(&config.data_dir, &pair.symbol, &pair.currency);
    save_records_csv(&records, &csv_path).context("Failed to save CSV")?;
    save_to_json(&records, config.data_dir.join("historical_data.json"))
        .context("Failed to save JSON")?;
    println!("Saved {} records to {}", records.len(), csv_path.display());
    Ok(())
}

async fn live(
    config: &ForecastConfig,
    pair: &PairArgs,
    strategy: ForecastStrategy,
    interval: Duration,
    ticks: Option<usize>,
) -> Result<()> {
    let (artifact, metadata) = load_trained_model(&config.model_dir, &pair.symbol, strategy)?;
    let model_base = get_model_file(&config.model_dir, &pair.symbol, strategy);
    if !is_model_version_current(&model_base, built_info::PKG_VERSION) {
        log::warn!(
            "Model trained with {} ({}) is not from today's build; predictions may be stale",
            metadata.params,
            metadata.version
        );
    }
    let predictor = LivePredictor::new(Arc::new(artifact)).context("Saved model cannot be used live")?;

    let client = CryptoCompareClient::from_config(config)?;
    let source = price_ticks(client, pair.symbol.clone(), pair.currency.clone(), interval);
    let events = live_predictions(source, predictor).take(ticks.unwrap_or(usize::MAX));
    futures_util::pin_mut!(events);

    while let Some(event) = events.next().await {
        let event = event.context("Live prediction stopped")?;
        log::debug!("Tick at {} handled", event.time());
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = ForecastConfig::from_env();

    match cli.command {
        Command::Fetch {
            pair,
            aggregate,
            limit,
            days_back,
        } => {
            let query = HistoryQuery {
                aggregate,
                limit,
                days_back,
            };
            fetch(&config, &pair, query).await
        }
        Command::Forecast {
            pair,
            model_choice,
            lag_count,
            train_ratio,
        } => {
            let mut request = ForecastRequest::from_config(model_choice, &pair.symbol, &pair.currency, &config);
            if let Some(lag_count) = lag_count {
                request.lag_count = lag_count;
            }
            if let Some(train_ratio) = train_ratio {
                request.train_ratio = train_ratio;
            }
            let report = tokio::task::spawn_blocking(move || run_forecast_from_csv(&config, &request))
                .await
                .context("Forecast task panicked")??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Live {
            pair,
            model_choice,
            interval_secs,
            ticks,
        } => {
            let interval = interval_secs.map(Duration::from_secs).unwrap_or(config.live_interval);
            live(&config, &pair, model_choice, interval, ticks).await
        }
        Command::Serve { bind, port } => {
            if let Some(bind) = bind {
                config.bind = bind;
            }
            if let Some(port) = port {
                config.port = port;
            }
            server::serve(config).await
        }
    }
}
