use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::stream::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::AppError;
use super::AppState;
use crate::api::cryptocompare::{price_ticks, HistoryQuery};
use crate::built_info;
use crate::constants::{
    DEFAULT_AGGREGATE, DEFAULT_CURRENCY, DEFAULT_DAYS_BACK, DEFAULT_LIMIT, DEFAULT_SYMBOL,
};
use crate::error::ForecastError;
use crate::live::live_loop::{live_predictions, LivePredictor};
use crate::minute::step_2_model_selection::ForecastStrategy;
use crate::minute::step_5_pipeline::{run_forecast_from_csv, ForecastReport, ForecastRequest};
use crate::util::file_utils::{data_file_path, extract_value, save_records_csv, save_to_json};
use crate::util::model_utils::{get_model_file, is_model_version_current, load_trained_model};
use crate::util::pre_processor::{load_and_preprocess, TimeSeriesRecord};

// ── Query params ─────────────────────────────────────────────────────────

fn default_symbol() -> String {
    DEFAULT_SYMBOL.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Deserialize)]
pub struct FetchQuery {
    #[serde(default = "default_symbol")]
    symbol: String,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default = "default_aggregate")]
    aggregate: u32,
    #[serde(default = "default_limit")]
    limit: u32,
    #[serde(default = "default_days_back")]
    days_back: i64,
}

fn default_aggregate() -> u32 {
    DEFAULT_AGGREGATE
}

fn default_limit() -> u32 {
    DEFAULT_LIMIT
}

fn default_days_back() -> i64 {
    DEFAULT_DAYS_BACK
}

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default = "default_model_choice")]
    model_choice: String,
    #[serde(default = "default_symbol")]
    symbol: String,
    #[serde(default = "default_currency")]
    currency: String,
}

fn default_model_choice() -> String {
    ForecastStrategy::Arimax.name().to_string()
}

#[derive(Debug, Deserialize)]
pub struct ExtractQuery {
    query_time: Option<String>,
    #[serde(default = "default_symbol")]
    symbol: String,
    #[serde(default = "default_currency")]
    currency: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    #[serde(default = "default_symbol")]
    symbol: String,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default = "default_stream_model")]
    model_choice: String,
    interval_secs: Option<u64>,
}

fn default_stream_model() -> String {
    ForecastStrategy::Linear.name().to_string()
}

#[derive(Debug, Deserialize)]
pub struct PricesQuery {
    #[serde(default = "default_fsyms")]
    fsyms: String,
    #[serde(default = "default_currency")]
    tsyms: String,
}

fn default_fsyms() -> String {
    "BTC,ETH".to_string()
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health))
        .route("/fetch", get(fetch_data))
        .route("/predict", get(predict))
        .route("/extract_value", get(extract_current_value))
        .route("/stream_realtime", get(stream_realtime))
        .route("/api/prices", get(api_prices))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": built_info::PKG_VERSION }))
}

/// Fetch minute history, persist it as CSV and return the records
async fn fetch_data(
    State(state): State<Arc<AppState>>,
    Query(q): Query<FetchQuery>,
) -> Result<Json<Vec<TimeSeriesRecord>>, AppError> {
    let query = HistoryQuery {
        aggregate: q.aggregate,
        limit: q.limit,
        days_back: q.days_back,
    };
    let records = state
        .client
        .fetch_historical_data(&q.symbol, &q.currency, query)
        .await?;

    let csv_path = data_file_path(&state.config.data_dir, &q.symbol, &q.currency);
    save_records_csv(&records, &csv_path)?;
    save_to_json(&records, state.config.data_dir.join("historical_data.json"))?;
    log::info!("Saved {} records to {}", records.len(), csv_path.display());

    Ok(Json(records))
}

/// Batch forecast on the stored CSV for the pair
async fn predict(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PredictQuery>,
) -> Result<Json<ForecastReport>, AppError> {
    let strategy: ForecastStrategy = q.model_choice.parse()?;
    let csv_path = data_file_path(&state.config.data_dir, &q.symbol, &q.currency);
    if !csv_path.exists() {
        return Err(AppError::Forecast(ForecastError::NotFound(format!(
            "CSV file {} not found. Please fetch the data first.",
            csv_path.display()
        ))));
    }

    let config = state.config.clone();
    let request = ForecastRequest::from_config(strategy, &q.symbol, &q.currency, &config);
    let report = tokio::task::spawn_blocking(move || run_forecast_from_csv(&config, &request)).await??;
    Ok(Json(report))
}

/// Close price at an exact timestamp of the stored series
async fn extract_current_value(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ExtractQuery>,
) -> Result<Json<Value>, AppError> {
    let query_time = q
        .query_time
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("query_time parameter is required.".to_string()))?;

    let df = load_and_preprocess(&data_file_path(&state.config.data_dir, &q.symbol, &q.currency))?;
    let (time, close) = extract_value(&df, &query_time)?;
    Ok(Json(json!({ "time": time, "close": close })))
}

/// Server-sent live predictions against the saved artifact for the pair
async fn stream_realtime(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, AppError> {
    let strategy: ForecastStrategy = q.model_choice.parse()?;
    let (artifact, _) = load_trained_model(&state.config.model_dir, &q.symbol, strategy)?;
    let model_base = get_model_file(&state.config.model_dir, &q.symbol, strategy);
    if !is_model_version_current(&model_base, built_info::PKG_VERSION) {
        log::warn!("Model at {} is stale; consider re-running /predict", model_base.display());
    }
    let predictor = LivePredictor::new(Arc::new(artifact))?;

    let interval = q
        .interval_secs
        .map(Duration::from_secs)
        .unwrap_or(state.config.live_interval);
    log::info!(
        "Streaming {} predictions for {}/{} every {:?}",
        strategy,
        q.symbol,
        q.currency,
        interval
    );

    let ticks = price_ticks(state.client.clone(), q.symbol, q.currency, interval);
    let events = live_predictions(ticks, predictor).map(|item| match item {
        Ok(event) => Event::default().json_data(&event),
        Err(e) => Ok(Event::default().event("error").data(e.to_string())),
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn api_prices(
    State(state): State<Arc<AppState>>,
    Query(q): Query<PricesQuery>,
) -> Result<Json<HashMap<String, HashMap<String, f64>>>, AppError> {
    let prices = state
        .client
        .fetch_prices(&split_list(&q.fsyms), &split_list(&q.tsyms))
        .await?;
    Ok(Json(prices))
}
