//! CryptoCompare REST client for minute history and spot prices.

use chrono::Utc;
use futures_util::stream::Stream;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ForecastConfig;
use crate::constants::CRYPTOCOMPARE_EXCHANGE;
use crate::error::{ForecastError, Result};
use crate::live::live_loop::{interval_source, Observation};
use crate::util::pre_processor::TimeSeriesRecord;

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data")]
    data: Option<HistoData>,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<TimeSeriesRecord>,
}

/// Historical window of a minute-history request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Minutes per bar
    pub aggregate: u32,
    /// Bars requested
    pub limit: u32,
    pub days_back: i64,
}

/// CryptoCompare API client.
#[derive(Debug, Clone)]
pub struct CryptoCompareClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl CryptoCompareClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &ForecastConfig) -> Result<Self> {
        Self::new(&config.base_url, &config.api_key)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url).query(query);
        if !self.api_key.is_empty() {
            request = request.query(&[("api_key", self.api_key.as_str())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Error fetching {}: {} - {}", path, status, body);
            return Err(ForecastError::Upstream(format!("{} returned {}", path, status)));
        }
        Ok(response.json().await?)
    }

    /// Minute bars ending now, oldest first.
    ///
    /// An empty payload is reported as `DataUnavailable`.
    pub async fn fetch_historical_data(
        &self,
        symbol: &str,
        currency: &str,
        query: HistoryQuery,
    ) -> Result<Vec<TimeSeriesRecord>> {
        let to_timestamp = Utc::now().timestamp();
        let from_timestamp = to_timestamp - query.days_back * 24 * 3600;
        log::info!(
            "Fetching {}/{} from {} to {} with {}-minute aggregation",
            symbol,
            currency,
            from_timestamp,
            to_timestamp,
            query.aggregate
        );

        let payload = self
            .get_json(
                "/data/v2/histominute",
                &[
                    ("fsym", symbol.to_uppercase()),
                    ("tsym", currency.to_uppercase()),
                    ("limit", query.limit.to_string()),
                    ("aggregate", query.aggregate.to_string()),
                    ("toTs", to_timestamp.to_string()),
                    ("e", CRYPTOCOMPARE_EXCHANGE.to_string()),
                ],
            )
            .await?;
        parse_history(payload)
    }

    /// Spot price of `symbol` in `currency`
    pub async fn fetch_current_price(&self, symbol: &str, currency: &str) -> Result<f64> {
        let currency = currency.to_uppercase();
        let payload = self
            .get_json(
                "/data/price",
                &[("fsym", symbol.to_uppercase()), ("tsyms", currency.clone())],
            )
            .await?;
        payload
            .get(&currency)
            .and_then(Value::as_f64)
            .ok_or_else(|| ForecastError::Upstream(format!("no {} price in response: {}", currency, payload)))
    }

    /// Spot prices for several symbols, keyed by symbol then currency
    pub async fn fetch_prices(
        &self,
        symbols: &[String],
        currencies: &[String],
    ) -> Result<HashMap<String, HashMap<String, f64>>> {
        if symbols.is_empty() || currencies.is_empty() {
            return Err(ForecastError::InvalidArgument(
                "at least one symbol and one currency are required".to_string(),
            ));
        }
        let join = |items: &[String]| {
            items
                .iter()
                .map(|s| s.trim().to_uppercase())
                .collect::<Vec<_>>()
                .join(",")
        };
        let payload = self
            .get_json(
                "/data/pricemulti",
                &[("fsyms", join(symbols)), ("tsyms", join(currencies))],
            )
            .await?;
        serde_json::from_value(payload.clone())
            .map_err(|_| ForecastError::Upstream(format!("unexpected price payload: {}", payload)))
    }
}

fn parse_history(payload: Value) -> Result<Vec<TimeSeriesRecord>> {
    let response: HistoResponse = serde_json::from_value(payload)?;
    if response.response.as_deref() == Some("Error") {
        return Err(ForecastError::Upstream(response.message));
    }
    let mut records = response.data.map(|d| d.data).unwrap_or_default();
    if records.is_empty() {
        log::warn!("No data found. The time range might be too large or the API might not support it.");
        return Err(ForecastError::DataUnavailable(
            "Unable to fetch data".to_string(),
        ));
    }
    records.sort_by_key(|r| r.time);
    records.dedup_by_key(|r| r.time);
    Ok(records)
}

/// Live spot-price observations, one per `interval`
pub fn price_ticks(
    client: CryptoCompareClient,
    symbol: String,
    currency: String,
    interval: Duration,
) -> impl Stream<Item = Result<Observation>> {
    interval_source(interval, move || {
        let client = client.clone();
        let symbol = symbol.clone();
        let currency = currency.clone();
        async move {
            let value = client.fetch_current_price(&symbol, &currency).await?;
            Ok(Observation {
                time: Utc::now().timestamp(),
                value,
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_history_sorts_and_dedups() {
        let bar = |time: i64, close: f64| {
            json!({
                "time": time, "open": close, "high": close + 1.0, "low": close - 1.0,
                "close": close, "volumefrom": 10.0, "volumeto": 1000.0,
                "conversionType": "direct", "conversionSymbol": ""
            })
        };
        let payload = json!({
            "Response": "Success",
            "Message": "",
            "Data": { "TimeFrom": 1, "TimeTo": 3, "Data": [bar(120, 2.0), bar(60, 1.0), bar(120, 2.0)] }
        });
        let records = parse_history(payload).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].time, 60);
        assert_eq!(records[1].close, 2.0);
    }

    #[test]
    fn test_parse_history_empty_is_unavailable() {
        let payload = json!({ "Response": "Success", "Data": { "Data": [] } });
        assert!(matches!(
            parse_history(payload),
            Err(ForecastError::DataUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_history_error_response() {
        let payload = json!({ "Response": "Error", "Message": "limit is larger than max value.", "Data": {} });
        assert!(matches!(parse_history(payload), Err(ForecastError::Upstream(_))));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = CryptoCompareClient::new("http://localhost:9/", "").unwrap();
        assert_eq!(client.base_url, "http://localhost:9");
    }
}
