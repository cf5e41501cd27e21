// External imports
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

// Internal imports
use super::rolling_state::{BufferState, RollingPredictionState};
use crate::constants::TARGET_COLUMN;
use crate::error::{ForecastError, Result};
use crate::minute::step_4_model_serialization::ModelArtifact;

pub const WARMING_UP: &str = "warming up";

/// A single price observation from a live source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: i64,
    pub value: f64,
}

/// What one tick produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiveEvent {
    Prediction { time: i64, prediction: f64 },
    WarmingUp { time: i64, status: String },
}

impl LiveEvent {
    fn warming_up(time: i64) -> Self {
        Self::WarmingUp {
            time,
            status: WARMING_UP.to_string(),
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            Self::Prediction { time, .. } | Self::WarmingUp { time, .. } => *time,
        }
    }
}

/// Owns the rolling state of one stream and a shared read-only artifact
#[derive(Debug)]
pub struct LivePredictor {
    artifact: Arc<ModelArtifact>,
    state: RollingPredictionState,
}

impl LivePredictor {
    /// Fails with `FeatureMismatch` when the artifact was not trained on the
    /// close lags this predictor assembles.
    pub fn new(artifact: Arc<ModelArtifact>) -> Result<Self> {
        if artifact.lag_count == 0 {
            return Err(ForecastError::FeatureMismatch {
                expected: artifact.feature_names.clone(),
                actual: vec![],
            });
        }
        let state = RollingPredictionState::new(TARGET_COLUMN, artifact.lag_count)?;
        artifact.check_features(state.feature_names())?;
        Ok(Self { artifact, state })
    }

    pub fn state(&self) -> BufferState {
        self.state.state()
    }

    /// Push one observation and predict once the buffer is full
    pub fn observe(&mut self, observation: Observation) -> Result<LiveEvent> {
        self.state.push(observation.value);
        match self.state.features() {
            None => {
                log::debug!(
                    "Warming up: {}/{} observations",
                    self.state.buffer().len(),
                    self.state.buffer().capacity()
                );
                Ok(LiveEvent::warming_up(observation.time))
            }
            Some(features) => {
                let prediction = self
                    .artifact
                    .predict_named(self.state.feature_names(), &features)?;
                Ok(LiveEvent::Prediction {
                    time: observation.time,
                    prediction,
                })
            }
        }
    }
}

/// One event per observation pulled from `observations`.
///
/// The stream ends when the source ends or after yielding the first error,
/// whether it came from the source or from inference. Dropping the stream
/// stops pulling.
pub fn live_predictions<S>(observations: S, predictor: LivePredictor) -> impl Stream<Item = Result<LiveEvent>>
where
    S: Stream<Item = Result<Observation>>,
{
    let source = Box::pin(observations);
    stream::unfold(Some((source, predictor)), |state| async move {
        let (mut source, mut predictor) = state?;
        match source.next().await? {
            Ok(observation) => match predictor.observe(observation) {
                Ok(event) => Some((Ok(event), Some((source, predictor)))),
                Err(e) => Some((Err(e), None)),
            },
            Err(e) => {
                log::warn!("Live source failed: {}", e);
                Some((Err(e), None))
            }
        }
    })
}

/// Observations pulled by `fetch` once per tick, sleeping `interval` before each
pub fn interval_source<F, Fut>(interval: Duration, fetch: F) -> impl Stream<Item = Result<Observation>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Observation>>,
{
    stream::unfold(fetch, move |mut fetch| async move {
        tokio::time::sleep(interval).await;
        let observation = fetch().await;
        Some((observation, fetch))
    })
}
