// External imports
use std::collections::VecDeque;

// Internal imports
use crate::error::{ForecastError, Result};
use crate::util::feature_engineering::lag_feature_names;

/// Whether the buffer holds enough observations to predict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferState {
    Filling,
    Ready,
}

/// FIFO of the most recent `capacity` observations
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ForecastError::InvalidArgument(
                "rolling buffer capacity must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        })
    }

    /// Append, evicting the oldest value when full
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn state(&self) -> BufferState {
        if self.values.len() < self.capacity {
            BufferState::Filling
        } else {
            BufferState::Ready
        }
    }

    /// Oldest first
    pub fn values(&self) -> impl Iterator<Item = &f64> {
        self.values.iter()
    }
}

/// Rolling buffer of a single target series that assembles lag features
/// in the order `[lag_1 = newest, lag_2, .., lag_k]`
#[derive(Debug, Clone)]
pub struct RollingPredictionState {
    buffer: RollingBuffer,
    feature_names: Vec<String>,
}

impl RollingPredictionState {
    pub fn new(target: &str, lag_count: usize) -> Result<Self> {
        Ok(Self {
            buffer: RollingBuffer::new(lag_count)?,
            feature_names: lag_feature_names(target, lag_count),
        })
    }

    pub fn push(&mut self, value: f64) -> BufferState {
        self.buffer.push(value);
        self.buffer.state()
    }

    pub fn state(&self) -> BufferState {
        self.buffer.state()
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    /// Column names of the vector returned by [`Self::features`]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Lag vector, newest first; `None` while filling
    pub fn features(&self) -> Option<Vec<f64>> {
        match self.buffer.state() {
            BufferState::Filling => None,
            BufferState::Ready => Some(self.buffer.values.iter().rev().copied().collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = RollingBuffer::new(2).unwrap();
        assert!(buffer.is_empty());
        buffer.push(1.0);
        assert_eq!(buffer.state(), BufferState::Filling);
        buffer.push(2.0);
        assert_eq!(buffer.state(), BufferState::Ready);
        buffer.push(3.0);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.values().copied().collect::<Vec<_>>(), vec![2.0, 3.0]);
        assert!(RollingBuffer::new(0).is_err());
    }

    #[test]
    fn test_state_transitions_and_lag_order() {
        let mut state = RollingPredictionState::new("close", 2).unwrap();
        assert_eq!(state.feature_names(), &["close_lag_1", "close_lag_2"]);

        assert_eq!(state.push(100.0), BufferState::Filling);
        assert_eq!(state.features(), None);

        assert_eq!(state.push(101.0), BufferState::Ready);
        assert_eq!(state.features(), Some(vec![101.0, 100.0]));

        assert_eq!(state.push(102.0), BufferState::Ready);
        assert_eq!(state.features(), Some(vec![102.0, 101.0]));
        assert_eq!(state.buffer().len(), 2);
    }

    #[test]
    fn test_size_stays_fixed_after_ready() {
        let k = 4;
        let mut state = RollingPredictionState::new("close", k).unwrap();
        for m in 1..=20 {
            let s = state.push(m as f64);
            if m < k {
                assert_eq!(s, BufferState::Filling);
                assert_eq!(state.buffer().len(), m);
            } else {
                assert_eq!(s, BufferState::Ready);
                assert_eq!(state.buffer().len(), k);
                assert_eq!(state.features().unwrap()[0], m as f64);
            }
        }
    }
}
