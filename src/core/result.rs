use super::{Window, WindowId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timed value series for one vital-sign channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSeries {
    pub timestamps_us: Vec<u64>,
    pub values: Vec<f64>,
}

impl VitalSeries {
    pub fn latest(&self) -> Option<(u64, f64)> {
        self.timestamps_us.last().copied().zip(self.values.last().copied())
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

/// Backend estimate correlated with the window it was computed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub window_id: WindowId,

    /// Channel name (e.g. "heart_rate") to series
    pub vitals: BTreeMap<String, VitalSeries>,
}

impl EstimationResult {
    pub fn empty(window_id: WindowId) -> Self {
        Self {
            window_id,
            vitals: BTreeMap::new(),
        }
    }

    pub fn channel(&self, name: &str) -> Option<&VitalSeries> {
        self.vitals.get(name)
    }
}

/// How a window was resolved
#[derive(Debug, Clone, PartialEq)]
pub enum ResultStatus {
    Estimated(EstimationResult),
    /// Placeholder emitted when the request outlived its deadline
    TimedOut,
    /// The request failed and was not (or no longer) resubmitted
    Failed(String),
    /// The session ended (stream reset, fatal error) before the request resolved
    Abandoned,
}

/// What the consumer receives for every dispatched window, in window-id order
#[derive(Debug, Clone, PartialEq)]
pub struct WindowResult {
    /// Processing session the window belongs to; window ids restart per session
    pub session: u64,
    pub window_id: WindowId,
    pub start_timestamp_us: u64,
    pub end_timestamp_us: u64,
    pub frame_count: usize,
    pub status: ResultStatus,
}

impl WindowResult {
    pub fn from_window(session: u64, window: &Window, status: ResultStatus) -> Self {
        Self {
            session,
            window_id: window.id(),
            start_timestamp_us: window.start_timestamp_us(),
            end_timestamp_us: window.end_timestamp_us(),
            frame_count: window.len(),
            status,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self.status, ResultStatus::Estimated(_))
    }

    pub fn estimate(&self) -> Option<&EstimationResult> {
        match &self.status {
            ResultStatus::Estimated(result) => Some(result),
            _ => None,
        }
    }
}
