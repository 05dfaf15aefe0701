#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use vitalstream::client::{EstimationRequest, Estimator};
use vitalstream::core::{EstimationResult, VitalSeries};
use vitalstream::PipelineError;

/// How the scripted backend answers one request
#[derive(Debug, Clone)]
pub enum Reply {
    Answer { delay_ms: u64 },
    Fail(PipelineError),
    Hang,
    /// Block the worker thread, then answer; cancellation cannot interrupt it
    Stall { ms: u64 },
}

/// Backend double answering per window id from a script; unscripted calls
/// answer immediately with a heart rate at the window midpoint.
#[derive(Default)]
pub struct ScriptedEstimator {
    script: Mutex<HashMap<u64, VecDeque<Reply>>>,
    calls: AtomicUsize,
}

impl ScriptedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, window_id: u64, replies: Vec<Reply>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(window_id, replies.into_iter().collect());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Yield until at least `n` requests reached the backend
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}

#[async_trait]
impl Estimator for ScriptedEstimator {
    async fn estimate(&self, request: &EstimationRequest) -> Result<EstimationResult, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self
            .script
            .lock()
            .unwrap()
            .get_mut(&request.window.id)
            .and_then(|replies| replies.pop_front())
            .unwrap_or(Reply::Answer { delay_ms: 0 });

        match reply {
            Reply::Answer { delay_ms } => {
                if delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Ok(heart_rate(request, 72.0))
            }
            Reply::Fail(err) => Err(err),
            Reply::Hang => std::future::pending().await,
            Reply::Stall { ms } => {
                std::thread::sleep(Duration::from_millis(ms));
                Ok(heart_rate(request, 72.0))
            }
        }
    }
}

pub fn heart_rate(request: &EstimationRequest, bpm: f64) -> EstimationResult {
    let midpoint = (request.window.start_timestamp_us + request.window.end_timestamp_us) / 2;
    let mut vitals = BTreeMap::new();
    vitals.insert(
        "heart_rate".to_string(),
        VitalSeries {
            timestamps_us: vec![midpoint],
            values: vec![bpm],
        },
    );
    EstimationResult {
        window_id: request.window_id(),
        vitals,
    }
}

pub fn backend_500() -> PipelineError {
    PipelineError::BackendError {
        status: 500,
        message: "internal error".to_string(),
    }
}
