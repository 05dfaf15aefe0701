use super::sequencer::ResultSequencer;
use crate::client::EstimationRequest;
use crate::core::WindowId;
use crate::resilience::FailureBreaker;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A request currently out at the backend
pub(crate) struct InFlight {
    pub request: Arc<EstimationRequest>,
    /// Attempts made so far, this one included
    pub attempts: u32,
    handle: JoinHandle<()>,
}

/// Per-epoch bookkeeping owned by the session driver.
///
/// The epoch tags every dispatch; a response carrying an older epoch
/// belongs to a session that was reset and is dropped.
pub(crate) struct StreamSession {
    epoch: u64,
    in_flight: HashMap<WindowId, InFlight>,
    pub sequencer: ResultSequencer,
    pub breaker: FailureBreaker,
}

impl StreamSession {
    pub fn new(epoch: u64, failure_threshold: u32) -> Self {
        Self {
            epoch,
            in_flight: HashMap::new(),
            sequencer: ResultSequencer::new(epoch),
            breaker: FailureBreaker::new(failure_threshold),
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn track(
        &mut self,
        id: WindowId,
        request: Arc<EstimationRequest>,
        attempts: u32,
        handle: JoinHandle<()>,
    ) {
        if let Some(previous) = self.in_flight.insert(
            id,
            InFlight {
                request,
                attempts,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    /// Take the in-flight entry matching a completed attempt. `None` means
    /// the answer is stale: wrong epoch, expired or superseded.
    pub fn complete(&mut self, epoch: u64, id: WindowId, attempt: u32) -> Option<InFlight> {
        if epoch != self.epoch {
            return None;
        }
        match self.in_flight.get(&id) {
            Some(flight) if flight.attempts == attempt => self.in_flight.remove(&id),
            _ => None,
        }
    }

    /// Cancel one request; its deadline already passed
    pub fn abort(&mut self, id: WindowId) {
        if let Some(flight) = self.in_flight.remove(&id) {
            flight.handle.abort();
        }
    }

    pub fn abort_all(&mut self) -> usize {
        let count = self.in_flight.len();
        for (_, flight) in self.in_flight.drain() {
            flight.handle.abort();
        }
        count
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Start the next epoch with an empty sequencer. In-flight requests
    /// must have been aborted first.
    pub fn renew(&mut self) -> u64 {
        debug_assert!(self.in_flight.is_empty());
        self.epoch += 1;
        self.sequencer = ResultSequencer::new(self.epoch);
        self.breaker.reset();
        self.epoch
    }
}
