use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free counters shared between the processor and its observers
#[derive(Default)]
pub struct PipelineMetrics {
    frames_captured: AtomicU64,
    frames_dropped: AtomicU64,
    windows_sealed: AtomicU64,
    windows_dispatched: AtomicU64,
    results_emitted: AtomicU64,
    timeouts: AtomicU64,
    backend_errors: AtomicU64,
    transport_errors: AtomicU64,
    resubmissions: AtomicU64,
    late_discarded: AtomicU64,
    resets: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub windows_sealed: u64,
    pub windows_dispatched: u64,
    pub results_emitted: u64,
    pub timeouts: u64,
    pub backend_errors: u64,
    pub transport_errors: u64,
    pub resubmissions: u64,
    pub late_discarded: u64,
    pub resets: u64,
    pub avg_latency_us: u64,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_captured(&self) {
        bump(&self.frames_captured);
    }

    pub fn record_frame_dropped(&self) {
        bump(&self.frames_dropped);
    }

    pub fn record_window_sealed(&self) {
        bump(&self.windows_sealed);
    }

    pub fn record_window_dispatched(&self) {
        bump(&self.windows_dispatched);
    }

    pub fn record_result_emitted(&self) {
        bump(&self.results_emitted);
    }

    pub fn record_timeout(&self) {
        bump(&self.timeouts);
    }

    pub fn record_backend_error(&self) {
        bump(&self.backend_errors);
    }

    pub fn record_transport_error(&self) {
        bump(&self.transport_errors);
    }

    pub fn record_resubmission(&self) {
        bump(&self.resubmissions);
    }

    pub fn record_late_discarded(&self) {
        bump(&self.late_discarded);
    }

    pub fn record_reset(&self) {
        bump(&self.resets);
    }

    /// Round trip of one successful request
    pub fn record_latency(&self, latency: Duration) {
        let latency_us = latency.as_micros() as u64;
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn avg_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            frames_captured: load(&self.frames_captured),
            frames_dropped: load(&self.frames_dropped),
            windows_sealed: load(&self.windows_sealed),
            windows_dispatched: load(&self.windows_dispatched),
            results_emitted: load(&self.results_emitted),
            timeouts: load(&self.timeouts),
            backend_errors: load(&self.backend_errors),
            transport_errors: load(&self.transport_errors),
            resubmissions: load(&self.resubmissions),
            late_discarded: load(&self.late_discarded),
            resets: load(&self.resets),
            avg_latency_us: self.avg_latency_us(),
        }
    }
}
