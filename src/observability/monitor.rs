use super::PipelineMetrics;
use std::sync::Arc;

pub struct PipelineMonitor {
    metrics: Arc<PipelineMetrics>,
}

impl PipelineMonitor {
    pub fn new(metrics: Arc<PipelineMetrics>) -> Self {
        Self { metrics }
    }

    pub fn generate_report(&self) -> String {
        let s = self.metrics.snapshot();

        let mut report = String::from("=== Pipeline Metrics ===\n");
        report.push_str(&format!(
            "\n[capture]\n  Frames: {} captured, {} dropped\n",
            s.frames_captured, s.frames_dropped
        ));
        report.push_str(&format!(
            "\n[windows]\n  Sealed: {}\n  Dispatched: {} ({} resubmitted)\n",
            s.windows_sealed, s.windows_dispatched, s.resubmissions
        ));
        report.push_str(&format!(
            "\n[results]\n  Emitted: {}\n  Timeouts: {}\n  Errors: {}\n  Late responses discarded: {}\n  Avg Latency: {}μs\n",
            s.results_emitted,
            s.timeouts,
            match s.backend_errors + s.transport_errors {
                0 => "0".to_string(),
                n => format!(
                    "{} error{} ({} backend, {} transport)",
                    n,
                    if n == 1 { "" } else { "s" },
                    s.backend_errors,
                    s.transport_errors
                ),
            },
            s.late_discarded,
            s.avg_latency_us
        ));
        if s.resets > 0 {
            report.push_str(&format!("\n[source]\n  Resets: {}\n", s.resets));
        }

        report
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts() {
        let metrics = Arc::new(PipelineMetrics::new());
        metrics.record_frame_captured();
        metrics.record_frame_captured();
        metrics.record_frame_dropped();
        metrics.record_backend_error();

        let report = PipelineMonitor::new(metrics).generate_report();
        assert!(report.contains("2 captured, 1 dropped"));
        assert!(report.contains("1 error (1 backend, 0 transport)"));
        assert!(!report.contains("[source]"));
    }

    #[test]
    fn test_report_without_errors() {
        let report = PipelineMonitor::new(Arc::new(PipelineMetrics::new())).generate_report();
        assert!(report.contains("  Errors: 0\n"));
        assert!(!report.contains("0 errors"));
    }
}
