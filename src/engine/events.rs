use crate::core::WindowResult;
use crate::error::PipelineError;

/// Everything the consumer receives from a running processor, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// One window, estimated or as a placeholder. Ordered by window id
    /// within a session.
    Result(WindowResult),

    /// The source was reset. Results that follow belong to `session` and
    /// window ids start over.
    StreamReset {
        session: u64,
        reason: String,
        frames_discarded: usize,
    },

    /// The source ran out and cannot be reset; the session was drained
    Ended { reason: String },

    Failed(PipelineError),
}

impl PipelineEvent {
    pub fn as_result(&self) -> Option<&WindowResult> {
        match self {
            PipelineEvent::Result(result) => Some(result),
            _ => None,
        }
    }
}

/// Summary of one session, returned by `stop`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StopReport {
    pub windows_dispatched: u64,
    pub results_emitted: u64,
    pub timed_out: u64,
    pub failed: u64,
    pub abandoned: u64,
    pub frames_dropped: u64,
    pub resets: u64,
    /// A partial window was sealed and sent during shutdown
    pub partial_flushed: bool,
}
