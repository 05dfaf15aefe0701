use crate::core::Frame;
use crate::error::PipelineError;

/// Lifecycle of a concrete frame source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceState {
    Uninitialized,
    Ready,
    Running,
    Stopped,
    Error(String),
}

/// Everything a source reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Frame(Frame),

    /// A single frame failed to decode and was skipped
    DecodeFailed { reason: String },

    /// The underlying stream stopped (disconnect, end of file). The owner
    /// decides whether to reset the source or end the session.
    Interrupted { reason: String },

    /// Unrecoverable failure, capture has ended
    Failed(PipelineError),
}
