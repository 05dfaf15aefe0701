use thiserror::Error;

/// Errors surfaced by sources, the estimation client and the processor.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    /// Camera or file could not be acquired (permission denied, missing file).
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A single frame could not be decoded. Never fatal.
    #[error("decode error: {0}")]
    DecodeError(String),

    /// The backend could not be reached (no response).
    #[error("transport error: {0}")]
    TransportError(String),

    /// The backend answered with a non-success status.
    #[error("backend error {status}: {message}")]
    BackendError { status: u16, message: String },

    /// The backend answered 2xx but the body was not a vitals document.
    #[error("invalid backend response: {0}")]
    InvalidResponse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid state transition: {from} -> {to}")]
    InvalidState { from: String, to: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl PipelineError {
    /// Errors that terminate the session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ResourceUnavailable(_) | Self::InvalidConfig(_)
        )
    }

    /// Errors after which the caller may resubmit the same window.
    pub fn is_resubmittable(&self) -> bool {
        matches!(
            self,
            Self::TransportError(_) | Self::BackendError { .. } | Self::InvalidResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(PipelineError::ResourceUnavailable("camera".into()).is_fatal());
        assert!(!PipelineError::DecodeError("bad frame".into()).is_fatal());

        let backend = PipelineError::BackendError {
            status: 500,
            message: "boom".into(),
        };
        assert!(backend.is_resubmittable());
        assert!(!backend.is_fatal());
        assert_eq!(backend.to_string(), "backend error 500: boom");
    }
}
