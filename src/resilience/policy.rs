use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What the processor does when a window's request fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Emit the window as failed and move on
    AcceptGap,

    /// Send the same window again with exponential backoff.
    /// `max_attempts` counts the first request.
    Resubmit {
        max_attempts: u32,
        base_ms: u64,
        max_ms: u64,
    },
}

impl RetryPolicy {
    /// Delay before the next attempt, or `None` when the window is given up
    pub fn next_attempt(&self, attempts_made: u32, error: &PipelineError) -> Option<Duration> {
        if !error.is_resubmittable() {
            return None;
        }
        match *self {
            RetryPolicy::AcceptGap => None,
            RetryPolicy::Resubmit {
                max_attempts,
                base_ms,
                max_ms,
            } => {
                if attempts_made >= max_attempts {
                    return None;
                }
                let exponent = attempts_made.saturating_sub(1).min(16);
                let delay = base_ms.saturating_mul(1u64 << exponent).min(max_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Resubmit {
            max_attempts: 2,
            base_ms: 250,
            max_ms: 2_000,
        }
    }
}
