use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Stream processor lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorState {
    Idle,
    Initializing {
        /// True when re-initializing after a stream reset
        reset: bool,
    },
    Running {
        #[serde(skip)]
        start_time: Option<Instant>,
        session: u64,
    },
    Stopping,
    Failed {
        error_msg: String,
    },
}

impl ProcessorState {
    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &ProcessorState) -> bool {
        use ProcessorState::*;

        matches!(
            (self, target),
            // From Idle
            (Idle, Initializing { .. }) |

            // From Initializing
            (Initializing { .. }, Running { .. }) |
            (Initializing { .. }, Failed { .. }) |
            (Initializing { .. }, Idle) |

            // From Running
            (Running { .. }, Initializing { reset: true }) |
            (Running { .. }, Stopping) |
            (Running { .. }, Failed { .. }) |

            // From Stopping
            (Stopping, Idle) |
            (Stopping, Failed { .. }) |

            // From Failed
            (Failed { .. }, Initializing { reset: false })
        )
    }

    /// Get human-readable state name
    pub fn name(&self) -> &str {
        match self {
            Self::Idle => "Idle",
            Self::Initializing { .. } => "Initializing",
            Self::Running { .. } => "Running",
            Self::Stopping => "Stopping",
            Self::Failed { .. } => "Failed",
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Idle | Self::Failed { .. })
    }
}

impl Default for ProcessorState {
    fn default() -> Self {
        Self::Idle
    }
}
