use super::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-scoped window identifier, strictly increasing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl WindowId {
    pub fn next(self) -> Self {
        WindowId(self.0 + 1)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A sealed, read-only batch of frames dispatched as one estimation request
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    id: WindowId,
    frames: Vec<Frame>,
    carried: usize,
}

impl Window {
    /// Seal `frames` under `id`. The first `carried` frames are overlap
    /// carried over from the previous window.
    pub fn new(id: WindowId, frames: Vec<Frame>, carried: usize) -> Self {
        debug_assert!(!frames.is_empty(), "sealed window must hold frames");
        debug_assert!(carried < frames.len().max(1));
        Self { id, frames, carried }
    }

    pub fn id(&self) -> WindowId {
        self.id
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of leading frames shared with the previous window
    pub fn carried(&self) -> usize {
        self.carried
    }

    /// Frames first seen in this window
    pub fn fresh_frames(&self) -> &[Frame] {
        &self.frames[self.carried.min(self.frames.len())..]
    }

    pub fn start_timestamp_us(&self) -> u64 {
        self.frames.first().map(|f| f.timestamp_us).unwrap_or(0)
    }

    pub fn end_timestamp_us(&self) -> u64 {
        self.frames.last().map(|f| f.timestamp_us).unwrap_or(0)
    }

    pub fn timestamps_us(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.timestamp_us).collect()
    }
}
