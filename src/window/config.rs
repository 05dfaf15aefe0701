use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;

/// Threshold at which an open window is sealed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowLength {
    /// Seal after this many frames
    Frames(usize),
    /// Seal once the window spans this many milliseconds of capture time
    DurationMs(u64),
}

/// Longest duration whose microsecond span still fits in a `u64`
pub const MAX_DURATION_MS: u64 = u64::MAX / 1000;

/// Window sizing and overlap.
///
/// JSON form: `{"frames": 150, "overlap": 0.5}` or `{"duration_ms": 5000}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWindowConfig", into = "RawWindowConfig")]
pub struct WindowConfig {
    pub length: WindowLength,

    /// Fraction of a sealed window's trailing frames that seed the next one
    pub overlap: f64,
}

#[derive(Serialize, Deserialize)]
struct RawWindowConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    frames: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(default)]
    overlap: f64,
}

impl From<WindowConfig> for RawWindowConfig {
    fn from(config: WindowConfig) -> Self {
        let (frames, duration_ms) = match config.length {
            WindowLength::Frames(n) => (Some(n), None),
            WindowLength::DurationMs(ms) => (None, Some(ms)),
        };
        RawWindowConfig {
            frames,
            duration_ms,
            overlap: config.overlap,
        }
    }
}

impl TryFrom<RawWindowConfig> for WindowConfig {
    type Error = PipelineError;

    fn try_from(raw: RawWindowConfig) -> Result<Self> {
        let length = match (raw.frames, raw.duration_ms) {
            (Some(frames), None) => WindowLength::Frames(frames),
            (None, Some(ms)) => WindowLength::DurationMs(ms),
            (None, None) => {
                return Err(PipelineError::InvalidConfig(
                    "window needs either `frames` or `duration_ms`".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(PipelineError::InvalidConfig(
                    "window `frames` and `duration_ms` are mutually exclusive".to_string(),
                ))
            }
        };
        let config = WindowConfig {
            length,
            overlap: raw.overlap,
        };
        config.validate()?;
        Ok(config)
    }
}

impl WindowConfig {
    pub fn frames(count: usize) -> Self {
        Self {
            length: WindowLength::Frames(count),
            overlap: 0.0,
        }
    }

    pub fn duration_ms(ms: u64) -> Self {
        Self {
            length: WindowLength::DurationMs(ms),
            overlap: 0.0,
        }
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.length {
            WindowLength::Frames(0) => {
                return Err(PipelineError::InvalidConfig(
                    "window length must be at least one frame".to_string(),
                ))
            }
            WindowLength::DurationMs(0) => {
                return Err(PipelineError::InvalidConfig(
                    "window duration must be positive".to_string(),
                ))
            }
            WindowLength::DurationMs(ms) if ms > MAX_DURATION_MS => {
                return Err(PipelineError::InvalidConfig(format!(
                    "window duration {} ms does not fit in microseconds",
                    ms
                )))
            }
            _ => {}
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(PipelineError::InvalidConfig(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        Ok(())
    }

    /// Frames carried over out of a sealed window of `len` frames.
    /// Always leaves at least one fresh frame per window.
    pub fn carry_for(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        ((self.overlap * len as f64).floor() as usize).min(len - 1)
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        // 5 s at 30 fps, half overlap
        Self {
            length: WindowLength::Frames(150),
            overlap: 0.5,
        }
    }
}
