use crate::assets::BuildMode;
use crate::error::{PipelineError, Result};
use crate::resilience::RetryPolicy;
use crate::window::WindowConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Stream processor tunables. Every field has a default, so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub window: WindowConfig,

    /// How long a window may wait for its result before a timeout
    /// placeholder is emitted in its place
    pub result_timeout_ms: u64,

    /// Upper bound on waiting for in-flight requests during stop
    pub drain_grace_ms: u64,

    /// Capacity of the source event channel; a full channel stalls capture
    pub channel_capacity: usize,

    /// Windows awaiting a result before frame intake pauses
    pub max_in_flight: usize,

    pub retry: RetryPolicy,

    /// Consecutive request failures that fail the session; 0 disables
    pub max_consecutive_failures: u32,

    pub build_mode: BuildMode,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            result_timeout_ms: 10_000,
            drain_grace_ms: 5_000,
            channel_capacity: 100,
            max_in_flight: 8,
            retry: RetryPolicy::default(),
            max_consecutive_failures: 5,
            build_mode: BuildMode::Hosted,
        }
    }
}

impl ProcessorConfig {
    pub fn from_json(config: Value) -> Result<Self> {
        let config: ProcessorConfig = serde_json::from_value(config)
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        if self.channel_capacity == 0 {
            return Err(PipelineError::InvalidConfig(
                "channel_capacity must be positive".to_string(),
            ));
        }
        if self.max_in_flight == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_in_flight must be positive".to_string(),
            ));
        }
        if self.result_timeout_ms == 0 {
            return Err(PipelineError::InvalidConfig(
                "result_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn result_timeout(&self) -> Duration {
        Duration::from_millis(self.result_timeout_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::WindowLength;
    use serde_json::json;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = ProcessorConfig::from_json(json!({})).unwrap();
        assert_eq!(config, ProcessorConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ProcessorConfig::from_json(json!({
            "window": {"duration_ms": 5000, "overlap": 0.5},
            "result_timeout_ms": 2000,
            "drain_grace_ms": 500,
            "channel_capacity": 10,
            "retry": {"policy": "accept_gap"},
            "max_consecutive_failures": 0,
            "build_mode": "embedded"
        }))
        .unwrap();

        assert_eq!(config.window.length, WindowLength::DurationMs(5000));
        assert_eq!(config.result_timeout(), Duration::from_secs(2));
        assert_eq!(config.retry, RetryPolicy::AcceptGap);
        assert_eq!(config.build_mode, BuildMode::Embedded);
        assert_eq!(config.max_in_flight, 8);
    }

    #[test]
    fn test_serialized_config_reads_back() {
        let default = ProcessorConfig::default();
        let value = serde_json::to_value(&default).unwrap();
        assert_eq!(ProcessorConfig::from_json(value).unwrap(), default);

        let custom = ProcessorConfig::from_json(json!({
            "window": {"duration_ms": 4000, "overlap": 0.25},
            "retry": {"policy": "accept_gap"},
            "build_mode": "embedded"
        }))
        .unwrap();
        let value = serde_json::to_value(&custom).unwrap();
        assert_eq!(value["window"], json!({"duration_ms": 4000, "overlap": 0.25}));
        assert_eq!(ProcessorConfig::from_json(value).unwrap(), custom);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(ProcessorConfig::from_json(json!({"channel_capacity": 0})).is_err());
        assert!(ProcessorConfig::from_json(json!({"window": {"frames": 5, "overlap": 2.0}})).is_err());
        assert!(ProcessorConfig::from_json(json!({"result_timeout_ms": "soon"})).is_err());
    }
}
