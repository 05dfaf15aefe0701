use crate::assets::DecoderAssets;
use crate::core::{Frame, PixelFormat};
use crate::error::{PipelineError, Result};
use crate::source::{CaptureSlot, FrameReader, FrameSource, SourceEvent, SourceState};
use async_trait::async_trait;
use log::info;
use serde_json::Value;
use std::f64::consts::PI;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
enum TriggerMode {
    Periodic,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManualCommand {
    Capture,
    Corrupt,
    Disconnect,
}

/// Drives a camera in manual mode
#[derive(Debug, Clone)]
pub struct ManualTrigger {
    tx: mpsc::UnboundedSender<ManualCommand>,
}

impl ManualTrigger {
    /// Capture one frame
    pub fn capture(&self) {
        let _ = self.tx.send(ManualCommand::Capture);
    }

    pub fn capture_n(&self, n: usize) {
        for _ in 0..n {
            self.capture();
        }
    }

    /// Produce one frame that fails to decode
    pub fn corrupt(&self) {
        let _ = self.tx.send(ManualCommand::Corrupt);
    }

    /// Simulate the camera dropping off the bus
    pub fn disconnect(&self) {
        let _ = self.tx.send(ManualCommand::Disconnect);
    }
}

/// Synthetic camera producing a gray gradient whose brightness pulses at
/// `pulse_hz`, with optional fault injection.
pub struct SimulatedCamera {
    state: SourceState,
    permission_denied: bool,
    slot: CaptureSlot<CameraReader>,
    manual_tx: mpsc::UnboundedSender<ManualCommand>,
    /// Only set until the first `init`, then it lives in the reader
    manual_rx: Option<mpsc::UnboundedReceiver<ManualCommand>>,
    settings: CameraSettings,
}

#[derive(Debug, Clone, Copy)]
struct CameraSettings {
    mode: TriggerMode,
    width: u32,
    height: u32,
    fps: f64,
    pulse_hz: f64,
    corrupt_every: Option<u64>,
    disconnect_after: Option<u64>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            state: SourceState::Uninitialized,
            permission_denied: false,
            slot: CaptureSlot::Vacant,
            manual_tx: tx,
            manual_rx: Some(rx),
            settings: CameraSettings {
                mode: TriggerMode::Periodic,
                width: 64,
                height: 48,
                fps: 30.0,
                pulse_hz: 1.2,
                corrupt_every: None,
                disconnect_after: None,
            },
        }
    }

    /// Camera whose frames are produced only through its `ManualTrigger`
    pub fn manual() -> Self {
        let mut camera = Self::new();
        camera.settings.mode = TriggerMode::Manual;
        camera
    }

    pub fn trigger_handle(&self) -> ManualTrigger {
        ManualTrigger {
            tx: self.manual_tx.clone(),
        }
    }

    pub fn configure(&mut self, config: Value) -> Result<()> {
        if self.state != SourceState::Uninitialized {
            return Err(PipelineError::InvalidState {
                from: format!("{:?}", self.state),
                to: "configured".to_string(),
            });
        }

        if let Some(mode) = config["mode"].as_str() {
            self.settings.mode = match mode {
                "periodic" => TriggerMode::Periodic,
                "manual" => TriggerMode::Manual,
                _ => {
                    return Err(PipelineError::InvalidConfig(format!(
                        "unknown camera mode: {}",
                        mode
                    )))
                }
            };
        }
        if let Some(width) = config["width"].as_u64() {
            self.settings.width = width as u32;
        }
        if let Some(height) = config["height"].as_u64() {
            self.settings.height = height as u32;
        }
        if let Some(fps) = config["fps"].as_f64() {
            if fps <= 0.0 {
                return Err(PipelineError::InvalidConfig("fps must be positive".to_string()));
            }
            self.settings.fps = fps;
        }
        if let Some(hz) = config["pulse_hz"].as_f64() {
            self.settings.pulse_hz = hz;
        }
        self.settings.corrupt_every = config["corrupt_every"].as_u64().filter(|n| *n > 0);
        self.settings.disconnect_after = config["disconnect_after"].as_u64();
        self.permission_denied = config["permission"].as_str() == Some("denied");

        Ok(())
    }

    pub fn state(&self) -> SourceState {
        self.state.clone()
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    fn name(&self) -> &str {
        "camera"
    }

    async fn init(&mut self, _assets: &DecoderAssets) -> Result<()> {
        if self.permission_denied {
            self.state = SourceState::Error("permission denied".to_string());
            return Err(PipelineError::ResourceUnavailable(
                "camera permission denied".to_string(),
            ));
        }

        match self.slot.parked_mut() {
            Some(reader) => reader.rewind(),
            None => {
                let manual_rx = self.manual_rx.take().ok_or_else(|| {
                    PipelineError::ResourceUnavailable("camera is still capturing".to_string())
                })?;
                self.slot = CaptureSlot::Parked(CameraReader::new(self.settings, manual_rx));
            }
        }

        info!(
            "camera ready: {}x{} @ {} fps",
            self.settings.width, self.settings.height, self.settings.fps
        );
        self.state = SourceState::Ready;
        Ok(())
    }

    async fn start(&mut self, events: mpsc::Sender<SourceEvent>) -> Result<()> {
        if self.state != SourceState::Ready && self.state != SourceState::Stopped {
            return Err(PipelineError::InvalidState {
                from: format!("{:?}", self.state),
                to: "Running".to_string(),
            });
        }
        if let Some(reader) = self.slot.parked_mut() {
            reader.started = Instant::now();
        }
        self.slot.start(events)?;
        self.state = SourceState::Running;
        Ok(())
    }

    fn is_processing(&self) -> bool {
        self.slot.is_running()
    }

    async fn stop(&mut self) -> Result<()> {
        if self.state != SourceState::Running {
            return Ok(());
        }
        self.slot.stop().await?;
        self.state = SourceState::Stopped;
        Ok(())
    }

    fn supports_reset(&self) -> bool {
        true
    }

    async fn on_stream_reset(&mut self) -> Result<()> {
        self.stop().await?;
        let reader = self.slot.parked_mut().ok_or_else(|| {
            PipelineError::ResourceUnavailable("camera reader unavailable".to_string())
        })?;
        reader.rewind();
        info!("camera reopened after interruption");
        self.state = SourceState::Ready;
        Ok(())
    }
}

struct CameraReader {
    settings: CameraSettings,
    manual_rx: mpsc::UnboundedReceiver<ManualCommand>,
    sequence: u64,
    started: Instant,
    disconnected: bool,
}

impl CameraReader {
    fn new(settings: CameraSettings, manual_rx: mpsc::UnboundedReceiver<ManualCommand>) -> Self {
        Self {
            settings,
            manual_rx,
            sequence: 0,
            started: Instant::now(),
            disconnected: false,
        }
    }

    fn rewind(&mut self) {
        self.sequence = 0;
        self.disconnected = false;
        self.started = Instant::now();
    }

    fn nominal_timestamp_us(&self) -> u64 {
        (self.sequence as f64 * 1_000_000.0 / self.settings.fps) as u64
    }

    fn render(&self, sequence: u64, timestamp_us: u64) -> Frame {
        let CameraSettings { width, height, .. } = self.settings;
        let t = timestamp_us as f64 / 1_000_000.0;
        let pulse = 8.0 * (2.0 * PI * self.settings.pulse_hz * t).sin();

        let mut data = Vec::with_capacity(Frame::expected_len(width, height, PixelFormat::Rgb8));
        for y in 0..height {
            for x in 0..width {
                let base = 96.0 + 64.0 * (x + y) as f64 / (width + height).max(1) as f64;
                let value = (base + pulse).clamp(0.0, 255.0) as u8;
                data.extend_from_slice(&[value, value.saturating_sub(20), value.saturating_sub(40)]);
            }
        }
        Frame::new(timestamp_us, sequence, width, height, PixelFormat::Rgb8, data)
    }
}

#[async_trait]
impl FrameReader for CameraReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        if let Some(limit) = self.settings.disconnect_after {
            if self.sequence >= limit {
                self.disconnected = true;
                return Ok(None);
            }
        }

        let (corrupt, timestamp_us) = match self.settings.mode {
            TriggerMode::Periodic => {
                let due = self.started
                    + Duration::from_secs_f64(self.sequence as f64 / self.settings.fps);
                tokio::time::sleep_until(due).await;
                (false, self.started.elapsed().as_micros() as u64)
            }
            TriggerMode::Manual => match self.manual_rx.recv().await {
                Some(ManualCommand::Capture) => (false, self.nominal_timestamp_us()),
                Some(ManualCommand::Corrupt) => (true, self.nominal_timestamp_us()),
                Some(ManualCommand::Disconnect) | None => {
                    self.disconnected = true;
                    return Ok(None);
                }
            },
        };

        let injected = self
            .settings
            .corrupt_every
            .map(|n| self.sequence % n == n - 1)
            .unwrap_or(false);

        let sequence = self.sequence;
        self.sequence += 1;

        if corrupt || injected {
            return Err(PipelineError::DecodeError(format!(
                "corrupt camera frame {}",
                sequence
            )));
        }

        Ok(Some(self.render(sequence, timestamp_us)))
    }

    fn end_reason(&self) -> String {
        if self.disconnected {
            "camera disconnected".to_string()
        } else {
            "camera stream ended".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetResolver, BuildMode};

    fn assets() -> DecoderAssets {
        AssetResolver::with_placeholders("", "")
            .resolve(BuildMode::Hosted)
            .unwrap()
    }

    #[tokio::test]
    async fn test_manual_capture() {
        let mut camera = SimulatedCamera::manual();
        let trigger = camera.trigger_handle();
        let (tx, mut rx) = mpsc::channel(8);

        camera.init(&assets()).await.unwrap();
        camera.start(tx).await.unwrap();
        assert!(camera.is_processing());

        trigger.capture_n(2);
        for expected in 0..2 {
            match rx.recv().await.unwrap() {
                SourceEvent::Frame(frame) => {
                    assert_eq!(frame.sequence, expected);
                    assert_eq!(frame.data.len(), 64 * 48 * 3);
                }
                other => panic!("unexpected event {:?}", other),
            }
        }

        camera.stop().await.unwrap();
        assert!(!camera.is_processing());
        assert_eq!(camera.state(), SourceState::Stopped);
    }

    #[tokio::test]
    async fn test_permission_denied() {
        let mut camera = SimulatedCamera::new();
        camera.configure(serde_json::json!({"permission": "denied"})).unwrap();
        let err = camera.init(&assets()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ResourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_corrupt_and_disconnect() {
        let mut camera = SimulatedCamera::manual();
        let trigger = camera.trigger_handle();
        let (tx, mut rx) = mpsc::channel(8);
        camera.init(&assets()).await.unwrap();
        camera.start(tx).await.unwrap();

        trigger.corrupt();
        trigger.disconnect();

        assert!(matches!(rx.recv().await, Some(SourceEvent::DecodeFailed { .. })));
        match rx.recv().await {
            Some(SourceEvent::Interrupted { reason }) => assert_eq!(reason, "camera disconnected"),
            other => panic!("unexpected event {:?}", other),
        }

        camera.on_stream_reset().await.unwrap();
        assert_eq!(camera.state(), SourceState::Ready);
    }
}
