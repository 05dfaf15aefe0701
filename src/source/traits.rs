use super::SourceEvent;
use crate::assets::DecoderAssets;
use crate::core::Frame;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capability set every frame source provides to the stream processor
#[async_trait]
pub trait FrameSource: Send {
    /// Short label used in logs (e.g. "camera", "file")
    fn name(&self) -> &str;

    /// Acquire the underlying media (camera permission, decoder startup)
    async fn init(&mut self, assets: &DecoderAssets) -> Result<()>;

    /// Begin producing events on `events`. Returns once capture is running.
    async fn start(&mut self, events: mpsc::Sender<SourceEvent>) -> Result<()>;

    /// True while the capture task is alive
    fn is_processing(&self) -> bool;

    /// Stop capture and release the resource. Must be idempotent.
    async fn stop(&mut self) -> Result<()>;

    /// Whether `on_stream_reset` can bring the stream back after an interruption
    fn supports_reset(&self) -> bool {
        false
    }

    /// Re-prepare the stream after an interruption; `start` follows
    async fn on_stream_reset(&mut self) -> Result<()> {
        Err(PipelineError::Unsupported(format!(
            "{} source cannot be reset",
            self.name()
        )))
    }
}

/// Pull side of a source, driven by the shared capture loop
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// `Ok(None)` ends the stream. `DecodeError` skips one frame; any other
    /// error ends capture as fatal.
    async fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Reported with the interruption once `read_frame` returns `Ok(None)`
    fn end_reason(&self) -> String {
        "end of stream".to_string()
    }
}
