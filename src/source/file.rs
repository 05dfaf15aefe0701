use super::{CaptureSlot, FrameDecoder, FrameReader, FrameSource, SourceEvent, SourceState, StreamInfo};
use crate::assets::DecoderAssets;
use crate::core::Frame;
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// Plays a video file through a decoder, stamping frames with media time.
///
/// End of file is reported as an interruption. With looping enabled the
/// source supports reset and rewinds to the first frame.
pub struct FileSource {
    path: PathBuf,
    decoder: Option<Box<dyn FrameDecoder>>,
    slot: CaptureSlot<FileReader>,
    state: SourceState,
    realtime: bool,
    looping: bool,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, decoder: Box<dyn FrameDecoder>) -> Self {
        Self {
            path: path.into(),
            decoder: Some(decoder),
            slot: CaptureSlot::Vacant,
            state: SourceState::Uninitialized,
            realtime: false,
            looping: false,
        }
    }

    /// Pace frames at the stream's frame rate instead of decoding flat out
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> SourceState {
        self.state.clone()
    }

    fn rewind_reader(&mut self) -> Result<()> {
        let reader = self.slot.parked_mut().ok_or_else(|| {
            PipelineError::ResourceUnavailable("file reader unavailable".to_string())
        })?;
        reader.decoder.rewind()?;
        reader.index = 0;
        Ok(())
    }
}

#[async_trait]
impl FrameSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn init(&mut self, assets: &DecoderAssets) -> Result<()> {
        if self.state == SourceState::Running {
            return Err(PipelineError::InvalidState {
                from: "Running".to_string(),
                to: "Ready".to_string(),
            });
        }

        if self.slot.parked_mut().is_some() {
            self.rewind_reader()?;
        } else {
            let decoder = self.decoder.as_mut().ok_or_else(|| {
                PipelineError::ResourceUnavailable("decoder unavailable".to_string())
            })?;
            let info = match decoder.open(assets, &self.path) {
                Ok(info) => info,
                Err(e) => {
                    self.state = SourceState::Error(e.to_string());
                    return Err(e);
                }
            };
            info!(
                "file source ready: {} ({}x{} @ {} fps)",
                self.path.display(),
                info.width,
                info.height,
                info.fps
            );
            if let Some(decoder) = self.decoder.take() {
                self.slot = CaptureSlot::Parked(FileReader::new(decoder, info, self.realtime));
            }
        }

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
        self.looping
    }

    async fn on_stream_reset(&mut self) -> Result<()> {
        if !self.looping {
            return Err(PipelineError::Unsupported(
                "file source is not looping".to_string(),
            ));
        }
        self.stop().await?;
        self.rewind_reader()?;
        info!("rewound {}", self.path.display());
        self.state = SourceState::Ready;
        Ok(())
    }
}

struct FileReader {
    decoder: Box<dyn FrameDecoder>,
    info: StreamInfo,
    index: u64,
    realtime: bool,
    started: Instant,
}

impl FileReader {
    fn new(decoder: Box<dyn FrameDecoder>, info: StreamInfo, realtime: bool) -> Self {
        Self {
            decoder,
            info,
            index: 0,
            realtime,
            started: Instant::now(),
        }
    }

    fn media_time_us(&self) -> u64 {
        (self.index as f64 * 1_000_000.0 / self.info.fps) as u64
    }
}

#[async_trait]
impl FrameReader for FileReader {
    async fn read_frame(&mut self) -> Result<Option<Frame>> {
        let timestamp_us = self.media_time_us();
        if self.realtime {
            tokio::time::sleep_until(self.started + Duration::from_micros(timestamp_us)).await;
        }

        let decoded = self.decoder.decode_next();
        let sequence = self.index;
        match decoded {
            Ok(Some(image)) => {
                self.index += 1;
                Ok(Some(Frame::new(
                    timestamp_us,
                    sequence,
                    image.width,
                    image.height,
                    image.format,
                    image.data,
                )))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                // The bad frame still occupies its slot on the timeline
                self.index += 1;
                Err(e)
            }
        }
    }

    fn end_reason(&self) -> String {
        "end of file".to_string()
    }
}
