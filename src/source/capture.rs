use super::{FrameReader, SourceEvent};
use crate::error::{PipelineError, Result};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

/// Background task pulling frames from a reader into the event channel.
///
/// The reader is handed back by `stop` so the source can restart it.
/// Whoever stops the task must keep draining `events` meanwhile, since a
/// captured frame is always delivered before the task checks for shutdown.
pub struct CaptureTask<R> {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<R>,
    running: Arc<AtomicBool>,
}

impl<R: FrameReader> CaptureTask<R> {
    pub fn spawn(mut reader: R, events: mpsc::Sender<SourceEvent>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        let handle = tokio::spawn(async move {
            loop {
                let outcome = tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => break,
                    outcome = reader.read_frame() => outcome,
                };

                let (event, last) = match outcome {
                    Ok(Some(frame)) => (SourceEvent::Frame(frame), false),
                    Ok(None) => (
                        SourceEvent::Interrupted {
                            reason: reader.end_reason(),
                        },
                        true,
                    ),
                    Err(PipelineError::DecodeError(reason)) => {
                        debug!("skipping undecodable frame: {}", reason);
                        (SourceEvent::DecodeFailed { reason }, false)
                    }
                    Err(e) => (SourceEvent::Failed(e), true),
                };

                if events.send(event).await.is_err() {
                    // Owner went away
                    break;
                }
                if last {
                    break;
                }
            }

            flag.store(false, Ordering::SeqCst);
            reader
        });

        Self {
            shutdown_tx,
            handle,
            running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal shutdown and wait for the reader to come back
    pub async fn stop(self) -> Result<R> {
        let _ = self.shutdown_tx.send(());
        self.handle
            .await
            .map_err(|e| PipelineError::ResourceUnavailable(format!("capture task failed: {}", e)))
    }
}

/// Where a source keeps its reader: parked while idle, inside a task while capturing
pub enum CaptureSlot<R> {
    Vacant,
    Parked(R),
    Running(CaptureTask<R>),
}

impl<R: FrameReader> CaptureSlot<R> {
    pub fn start(&mut self, events: mpsc::Sender<SourceEvent>) -> Result<()> {
        match std::mem::replace(self, CaptureSlot::Vacant) {
            CaptureSlot::Parked(reader) => {
                *self = CaptureSlot::Running(CaptureTask::spawn(reader, events));
                Ok(())
            }
            CaptureSlot::Running(task) => {
                *self = CaptureSlot::Running(task);
                Err(PipelineError::InvalidState {
                    from: "Running".to_string(),
                    to: "Running".to_string(),
                })
            }
            CaptureSlot::Vacant => Err(PipelineError::ResourceUnavailable(
                "source was not initialized".to_string(),
            )),
        }
    }

    pub async fn stop(&mut self) -> Result<()> {
        match std::mem::replace(self, CaptureSlot::Vacant) {
            CaptureSlot::Running(task) => match task.stop().await {
                Ok(reader) => {
                    *self = CaptureSlot::Parked(reader);
                    Ok(())
                }
                Err(e) => {
                    warn!("capture reader lost: {}", e);
                    Err(e)
                }
            },
            other => {
                *self = other;
                Ok(())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, CaptureSlot::Running(task) if task.is_running())
    }

    pub fn parked_mut(&mut self) -> Option<&mut R> {
        match self {
            CaptureSlot::Parked(reader) => Some(reader),
            _ => None,
        }
    }
}

impl<R> Default for CaptureSlot<R> {
    fn default() -> Self {
        CaptureSlot::Vacant
    }
}
