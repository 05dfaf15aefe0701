use super::config::ProcessorConfig;
use super::events::{PipelineEvent, StopReport};
use super::session::StreamSession;
use super::state::ProcessorState;
use crate::client::{EstimationRequest, Estimator};
use crate::core::{EstimationResult, ResultStatus, Window, WindowId};
use crate::error::{PipelineError, Result};
use crate::observability::PipelineMetrics;
use crate::source::{FrameSource, SourceEvent};
use crate::window::WindowBuffer;
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, Instant};

pub(crate) enum Control {
    Stop(oneshot::Sender<StopReport>),
}

/// What a dispatch task reports back to the driver
pub(crate) struct DispatchOutcome {
    epoch: u64,
    window_id: WindowId,
    attempt: u32,
    elapsed: Duration,
    result: Result<EstimationResult>,
}

/// Handed back to the processor when the driver task ends
pub(crate) struct DriverExit {
    pub source: Box<dyn FrameSource>,
    pub report: StopReport,
    pub epoch: u64,
}

pub(crate) struct DriverParts {
    pub config: ProcessorConfig,
    pub source: Box<dyn FrameSource>,
    pub buffer: WindowBuffer,
    pub estimator: Arc<dyn Estimator>,
    pub epoch: u64,
    pub events_tx: mpsc::Sender<SourceEvent>,
    pub events_rx: mpsc::Receiver<SourceEvent>,
    pub control_rx: mpsc::Receiver<Control>,
    pub output: mpsc::UnboundedSender<PipelineEvent>,
    pub state: Arc<watch::Sender<ProcessorState>>,
    pub metrics: Arc<PipelineMetrics>,
}

enum Step {
    Control(Option<Control>),
    Source(Option<SourceEvent>),
    Completion(DispatchOutcome),
    Deadline,
}

enum Flow {
    Continue,
    Exit,
}

/// Single owner of a running session: the source, the window buffer and
/// every in-flight request. All other tasks talk to it through channels.
pub(crate) struct SessionDriver {
    config: ProcessorConfig,
    source: Box<dyn FrameSource>,
    buffer: WindowBuffer,
    session: StreamSession,
    estimator: Arc<dyn Estimator>,
    events_tx: mpsc::Sender<SourceEvent>,
    events_rx: mpsc::Receiver<SourceEvent>,
    control_rx: mpsc::Receiver<Control>,
    completions_tx: mpsc::UnboundedSender<DispatchOutcome>,
    completions_rx: mpsc::UnboundedReceiver<DispatchOutcome>,
    output: mpsc::UnboundedSender<PipelineEvent>,
    state: Arc<watch::Sender<ProcessorState>>,
    metrics: Arc<PipelineMetrics>,
    report: StopReport,
    draining: bool,
}

impl SessionDriver {
    pub fn new(parts: DriverParts) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            session: StreamSession::new(parts.epoch, parts.config.max_consecutive_failures),
            config: parts.config,
            source: parts.source,
            buffer: parts.buffer,
            estimator: parts.estimator,
            events_tx: parts.events_tx,
            events_rx: parts.events_rx,
            control_rx: parts.control_rx,
            completions_tx,
            completions_rx,
            output: parts.output,
            state: parts.state,
            metrics: parts.metrics,
            report: StopReport::default(),
            draining: false,
        }
    }

    pub async fn run(mut self) -> DriverExit {
        info!(
            "session {} running ({} source)",
            self.session.epoch(),
            self.source.name()
        );

        loop {
            let deadline = self.session.sequencer.next_deadline();
            let accepting = self.session.in_flight() < self.config.max_in_flight;

            let step = tokio::select! {
                biased;
                command = self.control_rx.recv() => Step::Control(command),
                Some(outcome) = self.completions_rx.recv() => Step::Completion(outcome),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::Deadline,
                event = self.events_rx.recv(), if accepting => Step::Source(event),
            };

            let flow = match step {
                Step::Control(Some(Control::Stop(reply))) => {
                    self.shutdown().await;
                    self.set_state(ProcessorState::Idle);
                    let _ = reply.send(self.report.clone());
                    Flow::Exit
                }
                Step::Control(None) => {
                    debug!("processor handle dropped, shutting down");
                    self.shutdown().await;
                    self.set_state(ProcessorState::Idle);
                    Flow::Exit
                }
                Step::Source(Some(event)) => self.on_source_event(event).await,
                Step::Source(None) => {
                    self.fail(PipelineError::ResourceUnavailable(
                        "source event channel closed".to_string(),
                    ))
                    .await
                }
                Step::Completion(outcome) => self.on_completion(outcome).await,
                Step::Deadline => {
                    self.on_deadline();
                    Flow::Continue
                }
            };

            if let Flow::Exit = flow {
                break;
            }
        }

        DriverExit {
            source: self.source,
            report: self.report,
            epoch: self.session.epoch(),
        }
    }

    async fn on_source_event(&mut self, event: SourceEvent) -> Flow {
        match event {
            SourceEvent::Interrupted { reason } => {
                if self.source.supports_reset() {
                    self.reset(reason).await
                } else {
                    info!("stream ended: {}", reason);
                    self.shutdown().await;
                    self.emit(PipelineEvent::Ended { reason });
                    self.set_state(ProcessorState::Idle);
                    Flow::Exit
                }
            }
            SourceEvent::Failed(err) => self.fail(err).await,
            other => {
                self.absorb(other);
                Flow::Continue
            }
        }
    }

    /// Feed frames and decode failures into the buffer
    fn absorb(&mut self, event: SourceEvent) {
        match event {
            SourceEvent::Frame(frame) => {
                self.metrics.record_frame_captured();
                if let Some(window) = self.buffer.push(frame) {
                    self.metrics.record_window_sealed();
                    self.dispatch(window);
                }
            }
            SourceEvent::DecodeFailed { reason } => {
                warn!("dropping frame: {}", reason);
                self.metrics.record_frame_dropped();
                self.report.frames_dropped += 1;
            }
            SourceEvent::Interrupted { reason } => {
                debug!("ignoring interruption while stopping: {}", reason)
            }
            SourceEvent::Failed(err) => warn!("source error while stopping: {}", err),
        }
    }

    fn dispatch(&mut self, window: Window) {
        let deadline = Instant::now() + self.config.result_timeout();
        self.session.sequencer.register(&window, deadline);

        let request = Arc::new(EstimationRequest::from_window(&window));
        debug!(
            "dispatching window {} ({} frames, {} carried)",
            window.id(),
            window.len(),
            window.carried()
        );
        self.send_request(request, 1, Duration::ZERO);
        self.metrics.record_window_dispatched();
        self.report.windows_dispatched += 1;
    }

    fn send_request(&mut self, request: Arc<EstimationRequest>, attempt: u32, backoff: Duration) {
        let estimator = self.estimator.clone();
        let completions = self.completions_tx.clone();
        let epoch = self.session.epoch();
        let window_id = request.window_id();
        let task_request = request.clone();

        let handle = tokio::spawn(async move {
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            let started = Instant::now();
            let result = estimator.estimate(&task_request).await;
            let _ = completions.send(DispatchOutcome {
                epoch,
                window_id,
                attempt,
                elapsed: started.elapsed(),
                result,
            });
        });

        self.session.track(window_id, request, attempt, handle);
    }

    async fn on_completion(&mut self, outcome: DispatchOutcome) -> Flow {
        let DispatchOutcome {
            epoch,
            window_id,
            attempt,
            elapsed,
            result,
        } = outcome;

        let Some(flight) = self.session.complete(epoch, window_id, attempt) else {
            debug!(
                "discarding late response for window {} (epoch {})",
                window_id, epoch
            );
            self.metrics.record_late_discarded();
            return Flow::Continue;
        };

        match result {
            Ok(estimate) => {
                self.metrics.record_latency(elapsed);
                self.session.breaker.record_success();
                self.session
                    .sequencer
                    .resolve(window_id, ResultStatus::Estimated(estimate));
            }
            Err(err) => {
                match &err {
                    PipelineError::BackendError { .. } => self.metrics.record_backend_error(),
                    PipelineError::TransportError(_) => self.metrics.record_transport_error(),
                    _ => {}
                }
                warn!(
                    "window {} attempt {} failed: {}",
                    window_id, flight.attempts, err
                );

                let tripped = self.session.breaker.record_failure();
                if tripped && !self.draining {
                    self.session
                        .sequencer
                        .resolve(window_id, ResultStatus::Failed(err.to_string()));
                    self.release();
                    error!(
                        "{} consecutive estimation failures",
                        self.session.breaker.consecutive()
                    );
                    return self.fail(err).await;
                }

                let retry = if self.draining {
                    None
                } else {
                    self.config.retry.next_attempt(flight.attempts, &err)
                };
                match retry {
                    Some(backoff) => {
                        debug!("resubmitting window {} in {:?}", window_id, backoff);
                        self.metrics.record_resubmission();
                        self.session.sequencer.set_deadline(
                            window_id,
                            Instant::now() + backoff + self.config.result_timeout(),
                        );
                        self.send_request(flight.request, flight.attempts + 1, backoff);
                        return Flow::Continue;
                    }
                    None => {
                        self.session
                            .sequencer
                            .resolve(window_id, ResultStatus::Failed(err.to_string()));
                    }
                }
            }
        }

        self.release();
        Flow::Continue
    }

    fn on_deadline(&mut self) {
        for id in self.session.sequencer.expire(Instant::now()) {
            warn!("window {} timed out", id);
            self.session.abort(id);
            self.metrics.record_timeout();
        }
        self.release();
    }

    /// Emit every result the sequencer can release
    fn release(&mut self) {
        for result in self.session.sequencer.release() {
            match &result.status {
                ResultStatus::Estimated(_) => {}
                ResultStatus::TimedOut => self.report.timed_out += 1,
                ResultStatus::Failed(_) => self.report.failed += 1,
                ResultStatus::Abandoned => self.report.abandoned += 1,
            }
            self.metrics.record_result_emitted();
            self.report.results_emitted += 1;
            self.emit(PipelineEvent::Result(result));
        }
    }

    fn emit(&self, event: PipelineEvent) {
        if self.output.send(event).is_err() {
            debug!("event consumer is gone");
        }
    }

    fn set_state(&self, next: ProcessorState) {
        let current = self.state.borrow().clone();
        if !current.can_transition_to(&next) {
            warn!(
                "unexpected state transition {} -> {}",
                current.name(),
                next.name()
            );
        }
        self.state.send_replace(next);
    }

    /// Stop capture while draining the event channel, so a capture task
    /// blocked on a full channel can observe the shutdown
    async fn stop_source(&mut self) -> Result<Vec<SourceEvent>> {
        let mut drained = Vec::new();
        {
            let stop = self.source.stop();
            tokio::pin!(stop);
            loop {
                tokio::select! {
                    result = &mut stop => {
                        result?;
                        break;
                    }
                    Some(event) = self.events_rx.recv() => drained.push(event),
                }
            }
        }
        while let Ok(event) = self.events_rx.try_recv() {
            drained.push(event);
        }
        Ok(drained)
    }

    async fn reset(&mut self, reason: String) -> Flow {
        info!("stream interrupted ({}), resetting session", reason);
        self.set_state(ProcessorState::Initializing { reset: true });

        self.session.sequencer.resolve_all(ResultStatus::Abandoned);
        self.release();
        let aborted = self.session.abort_all();
        let mut frames_discarded = self.buffer.reset();

        match self.stop_source().await {
            Ok(stale) => {
                frames_discarded += stale
                    .iter()
                    .filter(|event| matches!(event, SourceEvent::Frame(_)))
                    .count();
            }
            Err(e) => return self.fail(e).await,
        }

        let session = self.session.renew();
        self.metrics.record_reset();
        self.report.resets += 1;
        debug!(
            "aborted {} requests, discarded {} frames",
            aborted, frames_discarded
        );
        self.emit(PipelineEvent::StreamReset {
            session,
            reason,
            frames_discarded,
        });

        if let Err(e) = self.source.on_stream_reset().await {
            return self.fail(e).await;
        }
        if let Err(e) = self.source.start(self.events_tx.clone()).await {
            return self.fail(e).await;
        }

        self.set_state(ProcessorState::Running {
            start_time: Some(std::time::Instant::now()),
            session,
        });
        info!("session {} running after reset", session);
        Flow::Continue
    }

    async fn fail(&mut self, err: PipelineError) -> Flow {
        error!("session {} failed: {}", self.session.epoch(), err);
        if let Err(e) = self.stop_source().await {
            warn!("source did not stop cleanly: {}", e);
        }

        self.session.sequencer.resolve_all(ResultStatus::Abandoned);
        self.release();
        self.session.abort_all();

        let error_msg = err.to_string();
        self.emit(PipelineEvent::Failed(err));
        self.set_state(ProcessorState::Failed { error_msg });
        Flow::Exit
    }

    /// Graceful stop: drain capture, flush the partial window, then wait for
    /// in-flight requests up to the drain grace period
    async fn shutdown(&mut self) {
        self.set_state(ProcessorState::Stopping);
        self.draining = true;

        match self.stop_source().await {
            Ok(events) => {
                for event in events {
                    self.absorb(event);
                }
            }
            Err(e) => warn!("source did not stop cleanly: {}", e),
        }

        if let Some(window) = self.buffer.flush() {
            info!(
                "flushing partial window {} ({} frames)",
                window.id(),
                window.len()
            );
            self.metrics.record_window_sealed();
            self.report.partial_flushed = true;
            self.dispatch(window);
        }

        let grace = Instant::now() + self.config.drain_grace();
        loop {
            self.release();
            if self.session.in_flight() == 0 {
                break;
            }
            let wake = self
                .session
                .sequencer
                .next_deadline()
                .map_or(grace, |deadline| deadline.min(grace));

            tokio::select! {
                Some(outcome) = self.completions_rx.recv() => {
                    self.on_completion(outcome).await;
                }
                _ = sleep_until(wake) => {
                    if Instant::now() >= grace {
                        break;
                    }
                    self.on_deadline();
                }
            }
        }

        for id in self.session.sequencer.resolve_all(ResultStatus::TimedOut) {
            warn!("window {} still pending at shutdown", id);
            self.metrics.record_timeout();
        }
        self.session.abort_all();
        self.release();
    }
}
