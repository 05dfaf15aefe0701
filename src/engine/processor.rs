use super::config::ProcessorConfig;
use super::driver::{Control, DriverExit, DriverParts, SessionDriver};
use super::events::{PipelineEvent, StopReport};
use super::state::ProcessorState;
use crate::assets::AssetResolver;
use crate::client::Estimator;
use crate::error::{PipelineError, Result};
use crate::observability::{PipelineMetrics, PipelineMonitor};
use crate::source::FrameSource;
use crate::window::WindowBuffer;
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

struct RunningDriver {
    control_tx: mpsc::Sender<Control>,
    handle: JoinHandle<DriverExit>,
}

/// Orchestrates source → window buffer → estimator → ordered results.
///
/// The processor itself only holds the lifecycle. While running, the source
/// and all session state live in a driver task; they come back when the
/// driver exits.
pub struct StreamProcessor {
    config: ProcessorConfig,
    resolver: AssetResolver,
    source: Option<Box<dyn FrameSource>>,
    estimator: Arc<dyn Estimator>,
    state: Arc<watch::Sender<ProcessorState>>,
    output_tx: mpsc::UnboundedSender<PipelineEvent>,
    output_rx: Option<mpsc::UnboundedReceiver<PipelineEvent>>,
    metrics: Arc<PipelineMetrics>,
    driver: Option<RunningDriver>,
    /// Last session id handed out; session ids never repeat
    epoch: u64,
    last_report: StopReport,
}

impl StreamProcessor {
    pub fn new(
        config: ProcessorConfig,
        source: Box<dyn FrameSource>,
        estimator: Arc<dyn Estimator>,
    ) -> Result<Self> {
        config.validate()?;
        let (state, _) = watch::channel(ProcessorState::Idle);
        let (output_tx, output_rx) = mpsc::unbounded_channel();

        Ok(Self {
            config,
            resolver: AssetResolver::from_build(),
            source: Some(source),
            estimator,
            state: Arc::new(state),
            output_tx,
            output_rx: Some(output_rx),
            metrics: Arc::new(PipelineMetrics::new()),
            driver: None,
            epoch: 0,
            last_report: StopReport::default(),
        })
    }

    /// Replace the asset resolver baked in at build time
    pub fn with_resolver(mut self, resolver: AssetResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn state(&self) -> ProcessorState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ProcessorState> {
        self.state.subscribe()
    }

    /// The consumer end of the result stream. It spans every session of
    /// this processor and can be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<PipelineEvent>> {
        self.output_rx.take()
    }

    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    pub fn monitor(&self) -> PipelineMonitor {
        PipelineMonitor::new(self.metrics.clone())
    }

    /// Resolve decoder assets and prepare the source
    pub async fn init(&mut self) -> Result<()> {
        self.reclaim().await?;

        let next = ProcessorState::Initializing { reset: false };
        self.transition(next)?;

        let assets = match self.resolver.resolve(self.config.build_mode) {
            Ok(assets) => assets,
            Err(e) => return Err(self.enter_failed(e)),
        };

        let Some(source) = self.source.as_mut() else {
            return Err(self.enter_failed(PipelineError::ResourceUnavailable(
                "frame source was lost".to_string(),
            )));
        };
        if let Err(e) = source.init(&assets).await {
            return Err(self.enter_failed(e));
        }

        info!("processor initialized ({:?} assets)", self.config.build_mode);
        Ok(())
    }

    /// Start capturing. Runs `init` first when idle.
    pub async fn start(&mut self) -> Result<()> {
        self.reclaim().await?;
        if self.state() == ProcessorState::Idle {
            self.init().await?;
        }

        let current = self.state();
        if !matches!(current, ProcessorState::Initializing { .. }) {
            return Err(PipelineError::InvalidState {
                from: current.name().to_string(),
                to: "Running".to_string(),
            });
        }

        let buffer = WindowBuffer::new(self.config.window)?;
        let mut source = self.source.take().ok_or_else(|| {
            PipelineError::ResourceUnavailable("frame source was lost".to_string())
        })?;

        let (events_tx, events_rx) = mpsc::channel(self.config.channel_capacity);
        if let Err(e) = source.start(events_tx.clone()).await {
            self.source = Some(source);
            return Err(self.enter_failed(e));
        }

        self.epoch += 1;
        let (control_tx, control_rx) = mpsc::channel(1);
        let driver = SessionDriver::new(DriverParts {
            config: self.config.clone(),
            source,
            buffer,
            estimator: self.estimator.clone(),
            epoch: self.epoch,
            events_tx,
            events_rx,
            control_rx,
            output: self.output_tx.clone(),
            state: self.state.clone(),
            metrics: self.metrics.clone(),
        });

        self.transition(ProcessorState::Running {
            start_time: Some(Instant::now()),
            session: self.epoch,
        })?;
        let handle = tokio::spawn(driver.run());
        self.driver = Some(RunningDriver { control_tx, handle });
        Ok(())
    }

    /// Stop from any state. A running session is drained first: queued frames
    /// are windowed, the partial window is dispatched and in-flight requests
    /// get the drain grace period.
    pub async fn stop(&mut self) -> Result<StopReport> {
        let Some(driver) = self.driver.take() else {
            if matches!(self.state(), ProcessorState::Initializing { .. }) {
                if let Some(source) = self.source.as_mut() {
                    source.stop().await?;
                }
                self.transition(ProcessorState::Idle)?;
            }
            return Ok(self.last_report.clone());
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let reply = match driver.control_tx.send(Control::Stop(reply_tx)).await {
            Ok(()) => reply_rx.await.ok(),
            // Driver already finished on its own
            Err(_) => None,
        };

        let exit_report = self.await_driver(driver.handle).await?;
        self.last_report = reply.unwrap_or(exit_report);
        info!("processor stopped in state {}", self.state().name());
        Ok(self.last_report.clone())
    }

    /// Wait for a session that ends by itself, e.g. a file played to the end
    pub async fn join(&mut self) -> Result<StopReport> {
        match self.driver.take() {
            Some(driver) => self.await_driver(driver.handle).await,
            None => Ok(self.last_report.clone()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.driver
            .as_ref()
            .map_or(false, |driver| !driver.handle.is_finished())
    }

    async fn await_driver(&mut self, handle: JoinHandle<DriverExit>) -> Result<StopReport> {
        match handle.await {
            Ok(exit) => {
                self.source = Some(exit.source);
                self.epoch = self.epoch.max(exit.epoch);
                self.last_report = exit.report;
                Ok(self.last_report.clone())
            }
            Err(e) => {
                let err = PipelineError::ResourceUnavailable(format!("session driver lost: {}", e));
                error!("{}", err);
                self.state.send_replace(ProcessorState::Failed {
                    error_msg: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Take back the source from a driver that exited or is exiting
    async fn reclaim(&mut self) -> Result<()> {
        let settled = !self.state().is_active();
        let finished = self
            .driver
            .as_ref()
            .map_or(false, |driver| settled || driver.handle.is_finished());
        if finished {
            if let Some(driver) = self.driver.take() {
                self.await_driver(driver.handle).await?;
            }
        }
        Ok(())
    }

    fn transition(&self, next: ProcessorState) -> Result<()> {
        let current = self.state();
        if !current.can_transition_to(&next) {
            return Err(PipelineError::InvalidState {
                from: current.name().to_string(),
                to: next.name().to_string(),
            });
        }
        self.state.send_replace(next);
        Ok(())
    }

    fn enter_failed(&self, err: PipelineError) -> PipelineError {
        warn!("processor failed: {}", err);
        self.state.send_replace(ProcessorState::Failed {
            error_msg: err.to_string(),
        });
        err
    }
}
