use anyhow::Context;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use vitalstream::client::{HttpClientConfig, HttpEstimationClient};
use vitalstream::core::ResultStatus;
use vitalstream::source::mock::SimulatedCamera;
use vitalstream::{PipelineEvent, ProcessorConfig, StreamProcessor};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080/v1/vitals";
const RUN_FOR: Duration = Duration::from_secs(20);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Optional JSON config: {"processor": {...}, "client": {...}, "camera": {...}}
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {}", path))?;
            serde_json::from_str::<serde_json::Value>(&text)
                .with_context(|| format!("parsing config {}", path))?
        }
        None => serde_json::json!({}),
    };

    let processor_config = ProcessorConfig::from_json(
        config.get("processor").cloned().unwrap_or_else(|| serde_json::json!({})),
    )?;
    let client_config = match config.get("client") {
        Some(client) => serde_json::from_value(client.clone())?,
        None => HttpClientConfig::new(DEFAULT_ENDPOINT),
    };
    info!("estimating against {}", client_config.endpoint);

    let mut camera = SimulatedCamera::new();
    if let Some(camera_config) = config.get("camera") {
        camera.configure(camera_config.clone())?;
    }

    let client = HttpEstimationClient::new(client_config)?;
    let mut processor = StreamProcessor::new(processor_config, Box::new(camera), Arc::new(client))?;
    let mut events = processor
        .take_events()
        .context("event stream already taken")?;

    processor.start().await?;

    let consumer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Result(result) => match &result.status {
                    ResultStatus::Estimated(estimate) => {
                        for (channel, series) in &estimate.vitals {
                            if let Some(mean) = series.mean() {
                                info!(
                                    "session {} window {}: {} = {:.1}",
                                    result.session, result.window_id, channel, mean
                                );
                            }
                        }
                    }
                    other => warn!(
                        "session {} window {}: {:?}",
                        result.session, result.window_id, other
                    ),
                },
                PipelineEvent::StreamReset { session, reason, .. } => {
                    info!("stream reset ({}), now session {}", reason, session)
                }
                PipelineEvent::Ended { reason } => info!("stream ended: {}", reason),
                PipelineEvent::Failed(e) => warn!("processor failed: {}", e),
            }
        }
    });

    tokio::time::sleep(RUN_FOR).await;
    let report = processor.stop().await?;
    info!(
        "stopped: {} windows dispatched, {} results, {} timed out",
        report.windows_dispatched, report.results_emitted, report.timed_out
    );

    println!("{}", processor.monitor().generate_report());

    drop(processor);
    let _ = consumer.await;
    Ok(())
}
