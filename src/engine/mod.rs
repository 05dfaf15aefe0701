pub mod config;
mod driver;
pub mod events;
pub mod processor;
pub mod sequencer;
mod session;
pub mod state;

pub use config::ProcessorConfig;
pub use events::{PipelineEvent, StopReport};
pub use processor::StreamProcessor;
pub use sequencer::ResultSequencer;
pub use state::ProcessorState;
