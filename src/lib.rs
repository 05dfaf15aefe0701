pub mod assets;
pub mod client;
pub mod core;
pub mod engine;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod source;
pub mod window;

pub use engine::{PipelineEvent, ProcessorConfig, ProcessorState, StopReport, StreamProcessor};
pub use error::{PipelineError, Result};
