pub mod buffer;
pub mod config;

pub use buffer::WindowBuffer;
pub use config::{WindowConfig, WindowLength};
