pub mod capture;
pub mod decoder;
pub mod file;
pub mod mock;
pub mod traits;
pub mod types;

pub use capture::{CaptureSlot, CaptureTask};
pub use decoder::{DecodedImage, FrameDecoder, RawVideoDecoder, StreamInfo};
pub use file::FileSource;
pub use traits::{FrameReader, FrameSource};
pub use types::{SourceEvent, SourceState};
