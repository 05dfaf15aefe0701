use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Pixel layout of a decoded frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
    Gray8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgb8 => 3,
            Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Rgb8 => "rgb8",
            Self::Rgba8 => "rgba8",
            Self::Gray8 => "gray8",
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Rgb8
    }
}

/// One decoded image sample. Pixel data sits behind an `Arc` so a frame carried
/// over into the next window shares its bytes instead of copying them.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Capture timestamp in microseconds, monotonic within a source run
    pub timestamp_us: u64,

    /// Source-relative sequence index
    pub sequence: u64,

    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Arc<Vec<u8>>,
}

impl Frame {
    pub fn new(
        timestamp_us: u64,
        sequence: u64,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        Self {
            timestamp_us,
            sequence,
            width,
            height,
            format,
            data: Arc::new(data),
        }
    }

    /// Byte length a frame of this geometry must have
    pub fn expected_len(width: u32, height: u32, format: PixelFormat) -> usize {
        width as usize * height as usize * format.bytes_per_pixel()
    }
}
