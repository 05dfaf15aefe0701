use crate::assets::DecoderAssets;
use crate::core::{Frame, PixelFormat};
use crate::error::{PipelineError, Result};
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Stream properties reported by a decoder once opened
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub fps: f64,
    pub frame_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

/// Seam to the external video codec.
///
/// `decode_next` returns `Ok(None)` at end of stream and `DecodeError` for a
/// single bad frame; decoding continues after a `DecodeError`.
pub trait FrameDecoder: Send + 'static {
    fn open(&mut self, assets: &DecoderAssets, path: &Path) -> Result<StreamInfo>;

    fn decode_next(&mut self) -> Result<Option<DecodedImage>>;

    fn rewind(&mut self) -> Result<()>;
}

/// Decoder for headerless raw frame dumps of fixed geometry
pub struct RawVideoDecoder {
    width: u32,
    height: u32,
    format: PixelFormat,
    fps: f64,
    reader: Option<BufReader<File>>,
}

impl RawVideoDecoder {
    pub fn new(width: u32, height: u32, format: PixelFormat, fps: f64) -> Self {
        Self {
            width,
            height,
            format,
            fps,
            reader: None,
        }
    }

    fn frame_len(&self) -> usize {
        Frame::expected_len(self.width, self.height, self.format)
    }
}

fn open_error(path: &Path, e: io::Error) -> PipelineError {
    PipelineError::ResourceUnavailable(format!("{}: {}", path.display(), e))
}

impl FrameDecoder for RawVideoDecoder {
    fn open(&mut self, _assets: &DecoderAssets, path: &Path) -> Result<StreamInfo> {
        if self.frame_len() == 0 || self.fps <= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "raw video needs non-empty geometry and a positive fps".to_string(),
            ));
        }

        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let len = file.metadata().map_err(|e| open_error(path, e))?.len();
        self.reader = Some(BufReader::new(file));

        // A truncated tail still counts: it surfaces as one decode error
        let frame_len = self.frame_len() as u64;
        let frame_count = (len + frame_len - 1) / frame_len;
        debug!("opened raw video {} ({} frames)", path.display(), frame_count);

        Ok(StreamInfo {
            width: self.width,
            height: self.height,
            format: self.format,
            fps: self.fps,
            frame_count: Some(frame_count),
        })
    }

    fn decode_next(&mut self) -> Result<Option<DecodedImage>> {
        let frame_len = self.frame_len();
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| PipelineError::ResourceUnavailable("decoder not opened".to_string()))?;

        let mut data = vec![0u8; frame_len];
        let mut filled = 0;
        while filled < frame_len {
            let n = reader
                .read(&mut data[filled..])
                .map_err(|e| PipelineError::DecodeError(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        match filled {
            0 => Ok(None),
            n if n < frame_len => Err(PipelineError::DecodeError(format!(
                "truncated frame: {} of {} bytes",
                n, frame_len
            ))),
            _ => Ok(Some(DecodedImage {
                width: self.width,
                height: self.height,
                format: self.format,
                data,
            })),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| PipelineError::ResourceUnavailable("decoder not opened".to_string()))?;
        reader
            .seek(SeekFrom::Start(0))
            .map_err(|e| PipelineError::ResourceUnavailable(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{AssetResolver, BuildMode};
    use std::io::Write;

    fn assets() -> DecoderAssets {
        AssetResolver::with_placeholders("", "")
            .resolve(BuildMode::Hosted)
            .unwrap()
    }

    #[test]
    fn test_decodes_frames_and_truncated_tail() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[1u8; 4 * 2]).unwrap();
        file.write_all(&[2u8; 3]).unwrap();
        file.flush().unwrap();

        let mut decoder = RawVideoDecoder::new(2, 2, PixelFormat::Gray8, 10.0);
        let info = decoder.open(&assets(), file.path()).unwrap();
        assert_eq!(info.frame_count, Some(3));

        assert_eq!(decoder.decode_next().unwrap().unwrap().data, vec![1u8; 4]);
        assert_eq!(decoder.decode_next().unwrap().unwrap().data, vec![1u8; 4]);
        assert!(matches!(decoder.decode_next(), Err(PipelineError::DecodeError(_))));
        assert!(decoder.decode_next().unwrap().is_none());

        decoder.rewind().unwrap();
        assert!(decoder.decode_next().unwrap().is_some());
    }

    #[test]
    fn test_missing_file_is_unavailable() {
        let mut decoder = RawVideoDecoder::new(2, 2, PixelFormat::Gray8, 10.0);
        let err = decoder
            .open(&assets(), Path::new("/nonexistent/clip.raw"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::ResourceUnavailable(_)));
    }
}
