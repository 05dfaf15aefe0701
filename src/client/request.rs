use crate::core::{EstimationResult, VitalSeries, Window, WindowId};
use crate::error::{PipelineError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowMeta {
    pub id: u64,
    pub start_timestamp_us: u64,
    pub end_timestamp_us: u64,
    pub frame_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    pub sequence: u64,
    pub timestamp_us: u64,
    pub width: u32,
    pub height: u32,
    pub format: String,
    /// Base64 pixel bytes
    pub data: String,
}

/// Wire body of `POST <endpoint>`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationRequest {
    pub window: WindowMeta,
    pub frames: Vec<FramePayload>,
}

impl EstimationRequest {
    pub fn from_window(window: &Window) -> Self {
        let frames = window
            .frames()
            .iter()
            .map(|frame| FramePayload {
                sequence: frame.sequence,
                timestamp_us: frame.timestamp_us,
                width: frame.width,
                height: frame.height,
                format: frame.format.name().to_string(),
                data: STANDARD.encode(frame.data.as_slice()),
            })
            .collect();

        Self {
            window: WindowMeta {
                id: window.id().value(),
                start_timestamp_us: window.start_timestamp_us(),
                end_timestamp_us: window.end_timestamp_us(),
                frame_count: window.len(),
            },
            frames,
        }
    }

    pub fn window_id(&self) -> WindowId {
        WindowId(self.window.id)
    }

    pub fn timestamps_us(&self) -> Vec<u64> {
        self.frames.iter().map(|f| f.timestamp_us).collect()
    }
}

#[derive(Deserialize)]
struct VitalsResponse {
    vitals: BTreeMap<String, ChannelPayload>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ChannelPayload {
    Scalar(f64),
    Values(Vec<f64>),
    Series {
        values: Vec<f64>,
        #[serde(default)]
        timestamps: Option<Vec<u64>>,
    },
}

/// Decode a backend body and align each channel to the request's timeline.
///
/// A channel with one value per frame takes the frame timestamps. Any other
/// length is spread evenly over the window; a single value sits at the
/// window midpoint. Explicit timestamps are kept as sent.
pub fn parse_response(request: &EstimationRequest, body: &[u8]) -> Result<EstimationResult> {
    let response: VitalsResponse = serde_json::from_slice(body)
        .map_err(|e| PipelineError::InvalidResponse(e.to_string()))?;

    let frame_timestamps = request.timestamps_us();
    let start = request.window.start_timestamp_us;
    let end = request.window.end_timestamp_us;

    let mut vitals = BTreeMap::new();
    for (name, payload) in response.vitals {
        let (values, timestamps) = match payload {
            ChannelPayload::Scalar(value) => (vec![value], None),
            ChannelPayload::Values(values) => (values, None),
            ChannelPayload::Series { values, timestamps } => (values, timestamps),
        };

        let timestamps_us = match timestamps {
            Some(ts) if ts.len() == values.len() => ts,
            Some(ts) => {
                return Err(PipelineError::InvalidResponse(format!(
                    "channel {}: {} timestamps for {} values",
                    name,
                    ts.len(),
                    values.len()
                )))
            }
            None if values.len() == frame_timestamps.len() => frame_timestamps.clone(),
            None => spread(start, end, values.len()),
        };

        vitals.insert(name, VitalSeries { timestamps_us, values });
    }

    Ok(EstimationResult {
        window_id: request.window_id(),
        vitals,
    })
}

fn spread(start: u64, end: u64, count: usize) -> Vec<u64> {
    match count {
        0 => Vec::new(),
        1 => vec![start + (end - start) / 2],
        n => (0..n)
            .map(|i| start + (end - start) * i as u64 / (n as u64 - 1))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Frame, PixelFormat};

    fn request(frames: u64) -> EstimationRequest {
        let frames = (0..frames)
            .map(|i| Frame::new(1_000 + i * 100, i, 1, 1, PixelFormat::Gray8, vec![i as u8]))
            .collect();
        EstimationRequest::from_window(&Window::new(WindowId(7), frames, 0))
    }

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(request(2)).unwrap();
        assert_eq!(value["window"]["id"], 7);
        assert_eq!(value["window"]["frame_count"], 2);
        assert_eq!(value["window"]["start_timestamp_us"], 1_000);
        assert_eq!(value["frames"][1]["data"], "AQ==");
        assert_eq!(value["frames"][1]["format"], "gray8");
    }

    #[test]
    fn test_per_frame_values_take_frame_timestamps() {
        let req = request(3);
        let body = br#"{"vitals": {"heart_rate": [70.0, 71.0, 72.0]}}"#;
        let result = parse_response(&req, body).unwrap();

        assert_eq!(result.window_id, WindowId(7));
        let hr = result.channel("heart_rate").unwrap();
        assert_eq!(hr.timestamps_us, vec![1_000, 1_100, 1_200]);
        assert_eq!(hr.latest(), Some((1_200, 72.0)));
    }

    #[test]
    fn test_scalar_and_spread_values() {
        let req = request(5);
        let body = br#"{"vitals": {"spo2": 98.0, "breathing_rate": [12.0, 14.0, 16.0]}}"#;
        let result = parse_response(&req, body).unwrap();

        assert_eq!(result.channel("spo2").unwrap().timestamps_us, vec![1_200]);
        assert_eq!(
            result.channel("breathing_rate").unwrap().timestamps_us,
            vec![1_000, 1_200, 1_400]
        );
    }

    #[test]
    fn test_explicit_timestamps() {
        let req = request(2);
        let body = br#"{"vitals": {"hrv": {"values": [40.0], "timestamps": [1050]}}}"#;
        let result = parse_response(&req, body).unwrap();
        assert_eq!(result.channel("hrv").unwrap().timestamps_us, vec![1_050]);

        let bad = br#"{"vitals": {"hrv": {"values": [40.0], "timestamps": [1, 2]}}}"#;
        assert!(matches!(parse_response(&req, bad), Err(PipelineError::InvalidResponse(_))));
    }

    #[test]
    fn test_malformed_body() {
        let err = parse_response(&request(1), b"<html>").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidResponse(_)));
    }
}
