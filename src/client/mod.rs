pub mod http;
pub mod request;

pub use http::{HttpClientConfig, HttpEstimationClient};
pub use request::{parse_response, EstimationRequest, FramePayload, WindowMeta};

use crate::core::EstimationResult;
use crate::error::Result;
use async_trait::async_trait;

/// Request/response seam to the estimation backend.
///
/// One attempt per call, no internal retry: resubmission is the caller's
/// decision so a window never has two requests in flight.
#[async_trait]
pub trait Estimator: Send + Sync {
    async fn estimate(&self, request: &EstimationRequest) -> Result<EstimationResult>;
}
