//! Error handling

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde_json::json;
use tracing::{error, info};

/// The external call that ran out of time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    /// Prompt text generation
    TextGeneration,
    /// Image generation prediction
    ImageGeneration,
    /// Downloading the generated image
    ImageFetch,
    /// Background segmentation
    Segmentation,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TextGeneration => "text generation",
            Self::ImageGeneration => "image generation",
            Self::ImageFetch => "image fetch",
            Self::Segmentation => "background removal",
        };
        f.write_str(name)
    }
}

/// Failures surfaced by the generation pipeline and the HTTP layer around it.
#[derive(Debug)]
pub enum PipelineError {
    /// Caller sent an unusable request
    Validation(String),
    /// Missing or wrong access token
    Unauthorized,
    /// Per-client request budget exhausted
    RateLimited {
        /// Configured requests per minute
        per_minute: u32,
    },
    /// Image generation service unusable
    Generation(String),
    /// Generated image could not be downloaded
    Fetch(String),
    /// Downloaded bytes are not a supported image
    Decode(String),
    /// Background removal unusable
    Segmentation(String),
    /// An external call exceeded its deadline
    Timeout(Stage),
    /// Raster invariant violated while compositing
    Composition(String),
    /// Raster could not be serialized
    Encoding(String),
    /// Anything else that is our fault
    Internal(String),
}

impl PipelineError {
    /// HTTP status reported to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Generation(_) | Self::Fetch(_) | Self::Decode(_) | Self::Segmentation(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Composition(_) | Self::Encoding(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{msg}"),
            Self::Unauthorized => write!(f, "Access Denied: Invalid Key"),
            Self::RateLimited { per_minute } => {
                write!(f, "Rate limit exceeded: {per_minute} per 1 minute")
            }
            Self::Generation(msg) => write!(f, "Image generation failed: {msg}"),
            Self::Fetch(msg) => write!(f, "Failed to fetch generated image: {msg}"),
            Self::Decode(msg) => write!(f, "Failed to decode generated image: {msg}"),
            Self::Segmentation(msg) => write!(f, "Background removal failed: {msg}"),
            Self::Timeout(stage) => write!(f, "Timed out waiting for {stage}"),
            Self::Composition(msg) => write!(f, "Failed to composite image: {msg}"),
            Self::Encoding(msg) => write!(f, "Failed to encode image: {msg}"),
            Self::Internal(msg) => write!(f, "Internal server error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

impl From<axum::http::Error> for PipelineError {
    fn from(err: axum::http::Error) -> Self {
        PipelineError::Internal(err.to_string())
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        match &self {
            PipelineError::Validation(_)
            | PipelineError::Unauthorized
            | PipelineError::RateLimited { .. } => info!("Rejected request: {}", self),
            _ => error!("Request failed: {}", self),
        }
        let body = json!({
            "status": status.as_u16(),
            "detail": self.to_string(),
        });
        (status, Json(body)).into_response()
    }
}
