//! Clients for the external services the pipeline depends on.

use std::time::Duration;

use url::Url;

use crate::error::{PipelineError, Stage};

pub mod deepseek;
pub mod rembg;
pub mod replicate;

pub use deepseek::{TextGenerationClient, TextGenerationError};
pub use rembg::BackgroundRemover;
pub use replicate::ImageGenerationClient;

/// Builds a reqwest client whose every request is bounded by `timeout`.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, PipelineError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| PipelineError::Internal(format!("Failed to create HTTP client: {err}")))
}

/// Appends `path` to `base`, keeping any path prefix `base` already has.
pub(crate) fn endpoint(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

/// Maps a transport failure to a timeout for `stage`, or to `other` for anything else.
pub(crate) fn transport_error(
    err: &reqwest::Error,
    stage: Stage,
    other: fn(String) -> PipelineError,
) -> PipelineError {
    if err.is_timeout() {
        PipelineError::Timeout(stage)
    } else {
        other(err.to_string())
    }
}

/// Trims an upstream error body so it fits in a log line.
pub(crate) fn snippet(body: &[u8]) -> String {
    const MAX: usize = 200;
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    match text.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
