//! Downloads the generated image and decodes it to RGBA.

use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use image::RgbaImage;
use tracing::debug;
use url::Url;

use crate::error::{PipelineError, Stage};
use crate::upstream::{http_client, snippet, transport_error};

/// Fetches generated images over HTTP(S), or inline from `data:` URLs.
#[derive(Clone, Debug)]
pub struct ImageAcquirer {
    client: reqwest::Client,
}

impl ImageAcquirer {
    /// Creates an acquirer whose downloads are bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        Ok(Self {
            client: http_client(timeout)?,
        })
    }

    /// Retrieves and decodes the image at `image_url`.
    pub async fn acquire(&self, image_url: &str) -> Result<RgbaImage, PipelineError> {
        let bytes = if let Some(inline) = image_url.strip_prefix("data:") {
            decode_data_url(inline)?
        } else {
            self.download(image_url).await?
        };
        decode_raster(&bytes)
    }

    async fn download(&self, image_url: &str) -> Result<Vec<u8>, PipelineError> {
        let url = Url::parse(image_url)
            .map_err(|err| PipelineError::Fetch(format!("invalid image URL {image_url:?}: {err}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(PipelineError::Fetch(format!(
                "unsupported URL scheme {:?}",
                url.scheme()
            )));
        }

        debug!("Downloading generated image from {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| transport_error(&err, Stage::ImageFetch, PipelineError::Fetch))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(&err, Stage::ImageFetch, PipelineError::Fetch))?;
        if !status.is_success() {
            return Err(PipelineError::Fetch(format!(
                "download returned {status}: {}",
                snippet(&bytes)
            )));
        }
        Ok(bytes.to_vec())
    }
}

/// Decodes the payload of a base64 `data:` URL (everything after `data:`).
fn decode_data_url(inline: &str) -> Result<Vec<u8>, PipelineError> {
    let Some((meta, payload)) = inline.split_once(',') else {
        return Err(PipelineError::Fetch("data URL has no payload".to_string()));
    };
    if !meta.ends_with(";base64") {
        return Err(PipelineError::Fetch(
            "only base64 data URLs are supported".to_string(),
        ));
    }
    general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|err| PipelineError::Decode(format!("bad base64 payload: {err}")))
}

/// Decodes any supported container to straight-alpha RGBA. Sources without
/// alpha come out fully opaque.
pub fn decode_raster(bytes: &[u8]) -> Result<RgbaImage, PipelineError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|err| PipelineError::Decode(err.to_string()))?;
    if reader.format().is_none() {
        return Err(PipelineError::Decode(
            "unrecognised image format".to_string(),
        ));
    }
    let raster = reader.decode()?.to_rgba8();
    if raster.width() == 0 || raster.height() == 0 {
        return Err(PipelineError::Decode("image has no pixels".to_string()));
    }
    Ok(raster)
}
