//! Serializes the final raster.

use image::ExtendedColorType;
use image::RgbaImage;
use image::codecs::webp::WebPEncoder;

use crate::constants::OUTPUT_CONTENT_TYPE;
use crate::error::PipelineError;

/// Encoded image bytes with their content type.
#[derive(Clone, Debug)]
pub struct EncodedOutput {
    /// Container bytes
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub content_type: &'static str,
}

/// Encodes `raster` as WebP with its alpha channel.
pub fn encode(raster: &RgbaImage) -> Result<EncodedOutput, PipelineError> {
    let mut bytes = Vec::new();
    WebPEncoder::new_lossless(&mut bytes)
        .encode(
            raster.as_raw(),
            raster.width(),
            raster.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|err| PipelineError::Encoding(err.to_string()))?;
    Ok(EncodedOutput {
        bytes,
        content_type: OUTPUT_CONTENT_TYPE,
    })
}
