//! The per-request generation pipeline.
//!
//! classify → prompt → generate → fetch → \[remove background\] → composite → encode
//!
//! Each request runs the stages in order and owns its raster throughout. The
//! prompt stage absorbs its own failures; any other stage failure ends the
//! request with that error and no image.

use tracing::{debug, info};

use crate::config::UpstreamConfig;
use crate::constants::DEFAULT_BACKGROUND_STYLE;
use crate::error::PipelineError;
use crate::upstream::{BackgroundRemover, ImageGenerationClient};

pub mod acquire;
pub mod composite;
pub mod encode;
pub mod prompt;
pub mod style;

pub use acquire::ImageAcquirer;
pub use composite::composite;
pub use encode::{EncodedOutput, encode};
pub use prompt::PromptResolver;
pub use style::{BackgroundTarget, StyleDecision, classify};

/// A validated generation request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StyleRequest {
    subject_name: String,
    raw_style: String,
}

impl StyleRequest {
    /// Validates the subject name; a missing style means `transparent`.
    pub fn new(subject_name: &str, raw_style: Option<&str>) -> Result<Self, PipelineError> {
        let subject_name = subject_name.trim();
        if subject_name.is_empty() {
            return Err(PipelineError::Validation(
                "Product name missing".to_string(),
            ));
        }
        Ok(Self {
            subject_name: subject_name.to_string(),
            raw_style: raw_style.unwrap_or(DEFAULT_BACKGROUND_STYLE).to_string(),
        })
    }

    /// The item to photograph
    pub fn subject_name(&self) -> &str {
        &self.subject_name
    }

    /// The style token as the caller sent it
    pub fn raw_style(&self) -> &str {
        &self.raw_style
    }
}

/// All the stages, wired to their external services.
#[derive(Clone, Debug)]
pub struct Pipeline {
    prompts: PromptResolver,
    generator: ImageGenerationClient,
    acquirer: ImageAcquirer,
    remover: BackgroundRemover,
}

impl Pipeline {
    /// Builds the stage clients. Makes no network calls.
    pub fn new(config: &UpstreamConfig) -> Result<Self, PipelineError> {
        Ok(Self {
            prompts: PromptResolver::new(&config.text)?,
            generator: ImageGenerationClient::new(&config.generation)?,
            acquirer: ImageAcquirer::new(config.fetch_timeout)?,
            remover: BackgroundRemover::new(&config.segmentation)?,
        })
    }

    /// Runs every stage for `request` and returns the encoded image.
    pub async fn run(&self, request: &StyleRequest) -> Result<EncodedOutput, PipelineError> {
        let decision = classify(request.raw_style());

        let prompt = self
            .prompts
            .resolve(request.subject_name(), decision.style_instruction)
            .await;
        info!("Prompt: {} | Style: {}", prompt, request.raw_style());

        let image_url = self.generator.generate(&prompt).await?;
        if image_url.starts_with("data:") {
            debug!("Image generated inline");
        } else {
            debug!("Image generated at URL: {}", image_url);
        }

        let raster = self.acquirer.acquire(&image_url).await?;
        let raster = if decision.needs_background_removal() {
            self.remover.remove_background(&raster).await?
        } else {
            raster
        };
        let raster = composite(raster, decision.background_target)?;
        let output = encode(&raster)?;
        debug!(
            "Encoded {}x{} image, {} bytes",
            raster.width(),
            raster.height(),
            output.bytes.len()
        );
        Ok(output)
    }
}
