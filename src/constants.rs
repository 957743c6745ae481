//! Shared constants for prompts, headers and upstream defaults
//!

/// Header carrying the caller's shared secret
pub const X_ACCESS_TOKEN: &str = "x-access-token";

/// Style token used when the caller does not send one
pub const DEFAULT_BACKGROUND_STYLE: &str = "transparent";

/// Style token for a natural, in-context scene
pub const STYLE_IMAGE: &str = "image";

/// Style token for a generated studio background
pub const STYLE_SOLID: &str = "solid";

/// Style instruction for [`STYLE_IMAGE`].
pub const INSTRUCTION_LIFESTYLE: &str = "natural lifestyle setting, depth of field";

/// Style instruction for [`STYLE_SOLID`].
pub const INSTRUCTION_STUDIO: &str =
    "studio lighting, solid neutral background, soft shadows, minimalist";

/// Style instruction for anything that gets its background removed.
pub const INSTRUCTION_ISOLATED: &str = "isolated on white background, top-down view, flat lighting";

/// Default system instruction sent to the text generation service.
pub const DEFAULT_AI_SYSTEM_PROMPT: &str = "You are a food photography prompt engineer. Describe the food item for an image generation model. KEYWORDS: Top-down view, Isolated on White Background, Studio Lighting, Minimalist. Output ONLY the prompt.";

/// Default prompt template used when text generation is unavailable.
pub const DEFAULT_AI_FALLBACK_PROMPT: &str =
    "Professional food photo of {product_name}, isolated on white background.";

/// Placeholder replaced with the subject name in the fallback template.
pub const PRODUCT_NAME_PLACEHOLDER: &str = "{product_name}";

/// Aspect ratio requested from the image generation service.
pub const GENERATION_ASPECT_RATIO: &str = "1:1";

/// Container requested from the image generation service.
pub const GENERATION_OUTPUT_FORMAT: &str = "jpg";

/// Content type of every encoded response.
pub const OUTPUT_CONTENT_TYPE: &str = "image/webp";

/// Delay between prediction status polls.
pub const PREDICTION_POLL_INTERVAL_MS: u64 = 1000;
