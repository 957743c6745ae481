//! CLI parser
use clap::{Args, Parser};
use std::num::{NonZeroU16, NonZeroU32, NonZeroUsize};

use crate::constants::{DEFAULT_AI_FALLBACK_PROMPT, DEFAULT_AI_SYSTEM_PROMPT};

#[derive(Args, Clone, Debug)]
/// Options for the external services the pipeline talks to
pub struct UpstreamOptions {
    #[clap(long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
    /// Text generation API key. Without it every prompt comes from the fallback template.
    /// Env: DEEPSEEK_API_KEY
    pub deepseek_api_key: Option<String>,

    #[clap(long, default_value = "https://api.deepseek.com/v1", env = "DEEPSEEK_BASE_URL")]
    /// Base URL of the OpenAI-compatible text generation API.
    /// Env: DEEPSEEK_BASE_URL
    pub deepseek_base_url: String,

    #[clap(long, default_value = "deepseek-chat", env = "DEEPSEEK_MODEL")]
    /// Chat model used to write image prompts. Env: DEEPSEEK_MODEL
    pub deepseek_model: String,

    #[clap(long, default_value = DEFAULT_AI_SYSTEM_PROMPT, env = "AI_SYSTEM_PROMPT")]
    /// System instruction for prompt writing. Env: AI_SYSTEM_PROMPT
    pub ai_system_prompt: String,

    #[clap(long, default_value = DEFAULT_AI_FALLBACK_PROMPT, env = "AI_FALLBACK_PROMPT")]
    /// Prompt template used when text generation is unavailable, `{product_name}` is
    /// replaced with the item name. Env: AI_FALLBACK_PROMPT
    pub ai_fallback_prompt: String,

    #[clap(long, env = "REPLICATE_API_TOKEN", hide_env_values = true)]
    /// Image generation API token. Env: REPLICATE_API_TOKEN
    pub replicate_api_token: Option<String>,

    #[clap(long, default_value = "https://api.replicate.com", env = "REPLICATE_BASE_URL")]
    /// Base URL of the image generation API. Env: REPLICATE_BASE_URL
    pub replicate_base_url: String,

    #[clap(long, default_value = "google/nano-banana", env = "REPLICATE_MODEL")]
    /// `owner/name` of the image model. Env: REPLICATE_MODEL
    pub replicate_model: String,

    #[clap(long, default_value = "http://127.0.0.1:7000", env = "REMBG_URL")]
    /// Base URL of the rembg background removal server. Env: REMBG_URL
    pub rembg_url: String,

    #[clap(long, default_value = "u2net", env = "REMBG_MODEL")]
    /// Segmentation model name passed to rembg. Env: REMBG_MODEL
    pub rembg_model: String,

    #[clap(long, default_value = "20", env = "MENUSHOT_TEXT_TIMEOUT")]
    /// Seconds to wait for prompt text. Env: MENUSHOT_TEXT_TIMEOUT
    pub text_timeout_secs: NonZeroU32,

    #[clap(long, default_value = "120", env = "MENUSHOT_GENERATION_TIMEOUT")]
    /// Seconds to wait for an image prediction, polling included.
    /// Env: MENUSHOT_GENERATION_TIMEOUT
    pub generation_timeout_secs: NonZeroU32,

    #[clap(long, default_value = "30", env = "MENUSHOT_FETCH_TIMEOUT")]
    /// Seconds to wait for the generated image download. Env: MENUSHOT_FETCH_TIMEOUT
    pub fetch_timeout_secs: NonZeroU32,

    #[clap(long, default_value = "60", env = "MENUSHOT_SEGMENTATION_TIMEOUT")]
    /// Seconds to wait for background removal. Env: MENUSHOT_SEGMENTATION_TIMEOUT
    pub segmentation_timeout_secs: NonZeroU32,
}

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "MENUSHOT_DEBUG")]
    /// Enable debug logging. Env: MENUSHOT_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "MENUSHOT_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: MENUSHOT_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "MENUSHOT_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: MENUSHOT_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "API_SECRET_KEY", hide_env_values = true)]
    /// Shared secret callers send in the `x-access-token` header.
    /// Env: API_SECRET_KEY
    pub api_secret_key: String,

    #[clap(long, default_value = "*", env = "ALLOWED_ORIGINS")]
    /// Comma separated CORS origins, `*` for any. Env: ALLOWED_ORIGINS
    pub allowed_origins: String,

    #[clap(long, default_value = "10", env = "MENUSHOT_RATE_LIMIT")]
    /// Requests per minute allowed for each client address. Env: MENUSHOT_RATE_LIMIT
    pub rate_limit_per_minute: NonZeroU32,

    #[clap(long, default_value = "4", env = "MENUSHOT_MAX_CONCURRENT")]
    /// Pipelines allowed to run at the same time. Env: MENUSHOT_MAX_CONCURRENT
    pub max_concurrent: NonZeroUsize,

    #[command(flatten)]
    /// External service settings
    pub upstream: UpstreamOptions,
}
