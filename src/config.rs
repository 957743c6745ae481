//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::{CliOptions, UpstreamOptions};

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// A credential that never shows up in `Debug` output.
#[derive(Clone, Eq, PartialEq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a credential.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw credential, for building requests.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Text generation (prompt writing) settings.
#[derive(Clone, Debug)]
pub struct TextGenerationConfig {
    /// `None` disables the service and always uses the fallback template
    pub api_key: Option<Secret>,
    /// OpenAI-compatible API base, eg `https://api.deepseek.com/v1`
    pub base_url: Url,
    /// Chat model name
    pub model: String,
    /// System instruction for the prompt writer
    pub system_prompt: String,
    /// Template with a `{product_name}` placeholder
    pub fallback_prompt: String,
    /// Request deadline
    pub timeout: Duration,
}

/// Image generation settings.
#[derive(Clone, Debug)]
pub struct ImageGenerationConfig {
    /// `None` makes every generation fail
    pub api_token: Option<Secret>,
    /// Predictions API base, eg `https://api.replicate.com`
    pub base_url: Url,
    /// `owner/name` of the model
    pub model: String,
    /// Deadline for the whole prediction, polling included
    pub timeout: Duration,
}

/// Background removal settings.
#[derive(Clone, Debug)]
pub struct SegmentationConfig {
    /// rembg server base URL
    pub base_url: Url,
    /// Segmentation model name
    pub model: String,
    /// Request deadline
    pub timeout: Duration,
}

/// Everything the pipeline needs to reach its external services.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    /// Prompt writer
    pub text: TextGenerationConfig,
    /// Image generator
    pub generation: ImageGenerationConfig,
    /// Deadline for downloading the generated image
    pub fetch_timeout: Duration,
    /// Background remover
    pub segmentation: SegmentationConfig,
}

impl UpstreamConfig {
    /// Builds the upstream settings from parsed CLI/env options.
    pub fn from_options(options: &UpstreamOptions) -> Result<Self, url::ParseError> {
        Ok(Self {
            text: TextGenerationConfig {
                api_key: non_empty(options.deepseek_api_key.as_deref()).map(Secret::new),
                base_url: Url::parse(&options.deepseek_base_url)?,
                model: options.deepseek_model.clone(),
                system_prompt: options.ai_system_prompt.clone(),
                fallback_prompt: options.ai_fallback_prompt.clone(),
                timeout: seconds(options.text_timeout_secs.get()),
            },
            generation: ImageGenerationConfig {
                api_token: non_empty(options.replicate_api_token.as_deref()).map(Secret::new),
                base_url: Url::parse(&options.replicate_base_url)?,
                model: options.replicate_model.clone(),
                timeout: seconds(options.generation_timeout_secs.get()),
            },
            fetch_timeout: seconds(options.fetch_timeout_secs.get()),
            segmentation: SegmentationConfig {
                base_url: Url::parse(&options.rembg_url)?,
                model: options.rembg_model.clone(),
                timeout: seconds(options.segmentation_timeout_secs.get()),
            },
        })
    }
}

/// Process-wide configuration, built once at startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Address the HTTP listener binds to
    pub listen_address: String,
    /// Port the HTTP listener binds to
    pub port: u16,
    /// Expected `x-access-token` value
    pub api_secret_key: Secret,
    /// CORS origins, empty means any
    pub allowed_origins: Vec<String>,
    /// Requests per minute per client address
    pub rate_limit_per_minute: u32,
    /// Pipelines allowed in flight at once
    pub max_concurrent: usize,
    /// External services
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    /// Builds the configuration from parsed CLI/env options.
    pub fn from_cli(cli: &CliOptions) -> Result<Self, url::ParseError> {
        Ok(Self {
            listen_address: cli.listen_address.clone(),
            port: cli.port.get(),
            api_secret_key: Secret::new(cli.api_secret_key.as_str()),
            allowed_origins: parse_origins(&cli.allowed_origins),
            rate_limit_per_minute: cli.rate_limit_per_minute.get(),
            max_concurrent: cli.max_concurrent.get(),
            upstream: UpstreamConfig::from_options(&cli.upstream)?,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn seconds(value: u32) -> Duration {
    Duration::from_secs(u64::from(value))
}

/// Splits the comma separated origin list. `*` anywhere means any origin.
fn parse_origins(raw: &str) -> Vec<String> {
    let origins: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect();
    if origins.iter().any(|origin| origin == "*") {
        return Vec::new();
    }
    origins
}
