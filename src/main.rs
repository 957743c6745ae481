use clap::Parser;
use menushot::config::{AppConfig, setup_logging};
use tracing::error;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = menushot::cli::CliOptions::parse();

    if let Err(err) = setup_logging(cli.debug) {
        eprintln!("Logging setup failed: {}", err);
        return;
    }

    let config = match AppConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            error!("Invalid upstream URL: {}", err);
            return;
        }
    };
    if config.upstream.text.api_key.is_none() {
        tracing::warn!("DEEPSEEK_API_KEY not set, prompts will use the fallback template");
    }
    if config.upstream.generation.api_token.is_none() {
        tracing::warn!("REPLICATE_API_TOKEN not set, every generation request will fail");
    }

    if let Err(err) = menushot::web::setup_server(config).await {
        error!("Application error: {}", err);
    }
}
