//! Render one menu item through the full pipeline and save it locally.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use menushot::cli::UpstreamOptions;
use menushot::config::{UpstreamConfig, setup_logging};
use menushot::constants::DEFAULT_BACKGROUND_STYLE;
use menushot::pipeline::{Pipeline, StyleRequest};
use std::fs;
use std::path::PathBuf;

/// Generate a menu item image without running the server.
///
/// Minimal UX:
///   render_item "Margherita Pizza" --bgstyle "#FFFFFF"
#[derive(Parser, Debug)]
#[command(name = "render_item")]
#[command(about = "Generate one menu item image with the same pipeline the API uses")]
struct Args {
    /// Item name, eg "Caesar Salad"
    subject: String,

    /// `image`, `solid`, a colour such as `#00FF00`, or `transparent`
    #[arg(long, default_value = DEFAULT_BACKGROUND_STYLE)]
    bgstyle: String,

    /// Output file, defaults to ./<item-name>.webp
    #[arg(long)]
    out: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, env = "MENUSHOT_DEBUG")]
    debug: bool,

    #[command(flatten)]
    upstream: UpstreamOptions,
}

/// Lowercase, dash separated file stem for an item name.
fn slug(subject: &str) -> String {
    let mut out = String::new();
    for c in subject.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "item".to_string()
    } else {
        trimmed.to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow!("Logging setup failed: {err}"))?;

    let output_filename = args
        .out
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}.webp", slug(&args.subject))));
    if output_filename.exists() {
        return Err(anyhow!(
            "Image already exists: {}",
            output_filename.display()
        ));
    }

    let config = UpstreamConfig::from_options(&args.upstream).context("Invalid upstream URL")?;
    let pipeline = Pipeline::new(&config)?;
    let request = StyleRequest::new(&args.subject, Some(&args.bgstyle))?;
    let output = pipeline.run(&request).await?;

    if let Some(parent) = output_filename.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&output_filename, &output.bytes)
        .with_context(|| format!("Failed to write {}", output_filename.display()))?;

    eprintln!("Saved: {}", output_filename.display());
    Ok(())
}
