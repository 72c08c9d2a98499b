//! Spa command - Build a deck as a static single-page app.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use slidev_runner::presets::{self, SpaOptions};

use super::Context;

#[derive(Args)]
pub struct SpaArgs {
    /// Markdown file with the slides
    file: PathBuf,

    /// Export every click step
    #[arg(long)]
    with_clicks: bool,

    /// Add a table of contents
    #[arg(long)]
    with_toc: bool,

    /// Offer a PDF download in the built app
    #[arg(long)]
    download: bool,

    /// Public base path, beginning and ending with a slash
    #[arg(long, default_value = "/")]
    base: String,
}

pub async fn execute(ctx: &Context, args: SpaArgs) -> Result<()> {
    let source = super::resolve_source(&args.file)?;

    let options = SpaOptions {
        with_clicks: args.with_clicks,
        with_toc: args.with_toc,
        download: args.download,
        base: args.base,
    };
    // Flag errors surface before any engine call.
    let prepared = presets::spa(&source, &options)?;

    println!("🏗️  Building {} as a single-page app...", source.file_name());
    let outcome = ctx.run_session(&source, prepared.command).await?;
    super::require_success(&outcome, "Build")?;

    if let Some(output) = prepared.output {
        println!("✅ App written to {}", source.dir().join(output).display());
    }
    Ok(())
}
