//! Run command - Serve a deck with live reload.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use slidev_runner::presets;

use super::Context;

#[derive(Args)]
pub struct RunArgs {
    /// Markdown file with the slides
    file: PathBuf,
}

pub async fn execute(ctx: &Context, args: RunArgs) -> Result<()> {
    let source = super::resolve_source(&args.file)?;
    let prepared = presets::run(&source);

    println!("🎞️  Serving {} on http://localhost:3030", source.file_name());
    let outcome = ctx.run_session(&source, prepared.command).await?;
    info!("Session ended: {:?}", outcome.attach);

    Ok(())
}
