//! Shell command - Interactive bash next to a deck.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use slidev_runner::presets;

use super::Context;

#[derive(Args)]
pub struct ShellArgs {
    /// Markdown file whose directory is mounted
    file: PathBuf,
}

pub async fn execute(ctx: &Context, args: ShellArgs) -> Result<()> {
    let source = super::resolve_source(&args.file)?;
    ctx.run_session(&source, presets::shell().command).await?;
    Ok(())
}
