//! Export command - Render a deck to PDF.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use slidev_runner::presets::{self, ExportOptions, DEFAULT_EXPORT_TIMEOUT_MS};

use super::Context;

#[derive(Args)]
pub struct ExportArgs {
    /// Markdown file with the slides
    file: PathBuf,

    /// Export every click step as its own page
    #[arg(long)]
    with_clicks: bool,

    /// Add a table of contents to the PDF outline
    #[arg(long)]
    with_toc: bool,

    /// Rendering timeout per slide, in milliseconds
    #[arg(long, default_value_t = DEFAULT_EXPORT_TIMEOUT_MS)]
    timeout: u64,

    /// Shrink the PDF with Ghostscript afterwards
    #[arg(long)]
    compress: bool,
}

pub async fn execute(ctx: &Context, args: ExportArgs) -> Result<()> {
    let source = super::resolve_source(&args.file)?;

    let options = ExportOptions {
        with_clicks: args.with_clicks,
        with_toc: args.with_toc,
        timeout_ms: Some(args.timeout),
    };
    let prepared = presets::export(&source, &options);

    println!("📄 Exporting {} to PDF...", source.file_name());
    let outcome = ctx.run_session(&source, prepared.command).await?;
    super::require_success(&outcome, "Export")?;

    let pdf = source.dir().join(source.with_extension("pdf"));
    info!("Exported {}", pdf.display());
    println!("✅ PDF written to {}", pdf.display());

    if args.compress {
        let compress = presets::compress_pdf(&source);
        println!("🗜️  Compressing {}...", pdf.display());

        let outcome = ctx.run_session(&source, compress.command).await?;
        super::require_success(&outcome, "Compression")?;

        if let Some(output) = compress.output {
            println!("✅ Compressed PDF written to {}", source.dir().join(output).display());
        }
    }

    Ok(())
}
