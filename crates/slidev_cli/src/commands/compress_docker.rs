//! Compress-docker command - Save the image as a zstd archive.

use anyhow::Result;

use slidev_runner::archive::{compress_image, ARCHIVE_PATH};
use slidev_runner::ImageReference;

use super::Context;

pub async fn execute(ctx: &Context) -> Result<()> {
    let reference = ctx.image()?;
    compress(ctx, &reference).await
}

/// Write `reference` to `image/slidev.tar.zst` under the current directory.
pub async fn compress(ctx: &Context, reference: &ImageReference) -> Result<()> {
    let engine = ctx.engine().await?;
    let output = std::env::current_dir()?.join(ARCHIVE_PATH);

    println!("🗜️  Compressing image {}, this takes a while...", reference);
    let size = compress_image(&engine, reference, &output).await?;

    println!(
        "✅ Image has been successfully compressed: {} ({} MB uncompressed)",
        output.display(),
        size / (1024 * 1024)
    );
    Ok(())
}
