//! Build-docker command - Build the Slidev image with the client binary.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::info;

use slidev_runner::metadata::{DOCKERFILE, PACKAGE_JSON};
use slidev_runner::CliClient;

use super::Context;

#[derive(Args)]
pub struct BuildDockerArgs {
    /// Compress the image into image/slidev.tar.zst after building
    #[arg(long)]
    compress: bool,
}

pub async fn execute(ctx: &Context, args: BuildDockerArgs) -> Result<()> {
    let reference = ctx.image()?;
    let client = CliClient::new(&ctx.client_options)?;

    let current_dir = std::env::current_dir()?;
    // Held until the build finishes; the directory is removed on drop.
    let scratch;
    let build_context: PathBuf = if current_dir.join("Dockerfile").is_file() {
        info!("Building from {}", current_dir.display());
        current_dir
    } else {
        scratch = tempfile::tempdir().context("Cannot create a build directory")?;
        write_build_context(scratch.path())?;
        info!("Building from bundled Dockerfile in {}", scratch.path().display());
        scratch.path().to_path_buf()
    };

    println!("🐳 Building image {}...", reference);
    client
        .build_image(&build_context.join("Dockerfile"), &build_context, &reference)
        .await?;
    println!("✅ Built {}", reference);

    if args.compress {
        super::compress_docker::compress(ctx, &reference).await?;
    }
    Ok(())
}

/// Materialize the bundled Dockerfile and package.json into `dir`.
fn write_build_context(dir: &Path) -> Result<()> {
    std::fs::write(dir.join("Dockerfile"), DOCKERFILE)
        .with_context(|| format!("Cannot write Dockerfile into {}", dir.display()))?;
    std::fs::write(dir.join("package.json"), PACKAGE_JSON)
        .with_context(|| format!("Cannot write package.json into {}", dir.display()))?;
    Ok(())
}
