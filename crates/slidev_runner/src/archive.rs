//! The zstd-compressed image archive bundled into release binaries.
//!
//! `build.rs` embeds `image/slidev.tar.zst` when it exists at build time and an
//! empty payload otherwise, so presence is a runtime check on the length.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use bytes::Bytes;
use tracing::info;

use crate::engine::ContainerEngine;
use crate::error::{RunnerError, RunnerResult};
use crate::metadata::ImageReference;

static EMBEDDED_IMAGE: &[u8] = include_bytes!(env!("SLIDEV_IMAGE_ARCHIVE"));

/// Where `compress-docker` writes the archive, relative to the workspace root.
pub const ARCHIVE_PATH: &str = "image/slidev.tar.zst";

/// zstd level used for release archives.
pub const COMPRESSION_LEVEL: i32 = 19;

/// A possibly-empty compressed `docker save` tarball.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedArchive {
    data: Bytes,
}

impl EmbeddedArchive {
    /// The archive compiled into this binary (may be empty).
    pub fn bundled() -> Self {
        Self {
            data: Bytes::from_static(EMBEDDED_IMAGE),
        }
    }

    /// An archive from arbitrary compressed bytes.
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// No archive at all.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        !self.data.is_empty()
    }

    /// Decompress into a loadable tarball on the blocking pool.
    pub async fn decompress(&self) -> RunnerResult<Bytes> {
        let data = self.data.clone();
        let tarball = tokio::task::spawn_blocking(move || zstd::stream::decode_all(&data[..]))
            .await
            .map_err(|e| RunnerError::ImageLoadFailed(format!("decompression task failed: {}", e)))?
            .map_err(|e| RunnerError::ImageLoadFailed(format!("corrupt image archive: {}", e)))?;

        Ok(Bytes::from(tarball))
    }
}

/// Save `reference` through the engine and write it zstd-compressed to `output`.
///
/// Returns the uncompressed tarball size.
pub async fn compress_image(
    engine: &dyn ContainerEngine,
    reference: &ImageReference,
    output: &Path,
) -> RunnerResult<u64> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    info!("Compressing image {} into {}", reference, output.display());

    let file = File::create(output)?;
    let mut encoder = zstd::stream::write::Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)
        .map_err(|e| RunnerError::CompressFailed(e.to_string()))?;

    let written = engine.save_image(reference, &mut encoder).await?;

    let mut writer = encoder
        .finish()
        .map_err(|e| RunnerError::CompressFailed(e.to_string()))?;
    std::io::Write::flush(&mut writer)?;

    info!("Image has been successfully compressed: {}", output.display());
    Ok(written)
}
