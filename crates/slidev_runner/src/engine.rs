//! Container engine trait.

use std::io::Write;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::ContainerSpec;
use crate::error::RunnerResult;
use crate::metadata::ImageReference;

/// The subset of the container engine API a session needs.
///
/// Every method maps to one engine request (or one streamed request); none of
/// them retry.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Check that the engine answers.
    async fn ping(&self) -> RunnerResult<()>;

    /// Repo tags of every image in the local cache.
    async fn list_image_tags(&self) -> RunnerResult<Vec<String>>;

    /// Load a `docker save` tarball (uncompressed) into the local cache.
    async fn load_image(&self, archive: Bytes) -> RunnerResult<()>;

    /// Pull an image from its registry, draining the progress stream.
    async fn pull_image(&self, reference: &ImageReference) -> RunnerResult<()>;

    /// Stream a `docker save` tarball of `reference` into `sink`.
    ///
    /// Returns the number of bytes written.
    async fn save_image(
        &self,
        reference: &ImageReference,
        sink: &mut (dyn Write + Send),
    ) -> RunnerResult<u64>;

    /// Force-remove the container with this name or id.
    ///
    /// Returns `false` when no such container exists.
    async fn remove_container(&self, name: &str) -> RunnerResult<bool>;

    /// Create a container and return its id.
    async fn create_container(&self, spec: &ContainerSpec) -> RunnerResult<String>;

    /// Start a created container.
    async fn start_container(&self, container_id: &str) -> RunnerResult<()>;
}
