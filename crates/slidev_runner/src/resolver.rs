//! Image resolution: local cache, then embedded archive, then registry.
//!
//! Each source is a [`ResolveStrategy`]. The [`ImageResolver`] walks them in
//! order; the first one that resolves wins, the first one that fails aborts the
//! whole resolution.

use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::archive::EmbeddedArchive;
use crate::engine::ContainerEngine;
use crate::error::{RunnerError, RunnerResult};
use crate::metadata::ImageReference;
use crate::progress::{Progress, ProgressEvent};

/// Where the image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    LocalCache,
    EmbeddedArchive,
    Registry,
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalCache => write!(f, "local cache"),
            Self::EmbeddedArchive => write!(f, "embedded archive"),
            Self::Registry => write!(f, "registry"),
        }
    }
}

/// Outcome of one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ImageReference),
    /// This source cannot provide the image; try the next one.
    NotApplicable,
}

/// A resolved image and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub reference: ImageReference,
    pub source: ImageSource,
    pub elapsed: Duration,
}

/// One place an image can come from.
#[async_trait]
pub trait ResolveStrategy: Send + Sync {
    fn source(&self) -> ImageSource;

    async fn attempt(
        &self,
        engine: &dyn ContainerEngine,
        target: &ImageReference,
        progress: &Progress,
    ) -> RunnerResult<Resolution>;
}

/// Use the image if it is already tagged in the local cache.
#[derive(Debug, Default)]
pub struct LocalCache;

#[async_trait]
impl ResolveStrategy for LocalCache {
    fn source(&self) -> ImageSource {
        ImageSource::LocalCache
    }

    async fn attempt(
        &self,
        engine: &dyn ContainerEngine,
        target: &ImageReference,
        progress: &Progress,
    ) -> RunnerResult<Resolution> {
        let tags = engine.list_image_tags().await?;
        debug!("{} tagged images in local cache", tags.len());

        if tags.iter().any(|tag| target.matches_tag(tag)) {
            progress.emit(ProgressEvent::ImageFound {
                reference: target.clone(),
            });
            Ok(Resolution::Resolved(target.clone()))
        } else {
            Ok(Resolution::NotApplicable)
        }
    }
}

/// Decompress and load the archive bundled into the binary.
#[derive(Debug)]
pub struct EmbeddedLoad {
    archive: EmbeddedArchive,
}

impl EmbeddedLoad {
    pub fn new(archive: EmbeddedArchive) -> Self {
        Self { archive }
    }
}

#[async_trait]
impl ResolveStrategy for EmbeddedLoad {
    fn source(&self) -> ImageSource {
        ImageSource::EmbeddedArchive
    }

    async fn attempt(
        &self,
        engine: &dyn ContainerEngine,
        target: &ImageReference,
        progress: &Progress,
    ) -> RunnerResult<Resolution> {
        if !self.archive.is_present() {
            return Ok(Resolution::NotApplicable);
        }

        progress.emit(ProgressEvent::LoadingEmbeddedImage);
        let start = Instant::now();

        let tarball = self.archive.decompress().await?;
        engine.load_image(tarball).await?;

        let elapsed = start.elapsed();
        info!("Image loaded in {:.1}s", elapsed.as_secs_f64());
        progress.emit(ProgressEvent::ImageLoaded { elapsed });

        Ok(Resolution::Resolved(target.clone()))
    }
}

/// Pull the image from its registry.
#[derive(Debug, Default)]
pub struct RegistryPull;

#[async_trait]
impl ResolveStrategy for RegistryPull {
    fn source(&self) -> ImageSource {
        ImageSource::Registry
    }

    async fn attempt(
        &self,
        engine: &dyn ContainerEngine,
        target: &ImageReference,
        progress: &Progress,
    ) -> RunnerResult<Resolution> {
        progress.emit(ProgressEvent::PullingImage {
            reference: target.clone(),
        });
        engine.pull_image(target).await?;
        progress.emit(ProgressEvent::ImagePulled {
            reference: target.clone(),
        });

        Ok(Resolution::Resolved(target.clone()))
    }
}

/// Ordered list of strategies for one target image.
pub struct ImageResolver {
    target: ImageReference,
    strategies: Vec<Box<dyn ResolveStrategy>>,
}

impl ImageResolver {
    /// A resolver with no strategies.
    pub fn new(target: ImageReference) -> Self {
        Self {
            target,
            strategies: Vec::new(),
        }
    }

    /// Local cache, then `archive`, then the registry.
    pub fn standard(target: ImageReference, archive: EmbeddedArchive) -> Self {
        Self::new(target)
            .with_strategy(LocalCache)
            .with_strategy(EmbeddedLoad::new(archive))
            .with_strategy(RegistryPull)
    }

    /// Append a strategy; it runs after the ones already added.
    pub fn with_strategy(mut self, strategy: impl ResolveStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn target(&self) -> &ImageReference {
        &self.target
    }

    /// Sources in the order they will be tried.
    pub fn sources(&self) -> Vec<ImageSource> {
        self.strategies.iter().map(|s| s.source()).collect()
    }

    pub async fn resolve(
        &self,
        engine: &dyn ContainerEngine,
        progress: &Progress,
    ) -> RunnerResult<ResolvedImage> {
        progress.emit(ProgressEvent::ResolvingImage {
            reference: self.target.clone(),
        });
        let start = Instant::now();

        for strategy in &self.strategies {
            debug!("Trying image source: {}", strategy.source());
            match strategy.attempt(engine, &self.target, progress).await? {
                Resolution::Resolved(reference) => {
                    info!("Resolved {} from {}", reference, strategy.source());
                    return Ok(ResolvedImage {
                        reference,
                        source: strategy.source(),
                        elapsed: start.elapsed(),
                    });
                }
                Resolution::NotApplicable => continue,
            }
        }

        Err(RunnerError::ImageUnavailable(self.target.to_string()))
    }
}

impl fmt::Debug for ImageResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageResolver")
            .field("target", &self.target)
            .field("sources", &self.sources())
            .finish()
    }
}
