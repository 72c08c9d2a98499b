//! User-facing progress events emitted while a session runs.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::metadata::{ImageReference, IMAGE_NAME};

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    ResolvingImage { reference: ImageReference },
    ImageFound { reference: ImageReference },
    LoadingEmbeddedImage,
    ImageLoaded { elapsed: Duration },
    PullingImage { reference: ImageReference },
    ImagePulled { reference: ImageReference },
    TempFileCreated { path: PathBuf },
    TempFileRemoved { path: PathBuf },
    RemovingContainer { name: String },
    CreatingContainer { name: String, command: Vec<String> },
    Attaching { container_id: String },
    Interrupted,
    ImageRetained,
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolvingImage { reference } => {
                write!(f, "Loading container image {}...", reference)
            }
            Self::ImageFound { reference } => write!(f, "Using local image {}", reference),
            Self::LoadingEmbeddedImage => write!(
                f,
                "Image not found, loading it from the embedded archive, will take at least 30s ..."
            ),
            Self::ImageLoaded { elapsed } => {
                write!(f, "Image loaded in {:.1} seconds", elapsed.as_secs_f64())
            }
            Self::PullingImage { reference } => write!(
                f,
                "Image {} not found locally. Attempting to pull from registry...",
                reference
            ),
            Self::ImagePulled { reference } => {
                write!(f, "Image {} pulled successfully from registry.", reference)
            }
            Self::TempFileCreated { path } => {
                write!(f, "Temporary {} created.", display_name(path))
            }
            Self::TempFileRemoved { path } => {
                write!(f, "Removed temporary {}", display_name(path))
            }
            Self::RemovingContainer { name } => write!(f, "Removing the container {}", name),
            Self::CreatingContainer { name, command } => {
                write!(f, "Creating the container {} with command: {}", name, command.join(" "))
            }
            Self::Attaching { container_id } => {
                write!(f, "Attaching to {}", short_id(container_id))
            }
            Self::Interrupted => write!(f, "Interrupted, cleaning up..."),
            Self::ImageRetained => write!(
                f,
                "Exiting: please note that the docker image will not be removed, \
                 remove it manually with docker rmi {} if space is an issue.",
                IMAGE_NAME
            ),
        }
    }
}

fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

/// Progress callback type.
pub type ProgressHandler = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Cloneable sink for progress events. Silent when no handler is set.
#[derive(Clone, Default)]
pub struct Progress {
    handler: Option<ProgressHandler>,
}

impl Progress {
    pub fn new(handler: ProgressHandler) -> Self {
        Self {
            handler: Some(handler),
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(handler) = &self.handler {
            handler(&event);
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("handler", &self.handler.is_some())
            .finish()
    }
}
