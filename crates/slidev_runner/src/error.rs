//! Error types for the runner module.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Coarse grouping of [`RunnerError`] used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Image lookup, load or pull failed. No container exists yet.
    Resolution,
    /// A workspace support file could not be written.
    Preparation,
    /// Container creation or start failed.
    Lifecycle,
    /// The interactive client binary is missing or failed.
    Attach,
    /// Bad input from the user (source path, flags).
    Usage,
    /// The embedded package metadata is unusable.
    Metadata,
    /// Image build or compression failed.
    Maintenance,
    /// The container engine itself misbehaved or is unreachable.
    Runtime,
}

/// Errors that can occur during runner operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Docker not available: {0}")]
    DockerNotAvailable(String),

    #[error("Listing local images failed: {0}")]
    ImageListFailed(String),

    #[error("Loading embedded image failed: {0}")]
    ImageLoadFailed(String),

    #[error("Image pull failed: {0}")]
    ImagePullFailed(String),

    #[error("Image {0} could not be resolved from any source")]
    ImageUnavailable(String),

    #[error("Cannot write temporary {}: {source}", .path.display())]
    Preparation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Container creation failed: {0}")]
    CreateFailed(String),

    #[error("Container start failed: {0}")]
    StartFailed(String),

    #[error("Container removal failed: {0}")]
    RemoveFailed(String),

    #[error("Interrupted before the container was started")]
    Interrupted,

    #[error("No container client found: {0}")]
    ClientNotFound(String),

    #[error("Attach failed: {0}")]
    AttachFailed(String),

    #[error("File {} does not exist", .0.display())]
    SourceNotFound(PathBuf),

    #[error("File {} is not a .md file", .0.display())]
    NotMarkdown(PathBuf),

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Invalid package metadata: {0}")]
    Metadata(String),

    #[error("Container build failed: {0}")]
    BuildFailed(String),

    #[error("Image compression failed: {0}")]
    CompressFailed(String),

    #[error("Docker API error: {0}")]
    DockerApi(#[from] bollard::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RunnerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ImageListFailed(_)
            | Self::ImageLoadFailed(_)
            | Self::ImagePullFailed(_)
            | Self::ImageUnavailable(_) => ErrorCategory::Resolution,
            Self::Preparation { .. } => ErrorCategory::Preparation,
            Self::CreateFailed(_) | Self::StartFailed(_) | Self::RemoveFailed(_) => {
                ErrorCategory::Lifecycle
            }
            Self::ClientNotFound(_) | Self::AttachFailed(_) => ErrorCategory::Attach,
            Self::SourceNotFound(_) | Self::NotMarkdown(_) | Self::InvalidOption(_) => {
                ErrorCategory::Usage
            }
            Self::Metadata(_) | Self::Json(_) => ErrorCategory::Metadata,
            Self::BuildFailed(_) | Self::CompressFailed(_) => ErrorCategory::Maintenance,
            Self::DockerNotAvailable(_)
            | Self::Interrupted
            | Self::DockerApi(_)
            | Self::Io(_) => ErrorCategory::Runtime,
        }
    }
}
