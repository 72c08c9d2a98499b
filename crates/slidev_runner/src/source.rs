//! Validation of the user's slide file.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{RunnerError, RunnerResult};

/// A validated markdown slide deck.
///
/// The directory is what gets mounted into the container; the file name is
/// what Slidev is told to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideSource {
    dir: PathBuf,
    file_name: String,
}

impl SlideSource {
    /// Expand `~`, check the file exists and ends in `.md`, and absolutize
    /// its directory.
    pub fn resolve(input: impl AsRef<Path>) -> RunnerResult<Self> {
        let path = expand_tilde(input.as_ref());

        if !path.is_file() {
            return Err(RunnerError::SourceNotFound(path));
        }
        if path.extension().and_then(|e| e.to_str()) != Some("md") {
            return Err(RunnerError::NotMarkdown(path));
        }

        let absolute = std::path::absolute(&path)?;
        let dir = absolute
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| RunnerError::SourceNotFound(path.clone()))?;
        let file_name = absolute
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| RunnerError::SourceNotFound(path.clone()))?;

        info!("Running on {} in {}", file_name, dir.display());
        Ok(Self { dir, file_name })
    }

    /// Directory containing the deck, mounted into the container.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name of the deck, relative to [`Self::dir`].
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without its `.md` extension.
    pub fn stem(&self) -> &str {
        self.file_name
            .strip_suffix(".md")
            .unwrap_or(&self.file_name)
    }

    /// Sibling file name with the same stem and a new extension.
    pub fn with_extension(&self, extension: &str) -> String {
        format!("{}.{}", self.stem(), extension)
    }
}

/// Replace a leading `~` with the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}
