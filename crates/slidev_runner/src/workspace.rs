//! Temporary support files in the slide directory.
//!
//! Slidev expects to run from an npm project with a Vite config. When the user's
//! directory lacks those files, placeholders are written for the duration of
//! the session and removed afterwards. Files the user already had are never
//! touched.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::progress::{Progress, ProgressEvent};

/// A file Slidev needs next to the slides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupportFile {
    pub name: &'static str,
    pub content: &'static str,
}

/// Placeholder npm manifest so Slidev resolves the image's `node_modules`.
pub const PACKAGE_MANIFEST: SupportFile = SupportFile {
    name: "package.json",
    content: r#"{ "name": "slides", "version": "0.0.0" }"#,
};

/// Vite config allowing the dev server to serve files outside the mount.
pub const VITE_CONFIG: SupportFile = SupportFile {
    name: "vite.config.js",
    content: "export default { server: { fs: { strict: false } } }",
};

/// Support files written for every session.
pub const SUPPORT_FILES: &[SupportFile] = &[PACKAGE_MANIFEST, VITE_CONFIG];

/// Create `path` with exactly `content` unless something already exists there.
///
/// Returns `true` when this call created the file.
pub fn ensure(path: &Path, content: &str) -> RunnerResult<bool> {
    let file = OpenOptions::new().write(true).create_new(true).open(path);

    let mut file = match file {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            debug!("{} already exists, leaving it alone", path.display());
            return Ok(false);
        }
        Err(source) => {
            return Err(RunnerError::Preparation {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if let Err(source) = file.write_all(content.as_bytes()) {
        drop(file);
        // Do not leave a truncated file behind.
        cleanup(path);
        return Err(RunnerError::Preparation {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(true)
}

/// Best-effort removal. Failures are logged, never returned.
///
/// Returns `true` when a file was removed.
pub fn cleanup(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("{} already gone", path.display());
            false
        }
        Err(e) => {
            warn!("Error removing temporary {}: {}", path.display(), e);
            false
        }
    }
}

/// A support file owned by the current session. Removed on drop.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
    progress: Progress,
}

impl TempFile {
    /// Create `path` if absent. `None` means the file pre-existed and is not ours.
    pub fn create(path: PathBuf, content: &str, progress: &Progress) -> RunnerResult<Option<Self>> {
        if !ensure(&path, content)? {
            return Ok(None);
        }

        progress.emit(ProgressEvent::TempFileCreated { path: path.clone() });
        Ok(Some(Self {
            path,
            progress: progress.clone(),
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if cleanup(&self.path) {
            self.progress.emit(ProgressEvent::TempFileRemoved {
                path: self.path.clone(),
            });
        }
    }
}

/// The set of support files created for one session.
///
/// Dropping the workspace removes every file it created, on every exit path.
#[derive(Debug)]
pub struct Workspace {
    created: Vec<TempFile>,
}

impl Workspace {
    /// Write the missing support files into `dir`.
    ///
    /// If a later file fails, the ones already created are removed before the
    /// error is returned.
    pub fn prepare(dir: &Path, files: &[SupportFile], progress: &Progress) -> RunnerResult<Self> {
        let mut workspace = Self {
            created: Vec::with_capacity(files.len()),
        };

        for file in files {
            if let Some(temp) = TempFile::create(dir.join(file.name), file.content, progress)? {
                workspace.created.push(temp);
            }
        }

        Ok(workspace)
    }

    /// Paths this workspace created (and will remove).
    pub fn created_paths(&self) -> Vec<PathBuf> {
        self.created.iter().map(|f| f.path().to_path_buf()).collect()
    }
}
