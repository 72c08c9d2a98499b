//! Host container client binaries (Podman, Docker).
//!
//! Interactive attach is delegated to the client binary rather than done over
//! the engine API: the client already handles raw terminal mode, window
//! resizing and signal forwarding.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::metadata::ImageReference;

/// Container client binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientBinary {
    Docker,
    Podman,
}

impl ClientBinary {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }

    /// Detection order when no preference is given.
    pub fn preference_order() -> &'static [ClientBinary] {
        &[ClientBinary::Podman, ClientBinary::Docker]
    }
}

impl std::fmt::Display for ClientBinary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

impl std::str::FromStr for ClientBinary {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "podman" => Ok(Self::Podman),
            other => Err(RunnerError::InvalidOption(format!(
                "unknown container client '{}', expected docker or podman",
                other
            ))),
        }
    }
}

/// Client detection options.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Preferred client (if not set, auto-detect)
    pub preferred: Option<ClientBinary>,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefer(mut self, client: ClientBinary) -> Self {
        self.preferred = Some(client);
        self
    }
}

/// Something that can hand the terminal over to a running container.
#[async_trait]
pub trait TerminalClient: Send + Sync {
    /// Attach the current process's standard streams to the container and
    /// block until the client exits. Returns the client's exit code.
    async fn attach(&self, container_id: &str) -> RunnerResult<Option<i32>>;
}

/// Client backed by the `podman` or `docker` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct CliClient {
    binary: ClientBinary,
}

impl CliClient {
    /// Create a client with automatic binary detection.
    pub fn new(options: &ClientOptions) -> RunnerResult<Self> {
        let binary = Self::detect(options)?;
        info!("Using container client: {}", binary);
        Ok(Self { binary })
    }

    /// Detect an installed client binary.
    pub fn detect(options: &ClientOptions) -> RunnerResult<ClientBinary> {
        // Check preferred client first
        if let Some(preferred) = options.preferred {
            if Self::is_installed(preferred) {
                return Ok(preferred);
            }
            warn!(
                "Preferred client {} not available, trying alternatives",
                preferred
            );
        }

        ClientBinary::preference_order()
            .iter()
            .copied()
            .find(|binary| Self::is_installed(*binary))
            .ok_or_else(|| {
                RunnerError::ClientNotFound("neither podman nor docker is on PATH".to_string())
            })
    }

    /// Check if a client binary can be executed.
    fn is_installed(binary: ClientBinary) -> bool {
        std::process::Command::new(binary.command())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Arguments for an interactive attach.
    pub fn attach_args(container_id: &str) -> Vec<String> {
        vec!["attach".to_string(), container_id.to_string()]
    }

    /// Arguments for an image build.
    pub fn build_args(dockerfile: &Path, context: &Path, tag: &ImageReference) -> Vec<String> {
        vec![
            "build".to_string(),
            "-f".to_string(),
            dockerfile.to_string_lossy().to_string(),
            "-t".to_string(),
            tag.to_string(),
            context.to_string_lossy().to_string(),
        ]
    }

    /// Build an image, streaming the client's output to the terminal.
    pub async fn build_image(
        &self,
        dockerfile: &Path,
        context: &Path,
        tag: &ImageReference,
    ) -> RunnerResult<()> {
        let args = Self::build_args(dockerfile, context, tag);
        info!("Building image {} from {}", tag, dockerfile.display());
        debug!("Executing: {} {}", self.binary, args.join(" "));

        let status = Command::new(self.binary.command())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| RunnerError::BuildFailed(format!("failed to spawn {}: {}", self.binary, e)))?;

        if status.success() {
            info!("Successfully built image: {}", tag);
            Ok(())
        } else {
            Err(RunnerError::BuildFailed(format!(
                "{} build exited with {}",
                self.binary, status
            )))
        }
    }
}

#[async_trait]
impl TerminalClient for CliClient {
    async fn attach(&self, container_id: &str) -> RunnerResult<Option<i32>> {
        let args = Self::attach_args(container_id);
        debug!("Executing: {} {}", self.binary, args.join(" "));

        let child = Command::new(self.binary.command())
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                RunnerError::AttachFailed(format!("failed to spawn {}: {}", self.binary, e))
            })?;
        let mut guard = AttachedChild::new(child);

        let status = guard.wait().await.map_err(|e| {
            RunnerError::AttachFailed(format!("failed to wait for {}: {}", self.binary, e))
        })?;

        debug!("{} attach exited with {}", self.binary, status);
        Ok(status.code())
    }
}

/// Time an interrupted attach client gets to restore the terminal.
const ATTACH_GRACE: Duration = Duration::from_millis(500);

/// Owns the attach child. If dropped while the child still runs, sends
/// SIGTERM and only kills it after [`ATTACH_GRACE`].
struct AttachedChild {
    child: Option<Child>,
}

impl AttachedChild {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => {
                let status = child.wait().await?;
                self.child = None;
                Ok(status)
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "attach client already reaped",
            )),
        }
    }
}

impl Drop for AttachedChild {
    fn drop(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }

        terminate(&mut child);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if tokio::time::timeout(ATTACH_GRACE, child.wait()).await.is_err() {
                        warn!("Attach client ignored SIGTERM, killing it");
                        if let Err(e) = child.kill().await {
                            warn!("Error killing attach client: {}", e);
                        }
                    }
                });
            }
            Err(_) => {
                let _ = child.start_kill();
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: plain kill(2) on a pid we spawned and have not reaped yet.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(
            "Error sending SIGTERM to attach client {}: {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!("Error stopping attach client: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_client_detection() {
        // May fail on hosts without Docker or Podman; only checks it does not panic.
        let result = CliClient::detect(&ClientOptions::default());
        println!("Detected client: {:?}", result);
    }

    #[test]
    fn test_podman_is_preferred() {
        assert_eq!(
            ClientBinary::preference_order(),
            &[ClientBinary::Podman, ClientBinary::Docker]
        );
    }

    #[test]
    fn test_attach_args() {
        assert_eq!(CliClient::attach_args("abc123"), vec!["attach", "abc123"]);
    }

    #[test]
    fn test_build_args() {
        let tag = ImageReference::new("nnynn/slidev", "1-0.48.0");
        let args = CliClient::build_args(
            &PathBuf::from("/ctx/Dockerfile"),
            &PathBuf::from("/ctx"),
            &tag,
        );

        assert_eq!(
            args,
            vec!["build", "-f", "/ctx/Dockerfile", "-t", "nnynn/slidev:1-0.48.0", "/ctx"]
        );
    }

    #[test]
    fn test_client_display_and_parse() {
        assert_eq!(format!("{}", ClientBinary::Docker), "docker");
        assert_eq!("Podman".parse::<ClientBinary>().unwrap(), ClientBinary::Podman);
        assert!("nerdctl".parse::<ClientBinary>().is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        use std::os::unix::process::ExitStatusExt;

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        terminate(&mut child);
        let status = child.wait().await.unwrap();
        assert_eq!(status.signal(), Some(libc::SIGTERM));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_attach_stops_client() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id().unwrap() as libc::pid_t;

        drop(AttachedChild::new(child));
        tokio::time::sleep(Duration::from_millis(300)).await;

        // The spawned reaper has collected it, so the pid is gone.
        assert_ne!(unsafe { libc::kill(pid, 0) }, 0);
    }

    #[tokio::test]
    async fn test_finished_attach_is_not_signalled() {
        let child = Command::new("true").spawn().unwrap();
        let mut guard = AttachedChild::new(child);
        assert!(guard.wait().await.unwrap().success());
        assert!(guard.child.is_none());
    }
}
