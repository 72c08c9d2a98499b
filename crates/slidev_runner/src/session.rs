//! One container session: resolve, prepare, create, start, attach, remove.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::cli::TerminalClient;
use crate::config::SessionConfig;
use crate::engine::ContainerEngine;
use crate::error::{RunnerError, RunnerResult};
use crate::progress::{Progress, ProgressEvent};
use crate::resolver::{ImageResolver, ResolvedImage};
use crate::workspace::{Workspace, SUPPORT_FILES};

/// How the attach step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The client exited (detach or container exit) with this code; `None`
    /// when it was killed by a signal.
    Exited(Option<i32>),
    /// Ctrl-C or SIGTERM arrived before the client returned.
    Interrupted,
    /// The client could not be run or failed.
    Failed(String),
}

impl AttachOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Exited(Some(0)))
    }
}

/// Where the session container is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No container created yet.
    Pending,
    Created,
    Started,
    /// The client attached and has since returned.
    Attached,
    /// No session container is left on the engine.
    Removed,
}

/// Result of a completed session.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub image: ResolvedImage,
    /// `None` when the session was interrupted before the container existed
    pub container_id: Option<String>,
    pub attach: AttachOutcome,
    /// States passed through, in order. Ends in `Removed` unless the final
    /// removal failed.
    pub lifecycle: Vec<SessionState>,
    /// Support files written for the session and removed afterwards
    pub created_files: Vec<PathBuf>,
}

#[derive(Debug)]
struct Tracker {
    states: Vec<SessionState>,
    container_id: Option<String>,
}

impl Default for Tracker {
    fn default() -> Self {
        Self {
            states: vec![SessionState::Pending],
            container_id: None,
        }
    }
}

/// Drives a single container through its lifecycle.
pub struct ContainerSession {
    engine: Arc<dyn ContainerEngine>,
    client: Arc<dyn TerminalClient>,
    resolver: ImageResolver,
    config: SessionConfig,
    progress: Progress,
    tracker: Mutex<Tracker>,
}

impl ContainerSession {
    pub fn new(
        engine: Arc<dyn ContainerEngine>,
        client: Arc<dyn TerminalClient>,
        resolver: ImageResolver,
    ) -> Self {
        Self {
            engine,
            client,
            resolver,
            config: SessionConfig::default(),
            progress: Progress::silent(),
            tracker: Mutex::new(Tracker::default()),
        }
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn progress(mut self, progress: Progress) -> Self {
        self.progress = progress;
        self
    }

    /// States the last run passed through. Also meaningful after a failed run.
    pub fn lifecycle(&self) -> Vec<SessionState> {
        self.tracker.lock().states.clone()
    }

    /// Furthest state of the last run.
    pub fn state(&self) -> SessionState {
        self.tracker
            .lock()
            .states
            .last()
            .copied()
            .unwrap_or(SessionState::Pending)
    }

    /// Run `command` in a fresh container with `host_dir` mounted, until the
    /// attach returns or the process is interrupted.
    pub async fn run(&self, host_dir: &Path, command: Vec<String>) -> RunnerResult<SessionOutcome> {
        // Handlers are installed here, before anything touches the filesystem.
        let interrupt = shutdown_signal();
        self.run_until(host_dir, command, interrupt).await
    }

    /// Like [`Self::run`], with the interrupt supplied by the caller.
    pub async fn run_until<F>(
        &self,
        host_dir: &Path,
        command: Vec<String>,
        interrupt: F,
    ) -> RunnerResult<SessionOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        *self.tracker.lock() = Tracker::default();
        let result = self.run_inner(host_dir, command, interrupt).await;
        self.progress.emit(ProgressEvent::ImageRetained);
        result
    }

    async fn run_inner<F>(
        &self,
        host_dir: &Path,
        command: Vec<String>,
        interrupt: F,
    ) -> RunnerResult<SessionOutcome>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(interrupt);

        let image = tokio::select! {
            biased;
            _ = &mut interrupt => {
                info!("Interrupt received while resolving the image");
                self.progress.emit(ProgressEvent::Interrupted);
                return Err(RunnerError::Interrupted);
            }
            resolved = self.resolver.resolve(self.engine.as_ref(), &self.progress) => resolved?,
        };

        // Files are removed when `workspace` drops, after the container is gone.
        let workspace = Workspace::prepare(host_dir, SUPPORT_FILES, &self.progress)?;
        let created_files = workspace.created_paths();

        let driven = tokio::select! {
            biased;
            _ = &mut interrupt => {
                info!("Interrupt received");
                self.progress.emit(ProgressEvent::Interrupted);
                Ok(AttachOutcome::Interrupted)
            }
            result = self.drive(&image, host_dir, command) => result,
        };

        self.teardown().await;
        drop(workspace);

        let attach = driven?;
        let tracker = self.tracker.lock();
        Ok(SessionOutcome {
            image,
            container_id: tracker.container_id.clone(),
            attach,
            lifecycle: tracker.states.clone(),
            created_files,
        })
    }

    async fn drive(
        &self,
        image: &ResolvedImage,
        host_dir: &Path,
        command: Vec<String>,
    ) -> RunnerResult<AttachOutcome> {
        let name = &self.config.container_name;

        if self.engine.remove_container(name).await? {
            info!("Removed stale container {}", name);
        }

        let spec = self.config.container_spec(&image.reference, host_dir, command);
        self.progress.emit(ProgressEvent::CreatingContainer {
            name: spec.name.clone(),
            command: spec.command.clone(),
        });
        let container_id = self.engine.create_container(&spec).await?;
        debug!("Created container {} ({})", name, container_id);
        self.tracker.lock().container_id = Some(container_id.clone());
        self.advance(SessionState::Created);

        self.engine.start_container(&container_id).await?;
        info!("Started container {}", name);
        self.advance(SessionState::Started);

        self.progress.emit(ProgressEvent::Attaching {
            container_id: container_id.clone(),
        });
        let attach = match self.client.attach(&container_id).await {
            Ok(code) => {
                debug!("Attach returned {:?}", code);
                self.advance(SessionState::Attached);
                AttachOutcome::Exited(code)
            }
            Err(e) => {
                error!("{}", e);
                AttachOutcome::Failed(e.to_string())
            }
        };

        Ok(attach)
    }

    /// Remove the session container. Failure is only a warning.
    async fn teardown(&self) {
        let name = &self.config.container_name;
        self.progress.emit(ProgressEvent::RemovingContainer { name: name.clone() });

        match self.engine.remove_container(name).await {
            Ok(removed) => {
                if removed {
                    debug!("Container {} removed", name);
                } else {
                    debug!("Container {} was already gone", name);
                }
                self.advance(SessionState::Removed);
            }
            Err(e) => warn!("Error removing container {}: {}", name, e),
        }
    }

    fn advance(&self, state: SessionState) {
        debug!("Session state: {:?}", state);
        self.tracker.lock().states.push(state);
    }
}

impl std::fmt::Debug for ContainerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSession")
            .field("resolver", &self.resolver)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
///
/// The handlers are installed when this is called, not when the future is
/// first polled, so a signal arriving in between is not lost.
#[cfg(unix)]
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());

    async move {
        tokio::select! {
            _ = recv_or_pending(interrupt, "Ctrl-C") => {}
            _ = recv_or_pending(terminate, "SIGTERM") => {}
        }
    }
}

#[cfg(unix)]
async fn recv_or_pending(
    stream: std::io::Result<tokio::signal::unix::Signal>,
    name: &'static str,
) {
    match stream {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            warn!("Cannot listen for {}: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

/// Resolves on Ctrl-C.
#[cfg(not(unix))]
pub fn shutdown_signal() -> impl Future<Output = ()> + Send + 'static {
    let ctrl_c = tokio::signal::windows::ctrl_c();

    async move {
        match ctrl_c {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::EmbeddedArchive;
    use crate::metadata::ImageReference;
    use crate::mock::{MockClient, MockEngine};
    use tempfile::TempDir;

    use SessionState::*;

    const TAG: &str = "nnynn/slidev:1-0.48.0-beta.26";

    fn session(engine: &MockEngine, client: &MockClient) -> ContainerSession {
        let target = ImageReference::new("nnynn/slidev", "1-0.48.0-beta.26");
        ContainerSession::new(
            Arc::new(engine.clone()),
            Arc::new(client.clone()),
            ImageResolver::standard(target, EmbeddedArchive::none()),
        )
    }

    fn never() -> std::future::Pending<()> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_lifecycle_order() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new().add_image(TAG);
        let client = MockClient::new();

        let outcome = session(&engine, &client)
            .run_until(dir.path(), vec!["bash".into()], never())
            .await
            .unwrap();

        assert_eq!(outcome.attach, AttachOutcome::Exited(Some(0)));
        assert_eq!(outcome.lifecycle, vec![Pending, Created, Started, Attached, Removed]);
        assert_eq!(
            engine.call_sequence(),
            vec![
                "list_image_tags",
                "remove_container",
                "create_container",
                "start_container",
                "remove_container"
            ]
        );
        assert!(engine.containers().is_empty());
    }

    #[tokio::test]
    async fn test_custom_container_name() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new().add_image(TAG).add_container("slidev-test");
        let client = MockClient::new();

        let outcome = session(&engine, &client)
            .config(SessionConfig::default().container_name("slidev-test"))
            .run_until(dir.path(), vec!["bash".into()], never())
            .await
            .unwrap();

        assert_eq!(outcome.container_id.as_deref(), Some("slidev-test"));
        assert_eq!(client.attached(), vec!["slidev-test".to_string()]);
        assert!(engine
            .get_method_calls("remove_container")
            .iter()
            .all(|c| c.target.as_deref() == Some("slidev-test")));
        assert!(engine.containers().is_empty());
    }

    #[tokio::test]
    async fn test_interrupt_still_cleans_up() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new().add_image(TAG);
        let client = MockClient::new().hang();
        let interrupt = tokio::time::sleep(std::time::Duration::from_millis(50));

        let outcome = session(&engine, &client)
            .run_until(dir.path(), vec!["bash".into()], interrupt)
            .await
            .unwrap();

        assert_eq!(outcome.attach, AttachOutcome::Interrupted);
        assert_eq!(outcome.container_id.as_deref(), Some("slidev-container"));
        assert_eq!(outcome.lifecycle, vec![Pending, Created, Started, Removed]);
        assert_eq!(client.attached().len(), 1);
        assert!(engine.containers().is_empty());
        assert!(!dir.path().join("package.json").exists());
        assert!(!dir.path().join("vite.config.js").exists());
    }

    #[tokio::test]
    async fn test_interrupt_before_resolution() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new().add_image(TAG);
        let client = MockClient::new();
        let session = session(&engine, &client);

        let err = session
            .run_until(dir.path(), vec!["bash".into()], std::future::ready(()))
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::Interrupted));
        assert_eq!(session.state(), Pending);
        assert!(engine.call_sequence().is_empty());
        assert!(!dir.path().join("package.json").exists());
    }

    #[tokio::test]
    async fn test_preparation_failure_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("gone");
        let engine = MockEngine::new().add_image(TAG);
        let client = MockClient::new();

        let err = session(&engine, &client)
            .run_until(&missing, vec!["bash".into()], never())
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::Preparation { .. }));
        assert!(!engine.was_called("create_container"));
        assert!(client.attached().is_empty());
    }

    #[tokio::test]
    async fn test_stale_removal_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new()
            .add_image(TAG)
            .fail_on_call("remove_container", 1, "daemon hiccup");
        let client = MockClient::new();

        let err = session(&engine, &client)
            .run_until(dir.path(), vec!["bash".into()], never())
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::RemoveFailed(_)));
        assert!(!engine.was_called("create_container"));
        assert!(!dir.path().join("package.json").exists());
    }

    #[tokio::test]
    async fn test_start_failure_lifecycle() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new()
            .add_image(TAG)
            .fail_on("start_container", "port is already allocated");
        let client = MockClient::new();
        let session = session(&engine, &client);

        let err = session
            .run_until(dir.path(), vec!["bash".into()], never())
            .await
            .unwrap_err();

        assert!(matches!(err, RunnerError::StartFailed(_)));
        assert_eq!(session.lifecycle(), vec![Pending, Created, Removed]);
        assert_eq!(session.state(), Removed);
    }

    #[tokio::test]
    async fn test_attach_failure_lifecycle() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new().add_image(TAG);
        let client = MockClient::new().simulate_failure("docker: not found");

        let outcome = session(&engine, &client)
            .run_until(dir.path(), vec!["bash".into()], never())
            .await
            .unwrap();

        assert!(matches!(outcome.attach, AttachOutcome::Failed(_)));
        assert_eq!(outcome.lifecycle, vec![Pending, Created, Started, Removed]);
    }

    #[tokio::test]
    async fn test_final_removal_failure_is_a_warning() {
        let dir = TempDir::new().unwrap();
        let engine = MockEngine::new()
            .add_image(TAG)
            .fail_on_call("remove_container", 2, "removal already in progress");
        let client = MockClient::new();

        let outcome = session(&engine, &client)
            .run_until(dir.path(), vec!["bash".into()], never())
            .await
            .unwrap();

        assert_eq!(outcome.attach, AttachOutcome::Exited(Some(0)));
        assert_eq!(outcome.lifecycle.last(), Some(&Attached));
        assert_eq!(engine.containers(), vec!["slidev-container".to_string()]);
        assert!(!dir.path().join("package.json").exists());
        assert!(!dir.path().join("vite.config.js").exists());
    }

    #[test]
    fn test_attach_outcome_success() {
        assert!(AttachOutcome::Exited(Some(0)).is_success());
        assert!(!AttachOutcome::Exited(None).is_success());
        assert!(!AttachOutcome::Exited(Some(1)).is_success());
        assert!(!AttachOutcome::Interrupted.is_success());
        assert!(!AttachOutcome::Failed("x".into()).is_success());
    }
}
