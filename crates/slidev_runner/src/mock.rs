//! Mock engine and client for testing.
//!
//! Provides configurable implementations of [`ContainerEngine`] and
//! [`TerminalClient`] that record every call, so session behavior can be
//! verified without Docker or Podman.

use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::cli::TerminalClient;
use crate::config::ContainerSpec;
use crate::engine::ContainerEngine;
use crate::error::{RunnerError, RunnerResult};
use crate::metadata::ImageReference;

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    /// Image reference, container name or id the call targeted
    pub target: Option<String>,
    /// Full spec for `create_container`
    pub spec: Option<ContainerSpec>,
}

impl CapturedCall {
    fn new(method: &str, target: Option<String>) -> Self {
        Self {
            method: method.to_string(),
            target,
            spec: None,
        }
    }
}

/// Mock container engine for testing.
///
/// Keeps an in-memory image cache and container table. Failures can be
/// injected per method name.
#[derive(Clone)]
pub struct MockEngine {
    /// Repo tags in the "local cache".
    images: Arc<RwLock<Vec<String>>>,
    /// Names of containers that "exist".
    containers: Arc<RwLock<BTreeSet<String>>>,
    /// Tag the loaded archive contains.
    archive_tag: Arc<RwLock<Option<String>>>,
    /// Tarballs passed to `load_image`.
    loaded: Arc<RwLock<Vec<Bytes>>>,
    /// Bytes `save_image` writes.
    saved_image: Arc<RwLock<Vec<u8>>>,
    /// Method name -> failure message.
    failures: Arc<RwLock<HashMap<String, String>>>,
    /// (method name, 1-based call number) -> failure message.
    call_failures: Arc<RwLock<HashMap<(String, usize), String>>>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            images: Arc::new(RwLock::new(Vec::new())),
            containers: Arc::new(RwLock::new(BTreeSet::new())),
            archive_tag: Arc::new(RwLock::new(None)),
            loaded: Arc::new(RwLock::new(Vec::new())),
            saved_image: Arc::new(RwLock::new(b"mock image tarball".to_vec())),
            failures: Arc::new(RwLock::new(HashMap::new())),
            call_failures: Arc::new(RwLock::new(HashMap::new())),
            captured_calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Add an image tag that should "exist" locally.
    pub fn add_image(self, tag: impl Into<String>) -> Self {
        self.images.write().push(tag.into());
        self
    }

    /// Add a container that should "exist", e.g. left over from a crash.
    pub fn add_container(self, name: impl Into<String>) -> Self {
        self.containers.write().insert(name.into());
        self
    }

    /// Tag that appears in the cache once an archive is loaded.
    pub fn archive_tag(self, tag: impl Into<String>) -> Self {
        *self.archive_tag.write() = Some(tag.into());
        self
    }

    /// Tarball content `save_image` produces.
    pub fn saved_image(self, data: impl Into<Vec<u8>>) -> Self {
        *self.saved_image.write() = data.into();
        self
    }

    /// Make `method` fail with `message`.
    pub fn fail_on(self, method: &str, message: impl Into<String>) -> Self {
        self.failures.write().insert(method.to_string(), message.into());
        self
    }

    /// Make only the `call`-th invocation of `method` fail (1-based).
    pub fn fail_on_call(self, method: &str, call: usize, message: impl Into<String>) -> Self {
        self.call_failures
            .write()
            .insert((method.to_string(), call), message.into());
        self
    }

    /// Method names in call order.
    pub fn call_sequence(&self) -> Vec<String> {
        self.captured_calls
            .read()
            .iter()
            .map(|c| c.method.clone())
            .collect()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls
            .read()
            .iter()
            .any(|c| c.method == method)
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    pub fn containers(&self) -> Vec<String> {
        self.containers.read().iter().cloned().collect()
    }

    pub fn images(&self) -> Vec<String> {
        self.images.read().clone()
    }

    pub fn loaded_archives(&self) -> Vec<Bytes> {
        self.loaded.read().clone()
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    /// Must run after the call is recorded so the call number includes it.
    fn check_failure(&self, method: &str) -> Option<String> {
        if let Some(msg) = self.failures.read().get(method) {
            return Some(msg.clone());
        }
        let call = self
            .captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .count();
        self.call_failures
            .read()
            .get(&(method.to_string(), call))
            .cloned()
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn ping(&self) -> RunnerResult<()> {
        self.record_call(CapturedCall::new("ping", None));
        match self.check_failure("ping") {
            Some(msg) => Err(RunnerError::DockerNotAvailable(msg)),
            None => Ok(()),
        }
    }

    async fn list_image_tags(&self) -> RunnerResult<Vec<String>> {
        self.record_call(CapturedCall::new("list_image_tags", None));
        if let Some(msg) = self.check_failure("list_image_tags") {
            return Err(RunnerError::ImageListFailed(msg));
        }
        Ok(self.images.read().clone())
    }

    async fn load_image(&self, archive: Bytes) -> RunnerResult<()> {
        self.record_call(CapturedCall::new("load_image", None));
        if let Some(msg) = self.check_failure("load_image") {
            return Err(RunnerError::ImageLoadFailed(msg));
        }
        self.loaded.write().push(archive);
        if let Some(tag) = self.archive_tag.read().clone() {
            self.images.write().push(tag);
        }
        Ok(())
    }

    async fn pull_image(&self, reference: &ImageReference) -> RunnerResult<()> {
        self.record_call(CapturedCall::new("pull_image", Some(reference.to_string())));
        if let Some(msg) = self.check_failure("pull_image") {
            return Err(RunnerError::ImagePullFailed(msg));
        }
        self.images.write().push(reference.to_string());
        Ok(())
    }

    async fn save_image(
        &self,
        reference: &ImageReference,
        sink: &mut (dyn Write + Send),
    ) -> RunnerResult<u64> {
        self.record_call(CapturedCall::new("save_image", Some(reference.to_string())));
        if let Some(msg) = self.check_failure("save_image") {
            return Err(RunnerError::CompressFailed(msg));
        }
        let data = self.saved_image.read().clone();
        sink.write_all(&data)?;
        Ok(data.len() as u64)
    }

    async fn remove_container(&self, name: &str) -> RunnerResult<bool> {
        self.record_call(CapturedCall::new("remove_container", Some(name.to_string())));
        if let Some(msg) = self.check_failure("remove_container") {
            return Err(RunnerError::RemoveFailed(msg));
        }
        Ok(self.containers.write().remove(name))
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RunnerResult<String> {
        self.record_call(CapturedCall {
            method: "create_container".to_string(),
            target: Some(spec.name.clone()),
            spec: Some(spec.clone()),
        });
        if let Some(msg) = self.check_failure("create_container") {
            return Err(RunnerError::CreateFailed(msg));
        }

        let mut containers = self.containers.write();
        if !containers.insert(spec.name.clone()) {
            return Err(RunnerError::CreateFailed(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }
        // Ids and names are interchangeable for the mock.
        Ok(spec.name.clone())
    }

    async fn start_container(&self, container_id: &str) -> RunnerResult<()> {
        self.record_call(CapturedCall::new(
            "start_container",
            Some(container_id.to_string()),
        ));
        if let Some(msg) = self.check_failure("start_container") {
            return Err(RunnerError::StartFailed(msg));
        }
        Ok(())
    }
}

/// Hook run while a mock attach is "in progress".
pub type AttachHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Mock terminal client for testing.
#[derive(Clone)]
pub struct MockClient {
    exit_code: Option<i32>,
    failure: Option<String>,
    hook: Option<AttachHook>,
    hang: bool,
    attached: Arc<RwLock<Vec<String>>>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// A client whose attach succeeds with exit code 0.
    pub fn new() -> Self {
        Self {
            exit_code: Some(0),
            failure: None,
            hook: None,
            hang: false,
            attached: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Make attach fail, as when the client binary is missing.
    pub fn simulate_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Run `hook` with the container id during attach.
    pub fn on_attach(mut self, hook: AttachHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Never return from attach, like a dev server the user leaves running.
    pub fn hang(mut self) -> Self {
        self.hang = true;
        self
    }

    /// Container ids attached to, in order.
    pub fn attached(&self) -> Vec<String> {
        self.attached.read().clone()
    }
}

#[async_trait]
impl TerminalClient for MockClient {
    async fn attach(&self, container_id: &str) -> RunnerResult<Option<i32>> {
        self.attached.write().push(container_id.to_string());
        if let Some(hook) = &self.hook {
            hook(container_id);
        }
        if self.hang {
            std::future::pending::<()>().await;
        }
        match &self.failure {
            Some(msg) => Err(RunnerError::AttachFailed(msg.clone())),
            None => Ok(self.exit_code),
        }
    }
}
