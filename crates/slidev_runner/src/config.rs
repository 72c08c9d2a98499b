//! Container and engine configuration types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metadata::ImageReference;

/// Fixed name of the session container. At most one exists per host.
pub const CONTAINER_NAME: &str = "slidev-container";

/// Directory inside the image where the slides are mounted.
pub const SLIDES_DIR: &str = "/slidev/slides";

/// Port the Slidev dev server listens on.
pub const DEV_SERVER_PORT: u16 = 3030;

/// Docker Engine API revision the client is pinned to.
pub const API_VERSION: (usize, usize) = (1, 43);

/// Container mount configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Host path to mount
    pub source: PathBuf,
    /// Container path to mount to
    pub target: String,
    /// Whether the mount is read-only
    pub read_only: bool,
}

impl MountConfig {
    pub fn new(source: PathBuf, target: impl Into<String>) -> Self {
        Self {
            source,
            target: target.into(),
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Bind specification in `host:container:mode` form.
    pub fn bind_spec(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.source.to_string_lossy(), self.target, mode)
    }
}

/// A published TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub container_port: u16,
    pub host_port: u16,
    pub host_ip: String,
}

impl PortConfig {
    /// Publish `port` on the same host port, on all interfaces.
    pub fn same(port: u16) -> Self {
        Self {
            container_port: port,
            host_port: port,
            host_ip: "0.0.0.0".to_string(),
        }
    }

    /// Key used by the engine API, e.g. `3030/tcp`.
    pub fn key(&self) -> String {
        format!("{}/tcp", self.container_port)
    }
}

/// Everything the engine needs to create the session container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,
    /// Image to run
    pub image: ImageReference,
    /// Command to run
    pub command: Vec<String>,
    /// Environment variables
    pub env: BTreeMap<String, String>,
    /// Volume mounts
    pub mounts: Vec<MountConfig>,
    /// Published ports
    pub ports: Vec<PortConfig>,
    /// Allocate a pseudo-terminal
    pub tty: bool,
    /// Keep stdin open and attach all standard streams
    pub interactive: bool,
}

impl ContainerSpec {
    /// Environment in `KEY=value` form.
    pub fn env_list(&self) -> Vec<String> {
        self.env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect()
    }
}

/// Per-session container settings.
///
/// The defaults are the values the Slidev image expects; they are exposed as a
/// builder so tests can use a different name and do not collide with a real
/// session on the same host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub container_name: String,
    pub mount_target: String,
    pub port: PortConfig,
    pub env: BTreeMap<String, String>,
    pub tty: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        // Bind mounts on macOS/Windows hosts do not deliver inotify events.
        env.insert("CHOKIDAR_USEPOLLING".to_string(), "true".to_string());

        Self {
            container_name: CONTAINER_NAME.to_string(),
            mount_target: SLIDES_DIR.to_string(),
            port: PortConfig::same(DEV_SERVER_PORT),
            env,
            tty: true,
        }
    }
}

impl SessionConfig {
    pub fn container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = name.into();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn tty(mut self, enabled: bool) -> Self {
        self.tty = enabled;
        self
    }

    /// Build the container specification for one session.
    pub fn container_spec(
        &self,
        image: &ImageReference,
        host_dir: &Path,
        command: Vec<String>,
    ) -> ContainerSpec {
        ContainerSpec {
            name: self.container_name.clone(),
            image: image.clone(),
            command,
            env: self.env.clone(),
            mounts: vec![MountConfig::new(host_dir.to_path_buf(), &self.mount_target)],
            ports: vec![self.port.clone()],
            tty: self.tty,
            interactive: true,
        }
    }
}

/// How to reach the container engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Engine address (`unix://`, `npipe://`, `tcp://`); platform socket when unset
    pub host: Option<String>,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            host: std::env::var("DOCKER_HOST").ok().filter(|h| !h.is_empty()),
            timeout_seconds: 120,
        }
    }
}

impl EngineOptions {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}
