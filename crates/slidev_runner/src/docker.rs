//! Docker implementation of ContainerEngine.

use std::collections::HashMap;
use std::io::Write;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, RemoveContainerOptions, StartContainerOptions,
};
use bollard::image::{CreateImageOptions, ImportImageOptions, ListImagesOptions};
use bollard::models::{HostConfig, PortBinding};
use bollard::{ClientVersion, Docker};
use bytes::Bytes;
use futures_util::StreamExt;
use tracing::{debug, info};

use crate::config::{ContainerSpec, EngineOptions, API_VERSION};
use crate::engine::ContainerEngine;
use crate::error::{RunnerError, RunnerResult};
use crate::metadata::ImageReference;

const CLIENT_VERSION: ClientVersion = ClientVersion {
    major_version: API_VERSION.0,
    minor_version: API_VERSION.1,
};

#[cfg(unix)]
const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";
#[cfg(windows)]
const DEFAULT_HOST: &str = "npipe:////./pipe/docker_engine";

/// Docker Engine API client, also used against Podman's compatible socket.
pub struct DockerEngine {
    client: Docker,
}

impl DockerEngine {
    /// Connect with the pinned API version. Does not contact the engine.
    pub fn connect(options: &EngineOptions) -> RunnerResult<Self> {
        let host = options.host.as_deref().unwrap_or(DEFAULT_HOST);
        debug!("Connecting to container engine at {}", host);

        let client = if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(host, options.timeout_seconds, &CLIENT_VERSION)?
        } else {
            connect_local(host, options.timeout_seconds)?
        };

        Ok(Self { client })
    }

    /// Connect and verify the engine answers.
    pub async fn connect_and_ping(options: &EngineOptions) -> RunnerResult<Self> {
        let engine = Self::connect(options)?;
        engine.ping().await?;
        Ok(engine)
    }
}

#[cfg(unix)]
fn connect_local(host: &str, timeout: u64) -> Result<Docker, bollard::errors::Error> {
    Docker::connect_with_unix(host, timeout, &CLIENT_VERSION)
}

#[cfg(windows)]
fn connect_local(host: &str, timeout: u64) -> Result<Docker, bollard::errors::Error> {
    Docker::connect_with_named_pipe(host, timeout, &CLIENT_VERSION)
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn ping(&self) -> RunnerResult<()> {
        self.client
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| RunnerError::DockerNotAvailable(format!("{} (is docker running?)", e)))
    }

    async fn list_image_tags(&self) -> RunnerResult<Vec<String>> {
        let options = ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        };

        let images = self
            .client
            .list_images(Some(options))
            .await
            .map_err(|e| RunnerError::ImageListFailed(e.to_string()))?;

        Ok(images
            .into_iter()
            .flat_map(|image| image.repo_tags)
            .collect())
    }

    async fn load_image(&self, archive: Bytes) -> RunnerResult<()> {
        info!("Loading image archive ({} bytes)", archive.len());

        let mut stream = Box::pin(self.client.import_image(
            ImportImageOptions { quiet: true },
            archive.into(),
            None,
        ));

        while let Some(result) = stream.next().await {
            let info = result.map_err(|e| RunnerError::ImageLoadFailed(e.to_string()))?;
            if let Some(error) = info.error {
                return Err(RunnerError::ImageLoadFailed(error));
            }
            if let Some(stream) = info.stream {
                debug!("Load: {}", stream.trim());
            }
        }

        Ok(())
    }

    async fn pull_image(&self, reference: &ImageReference) -> RunnerResult<()> {
        info!("Pulling image {}", reference);

        let options = CreateImageOptions {
            from_image: reference.name(),
            tag: reference.version(),
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);

        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(error) = info.error {
                        return Err(RunnerError::ImagePullFailed(error));
                    }
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    return Err(RunnerError::ImagePullFailed(e.to_string()));
                }
            }
        }

        info!("Image {} pulled successfully", reference);
        Ok(())
    }

    async fn save_image(
        &self,
        reference: &ImageReference,
        sink: &mut (dyn Write + Send),
    ) -> RunnerResult<u64> {
        info!("Saving image {}", reference);

        let name = reference.to_string();
        let mut stream = Box::pin(self.client.export_image(&name));
        let mut written = 0u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            sink.write_all(&chunk)?;
            written += chunk.len() as u64;
        }

        Ok(written)
    }

    async fn remove_container(&self, name: &str) -> RunnerResult<bool> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        match self.client.remove_container(name, Some(options)).await {
            Ok(()) => Ok(true),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Ok(false),
            Err(e) => Err(RunnerError::RemoveFailed(e.to_string())),
        }
    }

    async fn create_container(&self, spec: &ContainerSpec) -> RunnerResult<String> {
        let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
            .ports
            .iter()
            .map(|p| (p.key(), HashMap::new()))
            .collect();

        let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
            .ports
            .iter()
            .map(|p| {
                let binding = PortBinding {
                    host_ip: Some(p.host_ip.clone()),
                    host_port: Some(p.host_port.to_string()),
                };
                (p.key(), Some(vec![binding]))
            })
            .collect();

        let host_config = HostConfig {
            binds: Some(spec.mounts.iter().map(|m| m.bind_spec()).collect()),
            port_bindings: Some(port_bindings),
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.to_string()),
            cmd: Some(spec.command.clone()),
            env: Some(spec.env_list()),
            exposed_ports: Some(exposed_ports),
            tty: Some(spec.tty),
            open_stdin: Some(spec.interactive),
            attach_stdin: Some(spec.interactive),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.as_str(),
            platform: None,
        };

        let response = self
            .client
            .create_container(Some(options), config)
            .await
            .map_err(|e| RunnerError::CreateFailed(e.to_string()))?;

        for warning in &response.warnings {
            debug!("Create warning: {}", warning);
        }

        Ok(response.id)
    }

    async fn start_container(&self, container_id: &str) -> RunnerResult<()> {
        self.client
            .start_container(container_id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| RunnerError::StartFailed(e.to_string()))
    }
}
