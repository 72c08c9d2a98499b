//! CLI command definitions.
//!
//! Each subcommand maps to one container session (or an image maintenance
//! task). Shared engine and client setup lives in [`Context`].

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use slidev_runner::{
    AttachOutcome, ClientBinary, ClientOptions, CliClient, ContainerSession, DockerEngine,
    EmbeddedArchive, EngineOptions, ImageResolver, Progress, ProgressEvent, RunnerError,
    SessionConfig, SessionOutcome, SessionState, SlideSource, ToolVersion,
};

pub mod build_docker;
pub mod compress_docker;
pub mod export;
pub mod run;
pub mod shell;
pub mod spa;
pub mod version;

/// slidev-dkr - Slidev without a local Node.js install
#[derive(Parser)]
#[command(name = "slidev-dkr")]
#[command(version, about = "Run Slidev presentations inside a container")]
#[command(long_about = r#"
slidev-dkr runs Slidev inside a container with the directory of your deck
mounted, so no Node.js toolchain is needed on the host. The image is taken from
the local cache, the archive bundled into this binary, or the registry, in that
order.

COMMANDS:
  run             → Serve the deck on http://localhost:3030
  export          → Export the deck to PDF
  spa             → Build the deck as a static single-page app
  shell           → Open bash in the container
  build-docker    → Build the Slidev image locally
  compress-docker → Save the image as image/slidev.tar.zst
  version         → Print version information

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or source file
  3 - Image could not be resolved
  4 - Container could not be created or started
  5 - Image build or compression failed
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Container client used for attach and build (podman or docker)
    #[arg(long, global = true, env = "SLIDEV_CLIENT")]
    pub client: Option<ClientBinary>,

    /// Container engine address (unix://, npipe:// or tcp://)
    #[arg(long, global = true, env = "DOCKER_HOST")]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve a deck with live reload
    Run(run::RunArgs),

    /// Export a deck to PDF
    Export(export::ExportArgs),

    /// Build a deck as a static single-page app
    #[command(alias = "build")]
    Spa(spa::SpaArgs),

    /// Open an interactive shell next to a deck
    Shell(shell::ShellArgs),

    /// Build the Slidev image
    #[command(name = "build-docker")]
    BuildDocker(build_docker::BuildDockerArgs),

    /// Compress the Slidev image into image/slidev.tar.zst
    #[command(name = "compress-docker")]
    CompressDocker,

    /// Print version information
    Version(version::VersionArgs),
}

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub engine_options: EngineOptions,
    pub client_options: ClientOptions,
    pub quiet: bool,
}

impl Context {
    pub fn from_cli(cli: &Cli) -> Self {
        let mut engine_options = EngineOptions::default();
        if let Some(host) = &cli.host {
            engine_options = engine_options.host(host);
        }

        let mut client_options = ClientOptions::new();
        if let Some(client) = cli.client {
            client_options = client_options.prefer(client);
        }

        Self {
            engine_options,
            client_options,
            quiet: cli.quiet,
        }
    }

    /// Progress printed to stdout, or nothing with `--quiet`.
    pub fn progress(&self) -> Progress {
        if self.quiet {
            return Progress::silent();
        }
        Progress::new(Arc::new(|event: &ProgressEvent| match event {
            ProgressEvent::ImageRetained => println!("\nℹ️  {}", event),
            ProgressEvent::Interrupted => println!("⚠️  {}", event),
            _ => println!("{}", event),
        }))
    }

    /// Connect to the engine and make sure it answers.
    pub async fn engine(&self) -> Result<DockerEngine> {
        DockerEngine::connect_and_ping(&self.engine_options)
            .await
            .context("Cannot reach the container engine, is docker running?")
    }

    /// Image this build of the tool runs.
    pub fn image(&self) -> Result<slidev_runner::ImageReference> {
        Ok(ToolVersion::embedded()?.image_reference())
    }

    /// Run `command` in a session with `source`'s directory mounted.
    pub async fn run_session(
        &self,
        source: &SlideSource,
        command: Vec<String>,
    ) -> Result<SessionOutcome> {
        let engine = self.engine().await?;
        let client = CliClient::new(&self.client_options)?;
        let resolver = ImageResolver::standard(self.image()?, EmbeddedArchive::bundled());

        let config = SessionConfig::default();
        let container = config.container_name.clone();
        let session = ContainerSession::new(Arc::new(engine), Arc::new(client), resolver)
            .config(config)
            .progress(self.progress());

        let result = session.run(source.dir(), command).await;
        debug!("Session lifecycle: {:?}", session.lifecycle());
        if !matches!(session.state(), SessionState::Pending | SessionState::Removed) {
            warn!("Container {} may still exist, remove it with `docker rm -f {}`", container, container);
        }
        let outcome = result?;

        if let AttachOutcome::Failed(message) = &outcome.attach {
            return Err(RunnerError::AttachFailed(message.clone()).into());
        }
        Ok(outcome)
    }
}

/// Validate the deck path before anything touches the engine.
pub fn resolve_source(file: &Path) -> Result<SlideSource> {
    Ok(SlideSource::resolve(file)?)
}

/// Treat a non-zero exit of the command in the container as a failure.
pub fn require_success(outcome: &SessionOutcome, what: &str) -> Result<()> {
    match &outcome.attach {
        AttachOutcome::Exited(Some(0)) => Ok(()),
        AttachOutcome::Interrupted => anyhow::bail!("{} interrupted", what),
        AttachOutcome::Exited(Some(code)) => anyhow::bail!("{} exited with code {}", what, code),
        AttachOutcome::Exited(None) => anyhow::bail!("{} was killed by a signal", what),
        AttachOutcome::Failed(message) => {
            warn!("{}", message);
            anyhow::bail!("{} could not be attached", what)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_is_alias_for_spa() {
        let cli = Cli::try_parse_from(["slidev-dkr", "build", "deck.md", "--base", "/talk/"]).unwrap();
        assert!(matches!(cli.command, Commands::Spa(_)));
    }

    #[test]
    fn test_global_client_option() {
        let cli = Cli::try_parse_from(["slidev-dkr", "run", "deck.md", "--client", "docker"]).unwrap();
        assert_eq!(cli.client, Some(ClientBinary::Docker));

        let ctx = Context::from_cli(&cli);
        assert_eq!(ctx.client_options.preferred, Some(ClientBinary::Docker));
    }

    #[test]
    fn test_unknown_client_is_rejected() {
        assert!(Cli::try_parse_from(["slidev-dkr", "run", "deck.md", "--client", "lxc"]).is_err());
    }
}
