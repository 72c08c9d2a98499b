//! # slidev_runner
//!
//! Container lifecycle and image provisioning for running Slidev decks.
//!
//! A session resolves the Slidev image (local cache, then the archive bundled
//! into the binary, then the registry), writes the support files Slidev needs
//! next to the deck, runs one command in a fresh container with the deck's
//! directory mounted, hands the terminal to `podman`/`docker attach`, and
//! removes the container and the files again on every exit path.
//!
//! # Features
//!
//! - **Engine API**: Docker-compatible daemons through bollard, pinned to API 1.43
//! - **Client Detection**: `podman` preferred, `docker` as fallback
//! - **Embedded Image**: zstd archive compiled in by `build.rs` when present
//! - **Mock Engine**: For testing without actual containers
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slidev_runner::{
//!     presets, CliClient, ClientOptions, ContainerSession, DockerEngine, EmbeddedArchive,
//!     EngineOptions, ImageResolver, SlideSource, ToolVersion,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = SlideSource::resolve("~/talks/deck.md")?;
//!     let engine = DockerEngine::connect_and_ping(&EngineOptions::default()).await?;
//!     let client = CliClient::new(&ClientOptions::default())?;
//!
//!     let target = ToolVersion::embedded()?.image_reference();
//!     let session = ContainerSession::new(
//!         Arc::new(engine),
//!         Arc::new(client),
//!         ImageResolver::standard(target, EmbeddedArchive::bundled()),
//!     );
//!
//!     let outcome = session.run(source.dir(), presets::run(&source).command).await?;
//!     println!("Attach ended: {:?}", outcome.attach);
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod docker;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod mock;
pub mod presets;
pub mod progress;
pub mod resolver;
pub mod session;
pub mod source;
pub mod workspace;

pub use archive::{compress_image, EmbeddedArchive};
pub use cli::{ClientBinary, ClientOptions, CliClient, TerminalClient};
pub use config::{ContainerSpec, EngineOptions, MountConfig, PortConfig, SessionConfig};
pub use docker::DockerEngine;
pub use engine::ContainerEngine;
pub use error::{ErrorCategory, RunnerError, RunnerResult};
pub use metadata::{ImageReference, ToolVersion};
pub use mock::{CapturedCall, MockClient, MockEngine};
pub use presets::{ExportOptions, PreparedCommand, SpaOptions};
pub use progress::{Progress, ProgressEvent, ProgressHandler};
pub use resolver::{ImageResolver, ImageSource, ResolveStrategy, Resolution, ResolvedImage};
pub use session::{AttachOutcome, ContainerSession, SessionOutcome, SessionState};
pub use source::SlideSource;
pub use workspace::{SupportFile, Workspace};
