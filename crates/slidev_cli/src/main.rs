//! slidev-dkr CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or source file
//! - 3: Image could not be resolved
//! - 4: Container could not be created or started
//! - 5: Image build or compression failed

use std::process::ExitCode;

use clap::Parser;
use slidev_runner::{ErrorCategory, RunnerError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;

use commands::{Cli, Commands, Context};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const RESOLUTION_ERROR: u8 = 3;
    pub const LIFECYCLE_ERROR: u8 = 4;
    pub const MAINTENANCE_ERROR: u8 = 5;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "slidev=debug,info"
    } else if cli.quiet {
        "warn"
    } else {
        "slidev=info,warn"
    };

    // Initialize logging
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let ctx = Context::from_cli(&cli);

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(&ctx, args).await,
        Commands::Export(args) => commands::export::execute(&ctx, args).await,
        Commands::Spa(args) => commands::spa::execute(&ctx, args).await,
        Commands::Shell(args) => commands::shell::execute(&ctx, args).await,
        Commands::BuildDocker(args) => commands::build_docker::execute(&ctx, args).await,
        Commands::CompressDocker => commands::compress_docker::execute(&ctx).await,
        Commands::Version(args) => commands::version::execute(args),
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Map the library's error category to an exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    let Some(runner_error) = e.downcast_ref::<RunnerError>() else {
        return ExitCodes::GENERAL_ERROR;
    };

    match runner_error.category() {
        ErrorCategory::Usage => ExitCodes::INVALID_ARGS,
        ErrorCategory::Resolution => ExitCodes::RESOLUTION_ERROR,
        ErrorCategory::Preparation | ErrorCategory::Lifecycle => ExitCodes::LIFECYCLE_ERROR,
        ErrorCategory::Maintenance => ExitCodes::MAINTENANCE_ERROR,
        ErrorCategory::Attach | ErrorCategory::Metadata | ErrorCategory::Runtime => {
            ExitCodes::GENERAL_ERROR
        }
    }
}
