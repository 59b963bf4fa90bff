use std::process::ExitCode;

use colored::Colorize;
use log::{error, info, warn};
use thiserror::Error;
use tokenhub_core::{Config, ConfigError};
use tokenhub_server::{run_server, StartError};
use tokio::runtime;

use crate::logging::LogColor;

mod logging;

#[derive(Debug, Error)]
enum TokenhubError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Start(#[from] StartError),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl TokenhubError {
    fn hint(&self) -> String {
        match self {
            TokenhubError::Config(_) => "Check the TOKENHUB_* variables in your environment or .env file, then try again.".to_string(),
            TokenhubError::Start(StartError::Gateway(_)) => "The backend could not be set up. Make sure TOKENHUB_SUPABASE_URL is a valid url.".to_string(),
            TokenhubError::Start(StartError::Io(_)) => "The server could not listen. Make sure TOKENHUB_SERVER_PORT is free.".to_string(),
            TokenhubError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn run() -> Result<(), TokenhubError> {
    let config = Config::from_env()?;

    info!("Building async runtime...");
    let main_runtime = runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("tokenhub-async")
        .build()
        .map_err(|e| TokenhubError::Fatal(e.to_string()))?;

    main_runtime.block_on(run_server(config))?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(e) = logging::init_logger() {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Failed to read .env file: {}", e);
        }
    }

    ExitCode::from(report(run()))
}

/// Logs a failed start, returning the process exit status
fn report(result: Result<(), TokenhubError>) -> u8 {
    let Err(error) = result else {
        return 0;
    };

    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "tokenhub failed to start!".bold().color(LogColor::Red));
    error!("{}", error);
    error!(
        "{}",
        format!("Hint: {}", error.hint())
            .color(LogColor::Dimmed)
            .italic()
    );

    1
}
