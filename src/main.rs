//! Microsoft Graph console tutorial.
//!
//! Signs the user in with a device code, then drives Graph calls from a numbered menu.

#![deny(clippy::all)]

mod auth;
mod config;
mod error;
mod graph;
mod secrets;
mod shell;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::ConfigSources;
use graph::{build_http_client, GraphService};
use secrets::KeyVaultSecretStore;
use shell::{ConsolePrompt, Shell};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    init_logging();

    info!("Starting graph-tutorial v{}", env!("CARGO_PKG_VERSION"));
    println!("Rust Graph Tutorial\n");

    let http_client = build_http_client().context("Failed to create HTTP client")?;

    let secret_store = KeyVaultSecretStore::from_env(http_client.clone());
    let settings = match config::load_settings(&ConfigSources::default_paths(), &secret_store).await
    {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e).context("Configuration error. Please check appsettings.json");
        }
    };

    let service = Arc::new(GraphService::new(http_client));
    service
        .initialize_for_user_auth(settings, Arc::new(ConsolePrompt))
        .context("Failed to initialize Graph for user auth")?;

    let mut stdout = std::io::stdout();
    shell::greet_user(&service, &mut stdout).await?;

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    Shell::new(service).run(stdin, &mut stdout).await?;

    info!("Exiting");
    Ok(())
}

/// Initialize tracing/logging. Logs go to stderr so the menu stays readable.
fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();
}
