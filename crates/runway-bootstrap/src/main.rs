use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use runway_runtime::{LogFormat, Runtime, RuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt};

mod handlers;

#[derive(Parser)]
#[command(
    name = "bootstrap",
    about = "runway bootstrap: serves function invocations from the runtime API"
)]
struct Cli {
    /// Handler specifier (`Type` or `Type::member`), overriding HANDLER
    #[arg(long)]
    handler: Option<String>,

    /// Offline event body read from a file, overriding LOCAL_EVENT
    #[arg(long)]
    event_file: Option<PathBuf>,

    /// Stop after one invocation
    #[arg(long)]
    single_loop: bool,

    /// Print every registered handler specifier and exit
    #[arg(long)]
    list_handlers: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env: HashMap<String, String> = std::env::vars().collect();

    // Diagnostics go to stderr; stdout carries handler log lines.
    match LogFormat::from_env_map(&env) {
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(EnvFilter::from_env("RUNWAY_LOG"))
            .with_writer(std::io::stderr)
            .init(),
        LogFormat::Text => fmt()
            .with_env_filter(EnvFilter::from_env("RUNWAY_LOG"))
            .with_writer(std::io::stderr)
            .init(),
    }

    let mut config = RuntimeConfig::from_env_map(&env)?;
    let registry = handlers::registry();

    if cli.list_handlers {
        for specifier in registry.specifiers() {
            println!("{specifier}");
        }
        return Ok(());
    }

    if let Some(handler) = cli.handler {
        config.handler = Some(handler);
    }
    if let Some(path) = &cli.event_file {
        let event = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read event file {}", path.display()))?;
        config.local_event = Some(event);
    }
    if cli.single_loop {
        config.single_loop = true;
    }

    tracing::info!(
        handler = config.handler.as_deref().unwrap_or("-"),
        endpoint = config.endpoint.as_ref().map(|e| e.authority()).unwrap_or("offline"),
        "Starting runway bootstrap"
    );

    Runtime::new(config, registry).run().await?;

    tracing::info!("runway bootstrap shutting down");
    Ok(())
}
