//! yapnet chat server entry point
//!
//! Parses the command line, loads the configuration file, starts the event
//! loop and the listener, and runs until SIGINT/SIGTERM.

mod cli;
mod config;
mod signals;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::info;
use yapnet_server::{bind, serve, setup_logging, Server};

use crate::cli::Args;
use crate::config::AppConfig;
use crate::signals::setup_signal_handlers;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let (mut config, created) = AppConfig::load_from_file(&args.config)
        .await
        .with_context(|| format!("loading {}", args.config.display()))?;
    config.apply_args(&args);
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;

    setup_logging(&config.logging.level, config.logging.json_format)?;
    if created {
        info!("📝 Created default configuration file: {}", args.config.display());
    }

    let server_config = config.to_server_config()?;
    info!("🚀 Starting yapnet v{}", env!("CARGO_PKG_VERSION"));
    info!("📂 Config: {}", args.config.display());
    info!(
        "💬 Chats: {}",
        config
            .chats
            .iter()
            .map(|chat| chat.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let listener = bind(server_config.bind_address)?;
    let (server, handle) = Server::new(server_config.clone())?;
    let event_loop = tokio::spawn(server.run());

    tokio::select! {
        result = serve(listener, handle, &server_config) => result?,
        result = setup_signal_handlers() => {
            result?;
            info!("🛑 Shutdown signal received");
        }
    }

    event_loop.abort();
    info!("👋 yapnet stopped");
    Ok(())
}
