//! # kahla-notify
//!
//! Kahla notifier binary: loads settings, then runs the client until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kahla_notify::Client;
use kahla_settings::{DEFAULT_SETTINGS_FILE, load_settings, write_template};
use tokio_util::sync::CancellationToken;

/// Kahla push notification client.
#[derive(Parser, Debug)]
#[command(name = "kahla-notify", about = "Kahla push notification client")]
struct Cli {
    /// Path to the JSON settings file. Created from a template if missing.
    #[arg(long, short, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if !args.config.exists() {
        write_template(&args.config).with_context(|| {
            format!("Failed to write settings template: {}", args.config.display())
        })?;
        eprintln!(
            "Please input your email and password in: {}",
            args.config.display()
        );
        return Ok(());
    }

    let settings = load_settings(&args.config)
        .with_context(|| format!("Failed to load settings: {}", args.config.display()))?;
    kahla_logging::init_subscriber_with_format(&settings.log_level, settings.log_format);

    let client = Client::new(settings).context("Failed to create client")?;
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    let _signal = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutting down...");
                shutdown.cancel();
            }
            Err(error) => tracing::warn!(%error, "Failed to listen for ctrl-c"),
        }
    });

    client.run(cancel).await.context("Client stopped")?;
    tracing::info!("Shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_default_config() {
        let cli = Cli::parse_from(["kahla-notify"]);
        assert_eq!(cli.config, PathBuf::from("config.json"));
    }

    #[test]
    fn cli_config_flag() {
        let cli = Cli::parse_from(["kahla-notify", "--config", "/etc/kahla.json"]);
        assert_eq!(cli.config, PathBuf::from("/etc/kahla.json"));
        let cli = Cli::parse_from(["kahla-notify", "-c", "local.json"]);
        assert_eq!(cli.config, PathBuf::from("local.json"));
    }
}
