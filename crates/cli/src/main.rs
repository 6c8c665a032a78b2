// livecode CLI entry point.

use std::io::ErrorKind;

use clap::Parser;
use livecode_session::config::{config_path, ClientConfig, ConfigError};
use tracing_subscriber::EnvFilter;

use crate::output::OutputFormat;

mod commands;
mod output;

#[derive(Parser)]
#[command(name = "livecode", about = "Collaborative multi-language coding workspaces")]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config().apply_env_overrides();

    // Logs go to stderr so JSON on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    commands::run(cli.command, config)
}

/// A missing file means defaults; an unreadable one is reported and then
/// ignored.
fn load_config() -> ClientConfig {
    let Some(path) = config_path() else {
        return ClientConfig::default();
    };
    match ClientConfig::load_from(&path) {
        Ok(config) => config,
        Err(ConfigError::Io(error)) if error.kind() == ErrorKind::NotFound => {
            ClientConfig::default()
        }
        Err(error) => {
            output::print_warning(
                OutputFormat::detect_from_terminal(true),
                "CONFIG_INVALID",
                &format!("{error}; using defaults (run: livecode config init --force)"),
            );
            ClientConfig::default()
        }
    }
}
