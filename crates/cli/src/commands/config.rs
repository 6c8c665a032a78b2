// `livecode config`: inspect and initialize `~/.livecode/config.toml`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use livecode_session::config::{config_path, ClientConfig};
use serde::Serialize;

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective config (file values plus LIVECODE_* overrides)
    Show(ShowArgs),
    /// Print the config file location
    Path,
    /// Write a config file with default values
    Init(InitArgs),
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    force: bool,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    pub path: String,
    pub overwritten: bool,
}

pub fn run(args: ConfigArgs, config: ClientConfig) -> anyhow::Result<()> {
    match args.action {
        ConfigAction::Show(show) => {
            let format = OutputFormat::detect(show.json);
            output::print_output(format, &config, format_config)?;
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", resolve_config_path()?.display());
            Ok(())
        }
        ConfigAction::Init(init) => {
            let format = OutputFormat::detect(init.json);
            match write_default_config(&resolve_config_path()?, init.force) {
                Ok(result) => {
                    output::print_output(format, &result, |r| {
                        let verb = if r.overwritten { "Overwrote" } else { "Wrote" };
                        format!("{verb} {}", r.path)
                    })?;
                    Ok(())
                }
                Err(error) => {
                    output::print_anyhow_error(format, &error);
                    Err(error)
                }
            }
        }
    }
}

fn resolve_config_path() -> anyhow::Result<PathBuf> {
    config_path().context("could not determine home directory")
}

// ── Public API (for testing) ────────────────────────────────────────

pub fn write_default_config(path: &Path, force: bool) -> anyhow::Result<InitResult> {
    let exists = path.exists();
    if exists && !force {
        bail!("config already exists at {}; pass --force to overwrite", path.display());
    }
    ClientConfig::default()
        .save_to(path)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(InitResult { path: path.display().to_string(), overwritten: exists })
}

fn format_config(config: &ClientConfig) -> String {
    toml::to_string_pretty(config).unwrap_or_else(|error| format!("<unprintable config: {error}>"))
}
