// CLI subcommand dispatch.

use clap::Subcommand;
use livecode_session::config::ClientConfig;

pub mod config;
pub mod demo;

#[derive(Subcommand)]
pub enum Command {
    /// Walk two collaborators through a shared workspace on an in-process store
    Demo(demo::DemoArgs),
    /// Show or initialize the client config
    Config(config::ConfigArgs),
}

pub fn run(cmd: Command, config: ClientConfig) -> anyhow::Result<()> {
    match cmd {
        Command::Demo(args) => demo::run(args, config),
        Command::Config(args) => config::run(args, config),
    }
}
