//! Command-line interface
//!
//! Subcommands:
//! - `build`: one build pass, or a watch session
//! - `check`: load and validate a configuration
//! - `inspect`: print the resolved configuration
//! - `init`: project scaffolding

mod build;
mod check;
mod init;
mod inspect;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::BuildCommand;
pub use check::CheckCommand;
pub use init::InitCommand;
pub use inspect::InspectCommand;

use crate::config::DEFAULT_CONFIG_FILE;

/// Assembler - load, validate and run declarative bundler configurations
#[derive(Parser, Debug)]
#[command(name = "assembler")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file (TOML, or JSON with a .json extension)
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the project
    Build(BuildCommand),

    /// Validate the configuration and list every problem
    Check(CheckCommand),

    /// Print the resolved configuration as JSON
    Inspect(InspectCommand),

    /// Initialize a new project
    Init(InitCommand),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        if !matches!(self.command, Commands::Inspect(_)) {
            print_banner();
        }

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Check(cmd) => cmd.execute(&self.config),
            Commands::Inspect(cmd) => cmd.execute(&self.config),
            Commands::Init(cmd) => cmd.execute(),
        }
    }
}

fn print_banner() {
    eprintln!(
        "\n{} {} {}\n",
        "⚡".cyan(),
        "Assembler".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
