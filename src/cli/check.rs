//! Check command implementation

use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;

use crate::assembler::Assembler;
use crate::error::AssemblerError;

/// Validate the configuration
#[derive(Args, Debug)]
pub struct CheckCommand {}

impl CheckCommand {
    pub fn execute(&self, config_path: &str) -> Result<()> {
        let assembler = Assembler::new();
        let config = assembler.load(config_path)?;

        match assembler.validate(config) {
            Ok(config) => {
                eprintln!(
                    "{} {} is valid ({} rule(s), {} plugin(s))",
                    "✓".green().bold(),
                    config_path.cyan(),
                    config.rules.len(),
                    config.plugins.len()
                );
                Ok(())
            }
            Err(AssemblerError::Validation(err)) => {
                eprintln!("{} {} is invalid:\n", "✗".red().bold(), config_path.cyan());
                for issue in &err.issues {
                    eprintln!("  {} {}", "•".red(), issue);
                }
                eprintln!();
                bail!("{} issue(s) found", err.issues.len())
            }
            Err(err) => Err(err.into()),
        }
    }
}
