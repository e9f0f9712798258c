//! Inspect command implementation

use anyhow::{Context, Result};
use clap::Args;

use crate::assembler::Assembler;

/// Print the resolved configuration
#[derive(Args, Debug)]
pub struct InspectCommand {
    /// Also run validation before printing
    #[arg(long)]
    pub validate: bool,
}

impl InspectCommand {
    pub fn execute(&self, config_path: &str) -> Result<()> {
        let assembler = Assembler::new();
        let mut config = assembler.load(config_path)?;
        if self.validate {
            config = assembler.validate(config)?;
        }

        let json = serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?;
        println!("{}", json);
        Ok(())
    }
}
