//! Build command implementation

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::assembler::Assembler;
use crate::bundler::BuildResult;
use crate::config::{BuildConfig, Mode};
use crate::error::AssemblerError;
use crate::utils::{format_duration, format_size, normalize_path, relative_slash_path};

/// Build the project
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Override the configured mode
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Keep running and rebuild on changes
    #[arg(short, long, overrides_with = "no_watch")]
    pub watch: bool,

    /// Build once even if the configuration enables watching
    #[arg(long, overrides_with = "watch")]
    pub no_watch: bool,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
}

impl BuildCommand {
    /// `Some(true)` for `--watch`, `Some(false)` for `--no-watch`
    pub fn watch_override(&self) -> Option<bool> {
        match (self.watch, self.no_watch) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }

    fn apply_overrides(&self, config: &mut BuildConfig) -> Result<()> {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(watch) = self.watch_override() {
            config.watch = watch;
        }
        if let Some(outdir) = &self.outdir {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            config.output_dir = normalize_path(&cwd, outdir);
        }
        Ok(())
    }

    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let assembler = Assembler::new();

        info!("Loading configuration from {}", config_path);
        let mut config = assembler.load(config_path)?;
        self.apply_overrides(&mut config)?;
        let config = assembler.validate(config)?;

        eprintln!(
            "{} Building {} in {} mode...",
            "→".blue(),
            relative_slash_path(&config.root, &config.entry).cyan(),
            config.mode
        );

        let spinner = spinner();
        let result = {
            let assembler = assembler.clone();
            let config = config.clone();
            tokio::task::spawn_blocking(move || assembler.submit(&config))
                .await
                .context("Build task failed")?
        };
        spinner.finish_and_clear();

        if !config.watch {
            let result = result?;
            print_result(&config, &result);
            return Ok(());
        }

        // A failed first pass still leaves the watcher running
        report(&config, result);

        let config = Arc::new(config);
        let shared = config.clone();
        let handle = assembler.watch(
            config,
            Box::new(move |result: Result<BuildResult, AssemblerError>| report(&shared, result)),
        )?;
        eprintln!(
            "{} Watching for changes {}",
            "👀".cyan(),
            "(press Ctrl+C to stop)".dimmed()
        );

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")?;
        eprintln!("\n{} Stopping...", "→".blue());
        handle.cancel();
        handle.join();
        Ok(())
    }
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.set_message("bundling".dimmed().to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn report(config: &BuildConfig, result: Result<BuildResult, AssemblerError>) {
    match result {
        Ok(result) => print_result(config, &result),
        Err(err) => eprintln!("\n{} {}\n", "✗".red().bold(), err),
    }
}

fn print_result(config: &BuildConfig, result: &BuildResult) {
    eprintln!(
        "\n{} Built {} file(s) from {} module(s) in {}\n",
        "✓".green().bold(),
        result.artifacts.len(),
        result.modules,
        format_duration(result.duration)
    );

    for artifact in &result.artifacts {
        eprintln!(
            "  {} {} {}",
            "•".dimmed(),
            relative_slash_path(&config.root, &artifact.path).cyan(),
            format_size(artifact.size).dimmed()
        );
    }

    eprintln!();
}
