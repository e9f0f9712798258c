//! Configuration assembler
//!
//! Entry point of the library: loads and validates a configuration, then
//! hands it to a build engine once per invocation or once per change in
//! watch mode.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::bundler::{BuildEngine, BuildResult, Bundler};
use crate::config::{self, BuildConfig};
use crate::error::{AssemblerError, Result};
use crate::watch::{self, RebuildCallback, WatchHandle};

/// Submits configurations to a build engine
#[derive(Clone)]
pub struct Assembler {
    engine: Arc<dyn BuildEngine>,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    /// Assembler backed by the built-in [`Bundler`]
    pub fn new() -> Self {
        Self::with_engine(Arc::new(Bundler::new()))
    }

    pub fn with_engine(engine: Arc<dyn BuildEngine>) -> Self {
        Self { engine }
    }

    /// Read and resolve a configuration file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<BuildConfig> {
        config::load(path)
    }

    /// Check every invariant, reporting all violations at once
    pub fn validate(&self, config: BuildConfig) -> Result<BuildConfig> {
        config::validate(config)
    }

    /// Run a single build pass
    pub fn submit(&self, config: &BuildConfig) -> Result<BuildResult> {
        info!("Building {} ({})", config.entry.display(), config.mode);
        let result = self.engine.run(config)?;
        info!(
            "Wrote {} files from {} modules",
            result.artifacts.len(),
            result.modules
        );
        Ok(result)
    }

    /// Rebuild on every relevant change under the project root.
    ///
    /// The configuration is re-validated before each pass. Failures go to
    /// `on_rebuild` and do not end the subscription.
    pub fn watch(&self, config: Arc<BuildConfig>, on_rebuild: RebuildCallback) -> Result<WatchHandle> {
        if !config.watch {
            return Err(AssemblerError::WatchDisabled);
        }
        watch::watch(self.engine.clone(), config, on_rebuild)
    }
}
