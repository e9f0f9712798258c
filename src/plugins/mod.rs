//! Plugin system
//!
//! Plugins hook into a build pass at fixed phases: `build_start` before the
//! module graph is walked, `transform` for every script module, `render` once
//! scripts are rendered and `emit` last. Hooks run in the order the plugins
//! are listed in the configuration.

mod copy;
mod css_extract;
mod dotenv;
mod html;

use tracing::debug;

use crate::bundler::Compilation;
use crate::config::PluginSpec;
use crate::error::EngineError;

pub use copy::CopyPlugin;
pub use css_extract::CssExtractPlugin;
pub use dotenv::DotenvPlugin;
pub use html::HtmlPlugin;

/// Result of a transform hook
pub enum TransformResult {
    /// Leave the code unchanged
    Skip,
    /// Replacement code
    Transformed(String),
}

/// A build plugin. Every hook defaults to a no-op.
pub trait Plugin: Send {
    /// Plugin name for logging and error attribution
    fn name(&self) -> &str;

    /// Called before the module graph is built
    fn build_start(&mut self, _compilation: &Compilation<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    /// Transform the code of a script module
    fn transform(&self, _code: &str, _id: &str) -> Result<TransformResult, EngineError> {
        Ok(TransformResult::Skip)
    }

    /// Called after the script chunk is rendered
    fn render(&mut self, _compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        Ok(())
    }

    /// Called last; add final output files here
    fn emit(&mut self, _compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Plugin manager
#[derive(Default)]
pub struct PluginManager {
    plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
    /// Create an empty plugin manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Instantiate the configured plugins, keeping their order
    pub fn from_specs(specs: &[PluginSpec]) -> Self {
        let mut manager = Self::new();
        for spec in specs {
            let plugin: Box<dyn Plugin> = match spec {
                PluginSpec::Html(options) => Box::new(HtmlPlugin::new(options.clone())),
                PluginSpec::CssExtract(options) => Box::new(CssExtractPlugin::new(options.clone())),
                PluginSpec::Copy(options) => Box::new(CopyPlugin::new(options.clone())),
                PluginSpec::Dotenv(options) => Box::new(DotenvPlugin::new(options.clone())),
            };
            manager.register(plugin);
        }
        manager
    }

    /// Register a plugin
    pub fn register(&mut self, plugin: Box<dyn Plugin>) {
        debug!("Registering plugin: {}", plugin.name());
        self.plugins.push(plugin);
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run build_start hooks
    pub fn run_build_start(&mut self, compilation: &Compilation<'_>) -> Result<(), EngineError> {
        for plugin in &mut self.plugins {
            plugin
                .build_start(compilation)
                .map_err(|e| attribute(e, plugin.name()))?;
        }
        Ok(())
    }

    /// Run transform hooks, feeding each plugin the previous one's output
    pub fn transform(&self, code: &str, id: &str) -> Result<String, EngineError> {
        let mut current = code.to_string();
        for plugin in &self.plugins {
            match plugin
                .transform(&current, id)
                .map_err(|e| attribute(e, plugin.name()))?
            {
                TransformResult::Skip => continue,
                TransformResult::Transformed(code) => current = code,
            }
        }
        Ok(current)
    }

    /// Run render hooks
    pub fn run_render(&mut self, compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        for plugin in &mut self.plugins {
            plugin
                .render(compilation)
                .map_err(|e| attribute(e, plugin.name()))?;
        }
        Ok(())
    }

    /// Run emit hooks
    pub fn run_emit(&mut self, compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        for plugin in &mut self.plugins {
            plugin
                .emit(compilation)
                .map_err(|e| attribute(e, plugin.name()))?;
        }
        Ok(())
    }
}

fn attribute(err: EngineError, plugin: &str) -> EngineError {
    if err.plugin.is_some() {
        err
    } else {
        err.in_plugin(plugin)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::config::{
        AliasList, BuildConfig, CopyOptions, CssExtractOptions, DotenvOptions, HtmlOptions, Mode,
    };

    /// Minimal configuration rooted at `root` for driving plugin hooks
    pub(super) fn config(root: &Path, plugins: Vec<PluginSpec>) -> BuildConfig {
        BuildConfig {
            root: root.to_path_buf(),
            entry: root.join("src/index.js"),
            output_dir: root.join("dist"),
            output_filename: "[name].[contenthash].js".to_string(),
            asset_filename: "[hash][ext][query]".to_string(),
            mode: Mode::Development,
            watch: false,
            aliases: AliasList::default(),
            extensions: vec![".js".to_string()],
            rules: Vec::new(),
            plugins,
        }
    }

    struct Suffix(&'static str);

    impl Plugin for Suffix {
        fn name(&self) -> &str {
            "suffix"
        }

        fn transform(&self, code: &str, id: &str) -> Result<TransformResult, EngineError> {
            if id.ends_with(".skip.js") {
                return Ok(TransformResult::Skip);
            }
            Ok(TransformResult::Transformed(format!("{}{}", code, self.0)))
        }
    }

    struct Failing;

    impl Plugin for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn transform(&self, _code: &str, _id: &str) -> Result<TransformResult, EngineError> {
            Err(EngineError::new("boom"))
        }
    }

    #[test]
    fn test_transform_chains_in_order() {
        let mut manager = PluginManager::new();
        manager.register(Box::new(Suffix("a")));
        manager.register(Box::new(Suffix("b")));

        assert_eq!(manager.transform("x", "src/index.js").unwrap(), "xab");
        assert_eq!(manager.transform("x", "src/a.skip.js").unwrap(), "x");
    }

    #[test]
    fn test_errors_name_the_plugin() {
        let mut manager = PluginManager::new();
        manager.register(Box::new(Failing));

        let err = manager.transform("x", "src/index.js").unwrap_err();
        assert_eq!(err.plugin.as_deref(), Some("failing"));
        assert_eq!(err.message, "boom");
    }

    #[test]
    fn test_from_specs_keeps_order() {
        let manager = PluginManager::from_specs(&[
            PluginSpec::Dotenv(DotenvOptions::default()),
            PluginSpec::Html(HtmlOptions {
                template: None,
                filename: "index.html".to_string(),
                inject: true,
                title: None,
            }),
            PluginSpec::CssExtract(CssExtractOptions::default()),
            PluginSpec::Copy(CopyOptions { patterns: vec![] }),
        ]);

        let names: Vec<_> = manager.plugins.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["dotenv", "html", "css-extract", "copy"]);
        assert_eq!(manager.len(), 4);
    }
}
