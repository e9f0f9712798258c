//! Configuration handling
//!
//! Loads `assembler.toml` (or a `.json` equivalent), resolves every relative
//! path against the directory containing the file and checks the result.

mod schema;
mod validate;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{AssemblerError, Result};
use crate::utils::{normalize_path, relative_slash_path};

pub use schema::*;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "assembler.toml";

/// Fully resolved build configuration.
///
/// Built once by [`load`] and never mutated afterwards; watch mode shares a
/// single instance across passes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildConfig {
    /// Directory containing the configuration file
    pub root: PathBuf,

    /// Absolute path of the entry script
    pub entry: PathBuf,

    /// Absolute output directory
    pub output_dir: PathBuf,

    /// Script filename pattern
    pub output_filename: String,

    /// Filename pattern for `asset-resource` modules
    pub asset_filename: String,

    pub mode: Mode,

    pub watch: bool,

    /// Aliases with absolute targets, in declaration order
    pub aliases: AliasList,

    /// Extensions tried for extension-less imports
    pub extensions: Vec<String>,

    pub rules: Vec<RuleSpec>,

    pub plugins: Vec<PluginSpec>,
}

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Format::Json,
            _ => Format::Toml,
        }
    }
}

/// Load a configuration file and resolve its paths.
///
/// Fails with `ConfigNotFound` when the file is missing, `ConfigParse` when it
/// is malformed and `InvalidPath` when the entry script does not exist.
pub fn load<P: AsRef<Path>>(path: P) -> Result<BuildConfig> {
    let path = path.as_ref();
    let path = normalize_path(&std::env::current_dir()?, path);

    let content = fs::read_to_string(&path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => AssemblerError::ConfigNotFound { path: path.clone() },
        _ => AssemblerError::Io(err),
    })?;

    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let file = parse(&content, Format::from_path(&path)).map_err(|message| {
        AssemblerError::ConfigParse {
            path: path.clone(),
            message,
        }
    })?;

    debug!("Parsed configuration from {}", path.display());

    BuildConfig::resolve(file, root)
}

/// Parse configuration text without touching the file system
pub fn parse(content: &str, format: Format) -> std::result::Result<ConfigFile, String> {
    match format {
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
    }
}

/// Check every invariant and hand the configuration back on success
pub fn validate(config: BuildConfig) -> Result<BuildConfig> {
    config.check()?;
    Ok(config)
}

impl BuildConfig {
    /// Turn a parsed file into a configuration rooted at `root`
    pub fn resolve(file: ConfigFile, root: PathBuf) -> Result<Self> {
        let entry = normalize_path(&root, Path::new(&file.entry));
        if !entry.is_file() {
            return Err(AssemblerError::InvalidPath {
                field: "entry".to_string(),
                path: entry,
            });
        }

        let aliases = file
            .resolve
            .alias
            .0
            .into_iter()
            .map(|alias| Alias {
                target: normalize_path(&root, &alias.target),
                name: alias.name,
            })
            .collect();

        let plugins = file
            .plugins
            .into_iter()
            .map(|plugin| resolve_plugin_paths(plugin, &root))
            .collect();

        Ok(Self {
            output_dir: normalize_path(&root, Path::new(&file.output.dir)),
            entry,
            output_filename: file.output.filename,
            asset_filename: file.output.asset_filename,
            mode: file.mode,
            watch: file.watch,
            aliases: AliasList(aliases),
            extensions: file.resolve.extensions,
            rules: file.rules,
            plugins,
            root,
        })
    }

    /// Index of the first rule that applies to `path`.
    ///
    /// Patterns see the path relative to the project root, the same string
    /// used as the module id.
    pub fn rule_for(&self, path: &Path) -> Option<usize> {
        let path = relative_slash_path(&self.root, path);
        self.rules.iter().position(|rule| rule.matches(&path))
    }

    /// Options of the css-extract plugin, if one is configured
    pub fn css_extract(&self) -> Option<&CssExtractOptions> {
        self.plugins.iter().find_map(|plugin| match plugin {
            PluginSpec::CssExtract(options) => Some(options),
            _ => None,
        })
    }
}

fn resolve_plugin_paths(plugin: PluginSpec, root: &Path) -> PluginSpec {
    match plugin {
        PluginSpec::Html(mut options) => {
            options.template = options.template.map(|t| normalize_path(root, &t));
            PluginSpec::Html(options)
        }
        PluginSpec::Copy(mut options) => {
            for pattern in &mut options.patterns {
                pattern.from = normalize_path(root, &pattern.from);
            }
            PluginSpec::Copy(options)
        }
        PluginSpec::Dotenv(mut options) => {
            options.path = normalize_path(root, &options.path);
            PluginSpec::Dotenv(options)
        }
        other => other,
    }
}
