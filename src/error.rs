//! Error types for the assembler
//!
//! Configuration errors (`ConfigNotFound`, `ConfigParse`, `InvalidPath`,
//! `Validation`) are raised before any build pass starts. Engine errors are
//! raised during a pass and may leave partial output behind.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T, E = AssemblerError> = std::result::Result<T, E>;

/// Top-level error type
#[derive(Debug, Error)]
pub enum AssemblerError {
    /// The configuration file does not exist
    #[error("configuration file not found: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    /// The configuration file could not be parsed
    #[error("failed to parse {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    /// A path in the configuration does not resolve to an existing file
    #[error("{field} points to a missing file: {}", .path.display())]
    InvalidPath { field: String, path: PathBuf },

    /// One or more configuration invariants are violated
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The build engine failed during a pass
    #[error(transparent)]
    BuildEngine(#[from] EngineError),

    /// `watch` was requested for a configuration with watching turned off
    #[error("watch mode is disabled in this configuration")]
    WatchDisabled,

    /// The file watcher could not be set up
    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single violated configuration invariant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    #[error("alias '{name}' is defined more than once (entries {indices:?})")]
    DuplicateAlias { name: String, indices: Vec<usize> },

    #[error("at least one module rule is required")]
    NoRules,

    #[error("rules {indices:?} share the same test pattern `{pattern}`")]
    DuplicateRulePattern { pattern: String, indices: Vec<usize> },

    #[error("rule {rule} has an empty `use` chain")]
    EmptyHandlerChain { rule: usize },

    #[error("rule {rule}: step `{step}` {reason}")]
    MisplacedStep {
        rule: usize,
        step: &'static str,
        reason: &'static str,
    },

    #[error("rule {rule} uses `css-extract` but no css-extract plugin is configured")]
    MissingCssExtractPlugin { rule: usize },

    #[error("{field} pattern '{pattern}' is malformed: {reason}")]
    MalformedPattern {
        field: String,
        pattern: String,
        reason: String,
    },

    #[error("{field} pattern '{pattern}' must contain {expected}")]
    MissingPlaceholder {
        field: String,
        pattern: String,
        expected: &'static str,
    },

    #[error("plugins {indices:?} are all `{kind}` plugins; only one is allowed")]
    DuplicatePlugin {
        kind: &'static str,
        indices: Vec<usize>,
    },

    #[error("html plugins {indices:?} all write '{filename}'")]
    DuplicateHtmlOutput {
        filename: String,
        indices: Vec<usize>,
    },

    #[error("plugin {plugin}: copy destination '{to}' must be relative to the output directory")]
    AbsoluteCopyDestination { plugin: usize, to: String },

    #[error("entry file no longer exists: {}", .path.display())]
    EntryMissing { path: PathBuf },
}

/// Every invariant violation found in a single validation pass
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration is invalid ({} issue", self.issues.len())?;
        if self.issues.len() != 1 {
            write!(f, "s")?;
        }
        write!(f, ")")?;
        for issue in &self.issues {
            write!(f, "\n  - {}", issue)?;
        }
        Ok(())
    }
}

/// Failure reported by a build engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct EngineError {
    /// Engine diagnostic
    pub message: String,

    /// Index of the module rule that failed, if known
    pub rule: Option<usize>,

    /// Name of the plugin that failed, if known
    pub plugin: Option<String>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            rule: None,
            plugin: None,
        }
    }

    pub fn in_rule(mut self, rule: usize) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn in_plugin(mut self, plugin: impl Into<String>) -> Self {
        self.plugin = Some(plugin.into());
        self
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build failed")?;
        match (&self.plugin, self.rule) {
            (Some(plugin), _) => write!(f, " in plugin `{}`", plugin)?,
            (None, Some(rule)) => write!(f, " in rule {}", rule)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.message)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_every_issue() {
        let err = ValidationError {
            issues: vec![
                ValidationIssue::NoRules,
                ValidationIssue::DuplicateAlias {
                    name: "@utils".to_string(),
                    indices: vec![0, 2],
                },
            ],
        };

        let message = err.to_string();
        assert!(message.starts_with("configuration is invalid (2 issues)"));
        assert!(message.contains("at least one module rule"));
        assert!(message.contains("'@utils'"));
    }

    #[test]
    fn test_engine_error_context() {
        let err = EngineError::new("template missing").in_plugin("html");
        assert_eq!(err.to_string(), "build failed in plugin `html`: template missing");

        let err = EngineError::new("bad input").in_rule(3);
        assert_eq!(err.to_string(), "build failed in rule 3: bad input");
    }
}
