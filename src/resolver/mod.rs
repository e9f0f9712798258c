//! Module resolution
//!
//! Extracts import specifiers from scripts and `url(...)` references from
//! stylesheets, and resolves them against aliases, relative paths and the
//! configured extensions.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::config::{Alias, BuildConfig};
use crate::error::EngineError;

/// Regex patterns for extracting imports
static IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:import|export)\s+(?:(?:\{[^}]*\}|\*\s+as\s+\w+|\w+(?:\s*,\s*\{[^}]*\})?)\s+from\s+)?["']([^"']+)["']|require\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static DYNAMIC_IMPORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"import\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap()
});

static CSS_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^'")\s]+))\s*\)"#).unwrap()
});

/// How a specifier was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `import` / `require` in a script
    Script,
    /// `url(...)` in a stylesheet; bare paths are relative
    Style,
}

/// Outcome of resolving a specifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A file on disk, plus the query string (with `?`) if any
    File { path: PathBuf, query: String },
    /// Left to the runtime (bare package names, remote URLs, data URIs)
    External,
}

/// A `url(...)` occurrence inside a stylesheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    /// Byte range of the whole `url(...)` token
    pub span: std::ops::Range<usize>,
    pub specifier: String,
}

/// Module resolver
pub struct Resolver {
    /// Aliases, longest name first
    aliases: Vec<Alias>,
    extensions: Vec<String>,
}

impl Resolver {
    /// Create a new resolver
    pub fn new(config: &BuildConfig) -> Self {
        let mut aliases = config.aliases.0.clone();
        aliases.sort_by(|a, b| b.name.len().cmp(&a.name.len()));

        Self {
            aliases,
            extensions: config.extensions.clone(),
        }
    }

    /// Extract import/require dependencies from script source, in order of
    /// first appearance
    pub fn extract_dependencies(&self, source: &str) -> Vec<String> {
        let mut dependencies = Vec::new();

        for cap in IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1).or_else(|| cap.get(2)) {
                let spec = specifier.as_str().to_string();
                if !dependencies.contains(&spec) {
                    dependencies.push(spec);
                }
            }
        }

        for cap in DYNAMIC_IMPORT_REGEX.captures_iter(source) {
            if let Some(specifier) = cap.get(1) {
                let spec = specifier.as_str().to_string();
                if !dependencies.contains(&spec) {
                    dependencies.push(spec);
                }
            }
        }

        debug!("Found {} dependencies", dependencies.len());

        dependencies
    }

    /// Find `url(...)` references in a stylesheet
    pub fn extract_css_urls(&self, source: &str) -> Vec<CssUrl> {
        CSS_URL_REGEX
            .captures_iter(source)
            .filter_map(|cap| {
                let whole = cap.get(0)?;
                let spec = cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3))?;
                Some(CssUrl {
                    span: whole.range(),
                    specifier: spec.as_str().trim().to_string(),
                })
            })
            .collect()
    }

    /// Resolve a specifier requested from the file `from`
    pub fn resolve(
        &self,
        specifier: &str,
        from: &Path,
        kind: RequestKind,
    ) -> Result<Resolution, EngineError> {
        debug!("Resolving '{}' from '{}'", specifier, from.display());

        if is_external(specifier) {
            return Ok(Resolution::External);
        }

        let (request, query) = split_query(specifier);
        let base_dir = from.parent().unwrap_or(Path::new("."));

        let target = if let Some(aliased) = self.apply_alias(request) {
            aliased
        } else if request.starts_with('.') || request.starts_with('/') {
            base_dir.join(request)
        } else if kind == RequestKind::Style {
            base_dir.join(request.trim_start_matches('~'))
        } else {
            debug!("Skipping bare specifier: {}", request);
            return Ok(Resolution::External);
        };

        match self.resolve_file(&target) {
            Some(path) => {
                debug!("Resolved to: {}", path.display());
                Ok(Resolution::File {
                    path: crate::utils::normalize_path(base_dir, &path),
                    query: query.to_string(),
                })
            }
            None => Err(EngineError::new(format!(
                "Module not found: can't resolve '{}' in '{}'",
                specifier,
                base_dir.display()
            ))),
        }
    }

    fn apply_alias(&self, request: &str) -> Option<PathBuf> {
        self.aliases.iter().find_map(|alias| {
            if request == alias.name {
                Some(alias.target.clone())
            } else {
                request
                    .strip_prefix(alias.name.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                    .map(|rest| alias.target.join(rest))
            }
        })
    }

    /// Try the exact path, then each extension, then `index` + extension
    fn resolve_file(&self, target: &Path) -> Option<PathBuf> {
        if target.is_file() {
            return Some(target.to_path_buf());
        }

        for ext in &self.extensions {
            let mut with_ext = target.as_os_str().to_owned();
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }

        if target.is_dir() {
            for ext in &self.extensions {
                let index = target.join(format!("index{}", ext));
                if index.is_file() {
                    return Some(index);
                }
            }
        }

        None
    }
}

fn is_external(specifier: &str) -> bool {
    specifier.is_empty()
        || specifier.starts_with('#')
        || specifier.starts_with("//")
        || specifier.starts_with("data:")
        || specifier.contains("://")
}

/// Split `./a.png?v=1` into `./a.png` and `?v=1`
pub fn split_query(specifier: &str) -> (&str, &str) {
    match specifier.find('?') {
        Some(index) => specifier.split_at(index),
        None => (specifier, ""),
    }
}
