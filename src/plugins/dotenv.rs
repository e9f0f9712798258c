//! Replaces `process.env.KEY` with values from a `.env` file

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::{Plugin, TransformResult};
use crate::bundler::Compilation;
use crate::config::DotenvOptions;
use crate::error::EngineError;

static PROCESS_ENV: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bprocess\.env\.([A-Za-z_$][A-Za-z0-9_$]*)").unwrap());

pub struct DotenvPlugin {
    options: DotenvOptions,
    vars: BTreeMap<String, String>,
}

impl DotenvPlugin {
    pub fn new(options: DotenvOptions) -> Self {
        Self {
            options,
            vars: BTreeMap::new(),
        }
    }

    fn substitute(&self, code: &str) -> Option<String> {
        if !PROCESS_ENV.is_match(code) {
            return None;
        }
        let replaced = PROCESS_ENV.replace_all(code, |caps: &Captures<'_>| match self.vars.get(&caps[1]) {
            Some(value) => serde_json::Value::String(value.clone()).to_string(),
            None => "undefined".to_string(),
        });
        Some(replaced.into_owned())
    }
}

impl Plugin for DotenvPlugin {
    fn name(&self) -> &str {
        "dotenv"
    }

    fn build_start(&mut self, _compilation: &Compilation<'_>) -> Result<(), EngineError> {
        self.vars = read_env_file(&self.options.path)?;
        if self.options.system_vars {
            self.vars.extend(unicode_vars(std::env::vars_os()));
        }
        debug!("Loaded {} environment variables", self.vars.len());
        Ok(())
    }

    fn transform(&self, code: &str, _id: &str) -> Result<TransformResult, EngineError> {
        Ok(match self.substitute(code) {
            Some(code) => TransformResult::Transformed(code),
            None => TransformResult::Skip,
        })
    }
}

/// Process environment entries whose key and value are both valid UTF-8
fn unicode_vars(
    vars: impl IntoIterator<Item = (OsString, OsString)>,
) -> impl Iterator<Item = (String, String)> {
    vars.into_iter().filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
        (Ok(key), Ok(value)) => Some((key, value)),
        (Err(key), _) => {
            debug!("Skipping non-UTF-8 environment variable {:?}", key);
            None
        }
        (Ok(key), Err(_)) => {
            debug!("Skipping environment variable {} with a non-UTF-8 value", key);
            None
        }
    })
}

/// Read a `.env` file; a missing file is an empty set and malformed lines are
/// skipped
fn read_env_file(path: &Path) -> Result<BTreeMap<String, String>, EngineError> {
    let iter = match dotenvy::from_path_iter(path) {
        Ok(iter) => iter,
        Err(err) if err.not_found() => {
            debug!("No env file at {}", path.display());
            return Ok(BTreeMap::new());
        }
        Err(err) => {
            return Err(EngineError::new(format!(
                "failed to read {}: {}",
                path.display(),
                err
            )))
        }
    };

    let mut vars = BTreeMap::new();
    for item in iter {
        match item {
            Ok((key, value)) => {
                vars.insert(key, value);
            }
            Err(err) => warn!("Skipping malformed line in {}: {}", path.display(), err),
        }
    }
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn plugin_with(vars: &[(&str, &str)]) -> DotenvPlugin {
        let mut plugin = DotenvPlugin::new(DotenvOptions::default());
        plugin.vars = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        plugin
    }

    #[test]
    fn test_substitutes_known_and_unknown_keys() {
        let plugin = plugin_with(&[("API", "https://api.example.com/\"v1\"")]);
        let code = "fetch(process.env.API); log(process.env.MISSING);";

        assert_eq!(
            plugin.substitute(code).unwrap(),
            "fetch(\"https://api.example.com/\\\"v1\\\"\"); log(undefined);"
        );
        assert!(plugin.substitute("const a = 1;").is_none());
    }

    #[test]
    fn test_read_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "API=https://randomuser.me/api/\n# comment\nQUOTED=\"a b\"\n").unwrap();

        let vars = read_env_file(&path).unwrap();
        assert_eq!(vars.get("API").map(String::as_str), Some("https://randomuser.me/api/"));
        assert_eq!(vars.get("QUOTED").map(String::as_str), Some("a b"));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_system_vars_are_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("API"), OsString::from("https://api.example.com")),
            (OsString::from("BROKEN"), OsString::from_vec(vec![0x66, 0xff, 0x6f])),
            (OsString::from_vec(vec![0xfe, 0x41]), OsString::from("x")),
        ];

        let kept: Vec<_> = unicode_vars(vars).collect();
        assert_eq!(
            kept,
            vec![("API".to_string(), "https://api.example.com".to_string())]
        );
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let vars = read_env_file(&dir.path().join(".env")).unwrap();
        assert!(vars.is_empty());
    }
}
