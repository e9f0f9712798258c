//! Copies static files into the output directory

use std::fs;
use std::path::Path;

use tracing::debug;
use walkdir::WalkDir;

use super::Plugin;
use crate::bundler::Compilation;
use crate::config::{CopyOptions, CopyPattern};
use crate::error::EngineError;
use crate::utils::relative_slash_path;

pub struct CopyPlugin {
    options: CopyOptions,
}

impl CopyPlugin {
    pub fn new(options: CopyOptions) -> Self {
        Self { options }
    }
}

impl Plugin for CopyPlugin {
    fn name(&self) -> &str {
        "copy"
    }

    fn emit(&mut self, compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        for pattern in &self.options.patterns {
            copy_pattern(pattern, compilation)?;
        }
        Ok(())
    }
}

fn copy_pattern(pattern: &CopyPattern, compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
    let from = &pattern.from;
    let to = pattern.to.trim_end_matches('/');

    if from.is_file() {
        let name = from.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        let dest = if to.is_empty() {
            name.to_string()
        } else if pattern.to.ends_with('/') {
            format!("{}/{}", to, name)
        } else {
            to.to_string()
        };
        return emit(compilation, from, &dest);
    }

    if !from.is_dir() {
        return Err(EngineError::new(format!(
            "copy source does not exist: {}",
            from.display()
        )));
    }

    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| EngineError::new(format!("failed to walk {}: {}", from.display(), e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = relative_slash_path(from, entry.path());
        let dest = if to.is_empty() {
            relative
        } else {
            format!("{}/{}", to, relative)
        };
        emit(compilation, entry.path(), &dest)?;
    }
    Ok(())
}

fn emit(compilation: &mut Compilation<'_>, source: &Path, dest: &str) -> Result<(), EngineError> {
    debug!("Copying {} -> {}", source.display(), dest);
    let bytes = fs::read(source)
        .map_err(|e| EngineError::new(format!("failed to read {}: {}", source.display(), e)))?;
    compilation.emit_file(dest, bytes)
}
