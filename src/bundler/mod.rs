//! Reference build engine
//!
//! Walks the import graph from the entry, applies the first matching rule to
//! each file, renders one script chunk, runs plugins at their lifecycle
//! phases and writes everything under the output directory.

mod chunk;
mod graph;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::config::{BuildConfig, HandlerStep, UrlOptions};
use crate::error::EngineError;
use crate::filename::{ExtStyle, FilenameTemplate, PathData};
use crate::plugins::PluginManager;
use crate::resolver::{RequestKind, Resolution, Resolver};
use crate::transform;
use crate::utils::{hash_content, normalize_path, relative_slash_path};

pub use chunk::Chunk;
pub use graph::{AssetUrl, Module, ModuleGraph, ModuleId, ModuleKind, StylePart, StyleTarget};

/// Name of the single script chunk
pub const MAIN_CHUNK: &str = "main";

/// Something that turns a validated configuration into an output tree
pub trait BuildEngine: Send + Sync {
    /// Run one build pass
    fn run(&self, config: &BuildConfig) -> Result<BuildResult, EngineError>;
}

/// Result of a build pass
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Files written, in emission order
    pub artifacts: Vec<Artifact>,

    /// Number of modules in the graph
    pub modules: usize,

    pub duration: Duration,
}

/// A file written by a build pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute path
    pub path: PathBuf,

    /// Size in bytes
    pub size: usize,
}

/// A file waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Slash-separated path relative to the output directory
    pub path: String,
    pub contents: Vec<u8>,
}

/// State of one build pass, shared with plugins
pub struct Compilation<'a> {
    pub config: &'a BuildConfig,
    pub graph: ModuleGraph,

    /// Entry chunk, set once scripts are rendered
    pub chunk: Option<Chunk>,

    /// Script files to load from HTML pages (output-relative)
    pub scripts: Vec<String>,

    /// Stylesheets to link from HTML pages (output-relative)
    pub stylesheets: Vec<String>,

    files: Vec<OutputFile>,
}

impl<'a> Compilation<'a> {
    pub(crate) fn new(config: &'a BuildConfig) -> Self {
        Self {
            config,
            graph: ModuleGraph::new(),
            chunk: None,
            scripts: Vec::new(),
            stylesheets: Vec::new(),
            files: Vec::new(),
        }
    }

    /// Queue a file for writing.
    ///
    /// Emitting identical content twice is a no-op; different content for the
    /// same path is an error.
    pub fn emit_file(&mut self, path: &str, contents: Vec<u8>) -> Result<(), EngineError> {
        let path = clean_output_path(path);
        if let Some(existing) = self.files.iter().find(|f| f.path == path) {
            if existing.contents == contents {
                return Ok(());
            }
            return Err(EngineError::new(format!(
                "conflict: multiple assets emit different content to '{}'",
                path
            )));
        }

        debug!("Emitting {}", path);
        self.files.push(OutputFile { path, contents });
        Ok(())
    }

    pub fn files(&self) -> &[OutputFile] {
        &self.files
    }

    /// Stylesheet modules of the entry chunk with the given target, in order
    pub fn styles(&self, target: StyleTarget) -> Vec<&Module> {
        let Some(chunk) = &self.chunk else {
            return Vec::new();
        };
        chunk
            .module_ids
            .iter()
            .filter_map(|&id| self.graph.get_module(id))
            .filter(|m| matches!(&m.kind, ModuleKind::Style { target: t, .. } if *t == target))
            .collect()
    }
}

/// Render a stylesheet, writing asset URLs relative to `from_dir`
pub fn render_style(parts: &[StylePart], from_dir: &str) -> String {
    let mut css = String::new();
    for part in parts {
        match part {
            StylePart::Text(text) => css.push_str(text),
            StylePart::Url(url) => {
                css.push_str("url(");
                css.push_str(&asset_reference(url, from_dir));
                css.push(')');
            }
        }
    }
    css
}

/// URL of an asset as seen from a file in `from_dir` (output-relative)
pub fn asset_reference(url: &AssetUrl, from_dir: &str) -> String {
    match url {
        AssetUrl::Literal(url) => url.clone(),
        AssetUrl::Output { path, query } => {
            let relative = relative_slash_path(Path::new(from_dir), Path::new(path));
            format!("{}{}", relative, query)
        }
    }
}

/// Directory part of an output-relative path
pub fn output_dir_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

pub(crate) fn clean_output_path(path: &str) -> String {
    let normalized = normalize_path(Path::new("/"), Path::new(path));
    relative_slash_path(Path::new("/"), &normalized)
}

/// The built-in engine
#[derive(Debug, Default, Clone, Copy)]
pub struct Bundler;

impl Bundler {
    pub fn new() -> Self {
        Self
    }
}

impl BuildEngine for Bundler {
    fn run(&self, config: &BuildConfig) -> Result<BuildResult, EngineError> {
        let start = Instant::now();
        let mut plugins = PluginManager::from_specs(&config.plugins);
        let mut pass = Pass {
            compilation: Compilation::new(config),
            resolver: Resolver::new(config),
        };

        info!("Building module graph...");
        plugins.run_build_start(&pass.compilation)?;
        let entry = pass.process_module(&config.entry, "")?;

        info!("Transforming modules...");
        for id in 0..pass.compilation.graph.len() {
            let Some(module) = pass.compilation.graph.get_module_mut(id) else {
                continue;
            };
            if let ModuleKind::Script { code } = &mut module.kind {
                *code = plugins.transform(code, &module.id)?;
            }
        }

        info!("Rendering chunks...");
        pass.render_scripts(entry)?;
        plugins.run_render(&mut pass.compilation)?;
        plugins.run_emit(&mut pass.compilation)?;

        info!("Writing artifacts...");
        let artifacts = write_files(&config.output_dir, pass.compilation.files())?;
        let duration = start.elapsed();
        debug!("Build completed in {:?}", duration);

        Ok(BuildResult {
            artifacts,
            modules: pass.compilation.graph.len(),
            duration,
        })
    }
}

/// Write queued files; files written before a failure stay on disk
fn write_files(output_dir: &Path, files: &[OutputFile]) -> Result<Vec<Artifact>, EngineError> {
    fs::create_dir_all(output_dir).map_err(|e| {
        EngineError::new(format!(
            "failed to create output directory {}: {}",
            output_dir.display(),
            e
        ))
    })?;

    let mut artifacts = Vec::with_capacity(files.len());
    for file in files {
        let path = output_dir.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &file.contents).map_err(|e| {
            EngineError::new(format!("failed to write {}: {}", path.display(), e))
        })?;
        artifacts.push(Artifact {
            path,
            size: file.contents.len(),
        });
    }
    Ok(artifacts)
}

struct Pass<'a> {
    compilation: Compilation<'a>,
    resolver: Resolver,
}

impl<'a> Pass<'a> {
    fn config(&self) -> &'a BuildConfig {
        self.compilation.config
    }

    /// Process a module and, recursively, its dependencies
    fn process_module(&mut self, path: &Path, query: &str) -> Result<ModuleId, EngineError> {
        let config = self.config();
        let id = format!("{}{}", relative_slash_path(&config.root, path), query);
        if let Some(existing) = self.compilation.graph.get_module_id(&id) {
            return Ok(existing);
        }

        let rule = config.rule_for(path);
        let module_id = self.compilation.graph.add_module(Module {
            id: id.clone(),
            path: path.to_path_buf(),
            rule,
            kind: ModuleKind::Pending,
        });

        let steps: &[HandlerStep] = rule.map(|r| config.rules[r].handlers.as_slice()).unwrap_or(&[]);
        let kind = match steps.first() {
            Some(step) if step.is_asset() => {
                self.process_asset(step, path, query).map_err(|e| tag(e, rule))?
            }
            _ if steps.iter().any(|s| matches!(s, HandlerStep::Css)) => {
                self.process_style(steps, path, rule)?
            }
            Some(_) => self.process_script(module_id, steps, path, rule)?,
            None if self.is_script_path(path) => self.process_script(module_id, &[], path, None)?,
            None => {
                return Err(EngineError::new(format!(
                    "no rule matches '{}'; add a rule for this file type",
                    id
                )))
            }
        };

        if let Some(module) = self.compilation.graph.get_module_mut(module_id) {
            module.kind = kind;
        }
        Ok(module_id)
    }

    fn is_script_path(&self, path: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        matches!(ext, "js" | "mjs" | "cjs")
            || self
                .config()
                .extensions
                .iter()
                .any(|e| e.trim_start_matches('.') == ext)
    }

    fn process_script(
        &mut self,
        module_id: ModuleId,
        steps: &[HandlerStep],
        path: &Path,
        rule: Option<usize>,
    ) -> Result<ModuleKind, EngineError> {
        let source = read_text(path).map_err(|e| tag(e, rule))?;
        let code = transform::run_steps(steps, source, path);

        for specifier in self.resolver.extract_dependencies(&code) {
            let resolution = self
                .resolver
                .resolve(&specifier, path, RequestKind::Script)
                .map_err(|e| tag(e, rule))?;
            match resolution {
                Resolution::File { path: dep_path, query } => {
                    let dep_id = self.process_module(&dep_path, &query)?;
                    self.compilation
                        .graph
                        .add_dependency(module_id, &specifier, dep_id);
                }
                Resolution::External => {}
            }
        }

        Ok(ModuleKind::Script { code })
    }

    fn process_style(
        &mut self,
        steps: &[HandlerStep],
        path: &Path,
        rule: Option<usize>,
    ) -> Result<ModuleKind, EngineError> {
        let source = read_text(path).map_err(|e| tag(e, rule))?;
        let css = transform::run_steps(steps, source, path);

        let mut parts = Vec::new();
        let mut cursor = 0;
        for url in self.resolver.extract_css_urls(&css) {
            let resolution = self
                .resolver
                .resolve(&url.specifier, path, RequestKind::Style)
                .map_err(|e| tag(e, rule))?;
            let asset = match resolution {
                Resolution::File { path: asset_path, query } => {
                    let asset_id = self.process_module(&asset_path, &query)?;
                    match self.compilation.graph.get_module(asset_id).map(|m| &m.kind) {
                        Some(ModuleKind::Asset { url, .. }) => url.clone(),
                        _ => {
                            return Err(tag(
                                EngineError::new(format!(
                                    "'{}' referenced from {} is not handled by an asset rule",
                                    url.specifier,
                                    path.display()
                                )),
                                rule,
                            ))
                        }
                    }
                }
                Resolution::External => continue,
            };

            parts.push(StylePart::Text(css[cursor..url.span.start].to_string()));
            parts.push(StylePart::Url(asset));
            cursor = url.span.end;
        }
        parts.push(StylePart::Text(css[cursor..].to_string()));

        let target = if steps.iter().any(|s| matches!(s, HandlerStep::CssExtract)) {
            StyleTarget::Extract
        } else if steps.iter().any(|s| matches!(s, HandlerStep::Style)) {
            StyleTarget::Inject
        } else {
            StyleTarget::Export
        };

        Ok(ModuleKind::Style { parts, target })
    }

    fn process_asset(
        &mut self,
        step: &HandlerStep,
        path: &Path,
        query: &str,
    ) -> Result<ModuleKind, EngineError> {
        let bytes = fs::read(path)
            .map_err(|e| EngineError::new(format!("failed to read {}: {}", path.display(), e)))?;
        let hash = hash_content(&bytes);
        let name = path.file_stem().and_then(|s| s.to_str()).unwrap_or("asset");
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        let data = PathData {
            name,
            hash: &hash,
            ext,
            query,
        };

        match step {
            HandlerStep::Url(options) => self.url_asset(options, &bytes, &data),
            _ => {
                let template = parse_template(&self.config().asset_filename)?;
                let rendered = template.render(&data, ExtStyle::Dotted);
                let (file, query) = crate::resolver::split_query(&rendered);
                self.compilation.emit_file(file, bytes)?;
                Ok(ModuleKind::Asset {
                    url: AssetUrl::Output {
                        path: clean_output_path(file),
                        query: query.to_string(),
                    },
                    es_module: true,
                })
            }
        }
    }

    fn url_asset(
        &mut self,
        options: &UrlOptions,
        bytes: &[u8],
        data: &PathData<'_>,
    ) -> Result<ModuleKind, EngineError> {
        let inline = options
            .limit
            .map_or(true, |limit| limit.inlines(bytes.len() as u64));
        if inline {
            let mimetype = options
                .mimetype
                .as_deref()
                .unwrap_or_else(|| transform::mime_for(data.ext));
            return Ok(ModuleKind::Asset {
                url: AssetUrl::Literal(transform::data_uri(bytes, mimetype)),
                es_module: options.es_module,
            });
        }

        let filename = parse_template(&options.name)?.render(data, ExtStyle::Bare);
        let output_path = options.output_path.as_deref().unwrap_or("");
        let file = clean_output_path(&format!("{}/{}", output_path, filename));
        self.compilation.emit_file(&file, bytes.to_vec())?;

        let url = match &options.public_path {
            Some(public) => AssetUrl::Literal(format!("{}{}", public, filename)),
            None => AssetUrl::Output {
                path: file,
                query: String::new(),
            },
        };
        Ok(ModuleKind::Asset {
            url,
            es_module: options.es_module,
        })
    }

    /// Render the entry chunk and queue it for writing
    fn render_scripts(&mut self, entry: ModuleId) -> Result<(), EngineError> {
        let config = self.config();

        let chunk = Chunk::entry(MAIN_CHUNK, &self.compilation.graph, entry);
        let mut code = chunk.render(&self.compilation.graph);
        if config.mode.is_production() {
            code = transform::minify_script(&code);
        }

        let hash = hash_content(code.as_bytes());
        let filename = parse_template(&config.output_filename)?.render(
            &PathData {
                name: &chunk.name,
                hash: &hash,
                ext: "js",
                query: "",
            },
            ExtStyle::Bare,
        );
        let filename = clean_output_path(&filename);

        self.compilation.emit_file(&filename, code.into_bytes())?;
        self.compilation.scripts.push(filename);
        self.compilation.chunk = Some(chunk);
        Ok(())
    }
}

/// Attribute an error to the rule that was processing the failing file
fn tag(err: EngineError, rule: Option<usize>) -> EngineError {
    match rule {
        Some(rule) if err.rule.is_none() && err.plugin.is_none() => err.in_rule(rule),
        _ => err,
    }
}

pub(crate) fn parse_template(pattern: &str) -> Result<FilenameTemplate, EngineError> {
    FilenameTemplate::parse(pattern)
        .map_err(|reason| EngineError::new(format!("invalid filename '{}': {}", pattern, reason)))
}

fn read_text(path: &Path) -> Result<String, EngineError> {
    fs::read_to_string(path)
        .map_err(|e| EngineError::new(format!("failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::{AliasList, Mode, UrlLimit};

    fn config() -> BuildConfig {
        BuildConfig {
            root: PathBuf::from("/p"),
            entry: PathBuf::from("/p/src/index.js"),
            output_dir: PathBuf::from("/p/dist"),
            output_filename: "[name].[contenthash].js".to_string(),
            asset_filename: "[hash][ext][query]".to_string(),
            mode: Mode::Development,
            watch: false,
            aliases: AliasList::default(),
            extensions: vec![".js".to_string()],
            rules: Vec::new(),
            plugins: Vec::new(),
        }
    }

    #[test]
    fn test_emit_file_conflicts() {
        let config = config();
        let mut compilation = Compilation::new(&config);

        compilation.emit_file("./assets/a.png", b"a".to_vec()).unwrap();
        compilation.emit_file("assets/a.png", b"a".to_vec()).unwrap();
        assert_eq!(compilation.files().len(), 1);
        assert_eq!(compilation.files()[0].path, "assets/a.png");

        let err = compilation.emit_file("assets/a.png", b"b".to_vec()).unwrap_err();
        assert!(err.message.contains("conflict"));
    }

    #[test]
    fn test_asset_references_are_relative() {
        let url = AssetUrl::Output {
            path: "assets/images/abc.png".to_string(),
            query: "?v=1".to_string(),
        };
        assert_eq!(asset_reference(&url, ""), "assets/images/abc.png?v=1");
        assert_eq!(asset_reference(&url, "assets"), "images/abc.png?v=1");
        assert_eq!(asset_reference(&url, "css"), "../assets/images/abc.png?v=1");

        let literal = AssetUrl::Literal("./assets/fonts/a.woff".to_string());
        assert_eq!(asset_reference(&literal, "assets"), "./assets/fonts/a.woff");
    }

    #[test]
    fn test_render_style() {
        let parts = vec![
            StylePart::Text("a { background: ".to_string()),
            StylePart::Url(AssetUrl::Output {
                path: "img/x.png".to_string(),
                query: String::new(),
            }),
            StylePart::Text("; }".to_string()),
        ];
        assert_eq!(render_style(&parts, "css"), "a { background: url(../img/x.png); }");
    }

    #[test]
    fn test_url_limit_boundary() {
        let config = config();
        let mut pass = Pass {
            compilation: Compilation::new(&config),
            resolver: Resolver::new(&config),
        };
        let options = UrlOptions {
            limit: Some(UrlLimit::Bytes(10)),
            mimetype: Some("font/woff2".to_string()),
            name: "[name].[contenthash:8].[ext]".to_string(),
            output_path: Some("./fonts/".to_string()),
            public_path: None,
            es_module: false,
        };
        let data = |hash: &'static str| PathData {
            name: "font",
            hash,
            ext: "woff2",
            query: "",
        };

        let below = pass.url_asset(&options, &[1u8; 9], &data("aaaaaaaaaaaa")).unwrap();
        assert_eq!(
            below,
            ModuleKind::Asset {
                url: AssetUrl::Literal(transform::data_uri(&[1u8; 9], "font/woff2")),
                es_module: false,
            }
        );
        assert!(pass.compilation.files().is_empty());

        let at = pass.url_asset(&options, &[2u8; 10], &data("bbbbbbbbbbbb")).unwrap();
        assert_eq!(
            at,
            ModuleKind::Asset {
                url: AssetUrl::Output {
                    path: "fonts/font.bbbbbbbb.woff2".to_string(),
                    query: String::new(),
                },
                es_module: false,
            }
        );
        assert_eq!(pass.compilation.files()[0].path, "fonts/font.bbbbbbbb.woff2");
        assert_eq!(pass.compilation.files()[0].contents, vec![2u8; 10]);
    }

    #[test]
    fn test_output_dir_of() {
        assert_eq!(output_dir_of("assets/main.css"), "assets");
        assert_eq!(output_dir_of("main.js"), "");
    }
}
