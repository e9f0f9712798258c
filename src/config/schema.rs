//! Configuration schema definitions
//!
//! These types mirror the on-disk configuration file. Rules and plugins are
//! closed enums with typed options, so an unknown loader or plugin kind is a
//! parse error rather than something discovered halfway through a build.

use std::fmt;
use std::path::PathBuf;

use regex::{Regex, RegexBuilder};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Raw configuration file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Entry script, relative to the config file
    #[serde(default = "default_entry")]
    pub entry: String,

    #[serde(default)]
    pub mode: Mode,

    /// Keep rebuilding on file changes
    #[serde(default)]
    pub watch: bool,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub resolve: ResolveConfig,

    /// Module rules, in priority order
    #[serde(default, alias = "module_rules")]
    pub rules: Vec<RuleSpec>,

    /// Plugins, in execution order
    #[serde(default)]
    pub plugins: Vec<PluginSpec>,
}

fn default_entry() -> String {
    "./src/index.js".to_string()
}

/// Build mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    pub fn is_production(self) -> bool {
        self == Mode::Production
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Development => f.write_str("development"),
            Mode::Production => f.write_str("production"),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir", alias = "path")]
    pub dir: String,

    /// Script filename pattern
    #[serde(default = "default_filename")]
    pub filename: String,

    /// Filename pattern for `asset-resource` modules
    #[serde(default = "default_asset_filename", alias = "assetModuleFilename")]
    pub asset_filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            filename: default_filename(),
            asset_filename: default_asset_filename(),
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_filename() -> String {
    "[name].[contenthash].js".to_string()
}

fn default_asset_filename() -> String {
    "[hash][ext][query]".to_string()
}

/// Module resolution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveConfig {
    /// Extensions tried, in order, for extension-less imports
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Alias name -> directory, relative to the config file
    #[serde(default)]
    pub alias: AliasList,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            alias: AliasList::default(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string()]
}

/// A resolve alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub target: PathBuf,
}

/// Aliases in declaration order.
///
/// Deserialized from a map, but duplicate keys are kept (JSON allows them) so
/// that validation can report them instead of silently keeping the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasList(pub Vec<Alias>);

impl<'de> Deserialize<'de> for AliasList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AliasVisitor;

        impl<'de> Visitor<'de> for AliasVisitor {
            type Value = AliasList;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of alias names to paths")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<AliasList, A::Error> {
                let mut aliases = Vec::new();
                while let Some((name, target)) = map.next_entry::<String, PathBuf>()? {
                    aliases.push(Alias { name, target });
                }
                Ok(AliasList(aliases))
            }
        }

        deserializer.deserialize_map(AliasVisitor)
    }
}

impl Serialize for AliasList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for alias in &self.0 {
            map.serialize_entry(&alias.name, &alias.target)?;
        }
        map.end()
    }
}

/// A file-matching regular expression.
///
/// Written either as a bare regex (`\.png$`) or as a slash-delimited literal
/// with flags (`/\.css|.styl$/i`).
#[derive(Debug, Clone)]
pub struct TestPattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl TestPattern {
    pub fn new(literal: &str) -> Result<Self, regex::Error> {
        let (source, case_insensitive) = split_literal(literal);
        let regex = RegexBuilder::new(source)
            .case_insensitive(case_insensitive)
            .build()?;
        Ok(Self {
            source: source.to_string(),
            case_insensitive,
            regex,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }
}

fn split_literal(literal: &str) -> (&str, bool) {
    if let Some(body) = literal.strip_prefix('/') {
        if let Some(end) = body.rfind('/') {
            let flags = &body[end + 1..];
            if flags.chars().all(|c| c == 'i') {
                return (&body[..end], !flags.is_empty());
            }
        }
    }
    (literal, false)
}

impl PartialEq for TestPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

impl Eq for TestPattern {}

impl fmt::Display for TestPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.case_insensitive {
            write!(f, "/{}/i", self.source)
        } else {
            f.write_str(&self.source)
        }
    }
}

impl<'de> Deserialize<'de> for TestPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let literal = String::deserialize(deserializer)?;
        TestPattern::new(&literal).map_err(serde::de::Error::custom)
    }
}

impl Serialize for TestPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A module rule: files matching `test` (and not `exclude`) go through `use`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub test: TestPattern,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<TestPattern>,

    /// Handler chain, outermost step first
    #[serde(default, rename = "use")]
    pub handlers: Vec<HandlerStep>,
}

impl RuleSpec {
    /// Whether this rule applies to the given project-relative, slash-separated path
    pub fn matches(&self, path: &str) -> bool {
        self.test.is_match(path) && !self.exclude.as_ref().is_some_and(|e| e.is_match(path))
    }

    pub fn has_step(&self, name: &str) -> bool {
        self.handlers.iter().any(|s| s.name() == name)
    }
}

/// One processing step in a rule's handler chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "loader", rename_all = "kebab-case")]
pub enum HandlerStep {
    /// Script transpilation
    Babel,
    /// Move the stylesheet into the file written by the css-extract plugin
    CssExtract,
    /// Inject the stylesheet at runtime through a `<style>` tag
    Style,
    /// Interpret as CSS and resolve `url(...)` references
    Css,
    /// Stylus preprocessing
    Stylus,
    /// Emit as a separate file named by `output.asset_filename`
    AssetResource,
    /// Inline small files as data URIs, emit the rest
    Url(UrlOptions),
}

impl HandlerStep {
    pub fn name(&self) -> &'static str {
        match self {
            HandlerStep::Babel => "babel",
            HandlerStep::CssExtract => "css-extract",
            HandlerStep::Style => "style",
            HandlerStep::Css => "css",
            HandlerStep::Stylus => "stylus",
            HandlerStep::AssetResource => "asset-resource",
            HandlerStep::Url(_) => "url",
        }
    }

    /// Steps that turn the whole file into an emitted asset
    pub fn is_asset(&self) -> bool {
        matches!(self, HandlerStep::AssetResource | HandlerStep::Url(_))
    }
}

/// Options of the `url` step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UrlOptions {
    /// When to inline; no limit inlines everything
    #[serde(default)]
    pub limit: Option<UrlLimit>,

    /// MIME type for data URIs; guessed from the extension when unset
    #[serde(default)]
    pub mimetype: Option<String>,

    /// Filename pattern for emitted files
    #[serde(default = "default_url_name")]
    pub name: String,

    /// Directory (inside the output dir) for emitted files
    #[serde(default, alias = "outputPath")]
    pub output_path: Option<String>,

    /// URL prefix used to reference emitted files
    #[serde(default, alias = "publicPath")]
    pub public_path: Option<String>,

    /// Export the URL as an ES module default export
    #[serde(default = "default_true", alias = "esModule")]
    pub es_module: bool,
}

/// Inlining threshold of the `url` step: a byte count, or `true`/`false`
/// to always or never inline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlLimit {
    Toggle(bool),
    /// Inline files strictly smaller than this many bytes
    Bytes(u64),
}

impl UrlLimit {
    pub fn inlines(&self, size: u64) -> bool {
        match *self {
            UrlLimit::Toggle(always) => always,
            UrlLimit::Bytes(limit) => size < limit,
        }
    }
}

fn default_url_name() -> String {
    "[contenthash].[ext]".to_string()
}

fn default_true() -> bool {
    true
}

/// Plugin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PluginSpec {
    /// Render an HTML page with the build artifacts injected
    Html(HtmlOptions),
    /// Write extracted stylesheets to a single file
    CssExtract(CssExtractOptions),
    /// Copy static files into the output directory
    Copy(CopyOptions),
    /// Expose `.env` values as `process.env.*` substitutions
    Dotenv(DotenvOptions),
}

impl PluginSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            PluginSpec::Html(_) => "html",
            PluginSpec::CssExtract(_) => "css-extract",
            PluginSpec::Copy(_) => "copy",
            PluginSpec::Dotenv(_) => "dotenv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HtmlOptions {
    /// Template file; a minimal page is generated when unset
    #[serde(default)]
    pub template: Option<PathBuf>,

    /// Output file, relative to the output directory
    #[serde(default = "default_html_filename")]
    pub filename: String,

    /// Inject `<script>` and `<link>` tags
    #[serde(default = "default_true")]
    pub inject: bool,

    /// `<title>` of the generated page
    #[serde(default)]
    pub title: Option<String>,
}

fn default_html_filename() -> String {
    "index.html".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CssExtractOptions {
    #[serde(default = "default_css_filename")]
    pub filename: String,
}

impl Default for CssExtractOptions {
    fn default() -> Self {
        Self {
            filename: default_css_filename(),
        }
    }
}

fn default_css_filename() -> String {
    "[name].css".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyOptions {
    #[serde(default)]
    pub patterns: Vec<CopyPattern>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CopyPattern {
    /// Source file or directory, relative to the config file
    pub from: PathBuf,

    /// Destination, relative to the output directory
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DotenvOptions {
    #[serde(default = "default_env_path")]
    pub path: PathBuf,

    /// Also expose variables from the process environment
    #[serde(default, alias = "systemvars")]
    pub system_vars: bool,
}

impl Default for DotenvOptions {
    fn default() -> Self {
        Self {
            path: default_env_path(),
            system_vars: false,
        }
    }
}

fn default_env_path() -> PathBuf {
    PathBuf::from(".env")
}
