//! End-to-end build passes through the library API.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use assembler_lib::{Assembler, AssemblerError, BuildConfig, Mode};
use pretty_assertions::assert_eq;
use regex::Regex;
use tempfile::TempDir;

const CONFIG: &str = r#"
entry = "./src/index.js"
mode = "development"

[output]
dir = "dist"
filename = "[name].[contenthash].js"
asset_filename = "assets/images/[hash][ext][query]"

[resolve.alias]
"@utils" = "src/utils/"
"@templates" = "src/templates/"
"@styles" = "src/styles/"

[[rules]]
test = '/\.m?js$/'
exclude = '/node_modules/'
use = [{ loader = "babel" }]

[[rules]]
test = '/\.css|.styl$/i'
use = [{ loader = "css-extract" }, { loader = "css" }, { loader = "stylus" }]

[[rules]]
test = '/\.png/'
use = [{ loader = "asset-resource" }]

[[rules]]
test = '/\.(woff|woff2)$/'
use = [
  { loader = "url", limit = 10000, mimetype = "application/font-woff", name = "[name].[contenthash].[ext]", output_path = "./assets/fonts/", public_path = "./assets/fonts/", es_module = false },
]

[[plugins]]
kind = "html"
template = "./public/index.html"
filename = "./index.html"

[[plugins]]
kind = "css-extract"
filename = "assets/[name].[contenthash].css"

[[plugins]]
kind = "copy"
patterns = [{ from = "src/assets/images", to = "assets/images" }]

[[plugins]]
kind = "dotenv"
"#;

fn write(root: &Path, relative: &str, contents: impl AsRef<[u8]>) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project(with_env: bool) -> TempDir {
    let dir = TempDir::new().unwrap();
    scaffold(dir.path(), with_env);
    dir
}

fn scaffold(root: &Path, with_env: bool) {
    write(root, "assembler.toml", CONFIG);
    write(
        root,
        "public/index.html",
        "<!DOCTYPE html>\n<html>\n<head>\n<title>Test</title>\n</head>\n<body>\n<main id=\"main\"></main>\n</body>\n</html>\n",
    );
    write(
        root,
        "src/index.js",
        "import Template from '@templates/Template.js';\nimport getData from '@utils/getData';\nimport '@styles/main.css';\n\nconsole.log(Template(), getData());\n",
    );
    write(root, "src/templates/Template.js", "export default () => 'hello';\n");
    write(
        root,
        "src/utils/getData.js",
        "export default () => fetch(process.env.API);\n",
    );
    write(
        root,
        "src/styles/main.css",
        "@font-face {\n  font-family: 'Small';\n  src: url(\"../assets/fonts/small.woff2\") format('woff2');\n}\n@font-face {\n  font-family: 'Big';\n  src: url(../assets/fonts/big.woff) format('woff');\n}\nbody {\n  background: url('../assets/images/bg.png');\n}\n",
    );
    write(root, "src/assets/fonts/small.woff2", [7u8; 64]);
    write(root, "src/assets/fonts/big.woff", vec![3u8; 20_000]);
    write(root, "src/assets/images/bg.png", b"\x89PNG fake image");
    if with_env {
        write(root, ".env", "API=https://randomuser.me/api/\n");
    }
}

fn load(root: &Path) -> BuildConfig {
    let assembler = Assembler::new();
    let config = assembler.load(root.join("assembler.toml")).unwrap();
    assembler.validate(config).unwrap()
}

/// Output files keyed by their path relative to the output directory
fn output(config: &BuildConfig) -> BTreeMap<String, Vec<u8>> {
    walkdir::WalkDir::new(&config.output_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let relative = e
                .path()
                .strip_prefix(&config.output_dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (relative, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn find<'a>(files: &'a BTreeMap<String, Vec<u8>>, pattern: &str) -> (&'a str, String) {
    let re = Regex::new(pattern).unwrap();
    let (name, bytes) = files
        .iter()
        .find(|(name, _)| re.is_match(name))
        .unwrap_or_else(|| panic!("no output matches {}: {:?}", pattern, files.keys()));
    (name.as_str(), String::from_utf8_lossy(bytes).into_owned())
}

#[test]
fn build_emits_the_classic_layout() {
    let dir = project(true);
    let config = load(dir.path());

    let result = Assembler::new().submit(&config).unwrap();
    assert!(result.modules >= 7);

    let files = output(&config);
    let (script_name, script) = find(&files, r"^main\.[0-9a-f]{20}\.js$");
    let (css_name, css) = find(&files, r"^assets/main\.[0-9a-f]{20}\.css$");
    let (_, html) = find(&files, r"^index\.html$");

    // Aliases resolved and every script bundled
    assert!(script.contains("\"src/templates/Template.js\""));
    assert!(script.contains("\"src/utils/getData.js\""));

    // dotenv substitution
    assert!(script.contains("fetch(\"https://randomuser.me/api/\")"));
    assert!(!script.contains("process.env"));

    // Small font inlined, big font emitted under the public path
    assert!(css.contains("url(data:application/font-woff;base64,"));
    let (font_name, _) = find(&files, r"^assets/fonts/big\.[0-9a-f]{20}\.woff$");
    assert!(css.contains(&format!("url(./{})", font_name)));
    assert!(!files.keys().any(|k| k.contains("small")));

    // Image emitted by the asset rule and referenced relative to the stylesheet
    let (image_name, _) = find(&files, r"^assets/images/[0-9a-f]{20}\.png$");
    let image_from_css = image_name.trim_start_matches("assets/");
    assert!(css.contains(&format!("url({})", image_from_css)));

    // Copy plugin
    assert_eq!(files["assets/images/bg.png"], b"\x89PNG fake image".to_vec());

    // HTML page links both outputs
    assert!(html.contains(&format!("<link href=\"{}\" rel=\"stylesheet\">", css_name)));
    assert!(html.contains(&format!("<script defer src=\"{}\"></script></head>", script_name)));
    assert!(html.contains("<title>Test</title>"));
}

#[test]
fn build_is_deterministic() {
    let dir = project(true);
    let config = load(dir.path());
    let assembler = Assembler::new();

    let first = assembler.submit(&config).unwrap();
    let first_files = output(&config);
    fs::remove_dir_all(&config.output_dir).unwrap();

    let second = assembler.submit(&config).unwrap();
    let second_files = output(&config);

    assert_eq!(first.artifacts, second.artifacts);
    assert_eq!(first_files, second_files);
}

#[test]
fn missing_env_file_leaves_values_undefined() {
    let dir = project(false);
    let config = load(dir.path());

    Assembler::new().submit(&config).unwrap();

    let files = output(&config);
    let (_, script) = find(&files, r"^main\.[0-9a-f]{20}\.js$");
    assert!(script.contains("fetch(undefined)"));
}

#[test]
fn production_mode_minifies_output() {
    let dir = project(true);
    let mut config = load(dir.path());
    config.mode = Mode::Production;

    Assembler::new().submit(&config).unwrap();

    let files = output(&config);
    let (_, script) = find(&files, r"^main\.[0-9a-f]{20}\.js$");
    let (_, css) = find(&files, r"^assets/main\.[0-9a-f]{20}\.css$");
    assert!(!script.contains("// Module:"));
    assert!(!css.contains("\n  "));
    assert!(css.contains("@font-face"));
}

#[test]
fn unresolvable_import_names_the_rule() {
    let dir = project(true);
    write(
        dir.path(),
        "src/templates/Template.js",
        "import missing from './nope';\nexport default missing;\n",
    );
    let config = load(dir.path());

    match Assembler::new().submit(&config) {
        Err(AssemblerError::BuildEngine(err)) => {
            assert_eq!(err.rule, Some(0));
            assert!(err.message.contains("can't resolve './nope'"), "{}", err.message);
        }
        other => panic!("expected an engine error, got {:?}", other.map(|r| r.artifacts)),
    }
}

#[test]
fn file_without_a_rule_fails_the_pass() {
    let dir = project(true);
    write(dir.path(), "src/notes.txt", "plain text");
    write(
        dir.path(),
        "src/index.js",
        "import notes from './notes.txt';\nconsole.log(notes);\n",
    );
    let config = load(dir.path());

    let err = Assembler::new().submit(&config).unwrap_err();
    assert!(
        err.to_string().contains("no rule matches 'src/notes.txt'"),
        "{}",
        err
    );
}

#[test]
fn missing_html_template_names_the_plugin() {
    let dir = project(true);
    fs::remove_file(dir.path().join("public/index.html")).unwrap();
    let config = load(dir.path());

    match Assembler::new().submit(&config) {
        Err(AssemblerError::BuildEngine(err)) => {
            assert_eq!(err.plugin.as_deref(), Some("html"));
        }
        other => panic!("expected an engine error, got {:?}", other.map(|r| r.artifacts)),
    }
}

#[test]
fn rule_patterns_ignore_the_project_location() {
    let parent = TempDir::new().unwrap();
    let root = parent.path().join("my.css-site");
    scaffold(&root, true);
    write(&root, "src/logo.png", b"\x89PNG\r\n\x1a\n\xff\xfe");
    write(
        &root,
        "src/index.js",
        "import logo from './logo.png';\nconsole.log(logo);\n",
    );
    let config = load(&root);

    assert_eq!(config.rule_for(&root.join("src/logo.png")), Some(2));
    Assembler::new().submit(&config).unwrap();

    let files = output(&config);
    let (_, js) = find(&files, r"^main\.[0-9a-f]+\.js$");
    assert!(js.contains("assets/images/"), "{}", js);
    let logo = b"\x89PNG\r\n\x1a\n\xff\xfe".to_vec();
    assert!(files
        .iter()
        .any(|(name, bytes)| name.starts_with("assets/images/") && *bytes == logo));
}
