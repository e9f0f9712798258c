//! Project initialization command

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::DEFAULT_CONFIG_FILE;

/// Initialize a new project
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project directory
    #[arg(default_value = ".")]
    pub dir: PathBuf,

    /// Overwrite files that already exist
    #[arg(short, long)]
    pub force: bool,
}

impl InitCommand {
    pub fn execute(&self) -> Result<()> {
        eprintln!(
            "{} Initializing project in {}...\n",
            "→".blue(),
            self.dir.display().to_string().cyan()
        );

        fs::create_dir_all(&self.dir).context("Failed to create project directory")?;

        for (path, contents) in scaffold() {
            self.write(path, contents)?;
        }

        eprintln!("\n{} Project initialized successfully!\n", "✓".green().bold());
        eprintln!("  Next steps:");
        if self.dir != Path::new(".") {
            eprintln!("    {} cd {}", "→".dimmed(), self.dir.display().to_string().cyan());
        }
        eprintln!("    {} assembler check", "→".dimmed());
        eprintln!("    {} assembler build", "→".dimmed());
        eprintln!();

        Ok(())
    }

    fn write(&self, relative: &str, contents: &[u8]) -> Result<()> {
        let path = self.dir.join(relative);
        if path.exists() && !self.force {
            eprintln!("  {} Skipped {} (already exists)", "•".dimmed(), relative.dimmed());
            return Ok(());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, contents).with_context(|| format!("Failed to write {}", relative))?;
        eprintln!("  {} Created {}", "✓".green(), relative.cyan());
        Ok(())
    }
}

/// Files written by `init`, relative to the project directory
fn scaffold() -> Vec<(&'static str, &'static [u8])> {
    vec![
        (DEFAULT_CONFIG_FILE, CONFIG.as_bytes()),
        (".env", ENV.as_bytes()),
        ("public/index.html", INDEX_HTML.as_bytes()),
        ("src/index.js", INDEX_JS.as_bytes()),
        ("src/templates/Template.js", TEMPLATE_JS.as_bytes()),
        ("src/utils/getData.js", GET_DATA_JS.as_bytes()),
        ("src/styles/main.css", MAIN_CSS.as_bytes()),
        ("src/assets/images/logo.png", LOGO_PNG),
    ]
}

const CONFIG: &str = r#"# Assembler configuration

entry = "./src/index.js"
mode = "development"
watch = true

[output]
dir = "dist"
filename = "[name].[contenthash].js"
asset_filename = "assets/images/[hash][ext][query]"

[resolve]
extensions = [".js"]

[resolve.alias]
"@utils" = "src/utils/"
"@templates" = "src/templates/"
"@styles" = "src/styles/"
"@images" = "src/assets/images/"

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
inject = true
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

const ENV: &str = "API=https://randomuser.me/api/\n";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Assembler App</title>
</head>
<body>
  <main id="main"></main>
</body>
</html>
"#;

const INDEX_JS: &str = r#"import Template from '@templates/Template.js';
import '@styles/main.css';

(async function App() {
  const main = null || document.getElementById('main');
  main.innerHTML = await Template();
})();
"#;

const TEMPLATE_JS: &str = r#"import getData from '@utils/getData.js';
import logo from '@images/logo.png';

const Template = async () => {
  const data = await getData();
  const person = data.results[0];
  return `
    <div class="about">
      <img src="${logo.default || logo}" alt="logo">
      <h1>${person.name.first} ${person.name.last}</h1>
      <p>${person.email}</p>
    </div>
  `;
};

export default Template;
"#;

const GET_DATA_JS: &str = r#"const API = process.env.API;

const getData = async (id) => {
  const apiURl = id ? `${API}${id}` : API;
  const response = await fetch(apiURl);
  return response.json();
};

export default getData;
"#;

const MAIN_CSS: &str = r#"body {
  margin: 0;
  font-family: system-ui, sans-serif;
}

.about {
  display: flex;
  flex-direction: column;
  align-items: center;
  padding: 2rem;
}
"#;

/// 1x1 transparent PNG
const LOGO_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::config::{self, PluginSpec};

    #[test]
    fn test_scaffold_is_a_valid_project() {
        let dir = TempDir::new().unwrap();
        let cmd = InitCommand {
            dir: dir.path().to_path_buf(),
            force: false,
        };
        cmd.execute().unwrap();

        let loaded = config::load(dir.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        let loaded = config::validate(loaded).unwrap();

        assert_eq!(loaded.rules.len(), 4);
        assert_eq!(loaded.aliases.0.len(), 4);
        let kinds: Vec<_> = loaded.plugins.iter().map(PluginSpec::kind).collect();
        assert_eq!(kinds, vec!["html", "css-extract", "copy", "dotenv"]);
    }

    #[test]
    fn test_existing_files_are_kept() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".env"), "API=http://localhost/\n").unwrap();

        let cmd = InitCommand {
            dir: dir.path().to_path_buf(),
            force: false,
        };
        cmd.execute().unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join(".env")).unwrap(),
            "API=http://localhost/\n"
        );
        assert!(dir.path().join("src/index.js").is_file());
    }
}
