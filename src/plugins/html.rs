//! Renders an HTML page that loads the build output

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use super::Plugin;
use crate::bundler::{clean_output_path, output_dir_of, Compilation};
use crate::config::HtmlOptions;
use crate::error::EngineError;
use crate::utils::relative_slash_path;

static HEAD_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</head\s*>").unwrap());
static BODY_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</body\s*>").unwrap());

const DEFAULT_TITLE: &str = "Assembler App";

pub struct HtmlPlugin {
    options: HtmlOptions,
}

impl HtmlPlugin {
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }

    fn template(&self) -> Result<String, EngineError> {
        match &self.options.template {
            Some(path) => fs::read_to_string(path).map_err(|e| {
                EngineError::new(format!("failed to read template {}: {}", path.display(), e))
            }),
            None => Ok(default_page(
                self.options.title.as_deref().unwrap_or(DEFAULT_TITLE),
            )),
        }
    }
}

impl Plugin for HtmlPlugin {
    fn name(&self) -> &str {
        "html"
    }

    fn emit(&mut self, compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        let filename = clean_output_path(&self.options.filename);
        let mut html = self.template()?;

        if self.options.inject {
            let dir = output_dir_of(&filename);
            let mut tags = String::new();
            for sheet in &compilation.stylesheets {
                tags.push_str(&format!(
                    "<link href=\"{}\" rel=\"stylesheet\">",
                    relative_slash_path(Path::new(dir), Path::new(sheet))
                ));
            }
            for script in &compilation.scripts {
                tags.push_str(&format!(
                    "<script defer src=\"{}\"></script>",
                    relative_slash_path(Path::new(dir), Path::new(script))
                ));
            }
            html = inject(&html, &tags);
        }

        compilation.emit_file(&filename, html.into_bytes())
    }
}

/// Insert tags before `</head>`, else before `</body>`, else at the end
fn inject(html: &str, tags: &str) -> String {
    let at = HEAD_CLOSE
        .find(html)
        .or_else(|| BODY_CLOSE.find(html))
        .map(|m| m.start())
        .unwrap_or(html.len());

    let mut out = String::with_capacity(html.len() + tags.len());
    out.push_str(&html[..at]);
    out.push_str(tags);
    out.push_str(&html[at..]);
    out
}

fn default_page(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n</head>\n<body>\n</body>\n</html>\n",
        title
    )
}
