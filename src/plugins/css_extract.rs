//! Collects extracted stylesheets into one file

use tracing::debug;

use super::Plugin;
use crate::bundler::{
    clean_output_path, output_dir_of, parse_template, render_style, Compilation, ModuleKind,
    StyleTarget, MAIN_CHUNK,
};
use crate::config::CssExtractOptions;
use crate::error::EngineError;
use crate::filename::{ExtStyle, PathData};
use crate::transform;
use crate::utils::hash_content;

pub struct CssExtractPlugin {
    options: CssExtractOptions,
}

impl CssExtractPlugin {
    pub fn new(options: CssExtractOptions) -> Self {
        Self { options }
    }
}

impl Plugin for CssExtractPlugin {
    fn name(&self) -> &str {
        "css-extract"
    }

    fn render(&mut self, compilation: &mut Compilation<'_>) -> Result<(), EngineError> {
        let template = parse_template(&self.options.filename)?;
        let render = |hash: &str| {
            template.render(
                &PathData {
                    name: MAIN_CHUNK,
                    hash,
                    ext: "css",
                    query: "",
                },
                ExtStyle::Bare,
            )
        };

        // url() references are written relative to the stylesheet, whose
        // directory does not depend on the hash
        let dir = output_dir_of(&clean_output_path(&render(""))).to_string();

        let sheets: Vec<String> = compilation
            .styles(StyleTarget::Extract)
            .into_iter()
            .filter_map(|module| match &module.kind {
                ModuleKind::Style { parts, .. } => Some(render_style(parts, &dir)),
                _ => None,
            })
            .collect();
        if sheets.is_empty() {
            debug!("No stylesheets to extract");
            return Ok(());
        }

        let mut css = sheets.join("\n");
        if compilation.config.mode.is_production() {
            css = transform::minify_css(&css, &render(""))?;
        }

        let filename = clean_output_path(&render(&hash_content(css.as_bytes())));
        compilation.emit_file(&filename, css.into_bytes())?;
        compilation.stylesheets.push(filename);
        Ok(())
    }
}
