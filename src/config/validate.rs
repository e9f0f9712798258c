//! Configuration invariants
//!
//! Every check runs on every call; issues are collected rather than returned
//! on the first failure so that one `check` surfaces all of them.

use std::collections::BTreeMap;

use super::{BuildConfig, HandlerStep, PluginSpec, RuleSpec};
use crate::error::{ValidationError, ValidationIssue};
use crate::filename::FilenameTemplate;
use crate::utils::escapes_base;

impl BuildConfig {
    /// Check every invariant, reporting all violations at once
    pub fn check(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if !self.entry.is_file() {
            issues.push(ValidationIssue::EntryMissing {
                path: self.entry.clone(),
            });
        }

        check_aliases(self, &mut issues);
        check_patterns(self, &mut issues);
        check_rules(self, &mut issues);
        check_plugins(self, &mut issues);

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }
}

/// Group indices by key, keeping only keys seen more than once
fn duplicates<K: Ord>(keys: impl IntoIterator<Item = K>) -> Vec<(K, Vec<usize>)> {
    let mut groups: BTreeMap<K, Vec<usize>> = BTreeMap::new();
    for (index, key) in keys.into_iter().enumerate() {
        groups.entry(key).or_default().push(index);
    }

    let mut repeated: Vec<_> = groups
        .into_iter()
        .filter(|(_, indices)| indices.len() > 1)
        .collect();
    repeated.sort_by_key(|(_, indices)| indices[0]);
    repeated
}

fn check_aliases(config: &BuildConfig, issues: &mut Vec<ValidationIssue>) {
    for (name, indices) in duplicates(config.aliases.0.iter().map(|a| a.name.as_str())) {
        issues.push(ValidationIssue::DuplicateAlias {
            name: name.to_string(),
            indices,
        });
    }
}

fn check_template(
    field: &str,
    pattern: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<FilenameTemplate> {
    if escapes_base(pattern) {
        issues.push(ValidationIssue::MalformedPattern {
            field: field.to_string(),
            pattern: pattern.to_string(),
            reason: "must stay inside the output directory".to_string(),
        });
        return None;
    }

    match FilenameTemplate::parse(pattern) {
        Ok(template) => Some(template),
        Err(reason) => {
            issues.push(ValidationIssue::MalformedPattern {
                field: field.to_string(),
                pattern: pattern.to_string(),
                reason,
            });
            None
        }
    }
}

fn check_patterns(config: &BuildConfig, issues: &mut Vec<ValidationIssue>) {
    if let Some(template) = check_template("output.filename", &config.output_filename, issues) {
        if !template.has_hash() {
            issues.push(ValidationIssue::MissingPlaceholder {
                field: "output.filename".to_string(),
                pattern: config.output_filename.clone(),
                expected: "a [contenthash] or [hash] placeholder",
            });
        }
    }

    if let Some(template) = check_template("output.asset_filename", &config.asset_filename, issues)
    {
        if !template.has_hash() && !template.has_name() {
            issues.push(ValidationIssue::MissingPlaceholder {
                field: "output.asset_filename".to_string(),
                pattern: config.asset_filename.clone(),
                expected: "a [hash], [contenthash] or [name] placeholder",
            });
        }
    }
}

fn check_rules(config: &BuildConfig, issues: &mut Vec<ValidationIssue>) {
    if config.rules.is_empty() {
        issues.push(ValidationIssue::NoRules);
    }

    for (pattern, indices) in duplicates(config.rules.iter().map(|r| r.test.to_string())) {
        issues.push(ValidationIssue::DuplicateRulePattern { pattern, indices });
    }

    let has_extract_plugin = config.css_extract().is_some();

    for (index, rule) in config.rules.iter().enumerate() {
        check_chain(index, rule, issues);

        if rule.has_step("css-extract") && !has_extract_plugin {
            issues.push(ValidationIssue::MissingCssExtractPlugin { rule: index });
        }

        for step in &rule.handlers {
            if let HandlerStep::Url(options) = step {
                let field = format!("rules[{}].url.name", index);
                check_template(&field, &options.name, issues);
                if let Some(output_path) = &options.output_path {
                    if escapes_base(output_path) {
                        issues.push(ValidationIssue::MalformedPattern {
                            field: format!("rules[{}].url.output_path", index),
                            pattern: output_path.clone(),
                            reason: "must stay inside the output directory".to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Ordering rules for a handler chain (outermost step first)
fn check_chain(index: usize, rule: &RuleSpec, issues: &mut Vec<ValidationIssue>) {
    let steps = &rule.handlers;
    if steps.is_empty() {
        issues.push(ValidationIssue::EmptyHandlerChain { rule: index });
        return;
    }

    for (position, step) in steps.iter().enumerate() {
        let misplaced = |reason| ValidationIssue::MisplacedStep {
            rule: index,
            step: step.name(),
            reason,
        };

        match step {
            HandlerStep::CssExtract | HandlerStep::Style => {
                if position != 0 {
                    issues.push(misplaced("must be the first step of the chain"));
                }
                if !steps.iter().any(|s| matches!(s, HandlerStep::Css)) {
                    issues.push(misplaced("needs a `css` step in the chain"));
                }
            }
            HandlerStep::AssetResource | HandlerStep::Url(_) => {
                if steps.len() != 1 {
                    issues.push(misplaced("must be the only step of the chain"));
                }
            }
            HandlerStep::Stylus => {
                let css_after = steps[position..]
                    .iter()
                    .any(|s| matches!(s, HandlerStep::Css));
                if css_after {
                    issues.push(misplaced("must come after the `css` step"));
                }
            }
            HandlerStep::Babel | HandlerStep::Css => {}
        }
    }

    let has_extract = steps.iter().any(|s| matches!(s, HandlerStep::CssExtract));
    let has_style = steps.iter().any(|s| matches!(s, HandlerStep::Style));
    if has_extract && has_style {
        issues.push(ValidationIssue::MisplacedStep {
            rule: index,
            step: "style",
            reason: "cannot be combined with `css-extract`",
        });
    }
}

fn check_plugins(config: &BuildConfig, issues: &mut Vec<ValidationIssue>) {
    let extract: Vec<usize> = config
        .plugins
        .iter()
        .enumerate()
        .filter(|(_, p)| matches!(p, PluginSpec::CssExtract(_)))
        .map(|(i, _)| i)
        .collect();
    if extract.len() > 1 {
        issues.push(ValidationIssue::DuplicatePlugin {
            kind: "css-extract",
            indices: extract,
        });
    }

    let html_outputs: Vec<(usize, String)> = config
        .plugins
        .iter()
        .enumerate()
        .filter_map(|(i, p)| match p {
            PluginSpec::Html(options) => Some((i, options.filename.trim_start_matches("./").to_string())),
            _ => None,
        })
        .collect();
    for (filename, positions) in duplicates(html_outputs.iter().map(|(_, f)| f.clone())) {
        issues.push(ValidationIssue::DuplicateHtmlOutput {
            filename,
            indices: positions.iter().map(|&p| html_outputs[p].0).collect(),
        });
    }

    for (index, plugin) in config.plugins.iter().enumerate() {
        match plugin {
            PluginSpec::Html(options) => {
                check_template(&format!("plugins[{}].filename", index), &options.filename, issues);
            }
            PluginSpec::CssExtract(options) => {
                check_template(&format!("plugins[{}].filename", index), &options.filename, issues);
            }
            PluginSpec::Copy(options) => {
                for pattern in &options.patterns {
                    if escapes_base(&pattern.to) {
                        issues.push(ValidationIssue::AbsoluteCopyDestination {
                            plugin: index,
                            to: pattern.to.clone(),
                        });
                    }
                }
            }
            PluginSpec::Dotenv(_) => {}
        }
    }
}
