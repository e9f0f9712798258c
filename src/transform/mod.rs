//! Code transformation
//!
//! Applies the text steps of a handler chain and produces the script code
//! that stands in for stylesheets and assets inside the bundle.

use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use tracing::debug;

use crate::config::HandlerStep;
use crate::error::EngineError;

/// Run the text steps of a chain, last step first.
///
/// `babel` and `stylus` are pass-through here: transpilation and stylus
/// compilation belong to a full engine. `css` only marks the content as a
/// stylesheet; its `url(...)` handling lives in the bundler.
pub fn run_steps(steps: &[HandlerStep], source: String, path: &Path) -> String {
    let mut code = source;
    for step in steps.iter().rev() {
        match step {
            HandlerStep::Babel => {
                debug!("babel: {}", path.display());
            }
            HandlerStep::Stylus => {
                debug!("stylus: {}", path.display());
                code = normalize_newlines(code);
            }
            HandlerStep::Css => {
                debug!("css: {}", path.display());
            }
            HandlerStep::CssExtract
            | HandlerStep::Style
            | HandlerStep::AssetResource
            | HandlerStep::Url(_) => {}
        }
    }
    code
}

fn normalize_newlines(code: String) -> String {
    if code.contains('\r') {
        code.replace("\r\n", "\n")
    } else {
        code
    }
}

/// Script module that injects a stylesheet at runtime
pub fn style_module(css: &str) -> String {
    let escaped = css
        .replace('\\', "\\\\")
        .replace('`', "\\`")
        .replace("${", "\\${");

    format!(
        r#"(function() {{
  var style = document.createElement('style');
  style.textContent = `{}`;
  document.head.appendChild(style);
}})();
module.exports = {{}};
"#,
        escaped
    )
}

/// Script module whose export is a single string
pub fn export_string(value: &str, es_module: bool) -> String {
    let literal = serde_json::Value::String(value.to_string()).to_string();
    if es_module {
        format!(
            "Object.defineProperty(exports, \"__esModule\", {{ value: true }});\nexports.default = {};\n",
            literal
        )
    } else {
        format!("module.exports = {};\n", literal)
    }
}

/// Base64 data URI
pub fn data_uri(bytes: &[u8], mimetype: &str) -> String {
    format!("data:{};base64,{}", mimetype, STANDARD.encode(bytes))
}

/// MIME type for a file extension
pub fn mime_for(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "js" | "mjs" => "application/javascript",
        "css" => "text/css",
        "json" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        "eot" => "application/vnd.ms-fontobject",
        _ => "application/octet-stream",
    }
}

/// Minify a stylesheet for production output
pub fn minify_css(css: &str, filename: &str) -> Result<String, EngineError> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let mut sheet = StyleSheet::parse(css, options)
        .map_err(|e| EngineError::new(format!("invalid CSS in {}: {}", filename, e)))?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| EngineError::new(format!("failed to minify {}: {}", filename, e)))?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| EngineError::new(format!("failed to print {}: {}", filename, e)))?;
    Ok(printed.code)
}

/// Minify JavaScript code (basic implementation)
///
/// Strips comments and collapses whitespace outside string and regex literals.
pub fn minify_script(code: &str) -> String {
    let mut result = String::with_capacity(code.len());
    let mut in_string = false;
    let mut string_char = ' ';
    let mut in_single_comment = false;
    let mut in_multi_comment = false;
    let mut prev_char = ' ';
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        if in_single_comment {
            if c == '\n' {
                in_single_comment = false;
                result.push('\n');
            }
            continue;
        }

        if in_multi_comment {
            if prev_char == '*' && c == '/' {
                in_multi_comment = false;
            }
            prev_char = c;
            continue;
        }

        if in_string {
            result.push(c);
            if c == string_char && prev_char != '\\' {
                in_string = false;
            }
            prev_char = if prev_char == '\\' && c == '\\' { ' ' } else { c };
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            in_string = true;
            string_char = c;
            result.push(c);
            prev_char = c;
            continue;
        }

        if c == '/' {
            if let Some(&next) = chars.peek() {
                if next == '/' {
                    in_single_comment = true;
                    chars.next();
                    continue;
                } else if next == '*' {
                    in_multi_comment = true;
                    chars.next();
                    continue;
                }
            }
            if regex_allowed(&result) {
                result.push(c);
                copy_regex_literal(&mut chars, &mut result);
                prev_char = '/';
                continue;
            }
        }

        // Collapse whitespace
        if c.is_whitespace() {
            if c == '\n' {
                if result.ends_with(' ') {
                    result.pop();
                }
                if !result.ends_with('\n') {
                    result.push('\n');
                }
            } else if !result.ends_with(' ') && !result.ends_with('\n') {
                result.push(' ');
            }
        } else {
            result.push(c);
        }

        prev_char = c;
    }

    result.trim().to_string()
}

/// Whether a `/` after `before` starts a regex literal rather than a division
fn regex_allowed(before: &str) -> bool {
    let before = before.trim_end();
    match before.chars().last() {
        None => true,
        Some(c) if "(,=:[!&|?{};+-*%<>~^".contains(c) => true,
        Some(c) if c.is_alphanumeric() || c == '_' || c == '$' => {
            let word_start = before
                .rfind(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '$'))
                .map_or(0, |i| i + 1);
            matches!(
                &before[word_start..],
                "return" | "typeof" | "case" | "do" | "else" | "in" | "of" | "void" | "yield"
            )
        }
        _ => false,
    }
}

/// Copy the body of a regex literal up to and including its closing `/`.
/// Flags after it are ordinary identifier characters.
fn copy_regex_literal(chars: &mut Peekable<Chars<'_>>, result: &mut String) {
    let mut in_class = false;
    while let Some(&c) = chars.peek() {
        if c == '\n' {
            return;
        }
        chars.next();
        result.push(c);
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    result.push(escaped);
                }
            }
            '[' => in_class = true,
            ']' => in_class = false,
            '/' if !in_class => return,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_module_escapes_template_literal() {
        let code = style_module("body { content: `${x}`; }");
        assert!(code.contains("document.createElement('style')"));
        assert!(code.contains("\\`\\${x}\\`"));
    }

    #[test]
    fn test_export_string() {
        assert_eq!(
            export_string("./assets/fonts/a.woff", false),
            "module.exports = \"./assets/fonts/a.woff\";\n"
        );
        let esm = export_string("a\"b", true);
        assert!(esm.contains("exports.default = \"a\\\"b\";"));
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(data_uri(b"abc", "font/woff"), "data:font/woff;base64,YWJj");
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("PNG"), "image/png");
        assert_eq!(mime_for("woff2"), "font/woff2");
        assert_eq!(mime_for("bin"), "application/octet-stream");
    }

    #[test]
    fn test_minify_script_keeps_strings() {
        let code = "// header\nvar a = 'x  //  y';\n/* block */\nvar b   =   2;\n";
        assert_eq!(minify_script(code), "var a = 'x  //  y';\nvar b = 2;");
    }

    #[test]
    fn test_minify_script_keeps_regex_literals() {
        let code = "var re = /'/;\nvar s = 'a // b';\n";
        assert_eq!(minify_script(code), code.trim());

        let code = "if (/[/\"]\\//.test(x)) { return /a\\/b/g; }\n";
        assert_eq!(minify_script(code), code.trim());

        assert_eq!(minify_script("var half = total / 2; // half\n"), "var half = total / 2;");
    }

    #[test]
    fn test_minify_css() {
        let css = ".a {\n  color: #ff0000;\n  margin: 0px;\n}\n";
        assert_eq!(minify_css(css, "main.css").unwrap(), ".a{color:red;margin:0}");
    }

    #[test]
    fn test_run_steps_passes_through() {
        let steps = vec![HandlerStep::CssExtract, HandlerStep::Css, HandlerStep::Stylus];
        let out = run_steps(&steps, "a {}\r\n".to_string(), Path::new("a.styl"));
        assert_eq!(out, "a {}\n");
    }
}
