//! Output filename templates
//!
//! Supported placeholders: `[name]`, `[contenthash]`, `[hash]`, `[ext]` and
//! `[query]`. Hash placeholders accept a length suffix (`[contenthash:8]`).

use std::fmt;

/// Number of hex characters used when a hash placeholder has no length
pub const DEFAULT_HASH_LENGTH: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Name,
    ContentHash(usize),
    Hash(usize),
    Ext,
    Query,
}

/// How `[ext]` renders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtStyle {
    /// `.png` (asset modules)
    Dotted,
    /// `png` (loader `name` options)
    Bare,
}

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct PathData<'a> {
    pub name: &'a str,
    /// Full hex content hash; truncated per placeholder
    pub hash: &'a str,
    /// Extension without the leading dot
    pub ext: &'a str,
    /// Query string including the leading `?`, or empty
    pub query: &'a str,
}

/// A parsed filename template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl FilenameTemplate {
    /// Parse a template, rejecting unbalanced brackets and unknown placeholders
    pub fn parse(source: &str) -> Result<Self, String> {
        if source.trim().is_empty() {
            return Err("pattern is empty".to_string());
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(c) = rest.chars().next() {
            match c {
                '[' => {
                    let close = rest
                        .find(']')
                        .ok_or_else(|| "unclosed '[' placeholder".to_string())?;
                    let inner = &rest[1..close];
                    if inner.contains('[') {
                        return Err(format!("nested '[' in placeholder '[{}]'", inner));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(inner)?);
                    rest = &rest[close + 1..];
                }
                ']' => return Err("unmatched ']'".to_string()),
                _ => {
                    literal.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Whether the template embeds a content hash
    pub fn has_hash(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::ContentHash(_) | Segment::Hash(_)))
    }

    pub fn has_name(&self) -> bool {
        self.segments.contains(&Segment::Name)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Substitute placeholders
    pub fn render(&self, data: &PathData<'_>, ext_style: ExtStyle) -> String {
        let mut out = String::with_capacity(self.source.len() + data.hash.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Name => out.push_str(data.name),
                Segment::ContentHash(len) | Segment::Hash(len) => {
                    let end = (*len).min(data.hash.len());
                    out.push_str(&data.hash[..end]);
                }
                Segment::Ext => {
                    if ext_style == ExtStyle::Dotted && !data.ext.is_empty() {
                        out.push('.');
                    }
                    out.push_str(data.ext);
                }
                Segment::Query => out.push_str(data.query),
            }
        }
        out
    }
}

impl fmt::Display for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_placeholder(inner: &str) -> Result<Segment, String> {
    let (key, len) = match inner.split_once(':') {
        Some((key, len)) => {
            let len: usize = len
                .parse()
                .map_err(|_| format!("invalid hash length in '[{}]'", inner))?;
            if len == 0 {
                return Err(format!("hash length must be positive in '[{}]'", inner));
            }
            (key, Some(len))
        }
        None => (inner, None),
    };

    let segment = match key {
        "contenthash" => Segment::ContentHash(len.unwrap_or(DEFAULT_HASH_LENGTH)),
        "hash" => Segment::Hash(len.unwrap_or(DEFAULT_HASH_LENGTH)),
        "name" | "ext" | "query" if len.is_some() => {
            return Err(format!("placeholder '[{}]' does not take a length", key));
        }
        "name" => Segment::Name,
        "ext" => Segment::Ext,
        "query" => Segment::Query,
        other => return Err(format!("unknown placeholder '[{}]'", other)),
    };

    Ok(segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data<'a>(hash: &'a str) -> PathData<'a> {
        PathData {
            name: "main",
            hash,
            ext: "js",
            query: "",
        }
    }

    #[test]
    fn test_render_script_pattern() {
        let template = FilenameTemplate::parse("[name].[contenthash].js").unwrap();
        let hash = "0123456789abcdef0123456789abcdef";
        assert!(template.has_hash());
        assert!(template.has_name());
        assert_eq!(
            template.render(&data(hash), ExtStyle::Bare),
            "main.0123456789abcdef0123.js"
        );
    }

    #[test]
    fn test_hash_length_suffix() {
        let template = FilenameTemplate::parse("[name].[contenthash:8].js").unwrap();
        assert_eq!(
            template.render(&data("deadbeefcafebabe"), ExtStyle::Bare),
            "main.deadbeef.js"
        );
    }

    #[test]
    fn test_ext_styles() {
        let asset = FilenameTemplate::parse("assets/images/[hash][ext][query]").unwrap();
        let font = FilenameTemplate::parse("[name].[contenthash].[ext]").unwrap();
        let png = PathData {
            name: "logo",
            hash: "abcdef0123456789abcdef",
            ext: "png",
            query: "?v=1",
        };

        assert_eq!(
            asset.render(&png, ExtStyle::Dotted),
            "assets/images/abcdef0123456789abcd.png?v=1"
        );
        assert_eq!(
            font.render(&png, ExtStyle::Bare),
            "logo.abcdef0123456789abcd.png"
        );
    }

    #[test]
    fn test_rejects_malformed_patterns() {
        assert!(FilenameTemplate::parse("").is_err());
        assert!(FilenameTemplate::parse("[name.js").is_err());
        assert!(FilenameTemplate::parse("name].js").is_err());
        assert!(FilenameTemplate::parse("[chunkhash].js").is_err());
        assert!(FilenameTemplate::parse("[contenthash:x].js").is_err());
        assert!(FilenameTemplate::parse("[name:4].js").is_err());
    }
}
