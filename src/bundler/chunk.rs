//! Script chunk rendering

use std::collections::BTreeMap;

use super::graph::{ModuleGraph, ModuleId, ModuleKind, StyleTarget};
use super::{asset_reference, render_style};
use crate::transform;

/// A chunk is a group of modules written to one script file
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk name (used for `[name]`)
    pub name: String,

    /// Modules in this chunk; the first one is the entry
    pub module_ids: Vec<ModuleId>,
}

impl Chunk {
    pub fn entry(name: impl Into<String>, graph: &ModuleGraph, entry: ModuleId) -> Self {
        Self {
            name: name.into(),
            module_ids: graph.get_reachable_modules(entry),
        }
    }

    /// Render the chunk: runtime header, one factory per module, then the
    /// call into the entry.
    ///
    /// Stylesheets and assets get small stand-in factories so that importing
    /// them from a script works at runtime.
    pub fn render(&self, graph: &ModuleGraph) -> String {
        let mut code = String::from(RUNTIME_HEADER);

        for &module_id in &self.module_ids {
            let Some(module) = graph.get_module(module_id) else {
                continue;
            };
            let body = match &module.kind {
                ModuleKind::Pending => continue,
                ModuleKind::Script { code } => code.clone(),
                ModuleKind::Style {
                    target: StyleTarget::Extract,
                    ..
                } => "module.exports = {};\n".to_string(),
                ModuleKind::Style {
                    parts,
                    target: StyleTarget::Inject,
                } => transform::style_module(&render_style(parts, "")),
                ModuleKind::Style {
                    parts,
                    target: StyleTarget::Export,
                } => transform::export_string(&render_style(parts, ""), false),
                ModuleKind::Asset { url, es_module } => {
                    transform::export_string(&asset_reference(url, ""), *es_module)
                }
            };

            let deps: BTreeMap<&str, &str> = graph
                .dependencies(module_id)
                .iter()
                .filter_map(|(spec, dep)| {
                    graph
                        .get_module(*dep)
                        .map(|m| (spec.as_str(), m.id.as_str()))
                })
                .collect();
            let deps = serde_json::to_string(&deps).unwrap_or_else(|_| "{}".to_string());
            let id = serde_json::Value::String(module.id.clone()).to_string();

            code.push_str(&format!(
                "\n// Module: {id}\n__assembler_define__({id}, {deps}, function(module, exports, require) {{\n{body}\n}});\n",
            ));
        }

        if let Some(entry) = self.module_ids.first().and_then(|&id| graph.get_module(id)) {
            code.push_str(&format!(
                "\n__assembler_require__({});\n",
                serde_json::Value::String(entry.id.clone())
            ));
        }

        code.push_str("})();\n");
        code
    }
}

/// Module runtime; closed by `render`
const RUNTIME_HEADER: &str = r#"(function() {
  var __assembler_modules__ = {};
  var __assembler_cache__ = {};

  function __assembler_define__(id, deps, factory) {
    __assembler_modules__[id] = { deps: deps, factory: factory };
  }

  function __assembler_require__(id) {
    if (__assembler_cache__[id]) {
      return __assembler_cache__[id].exports;
    }

    var module = { exports: {} };
    __assembler_cache__[id] = module;

    var record = __assembler_modules__[id];
    if (record) {
      record.factory(module, module.exports, function(specifier) {
        return __assembler_require__(record.deps[specifier] || specifier);
      });
    }

    return module.exports;
  }
"#;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::bundler::graph::{AssetUrl, Module, StylePart};

    #[test]
    fn test_render_wraps_modules_in_import_order() {
        let mut graph = ModuleGraph::new();
        let entry = graph.add_module(Module {
            id: "src/index.js".to_string(),
            path: PathBuf::from("/p/src/index.js"),
            rule: Some(0),
            kind: ModuleKind::Script {
                code: "require('./a');".to_string(),
            },
        });
        let dep = graph.add_module(Module {
            id: "src/a.js".to_string(),
            path: PathBuf::from("/p/src/a.js"),
            rule: Some(0),
            kind: ModuleKind::Script {
                code: "module.exports = 1;".to_string(),
            },
        });
        graph.add_dependency(entry, "./a", dep);

        let chunk = Chunk::entry("main", &graph, entry);
        let code = chunk.render(&graph);

        assert!(code.starts_with("(function() {"));
        assert!(code.contains(
            "__assembler_define__(\"src/index.js\", {\"./a\":\"src/a.js\"}, function(module, exports, require) {"
        ));
        assert!(code.contains("__assembler_define__(\"src/a.js\", {}, "));
        assert!(code.trim_end().ends_with("__assembler_require__(\"src/index.js\");\n})();"));
    }

    #[test]
    fn test_render_stand_ins_for_styles_and_assets() {
        let mut graph = ModuleGraph::new();
        let entry = graph.add_module(Module {
            id: "src/index.js".to_string(),
            path: PathBuf::from("/p/src/index.js"),
            rule: Some(0),
            kind: ModuleKind::Script {
                code: "require('./a.css'); require('./b.css'); require('./logo.png');".to_string(),
            },
        });
        let extracted = graph.add_module(Module {
            id: "src/a.css".to_string(),
            path: PathBuf::from("/p/src/a.css"),
            rule: Some(1),
            kind: ModuleKind::Style {
                parts: vec![StylePart::Text(".a {}".to_string())],
                target: StyleTarget::Extract,
            },
        });
        let injected = graph.add_module(Module {
            id: "src/b.css".to_string(),
            path: PathBuf::from("/p/src/b.css"),
            rule: Some(2),
            kind: ModuleKind::Style {
                parts: vec![
                    StylePart::Text(".b { background: ".to_string()),
                    StylePart::Url(AssetUrl::Output {
                        path: "img/logo.png".to_string(),
                        query: String::new(),
                    }),
                    StylePart::Text("; }".to_string()),
                ],
                target: StyleTarget::Inject,
            },
        });
        let asset = graph.add_module(Module {
            id: "src/logo.png".to_string(),
            path: PathBuf::from("/p/src/logo.png"),
            rule: Some(3),
            kind: ModuleKind::Asset {
                url: AssetUrl::Output {
                    path: "img/logo.png".to_string(),
                    query: String::new(),
                },
                es_module: false,
            },
        });
        graph.add_dependency(entry, "./a.css", extracted);
        graph.add_dependency(entry, "./b.css", injected);
        graph.add_dependency(entry, "./logo.png", asset);

        let code = Chunk::entry("main", &graph, entry).render(&graph);

        assert!(code.contains("__assembler_define__(\"src/a.css\", {}, function(module, exports, require) {\nmodule.exports = {};\n"));
        assert!(code.contains("style.textContent = `.b { background: url(img/logo.png); }`;"));
        assert!(code.contains("module.exports = \"img/logo.png\";"));
    }
}
