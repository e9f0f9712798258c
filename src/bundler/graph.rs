//! Module graph data structures
//!
//! Ids are dense indices assigned in discovery order and edges keep import
//! order, so traversals are deterministic and hashes stay stable across runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

/// Unique identifier for a module
pub type ModuleId = usize;

/// Where an asset's URL points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetUrl {
    /// A file emitted into the output directory (path relative to it)
    Output { path: String, query: String },
    /// A literal URL: data URIs or an explicit public path
    Literal(String),
}

/// Where a stylesheet ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleTarget {
    /// Written by the css-extract plugin
    Extract,
    /// Injected at runtime through a `<style>` tag
    Inject,
    /// Exported as a string
    Export,
}

/// Piece of a stylesheet; `url(...)` references are kept apart so they can
/// be rewritten relative to wherever the stylesheet is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StylePart {
    Text(String),
    Url(AssetUrl),
}

/// Processed content of a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    /// Placeholder while dependencies are being processed
    Pending,
    Script { code: String },
    Style { parts: Vec<StylePart>, target: StyleTarget },
    Asset { url: AssetUrl, es_module: bool },
}

/// A module in the dependency graph
#[derive(Debug, Clone)]
pub struct Module {
    /// Project-relative id (`src/index.js`, `src/a.png?v=1`)
    pub id: String,

    /// Absolute path to the module
    pub path: PathBuf,

    /// Index of the rule that processed this module
    pub rule: Option<usize>,

    pub kind: ModuleKind,
}

/// The module dependency graph
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,

    /// Map from module id to index
    ids: HashMap<String, ModuleId>,

    /// Resolved dependencies per module: (specifier, target)
    edges: Vec<Vec<(String, ModuleId)>>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning the existing id if it is already present
    pub fn add_module(&mut self, module: Module) -> ModuleId {
        if let Some(&id) = self.ids.get(&module.id) {
            return id;
        }

        let id = self.modules.len();
        self.ids.insert(module.id.clone(), id);
        self.modules.push(module);
        self.edges.push(Vec::new());
        id
    }

    /// Add a dependency edge between modules
    pub fn add_dependency(&mut self, from: ModuleId, specifier: &str, to: ModuleId) {
        if let Some(deps) = self.edges.get_mut(from) {
            if !deps.iter().any(|(spec, _)| spec == specifier) {
                deps.push((specifier.to_string(), to));
            }
        }
    }

    pub fn get_module_id(&self, id: &str) -> Option<ModuleId> {
        self.ids.get(id).copied()
    }

    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    pub fn get_module_mut(&mut self, id: ModuleId) -> Option<&mut Module> {
        self.modules.get_mut(id)
    }

    /// Dependencies of a module in import order
    pub fn dependencies(&self, id: ModuleId) -> &[(String, ModuleId)] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Modules reachable from `start` in breadth-first order
    pub fn get_reachable_modules(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            result.push(id);

            for &(_, dep_id) in self.dependencies(id) {
                if visited.insert(dep_id) {
                    queue.push_back(dep_id);
                }
            }
        }

        result
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
