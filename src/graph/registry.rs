//! Node definition registry
//!
//! Maps definition names to immutable definitions. Lookup also accepts the
//! `category/name` form used by graph editors, matched on the part after
//! the slash. A process-wide default registry with the full standard node
//! library is provided lazily; executors borrow whichever registry they are
//! given, which keeps tests isolated.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::graph::definition::NodeDefinition;

#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: HashMap<String, Arc<NodeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition, replacing any previous one with the name.
    pub fn register(&mut self, definition: Arc<NodeDefinition>) {
        self.nodes
            .insert(definition.name().to_owned(), definition);
    }

    pub fn unregister(&mut self, name: &str) {
        self.nodes.remove(name);
    }

    /// Look up by bare name, or by `category/name` (matched after the
    /// slash).
    pub fn get(&self, name: &str) -> Option<&Arc<NodeDefinition>> {
        if let Some(def) = self.nodes.get(name) {
            return Some(def);
        }
        name.split_once('/')
            .and_then(|(_, short)| self.nodes.get(short))
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn names_in_category(&self, category: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .nodes
            .values()
            .filter(|d| d.category() == category)
            .map(|d| d.name().to_owned())
            .collect();
        names.sort();
        names
    }

    pub fn categories(&self) -> Vec<String> {
        let set: BTreeSet<String> = self
            .nodes
            .values()
            .map(|d| d.category().to_owned())
            .collect();
        set.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}

/// The process-wide registry holding the standard node library.
pub fn default_registry() -> &'static NodeRegistry {
    static REGISTRY: Lazy<NodeRegistry> = Lazy::new(|| {
        let mut registry = NodeRegistry::new();
        crate::nodes::register_all(&mut registry);
        registry
    });
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::definition::NodeBuilder;
    use crate::graph::workload::ValueType;

    fn sample_registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new();
        NodeBuilder::new("alpha", "math")
            .output("v", ValueType::Int)
            .register(&mut registry);
        NodeBuilder::new("beta", "text")
            .output("v", ValueType::String)
            .register(&mut registry);
        registry
    }

    #[test]
    fn lookup_by_bare_and_slashed_name() {
        let registry = sample_registry();
        assert!(registry.get("alpha").is_some());
        assert!(registry.get("math/alpha").is_some());
        assert!(registry.get("anything/alpha").is_some());
        assert!(registry.get("gamma").is_none());
    }

    #[test]
    fn categories_and_names_are_sorted() {
        let registry = sample_registry();
        assert_eq!(registry.names(), vec!["alpha", "beta"]);
        assert_eq!(registry.categories(), vec!["math", "text"]);
        assert_eq!(registry.names_in_category("math"), vec!["alpha"]);
    }

    #[test]
    fn register_replaces() {
        let mut registry = sample_registry();
        NodeBuilder::new("alpha", "other")
            .output("v", ValueType::Bool)
            .register(&mut registry);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("alpha").unwrap().category(), "other");
    }

    #[test]
    fn default_registry_holds_the_standard_library() {
        let registry = default_registry();
        for name in ["add", "csv_source", "group", "join_flex", "output"] {
            assert!(registry.has(name), "missing standard node {name}");
        }
    }
}
