//! Label registry — cross-cutting data transport without edges
//!
//! Label-define nodes write named workloads here; label-ref nodes read them
//! back anywhere else in the graph. Each execution owns its registry (it is
//! cleared at execution start and never shared between runs), so concurrent
//! executions cannot clobber each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::graph::workload::Workload;

#[derive(Debug, Default)]
pub struct LabelRegistry {
    labels: HashMap<String, Workload>,
}

impl LabelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a label, overwriting any previous value under the name.
    pub fn define(&mut self, name: impl Into<String>, value: Workload) {
        self.labels.insert(name.into(), value);
    }

    /// Look up a label; a miss yields `Null`.
    pub fn get(&self, name: &str) -> Workload {
        self.labels.get(name).cloned().unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn names(&self) -> Vec<String> {
        self.labels.keys().cloned().collect()
    }
}

/// Handle shared between the executor and label nodes within one run.
pub type SharedLabels = Arc<Mutex<LabelRegistry>>;

pub fn new_shared() -> SharedLabels {
    Arc::new(Mutex::new(LabelRegistry::new()))
}

/// Lock the registry, recovering from poisoning.
pub fn lock(labels: &SharedLabels) -> std::sync::MutexGuard<'_, LabelRegistry> {
    labels.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_get_overwrite() {
        let mut reg = LabelRegistry::new();
        reg.define("x", Workload::Int(1));
        assert!(reg.has("x"));
        assert!(matches!(reg.get("x"), Workload::Int(1)));
        reg.define("x", Workload::Str("two".into()));
        assert!(matches!(reg.get("x"), Workload::Str(_)));
    }

    #[test]
    fn miss_yields_null() {
        let reg = LabelRegistry::new();
        assert!(reg.get("nope").is_null());
        assert!(!reg.has("nope"));
    }

    #[test]
    fn clear_empties() {
        let mut reg = LabelRegistry::new();
        reg.define("a", Workload::Bool(true));
        reg.clear();
        assert!(reg.names().is_empty());
    }
}
