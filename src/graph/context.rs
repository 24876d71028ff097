//! Execution context handed to node compile functions
//!
//! Read-only inputs, write-only outputs, the active CSV for field
//! resolution, the execution's label registry, and the error slot. The
//! broadcasting helpers delegate to the workload accessors against the
//! active CSV.

use std::collections::HashMap;
use std::sync::Arc;

use crate::frame::DataFrame;
use crate::graph::GraphError;
use crate::graph::labels::{self, SharedLabels};
use crate::graph::workload::Workload;

#[derive(Debug, Default)]
pub struct NodeContext {
    inputs: HashMap<String, Workload>,
    outputs: HashMap<String, Workload>,
    active_csv: Option<Arc<DataFrame>>,
    labels: Option<SharedLabels>,
    error: Option<String>,
}

impl NodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    // === Input access (node logic) ===

    /// The workload bound to an input port; `Null` when unbound.
    pub fn get_input(&self, name: &str) -> Workload {
        self.inputs.get(name).cloned().unwrap_or_default()
    }

    /// Present and non-null.
    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.get(name).is_some_and(|w| !w.is_null())
    }

    /// Present, even if null. Distinguishes "connected with no value" from
    /// "never bound".
    pub fn has_input_entry(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    // === Output setting (node logic) ===

    pub fn set_output(&mut self, name: impl Into<String>, value: impl Into<Workload>) {
        self.outputs.insert(name.into(), value.into());
    }

    // === Broadcasting ===

    pub fn active_csv(&self) -> Option<&Arc<DataFrame>> {
        self.active_csv.as_ref()
    }

    pub fn set_active_csv(&mut self, csv: Arc<DataFrame>) {
        self.active_csv = Some(csv);
    }

    /// The frame vector-mode operators should run over: the active CSV if
    /// the executor found one, else an explicit `csv` input.
    pub fn csv_for_fields(&self) -> Option<Arc<DataFrame>> {
        if let Some(csv) = &self.active_csv {
            return Some(Arc::clone(csv));
        }
        self.inputs.get("csv").and_then(|w| w.as_csv().ok())
    }

    pub fn get_int_at_row(&self, input: &str, row: usize) -> Result<i64, GraphError> {
        self.get_input(input)
            .get_int_at_row(row, self.active_csv.as_ref())
    }

    pub fn get_double_at_row(&self, input: &str, row: usize) -> Result<f64, GraphError> {
        self.get_input(input)
            .get_double_at_row(row, self.active_csv.as_ref())
    }

    pub fn get_string_at_row(&self, input: &str, row: usize) -> Result<String, GraphError> {
        self.get_input(input)
            .get_string_at_row(row, self.active_csv.as_ref())
    }

    // === Labels ===

    pub fn set_labels(&mut self, labels: SharedLabels) {
        self.labels = Some(labels);
    }

    pub fn define_label(&self, name: &str, value: Workload) {
        if let Some(handle) = &self.labels {
            labels::lock(handle).define(name, value);
        }
    }

    /// Reads that miss the registry yield `Null`.
    pub fn get_label(&self, name: &str) -> Workload {
        match &self.labels {
            Some(handle) => labels::lock(handle).get(name),
            None => Workload::Null,
        }
    }

    // === Error channel ===

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    /// Record a typed error into the error slot.
    pub fn fail(&mut self, error: impl std::fmt::Display) {
        self.error = Some(error.to_string());
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }

    // === Executor-side plumbing ===

    pub fn set_input(&mut self, name: impl Into<String>, value: Workload) {
        self.inputs.insert(name.into(), value);
    }

    pub fn get_output(&self, name: &str) -> Workload {
        self.outputs.get(name).cloned().unwrap_or_default()
    }

    pub fn outputs(&self) -> &HashMap<String, Workload> {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut HashMap<String, Workload> {
        &mut self.outputs
    }

    pub fn inputs(&self) -> &HashMap<String, Workload> {
        &self.inputs
    }

    pub fn take_outputs(self) -> HashMap<String, Workload> {
        self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_input_is_null() {
        let ctx = NodeContext::new();
        assert!(ctx.get_input("x").is_null());
        assert!(!ctx.has_input("x"));
        assert!(!ctx.has_input_entry("x"));
    }

    #[test]
    fn null_entry_is_present_but_not_an_input() {
        let mut ctx = NodeContext::new();
        ctx.set_input("x", Workload::Null);
        assert!(!ctx.has_input("x"));
        assert!(ctx.has_input_entry("x"));
    }

    #[test]
    fn set_output_converts() {
        let mut ctx = NodeContext::new();
        ctx.set_output("i", 3i64);
        ctx.set_output("d", 2.5);
        ctx.set_output("s", "text");
        ctx.set_output("b", true);
        assert_eq!(ctx.get_output("i").as_int().unwrap(), 3);
        assert_eq!(ctx.get_output("d").as_double().unwrap(), 2.5);
        assert_eq!(ctx.get_output("s").as_text().unwrap(), "text");
        assert!(ctx.get_output("b").as_bool().unwrap());
    }

    #[test]
    fn broadcasting_uses_active_csv() {
        let mut df = DataFrame::new();
        df.add_int_column("n").unwrap();
        df.add_row(&["5"]).unwrap();
        df.add_row(&["6"]).unwrap();

        let mut ctx = NodeContext::new();
        ctx.set_active_csv(Arc::new(df));
        ctx.set_input("x", Workload::Field("n".into()));
        ctx.set_input("k", Workload::Int(10));
        assert_eq!(ctx.get_int_at_row("x", 1).unwrap(), 6);
        assert_eq!(ctx.get_int_at_row("k", 1).unwrap(), 10);
    }

    #[test]
    fn labels_roundtrip_through_context() {
        let shared = crate::graph::labels::new_shared();
        let mut ctx = NodeContext::new();
        ctx.set_labels(Arc::clone(&shared));
        ctx.define_label("total", Workload::Double(1.5));
        assert_eq!(ctx.get_label("total").as_double().unwrap(), 1.5);
        assert!(ctx.get_label("missing").is_null());
    }

    #[test]
    fn error_slot() {
        let mut ctx = NodeContext::new();
        assert!(!ctx.has_error());
        ctx.set_error("bad input");
        assert!(ctx.has_error());
        assert_eq!(ctx.error_message(), "bad input");
    }
}
