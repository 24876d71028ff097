//! Topologically scheduled graph execution
//!
//! One execution runs sequentially: Kahn ordering with cycle refusal,
//! per-node input gathering (connections first, widget properties as
//! fallback), active-CSV inference for broadcasting, `_identifier`-keyed
//! frame overrides, a per-execution label registry, optional event
//! callbacks, and full result collection. A node error is recorded and the
//! schedule continues; only a cycle aborts the run.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};
use serde_json::{Value, json};

use crate::frame::DataFrame;
use crate::graph::GraphError;
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeDefinition;
use crate::graph::dynamic;
use crate::graph::event::{ExecutionCallback, ExecutionEvent};
use crate::graph::labels;
use crate::graph::model::NodeGraph;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::Workload;

/// `_identifier` → frame map injected into matching csv-producing nodes.
pub type CsvOverrides = HashMap<String, Arc<DataFrame>>;

/// Everything one node produced.
#[derive(Debug, Clone, Default)]
pub struct NodeResult {
    pub node_id: String,
    pub outputs: HashMap<String, Workload>,
    pub has_error: bool,
    pub error_message: String,
}

/// A named output contributed by `output` / viz nodes, for persistence.
#[derive(Debug, Clone)]
pub struct NamedOutput {
    pub node_id: String,
    pub name: String,
    pub output_type: String,
    pub metadata: Value,
    pub frame: Option<Arc<DataFrame>>,
}

/// Summary of one finished execution.
#[derive(Debug, Clone)]
pub struct ExecutionRecord {
    pub session_id: String,
    pub graph_version: Option<String>,
    pub duration_ms: i64,
    pub nodes_executed: usize,
    pub outputs: Vec<NamedOutput>,
}

pub struct NodeExecutor<'a> {
    registry: &'a NodeRegistry,
    results: HashMap<String, NodeResult>,
    named_outputs: Vec<NamedOutput>,
    callback: Option<ExecutionCallback>,
}

impl<'a> NodeExecutor<'a> {
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self {
            registry,
            results: HashMap::new(),
            named_outputs: Vec::new(),
            callback: None,
        }
    }

    /// Install a callback receiving per-node start/finish events.
    pub fn set_callback(&mut self, callback: impl FnMut(&ExecutionEvent) + 'static) {
        self.callback = Some(Box::new(callback));
    }

    /// Execute the whole graph. Returns node id → (port → workload).
    pub fn execute(
        &mut self,
        graph: &NodeGraph,
        overrides: &CsvOverrides,
    ) -> Result<HashMap<String, HashMap<String, Workload>>, GraphError> {
        self.results.clear();
        self.named_outputs.clear();

        let order = topological_order(graph)?;
        let labels = labels::new_shared();
        debug!("executing {} nodes", order.len());

        for node_id in &order {
            self.execute_one(graph, node_id, overrides, &labels);
        }

        Ok(self
            .results
            .values()
            .map(|r| (r.node_id.clone(), r.outputs.clone()))
            .collect())
    }

    /// Expand dynamic zones with the supplied equations on a working copy
    /// of the graph, then execute it.
    pub fn execute_with_zones(
        &mut self,
        graph: &NodeGraph,
        overrides: &CsvOverrides,
        zone_equations: &HashMap<String, Vec<String>>,
    ) -> Result<HashMap<String, HashMap<String, Workload>>, GraphError> {
        let mut working = graph.clone();
        for (zone, equations) in zone_equations {
            dynamic::expand_zone(&mut working, zone, equations)?;
        }
        self.execute(&working, overrides)
    }

    fn execute_one(
        &mut self,
        graph: &NodeGraph,
        node_id: &str,
        overrides: &CsvOverrides,
        labels: &labels::SharedLabels,
    ) {
        let Some(node) = graph.node(node_id) else {
            return;
        };

        let Some(definition) = self.registry.get(&node.definition) else {
            warn!("node {node_id}: unknown definition '{}'", node.definition);
            self.record_error(
                node_id,
                format!("unknown node definition: {}", node.definition),
                0,
            );
            return;
        };
        let definition = Arc::clone(definition);

        let mut ctx = NodeContext::new();
        ctx.set_labels(Arc::clone(labels));

        // A connection into a port the definition does not declare is a
        // wiring error on this node; the rest of the graph still runs.
        for connection in graph.connections_into(node_id) {
            if definition.find_input(&connection.to_port).is_none() {
                self.record_error(
                    node_id,
                    format!(
                        "unknown input port '{}' on node '{}'",
                        connection.to_port, node.definition
                    ),
                    0,
                );
                return;
            }
        }

        self.gather_inputs(graph, node_id, &definition, &mut ctx);

        // Active CSV: the first CSV input wins; otherwise walk upstream.
        let mut active = definition
            .inputs()
            .iter()
            .filter_map(|input| match ctx.get_input(&input.name) {
                Workload::Csv(df) => Some(df),
                _ => None,
            })
            .next();
        if active.is_none() {
            active = self.find_upstream_csv(graph, node_id);
        }
        if let Some(csv) = active {
            ctx.set_active_csv(csv);
        }

        self.emit(ExecutionEvent::started(node_id));
        let start = Instant::now();
        definition.compile(&mut ctx);
        let duration_ms = start.elapsed().as_millis() as i64;

        // Parameter override: a matching `_identifier` replaces the node's
        // csv output with the injected frame.
        if let Workload::Str(identifier) | Workload::Field(identifier) =
            graph.property(node_id, "_identifier")
            && let Some(frame) = overrides.get(&identifier)
            && definition.find_output("csv").is_some()
        {
            ctx.set_output("csv", Arc::clone(frame));
        }

        if ctx.has_error() {
            let message = ctx.error_message().to_owned();
            warn!("node {node_id} failed: {message}");
            self.emit(ExecutionEvent::failed(node_id, duration_ms, &message));
            self.results.insert(
                node_id.to_owned(),
                NodeResult {
                    node_id: node_id.to_owned(),
                    outputs: ctx.take_outputs(),
                    has_error: true,
                    error_message: message,
                },
            );
            return;
        }

        let metadata = csv_metadata(&ctx);
        self.emit(ExecutionEvent::completed(node_id, duration_ms, metadata));
        self.collect_named_output(node_id, &ctx);

        self.results.insert(
            node_id.to_owned(),
            NodeResult {
                node_id: node_id.to_owned(),
                outputs: ctx.take_outputs(),
                has_error: false,
                error_message: String::new(),
            },
        );
    }

    /// Connections feed declared ports; widget properties fill the rest.
    /// A property `_x` is addressable both as `_x` and as plain `x`.
    fn gather_inputs(
        &self,
        graph: &NodeGraph,
        node_id: &str,
        definition: &NodeDefinition,
        ctx: &mut NodeContext,
    ) {
        let Some(node) = graph.node(node_id) else {
            return;
        };

        for (name, value) in &node.properties {
            ctx.set_input(name.clone(), value.clone());
        }
        for input in definition.inputs() {
            if !ctx.has_input_entry(&input.name) {
                let widget = format!("_{}", input.name);
                if let Some(value) = node.properties.get(&widget) {
                    ctx.set_input(input.name.clone(), value.clone());
                }
            }
        }

        for connection in graph.connections_into(node_id) {
            let Some(source) = self.results.get(&connection.from) else {
                continue;
            };
            let value = source
                .outputs
                .get(&connection.from_port)
                .cloned()
                .unwrap_or_default();
            ctx.set_input(connection.to_port.clone(), value);
        }
    }

    /// Nearest upstream node (breadth-first) whose outputs carry a frame.
    fn find_upstream_csv(&self, graph: &NodeGraph, node_id: &str) -> Option<Arc<DataFrame>> {
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut seen: HashSet<&str> = HashSet::new();
        queue.push_back(node_id);
        seen.insert(node_id);

        while let Some(current) = queue.pop_front() {
            for connection in graph.connections_into(current) {
                let from = connection.from.as_str();
                if !seen.insert(from) {
                    continue;
                }
                if let Some(result) = self.results.get(from) {
                    // Prefer the conventional `csv` port, then any frame.
                    if let Some(Workload::Csv(df)) = result.outputs.get("csv") {
                        return Some(Arc::clone(df));
                    }
                    if let Some(df) = result.outputs.values().find_map(|w| match w {
                        Workload::Csv(df) => Some(df),
                        _ => None,
                    }) {
                        return Some(Arc::clone(df));
                    }
                }
                queue.push_back(from);
            }
        }
        None
    }

    fn collect_named_output(&mut self, node_id: &str, ctx: &NodeContext) {
        let name = match ctx.get_output("output_name") {
            Workload::Str(s) if !s.is_empty() => s,
            _ => return,
        };
        let output_type = match ctx.get_output("output_type") {
            Workload::Str(s) => s,
            _ => "data".to_owned(),
        };
        let metadata = match ctx.get_output("output_metadata") {
            Workload::Str(s) => serde_json::from_str(&s).unwrap_or(Value::Null),
            _ => Value::Null,
        };
        let frame = ctx.get_output("csv").as_csv().ok();
        self.named_outputs.push(NamedOutput {
            node_id: node_id.to_owned(),
            name,
            output_type,
            metadata,
            frame,
        });
    }

    fn record_error(&mut self, node_id: &str, message: String, duration_ms: i64) {
        self.emit(ExecutionEvent::failed(node_id, duration_ms, &message));
        self.results.insert(
            node_id.to_owned(),
            NodeResult {
                node_id: node_id.to_owned(),
                outputs: HashMap::new(),
                has_error: true,
                error_message: message,
            },
        );
    }

    fn emit(&mut self, event: ExecutionEvent) {
        if let Some(callback) = &mut self.callback {
            callback(&event);
        }
    }

    /// Run a single definition against prepared inputs (for tests).
    pub fn execute_node(
        &self,
        definition: &NodeDefinition,
        inputs: HashMap<String, Workload>,
    ) -> NodeContext {
        let mut ctx = NodeContext::new();
        ctx.set_labels(labels::new_shared());
        let csv = inputs.values().find_map(|w| match w {
            Workload::Csv(df) => Some(Arc::clone(df)),
            _ => None,
        });
        for (name, value) in inputs {
            ctx.set_input(name, value);
        }
        if let Some(csv) = csv {
            ctx.set_active_csv(csv);
        }
        definition.compile(&mut ctx);
        ctx
    }

    // === Post-execution accessors ===

    pub fn result(&self, node_id: &str) -> Option<&NodeResult> {
        self.results.get(node_id)
    }

    pub fn has_errors(&self) -> bool {
        self.results.values().any(|r| r.has_error)
    }

    pub fn errors(&self) -> Vec<String> {
        let mut errors: Vec<String> = self
            .results
            .values()
            .filter(|r| r.has_error)
            .map(|r| format!("{}: {}", r.node_id, r.error_message))
            .collect();
        errors.sort();
        errors
    }

    pub fn named_outputs(&self) -> &[NamedOutput] {
        &self.named_outputs
    }

    /// Build the execution record for persistence.
    pub fn record(
        &self,
        session_id: impl Into<String>,
        graph_version: Option<String>,
        duration_ms: i64,
    ) -> ExecutionRecord {
        ExecutionRecord {
            session_id: session_id.into(),
            graph_version,
            duration_ms,
            nodes_executed: self.results.len(),
            outputs: self.named_outputs.clone(),
        }
    }
}

/// Row counts and column names for every CSV output of a node.
fn csv_metadata(ctx: &NodeContext) -> Value {
    let mut metadata = serde_json::Map::new();
    for (port, workload) in ctx.outputs() {
        if let Workload::Csv(df) = workload {
            metadata.insert(
                port.clone(),
                json!({ "rows": df.row_count(), "columns": df.column_names() }),
            );
        }
    }
    if metadata.is_empty() {
        Value::Null
    } else {
        Value::Object(metadata)
    }
}

/// Kahn scan over the connection edges. Sources (no incoming connection)
/// go first in graph insertion order; a queue that empties before every
/// node is visited means a cycle.
pub fn topological_order(graph: &NodeGraph) -> Result<Vec<String>, GraphError> {
    let mut in_degree: HashMap<&str, usize> = graph
        .node_ids()
        .iter()
        .map(|id| (id.as_str(), 0))
        .collect();
    for connection in graph.connections() {
        if let Some(degree) = in_degree.get_mut(connection.to.as_str()) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<&str> = graph
        .node_ids()
        .iter()
        .map(String::as_str)
        .filter(|id| in_degree.get(id).copied() == Some(0))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(current) = queue.pop_front() {
        order.push(current.to_owned());
        for connection in graph.connections() {
            if connection.from != current {
                continue;
            }
            if let Some(degree) = in_degree.get_mut(connection.to.as_str()) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(connection.to.as_str());
                }
            }
        }
    }

    if order.len() != graph.node_count() {
        return Err(GraphError::CycleDetected);
    }
    Ok(order)
}
