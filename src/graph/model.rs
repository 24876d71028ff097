//! Graph model: node instances, connections, visual groups
//!
//! Nodes are addressed by unique ids minted from a monotonic counter.
//! Insertion order is preserved so the scheduler's same-layer tie-break is
//! deterministic. Visual groups are layout metadata only.

use std::collections::HashMap;

use crate::graph::workload::Workload;

/// One placed node: definition name, widget properties, optional layout
/// position. A `_identifier` property doubles as the externally
/// addressable handle used by parameter overrides.
#[derive(Debug, Clone)]
pub struct NodeInstance {
    pub id: String,
    pub definition: String,
    pub properties: HashMap<String, Workload>,
    pub position: Option<(f64, f64)>,
}

/// At most one connection terminates at any (target node, target port).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from: String,
    pub from_port: String,
    pub to: String,
    pub to_port: String,
}

/// Editor-side grouping rectangle. Plays no role in execution.
#[derive(Debug, Clone)]
pub struct VisualGroup {
    pub title: String,
    pub bounding: [f64; 4],
    pub color: String,
    pub font_size: f64,
}

#[derive(Debug, Clone, Default)]
pub struct NodeGraph {
    nodes: HashMap<String, NodeInstance>,
    order: Vec<String>,
    connections: Vec<Connection>,
    groups: Vec<VisualGroup>,
    next_id: u64,
}

impl NodeGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            order: Vec::new(),
            connections: Vec::new(),
            groups: Vec::new(),
            next_id: 1,
        }
    }

    // === Nodes ===

    /// Add an instance of `definition`, returning its minted id.
    pub fn add_node(&mut self, definition: impl Into<String>) -> String {
        let id = format!("node_{}", self.next_id);
        self.next_id += 1;
        self.insert(NodeInstance {
            id: id.clone(),
            definition: definition.into(),
            properties: HashMap::new(),
            position: None,
        });
        id
    }

    /// Add a node under an explicit id (deserialization); keeps the id
    /// counter ahead of any numeric suffix seen.
    pub fn add_node_with_id(&mut self, id: impl Into<String>, definition: impl Into<String>) {
        let id = id.into();
        if let Some(suffix) = id
            .strip_prefix("node_")
            .and_then(|s| s.parse::<u64>().ok())
        {
            self.next_id = self.next_id.max(suffix + 1);
        }
        self.insert(NodeInstance {
            id,
            definition: definition.into(),
            properties: HashMap::new(),
            position: None,
        });
    }

    fn insert(&mut self, node: NodeInstance) {
        if !self.nodes.contains_key(&node.id) {
            self.order.push(node.id.clone());
        }
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: &str) {
        self.nodes.remove(id);
        self.order.retain(|n| n != id);
        self.connections.retain(|c| c.from != id && c.to != id);
    }

    pub fn node(&self, id: &str) -> Option<&NodeInstance> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(id)
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> &[String] {
        &self.order
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // === Connections ===

    /// Connect `from.from_port` to `to.to_port`, replacing any connection
    /// already terminating at that input.
    pub fn connect(
        &mut self,
        from: impl Into<String>,
        from_port: impl Into<String>,
        to: impl Into<String>,
        to_port: impl Into<String>,
    ) {
        let (to, to_port) = (to.into(), to_port.into());
        self.disconnect(&to, &to_port);
        self.connections.push(Connection {
            from: from.into(),
            from_port: from_port.into(),
            to,
            to_port,
        });
    }

    pub fn disconnect(&mut self, to: &str, to_port: &str) {
        self.connections
            .retain(|c| !(c.to == to && c.to_port == to_port));
    }

    /// The connection terminating at an input, if any.
    pub fn connection_to(&self, to: &str, to_port: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.to == to && c.to_port == to_port)
    }

    /// All connections terminating at a node, any port.
    pub fn connections_into(&self, to: &str) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.to == to)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    // === Properties ===

    pub fn set_property(&mut self, node_id: &str, name: impl Into<String>, value: Workload) {
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.properties.insert(name.into(), value);
        }
    }

    pub fn property(&self, node_id: &str, name: &str) -> Workload {
        self.nodes
            .get(node_id)
            .and_then(|n| n.properties.get(name))
            .cloned()
            .unwrap_or_default()
    }

    // === Visual groups ===

    pub fn add_group(&mut self, group: VisualGroup) {
        self.groups.push(group);
    }

    pub fn groups(&self) -> &[VisualGroup] {
        &self.groups
    }

    pub fn clear_groups(&mut self) {
        self.groups.clear();
    }

    // === Id counter (deserialization) ===

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn set_next_id(&mut self, next_id: u64) {
        self.next_id = next_id;
    }
}
