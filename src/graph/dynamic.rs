//! Dynamic zones: equation-driven graph expansion
//!
//! A `dynamic_begin` / `dynamic_end` marker pair with a matching `_name`
//! property delimits a zone. Expansion disconnects the begin → end edge,
//! parses the supplied equations, and chains one math node per flat
//! operation through the zone. Numeric operands get their own value-source
//! nodes; field and temp operands ride as widget properties. The persistent
//! variant removes previously injected intermediaries before re-expanding,
//! and `extract_math_ops` recovers the flat list from an expanded zone.

use std::str::FromStr;

use crate::graph::GraphError;
use crate::graph::equation::{self, BinaryOp, MathOp, Operand};
use crate::graph::model::NodeGraph;
use crate::graph::workload::Workload;

/// Locate a zone's marker pair by its `_name` property.
pub fn find_zone(graph: &NodeGraph, zone: &str) -> Result<(String, String), GraphError> {
    let mut begin = None;
    let mut end = None;
    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else { continue };
        let name = graph.property(id, "_name");
        let matches = name.as_text().map(|n| n == zone).unwrap_or(false);
        if !matches {
            continue;
        }
        match node.definition.as_str() {
            "dynamic_begin" => begin = Some(id.clone()),
            "dynamic_end" => end = Some(id.clone()),
            _ => {}
        }
    }
    match (begin, end) {
        (Some(begin), Some(end)) => Ok((begin, end)),
        _ => Err(GraphError::UnknownZone(zone.to_owned())),
    }
}

/// Chain of node ids strictly between the markers, following `csv` edges.
fn chain_between(graph: &NodeGraph, begin: &str, end: &str) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = begin.to_owned();
    loop {
        let next = graph
            .connections()
            .iter()
            .find(|c| c.from == current && c.from_port == "csv")
            .map(|c| c.to.clone());
        match next {
            Some(next) if next == end => break,
            Some(next) => {
                chain.push(next.clone());
                current = next;
            }
            None => break,
        }
    }
    chain
}

fn operand_into_port(graph: &mut NodeGraph, node_id: &str, port: &str, operand: &Operand) {
    match operand {
        Operand::Field(name) | Operand::Temp(name) => {
            graph.set_property(node_id, port, Workload::Field(name.clone()));
        }
        Operand::Number(value) => {
            let source = graph.add_node("double_value");
            graph.set_property(&source, "_value", Workload::Double(*value));
            graph.connect(&source, "value", node_id, port);
        }
    }
}

/// Expand `equations` into the named zone: one math node per parsed
/// operation, chained in series between the markers.
pub fn expand_zone(
    graph: &mut NodeGraph,
    zone: &str,
    equations: &[String],
) -> Result<(), GraphError> {
    let (begin, end) = find_zone(graph, zone)?;
    let ops = equation::parse_equations(equations)?;

    graph.disconnect(&end, "csv");
    let mut previous = begin;
    for op in &ops {
        let node = graph.add_node(op.op.to_string());
        graph.connect(&previous, "csv", &node, "csv");
        operand_into_port(graph, &node, "src", &op.src);
        operand_into_port(graph, &node, "operand", &op.operand);
        graph.set_property(&node, "dest", Workload::Field(op.dest.clone()));
        previous = node;
    }
    graph.connect(&previous, "csv", &end, "csv");
    Ok(())
}

/// Persistent re-expansion: remove the zone's previous intermediaries
/// (and their value-source feeders), then expand the new equations.
pub fn apply_dynamic(
    graph: &mut NodeGraph,
    zone: &str,
    equations: &[String],
) -> Result<(), GraphError> {
    let (begin, end) = find_zone(graph, zone)?;
    let chain = chain_between(graph, &begin, &end);

    let feeders: Vec<String> = chain
        .iter()
        .flat_map(|id| graph.connections_into(id))
        .filter(|c| {
            graph
                .node(&c.from)
                .is_some_and(|n| n.definition == "double_value" || n.definition == "int_value")
        })
        .map(|c| c.from.clone())
        .collect();

    for id in chain.iter().chain(&feeders) {
        graph.remove_node(id);
    }
    graph.connect(&begin, "csv", &end, "csv");

    expand_zone(graph, zone, equations)
}

/// Recover the flat op list from an expanded zone, in chain order.
pub fn extract_math_ops(
    graph: &NodeGraph,
    begin: &str,
    end: &str,
) -> Result<Vec<MathOp>, GraphError> {
    let mut ops = Vec::new();
    for id in chain_between(graph, begin, end) {
        let Some(node) = graph.node(&id) else { continue };
        let short = node
            .definition
            .rsplit_once('/')
            .map_or(node.definition.as_str(), |(_, s)| s);
        let op = BinaryOp::from_str(short)
            .map_err(|_| equation::EquationError::UnknownOperation(short.to_owned()))?;

        let src = extract_operand(graph, &id, "src")?;
        let operand = extract_operand(graph, &id, "operand")?;
        let dest = match graph.property(&id, "dest") {
            Workload::Field(name) | Workload::Str(name) => name,
            _ => String::new(),
        };
        ops.push(MathOp {
            op,
            src,
            operand,
            dest,
        });
    }
    Ok(ops)
}

fn extract_operand(graph: &NodeGraph, node_id: &str, port: &str) -> Result<Operand, GraphError> {
    match graph.property(node_id, port) {
        Workload::Field(name) => return Ok(Operand::from_name(&name)),
        Workload::Double(value) => return Ok(Operand::Number(value)),
        Workload::Int(value) => return Ok(Operand::Number(value as f64)),
        _ => {}
    }
    if let Some(connection) = graph.connection_to(node_id, port) {
        match graph.property(&connection.from, "_value") {
            Workload::Double(value) => return Ok(Operand::Number(value)),
            Workload::Int(value) => return Ok(Operand::Number(value as f64)),
            _ => {}
        }
    }
    Ok(Operand::Number(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::equation::reconstruct_equations;

    fn zone_graph() -> (NodeGraph, String, String) {
        let mut graph = NodeGraph::new();
        let source = graph.add_node("csv_source");
        let begin = graph.add_node("dynamic_begin");
        let end = graph.add_node("dynamic_end");
        graph.set_property(&begin, "_name", Workload::Str("calc".into()));
        graph.set_property(&end, "_name", Workload::Str("calc".into()));
        graph.connect(&source, "csv", &begin, "csv");
        graph.connect(&begin, "csv", &end, "csv");
        (graph, begin, end)
    }

    #[test]
    fn find_zone_by_name() {
        let (graph, begin, end) = zone_graph();
        assert_eq!(find_zone(&graph, "calc").unwrap(), (begin, end));
        assert!(matches!(
            find_zone(&graph, "nope"),
            Err(GraphError::UnknownZone(_))
        ));
    }

    #[test]
    fn expansion_chains_math_nodes() {
        let (mut graph, begin, end) = zone_graph();
        expand_zone(&mut graph, "calc", &["D = ($A + $B) * $C".into()]).unwrap();

        let chain = chain_between(&graph, &begin, &end);
        assert_eq!(chain.len(), 2);
        let add = graph.node(&chain[0]).unwrap();
        let mul = graph.node(&chain[1]).unwrap();
        assert_eq!(add.definition, "add");
        assert_eq!(mul.definition, "multiply");
        // The begin → end edge was rewired through the chain.
        assert_eq!(graph.connection_to(&end, "csv").unwrap().from, chain[1]);
    }

    #[test]
    fn numeric_operands_get_value_sources() {
        let (mut graph, begin, end) = zone_graph();
        expand_zone(&mut graph, "calc", &["D = $A * 2".into()]).unwrap();
        let chain = chain_between(&graph, &begin, &end);
        let feeder = graph.connection_to(&chain[0], "operand").unwrap();
        assert_eq!(graph.node(&feeder.from).unwrap().definition, "double_value");
        assert_eq!(
            graph
                .property(&feeder.from, "_value")
                .as_double()
                .unwrap(),
            2.0
        );
    }

    #[test]
    fn extract_reverses_expansion() {
        let (mut graph, begin, end) = zone_graph();
        let source = vec!["D = ($A + $B) * $C".to_string()];
        expand_zone(&mut graph, "calc", &source).unwrap();
        let ops = extract_math_ops(&graph, &begin, &end).unwrap();
        assert_eq!(reconstruct_equations(&ops), source);
    }

    #[test]
    fn apply_dynamic_replaces_previous_expansion() {
        let (mut graph, begin, end) = zone_graph();
        expand_zone(&mut graph, "calc", &["D = $A * 2".into()]).unwrap();
        let before = graph.node_count();

        apply_dynamic(&mut graph, "calc", &["E = $A * 3".into()]).unwrap();
        let chain = chain_between(&graph, &begin, &end);
        assert_eq!(chain.len(), 1);
        assert_eq!(graph.node(&chain[0]).unwrap().definition, "multiply");
        let ops = extract_math_ops(&graph, &begin, &end).unwrap();
        assert_eq!(ops[0].dest, "E");
        // One math node + one value feeder, same shape as before.
        assert_eq!(graph.node_count(), before);
    }
}
