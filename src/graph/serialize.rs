//! Graph, workload and execution-result JSON
//!
//! Graph wire shape:
//! `{ "nodes": [ { "id", "type", "properties": { KEY: { "value", "type" } },
//! "position"? } ], "connections": [ { "from", "fromPort", "to", "toPort" } ],
//! "groups"? }`. Property values carry explicit type tags so `Field` and
//! `String` stay distinguishable.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::frame::serialize as frame_json;
use crate::graph::GraphError;
use crate::graph::model::{NodeGraph, VisualGroup};
use crate::graph::workload::{ValueType, Workload};

pub fn workload_to_json(workload: &Workload) -> Value {
    let ty = workload.value_type().to_string();
    let value = match workload {
        Workload::Null => Value::Null,
        Workload::Int(v) => json!(v),
        Workload::Double(v) => json!(v),
        Workload::Str(v) => json!(v),
        Workload::Bool(v) => json!(v),
        Workload::Field(v) => json!(v),
        Workload::Csv(df) => frame_json::to_json_with_schema(df),
    };
    json!({ "value": value, "type": ty })
}

pub fn json_to_workload(value: &Value) -> Result<Workload, GraphError> {
    let tag = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GraphError::InvalidGraph("workload needs a 'type' tag".into()))?;
    let ty = ValueType::from_str(tag)
        .map_err(|_| GraphError::InvalidGraph(format!("unknown workload type '{tag}'")))?;
    let payload = value.get("value").unwrap_or(&Value::Null);

    let workload = match ty {
        ValueType::Null => Workload::Null,
        ValueType::Int => Workload::Int(payload.as_i64().unwrap_or_default()),
        ValueType::Double => Workload::Double(payload.as_f64().unwrap_or_default()),
        ValueType::String => Workload::Str(payload.as_str().unwrap_or_default().to_owned()),
        ValueType::Bool => Workload::Bool(payload.as_bool().unwrap_or_default()),
        ValueType::Field => Workload::Field(payload.as_str().unwrap_or_default().to_owned()),
        ValueType::Csv => Workload::Csv(Arc::new(frame_json::from_json(payload)?)),
    };
    Ok(workload)
}

pub fn graph_to_json(graph: &NodeGraph) -> Value {
    let nodes: Vec<Value> = graph
        .node_ids()
        .iter()
        .filter_map(|id| graph.node(id))
        .map(|node| {
            let mut properties = serde_json::Map::new();
            let mut names: Vec<&String> = node.properties.keys().collect();
            names.sort();
            for name in names {
                properties.insert(name.clone(), workload_to_json(&node.properties[name]));
            }
            let mut value = json!({
                "id": node.id,
                "type": node.definition,
                "properties": properties,
            });
            if let Some((x, y)) = node.position {
                value["position"] = json!([x, y]);
            }
            value
        })
        .collect();

    let connections: Vec<Value> = graph
        .connections()
        .iter()
        .map(|c| {
            json!({
                "from": c.from,
                "fromPort": c.from_port,
                "to": c.to,
                "toPort": c.to_port,
            })
        })
        .collect();

    let mut value = json!({ "nodes": nodes, "connections": connections });
    if !graph.groups().is_empty() {
        value["groups"] = Value::Array(
            graph
                .groups()
                .iter()
                .map(|g| {
                    json!({
                        "title": g.title,
                        "bounding": g.bounding,
                        "color": g.color,
                        "fontSize": g.font_size,
                    })
                })
                .collect(),
        );
    }
    value
}

pub fn graph_from_json(value: &Value) -> Result<NodeGraph, GraphError> {
    let mut graph = NodeGraph::new();

    let nodes = value
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or_else(|| GraphError::InvalidGraph("graph JSON needs 'nodes'".into()))?;
    for node in nodes {
        let id = node
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::InvalidGraph("node needs an 'id'".into()))?;
        let definition = node
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| GraphError::InvalidGraph(format!("node '{id}' needs a 'type'")))?;
        graph.add_node_with_id(id, definition);

        if let Some(properties) = node.get("properties").and_then(Value::as_object) {
            for (name, property) in properties {
                graph.set_property(id, name.clone(), json_to_workload(property)?);
            }
        }
        if let Some(position) = node.get("position").and_then(Value::as_array)
            && let (Some(x), Some(y)) = (
                position.first().and_then(Value::as_f64),
                position.get(1).and_then(Value::as_f64),
            )
            && let Some(instance) = graph.node_mut(id)
        {
            instance.position = Some((x, y));
        }
    }

    if let Some(connections) = value.get("connections").and_then(Value::as_array) {
        for connection in connections {
            let field = |key: &str| -> Result<String, GraphError> {
                connection
                    .get(key)
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .ok_or_else(|| GraphError::InvalidGraph(format!("connection needs '{key}'")))
            };
            graph.connect(
                field("from")?,
                field("fromPort")?,
                field("to")?,
                field("toPort")?,
            );
        }
    }

    if let Some(groups) = value.get("groups").and_then(Value::as_array) {
        for group in groups {
            let bounding = group
                .get("bounding")
                .and_then(Value::as_array)
                .map(|b| {
                    let mut out = [0.0; 4];
                    for (i, v) in b.iter().take(4).enumerate() {
                        out[i] = v.as_f64().unwrap_or_default();
                    }
                    out
                })
                .unwrap_or_default();
            graph.add_group(VisualGroup {
                title: group
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                bounding,
                color: group
                    .get("color")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned(),
                font_size: group
                    .get("fontSize")
                    .and_then(Value::as_f64)
                    .unwrap_or(24.0),
            });
        }
    }

    Ok(graph)
}

/// The payload returned to an executing caller:
/// `{ "session_id", "execution_id", "results", "csv_metadata", "duration_ms" }`.
pub fn execution_result_json(
    session_id: &str,
    execution_id: &str,
    results: &HashMap<String, HashMap<String, Workload>>,
    duration_ms: i64,
) -> Value {
    let mut nodes = serde_json::Map::new();
    let mut csv_metadata = serde_json::Map::new();
    let mut ids: Vec<&String> = results.keys().collect();
    ids.sort();

    for id in ids {
        let outputs = &results[id];
        let mut ports = serde_json::Map::new();
        let mut frames = serde_json::Map::new();
        let mut port_names: Vec<&String> = outputs.keys().collect();
        port_names.sort();
        for port in port_names {
            let workload = &outputs[port];
            ports.insert(port.clone(), workload_to_json(workload));
            if let Workload::Csv(df) = workload {
                frames.insert(
                    port.clone(),
                    json!({ "rows": df.row_count(), "columns": df.column_names() }),
                );
            }
        }
        nodes.insert(id.clone(), Value::Object(ports));
        if !frames.is_empty() {
            csv_metadata.insert(id.clone(), Value::Object(frames));
        }
    }

    json!({
        "session_id": session_id,
        "execution_id": execution_id,
        "results": nodes,
        "csv_metadata": csv_metadata,
        "duration_ms": duration_ms,
    })
}
