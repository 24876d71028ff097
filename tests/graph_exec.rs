//! End-to-end graph execution: wiring, broadcasting, dynamic zones,
//! overrides, and the serialized execution surface.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use flowframe::frame::DataFrame;
use flowframe::graph::dynamic;
use flowframe::graph::equation::{parse_equations, reconstruct_equations};
use flowframe::graph::executor::{CsvOverrides, NodeExecutor};
use flowframe::graph::registry::default_registry;
use flowframe::graph::serialize::{execution_result_json, graph_from_json, graph_to_json};
use flowframe::graph::{NodeGraph, Workload};

fn sales_frame() -> Arc<DataFrame> {
    let mut df = DataFrame::new();
    df.add_string_column("item").unwrap();
    df.add_int_column("qty").unwrap();
    df.add_double_column("unit_price").unwrap();
    df.add_row(&["pen", "3", "1.5"]).unwrap();
    df.add_row(&["pad", "2", "4.0"]).unwrap();
    df.add_row(&["ink", "5", "2.0"]).unwrap();
    Arc::new(df)
}

/// Wire a source frame into a math node through csv_source.
fn math_over_frame(operand: Workload) -> (NodeGraph, String) {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    let multiply = graph.add_node("multiply");
    graph.connect(&source, "csv", &multiply, "csv");
    graph.set_property(&multiply, "src", Workload::Field("qty".into()));
    graph.set_property(&multiply, "operand", operand);
    graph.set_property(&multiply, "dest", Workload::Field("total".into()));
    (graph, multiply)
}

#[test]
fn field_times_field_runs_per_row() {
    let (mut graph, multiply) = math_over_frame(Workload::Field("unit_price".into()));
    let source = graph.node_ids()[0].clone();
    graph.set_property(&source, "_identifier", Workload::Str("sales".into()));

    let mut overrides = CsvOverrides::new();
    overrides.insert("sales".into(), sales_frame());

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor.execute(&graph, &overrides).unwrap();
    assert!(!executor.has_errors(), "{:?}", executor.errors());

    let out = results[&multiply]["csv"].as_csv().unwrap();
    let total = out.column("total").unwrap().as_double().unwrap();
    assert_eq!(total.data(), &[4.5, 8.0, 10.0]);
}

#[test]
fn scalar_operand_broadcasts_to_a_constant_factor() {
    let (mut graph, multiply) = math_over_frame(Workload::Int(10));
    let source = graph.node_ids()[0].clone();
    graph.set_property(&source, "_identifier", Workload::Str("sales".into()));

    let mut overrides = CsvOverrides::new();
    overrides.insert("sales".into(), sales_frame());

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor.execute(&graph, &overrides).unwrap();

    let out = results[&multiply]["csv"].as_csv().unwrap();
    let total = out.column("total").unwrap().as_double().unwrap();
    // qty * 10 for every row: the scalar fans out without materializing.
    assert_eq!(total.data(), &[30.0, 20.0, 50.0]);
}

#[test]
fn csv_override_replaces_the_source_frame() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    graph.set_property(&source, "_identifier", Workload::Str("data".into()));

    let mut overrides = CsvOverrides::new();
    overrides.insert("data".into(), sales_frame());

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor.execute(&graph, &overrides).unwrap();
    let out = results[&source]["csv"].as_csv().unwrap();
    assert_eq!(out.column_names(), vec!["item", "qty", "unit_price"]);

    // Without the override the node falls back to its sample data.
    let results = executor.execute(&graph, &CsvOverrides::new()).unwrap();
    let out = results[&source]["csv"].as_csv().unwrap();
    assert_eq!(out.column_names(), vec!["id", "name", "price"]);
}

#[test]
fn active_csv_is_inferred_through_intermediate_nodes() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    graph.set_property(&source, "_identifier", Workload::Str("sales".into()));
    let field = graph.add_node("field");
    graph.set_property(&field, "_column", Workload::Str("qty".into()));
    graph.connect(&source, "csv", &field, "csv");

    // add gets only the field edge; its active CSV must be inferred from
    // upstream.
    let add = graph.add_node("add");
    graph.connect(&field, "field", &add, "src");
    graph.set_property(&add, "operand", Workload::Int(1));
    graph.set_property(&add, "dest", Workload::Field("qty_next".into()));

    let mut overrides = CsvOverrides::new();
    overrides.insert("sales".into(), sales_frame());

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor.execute(&graph, &overrides).unwrap();
    assert!(!executor.has_errors(), "{:?}", executor.errors());

    let out = results[&add]["csv"].as_csv().unwrap();
    let next = out.column("qty_next").unwrap().as_double().unwrap();
    assert_eq!(next.data(), &[4.0, 3.0, 6.0]);
}

#[test]
fn equation_scenario_parses_to_two_ops() {
    let ops = parse_equations(&["D = ($A + $B) * $C".into()]).unwrap();
    assert_eq!(ops.len(), 2);
    assert_eq!(ops[0].op.to_string(), "add");
    assert_eq!(ops[0].dest, "_tmp_0");
    assert_eq!(ops[1].op.to_string(), "multiply");
    assert_eq!(ops[1].dest, "D");
    insta::assert_snapshot!(
        reconstruct_equations(&ops).join("; "),
        @"D = ($A + $B) * $C"
    );
}

#[test]
fn dynamic_zone_expands_and_executes() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    graph.set_property(&source, "_identifier", Workload::Str("sales".into()));
    let begin = graph.add_node("dynamic_begin");
    let end = graph.add_node("dynamic_end");
    graph.set_property(&begin, "_name", Workload::Str("calc".into()));
    graph.set_property(&end, "_name", Workload::Str("calc".into()));
    graph.connect(&source, "csv", &begin, "csv");
    graph.connect(&begin, "csv", &end, "csv");

    let mut overrides = CsvOverrides::new();
    overrides.insert("sales".into(), sales_frame());

    let mut zones = HashMap::new();
    zones.insert(
        "calc".to_string(),
        vec!["total = $qty * $unit_price + 1".to_string()],
    );

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor
        .execute_with_zones(&graph, &overrides, &zones)
        .unwrap();
    assert!(!executor.has_errors(), "{:?}", executor.errors());

    let out = results[&end]["csv"].as_csv().unwrap();
    let total = out.column("total").unwrap().as_double().unwrap();
    assert_eq!(total.data(), &[5.5, 9.0, 11.0]);
    // The intermediate landed as a temp column upstream of clean-up.
    assert!(out.has_column("_tmp_0"));
}

#[test]
fn apply_dynamic_persists_into_the_graph() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    let begin = graph.add_node("dynamic_begin");
    let end = graph.add_node("dynamic_end");
    graph.set_property(&begin, "_name", Workload::Str("z".into()));
    graph.set_property(&end, "_name", Workload::Str("z".into()));
    graph.connect(&source, "csv", &begin, "csv");
    graph.connect(&begin, "csv", &end, "csv");

    dynamic::apply_dynamic(&mut graph, "z", &["x = $price * 2".into()]).unwrap();

    // The expansion survives serialization.
    let roundtripped = graph_from_json(&graph_to_json(&graph)).unwrap();
    let (begin, end) = dynamic::find_zone(&roundtripped, "z").unwrap();
    let ops = dynamic::extract_math_ops(&roundtripped, &begin, &end).unwrap();
    assert_eq!(reconstruct_equations(&ops), vec!["x = $price * 2"]);

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor
        .execute(&roundtripped, &CsvOverrides::new())
        .unwrap();
    assert!(!executor.has_errors(), "{:?}", executor.errors());
    let end_id = dynamic::find_zone(&roundtripped, "z").unwrap().1;
    let out = results[&end_id]["csv"].as_csv().unwrap();
    let x = out.column("x").unwrap().as_double().unwrap();
    assert_eq!(x.data(), &[3.0, 1.5, 4.0, 7.0]);
}

#[test]
fn named_outputs_are_collected() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    let output = graph.add_node("output");
    graph.set_property(&output, "_name", Workload::Str("report".into()));
    graph.connect(&source, "csv", &output, "csv");

    let mut executor = NodeExecutor::new(default_registry());
    executor.execute(&graph, &CsvOverrides::new()).unwrap();

    let named = executor.named_outputs();
    assert_eq!(named.len(), 1);
    assert_eq!(named[0].name, "report");
    assert!(named[0].frame.is_some());

    let record = executor.record("session-1", None, 5);
    assert_eq!(record.nodes_executed, 2);
    assert_eq!(record.outputs.len(), 1);
}

#[test]
fn graph_roundtrip_executes_identically() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    let filter_field = graph.add_node("field");
    graph.set_property(&filter_field, "_column", Workload::Str("name".into()));
    graph.connect(&source, "csv", &filter_field, "csv");
    let select = graph.add_node("select_by_name");
    graph.connect(&source, "csv", &select, "csv");
    graph.connect(&filter_field, "field", &select, "column");

    let roundtripped = graph_from_json(&graph_to_json(&graph)).unwrap();

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor
        .execute(&roundtripped, &CsvOverrides::new())
        .unwrap();
    assert!(!executor.has_errors(), "{:?}", executor.errors());
    let out = results[&select]["csv"].as_csv().unwrap();
    assert_eq!(out.column_names(), vec!["name"]);
    assert_eq!(out.row_count(), 4);
}

#[test]
fn execution_result_payload_shape() {
    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");

    let mut executor = NodeExecutor::new(default_registry());
    let results = executor.execute(&graph, &CsvOverrides::new()).unwrap();
    let payload = execution_result_json("s1", "e1", &results, 3);

    assert_eq!(payload["session_id"], "s1");
    assert_eq!(payload["execution_id"], "e1");
    assert_eq!(payload["csv_metadata"][&source]["csv"]["rows"], 4);
    assert_eq!(
        payload["csv_metadata"][&source]["csv"]["columns"],
        json!(["id", "name", "price"])
    );
    assert!(payload["results"][&source]["csv"]["value"]["schema"].is_array());
}

#[test]
fn events_track_node_lifecycle() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut graph = NodeGraph::new();
    let source = graph.add_node("csv_source");
    let field = graph.add_node("field");
    graph.set_property(&field, "_column", Workload::Str("ghost".into()));
    graph.connect(&source, "csv", &field, "csv");

    let events: Rc<RefCell<Vec<serde_json::Value>>> = Rc::default();
    let sink = Rc::clone(&events);

    let mut executor = NodeExecutor::new(default_registry());
    executor.set_callback(move |event| sink.borrow_mut().push(event.to_json()));
    executor.execute(&graph, &CsvOverrides::new()).unwrap();

    let events = events.borrow();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["status"], "started");
    assert_eq!(events[1]["status"], "completed");
    assert_eq!(events[1]["csv_metadata"]["csv"]["rows"], 4);
    // The bad field reference fails but execution completed.
    assert_eq!(events[3]["status"], "failed");
    assert!(
        events[3]["error_message"]
            .as_str()
            .unwrap()
            .contains("ghost")
    );
}
