//! Label nodes: named data transport without visible edges
//!
//! A define node stores its input under the `_label` name in the
//! execution's label registry and passes the value through; a ref node
//! reads the name back out. A ref that misses the registry emits `Null`.

use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};

pub fn register(registry: &mut NodeRegistry) {
    define_node(registry, "label_define_csv", "csv", ValueType::Csv);
    define_node(registry, "label_define_field", "field", ValueType::Field);
    define_node(registry, "label_define_int", "value", ValueType::Int);
    define_node(registry, "label_define_double", "value", ValueType::Double);
    define_node(registry, "label_define_string", "value", ValueType::String);
    ref_node(registry, "label_ref_csv", "csv", ValueType::Csv);
    ref_node(registry, "label_ref_field", "field", ValueType::Field);
    ref_node(registry, "label_ref_int", "value", ValueType::Int);
    ref_node(registry, "label_ref_double", "value", ValueType::Double);
    ref_node(registry, "label_ref_string", "value", ValueType::String);
}

fn label_name(ctx: &NodeContext) -> Option<String> {
    match ctx.get_input("_label") {
        Workload::Str(name) if !name.is_empty() => Some(name),
        _ => None,
    }
}

fn define_node(
    registry: &mut NodeRegistry,
    name: &'static str,
    port: &'static str,
    ty: ValueType,
) {
    NodeBuilder::new(name, "label")
        .input(port, ty)
        .output(port, ty)
        .on_compile(move |ctx| {
            let Some(label) = label_name(ctx) else {
                ctx.set_error("no label name (set the _label property)");
                return;
            };
            let value = ctx.get_input(port);
            if value.is_null() {
                ctx.set_error(format!("input '{port}' is not connected"));
                return;
            }
            ctx.define_label(&label, value.clone());
            ctx.set_output(port, value);
        })
        .register(registry);
}

fn ref_node(
    registry: &mut NodeRegistry,
    name: &'static str,
    port: &'static str,
    ty: ValueType,
) {
    // `after` carries no data. Labels have no visible edges, so a ref that
    // must run after its define needs an ordering edge from the defining
    // chain; any workload can ride it.
    NodeBuilder::new(name, "label")
        .input_optional(
            "after",
            [
                ValueType::Int,
                ValueType::Double,
                ValueType::String,
                ValueType::Bool,
                ValueType::Null,
                ValueType::Field,
                ValueType::Csv,
            ],
        )
        .output(port, ty)
        .on_compile(move |ctx| {
            let Some(label) = label_name(ctx) else {
                ctx.set_error("no label name (set the _label property)");
                return;
            };
            ctx.set_output(port, ctx.get_label(&label));
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::executor::{CsvOverrides, NodeExecutor};
    use crate::graph::model::NodeGraph;
    use crate::graph::registry::default_registry;
    use crate::nodes::test_support::{inputs, run_node};

    #[test]
    fn define_requires_a_label_name() {
        let ctx = run_node("label_define_int", inputs(vec![("value", Workload::Int(1))]));
        assert!(ctx.has_error());
    }

    #[test]
    fn ref_miss_yields_null() {
        let ctx = run_node(
            "label_ref_int",
            inputs(vec![("_label", Workload::Str("nothing".into()))]),
        );
        assert!(!ctx.has_error());
        assert!(ctx.get_output("value").is_null());
    }

    #[test]
    fn labels_flow_across_a_graph_without_edges() {
        let registry = default_registry();
        let mut graph = NodeGraph::new();

        let value = graph.add_node("int_value");
        graph.set_property(&value, "_value", Workload::Int(7));
        let define = graph.add_node("label_define_int");
        graph.set_property(&define, "_label", Workload::Str("seven".into()));
        graph.connect(&value, "value", &define, "value");

        let reference = graph.add_node("label_ref_int");
        graph.set_property(&reference, "_label", Workload::Str("seven".into()));
        // Sequence the ref after the define; the carried value is unused.
        graph.connect(&define, "value", &reference, "after");

        let mut executor = NodeExecutor::new(registry);
        let results = executor.execute(&graph, &CsvOverrides::new()).unwrap();
        assert!(!executor.has_errors(), "{:?}", executor.errors());
        assert_eq!(results[&reference]["value"].as_int().unwrap(), 7);
    }

    #[test]
    fn registry_is_cleared_between_executions() {
        let registry = default_registry();
        let mut graph = NodeGraph::new();
        let reference = graph.add_node("label_ref_string");
        graph.set_property(&reference, "_label", Workload::Str("stale".into()));

        // First run defines the label ...
        let mut define_graph = NodeGraph::new();
        let value = define_graph.add_node("string_value");
        define_graph.set_property(&value, "_value", Workload::Str("x".into()));
        let define = define_graph.add_node("label_define_string");
        define_graph.set_property(&define, "_label", Workload::Str("stale".into()));
        define_graph.connect(&value, "value", &define, "value");

        let mut executor = NodeExecutor::new(registry);
        executor
            .execute(&define_graph, &CsvOverrides::new())
            .unwrap();

        // ... but the next execution starts from an empty registry.
        let results = executor.execute(&graph, &CsvOverrides::new()).unwrap();
        assert!(results[&reference]["value"].is_null());
    }
}
