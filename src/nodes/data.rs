//! Data nodes: frame sources, field references, the flex join, outputs

use std::str::FromStr;

use crate::frame::io;
use crate::frame::spec::{FlexJoinOptions, JoinKeySpec, JoinMode, JoinSpec};
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};
use crate::nodes::MAX_NUMBERED_PORTS;

pub fn register(registry: &mut NodeRegistry) {
    register_csv_source(registry);
    register_field(registry);
    register_join_flex(registry);
    register_output(registry);
}

fn register_csv_source(registry: &mut NodeRegistry) {
    NodeBuilder::new("csv_source", "data")
        .input_optional("csv", ValueType::Csv)
        .output("csv", ValueType::Csv)
        .entry_point()
        .on_compile(|ctx| {
            // A connected frame (or an injected override) passes through.
            if let Ok(frame) = ctx.get_input("csv").as_csv() {
                ctx.set_output("csv", frame);
                return;
            }

            // A configured path loads from disk.
            if let Workload::Str(path) = ctx.get_input("_path") {
                match io::read_csv(&path, b',', true) {
                    Ok(frame) => ctx.set_output("csv", frame),
                    Err(e) => ctx.fail(e),
                }
                return;
            }

            // Fallback sample data for unconfigured sources.
            let mut frame = crate::frame::DataFrame::new();
            let built = frame
                .add_int_column("id")
                .and_then(|_| frame.add_string_column("name"))
                .and_then(|_| frame.add_double_column("price"))
                .and_then(|_| frame.add_row(&["1", "Apple", "1.50"]))
                .and_then(|_| frame.add_row(&["2", "Banana", "0.75"]))
                .and_then(|_| frame.add_row(&["3", "Orange", "2.00"]))
                .and_then(|_| frame.add_row(&["4", "Grape", "3.50"]));
            match built {
                Ok(()) => ctx.set_output("csv", frame),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_field(registry: &mut NodeRegistry) {
    NodeBuilder::new("field", "csv")
        .input("csv", ValueType::Csv)
        .output("field", ValueType::Field)
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("no csv input");
                return;
            };
            let column = match ctx.get_input("_column") {
                Workload::Str(name) | Workload::Field(name) if !name.is_empty() => name,
                _ => {
                    ctx.set_error("no column specified (set the _column property)");
                    return;
                }
            };
            if !csv.has_column(&column) {
                ctx.set_error(format!("column not found: {column}"));
                return;
            }
            ctx.set_output("field", Workload::Field(column));
            ctx.set_output("csv", csv);
        })
        .register(registry);
}

fn mode_property(ctx: &NodeContext, name: &str, fallback: JoinMode) -> JoinMode {
    match ctx.get_input(name) {
        Workload::Str(text) => JoinMode::from_str(&text).unwrap_or(fallback),
        _ => fallback,
    }
}

fn register_join_flex(registry: &mut NodeRegistry) {
    NodeBuilder::new("join_flex", "csv")
        .input("left_csv", ValueType::Csv)
        .input("right_csv", ValueType::Csv)
        .input("left_field", [ValueType::Field, ValueType::String])
        .input("right_field", [ValueType::Field, ValueType::String])
        .output("csv_no_match", ValueType::Csv)
        .output("csv_single_match", ValueType::Csv)
        .output("csv_multiple_match", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(left) = ctx.get_input("left_csv").as_csv() else {
                ctx.set_error("no left csv input");
                return;
            };
            let Ok(right) = ctx.get_input("right_csv").as_csv() else {
                ctx.set_error("no right csv input");
                return;
            };

            let mut keys = Vec::new();
            let left_key = ctx.get_input("left_field");
            let right_key = ctx.get_input("right_field");
            match (left_key.as_text(), right_key.as_text()) {
                (Ok(left), Ok(right)) => keys.push(JoinKeySpec::Pair {
                    left: left.to_owned(),
                    right: right.to_owned(),
                }),
                _ => {
                    ctx.set_error("both left_field and right_field are required");
                    return;
                }
            }
            // Extra key pairs ride as numbered widget properties.
            for i in 0..MAX_NUMBERED_PORTS {
                let left = ctx.get_input(&format!("_left_field_{i}"));
                if left.is_null() {
                    break;
                }
                let right = ctx.get_input(&format!("_right_field_{i}"));
                match (left.as_text(), right.as_text()) {
                    (Ok(l), Ok(r)) => keys.push(JoinKeySpec::Pair {
                        left: l.to_owned(),
                        right: r.to_owned(),
                    }),
                    _ => {
                        ctx.set_error(format!("missing _right_field_{i}"));
                        return;
                    }
                }
            }

            let options = FlexJoinOptions {
                no_match: mode_property(
                    ctx,
                    "_no_match_keep_jointure",
                    JoinMode::KeepHeaderOnly,
                ),
                single_match: mode_property(
                    ctx,
                    "_single_match_keep_jointure",
                    JoinMode::KeepAll,
                ),
                multiple_match: mode_property(
                    ctx,
                    "_double_match_keep_jointure",
                    JoinMode::KeepAll,
                ),
            };

            match left.flex_join(&right, &JoinSpec { keys }, &options) {
                Ok(result) => {
                    ctx.set_output("csv_no_match", result.no_match);
                    ctx.set_output("csv_single_match", result.single_match);
                    ctx.set_output("csv_multiple_match", result.multiple_match);
                }
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_output(registry: &mut NodeRegistry) {
    NodeBuilder::new("output", "data")
        .input("csv", ValueType::Csv)
        .output("csv", ValueType::Csv)
        .output("output_name", ValueType::String)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("no csv input");
                return;
            };
            let name = match ctx.get_input("_name") {
                Workload::Str(name) => name,
                _ => String::new(),
            };
            ctx.set_output("csv", csv);
            ctx.set_output("output_name", name);
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{fruit_frame, inputs, run_node};
    use std::sync::Arc;

    #[test]
    fn csv_source_passes_through_connected_frame() {
        let frame = fruit_frame();
        let ctx = run_node(
            "csv_source",
            inputs(vec![("csv", Workload::Csv(Arc::clone(&frame)))]),
        );
        let out = ctx.get_output("csv").as_csv().unwrap();
        assert!(Arc::ptr_eq(&out, &frame));
    }

    #[test]
    fn csv_source_falls_back_to_sample_data() {
        let ctx = run_node("csv_source", inputs(vec![]));
        let out = ctx.get_output("csv").as_csv().unwrap();
        assert_eq!(out.column_names(), vec!["id", "name", "price"]);
        assert_eq!(out.row_count(), 4);
    }

    #[test]
    fn field_checks_column_presence() {
        let frame = fruit_frame();
        let ctx = run_node(
            "field",
            inputs(vec![
                ("csv", Workload::Csv(Arc::clone(&frame))),
                ("_column", Workload::Str("name".into())),
            ]),
        );
        assert!(matches!(ctx.get_output("field"), Workload::Field(ref n) if n == "name"));
        assert!(ctx.get_output("csv").is_csv());

        let ctx = run_node(
            "field",
            inputs(vec![
                ("csv", Workload::Csv(frame)),
                ("_column", Workload::Str("ghost".into())),
            ]),
        );
        assert!(ctx.has_error());
    }

    #[test]
    fn join_flex_splits_by_cardinality() {
        let mut left = crate::frame::DataFrame::new();
        left.add_string_column("k").unwrap();
        for k in ["a", "b", "c", "a"] {
            left.add_row(&[k]).unwrap();
        }
        let mut right = crate::frame::DataFrame::new();
        right.add_string_column("k").unwrap();
        right.add_int_column("v").unwrap();
        for (k, v) in [("a", 1), ("a", 2), ("b", 3)] {
            right.add_row(&[k, &v.to_string()]).unwrap();
        }

        let ctx = run_node(
            "join_flex",
            inputs(vec![
                ("left_csv", Workload::from(left)),
                ("right_csv", Workload::from(right)),
                ("left_field", Workload::Field("k".into())),
                ("right_field", Workload::Field("k".into())),
                (
                    "_no_match_keep_jointure",
                    Workload::Str("yes".into()),
                ),
            ]),
        );
        assert!(!ctx.has_error(), "{}", ctx.error_message());
        let single = ctx.get_output("csv_single_match").as_csv().unwrap();
        let multiple = ctx.get_output("csv_multiple_match").as_csv().unwrap();
        let none = ctx.get_output("csv_no_match").as_csv().unwrap();
        assert_eq!(single.row_count(), 1);
        assert_eq!(multiple.row_count(), 4);
        assert_eq!(none.row_count(), 1);
        assert_eq!(none.column("k").unwrap().as_str().unwrap().at(0), "c");
    }

    #[test]
    fn output_node_names_its_frame() {
        let ctx = run_node(
            "output",
            inputs(vec![
                ("csv", Workload::Csv(fruit_frame())),
                ("_name", Workload::Str("report".into())),
            ]),
        );
        assert_eq!(ctx.get_output("output_name").as_text().unwrap(), "report");
        assert!(ctx.get_output("csv").is_csv());
    }
}
