//! Aggregation nodes: group, pivot, tree_group

use std::str::FromStr;

use serde_json::json;

use crate::frame::column::{Column, StrColumn};
use crate::frame::DataFrame;
use crate::frame::spec::{AggregateFn, Aggregation, GroupBySpec, PivotSpec};
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};
use crate::nodes::MAX_NUMBERED_PORTS;

pub fn register(registry: &mut NodeRegistry) {
    register_group(registry);
    register_pivot(registry);
    register_tree_group(registry);
}

/// The `_aggregation` widget, validated against the known function set.
fn aggregation_property(ctx: &mut NodeContext) -> Option<AggregateFn> {
    match ctx.get_input("_aggregation") {
        Workload::Null => Some(AggregateFn::Sum),
        Workload::Str(name) => match AggregateFn::from_str(&name) {
            Ok(function) => Some(function),
            Err(_) => {
                ctx.set_error(format!("invalid aggregation function: {name}"));
                None
            }
        },
        other => {
            ctx.set_error(format!(
                "invalid aggregation function: {}",
                other.value_type()
            ));
            None
        }
    }
}

/// Collect `field`, `field_1` … into a list of column names, verifying
/// each against the frame.
fn collect_fields(
    ctx: &mut NodeContext,
    csv: &DataFrame,
    first: &str,
    rest_prefix: &str,
) -> Option<Vec<String>> {
    let mut names = Vec::new();
    if let Ok(name) = ctx.get_input(first).as_text() {
        names.push(name.to_owned());
    }
    for i in 1..=MAX_NUMBERED_PORTS {
        let input = ctx.get_input(&format!("{rest_prefix}_{i}"));
        if input.is_null() {
            continue;
        }
        match input.as_text() {
            Ok(name) => names.push(name.to_owned()),
            Err(_) => continue,
        }
    }
    if names.is_empty() {
        ctx.set_error("at least one field input required");
        return None;
    }
    for name in &names {
        if !csv.has_column(name) {
            ctx.set_error(format!("column not found: {name}"));
            return None;
        }
    }
    Some(names)
}

fn register_group(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("group", "aggregate")
        .input("csv", ValueType::Csv)
        .input("field", ValueType::Field);
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(format!("field_{i}"), ValueType::Field);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let Some(function) = aggregation_property(ctx) else {
                return;
            };
            let Some(group_by) = collect_fields(ctx, &csv, "field", "field") else {
                return;
            };

            // Every non-group column gets the same aggregation, aliased to
            // its own name.
            let aggregations: Vec<Aggregation> = csv
                .column_names()
                .into_iter()
                .filter(|name| !group_by.contains(name))
                .map(|column| Aggregation {
                    alias: column.clone(),
                    column,
                    function,
                })
                .collect();

            match csv.group_by(&GroupBySpec {
                group_by,
                aggregations,
            }) {
                Ok(result) => ctx.set_output("csv", result),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_pivot(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("pivot", "aggregate")
        .input("csv", ValueType::Csv)
        .input("pivot_column", ValueType::Field)
        .input("value_column", ValueType::Field)
        .input_optional("index_column", ValueType::Field);
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(format!("index_column_{i}"), ValueType::Field);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let Ok(pivot_column) = ctx.get_input("pivot_column").as_text().map(str::to_owned)
            else {
                ctx.set_error("pivot_column input required");
                return;
            };
            let Ok(value_column) = ctx.get_input("value_column").as_text().map(str::to_owned)
            else {
                ctx.set_error("value_column input required");
                return;
            };

            let mut index_columns = Vec::new();
            if let Ok(name) = ctx.get_input("index_column").as_text() {
                index_columns.push(name.to_owned());
            }
            for i in 1..=MAX_NUMBERED_PORTS {
                match ctx.get_input(&format!("index_column_{i}")).as_text() {
                    Ok(name) => index_columns.push(name.to_owned()),
                    Err(_) => break,
                }
            }

            let prefix = match ctx.get_input("_prefix") {
                Workload::Str(prefix) => Some(prefix),
                _ => None,
            };

            let spec = PivotSpec {
                pivot_column,
                value_column,
                index_columns: if index_columns.is_empty() {
                    None
                } else {
                    Some(index_columns)
                },
                prefix,
            };
            match csv.pivot_df(&spec) {
                Ok(result) => ctx.set_output("csv", result),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_tree_group(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("tree_group", "aggregate")
        .input("csv", ValueType::Csv)
        .input("field", ValueType::Field);
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(format!("field_{i}"), ValueType::Field);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let Some(function) = aggregation_property(ctx) else {
                return;
            };
            let Some(hierarchy) = collect_fields(ctx, &csv, "field", "field") else {
                return;
            };

            let rows = csv.row_count();
            let mut result = DataFrame::with_pool(csv.pool().clone());
            for column in csv.columns() {
                result.set_column(column.clone());
            }

            // Per-row hierarchy path, root to leaf, as a JSON array string.
            let mut path_column = StrColumn::new("__tree_path", csv.pool().clone());
            for row in 0..rows {
                let mut path = Vec::with_capacity(hierarchy.len());
                for name in &hierarchy {
                    match csv.column(name) {
                        Ok(column) => path.push(column.text_at(row)),
                        Err(e) => {
                            ctx.fail(e);
                            return;
                        }
                    }
                }
                path_column.push(&json!(path).to_string());
            }
            result.set_column(Column::Str(path_column));

            let mut agg_column = StrColumn::new("__tree_agg", csv.pool().clone());
            let function_name: &'static str = function.into();
            for _ in 0..rows {
                agg_column.push(function_name);
            }
            result.set_column(Column::Str(agg_column));

            ctx.set_output("csv", result);
        })
        .register(registry);
}
