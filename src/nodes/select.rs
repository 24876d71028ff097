//! Column-shaping nodes: selection, reordering, renaming

use std::collections::HashMap;

use crate::frame::DataFrame;
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};
use crate::nodes::MAX_NUMBERED_PORTS;

pub fn register(registry: &mut NodeRegistry) {
    register_select_by_name(registry);
    register_select_by_pos(registry);
    register_reorder_columns(registry);
    register_clean_tmp_columns(registry);
    register_remap_by_name(registry);
    register_remap_by_csv(registry);
}

/// Collect `column`, `column_1` … inputs into an ordered name list.
fn collect_columns(ctx: &NodeContext) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(name) = ctx.get_input("column").as_text() {
        names.push(name.to_owned());
    }
    for i in 1..=MAX_NUMBERED_PORTS {
        if let Ok(name) = ctx.get_input(&format!("column_{i}")).as_text() {
            names.push(name.to_owned());
        }
    }
    names
}

fn register_select_by_name(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("select_by_name", "select")
        .input("csv", ValueType::Csv)
        .input("column", ValueType::Field);
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(format!("column_{i}"), ValueType::Field);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let names = collect_columns(ctx);
            if names.is_empty() {
                ctx.set_error("at least one column input required");
                return;
            }
            match csv.select(&names) {
                Ok(result) => ctx.set_output("csv", result),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_select_by_pos(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("select_by_pos", "select").input("csv", ValueType::Csv);
    for i in 0..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(format!("col_{i}"), ValueType::Bool);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            // Unset positions follow the `_default` keep flag.
            let default_keep = match ctx.get_input("_default") {
                Workload::Bool(keep) => keep,
                Workload::Str(text) => matches!(text.as_str(), "true" | "True" | "1"),
                _ => true,
            };

            let mut keep = Vec::new();
            for (i, name) in csv.column_names().into_iter().enumerate() {
                let flag = match ctx.get_input(&format!("col_{i}")) {
                    Workload::Null => default_keep,
                    other => other.as_bool().unwrap_or(default_keep),
                };
                if flag {
                    keep.push(name);
                }
            }
            match csv.select(&keep) {
                Ok(result) => ctx.set_output("csv", result),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_reorder_columns(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("reorder_columns", "select")
        .input("csv", ValueType::Csv)
        .input("column", ValueType::Field);
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(format!("column_{i}"), ValueType::Field);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let first = collect_columns(ctx);
            if first.is_empty() {
                ctx.set_error("at least one column input required");
                return;
            }
            for name in &first {
                if !csv.has_column(name) {
                    ctx.set_error(format!("column not found: {name}"));
                    return;
                }
            }

            // Named columns first, the rest in source order.
            let mut order = first.clone();
            for name in csv.column_names() {
                if !first.contains(&name) {
                    order.push(name);
                }
            }
            match csv.select(&order) {
                Ok(result) => ctx.set_output("csv", result),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn register_clean_tmp_columns(registry: &mut NodeRegistry) {
    NodeBuilder::new("clean_tmp_columns", "select")
        .input("csv", ValueType::Csv)
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let keep: Vec<String> = csv
                .column_names()
                .into_iter()
                .filter(|name| !name.starts_with("_tmp_"))
                .collect();
            match csv.select(&keep) {
                Ok(result) => ctx.set_output("csv", result),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

fn rename_columns(
    csv: &DataFrame,
    renames: &HashMap<String, String>,
    keep_unmapped: bool,
) -> DataFrame {
    let mut result = DataFrame::with_pool(csv.pool().clone());
    for column in csv.columns() {
        match renames.get(column.name()) {
            Some(new_name) => {
                let mut renamed = column.clone();
                renamed.set_name(new_name.clone());
                result.set_column(renamed);
            }
            None if keep_unmapped => result.set_column(column.clone()),
            None => {}
        }
    }
    result
}

fn register_remap_by_name(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("remap_by_name", "select")
        .input("csv", ValueType::Csv)
        .input("col", ValueType::Field)
        .input("dest", ValueType::Field);
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder
            .input_optional(format!("col_{i}"), ValueType::Field)
            .input_optional(format!("dest_{i}"), ValueType::Field);
    }
    builder
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let keep_unmapped = !matches!(
                ctx.get_input("_unmapped"),
                Workload::Str(ref mode) if mode == "remove"
            );

            let mut renames = HashMap::new();
            if let (Ok(col), Ok(dest)) = (
                ctx.get_input("col").as_text(),
                ctx.get_input("dest").as_text(),
            ) {
                renames.insert(col.to_owned(), dest.to_owned());
            }
            for i in 1..=MAX_NUMBERED_PORTS {
                if let (Ok(col), Ok(dest)) = (
                    ctx.get_input(&format!("col_{i}")).as_text(),
                    ctx.get_input(&format!("dest_{i}")).as_text(),
                ) {
                    renames.insert(col.to_owned(), dest.to_owned());
                }
            }
            if renames.is_empty() {
                ctx.set_error("at least one col/dest pair required");
                return;
            }
            for old_name in renames.keys() {
                if !csv.has_column(old_name) {
                    ctx.set_error(format!("column not found: {old_name}"));
                    return;
                }
            }
            ctx.set_output("csv", rename_columns(&csv, &renames, keep_unmapped));
        })
        .register(registry);
}

fn register_remap_by_csv(registry: &mut NodeRegistry) {
    NodeBuilder::new("remap_by_csv", "select")
        .input("csv", ValueType::Csv)
        .input("mapping", ValueType::Csv)
        .input("col", ValueType::Field)
        .input("dest", ValueType::Field)
        .output("csv", ValueType::Csv)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("csv input required");
                return;
            };
            let Ok(mapping) = ctx.get_input("mapping").as_csv() else {
                ctx.set_error("mapping csv input required");
                return;
            };
            let (Ok(col), Ok(dest)) = (
                ctx.get_input("col").as_text().map(str::to_owned),
                ctx.get_input("dest").as_text().map(str::to_owned),
            ) else {
                ctx.set_error("both 'col' and 'dest' field inputs required");
                return;
            };

            let (old_names, new_names) = match (mapping.column(&col), mapping.column(&dest)) {
                (Ok(old), Ok(new)) => (old, new),
                (Err(e), _) | (_, Err(e)) => {
                    ctx.fail(e);
                    return;
                }
            };

            let keep_unmapped = !matches!(
                ctx.get_input("_unmapped"),
                Workload::Str(ref mode) if mode == "remove"
            );

            let mut renames = HashMap::new();
            for row in 0..mapping.row_count() {
                renames.insert(old_names.text_at(row), new_names.text_at(row));
            }
            ctx.set_output("csv", rename_columns(&csv, &renames, keep_unmapped));
        })
        .register(registry);
}
