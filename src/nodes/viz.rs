//! Visualization output nodes
//!
//! These pass their frame through and emit `output_name` / `output_type` /
//! `output_metadata` so the surrounding store can persist addressable named
//! outputs. `diff_output` additionally materializes a row-by-row comparison
//! frame with status, old-value and changed-flag columns.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::frame::DataFrame;
use crate::frame::column::{Column, ColumnType, IntColumn, new_pool};
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};

pub fn register(registry: &mut NodeRegistry) {
    register_timeline_output(registry);
    register_diff_output(registry);
    register_bar_chart_output(registry);
}

fn field_name(workload: &Workload) -> Option<String> {
    match workload {
        Workload::Field(name) | Workload::Str(name) if !name.is_empty() => Some(name.clone()),
        _ => None,
    }
}

/// Record an optional color/event binding: the value plus whether it is a
/// per-row field or a constant.
fn styling(metadata: &mut serde_json::Map<String, Value>, key: &str, workload: &Workload) {
    if let Some(value) = field_name(workload) {
        metadata.insert(key.to_owned(), json!(value));
        metadata.insert(format!("{key}_is_field"), json!(workload.is_field()));
    }
}

fn register_timeline_output(registry: &mut NodeRegistry) {
    NodeBuilder::new("timeline_output", "viz")
        .input("csv", ValueType::Csv)
        .input("start_date", ValueType::Field)
        .input("name", ValueType::Field)
        .input_optional("end_date", ValueType::Field)
        .input_optional("parent", ValueType::Field)
        .input_optional("color", [ValueType::Field, ValueType::String])
        .input_optional("event", [ValueType::Field, ValueType::String])
        .output("csv", ValueType::Csv)
        .output("output_name", ValueType::String)
        .output("output_type", ValueType::String)
        .output("output_metadata", ValueType::String)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("no csv input");
                return;
            };
            let Some(start_date) = field_name(&ctx.get_input("start_date")) else {
                ctx.set_error("start_date field is required");
                return;
            };
            let Some(name) = field_name(&ctx.get_input("name")) else {
                ctx.set_error("name field is required");
                return;
            };

            let mut metadata = serde_json::Map::new();
            metadata.insert("start_date".into(), json!(start_date));
            metadata.insert("name".into(), json!(name));
            if let Some(end_date) = field_name(&ctx.get_input("end_date")) {
                metadata.insert("end_date".into(), json!(end_date));
            }
            if let Some(parent) = field_name(&ctx.get_input("parent")) {
                metadata.insert("parent".into(), json!(parent));
            }
            styling(&mut metadata, "color", &ctx.get_input("color"));
            styling(&mut metadata, "event", &ctx.get_input("event"));

            let output_name = match ctx.get_input("_timeline_name") {
                Workload::Str(name) => name,
                _ => String::new(),
            };
            ctx.set_output("csv", csv);
            ctx.set_output("output_name", output_name);
            ctx.set_output("output_type", "timeline");
            ctx.set_output("output_metadata", Value::Object(metadata).to_string());
        })
        .register(registry);
}

fn register_bar_chart_output(registry: &mut NodeRegistry) {
    NodeBuilder::new("bar_chart_output", "viz")
        .input("csv", ValueType::Csv)
        .input_optional("category", ValueType::Field)
        .input("value", ValueType::Field)
        .input_optional("color", [ValueType::Field, ValueType::String])
        .input_optional("event", [ValueType::Field, ValueType::String])
        .output("csv", ValueType::Csv)
        .output("output_name", ValueType::String)
        .output("output_type", ValueType::String)
        .output("output_metadata", ValueType::String)
        .on_compile(|ctx| {
            let Ok(csv) = ctx.get_input("csv").as_csv() else {
                ctx.set_error("no csv input");
                return;
            };
            let Some(value) = field_name(&ctx.get_input("value")) else {
                ctx.set_error("value field is required");
                return;
            };
            let category = field_name(&ctx.get_input("category"));

            // tree_group output drives hierarchy mode.
            let tree_mode = csv.has_column("__tree_path");
            let tree_agg = if tree_mode {
                csv.get_column("__tree_agg")
                    .and_then(Column::as_str)
                    .filter(|c| !c.ids().is_empty())
                    .map(|c| c.at(0))
                    .unwrap_or_else(|| "sum".to_owned())
            } else {
                String::new()
            };
            if category.is_none() && !tree_mode {
                ctx.set_error("category field is required (or connect tree_group output)");
                return;
            }

            let mut metadata = serde_json::Map::new();
            metadata.insert("chart_type".into(), json!("bar"));
            if let Some(category) = category {
                metadata.insert("category".into(), json!(category));
            }
            metadata.insert("value".into(), json!(value));
            if tree_mode {
                metadata.insert("tree_mode".into(), json!(true));
                metadata.insert("tree_agg".into(), json!(tree_agg));
            }
            styling(&mut metadata, "color", &ctx.get_input("color"));
            styling(&mut metadata, "event", &ctx.get_input("event"));

            let output_name = match ctx.get_input("_chart_name") {
                Workload::Str(name) => name,
                _ => String::new(),
            };
            ctx.set_output("csv", csv);
            ctx.set_output("output_name", output_name);
            ctx.set_output("output_type", "chart");
            ctx.set_output("output_metadata", Value::Object(metadata).to_string());
        })
        .register(registry);
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DiffStatus {
    Removed,
    Modified,
    Added,
    Unchanged,
}

impl DiffStatus {
    fn label(self) -> &'static str {
        match self {
            DiffStatus::Removed => "removed",
            DiffStatus::Modified => "modified",
            DiffStatus::Added => "added",
            DiffStatus::Unchanged => "unchanged",
        }
    }
}

struct DiffRow {
    status: DiffStatus,
    left: Option<usize>,
    right: Option<usize>,
    changed: Vec<bool>,
}

fn cell_text(frame: &DataFrame, column: &str, row: usize) -> String {
    frame
        .get_column(column)
        .map(|c| c.text_at(row))
        .unwrap_or_default()
}

fn classify_pair(left: &DataFrame, right: &DataFrame, columns: &[String], l: usize, r: usize) -> DiffRow {
    let changed: Vec<bool> = columns
        .iter()
        .map(|c| cell_text(left, c, l) != cell_text(right, c, r))
        .collect();
    let status = if changed.iter().any(|&c| c) {
        DiffStatus::Modified
    } else {
        DiffStatus::Unchanged
    };
    DiffRow {
        status,
        left: Some(l),
        right: Some(r),
        changed,
    }
}

fn register_diff_output(registry: &mut NodeRegistry) {
    NodeBuilder::new("diff_output", "viz")
        .input("left", ValueType::Csv)
        .input("right", ValueType::Csv)
        .input_optional("key", ValueType::Field)
        .output("csv", ValueType::Csv)
        .output("output_name", ValueType::String)
        .output("output_type", ValueType::String)
        .output("output_metadata", ValueType::String)
        .on_compile(|ctx| {
            let Ok(left) = ctx.get_input("left").as_csv() else {
                ctx.set_error("no left csv input");
                return;
            };
            let Ok(right) = ctx.get_input("right").as_csv() else {
                ctx.set_error("no right csv input");
                return;
            };
            let key = field_name(&ctx.get_input("key"));

            // Union of columns: right's order first, then left-only ones.
            let mut columns: Vec<String> = Vec::new();
            for name in right.column_names().into_iter().chain(left.column_names()) {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }

            let mut rows = match &key {
                None => diff_by_position(&left, &right, &columns),
                Some(key) => {
                    if !left.has_column(key) || !right.has_column(key) {
                        ctx.set_error(format!("key column not found: {key}"));
                        return;
                    }
                    diff_by_key(&left, &right, &columns, key)
                }
            };
            rows.sort_by_key(|r| r.status);

            let mut stats = [0usize; 4];
            for row in &rows {
                stats[row.status as usize] += 1;
            }

            let result = build_diff_frame(&left, &right, &columns, &rows);

            let output_name = match ctx.get_input("_diff_name") {
                Workload::Str(name) => name,
                _ => String::new(),
            };
            let mut metadata = serde_json::Map::new();
            if let Some(key) = key {
                metadata.insert("key".into(), json!(key));
            }
            metadata.insert(
                "stats".into(),
                json!({
                    "removed": stats[DiffStatus::Removed as usize],
                    "modified": stats[DiffStatus::Modified as usize],
                    "added": stats[DiffStatus::Added as usize],
                    "unchanged": stats[DiffStatus::Unchanged as usize],
                }),
            );

            ctx.set_output("csv", result);
            ctx.set_output("output_name", output_name);
            ctx.set_output("output_type", "diff");
            ctx.set_output("output_metadata", Value::Object(metadata).to_string());
        })
        .register(registry);
}

fn diff_by_position(left: &DataFrame, right: &DataFrame, columns: &[String]) -> Vec<DiffRow> {
    let mut rows = Vec::new();
    let shared = left.row_count().min(right.row_count());
    for i in 0..shared {
        rows.push(classify_pair(left, right, columns, i, i));
    }
    for l in shared..left.row_count() {
        rows.push(DiffRow {
            status: DiffStatus::Removed,
            left: Some(l),
            right: None,
            changed: vec![false; columns.len()],
        });
    }
    for r in shared..right.row_count() {
        rows.push(DiffRow {
            status: DiffStatus::Added,
            left: None,
            right: Some(r),
            changed: vec![false; columns.len()],
        });
    }
    rows
}

fn diff_by_key(
    left: &DataFrame,
    right: &DataFrame,
    columns: &[String],
    key: &str,
) -> Vec<DiffRow> {
    let mut left_by_key: HashMap<String, usize> = HashMap::new();
    for l in 0..left.row_count() {
        left_by_key.entry(cell_text(left, key, l)).or_insert(l);
    }

    let mut rows = Vec::new();
    let mut matched_left = vec![false; left.row_count()];
    for r in 0..right.row_count() {
        match left_by_key.get(&cell_text(right, key, r)) {
            Some(&l) if !matched_left[l] => {
                matched_left[l] = true;
                rows.push(classify_pair(left, right, columns, l, r));
            }
            _ => rows.push(DiffRow {
                status: DiffStatus::Added,
                left: None,
                right: Some(r),
                changed: vec![false; columns.len()],
            }),
        }
    }
    for (l, matched) in matched_left.iter().enumerate() {
        if !matched {
            rows.push(DiffRow {
                status: DiffStatus::Removed,
                left: Some(l),
                right: None,
                changed: vec![false; columns.len()],
            });
        }
    }
    rows
}

fn column_type_for(name: &str, first: &DataFrame, second: &DataFrame) -> ColumnType {
    first
        .get_column(name)
        .or_else(|| second.get_column(name))
        .map(Column::column_type)
        .unwrap_or(ColumnType::String)
}

fn build_diff_frame(
    left: &DataFrame,
    right: &DataFrame,
    columns: &[String],
    rows: &[DiffRow],
) -> DataFrame {
    let mut result = DataFrame::with_pool(new_pool());

    let mut status_column = result.empty_column("__diff__", ColumnType::String);
    for row in rows {
        if let Column::Str(c) = &mut status_column {
            c.push(row.status.label());
        }
    }
    result.set_column(status_column);

    // Current (right-side) values, typed from the right frame when present.
    for name in columns {
        let mut column = result.empty_column(name, column_type_for(name, right, left));
        for row in rows {
            match row.right {
                Some(r) if right.has_column(name) => column.push_text(&cell_text(right, name, r)),
                _ => crate::frame::ops::group::push_default(&mut column),
            }
        }
        result.set_column(column);
    }

    // Previous (left-side) values under `__old_` names.
    for name in columns {
        let mut column = result.empty_column(
            &format!("__old_{name}"),
            column_type_for(name, left, right),
        );
        for row in rows {
            match row.left {
                Some(l) if left.has_column(name) => column.push_text(&cell_text(left, name, l)),
                _ => crate::frame::ops::group::push_default(&mut column),
            }
        }
        result.set_column(column);
    }

    // Per-column 0/1 change flags.
    for (c, name) in columns.iter().enumerate() {
        let mut column = IntColumn::new(format!("__changed_{name}"));
        for row in rows {
            column.push(i64::from(row.changed.get(c).copied().unwrap_or(false)));
        }
        result.set_column(Column::Int(column));
    }

    result
}
