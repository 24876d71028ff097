//! String transformation nodes
//!
//! All share the dual-mode signature of the math nodes: a `String` source
//! is transformed as a scalar, a `Field` source runs per-row over the
//! active CSV into a destination column (default: the source column).

use std::sync::Arc;

use crate::frame::DataFrame;
use crate::frame::column::{Column, IntColumn, StrColumn};
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};
use crate::nodes::{MAX_NUMBERED_PORTS, rebuild_with_column};

pub fn register(registry: &mut NodeRegistry) {
    register_add_column(registry);
    register_json_extract(registry);
    simple_string_node(registry, "trim", |s| s.trim().to_owned());
    simple_string_node(registry, "to_lower", |s| s.to_lowercase());
    simple_string_node(registry, "to_upper", |s| s.to_uppercase());
    register_replace(registry);
    register_to_integer(registry);
    register_substring(registry);
    register_split(registry);
    simple_string_node(registry, "unidecode", unidecode);
    simple_string_node(registry, "trim_integer", trim_integer);
    register_concat(registry);
    register_concat_prefix(registry);
}

/// Resolve the destination column name: explicit `dest`, else overwrite
/// the source field.
fn dest_column(ctx: &NodeContext, src: &Workload) -> Option<String> {
    match ctx.get_input("dest") {
        Workload::Field(name) | Workload::Str(name) => Some(name),
        _ => src.as_text().ok().map(str::to_owned),
    }
}

/// The vector-mode tail every string node shares: map each row of `src`
/// through `op` into a string column, rebuild the frame, echo row 0.
fn apply_per_row(
    ctx: &mut NodeContext,
    src: &Workload,
    dest_name: String,
    op: impl Fn(&str) -> String,
) {
    let Some(csv) = ctx.csv_for_fields() else {
        ctx.set_error("field inputs require a csv connection");
        return;
    };
    let rows = csv.row_count();
    let mut column = StrColumn::new(dest_name, csv.pool().clone());
    for row in 0..rows {
        match src.get_string_at_row(row, Some(&csv)) {
            Ok(value) => column.push(&op(&value)),
            Err(e) => {
                ctx.fail(e);
                return;
            }
        }
    }
    let first = if rows > 0 { column.at(0) } else { String::new() };
    ctx.set_output("csv", rebuild_with_column(&csv, Column::Str(column)));
    ctx.set_output("result", first);
}

/// One-argument transformations (trim, case folding, unidecode, ...).
fn simple_string_node(
    registry: &mut NodeRegistry,
    name: &'static str,
    op: fn(&str) -> String,
) {
    NodeBuilder::new(name, "string")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::String, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(move |ctx| {
            let src = ctx.get_input("src");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            if let Workload::Str(value) = &src {
                ctx.set_output("result", op(value));
                return;
            }
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            apply_per_row(ctx, &src, dest, op);
        })
        .register(registry);
}

fn register_add_column(registry: &mut NodeRegistry) {
    NodeBuilder::new("add_column", "string")
        .input_optional("csv", ValueType::Csv)
        .input(
            "value",
            [
                ValueType::Int,
                ValueType::Double,
                ValueType::String,
                ValueType::Bool,
                ValueType::Field,
            ],
        )
        .input("dest", ValueType::Field)
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(|ctx| {
            let value = ctx.get_input("value");
            if value.is_null() {
                ctx.set_error("input 'value' is not connected");
                return;
            }
            let dest = match ctx.get_input("dest") {
                Workload::Field(name) | Workload::Str(name) => name,
                _ => {
                    ctx.set_error("input 'dest' is not connected");
                    return;
                }
            };
            apply_per_row(ctx, &value, dest, |s| s.to_owned());
        })
        .register(registry);
}

fn register_replace(registry: &mut NodeRegistry) {
    NodeBuilder::new("replace", "string")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::String, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .input("search", [ValueType::String, ValueType::Int])
        .input("by", [ValueType::String, ValueType::Int])
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            let search = match text_or_int(&ctx.get_input("search")) {
                Some(s) => s,
                None => {
                    ctx.set_error("input 'search' is not connected");
                    return;
                }
            };
            let by = match text_or_int(&ctx.get_input("by")) {
                Some(s) => s,
                None => {
                    ctx.set_error("input 'by' is not connected");
                    return;
                }
            };
            let replace_first = move |s: &str| s.replacen(&search, &by, 1);

            if let Workload::Str(value) = &src {
                ctx.set_output("result", replace_first(value));
                return;
            }
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            apply_per_row(ctx, &src, dest, replace_first);
        })
        .register(registry);
}

fn text_or_int(workload: &Workload) -> Option<String> {
    match workload {
        Workload::Str(s) => Some(s.clone()),
        Workload::Int(v) => Some(v.to_string()),
        _ => None,
    }
}

fn register_to_integer(registry: &mut NodeRegistry) {
    NodeBuilder::new("to_integer", "string")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::String, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .input_optional("default_value", ValueType::Int)
        .output("csv", ValueType::Csv)
        .output("result", ValueType::Int)
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            let fallback = match ctx.get_input("default_value") {
                Workload::Null => None,
                other => other.as_int().ok(),
            };
            let to_int = |s: &str| -> Result<i64, String> {
                match s.trim().parse::<i64>() {
                    Ok(v) => Ok(v),
                    Err(_) => {
                        fallback.ok_or_else(|| format!("cannot convert '{s}' to integer"))
                    }
                }
            };

            if let Workload::Str(value) = &src {
                match to_int(value) {
                    Ok(v) => ctx.set_output("result", v),
                    Err(message) => ctx.set_error(message),
                }
                return;
            }

            let Some(csv) = ctx.csv_for_fields() else {
                ctx.set_error("field inputs require a csv connection");
                return;
            };
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            let rows = csv.row_count();
            let mut column = IntColumn::new(dest);
            for row in 0..rows {
                let value = match src.get_string_at_row(row, Some(&csv)) {
                    Ok(v) => v,
                    Err(e) => {
                        ctx.fail(e);
                        return;
                    }
                };
                match to_int(&value) {
                    Ok(v) => column.push(v),
                    Err(message) => {
                        ctx.set_error(message);
                        return;
                    }
                }
            }
            let first = if rows > 0 { column.at(0) } else { 0 };
            ctx.set_output("csv", rebuild_with_column(&csv, Column::Int(column)));
            ctx.set_output("result", first);
        })
        .register(registry);
}

fn register_substring(registry: &mut NodeRegistry) {
    NodeBuilder::new("substring", "string")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::String, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .input_optional("begin", [ValueType::Int, ValueType::Field])
        .input_optional("end", [ValueType::Int, ValueType::Field])
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            let begin = ctx.get_input("begin");
            let end = ctx.get_input("end");

            let slice = |s: &str, from: i64, to: i64| -> String {
                let len = s.len() as i64;
                let from = from.max(0);
                let to = to.min(len);
                if from >= to {
                    String::new()
                } else {
                    s.chars()
                        .skip(from as usize)
                        .take((to - from) as usize)
                        .collect()
                }
            };

            if let Workload::Str(value) = &src {
                let from = begin.as_int().unwrap_or(0);
                let to = if end.is_null() {
                    value.len() as i64
                } else {
                    end.as_int().unwrap_or(value.len() as i64)
                };
                ctx.set_output("result", slice(value, from, to));
                return;
            }

            let Some(csv) = ctx.csv_for_fields() else {
                ctx.set_error("field inputs require a csv connection");
                return;
            };
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            let rows = csv.row_count();
            let mut column = StrColumn::new(dest, csv.pool().clone());
            for row in 0..rows {
                let value = match src.get_string_at_row(row, Some(&csv)) {
                    Ok(v) => v,
                    Err(e) => {
                        ctx.fail(e);
                        return;
                    }
                };
                let from = if begin.is_null() {
                    0
                } else {
                    match begin.get_int_at_row(row, Some(&csv)) {
                        Ok(v) => v,
                        Err(e) => {
                            ctx.fail(e);
                            return;
                        }
                    }
                };
                let to = if end.is_null() {
                    value.len() as i64
                } else {
                    match end.get_int_at_row(row, Some(&csv)) {
                        Ok(v) => v,
                        Err(e) => {
                            ctx.fail(e);
                            return;
                        }
                    }
                };
                column.push(&slice(&value, from, to));
            }
            let first = if rows > 0 { column.at(0) } else { String::new() };
            ctx.set_output("csv", rebuild_with_column(&csv, Column::Str(column)));
            ctx.set_output("result", first);
        })
        .register(registry);
}

fn register_split(registry: &mut NodeRegistry) {
    NodeBuilder::new("split", "string")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::String, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .input("char", ValueType::String)
        .input("pos", ValueType::Int)
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            let delimiter = match ctx.get_input("char") {
                Workload::Str(s) if !s.is_empty() => s,
                Workload::Str(_) => {
                    ctx.set_error("split delimiter must not be empty");
                    return;
                }
                _ => {
                    ctx.set_error("input 'char' is not connected");
                    return;
                }
            };
            let position = match ctx.get_input("pos").as_int() {
                Ok(v) => v,
                Err(_) => {
                    ctx.set_error("input 'pos' is not connected");
                    return;
                }
            };
            let pick = move |s: &str| -> String {
                if position < 0 {
                    return String::new();
                }
                s.split(delimiter.as_str())
                    .nth(position as usize)
                    .unwrap_or("")
                    .to_owned()
            };

            if let Workload::Str(value) = &src {
                ctx.set_output("result", pick(value));
                return;
            }
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            apply_per_row(ctx, &src, dest, pick);
        })
        .register(registry);
}

fn register_json_extract(registry: &mut NodeRegistry) {
    NodeBuilder::new("json_extract", "string")
        .input_optional("csv", ValueType::Csv)
        .input("src", [ValueType::String, ValueType::Field])
        .input("key", [ValueType::String, ValueType::Field])
        .input_optional("dest", ValueType::Field)
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            let key = ctx.get_input("key");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            if key.is_null() {
                ctx.set_error("input 'key' is not connected");
                return;
            }
            // On a failed extraction the source passes through unchanged,
            // unless the widget asks for a blank.
            let identity_on_failure = !matches!(
                ctx.get_input("_on_failure"),
                Workload::Str(ref mode) if mode == "blank"
            );

            let extract = move |json_text: &str, key: &str| -> String {
                let extracted = serde_json::from_str::<serde_json::Value>(json_text)
                    .ok()
                    .and_then(|v| v.get(key).cloned())
                    .map(|v| match v {
                        serde_json::Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_default();
                if extracted.is_empty() && identity_on_failure {
                    json_text.to_owned()
                } else {
                    extracted
                }
            };

            if let (Workload::Str(json_text), Workload::Str(key_text)) = (&src, &key) {
                ctx.set_output("result", extract(json_text, key_text));
                return;
            }

            let Some(csv) = ctx.csv_for_fields() else {
                ctx.set_error("field inputs require a csv connection");
                return;
            };
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            let rows = csv.row_count();
            let mut column = StrColumn::new(dest, csv.pool().clone());
            for row in 0..rows {
                let json_text = match src.get_string_at_row(row, Some(&csv)) {
                    Ok(v) => v,
                    Err(e) => {
                        ctx.fail(e);
                        return;
                    }
                };
                let key_text = match key.get_string_at_row(row, Some(&csv)) {
                    Ok(v) => v,
                    Err(e) => {
                        ctx.fail(e);
                        return;
                    }
                };
                column.push(&extract(&json_text, &key_text));
            }
            let first = if rows > 0 { column.at(0) } else { String::new() };
            ctx.set_output("csv", rebuild_with_column(&csv, Column::Str(column)));
            ctx.set_output("result", first);
        })
        .register(registry);
}

fn concat_like(registry: &mut NodeRegistry, name: &'static str, prepend: bool) {
    let affix = if prepend { "prefix" } else { "suffix" };
    let mut builder = NodeBuilder::new(name, "string")
        .input_optional("csv", ValueType::Csv)
        .input(
            "src",
            [
                ValueType::String,
                ValueType::Field,
                ValueType::Int,
                ValueType::Double,
            ],
        )
        .input_optional("dest", ValueType::Field)
        .input(
            affix,
            [
                ValueType::String,
                ValueType::Field,
                ValueType::Int,
                ValueType::Double,
            ],
        );
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder.input_optional(
            format!("{affix}_{i}"),
            [
                ValueType::String,
                ValueType::Field,
                ValueType::Int,
                ValueType::Double,
            ],
        );
    }
    builder
        .output("csv", ValueType::Csv)
        .output("result", ValueType::String)
        .on_compile(move |ctx| {
            let src = ctx.get_input("src");
            if src.is_null() {
                ctx.set_error("input 'src' is not connected");
                return;
            }
            let mut parts = vec![ctx.get_input(affix)];
            if parts[0].is_null() {
                ctx.set_error(format!("input '{affix}' is not connected"));
                return;
            }
            for i in 1..=MAX_NUMBERED_PORTS {
                let part = ctx.get_input(&format!("{affix}_{i}"));
                if part.is_null() {
                    break;
                }
                parts.push(part);
            }

            let vector_mode =
                src.is_field() || parts.iter().any(Workload::is_field);
            if !vector_mode {
                match scalar_concat(&src, &parts, prepend) {
                    Ok(result) => ctx.set_output("result", result),
                    Err(e) => ctx.fail(e),
                }
                return;
            }

            let Some(csv) = ctx.csv_for_fields() else {
                ctx.set_error("field inputs require a csv connection");
                return;
            };
            let Some(dest) = dest_column(ctx, &src) else {
                ctx.set_error("cannot resolve destination column");
                return;
            };
            let rows = csv.row_count();
            let mut column = StrColumn::new(dest, csv.pool().clone());
            for row in 0..rows {
                match row_concat(&src, &parts, prepend, row, &csv) {
                    Ok(value) => column.push(&value),
                    Err(e) => {
                        ctx.fail(e);
                        return;
                    }
                }
            }
            let first = if rows > 0 { column.at(0) } else { String::new() };
            ctx.set_output("csv", rebuild_with_column(&csv, Column::Str(column)));
            ctx.set_output("result", first);
        })
        .register(registry);
}

fn scalar_text(workload: &Workload) -> Result<String, crate::graph::GraphError> {
    match workload {
        Workload::Str(s) => Ok(s.clone()),
        Workload::Int(v) => Ok(v.to_string()),
        Workload::Double(v) => Ok(v.to_string()),
        other => other.as_text().map(str::to_owned),
    }
}

fn scalar_concat(
    src: &Workload,
    parts: &[Workload],
    prepend: bool,
) -> Result<String, crate::graph::GraphError> {
    let base = scalar_text(src)?;
    let mut joined = String::new();
    for part in parts {
        joined.push_str(&scalar_text(part)?);
    }
    Ok(if prepend {
        format!("{joined}{base}")
    } else {
        format!("{base}{joined}")
    })
}

fn row_concat(
    src: &Workload,
    parts: &[Workload],
    prepend: bool,
    row: usize,
    csv: &Arc<DataFrame>,
) -> Result<String, crate::graph::GraphError> {
    let base = src.get_string_at_row(row, Some(csv))?;
    let mut joined = String::new();
    for part in parts {
        joined.push_str(&part.get_string_at_row(row, Some(csv))?);
    }
    Ok(if prepend {
        format!("{joined}{base}")
    } else {
        format!("{base}{joined}")
    })
}

fn register_concat(registry: &mut NodeRegistry) {
    concat_like(registry, "concat", false);
}

fn register_concat_prefix(registry: &mut NodeRegistry) {
    concat_like(registry, "concat_prefix", true);
}

/// Fold accents and typographic punctuation to plain ASCII: dashes become
/// hyphens, no-break spaces become spaces, Latin letters lose diacritics,
/// combining marks are dropped.
fn unidecode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\u{2010}'..='\u{2015}' => out.push('-'),
            '\u{00A0}' | '\u{202F}' => out.push(' '),
            '\u{0300}'..='\u{036F}' => {}
            'À'..='Å' | 'Æ' => out.push('A'),
            'Ç' => out.push('C'),
            'È'..='Ë' => out.push('E'),
            'Ì'..='Ï' => out.push('I'),
            'Ð' => out.push('D'),
            'Ñ' => out.push('N'),
            'Ò'..='Ö' | 'Ø' => out.push('O'),
            'Ù'..='Ü' => out.push('U'),
            'Ý' => out.push('Y'),
            'Þ' => out.push('T'),
            'ß' => out.push('s'),
            'à'..='å' | 'æ' => out.push('a'),
            'ç' => out.push('c'),
            'è'..='ë' => out.push('e'),
            'ì'..='ï' => out.push('i'),
            'ð' => out.push('d'),
            'ñ' => out.push('n'),
            'ò'..='ö' | 'ø' => out.push('o'),
            'ù'..='ü' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            'þ' => out.push('t'),
            other => out.push(other),
        }
    }
    out
}

/// Trim whitespace, then strip leading zeros off all-digit values.
fn trim_integer(s: &str) -> String {
    let trimmed = s.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        match trimmed.parse::<i64>() {
            Ok(v) => v.to_string(),
            Err(_) => trimmed.to_owned(),
        }
    } else {
        trimmed.to_owned()
    }
}
