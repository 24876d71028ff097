//! Scalar value nodes
//!
//! Entry points emitting configured constants, plus the field/date helpers
//! and the scalar → one-row-frame bridge.

use chrono::{Datelike, Days, Months, NaiveDate, Utc};
use serde_json::Value;

use crate::frame::column::{Column, DoubleColumn, IntColumn, StrColumn};
use crate::frame::{DataFrame, serialize as frame_json};
use crate::graph::context::NodeContext;
use crate::graph::definition::NodeBuilder;
use crate::graph::registry::NodeRegistry;
use crate::graph::workload::{ValueType, Workload};
use crate::nodes::MAX_NUMBERED_PORTS;

pub fn register(registry: &mut NodeRegistry) {
    value_node(registry, "int_value", ValueType::Int);
    value_node(registry, "double_value", ValueType::Double);
    value_node(registry, "string_value", ValueType::String);
    value_node(registry, "bool_value", ValueType::Bool);
    register_null_value(registry);
    register_string_as_field(registry);
    register_string_as_fields(registry);
    register_date_value(registry);
    register_current_date(registry);
    register_scalars_to_csv(registry);
    register_csv_value(registry);
}

/// The configured widget value, whether it arrived as a connection, a
/// plain property, or the `_value` widget.
fn configured_value(ctx: &NodeContext) -> Workload {
    let value = ctx.get_input("value");
    if !value.is_null() {
        return value;
    }
    ctx.get_input("_value")
}

/// One node per scalar type, emitting its `_value` widget property.
fn value_node(registry: &mut NodeRegistry, name: &'static str, ty: ValueType) {
    NodeBuilder::new(name, "scalar")
        .input_optional("value", ty)
        .output("value", ty)
        .entry_point()
        .on_compile(move |ctx| {
            let value = configured_value(ctx);
            let coerced = match ty {
                ValueType::Int => value.as_int().map(Workload::Int).unwrap_or_default(),
                ValueType::Double => value.as_double().map(Workload::Double).unwrap_or_default(),
                ValueType::String => value
                    .as_text()
                    .map(|s| Workload::Str(s.to_owned()))
                    .unwrap_or_default(),
                ValueType::Bool => value.as_bool().map(Workload::Bool).unwrap_or_default(),
                _ => Workload::Null,
            };
            ctx.set_output("value", coerced);
        })
        .register(registry);
}

fn register_null_value(registry: &mut NodeRegistry) {
    NodeBuilder::new("null_value", "scalar")
        .output("value", ValueType::Null)
        .entry_point()
        .on_compile(|ctx| ctx.set_output("value", Workload::Null))
        .register(registry);
}

fn register_string_as_field(registry: &mut NodeRegistry) {
    NodeBuilder::new("string_as_field", "scalar")
        .input("src", ValueType::String)
        .output("field", ValueType::Field)
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            let name = match src.as_text() {
                Ok(name) if !name.is_empty() => name.to_owned(),
                _ => {
                    ctx.set_error("input 'src' is not connected");
                    return;
                }
            };
            ctx.set_output("field", Workload::Field(name));
        })
        .register(registry);
}

/// Width of the `string_as_fields` fan-out. Output ports are declared up
/// front, so the JSON array is capped at this many names.
const FIELD_FANOUT: usize = 10;

fn register_string_as_fields(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("string_as_fields", "scalar")
        .input("src", ValueType::String)
        .output("field", ValueType::Field);
    for i in 1..FIELD_FANOUT {
        builder = builder.output(format!("field_{i}"), ValueType::Field);
    }
    builder
        .on_compile(|ctx| {
            let src = ctx.get_input("src");
            let Ok(text) = src.as_text() else {
                ctx.set_error("input 'src' is not connected");
                return;
            };
            let names: Vec<String> = match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(values)) => values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect(),
                _ => {
                    ctx.set_error(format!("expected a JSON array of strings, got '{text}'"));
                    return;
                }
            };
            for (i, name) in names.into_iter().take(FIELD_FANOUT).enumerate() {
                let port = if i == 0 {
                    "field".to_owned()
                } else {
                    format!("field_{i}")
                };
                ctx.set_output(port, Workload::Field(name));
            }
        })
        .register(registry);
}

/// Parse the date formats the engine accepts: unix timestamp,
/// `dd/mm/yyyy`, `dd/mm/yy`, and ISO `yyyy-mm-dd`.
pub(crate) fn parse_date(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(epoch) = trimmed.parse::<i64>() {
        return Some(epoch);
    }
    for format in ["%d/%m/%Y", "%d/%m/%y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(
                date.and_hms_opt(0, 0, 0)
                    .map(|dt| dt.and_utc().timestamp())
                    .unwrap_or_default(),
            );
        }
    }
    None
}

fn register_date_value(registry: &mut NodeRegistry) {
    NodeBuilder::new("date_value", "scalar")
        .input_optional("src", ValueType::String)
        .output("timestamp", ValueType::Int)
        .entry_point()
        .on_compile(|ctx| {
            let value = configured_value(ctx);
            let source = if value.is_null() {
                ctx.get_input("src")
            } else {
                value
            };
            let Ok(text) = source.as_text() else {
                ctx.set_error("no date provided");
                return;
            };
            match parse_date(text) {
                Some(epoch) => ctx.set_output("timestamp", epoch),
                None => ctx.set_error(format!("cannot parse date '{text}'")),
            }
        })
        .register(registry);
}

fn shift_date(date: NaiveDate, years: i64, months: i64, days: i64) -> NaiveDate {
    let mut shifted = date;
    let total_months = years * 12 + months;
    shifted = if total_months >= 0 {
        shifted
            .checked_add_months(Months::new(total_months as u32))
            .unwrap_or(shifted)
    } else {
        shifted
            .checked_sub_months(Months::new(total_months.unsigned_abs() as u32))
            .unwrap_or(shifted)
    };
    if days >= 0 {
        shifted
            .checked_add_days(Days::new(days as u64))
            .unwrap_or(shifted)
    } else {
        shifted
            .checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(shifted)
    }
}

fn register_current_date(registry: &mut NodeRegistry) {
    NodeBuilder::new("current_date", "scalar")
        .output("timestamp", ValueType::Int)
        .output("date", ValueType::String)
        .entry_point()
        .on_compile(|ctx| {
            let years = ctx.get_input("_year_offset").as_int().unwrap_or(0);
            let months = ctx.get_input("_month_offset").as_int().unwrap_or(0);
            let days = ctx.get_input("_day_offset").as_int().unwrap_or(0);

            let today = Utc::now().date_naive();
            let shifted = shift_date(today, years, months, days);
            let epoch = shifted
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or_default();
            ctx.set_output("timestamp", epoch);
            ctx.set_output(
                "date",
                format!(
                    "{:02}/{:02}/{}",
                    shifted.day(),
                    shifted.month(),
                    shifted.year()
                ),
            );
        })
        .register(registry);
}

fn register_scalars_to_csv(registry: &mut NodeRegistry) {
    let mut builder = NodeBuilder::new("scalars_to_csv", "scalar")
        .input("field", [ValueType::Field, ValueType::String])
        .input(
            "value",
            [
                ValueType::Int,
                ValueType::Double,
                ValueType::String,
                ValueType::Bool,
            ],
        );
    for i in 1..=MAX_NUMBERED_PORTS {
        builder = builder
            .input_optional(format!("field_{i}"), [ValueType::Field, ValueType::String])
            .input_optional(
                format!("value_{i}"),
                [
                    ValueType::Int,
                    ValueType::Double,
                    ValueType::String,
                    ValueType::Bool,
                ],
            );
    }
    builder
        .output("csv", ValueType::Csv)
        .entry_point()
        .on_compile(|ctx| {
            let mut pairs: Vec<(String, Workload)> = Vec::new();
            let first = ctx.get_input("field");
            match first.as_text() {
                Ok(name) if !name.is_empty() => {
                    pairs.push((name.to_owned(), ctx.get_input("value")));
                }
                _ => {
                    ctx.set_error("at least one field/value pair is required");
                    return;
                }
            }
            for i in 1..=MAX_NUMBERED_PORTS {
                let field = ctx.get_input(&format!("field_{i}"));
                if field.is_null() {
                    break;
                }
                match field.as_text() {
                    Ok(name) => {
                        pairs.push((name.to_owned(), ctx.get_input(&format!("value_{i}"))))
                    }
                    Err(e) => {
                        ctx.fail(e);
                        return;
                    }
                }
            }

            let mut frame = DataFrame::new();
            for (name, value) in &pairs {
                let column = match value {
                    Workload::Int(v) => {
                        let mut c = IntColumn::new(name.clone());
                        c.push(*v);
                        Column::Int(c)
                    }
                    Workload::Double(v) => {
                        let mut c = DoubleColumn::new(name.clone());
                        c.push(*v);
                        Column::Double(c)
                    }
                    other => {
                        let mut c = StrColumn::new(name.clone(), frame.pool().clone());
                        c.push(&other.get_string_at_row(0, None).unwrap_or_default());
                        Column::Str(c)
                    }
                };
                frame.set_column(column);
            }
            ctx.set_output("csv", frame);
        })
        .register(registry);
}

fn register_csv_value(registry: &mut NodeRegistry) {
    NodeBuilder::new("csv_value", "scalar")
        .output("csv", ValueType::Csv)
        .entry_point()
        .on_compile(|ctx| {
            let value = configured_value(ctx);
            let Ok(text) = value.as_text() else {
                ctx.set_error("no csv JSON configured (set the _value property)");
                return;
            };
            let parsed: Value = match serde_json::from_str(text) {
                Ok(v) => v,
                Err(e) => {
                    ctx.fail(e);
                    return;
                }
            };
            match frame_json::from_json(&parsed) {
                Ok(frame) => ctx.set_output("csv", frame),
                Err(e) => ctx.fail(e),
            }
        })
        .register(registry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::test_support::{inputs, run_node};

    #[test]
    fn value_nodes_emit_their_widget_value() {
        let ctx = run_node("int_value", inputs(vec![("_value", Workload::Int(5))]));
        assert_eq!(ctx.get_output("value").as_int().unwrap(), 5);

        let ctx = run_node(
            "string_value",
            inputs(vec![("_value", Workload::Str("hi".into()))]),
        );
        assert_eq!(ctx.get_output("value").as_text().unwrap(), "hi");

        let ctx = run_node("bool_value", inputs(vec![("_value", Workload::Bool(true))]));
        assert!(ctx.get_output("value").as_bool().unwrap());

        let ctx = run_node("null_value", inputs(vec![]));
        assert!(ctx.get_output("value").is_null());
    }

    #[test]
    fn connected_value_overrides_widget() {
        let ctx = run_node(
            "int_value",
            inputs(vec![
                ("value", Workload::Int(9)),
                ("_value", Workload::Int(1)),
            ]),
        );
        assert_eq!(ctx.get_output("value").as_int().unwrap(), 9);
    }

    #[test]
    fn string_as_field_reinterprets() {
        let ctx = run_node(
            "string_as_field",
            inputs(vec![("src", Workload::Str("price".into()))]),
        );
        assert!(matches!(ctx.get_output("field"), Workload::Field(ref n) if n == "price"));
    }

    #[test]
    fn string_as_fields_fans_out() {
        let ctx = run_node(
            "string_as_fields",
            inputs(vec![("src", Workload::Str(r#"["a","b","c"]"#.into()))]),
        );
        assert!(matches!(ctx.get_output("field"), Workload::Field(ref n) if n == "a"));
        assert!(matches!(ctx.get_output("field_1"), Workload::Field(ref n) if n == "b"));
        assert!(matches!(ctx.get_output("field_2"), Workload::Field(ref n) if n == "c"));

        let ctx = run_node(
            "string_as_fields",
            inputs(vec![("src", Workload::Str("not json".into()))]),
        );
        assert!(ctx.has_error());
    }

    #[test]
    fn date_value_parses_known_formats() {
        let ctx = run_node(
            "date_value",
            inputs(vec![("_value", Workload::Str("01/02/2024".into()))]),
        );
        assert_eq!(ctx.get_output("timestamp").as_int().unwrap(), 1706745600);

        let ctx = run_node(
            "date_value",
            inputs(vec![("src", Workload::Str("1706745600".into()))]),
        );
        assert_eq!(ctx.get_output("timestamp").as_int().unwrap(), 1706745600);

        let ctx = run_node(
            "date_value",
            inputs(vec![("src", Workload::Str("tomorrow".into()))]),
        );
        assert!(ctx.has_error());
    }

    #[test]
    fn shift_date_handles_negative_offsets() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            shift_date(date, 0, -1, 0),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert_eq!(
            shift_date(date, 1, 0, 1),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
        );
    }

    #[test]
    fn current_date_emits_both_forms() {
        let ctx = run_node("current_date", inputs(vec![]));
        assert!(ctx.get_output("timestamp").as_int().unwrap() > 0);
        let text = ctx.get_output("date").as_text().unwrap().to_owned();
        assert_eq!(text.len(), 10);
    }

    #[test]
    fn scalars_to_csv_builds_one_row() {
        let ctx = run_node(
            "scalars_to_csv",
            inputs(vec![
                ("field", Workload::Field("n".into())),
                ("value", Workload::Int(3)),
                ("field_1", Workload::Str("label".into())),
                ("value_1", Workload::Str("x".into())),
            ]),
        );
        let csv = ctx.get_output("csv").as_csv().unwrap();
        assert_eq!(csv.row_count(), 1);
        assert_eq!(csv.column("n").unwrap().as_int().unwrap().at(0), 3);
        assert_eq!(csv.column("label").unwrap().as_str().unwrap().at(0), "x");
    }

    #[test]
    fn csv_value_parses_columnar_json() {
        let payload = r#"{"columns":["a"],"data":[[1],[2]]}"#;
        let ctx = run_node(
            "csv_value",
            inputs(vec![("_value", Workload::Str(payload.into()))]),
        );
        let csv = ctx.get_output("csv").as_csv().unwrap();
        assert_eq!(csv.row_count(), 2);
        assert_eq!(csv.column("a").unwrap().as_int().unwrap().at(1), 2);
    }
}
