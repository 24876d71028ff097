//! Columnar JSON (de)serialization and the debug table printer
//!
//! The wire shape is `{ "columns": [...], "data": [[...], ...] }`, with an
//! optional `"schema"` array of `{ "name", "type" }` entries carrying
//! explicit `INT` / `DOUBLE` / `STRING` tags.

use std::fmt::Write as _;

use serde_json::{Value, json};

use crate::frame::FrameError;
use crate::frame::column::{Column, ColumnType};
use crate::frame::dataframe::DataFrame;

/// One cell as a JSON value.
pub(crate) fn cell_json(column: &Column, row: usize) -> Value {
    match column {
        Column::Int(c) => json!(c.at(row)),
        Column::Double(c) => json!(c.at(row)),
        Column::Str(c) => json!(c.at(row)),
    }
}

/// Columnar JSON without schema.
pub fn to_json(frame: &DataFrame) -> Value {
    let mut data = Vec::with_capacity(frame.row_count());
    for row in 0..frame.row_count() {
        let cells: Vec<Value> = frame
            .columns()
            .iter()
            .map(|c| cell_json(c, row))
            .collect();
        data.push(Value::Array(cells));
    }
    json!({ "columns": frame.column_names(), "data": data })
}

/// Columnar JSON with an explicit per-column type schema.
pub fn to_json_with_schema(frame: &DataFrame) -> Value {
    let mut value = to_json(frame);
    let schema: Vec<Value> = frame
        .columns()
        .iter()
        .map(|c| json!({ "name": c.name(), "type": c.column_type() }))
        .collect();
    value["schema"] = Value::Array(schema);
    value
}

/// Rebuild a frame from columnar JSON. With a `"schema"` entry the declared
/// types are used; without one, types are inferred from the first data row
/// (numbers become int or double, everything else string).
pub fn from_json(value: &Value) -> Result<DataFrame, FrameError> {
    let columns = value
        .get("columns")
        .and_then(Value::as_array)
        .ok_or_else(|| FrameError::InvalidSpec("dataframe JSON needs 'columns'".into()))?;
    let names: Vec<String> = columns
        .iter()
        .map(|c| {
            c.as_str()
                .map(str::to_owned)
                .ok_or_else(|| FrameError::InvalidSpec("column names must be strings".into()))
        })
        .collect::<Result<_, _>>()?;

    let empty = Vec::new();
    let data = value
        .get("data")
        .and_then(Value::as_array)
        .unwrap_or(&empty);

    let mut types: Vec<ColumnType> = Vec::with_capacity(names.len());
    if let Some(schema) = value.get("schema").and_then(Value::as_array) {
        for name in &names {
            let declared = schema
                .iter()
                .find(|entry| entry.get("name").and_then(Value::as_str) == Some(name))
                .and_then(|entry| entry.get("type"))
                .and_then(|ty| serde_json::from_value(ty.clone()).ok())
                .unwrap_or(ColumnType::String);
            types.push(declared);
        }
    } else {
        let first = data.first().and_then(Value::as_array);
        for i in 0..names.len() {
            let ty = match first.and_then(|row| row.get(i)) {
                Some(Value::Number(n)) if n.is_i64() || n.is_u64() => ColumnType::Int,
                Some(Value::Number(_)) => ColumnType::Double,
                _ => ColumnType::String,
            };
            types.push(ty);
        }
    }

    let mut frame = DataFrame::new();
    for (name, ty) in names.iter().zip(&types) {
        match ty {
            ColumnType::Int => frame.add_int_column(name.clone())?,
            ColumnType::Double => frame.add_double_column(name.clone())?,
            ColumnType::String => frame.add_string_column(name.clone())?,
        }
    }

    for row in data {
        let cells = row
            .as_array()
            .ok_or_else(|| FrameError::InvalidSpec("data rows must be arrays".into()))?;
        let values: Vec<String> = (0..names.len())
            .map(|i| match cells.get(i) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        frame.add_row(&values)?;
    }

    Ok(frame)
}

/// Tab-separated preview of the first `max_rows` rows.
pub fn to_table_string(frame: &DataFrame, max_rows: usize) -> String {
    let mut out = String::new();
    if frame.column_count() == 0 {
        out.push_str("Empty DataFrame\n");
        return out;
    }

    for name in frame.column_names() {
        let _ = write!(out, "{name}\t");
    }
    out.push('\n');

    let shown = frame.row_count().min(max_rows);
    for row in 0..shown {
        for column in frame.columns() {
            let _ = write!(out, "{}\t", column.text_at(row));
        }
        out.push('\n');
    }
    if frame.row_count() > max_rows {
        let _ = writeln!(out, "... ({} more rows)", frame.row_count() - max_rows);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_int_column("id").unwrap();
        df.add_string_column("name").unwrap();
        df.add_double_column("price").unwrap();
        df.add_row(&["1", "Apple", "1.5"]).unwrap();
        df.add_row(&["2", "Banana", "0.75"]).unwrap();
        df
    }

    #[test]
    fn to_json_is_columnar() {
        let value = to_json(&sample());
        assert_eq!(
            value,
            json!({
                "columns": ["id", "name", "price"],
                "data": [[1, "Apple", 1.5], [2, "Banana", 0.75]],
            })
        );
    }

    #[test]
    fn schema_tags_types() {
        let value = to_json_with_schema(&sample());
        assert_eq!(
            value["schema"],
            json!([
                {"name": "id", "type": "INT"},
                {"name": "name", "type": "STRING"},
                {"name": "price", "type": "DOUBLE"},
            ])
        );
    }

    #[test]
    fn roundtrip_with_schema() {
        let df = sample();
        let back = from_json(&to_json_with_schema(&df)).unwrap();
        assert_eq!(back.column_names(), df.column_names());
        assert_eq!(back.row_count(), df.row_count());
        assert_eq!(back.column("id").unwrap().column_type(), ColumnType::Int);
        assert_eq!(
            back.column("price").unwrap().column_type(),
            ColumnType::Double
        );
        assert_eq!(back.column("name").unwrap().as_str().unwrap().at(0), "Apple");
    }

    #[test]
    fn from_json_infers_without_schema() {
        let value = json!({
            "columns": ["n", "x", "s"],
            "data": [[1, 2.5, "a"], [2, 3.5, "b"]],
        });
        let frame = from_json(&value).unwrap();
        assert_eq!(frame.column("n").unwrap().column_type(), ColumnType::Int);
        assert_eq!(frame.column("x").unwrap().column_type(), ColumnType::Double);
        assert_eq!(frame.column("s").unwrap().column_type(), ColumnType::String);
    }

    #[test]
    fn from_json_requires_columns() {
        assert!(matches!(
            from_json(&json!({"data": []})),
            Err(FrameError::InvalidSpec(_))
        ));
    }

    #[test]
    fn table_string_caps_rows() {
        let df = sample();
        let text = to_table_string(&df, 1);
        assert!(text.contains("id\tname\tprice"));
        assert!(text.contains("1\tApple\t1.5"));
        assert!(text.contains("(1 more rows)"));
    }
}
