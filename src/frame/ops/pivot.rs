//! Pivot: transpose one column's values into result columns
//!
//! Distinct pivot values are collected in first-sighting order, rows are
//! grouped by the index columns, and each group emits one result row with
//! one cell per distinct pivot value. Cells with no matching source row
//! hold the value column's type default.

use serde_json::{Map, Value};

use crate::frame::FrameError;
use crate::frame::column::Column;
use crate::frame::dataframe::DataFrame;
use crate::frame::ops::group::{build_groups, copy_cell, push_default};
use crate::frame::serialize::cell_json;
use crate::frame::spec::PivotSpec;

/// The pivot value rendered as a column-name fragment. Doubles are
/// truncated to their integer part, matching the engine's naming contract.
fn name_fragment(column: &Column, row: usize) -> String {
    match column {
        Column::Int(c) => c.at(row).to_string(),
        Column::Double(c) => (c.at(row) as i64).to_string(),
        Column::Str(c) => c.at(row),
    }
}

struct PivotPlan {
    index_columns: Vec<String>,
    pivot_values: Vec<String>,
    prefix: String,
}

fn plan(frame: &DataFrame, spec: &PivotSpec) -> Result<PivotPlan, FrameError> {
    let pivot_column = frame.column(&spec.pivot_column)?;
    frame.column(&spec.value_column)?;

    let index_columns = match &spec.index_columns {
        Some(columns) => {
            for name in columns {
                frame.column(name)?;
            }
            columns.clone()
        }
        // Default: every column except pivot and value.
        None => frame
            .column_names()
            .into_iter()
            .filter(|n| *n != spec.pivot_column && *n != spec.value_column)
            .collect(),
    };

    let mut pivot_values = Vec::new();
    for row in 0..frame.row_count() {
        let value = name_fragment(pivot_column, row);
        if !pivot_values.contains(&value) {
            pivot_values.push(value);
        }
    }

    Ok(PivotPlan {
        index_columns,
        pivot_values,
        prefix: spec.prefix.clone().unwrap_or_default(),
    })
}

/// JSON form: an array of row objects keyed by column name. Unmatched
/// pivot cells are null.
pub fn pivot_json(frame: &DataFrame, spec: &PivotSpec) -> Result<Value, FrameError> {
    let plan = plan(frame, spec)?;
    let pivot_column = frame.column(&spec.pivot_column)?;
    let value_column = frame.column(&spec.value_column)?;
    let groups = build_groups(frame, &plan.index_columns)?;

    let mut rows = Vec::with_capacity(groups.len());
    for (_, group_rows) in &groups {
        let mut row = Map::new();
        for name in &plan.index_columns {
            row.insert(name.clone(), cell_json(frame.column(name)?, group_rows[0]));
        }
        for value in &plan.pivot_values {
            row.insert(format!("{}{}", plan.prefix, value), Value::Null);
        }
        for &source_row in group_rows {
            let key = format!("{}{}", plan.prefix, name_fragment(pivot_column, source_row));
            row.insert(key, cell_json(value_column, source_row));
        }
        rows.push(Value::Object(row));
    }

    Ok(Value::Array(rows))
}

/// DataFrame form: pivoted columns keep the value column's native type, so
/// the result chains into further operators.
pub fn pivot_frame(frame: &DataFrame, spec: &PivotSpec) -> Result<DataFrame, FrameError> {
    let plan = plan(frame, spec)?;
    let pivot_column = frame.column(&spec.pivot_column)?;
    let value_column = frame.column(&spec.value_column)?;
    let value_type = value_column.column_type();
    let groups = build_groups(frame, &plan.index_columns)?;

    let mut result = DataFrame::with_pool(frame.pool().clone());
    for name in &plan.index_columns {
        let ty = frame.column(name)?.column_type();
        result.add_column(result.empty_column(name, ty))?;
    }
    for value in &plan.pivot_values {
        let name = format!("{}{}", plan.prefix, value);
        result.add_column(result.empty_column(&name, value_type))?;
    }

    for (_, group_rows) in &groups {
        for name in &plan.index_columns {
            let source = frame.column(name)?;
            if let Some(dest) = result.get_column_mut(name) {
                copy_cell(source, group_rows[0], dest);
            }
        }
        // Seed the pivoted cells with defaults, then overwrite matches.
        for value in &plan.pivot_values {
            let name = format!("{}{}", plan.prefix, value);
            if let Some(dest) = result.get_column_mut(&name) {
                push_default(dest);
            }
        }
        let current = result.row_count() - 1;
        for &source_row in group_rows {
            let name = format!("{}{}", plan.prefix, name_fragment(pivot_column, source_row));
            let Some(dest) = result.get_column_mut(&name) else {
                continue;
            };
            match (value_column, dest) {
                (Column::Int(s), Column::Int(d)) => d.set(current, s.at(source_row)),
                (Column::Double(s), Column::Double(d)) => d.set(current, s.at(source_row)),
                (Column::Str(s), Column::Str(d)) => d.set_id(current, s.id_at(source_row)),
                _ => {}
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_frame() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_string_column("region").unwrap();
        df.add_string_column("q").unwrap();
        df.add_int_column("sales").unwrap();
        for (region, q, sales) in [("N", "Q1", 10), ("N", "Q2", 20), ("S", "Q1", 30), ("S", "Q2", 40)] {
            df.add_row(&[region, q, &sales.to_string()]).unwrap();
        }
        df
    }

    fn sales_spec() -> PivotSpec {
        PivotSpec {
            pivot_column: "q".into(),
            value_column: "sales".into(),
            index_columns: Some(vec!["region".into()]),
            prefix: None,
        }
    }

    #[test]
    fn pivot_frame_by_region() {
        let df = sales_frame();
        let out = df.pivot_df(&sales_spec()).unwrap();
        assert_eq!(out.column_names(), vec!["region", "Q1", "Q2"]);
        assert_eq!(out.row_count(), 2);
        let region = out.column("region").unwrap().as_str().unwrap();
        let q1 = out.column("Q1").unwrap().as_int().unwrap();
        let q2 = out.column("Q2").unwrap().as_int().unwrap();
        assert_eq!((region.at(0).as_str(), q1.at(0), q2.at(0)), ("N", 10, 20));
        assert_eq!((region.at(1).as_str(), q1.at(1), q2.at(1)), ("S", 30, 40));
    }

    #[test]
    fn pivot_json_by_region() {
        let df = sales_frame();
        let out = df.pivot(&sales_spec()).unwrap();
        assert_eq!(
            out,
            json!([
                {"region": "N", "Q1": 10, "Q2": 20},
                {"region": "S", "Q1": 30, "Q2": 40},
            ])
        );
    }

    #[test]
    fn missing_cells_get_type_default_in_frame_form() {
        let mut df = DataFrame::new();
        df.add_string_column("region").unwrap();
        df.add_string_column("q").unwrap();
        df.add_int_column("sales").unwrap();
        df.add_row(&["N", "Q1", "10"]).unwrap();
        df.add_row(&["S", "Q2", "40"]).unwrap();

        let out = df.pivot_df(&sales_spec()).unwrap();
        let q1 = out.column("Q1").unwrap().as_int().unwrap();
        let q2 = out.column("Q2").unwrap().as_int().unwrap();
        assert_eq!((q1.at(0), q2.at(0)), (10, 0));
        assert_eq!((q1.at(1), q2.at(1)), (0, 40));
    }

    #[test]
    fn default_index_columns_and_prefix() {
        let df = sales_frame();
        let spec = PivotSpec {
            pivot_column: "q".into(),
            value_column: "sales".into(),
            index_columns: None,
            prefix: Some("p_".into()),
        };
        let out = df.pivot_df(&spec).unwrap();
        assert_eq!(out.column_names(), vec!["region", "p_Q1", "p_Q2"]);
    }

    #[test]
    fn string_values_pivot_with_string_type() {
        let mut df = DataFrame::new();
        df.add_string_column("id").unwrap();
        df.add_string_column("key").unwrap();
        df.add_string_column("val").unwrap();
        df.add_row(&["a", "x", "hello"]).unwrap();
        df.add_row(&["a", "y", "world"]).unwrap();
        let spec = PivotSpec {
            pivot_column: "key".into(),
            value_column: "val".into(),
            index_columns: Some(vec!["id".into()]),
            prefix: None,
        };
        let out = df.pivot_df(&spec).unwrap();
        let x = out.column("x").unwrap().as_str().unwrap();
        let y = out.column("y").unwrap().as_str().unwrap();
        assert_eq!((x.at(0).as_str(), y.at(0).as_str()), ("hello", "world"));
    }

    #[test]
    fn unknown_pivot_column() {
        let df = sales_frame();
        let spec = PivotSpec {
            pivot_column: "ghost".into(),
            value_column: "sales".into(),
            index_columns: None,
            prefix: None,
        };
        assert!(matches!(df.pivot_df(&spec), Err(FrameError::UnknownColumn(_))));
    }
}
