//! Group-by: flat frame output and hierarchical tree output
//!
//! Group keys are compressed to 64-bit slots per column: `Int` casts, the
//! raw bit pattern for `Double`, and the pool id for `String`. One slot per
//! group column is concatenated into the group key vector. Groups are
//! emitted in first-sighting order, which keeps runs deterministic.

use std::collections::HashMap;

use serde_json::{Value, json};

use crate::frame::FrameError;
use crate::frame::column::{Column, ColumnType};
use crate::frame::dataframe::DataFrame;
use crate::frame::serialize::cell_json;
use crate::frame::spec::{AggregateFn, GroupBySpec, TreeGroupBySpec};

pub(crate) type GroupKey = Vec<u64>;

/// Compress one cell into a 64-bit slot for group hashing.
pub(crate) fn key_slot(column: &Column, row: usize) -> u64 {
    match column {
        Column::Int(c) => c.at(row) as u64,
        Column::Double(c) => c.at(row).to_bits(),
        Column::Str(c) => c.id_at(row) as u64,
    }
}

/// Hash rows by the named columns. Returns `(key, row indices)` pairs in
/// first-sighting order of each key.
pub(crate) fn build_groups(
    frame: &DataFrame,
    group_columns: &[String],
) -> Result<Vec<(GroupKey, Vec<usize>)>, FrameError> {
    let columns: Vec<&Column> = group_columns
        .iter()
        .map(|name| frame.column(name))
        .collect::<Result<_, FrameError>>()?;

    let mut order: Vec<(GroupKey, Vec<usize>)> = Vec::new();
    let mut slots: HashMap<GroupKey, usize> = HashMap::new();

    for row in 0..frame.row_count() {
        let key: GroupKey = columns.iter().map(|c| key_slot(c, row)).collect();
        match slots.get(&key) {
            Some(&slot) => order[slot].1.push(row),
            None => {
                slots.insert(key.clone(), order.len());
                order.push((key, vec![row]));
            }
        }
    }

    Ok(order)
}

/// Sum of a column over the given rows; string cells contribute nothing.
fn sum_over(column: &Column, rows: &[usize]) -> f64 {
    match column {
        Column::Int(c) => rows.iter().map(|&i| c.at(i) as f64).sum(),
        Column::Double(c) => rows.iter().map(|&i| c.at(i)).sum(),
        Column::Str(_) => 0.0,
    }
}

fn extreme_over(column: &Column, rows: &[usize], want_min: bool) -> f64 {
    let fold = |acc: f64, v: f64| if want_min { acc.min(v) } else { acc.max(v) };
    match column {
        Column::Int(c) => rows
            .iter()
            .map(|&i| c.at(i) as f64)
            .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { fold(acc, v) }),
        Column::Double(c) => rows
            .iter()
            .map(|&i| c.at(i))
            .fold(f64::NAN, |acc, v| if acc.is_nan() { v } else { fold(acc, v) }),
        Column::Str(_) => 0.0,
    }
}

/// Flat group-by. Grouping columns keep the source type; `count` emits an
/// int column, `sum`/`avg`/`min`/`max` emit doubles regardless of the
/// source numeric type, `first` keeps the source type, `blank` emits the
/// source type's default.
pub fn group_by(frame: &DataFrame, spec: &GroupBySpec) -> Result<DataFrame, FrameError> {
    for agg in &spec.aggregations {
        frame.column(&agg.column)?;
    }
    let groups = build_groups(frame, &spec.group_by)?;

    let mut result = DataFrame::with_pool(frame.pool().clone());
    for name in &spec.group_by {
        let ty = frame.column(name)?.column_type();
        result.add_column(result.empty_column(name, ty))?;
    }
    for agg in &spec.aggregations {
        let ty = match agg.function {
            AggregateFn::Count => ColumnType::Int,
            AggregateFn::Sum | AggregateFn::Avg | AggregateFn::Min | AggregateFn::Max => {
                ColumnType::Double
            }
            AggregateFn::First | AggregateFn::Blank => frame.column(&agg.column)?.column_type(),
        };
        result.add_column(result.empty_column(&agg.alias, ty))?;
    }

    for (_, rows) in &groups {
        let representative = rows[0];
        for name in &spec.group_by {
            let source = frame.column(name)?;
            if let Some(dest) = result.get_column_mut(name) {
                copy_cell(source, representative, dest);
            }
        }
        for agg in &spec.aggregations {
            let source = frame.column(&agg.column)?;
            let Some(dest) = result.get_column_mut(&agg.alias) else {
                continue;
            };
            match agg.function {
                AggregateFn::Count => {
                    if let Some(c) = dest.as_int_mut() {
                        c.push(rows.len() as i64);
                    }
                }
                AggregateFn::Sum => {
                    if let Some(c) = dest.as_double_mut() {
                        c.push(sum_over(source, rows));
                    }
                }
                AggregateFn::Avg => {
                    if let Some(c) = dest.as_double_mut() {
                        let sum = sum_over(source, rows);
                        c.push(if rows.is_empty() { sum } else { sum / rows.len() as f64 });
                    }
                }
                AggregateFn::Min => {
                    if let Some(c) = dest.as_double_mut() {
                        c.push(extreme_over(source, rows, true));
                    }
                }
                AggregateFn::Max => {
                    if let Some(c) = dest.as_double_mut() {
                        c.push(extreme_over(source, rows, false));
                    }
                }
                AggregateFn::First => copy_cell(source, representative, dest),
                AggregateFn::Blank => push_default(dest),
            }
        }
    }

    Ok(result)
}

/// Copy one cell between same-typed columns sharing a pool.
pub(crate) fn copy_cell(source: &Column, row: usize, dest: &mut Column) {
    match (source, dest) {
        (Column::Int(s), Column::Int(d)) => d.push(s.at(row)),
        (Column::Double(s), Column::Double(d)) => d.push(s.at(row)),
        (Column::Str(s), Column::Str(d)) => d.push_id(s.id_at(row)),
        _ => {}
    }
}

pub(crate) fn push_default(dest: &mut Column) {
    match dest {
        Column::Int(c) => c.push(0),
        Column::Double(c) => c.push(0.0),
        Column::Str(c) => c.push(""),
    }
}

fn aggregate_json(function: AggregateFn, column: &Column, rows: &[usize]) -> Value {
    match function {
        AggregateFn::Blank => Value::Null,
        AggregateFn::Count => json!(rows.len()),
        AggregateFn::First => match rows.first() {
            Some(&row) => cell_json(column, row),
            None => Value::Null,
        },
        AggregateFn::Sum | AggregateFn::Avg => {
            let mut sum = sum_over(column, rows);
            if function == AggregateFn::Avg && !rows.is_empty() {
                sum /= rows.len() as f64;
            }
            json!(sum)
        }
        AggregateFn::Min | AggregateFn::Max => {
            if rows.is_empty() {
                return Value::Null;
            }
            let want_min = function == AggregateFn::Min;
            match column {
                // Int columns keep integer extremes in the tree form.
                Column::Int(c) => {
                    let mut extreme = c.at(rows[0]);
                    for &i in rows {
                        let v = c.at(i);
                        if (want_min && v < extreme) || (!want_min && v > extreme) {
                            extreme = v;
                        }
                    }
                    json!(extreme)
                }
                Column::Double(_) => json!(extreme_over(column, rows, want_min)),
                Column::Str(_) => Value::Null,
            }
        }
    }
}

/// Hierarchical group-by. Produces
/// `{ "columns": [...], "data": [[cells..., _children], ...] }` where
/// `_children` is the group's full source rows as arrays. Non-grouping
/// columns are evaluated through the column → function map, defaulting to
/// `blank` (null).
pub fn group_by_tree(frame: &DataFrame, spec: &TreeGroupBySpec) -> Result<Value, FrameError> {
    let groups = build_groups(frame, &spec.group_by)?;
    let names = frame.column_names();

    let mut data = Vec::with_capacity(groups.len());
    for (_, rows) in &groups {
        let mut group_row = Vec::with_capacity(names.len() + 1);
        for name in &names {
            let column = frame.column(name)?;
            if spec.group_by.contains(name) {
                group_row.push(cell_json(column, rows[0]));
            } else {
                let function = spec
                    .aggregations
                    .get(name)
                    .copied()
                    .unwrap_or(AggregateFn::Blank);
                group_row.push(aggregate_json(function, column, rows));
            }
        }

        let mut children = Vec::with_capacity(rows.len());
        for &row in rows {
            let cells: Vec<Value> = names
                .iter()
                .map(|name| frame.column(name).map(|c| cell_json(c, row)))
                .collect::<Result<_, FrameError>>()?;
            children.push(Value::Array(cells));
        }
        group_row.push(Value::Array(children));
        data.push(Value::Array(group_row));
    }

    Ok(json!({ "columns": names, "data": data }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::spec::Aggregation;

    fn dept_frame() -> DataFrame {
        let mut df = DataFrame::new();
        df.add_string_column("dept").unwrap();
        df.add_int_column("salary").unwrap();
        for (dept, salary) in [
            ("E", 80000),
            ("E", 90000),
            ("S", 60000),
            ("E", 85000),
            ("S", 65000),
        ] {
            df.add_row(&[dept, &salary.to_string()]).unwrap();
        }
        df
    }

    fn agg(column: &str, function: AggregateFn, alias: &str) -> Aggregation {
        Aggregation {
            column: column.into(),
            function,
            alias: alias.into(),
        }
    }

    #[test]
    fn count_and_avg_per_group() {
        let df = dept_frame();
        let spec = GroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: vec![
                agg("salary", AggregateFn::Count, "n"),
                agg("salary", AggregateFn::Avg, "a"),
            ],
        };
        let out = df.group_by(&spec).unwrap();
        assert_eq!(out.row_count(), 2);

        // First-sighting order: E then S.
        let dept = out.column("dept").unwrap().as_str().unwrap();
        assert_eq!(dept.at(0), "E");
        assert_eq!(dept.at(1), "S");
        assert_eq!(out.column("n").unwrap().as_int().unwrap().data(), &[3, 2]);
        let avg = out.column("a").unwrap().as_double().unwrap();
        assert_eq!(avg.at(0), 85000.0);
        assert_eq!(avg.at(1), 62500.0);
    }

    #[test]
    fn count_partitions_the_source() {
        let df = dept_frame();
        let spec = GroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: vec![
                agg("salary", AggregateFn::Count, "n"),
                agg("salary", AggregateFn::Sum, "total"),
            ],
        };
        let out = df.group_by(&spec).unwrap();
        let counts = out.column("n").unwrap().as_int().unwrap();
        let total_rows: i64 = counts.data().iter().sum();
        assert_eq!(total_rows as usize, df.row_count());

        let sums = out.column("total").unwrap().as_double().unwrap();
        let grand: f64 = sums.data().iter().sum();
        assert_eq!(grand, 380000.0);
    }

    #[test]
    fn sum_emits_double_even_for_int_source() {
        let df = dept_frame();
        let spec = GroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: vec![agg("salary", AggregateFn::Sum, "s")],
        };
        let out = df.group_by(&spec).unwrap();
        assert_eq!(out.column("s").unwrap().column_type(), ColumnType::Double);
    }

    #[test]
    fn min_max_first() {
        let df = dept_frame();
        let spec = GroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: vec![
                agg("salary", AggregateFn::Min, "lo"),
                agg("salary", AggregateFn::Max, "hi"),
                agg("salary", AggregateFn::First, "f"),
            ],
        };
        let out = df.group_by(&spec).unwrap();
        let lo = out.column("lo").unwrap().as_double().unwrap();
        let hi = out.column("hi").unwrap().as_double().unwrap();
        let first = out.column("f").unwrap().as_int().unwrap();
        assert_eq!((lo.at(0), hi.at(0)), (80000.0, 90000.0));
        assert_eq!((lo.at(1), hi.at(1)), (60000.0, 65000.0));
        assert_eq!(first.data(), &[80000, 60000]);
    }

    #[test]
    fn unknown_aggregation_column() {
        let df = dept_frame();
        let spec = GroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: vec![agg("ghost", AggregateFn::Sum, "s")],
        };
        assert!(matches!(
            df.group_by(&spec),
            Err(FrameError::UnknownColumn(_))
        ));
    }

    #[test]
    fn tree_shape_and_children() {
        let df = dept_frame();
        let spec = TreeGroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: [("salary".to_string(), AggregateFn::Sum)]
                .into_iter()
                .collect(),
        };
        let tree = df.group_by_tree(&spec).unwrap();
        assert_eq!(tree["columns"], json!(["dept", "salary"]));

        let data = tree["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        let first = data[0].as_array().unwrap();
        assert_eq!(first[0], json!("E"));
        assert_eq!(first[1], json!(255000.0));
        // Last element is the `_children` array of full source rows.
        let children = first[2].as_array().unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0], json!(["E", 80000]));
    }

    #[test]
    fn tree_unlisted_column_defaults_to_null() {
        let df = dept_frame();
        let spec = TreeGroupBySpec {
            group_by: vec!["dept".into()],
            aggregations: HashMap::new(),
        };
        let tree = df.group_by_tree(&spec).unwrap();
        let first = tree["data"][0].as_array().unwrap();
        assert_eq!(first[1], Value::Null);
    }
}
