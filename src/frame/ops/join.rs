//! Hash joins: inner join and the three-way flex join
//!
//! Join keys are vectors of 64-bit slots like group keys, except that
//! string slots are re-interned into a fresh result pool so ids from both
//! sides compare consistently. Source pools are never mutated beyond that
//! re-interning — the result frame owns the new pool.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::frame::FrameError;
use crate::frame::column::{Column, PoolRef, new_pool};
use crate::frame::dataframe::DataFrame;
use crate::frame::spec::{FlexJoinOptions, JoinMode, JoinSpec};

/// Outputs of the flex join, one frame per left-row match cardinality.
#[derive(Debug)]
pub struct FlexJoinResult {
    pub no_match: DataFrame,
    pub single_match: DataFrame,
    pub multiple_match: DataFrame,
}

struct ResultColumn {
    result_name: String,
    source_name: String,
    from_left: bool,
    is_key: bool,
}

/// Slot for one join-key cell, re-interning strings through the result pool.
fn join_slot(column: &Column, row: usize, result_pool: &PoolRef) -> u64 {
    match column {
        Column::Int(c) => c.at(row) as u64,
        Column::Double(c) => c.at(row).to_bits(),
        Column::Str(c) => {
            let text = c.at(row);
            crate::frame::column::pool_write(result_pool).intern(&text) as u64
        }
    }
}

fn validate_keys(
    spec: &JoinSpec,
    left: &DataFrame,
    right: &DataFrame,
) -> Result<(Vec<String>, Vec<String>), FrameError> {
    if spec.keys.is_empty() {
        return Err(FrameError::InvalidSpec(
            "join spec must contain at least one key".into(),
        ));
    }
    let mut left_keys = Vec::with_capacity(spec.keys.len());
    let mut right_keys = Vec::with_capacity(spec.keys.len());
    for key in &spec.keys {
        let left_col = left.column(key.left())?;
        let right_col = right.column(key.right())?;
        if left_col.column_type() != right_col.column_type() {
            return Err(FrameError::JoinKeyTypeMismatch {
                left: key.left().to_owned(),
                right: key.right().to_owned(),
            });
        }
        left_keys.push(key.left().to_owned());
        right_keys.push(key.right().to_owned());
    }
    Ok((left_keys, right_keys))
}

fn build_hash_table(
    frame: &DataFrame,
    keys: &[String],
    result_pool: &PoolRef,
) -> Result<HashMap<Vec<u64>, Vec<usize>>, FrameError> {
    let columns: Vec<&Column> = keys
        .iter()
        .map(|name| frame.column(name))
        .collect::<Result<_, FrameError>>()?;

    let mut table: HashMap<Vec<u64>, Vec<usize>> = HashMap::with_capacity(frame.row_count());
    for row in 0..frame.row_count() {
        let key: Vec<u64> = columns
            .iter()
            .map(|c| join_slot(c, row, result_pool))
            .collect();
        table.entry(key).or_default().push(row);
    }
    Ok(table)
}

/// Result schema: keys once under the left names, then left non-keys in
/// source order, then right non-keys in source order. A right non-key that
/// collides with an already-used name gets `_right`; a left non-key that
/// collides with a key gets `_left`.
fn result_schema(
    left: &DataFrame,
    right: &DataFrame,
    left_keys: &[String],
    right_keys: &[String],
) -> Vec<ResultColumn> {
    let left_key_set: HashSet<&str> = left_keys.iter().map(String::as_str).collect();
    let right_key_set: HashSet<&str> = right_keys.iter().map(String::as_str).collect();

    let mut columns = Vec::new();
    let mut used: HashSet<String> = HashSet::new();

    for name in left_keys {
        columns.push(ResultColumn {
            result_name: name.clone(),
            source_name: name.clone(),
            from_left: true,
            is_key: true,
        });
        used.insert(name.clone());
    }

    for name in left.column_names() {
        if left_key_set.contains(name.as_str()) {
            continue;
        }
        let result_name = if used.contains(&name) {
            format!("{name}_left")
        } else {
            name.clone()
        };
        used.insert(result_name.clone());
        columns.push(ResultColumn {
            result_name,
            source_name: name,
            from_left: true,
            is_key: false,
        });
    }

    for name in right.column_names() {
        if right_key_set.contains(name.as_str()) {
            continue;
        }
        let result_name = if used.contains(&name) {
            format!("{name}_right")
        } else {
            name.clone()
        };
        used.insert(result_name.clone());
        columns.push(ResultColumn {
            result_name,
            source_name: name,
            from_left: false,
            is_key: false,
        });
    }

    columns
}

fn add_schema_columns(
    target: &mut DataFrame,
    schema: &[ResultColumn],
    left: &DataFrame,
    right: &DataFrame,
    mode: JoinMode,
) -> Result<(), FrameError> {
    if mode == JoinMode::Skip {
        return Ok(());
    }
    for rc in schema {
        if !rc.from_left && !rc.is_key && mode == JoinMode::KeepLeftOnly {
            continue;
        }
        let source = if rc.from_left {
            left.column(&rc.source_name)?
        } else {
            right.column(&rc.source_name)?
        };
        let column = target.empty_column(&rc.result_name, source.column_type());
        target.add_column(column)?;
    }
    Ok(())
}

/// Copy one cell into a result column, re-interning string text into the
/// result frame's pool.
fn emit_cell(source: &Column, row: usize, dest: &mut Column) {
    match (source, dest) {
        (Column::Int(s), Column::Int(d)) => d.push(s.at(row)),
        (Column::Double(s), Column::Double(d)) => d.push(s.at(row)),
        (Column::Str(s), Column::Str(d)) => d.push(&s.at(row)),
        _ => {}
    }
}

fn emit_default(dest: &mut Column) {
    match dest {
        Column::Int(c) => c.push(0),
        Column::Double(c) => c.push(0.0),
        Column::Str(c) => c.push(""),
    }
}

pub fn inner_join(
    left: &DataFrame,
    right: &DataFrame,
    spec: &JoinSpec,
) -> Result<DataFrame, FrameError> {
    let (left_keys, right_keys) = validate_keys(spec, left, right)?;
    let result_pool = new_pool();

    // The smaller side builds the hash table; the other probes.
    let build_from_left = left.row_count() <= right.row_count();
    let table = if build_from_left {
        build_hash_table(left, &left_keys, &result_pool)?
    } else {
        build_hash_table(right, &right_keys, &result_pool)?
    };

    let schema = result_schema(left, right, &left_keys, &right_keys);
    let mut result = DataFrame::with_pool(Arc::clone(&result_pool));
    add_schema_columns(&mut result, &schema, left, right, JoinMode::KeepAll)?;

    let (probe, probe_keys) = if build_from_left {
        (right, &right_keys)
    } else {
        (left, &left_keys)
    };
    let probe_columns: Vec<&Column> = probe_keys
        .iter()
        .map(|name| probe.column(name))
        .collect::<Result<_, FrameError>>()?;

    for probe_row in 0..probe.row_count() {
        let key: Vec<u64> = probe_columns
            .iter()
            .map(|c| join_slot(c, probe_row, &result_pool))
            .collect();
        let Some(build_rows) = table.get(&key) else {
            continue;
        };
        for &build_row in build_rows {
            let (left_row, right_row) = if build_from_left {
                (build_row, probe_row)
            } else {
                (probe_row, build_row)
            };
            for rc in &schema {
                let (source, row) = if rc.from_left {
                    (left.column(&rc.source_name)?, left_row)
                } else {
                    (right.column(&rc.source_name)?, right_row)
                };
                if let Some(dest) = result.get_column_mut(&rc.result_name) {
                    emit_cell(source, row, dest);
                }
            }
        }
    }

    Ok(result)
}

/// Inner join split by left-row match cardinality. The build side is fixed
/// to the right frame: classification is always per left row.
pub fn flex_join(
    left: &DataFrame,
    right: &DataFrame,
    spec: &JoinSpec,
    options: &FlexJoinOptions,
) -> Result<FlexJoinResult, FrameError> {
    let (left_keys, right_keys) = validate_keys(spec, left, right)?;
    let result_pool = new_pool();
    let table = build_hash_table(right, &right_keys, &result_pool)?;
    let schema = result_schema(left, right, &left_keys, &right_keys);

    let mut no_match = DataFrame::with_pool(Arc::clone(&result_pool));
    let mut single_match = DataFrame::with_pool(Arc::clone(&result_pool));
    let mut multiple_match = DataFrame::with_pool(Arc::clone(&result_pool));
    add_schema_columns(&mut no_match, &schema, left, right, options.no_match)?;
    add_schema_columns(&mut single_match, &schema, left, right, options.single_match)?;
    add_schema_columns(
        &mut multiple_match,
        &schema,
        left,
        right,
        options.multiple_match,
    )?;

    let probe_columns: Vec<&Column> = left_keys
        .iter()
        .map(|name| left.column(name))
        .collect::<Result<_, FrameError>>()?;

    for left_row in 0..left.row_count() {
        let key: Vec<u64> = probe_columns
            .iter()
            .map(|c| join_slot(c, left_row, &result_pool))
            .collect();
        let matches = table.get(&key).map(Vec::as_slice).unwrap_or(&[]);

        let (target, mode) = match matches.len() {
            0 => (&mut no_match, options.no_match),
            1 => (&mut single_match, options.single_match),
            _ => (&mut multiple_match, options.multiple_match),
        };
        if mode == JoinMode::Skip {
            continue;
        }

        // KeepAll fans multi-matches out to one row per right hit; the
        // other modes emit a single row whose right cells are defaults.
        let right_rows: &[usize] = if matches.is_empty() || mode != JoinMode::KeepAll {
            &[usize::MAX]
        } else {
            matches
        };
        let right_is_real = !matches.is_empty() && mode == JoinMode::KeepAll;

        for &right_row in right_rows {
            for rc in &schema {
                if !rc.from_left && !rc.is_key && mode == JoinMode::KeepLeftOnly {
                    continue;
                }
                let Some(dest) = target.get_column_mut(&rc.result_name) else {
                    continue;
                };
                if rc.from_left || rc.is_key {
                    emit_cell(left.column(&rc.source_name)?, left_row, dest);
                } else if right_is_real {
                    emit_cell(right.column(&rc.source_name)?, right_row, dest);
                } else {
                    emit_default(dest);
                }
            }
        }
    }

    Ok(FlexJoinResult {
        no_match,
        single_match,
        multiple_match,
    })
}
