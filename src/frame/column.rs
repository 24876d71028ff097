//! Typed columns with per-type predicate scans, gather and sort keys
//!
//! A `Column` is an enum over three typed backing stores. String columns are
//! dictionary-encoded: they hold pool ids and a shared handle to the owning
//! pool, so equality scans compare integers on a contiguous buffer.

use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::frame::FrameError;
use crate::frame::pool::{StringId, StringPool};

/// Shared handle to a string pool. Execution is single-threaded; the lock
/// exists so frames can be shared across node outputs as `Arc<DataFrame>`.
pub type PoolRef = Arc<RwLock<StringPool>>;

pub fn new_pool() -> PoolRef {
    Arc::new(RwLock::new(StringPool::new()))
}

/// Read access to a pool, recovering from poisoning (single-threaded runs
/// can only poison a lock by panicking mid-operation).
pub fn pool_read(pool: &PoolRef) -> RwLockReadGuard<'_, StringPool> {
    pool.read().unwrap_or_else(PoisonError::into_inner)
}

pub fn pool_write(pool: &PoolRef) -> RwLockWriteGuard<'_, StringPool> {
    pool.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum ColumnType {
    #[strum(serialize = "INT")]
    #[serde(rename = "INT")]
    Int,
    #[strum(serialize = "DOUBLE")]
    #[serde(rename = "DOUBLE")]
    Double,
    #[strum(serialize = "STRING")]
    #[serde(rename = "STRING")]
    String,
}

/// The seven predicate operators a filter clause can carry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
pub enum FilterOp {
    #[strum(serialize = "==")]
    #[serde(rename = "==")]
    Eq,
    #[strum(serialize = "!=")]
    #[serde(rename = "!=")]
    Ne,
    #[strum(serialize = "<")]
    #[serde(rename = "<")]
    Lt,
    #[strum(serialize = "<=")]
    #[serde(rename = "<=")]
    Le,
    #[strum(serialize = ">")]
    #[serde(rename = ">")]
    Gt,
    #[strum(serialize = ">=")]
    #[serde(rename = ">=")]
    Ge,
    #[strum(serialize = "contains")]
    #[serde(rename = "contains")]
    Contains,
}

#[derive(Debug, Clone)]
pub struct IntColumn {
    name: String,
    data: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct DoubleColumn {
    name: String,
    data: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct StrColumn {
    name: String,
    data: Vec<StringId>,
    pool: PoolRef,
}

impl IntColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, value: i64) {
        self.data.push(value);
    }

    pub fn set(&mut self, index: usize, value: i64) {
        self.data[index] = value;
    }

    pub fn at(&self, index: usize) -> i64 {
        self.data[index]
    }

    pub fn data(&self) -> &[i64] {
        &self.data
    }
}

impl DoubleColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.data.push(value);
    }

    pub fn set(&mut self, index: usize, value: f64) {
        self.data[index] = value;
    }

    pub fn at(&self, index: usize) -> f64 {
        self.data[index]
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

impl StrColumn {
    pub fn new(name: impl Into<String>, pool: PoolRef) -> Self {
        Self {
            name: name.into(),
            data: Vec::new(),
            pool,
        }
    }

    /// Intern `value` into the column's pool and append its id.
    pub fn push(&mut self, value: &str) {
        let id = pool_write(&self.pool).intern(value);
        self.data.push(id);
    }

    /// Append an id already valid in this column's pool.
    pub fn push_id(&mut self, id: StringId) {
        self.data.push(id);
    }

    pub fn set(&mut self, index: usize, value: &str) {
        let id = pool_write(&self.pool).intern(value);
        self.data[index] = id;
    }

    pub fn set_id(&mut self, index: usize, id: StringId) {
        self.data[index] = id;
    }

    /// Resolve the text at a row. Owned because the pool sits behind a lock.
    pub fn at(&self, index: usize) -> String {
        pool_read(&self.pool).get(self.data[index]).to_owned()
    }

    pub fn id_at(&self, index: usize) -> StringId {
        self.data[index]
    }

    pub fn ids(&self) -> &[StringId] {
        &self.data
    }

    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }
}

/// A named, typed vector of cells.
#[derive(Debug, Clone)]
pub enum Column {
    Int(IntColumn),
    Double(DoubleColumn),
    Str(StrColumn),
}

impl Column {
    pub fn name(&self) -> &str {
        match self {
            Column::Int(c) => &c.name,
            Column::Double(c) => &c.name,
            Column::Str(c) => &c.name,
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        match self {
            Column::Int(c) => c.name = name,
            Column::Double(c) => c.name = name,
            Column::Str(c) => c.name = name,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Int(_) => ColumnType::Int,
            Column::Double(_) => ColumnType::Double,
            Column::Str(_) => ColumnType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int(c) => c.data.len(),
            Column::Double(c) => c.data.len(),
            Column::Str(c) => c.data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reserve(&mut self, additional: usize) {
        match self {
            Column::Int(c) => c.data.reserve(additional),
            Column::Double(c) => c.data.reserve(additional),
            Column::Str(c) => c.data.reserve(additional),
        }
    }

    pub fn clear(&mut self) {
        match self {
            Column::Int(c) => c.data.clear(),
            Column::Double(c) => c.data.clear(),
            Column::Str(c) => c.data.clear(),
        }
    }

    /// Render the cell at `index` as text.
    pub fn text_at(&self, index: usize) -> String {
        match self {
            Column::Int(c) => c.at(index).to_string(),
            Column::Double(c) => c.at(index).to_string(),
            Column::Str(c) => c.at(index),
        }
    }

    /// Append a textual cell, parsing to the native type. Failed numeric
    /// parses store the type default (0 / 0.0) rather than failing the row.
    pub fn push_text(&mut self, value: &str) {
        match self {
            Column::Int(c) => c.push(value.trim().parse().unwrap_or(0)),
            Column::Double(c) => c.push(value.trim().parse().unwrap_or(0.0)),
            Column::Str(c) => c.push(value),
        }
    }

    /// Row indices matching `op value`, ascending. The operand is textual
    /// and parsed to the column's native type; a failed numeric parse is a
    /// type mismatch. `contains` matches nothing on numeric columns.
    pub fn matching_indices(&self, op: FilterOp, value: &str) -> Result<Vec<usize>, FrameError> {
        match self {
            Column::Int(c) => {
                if op == FilterOp::Contains {
                    return Ok(Vec::new());
                }
                let target: i64 = value.trim().parse().map_err(|_| FrameError::TypeMismatch {
                    column: c.name.clone(),
                    expected: ColumnType::Int,
                    value: value.to_owned(),
                })?;
                Ok(scan(&c.data, |v| compare_matches(op, v.cmp(&target))))
            }
            Column::Double(c) => {
                if op == FilterOp::Contains {
                    return Ok(Vec::new());
                }
                let target: f64 = value.trim().parse().map_err(|_| FrameError::TypeMismatch {
                    column: c.name.clone(),
                    expected: ColumnType::Double,
                    value: value.to_owned(),
                })?;
                Ok(scan(&c.data, |v| {
                    v.partial_cmp(&target)
                        .is_some_and(|ord| compare_matches(op, ord))
                }))
            }
            Column::Str(c) => Ok(c.matching_indices(op, value)),
        }
    }

    /// Gather the rows at `indices` into a new column of the same type and
    /// name. Out-of-range indices are silently skipped. String gathers keep
    /// the source pool, so no re-interning happens.
    pub fn filter_by_indices(&self, indices: &[usize]) -> Column {
        match self {
            Column::Int(c) => {
                let mut out = IntColumn::new(c.name.clone());
                out.data.reserve(indices.len());
                for &i in indices {
                    if let Some(&v) = c.data.get(i) {
                        out.push(v);
                    }
                }
                Column::Int(out)
            }
            Column::Double(c) => {
                let mut out = DoubleColumn::new(c.name.clone());
                out.data.reserve(indices.len());
                for &i in indices {
                    if let Some(&v) = c.data.get(i) {
                        out.push(v);
                    }
                }
                Column::Double(out)
            }
            Column::Str(c) => {
                let mut out = StrColumn::new(c.name.clone(), Arc::clone(&c.pool));
                out.data.reserve(indices.len());
                for &i in indices {
                    if let Some(&id) = c.data.get(i) {
                        out.push_id(id);
                    }
                }
                Column::Str(out)
            }
        }
    }

    /// Stable sort of a caller-supplied index buffer by the values at those
    /// indices.
    pub fn sorted_indices(&self, indices: &mut [usize], ascending: bool) {
        match self {
            Column::Int(c) => {
                indices.sort_by(|&a, &b| directed(c.data[a].cmp(&c.data[b]), ascending));
            }
            Column::Double(c) => {
                indices.sort_by(|&a, &b| {
                    directed(c.data[a].total_cmp(&c.data[b]), ascending)
                });
            }
            Column::Str(c) => {
                let pool = pool_read(&c.pool);
                indices.sort_by(|&a, &b| {
                    directed(pool.get(c.data[a]).cmp(pool.get(c.data[b])), ascending)
                });
            }
        }
    }

    /// Compare two rows of this column, ascending.
    pub fn compare_rows(&self, a: usize, b: usize) -> Ordering {
        match self {
            Column::Int(c) => c.data[a].cmp(&c.data[b]),
            Column::Double(c) => c.data[a].total_cmp(&c.data[b]),
            Column::Str(c) => {
                let pool = pool_read(&c.pool);
                pool.get(c.data[a]).cmp(pool.get(c.data[b]))
            }
        }
    }

    pub fn as_int(&self) -> Option<&IntColumn> {
        match self {
            Column::Int(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<&DoubleColumn> {
        match self {
            Column::Double(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&StrColumn> {
        match self {
            Column::Str(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_int_mut(&mut self) -> Option<&mut IntColumn> {
        match self {
            Column::Int(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_double_mut(&mut self) -> Option<&mut DoubleColumn> {
        match self {
            Column::Double(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str_mut(&mut self) -> Option<&mut StrColumn> {
        match self {
            Column::Str(c) => Some(c),
            _ => None,
        }
    }
}

impl StrColumn {
    fn matching_indices(&self, op: FilterOp, value: &str) -> Vec<usize> {
        match op {
            // Equality compares pool ids: one intern of the operand, then
            // integer compares over the id buffer.
            FilterOp::Eq => {
                let target = pool_write(&self.pool).intern(value);
                scan(&self.data, |id| id == target)
            }
            FilterOp::Ne => {
                let target = pool_write(&self.pool).intern(value);
                scan(&self.data, |id| id != target)
            }
            FilterOp::Contains => {
                let pool = pool_read(&self.pool);
                scan(&self.data, |id| pool.get(id).contains(value))
            }
            // Strict orderings compare resolved text lexicographically.
            _ => {
                let pool = pool_read(&self.pool);
                scan(&self.data, |id| {
                    compare_matches(op, pool.get(id).cmp(value))
                })
            }
        }
    }
}

fn scan<T: Copy>(data: &[T], keep: impl Fn(T) -> bool) -> Vec<usize> {
    let mut out = Vec::new();
    for (i, &v) in data.iter().enumerate() {
        if keep(v) {
            out.push(i);
        }
    }
    out
}

fn compare_matches(op: FilterOp, ord: Ordering) -> bool {
    match op {
        FilterOp::Eq => ord == Ordering::Equal,
        FilterOp::Ne => ord != Ordering::Equal,
        FilterOp::Lt => ord == Ordering::Less,
        FilterOp::Le => ord != Ordering::Greater,
        FilterOp::Gt => ord == Ordering::Greater,
        FilterOp::Ge => ord != Ordering::Less,
        FilterOp::Contains => false,
    }
}

fn directed(ord: Ordering, ascending: bool) -> Ordering {
    if ascending { ord } else { ord.reverse() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_col(values: &[i64]) -> Column {
        let mut c = IntColumn::new("n");
        for &v in values {
            c.push(v);
        }
        Column::Int(c)
    }

    fn str_col(values: &[&str]) -> Column {
        let mut c = StrColumn::new("s", new_pool());
        for v in values {
            c.push(v);
        }
        Column::Str(c)
    }

    #[test]
    fn int_predicates() {
        let col = int_col(&[3, 1, 4, 1, 5]);
        assert_eq!(col.matching_indices(FilterOp::Eq, "1").unwrap(), vec![1, 3]);
        assert_eq!(
            col.matching_indices(FilterOp::Gt, "3").unwrap(),
            vec![2, 4]
        );
        assert_eq!(
            col.matching_indices(FilterOp::Le, "3").unwrap(),
            vec![0, 1, 3]
        );
    }

    #[test]
    fn int_predicate_bad_operand_is_type_mismatch() {
        let col = int_col(&[1]);
        let err = col.matching_indices(FilterOp::Eq, "abc").unwrap_err();
        assert!(matches!(err, FrameError::TypeMismatch { .. }));
    }

    #[test]
    fn contains_on_numeric_matches_nothing() {
        let col = int_col(&[1, 12, 123]);
        assert!(col.matching_indices(FilterOp::Contains, "2").unwrap().is_empty());
    }

    #[test]
    fn string_equality_and_contains() {
        let col = str_col(&["alpha", "beta", "alphabet"]);
        assert_eq!(col.matching_indices(FilterOp::Eq, "beta").unwrap(), vec![1]);
        assert_eq!(
            col.matching_indices(FilterOp::Contains, "alpha").unwrap(),
            vec![0, 2]
        );
        assert_eq!(
            col.matching_indices(FilterOp::Lt, "b").unwrap(),
            vec![0, 2]
        );
    }

    #[test]
    fn gather_skips_out_of_range() {
        let col = int_col(&[10, 20, 30]);
        let out = col.filter_by_indices(&[2, 99, 0]);
        let out = out.as_int().unwrap();
        assert_eq!(out.data(), &[30, 10]);
    }

    #[test]
    fn gather_shares_pool() {
        let col = str_col(&["x", "y"]);
        let out = col.filter_by_indices(&[1]);
        let (src, out) = (col.as_str().unwrap(), out.as_str().unwrap());
        assert!(Arc::ptr_eq(src.pool(), out.pool()));
        assert_eq!(out.at(0), "y");
    }

    #[test]
    fn sorted_indices_is_stable() {
        let col = int_col(&[2, 1, 2, 1]);
        let mut idx = vec![0, 1, 2, 3];
        col.sorted_indices(&mut idx, true);
        assert_eq!(idx, vec![1, 3, 0, 2]);
        col.sorted_indices(&mut idx, false);
        assert_eq!(idx, vec![0, 2, 1, 3]);
    }

    #[test]
    fn push_text_defaults_on_parse_failure() {
        let mut col = int_col(&[]);
        col.push_text("7");
        col.push_text("oops");
        assert_eq!(col.as_int().unwrap().data(), &[7, 0]);
    }
}
