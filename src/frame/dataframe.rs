//! Ordered named columns sharing one string pool
//!
//! A frame is built empty, columns are appended, rows are appended as text
//! values parsed per column type. The relational operators never mutate a
//! source frame: they return new frames.

use std::collections::HashMap;
use std::sync::Arc;

use crate::frame::FrameError;
use crate::frame::column::{
    Column, ColumnType, DoubleColumn, IntColumn, PoolRef, StrColumn, new_pool,
};
use crate::frame::ops::{filter, group, join, pivot, sort};
use crate::frame::spec::{
    FilterClause, FlexJoinOptions, GroupBySpec, JoinSpec, PivotSpec, SortKey, TreeGroupBySpec,
};

#[derive(Debug, Clone, Default)]
pub struct DataFrame {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    pool: PoolRef,
}

impl DataFrame {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            by_name: HashMap::new(),
            pool: new_pool(),
        }
    }

    /// A frame whose string columns will intern into `pool`.
    pub fn with_pool(pool: PoolRef) -> Self {
        Self {
            columns: Vec::new(),
            by_name: HashMap::new(),
            pool,
        }
    }

    pub fn pool(&self) -> &PoolRef {
        &self.pool
    }

    // === Construction ===

    /// Append a column; the name must not already be present.
    pub fn add_column(&mut self, column: Column) -> Result<(), FrameError> {
        let name = column.name().to_owned();
        if self.by_name.contains_key(&name) {
            return Err(FrameError::DuplicateColumn(name));
        }
        self.by_name.insert(name, self.columns.len());
        self.columns.push(column);
        Ok(())
    }

    /// Append, or replace in place when a column with the same name exists.
    pub fn set_column(&mut self, column: Column) {
        match self.by_name.get(column.name()) {
            Some(&idx) => self.columns[idx] = column,
            None => {
                self.by_name
                    .insert(column.name().to_owned(), self.columns.len());
                self.columns.push(column);
            }
        }
    }

    pub fn add_int_column(&mut self, name: impl Into<String>) -> Result<(), FrameError> {
        self.add_column(Column::Int(IntColumn::new(name)))
    }

    pub fn add_double_column(&mut self, name: impl Into<String>) -> Result<(), FrameError> {
        self.add_column(Column::Double(DoubleColumn::new(name)))
    }

    pub fn add_string_column(&mut self, name: impl Into<String>) -> Result<(), FrameError> {
        self.add_column(Column::Str(StrColumn::new(name, Arc::clone(&self.pool))))
    }

    /// An empty column of `ty` attached to this frame's pool, not yet added.
    pub fn empty_column(&self, name: &str, ty: ColumnType) -> Column {
        match ty {
            ColumnType::Int => Column::Int(IntColumn::new(name)),
            ColumnType::Double => Column::Double(DoubleColumn::new(name)),
            ColumnType::String => Column::Str(StrColumn::new(name, Arc::clone(&self.pool))),
        }
    }

    /// Append one row of textual values, one per column, parsed to each
    /// column's native type. Failed numeric parses store the type default.
    pub fn add_row<S: AsRef<str>>(&mut self, values: &[S]) -> Result<(), FrameError> {
        if values.len() != self.columns.len() {
            return Err(FrameError::RowArity {
                expected: self.columns.len(),
                got: values.len(),
            });
        }
        for (column, value) in self.columns.iter_mut().zip(values) {
            column.push_text(value.as_ref());
        }
        Ok(())
    }

    // === Accessors ===

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.by_name.get(name).map(|&idx| &self.columns[idx])
    }

    pub fn get_column_mut(&mut self, name: &str) -> Option<&mut Column> {
        match self.by_name.get(name) {
            Some(&idx) => Some(&mut self.columns[idx]),
            None => None,
        }
    }

    /// Like [`get_column`](Self::get_column) but an unknown name is an error.
    pub fn column(&self, name: &str) -> Result<&Column, FrameError> {
        self.get_column(name)
            .ok_or_else(|| FrameError::UnknownColumn(name.to_owned()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Column names in insertion order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_owned()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    // === Relational operations (delegate to ops) ===

    pub fn filter(&self, clauses: &[FilterClause]) -> Result<DataFrame, FrameError> {
        filter::apply(self, clauses)
    }

    pub fn order_by(&self, keys: &[SortKey]) -> Result<DataFrame, FrameError> {
        sort::apply(self, keys)
    }

    pub fn group_by(&self, spec: &GroupBySpec) -> Result<DataFrame, FrameError> {
        group::group_by(self, spec)
    }

    pub fn group_by_tree(&self, spec: &TreeGroupBySpec) -> Result<serde_json::Value, FrameError> {
        group::group_by_tree(self, spec)
    }

    pub fn pivot(&self, spec: &PivotSpec) -> Result<serde_json::Value, FrameError> {
        pivot::pivot_json(self, spec)
    }

    pub fn pivot_df(&self, spec: &PivotSpec) -> Result<DataFrame, FrameError> {
        pivot::pivot_frame(self, spec)
    }

    pub fn inner_join(&self, other: &DataFrame, spec: &JoinSpec) -> Result<DataFrame, FrameError> {
        join::inner_join(self, other, spec)
    }

    pub fn flex_join(
        &self,
        other: &DataFrame,
        spec: &JoinSpec,
        options: &FlexJoinOptions,
    ) -> Result<join::FlexJoinResult, FrameError> {
        join::flex_join(self, other, spec, options)
    }

    /// Gather the named columns into a new frame, in the order given.
    pub fn select(&self, names: &[String]) -> Result<DataFrame, FrameError> {
        let mut out = DataFrame::with_pool(Arc::clone(&self.pool));
        for name in names {
            let column = self.column(name)?;
            out.add_column(column.clone())?;
        }
        Ok(out)
    }

    /// Gather every column by the given row indices into a new frame.
    pub(crate) fn gather(&self, indices: &[usize]) -> DataFrame {
        let mut out = DataFrame::with_pool(Arc::clone(&self.pool));
        for column in &self.columns {
            out.set_column(column.filter_by_indices(indices));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_frame() {
        let df = DataFrame::new();
        assert_eq!(df.row_count(), 0);
        assert_eq!(df.column_count(), 0);
        assert!(df.is_empty());
        assert!(df.column_names().is_empty());
    }

    #[test]
    fn add_typed_columns() {
        let mut df = DataFrame::new();
        df.add_int_column("age").unwrap();
        df.add_double_column("salary").unwrap();
        df.add_string_column("name").unwrap();
        assert_eq!(df.column_count(), 3);
        assert_eq!(df.column("age").unwrap().column_type(), ColumnType::Int);
        assert_eq!(
            df.column("salary").unwrap().column_type(),
            ColumnType::Double
        );
        assert_eq!(
            df.column("name").unwrap().column_type(),
            ColumnType::String
        );
    }

    #[test]
    fn duplicate_column_is_rejected() {
        let mut df = DataFrame::new();
        df.add_int_column("c").unwrap();
        assert!(matches!(
            df.add_int_column("c"),
            Err(FrameError::DuplicateColumn(_))
        ));
    }

    #[test]
    fn set_column_replaces() {
        let mut df = DataFrame::new();
        df.add_int_column("v").unwrap();
        let mut replacement = DoubleColumn::new("v");
        replacement.push(1.5);
        df.set_column(Column::Double(replacement));
        assert_eq!(df.column_count(), 1);
        assert_eq!(df.column("v").unwrap().column_type(), ColumnType::Double);
    }

    #[test]
    fn unknown_column_is_an_error() {
        let df = DataFrame::new();
        assert!(matches!(
            df.column("missing"),
            Err(FrameError::UnknownColumn(_))
        ));
    }

    #[test]
    fn add_row_parses_and_defaults() {
        let mut df = DataFrame::new();
        df.add_int_column("id").unwrap();
        df.add_double_column("price").unwrap();
        df.add_string_column("name").unwrap();
        df.add_row(&["1", "1.50", "Apple"]).unwrap();
        df.add_row(&["not-a-number", "x", "Banana"]).unwrap();
        assert_eq!(df.row_count(), 2);
        assert_eq!(df.column("id").unwrap().as_int().unwrap().at(1), 0);
        assert_eq!(df.column("price").unwrap().as_double().unwrap().at(1), 0.0);
        assert_eq!(df.column("name").unwrap().as_str().unwrap().at(1), "Banana");
    }

    #[test]
    fn add_row_arity_checked() {
        let mut df = DataFrame::new();
        df.add_int_column("a").unwrap();
        assert!(matches!(
            df.add_row(&["1", "2"]),
            Err(FrameError::RowArity { .. })
        ));
    }

    #[test]
    fn column_names_preserve_insertion_order() {
        let mut df = DataFrame::new();
        df.add_string_column("z").unwrap();
        df.add_int_column("a").unwrap();
        df.add_double_column("m").unwrap();
        assert_eq!(df.column_names(), vec!["z", "a", "m"]);
    }

    #[test]
    fn select_projects_in_order() {
        let mut df = DataFrame::new();
        df.add_int_column("a").unwrap();
        df.add_int_column("b").unwrap();
        df.add_row(&["1", "2"]).unwrap();
        let out = df.select(&["b".into(), "a".into()]).unwrap();
        assert_eq!(out.column_names(), vec!["b", "a"]);
        assert!(df.select(&["nope".into()]).is_err());
    }
}
