//! Typed operator specs
//!
//! The JSON shapes callers send to the relational operators, deserialized
//! into structs up front so operators validate once and work with plain
//! fields. Formats match the engine's public contracts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::frame::column::FilterOp;

/// One clause of a filter spec:
/// `{ "column": NAME, "operator": OP, "value": LITERAL }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub operator: FilterOp,
    pub value: Value,
}

impl FilterClause {
    pub fn new(column: impl Into<String>, operator: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// The operand as text, the form every column predicate consumes.
    /// String literals are passed through unquoted.
    pub fn literal_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

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
pub enum SortDirection {
    #[strum(serialize = "asc", serialize = "ascending")]
    #[serde(rename = "asc", alias = "ascending")]
    Ascending,
    #[strum(serialize = "desc", serialize = "descending")]
    #[serde(rename = "desc", alias = "descending")]
    Descending,
}

impl SortDirection {
    pub fn is_ascending(self) -> bool {
        self == SortDirection::Ascending
    }
}

/// One key of an order-by spec: `{ "column": NAME, "order": "asc"|"desc" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortKey {
    pub column: String,
    #[serde(rename = "order")]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Aggregation function. `blank` (aka `none` or the empty string) emits
/// null in the tree form and the type default in the flat form.
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
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AggregateFn {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    First,
    #[strum(serialize = "blank", serialize = "none", serialize = "")]
    #[serde(alias = "none", alias = "")]
    Blank,
}

/// `{ "column": NAME, "function": FUNC, "alias": NAME }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregation {
    pub column: String,
    pub function: AggregateFn,
    pub alias: String,
}

/// Flat group-by spec: grouping columns plus per-alias aggregations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupBySpec {
    #[serde(rename = "groupBy")]
    pub group_by: Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

/// Tree group-by spec: the aggregation map is keyed by column name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeGroupBySpec {
    #[serde(rename = "groupBy")]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregations: HashMap<String, AggregateFn>,
}

/// `{ "pivotColumn", "valueColumn", "indexColumns"?, "prefix"? }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotSpec {
    #[serde(rename = "pivotColumn")]
    pub pivot_column: String,
    #[serde(rename = "valueColumn")]
    pub value_column: String,
    #[serde(rename = "indexColumns", skip_serializing_if = "Option::is_none")]
    pub index_columns: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// One join key: an object with explicit sides, or a bare string meaning
/// the same name on both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JoinKeySpec {
    Name(String),
    Pair { left: String, right: String },
}

impl JoinKeySpec {
    pub fn left(&self) -> &str {
        match self {
            JoinKeySpec::Name(n) => n,
            JoinKeySpec::Pair { left, .. } => left,
        }
    }

    pub fn right(&self) -> &str {
        match self {
            JoinKeySpec::Name(n) => n,
            JoinKeySpec::Pair { right, .. } => right,
        }
    }
}

/// `{ "keys": [ KEY, ... ] }` — must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSpec {
    pub keys: Vec<JoinKeySpec>,
}

impl JoinSpec {
    /// Join on identical names on both sides.
    pub fn on<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            keys: names
                .into_iter()
                .map(|n| JoinKeySpec::Name(n.into()))
                .collect(),
        }
    }
}

/// Per-category emission mode of the flex join.
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
pub enum JoinMode {
    /// Emit left + right columns, fully populated.
    #[strum(serialize = "yes")]
    #[serde(rename = "yes")]
    KeepAll,
    /// Emit left + right columns, right cells hold the type default.
    #[strum(serialize = "no_but_keep_header")]
    #[serde(rename = "no_but_keep_header")]
    KeepHeaderOnly,
    /// Emit only left columns.
    #[strum(serialize = "no")]
    #[serde(rename = "no")]
    KeepLeftOnly,
    /// No columns, no rows.
    #[strum(serialize = "skip")]
    #[serde(rename = "skip")]
    Skip,
}

/// Modes for the three flex-join outputs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlexJoinOptions {
    #[serde(default = "FlexJoinOptions::default_no_match")]
    pub no_match: JoinMode,
    #[serde(default = "FlexJoinOptions::default_match")]
    pub single_match: JoinMode,
    #[serde(default = "FlexJoinOptions::default_match")]
    pub multiple_match: JoinMode,
}

impl FlexJoinOptions {
    fn default_no_match() -> JoinMode {
        JoinMode::KeepHeaderOnly
    }

    fn default_match() -> JoinMode {
        JoinMode::KeepAll
    }
}

impl Default for FlexJoinOptions {
    fn default() -> Self {
        Self {
            no_match: JoinMode::KeepHeaderOnly,
            single_match: JoinMode::KeepAll,
            multiple_match: JoinMode::KeepAll,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn filter_clause_from_json() {
        let clause: FilterClause =
            serde_json::from_str(r#"{"column":"name","operator":"!=","value":"Charlie"}"#).unwrap();
        assert_eq!(clause.column, "name");
        assert_eq!(clause.operator, FilterOp::Ne);
        assert_eq!(clause.literal_text(), "Charlie");
    }

    #[test]
    fn numeric_literal_renders_unquoted() {
        let clause: FilterClause =
            serde_json::from_str(r#"{"column":"id","operator":">","value":3}"#).unwrap();
        assert_eq!(clause.literal_text(), "3");
    }

    #[test]
    fn sort_direction_long_forms() {
        let keys: Vec<SortKey> = serde_json::from_str(
            r#"[{"column":"a","order":"ascending"},{"column":"b","order":"desc"}]"#,
        )
        .unwrap();
        assert!(keys[0].direction.is_ascending());
        assert!(!keys[1].direction.is_ascending());
    }

    #[test]
    fn group_by_spec_shapes() {
        let spec: GroupBySpec = serde_json::from_str(
            r#"{"groupBy":["dept"],"aggregations":[{"column":"salary","function":"avg","alias":"a"}]}"#,
        )
        .unwrap();
        assert_eq!(spec.group_by, vec!["dept"]);
        assert_eq!(spec.aggregations[0].function, AggregateFn::Avg);

        let tree: TreeGroupBySpec =
            serde_json::from_str(r#"{"groupBy":["dept"],"aggregations":{"salary":"sum"}}"#)
                .unwrap();
        assert_eq!(tree.aggregations["salary"], AggregateFn::Sum);
    }

    #[test]
    fn aggregate_fn_blank_aliases() {
        assert_eq!(AggregateFn::from_str("blank").unwrap(), AggregateFn::Blank);
        assert_eq!(AggregateFn::from_str("none").unwrap(), AggregateFn::Blank);
        assert_eq!(AggregateFn::from_str("").unwrap(), AggregateFn::Blank);
    }

    #[test]
    fn join_key_shorthand() {
        let spec: JoinSpec =
            serde_json::from_str(r#"{"keys":["country",{"left":"a","right":"b"}]}"#).unwrap();
        assert_eq!(spec.keys[0].left(), "country");
        assert_eq!(spec.keys[0].right(), "country");
        assert_eq!(spec.keys[1].left(), "a");
        assert_eq!(spec.keys[1].right(), "b");
    }

    #[test]
    fn join_mode_strings() {
        assert_eq!(JoinMode::from_str("yes").unwrap(), JoinMode::KeepAll);
        assert_eq!(
            JoinMode::from_str("no_but_keep_header").unwrap(),
            JoinMode::KeepHeaderOnly
        );
        assert_eq!(JoinMode::from_str("no").unwrap(), JoinMode::KeepLeftOnly);
        assert_eq!(JoinMode::from_str("skip").unwrap(), JoinMode::Skip);
    }
}
