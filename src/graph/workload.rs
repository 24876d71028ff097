//! Workload values and port types
//!
//! A `Workload` is the tagged value carried on every port. Three families:
//! scalars (`Int`, `Double`, `String`, `Bool`) broadcast to all rows, a
//! `Field` names a column resolved against the active dataframe, and `Csv`
//! is a shared handle to a whole frame. The broadcasting accessors are what
//! let one operator body serve scalar and per-row inputs alike.

use std::sync::Arc;

use strum_macros::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::frame::{Column, DataFrame};
use crate::graph::GraphError;

/// Tag set of workload values and port types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum ValueType {
    Int,
    Double,
    String,
    Bool,
    Null,
    Field,
    Csv,
}

impl ValueType {
    /// Scalars broadcast one value to every row.
    pub fn is_scalar(self) -> bool {
        matches!(
            self,
            ValueType::Int | ValueType::Double | ValueType::String | ValueType::Bool
        )
    }
}

/// The (tag, value) pair carried on every port.
#[derive(Debug, Clone, Default)]
pub enum Workload {
    #[default]
    Null,
    Int(i64),
    Double(f64),
    Str(String),
    Bool(bool),
    /// A column name, resolved later against the active dataframe.
    Field(String),
    /// Shared handle to a dataframe; cloning clones the handle.
    Csv(Arc<DataFrame>),
}

impl Workload {
    pub fn value_type(&self) -> ValueType {
        match self {
            Workload::Null => ValueType::Null,
            Workload::Int(_) => ValueType::Int,
            Workload::Double(_) => ValueType::Double,
            Workload::Str(_) => ValueType::String,
            Workload::Bool(_) => ValueType::Bool,
            Workload::Field(_) => ValueType::Field,
            Workload::Csv(_) => ValueType::Csv,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Workload::Null)
    }

    pub fn is_scalar(&self) -> bool {
        self.value_type().is_scalar()
    }

    pub fn is_field(&self) -> bool {
        matches!(self, Workload::Field(_))
    }

    pub fn is_csv(&self) -> bool {
        matches!(self, Workload::Csv(_))
    }

    pub fn accepts(&self, port: &PortType) -> bool {
        port.accepts(self.value_type())
    }

    fn mismatch(&self, expected: ValueType) -> GraphError {
        GraphError::TypeMismatch {
            expected,
            found: self.value_type(),
        }
    }

    /// Scalar integer view; numeric tags coerce.
    pub fn as_int(&self) -> Result<i64, GraphError> {
        match self {
            Workload::Int(v) => Ok(*v),
            Workload::Double(v) => Ok(*v as i64),
            Workload::Bool(v) => Ok(*v as i64),
            other => Err(other.mismatch(ValueType::Int)),
        }
    }

    /// Scalar double view; numeric tags coerce.
    pub fn as_double(&self) -> Result<f64, GraphError> {
        match self {
            Workload::Double(v) => Ok(*v),
            Workload::Int(v) => Ok(*v as f64),
            Workload::Bool(v) => Ok(i64::from(*v) as f64),
            other => Err(other.mismatch(ValueType::Double)),
        }
    }

    /// Text view. `Field` yields the column *name*: by-reference handles
    /// read as their name until resolved against a frame.
    pub fn as_text(&self) -> Result<&str, GraphError> {
        match self {
            Workload::Str(s) | Workload::Field(s) => Ok(s),
            other => Err(other.mismatch(ValueType::String)),
        }
    }

    pub fn as_bool(&self) -> Result<bool, GraphError> {
        match self {
            Workload::Bool(v) => Ok(*v),
            Workload::Int(v) => Ok(*v != 0),
            other => Err(other.mismatch(ValueType::Bool)),
        }
    }

    pub fn as_csv(&self) -> Result<Arc<DataFrame>, GraphError> {
        match self {
            Workload::Csv(df) => Ok(Arc::clone(df)),
            other => Err(other.mismatch(ValueType::Csv)),
        }
    }

    fn resolve<'a>(
        name: &str,
        csv: Option<&'a Arc<DataFrame>>,
    ) -> Result<&'a Column, GraphError> {
        let csv = csv.ok_or_else(|| GraphError::FieldWithoutCsv(name.to_owned()))?;
        csv.get_column(name)
            .ok_or_else(|| GraphError::UnknownColumn(name.to_owned()))
    }

    /// Row-aware integer read: a `Field` resolves the named column at
    /// `row` (parsing string cells on demand); any scalar ignores the row.
    pub fn get_int_at_row(
        &self,
        row: usize,
        csv: Option<&Arc<DataFrame>>,
    ) -> Result<i64, GraphError> {
        match self {
            Workload::Field(name) => match Self::resolve(name, csv)? {
                Column::Int(c) => Ok(c.at(row)),
                Column::Double(c) => Ok(c.at(row) as i64),
                Column::Str(c) => {
                    let text = c.at(row);
                    text.trim().parse().map_err(|_| GraphError::CellParse {
                        column: name.clone(),
                        value: text,
                        expected: ValueType::Int,
                    })
                }
            },
            other => other.as_int(),
        }
    }

    pub fn get_double_at_row(
        &self,
        row: usize,
        csv: Option<&Arc<DataFrame>>,
    ) -> Result<f64, GraphError> {
        match self {
            Workload::Field(name) => match Self::resolve(name, csv)? {
                Column::Int(c) => Ok(c.at(row) as f64),
                Column::Double(c) => Ok(c.at(row)),
                Column::Str(c) => {
                    let text = c.at(row);
                    text.trim().parse().map_err(|_| GraphError::CellParse {
                        column: name.clone(),
                        value: text,
                        expected: ValueType::Double,
                    })
                }
            },
            other => other.as_double(),
        }
    }

    pub fn get_string_at_row(
        &self,
        row: usize,
        csv: Option<&Arc<DataFrame>>,
    ) -> Result<String, GraphError> {
        match self {
            Workload::Field(name) => Ok(Self::resolve(name, csv)?.text_at(row)),
            Workload::Str(s) => Ok(s.clone()),
            Workload::Int(v) => Ok(v.to_string()),
            Workload::Double(v) => Ok(v.to_string()),
            Workload::Bool(v) => Ok(v.to_string()),
            other => Err(other.mismatch(ValueType::String)),
        }
    }
}

impl From<i64> for Workload {
    fn from(v: i64) -> Self {
        Workload::Int(v)
    }
}

impl From<f64> for Workload {
    fn from(v: f64) -> Self {
        Workload::Double(v)
    }
}

impl From<&str> for Workload {
    fn from(v: &str) -> Self {
        Workload::Str(v.to_owned())
    }
}

impl From<String> for Workload {
    fn from(v: String) -> Self {
        Workload::Str(v)
    }
}

impl From<bool> for Workload {
    fn from(v: bool) -> Self {
        Workload::Bool(v)
    }
}

impl From<Arc<DataFrame>> for Workload {
    fn from(v: Arc<DataFrame>) -> Self {
        Workload::Csv(v)
    }
}

impl From<DataFrame> for Workload {
    fn from(v: DataFrame) -> Self {
        Workload::Csv(Arc::new(v))
    }
}

/// A non-empty set of accepted value tags. A port accepts a workload iff
/// the workload's tag is in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortType {
    types: Vec<ValueType>,
}

impl PortType {
    pub fn new(types: Vec<ValueType>) -> Self {
        debug_assert!(!types.is_empty(), "port type needs at least one tag");
        Self { types }
    }

    pub fn single(ty: ValueType) -> Self {
        Self { types: vec![ty] }
    }

    pub fn accepts(&self, ty: ValueType) -> bool {
        self.types.contains(&ty)
    }

    pub fn types(&self) -> &[ValueType] {
        &self.types
    }

    pub fn is_multi(&self) -> bool {
        self.types.len() > 1
    }

    pub fn primary(&self) -> ValueType {
        self.types.first().copied().unwrap_or(ValueType::Null)
    }
}

impl From<ValueType> for PortType {
    fn from(ty: ValueType) -> Self {
        PortType::single(ty)
    }
}

impl<const N: usize> From<[ValueType; N]> for PortType {
    fn from(types: [ValueType; N]) -> Self {
        PortType::new(types.to_vec())
    }
}
