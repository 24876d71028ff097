//! Columnar dataframe kernel
//!
//! Typed columns over a shared string-interning pool, plus the relational
//! operators (filter, sort, group-by, pivot, joins) that run on them.
//! Operators are functional: they read a source frame and build a new one.

pub mod column;
pub mod dataframe;
pub mod io;
pub mod ops;
pub mod pool;
pub mod serialize;
pub mod spec;

pub use column::{Column, ColumnType, FilterOp, PoolRef};
pub use dataframe::DataFrame;
pub use pool::{INVALID_ID, StringId, StringPool};

use thiserror::Error;

/// Errors raised by frame construction and the relational operators.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column already exists: {0}")]
    DuplicateColumn(String),

    #[error("cannot parse '{value}' as {expected} for column '{column}'")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        value: String,
    },

    #[error("join key type mismatch: '{left}' vs '{right}'")]
    JoinKeyTypeMismatch { left: String, right: String },

    #[error("invalid spec: {0}")]
    InvalidSpec(String),

    #[error("row has {got} values but the frame has {expected} columns")]
    RowArity { expected: usize, got: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
