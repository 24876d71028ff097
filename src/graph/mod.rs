//! Node-graph execution kernel
//!
//! The type system carried on ports (`Workload`), node definitions and
//! their registry, the graph model, the topologically scheduled executor,
//! and the equation parser feeding dynamic zones.

pub mod context;
pub mod definition;
pub mod dynamic;
pub mod equation;
pub mod event;
pub mod executor;
pub mod labels;
pub mod model;
pub mod registry;
pub mod serialize;
pub mod workload;

pub use context::NodeContext;
pub use definition::{InputDef, NodeBuilder, NodeDefinition, OutputDef};
pub use equation::{BinaryOp, MathOp, Operand};
pub use event::{ExecutionEvent, ExecutionStatus};
pub use executor::{CsvOverrides, ExecutionRecord, NamedOutput, NodeExecutor, NodeResult};
pub use labels::{LabelRegistry, SharedLabels};
pub use model::{Connection, NodeGraph, NodeInstance, VisualGroup};
pub use registry::{NodeRegistry, default_registry};
pub use workload::{PortType, ValueType, Workload};

use thiserror::Error;

use crate::frame::FrameError;

/// Errors raised by the node kernel and the executor.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("field '{0}' requires an active csv")]
    FieldWithoutCsv(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("cannot read '{value}' from column '{column}' as {expected}")]
    CellParse {
        column: String,
        value: String,
        expected: ValueType,
    },

    #[error("cycle detected in node graph")]
    CycleDetected,

    #[error("unknown node definition: {0}")]
    UnknownDefinition(String),

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("dynamic zone '{0}' not found")]
    UnknownZone(String),

    #[error("equation error: {0}")]
    Equation(#[from] equation::EquationError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("invalid graph JSON: {0}")]
    InvalidGraph(String),
}
