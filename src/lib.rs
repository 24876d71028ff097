//! flowframe: node-graph data transformation over columnar dataframes
//!
//! Two coupled subsystems: a columnar dataframe kernel (dictionary-encoded
//! string columns, filter/sort/group-by/pivot/join operators) and a
//! topologically scheduled node-graph executor whose typed workloads let
//! scalar and column-valued inputs mix on the same operator. The standard
//! node library supplies ~60 concrete operators on top.

pub mod config;
pub mod frame;
pub mod graph;
pub mod nodes;

// Re-export commonly used types
pub use config::Config;
pub use frame::{Column, ColumnType, DataFrame, FrameError, StringPool};
pub use graph::{
    GraphError, NodeBuilder, NodeContext, NodeExecutor, NodeGraph, NodeRegistry, PortType,
    ValueType, Workload, default_registry,
};
