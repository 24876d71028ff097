//! Standard node library
//!
//! The ~60 concrete operators built on the frame and graph layers, grouped
//! the way the registry categorizes them. `register_all` wires every group
//! into a registry; the default process-wide registry calls it once.

pub mod aggregate;
pub mod data;
pub mod database;
pub mod dynamic;
pub mod label;
pub mod math;
pub mod scalar;
pub mod select;
pub mod string;
pub mod viz;

use std::sync::Arc;

use crate::frame::{Column, DataFrame};
use crate::graph::registry::NodeRegistry;

/// Numbered optional ports (`x_1` … `x_99`) follow the editor convention
/// for variadic inputs.
pub(crate) const MAX_NUMBERED_PORTS: usize = 99;

pub fn register_all(registry: &mut NodeRegistry) {
    scalar::register(registry);
    data::register(registry);
    math::register(registry);
    aggregate::register(registry);
    select::register(registry);
    string::register(registry);
    database::register(registry);
    dynamic::register(registry);
    label::register(registry);
    viz::register(registry);
}

/// Rebuild a frame with one column replaced or appended: every source
/// column except the destination is carried over, then the new column is
/// set. The result shares the source pool.
pub(crate) fn rebuild_with_column(csv: &Arc<DataFrame>, column: Column) -> DataFrame {
    let mut result = DataFrame::with_pool(csv.pool().clone());
    for source in csv.columns() {
        if source.name() != column.name() {
            result.set_column(source.clone());
        }
    }
    result.set_column(column);
    result
}
