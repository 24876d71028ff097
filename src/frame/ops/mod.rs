//! Relational operators
//!
//! All operators are functional: they read a source frame and return a new
//! frame (or a JSON tree for the hierarchical group-by). No source column is
//! ever mutated.

pub mod filter;
pub mod group;
pub mod join;
pub mod pivot;
pub mod sort;
