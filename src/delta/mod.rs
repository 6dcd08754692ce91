//! Rich-text deltas and the operational-transformation algebra over them.
//!
//! This module contains the core value types:
//! - `attributes`: formatting attribute sets and their compose/diff/transform rules
//! - `op`: the insert, delete and retain operations
//! - `iterator`: a splitting cursor over a delta's operations
//! - `text_delta`: the normalized [`Delta`] with compose, transform and position mapping
//! - `diff`: prefix/suffix diffing of text and documents

pub mod attributes;
pub mod diff;
pub mod iterator;
pub mod op;
pub mod text_delta;

pub use attributes::{AttributeMap, AttributeValue};
pub use iterator::OpIterator;
pub use op::{OpKind, Operation};
pub use text_delta::{Delta, transform, transform_index};
