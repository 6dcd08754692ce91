//! Bridging deltas and rich documents.
//!
//! - `schema`: the [`NodeSchema`] capability mapping attributes to blocks and marks
//! - `model`: the [`RichDocument`] boundary, transactions, and the in-memory [`RichText`]
//! - `projector`: applying deltas to documents and diffing documents into deltas

pub mod model;
pub mod projector;
pub mod schema;

pub use model::{Origin, RichDocument, RichText, Span, Step, Transaction};
pub use projector::DocumentProjector;
pub use schema::{Block, DefaultSchema, NodeSchema};
