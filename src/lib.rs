//! # delta-sync - Collaborative rich-text editing over operational transformation
//!
//! Keeps rich-text documents consistent across several editors. Every change is a
//! [`Delta`]: a sequence of insert, delete and retain operations. A sequencer orders changes
//! and rebases late ones with [`Delta::transform`]; clients apply what they are sent to their
//! local documents and keep cursors in place.
//!
//! ## Features
//!
//! - **Delta algebra**: compose, transform, invert, diff and position mapping
//! - **Document projection**: deltas applied to and extracted from any [`RichDocument`]
//! - **Sync client**: revisions, echo suppression, presence and remote cursors
//! - **Relay server**: one sequencer per document behind an Axum WebSocket endpoint
//!
//! ## Example
//!
//! ```rust
//! use delta_sync::Delta;
//!
//! let base = Delta::new().insert("ab");
//! let mine = Delta::new().retain(1).insert("x");
//! let theirs = Delta::new().retain(1).insert("y");
//!
//! // `theirs` arrived later, so it is rebased over `mine`.
//! let rebased = theirs.transform(&mine, false);
//! let text = base.compose(&mine).compose(&rebased);
//! assert_eq!(text.document_text().unwrap(), "axyb");
//! ```

pub mod cursor;
pub mod delta;
pub mod document;
pub mod error;
pub mod sequencer;
pub mod server;
pub mod sync;

// Re-export the main public API
pub use cursor::CursorPosition;
pub use delta::{AttributeMap, AttributeValue, Delta, Operation};
pub use document::{DefaultSchema, DocumentProjector, NodeSchema, RichDocument, RichText};
pub use error::{DeltaError, RoomError, SequencerError, SyncError, TransportError};
pub use sequencer::Sequencer;
pub use sync::{ClientIdentity, Revision, SyncClient, Transport};
