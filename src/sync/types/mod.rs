//! Identity and bookkeeping types for the sync protocol.
//!
//! This module contains the small value types the client, the sequencer and the server
//! share, organized into focused submodules.

pub mod collaborator;
pub mod revision;
pub mod user;

pub use collaborator::{Collaborator, CollaboratorSet};
pub use revision::Revision;
pub use user::{Author, UserId};
