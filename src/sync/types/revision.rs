//! Document revision numbers.
//!
//! The sequencer is the only party that creates revisions; clients mirror the latest one
//! they have been told about.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A committed document version. Revision 0 is the empty initial document.
///
/// # Ordering
///
/// Revisions are totally ordered by commit order, so they key the sequencer's history.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub const INITIAL: Revision = Revision(0);

    /// The revision committed right after this one.
    pub fn next(self) -> Revision {
        Revision(self.0 + 1)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}
