//! Keeping selections stable across remote edits.

use serde::{Deserialize, Serialize};

use crate::delta::Delta;
pub use crate::delta::transform_index;

/// A selection as an anchor and a head position; equal when collapsed.
///
/// Positions are character offsets in delta coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CursorPosition {
    pub anchor: usize,
    pub head: usize,
}

impl CursorPosition {
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn collapsed(position: usize) -> Self {
        Self::new(position, position)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Maps both ends of the selection through `delta`.
    pub fn transform(&self, delta: &Delta, priority: bool) -> Self {
        Self {
            anchor: delta.transform_index(self.anchor, priority),
            head: delta.transform_index(self.head, priority),
        }
    }

    /// Pulls both ends back inside a document of `len` characters.
    pub fn clamp(&self, len: usize) -> Self {
        Self::new(self.anchor.min(len), self.head.min(len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_follows_insert_before_it() {
        let cursor = CursorPosition::new(2, 5);
        let delta = Delta::new().insert("abc");
        assert_eq!(cursor.transform(&delta, false), CursorPosition::new(5, 8));
    }

    #[test]
    fn test_selection_shrinks_with_deletion() {
        let cursor = CursorPosition::new(2, 6);
        let delta = Delta::new().retain(3).delete(2);
        assert_eq!(cursor.transform(&delta, false), CursorPosition::new(2, 4));
    }

    #[test]
    fn test_priority_cursor_stays_before_tied_insert() {
        let cursor = CursorPosition::collapsed(3);
        let delta = Delta::new().retain(3).insert("x");
        assert_eq!(cursor.transform(&delta, true), cursor);
        assert_eq!(cursor.transform(&delta, false), CursorPosition::collapsed(4));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(CursorPosition::new(9, 2).clamp(4), CursorPosition::new(4, 2));
    }
}
