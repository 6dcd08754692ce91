//! The [`Delta`] type and its algebra.
//!
//! A delta is a normalized list of [`Operation`]s describing either a change to a document
//! (any mix of inserts, deletes and retains) or a whole document (inserts only).
//!
//! The three core operations are:
//! - [`Delta::compose`]: one delta equivalent to applying two in sequence
//! - [`Delta::transform`]: rebase a delta over a concurrent one so both orders converge
//! - [`Delta::transform_index`]: move a position through a delta

use serde::{Deserialize, Serialize};

use crate::delta::attributes::{self, AttributeMap};
use crate::delta::iterator::OpIterator;
use crate::delta::op::{OpKind, Operation};
use crate::error::DeltaError;

/// A normalized sequence of operations.
///
/// # Canonical form
///
/// Every mutation goes through [`Delta::push`], which keeps the list canonical:
/// - zero-length operations are dropped
/// - adjacent deletes merge, adjacent inserts and retains merge when their attributes match
/// - an insert following a delete is moved in front of it
///
/// Two deltas with the same effect built this way compare equal operation for operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Operation>", into = "Vec<Operation>")]
pub struct Delta {
    ops: Vec<Operation>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<Operation> {
        self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn insert(mut self, text: impl Into<String>) -> Self {
        self.push(Operation::insert(text));
        self
    }

    pub fn insert_with(mut self, text: impl Into<String>, attributes: AttributeMap) -> Self {
        self.push(Operation::insert_with(text, attributes));
        self
    }

    pub fn delete(mut self, len: usize) -> Self {
        self.push(Operation::delete(len));
        self
    }

    pub fn retain(mut self, len: usize) -> Self {
        self.push(Operation::retain(len));
        self
    }

    pub fn retain_with(mut self, len: usize, attributes: AttributeMap) -> Self {
        self.push(Operation::retain_with(len, attributes));
        self
    }

    /// Appends an operation, merging it into the tail where possible.
    pub fn push(&mut self, op: Operation) -> &mut Self {
        if op.is_empty() {
            return self;
        }

        if let (Some(Operation::Delete(last)), Operation::Delete(len)) = (self.ops.last_mut(), &op)
        {
            *last += *len;
            return self;
        }

        // Inserting before or after a deletion at the same index is the same edit.
        let mut index = self.ops.len();
        if op.is_insert() && matches!(self.ops.last(), Some(Operation::Delete(_))) {
            index -= 1;
        }

        if index > 0 {
            match (&mut self.ops[index - 1], &op) {
                (
                    Operation::Insert {
                        text: last,
                        attributes: last_attributes,
                    },
                    Operation::Insert { text, attributes },
                ) if last_attributes == attributes => {
                    last.push_str(text);
                    return self;
                }
                (
                    Operation::Retain {
                        len: last,
                        attributes: last_attributes,
                    },
                    Operation::Retain { len, attributes },
                ) if last_attributes == attributes => {
                    *last += *len;
                    return self;
                }
                _ => {}
            }
        }

        self.ops.insert(index, op);
        self
    }

    /// Drops a trailing plain retain, which has no effect.
    pub fn chop(mut self) -> Self {
        if let Some(Operation::Retain { attributes, .. }) = self.ops.last() {
            if attributes.is_empty() {
                self.ops.pop();
            }
        }
        self
    }

    /// Length of the document this delta applies to (retains and deletes).
    pub fn base_len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| !op.is_insert())
            .map(Operation::len)
            .sum()
    }

    /// Length of the document after applying this delta (retains and inserts).
    pub fn target_len(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| op.kind() != OpKind::Delete)
            .map(Operation::len)
            .sum()
    }

    /// Whether this delta contains inserts only and so describes a whole document.
    pub fn is_document(&self) -> bool {
        self.ops.iter().all(Operation::is_insert)
    }

    /// The plain text of a document delta.
    pub fn document_text(&self) -> Result<String, DeltaError> {
        self.ops
            .iter()
            .map(|op| match op {
                Operation::Insert { text, .. } => Ok(text.as_str()),
                _ => Err(DeltaError::NotADocument),
            })
            .collect()
    }

    /// The operations covering `start..end` of this delta's output positions.
    pub fn slice(&self, start: usize, end: usize) -> Delta {
        let mut iter = OpIterator::new(&self.ops);
        let mut sliced = Delta::new();
        let mut index = 0;

        while index < end && iter.has_next() {
            if index < start {
                index += iter.take(start - index).len();
            } else {
                let op = iter.take(end - index);
                index += op.len();
                sliced.push(op);
            }
        }
        sliced
    }

    /// Applies this delta to plain text, clamping out-of-range retains and deletes.
    pub fn apply(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut result = String::with_capacity(text.len());
        let mut cursor: usize = 0;

        for op in &self.ops {
            match op {
                Operation::Retain { len, .. } => {
                    let end = cursor.saturating_add(*len).min(chars.len());
                    result.extend(&chars[cursor..end]);
                    cursor = end;
                }
                Operation::Delete(len) => {
                    cursor = cursor.saturating_add(*len).min(chars.len());
                }
                Operation::Insert { text, .. } => result.push_str(text),
            }
        }
        result.extend(&chars[cursor..]);
        result
    }

    /// The delta equivalent to applying `self` and then `other`.
    pub fn compose(&self, other: &Delta) -> Delta {
        let mut this_iter = OpIterator::new(&self.ops);
        let mut other_iter = OpIterator::new(&other.ops);
        let mut composed = Delta::new();

        while this_iter.has_next() || other_iter.has_next() {
            if other_iter.peek_kind() == OpKind::Insert {
                composed.push(other_iter.take(usize::MAX));
            } else if this_iter.peek_kind() == OpKind::Delete {
                composed.push(this_iter.take(usize::MAX));
            } else {
                let len = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.take(len);
                let other_op = other_iter.take(len);

                match (this_op, other_op) {
                    (
                        Operation::Retain { attributes: a, .. },
                        Operation::Retain { attributes: b, .. },
                    ) => {
                        let attributes = attributes::compose(&a, &b, true);
                        composed.push(Operation::retain_with(len, attributes));
                    }
                    (
                        Operation::Insert { text, attributes: a },
                        Operation::Retain { attributes: b, .. },
                    ) => {
                        let attributes = attributes::compose(&a, &b, false);
                        composed.push(Operation::insert_with(text, attributes));
                    }
                    (Operation::Retain { .. }, Operation::Delete(len)) => {
                        composed.push(Operation::Delete(len));
                    }
                    // An insert deleted straight away leaves nothing behind.
                    _ => {}
                }
            }
        }
        composed.chop()
    }

    /// Rebases `self` so it applies after the concurrent `against`.
    ///
    /// Both deltas must apply to the same document. With `priority` set, inserts of `self`
    /// go first where both sides insert at the same position; otherwise `against`'s do.
    /// Concurrent formatting of the same span follows the same precedence.
    ///
    /// A range deleted by one side swallows whatever the other side inserted strictly inside
    /// it, so neither path resurrects text in the middle of a deletion.
    pub fn transform(&self, against: &Delta, priority: bool) -> Delta {
        let mut this_iter = OpIterator::new(&against.ops);
        let mut other_iter = OpIterator::new(&self.ops);
        let mut transformed = Delta::new();

        while this_iter.has_next() || other_iter.has_next() {
            if this_iter.peek_kind() == OpKind::Insert
                && (!priority || other_iter.peek_kind() != OpKind::Insert)
            {
                let len = this_iter.take(usize::MAX).len();
                if inside_delete(&other_iter) {
                    transformed.push(Operation::Delete(len));
                } else {
                    transformed.push(Operation::retain(len));
                }
            } else if other_iter.peek_kind() == OpKind::Insert {
                let op = other_iter.take(usize::MAX);
                if !inside_delete(&this_iter) {
                    transformed.push(op);
                }
            } else {
                let len = this_iter.peek_len().min(other_iter.peek_len());
                let this_op = this_iter.take(len);
                let other_op = other_iter.take(len);

                match (this_op, other_op) {
                    // Already gone on the other side.
                    (Operation::Delete(_), _) => {}
                    (_, Operation::Delete(len)) => {
                        transformed.push(Operation::Delete(len));
                    }
                    (this_op, other_op) => {
                        let attributes = attributes::transform(
                            other_op.attributes(),
                            this_op.attributes(),
                            priority,
                        );
                        transformed.push(Operation::retain_with(len, attributes));
                    }
                }
            }
        }
        transformed.chop()
    }

    /// Maps a position in the document before this delta to the document after it.
    ///
    /// Inserts strictly before `index` push it right. An insert exactly at `index` pushes it
    /// only without `priority`, so a priority position stays in front of text inserted at the
    /// same spot. Deletions before `index` pull it left, never past the deletion's start.
    pub fn transform_index(&self, index: usize, priority: bool) -> usize {
        let mut index = index;
        let mut offset = 0;

        for op in &self.ops {
            if offset > index {
                break;
            }
            match op {
                Operation::Delete(len) => index -= (*len).min(index - offset),
                Operation::Insert { .. } => {
                    let len = op.len();
                    if offset < index || !priority {
                        index += len;
                    }
                    offset += len;
                }
                Operation::Retain { len, .. } => offset += len,
            }
        }
        index
    }

    /// The delta that undoes `self` when applied to `base` composed with `self`.
    ///
    /// `base` is the document `self` was applied to.
    pub fn invert(&self, base: &Delta) -> Delta {
        let mut inverted = Delta::new();
        let mut base_index = 0;

        for op in &self.ops {
            match op {
                Operation::Insert { .. } => {
                    inverted.push(Operation::Delete(op.len()));
                }
                Operation::Retain { len, attributes } if attributes.is_empty() => {
                    inverted.push(Operation::retain(*len));
                    base_index += len;
                }
                Operation::Retain { len, attributes } => {
                    for base_op in base.slice(base_index, base_index + len).ops {
                        let restored = attributes::invert(attributes, base_op.attributes());
                        inverted.push(Operation::retain_with(base_op.len(), restored));
                    }
                    base_index += len;
                }
                Operation::Delete(len) => {
                    for base_op in base.slice(base_index, base_index + len).ops {
                        inverted.push(base_op);
                    }
                    base_index += len;
                }
            }
        }
        inverted.chop()
    }
}

/// True when the iterator sits strictly inside a delete, past its first character.
fn inside_delete(iter: &OpIterator<'_>) -> bool {
    iter.peek_kind() == OpKind::Delete && iter.offset() > 0
}

/// Rebases `delta` so it applies after the concurrent `against`. See [`Delta::transform`].
pub fn transform(delta: &Delta, against: &Delta, priority: bool) -> Delta {
    delta.transform(against, priority)
}

/// Moves `index` through `delta`. See [`Delta::transform_index`].
pub fn transform_index(index: usize, delta: &Delta, priority: bool) -> usize {
    delta.transform_index(index, priority)
}

impl From<Vec<Operation>> for Delta {
    fn from(ops: Vec<Operation>) -> Self {
        ops.into_iter().collect()
    }
}

impl From<Delta> for Vec<Operation> {
    fn from(delta: Delta) -> Self {
        delta.ops
    }
}

impl FromIterator<Operation> for Delta {
    fn from_iter<I: IntoIterator<Item = Operation>>(iter: I) -> Self {
        let mut delta = Delta::new();
        for op in iter {
            delta.push(op);
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::attributes::{AttributeValue, attributes};

    fn bold() -> AttributeMap {
        attributes([("bold", true)])
    }

    #[test]
    fn test_push_merges_and_drops_empty() {
        let delta = Delta::new()
            .insert("ab")
            .insert("")
            .insert("c")
            .retain(2)
            .retain(3)
            .delete(1)
            .delete(2);

        assert_eq!(
            delta.ops(),
            &[Operation::insert("abc"), Operation::retain(5), Operation::delete(3)]
        );
    }

    #[test]
    fn test_push_moves_insert_before_delete() {
        let delta = Delta::new().retain(1).delete(2).insert("x");
        assert_eq!(
            delta.ops(),
            &[Operation::retain(1), Operation::insert("x"), Operation::delete(2)]
        );

        let leading = Delta::new().delete(2).insert("x");
        assert_eq!(leading.ops(), &[Operation::insert("x"), Operation::delete(2)]);
    }

    #[test]
    fn test_push_keeps_differently_formatted_inserts_apart() {
        let delta = Delta::new().insert("a").insert_with("b", bold());
        assert_eq!(delta.ops().len(), 2);
    }

    #[test]
    fn test_lengths() {
        let delta = Delta::new().retain(2).insert("héé").delete(4);
        assert_eq!(delta.base_len(), 6);
        assert_eq!(delta.target_len(), 5);
    }

    #[test]
    fn test_chop_keeps_formatting_retain() {
        assert!(Delta::new().retain(3).chop().is_empty());
        assert_eq!(Delta::new().retain_with(3, bold()).chop().ops().len(), 1);
    }

    #[test]
    fn test_apply_clamps() {
        let delta = Delta::new().retain(10).insert("!");
        assert_eq!(delta.apply("abc"), "abc!");

        let delta = Delta::new().retain(1).delete(50);
        assert_eq!(delta.apply("abc"), "a");
    }

    #[test]
    fn test_compose_insert_then_delete() {
        let a = Delta::new().insert("abc");
        let b = Delta::new().retain(1).delete(1);
        assert_eq!(a.compose(&b), Delta::new().insert("ac"));
    }

    #[test]
    fn test_compose_format_over_insert_drops_null() {
        let a = Delta::new().insert_with("a", bold());
        let b = Delta::new().retain_with(1, attributes([("bold", AttributeValue::Null)]));
        assert_eq!(a.compose(&b), Delta::new().insert("a"));
    }

    #[test]
    fn test_compose_retain_keeps_null() {
        let a = Delta::new().retain_with(1, bold());
        let b = Delta::new().retain_with(1, attributes([("bold", AttributeValue::Null)]));
        assert_eq!(
            a.compose(&b),
            Delta::new().retain_with(1, attributes([("bold", AttributeValue::Null)]))
        );
    }

    #[test]
    fn test_compose_deletes_pass_through() {
        let a = Delta::new().delete(1);
        let b = Delta::new().delete(1);
        assert_eq!(a.compose(&b), Delta::new().delete(2));
    }

    #[test]
    fn test_transform_concurrent_inserts() {
        let a = Delta::new().retain(1).insert("x");
        let b = Delta::new().retain(1).insert("y");

        // Without priority the applied side's insert goes first.
        assert_eq!(b.transform(&a, false), Delta::new().retain(2).insert("y"));
        assert_eq!(a.transform(&b, true), Delta::new().retain(1).insert("x"));
        let merged = Delta::new()
            .insert("ab")
            .compose(&a)
            .compose(&b.transform(&a, false));
        assert_eq!(merged.document_text().unwrap(), "axyb");
    }

    #[test]
    fn test_transform_insert_inside_delete_is_dropped() {
        let a = Delta::new().delete(5).insert("hi");
        let b = Delta::new().retain(2).insert("!");

        assert!(b.transform(&a, false).is_empty());
        assert_eq!(a.transform(&b, true), Delta::new().insert("hi").delete(6));
    }

    #[test]
    fn test_transform_insert_at_delete_boundary_survives() {
        let a = Delta::new().retain(1).delete(2);
        let b = Delta::new().retain(1).insert("x");

        assert_eq!(b.transform(&a, false), Delta::new().retain(1).insert("x"));
        assert_eq!(a.transform(&b, true), Delta::new().retain(2).delete(2));
    }

    #[test]
    fn test_transform_overlapping_deletes() {
        let a = Delta::new().retain(1).delete(3);
        let b = Delta::new().retain(2).delete(3);

        assert_eq!(b.transform(&a, false), Delta::new().retain(1).delete(1));
        assert_eq!(a.transform(&b, true), Delta::new().retain(1).delete(1));
    }

    #[test]
    fn test_transform_formatting_precedence() {
        let a = Delta::new().retain_with(2, attributes([("color", "red")]));
        let b = Delta::new().retain_with(2, attributes([("color", "blue")]));

        assert!(b.transform(&a, false).is_empty());
        assert_eq!(b.transform(&a, true), b);
    }

    #[test]
    fn test_transform_index() {
        let delta = Delta::new().retain(2).insert("xyz").delete(2);

        assert_eq!(delta.transform_index(1, false), 1);
        assert_eq!(delta.transform_index(2, false), 5);
        assert_eq!(delta.transform_index(2, true), 2);
        assert_eq!(delta.transform_index(3, false), 5);
        assert_eq!(delta.transform_index(6, false), 7);
    }

    #[test]
    fn test_transform_index_clamps_into_deletion() {
        let delta = Delta::new().retain(1).delete(10);
        assert_eq!(delta.transform_index(5, false), 1);
        assert_eq!(delta.transform_index(0, false), 0);
    }

    #[test]
    fn test_invert_restores_document() {
        let base = Delta::new().insert("hello ").insert_with("world", bold());
        let change = Delta::new()
            .retain(2)
            .delete(3)
            .insert("y")
            .retain_with(3, attributes([("bold", AttributeValue::Null), ("italic", true.into())]));

        let inverse = change.invert(&base);
        assert_eq!(base.compose(&change).compose(&inverse), base);
    }

    #[test]
    fn test_slice() {
        let delta = Delta::new().insert("ab").insert_with("cd", bold()).retain(3);
        assert_eq!(
            delta.slice(1, 3),
            Delta::new().insert("b").insert_with("c", bold())
        );
    }

    #[test]
    fn test_document_text_rejects_changes() {
        assert_eq!(Delta::new().insert("ab").document_text().unwrap(), "ab");
        assert_eq!(
            Delta::new().retain(1).document_text(),
            Err(DeltaError::NotADocument)
        );
    }
}
