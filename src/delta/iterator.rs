//! Cursor over a delta's operations that hands out slices of bounded length.

use crate::delta::op::{OpKind, Operation};

/// Walks a slice of operations, splitting the current one on demand.
///
/// Past the last operation the iterator behaves like an unbounded plain retain, which is
/// what an absent tail of a delta means.
#[derive(Debug, Clone)]
pub struct OpIterator<'a> {
    ops: &'a [Operation],
    index: usize,
    offset: usize,
}

impl<'a> OpIterator<'a> {
    pub fn new(ops: &'a [Operation]) -> Self {
        Self {
            ops,
            index: 0,
            offset: 0,
        }
    }

    pub fn has_next(&self) -> bool {
        self.index < self.ops.len()
    }

    /// The operation under the cursor, if any.
    pub fn peek(&self) -> Option<&'a Operation> {
        self.ops.get(self.index)
    }

    /// Characters left in the current operation; `usize::MAX` once exhausted.
    pub fn peek_len(&self) -> usize {
        self.peek()
            .map_or(usize::MAX, |op| op.len() - self.offset)
    }

    pub fn peek_kind(&self) -> OpKind {
        self.peek().map_or(OpKind::Retain, Operation::kind)
    }

    /// How far into the current operation the cursor is.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Consumes up to `len` characters of the current operation.
    ///
    /// Pass `usize::MAX` to take the rest of it. Once exhausted this yields a plain retain of
    /// `len`.
    pub fn take(&mut self, len: usize) -> Operation {
        let Some(op) = self.ops.get(self.index) else {
            return Operation::retain(len);
        };

        let start = self.offset;
        let remaining = op.len() - start;
        let len = if len >= remaining {
            self.index += 1;
            self.offset = 0;
            remaining
        } else {
            self.offset += len;
            len
        };

        match op {
            Operation::Insert { text, attributes } => Operation::Insert {
                text: text.chars().skip(start).take(len).collect(),
                attributes: attributes.clone(),
            },
            Operation::Delete(_) => Operation::Delete(len),
            Operation::Retain { attributes, .. } => Operation::Retain {
                len,
                attributes: attributes.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_splits_inserts_on_chars() {
        let ops = vec![Operation::insert("héllo"), Operation::retain(3)];
        let mut iter = OpIterator::new(&ops);

        assert_eq!(iter.take(2), Operation::insert("hé"));
        assert_eq!(iter.offset(), 2);
        assert_eq!(iter.peek_len(), 3);
        assert_eq!(iter.take(usize::MAX), Operation::insert("llo"));
        assert_eq!(iter.offset(), 0);
        assert_eq!(iter.peek_kind(), OpKind::Retain);
        assert_eq!(iter.take(10), Operation::retain(3));
        assert!(!iter.has_next());
    }

    #[test]
    fn test_exhausted_iterator_is_retain() {
        let ops = vec![Operation::delete(1)];
        let mut iter = OpIterator::new(&ops);

        assert_eq!(iter.peek_kind(), OpKind::Delete);
        assert_eq!(iter.take(5), Operation::delete(1));
        assert_eq!(iter.peek_kind(), OpKind::Retain);
        assert_eq!(iter.peek_len(), usize::MAX);
        assert_eq!(iter.take(4), Operation::retain(4));
    }
}
