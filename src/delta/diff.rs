//! Prefix/suffix diffing of plain text and of document deltas.
//!
//! Both diffs match the longest common prefix and suffix and treat everything between them
//! as replaced. This is linear and yields at most one deletion and one insertion run, which
//! is all an editor needs between two snapshots taken around a single edit.

use crate::delta::attributes;
use crate::delta::iterator::OpIterator;
use crate::delta::op::Operation;
use crate::delta::text_delta::Delta;
use crate::error::DeltaError;

/// Lengths of the common prefix and suffix of `old` and `new`, not overlapping.
fn common_affixes(old: &[char], new: &[char]) -> (usize, usize) {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    (prefix, suffix)
}

impl Delta {
    /// The delta turning `old` into `new`.
    ///
    /// Produces at most a retain of the common prefix, a delete and an insert; the common
    /// suffix is left implicit.
    pub fn diff_text(old: &str, new: &str) -> Delta {
        let old: Vec<char> = old.chars().collect();
        let new: Vec<char> = new.chars().collect();
        let (prefix, suffix) = common_affixes(&old, &new);

        let inserted: String = new[prefix..new.len() - suffix].iter().collect();
        Delta::new()
            .retain(prefix)
            .delete(old.len() - prefix - suffix)
            .insert(inserted)
            .chop()
    }

    /// The change turning document `self` into document `other`.
    ///
    /// Over the unchanged prefix and suffix only formatting differences are emitted, as
    /// retains carrying the changed keys. Both deltas must be documents.
    pub fn diff(&self, other: &Delta) -> Result<Delta, DeltaError> {
        let old: Vec<char> = self.document_text()?.chars().collect();
        let new: Vec<char> = other.document_text()?.chars().collect();
        let (prefix, suffix) = common_affixes(&old, &new);

        let mut old_iter = OpIterator::new(self.ops());
        let mut new_iter = OpIterator::new(other.ops());
        let mut delta = Delta::new();

        retain_formatting(&mut delta, &mut old_iter, &mut new_iter, prefix);

        let mut replaced = new.len() - prefix - suffix;
        while replaced > 0 {
            let op = new_iter.take(replaced);
            replaced -= op.len();
            delta.push(op);
        }

        let deleted = old.len() - prefix - suffix;
        let mut skipped = 0;
        while skipped < deleted {
            skipped += old_iter.take(deleted - skipped).len();
        }
        delta.push(Operation::Delete(deleted));

        retain_formatting(&mut delta, &mut old_iter, &mut new_iter, suffix);
        Ok(delta.chop())
    }
}

/// Walks `len` characters present in both documents, retaining them with the attribute
/// changes between the two versions.
fn retain_formatting(
    delta: &mut Delta,
    old_iter: &mut OpIterator<'_>,
    new_iter: &mut OpIterator<'_>,
    mut len: usize,
) {
    while len > 0 {
        let step = old_iter.peek_len().min(new_iter.peek_len()).min(len);
        let old_op = old_iter.take(step);
        let new_op = new_iter.take(step);
        let changes = attributes::diff(old_op.attributes(), new_op.attributes());
        delta.push(Operation::retain_with(step, changes));
        len -= step;
    }
}
