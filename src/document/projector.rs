//! Translation between deltas and document transactions.

use std::collections::BTreeMap;

use tracing::debug;

use crate::delta::attributes::AttributeMap;
use crate::delta::{Delta, Operation};
use crate::document::model::{RichDocument, Span, Step, Transaction};
use crate::document::schema::NodeSchema;
use crate::error::DeltaError;

/// Projects deltas onto a [`RichDocument`] and reads documents back as deltas.
#[derive(Debug, Clone, Default)]
pub struct DocumentProjector<S> {
    schema: S,
}

impl<S: NodeSchema> DocumentProjector<S> {
    pub fn new(schema: S) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    /// The whole document as an insert-only delta.
    ///
    /// Text runs become inserts carrying their supported marks; breaks become `"\n"` inserts
    /// carrying their block's attributes.
    pub fn snapshot<D>(&self, doc: &D) -> Delta
    where
        D: RichDocument<Block = S::Block>,
    {
        let mut delta = Delta::new();
        for span in doc.spans() {
            match span {
                Span::Text { text, marks } => {
                    let marks = marks
                        .into_iter()
                        .filter(|(key, _)| self.schema.supports_mark(key))
                        .collect();
                    delta.push(Operation::insert_with(text, marks));
                }
                Span::Break { block } => {
                    let attributes = block
                        .map(|block| self.schema.attributes_for(&block))
                        .unwrap_or_default();
                    delta.push(Operation::insert_with("\n", attributes));
                }
            }
        }
        delta
    }

    /// The delta turning `before` into `after`.
    pub fn diff<D>(&self, before: &D, after: &D) -> Result<Delta, DeltaError>
    where
        D: RichDocument<Block = S::Block>,
    {
        self.snapshot(before).diff(&self.snapshot(after))
    }

    /// Applies `delta` to `doc` as one remote-origin transaction.
    ///
    /// Retains and deletes reaching past the end of the document are clamped to it. Returns
    /// the number of steps dispatched; nothing is dispatched for a no-op delta.
    pub fn apply<D>(&self, doc: &mut D, delta: &Delta) -> usize
    where
        D: RichDocument<Block = S::Block>,
    {
        let breaks = breaks(doc);
        let mut offset = doc.start();
        let mut end = offset + doc.content_len();
        // Index into the document as it was before this delta.
        let mut source: usize = 0;
        let mut steps = Vec::new();

        for op in delta.ops() {
            match op {
                Operation::Retain { len, attributes } => {
                    let len = (*len).min(end - offset);
                    if !attributes.is_empty() && len > 0 {
                        let covered = breaks
                            .range(source..source + len)
                            .map(|(index, block)| (offset + index - source, block));
                        self.format_steps(&mut steps, offset, offset + len, attributes, covered);
                    }
                    offset += len;
                    source += len;
                }
                Operation::Insert { text, attributes } => {
                    let len = op.len();
                    match self.schema.block_for(attributes) {
                        Some(block) => {
                            self.insert_lines(&mut steps, offset, text, attributes, &block)
                        }
                        None => steps.push(Step::InsertText {
                            at: offset,
                            text: text.clone(),
                            marks: self.inline_marks(attributes),
                        }),
                    }
                    offset += len;
                    end += len;
                }
                Operation::Delete(len) => {
                    let len = (*len).min(end - offset);
                    if len > 0 {
                        steps.push(Step::Delete {
                            from: offset,
                            to: offset + len,
                        });
                        end -= len;
                        source += len;
                    }
                }
            }
        }

        let dispatched = steps.len();
        if dispatched > 0 {
            debug!(steps = dispatched, "applying delta to document");
            doc.dispatch(Transaction::remote(steps));
        }
        dispatched
    }

    /// Marks to set on inserted text: supported, non-block and not a removal.
    fn inline_marks(&self, attributes: &AttributeMap) -> AttributeMap {
        attributes
            .iter()
            .filter(|(key, value)| {
                value.is_truthy()
                    && !self.schema.is_block_attribute(key)
                    && self.schema.supports_mark(key)
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Inserts `text` whose line breaks all end `block`, with the runs between them as text.
    fn insert_lines(
        &self,
        steps: &mut Vec<Step<S::Block>>,
        at: usize,
        text: &str,
        attributes: &AttributeMap,
        block: &S::Block,
    ) {
        let marks = self.inline_marks(attributes);
        let mut at = at;
        for (line, run) in text.split('\n').enumerate() {
            if line > 0 {
                steps.push(Step::InsertBlock {
                    at,
                    block: block.clone(),
                });
                at += 1;
            }
            if !run.is_empty() {
                steps.push(Step::InsertText {
                    at,
                    text: run.to_string(),
                    marks: marks.clone(),
                });
                at += run.chars().count();
            }
        }
    }

    /// Formats `from..to`. Block keys are merged over the current block of each break in
    /// `covered`, given as `(position, block)`.
    fn format_steps<'a>(
        &self,
        steps: &mut Vec<Step<S::Block>>,
        from: usize,
        to: usize,
        attributes: &AttributeMap,
        covered: impl Iterator<Item = (usize, &'a Option<S::Block>)>,
    ) where
        S::Block: 'a,
    {
        let mut block_attributes = AttributeMap::new();
        for (key, value) in attributes {
            if self.schema.is_block_attribute(key) {
                block_attributes.insert(key.clone(), value.clone());
            } else if !self.schema.supports_mark(key) {
                debug!(mark = %key, "skipping unsupported mark");
            } else if value.is_truthy() {
                steps.push(Step::AddMark {
                    from,
                    to,
                    key: key.clone(),
                    value: value.clone(),
                });
            } else {
                steps.push(Step::RemoveMark {
                    from,
                    to,
                    key: key.clone(),
                });
            }
        }

        if block_attributes.is_empty() {
            return;
        }
        for (at, current) in covered {
            let mut merged = current
                .as_ref()
                .map(|block| self.schema.attributes_for(block))
                .unwrap_or_default();
            for (key, value) in &block_attributes {
                if value.is_truthy() {
                    merged.insert(key.clone(), value.clone());
                } else {
                    merged.remove(key);
                }
            }

            match self.schema.block_for(&merged) {
                Some(block) => steps.push(Step::SetBlock {
                    from: at,
                    to: at + 1,
                    block: Some(block),
                }),
                None if merged.is_empty() => steps.push(Step::SetBlock {
                    from: at,
                    to: at + 1,
                    block: None,
                }),
                None => debug!(position = at, "block attributes describe no known block"),
            }
        }
    }
}

/// The document's breaks and their blocks, keyed by index from the document start.
fn breaks<D: RichDocument>(doc: &D) -> BTreeMap<usize, Option<D::Block>> {
    let mut breaks = BTreeMap::new();
    let mut index = 0;
    for span in doc.spans() {
        match span {
            Span::Text { text, .. } => index += text.chars().count(),
            Span::Break { block } => {
                breaks.insert(index, block);
                index += 1;
            }
        }
    }
    breaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::attributes::{AttributeValue, attributes};
    use crate::document::model::{Origin, RichText};
    use crate::document::schema::{Block, DefaultSchema};

    fn projector() -> DocumentProjector<DefaultSchema> {
        DocumentProjector::new(DefaultSchema)
    }

    #[test]
    fn test_apply_insert_and_delete() {
        let mut doc = RichText::from_text("hello");
        let delta = Delta::new().retain(1).delete(3).insert("ipp");

        projector().apply(&mut doc, &delta);
        assert_eq!(doc.text(), "hippo");
        assert_eq!(doc.origins(), &[Origin::Remote]);
    }

    #[test]
    fn test_apply_clamps_past_end() {
        let mut doc = RichText::from_text("abc");
        let delta = Delta::new().retain(10).insert("!").delete(7);

        projector().apply(&mut doc, &delta);
        assert_eq!(doc.text(), "abc!");
    }

    #[test]
    fn test_apply_formatting() {
        let mut doc = RichText::from_text("abcd");
        doc.add_mark(1, 3, "italic", true.into());

        let delta = Delta::new().retain(1).retain_with(
            2,
            attributes([("bold", AttributeValue::from(true)), ("italic", AttributeValue::Null)]),
        );
        projector().apply(&mut doc, &delta);

        assert_eq!(doc.marks_at(1), Some(&attributes([("italic", true)])));
        assert_eq!(doc.marks_at(2), Some(&attributes([("bold", true)])));
        assert_eq!(doc.marks_at(4), Some(&AttributeMap::new()));
    }

    #[test]
    fn test_apply_blocks() {
        let mut doc = RichText::from_text("title\nbody");
        let delta = Delta::new()
            .retain(5)
            .retain_with(1, attributes([("header", 1u64)]))
            .retain(4)
            .insert_with("\n", attributes([("list", "bullet")]));

        projector().apply(&mut doc, &delta);
        assert_eq!(doc.block_at(6), Some(&Block::Heading { level: 1 }));
        assert_eq!(doc.block_at(11), Some(&Block::BulletList));

        let clear = Delta::new()
            .retain(5)
            .retain_with(1, attributes([("header", AttributeValue::Null)]));
        projector().apply(&mut doc, &clear);
        assert_eq!(doc.block_at(6), None);
    }

    #[test]
    fn test_apply_consecutive_typed_breaks() {
        let before = RichText::<Block>::from_text("a");
        let mut after = before.clone();
        after.insert_text(2, "\n\n");
        after.set_block(2, Some(Block::Blockquote));
        after.set_block(3, Some(Block::Blockquote));

        let change = projector().diff(&before, &after).unwrap();
        assert_eq!(
            change,
            Delta::new()
                .retain(1)
                .insert_with("\n\n", attributes([("blockquote", true)]))
        );

        let mut replica = before.clone();
        projector().apply(&mut replica, &change);
        assert_eq!(replica.block_at(2), Some(&Block::Blockquote));
        assert_eq!(replica.block_at(3), Some(&Block::Blockquote));
        assert_eq!(projector().snapshot(&replica), projector().snapshot(&after));
    }

    #[test]
    fn test_apply_lines_ending_in_blocks() {
        let mut doc = RichText::<Block>::new();
        let delta = Delta::new().insert_with("x\ny\n", attributes([("header", 2u64)]));

        projector().apply(&mut doc, &delta);
        assert_eq!(doc.text(), "x\ny\n");
        assert_eq!(doc.marks_at(1), Some(&AttributeMap::new()));
        assert_eq!(doc.block_at(2), Some(&Block::Heading { level: 2 }));
        assert_eq!(doc.block_at(4), Some(&Block::Heading { level: 2 }));
    }

    #[test]
    fn test_apply_partial_block_change() {
        let mut before = RichText::from_text("fn main\n");
        before.set_block(
            8,
            Some(Block::CodeBlock {
                language: Some("rust".to_string()),
            }),
        );
        let mut after = before.clone();
        after.set_block(
            8,
            Some(Block::CodeBlock {
                language: Some("python".to_string()),
            }),
        );

        let change = projector().diff(&before, &after).unwrap();
        let mut replica = before.clone();
        projector().apply(&mut replica, &change);

        assert_eq!(
            replica.block_at(8),
            Some(&Block::CodeBlock {
                language: Some("python".to_string())
            })
        );
        assert_eq!(projector().snapshot(&replica), projector().snapshot(&after));

        // Keys of a different block on their own describe nothing and leave the break alone.
        let stray = Delta::new()
            .retain(7)
            .retain_with(1, attributes([("language", "go")]));
        let mut plain = RichText::<Block>::from_text("fn main\n");
        projector().apply(&mut plain, &stray);
        assert_eq!(plain.block_at(8), None);
    }

    #[test]
    fn test_no_op_delta_dispatches_nothing() {
        let mut doc = RichText::<Block>::from_text("abc");
        assert_eq!(projector().apply(&mut doc, &Delta::new().retain(2)), 0);
        assert!(doc.origins().is_empty());
    }

    #[test]
    fn test_snapshot_and_diff() {
        let mut doc = RichText::from_text("ab\n");
        doc.add_mark(2, 3, "bold", true.into());
        doc.set_block(3, Some(Block::Blockquote));

        let snapshot = projector().snapshot(&doc);
        assert_eq!(
            snapshot,
            Delta::new()
                .insert("a")
                .insert_with("b", attributes([("bold", true)]))
                .insert_with("\n", attributes([("blockquote", true)]))
        );

        let before = doc.clone();
        doc.insert_text(2, "x");
        let change = projector().diff(&before, &doc).unwrap();
        assert_eq!(change, Delta::new().retain(1).insert("x"));
    }

    #[test]
    fn test_diff_then_apply_reproduces_edit() {
        let before = RichText::<Block>::from_text("shared text");
        let mut after = before.clone();
        after.delete_range(1, 8);
        after.insert_text(1, "plain ");
        after.add_mark(1, 6, "underline", true.into());

        let change = projector().diff(&before, &after).unwrap();
        let mut replica = before.clone();
        projector().apply(&mut replica, &change);

        assert_eq!(projector().snapshot(&replica), projector().snapshot(&after));
    }
}
