//! The boundary to an editable rich document, plus an in-memory implementation.

use std::fmt::Debug;

use crate::delta::attributes::{AttributeMap, AttributeValue};

/// Who caused a transaction.
///
/// Change tracking must ignore [`Origin::Remote`] transactions, otherwise applying a remote
/// change would be detected as a local edit and echoed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Remote,
}

/// One edit in document positions.
#[derive(Debug, Clone, PartialEq)]
pub enum Step<B> {
    InsertText {
        at: usize,
        text: String,
        marks: AttributeMap,
    },
    InsertBlock {
        at: usize,
        block: B,
    },
    Delete {
        from: usize,
        to: usize,
    },
    AddMark {
        from: usize,
        to: usize,
        key: String,
        value: AttributeValue,
    },
    RemoveMark {
        from: usize,
        to: usize,
        key: String,
    },
    /// Sets (or with `None`, clears) the block type of the breaks in `from..to`.
    SetBlock {
        from: usize,
        to: usize,
        block: Option<B>,
    },
}

/// An atomic batch of steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction<B> {
    pub steps: Vec<Step<B>>,
    pub origin: Origin,
    /// Whether an editor-local undo stack should record this transaction.
    pub add_to_history: bool,
}

impl<B> Transaction<B> {
    pub fn local(steps: Vec<Step<B>>) -> Self {
        Self {
            steps,
            origin: Origin::Local,
            add_to_history: true,
        }
    }

    pub fn remote(steps: Vec<Step<B>>) -> Self {
        Self {
            steps,
            origin: Origin::Remote,
            add_to_history: false,
        }
    }
}

/// A run of document content.
#[derive(Debug, Clone, PartialEq)]
pub enum Span<B> {
    Text { text: String, marks: AttributeMap },
    /// A line break ending a block, optionally typed.
    Break { block: Option<B> },
}

/// An editable document addressed by positions starting at [`RichDocument::start`].
pub trait RichDocument {
    type Block;

    /// Position of the first character.
    fn start(&self) -> usize {
        1
    }

    /// Number of addressable positions (characters and breaks).
    fn content_len(&self) -> usize;

    /// The content as text runs and breaks, in order.
    fn spans(&self) -> Vec<Span<Self::Block>>;

    fn dispatch(&mut self, transaction: Transaction<Self::Block>);
}

#[derive(Debug, Clone, PartialEq)]
enum Unit<B> {
    Char { ch: char, marks: AttributeMap },
    Break { block: Option<B> },
}

/// A flat in-memory [`RichDocument`]: characters with marks and typed line breaks.
///
/// Positions start at 1. Every dispatched transaction's origin is recorded so callers can
/// tell local edits from applied remote changes.
#[derive(Debug, Clone, PartialEq)]
pub struct RichText<B> {
    units: Vec<Unit<B>>,
    origins: Vec<Origin>,
}

impl<B> Default for RichText<B> {
    fn default() -> Self {
        Self {
            units: Vec::new(),
            origins: Vec::new(),
        }
    }
}

impl<B: Clone + PartialEq + Debug> RichText<B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain text content; `\n` becomes an untyped break.
    pub fn from_text(text: &str) -> Self {
        Self {
            units: text_units(text, &AttributeMap::new()),
            origins: Vec::new(),
        }
    }

    /// Content as plain text with breaks rendered as `\n`.
    pub fn text(&self) -> String {
        self.units
            .iter()
            .map(|unit| match unit {
                Unit::Char { ch, .. } => *ch,
                Unit::Break { .. } => '\n',
            })
            .collect()
    }

    /// Marks of the character at `position`.
    pub fn marks_at(&self, position: usize) -> Option<&AttributeMap> {
        match self.units.get(position.checked_sub(1)?)? {
            Unit::Char { marks, .. } => Some(marks),
            Unit::Break { .. } => None,
        }
    }

    /// Block type of the break at `position`.
    pub fn block_at(&self, position: usize) -> Option<&B> {
        match self.units.get(position.checked_sub(1)?)? {
            Unit::Break { block } => block.as_ref(),
            Unit::Char { .. } => None,
        }
    }

    /// Origins of all dispatched transactions, oldest first.
    pub fn origins(&self) -> &[Origin] {
        &self.origins
    }

    /// Types `text` at `position` as a local edit.
    pub fn insert_text(&mut self, position: usize, text: &str) {
        self.dispatch(Transaction::local(vec![Step::InsertText {
            at: position,
            text: text.to_string(),
            marks: AttributeMap::new(),
        }]));
    }

    /// Removes `from..to` as a local edit.
    pub fn delete_range(&mut self, from: usize, to: usize) {
        self.dispatch(Transaction::local(vec![Step::Delete { from, to }]));
    }

    /// Applies a mark to `from..to` as a local edit.
    pub fn add_mark(&mut self, from: usize, to: usize, key: &str, value: AttributeValue) {
        self.dispatch(Transaction::local(vec![Step::AddMark {
            from,
            to,
            key: key.to_string(),
            value,
        }]));
    }

    /// Types the break at `position` as a local edit.
    pub fn set_block(&mut self, position: usize, block: Option<B>) {
        self.dispatch(Transaction::local(vec![Step::SetBlock {
            from: position,
            to: position + 1,
            block,
        }]));
    }

    /// Converts a 1-based position range into clamped unit indices.
    fn range(&self, from: usize, to: usize) -> std::ops::Range<usize> {
        let len = self.units.len();
        let start = from.saturating_sub(1).min(len);
        let end = to.saturating_sub(1).clamp(start, len);
        start..end
    }

    fn apply_step(&mut self, step: Step<B>) {
        match step {
            Step::InsertText { at, text, marks } => {
                let index = self.range(at, at).start;
                self.units.splice(index..index, text_units(&text, &marks));
            }
            Step::InsertBlock { at, block } => {
                let index = self.range(at, at).start;
                self.units.insert(index, Unit::Break { block: Some(block) });
            }
            Step::Delete { from, to } => {
                let range = self.range(from, to);
                self.units.drain(range);
            }
            Step::AddMark {
                from,
                to,
                key,
                value,
            } => {
                let range = self.range(from, to);
                for unit in &mut self.units[range] {
                    if let Unit::Char { marks, .. } = unit {
                        marks.insert(key.clone(), value.clone());
                    }
                }
            }
            Step::RemoveMark { from, to, key } => {
                let range = self.range(from, to);
                for unit in &mut self.units[range] {
                    if let Unit::Char { marks, .. } = unit {
                        marks.remove(&key);
                    }
                }
            }
            Step::SetBlock { from, to, block } => {
                let range = self.range(from, to);
                for unit in &mut self.units[range] {
                    if let Unit::Break { block: current } = unit {
                        *current = block.clone();
                    }
                }
            }
        }
    }
}

fn text_units<B>(text: &str, marks: &AttributeMap) -> Vec<Unit<B>> {
    text.chars()
        .map(|ch| match ch {
            '\n' => Unit::Break { block: None },
            ch => Unit::Char {
                ch,
                marks: marks.clone(),
            },
        })
        .collect()
}

impl<B: Clone + PartialEq + Debug> RichDocument for RichText<B> {
    type Block = B;

    fn content_len(&self) -> usize {
        self.units.len()
    }

    fn spans(&self) -> Vec<Span<B>> {
        let mut spans: Vec<Span<B>> = Vec::new();
        for unit in &self.units {
            match unit {
                Unit::Char { ch, marks } => {
                    if let Some(Span::Text { text, marks: run }) = spans.last_mut() {
                        if run == marks {
                            text.push(*ch);
                            continue;
                        }
                    }
                    spans.push(Span::Text {
                        text: ch.to_string(),
                        marks: marks.clone(),
                    });
                }
                Unit::Break { block } => spans.push(Span::Break {
                    block: block.clone(),
                }),
            }
        }
        spans
    }

    fn dispatch(&mut self, transaction: Transaction<B>) {
        for step in transaction.steps {
            self.apply_step(step);
        }
        self.origins.push(transaction.origin);
    }
}
