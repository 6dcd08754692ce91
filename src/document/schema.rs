//! Mapping between delta attributes and the block and mark vocabulary of a document.

use crate::delta::attributes::{AttributeMap, AttributeValue};

/// The block and mark vocabulary of a rich document.
///
/// Attributes on a line break describe the block it terminates (a heading, a list item...);
/// every other attribute is an inline mark. The projector asks the schema which is which and
/// how to convert between attribute sets and block values.
pub trait NodeSchema {
    type Block: Clone + PartialEq + std::fmt::Debug;

    /// Whether `key` formats a whole block rather than a run of text.
    fn is_block_attribute(&self, key: &str) -> bool;

    /// The block described by the block attributes of a line break, if any.
    fn block_for(&self, attributes: &AttributeMap) -> Option<Self::Block>;

    /// The attributes describing `block`.
    fn attributes_for(&self, block: &Self::Block) -> AttributeMap;

    /// Whether the document knows the inline mark `key`.
    fn supports_mark(&self, _key: &str) -> bool {
        true
    }
}

/// Block kinds understood by [`DefaultSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Block {
    Heading { level: u8 },
    BulletList,
    OrderedList,
    Blockquote,
    CodeBlock { language: Option<String> },
}

/// Headings, lists, quotes and code blocks, with the common inline marks.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSchema;

const BLOCK_KEYS: [&str; 5] = ["header", "list", "blockquote", "codeBlock", "language"];
const MARK_KEYS: [&str; 7] = ["bold", "italic", "underline", "strike", "code", "link", "color"];

impl NodeSchema for DefaultSchema {
    type Block = Block;

    fn is_block_attribute(&self, key: &str) -> bool {
        BLOCK_KEYS.contains(&key)
    }

    fn block_for(&self, attributes: &AttributeMap) -> Option<Block> {
        if let Some(level) = attributes.get("header").and_then(AttributeValue::as_u64) {
            return u8::try_from(level)
                .ok()
                .filter(|level| (1..=6).contains(level))
                .map(|level| Block::Heading { level });
        }
        match attributes.get("list").and_then(AttributeValue::as_str) {
            Some("bullet") => return Some(Block::BulletList),
            Some("ordered") => return Some(Block::OrderedList),
            _ => {}
        }
        if attributes.get("blockquote").is_some_and(AttributeValue::is_truthy) {
            return Some(Block::Blockquote);
        }
        if attributes.get("codeBlock").is_some_and(AttributeValue::is_truthy) {
            let language = attributes
                .get("language")
                .and_then(AttributeValue::as_str)
                .map(str::to_string);
            return Some(Block::CodeBlock { language });
        }
        None
    }

    fn attributes_for(&self, block: &Block) -> AttributeMap {
        let mut attributes = AttributeMap::new();
        match block {
            Block::Heading { level } => {
                attributes.insert("header".into(), u64::from(*level).into());
            }
            Block::BulletList => {
                attributes.insert("list".into(), "bullet".into());
            }
            Block::OrderedList => {
                attributes.insert("list".into(), "ordered".into());
            }
            Block::Blockquote => {
                attributes.insert("blockquote".into(), true.into());
            }
            Block::CodeBlock { language } => {
                attributes.insert("codeBlock".into(), true.into());
                if let Some(language) = language {
                    attributes.insert("language".into(), language.as_str().into());
                }
            }
        }
        attributes
    }

    fn supports_mark(&self, key: &str) -> bool {
        MARK_KEYS.contains(&key)
    }
}
