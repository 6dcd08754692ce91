//! The three primitive edits a delta is made of.

use serde::{Deserialize, Serialize};

use crate::delta::attributes::AttributeMap;
use crate::error::DeltaError;

static NO_ATTRIBUTES: AttributeMap = AttributeMap::new();

/// Which kind of edit an [`Operation`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Insert,
    Delete,
    Retain,
}

/// A single edit. Lengths count Unicode scalar values.
///
/// On the wire an operation is `{"insert": "text"}`, `{"delete": n}` or `{"retain": n}`,
/// the first and last optionally carrying `"attributes"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireOperation", into = "WireOperation")]
pub enum Operation {
    Insert {
        text: String,
        attributes: AttributeMap,
    },
    Delete(usize),
    Retain {
        len: usize,
        attributes: AttributeMap,
    },
}

impl Operation {
    pub fn insert(text: impl Into<String>) -> Self {
        Self::insert_with(text, AttributeMap::new())
    }

    pub fn insert_with(text: impl Into<String>, attributes: AttributeMap) -> Self {
        Operation::Insert {
            text: text.into(),
            attributes,
        }
    }

    pub fn delete(len: usize) -> Self {
        Operation::Delete(len)
    }

    pub fn retain(len: usize) -> Self {
        Self::retain_with(len, AttributeMap::new())
    }

    pub fn retain_with(len: usize, attributes: AttributeMap) -> Self {
        Operation::Retain { len, attributes }
    }

    pub fn kind(&self) -> OpKind {
        match self {
            Operation::Insert { .. } => OpKind::Insert,
            Operation::Delete(_) => OpKind::Delete,
            Operation::Retain { .. } => OpKind::Retain,
        }
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        match self {
            Operation::Insert { text, .. } => text.chars().count(),
            Operation::Delete(len) | Operation::Retain { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Operation::Insert { text, .. } => text.is_empty(),
            Operation::Delete(len) | Operation::Retain { len, .. } => *len == 0,
        }
    }

    /// Attributes of an insert or retain; deletes have none.
    pub fn attributes(&self) -> &AttributeMap {
        match self {
            Operation::Insert { attributes, .. } | Operation::Retain { attributes, .. } => {
                attributes
            }
            Operation::Delete(_) => &NO_ATTRIBUTES,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, Operation::Insert { .. })
    }
}

/// Loose wire shape, validated into an [`Operation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WireOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    insert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delete: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    retain: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<AttributeMap>,
}

fn wire_len(field: &str, value: i64) -> Result<usize, DeltaError> {
    usize::try_from(value)
        .map_err(|_| DeltaError::MalformedOperation(format!("negative {field} length {value}")))
}

impl TryFrom<WireOperation> for Operation {
    type Error = DeltaError;

    fn try_from(wire: WireOperation) -> Result<Self, Self::Error> {
        let attributes = wire.attributes.unwrap_or_default();
        match (wire.insert, wire.delete, wire.retain) {
            (Some(text), None, None) => Ok(Operation::Insert { text, attributes }),
            (None, Some(len), None) => {
                if !attributes.is_empty() {
                    return Err(DeltaError::MalformedOperation(
                        "delete cannot carry attributes".to_string(),
                    ));
                }
                Ok(Operation::Delete(wire_len("delete", len)?))
            }
            (None, None, Some(len)) => Ok(Operation::Retain {
                len: wire_len("retain", len)?,
                attributes,
            }),
            (None, None, None) => Err(DeltaError::MalformedOperation(
                "operation has no insert, delete or retain".to_string(),
            )),
            _ => Err(DeltaError::MalformedOperation(
                "operation sets more than one of insert, delete, retain".to_string(),
            )),
        }
    }
}

impl From<Operation> for WireOperation {
    fn from(op: Operation) -> Self {
        let some_attributes = |attributes: AttributeMap| (!attributes.is_empty()).then_some(attributes);
        match op {
            Operation::Insert { text, attributes } => WireOperation {
                insert: Some(text),
                attributes: some_attributes(attributes),
                ..Default::default()
            },
            Operation::Delete(len) => WireOperation {
                delete: Some(len as i64),
                ..Default::default()
            },
            Operation::Retain { len, attributes } => WireOperation {
                retain: Some(len as i64),
                attributes: some_attributes(attributes),
                ..Default::default()
            },
        }
    }
}
