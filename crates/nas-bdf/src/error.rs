//! Error types for nas-bdf

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Key identifying a card inside its category (numeric ID or label).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum EntityKey {
    Id(i32),
    Label(String),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Id(id) => write!(f, "{id}"),
            EntityKey::Label(label) => f.write_str(label),
        }
    }
}

/// Card name plus key, enough to find the entity again in its collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityRef {
    pub card: &'static str,
    pub key: EntityKey,
}

impl EntityRef {
    pub fn new(card: &'static str, id: i32) -> Self {
        Self {
            card,
            key: EntityKey::Id(id),
        }
    }

    pub fn labelled(card: &'static str, label: impl Into<String>) -> Self {
        Self {
            card,
            key: EntityKey::Label(label.into()),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.card, self.key)
    }
}

/// Failure to resolve the references of a single entity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("{entity} references missing {target} {id}")]
    MissingReference {
        entity: EntityRef,
        target: &'static str,
        id: i32,
    },

    #[error("{entity} references missing {target} '{label}'")]
    MissingLabel {
        entity: EntityRef,
        target: &'static str,
        label: String,
    },

    #[error("{entity}: {field} must be {expected}, found {found}")]
    TypeMismatch {
        entity: EntityRef,
        field: &'static str,
        expected: String,
        found: &'static str,
    },

    #[error("{entity} is malformed: {message}")]
    Malformed { entity: EntityRef, message: String },

    #[error("coordinate system cycle: {}", format_chain(.chain))]
    CoordinateCycle { chain: Vec<i32> },

    #[error("{entity} has degenerate geometry: {message}")]
    DegenerateGeometry { entity: EntityRef, message: String },
}

impl StructuralError {
    pub fn malformed(entity: EntityRef, message: impl Into<String>) -> Self {
        StructuralError::Malformed {
            entity,
            message: message.into(),
        }
    }

    pub fn missing(entity: EntityRef, target: &'static str, id: i32) -> Self {
        StructuralError::MissingReference { entity, target, id }
    }
}

fn format_chain(chain: &[i32]) -> String {
    chain
        .iter()
        .map(|cid| cid.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Model construction and loading errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("duplicate {card} id {id}")]
    DuplicateId { card: &'static str, id: i32 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_chain() {
        let err = StructuralError::CoordinateCycle {
            chain: vec![1, 2, 1],
        };
        assert_eq!(err.to_string(), "coordinate system cycle: 1 -> 2 -> 1");
    }

    #[test]
    fn entity_ref_display() {
        assert_eq!(EntityRef::new("CQUAD4", 12).to_string(), "CQUAD4 12");
        assert_eq!(EntityRef::labelled("AECOMP", "WING").to_string(), "AECOMP WING");
    }
}
