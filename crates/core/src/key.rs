//! Document keys and identifier validation
//!
//! A [`DocumentKey`] names exactly one version of one document instance:
//! `(namespace, entity, id, timestamp)`.
//!
//! ## Identifier rules
//!
//! Namespace, entity and id strings are validated before they reach storage:
//! - must not be empty
//! - must not contain NUL bytes (`\0`), which terminate key components on disk
//! - must not exceed the configured byte limit (default: 1024)

use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Default maximum identifier length in bytes
pub const DEFAULT_MAX_IDENTIFIER_BYTES: usize = 1024;

/// Identifier validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Identifier is empty (length 0)
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Identifier contains NUL byte (\0)
    #[error("{0} cannot contain NUL bytes")]
    ContainsNul(&'static str),

    /// Identifier exceeds maximum length
    #[error("{what} too long: {actual} bytes exceeds maximum {max}")]
    TooLong {
        /// Which identifier failed
        what: &'static str,
        /// Actual length in bytes
        actual: usize,
        /// Maximum allowed length
        max: usize,
    },
}

impl KeyError {
    /// Get a stable reason code
    pub fn reason_code(&self) -> &'static str {
        match self {
            KeyError::Empty(_) => "empty_identifier",
            KeyError::ContainsNul(_) => "contains_nul",
            KeyError::TooLong { .. } => "identifier_too_long",
        }
    }
}

/// Validate one identifier component
///
/// `what` names the component in error messages ("namespace", "entity", "id", "path").
pub fn validate_identifier(
    what: &'static str,
    value: &str,
    max_bytes: usize,
) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::Empty(what));
    }
    if value.contains('\x00') {
        return Err(KeyError::ContainsNul(what));
    }
    if value.len() > max_bytes {
        return Err(KeyError::TooLong {
            what,
            actual: value.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

/// Identity of one document version
///
/// Ordered by `(namespace, entity, id)` first, then by `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentKey {
    namespace: String,
    entity: String,
    id: String,
    timestamp: Timestamp,
}

impl DocumentKey {
    /// Create a key
    pub fn new(
        namespace: impl Into<String>,
        entity: impl Into<String>,
        id: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        DocumentKey {
            namespace: namespace.into(),
            entity: entity.into(),
            id: id.into(),
            timestamp,
        }
    }

    /// Namespace the document lives in
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Entity (managed domain) name
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Document id within the entity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Version timestamp
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Same identity at a different timestamp
    pub fn at(&self, timestamp: Timestamp) -> Self {
        DocumentKey {
            timestamp,
            ..self.clone()
        }
    }

    /// Validate namespace, entity and id against `max_bytes`
    pub fn validate(&self, max_bytes: usize) -> Result<(), KeyError> {
        validate_identifier("namespace", &self.namespace, max_bytes)?;
        validate_identifier("entity", &self.entity, max_bytes)?;
        validate_identifier("id", &self.id, max_bytes)
    }
}

impl Ord for DocumentKey {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.namespace, &self.entity, &self.id, self.timestamp).cmp(&(
            &other.namespace,
            &other.entity,
            &other.id,
            other.timestamp,
        ))
    }
}

impl PartialOrd for DocumentKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.namespace, self.entity, self.id, self.timestamp
        )
    }
}
