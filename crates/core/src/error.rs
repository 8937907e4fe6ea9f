//! Error types for chronodoc
//!
//! This module defines the error taxonomy shared by every layer of the store.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Classes
//!
//! - **Write-local**: `Fragmentation`, `InvalidReference`, `InvalidKey`, `InvalidPath`.
//!   Raised before any mutation, so the enclosing transaction stays usable.
//! - **Policy**: `ReferenceConflict`. The requested delete is refused and nothing changes.
//! - **Transaction**: `ReadOnlyTransaction`, `TransactionNotActive`, `TransactionConflict`.
//! - **Backend**: `Storage` carries the backend's own error untouched. The transaction
//!   that observed it must be cancelled.
//!
//! Absence is not an error: reads of missing documents return `Ok(None)`.

use crate::json::PathParseError;
use crate::key::KeyError;
use thiserror::Error;

/// Result type alias for chronodoc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chronodoc
#[derive(Debug, Error)]
pub enum Error {
    /// A JSON value cannot be split into leaf fragments
    #[error("Fragmentation error at '{path}': {reason}")]
    Fragmentation {
        /// Leaf path of the offending value
        path: String,
        /// What made the value unsupported
        reason: String,
    },

    /// Delete refused because live documents still link to the target
    #[error("Reference conflict: {entity}/{id} has {referrers} incoming link(s)")]
    ReferenceConflict {
        /// Entity of the delete target
        entity: String,
        /// Id of the delete target
        id: String,
        /// Number of distinct live referrers
        referrers: usize,
    },

    /// A reference-typed value is malformed or names a forbidden entity
    #[error("Invalid reference at '{path}': {value}")]
    InvalidReference {
        /// Schema path of the reference element
        path: String,
        /// The offending value, rendered as JSON
        value: String,
    },

    /// Namespace, entity or id failed validation
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),

    /// A navigation path could not be parsed
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] PathParseError),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Write attempted through a read-only transaction
    #[error("Transaction is read-only")]
    ReadOnlyTransaction,

    /// Transaction already committed, cancelled, or failed
    #[error("Transaction not active: {state}")]
    TransactionNotActive {
        /// Current state of the transaction
        state: String,
    },

    /// Commit lost a write-write race against another transaction
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// Backend transport or transaction error, passed through untranslated
    #[error("Storage error: {message}")]
    Storage {
        /// Human-readable summary
        message: String,
        /// Backend error, if the backend supplied one
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Stored bytes do not decode
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Configuration is missing or out of range
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Build a fragmentation error
    pub fn fragmentation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Fragmentation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build a storage error without a source
    pub fn storage(message: impl Into<String>) -> Self {
        Error::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Build a storage error wrapping the backend's error
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for delete-policy conflicts and commit races
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Error::ReferenceConflict { .. } | Error::TransactionConflict(_)
        )
    }

    /// True for errors that leave the transaction unusable
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage { .. } | Error::Corruption(_))
    }

    /// True for unsupported value shapes
    pub fn is_fragmentation(&self) -> bool {
        matches!(self, Error::Fragmentation { .. })
    }
}
