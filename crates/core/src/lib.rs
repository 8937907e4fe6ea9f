//! Core types for chronodoc
//!
//! This crate defines the vocabulary shared by the storage and engine crates:
//! - Error: Error taxonomy and `Result` alias
//! - Timestamp: Microsecond version timestamps with an order-preserving encoding
//! - DocumentKey: `(namespace, entity, id, timestamp)` identity of one version
//! - JsonPath: Navigation paths into JSON documents
//! - Range / Direction: Pagination windows over ordered key domains
//! - Specification: Read-only schema with reference discovery

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod json;
pub mod key;
pub mod range;
pub mod specification;
pub mod timestamp;

pub use error::{Error, Result};
pub use json::{JsonPath, JsonValue, PathParseError, PathSegment};
pub use key::{validate_identifier, DocumentKey, KeyError, DEFAULT_MAX_IDENTIFIER_BYTES};
pub use range::{Direction, Range};
pub use specification::{
    ElementType, JsonType, ReferencePath, Specification, SpecificationElement,
};
pub use timestamp::Timestamp;
