//! Shared fixtures for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::Once;

pub use chronodoc::{
    DeletePolicy, DocumentKey, DocumentStore, DocumentStream, Error, FlattenedDocument,
    JsonDocument, JsonValue, LeafStream, MemoryBackend, Range, Specification,
    SpecificationElement as E, StoreConfig, StoreTransaction, Timestamp, ValueType,
};
use serde_json::json;

pub const NS: &str = "ns";

pub type Store = DocumentStore<MemoryBackend>;
pub type Tx = StoreTransaction<MemoryBackend>;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output to the test harness; filter with `RUST_LOG`.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory store with test configuration (dropped transactions cancel).
pub fn store() -> Store {
    init_tracing();
    DocumentStore::new(MemoryBackend::new(), StoreConfig::for_tests())
        .expect("test config is valid")
}

/// Store with a custom fragment capacity.
pub fn store_with_capacity(capacity: usize) -> Store {
    init_tracing();
    DocumentStore::new(
        MemoryBackend::new(),
        StoreConfig::for_tests().with_fragment_capacity(capacity),
    )
    .expect("test config is valid")
}

// ============================================================================
// Specification
// ============================================================================

/// Person / Address / FunkyLongAddress schema.
pub fn specification() -> Specification {
    let address_fields = || vec![E::string("city"), E::string("state"), E::string("country")];
    Specification::with_managed(vec![
        E::managed(
            "Person",
            vec![
                E::string("firstname"),
                E::string("lastname"),
                E::number("born"),
                E::number("bornWeightKg"),
                E::boolean("isHuman"),
                E::object(
                    "history",
                    vec![
                        E::reference("currentAddress", ["Address", "FunkyLongAddress"]),
                        E::reference("workAddress", ["FunkyLongAddress", "Address"]),
                        E::array_reference("previousAddresses", ["Address", "FunkyLongAddress"]),
                    ],
                ),
            ],
        ),
        E::managed("Address", address_fields()),
        E::managed("FunkyLongAddress", address_fields()),
    ])
}

// ============================================================================
// Documents
// ============================================================================

pub fn person(firstname: &str, lastname: &str) -> JsonValue {
    json!({
        "firstname": firstname,
        "lastname": lastname,
        "born": 1998,
        "bornWeightKg": 3.82,
        "isHuman": true,
    })
}

pub fn linked_person(
    firstname: &str,
    lastname: &str,
    current_address: &str,
    work_address: &str,
    previous_addresses: &[&str],
) -> JsonValue {
    let mut person = person(firstname, lastname);
    person["history"] = json!({
        "currentAddress": current_address,
        "workAddress": work_address,
        "previousAddresses": previous_addresses,
    });
    person
}

pub fn address(city: &str, state: &str, country: &str) -> JsonValue {
    json!({ "city": city, "state": state, "country": country })
}

pub fn document(entity: &str, id: &str, timestamp: Timestamp, content: JsonValue) -> JsonDocument {
    JsonDocument::new(DocumentKey::new(NS, entity, id, timestamp), content)
}

/// UTC timestamp from calendar fields.
pub fn at(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    milli: u32,
) -> Timestamp {
    Timestamp::from_ymd_hms_milli(year, month, day, hour, minute, second, milli)
        .expect("valid calendar date")
}

/// Midnight UTC on the given day.
pub fn day(year: i32, month: u32, day: u32) -> Timestamp {
    at(year, month, day, 0, 0, 0, 0)
}

// ============================================================================
// Helpers
// ============================================================================

pub fn write(store: &Store, tx: &mut Tx, doc: JsonDocument) {
    store
        .create_or_overwrite(tx, &doc, &specification())
        .expect("write should succeed");
}

pub fn collect(stream: DocumentStream<'_>) -> Vec<JsonDocument> {
    stream.collect::<Result<Vec<_>, _>>().expect("stream should not fail")
}

pub fn ids(stream: DocumentStream<'_>) -> Vec<String> {
    collect(stream)
        .into_iter()
        .map(|d| d.key().id().to_string())
        .collect()
}

pub fn count(stream: DocumentStream<'_>) -> usize {
    collect(stream).len()
}
