//! Version history tests
//!
//! - create then read as of the version timestamp
//! - same-timestamp writes overwrite
//! - versions are kept in time order regardless of write order
//! - tombstones hide documents from as-of reads but stay in the history

use crate::common::*;
use serde_json::json;

fn oct18() -> Timestamp {
    at(2018, 10, 7, 19, 49, 26, 307)
}

// =============================================================================
// CREATE / READ
// =============================================================================

#[test]
fn test_create_then_read() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let input = document("Person", "john", oct18(), person("John", "Smith"));
    write(&store, &mut tx, input.clone());

    let output = store
        .read(&tx, oct18(), NS, "Person", "john")
        .unwrap()
        .expect("document should exist");
    assert_eq!(output, input);
}

#[test]
fn test_read_before_first_version_is_none() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    write(&store, &mut tx, document("Person", "john", oct18(), person("John", "Smith")));

    let before = Timestamp::from_micros(oct18().as_micros() - 1);
    assert!(store.read(&tx, before, NS, "Person", "john").unwrap().is_none());
    assert!(store.read(&tx, oct18(), NS, "Person", "nobody").unwrap().is_none());
}

#[test]
fn test_same_timestamp_overwrites() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    write(&store, &mut tx, document("Person", "john", oct18(), person("Jimmy", "Smith")));
    write(&store, &mut tx, document("Person", "john", oct18(), person("John", "Smith")));

    let versions = collect(
        store
            .read_all_versions(&tx, NS, "Person", "john", &Range::Unbounded)
            .unwrap(),
    );
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].content(), Some(&person("John", "Smith")));
}

#[test]
fn test_overwrite_drops_stale_fields() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    write(&store, &mut tx, document("Person", "john", oct18(), person("John", "Smith")));
    write(&store, &mut tx, document("Person", "john", oct18(), json!({"firstname": "John"})));

    let doc = store.read(&tx, oct18(), NS, "Person", "john").unwrap().unwrap();
    assert_eq!(doc.content(), Some(&json!({"firstname": "John"})));
}

#[test]
fn test_time_based_versioning() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let jan1624 = at(1624, 1, 1, 12, 0, 0, 0);
    let jan1626 = at(1626, 1, 1, 12, 0, 0, 0);
    let jan1664 = at(1664, 1, 1, 12, 0, 0, 0);

    write(&store, &mut tx, document("Address", "newyork", jan1624, address("", "NY", "USA")));
    write(
        &store,
        &mut tx,
        document("Address", "newyork", jan1664, address("New York", "NY", "USA")),
    );
    write(
        &store,
        &mut tx,
        document("Address", "newyork", jan1626, address("1a New Amsterdam", "NY", "USA")),
    );
    write(
        &store,
        &mut tx,
        document("Address", "newyork", jan1626, address("1b New Amsterdam", "NY", "USA")),
    );

    let keys: Vec<Timestamp> = collect(
        store
            .read_all_versions(&tx, NS, "Address", "newyork", &Range::Unbounded)
            .unwrap(),
    )
    .iter()
    .map(|d| d.key().timestamp())
    .collect();
    assert_eq!(keys, vec![jan1624, jan1626, jan1664]);

    let city = |t: Timestamp| {
        let doc = store.read(&tx, t, NS, "Address", "newyork").unwrap().unwrap();
        doc.content().unwrap()["city"].clone()
    };
    assert_eq!(city(day(1625, 6, 1)), json!(""));
    assert_eq!(city(day(1630, 1, 1)), json!("1b New Amsterdam"));
    assert_eq!(city(Timestamp::MAX), json!("New York"));
}

#[test]
fn test_read_all_versions_counts() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let aug92 = at(1992, 8, 1, 13, 43, 20, 301);
    let nov13 = at(2013, 11, 5, 17, 47, 24, 305);
    write(&store, &mut tx, document("Person", "john", aug92, person("John", "Smith")));
    write(&store, &mut tx, document("Person", "john", nov13, person("James", "Smith")));
    write(&store, &mut tx, document("Person", "john", oct18(), person("John", "Smith")));

    let all = store
        .read_all_versions(&tx, NS, "Person", "john", &Range::Unbounded)
        .unwrap();
    assert_eq!(count(all), 3);
}

#[test]
fn test_read_versions_between_is_inclusive() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let aug92 = at(1992, 8, 1, 13, 43, 20, 301);
    let feb10 = at(2010, 2, 3, 15, 45, 22, 303);
    let nov13 = at(2013, 11, 5, 17, 47, 24, 305);
    let sep18 = at(2018, 9, 6, 18, 48, 25, 306);
    write(&store, &mut tx, document("Person", "john", aug92, person("John", "Smith")));
    write(&store, &mut tx, document("Person", "john", nov13, person("James", "Smith")));
    write(&store, &mut tx, document("Person", "john", oct18(), person("John", "Smith")));

    let between = |lo, hi| {
        count(
            store
                .read_all_versions(&tx, NS, "Person", "john", &Range::Between(lo, hi))
                .unwrap(),
        )
    };
    assert_eq!(between(feb10, sep18), 1);
    assert_eq!(between(nov13, oct18()), 2);
    assert_eq!(between(aug92, aug92), 1);

    let windowed = store
        .read_versions(&tx, feb10, oct18(), NS, "Person", "john", &Range::Last(1))
        .unwrap();
    let windowed = collect(windowed);
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].key().timestamp(), oct18());
}

// =============================================================================
// TOMBSTONES
// =============================================================================

#[test]
fn test_delete_marker() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let jan1624 = at(1624, 1, 1, 12, 0, 0, 0);
    let jan1626 = at(1626, 1, 1, 12, 0, 0, 0);
    let feb1663 = at(1663, 2, 1, 0, 0, 0, 0);
    let jan1664 = at(1664, 1, 1, 12, 0, 0, 0);
    write(&store, &mut tx, document("Address", "newyork", jan1624, address("", "NY", "USA")));
    write(
        &store,
        &mut tx,
        document("Address", "newyork", jan1626, address("New Amsterdam", "NY", "USA")),
    );
    write(
        &store,
        &mut tx,
        document("Address", "newyork", jan1664, address("New York", "NY", "USA")),
    );

    let versions = |tx: &Tx| {
        count(
            store
                .read_all_versions(tx, NS, "Address", "newyork", &Range::Unbounded)
                .unwrap(),
        )
    };
    assert_eq!(versions(&tx), 3);

    store
        .mark_deleted(&mut tx, NS, "Address", "newyork", feb1663, DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    assert_eq!(versions(&tx), 4);
    assert!(store.read(&tx, day(1663, 6, 1), NS, "Address", "newyork").unwrap().is_none());
    assert!(store.read(&tx, day(1662, 6, 1), NS, "Address", "newyork").unwrap().is_some());
    assert!(store.read(&tx, Timestamp::MAX, NS, "Address", "newyork").unwrap().is_some());

    store
        .delete_document(
            &mut tx,
            NS,
            "Address",
            "newyork",
            feb1663,
            DeletePolicy::FailIfIncomingLinks,
        )
        .unwrap();
    assert_eq!(versions(&tx), 3);
    assert!(store.read(&tx, day(1663, 6, 1), NS, "Address", "newyork").unwrap().is_some());

    store
        .mark_deleted(&mut tx, NS, "Address", "newyork", feb1663, DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    assert_eq!(versions(&tx), 4);
}

#[test]
fn test_tombstones_surface_in_history() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    write(&store, &mut tx, document("Person", "john", day(2000, 1, 1), person("John", "Smith")));
    store
        .mark_deleted(
            &mut tx,
            NS,
            "Person",
            "john",
            day(2001, 1, 1),
            DeletePolicy::FailIfIncomingLinks,
        )
        .unwrap();

    let history = collect(
        store
            .read_all_versions(&tx, NS, "Person", "john", &Range::Unbounded)
            .unwrap(),
    );
    let deleted: Vec<bool> = history.iter().map(JsonDocument::is_deleted).collect();
    assert_eq!(deleted, vec![false, true]);
    assert!(history[1].content().is_none());
}

#[test]
fn test_delete_of_missing_document_is_noop() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    store
        .delete_all_versions(&mut tx, NS, "Address", "newyork", DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    store
        .delete_document(
            &mut tx,
            NS,
            "Address",
            "newyork",
            oct18(),
            DeletePolicy::FailIfIncomingLinks,
        )
        .unwrap();
    assert!(tx.is_active());
}

// =============================================================================
// CONTENT FIDELITY
// =============================================================================

fn people_spec(items: E) -> Specification {
    Specification::with_managed(vec![E::managed("People", vec![E::array("name", items)])])
}

#[test]
fn test_simple_array_values_are_intact() {
    let store = store();
    let spec = people_spec(E::string("items"));
    let mut tx = store.create_transaction(false).unwrap();
    let doc = json!({"name": ["John Smith", "Jane Doe"]});
    store
        .create_or_overwrite(&mut tx, &document("People", "1", oct18(), doc.clone()), &spec)
        .unwrap();

    let read = store.read(&tx, oct18(), NS, "People", "1").unwrap().unwrap();
    assert_eq!(read.content(), Some(&doc));
}

#[test]
fn test_complex_array_values_are_intact() {
    let store = store();
    let spec = people_spec(E::object("items", vec![E::string("first"), E::string("last")]));
    let mut tx = store.create_transaction(false).unwrap();
    let doc = json!({"name": [
        {"first": "John", "last": "Smith"},
        {"first": "Jane", "last": "Doe"},
    ]});
    store
        .create_or_overwrite(&mut tx, &document("People", "1", oct18(), doc.clone()), &spec)
        .unwrap();

    let read = store.read(&tx, oct18(), NS, "People", "1").unwrap().unwrap();
    assert_eq!(read.content(), Some(&doc));
}

#[test]
fn test_structural_markers_survive() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let doc = json!({
        "firstname": "",
        "history": {},
        "tags": [],
        "slots": [1, null, {"a": []}],
    });
    write(&store, &mut tx, document("Person", "odd", oct18(), doc.clone()));

    let read = store.read(&tx, oct18(), NS, "Person", "odd").unwrap().unwrap();
    assert_eq!(read.content(), Some(&doc));
}

#[test]
fn test_nested_arrays_are_rejected() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let err = store
        .create_or_overwrite(
            &mut tx,
            &document("Person", "odd", oct18(), json!({"grid": [[1, 2]]})),
            &specification(),
        )
        .unwrap_err();
    assert!(err.is_fragmentation());
    assert!(tx.is_active());
    assert!(store.read(&tx, oct18(), NS, "Person", "odd").unwrap().is_none());
}
