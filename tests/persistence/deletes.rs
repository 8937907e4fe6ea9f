//! Delete policy tests
//!
//! - `FailIfIncomingLinks` refuses while live documents link to the target
//! - `CascadeDeleteAllIncomingLinksAndNodes` takes the referrers along
//! - `delete_all_entities` ignores policies

use crate::common::*;

struct World {
    timestamp: Timestamp,
    paris: JsonDocument,
    london: JsonDocument,
    oslo: JsonDocument,
    trondheim: JsonDocument,
    jack: JsonDocument,
    jill: JsonDocument,
}

impl World {
    fn new() -> Self {
        let timestamp = day(2019, 1, 1);
        World {
            timestamp,
            paris: document("Address", "paris", timestamp, address("Paris", "", "France")),
            london: document("Address", "london", timestamp, address("London", "", "England")),
            oslo: document("Address", "oslo", timestamp, address("Oslo", "", "Norway")),
            trondheim: document(
                "FunkyLongAddress",
                "trondheim",
                timestamp,
                address("Trondheim", "", "Norway"),
            ),
            jack: document(
                "Person",
                "jack",
                timestamp,
                linked_person(
                    "Jack",
                    "Smith",
                    "/Address/oslo",
                    "/Address/oslo",
                    &["/Address/london", "/Address/paris"],
                ),
            ),
            jill: document(
                "Person",
                "jill",
                timestamp,
                linked_person(
                    "Jill",
                    "Smith",
                    "/Address/oslo",
                    "/FunkyLongAddress/trondheim",
                    &["/Address/london", "/FunkyLongAddress/trondheim"],
                ),
            ),
        }
    }

    fn all(&self) -> [&JsonDocument; 6] {
        [&self.paris, &self.london, &self.oslo, &self.trondheim, &self.jack, &self.jill]
    }

    fn populate(&self, store: &Store, tx: &mut Tx) {
        let written = store
            .create_or_overwrite_all(tx, self.all(), &specification())
            .unwrap();
        assert_eq!(written, 6);
    }
}

fn read(store: &Store, tx: &Tx, t: Timestamp, entity: &str, id: &str) -> Option<JsonDocument> {
    store.read(tx, t, NS, entity, id).unwrap()
}

// =============================================================================
// BATCH / ROUND TRIP
// =============================================================================

#[test]
fn test_batch_creation() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);

    for doc in world.all() {
        let key = doc.key();
        let stored = read(&store, &tx, world.timestamp, key.entity(), key.id());
        assert_eq!(stored.as_ref(), Some(doc), "{}", key);
    }
}

#[test]
fn test_batch_stops_at_first_failure() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let t = day(2019, 1, 1);
    let good = document("Address", "oslo", t, address("Oslo", "", "Norway"));
    let bad = document(
        "Person",
        "jack",
        t,
        linked_person("Jack", "Smith", "/Person/jill", "/Address/oslo", &[]),
    );
    let never = document("Address", "paris", t, address("Paris", "", "France"));

    let err = store
        .create_or_overwrite_all(&mut tx, [&good, &bad, &never], &specification())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidReference { .. }));
    assert!(read(&store, &tx, t, "Address", "oslo").is_some());
    assert!(read(&store, &tx, t, "Address", "paris").is_none());
}

// =============================================================================
// FAIL POLICY
// =============================================================================

#[test]
fn test_delete_all_with_incoming_ref() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);

    store
        .delete_all_versions(&mut tx, NS, "Person", "jack", DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    store.delete_all_entities(&mut tx, NS, "Address", &specification()).unwrap();

    let t = world.timestamp;
    assert!(read(&store, &tx, t, "Address", "paris").is_none());
    assert!(read(&store, &tx, t, "Address", "london").is_none());
    assert!(read(&store, &tx, t, "Address", "oslo").is_none());
    assert!(read(&store, &tx, t, "Person", "jack").is_none());
    assert_eq!(read(&store, &tx, t, "Person", "jill"), Some(world.jill.clone()));
}

#[test]
fn test_fail_policy_refuses_and_keeps_state() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);
    let t = world.timestamp;

    let err = store
        .delete_all_versions(&mut tx, NS, "Address", "oslo", DeletePolicy::FailIfIncomingLinks)
        .unwrap_err();
    match err {
        Error::ReferenceConflict { entity, id, referrers } => {
            assert_eq!((entity.as_str(), id.as_str(), referrers), ("Address", "oslo", 2));
        }
        other => panic!("expected ReferenceConflict, got {:?}", other),
    }
    assert!(tx.is_active());

    let err = store
        .mark_deleted(
            &mut tx,
            NS,
            "Address",
            "london",
            day(2019, 6, 1),
            DeletePolicy::FailIfIncomingLinks,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ReferenceConflict { .. }));
    let err = store
        .delete_document(
            &mut tx,
            NS,
            "FunkyLongAddress",
            "trondheim",
            t,
            DeletePolicy::FailIfIncomingLinks,
        )
        .unwrap_err();
    assert!(matches!(err, Error::ReferenceConflict { referrers: 1, .. }));

    for doc in world.all() {
        let key = doc.key();
        assert!(read(&store, &tx, Timestamp::MAX, key.entity(), key.id()).is_some(), "{}", key);
    }
    let history = store
        .read_all_versions(&tx, NS, "Address", "london", &Range::Unbounded)
        .unwrap();
    assert_eq!(count(history), 1);
}

#[test]
fn test_deleted_referrer_no_longer_blocks() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);
    let later = day(2019, 6, 1);

    store
        .mark_deleted(&mut tx, NS, "Person", "jack", later, DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    // jill still lives at oslo
    assert!(store
        .delete_all_versions(&mut tx, NS, "Address", "oslo", DeletePolicy::FailIfIncomingLinks)
        .is_err());

    store
        .mark_deleted(&mut tx, NS, "Person", "jill", later, DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    store
        .delete_all_versions(&mut tx, NS, "Address", "oslo", DeletePolicy::FailIfIncomingLinks)
        .unwrap();
}

#[test]
fn test_delete_all_versions() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    for (year, city) in [(1624, ""), (1626, "New Amsterdam"), (1664, "New York")] {
        let t = at(year, 1, 1, 12, 0, 0, 0);
        write(&store, &mut tx, document("Address", "newyork", t, address(city, "NY", "USA")));
    }
    let versions = |tx: &Tx| {
        count(store.read_all_versions(tx, NS, "Address", "newyork", &Range::Unbounded).unwrap())
    };
    assert_eq!(versions(&tx), 3);

    store
        .delete_all_versions(&mut tx, NS, "Address", "newyork", DeletePolicy::FailIfIncomingLinks)
        .unwrap();
    assert_eq!(versions(&tx), 0);
}

// =============================================================================
// CASCADE POLICY
// =============================================================================

#[test]
fn test_cascade_delete_all_versions() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);

    store
        .delete_all_versions(
            &mut tx,
            NS,
            "Address",
            "oslo",
            DeletePolicy::CascadeDeleteAllIncomingLinksAndNodes,
        )
        .unwrap();

    let t = Timestamp::MAX;
    assert!(read(&store, &tx, t, "Address", "oslo").is_none());
    assert!(read(&store, &tx, t, "Person", "jack").is_none());
    assert!(read(&store, &tx, t, "Person", "jill").is_none());
    let history = store
        .read_all_versions(&tx, NS, "Person", "jack", &Range::Unbounded)
        .unwrap();
    assert_eq!(count(history), 0);

    let survivors = [
        ("Address", "paris"),
        ("Address", "london"),
        ("FunkyLongAddress", "trondheim"),
    ];
    for (entity, id) in survivors {
        assert!(read(&store, &tx, t, entity, id).is_some(), "{} should survive", id);
    }
    // the persons' links went with them
    store
        .delete_all_versions(&mut tx, NS, "Address", "london", DeletePolicy::FailIfIncomingLinks)
        .unwrap();
}

#[test]
fn test_cascade_mark_deleted_keeps_history() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);
    let later = day(2019, 6, 1);

    store
        .mark_deleted(
            &mut tx,
            NS,
            "FunkyLongAddress",
            "trondheim",
            later,
            DeletePolicy::CascadeDeleteAllIncomingLinksAndNodes,
        )
        .unwrap();

    assert!(read(&store, &tx, later, "Person", "jill").is_none());
    assert_eq!(read(&store, &tx, world.timestamp, "Person", "jill"), Some(world.jill.clone()));
    assert!(read(&store, &tx, later, "Person", "jack").is_some());

    let history = collect(
        store
            .read_all_versions(&tx, NS, "Person", "jill", &Range::Unbounded)
            .unwrap(),
    );
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].key().timestamp(), later);
    assert!(history[1].is_deleted());
}

#[test]
fn test_cascade_tombstone_lands_after_newer_versions() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);
    let newer = day(2020, 1, 1);
    let mut jack = world.jack.content().unwrap().clone();
    jack["firstname"] = "Jackie".into();
    write(&store, &mut tx, document("Person", "jack", newer, jack));

    store
        .mark_deleted(
            &mut tx,
            NS,
            "Address",
            "paris",
            day(2019, 6, 1),
            DeletePolicy::CascadeDeleteAllIncomingLinksAndNodes,
        )
        .unwrap();

    let history = collect(
        store
            .read_all_versions(&tx, NS, "Person", "jack", &Range::Last(1))
            .unwrap(),
    );
    assert!(history[0].is_deleted());
    assert_eq!(history[0].key().timestamp(), newer.next());
    assert!(read(&store, &tx, Timestamp::MAX, "Person", "jack").is_none());
    assert!(read(&store, &tx, Timestamp::MAX, "Person", "jill").is_some());
}

#[test]
fn test_cascade_on_unreferenced_document() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);

    store
        .delete_all_versions(
            &mut tx,
            NS,
            "Person",
            "jill",
            DeletePolicy::CascadeDeleteAllIncomingLinksAndNodes,
        )
        .unwrap();
    assert!(read(&store, &tx, Timestamp::MAX, "Person", "jill").is_none());
    assert!(read(&store, &tx, Timestamp::MAX, "Person", "jack").is_some());
    assert!(read(&store, &tx, Timestamp::MAX, "Address", "oslo").is_some());
}

// =============================================================================
// DELETE ALL ENTITIES
// =============================================================================

#[test]
fn test_delete_all_entities_ignores_policy() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let world = World::new();
    world.populate(&store, &mut tx);

    store.delete_all_entities(&mut tx, NS, "Person", &specification()).unwrap();
    let persons = store
        .read_documents(&tx, Timestamp::MAX, NS, "Person", &Range::Unbounded)
        .unwrap();
    assert_eq!(count(persons), 0);

    // nobody links to the addresses anymore
    for id in ["oslo", "london", "paris"] {
        store
            .delete_all_versions(&mut tx, NS, "Address", id, DeletePolicy::FailIfIncomingLinks)
            .unwrap();
    }
}

#[test]
fn test_delete_all_entities_is_namespace_scoped() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let t = day(2019, 1, 1);
    write(&store, &mut tx, document("Address", "oslo", t, address("Oslo", "", "Norway")));
    let other = JsonDocument::new(
        DocumentKey::new("other", "Address", "oslo", t),
        address("Oslo", "", "Norway"),
    );
    store.create_or_overwrite(&mut tx, &other, &specification()).unwrap();

    store.delete_all_entities(&mut tx, NS, "Address", &specification()).unwrap();
    assert!(read(&store, &tx, t, "Address", "oslo").is_none());
    assert!(store.read(&tx, t, "other", "Address", "oslo").unwrap().is_some());
}
