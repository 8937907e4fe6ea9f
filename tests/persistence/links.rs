//! Link traversal tests
//!
//! Forward traversal (`read_linked_documents`) and backward traversal
//! (`read_source_documents`) over the Person -> Address graph.

use std::collections::BTreeMap;

use crate::common::*;

const PATHS: [&str; 3] = [
    "$.history.currentAddress",
    "$.history.workAddress",
    "$.history.previousAddresses[]",
];

struct Graph {
    timestamp: Timestamp,
    address_ids: Vec<String>,
    funky_ids: Vec<String>,
    person_ids: Vec<String>,
    /// target link -> path -> source links
    by_target: BTreeMap<String, BTreeMap<&'static str, Vec<String>>>,
}

fn build_graph(store: &Store, tx: &mut Tx) -> Graph {
    let timestamp = day(2019, 1, 1);
    let mut graph = Graph {
        timestamp,
        address_ids: Vec::new(),
        funky_ids: Vec::new(),
        person_ids: Vec::new(),
        by_target: BTreeMap::new(),
    };

    for i in 0..3 {
        let id = format!("address{}", i + 1);
        let content = address(&format!("city {}", i), "", &format!("Country {}", i));
        write(store, tx, document("Address", &id, timestamp, content));
        graph.address_ids.push(id);
    }
    for i in 0..2 {
        let id = format!("funky{}", i + 1);
        let content = address(&format!("funky {}", i), "", &format!("Somewhere {}", i));
        write(store, tx, document("FunkyLongAddress", &id, timestamp, content));
        graph.funky_ids.push(id);
    }

    let mut links: Vec<String> = graph
        .address_ids
        .iter()
        .map(|id| format!("/Address/{}", id))
        .collect();
    links.extend(graph.funky_ids.iter().map(|id| format!("/FunkyLongAddress/{}", id)));
    let link_refs: Vec<&str> = links.iter().map(String::as_str).collect();

    let names = ["Jack", "Jill", "Jane", "Jones"];
    for i in 0..11 {
        let id = format!("person{}", i + 1);
        let person_link = format!("/Person/{}", id);
        let current = &links[(2 * i) % links.len()];
        let work = &links[(2 * i + 1) % links.len()];

        let mut record = |target: &str, path: &'static str| {
            graph
                .by_target
                .entry(target.to_string())
                .or_default()
                .entry(path)
                .or_default()
                .push(person_link.clone());
        };
        record(current, PATHS[0]);
        record(work, PATHS[1]);
        for link in &links {
            record(link, PATHS[2]);
        }

        let content = linked_person(
            &format!("{} {}", names[i % names.len()], i),
            "Smith",
            current,
            work,
            &link_refs,
        );
        write(store, tx, document("Person", &id, timestamp, content));
        graph.person_ids.push(id);
    }
    graph
}

#[test]
fn test_read_linked_documents() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let graph = build_graph(&store, &mut tx);
    let t = graph.timestamp;

    for person_id in &graph.person_ids {
        let targets = [
            ("Address", &graph.address_ids),
            ("FunkyLongAddress", &graph.funky_ids),
        ];
        for (target_entity, expected) in targets {
            let linked = collect(
                store
                    .read_linked_documents(
                        &tx,
                        t,
                        NS,
                        "Person",
                        person_id,
                        PATHS[2],
                        target_entity,
                        &Range::Unbounded,
                    )
                    .unwrap(),
            );
            let linked_ids: Vec<String> = linked.iter().map(|d| d.key().id().to_string()).collect();
            assert_eq!(
                &linked_ids, expected,
                "previous addresses of {} in {}",
                person_id, target_entity
            );
            for doc in &linked {
                let direct = store.read(&tx, t, NS, target_entity, doc.key().id()).unwrap();
                assert_eq!(direct.as_ref(), Some(doc));
            }
        }

        for path in &PATHS[..2] {
            let mut found = Vec::new();
            for target_entity in ["Address", "FunkyLongAddress"] {
                found.extend(collect(
                    store
                        .read_linked_documents(
                            &tx,
                            t,
                            NS,
                            "Person",
                            person_id,
                            path,
                            target_entity,
                            &Range::Unbounded,
                        )
                        .unwrap(),
                ));
            }
            assert_eq!(found.len(), 1, "{} of {}", path, person_id);
        }
    }
}

#[test]
fn test_read_source_documents() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let graph = build_graph(&store, &mut tx);

    let targets = graph
        .address_ids
        .iter()
        .map(|id| ("Address", id))
        .chain(graph.funky_ids.iter().map(|id| ("FunkyLongAddress", id)));
    for (target_entity, target_id) in targets {
        let target_link = format!("/{}/{}", target_entity, target_id);
        for path in PATHS {
            let sources = collect(
                store
                    .read_source_documents(
                        &tx,
                        graph.timestamp,
                        NS,
                        target_entity,
                        target_id,
                        path,
                        "Person",
                        &Range::Unbounded,
                    )
                    .unwrap(),
            );
            let mut actual: Vec<String> = sources
                .iter()
                .map(|d| format!("/{}/{}", d.key().entity(), d.key().id()))
                .collect();
            let mut expected = graph.by_target[&target_link][path].clone();
            actual.sort();
            expected.sort();
            assert_eq!(actual, expected, "{} along {}", target_link, path);
        }
    }
}

#[test]
fn test_link_paths_accept_concrete_indexes() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let graph = build_graph(&store, &mut tx);

    let linked = store
        .read_linked_documents(
            &tx,
            graph.timestamp,
            NS,
            "Person",
            "person1",
            "history.previousAddresses[3]",
            "FunkyLongAddress",
            &Range::Unbounded,
        )
        .unwrap();
    assert_eq!(ids(linked), graph.funky_ids);
}

#[test]
fn test_source_documents_paginate() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let graph = build_graph(&store, &mut tx);

    let window = |range: Range<String>| {
        ids(store
            .read_source_documents(
                &tx,
                graph.timestamp,
                NS,
                "Address",
                "address1",
                PATHS[2],
                "Person",
                &range,
            )
            .unwrap())
    };
    assert_eq!(window(Range::First(2)), ["person1", "person10"]);
    assert_eq!(window(Range::Last(2)), ["person9", "person8"]);
    assert_eq!(window(Range::FirstAfter(1, "person5".to_string())), ["person6"]);
}

#[test]
fn test_links_follow_versions() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let before = day(2019, 1, 1);
    let after = day(2020, 1, 1);
    write(&store, &mut tx, document("Address", "oslo", before, address("Oslo", "", "Norway")));
    write(&store, &mut tx, document("Address", "bergen", before, address("Bergen", "", "Norway")));
    write(
        &store,
        &mut tx,
        document(
            "Person",
            "jack",
            before,
            linked_person("Jack", "Smith", "/Address/oslo", "/Address/oslo", &[]),
        ),
    );
    write(
        &store,
        &mut tx,
        document(
            "Person",
            "jack",
            after,
            linked_person("Jack", "Smith", "/Address/bergen", "/Address/oslo", &[]),
        ),
    );

    let current = |t: Timestamp| {
        ids(store
            .read_linked_documents(
                &tx,
                t,
                NS,
                "Person",
                "jack",
                PATHS[0],
                "Address",
                &Range::Unbounded,
            )
            .unwrap())
    };
    assert_eq!(current(before), ["oslo"]);
    assert_eq!(current(after), ["bergen"]);

    let residents = |target: &str, t: Timestamp| {
        ids(store
            .read_source_documents(
                &tx,
                t,
                NS,
                "Address",
                target,
                PATHS[0],
                "Person",
                &Range::Unbounded,
            )
            .unwrap())
    };
    assert_eq!(residents("oslo", before), ["jack"]);
    assert!(residents("oslo", after).is_empty());
    assert_eq!(residents("bergen", after), ["jack"]);
}

#[test]
fn test_deleted_targets_are_skipped() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let t = day(2019, 1, 1);
    write(&store, &mut tx, document("Address", "oslo", t, address("Oslo", "", "Norway")));
    write(&store, &mut tx, document("Address", "paris", t, address("Paris", "", "France")));
    write(
        &store,
        &mut tx,
        document(
            "Person",
            "jack",
            t,
            linked_person(
                "Jack",
                "Smith",
                "/Address/oslo",
                "/Address/oslo",
                &["/Address/paris", "/Address/oslo"],
            ),
        ),
    );

    store.delete_all_entities(&mut tx, NS, "Address", &specification()).unwrap();
    write(&store, &mut tx, document("Address", "oslo", t, address("Oslo", "", "Norway")));

    let previous = store
        .read_linked_documents(&tx, t, NS, "Person", "jack", PATHS[2], "Address", &Range::Unbounded)
        .unwrap();
    assert_eq!(ids(previous), ["oslo"]);
}

#[test]
fn test_invalid_references_are_rejected() {
    let store = store();
    let mut tx = store.create_transaction(false).unwrap();
    let t = day(2019, 1, 1);
    for bad in ["/Person/jill", "oslo", "/Address/", "/Address"] {
        let doc = document(
            "Person",
            "jack",
            t,
            linked_person("Jack", "Smith", bad, "/Address/oslo", &[]),
        );
        let err = store.create_or_overwrite(&mut tx, &doc, &specification()).unwrap_err();
        assert!(matches!(err, Error::InvalidReference { .. }), "{} should be rejected", bad);
    }
}
