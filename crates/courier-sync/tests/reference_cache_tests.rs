// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference collection lookup and revalidation.

use std::sync::Arc;

use courier_core::{
    CollectionId, CollectionInfo, CollectionItem, CollectionNamespace, CollectionReference,
    CollectionSpec,
};
use courier_sync::{
    add_collection_interactively, FoundItem, ReferenceCollections, SearchScope,
    CACHED_COLLECTIONS, CACHED_QUERY_RESULTS,
};
use courier_test_utils::{MockCollectionSource, TestHarness};

const SPEC: CollectionSpec = CollectionSpec {
    low_water: 2,
    high_water: 3,
};

fn info(id: i64, hash: i32) -> CollectionInfo {
    CollectionInfo {
        id: CollectionId {
            namespace: CollectionNamespace::Stickers,
            id,
        },
        access_hash: 0,
        title: format!("Pack {id}"),
        short_name: format!("pack_{id}"),
        hash,
        count: 1,
    }
}

fn items(alt: &str) -> Vec<CollectionItem> {
    vec![CollectionItem {
        index: 0,
        file_id: 5,
        alt: alt.into(),
    }]
}

async fn setup() -> (
    TestHarness,
    MockCollectionSource,
    ReferenceCollections<MockCollectionSource>,
) {
    let harness = TestHarness::new().await.unwrap();
    let source = MockCollectionSource::new();
    let collections = ReferenceCollections::new(harness.db.clone(), Arc::new(source.clone()), SPEC);
    (harness, source, collections)
}

#[tokio::test]
async fn installed_copy_is_authoritative() {
    let (harness, source, collections) = setup().await;
    harness
        .db
        .transaction(|txn| add_collection_interactively(txn, info(1, 1), items("local")))
        .await
        .unwrap();
    source.publish(info(1, 2), items("remote")).await;

    let found = collections.fetch_if_stale(info(1, 1).id, true).await.unwrap().unwrap();
    assert!(found.installed);
    assert_eq!(found.items, items("local"));
    assert!(source.requests().await.is_empty());
}

#[tokio::test]
async fn miss_fetches_then_revalidates_with_hash() {
    let (_harness, source, collections) = setup().await;
    let id = info(7, 3).id;
    source.publish(info(7, 3), items("a")).await;

    assert!(collections.get(id).await.unwrap().is_none());
    let fetched = collections.fetch_if_stale(id, false).await.unwrap().unwrap();
    assert!(!fetched.installed);
    assert_eq!(fetched.items, items("a"));

    // Unchanged on the server: conditional request answered with not-modified.
    let cached = collections.fetch_if_stale(id, false).await.unwrap().unwrap();
    assert_eq!(cached.items, items("a"));

    source.publish(info(7, 4), items("b")).await;
    let refreshed = collections.fetch_if_stale(id, false).await.unwrap().unwrap();
    assert_eq!(refreshed.info.hash, 4);
    assert_eq!(collections.get(id).await.unwrap().unwrap().items, items("b"));

    assert_eq!(
        source.requests().await,
        vec![(id, None), (id, Some(3)), (id, Some(3))]
    );
}

#[tokio::test]
async fn remote_failure_falls_back_to_cache() {
    let (_harness, source, collections) = setup().await;
    let id = info(2, 1).id;
    source.publish(info(2, 1), items("a")).await;
    collections.fetch_if_stale(id, false).await.unwrap();

    source.set_offline(true).await;
    let found = collections.fetch_if_stale(id, false).await.unwrap().unwrap();
    assert_eq!(found.items, items("a"));

    let unknown = info(3, 1).id;
    assert!(collections.fetch_if_stale(unknown, false).await.unwrap().is_none());
}

#[tokio::test]
async fn not_found_drops_cached_copy() {
    let (harness, source, collections) = setup().await;
    let id = info(4, 1).id;
    source.publish(info(4, 1), items("a")).await;
    collections.fetch_if_stale(id, false).await.unwrap();
    assert!(collections.get(id).await.unwrap().is_some());

    let emptied = ReferenceCollections::new(
        harness.db.clone(),
        Arc::new(MockCollectionSource::new()),
        SPEC,
    );
    assert!(emptied.fetch_if_stale(id, false).await.unwrap().is_none());
    assert!(collections.get(id).await.unwrap().is_none());
}

#[tokio::test]
async fn cache_is_trimmed_to_low_water() {
    let (harness, source, collections) = setup().await;
    for id in 1..=4 {
        source.publish(info(id, 1), items("x")).await;
        collections.fetch_if_stale(info(id, 1).id, false).await.unwrap();
    }

    let count = harness
        .db
        .transaction(|txn| txn.item_cache_count(CACHED_COLLECTIONS))
        .await
        .unwrap();
    assert_eq!(count, SPEC.low_water);
    // The most recently fetched collections survive.
    assert!(collections.get(info(4, 1).id).await.unwrap().is_some());
    assert!(collections.get(info(1, 1).id).await.unwrap().is_none());
}

fn item(file_id: i64, alt: &str) -> CollectionItem {
    CollectionItem {
        index: 0,
        file_id,
        alt: alt.into(),
    }
}

fn hits(found: &[FoundItem]) -> Vec<(i64, bool)> {
    found.iter().map(|f| (f.file_id, f.installed)).collect()
}

#[tokio::test]
async fn search_merges_installed_hits_with_remote_results() {
    let (harness, source, collections) = setup().await;
    harness
        .db
        .transaction(|txn| {
            add_collection_interactively(txn, info(1, 1), vec![item(10, "cat"), item(11, "dog")])
        })
        .await
        .unwrap();
    source
        .publish_search("cat", 7, vec![item(10, "cat"), item(20, "cat")])
        .await;

    let found = collections.search_items("cat", SearchScope::ALL).await.unwrap();
    assert_eq!(hits(&found), vec![(10, true), (20, false)]);

    let local_only = collections.search_items("cat", SearchScope::INSTALLED).await.unwrap();
    assert_eq!(hits(&local_only), vec![(10, true)]);
    assert_eq!(source.search_requests().await, vec![("cat".to_string(), None)]);
}

#[tokio::test]
async fn search_results_revalidate_with_cached_hash() {
    let (_harness, source, collections) = setup().await;
    source.publish_search("cat", 7, vec![item(20, "cat")]).await;
    collections.search_items("cat", SearchScope::ALL).await.unwrap();

    let again = collections.search_items("cat", SearchScope::ALL).await.unwrap();
    assert_eq!(hits(&again), vec![(20, false)]);

    source.publish_search("cat", 8, vec![item(21, "cat")]).await;
    let refreshed = collections.search_items("cat", SearchScope::ALL).await.unwrap();
    assert_eq!(hits(&refreshed), vec![(21, false)]);

    source.set_offline(true).await;
    let offline = collections.search_items("cat", SearchScope::ALL).await.unwrap();
    assert_eq!(hits(&offline), vec![(21, false)]);

    assert_eq!(
        source.search_requests().await,
        vec![
            ("cat".to_string(), None),
            ("cat".to_string(), Some(7)),
            ("cat".to_string(), Some(7)),
            ("cat".to_string(), Some(8)),
        ]
    );
}

#[tokio::test]
async fn search_cache_has_its_own_watermarks() {
    let (harness, source, collections) = setup().await;
    let collections = collections.with_query_spec(CollectionSpec {
        low_water: 1,
        high_water: 2,
    });
    for query in ["a", "b", "c"] {
        source.publish_search(query, 1, vec![item(1, query)]).await;
        collections.search_items(query, SearchScope::ALL).await.unwrap();
    }
    source.publish(info(1, 1), items("x")).await;
    collections.fetch_if_stale(info(1, 1).id, false).await.unwrap();

    let (queries, fetched) = harness
        .db
        .transaction(|txn| {
            Ok((
                txn.item_cache_count(CACHED_QUERY_RESULTS)?,
                txn.item_cache_count(CACHED_COLLECTIONS)?,
            ))
        })
        .await
        .unwrap();
    assert_eq!(queries, 1);
    assert_eq!(fetched, 1);
}

#[tokio::test]
async fn short_name_prefers_installed_then_fetches_remotely() {
    let (harness, source, collections) = setup().await;
    harness
        .db
        .transaction(|txn| add_collection_interactively(txn, info(1, 1), items("local")))
        .await
        .unwrap();
    source.publish(info(2, 5), items("remote")).await;

    let installed = collections
        .fetch_by_reference(&CollectionReference::ShortName("pack_1".into()), false)
        .await
        .unwrap()
        .unwrap();
    assert!(installed.installed);
    assert!(source.name_requests().await.is_empty());

    let fetched = collections
        .fetch_by_reference(&CollectionReference::ShortName("pack_2".into()), false)
        .await
        .unwrap()
        .unwrap();
    assert!(!fetched.installed);
    assert_eq!(fetched.info.id, info(2, 5).id);
    // Cached under its id, so id lookups now hit the cache.
    let by_id = collections
        .fetch_by_reference(&CollectionReference::Id(info(2, 5).id), false)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.items, items("remote"));
    assert_eq!(source.requests().await, vec![(info(2, 5).id, Some(5))]);

    let missing = collections
        .fetch_by_reference(&CollectionReference::ShortName("nope".into()), false)
        .await
        .unwrap();
    assert!(missing.is_none());

    source.set_offline(true).await;
    assert!(
        collections
            .fetch_by_reference(&CollectionReference::ShortName("pack_2".into()), false)
            .await
            .is_err()
    );
}
