//! End-to-end publish rounds against an on-disk database.

use std::collections::BTreeSet;

use serde_json::json;

use pcat_publish::{PublishConfig, PublishRequest, PublishState, Publisher, Resolver, StagedBatch};
use pcat_store::{DiskFileStore, ExistenceIndex, FileStore};
use pcat_types::{SaveMode, TempSuffix};

fn root(marker_target: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "data": {
            "markers": {"stable": 0},
            "latest": {"tx": 1, "date": 0, "transaction": 1},
            "trees": {}
        },
        "refs": {"0": marker_target}
    }))
    .unwrap()
}

fn with_refs(refs: &[&str]) -> Vec<u8> {
    let refs: serde_json::Map<String, serde_json::Value> = refs
        .iter()
        .enumerate()
        .map(|(i, name)| (i.to_string(), json!(name)))
        .collect();
    serde_json::to_vec(&json!({ "data": {}, "refs": refs })).unwrap()
}

/// Write one upload round the way the server does and publish it.
async fn publish_round(
    publisher: &Publisher,
    store: &DiskFileStore,
    save: SaveMode,
    files: &[(&str, Vec<u8>)],
) -> pcat_publish::PublishOutcome {
    let suffix = TempSuffix::new();
    let mut uploaded = Vec::new();
    for (name, bytes) in files {
        let stored = suffix.stage(name);
        store.write(&stored, bytes).await.unwrap();
        uploaded.push(stored);
    }
    publisher
        .publish(store, PublishRequest::staged("db", uploaded, save, suffix))
        .await
        .unwrap()
}

async fn files_on_disk(store: &DiskFileStore) -> BTreeSet<String> {
    store.list().await.unwrap().into_iter().collect()
}

#[tokio::test]
async fn publish_rounds_until_complete_then_prune() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DiskFileStore::new(tmp.path().join("db"));
    let publisher = Publisher::new(PublishConfig::default());

    // The currently published version points "stable" at release_bbb.
    store.write("root.json", &root("release_bbb.json")).await.unwrap();
    store.write("release_bbb.json", &with_refs(&[])).await.unwrap();

    let new_root = root("release_aaa.json");
    let release = with_refs(&["product_p1@1.json"]);
    let product = with_refs(&["table_t1@1.json"]);
    let table = with_refs(&[]);

    // Round one: root and release only. The table is not known yet because
    // nothing names it until the product is present.
    let first = publish_round(
        &publisher,
        &store,
        SaveMode::IfComplete,
        &[("root.json", new_root.clone()), ("release_aaa.json", release)],
    )
    .await;
    assert_eq!(first.state, PublishState::Incomplete);
    assert_eq!(first.missing_files, vec!["product_p1@1.json"]);
    assert_eq!(store.read("root.json").await.unwrap().unwrap(), root("release_bbb.json"));
    assert_eq!(files_on_disk(&store).await.len(), 4);

    // Round two: only the product. Round one's staged files are picked up.
    let second = publish_round(
        &publisher,
        &store,
        SaveMode::IfComplete,
        &[("product_p1@1.json", product)],
    )
    .await;
    assert_eq!(second.state, PublishState::Incomplete);
    assert_eq!(second.missing_files, vec!["table_t1@1.json"]);
    assert_eq!(second.pending, 2);
    assert_eq!(store.read("root.json").await.unwrap().unwrap(), root("release_bbb.json"));

    // Round three: the table completes the graph; all three rounds commit.
    let third = publish_round(
        &publisher,
        &store,
        SaveMode::IfComplete,
        &[("table_t1@1.json", table)],
    )
    .await;
    assert_eq!(third.state, PublishState::CompleteCommit);
    assert!(third.missing_files.is_empty());
    assert_eq!(third.pending, 3);
    assert_eq!(third.commit.as_ref().unwrap().renamed.len(), 4);

    let expected: BTreeSet<String> = [
        "product_p1@1.json",
        "release_aaa.json",
        "root.json",
        "table_t1@1.json",
    ]
    .map(String::from)
    .into();
    assert_eq!(files_on_disk(&store).await, expected);
    assert_eq!(store.read("root.json").await.unwrap().unwrap(), new_root);

    // Everything left on disk is reachable from the new root.
    let existing = ExistenceIndex::snapshot(&store).await.unwrap();
    let reachable = Resolver::new(&store, publisher.config())
        .resolve(&existing, &StagedBatch::direct(), ["root.json"])
        .await
        .unwrap();
    assert!(reachable.is_complete());
    assert_eq!(reachable.referenced, expected);
}

#[tokio::test]
async fn resolving_from_root_is_complete_once_everything_is_present() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DiskFileStore::new(tmp.path());
    store.write("root.json", &root("release_aaa.json")).await.unwrap();
    store.write("release_aaa.json", &with_refs(&["blob_ab"])).await.unwrap();

    let existing = ExistenceIndex::snapshot(&store).await.unwrap();
    let resolver = Resolver::new(&store, &PublishConfig::default());
    let missing = resolver
        .resolve(&existing, &StagedBatch::direct(), ["root.json"])
        .await
        .unwrap();
    assert_eq!(missing.missing_files(), vec!["blob_ab"]);

    store.write("blob_ab", b"\x00").await.unwrap();
    let existing = ExistenceIndex::snapshot(&store).await.unwrap();
    let complete = resolver
        .resolve(&existing, &StagedBatch::direct(), ["root.json"])
        .await
        .unwrap();
    assert!(complete.is_complete());
}

#[tokio::test]
async fn dry_run_against_disk_leaves_no_trace() {
    let tmp = tempfile::tempdir().unwrap();
    let store = DiskFileStore::new(tmp.path().join("db"));
    let publisher = Publisher::new(PublishConfig::default());

    let outcome = publish_round(
        &publisher,
        &store,
        SaveMode::No,
        &[("root.json", root("release_aaa.json"))],
    )
    .await;
    assert_eq!(outcome.missing_files, vec!["release_aaa.json"]);
    assert!(files_on_disk(&store).await.is_empty());
}
