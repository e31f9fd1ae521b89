use herald_core::models::JobResultRecord;
use herald_core::traits::{ResultStore, ResultStoreFactory};
use herald_store::{FileResultStore, STATE_FILE_NAME};

use crate::integration::common::{fired_record, setup_factory};

#[tokio::test]
async fn missing_file_is_empty() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();

    assert!(store.list().await.unwrap().is_empty());
    assert!(store.get("nope").await.unwrap().is_none());
    assert!(!store.path().exists());
}

#[tokio::test]
async fn upsert_creates_then_updates_in_place() {
    let (factory, dir) = setup_factory();
    let store = factory.open("deploy").unwrap();

    let saved = store
        .upsert("w1", |r| {
            r.advance_checked(3);
        })
        .await
        .unwrap();
    assert_eq!(saved.watch_id, "w1");
    assert_eq!(saved.checked_number, 3);

    store
        .upsert("w2", |r| {
            r.advance_checked(9);
        })
        .await
        .unwrap();
    store
        .upsert("w1", |r| {
            r.advance_triggered(5);
            r.advance_checked(5);
        })
        .await
        .unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].watch_id, "w1");
    assert_eq!(records[0].triggered_number, Some(5));
    assert_eq!(records[0].checked_number, 5);
    assert_eq!(records[1].watch_id, "w2");

    assert!(dir.path().join("deploy").join(STATE_FILE_NAME).exists());
    assert!(!dir.path().join("deploy").join("remote-build-result.json.tmp").exists());
}

#[tokio::test]
async fn persisted_state_survives_reopen() {
    let (factory, dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    let expected = fired_record("w1", 7);
    let to_store = expected.clone();
    store.upsert("w1", move |r| *r = to_store).await.unwrap();

    let reopened = FileResultStore::new(dir.path().join("deploy").join(STATE_FILE_NAME));
    assert_eq!(reopened.get("w1").await.unwrap(), Some(expected));
}

#[tokio::test]
async fn file_is_a_pretty_json_array() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    store
        .upsert("w1", |r| {
            r.advance_checked(1);
        })
        .await
        .unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert!(raw.starts_with("[\n"));
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed[0]["watch_id"], "w1");
    assert_eq!(parsed[0]["checked_number"], 1);
}

#[tokio::test]
async fn prune_removes_unconfigured_records() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    for id in ["a", "b", "c"] {
        store
            .upsert(id, |r| {
                r.advance_checked(1);
            })
            .await
            .unwrap();
    }

    let removed = store
        .prune_missing(&["a".to_string(), "c".to_string()])
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let ids: Vec<String> = store
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.watch_id)
        .collect();
    assert_eq!(ids, vec!["a", "c"]);

    assert_eq!(store.prune_missing(&[]).await.unwrap(), 2);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn decoding_tolerates_unknown_and_missing_fields() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(
        store.path(),
        r#"[
            {"watch_id": "old", "checked_number": 12, "legacyField": {"x": 1}},
            {"watch_id": "bare"}
        ]"#,
    )
    .unwrap();

    let records = store.list().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].checked_number, 12);
    assert_eq!(records[1], JobResultRecord::new("bare"));
}

#[tokio::test]
async fn corrupt_file_is_a_store_error() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), "{ truncated").unwrap();

    let err = store.list().await.unwrap_err();
    assert!(matches!(err, herald_core::AppError::StoreError(_)));
}

fn write_state(store: &FileResultStore, raw: &str) {
    std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
    std::fs::write(store.path(), raw).unwrap();
}

const STATE_WITH_BAD_ENTRY: &str = r#"[
    {"watch_id": "a", "checked_number": 40, "triggered_number": "38"},
    {"watch_id": "b", "checked_number": 3}
]"#;

#[tokio::test]
async fn undecodable_record_is_a_store_error() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    write_state(&store, STATE_WITH_BAD_ENTRY);

    let err = store.get("b").await.unwrap_err();
    assert!(matches!(err, herald_core::AppError::StoreError(ref m) if m.contains("#0")));
    assert!(store.list().await.is_err());
}

#[tokio::test]
async fn undecodable_record_survives_writes_to_other_watches() {
    let (factory, _dir) = setup_factory();
    let store = factory.open("deploy").unwrap();
    write_state(&store, STATE_WITH_BAD_ENTRY);

    assert!(
        store
            .upsert("b", |r| {
                r.advance_checked(4);
            })
            .await
            .is_err()
    );
    assert!(store.prune_missing(&["b".to_string()]).await.is_err());

    let raw = std::fs::read_to_string(store.path()).unwrap();
    assert_eq!(raw, STATE_WITH_BAD_ENTRY);
}

#[tokio::test]
async fn concurrent_upserts_are_serialized() {
    let (factory, _dir) = setup_factory();
    let mut handles = Vec::new();
    for i in 0..16u64 {
        let store = factory.open("deploy").unwrap();
        handles.push(tokio::spawn(async move {
            store
                .upsert(&format!("w{i}"), move |r| {
                    r.advance_checked(i + 1);
                })
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let store = factory.open("deploy").unwrap();
    assert_eq!(store.list().await.unwrap().len(), 16);
}

#[tokio::test]
async fn owners_are_isolated() {
    let (factory, _dir) = setup_factory();
    let a = factory.open("alpha").unwrap();
    let b = factory.open("beta").unwrap();
    a.upsert("w", |r| {
        r.advance_checked(4);
    })
    .await
    .unwrap();

    assert!(b.get("w").await.unwrap().is_none());
    assert_eq!(a.get("w").await.unwrap().unwrap().checked_number, 4);
}
