//! Filesystem signal store against a real directory

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use bootnet_core::{BootstrapError, SignalKey, ValidatorName};
use bootnet_protocol::store::{FilesystemSignalStore, Publication, SignalStore};
use std::sync::Arc;

fn gentx(name: &str) -> SignalKey {
    SignalKey::Gentx(ValidatorName::new_unchecked(name))
}

#[tokio::test]
async fn test_publish_uses_historical_file_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemSignalStore::new(dir.path());

    store.publish(&gentx("val2"), b"{\"body\":{}}").await.unwrap();
    store
        .publish(&SignalKey::GenesisAccountsReady, SignalKey::marker_content())
        .await
        .unwrap();

    let on_disk = std::fs::read(dir.path().join("val2_gentx.json")).unwrap();
    assert_eq!(on_disk, b"{\"body\":{}}");
    assert!(dir.path().join("genesis_accounts_ready").is_file());

    // no temporary files are left behind
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_write_once_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let store = FilesystemSignalStore::new(dir.path().join("shared"));
    let key = SignalKey::NodeId(ValidatorName::new_unchecked("val1"));

    assert_eq!(store.fetch(&key).await.unwrap(), None);
    assert!(!store.contains(&key).await.unwrap());
    assert_eq!(store.publish(&key, b"abc\n").await.unwrap(), Publication::Created);
    assert_eq!(store.publish(&key, b"abc\n").await.unwrap(), Publication::Unchanged);
    assert_matches!(
        store.publish(&key, b"def\n").await,
        Err(BootstrapError::SignalConflict { .. })
    );
    assert_eq!(store.fetch(&key).await.unwrap().unwrap(), b"abc\n");
}

#[tokio::test]
async fn test_files_written_by_other_writers_are_visible() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("final_genesis.json"), b"{}").unwrap();
    let store = FilesystemSignalStore::new(dir.path());
    assert!(store.contains(&SignalKey::FinalGenesis).await.unwrap());
    assert_matches!(
        store.publish(&SignalKey::FinalGenesis, b"{\"x\":1}").await,
        Err(BootstrapError::SignalConflict { .. })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishers_agree_on_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FilesystemSignalStore::new(dir.path()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                let content = format!("writer-{i}");
                store
                    .publish(&SignalKey::Genesis, content.as_bytes())
                    .await
                    .map(|outcome| (outcome, content))
            })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok((Publication::Created, _)) => created += 1,
            Ok((Publication::Unchanged, _)) => panic!("distinct content cannot be unchanged"),
            Err(e) => assert_matches!(e, BootstrapError::SignalConflict { .. }),
        }
    }
    assert_eq!(created, 1);
}
