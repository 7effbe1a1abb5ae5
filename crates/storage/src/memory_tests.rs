// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn read_your_writes() {
    let store = MemoryStore::new();
    assert_eq!(store.read("k").await.unwrap(), None);
    store.write("k", b"v1".to_vec()).await.unwrap();
    assert_eq!(store.read("k").await.unwrap(), Some(b"v1".to_vec()));
    store.write("k", b"v2".to_vec()).await.unwrap();
    assert_eq!(store.read("k").await.unwrap(), Some(b"v2".to_vec()));
}

#[tokio::test]
async fn lock_is_exclusive_until_unlocked() {
    let store = MemoryStore::new();
    assert!(store.lock("k").await.unwrap());
    assert!(!store.lock("k").await.unwrap());
    assert!(store.unlock("k").await.unwrap());
    assert!(store.lock("k").await.unwrap());
}

#[tokio::test]
async fn unlock_of_free_key_reports_false() {
    let store = MemoryStore::new();
    assert!(!store.unlock("k").await.unwrap());
}

#[tokio::test]
async fn expired_locks_can_be_reacquired() {
    let store = MemoryStore::with_lock_ttl(Duration::from_millis(20));
    assert!(store.lock("k").await.unwrap());
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert!(store.lock("k").await.unwrap());
}

#[tokio::test]
async fn write_indexed_retains_the_projection() {
    let store = MemoryStore::new();
    let index = IndexProjection { status: Some("active".into()), ..Default::default() };
    store.write_indexed("k", b"blob".to_vec(), index.clone()).await.unwrap();
    assert_eq!(store.blob("k"), Some(b"blob".to_vec()));
    assert_eq!(store.index_of("k"), Some(index));
}

#[tokio::test]
async fn clones_share_state() {
    let store = MemoryStore::new();
    let other = store.clone();
    store.write("k", b"v".to_vec()).await.unwrap();
    assert_eq!(other.read("k").await.unwrap(), Some(b"v".to_vec()));
}

#[tokio::test]
async fn op_count_tracks_reads_and_writes() {
    let store = MemoryStore::new();
    assert_eq!(store.op_count(), 0);
    store.write("k", b"v".to_vec()).await.unwrap();
    store.read("k").await.unwrap();
    assert_eq!(store.op_count(), 2);
}
