// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store, for tests and single-process embedders.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::projection::IndexProjection;
use crate::store::{LockableStore, StoreError};

/// Server-side lock expiry, matching the provider default.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(900);

#[derive(Default)]
struct Inner {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    locks: Mutex<HashMap<String, Instant>>,
    index: Mutex<HashMap<String, IndexProjection>>,
    reads: AtomicU64,
    writes: AtomicU64,
}

/// A `LockableStore` held entirely in process memory.
///
/// Locks expire after a TTL like a real lock service, and the last index
/// projection written per key is retained for inspection.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
    lock_ttl: Duration,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_lock_ttl(DEFAULT_LOCK_TTL)
    }

    pub fn with_lock_ttl(lock_ttl: Duration) -> Self {
        Self { inner: Arc::new(Inner::default()), lock_ttl }
    }

    /// Raw blob at `key`, if any.
    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.blobs.lock().get(key).cloned()
    }

    /// Last index projection written for `key`.
    pub fn index_of(&self, key: &str) -> Option<IndexProjection> {
        self.inner.index.lock().get(key).cloned()
    }

    pub fn is_locked(&self, key: &str) -> bool {
        let locks = self.inner.locks.lock();
        locks.get(key).map(|expiry| Instant::now() < *expiry).unwrap_or(false)
    }

    pub fn blob_count(&self) -> usize {
        self.inner.blobs.lock().len()
    }

    /// Total reads + writes served, for asserting "no store access" paths.
    pub fn op_count(&self) -> u64 {
        self.inner.reads.load(Ordering::Relaxed) + self.inner.writes.load(Ordering::Relaxed)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockableStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.blobs.lock().get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.inner.writes.fetch_add(1, Ordering::Relaxed);
        self.inner.blobs.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    async fn write_indexed(
        &self,
        key: &str,
        bytes: Vec<u8>,
        index: IndexProjection,
    ) -> Result<(), StoreError> {
        self.inner.index.lock().insert(key.to_string(), index);
        self.write(key, bytes).await
    }

    async fn lock(&self, key: &str) -> Result<bool, StoreError> {
        let mut locks = self.inner.locks.lock();
        let now = Instant::now();
        match locks.get(key) {
            Some(expiry) if now < *expiry => Ok(false),
            _ => {
                locks.insert(key.to_string(), now + self.lock_ttl);
                Ok(true)
            }
        }
    }

    async fn unlock(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.inner.locks.lock().remove(key).is_some())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
