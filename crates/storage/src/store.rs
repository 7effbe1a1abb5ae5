// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The store contract the runtime is written against.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::projection::IndexProjection;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("could not acquire lock on `{key}` within {waited_ms} ms")]
    LockTimeout { key: String, waited_ms: u64 },
}

/// When the persistent actor holds the per-subject lock.
///
/// The runtime never mandates a mode; callers pick one to match their
/// consistency needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockingMode {
    /// No locking at all.
    None,
    /// Lock acquired only around the snapshot write.
    WriteOnly,
    /// Lock held from snapshot read through write.
    #[default]
    ReadWrite,
}

xorca_core::simple_display! {
    LockingMode {
        None => "none",
        WriteOnly => "write-only",
        ReadWrite => "read-write",
    }
}

/// An abstract lockable key→bytes store.
///
/// `lock` is a non-blocking try-lock: it returns `false` when the key is
/// already held. Implementations must expire locks server-side after a
/// provider-defined TTL so a crashed activation cannot leak a lock forever.
#[async_trait]
pub trait LockableStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Write the blob together with its index projection. The default
    /// implementation discards the projection; stores with a queryable
    /// side-index override it.
    async fn write_indexed(
        &self,
        key: &str,
        bytes: Vec<u8>,
        index: IndexProjection,
    ) -> Result<(), StoreError> {
        let _ = index;
        self.write(key, bytes).await
    }

    async fn lock(&self, key: &str) -> Result<bool, StoreError>;

    async fn unlock(&self, key: &str) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S: LockableStore + ?Sized> LockableStore for std::sync::Arc<S> {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.as_ref().read(key).await
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.as_ref().write(key, bytes).await
    }

    async fn write_indexed(
        &self,
        key: &str,
        bytes: Vec<u8>,
        index: IndexProjection,
    ) -> Result<(), StoreError> {
        self.as_ref().write_indexed(key, bytes, index).await
    }

    async fn lock(&self, key: &str) -> Result<bool, StoreError> {
        self.as_ref().lock(key).await
    }

    async fn unlock(&self, key: &str) -> Result<bool, StoreError> {
        self.as_ref().unlock(key).await
    }
}
