// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Failure-injecting store wrappers for tests in this crate and above.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::projection::IndexProjection;
use crate::store::{LockableStore, StoreError};

/// Which operations of a [`FlakyStore`] fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FailurePlan {
    pub fail_reads: bool,
    pub fail_writes: bool,
    pub fail_locks: bool,
}

/// Wraps any store and fails selected operations with a backend error.
pub struct FlakyStore<S> {
    inner: S,
    plan: Arc<Mutex<FailurePlan>>,
}

impl<S> FlakyStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, plan: Arc::new(Mutex::new(FailurePlan::default())) }
    }

    pub fn set_plan(&self, plan: FailurePlan) {
        *self.plan.lock() = plan;
    }

    fn fail(op: &str) -> StoreError {
        StoreError::Backend(format!("injected {op} failure"))
    }
}

#[async_trait]
impl<S: LockableStore> LockableStore for FlakyStore<S> {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.plan.lock().fail_reads {
            return Err(Self::fail("read"));
        }
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        if self.plan.lock().fail_writes {
            return Err(Self::fail("write"));
        }
        self.inner.write(key, bytes).await
    }

    async fn write_indexed(
        &self,
        key: &str,
        bytes: Vec<u8>,
        index: IndexProjection,
    ) -> Result<(), StoreError> {
        if self.plan.lock().fail_writes {
            return Err(Self::fail("write"));
        }
        self.inner.write_indexed(key, bytes, index).await
    }

    async fn lock(&self, key: &str) -> Result<bool, StoreError> {
        if self.plan.lock().fail_locks {
            return Err(Self::fail("lock"));
        }
        self.inner.lock(key).await
    }

    async fn unlock(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.unlock(key).await
    }
}

/// A store whose try-lock always reports contention.
pub struct ContendedStore<S> {
    inner: S,
}

impl<S> ContendedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: LockableStore> LockableStore for ContendedStore<S> {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.read(key).await
    }

    async fn write(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        self.inner.write(key, bytes).await
    }

    async fn lock(&self, _key: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    async fn unlock(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.unlock(key).await
    }
}
