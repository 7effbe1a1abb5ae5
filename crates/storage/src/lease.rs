// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded retry around the store's non-blocking try-lock.

use std::time::Duration;

use crate::store::{LockableStore, StoreError};

/// How long and how often to retry lock acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockBudget {
    /// Total time to keep trying before giving up.
    pub timeout: Duration,
    /// Pause between attempts.
    pub retry_delay: Duration,
}

impl Default for LockBudget {
    fn default() -> Self {
        Self { timeout: Duration::from_millis(5_000), retry_delay: Duration::from_millis(200) }
    }
}

impl LockBudget {
    /// Budget with a caller-supplied total timeout and the default delay.
    pub fn from_timeout(timeout: Duration) -> Self {
        Self { timeout, ..Self::default() }
    }

    /// Number of attempts the budget affords, at least one.
    pub fn attempts(&self) -> u32 {
        let delay_ms = self.retry_delay.as_millis().max(1);
        let attempts = self.timeout.as_millis().div_ceil(delay_ms);
        (attempts as u32).max(1)
    }
}

/// Try to take the lock on `key`, retrying until the budget is exhausted.
pub async fn acquire_lock<S: LockableStore + ?Sized>(
    store: &S,
    key: &str,
    budget: LockBudget,
) -> Result<(), StoreError> {
    let attempts = budget.attempts();
    for attempt in 1..=attempts {
        if store.lock(key).await? {
            if attempt > 1 {
                tracing::debug!(key, attempt, "lock acquired after contention");
            }
            return Ok(());
        }
        if attempt < attempts {
            tokio::time::sleep(budget.retry_delay).await;
        }
    }
    tracing::warn!(key, attempts, "lock acquisition budget exhausted");
    Err(StoreError::LockTimeout { key: key.to_string(), waited_ms: budget.timeout.as_millis() as u64 })
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod tests;
