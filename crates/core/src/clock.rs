// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction so history timestamps are deterministic under test.

use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time as milliseconds since the Unix epoch.
///
/// The interpreter stamps every history checkpoint and log record through
/// this trait, which is what makes snapshots reproducible in tests.
pub trait Clock: Clone + Send + Sync {
    fn epoch_ms(&self) -> u64;
}

/// Real system clock
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Fake clock with controllable time, for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone)]
pub struct FakeClock {
    epoch_ms: std::sync::Arc<parking_lot::Mutex<u64>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn new() -> Self {
        Self::at(1_000_000)
    }

    pub fn at(epoch_ms: u64) -> Self {
        Self { epoch_ms: std::sync::Arc::new(parking_lot::Mutex::new(epoch_ms)) }
    }

    /// Advance the clock by the given number of milliseconds.
    pub fn advance_ms(&self, ms: u64) {
        *self.epoch_ms.lock() += ms;
    }

    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
