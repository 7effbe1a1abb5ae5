// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions.
//!
//! Minted identifiers show up in three places: process ids for freshly
//! started orchestrations, envelope ids on outbound events, and trace ids
//! when an inbound envelope carries no trace context. Routing them through
//! [`IdGen`] keeps all three deterministic in tests.

/// Mints opaque unique identifiers.
pub trait IdGen: Send + Sync {
    /// A new unique id.
    fn mint(&self) -> String;

    /// A new 32-hex-digit trace id.
    fn mint_trace_id(&self) -> String {
        self.mint().replace('-', "")
    }
}

/// UUIDv4-backed generator, the production default.
#[derive(Clone, Copy, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn mint(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn mint_trace_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Sequential generator with a fixed prefix, for tests.
///
/// Mints `<prefix>-1`, `<prefix>-2`, ... so assertions can name exact ids.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone)]
pub struct FixedIdGen {
    prefix: String,
    counter: std::sync::Arc<parking_lot::Mutex<u64>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FixedIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: std::sync::Arc::new(parking_lot::Mutex::new(0)),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl IdGen for FixedIdGen {
    fn mint(&self) -> String {
        let mut counter = self.counter.lock();
        *counter += 1;
        format!("{}-{}", self.prefix, counter)
    }

    fn mint_trace_id(&self) -> String {
        // Fixed-width hex so the traceparent grammar still holds in tests.
        let mut counter = self.counter.lock();
        *counter += 1;
        format!("{:032x}", *counter)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
