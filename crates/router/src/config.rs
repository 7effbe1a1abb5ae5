// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router configuration.

use xorca_storage::{LockBudget, LockingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Locking discipline the actors open with. Defaults to read-write,
    /// the safe choice for concurrent activations.
    pub locking: LockingMode,

    pub lock_budget: LockBudget,

    /// Produce an error envelope for types no handler matches instead of
    /// dropping them.
    pub error_on_not_found: bool,

    /// Produce an error envelope when a subject names another
    /// orchestrator; when false such envelopes are dropped with a warning.
    pub raise_on_invalid_orchestrator_name: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            locking: LockingMode::ReadWrite,
            lock_budget: LockBudget::default(),
            error_on_not_found: true,
            raise_on_invalid_orchestrator_name: true,
        }
    }
}
