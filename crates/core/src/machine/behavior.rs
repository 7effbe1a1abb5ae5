// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Behavior tables: the functions behind a definition's string identifiers.
//!
//! Guards and actions are value objects with a stable identifier and a pure
//! function. The definition stores only the identifier, so it stays
//! serializable; compilation joins identifiers to functions and rejects
//! dangling references.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::snapshot::{Context, ContextDelta};

/// An event as the machine sees it: the envelope's type plus its (possibly
/// transformed) data.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineEvent {
    pub event_type: String,
    pub data: Value,
    /// The raw inbound envelope, exposed to behaviors under the
    /// `__cloudevent` reserved key.
    pub raw: Option<Value>,
}

impl MachineEvent {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self { event_type: event_type.into(), data, raw: None }
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }
}

/// Failure raised by a user-supplied guard, action, transformer, or emit
/// handler. Aborts the step; the snapshot must not be persisted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct BehaviorError {
    pub message: String,
}

impl BehaviorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

pub type GuardFn = Arc<dyn Fn(&Context, &MachineEvent) -> Result<bool, BehaviorError> + Send + Sync>;
pub type ActionFn =
    Arc<dyn Fn(&Context, &MachineEvent) -> Result<ContextDelta, BehaviorError> + Send + Sync>;
pub type TransformerFn = Arc<dyn Fn(Value) -> Result<Value, BehaviorError> + Send + Sync>;
pub type EmitFn =
    Arc<dyn Fn(&Context, &MachineEvent) -> Result<(String, Value), BehaviorError> + Send + Sync>;

/// Identifiers of the built-in actions the interpreter owns. A transition
/// may reference them by name without registering anything.
pub mod builtin {
    /// Shallow-merge the event data (sans `type`) into the context.
    pub const UPDATE_CONTEXT: &str = "updateContext";
    /// Append a log record carrying the event data.
    pub const UPDATE_LOGS: &str = "updateLogs";
    /// Append an orchestration-time checkpoint.
    pub const UPDATE_CHECKPOINT: &str = "updateCheckpoint";

    pub fn is_builtin(name: &str) -> bool {
        matches!(name, UPDATE_CONTEXT | UPDATE_LOGS | UPDATE_CHECKPOINT)
    }
}

/// Identifier → function tables for one machine.
#[derive(Clone, Default)]
pub struct MachineBehavior {
    guards: HashMap<String, GuardFn>,
    actions: HashMap<String, ActionFn>,
    transformers: HashMap<String, TransformerFn>,
    emitters: HashMap<String, EmitFn>,
}

impl MachineBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &MachineEvent) -> Result<bool, BehaviorError> + Send + Sync + 'static,
    {
        self.guards.insert(name.into(), Arc::new(f));
        self
    }

    pub fn action<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &MachineEvent) -> Result<ContextDelta, BehaviorError>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn transformer<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BehaviorError> + Send + Sync + 'static,
    {
        self.transformers.insert(name.into(), Arc::new(f));
        self
    }

    pub fn emitter<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context, &MachineEvent) -> Result<(String, Value), BehaviorError>
            + Send
            + Sync
            + 'static,
    {
        self.emitters.insert(name.into(), Arc::new(f));
        self
    }

    pub fn find_guard(&self, name: &str) -> Option<&GuardFn> {
        self.guards.get(name)
    }

    pub fn find_action(&self, name: &str) -> Option<&ActionFn> {
        self.actions.get(name)
    }

    pub fn find_transformer(&self, name: &str) -> Option<&TransformerFn> {
        self.transformers.get(name)
    }

    pub fn find_emitter(&self, name: &str) -> Option<&EmitFn> {
        self.emitters.get(name)
    }
}

impl std::fmt::Debug for MachineBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn names(map_keys: Vec<&String>) -> Vec<&String> {
            let mut keys = map_keys;
            keys.sort();
            keys
        }
        f.debug_struct("MachineBehavior")
            .field("guards", &names(self.guards.keys().collect()))
            .field("actions", &names(self.actions.keys().collect()))
            .field("transformers", &names(self.transformers.keys().collect()))
            .field("emitters", &names(self.emitters.keys().collect()))
            .finish()
    }
}

#[cfg(test)]
#[path = "behavior_tests.rs"]
mod tests;
