// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration middleware: string-keyed callback maps.
//!
//! `on_event` rewrites inbound event data before the machine ingests it;
//! `on_state` produces the outbound `{type, data}` when a state path is
//! newly entered. Lookup is by computed key at dispatch time; there is no
//! runtime patching.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use xorca_core::machine::BehaviorError;
use xorca_core::snapshot::Context;

/// Outbound message produced by state middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedMessage {
    pub event_type: String,
    pub data: Value,
}

pub type EventTransformer = Arc<dyn Fn(Value) -> Result<Value, BehaviorError> + Send + Sync>;
pub type StateEmitter =
    Arc<dyn Fn(&Context) -> Result<EmittedMessage, BehaviorError> + Send + Sync>;

/// The two middleware maps consulted by the orchestration actor.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    on_event: HashMap<String, EventTransformer>,
    on_state: HashMap<String, StateEmitter>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform inbound data for one event type.
    pub fn on_event<F>(mut self, event_type: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, BehaviorError> + Send + Sync + 'static,
    {
        self.on_event.insert(event_type.into(), Arc::new(f));
        self
    }

    /// Produce the outbound message for one dotted state path
    /// (`#A.#B.leaf`; top-level leaves are bare names).
    pub fn on_state<F>(mut self, state_path: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Context) -> Result<EmittedMessage, BehaviorError> + Send + Sync + 'static,
    {
        self.on_state.insert(state_path.into(), Arc::new(f));
        self
    }

    pub fn event_transformer(&self, event_type: &str) -> Option<&EventTransformer> {
        self.on_event.get(event_type)
    }

    pub fn state_emitter(&self, state_path: &str) -> Option<&StateEmitter> {
        self.on_state.get(state_path)
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut on_event: Vec<_> = self.on_event.keys().collect();
        on_event.sort();
        let mut on_state: Vec<_> = self.on_state.keys().collect();
        on_state.sort();
        f.debug_struct("MiddlewareStack")
            .field("on_event", &on_event)
            .field("on_state", &on_state)
            .finish()
    }
}
