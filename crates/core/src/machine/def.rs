// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Serializable machine definitions.
//!
//! A definition is pure data: states reference their guards, actions, and
//! emit handlers by string identifier, and transition targets are dotted
//! path strings resolved at compile time. That keeps the whole tree
//! serde-serializable with no back-pointers and no closures.

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::StatePath;

/// How a state composes its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// One active child at a time. A compound with no children is a plain
    /// atomic state.
    #[default]
    Compound,
    /// Every child (region) active at once.
    Parallel,
    /// Terminates its region.
    Final,
}

crate::simple_display! {
    StateKind {
        Compound => "compound",
        Parallel => "parallel",
        Final => "final",
    }
}

/// What a state emits when newly entered.
///
/// Serializes externally tagged: `{"topic": "cmd.x"}` or
/// `{"handler": "emitX"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmitSpec {
    /// Fixed outbound type; payload defaults to the public context unless
    /// state middleware overrides it.
    Topic(String),
    /// Behavior callback producing `(type, data)`.
    Handler(String),
}

/// One outgoing transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionDef {
    /// Dotted absolute path of the target state.
    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,

    /// Action identifiers, run in order between exit and entry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,

    /// JSON schema the inbound event data must satisfy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_schema: Option<Value>,

    /// Transformer applied to the event data before actions see it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<String>,
}

impl TransitionDef {
    pub fn to(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            guard: None,
            actions: Vec::new(),
            event_schema: None,
            transformer: None,
        }
    }

    pub fn guarded(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn event_schema(mut self, schema: Value) -> Self {
        self.event_schema = Some(schema);
        self
    }

    pub fn transformer(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = Some(transformer.into());
        self
    }
}

/// One state in the tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StateNode {
    #[serde(rename = "type")]
    pub kind: StateKind,

    /// Child entered when this compound state is entered without an
    /// explicit deeper target.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,

    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub states: IndexMap<String, StateNode>,

    /// Action identifiers run when the state is entered.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<String>,

    /// Action identifiers run when the state is exited.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exit: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit: Option<EmitSpec>,

    /// JSON schema the emitted data must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emit_schema: Option<Value>,

    /// Accepted event types, each with one or more candidate transitions in
    /// declaration order.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub on: IndexMap<String, Vec<TransitionDef>>,

    /// Taken when every region of this parallel state reaches a final
    /// child.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_done: Option<TransitionDef>,
}

impl StateNode {
    pub fn compound() -> Self {
        Self::default()
    }

    pub fn parallel() -> Self {
        Self { kind: StateKind::Parallel, ..Self::default() }
    }

    pub fn final_state() -> Self {
        Self { kind: StateKind::Final, ..Self::default() }
    }

    pub fn initial(mut self, child: impl Into<String>) -> Self {
        self.initial = Some(child.into());
        self
    }

    pub fn state(mut self, name: impl Into<String>, node: StateNode) -> Self {
        self.states.insert(name.into(), node);
        self
    }

    pub fn entry(mut self, action: impl Into<String>) -> Self {
        self.entry.push(action.into());
        self
    }

    pub fn exit(mut self, action: impl Into<String>) -> Self {
        self.exit.push(action.into());
        self
    }

    pub fn emit_topic(mut self, topic: impl Into<String>) -> Self {
        self.emit = Some(EmitSpec::Topic(topic.into()));
        self
    }

    pub fn emit_handler(mut self, handler: impl Into<String>) -> Self {
        self.emit = Some(EmitSpec::Handler(handler.into()));
        self
    }

    pub fn emit_schema(mut self, schema: Value) -> Self {
        self.emit_schema = Some(schema);
        self
    }

    pub fn on(mut self, event_type: impl Into<String>, transition: TransitionDef) -> Self {
        self.on.entry(event_type.into()).or_default().push(transition);
        self
    }

    pub fn on_done(mut self, transition: TransitionDef) -> Self {
        self.on_done = Some(transition);
        self
    }

    pub fn is_final(&self) -> bool {
        self.kind == StateKind::Final
    }

    pub fn is_parallel(&self) -> bool {
        self.kind == StateKind::Parallel
    }

    pub fn has_children(&self) -> bool {
        !self.states.is_empty()
    }
}

/// A complete machine, identified by `(name, version)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDefinition {
    pub name: String,

    pub version: Version,

    /// Top-level state entered first. May be omitted when there is exactly
    /// one top-level state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<String>,

    pub states: IndexMap<String, StateNode>,
}

impl MachineDefinition {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self { name: name.into(), version, initial: None, states: IndexMap::new() }
    }

    pub fn initial(mut self, state: impl Into<String>) -> Self {
        self.initial = Some(state.into());
        self
    }

    pub fn state(mut self, name: impl Into<String>, node: StateNode) -> Self {
        self.states.insert(name.into(), node);
        self
    }

    /// Look up a state by path; the root path has no node.
    pub fn node(&self, path: &StatePath) -> Option<&StateNode> {
        let (first, rest) = path.segments().split_first()?;
        let mut node = self.states.get(first)?;
        for segment in rest {
            node = node.states.get(segment)?;
        }
        Some(node)
    }

    /// Child map at `path` (the root's children for the root path).
    pub fn children(&self, path: &StatePath) -> Option<&IndexMap<String, StateNode>> {
        if path.is_root() {
            return Some(&self.states);
        }
        self.node(path).map(|n| &n.states)
    }

    /// Position of `path` in document order, one child index per level.
    ///
    /// Returns `None` when the path does not resolve.
    pub fn doc_index(&self, path: &StatePath) -> Option<Vec<usize>> {
        let mut indices = Vec::with_capacity(path.depth());
        let mut states = &self.states;
        for segment in path.segments() {
            let (index, _, node) = states.get_full(segment.as_str())?;
            indices.push(index);
            states = &node.states;
        }
        Some(indices)
    }
}

#[cfg(test)]
#[path = "def_tests.rs"]
mod tests;
