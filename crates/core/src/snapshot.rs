// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshots: the persisted state of one orchestration.
//!
//! The wire format ([`SnapshotRecord`]) is explicit and independent of the
//! interpreter's in-memory shape. On load the interpreter rebuilds its own
//! [`Configuration`] from the hierarchical [`StateValue`] and reinjects the
//! reserved context keys; on save reserved keys are stripped back out.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::machine::{MachineDefinition, StatePath};

/// Delta yielded by an action, shallow-merged into the context.
pub type ContextDelta = Map<String, Value>;

/// Reserved context keys. The interpreter owns them; machine authors read
/// them through the typed accessors on [`Context`] and never write them.
pub mod reserved {
    pub const TRACE_ID: &str = "__traceId";
    pub const MACHINE_LOGS: &str = "__machineLogs";
    pub const CLOUDEVENT: &str = "__cloudevent";
    pub const ORCHESTRATION_TIME: &str = "__orchestrationTime";
    pub const CUMULATIVE_EXECUTION_UNITS: &str = "__cumulativeExecutionUnits";

    pub const ALL: [&str; 5] =
        [TRACE_ID, MACHINE_LOGS, CLOUDEVENT, ORCHESTRATION_TIME, CUMULATIVE_EXECUTION_UNITS];

    pub fn is_reserved(key: &str) -> bool {
        ALL.contains(&key)
    }
}

/// Where the orchestration stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationStatus {
    #[default]
    Active,
    Done,
    Error,
}

crate::simple_display! {
    OrchestrationStatus {
        Active => "active",
        Done => "done",
        Error => "error",
    }
}

/// One history entry per processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub event_type: String,
    pub start_ms: u64,
    pub checkpoint_ms: u64,
    pub elapsed_ms: u64,
}

/// One log record per processed event (plus whatever `updateLogs` appends).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub at_ms: u64,
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entered: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Hierarchical active-state configuration, as persisted.
///
/// A compound level is either a bare child name (`"FetchData"`) or a
/// one-key object descending into it; a parallel level is an object with
/// one key per region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Leaf(String),
    Branch(IndexMap<String, StateValue>),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("state `{0}` does not exist in the machine")]
    UnknownState(String),

    #[error("compound level `{0}` must have exactly one active child")]
    MultipleActiveChildren(String),

    #[error("parallel state `{0}` must list every region as active")]
    RegionMismatch(String),

    #[error("state `{0}` has children, the configuration must descend into it")]
    MissingDescent(String),

    #[error("state `{0}` has no children, the configuration must not descend into it")]
    UnexpectedDescent(String),
}

/// The interpreter's own view of a [`StateValue`]: the active leaves in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    leaves: Vec<StatePath>,
}

impl Configuration {
    /// Build from leaves, normalizing to document order.
    pub fn from_leaves(def: &MachineDefinition, leaves: Vec<StatePath>) -> Self {
        let mut leaves = leaves;
        leaves.sort_by_key(|path| def.doc_index(path).unwrap_or_default());
        leaves.dedup();
        Self { leaves }
    }

    /// Rebuild from the persisted form, checking legality against the
    /// machine.
    pub fn from_value(
        def: &MachineDefinition,
        value: &StateValue,
    ) -> Result<Self, ConfigurationError> {
        let mut leaves = Vec::new();
        walk_value(def, &StatePath::root(), value, &mut leaves)?;
        Ok(Self::from_leaves(def, leaves))
    }

    pub fn leaves(&self) -> &[StatePath] {
        &self.leaves
    }

    /// Every active state path, ancestors included.
    pub fn active_set(&self) -> BTreeSet<StatePath> {
        let mut set = BTreeSet::new();
        for leaf in &self.leaves {
            for path in leaf.ancestry() {
                set.insert(path);
            }
        }
        set
    }

    /// Done iff every active leaf is a final state.
    pub fn is_done(&self, def: &MachineDefinition) -> bool {
        !self.leaves.is_empty()
            && self
                .leaves
                .iter()
                .all(|leaf| def.node(leaf).map(|n| n.is_final()).unwrap_or(false))
    }

    /// Collapse back into the persisted form.
    pub fn to_value(&self) -> StateValue {
        let suffixes: Vec<&[String]> = self.leaves.iter().map(|p| p.segments()).collect();
        build_value(&suffixes)
    }
}

fn walk_value(
    def: &MachineDefinition,
    parent: &StatePath,
    value: &StateValue,
    leaves: &mut Vec<StatePath>,
) -> Result<(), ConfigurationError> {
    let children = def
        .children(parent)
        .ok_or_else(|| ConfigurationError::UnknownState(parent.dotted()))?;
    let parallel = def.node(parent).map(|n| n.is_parallel()).unwrap_or(false);

    match value {
        StateValue::Leaf(name) => {
            if parallel {
                return Err(ConfigurationError::RegionMismatch(parent.dotted()));
            }
            let node = children
                .get(name)
                .ok_or_else(|| ConfigurationError::UnknownState(parent.child(name).dotted()))?;
            if node.has_children() {
                return Err(ConfigurationError::MissingDescent(parent.child(name).dotted()));
            }
            leaves.push(parent.child(name));
        }
        StateValue::Branch(map) => {
            if parallel {
                let all_regions = map.len() == children.len()
                    && children.keys().all(|k| map.contains_key(k.as_str()));
                if !all_regions {
                    return Err(ConfigurationError::RegionMismatch(parent.dotted()));
                }
            } else if map.len() != 1 {
                return Err(ConfigurationError::MultipleActiveChildren(parent.dotted()));
            }
            for (name, sub) in map {
                let child = parent.child(name);
                let node = children
                    .get(name)
                    .ok_or_else(|| ConfigurationError::UnknownState(child.dotted()))?;
                if !node.has_children() {
                    return Err(ConfigurationError::UnexpectedDescent(child.dotted()));
                }
                walk_value(def, &child, sub, leaves)?;
            }
        }
    }
    Ok(())
}

fn build_value(suffixes: &[&[String]]) -> StateValue {
    let mut groups: IndexMap<&str, Vec<&[String]>> = IndexMap::new();
    for suffix in suffixes {
        if let Some((first, rest)) = suffix.split_first() {
            groups.entry(first.as_str()).or_default().push(rest);
        }
    }

    let single = groups.len() == 1;
    let mut map = IndexMap::new();
    for (name, subs) in groups {
        let deeper: Vec<&[String]> = subs.into_iter().filter(|s| !s.is_empty()).collect();
        if single && deeper.is_empty() {
            return StateValue::Leaf(name.to_string());
        }
        let sub_value = if deeper.is_empty() {
            StateValue::Leaf(name.to_string())
        } else {
            build_value(&deeper)
        };
        map.insert(name.to_string(), sub_value);
    }
    StateValue::Branch(map)
}

/// The mutable orchestration context: user keys plus the reserved mirrors.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from user input, silently dropping any reserved keys.
    pub fn from_input(input: Map<String, Value>) -> Self {
        let mut map = Map::new();
        for (key, value) in input {
            if reserved::is_reserved(&key) {
                tracing::debug!(key, "dropping reserved key from initial context");
                continue;
            }
            map.insert(key, value);
        }
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set one user key. Reserved keys are refused.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if reserved::is_reserved(&key) {
            tracing::debug!(key, "refusing direct write to reserved context key");
            return;
        }
        self.0.insert(key, value);
    }

    /// Shallow-merge an action delta; reserved keys are not writable this
    /// way.
    pub fn merge_delta(&mut self, delta: ContextDelta) {
        for (key, value) in delta {
            if reserved::is_reserved(&key) {
                tracing::debug!(key, "action delta tried to write a reserved key; skipped");
                continue;
            }
            self.0.insert(key, value);
        }
    }

    /// User-visible keys only.
    pub fn public(&self) -> Map<String, Value> {
        self.0
            .iter()
            .filter(|(key, _)| !reserved::is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    // -- typed accessors for the reserved keys --

    pub fn trace_id(&self) -> Option<&str> {
        self.0.get(reserved::TRACE_ID).and_then(Value::as_str)
    }

    pub fn cloudevent(&self) -> Option<&Value> {
        self.0.get(reserved::CLOUDEVENT)
    }

    pub fn machine_logs(&self) -> Vec<LogRecord> {
        self.0
            .get(reserved::MACHINE_LOGS)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn orchestration_time(&self) -> Vec<Checkpoint> {
        self.0
            .get(reserved::ORCHESTRATION_TIME)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    pub fn execution_units(&self) -> u64 {
        self.0
            .get(reserved::CUMULATIVE_EXECUTION_UNITS)
            .and_then(Value::as_u64)
            .unwrap_or_default()
    }

    pub(crate) fn set_reserved(&mut self, key: &'static str, value: Value) {
        self.0.insert(key.to_string(), value);
    }
}

/// In-memory snapshot of one orchestration.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub value: StateValue,
    pub context: Context,
    pub status: OrchestrationStatus,
    pub history: Vec<Checkpoint>,
    pub logs: Vec<LogRecord>,
    pub execution_units: u64,
    pub trace_id: String,
}

impl Snapshot {
    /// Mirror the framework-owned fields into the reserved context keys so
    /// guards and actions can read them through the typed accessors.
    pub fn sync_reserved(&mut self) {
        self.context
            .set_reserved(reserved::TRACE_ID, Value::String(self.trace_id.clone()));
        self.context.set_reserved(
            reserved::MACHINE_LOGS,
            serde_json::to_value(&self.logs).unwrap_or_default(),
        );
        self.context.set_reserved(
            reserved::ORCHESTRATION_TIME,
            serde_json::to_value(&self.history).unwrap_or_default(),
        );
        self.context.set_reserved(
            reserved::CUMULATIVE_EXECUTION_UNITS,
            Value::from(self.execution_units),
        );
    }

    pub fn to_record(&self) -> SnapshotRecord {
        SnapshotRecord {
            value: self.value.clone(),
            context: self.context.public(),
            status: self.status,
            history: self.history.clone(),
            logs: self.logs.clone(),
            execution_units: self.execution_units,
            trace_id: self.trace_id.clone(),
        }
    }

    pub fn from_record(record: SnapshotRecord) -> Self {
        let mut snapshot = Self {
            value: record.value,
            context: Context::from_input(record.context),
            status: record.status,
            history: record.history,
            logs: record.logs,
            execution_units: record.execution_units,
            trace_id: record.trace_id,
        };
        snapshot.sync_reserved();
        snapshot
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.to_record())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice::<SnapshotRecord>(bytes).map(Self::from_record)
    }
}

/// The explicit on-the-wire snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotRecord {
    pub value: StateValue,

    /// Public context only; reserved keys live in the sibling fields.
    #[serde(default)]
    pub context: Map<String, Value>,

    pub status: OrchestrationStatus,

    #[serde(default)]
    pub history: Vec<Checkpoint>,

    #[serde(default)]
    pub logs: Vec<LogRecord>,

    #[serde(default)]
    pub execution_units: u64,

    #[serde(default)]
    pub trace_id: String,
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
