// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine compilation: join a definition to its behavior table.
//!
//! Compilation walks the whole tree once, resolving every transition target
//! to a [`StatePath`], checking every guard/action/transformer/emit-handler
//! reference against the behavior table, and precompiling every declared
//! JSON schema. After `compile` succeeds the interpreter never has to
//! re-validate any of this at step time.

use semver::Version;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

use super::behavior::{builtin, MachineBehavior};
use super::def::{EmitSpec, MachineDefinition, StateNode, TransitionDef};
use super::path::StatePath;
use crate::schema::{CompiledSchema, SchemaError};
use crate::version;

#[derive(Debug, Error)]
pub enum MachineError {
    #[error("machine version `{0}` is not a plain MAJOR.MINOR.PATCH triple")]
    Version(String),

    #[error("state `{state}` declares unknown initial child `{initial}`")]
    UnknownInitial { state: String, initial: String },

    #[error("compound state `{0}` has children but no initial child")]
    MissingInitial(String),

    #[error("parallel state `{0}` has no regions")]
    EmptyParallel(String),

    #[error("region `{0}` of a parallel state must declare children")]
    AtomicRegion(String),

    #[error("final state `{0}` must not declare children")]
    FinalWithChildren(String),

    #[error("transition target `{target}` at `{state}` does not resolve to a state")]
    UnknownTarget { state: String, target: String },

    #[error("unknown guard `{guard}` referenced at `{state}`")]
    UnknownGuard { state: String, guard: String },

    #[error("unknown action `{action}` referenced at `{state}`")]
    UnknownAction { state: String, action: String },

    #[error("unknown transformer `{transformer}` referenced at `{state}`")]
    UnknownTransformer { state: String, transformer: String },

    #[error("unknown emit handler `{handler}` referenced at `{state}`")]
    UnknownEmitHandler { state: String, handler: String },

    #[error("schema at `{state}` is invalid: {source}")]
    Schema { state: String, source: SchemaError },
}

/// Identifies one transition inside a compiled machine.
///
/// `event` is `None` for a state's `onDone` transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub path: StatePath,
    pub event: Option<String>,
    pub index: usize,
}

impl TransitionKey {
    pub fn on(path: StatePath, event: impl Into<String>, index: usize) -> Self {
        Self { path, event: Some(event.into()), index }
    }

    pub fn done(path: StatePath) -> Self {
        Self { path, event: None, index: 0 }
    }
}

/// A compiled machine: definition + behavior + resolved lookup tables.
pub struct Machine {
    def: MachineDefinition,
    behavior: MachineBehavior,
    targets: HashMap<TransitionKey, StatePath>,
    event_schemas: HashMap<TransitionKey, CompiledSchema>,
    emit_schemas: HashMap<StatePath, CompiledSchema>,
}

impl Machine {
    pub fn compile(
        def: MachineDefinition,
        behavior: MachineBehavior,
    ) -> Result<Self, MachineError> {
        version::ensure_plain(&def.version)
            .map_err(|_| MachineError::Version(def.version.to_string()))?;

        let mut machine = Self {
            def,
            behavior,
            targets: HashMap::new(),
            event_schemas: HashMap::new(),
            emit_schemas: HashMap::new(),
        };

        if machine.def.states.len() > 1 {
            let initial = machine
                .def
                .initial
                .clone()
                .ok_or_else(|| MachineError::MissingInitial("<root>".to_string()))?;
            if !machine.def.states.contains_key(&initial) {
                return Err(MachineError::UnknownInitial {
                    state: "<root>".to_string(),
                    initial,
                });
            }
        }

        // Clone the tree for the walk so the checks can borrow `machine`
        // mutably for table inserts.
        let states = machine.def.states.clone();
        for (name, node) in &states {
            machine.check_state(&StatePath::root().child(name), node, false)?;
        }
        Ok(machine)
    }

    fn check_state(
        &mut self,
        path: &StatePath,
        node: &StateNode,
        is_region: bool,
    ) -> Result<(), MachineError> {
        let dotted = path.dotted();

        if node.is_final() && node.has_children() {
            return Err(MachineError::FinalWithChildren(dotted));
        }
        if is_region && !node.has_children() {
            return Err(MachineError::AtomicRegion(dotted));
        }

        match node.kind {
            super::def::StateKind::Parallel => {
                if !node.has_children() {
                    return Err(MachineError::EmptyParallel(dotted));
                }
            }
            super::def::StateKind::Compound if node.has_children() => {
                let initial = node
                    .initial
                    .clone()
                    .ok_or_else(|| MachineError::MissingInitial(dotted.clone()))?;
                if !node.states.contains_key(&initial) {
                    return Err(MachineError::UnknownInitial { state: dotted.clone(), initial });
                }
            }
            _ => {}
        }

        for action in node.entry.iter().chain(node.exit.iter()) {
            self.check_action(&dotted, action)?;
        }

        if let Some(EmitSpec::Handler(handler)) = &node.emit {
            if self.behavior.find_emitter(handler).is_none() {
                return Err(MachineError::UnknownEmitHandler {
                    state: dotted.clone(),
                    handler: handler.clone(),
                });
            }
        }

        if let Some(schema) = &node.emit_schema {
            let compiled = self.compile_schema(&dotted, schema)?;
            self.emit_schemas.insert(path.clone(), compiled);
        }

        for (event, transitions) in &node.on {
            for (index, transition) in transitions.iter().enumerate() {
                let key = TransitionKey::on(path.clone(), event.clone(), index);
                self.check_transition(&dotted, key, transition)?;
            }
        }
        if let Some(transition) = &node.on_done {
            let key = TransitionKey::done(path.clone());
            self.check_transition(&dotted, key, transition)?;
        }

        for (name, child) in &node.states {
            self.check_state(&path.child(name), child, node.is_parallel())?;
        }
        Ok(())
    }

    fn check_transition(
        &mut self,
        dotted: &str,
        key: TransitionKey,
        transition: &TransitionDef,
    ) -> Result<(), MachineError> {
        let target = StatePath::parse(&transition.target).map_err(|_| {
            MachineError::UnknownTarget { state: dotted.to_string(), target: transition.target.clone() }
        })?;
        if target.is_root() || self.def.node(&target).is_none() {
            return Err(MachineError::UnknownTarget {
                state: dotted.to_string(),
                target: transition.target.clone(),
            });
        }

        if let Some(guard) = &transition.guard {
            if self.behavior.find_guard(guard).is_none() {
                return Err(MachineError::UnknownGuard {
                    state: dotted.to_string(),
                    guard: guard.clone(),
                });
            }
        }
        for action in &transition.actions {
            self.check_action(dotted, action)?;
        }
        if let Some(transformer) = &transition.transformer {
            if self.behavior.find_transformer(transformer).is_none() {
                return Err(MachineError::UnknownTransformer {
                    state: dotted.to_string(),
                    transformer: transformer.clone(),
                });
            }
        }
        if let Some(schema) = &transition.event_schema {
            let compiled = self.compile_schema(dotted, schema)?;
            self.event_schemas.insert(key.clone(), compiled);
        }

        self.targets.insert(key, target);
        Ok(())
    }

    fn check_action(&self, state: &str, action: &str) -> Result<(), MachineError> {
        if builtin::is_builtin(action) || self.behavior.find_action(action).is_some() {
            return Ok(());
        }
        Err(MachineError::UnknownAction { state: state.to_string(), action: action.to_string() })
    }

    fn compile_schema(&self, state: &str, schema: &Value) -> Result<CompiledSchema, MachineError> {
        CompiledSchema::compile(schema.clone())
            .map_err(|source| MachineError::Schema { state: state.to_string(), source })
    }

    pub fn definition(&self) -> &MachineDefinition {
        &self.def
    }

    pub fn behavior(&self) -> &MachineBehavior {
        &self.behavior
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn version(&self) -> &Version {
        &self.def.version
    }

    /// Resolved target of a transition; present for every key compilation
    /// accepted.
    pub fn target(&self, key: &TransitionKey) -> Option<&StatePath> {
        self.targets.get(key)
    }

    /// Validate inbound event data against the transition's declared
    /// schema, if any.
    pub fn validate_event(&self, key: &TransitionKey, data: &Value) -> Result<(), SchemaError> {
        match self.event_schemas.get(key) {
            Some(schema) => {
                let context = format!(
                    "event `{}` at `{}`",
                    key.event.as_deref().unwrap_or("onDone"),
                    key.path.dotted()
                );
                schema.check(data, &context)
            }
            None => Ok(()),
        }
    }

    /// Validate emitted data against the state's declared schema, if any.
    pub fn validate_emitted(&self, path: &StatePath, data: &Value) -> Result<(), SchemaError> {
        match self.emit_schemas.get(path) {
            Some(schema) => {
                let context = format!("data emitted by `{}`", path.dotted());
                schema.check(data, &context)
            }
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("name", &self.def.name)
            .field("version", &self.def.version)
            .field("states", &self.def.states.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "compile_tests.rs"]
mod tests;
