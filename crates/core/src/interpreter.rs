// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The machine interpreter.
//!
//! A synchronous function of `(machine, snapshot, event)` to
//! `(snapshot, newly-entered states, emissions)`. Nothing here suspends;
//! persistence and envelope plumbing live in the crates above.
//!
//! Transition selection follows the innermost-leaf-wins rule: each active
//! leaf walks itself and then its ancestors for the first state accepting
//! the event type, and within one state the first declared transition with
//! a satisfied guard is taken. Unmatched events are ignored, though the
//! framework-owned history and log bookkeeping still runs.

use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use thiserror::Error;

use crate::clock::Clock;
use crate::machine::{
    builtin, BehaviorError, EmitSpec, Machine, MachineEvent, StatePath, TransitionDef,
    TransitionKey,
};
use crate::schema::SchemaError;
use crate::snapshot::{
    reserved, Checkpoint, Configuration, ConfigurationError, Context, LogRecord,
    OrchestrationStatus, Snapshot,
};

/// Synthetic event type recorded for the initial descent.
pub const INIT_EVENT: &str = "init";

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("guard `{name}` at `{state}` failed")]
    Guard { name: String, state: String, source: BehaviorError },

    #[error("action `{name}` at `{state}` failed")]
    Action { name: String, state: String, source: BehaviorError },

    #[error("transformer `{name}` failed")]
    Transformer { name: String, source: BehaviorError },

    #[error("emit handler `{name}` at `{state}` failed")]
    Emit { name: String, state: String, source: BehaviorError },

    #[error("transition target for `{0}` vanished after compilation")]
    MissingTarget(String),
}

/// An outbound event the machine asked for.
///
/// `data` is `None` for fixed-topic emissions: the payload is resolved at
/// materialization (state middleware, falling back to the public context).
#[derive(Debug, Clone, PartialEq)]
pub struct MachineEmission {
    pub path: StatePath,
    pub topic: String,
    pub data: Option<Value>,
}

/// Result of one interpreter run.
#[derive(Debug, Clone)]
pub struct StepOutput {
    pub snapshot: Snapshot,
    /// State paths newly entered by this step, in entry order.
    pub entered: Vec<StatePath>,
    pub emissions: Vec<MachineEmission>,
}

/// Mutable working set of one step.
struct StepCtx {
    active: BTreeSet<StatePath>,
    entered: Vec<StatePath>,
    context: Context,
    history: Vec<Checkpoint>,
    logs: Vec<LogRecord>,
    execution_units: u64,
    now: u64,
}

pub struct Interpreter<C: Clock> {
    machine: Arc<Machine>,
    clock: C,
}

impl<C: Clock> Interpreter<C> {
    pub fn new(machine: Arc<Machine>, clock: C) -> Self {
        Self { machine, clock }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Build the initial snapshot: descend from the root entering every
    /// `initial` child (and every parallel region), run entry actions, and
    /// collect emissions for the entered states.
    pub fn init(
        &self,
        input: Map<String, Value>,
        trace_id: &str,
    ) -> Result<StepOutput, InterpretError> {
        let def = self.machine.definition();
        let now = self.clock.epoch_ms();
        let mut ctx = StepCtx {
            active: BTreeSet::new(),
            entered: Vec::new(),
            context: Context::from_input(input),
            history: Vec::new(),
            logs: Vec::new(),
            execution_units: 0,
            now,
        };
        let event = MachineEvent::new(INIT_EVENT, Value::Null);

        let root_initial = def
            .initial
            .clone()
            .or_else(|| def.states.keys().next().cloned())
            .ok_or_else(|| ConfigurationError::UnknownState(String::new()))?;
        let top = StatePath::root().child(root_initial);
        self.enter_state(&mut ctx, &top, &event)?;
        self.enter_initial(&mut ctx, &top, &event)?;

        ctx.history.push(Checkpoint {
            event_type: INIT_EVENT.to_string(),
            start_ms: now,
            checkpoint_ms: now,
            elapsed_ms: 0,
        });

        let entered = ctx.entered.clone();
        self.finish(ctx, trace_id.to_string(), entered, &event, false)
    }

    /// Apply one event to a rehydrated snapshot.
    pub fn step(
        &self,
        snapshot: &Snapshot,
        event: &MachineEvent,
    ) -> Result<StepOutput, InterpretError> {
        let def = self.machine.definition();
        let config = Configuration::from_value(def, &snapshot.value)?;
        let now = self.clock.epoch_ms();

        let mut ctx = StepCtx {
            active: config.active_set(),
            entered: Vec::new(),
            context: snapshot.context.clone(),
            history: snapshot.history.clone(),
            logs: snapshot.logs.clone(),
            execution_units: snapshot.execution_units,
            now,
        };
        let old_active = ctx.active.clone();
        if let Some(raw) = &event.raw {
            ctx.context.set_reserved(reserved::CLOUDEVENT, raw.clone());
        }

        // Selection: innermost leaf first, then ancestors; first declared
        // transition with a satisfied guard wins; shared ancestor
        // transitions deduplicate across parallel leaves.
        let mut selected: Vec<TransitionKey> = Vec::new();
        for leaf in config.leaves() {
            'leaf: for path in leaf.self_and_ancestors() {
                let Some(node) = def.node(&path) else { continue };
                let Some(transitions) = node.on.get(&event.event_type) else { continue };
                for (index, transition) in transitions.iter().enumerate() {
                    if self.guard_passes(transition, &ctx.context, event, &path)? {
                        let key = TransitionKey::on(path.clone(), event.event_type.clone(), index);
                        if !selected.contains(&key) {
                            selected.push(key);
                        }
                        break 'leaf;
                    }
                }
            }
        }

        // Declared event schemas are checked before any mutation.
        for key in &selected {
            self.machine.validate_event(key, &event.data)?;
        }

        for key in &selected {
            // A prior transition in this step may have exited the source.
            if !ctx.active.contains(&key.path) {
                continue;
            }
            let Some(transition) = self.transition_def(key) else {
                return Err(InterpretError::MissingTarget(key.path.dotted()));
            };
            self.execute_transition(&mut ctx, key, &transition, event)?;
        }

        self.run_done_closure(&mut ctx, event)?;

        let start_ms = snapshot.history.last().map(|c| c.checkpoint_ms).unwrap_or(now);
        let checkpoint_ms = now.max(start_ms);
        ctx.now = checkpoint_ms;
        ctx.history.push(Checkpoint {
            event_type: event.event_type.clone(),
            start_ms,
            checkpoint_ms,
            elapsed_ms: checkpoint_ms - start_ms,
        });

        let entered: Vec<StatePath> = {
            let mut seen = Vec::new();
            for path in &ctx.entered {
                if ctx.active.contains(path)
                    && !old_active.contains(path)
                    && !seen.contains(path)
                {
                    seen.push(path.clone());
                }
            }
            seen
        };

        ctx.logs.push(LogRecord {
            at_ms: checkpoint_ms,
            event_type: event.event_type.clone(),
            entered: entered.iter().map(StatePath::dotted).collect(),
            data: None,
        });

        self.finish(ctx, snapshot.trace_id.clone(), entered, event, true)
    }

    /// Shared tail: leaves, status, unit charge, emissions, reserved sync.
    ///
    /// `charge` is false for the initial descent: the init entry seeds the
    /// history but execution units start at zero.
    fn finish(
        &self,
        mut ctx: StepCtx,
        trace_id: String,
        entered: Vec<StatePath>,
        event: &MachineEvent,
        charge: bool,
    ) -> Result<StepOutput, InterpretError> {
        let def = self.machine.definition();
        let leaves = leaves_of(&ctx.active);
        let config = Configuration::from_leaves(def, leaves);
        let status = if config.is_done(def) {
            OrchestrationStatus::Done
        } else {
            OrchestrationStatus::Active
        };
        if charge {
            ctx.execution_units += 1;
        }

        let emissions = self.collect_emissions(&entered, &ctx.context, event)?;

        let mut snapshot = Snapshot {
            value: config.to_value(),
            context: ctx.context,
            status,
            history: ctx.history,
            logs: ctx.logs,
            execution_units: ctx.execution_units,
            trace_id,
        };
        snapshot.sync_reserved();
        Ok(StepOutput { snapshot, entered, emissions })
    }

    fn transition_def(&self, key: &TransitionKey) -> Option<TransitionDef> {
        let node = self.machine.definition().node(&key.path)?;
        match &key.event {
            Some(event) => node.on.get(event)?.get(key.index).cloned(),
            None => node.on_done.clone(),
        }
    }

    fn guard_passes(
        &self,
        transition: &TransitionDef,
        context: &Context,
        event: &MachineEvent,
        path: &StatePath,
    ) -> Result<bool, InterpretError> {
        let Some(name) = &transition.guard else { return Ok(true) };
        let guard = self.machine.behavior().find_guard(name).ok_or_else(|| {
            InterpretError::Guard {
                name: name.clone(),
                state: path.dotted(),
                source: BehaviorError::new("guard not registered"),
            }
        })?;
        guard(context, event).map_err(|source| InterpretError::Guard {
            name: name.clone(),
            state: path.dotted(),
            source,
        })
    }

    fn execute_transition(
        &self,
        ctx: &mut StepCtx,
        key: &TransitionKey,
        transition: &TransitionDef,
        event: &MachineEvent,
    ) -> Result<(), InterpretError> {
        let def = self.machine.definition();
        let target = self
            .machine
            .target(key)
            .ok_or_else(|| InterpretError::MissingTarget(key.path.dotted()))?
            .clone();
        let source = &key.path;
        let domain = source.lca(&target);

        // Exit every active state below the domain, deepest first.
        let mut exiting: Vec<StatePath> = ctx
            .active
            .iter()
            .filter(|path| domain.is_ancestor_of(path))
            .cloned()
            .collect();
        exiting.sort_by_key(|path| def.doc_index(path).unwrap_or_default());
        for path in exiting.iter().rev() {
            if let Some(node) = def.node(path) {
                for action in node.exit.clone() {
                    self.run_action(ctx, &action, event, path)?;
                }
            }
            ctx.active.remove(path);
        }

        // Transition actions run between exit and entry, on the
        // (possibly transformed) event.
        let event = self.transformed(transition, event)?;
        for action in &transition.actions {
            self.run_action(ctx, action, &event, source)?;
        }

        // Enter from the domain down to the target. A parallel state
        // passed through on the way brings its sibling regions along; the
        // target's own subtree is handled by the final initial descent.
        let chain: Vec<String> = target.segments()[domain.depth()..].to_vec();
        let mut path = domain;
        for (depth, segment) in chain.iter().enumerate() {
            path = path.child(segment);
            self.enter_state(ctx, &path, &event)?;
            let Some(node) = def.node(&path) else { continue };
            let Some(descending_into) = chain.get(depth + 1) else { continue };
            if node.is_parallel() {
                let regions: Vec<String> = node.states.keys().cloned().collect();
                for region in regions {
                    if &region == descending_into {
                        continue;
                    }
                    let region_path = path.child(&region);
                    self.enter_state(ctx, &region_path, &event)?;
                    self.enter_initial(ctx, &region_path, &event)?;
                }
            }
        }
        self.enter_initial(ctx, &target, &event)?;
        Ok(())
    }

    /// Mark `path` active and run its entry actions.
    fn enter_state(
        &self,
        ctx: &mut StepCtx,
        path: &StatePath,
        event: &MachineEvent,
    ) -> Result<(), InterpretError> {
        ctx.active.insert(path.clone());
        ctx.entered.push(path.clone());
        if let Some(node) = self.machine.definition().node(path) {
            for action in node.entry.clone() {
                self.run_action(ctx, &action, event, path)?;
            }
        }
        Ok(())
    }

    /// Descend below an entered state: `initial` child of a compound,
    /// every region of a parallel, nothing below finals and atomics.
    fn enter_initial(
        &self,
        ctx: &mut StepCtx,
        path: &StatePath,
        event: &MachineEvent,
    ) -> Result<(), InterpretError> {
        let def = self.machine.definition();
        let Some(node) = def.node(path) else { return Ok(()) };
        if node.is_parallel() {
            let regions: Vec<String> = node.states.keys().cloned().collect();
            for region in regions {
                let region_path = path.child(&region);
                self.enter_state(ctx, &region_path, event)?;
                self.enter_initial(ctx, &region_path, event)?;
            }
            return Ok(());
        }
        if node.is_final() || !node.has_children() {
            return Ok(());
        }
        let Some(initial) = node.initial.clone() else { return Ok(()) };
        let child = path.child(initial);
        self.enter_state(ctx, &child, event)?;
        self.enter_initial(ctx, &child, event)
    }

    /// A parallel state whose every region sits on a final child takes its
    /// `onDone` transition; cascades until quiescent.
    fn run_done_closure(
        &self,
        ctx: &mut StepCtx,
        event: &MachineEvent,
    ) -> Result<(), InterpretError> {
        let def = self.machine.definition();
        let mut taken: HashSet<StatePath> = HashSet::new();
        loop {
            let candidate = ctx.active.iter().find(|path| {
                if taken.contains(*path) {
                    return false;
                }
                let Some(node) = def.node(path) else { return false };
                if !node.is_parallel() || node.on_done.is_none() {
                    return false;
                }
                node.states.iter().all(|(region, region_node)| {
                    let region_path = path.child(region);
                    region_node.states.iter().any(|(child, child_node)| {
                        child_node.is_final() && ctx.active.contains(&region_path.child(child))
                    })
                })
            });
            let Some(path) = candidate.cloned() else { break };
            taken.insert(path.clone());
            let key = TransitionKey::done(path.clone());
            let Some(transition) = self.transition_def(&key) else { break };
            self.machine.validate_event(&key, &event.data)?;
            self.execute_transition(ctx, &key, &transition, event)?;
        }
        Ok(())
    }

    fn run_action(
        &self,
        ctx: &mut StepCtx,
        name: &str,
        event: &MachineEvent,
        state: &StatePath,
    ) -> Result<(), InterpretError> {
        match name {
            builtin::UPDATE_CONTEXT => {
                if let Value::Object(map) = &event.data {
                    let delta = map
                        .iter()
                        .filter(|(key, _)| key.as_str() != "type")
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    ctx.context.merge_delta(delta);
                }
            }
            builtin::UPDATE_LOGS => {
                ctx.logs.push(LogRecord {
                    at_ms: ctx.now,
                    event_type: event.event_type.clone(),
                    entered: Vec::new(),
                    data: Some(event.data.clone()),
                });
            }
            builtin::UPDATE_CHECKPOINT => {
                let start_ms = ctx.history.last().map(|c| c.checkpoint_ms).unwrap_or(ctx.now);
                let checkpoint_ms = ctx.now.max(start_ms);
                ctx.history.push(Checkpoint {
                    event_type: event.event_type.clone(),
                    start_ms,
                    checkpoint_ms,
                    elapsed_ms: checkpoint_ms - start_ms,
                });
            }
            _ => {
                let action = self.machine.behavior().find_action(name).ok_or_else(|| {
                    InterpretError::Action {
                        name: name.to_string(),
                        state: state.dotted(),
                        source: BehaviorError::new("action not registered"),
                    }
                })?;
                let delta =
                    action(&ctx.context, event).map_err(|source| InterpretError::Action {
                        name: name.to_string(),
                        state: state.dotted(),
                        source,
                    })?;
                ctx.context.merge_delta(delta);
            }
        }
        Ok(())
    }

    fn transformed(
        &self,
        transition: &TransitionDef,
        event: &MachineEvent,
    ) -> Result<MachineEvent, InterpretError> {
        let Some(name) = &transition.transformer else { return Ok(event.clone()) };
        let transformer = self.machine.behavior().find_transformer(name).ok_or_else(|| {
            InterpretError::Transformer {
                name: name.clone(),
                source: BehaviorError::new("transformer not registered"),
            }
        })?;
        let data = transformer(event.data.clone()).map_err(|source| {
            InterpretError::Transformer { name: name.clone(), source }
        })?;
        Ok(MachineEvent {
            event_type: event.event_type.clone(),
            data,
            raw: event.raw.clone(),
        })
    }

    fn collect_emissions(
        &self,
        entered: &[StatePath],
        context: &Context,
        event: &MachineEvent,
    ) -> Result<Vec<MachineEmission>, InterpretError> {
        let def = self.machine.definition();
        let mut emissions = Vec::new();
        for path in entered {
            let Some(node) = def.node(path) else { continue };
            match &node.emit {
                None => {}
                Some(EmitSpec::Topic(topic)) => {
                    emissions.push(MachineEmission {
                        path: path.clone(),
                        topic: topic.clone(),
                        data: None,
                    });
                }
                Some(EmitSpec::Handler(name)) => {
                    let emitter =
                        self.machine.behavior().find_emitter(name).ok_or_else(|| {
                            InterpretError::Emit {
                                name: name.clone(),
                                state: path.dotted(),
                                source: BehaviorError::new("emit handler not registered"),
                            }
                        })?;
                    let (topic, data) =
                        emitter(context, event).map_err(|source| InterpretError::Emit {
                            name: name.clone(),
                            state: path.dotted(),
                            source,
                        })?;
                    emissions.push(MachineEmission { path: path.clone(), topic, data: Some(data) });
                }
            }
        }
        Ok(emissions)
    }
}

fn leaves_of(active: &BTreeSet<StatePath>) -> Vec<StatePath> {
    active
        .iter()
        .filter(|path| !active.iter().any(|other| path.is_ancestor_of(other)))
        .cloned()
        .collect()
}

#[cfg(test)]
#[path = "interpreter_tests.rs"]
mod tests;
