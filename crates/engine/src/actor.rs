// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistent actor: one subject, one lifecycle.
//!
//! `init` optionally takes the per-subject lock and rehydrates the
//! snapshot; `start`/`step` run the interpreter in memory; `save` encodes,
//! projects, and writes; `close` releases whatever is held. The snapshot is
//! only ever advanced in memory until `save` succeeds, so a failed step
//! never reaches the store.

use std::sync::Arc;
use thiserror::Error;

use serde_json::{Map, Value};
use xorca_core::interpreter::{InterpretError, Interpreter, MachineEmission};
use xorca_core::machine::{BehaviorError, Machine, MachineEvent, StatePath};
use xorca_core::schema::SchemaError;
use xorca_core::snapshot::{LogRecord, Snapshot};
use xorca_core::{Clock, EnvelopeError, Subject};
use xorca_storage::{acquire_lock, project, LockBudget, LockableStore, LockingMode, StoreError};

#[derive(Debug, Error)]
pub enum ActorError {
    #[error("actor for `{0}` is already initialized")]
    AlreadyInitialized(String),

    #[error("orchestration `{0}` was never initialized")]
    NotInitialized(String),

    #[error("actor must be initialized before `{0}`")]
    NotOpen(&'static str),

    #[error("event targets machine version {requested} but this orchestration runs {actual}")]
    VersionMismatch { requested: String, actual: String },

    #[error("snapshot for `{subject}` could not be encoded or decoded")]
    Codec { subject: String, source: serde_json::Error },

    #[error("middleware `{key}` failed")]
    Middleware { key: String, source: BehaviorError },

    #[error("data emitted for `{state}` violates its declared schema")]
    EmitSchema { state: String, source: SchemaError },

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Interpret(#[from] InterpretError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Open,
    Closed,
}

/// Binds one subject's snapshot to the store through the interpreter.
pub struct PersistentActor<S, C: Clock> {
    store: S,
    interpreter: Interpreter<C>,
    subject: Subject,
    locking: LockingMode,
    budget: LockBudget,
    phase: Phase,
    snapshot: Option<Snapshot>,
    lock_held: bool,
    entered: Vec<StatePath>,
    emissions: Vec<MachineEmission>,
}

impl<S: LockableStore, C: Clock> PersistentActor<S, C> {
    pub fn new(
        store: S,
        machine: Arc<Machine>,
        subject: Subject,
        clock: C,
        locking: LockingMode,
        budget: LockBudget,
    ) -> Self {
        Self {
            store,
            interpreter: Interpreter::new(machine, clock),
            subject,
            locking,
            budget,
            phase: Phase::Created,
            snapshot: None,
            lock_held: false,
            entered: Vec::new(),
            emissions: Vec::new(),
        }
    }

    /// Acquire the lock (under read-write locking) and rehydrate the
    /// snapshot, if one exists.
    pub async fn init(&mut self) -> Result<(), ActorError> {
        if self.phase == Phase::Open {
            return Err(ActorError::AlreadyInitialized(self.subject.to_string()));
        }
        let key = self.subject.storage_key();
        if self.locking == LockingMode::ReadWrite {
            acquire_lock(&self.store, &key, self.budget).await?;
            self.lock_held = true;
        }
        let bytes = self.store.read(&key).await?;
        self.snapshot = match bytes {
            Some(bytes) => Some(Snapshot::decode(&bytes).map_err(|source| ActorError::Codec {
                subject: self.subject.to_string(),
                source,
            })?),
            None => None,
        };
        self.entered.clear();
        self.emissions.clear();
        self.phase = Phase::Open;
        tracing::debug!(subject = %self.subject, hydrated = self.snapshot.is_some(), "actor initialized");
        Ok(())
    }

    /// Run the initial descent when no snapshot exists; a no-op once one
    /// does.
    pub fn start(
        &mut self,
        input: Map<String, Value>,
        trace_id: &str,
    ) -> Result<(), ActorError> {
        self.require_open("start")?;
        if self.snapshot.is_some() {
            return Ok(());
        }
        let output = self.interpreter.init(input, trace_id)?;
        self.snapshot = Some(output.snapshot);
        self.entered.extend(output.entered);
        self.emissions.extend(output.emissions);
        Ok(())
    }

    /// Feed one event through the interpreter.
    pub fn step(&mut self, event: &MachineEvent) -> Result<(), ActorError> {
        self.require_open("step")?;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| ActorError::NotInitialized(self.subject.to_string()))?;
        let output = self.interpreter.step(snapshot, event)?;
        self.snapshot = Some(output.snapshot);
        self.entered.extend(output.entered);
        self.emissions.extend(output.emissions);
        Ok(())
    }

    /// Encode the snapshot, run the pre-writer projection, and write.
    pub async fn save(&mut self) -> Result<(), ActorError> {
        self.require_open("save")?;
        let snapshot = self
            .snapshot
            .as_ref()
            .ok_or_else(|| ActorError::NotInitialized(self.subject.to_string()))?;
        let key = self.subject.storage_key();
        let bytes = snapshot.encode().map_err(|source| ActorError::Codec {
            subject: self.subject.to_string(),
            source,
        })?;

        let write_lock = self.locking == LockingMode::WriteOnly;
        if write_lock {
            acquire_lock(&self.store, &key, self.budget).await?;
            self.lock_held = true;
        }
        let index = project(&bytes, &key);
        let result = self.store.write_indexed(&key, bytes, index).await;
        if write_lock {
            self.store.unlock(&key).await?;
            self.lock_held = false;
        }
        result?;
        tracing::debug!(subject = %self.subject, "snapshot persisted");
        Ok(())
    }

    /// Release any held lock and retire the actor. Idempotent.
    pub async fn close(&mut self) -> Result<(), ActorError> {
        if self.lock_held {
            self.store.unlock(&self.subject.storage_key()).await?;
            self.lock_held = false;
        }
        self.phase = Phase::Closed;
        Ok(())
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn machine(&self) -> &Machine {
        self.interpreter.machine()
    }

    /// Newly entered states accumulated since the last take, in entry
    /// order.
    pub fn take_entered(&mut self) -> Vec<StatePath> {
        std::mem::take(&mut self.entered)
    }

    pub fn take_emissions(&mut self) -> Vec<MachineEmission> {
        std::mem::take(&mut self.emissions)
    }

    /// Append a record to the snapshot's log without stepping the machine.
    pub fn record_log(&mut self, record: LogRecord) -> Result<(), ActorError> {
        self.require_open("record_log")?;
        let snapshot = self
            .snapshot
            .as_mut()
            .ok_or_else(|| ActorError::NotInitialized(self.subject.to_string()))?;
        snapshot.logs.push(record);
        snapshot.sync_reserved();
        Ok(())
    }

    fn require_open(&self, op: &'static str) -> Result<(), ActorError> {
        if self.phase != Phase::Open {
            return Err(ActorError::NotOpen(op));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "actor_tests.rs"]
mod tests;
