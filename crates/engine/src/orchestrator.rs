// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The orchestration actor: envelope semantics over the persistent actor.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};
use xorca_core::machine::{MachineEvent, StatePath};
use xorca_core::{Clock, Envelope, IdGen, Subject};
use xorca_storage::LockableStore;

use crate::actor::{ActorError, PersistentActor};
use crate::middleware::MiddlewareStack;

/// Wraps a [`PersistentActor`], translating inbound envelopes to machine
/// events and materializing outbound envelopes for newly entered states.
pub struct OrchestrationActor<S, C: Clock> {
    actor: PersistentActor<S, C>,
    middleware: Arc<MiddlewareStack>,
    ids: Arc<dyn IdGen>,
    traceparent: Option<String>,
    tracestate: Option<String>,
    emitted: Vec<Envelope>,
}

impl<S: LockableStore, C: Clock> OrchestrationActor<S, C> {
    pub fn new(
        actor: PersistentActor<S, C>,
        middleware: Arc<MiddlewareStack>,
        ids: Arc<dyn IdGen>,
    ) -> Self {
        Self {
            actor,
            middleware,
            ids,
            traceparent: None,
            tracestate: None,
            emitted: Vec::new(),
        }
    }

    pub async fn open(&mut self) -> Result<(), ActorError> {
        self.actor.init().await
    }

    /// True once a snapshot is loaded or created.
    pub fn hydrated(&self) -> bool {
        self.actor.snapshot().is_some()
    }

    /// Create the orchestration from an init payload.
    pub fn start(
        &mut self,
        input: Map<String, Value>,
        trace_id: &str,
        traceparent: Option<String>,
    ) -> Result<(), ActorError> {
        self.traceparent = traceparent;
        self.actor.start(input, trace_id)?;
        self.materialize()
    }

    /// Validate an inbound envelope, translate it, and step the machine.
    pub fn dispatch(&mut self, envelope: &Envelope) -> Result<(), ActorError> {
        envelope.validate()?;

        let actual = self.actor.machine().version().to_string();
        if let Some(requested) = &envelope.statemachineversion {
            if *requested != actual {
                return Err(ActorError::VersionMismatch {
                    requested: requested.clone(),
                    actual,
                });
            }
        }

        let data = match self.middleware.event_transformer(&envelope.event_type) {
            Some(transform) => transform(envelope.data.clone()).map_err(|source| {
                ActorError::Middleware { key: envelope.event_type.clone(), source }
            })?,
            None => envelope.data.clone(),
        };
        let raw = serde_json::to_value(envelope).map_err(|source| ActorError::Codec {
            subject: self.actor.subject().to_string(),
            source,
        })?;

        self.traceparent = envelope.traceparent.clone();
        self.tracestate = envelope.tracestate.clone();

        let event = MachineEvent {
            event_type: envelope.event_type.clone(),
            data,
            raw: Some(raw),
        };
        self.actor.step(&event)?;
        self.materialize()
    }

    /// Turn the step's newly entered states into outbound envelopes.
    ///
    /// State middleware wins over the machine's own `emit` declaration;
    /// fixed topics default their payload to the public context.
    fn materialize(&mut self) -> Result<(), ActorError> {
        let entered = self.actor.take_entered();
        let emissions = self.actor.take_emissions();
        if entered.is_empty() {
            return Ok(());
        }

        let by_path: HashMap<StatePath, (String, Option<Value>)> = emissions
            .into_iter()
            .map(|emission| (emission.path, (emission.topic, emission.data)))
            .collect();

        let subject = self.actor.subject().encode();
        let name = self.actor.machine().name().to_string();
        let version = self.actor.machine().version().to_string();
        let source = format!("/orchestrationActor/xstate/{name}/{version}/");
        let context = match self.actor.snapshot() {
            Some(snapshot) => snapshot.context.clone(),
            None => return Ok(()),
        };

        for path in entered {
            let dotted = path.dotted();
            let message = if let Some(emitter) = self.middleware.state_emitter(&dotted) {
                let message = emitter(&context)
                    .map_err(|source| ActorError::Middleware { key: dotted.clone(), source })?;
                Some((message.event_type, message.data))
            } else if let Some((topic, data)) = by_path.get(&path) {
                let data =
                    data.clone().unwrap_or_else(|| Value::Object(context.public()));
                Some((topic.clone(), data))
            } else {
                None
            };
            let Some((event_type, data)) = message else { continue };

            self.actor
                .machine()
                .validate_emitted(&path, &data)
                .map_err(|source| ActorError::EmitSchema { state: dotted.clone(), source })?;

            let mut builder = Envelope::builder(self.ids.mint(), &event_type, &source)
                .subject(subject.clone())
                .data(data)
                .maybe_traceparent(self.traceparent.clone())
                .statemachineversion(version.clone());
            if let Some(tracestate) = &self.tracestate {
                builder = builder.tracestate(tracestate.clone());
            }
            let envelope = builder.build();
            tracing::debug!(
                state = %dotted,
                event_type = %envelope.event_type,
                "materialized outbound envelope"
            );
            self.emitted.push(envelope);
        }
        Ok(())
    }

    /// Envelopes materialized during this activation, in entry order.
    pub fn emitted_envelopes(&self) -> &[Envelope] {
        &self.emitted
    }

    pub fn take_emitted(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.emitted)
    }

    pub async fn save(&mut self) -> Result<(), ActorError> {
        self.actor.save().await
    }

    pub async fn close(&mut self) -> Result<(), ActorError> {
        self.actor.close().await
    }

    pub fn snapshot(&self) -> Option<&xorca_core::Snapshot> {
        self.actor.snapshot()
    }

    pub fn subject(&self) -> &Subject {
        self.actor.subject()
    }

    pub fn record_log(&mut self, record: xorca_core::LogRecord) -> Result<(), ActorError> {
        self.actor.record_log(record)
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
