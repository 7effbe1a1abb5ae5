// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The router proper: registration table, grouping, dispatch.

use semver::Version;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use xorca_core::machine::Machine;
use xorca_core::schema::CompiledSchema;
use xorca_core::version::highest;
use xorca_core::{Clock, Envelope, IdGen, Subject, Topic, UuidIdGen};
use xorca_engine::{MiddlewareStack, OrchestrationActor, PersistentActor};
use xorca_storage::LockableStore;

use crate::config::RouterConfig;
use crate::error::RouterError;
use crate::telemetry;

/// One machine version served by a router, with its orchestration
/// middleware.
#[derive(Clone)]
pub struct MachineRegistration {
    pub machine: Arc<Machine>,
    pub middleware: Arc<MiddlewareStack>,
}

impl MachineRegistration {
    pub fn new(machine: Arc<Machine>) -> Self {
        Self { machine, middleware: Arc::new(MiddlewareStack::new()) }
    }

    pub fn with_middleware(mut self, middleware: MiddlewareStack) -> Self {
        self.middleware = Arc::new(middleware);
        self
    }
}

/// Routes batches of envelopes into orchestration activations.
pub struct Router<S, C: Clock> {
    pub(crate) name: String,
    pub(crate) registrations: Vec<MachineRegistration>,
    pub(crate) init_schema: Option<CompiledSchema>,
    pub(crate) store: Arc<S>,
    pub(crate) clock: C,
    pub(crate) ids: Arc<dyn IdGen>,
    pub(crate) config: RouterConfig,
}

impl<S: LockableStore + 'static, C: Clock> Router<S, C> {
    /// Build a router for `name` over the given machine versions.
    ///
    /// Fails synchronously when a version is registered twice.
    pub fn new(
        name: impl Into<String>,
        registrations: Vec<MachineRegistration>,
        store: Arc<S>,
        clock: C,
    ) -> Result<Self, RouterError> {
        let mut seen: Vec<&Version> = Vec::new();
        for registration in &registrations {
            let version = registration.machine.version();
            if seen.contains(&version) {
                return Err(RouterError::DuplicateMachineVersion(version.to_string()));
            }
            seen.push(version);
        }
        Ok(Self {
            name: name.into(),
            registrations,
            init_schema: None,
            store,
            clock,
            ids: Arc::new(UuidIdGen),
            config: RouterConfig::default(),
        })
    }

    /// Declare the schema init payloads' `context` must satisfy.
    pub fn with_init_schema(mut self, schema: Value) -> Result<Self, RouterError> {
        self.init_schema = Some(CompiledSchema::compile(schema)?);
        Ok(self)
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGen>) -> Self {
        self.ids = ids;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// One activation: group by subject, dispatch each group, flatten the
    /// outputs preserving per-subject order.
    pub async fn route(&self, batch: Vec<Envelope>) -> Vec<Envelope> {
        let groups = group_by_subject(batch);
        let mut out = Vec::new();
        for group in groups {
            out.extend(self.route_group(group).await);
        }
        out
    }

    async fn route_group(&self, group: Vec<Envelope>) -> Vec<Envelope> {
        let Some(first) = group.first() else { return Vec::new() };
        let mut out = Vec::new();
        match Topic::parse(&first.event_type) {
            Some(Topic::Start { name }) if name == self.name => {
                for envelope in &group {
                    out.extend(self.handle_init(envelope).await);
                }
            }
            Some(Topic::Event { .. }) => {
                // Events within a group run in input order, each against
                // the snapshot the previous one produced.
                for envelope in &group {
                    out.extend(self.handle_continuation(envelope).await);
                }
            }
            Some(Topic::SystemStartError { .. }) | Some(Topic::SystemOrchestratorError { .. }) => {
                for envelope in &group {
                    out.extend(self.handle_system_error(envelope).await);
                }
            }
            _ => {
                for envelope in &group {
                    out.extend(self.unroutable(envelope));
                }
            }
        }
        out
    }

    fn unroutable(&self, envelope: &Envelope) -> Option<Envelope> {
        if !self.config.error_on_not_found {
            telemetry::dropped("no handler matches", envelope);
            return None;
        }
        let err = RouterError::UnroutableEvent(envelope.event_type.clone());
        telemetry::failed("route", &err);
        Some(crate::error_envelope::build(
            Topic::SystemOrchestratorError { name: self.name.clone() },
            &err,
            envelope,
            &self.name,
            self.ids.as_ref(),
        ))
    }

    pub(crate) fn registration(&self, version: &Version) -> Option<&MachineRegistration> {
        self.registrations.iter().find(|r| r.machine.version() == version)
    }

    pub(crate) fn highest_version(&self) -> Result<Version, RouterError> {
        highest(self.registrations.iter().map(|r| r.machine.version()))
            .cloned()
            .ok_or_else(|| RouterError::UnknownMachineVersion("<none>".to_string()))
    }

    pub(crate) fn actor(
        &self,
        registration: &MachineRegistration,
        subject: Subject,
    ) -> OrchestrationActor<Arc<S>, C> {
        let actor = PersistentActor::new(
            Arc::clone(&self.store),
            Arc::clone(&registration.machine),
            subject,
            self.clock.clone(),
            self.config.locking,
            self.config.lock_budget,
        );
        OrchestrationActor::new(actor, Arc::clone(&registration.middleware), Arc::clone(&self.ids))
    }
}

/// Group envelopes by subject, preserving input order. Envelopes without a
/// subject (starts) each form their own group.
fn group_by_subject(batch: Vec<Envelope>) -> Vec<Vec<Envelope>> {
    let mut groups: Vec<Vec<Envelope>> = Vec::new();
    let mut by_subject: HashMap<String, usize> = HashMap::new();
    for envelope in batch {
        match envelope.subject.clone().filter(|s| !s.is_empty()) {
            Some(subject) => match by_subject.get(&subject) {
                Some(&index) => groups[index].push(envelope),
                None => {
                    by_subject.insert(subject, groups.len());
                    groups.push(vec![envelope]);
                }
            },
            None => groups.push(vec![envelope]),
        }
    }
    groups
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
