// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Continuation handler: `evt.*` advances an existing orchestration.

use tracing::Instrument as _;

use xorca_core::version::parse_version;
use xorca_core::{Clock, Envelope, Subject, Topic};
use xorca_storage::LockableStore;

use crate::error::RouterError;
use crate::router::Router;
use crate::{error_envelope, telemetry};

impl<S: LockableStore + 'static, C: Clock> Router<S, C> {
    pub(crate) async fn handle_continuation(&self, envelope: &Envelope) -> Vec<Envelope> {
        let span = telemetry::handler_span("continuation", envelope);
        match self.try_continuation(envelope).instrument(span).await {
            Ok(out) => {
                telemetry::emitted("continuation", out.len());
                out
            }
            Err(err) => {
                telemetry::failed("continuation", &err);
                let topic = if err.is_preprocessing() {
                    Topic::SystemOrchestratorError { name: self.name.clone() }
                } else {
                    Topic::OrchestratorError { name: self.name.clone() }
                };
                vec![error_envelope::build(topic, &err, envelope, &self.name, self.ids.as_ref())]
            }
        }
    }

    async fn try_continuation(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RouterError> {
        envelope.validate()?;

        let subject_str = envelope
            .subject
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(RouterError::MissingSubject)?;
        let subject = Subject::decode(subject_str)?;

        if subject.name != self.name {
            if self.config.raise_on_invalid_orchestrator_name {
                return Err(RouterError::OrchestratorNameMismatch {
                    subject_name: subject.name,
                    router_name: self.name.clone(),
                });
            }
            telemetry::dropped("subject names another orchestrator", envelope);
            return Ok(Vec::new());
        }

        let version = parse_version(&subject.version)
            .map_err(|_| RouterError::UnknownMachineVersion(subject.version.clone()))?;
        let registration = self
            .registration(&version)
            .ok_or_else(|| RouterError::UnknownMachineVersion(version.to_string()))?;

        let mut orch = self.actor(registration, subject);
        let run = async {
            orch.open().await?;
            tracing::debug!(hydrated = orch.hydrated(), "actor opened");
            orch.dispatch(envelope)?;
            tracing::debug!("event applied");
            orch.save().await?;
            tracing::debug!("snapshot persisted");
            Ok::<(), RouterError>(())
        };
        match run.await {
            Ok(()) => {
                let out = orch.take_emitted();
                orch.close().await?;
                Ok(out)
            }
            Err(err) => {
                if let Err(close_err) = orch.close().await {
                    tracing::warn!(error = %close_err, "actor close failed after continuation error");
                }
                Err(err)
            }
        }
    }
}
