// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Init handler: `xorca.<name>.start` creates a new orchestration.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::Instrument as _;

use xorca_core::version::parse_version;
use xorca_core::{Clock, Envelope, Subject, Topic};
use xorca_storage::LockableStore;

use crate::error::RouterError;
use crate::router::Router;
use crate::{error_envelope, telemetry};

/// `data` of a start envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitPayload {
    #[serde(default)]
    process_id: Option<String>,

    /// Seed for the orchestration context; validated against the router's
    /// initial-context schema.
    #[serde(default)]
    context: Value,

    /// Machine version to start; defaults to the highest registered.
    #[serde(default)]
    version: Option<String>,
}

impl<S: LockableStore + 'static, C: Clock> Router<S, C> {
    pub(crate) async fn handle_init(&self, envelope: &Envelope) -> Vec<Envelope> {
        let span = telemetry::handler_span("init", envelope);
        match self.try_init(envelope).instrument(span).await {
            Ok(out) => {
                telemetry::emitted("init", out.len());
                out
            }
            Err(err) => {
                telemetry::failed("init", &err);
                let topic = if err.is_preprocessing() {
                    Topic::SystemStartError { name: self.name.clone() }
                } else {
                    Topic::StartError { name: self.name.clone() }
                };
                vec![error_envelope::build(topic, &err, envelope, &self.name, self.ids.as_ref())]
            }
        }
    }

    async fn try_init(&self, envelope: &Envelope) -> Result<Vec<Envelope>, RouterError> {
        envelope.validate()?;

        let payload: InitPayload = serde_json::from_value(envelope.data.clone())
            .map_err(|err| RouterError::MalformedInitPayload(err.to_string()))?;
        let context = match payload.context {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => {
                return Err(RouterError::MalformedInitPayload(
                    "`context` must be an object".to_string(),
                ))
            }
        };
        if let Some(schema) = &self.init_schema {
            schema.check(&Value::Object(context.clone()), "init context")?;
        }
        tracing::debug!("init payload validated");

        let version = match &payload.version {
            Some(version) => parse_version(version)?,
            None => self.highest_version()?,
        };
        let registration = self
            .registration(&version)
            .ok_or_else(|| RouterError::UnknownMachineVersion(version.to_string()))?;

        let process_id = payload
            .process_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| self.ids.mint());
        let subject = Subject::new(process_id, self.name.clone(), version.to_string());
        let trace_id = envelope
            .trace_id()
            .map(str::to_owned)
            .unwrap_or_else(|| self.ids.mint_trace_id());

        let mut orch = self.actor(registration, subject.clone());
        let run = async {
            orch.open().await?;
            tracing::debug!(hydrated = orch.hydrated(), "actor opened");
            // The init contract: a live snapshot under this subject is a
            // hard failure, never an overwrite.
            if orch.hydrated() {
                return Err(RouterError::SubjectAlreadyExists(subject.to_string()));
            }
            orch.start(context, &trace_id, envelope.traceparent.clone())?;
            orch.save().await?;
            tracing::debug!("snapshot persisted");
            Ok(())
        };
        match run.await {
            Ok(()) => {
                let out = orch.take_emitted();
                orch.close().await?;
                Ok(out)
            }
            Err(err) => {
                if let Err(close_err) = orch.close().await {
                    tracing::warn!(error = %close_err, "actor close failed after init error");
                }
                Err(err)
            }
        }
    }
}
