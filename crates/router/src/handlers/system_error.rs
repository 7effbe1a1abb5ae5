// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! System-error handler: records `sys.*` pre-processing errors.
//!
//! These envelopes are already the output of a failed pre-processing step
//! somewhere in the fleet; the handler's job is to record them, not to
//! answer them. When the subject resolves to a live snapshot the record
//! also lands in that orchestration's log, best effort.

use tracing::Instrument as _;

use xorca_core::version::parse_version;
use xorca_core::{Clock, Envelope, LogRecord, Subject};
use xorca_storage::LockableStore;

use crate::error::RouterError;
use crate::router::Router;
use crate::telemetry;

impl<S: LockableStore + 'static, C: Clock> Router<S, C> {
    pub(crate) async fn handle_system_error(&self, envelope: &Envelope) -> Vec<Envelope> {
        let span = telemetry::handler_span("system-error", envelope);
        async {
            tracing::error!(
                event_type = %envelope.event_type,
                data = %envelope.data,
                "pre-processing error reported"
            );
            if let Err(err) = self.record_system_error(envelope).await {
                tracing::warn!(error = %err, "could not record error on the snapshot");
            }
        }
        .instrument(span)
        .await;
        Vec::new()
    }

    async fn record_system_error(&self, envelope: &Envelope) -> Result<(), RouterError> {
        let Some(subject_str) = envelope.subject.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        let Ok(subject) = Subject::decode(subject_str) else { return Ok(()) };
        if subject.name != self.name {
            return Ok(());
        }
        let Ok(version) = parse_version(&subject.version) else { return Ok(()) };
        let Some(registration) = self.registration(&version) else { return Ok(()) };

        let record = LogRecord {
            at_ms: self.clock.epoch_ms(),
            event_type: envelope.event_type.clone(),
            entered: Vec::new(),
            data: Some(envelope.data.clone()),
        };

        let mut orch = self.actor(registration, subject);
        let run = async {
            orch.open().await?;
            if orch.hydrated() {
                orch.record_log(record)?;
                orch.save().await?;
            }
            Ok::<(), RouterError>(())
        };
        let result = run.await;
        if let Err(close_err) = orch.close().await {
            tracing::warn!(error = %close_err, "actor close failed after system-error record");
        }
        result
    }
}
