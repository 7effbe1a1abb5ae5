// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handler lifecycle telemetry.
//!
//! Each handler invocation runs under one span; the phase events inside it
//! (validated, hydrated, stepped, persisted, emitted) come from the
//! handlers themselves. The subscriber wiring is the embedder's concern.

use xorca_core::Envelope;

use crate::error::RouterError;

pub(crate) fn handler_span(handler: &'static str, envelope: &Envelope) -> tracing::Span {
    tracing::info_span!(
        "router.handle",
        handler,
        envelope_id = %envelope.id,
        event_type = %envelope.event_type,
        subject = envelope.subject.as_deref().unwrap_or(""),
    )
}

pub(crate) fn emitted(handler: &'static str, count: usize) {
    tracing::info!(handler, count, "handler completed");
}

pub(crate) fn failed(handler: &'static str, err: &RouterError) {
    tracing::error!(
        handler,
        error = %err,
        error_name = err.error_name(),
        preprocessing = err.is_preprocessing(),
        "handler failed; converting to error envelope"
    );
}

pub(crate) fn dropped(reason: &'static str, envelope: &Envelope) {
    tracing::warn!(reason, event_type = %envelope.event_type, "envelope dropped");
}
