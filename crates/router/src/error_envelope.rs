// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error envelope construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use xorca_core::{Envelope, IdGen, Topic};

use crate::error::RouterError;

/// Wire payload of every error envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_name: String,

    pub error_message: String,

    /// The error's `source()` chain, outermost first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,

    /// Data of the envelope that failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_data: Option<Value>,
}

/// Build the single error envelope a failed handler returns.
pub(crate) fn build(
    topic: Topic,
    err: &RouterError,
    inbound: &Envelope,
    router_name: &str,
    ids: &dyn IdGen,
) -> Envelope {
    let payload = ErrorPayload {
        error_name: err.error_name().to_string(),
        error_message: err.to_string(),
        error_stack: stack_of(err),
        event_data: Some(inbound.data.clone()).filter(|data| !data.is_null()),
    };

    let mut builder = Envelope::builder(
        ids.mint(),
        topic.to_string(),
        format!("xorca.orchestrator.{router_name}"),
    )
    .data(serde_json::to_value(&payload).unwrap_or_default())
    .maybe_traceparent(inbound.traceparent.clone());
    if let Some(subject) = &inbound.subject {
        builder = builder.subject(subject.clone());
    }
    builder.build()
}

fn stack_of(err: &RouterError) -> Option<String> {
    let mut frames = Vec::new();
    let mut source = std::error::Error::source(err);
    while let Some(err) = source {
        frames.push(err.to_string());
        source = err.source();
    }
    if frames.is_empty() {
        None
    } else {
        Some(frames.join("\ncaused by: "))
    }
}
