// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event envelope, the unit of all orchestration I/O.
//!
//! CloudEvent-shaped over any transport. Serializes with the wire field
//! names (`type`, `datacontenttype`, `traceparent`, ...); optional fields
//! are omitted when absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// Content type stamped on every outbound envelope.
pub const CLOUDEVENTS_JSON: &str = "application/cloudevents+json; charset=UTF-8";

#[allow(clippy::expect_used)]
static TRACEPARENT_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[0-9a-f]{2}-[0-9a-f]{32}-[0-9a-f]{16}-[0-9a-f]{2}$")
        .expect("constant regex pattern is valid")
});

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("unsupported datacontenttype `{0}`: expected a cloudevents or plain JSON type")]
    InvalidContentType(String),

    #[error("malformed traceparent `{0}`")]
    InvalidTraceparent(String),

    #[error("malformed statemachineversion `{0}`: expected a MAJOR.MINOR.PATCH triple")]
    InvalidVersionAttribute(String),
}

/// One event on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque unique id.
    pub id: String,

    /// Origin URI.
    pub source: String,

    /// Dotted topic, see [`crate::topic::Topic`].
    #[serde(rename = "type")]
    pub event_type: String,

    /// Opaque routing token; absent only on `xorca.<name>.start`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Arbitrary structured payload.
    #[serde(default)]
    pub data: Value,

    pub datacontenttype: String,

    /// W3C trace context, propagated end to end when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceparent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracestate: Option<String>,

    /// Machine version the producer was bound to, echoed on outbound events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statemachineversion: Option<String>,
}

impl Envelope {
    pub fn builder(
        id: impl Into<String>,
        event_type: impl Into<String>,
        source: impl Into<String>,
    ) -> EnvelopeBuilder {
        EnvelopeBuilder::new(id, event_type, source)
    }

    /// Check the envelope's declared attributes against the wire contract.
    ///
    /// Runs before any store access so a malformed envelope never costs a
    /// lock or a read.
    pub fn validate(&self) -> Result<(), EnvelopeError> {
        let ct = self.datacontenttype.as_str();
        if !ct.contains("application/cloudevents+json") && !ct.contains("application/json") {
            return Err(EnvelopeError::InvalidContentType(self.datacontenttype.clone()));
        }
        if let Some(traceparent) = &self.traceparent {
            if !TRACEPARENT_RE.is_match(traceparent) {
                return Err(EnvelopeError::InvalidTraceparent(traceparent.clone()));
            }
        }
        if let Some(version) = &self.statemachineversion {
            if !crate::version::is_version_shape(version) {
                return Err(EnvelopeError::InvalidVersionAttribute(version.clone()));
            }
        }
        Ok(())
    }

    /// The 32-hex trace id segment of `traceparent`, when present and valid.
    pub fn trace_id(&self) -> Option<&str> {
        let traceparent = self.traceparent.as_deref()?;
        if !TRACEPARENT_RE.is_match(traceparent) {
            return None;
        }
        traceparent.split('-').nth(1)
    }
}

/// Builder for outbound envelopes.
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    envelope: Envelope,
}

impl EnvelopeBuilder {
    pub fn new(
        id: impl Into<String>,
        event_type: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            envelope: Envelope {
                id: id.into(),
                source: source.into(),
                event_type: event_type.into(),
                subject: None,
                data: Value::Null,
                datacontenttype: CLOUDEVENTS_JSON.to_string(),
                traceparent: None,
                tracestate: None,
                statemachineversion: None,
            },
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.envelope.subject = Some(subject.into());
        self
    }

    pub fn data(mut self, data: Value) -> Self {
        self.envelope.data = data;
        self
    }

    pub fn datacontenttype(mut self, content_type: impl Into<String>) -> Self {
        self.envelope.datacontenttype = content_type.into();
        self
    }

    pub fn traceparent(mut self, traceparent: impl Into<String>) -> Self {
        self.envelope.traceparent = Some(traceparent.into());
        self
    }

    pub fn maybe_traceparent(mut self, traceparent: Option<String>) -> Self {
        self.envelope.traceparent = traceparent;
        self
    }

    pub fn tracestate(mut self, tracestate: impl Into<String>) -> Self {
        self.envelope.tracestate = Some(tracestate.into());
        self
    }

    pub fn statemachineversion(mut self, version: impl Into<String>) -> Self {
        self.envelope.statemachineversion = Some(version.into());
        self
    }

    pub fn build(self) -> Envelope {
        self.envelope
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
