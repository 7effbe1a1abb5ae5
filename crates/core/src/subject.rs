// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subject codec.
//!
//! A subject is the opaque routing token binding an envelope to one
//! orchestration instance: the triple `(processId, name, version)` as a
//! canonical JSON object, base64-encoded. Everything downstream (lock keys,
//! blob keys, index fields) derives from it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubjectError {
    #[error("subject is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("subject payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("subject payload is not a JSON object")]
    NotAnObject,

    #[error("subject field `{0}` is missing or empty")]
    Field(&'static str),
}

/// Identifies one orchestration instance across its whole lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subject {
    pub process_id: String,
    pub name: String,
    pub version: String,
}

impl Subject {
    pub fn new(
        process_id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self { process_id: process_id.into(), name: name.into(), version: version.into() }
    }

    /// The opaque wire form: base64 of the canonical JSON triple.
    pub fn encode(&self) -> String {
        let payload = serde_json::json!({
            "processId": self.process_id,
            "name": self.name,
            "version": self.version,
        });
        STANDARD.encode(payload.to_string())
    }

    /// Decode the wire form back into the triple.
    pub fn decode(subject: &str) -> Result<Self, SubjectError> {
        let bytes = STANDARD.decode(subject)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let object = value.as_object().ok_or(SubjectError::NotAnObject)?;

        let field = |key: &str, tag: &'static str| -> Result<String, SubjectError> {
            object
                .get(key)
                .and_then(Value::as_str)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .ok_or(SubjectError::Field(tag))
        };

        Ok(Self {
            process_id: field("processId", "processId")?,
            name: field("name", "name")?,
            version: field("version", "version")?,
        })
    }

    /// Key of the persisted snapshot blob for this subject.
    pub fn storage_key(&self) -> String {
        format!("{}.json", self.encode())
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.version, self.process_id)
    }
}

#[cfg(test)]
#[path = "subject_tests.rs"]
mod tests;
