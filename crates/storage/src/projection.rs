// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pre-writer hook: project a snapshot blob into flat index fields.
//!
//! Runs inside every save. The projection is best-effort by contract: any
//! failure degrades to the empty projection and the raw blob write still
//! proceeds.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use xorca_core::{SnapshotRecord, Subject, SubjectError};

/// Flat fields a store may persist alongside the snapshot blob for
/// querying without parsing the blob.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexProjection {
    /// JSON-serialized active configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    /// JSON of the public context (reserved keys are never indexed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_checkpoints: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orchestration_logs: Option<String>,
}

impl IndexProjection {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Error)]
enum ProjectionError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Subject(#[from] SubjectError),
}

/// Project `bytes` (a snapshot blob about to be written at `key`) into
/// index fields. Failures are swallowed into the empty projection.
pub fn project(bytes: &[u8], key: &str) -> IndexProjection {
    match project_inner(bytes, key) {
        Ok(projection) => projection,
        Err(err) => {
            tracing::warn!(key, error = %err, "index projection failed; raw write proceeds");
            IndexProjection::default()
        }
    }
}

fn project_inner(bytes: &[u8], key: &str) -> Result<IndexProjection, ProjectionError> {
    let record: SnapshotRecord = serde_json::from_slice(bytes)?;
    let subject = Subject::decode(key.strip_suffix(".json").unwrap_or(key))?;

    Ok(IndexProjection {
        stage: Some(serde_json::to_string(&record.value)?),
        status: Some(record.status.to_string()),
        context: Some(serde_json::to_string(&record.context)?),
        trace_id: Some(record.trace_id),
        name: Some(subject.name),
        process_id: Some(subject.process_id),
        version: Some(subject.version),
        orchestration_checkpoints: Some(serde_json::to_string(&record.history)?),
        orchestration_logs: Some(serde_json::to_string(&record.logs)?),
    })
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
