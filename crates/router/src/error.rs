// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The router-boundary error taxonomy.
//!
//! Every failure below the router composes upward into [`RouterError`];
//! each handler converts it into exactly one error envelope. `error_name`
//! gives the stable taxonomy name surfaced on the wire and
//! `is_preprocessing` decides between the `sys.*` and logical error
//! topics.

use thiserror::Error;
use xorca_core::interpreter::InterpretError;
use xorca_core::machine::MachineError;
use xorca_core::schema::SchemaError;
use xorca_core::{EnvelopeError, SubjectError, VersionError};
use xorca_engine::ActorError;
use xorca_storage::StoreError;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("machine version `{0}` is registered more than once")]
    DuplicateMachineVersion(String),

    #[error("machine version `{0}` is not registered with this router")]
    UnknownMachineVersion(String),

    #[error("orchestration `{0}` already exists")]
    SubjectAlreadyExists(String),

    #[error("event type `{0}` does not match any handler")]
    UnroutableEvent(String),

    #[error("subject names orchestrator `{subject_name}` but this router is `{router_name}`")]
    OrchestratorNameMismatch { subject_name: String, router_name: String },

    #[error("envelope carries no subject")]
    MissingSubject,

    #[error("init payload is malformed: {0}")]
    MalformedInitPayload(String),

    #[error(transparent)]
    Subject(#[from] SubjectError),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    #[error(transparent)]
    Machine(#[from] MachineError),

    #[error(transparent)]
    Actor(#[from] ActorError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RouterError {
    /// The stable taxonomy name stamped into error envelopes.
    pub fn error_name(&self) -> &'static str {
        match self {
            RouterError::DuplicateMachineVersion(_) => "DuplicateMachineVersion",
            RouterError::UnknownMachineVersion(_) => "UnknownMachineVersion",
            RouterError::SubjectAlreadyExists(_) => "SubjectAlreadyExists",
            RouterError::UnroutableEvent(_) => "UnroutableEvent",
            RouterError::OrchestratorNameMismatch { .. } => "InvalidOrchestratorName",
            RouterError::MissingSubject | RouterError::Subject(_) => "InvalidSubject",
            RouterError::MalformedInitPayload(_) | RouterError::Version(_) => "SchemaViolation",
            RouterError::Schema(_) => "SchemaViolation",
            RouterError::Envelope(EnvelopeError::InvalidContentType(_)) => "InvalidContentType",
            RouterError::Envelope(_) => "SchemaViolation",
            RouterError::Machine(_) => "ActionFailure",
            RouterError::Actor(err) => actor_error_name(err),
            RouterError::Store(err) => store_error_name(err),
        }
    }

    /// Pre-processing failures surface on `sys.*` topics; everything else
    /// is a logical error.
    pub fn is_preprocessing(&self) -> bool {
        matches!(
            self.error_name(),
            "InvalidContentType" | "SchemaViolation" | "InvalidSubject" | "UnroutableEvent"
        )
    }
}

fn actor_error_name(err: &ActorError) -> &'static str {
    match err {
        ActorError::AlreadyInitialized(_) => "SubjectAlreadyExists",
        ActorError::NotInitialized(_) | ActorError::NotOpen(_) => "SubjectNotInitialized",
        ActorError::VersionMismatch { .. } => "VersionMismatch",
        ActorError::Codec { .. } => "StoreFailure",
        ActorError::Middleware { .. } => "ActionFailure",
        ActorError::EmitSchema { .. } => "SchemaViolation",
        ActorError::Envelope(EnvelopeError::InvalidContentType(_)) => "InvalidContentType",
        ActorError::Envelope(_) => "SchemaViolation",
        ActorError::Interpret(InterpretError::Schema(_)) => "SchemaViolation",
        ActorError::Interpret(InterpretError::Configuration(_)) => "StoreFailure",
        ActorError::Interpret(_) => "ActionFailure",
        ActorError::Store(err) => store_error_name(err),
    }
}

fn store_error_name(err: &StoreError) -> &'static str {
    match err {
        StoreError::LockTimeout { .. } => "LockAcquisitionTimeout",
        StoreError::Backend(_) => "StoreFailure",
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
