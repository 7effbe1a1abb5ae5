// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON Schema validation for event payloads and initial contexts.
//!
//! Schemas are declared as plain JSON values on machine definitions and
//! routers, compiled once, and checked on every matching payload.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema does not compile: {0}")]
    Compile(String),

    #[error("{context}: {detail}")]
    Violation { context: String, detail: String },
}

/// A compiled JSON schema plus its source document.
pub struct CompiledSchema {
    raw: Value,
    validator: jsonschema::Validator,
}

impl CompiledSchema {
    pub fn compile(schema: Value) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { raw: schema, validator })
    }

    /// Validate one instance; `context` names the payload in the error
    /// (e.g. `init data for xorca.summary.start`).
    pub fn check(&self, instance: &Value, context: &str) -> Result<(), SchemaError> {
        self.validator.validate(instance).map_err(|err| SchemaError::Violation {
            context: context.to_string(),
            detail: err.to_string(),
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema").field("raw", &self.raw).finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
