// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topic grammar for envelope `type` strings.
//!
//! The dotted prefix carries routing semantics:
//!
//! - `xorca.<name>.start` — inbound, creates an orchestration
//! - `evt.<resource>` — inbound, advances an orchestration
//! - `cmd.<resource>` / `notif.<resource>` — outbound only
//! - `xorca.<name>.start.error` / `xorca.orchestrator.<name>.error` —
//!   logical errors
//! - `sys.xorca.…` — pre-processing errors (bad envelope, schema, subject)

/// A classified envelope type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// `xorca.<name>.start`
    Start { name: String },
    /// `evt.<resource>`
    Event { resource: String },
    /// `cmd.<resource>` (outbound only)
    Command { resource: String },
    /// `notif.<resource>` (outbound only)
    Notification { resource: String },
    /// `xorca.<name>.start.error`
    StartError { name: String },
    /// `xorca.orchestrator.<name>.error`
    OrchestratorError { name: String },
    /// `sys.xorca.<name>.start.error`
    SystemStartError { name: String },
    /// `sys.xorca.orchestrator.<name>.error`
    SystemOrchestratorError { name: String },
}

impl Topic {
    /// Classify a `type` string. Returns `None` for anything outside the
    /// grammar.
    pub fn parse(s: &str) -> Option<Topic> {
        if let Some(rest) = s.strip_prefix("sys.") {
            return match Topic::parse(rest)? {
                Topic::StartError { name } => Some(Topic::SystemStartError { name }),
                Topic::OrchestratorError { name } => {
                    Some(Topic::SystemOrchestratorError { name })
                }
                _ => None,
            };
        }
        if let Some(resource) = s.strip_prefix("evt.") {
            return nonempty(resource).map(|resource| Topic::Event { resource });
        }
        if let Some(resource) = s.strip_prefix("cmd.") {
            return nonempty(resource).map(|resource| Topic::Command { resource });
        }
        if let Some(resource) = s.strip_prefix("notif.") {
            return nonempty(resource).map(|resource| Topic::Notification { resource });
        }
        if let Some(rest) = s.strip_prefix("xorca.") {
            if let Some(middle) = rest.strip_prefix("orchestrator.") {
                if let Some(name) = middle.strip_suffix(".error") {
                    return nonempty(name).map(|name| Topic::OrchestratorError { name });
                }
                return None;
            }
            // `.start.error` must be peeled before `.start`.
            if let Some(name) = rest.strip_suffix(".start.error") {
                return nonempty(name).map(|name| Topic::StartError { name });
            }
            if let Some(name) = rest.strip_suffix(".start") {
                return nonempty(name).map(|name| Topic::Start { name });
            }
        }
        None
    }

    /// True for types the router accepts on its input side.
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            Topic::Start { .. }
                | Topic::Event { .. }
                | Topic::SystemStartError { .. }
                | Topic::SystemOrchestratorError { .. }
        )
    }
}

fn nonempty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Topic::Start { name } => write!(f, "xorca.{name}.start"),
            Topic::Event { resource } => write!(f, "evt.{resource}"),
            Topic::Command { resource } => write!(f, "cmd.{resource}"),
            Topic::Notification { resource } => write!(f, "notif.{resource}"),
            Topic::StartError { name } => write!(f, "xorca.{name}.start.error"),
            Topic::OrchestratorError { name } => {
                write!(f, "xorca.orchestrator.{name}.error")
            }
            Topic::SystemStartError { name } => write!(f, "sys.xorca.{name}.start.error"),
            Topic::SystemOrchestratorError { name } => {
                write!(f, "sys.xorca.orchestrator.{name}.error")
            }
        }
    }
}

#[cfg(test)]
#[path = "topic_tests.rs"]
mod tests;
