// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! xorca-router: the activation entry point.
//!
//! One `route` call is one activation: a batch of envelopes in, a batch of
//! envelopes out, nothing left running. Envelopes are grouped by subject,
//! pattern-matched against the handler table (`xorca.<name>.start` → init,
//! `evt.*` → continuation, `sys.*` → system-error), and every failure is
//! converted to an error envelope — no error escapes a handler.

mod config;
mod error;
mod error_envelope;
mod handlers;
mod router;
mod telemetry;

pub use config::RouterConfig;
pub use error::RouterError;
pub use error_envelope::ErrorPayload;
pub use router::{MachineRegistration, Router};
