// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! xorca-core: machine model, interpreter, and wire types for the xOrca
//! orchestration runtime.
//!
//! An orchestration has no process of its own. Each activation rehydrates a
//! hierarchical state machine from a snapshot, applies one event, and hands
//! the advanced snapshot plus any outbound emissions back to the caller.
//! Everything in this crate is synchronous; I/O lives in `xorca-storage` and
//! above.

pub mod macros;

pub mod clock;
pub mod envelope;
pub mod id;
pub mod interpreter;
pub mod machine;
pub mod schema;
pub mod snapshot;
pub mod subject;
pub mod topic;
pub mod version;

pub use clock::{Clock, SystemClock};
pub use envelope::{Envelope, EnvelopeBuilder, EnvelopeError, CLOUDEVENTS_JSON};
pub use id::{IdGen, UuidIdGen};
pub use interpreter::{InterpretError, Interpreter, MachineEmission, StepOutput};
pub use machine::{
    BehaviorError, EmitSpec, Machine, MachineBehavior, MachineDefinition, MachineError,
    MachineEvent, PathError, StateKind, StateNode, StatePath, TransitionDef,
};
pub use schema::{CompiledSchema, SchemaError};
pub use snapshot::{
    Checkpoint, Configuration, ConfigurationError, Context, ContextDelta, LogRecord,
    OrchestrationStatus, Snapshot, SnapshotRecord, StateValue,
};
pub use subject::{Subject, SubjectError};
pub use topic::Topic;
pub use version::{highest, parse_version, VersionError};

#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
#[cfg(any(test, feature = "test-support"))]
pub use id::FixedIdGen;
