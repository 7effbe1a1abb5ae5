// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hierarchical state-machine model.
//!
//! A machine is declared as a serializable tree of states
//! ([`MachineDefinition`]) whose guards, actions, transformers, and emit
//! handlers are referenced by stable string identifiers. The matching
//! functions live in a [`MachineBehavior`] table; [`Machine::compile`] joins
//! the two, verifies every reference, resolves transition targets, and
//! precompiles every declared JSON schema.

mod behavior;
mod compile;
mod def;
mod path;

pub use behavior::{
    builtin, ActionFn, BehaviorError, EmitFn, GuardFn, MachineBehavior, MachineEvent,
    TransformerFn,
};
pub use compile::{Machine, MachineError, TransitionKey};
pub use def::{EmitSpec, MachineDefinition, StateKind, StateNode, TransitionDef};
pub use path::{PathError, StatePath};
