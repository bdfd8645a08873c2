// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the crate.
//!
//! Two tiers: construction-time misuse (`BuildError`) and simulation-time
//! misuse (`SimError`) are caller errors; `StructuralError` reports a graph
//! that violates a container invariant; `PassError` marks the
//! should-never-happen case of a transformation producing an invalid
//! container.

use crate::ir::{MemId, NetId, SignalId};

/// Construction-time failures. These are always client programming errors and
/// are raised at the call that caused them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("malformed {op} operation: {reason}")]
    MalformedOperation { op: &'static str, reason: String },
    #[error("signal width must be >= 1")]
    ZeroWidth,
    #[error("duplicate signal name '{0}'")]
    DuplicateName(String),
    #[error("signal {0:?} is already driven by another operation")]
    AlreadyDriven(SignalId),
    #[error("operation reads the signal it produces ({0:?})")]
    SelfLoop(SignalId),
    #[error("constant value does not fit in {width} bits")]
    ConstDoesNotFit { width: usize },
    #[error("unknown signal {0:?}")]
    UnknownSignal(SignalId),
    #[error("unknown memory {0:?}")]
    UnknownMemory(MemId),
    #[error("signal {signal:?} has role {role} where {expected} is required")]
    RoleMismatch {
        signal: SignalId,
        role: &'static str,
        expected: &'static str,
    },
    #[error("cannot remove signal {0:?}: still referenced")]
    SignalInUse(SignalId),
}

/// Post-construction graph defects found by `Block::validate`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructuralError {
    #[error("signal '{name}' ({signal:?}) is driven by more than one operation")]
    MultipleProducers { signal: SignalId, name: String },
    #[error("signal '{name}' ({signal:?}) is used but never driven")]
    Undriven { signal: SignalId, name: String },
    #[error("signal '{name}' ({signal:?}) is declared but not connected")]
    Unconnected { signal: SignalId, name: String },
    #[error("net {net:?}: {reason}")]
    BadNet { net: NetId, reason: String },
    #[error("combinational cycle through nets {nets:?}")]
    CombinationalCycle { nets: Vec<NetId> },
    #[error("duplicate signal name '{0}'")]
    DuplicateName(String),
}

/// A pass would have produced an invalid container. Treated as fatal: this
/// signals a bug in the pass, not in the caller's design.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    #[error("pass '{pass}' broke a structural invariant: {source}")]
    Invalid {
        pass: &'static str,
        #[source]
        source: StructuralError,
    },
    #[error("pass '{pass}' failed to construct its result: {source}")]
    Build {
        pass: &'static str,
        #[source]
        source: BuildError,
    },
}

/// Simulation-time misuse of the stepping interface. Recoverable: state is
/// left at the last successfully committed cycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("design failed validation: {0}")]
    InvalidDesign(#[from] StructuralError),
    #[error("no value supplied for input '{name}' ({signal:?})")]
    MissingInput { signal: SignalId, name: String },
    #[error("value supplied for '{name}' ({signal:?}) which is not an input")]
    UnknownInput { signal: SignalId, name: String },
    #[error("value {value} does not fit input '{name}' of width {width}")]
    ValueOutOfRange {
        signal: SignalId,
        name: String,
        width: usize,
        value: String,
    },
    #[error("initial address {addr:#x} is outside memory '{mem}'")]
    InitOutOfRange { mem: String, addr: u64 },
}
