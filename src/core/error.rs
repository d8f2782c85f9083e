// This module defines error types for the emitter using the thiserror crate for
// idiomatic Rust error handling. EmitError covers the two fatal classes the emitter
// knows about: IR-consistency violations (a goto target without a pre-assigned label,
// a jump whose label never got printed, a dominator relation that is not a tree, a
// phi edge naming a block that is not a predecessor, recursion that reaches a state
// the traversal rules forbid) and shapes the emitter does not model (NotYetSupported).
// There is no recoverable class: upstream IR correctness is a precondition, so every
// variant aborts the emission of the current function. EmitResult<T> is the
// convenience alias used throughout the crate.

//! Error types for structured emission.
//!
//! Using thiserror for more idiomatic error handling.

use crate::core::ids::{BlockId, VarId};
use thiserror::Error;

/// Main error type for function body emission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("No label assigned to {block}, which is the target of a jump")]
    MissingLabel {
        block: BlockId,
    },

    #[error("Jump to {block} ({label}) but the label was never printed")]
    DanglingGoto {
        block: BlockId,
        label: String,
    },

    #[error("Dominator relation is not a tree: {reason}")]
    NonTreeDominators {
        reason: String,
    },

    #[error("Phi {phi} names {pred} as incoming block but it is not a predecessor of {block}")]
    UnknownPhiPredecessor {
        phi: VarId,
        pred: BlockId,
        block: BlockId,
    },

    #[error("Unknown block {block}")]
    UnknownBlock {
        block: BlockId,
    },

    #[error("Inconsistent recursion: {reason}")]
    InconsistentRecursion {
        reason: String,
    },

    #[error("Not yet supported: {what}")]
    NotYetSupported {
        what: String,
    },
}

/// Result type alias for emission operations.
pub type EmitResult<T> = Result<T, EmitError>;
