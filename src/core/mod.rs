// This module serves as the central hub for the emitter's core infrastructure: the
// vocabulary shared by the writer and by any IR that wants to be rendered. It exports
// and organizes the index handles (BlockId, VarId, StmtId), the IrAdaptor trait and
// StmtKind tagged union through which an IR exposes one function, the Analyzer that
// computes dominators, post-dominators, feedback edges and live-in sets behind the
// DominanceOracle trait, the EmitError taxonomy, and the arena-backed EmissionSession
// that interns names and counts emission passes. Nothing in here knows how text is
// produced; that lives in the writer module.

//! Core emitter infrastructure
//!
//! # Key Components
//!
//! ## IR access (`adaptor`, `ids`)
//! - Narrow read-only trait over arena-indexed blocks, statements and variables
//! - Closed set of statement kinds matched exhaustively by the writer
//!
//! ## Analysis (`analyzer`)
//! - RPO, dominator and post-dominator trees
//! - Feedback edges and SSA live-in sets
//!
//! ## Session Management (`session`)
//! - Arena-based interning using `bumpalo`
//! - Per-function pass counters and emission statistics

pub mod ids;
pub mod error;
pub mod adaptor;
pub mod analyzer;
pub mod session;

pub use ids::{BlockId, StmtId, VarId};

pub use error::{
    EmitError,
    EmitResult,
};

pub use adaptor::{CaseLabel, IrAdaptor, StmtKind, SwitchArm};
pub use analyzer::{Analyzer, DominanceOracle};

pub use session::{
    EmissionSession,
    SessionStats,
};
