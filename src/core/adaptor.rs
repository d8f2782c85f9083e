// This module defines the IrAdaptor trait, which serves as the bridge between the emitter
// and any SSA-based intermediate representation. The trait is the read-only half of the
// IR oracle: it enumerates the blocks of the currently selected function, their ordered
// statements, predecessors and successors, the phi nodes at the head of each block, and
// the display names of variables. Every handle is an arena index (BlockId, VarId, StmtId)
// so the emitter never holds references into the IR's own graph objects. StmtKind is the
// closed set of statement shapes the emitter distinguishes; control statements carry
// their branch targets directly so the structured emitter can dispatch with one
// exhaustive match. Implementations report statements they cannot classify through
// EmitError::NotYetSupported.

//! IrAdaptor responsibilities.
//!
//! The adaptor is the glue between the emitter and the user's SSA based IR. The
//! framework assumes:
//! - The adaptor has one currently selected function with a single entry block.
//! - Basic blocks contain an ordered list of statements. Unconditional fallthrough
//!   into the single successor is implicit and needs no statement.
//! - Control statements (conditional, loop test, multi-way, switch, goto) are the
//!   last statement of their block and name their targets explicitly.
//! - Merges are expressed with phi nodes listed at the head of a block.
//!
//! Dominance, post-dominance, liveness and feedback edges are not part of this
//! trait; see [`DominanceOracle`](crate::core::analyzer::DominanceOracle).

use crate::core::error::EmitResult;
use crate::core::ids::{BlockId, StmtId, VarId};

/// One `case` label of a switch arm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseLabel {
    Value(i64),
    Default,
}

/// All case labels that lead to the same target block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchArm {
    pub labels: Vec<CaseLabel>,
    pub target: BlockId,
}

impl SwitchArm {
    pub fn is_default(&self) -> bool {
        self.labels.contains(&CaseLabel::Default)
    }
}

/// Statement kinds the structured emitter distinguishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    /// Ordinary statement, rendered as-is.
    Plain,
    /// Initialization pseudo-op. Rendered, but never the last real statement.
    Init,
    /// Virtual statement. Never rendered, never the last real statement.
    Virtual,
    /// The block's source label.
    Label,
    /// Two-way branch.
    Conditional {
        cond: VarId,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// Loop test of a structured loop header.
    Loop {
        cond: VarId,
        body: BlockId,
        exit: BlockId,
    },
    /// `if / else if / else` cascade. A `None` condition is the final `else`.
    MultiWay {
        arms: Vec<(Option<VarId>, BlockId)>,
    },
    /// N-way switch on `selector`.
    Switch {
        selector: VarId,
        arms: Vec<SwitchArm>,
    },
    /// Explicit jump, rendered by the instruction renderer.
    Goto {
        targets: Vec<BlockId>,
    },
}

impl StmtKind {
    /// Whether the block's copies must be placed before this statement.
    pub fn is_branching(&self) -> bool {
        matches!(
            self,
            StmtKind::Conditional { .. }
                | StmtKind::Loop { .. }
                | StmtKind::MultiWay { .. }
                | StmtKind::Switch { .. }
                | StmtKind::Goto { .. }
        )
    }

    /// Whether the statement can be the last real statement of a block.
    pub fn is_real(&self) -> bool {
        !matches!(self, StmtKind::Virtual | StmtKind::Init)
    }

    /// Branch targets in declaration order, duplicates included.
    pub fn branch_targets(&self) -> Vec<BlockId> {
        match self {
            StmtKind::Conditional { then_block, else_block, .. } => vec![*then_block, *else_block],
            StmtKind::Loop { body, exit, .. } => vec![*body, *exit],
            StmtKind::MultiWay { arms } => arms.iter().map(|(_, target)| *target).collect(),
            StmtKind::Switch { arms, .. } => arms.iter().map(|arm| arm.target).collect(),
            StmtKind::Goto { targets } => targets.clone(),
            StmtKind::Plain | StmtKind::Init | StmtKind::Virtual | StmtKind::Label => Vec::new(),
        }
    }
}

/// Bridge between an SSA IR and the emitter.
///
/// The [`IrAdaptor`] trait provides the hooks the emitter needs to read one
/// function of an arbitrary SSA IR. All queries refer to the currently selected
/// function.
pub trait IrAdaptor {
    /// Name of the current function.
    fn func_name(&self) -> &str;

    /// Entry block of the current function.
    fn entry_block(&self) -> BlockId;

    /// Iterator over the blocks of the current function.
    fn blocks(&self) -> Box<dyn Iterator<Item = BlockId> + '_>;

    /// Number used in synthetic labels and debug output.
    fn block_number(&self, block: BlockId) -> u32 {
        block.0
    }

    /// Ordered statements of a block, phi nodes excluded.
    fn block_stmts(&self, block: BlockId) -> Box<dyn Iterator<Item = StmtId> + '_>;

    /// Successor blocks, without duplicates.
    fn block_succs(&self, block: BlockId) -> Box<dyn Iterator<Item = BlockId> + '_>;

    /// Predecessor blocks, without duplicates.
    fn block_preds(&self, block: BlockId) -> Box<dyn Iterator<Item = BlockId> + '_>;

    /// Source label of the block, if it starts with one.
    fn block_label(&self, _block: BlockId) -> Option<&str> {
        None
    }

    /// Classify a statement.
    fn stmt_kind(&self, stmt: StmtId) -> EmitResult<StmtKind>;

    /// Variables read by a statement.
    fn stmt_uses(&self, stmt: StmtId) -> Box<dyn Iterator<Item = VarId> + '_>;

    /// Variables written by a statement.
    fn stmt_defs(&self, stmt: StmtId) -> Box<dyn Iterator<Item = VarId> + '_>;

    /// Get PHI nodes in a block, identified by their destination variable.
    fn block_phis(&self, _block: BlockId) -> Box<dyn Iterator<Item = VarId> + '_> {
        Box::new(std::iter::empty())
    }

    /// Virtual phis carry no value and are skipped by copy insertion.
    fn phi_is_virtual(&self, _phi: VarId) -> bool {
        false
    }

    /// Get PHI node incoming count.
    fn phi_incoming_count(&self, _phi: VarId) -> u32 {
        0
    }

    /// Get incoming value for a PHI node at given slot.
    fn phi_incoming_val_for_slot(&self, phi: VarId, _slot: u32) -> VarId {
        phi
    }

    /// Get incoming block for a PHI node at given slot.
    fn phi_incoming_block_for_slot(&self, _phi: VarId, _slot: u32) -> BlockId {
        self.entry_block()
    }

    /// Display name of a variable.
    fn var_name(&self, var: VarId) -> &str;

    /// Whether `name` already names something in the current function.
    fn identifier_in_use(&self, name: &str) -> bool;

    /// Incoming value of `phi` on the edge from `pred`, if any.
    fn phi_incoming_for_block(&self, phi: VarId, pred: BlockId) -> Option<VarId> {
        (0..self.phi_incoming_count(phi))
            .find(|&slot| self.phi_incoming_block_for_slot(phi, slot) == pred)
            .map(|slot| self.phi_incoming_val_for_slot(phi, slot))
    }

    /// Number of CFG edges entering `block`. The entry block counts the
    /// implicit edge from the function entry.
    fn in_degree(&self, block: BlockId) -> usize {
        let implicit = usize::from(block == self.entry_block());
        self.block_preds(block).count() + implicit
    }

    /// Statements with their kinds, in block order.
    fn classified_stmts(&self, block: BlockId) -> EmitResult<Vec<(StmtId, StmtKind)>> {
        self.block_stmts(block)
            .map(|stmt| self.stmt_kind(stmt).map(|kind| (stmt, kind)))
            .collect()
    }
}
