// This module defines the arena-index handles the emitter uses to talk about the IR it
// renders. The IR itself is owned elsewhere (the production front-end, or the Test IR in
// this crate); the emitter only ever holds plain u32 indices into it. BlockId, VarId and
// StmtId are Copy newtypes so they can key hash maps and sets in the per-function
// emission state without borrowing the IR, and so a block index can never be confused
// with a variable index at a call site.

//! Index handles into an externally owned IR.

use std::fmt;

/// Basic block handle. The number is the block's index inside its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

/// SSA variable handle (function argument, phi destination or statement result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

/// Statement handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl VarId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BB{}", self.0)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}
