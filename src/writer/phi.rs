// This module implements out-of-SSA translation for the writer. Phi nodes are replaced by
// sequential copy statements placed at the end of each predecessor block (the block's
// "tail") so that the copies of one edge behave like a simultaneous assignment. The
// eliminator walks the dominator tree from the entry block. In every block it collects
// the (source, destination) pairs of the successors' phis and schedules them with the
// classical worklist algorithm: a copy is ready once no pending copy still needs to read
// its destination, and when only cyclic copies remain (the swap problem) one destination
// is saved into a fresh temporary first. A destination that is still live in a
// dominator-tree child after the copy would be overwritten too early (the lost-copy
// problem); its value is saved into a temporary at the head of the block defining the
// phi, and all reads below are redirected to that temporary through per-variable rename
// stacks. The stacks are pushed while a block is scheduled and popped by a drop guard
// when the walk leaves the block's subtree, so the renaming of a block is exactly the
// set of temporaries pushed by its dominators.

//! Phi elimination into sequential copies.
//!
//! The result, [`PhiCopies`], holds per block:
//! - a prefix: copies printed before the block's statements,
//! - a tail: copies printed before the terminator (or after the last statement),
//! - a renaming table: variable to the temporary that must be read instead.
//!
//! # Example
//!
//! ```text
//! head:
//!   %x = phi [^entry, %a], [^head, %y]
//!   %y = phi [^entry, %b], [^head, %x]
//! ```
//!
//! produces in the tail of `head`:
//!
//! ```text
//! __t__0_0 = x;
//! x = y;
//! y = __t__0_0;
//! ```

use crate::core::{BlockId, DominanceOracle, EmissionSession, EmitError, EmitResult, IrAdaptor, VarId};
use hashbrown::{HashMap, HashSet};
use std::fmt::Write as _;

/// A variable introduced by phi elimination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Temporary {
    pub name: String,
    /// Variable whose static type the temporary copies.
    pub like: VarId,
}

/// Copy statements and renamings computed for one function.
#[derive(Debug, Default)]
pub struct PhiCopies<'arena> {
    prefix: HashMap<BlockId, String>,
    tail: HashMap<BlockId, String>,
    renaming: HashMap<BlockId, HashMap<VarId, &'arena str>>,
    temporaries: Vec<Temporary>,
    copy_count: usize,
}

impl<'arena> PhiCopies<'arena> {
    /// Copies printed at the head of `block`.
    pub fn prefix(&self, block: BlockId) -> Option<&str> {
        self.prefix.get(&block).map(String::as_str)
    }

    /// Copies printed at the end of `block`.
    pub fn tail(&self, block: BlockId) -> Option<&str> {
        self.tail.get(&block).map(String::as_str)
    }

    /// Variables that must be read through a temporary inside `block`.
    pub fn renaming(&self, block: BlockId) -> Option<&HashMap<VarId, &'arena str>> {
        self.renaming.get(&block)
    }

    pub fn temporaries(&self) -> &[Temporary] {
        &self.temporaries
    }

    pub fn into_temporaries(self) -> Vec<Temporary> {
        self.temporaries
    }

    /// Number of copy statements produced, temporaries included.
    fn push_prefix(&mut self, block: BlockId, line: &str) {
        let text = self.prefix.entry(block).or_default();
        let _ = writeln!(text, "{}", line);
        self.copy_count += 1;
    }

    fn push_tail(&mut self, block: BlockId, line: &str) {
        let text = self.tail.entry(block).or_default();
        let _ = writeln!(text, "{}", line);
        self.copy_count += 1;
    }
}

/// Per-variable stacks of visible temporary names.
#[derive(Debug, Default)]
pub struct RenameStacks<'arena> {
    stacks: HashMap<VarId, Vec<&'arena str>>,
}

impl<'arena> RenameStacks<'arena> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn top(&self, var: VarId) -> Option<&'arena str> {
        self.stacks.get(&var).and_then(|stack| stack.last().copied())
    }

    /// Current top of every non-empty stack.
    pub fn tops(&self) -> HashMap<VarId, &'arena str> {
        self.stacks
            .iter()
            .filter_map(|(&var, stack)| stack.last().map(|&name| (var, name)))
            .collect()
    }

    fn push(&mut self, var: VarId, name: &'arena str) {
        self.stacks.entry(var).or_default().push(name);
    }

    fn pop(&mut self, var: VarId) {
        if let Some(stack) = self.stacks.get_mut(&var) {
            stack.pop();
            if stack.is_empty() {
                self.stacks.remove(&var);
            }
        }
    }
}

/// Pushes made while one block is in scope. Dropping the guard pops them in
/// reverse order, on error paths too.
pub struct RenameScope<'g, 'arena> {
    stacks: &'g mut RenameStacks<'arena>,
    pushed: Vec<VarId>,
}

impl<'g, 'arena> RenameScope<'g, 'arena> {
    pub fn new(stacks: &'g mut RenameStacks<'arena>) -> Self {
        Self {
            stacks,
            pushed: Vec::new(),
        }
    }

    pub fn push(&mut self, var: VarId, name: &'arena str) {
        self.stacks.push(var, name);
        self.pushed.push(var);
    }

    /// Whether `var` was pushed in this scope.
    pub fn has_pushed(&self, var: VarId) -> bool {
        self.pushed.contains(&var)
    }

    pub fn top(&self, var: VarId) -> Option<&'arena str> {
        self.stacks.top(var)
    }

    /// Reborrow the stacks for a nested scope.
    pub fn stacks(&mut self) -> &mut RenameStacks<'arena> {
        self.stacks
    }
}

impl Drop for RenameScope<'_, '_> {
    fn drop(&mut self) {
        while let Some(var) = self.pushed.pop() {
            self.stacks.pop(var);
        }
    }
}

/// One pending copy `dest = src` on an edge into `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CopyPair {
    src: VarId,
    dest: VarId,
    target: BlockId,
}

/// Dominator-tree walk turning phi nodes into copies.
pub struct PhiEliminator<'s, 'arena, A: IrAdaptor, O: DominanceOracle> {
    ir: &'s A,
    oracle: &'s O,
    session: &'s EmissionSession<'arena>,
    copies: PhiCopies<'arena>,
    visited: HashSet<BlockId>,
    temp_counter: u32,
}

impl<'s, 'arena, A: IrAdaptor, O: DominanceOracle> PhiEliminator<'s, 'arena, A, O> {
    pub fn new(ir: &'s A, oracle: &'s O, session: &'s EmissionSession<'arena>) -> Self {
        Self {
            ir,
            oracle,
            session,
            copies: PhiCopies::default(),
            visited: HashSet::new(),
            temp_counter: 0,
        }
    }

    /// Eliminate the phis of the adaptor's current function.
    pub fn run(mut self) -> EmitResult<PhiCopies<'arena>> {
        let mut stacks = RenameStacks::new();
        self.walk(self.ir.entry_block(), &mut stacks)?;
        log::debug!(
            "phi elimination for {}: {} copies, {} temporaries",
            self.ir.func_name(),
            self.copies.copy_count,
            self.copies.temporaries.len()
        );
        self.session
            .record_phi_copies(self.copies.copy_count, self.copies.temporaries.len());
        Ok(self.copies)
    }

    fn walk(&mut self, block: BlockId, stacks: &mut RenameStacks<'arena>) -> EmitResult<()> {
        if !self.visited.insert(block) {
            return Err(EmitError::NonTreeDominators {
                reason: format!("{} reached twice by the dominator tree walk", block),
            });
        }

        let tops = stacks.tops();
        if !tops.is_empty() {
            self.copies.renaming.insert(block, tops);
        }

        let mut scope = RenameScope::new(stacks);
        self.schedule_copies(block, &mut scope)?;

        let oracle = self.oracle;
        for &child in oracle.dominator_children(block) {
            self.walk(child, scope.stacks())?;
        }
        Ok(())
    }

    /// Collect the phi copies on every edge leaving `block`.
    fn edge_pairs(&self, block: BlockId) -> EmitResult<Vec<CopyPair>> {
        let mut pairs = Vec::new();
        for succ in self.ir.block_succs(block) {
            let preds: Vec<BlockId> = self.ir.block_preds(succ).collect();
            for phi in self.ir.block_phis(succ) {
                if self.ir.phi_is_virtual(phi) {
                    continue;
                }
                for slot in 0..self.ir.phi_incoming_count(phi) {
                    let pred = self.ir.phi_incoming_block_for_slot(phi, slot);
                    if !preds.contains(&pred) {
                        return Err(EmitError::UnknownPhiPredecessor {
                            phi,
                            pred,
                            block: succ,
                        });
                    }
                }
                match self.ir.phi_incoming_for_block(phi, block) {
                    Some(src) => pairs.push(CopyPair {
                        src,
                        dest: phi,
                        target: succ,
                    }),
                    None => log::debug!("{} has no value for the edge from {}", phi, block),
                }
            }
        }
        Ok(pairs)
    }

    fn schedule_copies(
        &mut self,
        block: BlockId,
        scope: &mut RenameScope<'_, 'arena>,
    ) -> EmitResult<()> {
        let pairs = self.edge_pairs(block)?;
        if pairs.is_empty() {
            return Ok(());
        }

        let (mut worklist, mut copy_set): (Vec<CopyPair>, Vec<CopyPair>) = pairs
            .iter()
            .partition(|pair| !pairs.iter().any(|other| other.src == pair.dest));

        let ir = self.ir;
        // reads redirected to the temporary that broke a cycle
        let mut saved: HashMap<VarId, &'arena str> = HashMap::new();
        // sources whose old value already sits in a destination
        let mut moved: HashMap<VarId, VarId> = HashMap::new();

        loop {
            while !worklist.is_empty() {
                let current = std::mem::take(&mut worklist);
                for pair in current {
                    if self.is_lost_copy(block, pair.dest) && !scope.has_pushed(pair.dest) {
                        let temp = self.fresh_temporary(pair.dest);
                        let line = format!("{} = {};", temp, ir.var_name(pair.dest));
                        self.copies.push_prefix(pair.target, &line);
                        scope.push(pair.dest, temp);
                        self.copies
                            .renaming
                            .entry(block)
                            .or_default()
                            .insert(pair.dest, temp);
                        log::trace!("{}: saved {} into {}", block, pair.dest, temp);
                    }

                    let dest_name = ir.var_name(pair.dest);
                    let src_name = match (saved.get(&pair.src), moved.get(&pair.src)) {
                        (Some(&temp), _) => temp,
                        (None, Some(&holder)) => ir.var_name(holder),
                        (None, None) => scope
                            .top(pair.src)
                            .unwrap_or_else(|| ir.var_name(pair.src)),
                    };
                    if src_name != dest_name {
                        let line = format!("{} = {};", dest_name, src_name);
                        self.copies.push_tail(block, &line);
                        if copy_set.iter().any(|other| other.dest == pair.src) {
                            moved.insert(pair.src, pair.dest);
                        }
                    }

                    let (ready, blocked): (Vec<CopyPair>, Vec<CopyPair>) =
                        copy_set.into_iter().partition(|other| other.dest == pair.src);
                    copy_set = blocked;
                    worklist.extend(ready);
                }
            }

            if copy_set.is_empty() {
                break;
            }

            // only cyclic copies are left
            let pair = copy_set.remove(0);
            if copy_set.iter().any(|other| other.src == pair.dest) {
                let temp = self.fresh_temporary(pair.dest);
                let line = format!("{} = {};", temp, ir.var_name(pair.dest));
                self.copies.push_tail(block, &line);
                saved.insert(pair.dest, temp);
                log::trace!("{}: broke copy cycle on {} with {}", block, pair.dest, temp);
            }
            worklist.push(pair);
        }
        Ok(())
    }

    /// Whether `var` is still read in a dominator-tree child of `block`.
    fn is_lost_copy(&self, block: BlockId, var: VarId) -> bool {
        self.oracle
            .dominator_children(block)
            .iter()
            .any(|&child| child != block && self.oracle.is_live_in(child, var))
    }

    fn fresh_temporary(&mut self, like: VarId) -> &'arena str {
        let n = self.temp_counter;
        self.temp_counter += 1;
        let mut k = 0u32;
        let mut name = format!("__t__{}_{}", n, k);
        while self.ir.identifier_in_use(&name) {
            k += 1;
            name = format!("__t__{}_{}", n, k);
        }
        let interned = self.session.intern_str(&name);
        self.copies.temporaries.push(Temporary { name, like });
        interned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bumpalo::Bump;

    #[test]
    fn test_rename_scope_pops_on_drop() {
        let arena = Bump::new();
        let session = EmissionSession::new(&arena);
        let v = VarId(1);
        let mut stacks = RenameStacks::new();
        {
            let mut outer = RenameScope::new(&mut stacks);
            outer.push(v, session.intern_str("a"));
            {
                let mut inner = RenameScope::new(outer.stacks());
                inner.push(v, session.intern_str("b"));
                assert_eq!(inner.top(v), Some("b"));
            }
            assert_eq!(outer.top(v), Some("a"));
            assert!(outer.has_pushed(v));
        }
        assert_eq!(stacks.top(v), None);
        assert!(stacks.tops().is_empty());
    }

    #[test]
    fn test_rename_scope_pops_on_early_return() {
        fn failing(stacks: &mut RenameStacks<'_>, name: &'static str) -> Result<(), ()> {
            let mut scope = RenameScope::new(stacks);
            scope.push(VarId(7), name);
            scope.push(VarId(8), name);
            Err(())
        }

        let mut stacks = RenameStacks::new();
        assert!(failing(&mut stacks, "t").is_err());
        assert_eq!(stacks.top(VarId(7)), None);
        assert_eq!(stacks.top(VarId(8)), None);
    }
}
