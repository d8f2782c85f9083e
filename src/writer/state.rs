//! Per-function traversal state of the structured emitter.
//!
//! Created fresh for every emission and dropped with it; nothing here is
//! shared between functions.

use crate::core::BlockId;
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct EmissionState {
    /// Blocks already rendered. Only grows.
    pub analyzed: HashSet<BlockId>,
    /// Join points deferred until the subtree that opened them is done,
    /// with the number of loops open when they were deferred.
    frontier: HashMap<BlockId, usize>,
    /// Deferred joins that a switch rendered in place of their deferrer.
    claimed: HashSet<BlockId>,
    /// Blocks some emitted jump refers to. Ordered so the driver drains the
    /// smallest block first.
    pub goto_targets: BTreeSet<BlockId>,
    /// Blocks that must carry a label if reached while a sibling branch is
    /// rendered. Counted because branches nest.
    label_hints: HashMap<BlockId, u32>,
    /// Blocks whose label has been printed, synthetic or source.
    pub printed_labels: HashSet<BlockId>,
    /// Exits of the loops whose body is being rendered, innermost last.
    pub open_loop_exits: Vec<BlockId>,
}

impl EmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn defer(&mut self, join: BlockId) {
        self.frontier.insert(join, self.open_loop_exits.len());
    }

    pub fn is_deferred(&self, block: BlockId) -> bool {
        self.frontier.contains_key(&block)
    }

    /// Remove `join` from the frontier before it is rendered.
    pub fn undefer(&mut self, join: BlockId) {
        self.frontier.remove(&join);
    }

    /// Whether reaching the deferred `block` from here leaves a loop body,
    /// so falling through to it would run the next iteration instead.
    pub fn leaves_open_loop(&self, block: BlockId) -> bool {
        self.frontier
            .get(&block)
            .is_some_and(|&depth| depth < self.open_loop_exits.len())
    }

    pub fn claim(&mut self, join: BlockId) {
        self.claimed.insert(join);
    }

    pub fn was_claimed(&self, join: BlockId) -> bool {
        self.claimed.contains(&join)
    }

    pub fn hint(&mut self, block: BlockId) {
        *self.label_hints.entry(block).or_insert(0) += 1;
    }

    pub fn unhint(&mut self, block: BlockId) {
        if let Some(count) = self.label_hints.get_mut(&block) {
            *count -= 1;
            if *count == 0 {
                self.label_hints.remove(&block);
            }
        }
    }

    pub fn is_hinted(&self, block: BlockId) -> bool {
        self.label_hints.contains_key(&block)
    }

    /// Smallest jump target not rendered yet.
    pub fn next_pending_target(&self) -> Option<BlockId> {
        self.goto_targets
            .iter()
            .find(|block| !self.analyzed.contains(*block))
            .copied()
    }
}
