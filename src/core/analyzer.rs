// This module implements the Analyzer component that computes the dominance facts the
// emitter consumes for one function. It performs four analyses over the IrAdaptor view:
// 1) Reverse Post-Order (RPO) traversal of the blocks reachable from the entry, 2) the
// dominator tree, computed with the Cooper-Harvey-Kennedy iterative algorithm over RPO
// numbers, 3) the post-dominator tree, computed with the same algorithm on the reversed
// graph rooted at a virtual exit that every returning block flows into, and 4) feedback
// (back) edges found by a depth-first search that tracks the blocks on the DFS stack.
// On top of that it runs an iterative SSA liveness analysis where phi operands are live
// out of the matching predecessor only. The results are exposed through the read-only
// DominanceOracle trait so the emitter cannot modify what it only consumes.

//! Dominance, post-dominance, feedback edges and live-in sets.

use crate::core::adaptor::IrAdaptor;
use crate::core::ids::{BlockId, VarId};
use hashbrown::{HashMap, HashSet};

/// Read-only dominance queries used by the emitter and the phi eliminator.
///
/// `None` from [`immediate_post_dominator`](Self::immediate_post_dominator)
/// means the block's post-dominator is the function exit.
pub trait DominanceOracle {
    fn immediate_dominator(&self, block: BlockId) -> Option<BlockId>;

    fn immediate_post_dominator(&self, block: BlockId) -> Option<BlockId>;

    /// Children of `block` in the dominator tree, in RPO order.
    fn dominator_children(&self, block: BlockId) -> &[BlockId];

    fn is_live_in(&self, block: BlockId, var: VarId) -> bool;

    /// Whether `from -> to` closes a cycle in DFS order from the entry.
    fn is_feedback_edge(&self, from: BlockId, to: BlockId) -> bool;

    /// Whether `a` dominates `b` (reflexive).
    fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            match self.immediate_dominator(cur) {
                Some(parent) => cur = parent,
                None => return false,
            }
        }
    }
}

/// Computes dominance and liveness information for a function.
///
/// The analyzer walks the IR provided by [`IrAdaptor`] once per call to
/// [`switch_func`](Self::switch_func); unreachable blocks are ignored.
#[derive(Debug, Default)]
pub struct Analyzer {
    order: Vec<BlockId>,
    block_map: HashMap<BlockId, usize>,
    idom: Vec<Option<usize>>,
    ipdom: Vec<Option<usize>>,
    dom_children: Vec<Vec<BlockId>>,
    feedback: HashSet<(BlockId, BlockId)>,
    live_in: Vec<HashSet<VarId>>,
    live_out: Vec<HashSet<VarId>>,
}

impl Analyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyze the adaptor's current function.
    pub fn for_function<A: IrAdaptor>(adaptor: &A) -> Self {
        let mut analyzer = Self::new();
        analyzer.switch_func(adaptor);
        analyzer
    }

    /// Sequence of blocks in reverse post order.
    pub fn order(&self) -> &[BlockId] {
        &self.order
    }

    /// Position of a block in [`order`](Self::order).
    pub fn rpo_index(&self, block: BlockId) -> Option<usize> {
        self.block_map.get(&block).copied()
    }

    /// Live-in variables of a block, sorted.
    pub fn live_in(&self, block: BlockId) -> Vec<VarId> {
        self.sorted_set(block, &self.live_in)
    }

    /// Live-out variables of a block, sorted.
    pub fn live_out(&self, block: BlockId) -> Vec<VarId> {
        self.sorted_set(block, &self.live_out)
    }

    /// All feedback edges, sorted.
    pub fn feedback_edges(&self) -> Vec<(BlockId, BlockId)> {
        let mut edges: Vec<_> = self.feedback.iter().copied().collect();
        edges.sort();
        edges
    }

    fn sorted_set(&self, block: BlockId, sets: &[HashSet<VarId>]) -> Vec<VarId> {
        let mut vars: Vec<VarId> = self
            .rpo_index(block)
            .map(|idx| sets[idx].iter().copied().collect())
            .unwrap_or_default();
        vars.sort();
        vars
    }

    /// Build dominance and liveness for the adaptor's current function.
    pub fn switch_func<A: IrAdaptor>(&mut self, adaptor: &A) {
        self.order.clear();
        self.block_map.clear();
        self.feedback.clear();

        // -------- build RPO order ---------
        let entry = adaptor.entry_block();
        let mut post = Vec::new();
        let mut stack = vec![(entry, false)];
        let mut visited = HashSet::new();
        while let Some((block, processed)) = stack.pop() {
            if processed {
                post.push(block);
                continue;
            }
            if !visited.insert(block) {
                continue;
            }
            stack.push((block, true));
            let succs: Vec<_> = adaptor.block_succs(block).collect();
            for succ in succs.into_iter().rev() {
                stack.push((succ, false));
            }
        }
        post.reverse();
        self.order = post;
        for (idx, b) in self.order.iter().enumerate() {
            self.block_map.insert(*b, idx);
        }

        let n = self.order.len();
        let succs: Vec<Vec<usize>> = self
            .order
            .iter()
            .map(|&b| adaptor.block_succs(b).filter_map(|s| self.rpo_index(s)).collect())
            .collect();

        // -------- dominators ---------
        self.idom = immediate_dominators(&succs, 0);
        self.dom_children = vec![Vec::new(); n];
        for idx in 0..n {
            if let Some(parent) = self.idom[idx] {
                self.dom_children[parent].push(self.order[idx]);
            }
        }

        // -------- post-dominators ---------
        // Node `n` is a virtual exit that every block without successors flows into.
        let mut reverse: Vec<Vec<usize>> = vec![Vec::new(); n + 1];
        for (from, targets) in succs.iter().enumerate() {
            for &to in targets {
                reverse[to].push(from);
            }
            if targets.is_empty() {
                reverse[n].push(from);
            }
        }
        self.ipdom = immediate_dominators(&reverse, n)
            .into_iter()
            .take(n)
            .map(|pd| pd.filter(|&p| p != n))
            .collect();

        // -------- feedback edges ---------
        let mut visited = vec![false; n];
        let mut on_stack = vec![false; n];
        if n > 0 {
            self.detect_feedback_dfs(0, &succs, &mut visited, &mut on_stack);
        }

        // -------- compute liveness ---------
        self.compute_liveness(adaptor);

        log::debug!(
            "analyzed {}: {} reachable blocks, {} feedback edges",
            adaptor.func_name(),
            n,
            self.feedback.len()
        );
    }

    fn detect_feedback_dfs(
        &mut self,
        idx: usize,
        succs: &[Vec<usize>],
        visited: &mut [bool],
        on_stack: &mut [bool],
    ) {
        visited[idx] = true;
        on_stack[idx] = true;

        for &succ in &succs[idx] {
            if !visited[succ] {
                self.detect_feedback_dfs(succ, succs, visited, on_stack);
            } else if on_stack[succ] {
                // Back edge found: succ is a loop header
                self.feedback.insert((self.order[idx], self.order[succ]));
            }
        }

        on_stack[idx] = false;
    }

    fn compute_liveness<A: IrAdaptor>(&mut self, adaptor: &A) {
        let n = self.order.len();
        let mut defs: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        let mut upward: Vec<HashSet<VarId>> = vec![HashSet::new(); n];
        let mut phi_uses: Vec<HashSet<VarId>> = vec![HashSet::new(); n];

        for (idx, &block) in self.order.iter().enumerate() {
            defs[idx].extend(adaptor.block_phis(block));
            for stmt in adaptor.block_stmts(block) {
                for var in adaptor.stmt_uses(stmt) {
                    if !defs[idx].contains(&var) {
                        upward[idx].insert(var);
                    }
                }
                defs[idx].extend(adaptor.stmt_defs(stmt));
            }
            for succ in adaptor.block_succs(block) {
                for phi in adaptor.block_phis(succ) {
                    if adaptor.phi_is_virtual(phi) {
                        continue;
                    }
                    if let Some(src) = adaptor.phi_incoming_for_block(phi, block) {
                        phi_uses[idx].insert(src);
                    }
                }
            }
        }

        let succs: Vec<Vec<usize>> = self
            .order
            .iter()
            .map(|&b| adaptor.block_succs(b).filter_map(|s| self.rpo_index(s)).collect())
            .collect();

        self.live_in = upward.clone();
        self.live_out = vec![HashSet::new(); n];
        let mut changed = true;
        while changed {
            changed = false;
            for idx in (0..n).rev() {
                let mut out = phi_uses[idx].clone();
                for &succ in &succs[idx] {
                    out.extend(self.live_in[succ].iter().copied());
                }
                let mut inn = upward[idx].clone();
                inn.extend(out.iter().copied().filter(|v| !defs[idx].contains(v)));
                if inn != self.live_in[idx] || out != self.live_out[idx] {
                    self.live_in[idx] = inn;
                    self.live_out[idx] = out;
                    changed = true;
                }
            }
        }
    }
}

impl DominanceOracle for Analyzer {
    fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        let idx = self.rpo_index(block)?;
        self.idom[idx].map(|p| self.order[p])
    }

    fn immediate_post_dominator(&self, block: BlockId) -> Option<BlockId> {
        let idx = self.rpo_index(block)?;
        self.ipdom[idx].map(|p| self.order[p])
    }

    fn dominator_children(&self, block: BlockId) -> &[BlockId] {
        match self.rpo_index(block) {
            Some(idx) => &self.dom_children[idx],
            None => &[],
        }
    }

    fn is_live_in(&self, block: BlockId, var: VarId) -> bool {
        self.rpo_index(block)
            .map(|idx| self.live_in[idx].contains(&var))
            .unwrap_or(false)
    }

    fn is_feedback_edge(&self, from: BlockId, to: BlockId) -> bool {
        self.feedback.contains(&(from, to))
    }
}

/// Immediate dominators of the graph `succs` rooted at `root`.
///
/// Nodes are plain indices. The root and nodes unreachable from it get `None`.
fn immediate_dominators(succs: &[Vec<usize>], root: usize) -> Vec<Option<usize>> {
    const UNDEF: usize = usize::MAX;
    let n = succs.len();

    // Number the reachable nodes in reverse post order.
    let mut post = Vec::new();
    let mut visited = vec![false; n];
    let mut stack = vec![(root, false)];
    while let Some((node, processed)) = stack.pop() {
        if processed {
            post.push(node);
            continue;
        }
        if visited[node] {
            continue;
        }
        visited[node] = true;
        stack.push((node, true));
        for &succ in succs[node].iter().rev() {
            stack.push((succ, false));
        }
    }
    post.reverse();
    let rpo = post;
    let mut number = vec![UNDEF; n];
    for (i, &node) in rpo.iter().enumerate() {
        number[node] = i;
    }

    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); rpo.len()];
    for (i, &node) in rpo.iter().enumerate() {
        for &succ in &succs[node] {
            if number[succ] != UNDEF {
                preds[number[succ]].push(i);
            }
        }
    }

    let mut doms = vec![UNDEF; rpo.len()];
    if rpo.is_empty() {
        return vec![None; n];
    }
    doms[0] = 0;
    let mut changed = true;
    while changed {
        changed = false;
        for b in 1..rpo.len() {
            let mut new_idom = UNDEF;
            for &p in &preds[b] {
                if doms[p] == UNDEF {
                    continue;
                }
                new_idom = if new_idom == UNDEF {
                    p
                } else {
                    intersect(&doms, p, new_idom)
                };
            }
            if new_idom != UNDEF && doms[b] != new_idom {
                doms[b] = new_idom;
                changed = true;
            }
        }
    }

    let mut result = vec![None; n];
    for (i, &node) in rpo.iter().enumerate().skip(1) {
        if doms[i] != UNDEF {
            result[node] = Some(rpo[doms[i]]);
        }
    }
    result
}

/// Find intersection of two dominators
fn intersect(doms: &[usize], mut b1: usize, mut b2: usize) -> usize {
    while b1 != b2 {
        while b1 > b2 {
            b1 = doms[b1];
        }
        while b2 > b1 {
            b2 = doms[b2];
        }
    }
    b1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idoms_diamond() {
        // 0 -> {1, 2} -> 3
        let succs = vec![vec![1, 2], vec![3], vec![3], vec![]];
        let idom = immediate_dominators(&succs, 0);
        assert_eq!(idom, vec![None, Some(0), Some(0), Some(0)]);
    }

    #[test]
    fn test_idoms_loop() {
        // 0 -> 1 -> 2 -> 1, 1 -> 3
        let succs = vec![vec![1], vec![2, 3], vec![1], vec![]];
        let idom = immediate_dominators(&succs, 0);
        assert_eq!(idom, vec![None, Some(0), Some(1), Some(1)]);
    }

    #[test]
    fn test_idoms_unreachable() {
        let succs = vec![vec![1], vec![], vec![1]];
        let idom = immediate_dominators(&succs, 0);
        assert_eq!(idom[2], None);
        assert_eq!(idom[1], Some(0));
    }
}
