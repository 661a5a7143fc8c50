//! CFG utilities over lowered functions: predecessors, postorder and
//! dominators.

use rustc_hash::FxHashSet;

use crate::ir::{BlockId, LoweredFn};

/// Distinct predecessors of each block, indexed by block index.
pub(crate) fn compute_predecessors(func: &LoweredFn) -> Vec<Vec<usize>> {
    let num_blocks = func.blocks.len();
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); num_blocks];

    for (block_idx, block) in func.blocks.iter().enumerate() {
        let mut seen = FxHashSet::default();
        for succ in block.terminator.successors() {
            let succ_idx = succ.index();
            if succ_idx < num_blocks && seen.insert(succ_idx) {
                predecessors[succ_idx].push(block_idx);
            }
        }
    }

    predecessors
}

/// Postorder of the blocks reachable from the entry.
///
/// Iterative DFS with an explicit stack, so deeply nested bodies do not
/// recurse.
pub(crate) fn compute_postorder(func: &LoweredFn) -> Vec<usize> {
    let num_blocks = func.blocks.len();
    let mut visited = vec![false; num_blocks];
    let mut postorder = Vec::with_capacity(num_blocks);
    if num_blocks == 0 {
        return postorder;
    }

    // (block_index, children_pushed)
    let mut stack: Vec<(usize, bool)> = vec![(BlockId::ENTRY.index(), false)];
    while let Some(&mut (block_idx, ref mut children_done)) = stack.last_mut() {
        if *children_done {
            postorder.push(block_idx);
            stack.pop();
            continue;
        }
        *children_done = true;

        if visited[block_idx] {
            stack.pop();
            continue;
        }
        visited[block_idx] = true;

        for succ in func.blocks[block_idx].terminator.successors() {
            let succ_idx = succ.index();
            if succ_idx < num_blocks && !visited[succ_idx] {
                stack.push((succ_idx, false));
            }
        }
    }

    postorder
}

/// Dominator tree (Cooper, Harvey, Kennedy: "A Simple, Fast Dominance
/// Algorithm").
pub(crate) struct DominatorTree {
    /// Immediate dominator per block. `idom[entry] == Some(entry)`;
    /// unreachable blocks have `None`.
    idom: Vec<Option<usize>>,
}

impl DominatorTree {
    pub(crate) fn build(func: &LoweredFn, preds: &[Vec<usize>]) -> Self {
        let n = func.blocks.len();
        if n == 0 {
            return Self { idom: vec![] };
        }

        let mut rpo = compute_postorder(func);
        rpo.reverse();
        let mut rpo_pos = vec![usize::MAX; n];
        for (pos, &block_idx) in rpo.iter().enumerate() {
            rpo_pos[block_idx] = pos;
        }

        let entry = BlockId::ENTRY.index();
        let mut idom: Vec<Option<usize>> = vec![None; n];
        idom[entry] = Some(entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block_idx in rpo.iter().skip(1) {
                let mut processed = preds[block_idx].iter().copied().filter(|&p| idom[p].is_some());
                let Some(first) = processed.next() else {
                    continue;
                };
                let new_idom =
                    processed.fold(first, |acc, pred| Self::intersect(pred, acc, &idom, &rpo_pos));
                if idom[block_idx] != Some(new_idom) {
                    idom[block_idx] = Some(new_idom);
                    changed = true;
                }
            }
        }

        Self { idom }
    }

    pub(crate) fn is_reachable(&self, block: usize) -> bool {
        self.idom.get(block).is_some_and(Option::is_some)
    }

    /// Does `a` dominate `b`? A block dominates itself.
    pub(crate) fn dominates(&self, a: usize, b: usize) -> bool {
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.idom[current] {
                Some(dom) if dom != current => current = dom,
                _ => return false,
            }
        }
    }

    fn intersect(mut a: usize, mut b: usize, idom: &[Option<usize>], rpo_pos: &[usize]) -> usize {
        while a != b {
            while rpo_pos[a] > rpo_pos[b] {
                let Some(next) = idom[a] else {
                    debug_assert!(false, "intersect: broken idom chain at {a}");
                    return a;
                };
                a = next;
            }
            while rpo_pos[b] > rpo_pos[a] {
                let Some(next) = idom[b] else {
                    debug_assert!(false, "intersect: broken idom chain at {b}");
                    return b;
                };
                b = next;
            }
        }
        a
    }
}
