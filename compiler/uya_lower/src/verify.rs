//! Payload-read check on lowered functions.
//!
//! Reading the payload of an error union is only defined once its error id
//! is known to be zero. Lowering guarantees this structurally; this pass
//! re-establishes it on the finished CFG so no later change to lowering can
//! silently emit an unchecked read.
//!
//! A read `UnionPayload { union: u }` in block `B` is accepted when
//!
//! - `u` is assigned exactly once in the function, and
//! - some block `O` dominates `B`, where `O` is the `ok` successor of a
//!   `BranchOnError { union: u }` and that branch is `O`'s only predecessor.

use rustc_hash::FxHashMap;
use uya_ir::StringInterner;

use crate::graph::{compute_predecessors, DominatorTree};
use crate::ir::{Inst, LoweredFn, Terminator, VarId};
use crate::LowerError;

pub fn check_payload_reads(func: &LoweredFn, interner: &StringInterner) -> Result<(), LowerError> {
    let reads_payload = func
        .insts()
        .any(|inst| matches!(inst, Inst::UnionPayload { .. }));
    if !reads_payload {
        return Ok(());
    }

    let preds = compute_predecessors(func);
    let doms = DominatorTree::build(func, &preds);

    let mut assignments: FxHashMap<VarId, usize> = FxHashMap::default();
    for var in func.insts().filter_map(Inst::defined_var) {
        *assignments.entry(var).or_default() += 1;
    }

    // (union, ok block) pairs established by an error-id branch.
    let mut guards: Vec<(VarId, usize)> = Vec::new();
    for (idx, block) in func.blocks.iter().enumerate() {
        if let Terminator::BranchOnError { union, ok, err } = block.terminator {
            if ok != err && doms.is_reachable(idx) && preds[ok.index()] == [idx] {
                guards.push((union, ok.index()));
            }
        }
    }

    for (idx, block) in func.blocks.iter().enumerate() {
        if !doms.is_reachable(idx) {
            continue;
        }
        for inst in &block.body {
            let Inst::UnionPayload { union, .. } = *inst else {
                continue;
            };
            let single = assignments.get(&union).copied().unwrap_or(0) == 1;
            let guarded = guards
                .iter()
                .any(|&(u, ok)| u == union && doms.dominates(ok, idx));
            if !(single && guarded) {
                tracing::debug!(
                    function = interner.lookup(func.symbol),
                    block = idx,
                    "unchecked payload read"
                );
                return Err(LowerError::UncheckedPayloadRead {
                    function: interner.lookup(func.symbol).to_owned(),
                });
            }
        }
    }
    Ok(())
}
