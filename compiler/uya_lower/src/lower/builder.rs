//! Block and variable allocation for one function.

use uya_ir::Name;
use uya_types::Idx;

use crate::abi::FunctionAbi;
use crate::ir::{Block, BlockId, Inst, LoweredFn, Terminator, VarId, VarInfo};

struct BlockBuilder {
    body: Vec<Inst>,
    terminator: Option<Terminator>,
}

/// Position at a block, emit instructions, terminate.
pub(crate) struct FnBuilder {
    blocks: Vec<BlockBuilder>,
    current: BlockId,
    vars: Vec<VarInfo>,
}

impl FnBuilder {
    pub(crate) fn new() -> Self {
        Self {
            blocks: vec![BlockBuilder {
                body: Vec::new(),
                terminator: None,
            }],
            current: BlockId::ENTRY,
            vars: Vec::new(),
        }
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "block indices never exceed u32"
    )]
    pub(crate) fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(BlockBuilder {
            body: Vec::new(),
            terminator: None,
        });
        id
    }

    pub(crate) fn position_at(&mut self, block: BlockId) {
        debug_assert!(block.index() < self.blocks.len());
        self.current = block;
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.blocks[self.current.index()].terminator.is_some()
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "variable indices never exceed u32"
    )]
    fn push_var(&mut self, ty: Idx, name: Option<Name>) -> VarId {
        let id = VarId::new(self.vars.len() as u32);
        self.vars.push(VarInfo { ty, name });
        id
    }

    /// Hidden temporary.
    pub(crate) fn temp(&mut self, ty: Idx) -> VarId {
        self.push_var(ty, None)
    }

    /// Variable carrying a source name.
    pub(crate) fn named(&mut self, ty: Idx, name: Name) -> VarId {
        self.push_var(ty, Some(name))
    }

    pub(crate) fn var_ty(&self, var: VarId) -> Idx {
        self.vars[var.index()].ty
    }

    /// Source-named variables can be assigned again; temporaries cannot.
    pub(crate) fn is_named(&self, var: VarId) -> bool {
        self.vars[var.index()].name.is_some()
    }

    pub(crate) fn emit(&mut self, inst: Inst) {
        debug_assert!(!self.is_terminated(), "emit into a terminated block");
        self.blocks[self.current.index()].body.push(inst);
    }

    /// Terminate the current block. A block keeps its first terminator.
    pub(crate) fn terminate(&mut self, terminator: Terminator) {
        let block = &mut self.blocks[self.current.index()];
        if block.terminator.is_none() {
            block.terminator = Some(terminator);
        }
    }

    /// Continue in a fresh block if the current one already ended, so code
    /// after `return`/`break` still has somewhere to go. Such blocks have no
    /// predecessors.
    pub(crate) fn ensure_open(&mut self) {
        if self.is_terminated() {
            let dead = self.new_block();
            self.position_at(dead);
        }
    }

    pub(crate) fn finish(self, symbol: Name, abi: FunctionAbi, params: Vec<VarId>) -> LoweredFn {
        let blocks = self
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, b)| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "block indices never exceed u32"
                )]
                let id = BlockId::new(i as u32);
                Block {
                    id,
                    body: b.body,
                    terminator: b.terminator.unwrap_or(Terminator::Unreachable),
                }
            })
            .collect();
        LoweredFn {
            symbol,
            abi,
            params,
            vars: self.vars,
            blocks,
        }
    }
}
