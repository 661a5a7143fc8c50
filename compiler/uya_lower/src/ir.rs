//! Lowered IR: the emission-ready form of a compilation unit.
//!
//! Function bodies are basic blocks of C-like instructions over typed
//! variables. Everything the source language hides is explicit here:
//!
//! - error unions are built with [`Inst::MakeOk`]/[`Inst::MakeErr`], checked
//!   with [`Terminator::BranchOnError`] and read with [`Inst::UnionPayload`]
//! - interface values are fat pointers ([`Inst::MakeFatPtr`]) and dynamic
//!   calls go through [`Callee::Vtable`]
//! - tuples and slices are plain aggregates: built with [`Inst::Construct`]
//!   and addressed with [`Inst::FieldPtr`] (a slice is `{ data, len }`)
//! - tagged unions are built with [`Inst::MakeUnion`]
//! - `defer`/`errdefer` bodies are already copied onto every exit path
//! - call arguments are the *physical* list: `[sret?, args...]`, with large
//!   aggregates already replaced by pointers to caller temporaries
//!
//! Variables are mutable C locals, not SSA values.

use uya_ir::{BinaryOp, Name, UnaryOp};
use uya_types::{Idx, LayoutInfo};

use crate::abi::FunctionAbi;
use crate::interface::{InterfaceMethod, Vtable};

// ── ID newtypes ─────────────────────────────────────────────────────

/// Variable within a [`LoweredFn`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Basic block within a [`LoweredFn`]. Block 0 is the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(u32);

impl BlockId {
    pub const ENTRY: BlockId = BlockId(0);

    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ── Instructions ────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    /// NUL-terminated string constant, used for `TypeInfo.name`.
    Str(String),
}

/// Call target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Callee {
    /// Static call by symbol.
    Direct(Name),
    /// `receiver.vtable[slot](...)`. The data pointer is passed explicitly
    /// in the argument list.
    Vtable { receiver: VarId, slot: u32 },
}

#[derive(Clone, Debug, PartialEq)]
pub enum Inst {
    /// `dst = literal`
    Const { dst: VarId, value: Literal },
    /// `dst = src`
    Copy { dst: VarId, src: VarId },
    Unary {
        dst: VarId,
        op: UnaryOp,
        operand: VarId,
    },
    Binary {
        dst: VarId,
        op: BinaryOp,
        lhs: VarId,
        rhs: VarId,
    },
    /// `dst = &var`
    AddrOf { dst: VarId, var: VarId },
    /// `dst = *ptr`. Also copies arrays.
    Load { dst: VarId, ptr: VarId },
    /// `*ptr = value`
    Store { ptr: VarId, value: VarId },
    /// `dst = &base->fields[field]`
    FieldPtr { dst: VarId, base: VarId, field: u32 },
    /// `dst = &(*base)[index]`
    ElemPtr {
        dst: VarId,
        base: VarId,
        index: VarId,
    },
    /// Aggregate initializer with designated members (field or element
    /// index). Members not listed are zero.
    Construct {
        dst: VarId,
        members: Vec<(u32, VarId)>,
    },
    /// Call with the physical argument list. `dst` is `None` for `void` and
    /// for `sret` returns, whose result lands in the slot passed first.
    Call {
        dst: Option<VarId>,
        callee: Callee,
        args: Vec<VarId>,
    },
    /// `dst = (uya_interface_I){ &uya_vtable_I_T, data }`
    MakeFatPtr { dst: VarId, data: VarId, vtable: Name },
    /// `dst = fat.data`
    FatData { dst: VarId, fat: VarId },
    /// `dst = { .error_id = 0, .value = value }`
    MakeOk { dst: VarId, value: Option<VarId> },
    /// `dst = { .error_id = error_id }`
    MakeErr { dst: VarId, error_id: VarId },
    /// `dst = union.error_id`
    ErrorId { dst: VarId, union: VarId },
    /// `dst = union.value`. Only valid where `union.error_id == 0` is known.
    UnionPayload { dst: VarId, union: VarId },
    /// `dst = { .tag = tag, .payload.vN = value }` for a tagged union.
    MakeUnion { dst: VarId, tag: u32, value: VarId },
}

impl Inst {
    /// The variable written by this instruction, if any.
    pub fn defined_var(&self) -> Option<VarId> {
        match self {
            Inst::Const { dst, .. }
            | Inst::Copy { dst, .. }
            | Inst::Unary { dst, .. }
            | Inst::Binary { dst, .. }
            | Inst::AddrOf { dst, .. }
            | Inst::Load { dst, .. }
            | Inst::FieldPtr { dst, .. }
            | Inst::ElemPtr { dst, .. }
            | Inst::Construct { dst, .. }
            | Inst::MakeFatPtr { dst, .. }
            | Inst::FatData { dst, .. }
            | Inst::MakeOk { dst, .. }
            | Inst::MakeErr { dst, .. }
            | Inst::ErrorId { dst, .. }
            | Inst::UnionPayload { dst, .. }
            | Inst::MakeUnion { dst, .. } => Some(*dst),
            Inst::Call { dst, .. } => *dst,
            Inst::Store { .. } => None,
        }
    }
}

// ── Terminators and blocks ──────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Terminator {
    Return(Option<VarId>),
    Jump(BlockId),
    Branch {
        cond: VarId,
        then_block: BlockId,
        else_block: BlockId,
    },
    /// `if (union.error_id != 0) goto err; else goto ok;`
    BranchOnError {
        union: VarId,
        ok: BlockId,
        err: BlockId,
    },
    Unreachable,
}

impl Terminator {
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Return(_) | Terminator::Unreachable => vec![],
            Terminator::Jump(target) => vec![*target],
            Terminator::Branch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::BranchOnError { ok, err, .. } => vec![*ok, *err],
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub body: Vec<Inst>,
    pub terminator: Terminator,
}

/// Type and source name of a variable. Hidden temporaries have no name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarInfo {
    pub ty: Idx,
    pub name: Option<Name>,
}

// ── Functions and units ─────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct LoweredFn {
    pub symbol: Name,
    pub abi: FunctionAbi,
    /// Physical parameters in order, `sret` slot first when present.
    pub params: Vec<VarId>,
    pub vars: Vec<VarInfo>,
    pub blocks: Vec<Block>,
}

impl LoweredFn {
    pub fn var_ty(&self, var: VarId) -> Idx {
        self.vars[var.index()].ty
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// All instructions, block by block.
    pub fn insts(&self) -> impl Iterator<Item = &Inst> {
        self.blocks.iter().flat_map(|b| b.body.iter())
    }
}

/// A struct or union definition to emit, with its computed layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructOut {
    pub name: Name,
    pub ty: Idx,
    pub layout: LayoutInfo,
}

/// An interface's fat-pointer and vtable struct shapes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceOut {
    pub name: Name,
    /// Flattened methods in slot order.
    pub methods: Vec<InterfaceMethod>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternFn {
    pub symbol: Name,
    pub abi: FunctionAbi,
}

/// Everything needed to emit one compilation unit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoweredUnit {
    /// Complete structs and unions, each after the aggregates it contains
    /// by value. `ty` tells the two apart.
    pub structs: Vec<StructOut>,
    /// Error-union types used by the unit, with layouts.
    pub error_unions: Vec<(Idx, LayoutInfo)>,
    /// Tuple types used by the unit, nested ones first.
    pub tuples: Vec<(Idx, LayoutInfo)>,
    /// Slice types used by the unit.
    pub slices: Vec<(Idx, LayoutInfo)>,
    pub interfaces: Vec<InterfaceOut>,
    pub vtables: Vec<Vtable>,
    /// Error names and ids assigned so far in the program, in first-use
    /// order.
    pub error_ids: Vec<(Name, u32)>,
    pub externs: Vec<ExternFn>,
    pub functions: Vec<LoweredFn>,
}

impl LoweredUnit {
    pub fn function(&self, symbol: Name) -> Option<&LoweredFn> {
        self.functions.iter().find(|f| f.symbol == symbol)
    }

    pub fn struct_out(&self, name: Name) -> Option<&StructOut> {
        self.structs.iter().find(|s| s.name == name)
    }
}
