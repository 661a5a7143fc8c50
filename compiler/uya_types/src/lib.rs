//! Type system core for the Uya Mini backend.
//!
//! - [`Idx`] / [`Pool`]: hash-consed type descriptors with pre-computed
//!   [`TypeFlags`]
//! - [`TypeRegistry`]: struct, union, enum and interface declarations in
//!   `Forward`/`Complete` state, plus attached methods
//! - [`LayoutEngine`]: memoized C-compatible size/alignment/offset computation
//! - [`ConstEvaluator`]: compile-time constant folding
//! - [`TargetConfig`]: target triple and word size
//! - [`type_info`]: the builtin `TypeInfo` reflection struct

mod const_eval;
mod data;
mod flags;
mod idx;
pub mod layout;
mod pool;
mod registry;
mod stack;
mod target;
pub mod type_info;

pub use const_eval::{int_fits, ConstError, ConstEvaluator, ConstTable, ConstValue};
pub use data::{FloatWidth, IntWidth, TypeData};
pub use flags::TypeFlags;
pub use idx::Idx;
pub use layout::{LayoutEngine, LayoutError, LayoutInfo};
pub use pool::Pool;
pub use registry::{
    DeclState, EnumDef, FieldDef, FnSig, MethodDef, NominalKind, RegistryError, StructDef,
    TypeRegistry, UnionDef,
};
pub use stack::ensure_sufficient_stack;
pub use target::{TargetConfig, TargetError, TargetTripleComponents, SUPPORTED_TARGETS};

/// Read-only view of the type tables needed for layout queries.
#[derive(Copy, Clone)]
pub struct TypeEnv<'a> {
    pub pool: &'a Pool,
    pub registry: &'a TypeRegistry,
    pub target: &'a TargetConfig,
}
