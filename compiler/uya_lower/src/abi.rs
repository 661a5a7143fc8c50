//! C calling convention for Uya functions.
//!
//! Every Uya function uses the platform C ABI, so `extern` declarations and
//! Uya definitions share one computation. Aggregates follow the System V
//! x86-64 rules:
//!
//! - up to 16 bytes: split into eightbytes, each classified `Integer` or
//!   `Sse`, passed in up to two registers
//! - over 16 bytes: passed by pointer to a caller-owned temporary, and
//!   returned through a hidden first `sret` pointer
//!
//! Arrays are always passed as a pointer; the callee copies the array into a
//! local on entry so the parameter keeps value semantics.
//!
//! # Key Distinction
//!
//! - **[`FnSig`](uya_types::FnSig)** = *semantic*: parameter and return types
//! - **[`FunctionAbi`]** = *physical*: passing class per parameter, `sret`
//!
//! Body lowering only consults `FunctionAbi` when building call sites and
//! prologues.

use smallvec::{smallvec, SmallVec};
use uya_diagnostic::ErrorCode;
use uya_ir::Name;
use uya_types::{Idx, LayoutEngine, LayoutError, TypeData, TypeEnv};

/// Largest aggregate passed in registers.
pub const MAX_REGISTER_AGGREGATE: u64 = 16;

const EIGHTBYTE: u64 = 8;

// ---------------------------------------------------------------------------
// Classes
// ---------------------------------------------------------------------------

/// Register class of one eightbyte.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegClass {
    Integer,
    Sse,
}

impl RegClass {
    /// System V merge: `Integer` wins over `Sse`.
    fn merge(self, other: RegClass) -> RegClass {
        match (self, other) {
            (RegClass::Sse, RegClass::Sse) => RegClass::Sse,
            _ => RegClass::Integer,
        }
    }
}

/// Register classes of the eightbytes of a value, in order.
pub type RegisterSet = SmallVec<[RegClass; 2]>;

/// How a value crosses a call boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PassingClass {
    /// `void`: not passed at all.
    Ignore,
    /// Passed in `n` registers, one per eightbyte.
    ByRegisterSet(RegisterSet),
    /// Passed through a pointer to memory.
    ByPointer,
}

impl PassingClass {
    pub fn register_count(&self) -> usize {
        match self {
            PassingClass::ByRegisterSet(regs) => regs.len(),
            PassingClass::Ignore | PassingClass::ByPointer => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error(
        "cannot pass aggregate `{ty}` on target `{triple}`: aggregate classification \
         is only implemented for System V x86-64"
    )]
    UnsupportedTarget { triple: String, ty: String },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl AbiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedTarget { .. } => ErrorCode::E5001,
            Self::Layout(e) => e.code(),
        }
    }
}

// ---------------------------------------------------------------------------
// ABI descriptors
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamAbi {
    pub name: Name,
    pub ty: Idx,
    pub class: PassingClass,
    /// The callee copies the pointed-to value into a local on entry
    /// (arrays).
    pub copy_in: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnAbi {
    pub ty: Idx,
    pub class: PassingClass,
}

impl ReturnAbi {
    /// Returned through a hidden first pointer parameter.
    pub fn is_sret(&self) -> bool {
        self.class == PassingClass::ByPointer
    }
}

/// Complete physical ABI for one function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionAbi {
    pub params: Vec<ParamAbi>,
    pub ret: ReturnAbi,
}

impl FunctionAbi {
    pub fn has_sret(&self) -> bool {
        self.ret.is_sret()
    }

    /// Length of the physical argument list: `[sret?, args...]` without
    /// ignored (`void`) parameters.
    pub fn physical_arity(&self) -> usize {
        let args = self
            .params
            .iter()
            .filter(|p| p.class != PassingClass::Ignore)
            .count();
        args + usize::from(self.has_sret())
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classify a value of type `ty` for passing or returning.
pub fn classify(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    ty: Idx,
) -> Result<PassingClass, AbiError> {
    match *env.pool.data(ty) {
        TypeData::Void => Ok(PassingClass::Ignore),
        TypeData::Bool | TypeData::Int { .. } | TypeData::Pointer { .. } | TypeData::Enum(_) => {
            Ok(PassingClass::ByRegisterSet(smallvec![RegClass::Integer]))
        }
        TypeData::Float { .. } => Ok(PassingClass::ByRegisterSet(smallvec![RegClass::Sse])),
        TypeData::Param(_) => {
            // Reports the non-concrete type.
            engine.resolve(env, ty)?;
            Ok(PassingClass::ByPointer)
        }
        TypeData::Struct(_)
        | TypeData::Union(_)
        | TypeData::Array { .. }
        | TypeData::Slice { .. }
        | TypeData::Tuple { .. }
        | TypeData::ErrorUnion(_)
        | TypeData::Interface(_) => classify_aggregate(engine, env, ty),
    }
}

fn classify_aggregate(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    ty: Idx,
) -> Result<PassingClass, AbiError> {
    let layout = engine.resolve(env, ty)?;
    if !env.target.is_sysv_x86_64() {
        return Err(AbiError::UnsupportedTarget {
            triple: env.target.triple().to_owned(),
            ty: env.pool.display(ty, env.registry.interner()),
        });
    }
    if layout.size > MAX_REGISTER_AGGREGATE {
        return Ok(PassingClass::ByPointer);
    }

    let mut leaves = SmallVec::<[(u64, RegClass); 8]>::new();
    collect_leaves(engine, env, ty, 0, &mut leaves)?;

    #[expect(
        clippy::cast_possible_truncation,
        reason = "at most two eightbytes reach this point"
    )]
    let count = layout.size.div_ceil(EIGHTBYTE) as usize;
    let mut slots: SmallVec<[Option<RegClass>; 2]> = smallvec![None; count];
    for (offset, class) in leaves {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "leaf offsets are below 16"
        )]
        let slot = &mut slots[(offset / EIGHTBYTE) as usize];
        *slot = Some(slot.map_or(class, |prev| prev.merge(class)));
    }
    // Padding-only eightbytes (e.g. the byte of an empty struct) travel in
    // an integer register.
    let regs = slots
        .into_iter()
        .map(|slot| slot.unwrap_or(RegClass::Integer))
        .collect();
    Ok(PassingClass::ByRegisterSet(regs))
}

/// Scalar leaves of `ty` with their byte offsets from the aggregate start.
/// Every variant of a union contributes leaves at the payload offset, so
/// their classes merge.
fn collect_leaves(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    ty: Idx,
    base: u64,
    out: &mut SmallVec<[(u64, RegClass); 8]>,
) -> Result<(), AbiError> {
    match *env.pool.data(ty) {
        TypeData::Void | TypeData::Param(_) => {}
        TypeData::Bool | TypeData::Int { .. } | TypeData::Pointer { .. } | TypeData::Enum(_) => {
            out.push((base, RegClass::Integer));
        }
        TypeData::Float { .. } => out.push((base, RegClass::Sse)),
        TypeData::Interface(_) | TypeData::Slice { .. } => {
            let word = env.target.pointer_size();
            out.push((base, RegClass::Integer));
            out.push((base + word, RegClass::Integer));
        }
        TypeData::Array { elem, len } => {
            let stride = engine.size_of(env, elem)?;
            if stride == 0 {
                return Ok(());
            }
            for i in 0..len {
                collect_leaves(engine, env, elem, base + i * stride, out)?;
            }
        }
        TypeData::Struct(name) => {
            let layout = engine.resolve(env, ty)?;
            if let Some(def) = env.registry.struct_def(name) {
                for (field, &offset) in def.fields.iter().zip(&layout.field_offsets) {
                    collect_leaves(engine, env, field.ty, base + offset, out)?;
                }
            }
        }
        TypeData::Tuple { .. } => {
            let layout = engine.resolve(env, ty)?;
            let elems = env.pool.tuple_elems(ty).unwrap_or_default();
            for (&elem, &offset) in elems.iter().zip(&layout.field_offsets) {
                collect_leaves(engine, env, elem, base + offset, out)?;
            }
        }
        TypeData::Union(name) => {
            out.push((base, RegClass::Integer));
            let layout = engine.resolve(env, ty)?;
            let payload = layout.field_offsets.get(1).copied().unwrap_or(0);
            if let Some(def) = env.registry.union_def(name) {
                for variant in &def.variants {
                    collect_leaves(engine, env, variant.ty, base + payload, out)?;
                }
            }
        }
        TypeData::ErrorUnion(payload) => {
            out.push((base, RegClass::Integer));
            let layout = engine.resolve(env, ty)?;
            if let Some(&offset) = layout.field_offsets.get(1) {
                collect_leaves(engine, env, payload, base + offset, out)?;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ABI computation
// ---------------------------------------------------------------------------

pub fn compute_param(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    name: Name,
    ty: Idx,
) -> Result<ParamAbi, AbiError> {
    if let TypeData::Array { .. } = env.pool.data(ty) {
        engine.resolve(env, ty)?;
        return Ok(ParamAbi {
            name,
            ty,
            class: PassingClass::ByPointer,
            copy_in: true,
        });
    }
    Ok(ParamAbi {
        name,
        ty,
        class: classify(engine, env, ty)?,
        copy_in: false,
    })
}

pub fn compute_return(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    ty: Idx,
) -> Result<ReturnAbi, AbiError> {
    Ok(ReturnAbi {
        ty,
        class: classify(engine, env, ty)?,
    })
}

/// Compute the physical ABI of a function from its named parameter types
/// and return type.
pub fn compute_function_abi(
    engine: &mut LayoutEngine,
    env: TypeEnv<'_>,
    params: &[(Name, Idx)],
    ret: Idx,
) -> Result<FunctionAbi, AbiError> {
    let params = params
        .iter()
        .map(|&(name, ty)| compute_param(engine, env, name, ty))
        .collect::<Result<Vec<_>, _>>()?;
    let ret = compute_return(engine, env, ret)?;
    Ok(FunctionAbi { params, ret })
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
