//! Lowering for the Uya Mini backend.
//!
//! This crate turns declared items and function bodies into a
//! [`LoweredUnit`]: concrete struct layouts, vtables, the error-id table and
//! one [`LoweredFn`] per function, where error unions, fat pointers, `sret`
//! slots, array entry copies and `defer` cleanups are explicit.
//!
//! - **ABI** ([`abi`]): System V x86-64 classification into
//!   [`PassingClass`]es, per-function [`FunctionAbi`]
//! - **Interfaces** ([`interface`]): flattening, vtable slots, implementer
//!   bindings
//! - **Error unions** ([`error_union`]): stable error ids
//! - **Bodies** ([`lower`]): statements and expressions to blocks
//! - **Verification** ([`verify`]): every payload read is dominated by a
//!   zero check of its error id
//!
//! # Crate Dependencies
//!
//! `uya_lower` depends on `uya_types` (pool, registry, layout, constants)
//! and `uya_mono` (type resolution, generic instances). Emission of C text
//! from a `LoweredUnit` is out of scope.

pub mod abi;
mod cx;
mod declare;
mod error;
pub mod error_union;
mod graph;
pub mod interface;
pub mod ir;
pub mod lower;
pub mod verify;

#[cfg(test)]
mod test_helpers;

use rustc_hash::FxHashSet;
use uya_ir::{Module, Name};
use uya_mono::{GenericDef, InstanceKind, Scope};
use uya_types::{Idx, LayoutInfo, Pool, TypeData, TypeRegistry};

pub use abi::{
    classify, compute_function_abi, AbiError, FunctionAbi, ParamAbi, PassingClass, RegClass,
    ReturnAbi,
};
pub use cx::{FnEntry, FnTable, LowerCx};
pub use error::{LowerError, UnitError};
pub use error_union::{error_id, ErrorIdTable};
pub use interface::{InterfaceError, InterfaceMethod, InterfaceRegistry, Vtable};
pub use ir::{
    Block, BlockId, Callee, ExternFn, Inst, InterfaceOut, Literal, LoweredFn, LoweredUnit,
    StructOut, Terminator, VarId, VarInfo,
};
pub use lower::{lower_function, FnJob};

/// Lower one compilation unit against the program tables in `cx`.
///
/// Generic function instances requested while lowering are lowered into
/// this unit, once each; instances created by earlier units are not
/// repeated.
#[tracing::instrument(level = "debug", skip_all, fields(module = cx.text(module.name)))]
pub fn lower_module(cx: &mut LowerCx<'_>, module: &Module) -> Result<LoweredUnit, UnitError> {
    let declared = declare::declare_module(cx, module)?;
    let mut unit = LoweredUnit::default();

    for (decl, sig) in &declared.externs {
        let named: Vec<(Name, Idx)> = decl
            .params
            .iter()
            .zip(&sig.params)
            .map(|(p, &ty)| (p.name, ty))
            .collect();
        let abi = cx
            .function_abi(&named, sig.ret)
            .map_err(|e| UnitError::new(cx.text(decl.name), e))?;
        unit.externs.push(ExternFn {
            symbol: decl.name,
            abi,
        });
    }

    for (decl, sig) in &declared.functions {
        let job = FnJob {
            symbol: decl.name,
            receiver: None,
            params: &decl.params,
            sig,
            body: decl.body.as_deref().unwrap_or_default(),
            types: Scope::new(),
        };
        let func = lower_function(cx, job).map_err(|e| UnitError::new(cx.text(decl.name), e))?;
        unit.functions.push(func);
    }

    for (target, decl, method) in &declared.methods {
        let receiver = cx.pool.struct_type(*target);
        let job = FnJob {
            symbol: method.symbol,
            receiver: Some(receiver),
            params: &decl.params,
            sig: &method.sig,
            body: decl.body.as_deref().unwrap_or_default(),
            types: Scope::new(),
        };
        let func = lower_function(cx, job).map_err(|e| UnitError::new(cx.text(method.symbol), e))?;
        unit.functions.push(func);
    }

    lower_instances(cx, &mut unit)?;
    request_instance_bindings(cx);

    unit.vtables = cx
        .interfaces
        .finalize(cx.registry, cx.pool, cx.interner)
        .map_err(|e| UnitError::new(cx.text(module.name), e))?;

    for &name in &declared.interfaces {
        let methods = cx
            .interfaces
            .flatten(name, cx.interner)
            .map_err(|e| UnitError::new(cx.interner.lookup(name), e))?
            .to_vec();
        unit.interfaces.push(InterfaceOut { name, methods });
    }

    unit.structs = emit_structs(cx)?;
    collect_shapes(cx, &mut unit)?;
    unit.error_ids = cx.error_ids.entries();

    tracing::debug!(
        structs = unit.structs.len(),
        functions = unit.functions.len(),
        vtables = unit.vtables.len(),
        "lowered unit"
    );
    Ok(unit)
}

/// Drain the generic function worklist. Lowering an instance may request
/// further instances.
fn lower_instances(cx: &mut LowerCx<'_>, unit: &mut LoweredUnit) -> Result<(), UnitError> {
    loop {
        let pending = cx.instantiator.take_pending_fns();
        if pending.is_empty() {
            return Ok(());
        }
        for id in pending {
            let instance = cx.instantiator.instance(id).clone();
            let InstanceKind::Fn { sig, scope } = instance.kind else {
                continue;
            };
            let GenericDef::Fn(decl) = cx.instantiator.def(instance.key.def).clone() else {
                continue;
            };
            let job = FnJob {
                symbol: instance.name,
                receiver: None,
                params: &decl.params,
                sig: &sig,
                body: decl.body.as_deref().unwrap_or_default(),
                types: scope,
            };
            let func =
                lower_function(cx, job).map_err(|e| UnitError::new(cx.text(instance.name), e))?;
            tracing::debug!(symbol = cx.text(instance.name), "lowered instance");
            unit.functions.push(func);
        }
    }
}

/// Struct instances created while lowering this unit request a vtable for
/// every interface their generic definition declares.
fn request_instance_bindings(cx: &mut LowerCx<'_>) {
    for id in cx.instantiator.take_new_structs() {
        let name = cx.instantiator.instance(id).name;
        let Some(def) = cx.registry.struct_def(name) else {
            continue;
        };
        for &interface in &def.implements {
            cx.interfaces.request_binding(interface, name);
        }
    }
}

/// Every complete struct and union of the program, each after the
/// aggregates it holds by value, with its layout.
fn emit_structs(cx: &mut LowerCx<'_>) -> Result<Vec<StructOut>, UnitError> {
    let mut roots: Vec<Idx> = Vec::new();
    for &name in cx.registry.struct_names() {
        if cx.registry.struct_def(name).is_some() {
            roots.push(cx.pool.struct_type(name));
        }
    }
    for &name in cx.registry.union_names() {
        if cx.registry.union_def(name).is_some() {
            roots.push(cx.pool.union_type(name));
        }
    }

    let mut ordered = Vec::with_capacity(roots.len());
    let mut visited = FxHashSet::default();
    for ty in roots {
        visit_nominal(cx.registry, cx.pool, ty, &mut visited, &mut ordered);
    }

    let mut out = Vec::with_capacity(ordered.len());
    for ty in ordered {
        let Some(name) = cx.pool.data(ty).nominal_name() else {
            continue;
        };
        let layout = cx
            .layout(ty)
            .map_err(|e| UnitError::new(cx.text(name), e))?;
        out.push(StructOut { name, ty, layout });
    }
    Ok(out)
}

fn visit_nominal(
    registry: &TypeRegistry,
    pool: &Pool,
    ty: Idx,
    visited: &mut FxHashSet<Idx>,
    ordered: &mut Vec<Idx>,
) {
    if !visited.insert(ty) {
        return;
    }
    let members: Vec<Idx> = match *pool.data(ty) {
        TypeData::Struct(name) => match registry.struct_def(name) {
            Some(def) => def.fields.iter().map(|f| f.ty).collect(),
            None => return,
        },
        TypeData::Union(name) => match registry.union_def(name) {
            Some(def) => def.variants.iter().map(|v| v.ty).collect(),
            None => return,
        },
        _ => return,
    };
    let mut deps = Vec::new();
    for member in members {
        by_value_nominals(pool, member, &mut deps);
    }
    for dep in deps {
        visit_nominal(registry, pool, dep, visited, ordered);
    }
    ordered.push(ty);
}

/// Structs and unions a value of `ty` embeds directly, looking through
/// arrays, tuples and error unions but not pointers or slices.
fn by_value_nominals(pool: &Pool, ty: Idx, out: &mut Vec<Idx>) {
    match *pool.data(ty) {
        TypeData::Struct(_) | TypeData::Union(_) => out.push(ty),
        TypeData::Array { elem, .. } | TypeData::ErrorUnion(elem) => {
            by_value_nominals(pool, elem, out);
        }
        TypeData::Tuple { .. } => {
            for &elem in pool.tuple_elems(ty).unwrap_or_default() {
                by_value_nominals(pool, elem, out);
            }
        }
        _ => {}
    }
}

/// Error unions, tuples and slices the unit mentions.
#[derive(Default)]
struct Shapes {
    error_unions: Vec<Idx>,
    tuples: Vec<Idx>,
    slices: Vec<Idx>,
    seen: FxHashSet<Idx>,
}

impl Shapes {
    /// Record `ty` and the anonymous shapes inside it, innermost first.
    fn note(&mut self, pool: &Pool, ty: Idx) {
        if !self.seen.insert(ty) {
            return;
        }
        match *pool.data(ty) {
            TypeData::Pointer { pointee: inner, .. } | TypeData::Array { elem: inner, .. } => {
                self.note(pool, inner);
            }
            TypeData::Slice { elem, .. } => {
                self.note(pool, elem);
                self.slices.push(ty);
            }
            TypeData::ErrorUnion(payload) => {
                self.note(pool, payload);
                self.error_unions.push(ty);
            }
            TypeData::Tuple { .. } => {
                for &elem in pool.tuple_elems(ty).unwrap_or_default() {
                    self.note(pool, elem);
                }
                self.tuples.push(ty);
            }
            _ => {}
        }
    }
}

/// Anonymous compound types the unit mentions, in first-seen order with
/// nested shapes first, each with its layout.
fn collect_shapes(cx: &mut LowerCx<'_>, unit: &mut LoweredUnit) -> Result<(), UnitError> {
    let pool: &Pool = cx.pool;
    let mut shapes = Shapes::default();

    for s in &unit.structs {
        match *pool.data(s.ty) {
            TypeData::Struct(name) => {
                let def = cx.registry.struct_def(name);
                for field in def.map_or(&[][..], |d| d.fields.as_slice()) {
                    shapes.note(pool, field.ty);
                }
            }
            TypeData::Union(name) => {
                let def = cx.registry.union_def(name);
                for variant in def.map_or(&[][..], |d| d.variants.as_slice()) {
                    shapes.note(pool, variant.ty);
                }
            }
            _ => {}
        }
    }
    for ext in &unit.externs {
        shapes.note(pool, ext.abi.ret.ty);
        for p in &ext.abi.params {
            shapes.note(pool, p.ty);
        }
    }
    for func in &unit.functions {
        shapes.note(pool, func.abi.ret.ty);
        for var in &func.vars {
            shapes.note(pool, var.ty);
        }
    }
    for iface in &unit.interfaces {
        for m in &iface.methods {
            shapes.note(pool, m.sig.ret);
            for &p in &m.sig.params {
                shapes.note(pool, p);
            }
        }
    }

    unit.error_unions = with_layouts(cx, shapes.error_unions)?;
    unit.tuples = with_layouts(cx, shapes.tuples)?;
    unit.slices = with_layouts(cx, shapes.slices)?;
    Ok(())
}

fn with_layouts(
    cx: &mut LowerCx<'_>,
    types: Vec<Idx>,
) -> Result<Vec<(Idx, LayoutInfo)>, UnitError> {
    let mut out = Vec::with_capacity(types.len());
    for ty in types {
        let layout = cx
            .layout(ty)
            .map_err(|e| UnitError::new(cx.display(ty), e))?;
        out.push((ty, layout));
    }
    Ok(out)
}
