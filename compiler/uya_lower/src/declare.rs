//! Declaration passes for one unit.
//!
//! ```text
//! Pass 1: Names
//!   - structs (forward), generic structs, unions, interfaces
//! Pass 2: Enums
//!   - underlying type, folded tags
//! Pass 3: Struct and union bodies
//!   - field and variant types, `implements` lists
//! Pass 4: Interfaces
//!   - method signatures, embeds (flattened eagerly to surface conflicts)
//! Pass 5: Free functions
//!   - concrete signatures, generic definitions
//! Pass 6: Method blocks
//!   - signatures attached to their struct
//! Pass 7: Declared implementations
//!   - one vtable request per `implements` entry of a concrete struct
//! ```
//!
//! Instances of generic structs request their vtables when they are
//! created, see `lower_module`.
//!
//! Every name is known after pass 1, so declarations may refer to each
//! other in any order within the unit.

use uya_ir::{
    ConstExpr, EnumDecl, FnDecl, InterfaceDecl, InterfaceMember, Item, MethodBlock, Module, Name,
    Param, StructDecl, TypeExpr, UnionDecl,
};
use uya_mono::{GenericError, Scope};
use uya_types::{
    int_fits, ConstError, ConstValue, EnumDef, FieldDef, FnSig, MethodDef, NominalKind, StructDef,
    UnionDef,
};

use crate::cx::{FnEntry, LowerCx};
use crate::interface::{InterfaceError, InterfaceMethod, ResolvedMember};
use crate::{LowerError, UnitError};

/// Declarations of a unit that still need code.
#[derive(Default)]
pub(crate) struct Declared<'m> {
    pub(crate) functions: Vec<(&'m FnDecl, FnSig)>,
    pub(crate) externs: Vec<(&'m FnDecl, FnSig)>,
    /// `(target, decl, attached method)`.
    pub(crate) methods: Vec<(Name, &'m FnDecl, MethodDef)>,
    /// Interfaces defined by this unit.
    pub(crate) interfaces: Vec<Name>,
}

fn at<E: Into<LowerError>>(subject: impl Into<String>) -> impl FnOnce(E) -> UnitError {
    let subject = subject.into();
    move |error| UnitError::new(subject, error)
}

#[tracing::instrument(level = "debug", skip_all, fields(items = module.items.len()))]
pub(crate) fn declare_module<'m>(
    cx: &mut LowerCx<'_>,
    module: &'m Module,
) -> Result<Declared<'m>, UnitError> {
    let mut declared = Declared::default();

    // Pass 1
    for item in &module.items {
        match item {
            Item::Struct(decl) => declare_struct_name(cx, decl)?,
            Item::Union(decl) => {
                let name = cx.text(decl.name);
                cx.registry.declare_union(decl.name).map_err(at(name))?;
            }
            Item::Interface(decl) => {
                let name = cx.text(decl.name);
                cx.registry.declare_interface(decl.name).map_err(at(name))?;
            }
            _ => {}
        }
    }

    // Pass 2
    for item in &module.items {
        if let Item::Enum(decl) = item {
            declare_enum(cx, decl)?;
        }
    }

    // Pass 3
    for item in &module.items {
        match item {
            Item::Struct(decl) => define_struct(cx, decl)?,
            Item::Union(decl) => define_union(cx, decl)?,
            _ => {}
        }
    }

    // Pass 4
    for item in &module.items {
        if let Item::Interface(decl) = item {
            define_interface(cx, decl)?;
            declared.interfaces.push(decl.name);
        }
    }
    for &name in &declared.interfaces {
        cx.interfaces
            .flatten(name, cx.interner)
            .map_err(at(cx.interner.lookup(name)))?;
    }

    // Pass 5
    for item in &module.items {
        if let Item::Function(decl) = item {
            declare_function(cx, decl, &mut declared)?;
        }
    }

    // Pass 6
    for item in &module.items {
        if let Item::Methods(block) = item {
            declare_methods(cx, block, &mut declared)?;
        }
    }

    // Pass 7
    for item in &module.items {
        if let Item::Struct(decl) = item {
            if decl.type_params.is_empty() && decl.fields.is_some() {
                for &interface in &decl.implements {
                    cx.interfaces.request_binding(interface, decl.name);
                }
            }
        }
    }

    tracing::debug!(
        functions = declared.functions.len(),
        externs = declared.externs.len(),
        methods = declared.methods.len(),
        "declared unit"
    );
    Ok(declared)
}

fn declare_struct_name(cx: &mut LowerCx<'_>, decl: &StructDecl) -> Result<(), UnitError> {
    let name = cx.text(decl.name);
    if decl.type_params.is_empty() {
        cx.registry.declare_struct(decl.name).map_err(at(name))
    } else {
        cx.instantiator
            .register_struct(decl, cx.interner)
            .map(|_| ())
            .map_err(at(name))
    }
}

fn declare_enum(cx: &mut LowerCx<'_>, decl: &EnumDecl) -> Result<(), UnitError> {
    let subject = cx.text(decl.name);
    let underlying = match &decl.underlying {
        Some(ty) => {
            let idx = cx.resolve(ty, &Scope::new()).map_err(at(subject))?;
            if cx.pool.int_info(idx).is_none() {
                return Err(UnitError::new(
                    subject,
                    LowerError::TypeMismatch {
                        expected: "an integer type".to_owned(),
                        found: cx.display(idx),
                    },
                ));
            }
            Some(idx)
        }
        None => None,
    };

    let mut variants: Vec<(Name, i64)> = Vec::with_capacity(decl.variants.len());
    // `None` once an implicit tag would pass `i64::MAX`.
    let mut next = Some(0i64);
    for variant in &decl.variants {
        let qualified = format!("{subject}.{}", cx.text(variant.name));
        if variants.iter().any(|&(n, _)| n == variant.name) {
            return Err(UnitError::new(
                subject,
                LowerError::DuplicateDefinition { name: qualified },
            ));
        }
        let tag = match &variant.value {
            Some(expr) => fold_tag(cx, expr, &qualified).map_err(at(subject))?,
            None => next.ok_or_else(|| {
                UnitError::new(
                    subject,
                    ConstError::Overflow {
                        name: qualified.clone(),
                    },
                )
            })?,
        };
        if let Some((width, signed)) = underlying.and_then(|u| cx.pool.int_info(u)) {
            if !int_fits(tag, width, signed) {
                return Err(UnitError::new(
                    subject,
                    ConstError::Overflow { name: qualified },
                ));
            }
        }
        variants.push((variant.name, tag));
        next = tag.checked_add(1);
    }

    cx.registry
        .define_enum(
            decl.name,
            EnumDef {
                underlying,
                variants,
            },
        )
        .map_err(at(subject))?;
    Ok(())
}

fn fold_tag(cx: &LowerCx<'_>, expr: &ConstExpr, qualified: &str) -> Result<i64, ConstError> {
    match cx.consts.eval_expr(expr, cx.interner)? {
        ConstValue::Int(v) => Ok(v),
        other => Err(ConstError::TypeMismatch {
            name: qualified.to_owned(),
            detail: format!("enum tag must be an integer, found {other:?}"),
        }),
    }
}

fn define_struct(cx: &mut LowerCx<'_>, decl: &StructDecl) -> Result<(), UnitError> {
    let subject = cx.text(decl.name);
    for &interface in &decl.implements {
        if cx.registry.kind(interface) != Some(NominalKind::Interface) {
            return Err(UnitError::new(
                subject,
                InterfaceError::UnknownInterface {
                    name: cx.text(interface).to_owned(),
                },
            ));
        }
    }

    let Some(fields) = &decl.fields else {
        return Ok(());
    };
    if !decl.type_params.is_empty() {
        return Ok(());
    }

    let scope = Scope::new();
    let mut defs = Vec::with_capacity(fields.len());
    for field in fields {
        if defs.iter().any(|f: &FieldDef| f.name == field.name) {
            return Err(UnitError::new(
                subject,
                LowerError::DuplicateDefinition {
                    name: format!("{subject}.{}", cx.text(field.name)),
                },
            ));
        }
        let ty = cx.resolve(&field.ty, &scope).map_err(at(subject))?;
        defs.push(FieldDef {
            name: field.name,
            ty,
        });
    }

    cx.registry
        .define_struct(
            decl.name,
            StructDef {
                fields: defs,
                implements: decl.implements.clone(),
            },
        )
        .map_err(at(subject))?;
    Ok(())
}

fn define_union(cx: &mut LowerCx<'_>, decl: &UnionDecl) -> Result<(), UnitError> {
    let subject = cx.text(decl.name);
    let scope = Scope::new();
    let mut variants: Vec<FieldDef> = Vec::with_capacity(decl.variants.len());
    for variant in &decl.variants {
        if variants.iter().any(|v| v.name == variant.name) {
            return Err(UnitError::new(
                subject,
                LowerError::DuplicateDefinition {
                    name: format!("{subject}.{}", cx.text(variant.name)),
                },
            ));
        }
        let ty = cx.resolve(&variant.ty, &scope).map_err(at(subject))?;
        variants.push(FieldDef {
            name: variant.name,
            ty,
        });
    }
    cx.registry
        .define_union(decl.name, UnionDef { variants })
        .map_err(at(subject))?;
    Ok(())
}

/// Parameter and return types of a non-generic signature.
fn resolve_sig(
    cx: &mut LowerCx<'_>,
    params: &[Param],
    ret: &TypeExpr,
) -> Result<FnSig, GenericError> {
    let scope = Scope::new();
    let mut resolved = Vec::with_capacity(params.len());
    for param in params {
        resolved.push(cx.resolve(&param.ty, &scope)?);
    }
    let ret = cx.resolve(ret, &scope)?;
    Ok(FnSig {
        params: resolved,
        ret,
    })
}

fn define_interface(cx: &mut LowerCx<'_>, decl: &InterfaceDecl) -> Result<(), UnitError> {
    let subject = cx.text(decl.name);
    let mut members = Vec::with_capacity(decl.members.len());
    for member in &decl.members {
        match member {
            InterfaceMember::Embed(inner) => {
                if cx.registry.kind(*inner) != Some(NominalKind::Interface) {
                    return Err(UnitError::new(
                        subject,
                        InterfaceError::UnknownInterface {
                            name: cx.text(*inner).to_owned(),
                        },
                    ));
                }
                members.push(ResolvedMember::Embed(*inner));
            }
            InterfaceMember::Method(sig) => {
                let resolved = resolve_sig(cx, &sig.params, &sig.ret).map_err(at(subject))?;
                members.push(ResolvedMember::Method(InterfaceMethod {
                    name: sig.name,
                    sig: resolved,
                }));
            }
        }
    }
    cx.interfaces
        .define(decl.name, members, cx.interner)
        .map_err(at(subject))?;
    Ok(())
}

fn declare_function<'m>(
    cx: &mut LowerCx<'_>,
    decl: &'m FnDecl,
    declared: &mut Declared<'m>,
) -> Result<(), UnitError> {
    let subject = cx.text(decl.name);
    if decl.is_generic() {
        if decl.is_extern() {
            return Err(UnitError::new(
                subject,
                LowerError::UnsupportedOperation {
                    detail: "generic extern function".to_owned(),
                },
            ));
        }
        let id = cx
            .instantiator
            .register_fn(decl, cx.interner)
            .map_err(at(subject))?;
        return cx
            .fns
            .insert(decl.name, FnEntry::Generic(id), cx.interner)
            .map_err(at(subject));
    }

    let sig = resolve_sig(cx, &decl.params, &decl.ret).map_err(at(subject))?;
    cx.fns
        .insert(
            decl.name,
            FnEntry::Concrete {
                symbol: decl.name,
                sig: sig.clone(),
                is_extern: decl.is_extern(),
            },
            cx.interner,
        )
        .map_err(at(subject))?;
    if decl.is_extern() {
        declared.externs.push((decl, sig));
    } else {
        declared.functions.push((decl, sig));
    }
    Ok(())
}

fn declare_methods<'m>(
    cx: &mut LowerCx<'_>,
    block: &'m MethodBlock,
    declared: &mut Declared<'m>,
) -> Result<(), UnitError> {
    let target = cx.text(block.target);
    if cx.instantiator.lookup(block.target).is_some() {
        return Err(UnitError::new(
            target,
            LowerError::UnsupportedOperation {
                detail: format!("methods on generic struct `{target}`"),
            },
        ));
    }

    for decl in &block.methods {
        let subject = format!("{target}.{}", cx.text(decl.name));
        if decl.is_generic() || decl.is_extern() {
            return Err(UnitError::new(
                subject,
                LowerError::UnsupportedOperation {
                    detail: "generic or bodiless method".to_owned(),
                },
            ));
        }
        let sig = resolve_sig(cx, &decl.params, &decl.ret).map_err(at(subject.as_str()))?;
        let method = cx
            .registry
            .attach_method(block.target, decl.name, sig)
            .map_err(at(subject.as_str()))?
            .clone();
        declared.methods.push((block.target, decl, method));
    }
    Ok(())
}
