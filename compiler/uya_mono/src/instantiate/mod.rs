//! Generic instantiation.
//!
//! Generic structs and functions are registered as definitions. Each request
//! for a definition applied to concrete arguments is memoized under an
//! [`InstantiationKey`], so every key yields exactly one concrete definition
//! with a deterministic name (`Box_i32`, `Pair_i32_bool`, `max_i32`).
//!
//! A struct instance is registered (as a forward declaration) before its
//! fields are resolved. A field that points back at the same instance
//! therefore hits the memo table instead of recursing. Recursion that keeps
//! producing new keys (polymorphic recursion) is cut off at
//! [`MAX_INSTANTIATION_DEPTH`].

mod resolve;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use uya_ir::{FieldDecl, FnDecl, Name, StringInterner, StructDecl};
use uya_types::{ConstTable, FieldDef, FnSig, Idx, Pool, StructDef, TypeRegistry};

use crate::{ConcreteDefId, GenericDefId, GenericError, InstantiationKey, Scope};

/// Nesting limit for instantiations triggered while instantiating.
pub const MAX_INSTANTIATION_DEPTH: u32 = 64;

/// Mutable type tables an instantiation writes into.
pub struct MonoCx<'a> {
    pub pool: &'a mut Pool,
    pub registry: &'a mut TypeRegistry,
    pub consts: &'a ConstTable,
    pub interner: &'a StringInterner,
}

/// A registered generic definition.
#[derive(Clone, Debug, PartialEq)]
pub enum GenericDef {
    Struct {
        name: Name,
        params: Vec<Name>,
        fields: Vec<FieldDecl>,
        implements: Vec<Name>,
    },
    Fn(FnDecl),
}

impl GenericDef {
    pub fn name(&self) -> Name {
        match self {
            Self::Struct { name, .. } => *name,
            Self::Fn(decl) => decl.name,
        }
    }

    pub fn params(&self) -> &[Name] {
        match self {
            Self::Struct { params, .. } => params,
            Self::Fn(decl) => &decl.type_params,
        }
    }
}

/// What an instance became.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InstanceKind {
    /// Concrete struct type registered under the instance name.
    Struct(Idx),
    /// Concrete function signature. The body is lowered separately, once,
    /// under the instance name.
    Fn { sig: FnSig, scope: Scope },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instance {
    pub key: InstantiationKey,
    /// Synthesized name: struct name or function symbol.
    pub name: Name,
    pub kind: InstanceKind,
}

/// Memoizing generic instantiation engine.
#[derive(Clone, Debug, Default)]
pub struct Instantiator {
    defs: Vec<GenericDef>,
    by_name: FxHashMap<Name, GenericDefId>,
    memo: FxHashMap<InstantiationKey, ConcreteDefId>,
    instances: Vec<Instance>,
    /// Function instances whose bodies still need lowering.
    pending_fns: Vec<ConcreteDefId>,
    /// Struct instances not yet seen by the interface binding pass.
    new_structs: Vec<ConcreteDefId>,
    depth: u32,
}

impl Instantiator {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_def(
        &mut self,
        def: GenericDef,
        interner: &StringInterner,
    ) -> Result<GenericDefId, GenericError> {
        let name = def.name();
        if self.by_name.contains_key(&name) {
            return Err(GenericError::NameCollision {
                name: interner.lookup(name).to_owned(),
            });
        }
        #[expect(
            clippy::cast_possible_truncation,
            reason = "definition count never approaches u32::MAX"
        )]
        let id = GenericDefId(self.defs.len() as u32);
        self.defs.push(def);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Register a generic struct definition.
    pub fn register_struct(
        &mut self,
        decl: &StructDecl,
        interner: &StringInterner,
    ) -> Result<GenericDefId, GenericError> {
        let def = GenericDef::Struct {
            name: decl.name,
            params: decl.type_params.clone(),
            fields: decl.fields.clone().unwrap_or_default(),
            implements: decl.implements.clone(),
        };
        self.add_def(def, interner)
    }

    /// Register a generic function definition.
    pub fn register_fn(
        &mut self,
        decl: &FnDecl,
        interner: &StringInterner,
    ) -> Result<GenericDefId, GenericError> {
        self.add_def(GenericDef::Fn(decl.clone()), interner)
    }

    pub fn lookup(&self, name: Name) -> Option<GenericDefId> {
        self.by_name.get(&name).copied()
    }

    pub fn def(&self, id: GenericDefId) -> &GenericDef {
        &self.defs[id.0 as usize]
    }

    pub fn instance(&self, id: ConcreteDefId) -> &Instance {
        &self.instances[id.index()]
    }

    /// All instances, in creation order.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    /// Drain function instances created since the last call.
    pub fn take_pending_fns(&mut self) -> Vec<ConcreteDefId> {
        std::mem::take(&mut self.pending_fns)
    }

    /// Drain struct instances created since the last call.
    pub fn take_new_structs(&mut self) -> Vec<ConcreteDefId> {
        std::mem::take(&mut self.new_structs)
    }

    /// Instantiate `def` with concrete `args`, or return the existing
    /// instance for the same key.
    pub fn instantiate(
        &mut self,
        cx: &mut MonoCx<'_>,
        def: GenericDefId,
        args: &[Idx],
    ) -> Result<ConcreteDefId, GenericError> {
        let generic = self.def(def).clone();
        let base = cx.interner.lookup(generic.name());
        let params = generic.params();

        if params.len() != args.len() {
            return Err(GenericError::ArityMismatch {
                name: base.to_owned(),
                expected: params.len(),
                found: args.len(),
            });
        }
        if let Some((&param, _)) = params
            .iter()
            .zip(args)
            .find(|&(_, &arg)| !cx.pool.flags(arg).is_concrete())
        {
            return Err(GenericError::UnresolvedTypeParam {
                param: cx.interner.lookup(param).to_owned(),
            });
        }

        let key = InstantiationKey {
            def,
            args: SmallVec::from_slice(args),
        };
        if let Some(&id) = self.memo.get(&key) {
            tracing::trace!(name = base, "instantiation cache hit");
            return Ok(id);
        }

        if self.depth >= MAX_INSTANTIATION_DEPTH {
            return Err(GenericError::DepthLimit {
                name: base.to_owned(),
                limit: MAX_INSTANTIATION_DEPTH,
            });
        }

        let mut mangled = base.to_owned();
        for &arg in args {
            mangled.push('_');
            mangled.push_str(&cx.pool.mangle(arg, cx.interner));
        }
        let name = cx.interner.intern(&mangled);
        let scope = Scope::bind_all(params, args);

        let mark = self.instances.len();
        self.depth += 1;
        let result = match &generic {
            GenericDef::Struct {
                fields, implements, ..
            } => self.instantiate_struct(cx, key, name, fields, implements, &scope),
            GenericDef::Fn(decl) => self.instantiate_fn(cx, key, name, decl, scope),
        };
        self.depth -= 1;
        if result.is_err() {
            self.rollback(mark, cx.registry);
        }
        result
    }

    /// Forget every instance created at or after `mark`.
    fn rollback(&mut self, mark: usize, registry: &mut TypeRegistry) {
        for instance in self.instances.drain(mark..) {
            self.memo.remove(&instance.key);
            if let InstanceKind::Struct(_) = instance.kind {
                registry.remove_struct(instance.name);
            }
        }
        self.pending_fns.retain(|id| id.index() < mark);
        self.new_structs.retain(|id| id.index() < mark);
    }

    fn instantiate_struct(
        &mut self,
        cx: &mut MonoCx<'_>,
        key: InstantiationKey,
        name: Name,
        fields: &[FieldDecl],
        implements: &[Name],
        scope: &Scope,
    ) -> Result<ConcreteDefId, GenericError> {
        if cx.registry.kind(name).is_some() {
            return Err(GenericError::NameCollision {
                name: cx.interner.lookup(name).to_owned(),
            });
        }
        cx.registry.declare_struct(name)?;
        let ty = cx.pool.struct_type(name);
        let id = self.push(key, name, InstanceKind::Struct(ty));
        self.new_structs.push(id);

        let fields = fields
            .iter()
            .map(|field| {
                Ok(FieldDef {
                    name: field.name,
                    ty: self.resolve(cx, &field.ty, scope)?,
                })
            })
            .collect::<Result<Vec<_>, GenericError>>()?;
        cx.registry.define_struct(
            name,
            StructDef {
                fields,
                implements: implements.to_vec(),
            },
        )?;

        tracing::debug!(name = cx.interner.lookup(name), "instantiated struct");
        Ok(id)
    }

    fn instantiate_fn(
        &mut self,
        cx: &mut MonoCx<'_>,
        key: InstantiationKey,
        name: Name,
        decl: &FnDecl,
        scope: Scope,
    ) -> Result<ConcreteDefId, GenericError> {
        let params = decl
            .params
            .iter()
            .map(|p| self.resolve(cx, &p.ty, &scope))
            .collect::<Result<Vec<_>, GenericError>>()?;
        let ret = self.resolve(cx, &decl.ret, &scope)?;

        let id = self.push(
            key,
            name,
            InstanceKind::Fn {
                sig: FnSig { params, ret },
                scope,
            },
        );
        self.pending_fns.push(id);
        tracing::debug!(name = cx.interner.lookup(name), "instantiated function");
        Ok(id)
    }

    fn push(&mut self, key: InstantiationKey, name: Name, kind: InstanceKind) -> ConcreteDefId {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "instance count never approaches u32::MAX"
        )]
        let id = ConcreteDefId(self.instances.len() as u32);
        self.memo.insert(key.clone(), id);
        self.instances.push(Instance { key, name, kind });
        id
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
