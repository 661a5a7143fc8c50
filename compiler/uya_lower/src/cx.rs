//! Shared lowering context.

use rustc_hash::{FxHashMap, FxHashSet};
use uya_ir::{Name, StringInterner, TypeExpr};
use uya_mono::{
    ConcreteDefId, GenericDefId, GenericError, InstanceKind, Instantiator, MonoCx, Scope,
};
use uya_types::{
    ConstTable, FnSig, Idx, LayoutEngine, LayoutError, LayoutInfo, Pool, TargetConfig, TypeEnv,
    TypeRegistry,
};

use crate::abi::{compute_function_abi, AbiError, FunctionAbi};
use crate::error_union::ErrorIdTable;
use crate::interface::InterfaceRegistry;
use crate::LowerError;

/// A callable free function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FnEntry {
    Concrete {
        symbol: Name,
        sig: FnSig,
        is_extern: bool,
    },
    /// Generic function; each call site instantiates it.
    Generic(GenericDefId),
}

/// Free functions visible to the program, by source name.
///
/// Symbols of generic function instances are reserved here too, so a plain
/// function can never be emitted under the same symbol as an instance.
#[derive(Clone, Debug, Default)]
pub struct FnTable {
    entries: FxHashMap<Name, FnEntry>,
    instance_symbols: FxHashSet<Name>,
}

impl FnTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: Name,
        entry: FnEntry,
        interner: &StringInterner,
    ) -> Result<(), LowerError> {
        if self.entries.contains_key(&name) || self.instance_symbols.contains(&name) {
            return Err(LowerError::DuplicateDefinition {
                name: interner.lookup(name).to_owned(),
            });
        }
        self.entries.insert(name, entry);
        Ok(())
    }

    /// Reserve the symbol of a generic function instance. Fails when a plain
    /// function already owns it.
    pub fn reserve_instance(
        &mut self,
        symbol: Name,
        interner: &StringInterner,
    ) -> Result<(), GenericError> {
        if self.entries.contains_key(&symbol) {
            return Err(GenericError::NameCollision {
                name: interner.lookup(symbol).to_owned(),
            });
        }
        self.instance_symbols.insert(symbol);
        Ok(())
    }

    pub fn get(&self, name: Name) -> Option<&FnEntry> {
        self.entries.get(&name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Mutable program tables borrowed for the lowering of one unit.
pub struct LowerCx<'a> {
    pub pool: &'a mut Pool,
    pub registry: &'a mut TypeRegistry,
    pub instantiator: &'a mut Instantiator,
    pub layouts: &'a mut LayoutEngine,
    pub interfaces: &'a mut InterfaceRegistry,
    pub error_ids: &'a mut ErrorIdTable,
    pub fns: &'a mut FnTable,
    pub consts: &'a ConstTable,
    pub target: &'a TargetConfig,
    pub interner: &'a StringInterner,
}

impl LowerCx<'_> {
    pub fn env(&self) -> TypeEnv<'_> {
        TypeEnv {
            pool: self.pool,
            registry: self.registry,
            target: self.target,
        }
    }

    /// Resolve a source type under the generic bindings in `scope`.
    pub fn resolve(&mut self, ty: &TypeExpr, scope: &Scope) -> Result<Idx, GenericError> {
        let mut mono = MonoCx {
            pool: self.pool,
            registry: self.registry,
            consts: self.consts,
            interner: self.interner,
        };
        self.instantiator.resolve(&mut mono, ty, scope)
    }

    pub fn instantiate(
        &mut self,
        def: GenericDefId,
        args: &[Idx],
    ) -> Result<ConcreteDefId, GenericError> {
        let mut mono = MonoCx {
            pool: self.pool,
            registry: self.registry,
            consts: self.consts,
            interner: self.interner,
        };
        let id = self.instantiator.instantiate(&mut mono, def, args)?;
        let instance = self.instantiator.instance(id);
        if matches!(instance.kind, InstanceKind::Fn { .. }) {
            self.fns.reserve_instance(instance.name, self.interner)?;
        }
        Ok(id)
    }

    pub fn layout(&mut self, ty: Idx) -> Result<LayoutInfo, LayoutError> {
        let env = TypeEnv {
            pool: self.pool,
            registry: self.registry,
            target: self.target,
        };
        self.layouts.resolve(env, ty)
    }

    pub fn function_abi(
        &mut self,
        params: &[(Name, Idx)],
        ret: Idx,
    ) -> Result<FunctionAbi, AbiError> {
        let env = TypeEnv {
            pool: self.pool,
            registry: self.registry,
            target: self.target,
        };
        compute_function_abi(self.layouts, env, params, ret)
    }

    /// ABI for a call site, where parameter names do not matter.
    pub fn call_abi(&mut self, params: &[Idx], ret: Idx) -> Result<FunctionAbi, AbiError> {
        let named: Vec<(Name, Idx)> = params.iter().map(|&ty| (Name::EMPTY, ty)).collect();
        self.function_abi(&named, ret)
    }

    pub fn display(&self, ty: Idx) -> String {
        self.pool.display(ty, self.interner)
    }

    pub fn text(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }
}
