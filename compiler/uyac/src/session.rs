//! Compilation session: the program-wide tables shared by every unit.
//!
//! A [`Session`] owns the type pool, the nominal registry, generic
//! instances, the layout cache, interface bindings, error ids, free
//! functions and folded constants. Units are compiled against it one at a
//! time, so a concrete definition created by one unit is reused, never
//! recreated, by the next. A unit that fails leaves the tables as they were
//! before it started.

use uya_ir::{Module, Name, SharedInterner, StringInterner};
use uya_lower::{lower_module, ErrorIdTable, FnTable, InterfaceRegistry, LowerCx, LoweredUnit, UnitError};
use uya_mono::Instantiator;
use uya_types::type_info::register_type_info;
use uya_types::{
    ConstEvaluator, ConstTable, Idx, LayoutEngine, LayoutError, LayoutInfo, Pool, TypeEnv,
    TypeRegistry,
};

use crate::{CompileError, CompilerOptions};

pub struct Session {
    options: CompilerOptions,
    interner: SharedInterner,
    pool: Pool,
    registry: TypeRegistry,
    instantiator: Instantiator,
    layouts: LayoutEngine,
    interfaces: InterfaceRegistry,
    error_ids: ErrorIdTable,
    fns: FnTable,
    consts: ConstTable,
    units: usize,
}

/// The tables a unit may change, as they were before it started.
struct Checkpoint {
    pool: Pool,
    registry: TypeRegistry,
    instantiator: Instantiator,
    layouts: LayoutEngine,
    interfaces: InterfaceRegistry,
    error_ids: ErrorIdTable,
    fns: FnTable,
    consts: ConstTable,
}

impl Session {
    pub fn new(options: CompilerOptions) -> Result<Self, CompileError> {
        Self::with_interner(options, StringInterner::shared())
    }

    /// Session over an existing interner, for callers that built their
    /// modules with it.
    pub fn with_interner(
        options: CompilerOptions,
        interner: SharedInterner,
    ) -> Result<Self, CompileError> {
        let mut pool = Pool::new();
        let mut registry = TypeRegistry::new(interner.clone());
        if options.emit_type_info {
            register_type_info(&mut pool, &mut registry)?;
        }
        tracing::debug!(target = options.target.triple(), "session created");
        Ok(Self {
            options,
            interner,
            pool,
            registry,
            instantiator: Instantiator::new(),
            layouts: LayoutEngine::new(),
            interfaces: InterfaceRegistry::new(),
            error_ids: ErrorIdTable::new(),
            fns: FnTable::new(),
            consts: ConstTable::default(),
            units: 0,
        })
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn instantiator(&self) -> &Instantiator {
        &self.instantiator
    }

    pub fn interfaces(&self) -> &InterfaceRegistry {
        &self.interfaces
    }

    pub fn error_ids(&self) -> &ErrorIdTable {
        &self.error_ids
    }

    /// Constants folded by every unit compiled so far.
    pub fn consts(&self) -> &ConstTable {
        &self.consts
    }

    /// Number of units compiled successfully.
    pub fn units_compiled(&self) -> usize {
        self.units
    }

    /// Layout of `ty`, computed once per session.
    pub fn layout(&mut self, ty: Idx) -> Result<LayoutInfo, LayoutError> {
        let env = TypeEnv {
            pool: &self.pool,
            registry: &self.registry,
            target: &self.options.target,
        };
        self.layouts.resolve(env, ty)
    }

    pub fn display(&self, ty: Idx) -> String {
        self.pool.display(ty, &self.interner)
    }

    // ── Compilation ─────────────────────────────────────────────────

    /// Fold the constants of `module` against those of earlier units.
    ///
    /// Only reads the session, so several units can be folded at once.
    pub fn fold_consts(&self, module: &Module) -> Result<ConstTable, CompileError> {
        fold_with(module, &self.consts, [], &self.interner)
    }

    /// Fold and lower one unit.
    #[tracing::instrument(level = "debug", skip_all, fields(unit = self.interner.lookup(module.name)))]
    pub fn compile_unit(&mut self, module: &Module) -> Result<LoweredUnit, CompileError> {
        let folded = self.fold_consts(module)?;
        self.lower_folded(module, folded)
    }

    /// Lower a unit whose constants are already folded. On failure the
    /// session is restored to its state before the call.
    pub(crate) fn lower_folded(
        &mut self,
        module: &Module,
        folded: ConstTable,
    ) -> Result<LoweredUnit, CompileError> {
        let unit_name = self.interner.lookup(module.name);
        let checkpoint = self.checkpoint();
        self.consts.extend(folded);
        let unit = match lower_module(&mut self.cx(), module) {
            Ok(unit) => unit,
            Err(error) => {
                self.restore(checkpoint);
                tracing::debug!(unit = unit_name, "unit failed, session restored");
                return Err(CompileError::unit(unit_name, error));
            }
        };
        self.units += 1;
        tracing::debug!(
            unit = unit_name,
            structs = unit.structs.len(),
            functions = unit.functions.len(),
            vtables = unit.vtables.len(),
            "unit compiled"
        );
        Ok(unit)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pool: self.pool.clone(),
            registry: self.registry.clone(),
            instantiator: self.instantiator.clone(),
            layouts: self.layouts.clone(),
            interfaces: self.interfaces.clone(),
            error_ids: self.error_ids.clone(),
            fns: self.fns.clone(),
            consts: self.consts.clone(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint) {
        self.pool = checkpoint.pool;
        self.registry = checkpoint.registry;
        self.instantiator = checkpoint.instantiator;
        self.layouts = checkpoint.layouts;
        self.interfaces = checkpoint.interfaces;
        self.error_ids = checkpoint.error_ids;
        self.fns = checkpoint.fns;
        self.consts = checkpoint.consts;
    }

    fn cx(&mut self) -> LowerCx<'_> {
        LowerCx {
            pool: &mut self.pool,
            registry: &mut self.registry,
            instantiator: &mut self.instantiator,
            layouts: &mut self.layouts,
            interfaces: &mut self.interfaces,
            error_ids: &mut self.error_ids,
            fns: &mut self.fns,
            consts: &self.consts,
            target: &self.options.target,
            interner: &self.interner,
        }
    }
}

/// Fold the constants of `module` given the constants already known,
/// ignoring the known names in `hidden`.
pub(crate) fn fold_with(
    module: &Module,
    known: &ConstTable,
    hidden: impl IntoIterator<Item = Name>,
    interner: &StringInterner,
) -> Result<ConstTable, CompileError> {
    ConstEvaluator::new(module.consts(), interner)
        .with_known(known)
        .with_hidden(hidden)
        .eval_all()
        .map_err(|e| {
            let unit = interner.lookup(module.name);
            CompileError::unit(unit, UnitError::new(unit, e))
        })
}
