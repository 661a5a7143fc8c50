//! Shared test utilities: a self-contained program fixture and AST
//! shorthands. Only compiled in test builds.

use uya_ir::{
    Expr, FieldDecl, FnDecl, Item, MethodBlock, Module, Name, Param, SharedInterner, Stmt,
    StringInterner, StructDecl, TypeExpr,
};
use uya_mono::Instantiator;
use uya_types::type_info::register_type_info;
use uya_types::{ConstEvaluator, ConstTable, LayoutEngine, Pool, TargetConfig, TypeRegistry};

use crate::cx::{FnTable, LowerCx};
use crate::error_union::ErrorIdTable;
use crate::interface::InterfaceRegistry;
use crate::ir::{BlockId, Inst, LoweredFn, LoweredUnit, VarId};
use crate::{lower_module, UnitError};

/// Shorthand for `VarId::new(n)`.
pub(crate) fn v(n: u32) -> VarId {
    VarId::new(n)
}

/// Shorthand for `BlockId::new(n)`.
pub(crate) fn b(n: u32) -> BlockId {
    BlockId::new(n)
}

/// `return value;`
pub(crate) fn ret(value: Expr) -> Stmt {
    Stmt::Return(Some(value))
}

/// Number of instructions in `func` matching `pred`.
pub(crate) fn count_insts(func: &LoweredFn, pred: impl Fn(&Inst) -> bool) -> usize {
    func.insts().filter(|inst| pred(inst)).count()
}

/// Every program-wide table, owned, so tests can lower several units in a
/// row the way a session does.
pub(crate) struct Program {
    pub(crate) interner: SharedInterner,
    pub(crate) pool: Pool,
    pub(crate) registry: TypeRegistry,
    pub(crate) instantiator: Instantiator,
    pub(crate) layouts: LayoutEngine,
    pub(crate) interfaces: InterfaceRegistry,
    pub(crate) error_ids: ErrorIdTable,
    pub(crate) fns: FnTable,
    pub(crate) consts: ConstTable,
    pub(crate) target: TargetConfig,
}

impl Program {
    pub(crate) fn new() -> Self {
        Self::for_target(TargetConfig::x86_64_linux())
    }

    pub(crate) fn for_target(target: TargetConfig) -> Self {
        let interner = StringInterner::shared();
        let mut pool = Pool::new();
        let mut registry = TypeRegistry::new(interner.clone());
        register_type_info(&mut pool, &mut registry).unwrap();
        Self {
            interner,
            pool,
            registry,
            instantiator: Instantiator::new(),
            layouts: LayoutEngine::new(),
            interfaces: InterfaceRegistry::new(),
            error_ids: ErrorIdTable::new(),
            fns: FnTable::new(),
            consts: ConstTable::default(),
            target,
        }
    }

    pub(crate) fn cx(&mut self) -> LowerCx<'_> {
        LowerCx {
            pool: &mut self.pool,
            registry: &mut self.registry,
            instantiator: &mut self.instantiator,
            layouts: &mut self.layouts,
            interfaces: &mut self.interfaces,
            error_ids: &mut self.error_ids,
            fns: &mut self.fns,
            consts: &self.consts,
            target: &self.target,
            interner: &self.interner,
        }
    }

    /// Fold the unit's constants, then lower it.
    pub(crate) fn lower(&mut self, module: &Module) -> Result<LoweredUnit, UnitError> {
        let folded = ConstEvaluator::new(module.consts(), &self.interner)
            .with_known(&self.consts)
            .eval_all()
            .map_err(|e| UnitError::new(self.interner.lookup(module.name), e))?;
        self.consts.extend(folded);
        lower_module(&mut self.cx(), module)
    }

    // ── AST shorthands ──────────────────────────────────────────────

    pub(crate) fn n(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub(crate) fn text(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    pub(crate) fn ty(&self, s: &str) -> TypeExpr {
        TypeExpr::named(self.n(s))
    }

    pub(crate) fn path(&self, s: &str) -> Expr {
        Expr::path(self.n(s))
    }

    pub(crate) fn field(&self, base: Expr, field: &str) -> Expr {
        Expr::field(base, self.n(field))
    }

    pub(crate) fn call(&self, callee: &str, args: Vec<Expr>) -> Expr {
        Expr::call(self.n(callee), args)
    }

    pub(crate) fn let_(&self, name: &str, init: Expr) -> Stmt {
        Stmt::Let {
            name: self.n(name),
            ty: None,
            init,
        }
    }

    pub(crate) fn struct_lit(&self, ty: TypeExpr, fields: Vec<(&str, Expr)>) -> Expr {
        Expr::StructLit {
            ty,
            fields: fields.into_iter().map(|(f, e)| (self.n(f), e)).collect(),
        }
    }

    pub(crate) fn strukt(&self, name: &str, fields: &[(&str, TypeExpr)]) -> StructDecl {
        StructDecl {
            name: self.n(name),
            type_params: vec![],
            fields: Some(
                fields
                    .iter()
                    .map(|(f, ty)| FieldDecl::new(self.n(f), ty.clone()))
                    .collect(),
            ),
            implements: vec![],
        }
    }

    pub(crate) fn func(
        &self,
        name: &str,
        params: &[(&str, TypeExpr)],
        ret: TypeExpr,
        body: Vec<Stmt>,
    ) -> FnDecl {
        FnDecl {
            name: self.n(name),
            type_params: vec![],
            params: params
                .iter()
                .map(|(p, ty)| Param::new(self.n(p), ty.clone()))
                .collect(),
            ret,
            body: Some(body),
        }
    }

    pub(crate) fn methods(&self, target: &str, methods: Vec<FnDecl>) -> Item {
        Item::Methods(MethodBlock {
            target: self.n(target),
            methods,
        })
    }

    pub(crate) fn module(&self, name: &str, items: Vec<Item>) -> Module {
        Module {
            name: self.n(name),
            items,
        }
    }
}
