use pretty_assertions::assert_eq;
use uya_ir::{ConstExpr, FieldDecl, FnDecl, Param, StringInterner, StructDecl, TypeExpr};
use uya_types::{ConstTable, LayoutEngine, Pool, TargetConfig, TypeEnv, TypeRegistry};

use super::*;

struct Fixture {
    interner: std::sync::Arc<StringInterner>,
    pool: Pool,
    registry: TypeRegistry,
    consts: ConstTable,
    mono: Instantiator,
}

impl Fixture {
    fn new() -> Self {
        let interner = StringInterner::shared();
        Self {
            registry: TypeRegistry::new(interner.clone()),
            interner,
            pool: Pool::new(),
            consts: ConstTable::default(),
            mono: Instantiator::new(),
        }
    }

    fn n(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn ty(&self, s: &str) -> TypeExpr {
        TypeExpr::named(self.n(s))
    }

    fn generic_struct(&mut self, name: &str, params: &[&str], fields: &[(&str, TypeExpr)]) {
        let decl = StructDecl {
            name: self.n(name),
            type_params: params.iter().map(|p| self.n(p)).collect(),
            fields: Some(
                fields
                    .iter()
                    .map(|(f, ty)| FieldDecl::new(self.n(f), ty.clone()))
                    .collect(),
            ),
            implements: vec![],
        };
        self.mono.register_struct(&decl, &self.interner).unwrap();
    }

    fn resolve(&mut self, ty: &TypeExpr) -> Result<Idx, GenericError> {
        let mut cx = MonoCx {
            pool: &mut self.pool,
            registry: &mut self.registry,
            consts: &self.consts,
            interner: &self.interner,
        };
        self.mono.resolve(&mut cx, ty, &Scope::new())
    }

    fn apply(&self, name: &str, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::applied(self.n(name), args)
    }

    fn name_of(&self, idx: Idx) -> String {
        self.pool.display(idx, &self.interner)
    }
}

#[test]
fn same_key_yields_same_instance() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t)]);

    let box_i32 = fx.apply("Box", vec![fx.ty("i32")]);
    let a = fx.resolve(&box_i32).unwrap();
    let b = fx.resolve(&box_i32).unwrap();
    assert_eq!(a, b);
    assert_eq!(fx.name_of(a), "Box_i32");
    assert_eq!(fx.mono.instances().len(), 1);

    let boxed = fx.n("Box_i32");
    let def = fx.registry.struct_def(boxed).unwrap();
    assert_eq!(def.fields[0].ty, Idx::I32);
}

#[test]
fn multiple_arguments_join_with_underscores() {
    let mut fx = Fixture::new();
    let (a, b) = (fx.ty("A"), fx.ty("B"));
    fx.generic_struct("Pair", &["A", "B"], &[("first", a), ("second", b)]);

    let pair = fx.apply("Pair", vec![fx.ty("i32"), fx.ty("bool")]);
    let idx = fx.resolve(&pair).unwrap();
    assert_eq!(fx.name_of(idx), "Pair_i32_bool");
}

#[test]
fn nested_generics_instantiate_inner_first() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t.clone())]);
    let inner = fx.apply("Box", vec![t]);
    fx.generic_struct("DoubleBox", &["T"], &[("inner", inner)]);

    let db = fx.apply("DoubleBox", vec![fx.ty("i32")]);
    let idx = fx.resolve(&db).unwrap();
    assert_eq!(fx.name_of(idx), "DoubleBox_i32");

    let names: Vec<&str> = fx
        .mono
        .instances()
        .iter()
        .map(|i| fx.interner.lookup(i.name))
        .collect();
    assert_eq!(names, vec!["DoubleBox_i32", "Box_i32"]);

    // Using Box<i32> directly afterwards reuses the nested instance.
    let direct = fx.apply("Box", vec![fx.ty("i32")]);
    fx.resolve(&direct).unwrap();
    assert_eq!(fx.mono.instances().len(), 2);
}

#[test]
fn pointer_self_reference_terminates() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    let node_t = fx.apply("Node", vec![t.clone()]);
    fx.generic_struct(
        "Node",
        &["T"],
        &[("value", t), ("next", TypeExpr::pointer(node_t, true))],
    );

    let node = fx.apply("Node", vec![fx.ty("i32")]);
    let idx = fx.resolve(&node).unwrap();
    assert_eq!(fx.mono.instances().len(), 1);

    let target = TargetConfig::x86_64_linux();
    let env = TypeEnv {
        pool: &fx.pool,
        registry: &fx.registry,
        target: &target,
    };
    let layout = LayoutEngine::new().resolve(env, idx).unwrap();
    assert_eq!((layout.size, layout.align), (16, 8));
}

#[test]
fn polymorphic_recursion_hits_depth_limit() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    let boxed_t = fx.apply("Box", vec![t.clone()]);
    fx.generic_struct("Box", &["T"], &[("value", t)]);
    let grow = fx.apply("Grow", vec![boxed_t]);
    fx.generic_struct("Grow", &["T"], &[("next", TypeExpr::pointer(grow, false))]);

    let start = fx.apply("Grow", vec![fx.ty("i32")]);
    let err = fx.resolve(&start).unwrap_err();
    assert!(matches!(err, GenericError::DepthLimit { limit: 64, .. }));
}

#[test]
fn arity_is_checked() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t)]);

    let two = fx.apply("Box", vec![fx.ty("i32"), fx.ty("bool")]);
    assert_eq!(
        fx.resolve(&two).unwrap_err(),
        GenericError::ArityMismatch {
            name: "Box".into(),
            expected: 1,
            found: 2
        }
    );
    let bare = fx.ty("Box");
    assert!(matches!(
        fx.resolve(&bare),
        Err(GenericError::ArityMismatch { found: 0, .. })
    ));
}

#[test]
fn compound_arguments_mangle() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t)]);

    let i32_ty = fx.ty("i32");
    let cases = [
        (TypeExpr::pointer(i32_ty.clone(), false), "Box_ptr_i32"),
        (TypeExpr::array(i32_ty.clone(), ConstExpr::Int(3)), "Box_arr3_i32"),
        (TypeExpr::error_union(i32_ty), "Box_err_i32"),
    ];
    for (arg, expected) in cases {
        let applied = fx.apply("Box", vec![arg]);
        let idx = fx.resolve(&applied).unwrap();
        assert_eq!(fx.name_of(idx), expected);
    }
}

#[test]
fn instance_name_collision() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t)]);
    let taken = fx.n("Box_i32");
    fx.registry.declare_struct(taken).unwrap();

    let applied = fx.apply("Box", vec![fx.ty("i32")]);
    assert_eq!(
        fx.resolve(&applied).unwrap_err(),
        GenericError::NameCollision {
            name: "Box_i32".into()
        }
    );
}

#[test]
fn unknown_and_non_generic_types() {
    let mut fx = Fixture::new();
    let ghost = fx.ty("Ghost");
    assert!(matches!(
        fx.resolve(&ghost),
        Err(GenericError::UnknownType { .. })
    ));

    let plain = fx.n("Plain");
    fx.registry.declare_struct(plain).unwrap();
    let applied = fx.apply("Plain", vec![fx.ty("i32")]);
    assert!(matches!(
        fx.resolve(&applied),
        Err(GenericError::NotGeneric { .. })
    ));
}

#[test]
fn declared_but_unbound_parameter() {
    let mut fx = Fixture::new();
    let t = fx.n("T");
    let mut cx = MonoCx {
        pool: &mut fx.pool,
        registry: &mut fx.registry,
        consts: &fx.consts,
        interner: &fx.interner,
    };
    let err = fx
        .mono
        .resolve(&mut cx, &TypeExpr::named(t), &Scope::declare(&[t]))
        .unwrap_err();
    assert_eq!(err, GenericError::UnresolvedTypeParam { param: "T".into() });
}

#[test]
fn generic_functions_queue_once_per_key() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    let decl = FnDecl {
        name: fx.n("max"),
        type_params: vec![fx.n("T")],
        params: vec![Param::new(fx.n("a"), t.clone()), Param::new(fx.n("b"), t.clone())],
        ret: t,
        body: Some(vec![]),
    };
    let def = fx.mono.register_fn(&decl, &fx.interner).unwrap();

    let mut cx = MonoCx {
        pool: &mut fx.pool,
        registry: &mut fx.registry,
        consts: &fx.consts,
        interner: &fx.interner,
    };
    let first = fx.mono.instantiate(&mut cx, def, &[Idx::I32]).unwrap();
    let again = fx.mono.instantiate(&mut cx, def, &[Idx::I32]).unwrap();
    assert_eq!(first, again);
    assert_eq!(fx.mono.take_pending_fns(), vec![first]);
    assert!(fx.mono.take_pending_fns().is_empty());

    let instance = fx.mono.instance(first);
    assert_eq!(fx.interner.lookup(instance.name), "max_i32");
    match &instance.kind {
        InstanceKind::Fn { sig, .. } => {
            assert_eq!(sig.params, vec![Idx::I32, Idx::I32]);
            assert_eq!(sig.ret, Idx::I32);
        }
        InstanceKind::Struct(_) => panic!("expected a function instance"),
    }
}

#[test]
fn array_length_from_constant() {
    let mut fx = Fixture::new();
    let decls = vec![uya_ir::ConstDecl {
        name: fx.n("N"),
        ty: None,
        value: ConstExpr::Int(4),
    }];
    fx.consts = uya_types::ConstEvaluator::new(&decls, &fx.interner)
        .eval_all()
        .unwrap();
    let arr = TypeExpr::array(fx.ty("u8"), ConstExpr::Ref(fx.n("N")));
    let idx = fx.resolve(&arr).unwrap();
    assert_eq!(fx.name_of(idx), "[u8: 4]");
}

#[test]
fn failed_instance_is_forgotten() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    let ghost = fx.ty("Ghost");
    fx.generic_struct("Holder", &["T"], &[("value", t.clone())]);
    let held = fx.apply("Holder", vec![t]);
    fx.generic_struct("Broken", &["T"], &[("held", held), ("bad", ghost)]);

    let broken = fx.apply("Broken", vec![fx.ty("i32")]);
    assert_eq!(
        fx.resolve(&broken).unwrap_err(),
        GenericError::UnknownType {
            name: "Ghost".into()
        }
    );
    assert!(fx.mono.instances().is_empty());
    assert!(fx.mono.take_new_structs().is_empty());
    assert_eq!(fx.registry.kind(fx.n("Broken_i32")), None);
    assert_eq!(fx.registry.kind(fx.n("Holder_i32")), None);

    // The same key instantiates cleanly once the missing type exists.
    let ghost_name = fx.n("Ghost");
    fx.registry
        .define_struct(ghost_name, uya_types::StructDef::default())
        .unwrap();
    let idx = fx.resolve(&broken).unwrap();
    assert_eq!(fx.name_of(idx), "Broken_i32");
    assert!(fx.registry.struct_def(fx.n("Broken_i32")).is_some());
}

#[test]
fn shared_and_exclusive_pointer_arguments_are_distinct_instances() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t)]);

    let i32_ty = fx.ty("i32");
    let shared = fx.apply("Box", vec![TypeExpr::pointer(i32_ty.clone(), false)]);
    let exclusive = fx.apply("Box", vec![TypeExpr::pointer(i32_ty, true)]);
    let a = fx.resolve(&shared).unwrap();
    let b = fx.resolve(&exclusive).unwrap();

    assert_ne!(a, b);
    assert_eq!(fx.name_of(a), "Box_ptr_i32");
    assert_eq!(fx.name_of(b), "Box_mutptr_i32");
}

#[test]
fn new_struct_instances_are_drained_once() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("Box", &["T"], &[("value", t)]);
    let applied = fx.apply("Box", vec![fx.ty("u8")]);
    fx.resolve(&applied).unwrap();
    fx.resolve(&applied).unwrap();

    let drained = fx.mono.take_new_structs();
    assert_eq!(drained.len(), 1);
    assert_eq!(fx.interner.lookup(fx.mono.instance(drained[0]).name), "Box_u8");
    assert!(fx.mono.take_new_structs().is_empty());
}

#[test]
fn slices_and_tuples_resolve_through_generic_arguments() {
    let mut fx = Fixture::new();
    let t = fx.ty("T");
    fx.generic_struct("View", &["T"], &[("items", TypeExpr::slice(t, false))]);

    let pair = TypeExpr::Tuple(vec![fx.ty("i32"), fx.ty("bool")]);
    let applied = fx.apply("View", vec![pair]);
    let idx = fx.resolve(&applied).unwrap();
    assert_eq!(fx.name_of(idx), "View_tup2_i32_bool");

    let def = fx.registry.struct_def(fx.n("View_tup2_i32_bool")).unwrap();
    assert_eq!(fx.name_of(def.fields[0].ty), "&[(i32, bool)]");
}
