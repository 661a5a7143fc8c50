use pretty_assertions::assert_eq;
use smallvec::smallvec;
use uya_ir::Name;
use uya_types::{FieldDef, Idx, StructDef, TargetConfig, TypeEnv};

use super::*;
use crate::test_helpers::Program;

use RegClass::{Integer, Sse};

fn define(p: &mut Program, name: &str, fields: &[(&str, Idx)]) -> Idx {
    let name = p.n(name);
    let fields = fields
        .iter()
        .map(|&(f, ty)| FieldDef { name: p.n(f), ty })
        .collect();
    p.registry
        .define_struct(
            name,
            StructDef {
                fields,
                implements: vec![],
            },
        )
        .unwrap();
    p.pool.struct_type(name)
}

fn class_of(p: &mut Program, ty: Idx) -> Result<PassingClass, AbiError> {
    let env = TypeEnv {
        pool: &p.pool,
        registry: &p.registry,
        target: &p.target,
    };
    classify(&mut p.layouts, env, ty)
}

fn abi_of(p: &mut Program, params: &[Idx], ret: Idx) -> FunctionAbi {
    let named: Vec<(Name, Idx)> = params.iter().map(|&ty| (Name::EMPTY, ty)).collect();
    let env = TypeEnv {
        pool: &p.pool,
        registry: &p.registry,
        target: &p.target,
    };
    compute_function_abi(&mut p.layouts, env, &named, ret).unwrap()
}

fn regs(classes: &[RegClass]) -> PassingClass {
    PassingClass::ByRegisterSet(classes.iter().copied().collect())
}

// ── Scalars ─────────────────────────────────────────────────────────

#[test]
fn scalars() {
    let mut p = Program::new();
    let ptr = p.pool.pointer(Idx::I32, false);
    assert_eq!(class_of(&mut p, Idx::VOID).unwrap(), PassingClass::Ignore);
    assert_eq!(class_of(&mut p, Idx::I32).unwrap(), regs(&[Integer]));
    assert_eq!(class_of(&mut p, Idx::BOOL).unwrap(), regs(&[Integer]));
    assert_eq!(class_of(&mut p, Idx::F64).unwrap(), regs(&[Sse]));
    assert_eq!(class_of(&mut p, ptr).unwrap(), regs(&[Integer]));
}

// ── Small aggregates ────────────────────────────────────────────────

#[test]
fn two_ints_share_one_integer_register() {
    let mut p = Program::new();
    let pair = define(&mut p, "Pair", &[("a", Idx::I32), ("b", Idx::I32)]);
    assert_eq!(class_of(&mut p, pair).unwrap(), regs(&[Integer]));
}

#[test]
fn two_doubles_use_two_sse_registers() {
    let mut p = Program::new();
    let v = define(&mut p, "Vec2", &[("x", Idx::F64), ("y", Idx::F64)]);
    assert_eq!(class_of(&mut p, v).unwrap(), regs(&[Sse, Sse]));
}

#[test]
fn int_and_float_in_one_eightbyte_merge_to_integer() {
    let mut p = Program::new();
    let mixed = define(&mut p, "Mixed", &[("n", Idx::I32), ("f", Idx::F32)]);
    assert_eq!(class_of(&mut p, mixed).unwrap(), regs(&[Integer]));
}

#[test]
fn two_floats_in_one_eightbyte_stay_sse() {
    let mut p = Program::new();
    let v = define(&mut p, "Vec2f", &[("x", Idx::F32), ("y", Idx::F32)]);
    assert_eq!(class_of(&mut p, v).unwrap(), regs(&[Sse]));
}

#[test]
fn eightbytes_are_classified_independently() {
    let mut p = Program::new();
    let s = define(&mut p, "Tagged", &[("value", Idx::F64), ("tag", Idx::I32)]);
    assert_eq!(class_of(&mut p, s).unwrap(), regs(&[Sse, Integer]));
}

#[test]
fn nested_structs_are_flattened() {
    let mut p = Program::new();
    let inner = define(&mut p, "Inner", &[("x", Idx::F32), ("y", Idx::F32)]);
    let outer = define(&mut p, "Outer", &[("inner", inner), ("z", Idx::F64)]);
    assert_eq!(class_of(&mut p, outer).unwrap(), regs(&[Sse, Sse]));
}

#[test]
fn interface_values_take_two_integer_registers() {
    let mut p = Program::new();
    let name = p.n("Shape");
    p.registry.declare_interface(name).unwrap();
    let shape = p.pool.interface_type(name);
    assert_eq!(class_of(&mut p, shape).unwrap(), regs(&[Integer, Integer]));
}

#[test]
fn error_unions_carry_the_id_in_an_integer_register() {
    let mut p = Program::new();
    let int_union = p.pool.error_union(Idx::I32);
    let float_union = p.pool.error_union(Idx::F64);
    let void_union = p.pool.error_union(Idx::VOID);
    assert_eq!(class_of(&mut p, int_union).unwrap(), regs(&[Integer]));
    assert_eq!(class_of(&mut p, float_union).unwrap(), regs(&[Integer, Sse]));
    assert_eq!(class_of(&mut p, void_union).unwrap(), regs(&[Integer]));
}

// ── Memory ──────────────────────────────────────────────────────────

#[test]
fn large_struct_goes_by_pointer_and_returns_through_sret() {
    let mut p = Program::new();
    let large = define(
        &mut p,
        "LargeStruct",
        &[("a", Idx::I64), ("b", Idx::I64), ("c", Idx::I64)],
    );
    assert_eq!(class_of(&mut p, large).unwrap(), PassingClass::ByPointer);

    let abi = abi_of(&mut p, &[large], large);
    assert!(abi.has_sret());
    assert_eq!(abi.params[0].class, PassingClass::ByPointer);
    assert!(!abi.params[0].copy_in);
    assert_eq!(abi.physical_arity(), 2);
}

#[test]
fn sixteen_bytes_still_fit_in_registers() {
    let mut p = Program::new();
    let s = define(&mut p, "Two", &[("a", Idx::I64), ("b", Idx::I64)]);
    assert_eq!(class_of(&mut p, s).unwrap(), regs(&[Integer, Integer]));
}

#[test]
fn array_parameters_are_copied_in() {
    let mut p = Program::new();
    let arr = p.pool.array(Idx::I32, 4);
    let abi = abi_of(&mut p, &[arr], Idx::I32);
    assert_eq!(
        abi.params[0],
        ParamAbi {
            name: Name::EMPTY,
            ty: arr,
            class: PassingClass::ByPointer,
            copy_in: true,
        }
    );
    assert_eq!(abi.ret.class, PassingClass::ByRegisterSet(smallvec![Integer]));
}

#[test]
fn physical_arity_counts_sret_and_skips_void() {
    let mut p = Program::new();
    let large = define(
        &mut p,
        "Big",
        &[("a", Idx::I64), ("b", Idx::I64), ("c", Idx::I64)],
    );
    let abi = abi_of(&mut p, &[Idx::I32, large, Idx::F64], large);
    assert_eq!(abi.physical_arity(), 4);
    assert_eq!(abi.params[1].class.register_count(), 0);
    assert_eq!(abi.params[2].class.register_count(), 1);

    let abi = abi_of(&mut p, &[Idx::VOID, Idx::I32], Idx::VOID);
    assert!(!abi.has_sret());
    assert_eq!(abi.physical_arity(), 1);
}

// ── Targets ─────────────────────────────────────────────────────────

#[test]
fn aggregates_on_other_targets_are_rejected() {
    let mut p = Program::for_target(TargetConfig::from_triple("i686-unknown-linux-gnu").unwrap());
    let pair = define(&mut p, "Pair", &[("a", Idx::I32), ("b", Idx::I32)]);
    assert!(matches!(
        class_of(&mut p, pair),
        Err(AbiError::UnsupportedTarget { .. })
    ));
    // Scalars need no aggregate rules.
    assert_eq!(class_of(&mut p, Idx::I32).unwrap(), regs(&[Integer]));
}

#[test]
fn incomplete_struct_reports_layout_error() {
    let mut p = Program::new();
    let name = p.n("Later");
    p.registry.declare_struct(name).unwrap();
    let later = p.pool.struct_type(name);
    let err = class_of(&mut p, later).unwrap_err();
    assert!(matches!(err, AbiError::Layout(_)));
}

// ── Slices, tuples and unions ───────────────────────────────────────

#[test]
fn zero_sized_array_elements_add_no_leaves() {
    let mut p = Program::new();
    let empty = p.pool.array(Idx::I32, 0);
    let huge = p.pool.array(empty, 1 << 40);
    let s = define(&mut p, "Sparse", &[("n", Idx::I32), ("none", huge)]);
    assert_eq!(class_of(&mut p, s).unwrap(), regs(&[Integer]));
}

#[test]
fn slices_travel_as_pointer_and_length() {
    let mut p = Program::new();
    let slice = p.pool.slice(Idx::F64, false);
    assert_eq!(class_of(&mut p, slice).unwrap(), regs(&[Integer, Integer]));
}

#[test]
fn tuples_classify_per_element() {
    let mut p = Program::new();
    let floats = p.pool.tuple(&[Idx::F64, Idx::F64]);
    let mixed = p.pool.tuple(&[Idx::F32, Idx::I32, Idx::F64]);
    let wide = p.pool.tuple(&[Idx::I64, Idx::I64, Idx::I64]);
    assert_eq!(class_of(&mut p, floats).unwrap(), regs(&[Sse, Sse]));
    assert_eq!(class_of(&mut p, mixed).unwrap(), regs(&[Integer, Sse]));
    assert_eq!(class_of(&mut p, wide).unwrap(), PassingClass::ByPointer);
}

#[test]
fn union_variants_merge_into_the_payload_eightbyte() {
    let mut p = Program::new();
    let name = p.n("Number");
    let variants = vec![
        FieldDef {
            name: p.n("real"),
            ty: Idx::F64,
        },
        FieldDef {
            name: p.n("whole"),
            ty: Idx::I32,
        },
    ];
    p.registry
        .define_union(name, uya_types::UnionDef { variants })
        .unwrap();
    let union = p.pool.union_type(name);
    assert_eq!(class_of(&mut p, union).unwrap(), regs(&[Integer, Integer]));

    let only_float = p.n("Real");
    let variants = vec![FieldDef {
        name: p.n("real"),
        ty: Idx::F64,
    }];
    p.registry
        .define_union(only_float, uya_types::UnionDef { variants })
        .unwrap();
    let union = p.pool.union_type(only_float);
    assert_eq!(class_of(&mut p, union).unwrap(), regs(&[Integer, Sse]));
}
