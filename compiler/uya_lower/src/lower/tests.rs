use pretty_assertions::assert_eq;
use uya_ir::{BinaryOp, Expr, Name, Param, Stmt, TypeExpr};
use uya_mono::Scope;
use uya_types::{FieldDef, FnSig, Idx, StructDef, UnionDef};

use super::{lower_function, FnJob};
use crate::cx::FnEntry;
use crate::ir::{Callee, Inst, Literal, LoweredFn, Terminator, VarId};
use crate::test_helpers::{b, count_insts, ret, v, Program};
use crate::LowerError;

/// Lower `body` as `f(params) ret`.
fn lower(
    p: &mut Program,
    params: &[(&str, Idx)],
    ret: Idx,
    body: Vec<Stmt>,
) -> Result<LoweredFn, LowerError> {
    let decl_params: Vec<Param> = params
        .iter()
        .map(|&(name, _)| Param::new(p.n(name), TypeExpr::Void))
        .collect();
    let sig = FnSig {
        params: params.iter().map(|&(_, ty)| ty).collect(),
        ret,
    };
    let job = FnJob {
        symbol: p.n("f"),
        receiver: None,
        params: &decl_params,
        sig: &sig,
        body: &body,
        types: Scope::new(),
    };
    lower_function(&mut p.cx(), job)
}

fn int_binary(p: &Program, op: BinaryOp, name: &str, v: i64) -> Expr {
    Expr::binary(op, p.path(name), Expr::Int(v))
}

fn extern_fn(p: &mut Program, name: &str, params: Vec<Idx>, ret: Idx) -> Name {
    let symbol = p.n(name);
    p.fns
        .insert(
            symbol,
            FnEntry::Concrete {
                symbol,
                sig: FnSig { params, ret },
                is_extern: true,
            },
            &p.interner,
        )
        .unwrap();
    symbol
}

/// `log(n)` as a statement, with `log(i32) void` declared.
fn log(p: &Program, n: i64) -> Stmt {
    Stmt::Expr(p.call("log", vec![Expr::Int(n)]))
}

/// The integer constants passed to `symbol`, in block order.
fn logged(f: &LoweredFn, symbol: Name) -> Vec<i64> {
    let mut consts = Vec::new();
    let mut out = Vec::new();
    for inst in f.blocks.iter().flat_map(|b| &b.body) {
        match inst {
            Inst::Const {
                dst,
                value: Literal::Int(n),
            } => consts.push((*dst, *n)),
            Inst::Call {
                callee: Callee::Direct(s),
                args,
                ..
            } if *s == symbol => {
                let n = consts.iter().find(|(var, _)| *var == args[0]).unwrap().1;
                out.push(n);
            }
            _ => {}
        }
    }
    out
}

fn named_var(f: &LoweredFn, name: Name) -> VarId {
    let index = f.vars.iter().position(|v| v.name == Some(name)).unwrap();
    VarId::new(u32::try_from(index).unwrap())
}

fn position(f: &LoweredFn, pred: impl Fn(&Inst) -> bool) -> usize {
    f.blocks[0].body.iter().position(pred).unwrap()
}

// ── Control flow ────────────────────────────────────────────────────

#[test]
fn while_loop_wires_break_and_continue() {
    let mut p = Program::new();
    let body = vec![
        p.let_("i", Expr::Int(0)),
        Stmt::While {
            cond: int_binary(&p, BinaryOp::Lt, "i", 10),
            body: vec![
                Stmt::Assign {
                    target: p.path("i"),
                    value: int_binary(&p, BinaryOp::Add, "i", 1),
                },
                Stmt::If {
                    cond: int_binary(&p, BinaryOp::Eq, "i", 5),
                    then_branch: vec![Stmt::Continue],
                    else_branch: vec![],
                },
                Stmt::If {
                    cond: int_binary(&p, BinaryOp::Eq, "i", 8),
                    then_branch: vec![Stmt::Break],
                    else_branch: vec![],
                },
            ],
        },
        ret(p.path("i")),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();

    // entry, header, body, exit, then the two `if`s (then, else, merge).
    assert_eq!(f.blocks.len(), 10);
    assert_eq!(f.blocks[0].terminator, Terminator::Jump(b(1)));
    assert!(matches!(
        f.blocks[1].terminator,
        Terminator::Branch { then_block, else_block, .. }
            if then_block == b(2) && else_block == b(3)
    ));
    assert!(matches!(f.blocks[3].terminator, Terminator::Return(Some(_))));
    // `continue` and the end of the body return to the header.
    assert_eq!(f.blocks[4].terminator, Terminator::Jump(b(1)));
    assert_eq!(f.blocks[9].terminator, Terminator::Jump(b(1)));
    // `break` leaves through the exit.
    assert_eq!(f.blocks[7].terminator, Terminator::Jump(b(3)));
}

#[test]
fn break_outside_a_loop_is_rejected() {
    let mut p = Program::new();
    assert_eq!(
        lower(&mut p, &[], Idx::VOID, vec![Stmt::Break]),
        Err(LowerError::OutsideLoop { keyword: "break" })
    );
    assert_eq!(
        lower(&mut p, &[], Idx::VOID, vec![Stmt::Continue]),
        Err(LowerError::OutsideLoop {
            keyword: "continue"
        })
    );
}

#[test]
fn logical_and_skips_the_right_operand() {
    let mut p = Program::new();
    let body = vec![ret(Expr::binary(BinaryOp::And, p.path("a"), p.path("b")))];
    let f = lower(&mut p, &[("a", Idx::BOOL), ("b", Idx::BOOL)], Idx::BOOL, body).unwrap();

    assert_eq!(f.blocks.len(), 3);
    assert!(matches!(
        f.blocks[0].terminator,
        Terminator::Branch { then_block, else_block, .. }
            if then_block == b(1) && else_block == b(2)
    ));
    assert_eq!(f.blocks[1].terminator, Terminator::Jump(b(2)));
}

#[test]
fn code_after_return_lands_in_a_dead_block() {
    let mut p = Program::new();
    let body = vec![ret(Expr::Int(1)), p.let_("x", Expr::Int(2))];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();
    assert_eq!(f.blocks.len(), 2);
    assert_eq!(f.blocks[1].terminator, Terminator::Unreachable);
}

// ── Epilogues ───────────────────────────────────────────────────────

#[test]
fn falling_off_the_end() {
    let mut p = Program::new();

    let f = lower(&mut p, &[], Idx::VOID, vec![]).unwrap();
    assert_eq!(f.blocks[0].terminator, Terminator::Return(None));

    // `!void` succeeds implicitly.
    let ok = p.pool.error_union(Idx::VOID);
    let f = lower(&mut p, &[], ok, vec![]).unwrap();
    assert!(matches!(
        f.blocks[0].body[..],
        [Inst::MakeOk { value: None, .. }]
    ));
    assert!(matches!(f.blocks[0].terminator, Terminator::Return(Some(_))));

    // Both branches return; the merge block is dead.
    let body = vec![Stmt::If {
        cond: p.path("c"),
        then_branch: vec![ret(Expr::Int(1))],
        else_branch: vec![ret(Expr::Int(2))],
    }];
    let f = lower(&mut p, &[("c", Idx::BOOL)], Idx::I32, body).unwrap();
    assert_eq!(f.blocks[3].terminator, Terminator::Unreachable);
}

#[test]
fn bare_return_in_a_fallible_void_function_succeeds() {
    let mut p = Program::new();
    let ok = p.pool.error_union(Idx::VOID);
    let f = lower(&mut p, &[], ok, vec![Stmt::Return(None)]).unwrap();
    assert_eq!(
        count_insts(&f, |i| matches!(i, Inst::MakeOk { value: None, .. })),
        1
    );
}

// ── Values ──────────────────────────────────────────────────────────

#[test]
fn literals_take_the_expected_type() {
    let mut p = Program::new();
    let f = lower(&mut p, &[], Idx::F32, vec![ret(Expr::Int(1))]).unwrap();
    assert_eq!(
        f.blocks[0].body[0],
        Inst::Const {
            dst: v(0),
            value: Literal::Float(1.0),
        }
    );
    assert_eq!(f.var_ty(v(0)), Idx::F32);

    let f = lower(&mut p, &[], Idx::U64, vec![ret(Expr::Int(7))]).unwrap();
    assert_eq!(f.var_ty(v(0)), Idx::U64);
}

#[test]
fn operands_must_agree() {
    let mut p = Program::new();
    let body = vec![ret(Expr::binary(BinaryOp::Add, p.path("a"), p.path("b")))];
    assert_eq!(
        lower(&mut p, &[("a", Idx::I32), ("b", Idx::I64)], Idx::I32, body),
        Err(LowerError::TypeMismatch {
            expected: "i32".into(),
            found: "i64".into(),
        })
    );

    let body = vec![ret(Expr::binary(BinaryOp::Rem, p.path("x"), p.path("x")))];
    assert!(matches!(
        lower(&mut p, &[("x", Idx::F64)], Idx::F64, body),
        Err(LowerError::UnsupportedOperation { .. })
    ));
}

#[test]
fn stores_go_through_pointers() {
    let mut p = Program::new();
    let body = vec![
        p.let_("x", Expr::Int(1)),
        p.let_("r", Expr::addr_of(p.path("x"), true)),
        Stmt::Assign {
            target: Expr::Deref(Box::new(p.path("r"))),
            value: Expr::Int(2),
        },
        ret(p.path("x")),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::AddrOf { .. })), 1);
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::Store { .. })), 1);
}

#[test]
fn mutable_pointer_coerces_to_const() {
    let mut p = Program::new();
    let mutable = p.pool.pointer(Idx::I32, true);
    let shared = p.pool.pointer(Idx::I32, false);
    let body = vec![ret(p.path("p"))];
    let f = lower(&mut p, &[("p", mutable)], shared, body).unwrap();
    let Terminator::Return(Some(v)) = f.blocks[0].terminator else {
        panic!("expected a value return");
    };
    assert_eq!(f.var_ty(v), shared);
}

#[test]
fn void_locals_are_rejected() {
    let mut p = Program::new();
    let log = p.n("log");
    p.fns
        .insert(
            log,
            FnEntry::Concrete {
                symbol: log,
                sig: FnSig {
                    params: vec![],
                    ret: Idx::VOID,
                },
                is_extern: true,
            },
            &p.interner,
        )
        .unwrap();

    let body = vec![p.let_("x", p.call("log", vec![]))];
    assert!(matches!(
        lower(&mut p, &[], Idx::VOID, body),
        Err(LowerError::UnsupportedOperation { .. })
    ));

    let body = vec![Stmt::Expr(p.call("log", vec![Expr::Int(1)]))];
    assert_eq!(
        lower(&mut p, &[], Idx::VOID, body),
        Err(LowerError::ArgCount {
            callee: "log".into(),
            expected: 0,
            found: 1,
        })
    );
}

// ── Methods ─────────────────────────────────────────────────────────

#[test]
fn static_method_calls_pass_self_by_address() {
    let mut p = Program::new();
    let point = p.n("Point");
    let x = p.n("x");
    p.registry
        .define_struct(
            point,
            StructDef {
                fields: vec![FieldDef { name: x, ty: Idx::I32 }],
                implements: vec![],
            },
        )
        .unwrap();
    let get = p.n("get");
    let symbol = p
        .registry
        .attach_method(
            point,
            get,
            FnSig {
                params: vec![],
                ret: Idx::I32,
            },
        )
        .unwrap()
        .symbol;
    let point_ty = p.pool.struct_type(point);
    let point_ptr = p.pool.pointer(point_ty, true);

    let body = vec![ret(Expr::method_call(p.path("pt"), get, vec![]))];
    let f = lower(&mut p, &[("pt", point_ty)], Idx::I32, body).unwrap();
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::AddrOf { .. })), 1);
    assert_eq!(
        count_insts(&f, |i| matches!(
            i,
            Inst::Call { callee: Callee::Direct(s), args, .. } if *s == symbol && args.len() == 1
        )),
        1
    );

    // Through a pointer the receiver is passed as is.
    let body = vec![ret(Expr::method_call(p.path("pt"), get, vec![]))];
    let f = lower(&mut p, &[("pt", point_ptr)], Idx::I32, body).unwrap();
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::AddrOf { .. })), 0);

    let body = vec![ret(Expr::method_call(p.path("pt"), p.n("nope"), vec![]))];
    assert_eq!(
        lower(&mut p, &[("pt", point_ty)], Idx::I32, body),
        Err(LowerError::UnknownFunction {
            name: "Point.nope".into()
        })
    );
}

// ── Evaluation order ────────────────────────────────────────────────

#[test]
fn arguments_keep_their_value_across_later_side_effects() {
    let mut p = Program::new();
    let i32_mut = p.pool.pointer(Idx::I32, true);
    let set = extern_fn(&mut p, "set", vec![i32_mut], Idx::I32);
    let pair = extern_fn(&mut p, "pair", vec![Idx::I32, Idx::I32], Idx::I32);
    let a = p.n("a");
    let call_args = |f: &LoweredFn| {
        f.blocks[0]
            .body
            .iter()
            .find_map(|i| match i {
                Inst::Call {
                    callee: Callee::Direct(s),
                    args,
                    ..
                } if *s == pair => Some(args.clone()),
                _ => None,
            })
            .unwrap()
    };

    // `pair(a, set(&mut a))` passes the value `a` had before `set` ran.
    let body = vec![
        p.let_("a", Expr::Int(1)),
        ret(p.call(
            "pair",
            vec![
                p.path("a"),
                p.call("set", vec![Expr::addr_of(p.path("a"), true)]),
            ],
        )),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();
    let local = named_var(&f, a);
    let first = call_args(&f)[0];
    assert_ne!(first, local);
    let copied = position(&f, |i| *i == Inst::Copy { dst: first, src: local });
    let set_call = position(&f, |i| {
        matches!(i, Inst::Call { callee: Callee::Direct(s), .. } if *s == set)
    });
    assert!(copied < set_call);

    // Without a later side effect the local is passed directly.
    let body = vec![
        p.let_("a", Expr::Int(1)),
        ret(p.call("pair", vec![p.path("a"), Expr::Int(2)])),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();
    assert_eq!(call_args(&f)[0], named_var(&f, a));
}

#[test]
fn binary_left_operand_is_read_before_a_call_on_the_right() {
    let mut p = Program::new();
    let i32_mut = p.pool.pointer(Idx::I32, true);
    extern_fn(&mut p, "set", vec![i32_mut], Idx::I32);
    let a = p.n("a");
    let body = vec![
        p.let_("a", Expr::Int(1)),
        ret(Expr::binary(
            BinaryOp::Add,
            p.path("a"),
            p.call("set", vec![Expr::addr_of(p.path("a"), true)]),
        )),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();
    let local = named_var(&f, a);
    let add = f.blocks[0]
        .body
        .iter()
        .find_map(|i| match *i {
            Inst::Binary {
                op: BinaryOp::Add,
                lhs,
                ..
            } => Some(lhs),
            _ => None,
        })
        .unwrap();
    assert_ne!(add, local);
}

// ── defer / errdefer ────────────────────────────────────────────────

#[test]
fn deferred_bodies_run_at_block_end_last_first() {
    let mut p = Program::new();
    let log_fn = extern_fn(&mut p, "log", vec![Idx::I32], Idx::VOID);
    let body = vec![
        Stmt::Defer(vec![log(&p, 1)]),
        Stmt::Defer(vec![log(&p, 2)]),
        log(&p, 0),
    ];
    let f = lower(&mut p, &[], Idx::VOID, body).unwrap();
    assert_eq!(logged(&f, log_fn), vec![0, 2, 1]);
}

#[test]
fn returned_value_is_taken_before_defers_run() {
    let mut p = Program::new();
    let x = p.n("x");
    let body = vec![
        p.let_("x", Expr::Int(1)),
        Stmt::Defer(vec![Stmt::Assign {
            target: p.path("x"),
            value: Expr::Int(2),
        }]),
        ret(p.path("x")),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();
    let local = named_var(&f, x);
    let Terminator::Return(Some(result)) = f.blocks[0].terminator else {
        panic!("expected a value return");
    };
    assert_ne!(result, local);
    let taken = position(&f, |i| *i == Inst::Copy { dst: result, src: local });
    let overwritten = f.blocks[0]
        .body
        .iter()
        .rposition(|i| matches!(i, Inst::Copy { dst, .. } if *dst == local))
        .unwrap();
    assert!(taken < overwritten);
}

#[test]
fn errdefer_runs_only_when_an_error_leaves_the_function() {
    let mut p = Program::new();
    let log_fn = extern_fn(&mut p, "log", vec![Idx::I32], Idx::VOID);
    let fallible = p.pool.error_union(Idx::I32);
    extern_fn(&mut p, "g", vec![], fallible);

    // `try` propagates: defer then errdefer on the error path, defer alone
    // on the successful return.
    let body = vec![
        Stmt::ErrDefer(vec![log(&p, 1)]),
        Stmt::Defer(vec![log(&p, 2)]),
        p.let_("r", Expr::try_(p.call("g", vec![]))),
        ret(p.path("r")),
    ];
    let f = lower(&mut p, &[], fallible, body).unwrap();
    // Blocks: entry, ok (successful return), err (propagation).
    assert_eq!(logged(&f, log_fn), vec![2, 2, 1]);

    // A returned union is inspected before choosing the cleanups.
    let body = vec![
        Stmt::ErrDefer(vec![log(&p, 1)]),
        ret(p.call("g", vec![])),
    ];
    let f = lower(&mut p, &[], fallible, body).unwrap();
    let branches = f
        .blocks
        .iter()
        .filter(|b| matches!(b.terminator, Terminator::BranchOnError { .. }))
        .count();
    assert_eq!(branches, 1);
    assert_eq!(logged(&f, log_fn), vec![1]);

    // `return error.X` is known to fail.
    let body = vec![
        Stmt::ErrDefer(vec![log(&p, 1)]),
        ret(Expr::ErrorLit(p.n("Bad"))),
    ];
    let f = lower(&mut p, &[], fallible, body).unwrap();
    assert_eq!(logged(&f, log_fn), vec![1]);
}

#[test]
fn errdefer_needs_a_fallible_function() {
    let mut p = Program::new();
    extern_fn(&mut p, "log", vec![Idx::I32], Idx::VOID);
    let body = vec![Stmt::ErrDefer(vec![log(&p, 1)])];
    assert!(matches!(
        lower(&mut p, &[], Idx::VOID, body),
        Err(LowerError::UnsupportedOperation { .. })
    ));
}

#[test]
fn break_runs_only_the_defers_inside_the_loop() {
    let mut p = Program::new();
    let log_fn = extern_fn(&mut p, "log", vec![Idx::I32], Idx::VOID);
    let body = vec![
        Stmt::Defer(vec![log(&p, 0)]),
        Stmt::While {
            cond: Expr::Bool(true),
            body: vec![Stmt::Defer(vec![log(&p, 1)]), Stmt::Break],
        },
    ];
    let f = lower(&mut p, &[], Idx::VOID, body).unwrap();
    // The loop body (block 2) runs its own defer; the exit runs the outer one.
    assert_eq!(logged(&f, log_fn), vec![1, 0]);
    assert_eq!(f.blocks[2].terminator, Terminator::Jump(b(3)));
}

#[test]
fn defer_bodies_cannot_jump_out() {
    let mut p = Program::new();
    let body = vec![Stmt::Defer(vec![Stmt::Return(None)])];
    assert_eq!(
        lower(&mut p, &[], Idx::VOID, body),
        Err(LowerError::ExitFromDefer { keyword: "return" })
    );

    let body = vec![Stmt::While {
        cond: Expr::Bool(true),
        body: vec![Stmt::Defer(vec![Stmt::Break])],
    }];
    assert_eq!(
        lower(&mut p, &[], Idx::VOID, body),
        Err(LowerError::ExitFromDefer { keyword: "break" })
    );

    // A loop of its own inside the body may break.
    let body = vec![Stmt::Defer(vec![Stmt::While {
        cond: Expr::Bool(true),
        body: vec![Stmt::Break],
    }])];
    lower(&mut p, &[], Idx::VOID, body).unwrap();
}

// ── for over arrays, slices and ranges ──────────────────────────────

#[test]
fn for_over_an_array_indexes_each_element() {
    let mut p = Program::new();
    let body = vec![
        p.let_(
            "arr",
            Expr::ArrayLit {
                elem: p.ty("i32"),
                elems: vec![Expr::Int(1), Expr::Int(2), Expr::Int(3)],
            },
        ),
        p.let_("total", Expr::Int(0)),
        Stmt::For {
            binding: p.n("x"),
            iter: p.path("arr"),
            body: vec![Stmt::Assign {
                target: p.path("total"),
                value: Expr::binary(BinaryOp::Add, p.path("total"), p.path("x")),
            }],
        },
        ret(p.path("total")),
    ];
    let f = lower(&mut p, &[], Idx::I32, body).unwrap();

    // entry, header, body, latch, exit.
    assert_eq!(f.blocks.len(), 5);
    assert!(matches!(
        f.blocks[1].terminator,
        Terminator::Branch { then_block, else_block, .. }
            if then_block == b(2) && else_block == b(4)
    ));
    assert_eq!(f.blocks[2].terminator, Terminator::Jump(b(3)));
    assert_eq!(f.blocks[3].terminator, Terminator::Jump(b(1)));
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::ElemPtr { .. })), 1);
    let bound = f.blocks[0]
        .body
        .iter()
        .find_map(|i| match *i {
            Inst::Const {
                dst,
                value: Literal::Int(3),
            } if f.var_ty(dst) == Idx::USIZE => Some(dst),
            _ => None,
        });
    assert!(bound.is_some());
}

#[test]
fn for_over_a_slice_reads_its_data_and_length() {
    let mut p = Program::new();
    let slice = p.pool.slice(Idx::I32, false);
    let body = vec![Stmt::For {
        binding: p.n("x"),
        iter: p.path("s"),
        body: vec![],
    }];
    let f = lower(&mut p, &[("s", slice)], Idx::VOID, body).unwrap();
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::FieldPtr { .. })), 2);
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::ElemPtr { .. })), 1);
}

#[test]
fn range_loop_continues_through_the_increment() {
    let mut p = Program::new();
    let n = p.n("n");
    let body = vec![Stmt::ForRange {
        binding: Some(p.n("i")),
        start: Expr::Int(0),
        end: Some(p.path("n")),
        body: vec![Stmt::Continue],
    }];
    let f = lower(&mut p, &[("n", Idx::I64)], Idx::VOID, body).unwrap();

    assert!(matches!(
        f.blocks[1].terminator,
        Terminator::Branch { then_block, else_block, .. }
            if then_block == b(2) && else_block == b(4)
    ));
    assert_eq!(f.blocks[2].terminator, Terminator::Jump(b(3)));
    assert_eq!(f.blocks[3].terminator, Terminator::Jump(b(1)));

    // The bound is read once, into a temporary; the counter takes its type.
    let Some(Inst::Binary { lhs, rhs, .. }) = f.blocks[1].body.last() else {
        panic!("expected the bound check");
    };
    assert_eq!(f.var_ty(*lhs), Idx::I64);
    assert_ne!(*rhs, named_var(&f, n));
}

#[test]
fn open_range_loops_until_break() {
    let mut p = Program::new();
    let body = vec![Stmt::ForRange {
        binding: Some(p.n("i")),
        start: Expr::Int(0),
        end: None,
        body: vec![Stmt::Break],
    }];
    let f = lower(&mut p, &[], Idx::VOID, body).unwrap();
    assert_eq!(f.blocks[1].terminator, Terminator::Jump(b(2)));
    assert_eq!(f.blocks[2].terminator, Terminator::Jump(b(4)));
}

#[test]
fn range_bounds_must_be_integers() {
    let mut p = Program::new();
    let body = vec![Stmt::ForRange {
        binding: None,
        start: Expr::Bool(false),
        end: Some(Expr::Bool(true)),
        body: vec![],
    }];
    assert!(matches!(
        lower(&mut p, &[], Idx::VOID, body),
        Err(LowerError::UnsupportedOperation { .. })
    ));
}

// ── Tuples, unions and slices ───────────────────────────────────────

#[test]
fn tuple_literal_and_projection() {
    let mut p = Program::new();
    let t = p.n("t");
    let tuple = p.pool.tuple(&[Idx::I32, Idx::BOOL]);
    let body = vec![
        p.let_("t", Expr::TupleLit(vec![Expr::Int(1), Expr::Bool(true)])),
        ret(Expr::TupleField {
            base: Box::new(p.path("t")),
            index: 1,
        }),
    ];
    let f = lower(&mut p, &[], Idx::BOOL, body).unwrap();
    assert_eq!(f.var_ty(named_var(&f, t)), tuple);
    assert_eq!(
        count_insts(&f, |i| matches!(i, Inst::FieldPtr { field: 1, .. })),
        1
    );

    let body = vec![
        p.let_("t", Expr::TupleLit(vec![Expr::Int(1), Expr::Bool(true)])),
        ret(Expr::TupleField {
            base: Box::new(p.path("t")),
            index: 2,
        }),
    ];
    assert_eq!(
        lower(&mut p, &[], Idx::BOOL, body),
        Err(LowerError::UnknownField {
            ty: "(i32, bool)".into(),
            field: "2".into(),
        })
    );
}

#[test]
fn union_literal_tags_its_variant() {
    let mut p = Program::new();
    let value = p.n("Value");
    let (int, real) = (p.n("int"), p.n("real"));
    p.registry
        .define_union(
            value,
            UnionDef {
                variants: vec![
                    FieldDef { name: int, ty: Idx::I32 },
                    FieldDef { name: real, ty: Idx::F64 },
                ],
            },
        )
        .unwrap();
    let union_ty = p.pool.union_type(value);

    let lit = |variant| Expr::UnionLit {
        union_name: value,
        variant,
        value: Box::new(Expr::Int(2)),
    };
    let f = lower(&mut p, &[], union_ty, vec![ret(lit(real))]).unwrap();
    let payload = f.blocks[0]
        .body
        .iter()
        .find_map(|i| match *i {
            Inst::MakeUnion { tag: 1, value, .. } => Some(value),
            _ => None,
        })
        .unwrap();
    assert_eq!(f.var_ty(payload), Idx::F64);

    let text = p.n("text");
    assert_eq!(
        lower(&mut p, &[], union_ty, vec![ret(lit(text))]),
        Err(LowerError::UnknownVariant {
            enum_name: "Value".into(),
            variant: "text".into(),
        })
    );
}

#[test]
fn slicing_an_array_builds_pointer_and_length() {
    let mut p = Program::new();
    let s = p.n("s");
    let body = vec![
        p.let_(
            "arr",
            Expr::ArrayLit {
                elem: p.ty("i32"),
                elems: vec![Expr::Int(1), Expr::Int(2), Expr::Int(3), Expr::Int(4)],
            },
        ),
        Stmt::Let {
            name: s,
            ty: Some(TypeExpr::slice(p.ty("i32"), true)),
            init: Expr::SliceOf {
                base: Box::new(p.path("arr")),
                start: Box::new(Expr::Int(1)),
                len: Box::new(Expr::Int(2)),
            },
        },
        ret(p.field(p.path("s"), "len")),
    ];
    let f = lower(&mut p, &[], Idx::USIZE, body).unwrap();
    let mutable = p.pool.slice(Idx::I32, true);
    assert_eq!(f.var_ty(named_var(&f, s)), mutable);
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::ElemPtr { .. })), 1);
    assert_eq!(
        count_insts(&f, |i| matches!(i, Inst::Construct { members, .. } if members.len() == 2)),
        1
    );
    assert_eq!(
        count_insts(&f, |i| matches!(i, Inst::FieldPtr { field: 1, .. })),
        1
    );
}

#[test]
fn slice_indexing_goes_through_the_data_pointer() {
    let mut p = Program::new();
    let slice = p.pool.slice(Idx::I32, false);
    let body = vec![ret(Expr::Index {
        base: Box::new(p.path("s")),
        index: Box::new(Expr::Int(0)),
    })];
    let f = lower(&mut p, &[("s", slice)], Idx::I32, body).unwrap();
    assert_eq!(
        count_insts(&f, |i| matches!(i, Inst::FieldPtr { field: 0, .. })),
        1
    );
    assert_eq!(count_insts(&f, |i| matches!(i, Inst::ElemPtr { .. })), 1);

    // `&mut [T]` is accepted where `&[T]` is expected.
    let mutable = p.pool.slice(Idx::I32, true);
    let body = vec![ret(p.path("s"))];
    let f = lower(&mut p, &[("s", mutable)], slice, body).unwrap();
    let Terminator::Return(Some(v)) = f.blocks[0].terminator else {
        panic!("expected a value return");
    };
    assert_eq!(f.var_ty(v), slice);
}
