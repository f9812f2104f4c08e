//! Integration tests for MIR generation.
//!
//! Programs are type-checked first, then lowered; assertions look at the
//! instruction tree rather than the printed form except where the layout
//! itself is under test.

use mimium_ast::build::*;
use mimium_ast::{Block as AstBlock, OpId};
use mimium_common::Type;
use mimium_mir::{
    generate, FcallKind, FieldIndex, Instruction, Mir, MirError, MirGenerator, ValueId,
    ValueKind,
};
use rustc_hash::FxHashSet;

// ── Helpers ────────────────────────────────────────────────────────────

fn lower(prog: &AstBlock) -> Mir {
    let env = match mimium_typeck::infer(prog) {
        Ok(env) => env,
        Err(e) => panic!("unexpected type error: {}", e),
    };
    match generate(&env, prog) {
        Ok(mir) => mir,
        Err(e) => panic!("unexpected MIR error: {}", e),
    }
}

fn lower_err(prog: &AstBlock) -> MirError {
    let env = match mimium_typeck::infer(prog) {
        Ok(env) => env,
        Err(e) => panic!("unexpected type error: {}", e),
    };
    match generate(&env, prog) {
        Ok(mir) => panic!("expected a MIR error, got:\n{}", mir),
        Err(e) => e,
    }
}

fn inst(mir: &Mir, id: ValueId) -> &Instruction {
    mir.value(id)
        .instruction()
        .unwrap_or_else(|| panic!("`{}` is not an instruction", mir.name(id)))
}

fn fcalls(mir: &Mir) -> Vec<ValueId> {
    mir.walk()
        .into_iter()
        .filter(|&id| matches!(inst(mir, id), Instruction::Fcall { .. }))
        .collect()
}

fn find(mir: &Mir, name: &str) -> ValueId {
    mir.find(name)
        .unwrap_or_else(|| panic!("no value named `{}`", name))
}

/// `fn f(x, y) { return x * y }`
fn mul_fdef() -> mimium_ast::Statement {
    fdef(
        "f",
        &["x", "y"],
        None,
        block(vec![ret(op(OpId::Mul, sym("x"), sym("y")))], None),
    )
}

// ── Layout ─────────────────────────────────────────────────────────────

#[test]
fn direct_call_prints_flat() {
    let prog = block(
        vec![
            mul_fdef(),
            assign("r", call_named("f", vec![num(7.0), num(5.0)])),
        ],
        None,
    );
    let mir = lower(&prog);
    insta::assert_snapshot!(mir.to_string().trim_end(), @r"
    root:
      f = fun x , y
        f:
          $k0 = * x y
          return $k0
      $k2 = 7.000000
      $k3 = 5.000000
      $k4 = appcls f $k2 , $k3
      alloca: r$ptr (float)
      store r$ptr $k4
    ");
}

#[test]
fn call_arguments_are_the_literals() {
    let prog = block(
        vec![
            mul_fdef(),
            assign("r", call_named("f", vec![num(7.0), num(5.0)])),
        ],
        None,
    );
    let mir = lower(&prog);
    let calls = fcalls(&mir);
    assert_eq!(calls.len(), 1);
    let Instruction::Fcall { callee, args, .. } = inst(&mir, calls[0]) else {
        unreachable!()
    };
    assert_eq!(mir.name(*callee), "f");
    let literals: Vec<f64> = args
        .iter()
        .map(|&a| match inst(&mir, a) {
            Instruction::Number(n) => *n,
            other => panic!("argument is not a literal: {:?}", other),
        })
        .collect();
    assert_eq!(literals, vec![7.0, 5.0]);
}

#[test]
fn instruction_names_are_unique() {
    let prog = block(
        vec![
            assign("a", num(1.0)),
            assign("a", op(OpId::Add, sym("a"), num(2.0))),
            mul_fdef(),
            assign("r", call_named("f", vec![sym("a"), num(5.0)])),
            for_loop(
                "i",
                array(vec![num(1.0), num(2.0), num(3.0)]),
                block(vec![assign("a", op(OpId::Add, sym("a"), sym("i")))], None),
            ),
        ],
        None,
    );
    let mir = lower(&prog);
    let mut seen = FxHashSet::default();
    for id in mir.walk() {
        assert!(seen.insert(mir.name(id).to_string()), "duplicate `{}`", mir.name(id));
    }
}

#[test]
fn entered_blocks_are_all_left() {
    let prog = block(
        vec![
            fdef(
                "g",
                &["x"],
                None,
                block(
                    vec![],
                    Some(if_expr(
                        sym("x"),
                        block(vec![], Some(num(1.0))),
                        Some(block(vec![], Some(num(2.0)))),
                    )),
                ),
            ),
            assign("r", call_named("g", vec![num(0.0)])),
        ],
        None,
    );
    let env = match mimium_typeck::infer(&prog) {
        Ok(env) => env,
        Err(e) => panic!("unexpected type error: {}", e),
    };
    let mut gen = MirGenerator::new(&env);
    if let Err(e) = gen.generate(&prog) {
        panic!("unexpected MIR error: {}", e);
    }
    // One function body and two branches.
    assert_eq!(gen.block_ops(), (3, 3));
}

// ── Variables ──────────────────────────────────────────────────────────

#[test]
fn reassignment_stores_into_one_slot() {
    let prog = block(vec![assign("a", num(1.0)), assign("a", num(2.0))], None);
    let mir = lower(&prog);
    let slot = find(&mir, "a$ptr");
    let stores: Vec<ValueId> = mir
        .walk()
        .into_iter()
        .filter(|&id| matches!(inst(&mir, id), Instruction::Store { ptr, .. } if *ptr == slot))
        .collect();
    assert_eq!(stores.len(), 2);
    let allocs = mir
        .walk()
        .into_iter()
        .filter(|&id| matches!(inst(&mir, id), Instruction::Allocate))
        .count();
    assert_eq!(allocs, 1);
}

#[test]
fn variable_read_is_a_load() {
    let prog = block(
        vec![assign("a", num(1.0)), assign("b", sym("a"))],
        None,
    );
    let mir = lower(&prog);
    let slot = find(&mir, "a$ptr");
    assert!(mir
        .walk()
        .into_iter()
        .any(|id| matches!(inst(&mir, id), Instruction::Load { ptr } if *ptr == slot)));
}

#[test]
fn arguments_are_used_directly() {
    let prog = block(vec![mul_fdef()], None);
    let mir = lower(&prog);
    let f = find(&mir, "f");
    let Instruction::Function { args, body, .. } = inst(&mir, f) else {
        unreachable!()
    };
    assert_eq!(args.len(), 2);
    for (i, &a) in args.iter().enumerate() {
        assert_eq!(mir.value(a).kind, ValueKind::Argument { index: i });
    }
    let Instruction::Op { lhs, rhs, .. } = inst(&mir, body.instructions[0]) else {
        panic!("expected the product first")
    };
    assert_eq!(*lhs, Some(args[0]));
    assert_eq!(*rhs, args[1]);
}

#[test]
fn function_type_comes_from_inference() {
    let prog = block(vec![mul_fdef()], None);
    let mir = lower(&prog);
    assert_eq!(
        mir.ty(find(&mir, "f")),
        &Type::function(Type::Float, vec![Type::Float, Type::Float])
    );
}

// ── Calls ──────────────────────────────────────────────────────────────

#[test]
fn builtin_call_is_external() {
    let prog = block(vec![assign("s", call_named("sin", vec![num(0.5)]))], None);
    let mir = lower(&prog);
    let calls = fcalls(&mir);
    let Instruction::Fcall { callee, kind, .. } = inst(&mir, calls[0]) else {
        unreachable!()
    };
    assert_eq!(*kind, FcallKind::External);
    assert!(mir.value(*callee).is_external());
    // Externals are values, not instructions of any block.
    assert!(!mir.walk().contains(callee));
}

#[test]
fn now_reads_scheduler_time() {
    let prog = block(vec![assign("t", sym("now"))], None);
    let mir = lower(&prog);
    let calls = fcalls(&mir);
    assert_eq!(calls.len(), 1);
    let Instruction::Fcall { callee, args, kind, .. } = inst(&mir, calls[0]) else {
        unreachable!()
    };
    assert_eq!(mir.name(*callee), "mimium_getnow");
    assert!(args.is_empty());
    assert_eq!(*kind, FcallKind::External);
}

#[test]
fn scheduled_call_carries_time() {
    let prog = block(
        vec![expr_stmt(time(
            fcall(sym("println"), vec![num(1.0)]),
            op(OpId::Add, sym("now"), num(48000.0)),
        ))],
        None,
    );
    let mir = lower(&prog);
    let scheduled = fcalls(&mir)
        .into_iter()
        .find(|&id| mir.name(match inst(&mir, id) {
            Instruction::Fcall { callee, .. } => *callee,
            _ => unreachable!(),
        }) == "println")
        .expect("println call");
    let Instruction::Fcall { time, .. } = inst(&mir, scheduled) else {
        unreachable!()
    };
    let t = time.expect("scheduled time");
    assert!(matches!(inst(&mir, t), Instruction::Op { op: OpId::Add, .. }));
}

#[test]
fn recursive_function_refers_to_itself() {
    let prog = block(
        vec![fdef(
            "fact",
            &["n"],
            Some(Type::Float),
            block(
                vec![],
                Some(if_expr(
                    op(OpId::LessEq, sym("n"), num(1.0)),
                    block(vec![], Some(num(1.0))),
                    Some(block(
                        vec![],
                        Some(op(
                            OpId::Mul,
                            sym("n"),
                            call_named("fact", vec![op(OpId::Sub, sym("n"), num(1.0))]),
                        )),
                    )),
                )),
            ),
        )],
        None,
    );
    let mir = lower(&prog);
    let fact = find(&mir, "fact");
    let calls = fcalls(&mir);
    assert_eq!(calls.len(), 1);
    assert!(matches!(inst(&mir, calls[0]), Instruction::Fcall { callee, .. } if *callee == fact));
}

#[test]
fn self_value_has_return_type() {
    let prog = block(
        vec![fdef(
            "counter",
            &[],
            None,
            block(vec![], Some(op(OpId::Add, self_ref(), num(1.0)))),
        )],
        None,
    );
    let mir = lower(&prog);
    let f = find(&mir, "counter");
    let Instruction::Function { self_ref, .. } = inst(&mir, f) else {
        unreachable!()
    };
    let s = self_ref.expect("self value");
    assert_eq!(mir.name(s), "counter.self");
    assert_eq!(mir.value(s).kind, ValueKind::SelfRef);
    assert_eq!(mir.ty(s), &Type::Float);
}

// ── Control flow ───────────────────────────────────────────────────────

#[test]
fn if_branches_end_in_return() {
    let prog = block(
        vec![assign(
            "r",
            if_expr(
                num(1.0),
                block(vec![], Some(num(2.0))),
                Some(block(vec![], Some(num(3.0)))),
            ),
        )],
        None,
    );
    let mir = lower(&prog);
    let if_id = mir
        .walk()
        .into_iter()
        .find(|&id| matches!(inst(&mir, id), Instruction::If { .. }))
        .expect("if instruction");
    let Instruction::If {
        then_block,
        else_block,
        ..
    } = inst(&mir, if_id)
    else {
        unreachable!()
    };
    let else_block = else_block.as_ref().expect("else block");
    assert_eq!(then_block.label, format!("{}$then", mir.name(if_id)));
    assert_eq!(else_block.label, format!("{}$else", mir.name(if_id)));
    for b in [then_block, else_block] {
        let last = *b.instructions.last().expect("non-empty branch");
        assert!(matches!(inst(&mir, last), Instruction::Return { value: Some(_) }));
    }
    assert_eq!(mir.ty(if_id), &Type::Float);
}

#[test]
fn if_value_without_else_is_rejected() {
    let prog = block(
        vec![fdef(
            "f",
            &["x"],
            None,
            block(
                vec![assign(
                    "r",
                    if_expr(sym("x"), block(vec![], Some(num(1.0))), None),
                )],
                Some(num(0.0)),
            ),
        )],
        None,
    );
    assert!(matches!(lower_err(&prog), MirError::IfWithoutElse { .. }));
}

#[test]
fn if_statement_without_else_is_fine() {
    let prog = block(
        vec![
            assign("a", num(0.0)),
            if_stmt(sym("a"), block(vec![assign("a", num(1.0))], None), None),
        ],
        None,
    );
    let mir = lower(&prog);
    assert!(mir
        .walk()
        .into_iter()
        .any(|id| matches!(inst(&mir, id), Instruction::If { else_block: None, .. })));
}

#[test]
fn for_loop_is_unrolled() {
    let prog = block(
        vec![
            assign("acc", num(0.0)),
            for_loop(
                "i",
                array(vec![num(1.0), num(2.0), num(3.0)]),
                block(
                    vec![assign("acc", op(OpId::Add, sym("acc"), sym("i")))],
                    None,
                ),
            ),
        ],
        None,
    );
    let mir = lower(&prog);
    let arr = mir
        .walk()
        .into_iter()
        .find(|&id| matches!(inst(&mir, id), Instruction::Array { .. }))
        .expect("array literal");
    let indices: Vec<usize> = mir
        .walk()
        .into_iter()
        .filter_map(|id| match inst(&mir, id) {
            Instruction::Field {
                target,
                index: FieldIndex::Const(i),
            } if *target == arr => Some(*i),
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn for_over_empty_array_is_rejected() {
    let prog = block(
        vec![for_loop(
            "i",
            array(vec![]),
            block(vec![expr_stmt(call_named("println", vec![sym("i")]))], None),
        )],
        None,
    );
    assert!(matches!(lower_err(&prog), MirError::UnknownArraySize { .. }));
}

#[test]
fn function_in_loop_is_rejected() {
    let prog = block(
        vec![for_loop(
            "i",
            array(vec![num(1.0), num(2.0)]),
            block(
                vec![fdef("g", &["x"], None, block(vec![], Some(sym("x"))))],
                None,
            ),
        )],
        None,
    );
    match lower_err(&prog) {
        MirError::FunctionInLoop { name, .. } => assert_eq!(name, "g"),
        other => panic!("unexpected error: {}", other),
    }
}

// ── Aggregates ─────────────────────────────────────────────────────────

#[test]
fn tuple_literal_stores_each_field() {
    let prog = block(vec![assign("t", tuple(vec![num(1.0), num(2.0)]))], None);
    let mir = lower(&prog);
    let root: Vec<&Instruction> = mir.root.instructions.iter().map(|&id| inst(&mir, id)).collect();
    let shape: Vec<&str> = root
        .iter()
        .map(|i| match i {
            Instruction::Number(_) => "number",
            Instruction::Allocate => "alloca",
            Instruction::Field { .. } => "field",
            Instruction::Store { .. } => "store",
            _ => "other",
        })
        .collect();
    assert_eq!(
        shape,
        vec!["number", "number", "alloca", "field", "store", "field", "store", "alloca", "store"]
    );
}

#[test]
fn tuple_destructuring_projects_each_component() {
    let prog = block(
        vec![assign_tuple(&["a", "b"], tuple(vec![num(1.0), num(2.0)]))],
        None,
    );
    let mir = lower(&prog);
    let a = find(&mir, "a$ptr");
    let b = find(&mir, "b$ptr");
    assert!(matches!(inst(&mir, a), Instruction::Allocate));
    assert!(matches!(inst(&mir, b), Instruction::Allocate));
    assert_eq!(mir.ty(a), &Type::Float);
}

#[test]
fn struct_field_access_uses_field_position() {
    let prog = block(
        vec![
            assign(
                "p",
                struct_lit(vec![("x", num(1.0)), ("y", string("label"))]),
            ),
            assign("l", field(sym("p"), "y")),
        ],
        None,
    );
    let mir = lower(&prog);
    let p = find(&mir, "p$ptr");
    assert!(mir.walk().into_iter().any(|id| matches!(
        inst(&mir, id),
        Instruction::Field { target, index: FieldIndex::Const(1) } if *target == p
    )));
    assert_eq!(mir.ty(find(&mir, "l$ptr")), &Type::String);
}

#[test]
fn indexed_assignment_stores_through_field() {
    let prog = block(
        vec![
            assign("arr", array(vec![num(1.0), num(2.0)])),
            assign_index("arr", num(1.0), num(5.0)),
        ],
        None,
    );
    let mir = lower(&prog);
    let slot = find(&mir, "arr$ptr");
    let field = mir
        .walk()
        .into_iter()
        .find(|&id| matches!(
            inst(&mir, id),
            Instruction::Field { target, index: FieldIndex::Value(_) } if *target == slot
        ))
        .expect("indexed field");
    assert!(mir
        .walk()
        .into_iter()
        .any(|id| matches!(inst(&mir, id), Instruction::Store { ptr, .. } if *ptr == field)));
}
