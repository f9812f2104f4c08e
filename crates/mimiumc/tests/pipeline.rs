//! End-to-end tests of the compile pipeline.

use mimium_ast::build::*;
use mimium_ast::{Block, OpId};
use mimium_common::{Span, Type};
use mimiumc::{compile, format_memory, CompileError, Compiled, CompilerConfig};
use mimium_mir::{FcallKind, Instruction, MirError};
use rustc_hash::FxHashSet;

// ── Helpers ────────────────────────────────────────────────────────────

fn compile_ok(prog: &Block) -> Compiled {
    match compile(prog, &CompilerConfig::default()) {
        Ok(c) => c,
        Err(e) => panic!("unexpected compile error: {}", e),
    }
}

fn compile_err(prog: &Block) -> CompileError {
    match compile(prog, &CompilerConfig::default()) {
        Ok(c) => panic!("expected an error, got:\n{}", c.mir),
        Err(e) => e,
    }
}

fn calls(c: &Compiled) -> Vec<(String, FcallKind, Vec<f64>)> {
    c.mir
        .walk()
        .into_iter()
        .filter_map(|id| match c.mir.value(id).instruction() {
            Some(Instruction::Fcall {
                callee, args, kind, ..
            }) => {
                let literals = args
                    .iter()
                    .filter_map(|&a| match c.mir.value(a).instruction() {
                        Some(Instruction::Number(n)) => Some(*n),
                        _ => None,
                    })
                    .collect();
                Some((c.mir.name(*callee).to_string(), *kind, literals))
            }
            _ => None,
        })
        .collect()
}

/// `fn f(x, y) { return x * y }; r = f(7, 5)`
fn mul_program() -> Block {
    block(
        vec![
            fdef(
                "f",
                &["x", "y"],
                None,
                block(vec![ret(op(OpId::Mul, sym("x"), sym("y")))], None),
            ),
            assign("r", call_named("f", vec![num(7.0), num(5.0)])),
        ],
        None,
    )
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn literal_assignment_is_float() {
    let c = compile_ok(&block(vec![assign("a", num(1.0))], None));
    assert_eq!(c.env.get("a"), Some(&Type::Float));
}

#[test]
fn closed_call_is_one_direct_call() {
    let c = compile_ok(&mul_program());
    assert_eq!(
        calls(&c),
        vec![("f".to_string(), FcallKind::Direct, vec![7.0, 5.0])]
    );
    assert_eq!(
        c.env.get("f"),
        Some(&Type::function(Type::Float, vec![Type::Float, Type::Float]))
    );
}

#[test]
fn closed_call_mir_dump() {
    let c = compile_ok(&mul_program());
    insta::assert_snapshot!(c.mir.to_string().trim_end(), @r"
    root:
      f = fun x , y
        f:
          $k0 = * x y
          return $k0
      $k2 = 7.000000
      $k3 = 5.000000
      $k4 = app f $k2 , $k3
      alloca: r$ptr (float)
      store r$ptr $k4
    ");
}

#[test]
fn captured_variable_makes_a_closure_call() {
    let prog = block(
        vec![
            assign("y", num(2.0)),
            assign(
                "g",
                lambda(&["x"], block(vec![], Some(op(OpId::Add, sym("x"), sym("y"))))),
            ),
            assign("r", call_named("g", vec![num(1.0)])),
        ],
        None,
    );
    let c = compile_ok(&prog);
    let cls = c.mir.find("g$cls").expect("closure for g");
    match c.mir.value(cls).instruction() {
        Some(Instruction::MakeClosure { captures, .. }) => {
            let names: Vec<&str> = captures.iter().map(|&v| c.mir.name(v)).collect();
            assert_eq!(names, vec!["y$ptr"]);
        }
        other => panic!("expected a closure, got {:?}", other),
    }
    assert_eq!(calls(&c)[0].0, "g$cls");
    assert_eq!(calls(&c)[0].1, FcallKind::Closure);
}

#[test]
fn generated_names_never_clash_with_source_names() {
    // Functions named like generated temporaries, slots and closures.
    let inner = call_named("y_ptr", vec![num(1.0)]);
    let outer = call_named("k0", vec![call_named("f_cls", vec![inner])]);
    let prog = block(
        vec![
            assign("y", num(2.0)),
            fdef("k0", &["x"], None, block(vec![], Some(op(OpId::Mul, sym("x"), num(2.0))))),
            fdef("y_ptr", &["x"], None, block(vec![], Some(sym("x")))),
            fdef("f", &["x"], None, block(vec![], Some(op(OpId::Add, sym("x"), sym("y"))))),
            fdef("f_cls", &["x"], None, block(vec![], Some(call_named("f", vec![sym("x")])))),
            assign("r", outer),
        ],
        None,
    );
    let c = compile_ok(&prog);
    let mut seen = FxHashSet::default();
    for id in c.mir.walk() {
        assert!(seen.insert(c.mir.name(id)), "duplicate `{}`", c.mir.name(id));
    }
    assert!(seen.contains("f_cls"));
    assert!(seen.contains("f$cls"));
}

#[test]
fn dsp_memory_is_allocated_first() {
    let prog = block(
        vec![fdef(
            "dsp",
            &["x"],
            None,
            block(vec![], Some(op(OpId::Add, self_ref(), sym("x")))),
        )],
        None,
    );
    let config = CompilerConfig::default();
    let c = match compile(&prog, &config) {
        Ok(c) => c,
        Err(e) => panic!("unexpected compile error: {}", e),
    };
    assert_eq!(c.mir.name(c.mir.root.instructions[0]), "dsp.mem");
    let tree = c.entry_memory(&config).expect("dsp layout");
    assert!(tree.has_self);
    assert!(tree.own_self);
    assert_eq!(format_memory(&c.mir, tree), "dsp : dsp.mem (self)\n");
}

#[test]
fn configured_entry_is_used() {
    let prog = block(
        vec![fdef(
            "synth",
            &[],
            None,
            block(vec![], Some(call_named("mem", vec![num(1.0)]))),
        )],
        None,
    );
    let config = "entry = \"synth\"\nmemory_suffix = \"_m\"\n"
        .parse::<CompilerConfig>()
        .expect("valid config");
    let c = match compile(&prog, &config) {
        Ok(c) => c,
        Err(e) => panic!("unexpected compile error: {}", e),
    };
    let tree = c.entry_memory(&config).expect("synth layout");
    assert_eq!(
        tree.objtype,
        Type::alias("synth_m", Type::Tuple(vec![Type::Float]))
    );
    assert_eq!(
        format_memory(&c.mir, tree),
        "synth : synth_m\n  mem : float (self)\n"
    );
}

#[test]
fn ast_survives_json_transport() {
    let json = serde_json::to_string(&mul_program()).expect("serialize");
    let prog: Block = serde_json::from_str(&json).expect("deserialize");
    let c = compile_ok(&prog);
    assert_eq!(calls(&c).len(), 1);
}

// ── Errors ─────────────────────────────────────────────────────────────

#[test]
fn type_errors_name_their_stage() {
    let err = compile_err(&block(vec![assign("a", sym("missing"))], None));
    assert!(matches!(err, CompileError::Type(_)));
    assert_eq!(err.to_string(), "type inference: unbound variable `missing`");
}

#[test]
fn mir_errors_name_their_stage() {
    let prog = block(
        vec![assign(
            "r",
            if_expr(num(1.0), block(vec![], Some(num(2.0))), None),
        )],
        None,
    );
    let err = compile_err(&prog);
    assert!(matches!(err, CompileError::Mir(_)));
    assert!(err.to_string().starts_with("mir generation: "), "{}", err);
}

#[test]
fn errors_are_located_by_line_and_column() {
    let source = "y = 1\nr = if (y) 2\n";
    let err = CompileError::from(MirError::IfWithoutElse {
        span: Span::new(10, 18),
    });
    assert_eq!(
        err.located("a.mmm", source),
        "a.mmm:2:5: mir generation: `if` used as a value needs an `else` branch"
    );
}

#[test]
fn recursion_without_return_type_is_rejected() {
    let prog = block(
        vec![fdef(
            "loop_forever",
            &["n"],
            None,
            block(vec![], Some(call_named("loop_forever", vec![sym("n")]))),
        )],
        None,
    );
    let err = compile_err(&prog);
    assert!(matches!(
        err,
        CompileError::Type(mimium_typeck::TypeError::MissingReturnType { .. })
    ));
}
