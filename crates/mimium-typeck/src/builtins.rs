//! Built-in (external) function table.
//!
//! Every entry maps a source-level name to its type and to the symbol the
//! backend links against. The table seeds the initial type environment and
//! is consulted by MIR generation to tag calls as external.

use mimium_common::Type;

use crate::env::TypeEnv;

/// Name of the scheduler-time query that reads of `now` lower to.
pub const GETNOW: &str = "mimium_getnow";

/// Length of the ring buffer backing `delay`.
pub const DELAY_BUFFER_SIZE: usize = 44100;

#[derive(Clone, Debug, PartialEq)]
pub struct Builtin {
    pub name: &'static str,
    pub ty: Type,
    /// Symbol name in the runtime library.
    pub backend: &'static str,
}

fn float_fn(arity: usize) -> Type {
    Type::function(Type::Float, vec![Type::Float; arity])
}

/// The complete built-in table, in a fixed order.
pub fn builtins() -> Vec<Builtin> {
    let mut table = Vec::new();
    let mut add = |name: &'static str, ty: Type, backend: &'static str| {
        table.push(Builtin { name, ty, backend });
    };

    // ── Math ────────────────────────────────────────────────────────
    for name in [
        "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "log", "log10",
        "exp", "sqrt", "floor", "ceil", "round",
    ] {
        add(name, float_fn(1), name);
    }
    for name in ["atan2", "pow", "fmod", "remainder", "min", "max"] {
        add(name, float_fn(2), name);
    }
    add("abs", float_fn(1), "fabs");

    // ── Comparison / logic (0.0 or 1.0) ─────────────────────────────
    for name in ["ge", "le", "gt", "lt", "and", "or"] {
        add(name, float_fn(2), name);
    }
    add("not", float_fn(1), "not");

    // ── I/O ─────────────────────────────────────────────────────────
    add("print", Type::function(Type::Void, vec![Type::Float]), "printdouble");
    add("println", Type::function(Type::Void, vec![Type::Float]), "printlndouble");
    add("printlnstr", Type::function(Type::Void, vec![Type::String]), "printlnstr");
    add("random", float_fn(0), "mimiumrand");

    // ── Stateful primitives ─────────────────────────────────────────
    add("delay", float_fn(2), "mimium_delay");
    add("mem", float_fn(1), "mimium_mem");

    // ── Scheduler ───────────────────────────────────────────────────
    add(GETNOW, float_fn(0), GETNOW);

    table
}

/// Look up a built-in by its source name.
pub fn lookup(name: &str) -> Option<Builtin> {
    builtins().into_iter().find(|b| b.name == name)
}

/// Memory layout a stateful built-in needs between invocations, or `None`
/// for pure built-ins.
pub fn memory_type(name: &str) -> Option<Type> {
    match name {
        "delay" => Some(Type::alias(
            "MmmRingBuf",
            Type::Struct(vec![
                ("readi".to_string(), Type::Float),
                ("writei".to_string(), Type::Float),
                (
                    "buffer".to_string(),
                    Type::array(Type::Float, DELAY_BUFFER_SIZE),
                ),
            ]),
        )),
        "mem" => Some(Type::Float),
        _ => None,
    }
}

/// Seed a type environment with every built-in.
pub fn register_builtins(env: &mut TypeEnv) {
    for b in builtins() {
        env.insert(b.name.to_string(), b.ty);
    }
}
