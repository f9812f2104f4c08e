//! The mimium compiler pipeline.
//!
//! Runs the stages between the parser and code generation on one
//! compilation unit: type inference, MIR generation, closure conversion and
//! memory-object layout.

pub mod config;
pub mod error;

use std::fmt;

use mimium_ast::Block;
use mimium_mir::{ClosureConverter, FunObjTree, MemoryObjsCollector, Mir, ValueId};
use mimium_typeck::TypeEnv;
use rustc_hash::FxHashMap;

pub use config::{CompilerConfig, DumpConfig};
pub use error::CompileError;

/// Output of a successful compilation.
pub struct Compiled {
    pub env: TypeEnv,
    pub mir: Mir,
    /// Memory layout of every stateful function, keyed by function.
    pub memory: FxHashMap<ValueId, FunObjTree>,
}

impl fmt::Debug for Compiled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiled")
            .field("env", &self.env.dump())
            .field("mir", &self.mir)
            .field("memory", &self.memory)
            .finish()
    }
}

impl Compiled {
    /// The entry function's memory layout, if there is an entry.
    pub fn entry_memory(&self, config: &CompilerConfig) -> Option<&FunObjTree> {
        let entry = self
            .mir
            .root
            .instructions
            .iter()
            .copied()
            .find(|&id| self.mir.value(id).is_function() && self.mir.name(id) == config.entry)?;
        self.memory.get(&entry)
    }
}

/// Compile one unit through every stage.
pub fn compile(program: &Block, config: &CompilerConfig) -> Result<Compiled, CompileError> {
    let env = mimium_typeck::infer(program)?;
    log::debug!(
        "type inference: {} bindings, {} warnings",
        env.len(),
        env.warnings().len()
    );

    let mut mir = mimium_mir::generate(&env, program)?;

    let mut converter = ClosureConverter::new();
    converter.convert(&mut mir);

    let memory = MemoryObjsCollector::new(config.entry.clone(), config.memory_suffix.clone())
        .collect(&mut mir);

    Ok(Compiled { env, mir, memory })
}

/// Render a memory layout as an indented tree, one function per line.
pub fn format_memory(mir: &Mir, tree: &FunObjTree) -> String {
    let mut out = String::new();
    write_memory(mir, tree, 0, &mut out);
    out
}

fn write_memory(mir: &Mir, tree: &FunObjTree, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(mir.name(tree.function));
    out.push_str(" : ");
    out.push_str(&tree.objtype.to_string());
    if tree.own_self {
        out.push_str(" (self)");
    }
    out.push('\n');
    for child in &tree.children {
        write_memory(mir, child, depth + 1, out);
    }
}
