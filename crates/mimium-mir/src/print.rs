//! Textual MIR dump.

use std::fmt;

use crate::value::{Block, FcallKind, FieldIndex, Instruction, Mir, ValueId};

impl fmt::Display for Mir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, self, &self.root)
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, mir: &Mir, block: &Block) -> fmt::Result {
    let pad = "    ".repeat(block.indent);
    writeln!(f, "{}{}:", pad, block.label)?;
    for &id in &block.instructions {
        write_instruction(f, mir, id, &format!("{}  ", pad))?;
    }
    Ok(())
}

fn names(mir: &Mir, ids: &[ValueId]) -> String {
    ids.iter()
        .map(|&id| mir.name(id))
        .collect::<Vec<_>>()
        .join(" , ")
}

fn write_instruction(f: &mut fmt::Formatter<'_>, mir: &Mir, id: ValueId, pad: &str) -> fmt::Result {
    let data = mir.value(id);
    let Some(inst) = data.instruction() else {
        return writeln!(f, "{}{}", pad, data.name);
    };
    let name = &data.name;
    write!(f, "{}", pad)?;
    match inst {
        Instruction::Number(n) => writeln!(f, "{} = {:.6}", name, n),
        Instruction::String(s) => writeln!(f, "{} = {:?}", name, s),
        Instruction::Allocate => writeln!(f, "alloca: {} ({})", name, data.ty),
        Instruction::Load { ptr } => writeln!(f, "{} = load {}", name, mir.name(*ptr)),
        Instruction::Store { ptr, value } => {
            writeln!(f, "store {} {}", mir.name(*ptr), mir.name(*value))
        }
        Instruction::Op { op, lhs, rhs } => match lhs {
            Some(l) => writeln!(f, "{} = {} {} {}", name, op, mir.name(*l), mir.name(*rhs)),
            None => writeln!(f, "{} = {} {}", name, op, mir.name(*rhs)),
        },
        Instruction::Function {
            args,
            body,
            free_variables,
            ..
        } => {
            write!(f, "{} = fun {}", name, names(mir, args))?;
            if !free_variables.is_empty() {
                write!(f, " fv{{ {} }}", names(mir, free_variables))?;
            }
            writeln!(f)?;
            write_block(f, mir, body)
        }
        Instruction::Fcall {
            callee,
            args,
            kind,
            time,
        } => {
            let mnemonic = match kind {
                FcallKind::Direct => "app",
                FcallKind::Closure => "appcls",
                FcallKind::External => "appext",
            };
            write!(f, "{} = {} {} {}", name, mnemonic, mir.name(*callee), names(mir, args))?;
            if let Some(t) = time {
                write!(f, " @{}", mir.name(*t))?;
            }
            writeln!(f)
        }
        Instruction::MakeClosure { func, captures } => writeln!(
            f,
            "{} = makeclosure {} {}",
            name,
            mir.name(*func),
            names(mir, captures)
        ),
        Instruction::Array { elements } => {
            writeln!(f, "{} = array {}", name, names(mir, elements))
        }
        Instruction::Field { target, index } => match index {
            FieldIndex::Const(i) => writeln!(f, "{} = field {} {}", name, mir.name(*target), i),
            FieldIndex::Value(v) => {
                writeln!(f, "{} = field {} {}", name, mir.name(*target), mir.name(*v))
            }
        },
        Instruction::If {
            cond,
            then_block,
            else_block,
        } => {
            writeln!(f, "{} = if {}", name, mir.name(*cond))?;
            write_block(f, mir, then_block)?;
            if let Some(b) = else_block {
                write_block(f, mir, b)?;
            }
            Ok(())
        }
        Instruction::Return { value } => match value {
            Some(v) => writeln!(f, "return {}", mir.name(*v)),
            None => writeln!(f, "return"),
        },
    }
}
