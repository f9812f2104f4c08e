//! MIR data model.
//!
//! Values live in one arena owned by [`Mir`] and are referred to by
//! [`ValueId`]. Blocks hold ordered lists of ids; a `Function` or `If`
//! instruction owns its nested blocks. Every other reference between
//! instructions is a plain id, so moving an instruction between blocks never
//! invalidates anything that refers to it.

use mimium_ast::OpId;
use mimium_common::{Span, Type};

/// Index of a value in the [`Mir`] arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

impl ValueId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a call reaches its callee.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FcallKind {
    /// Fixed address, no environment.
    Direct,
    /// Through a closure value; the captured environment is passed along.
    Closure,
    /// A runtime or library function outside this unit.
    External,
}

/// Index operand of a [`Instruction::Field`] projection.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FieldIndex {
    Const(usize),
    Value(ValueId),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Number(f64),
    String(String),
    /// Storage for a value of the instruction's type.
    Allocate,
    Load {
        ptr: ValueId,
    },
    Store {
        ptr: ValueId,
        value: ValueId,
    },
    /// `lhs` is absent for unary operators.
    Op {
        op: OpId,
        lhs: Option<ValueId>,
        rhs: ValueId,
    },
    Function {
        args: Vec<ValueId>,
        body: Block,
        /// Captured values, filled in by closure conversion.
        free_variables: Vec<ValueId>,
        /// The function's `self` value, when the body reads it.
        self_ref: Option<ValueId>,
    },
    Fcall {
        callee: ValueId,
        args: Vec<ValueId>,
        kind: FcallKind,
        /// Logical time for a scheduled call.
        time: Option<ValueId>,
    },
    MakeClosure {
        func: ValueId,
        captures: Vec<ValueId>,
    },
    Array {
        elements: Vec<ValueId>,
    },
    /// Address of an element of `target`. Reads are `Field` then `Load`.
    Field {
        target: ValueId,
        index: FieldIndex,
    },
    /// Both branches end in `Return`; the returned value is the If's value.
    If {
        cond: ValueId,
        then_block: Block,
        else_block: Option<Block>,
    },
    Return {
        value: Option<ValueId>,
    },
}

impl Instruction {
    /// Values this instruction reads, in operand order. Nested blocks are
    /// not included.
    pub fn operands(&self) -> Vec<ValueId> {
        let mut out = Vec::new();
        match self {
            Instruction::Number(_) | Instruction::String(_) | Instruction::Allocate => {}
            Instruction::Load { ptr } => out.push(*ptr),
            Instruction::Store { ptr, value } => {
                out.push(*ptr);
                out.push(*value);
            }
            Instruction::Op { lhs, rhs, .. } => {
                out.extend(lhs.iter().copied());
                out.push(*rhs);
            }
            Instruction::Function { .. } => {}
            Instruction::Fcall {
                callee, args, time, ..
            } => {
                out.push(*callee);
                out.extend(args.iter().copied());
                out.extend(time.iter().copied());
            }
            Instruction::MakeClosure { func, captures } => {
                out.push(*func);
                out.extend(captures.iter().copied());
            }
            Instruction::Array { elements } => out.extend(elements.iter().copied()),
            Instruction::Field { target, index } => {
                out.push(*target);
                if let FieldIndex::Value(v) = index {
                    out.push(*v);
                }
            }
            Instruction::If { cond, .. } => out.push(*cond),
            Instruction::Return { value } => out.extend(value.iter().copied()),
        }
        out
    }

    /// Apply `f` to every operand slot. Nested blocks are not visited.
    pub fn for_each_operand_mut<F: FnMut(&mut ValueId)>(&mut self, mut f: F) {
        match self {
            Instruction::Number(_) | Instruction::String(_) | Instruction::Allocate => {}
            Instruction::Load { ptr } => f(ptr),
            Instruction::Store { ptr, value } => {
                f(ptr);
                f(value);
            }
            Instruction::Op { lhs, rhs, .. } => {
                if let Some(l) = lhs {
                    f(l);
                }
                f(rhs);
            }
            Instruction::Function { .. } => {}
            Instruction::Fcall {
                callee, args, time, ..
            } => {
                f(callee);
                args.iter_mut().for_each(&mut f);
                if let Some(t) = time {
                    f(t);
                }
            }
            Instruction::MakeClosure { func, captures } => {
                f(func);
                captures.iter_mut().for_each(&mut f);
            }
            Instruction::Array { elements } => elements.iter_mut().for_each(&mut f),
            Instruction::Field { target, index } => {
                f(target);
                if let FieldIndex::Value(v) = index {
                    f(v);
                }
            }
            Instruction::If { cond, .. } => f(cond),
            Instruction::Return { value } => {
                if let Some(v) = value {
                    f(v);
                }
            }
        }
    }

    /// Nested blocks owned by this instruction.
    pub fn blocks(&self) -> Vec<&Block> {
        match self {
            Instruction::Function { body, .. } => vec![body],
            Instruction::If {
                then_block,
                else_block,
                ..
            } => {
                let mut v = vec![then_block];
                v.extend(else_block.iter());
                v
            }
            _ => Vec::new(),
        }
    }

    pub fn blocks_mut(&mut self) -> Vec<&mut Block> {
        match self {
            Instruction::Function { body, .. } => vec![body],
            Instruction::If {
                then_block,
                else_block,
                ..
            } => {
                let mut v = vec![then_block];
                v.extend(else_block.iter_mut());
                v
            }
            _ => Vec::new(),
        }
    }
}

/// What a value is.
#[derive(Clone, Debug, PartialEq)]
pub enum ValueKind {
    /// Parameter `index` of a function.
    Argument { index: usize },
    /// A function provided by the runtime, linked as `backend`.
    External { backend: String },
    /// The persistent state of a function (`self`).
    SelfRef,
    Instruction(Instruction),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ValueData {
    pub name: String,
    pub ty: Type,
    pub kind: ValueKind,
    pub span: Span,
}

impl ValueData {
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            ValueKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn instruction_mut(&mut self) -> Option<&mut Instruction> {
        match &mut self.kind {
            ValueKind::Instruction(inst) => Some(inst),
            _ => None,
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(self.instruction(), Some(Instruction::Function { .. }))
    }

    pub fn is_external(&self) -> bool {
        matches!(self.kind, ValueKind::External { .. })
    }
}

/// An ordered list of instructions.
///
/// `label` and `indent` only affect printing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    pub label: String,
    pub indent: usize,
    pub instructions: Vec<ValueId>,
}

impl Block {
    pub fn new(label: impl Into<String>, indent: usize) -> Self {
        Block {
            label: label.into(),
            indent,
            instructions: Vec::new(),
        }
    }
}

/// A compilation unit in MIR form.
#[derive(Clone, Debug, PartialEq)]
pub struct Mir {
    values: Vec<ValueData>,
    pub root: Block,
}

impl Mir {
    pub fn new() -> Self {
        Mir {
            values: Vec::new(),
            root: Block::new("root", 0),
        }
    }

    /// Add a value to the arena without placing it in any block.
    pub fn push_value(&mut self, data: ValueData) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(data);
        id
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.index()]
    }

    pub fn name(&self, id: ValueId) -> &str {
        &self.values[id.index()].name
    }

    pub fn ty(&self, id: ValueId) -> &Type {
        &self.values[id.index()].ty
    }

    pub fn values(&self) -> impl Iterator<Item = (ValueId, &ValueData)> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (ValueId(i as u32), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Find a value by name.
    pub fn find(&self, name: &str) -> Option<ValueId> {
        self.values().find(|(_, v)| v.name == name).map(|(id, _)| id)
    }

    /// Every instruction reachable from the root block, in pre-order
    /// (an instruction before the contents of its nested blocks).
    pub fn walk(&self) -> Vec<ValueId> {
        let mut out = Vec::new();
        self.walk_block(&self.root, &mut out);
        out
    }

    /// Every instruction inside `block`, nested blocks included, in
    /// pre-order.
    pub fn walk_block(&self, block: &Block, out: &mut Vec<ValueId>) {
        for &id in &block.instructions {
            out.push(id);
            if let Some(inst) = self.value(id).instruction() {
                for b in inst.blocks() {
                    self.walk_block(b, out);
                }
            }
        }
    }
}

impl Default for Mir {
    fn default() -> Self {
        Self::new()
    }
}
