//! Memory-object layout.
//!
//! Every function that owns persistent state, either through `self` or by
//! calling something that does, gets a memory object laid out as a tuple:
//! the objects of its stateful callees in call order, then its own `self`
//! slot. The entry function's object is allocated once at the start of the
//! program.

use mimium_common::Type;
use mimium_typeck::builtins;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::value::{Block, Instruction, Mir, ValueData, ValueId, ValueKind};

/// Memory layout of one function (or stateful built-in).
#[derive(Clone, Debug, PartialEq)]
pub struct FunObjTree {
    pub function: ValueId,
    /// Set when this function or any stateful callee refers to `self`.
    pub has_self: bool,
    /// Set only when the function itself refers to `self`; its slot is the
    /// last element of `objtype`.
    pub own_self: bool,
    /// Stateful callees, in call order.
    pub children: Vec<FunObjTree>,
    pub objtype: Type,
}

impl FunObjTree {
    fn is_stateful(&self) -> bool {
        self.has_self || !self.children.is_empty()
    }
}

pub struct MemoryObjsCollector {
    entry: String,
    suffix: String,
    trees: FxHashMap<ValueId, FunObjTree>,
    in_progress: FxHashSet<ValueId>,
}

impl Default for MemoryObjsCollector {
    fn default() -> Self {
        Self::new("dsp", ".mem")
    }
}

impl MemoryObjsCollector {
    /// `entry` names the top-level function whose object is allocated;
    /// `suffix` is appended to a function name to name its object type.
    pub fn new(entry: impl Into<String>, suffix: impl Into<String>) -> Self {
        MemoryObjsCollector {
            entry: entry.into(),
            suffix: suffix.into(),
            trees: FxHashMap::default(),
            in_progress: FxHashSet::default(),
        }
    }

    /// Compute the layout of every function reachable from the entry and
    /// allocate the entry's object at the head of the root block.
    ///
    /// Returns an empty map when there is no entry function.
    pub fn collect(&mut self, mir: &mut Mir) -> FxHashMap<ValueId, FunObjTree> {
        let entry = mir
            .root
            .instructions
            .iter()
            .copied()
            .find(|&id| mir.value(id).is_function() && mir.name(id) == self.entry);
        let Some(entry) = entry else {
            log::info!("no `{}` function; no memory objects allocated", self.entry);
            return FxHashMap::default();
        };

        let Some(tree) = self.visit_function(mir, entry) else {
            return FxHashMap::default();
        };
        let span = mir.value(entry).span;
        let alloc = mir.push_value(ValueData {
            name: format!("{}{}", self.entry, self.suffix),
            ty: tree.objtype.clone(),
            kind: ValueKind::Instruction(Instruction::Allocate),
            span,
        });
        mir.root.instructions.insert(0, alloc);
        log::debug!("memory object for `{}`: {}", self.entry, tree.objtype);

        std::mem::take(&mut self.trees)
    }

    fn visit_function(&mut self, mir: &Mir, f: ValueId) -> Option<FunObjTree> {
        if let Some(tree) = self.trees.get(&f) {
            return Some(tree.clone());
        }
        if !self.in_progress.insert(f) {
            log::warn!(
                "`{}` calls itself; its state is not included in its own object",
                mir.name(f)
            );
            return None;
        }

        let (body, self_ref) = match mir.value(f).instruction() {
            Some(Instruction::Function { body, self_ref, .. }) => (body, *self_ref),
            _ => return None,
        };
        let mut calls = Vec::new();
        collect_calls(mir, body, &mut calls);

        let mut children = Vec::new();
        for callee in calls {
            if let Some(child) = self.visit_callee(mir, callee) {
                if child.is_stateful() {
                    children.push(child);
                }
            }
        }

        let own_self = self_ref.is_some();
        let has_self = own_self || children.iter().any(|c| c.has_self);
        let mut layout: Vec<Type> = children.iter().map(|c| c.objtype.clone()).collect();
        if let Some(s) = self_ref {
            layout.push(mir.ty(s).clone());
        }
        let tree = FunObjTree {
            function: f,
            has_self,
            own_self,
            children,
            objtype: Type::alias(
                format!("{}{}", mir.name(f), self.suffix),
                Type::Tuple(layout),
            ),
        };

        self.in_progress.remove(&f);
        self.trees.insert(f, tree.clone());
        Some(tree)
    }

    fn visit_callee(&mut self, mir: &Mir, callee: ValueId) -> Option<FunObjTree> {
        let data = mir.value(callee);
        match &data.kind {
            ValueKind::Instruction(Instruction::Function { .. }) => {
                self.visit_function(mir, callee)
            }
            ValueKind::Instruction(Instruction::MakeClosure { func, .. }) => {
                self.visit_function(mir, *func)
            }
            ValueKind::External { .. } => {
                let objtype = builtins::memory_type(&data.name)?;
                let tree = FunObjTree {
                    function: callee,
                    has_self: true,
                    own_self: true,
                    children: Vec::new(),
                    objtype,
                };
                self.trees.insert(callee, tree.clone());
                Some(tree)
            }
            _ => {
                log::warn!(
                    "cannot resolve callee `{}`; its state is not tracked",
                    data.name
                );
                None
            }
        }
    }
}

/// Callees of every call in `block`, descending into `if` branches but not
/// into nested function definitions.
fn collect_calls(mir: &Mir, block: &Block, out: &mut Vec<ValueId>) {
    for &id in &block.instructions {
        match mir.value(id).instruction() {
            Some(Instruction::Fcall { callee, .. }) => out.push(*callee),
            Some(Instruction::If {
                then_block,
                else_block,
                ..
            }) => {
                collect_calls(mir, then_block, out);
                if let Some(b) = else_block {
                    collect_calls(mir, b, out);
                }
            }
            _ => {}
        }
    }
}

/// Lay out memory objects with the default entry (`dsp`) and suffix.
pub fn collect_memory_objects(mir: &mut Mir) -> FxHashMap<ValueId, FunObjTree> {
    MemoryObjsCollector::default().collect(mir)
}
