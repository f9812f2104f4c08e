//! Closure conversion.
//!
//! Decides which functions can be called directly and which need a closure
//! record, materializes the records with `MakeClosure`, classifies every
//! call, and finally hoists nested functions to the top level.
//!
//! A function is *known* when it captures nothing, only refers to other
//! known functions and is only ever called, never passed around as a value.
//! Calls to known functions become `Direct`. Every other function gets a
//! `MakeClosure` right after its definition, and references to it outside
//! its own body go through that closure value instead. A function nested
//! inside a non-known function that refers back to it captures it.

use mimium_common::Type;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::value::{FcallKind, Instruction, Mir, ValueData, ValueId, ValueKind};

/// Closure-convert `mir` in place.
pub fn convert_closures(mir: &mut Mir) {
    ClosureConverter::new().convert(mir);
}

/// Values defined inside a function (its parameters, `self` and every
/// instruction of its body, nested functions included) and the body's
/// instructions in pre-order.
struct Subtree {
    defs: FxHashSet<ValueId>,
    order: Vec<ValueId>,
}

fn subtree(mir: &Mir, f: ValueId) -> Subtree {
    let mut defs = FxHashSet::default();
    let mut order = Vec::new();
    add_function_params(mir, f, &mut defs);
    if let Some(Instruction::Function { body, .. }) = mir.value(f).instruction() {
        mir.walk_block(body, &mut order);
    }
    for &id in &order {
        defs.insert(id);
        add_function_params(mir, id, &mut defs);
    }
    Subtree { defs, order }
}

fn add_function_params(mir: &Mir, f: ValueId, defs: &mut FxHashSet<ValueId>) {
    if let Some(Instruction::Function { args, self_ref, .. }) = mir.value(f).instruction() {
        defs.extend(args.iter().copied());
        defs.extend(self_ref.iter().copied());
    }
}

/// Operands read inside `f` but defined outside it, in first-use order,
/// restricted to those accepted by `keep`.
fn outside_refs(
    mir: &Mir,
    f: ValueId,
    keep: impl Fn(ValueId, &ValueData) -> bool,
) -> Vec<ValueId> {
    let tree = subtree(mir, f);
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for id in tree.order {
        let Some(inst) = mir.value(id).instruction() else {
            continue;
        };
        for op in inst.operands() {
            if op == f || tree.defs.contains(&op) || !keep(op, mir.value(op)) {
                continue;
            }
            if seen.insert(op) {
                out.push(op);
            }
        }
    }
    out
}

/// Values `f` has to capture. Externals, `self` values and functions are
/// reachable without an environment.
pub fn free_values(mir: &Mir, f: ValueId) -> Vec<ValueId> {
    outside_refs(mir, f, |_, v| {
        !v.is_external() && !v.is_function() && v.kind != ValueKind::SelfRef
    })
}

/// Values `f` captures once the known set is fixed: its free values plus
/// any non-known function it refers to that still has no closure value of
/// its own in scope, which is the case for an enclosing function.
fn closure_captures(mir: &Mir, f: ValueId, known: &FxHashSet<ValueId>) -> Vec<ValueId> {
    outside_refs(mir, f, |id, v| {
        !v.is_external()
            && v.kind != ValueKind::SelfRef
            && !(v.is_function() && known.contains(&id))
    })
}

/// Functions defined outside `f` that `f` refers to.
fn function_refs(mir: &Mir, f: ValueId) -> Vec<ValueId> {
    outside_refs(mir, f, |_, v| v.is_function())
}

/// Functions that appear anywhere other than as the callee of a call.
fn escaping_functions(mir: &Mir) -> FxHashSet<ValueId> {
    let mut out = FxHashSet::default();
    for id in mir.walk() {
        let Some(inst) = mir.value(id).instruction() else {
            continue;
        };
        let mut operands = inst.operands();
        if matches!(inst, Instruction::Fcall { .. } | Instruction::MakeClosure { .. }) {
            operands.remove(0);
        }
        out.extend(operands.into_iter().filter(|&op| mir.value(op).is_function()));
    }
    out
}

#[derive(Default)]
pub struct ClosureConverter {
    known: FxHashSet<ValueId>,
    closures: FxHashMap<ValueId, ValueId>,
}

impl ClosureConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Functions that are called without an environment.
    pub fn known(&self) -> &FxHashSet<ValueId> {
        &self.known
    }

    /// The `MakeClosure` value created for each non-known function.
    pub fn closures(&self) -> &FxHashMap<ValueId, ValueId> {
        &self.closures
    }

    pub fn convert(&mut self, mir: &mut Mir) {
        let functions: Vec<ValueId> = mir
            .walk()
            .into_iter()
            .filter(|&id| mir.value(id).is_function())
            .collect();

        self.known = known_functions(mir, &functions);
        log::debug!(
            "closure conversion: {} of {} functions are known",
            self.known.len(),
            functions.len()
        );

        let unknown: Vec<ValueId> = functions
            .iter()
            .copied()
            .filter(|f| !self.known.contains(f))
            .collect();
        for &f in &unknown {
            let cls = self.make_closure(mir, f);
            self.closures.insert(f, cls);
        }
        for (n, &f) in unknown.iter().enumerate() {
            self.fill_captures(mir, f, n);
        }

        self.classify_calls(mir);
        hoist_functions(mir);
    }

    /// Insert a `MakeClosure` for `f` right after its definition and route
    /// outside references to `f` through it.
    fn make_closure(&self, mir: &mut Mir, f: ValueId) -> ValueId {
        let inner = subtree(mir, f).defs;
        let outside: Vec<ValueId> = mir
            .walk()
            .into_iter()
            .filter(|id| !inner.contains(id))
            .collect();

        let data = mir.value(f);
        let (name, ty, span) = (format!("{}$cls", data.name), data.ty.clone(), data.span);
        let cls = mir.push_value(ValueData {
            name,
            ty,
            kind: ValueKind::Instruction(Instruction::MakeClosure {
                func: f,
                captures: Vec::new(),
            }),
            span,
        });

        for id in outside {
            if let Some(inst) = mir.value_mut(id).instruction_mut() {
                inst.for_each_operand_mut(|op| {
                    if *op == f {
                        *op = cls;
                    }
                });
            }
        }
        insert_after(mir, f, cls);
        log::debug!("closure conversion: `{}` needs a closure", mir.name(f));
        cls
    }

    fn fill_captures(&self, mir: &mut Mir, f: ValueId, n: usize) {
        let Some(&cls) = self.closures.get(&f) else {
            return;
        };
        let captures = closure_captures(mir, f, &self.known);
        let capture_tys = captures.iter().map(|&c| mir.ty(c).clone()).collect();
        let fn_ty = mir.ty(f).clone();

        if let Some(Instruction::Function { free_variables, .. }) =
            mir.value_mut(f).instruction_mut()
        {
            *free_variables = captures.clone();
        }
        let data = mir.value_mut(cls);
        data.ty = Type::alias(
            format!("Closure.{}", n),
            Type::closure(
                Type::Ref(Box::new(fn_ty)),
                Type::alias(format!("Capture.{}", n), Type::Tuple(capture_tys)),
            ),
        );
        if let Some(Instruction::MakeClosure { captures: c, .. }) = data.instruction_mut() {
            *c = captures;
        }
    }

    fn classify_calls(&self, mir: &mut Mir) {
        for id in mir.walk() {
            let callee = match mir.value(id).instruction() {
                Some(Instruction::Fcall { callee, .. }) => *callee,
                _ => continue,
            };
            let target = mir.value(callee);
            let new_kind = if target.is_external() {
                FcallKind::External
            } else if target.is_function() && self.known.contains(&callee) {
                FcallKind::Direct
            } else {
                FcallKind::Closure
            };
            if let Some(Instruction::Fcall { kind, .. }) = mir.value_mut(id).instruction_mut() {
                *kind = new_kind;
            }
        }
    }
}

/// Greatest set of functions that capture nothing, never escape and refer
/// only to functions in the set.
fn known_functions(mir: &Mir, functions: &[ValueId]) -> FxHashSet<ValueId> {
    let escaping = escaping_functions(mir);
    let mut known: FxHashSet<ValueId> = functions
        .iter()
        .copied()
        .filter(|f| !escaping.contains(f))
        .filter(|&f| free_values(mir, f).is_empty())
        .collect();
    let refs: FxHashMap<ValueId, Vec<ValueId>> = functions
        .iter()
        .map(|&f| (f, function_refs(mir, f)))
        .collect();

    loop {
        let demoted: Vec<ValueId> = functions
            .iter()
            .copied()
            .filter(|f| known.contains(f))
            .filter(|f| refs[f].iter().any(|g| !known.contains(g)))
            .collect();
        if demoted.is_empty() {
            return known;
        }
        for f in demoted {
            known.remove(&f);
        }
    }
}

/// Place `new` right after `anchor` in whichever block holds `anchor`.
fn insert_after(mir: &mut Mir, anchor: ValueId, new: ValueId) {
    if let Some(pos) = mir.root.instructions.iter().position(|&id| id == anchor) {
        mir.root.instructions.insert(pos + 1, new);
        return;
    }
    for owner in mir.walk() {
        let Some(inst) = mir.value_mut(owner).instruction_mut() else {
            continue;
        };
        for block in inst.blocks_mut() {
            if let Some(pos) = block.instructions.iter().position(|&id| id == anchor) {
                block.instructions.insert(pos + 1, new);
                return;
            }
        }
    }
}

/// Move every function not defined at the top level to the front of the
/// root block, in pre-order.
pub fn hoist_functions(mir: &mut Mir) {
    let mut hoisted = Vec::new();
    for id in mir.root.instructions.clone() {
        take_nested_functions(mir, id, &mut hoisted);
    }
    if hoisted.is_empty() {
        return;
    }
    for &f in &hoisted {
        reindent(mir, f, 1);
    }
    log::debug!("closure conversion: hoisted {} functions", hoisted.len());
    hoisted.append(&mut mir.root.instructions);
    mir.root.instructions = hoisted;
}

fn take_nested_functions(mir: &mut Mir, owner: ValueId, out: &mut Vec<ValueId>) {
    let lists: Vec<Vec<ValueId>> = match mir.value(owner).instruction() {
        Some(inst) => inst
            .blocks()
            .iter()
            .map(|b| b.instructions.clone())
            .collect(),
        None => return,
    };
    if lists.is_empty() {
        return;
    }

    let mut kept_lists = Vec::with_capacity(lists.len());
    for list in lists {
        let mut kept = Vec::with_capacity(list.len());
        for id in list {
            if mir.value(id).is_function() {
                out.push(id);
            } else {
                kept.push(id);
            }
            take_nested_functions(mir, id, out);
        }
        kept_lists.push(kept);
    }

    if let Some(inst) = mir.value_mut(owner).instruction_mut() {
        for (block, kept) in inst.blocks_mut().into_iter().zip(kept_lists) {
            block.instructions = kept;
        }
    }
}

fn reindent(mir: &mut Mir, owner: ValueId, indent: usize) {
    let mut children = Vec::new();
    if let Some(inst) = mir.value_mut(owner).instruction_mut() {
        for block in inst.blocks_mut() {
            block.indent = indent;
            children.extend(block.instructions.iter().copied());
        }
    }
    for child in children {
        reindent(mir, child, indent + 1);
    }
}
