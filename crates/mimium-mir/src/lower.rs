//! AST-to-MIR lowering.
//!
//! K-normalizes the typed AST: every sub-expression becomes its own named
//! instruction, and composite expressions are rebuilt from references to
//! those names. Function bodies and `if` branches are generated into their
//! own nested blocks; everything else is appended to the innermost open
//! block.
//!
//! Source variables live in slots (`Allocate`) and are accessed with
//! `Store`/`Load`, so no instruction is ever redefined. Functions bound by
//! name and function parameters are referred to directly.

use mimium_ast::{AssignTarget, Block as AstBlock, Expr, Fcall, If, Lambda, Lvar, Statement};
use mimium_common::{Span, Type};
use mimium_typeck::builtins::{self, GETNOW};
use mimium_typeck::infer::NOW;
use mimium_typeck::TypeEnv;
use rustc_hash::FxHashMap;

use crate::error::MirError;
use crate::value::{
    Block, FcallKind, FieldIndex, Instruction, Mir, ValueData, ValueId, ValueKind,
};

/// Lower a type-checked compilation unit to MIR.
pub fn generate(env: &TypeEnv, block: &AstBlock) -> Result<Mir, MirError> {
    MirGenerator::new(env).generate(block)
}

/// What a source name refers to.
#[derive(Copy, Clone, Debug)]
enum Binding {
    /// The value itself: a function, a parameter.
    Value(ValueId),
    /// A storage slot holding the variable.
    Slot(ValueId),
}

/// Per-function state while its body is generated.
struct FnFrame {
    fid: ValueId,
    self_ref: Option<ValueId>,
}

// ── Generator ────────────────────────────────────────────────────────

pub struct MirGenerator<'a> {
    env: &'a TypeEnv,
    mir: Mir,
    symbols: FxHashMap<String, Binding>,
    externals: FxHashMap<String, ValueId>,
    /// Open blocks; the innermost is last.
    blocks: Vec<Block>,
    fn_stack: Vec<FnFrame>,
    counter: usize,
    loop_depth: usize,
    entered: usize,
    left: usize,
}

impl<'a> MirGenerator<'a> {
    pub fn new(env: &'a TypeEnv) -> Self {
        MirGenerator {
            env,
            mir: Mir::new(),
            symbols: FxHashMap::default(),
            externals: FxHashMap::default(),
            blocks: Vec::new(),
            fn_stack: Vec::new(),
            counter: 0,
            loop_depth: 0,
            entered: 0,
            left: 0,
        }
    }

    pub fn generate(&mut self, block: &AstBlock) -> Result<Mir, MirError> {
        self.blocks.push(Block::new("root", 0));
        let result = self.lower_body(block);
        let root = self.blocks.pop().unwrap_or_default();
        debug_assert!(self.blocks.is_empty(), "unbalanced block stack");
        result?;

        let mut mir = std::mem::take(&mut self.mir);
        mir.root = root;
        log::debug!(
            "mir generation: {} values, {} root instructions",
            mir.len(),
            mir.root.instructions.len()
        );
        Ok(mir)
    }

    /// Number of nested blocks entered and left so far.
    pub fn block_ops(&self) -> (usize, usize) {
        (self.entered, self.left)
    }

    // ── Emission helpers ─────────────────────────────────────────────

    fn fresh_name(&mut self) -> String {
        let name = format!("$k{}", self.counter);
        self.counter += 1;
        name
    }

    fn new_value(&mut self, name: String, ty: Type, kind: ValueKind, span: Span) -> ValueId {
        self.mir.push_value(ValueData {
            name,
            ty,
            kind,
            span,
        })
    }

    fn append(&mut self, id: ValueId) {
        if let Some(block) = self.blocks.last_mut() {
            block.instructions.push(id);
        }
    }

    /// Add an instruction to the innermost open block.
    fn emit(&mut self, name: String, ty: Type, inst: Instruction, span: Span) -> ValueId {
        let id = self.new_value(name, ty, ValueKind::Instruction(inst), span);
        self.append(id);
        id
    }

    /// Emit an instruction with a generated name.
    fn emit_k(&mut self, ty: Type, inst: Instruction, span: Span) -> ValueId {
        let name = self.fresh_name();
        self.emit(name, ty, inst, span)
    }

    fn enter_block(&mut self, label: String) {
        let indent = self.blocks.len();
        self.blocks.push(Block::new(label, indent));
        self.entered += 1;
    }

    fn leave_block(&mut self) -> Block {
        self.left += 1;
        self.blocks.pop().unwrap_or_default()
    }

    fn ty(&self, id: ValueId) -> Type {
        self.mir.ty(id).clone()
    }

    /// End the current block with a `Return` unless it already ends in one.
    fn finish_with_return(&mut self, value: Option<ValueId>, span: Span) {
        let ends_in_return = self
            .blocks
            .last()
            .and_then(|b| b.instructions.last())
            .map(|&id| {
                matches!(
                    self.mir.value(id).instruction(),
                    Some(Instruction::Return { .. })
                )
            })
            .unwrap_or(false);
        if ends_in_return {
            return;
        }
        let value = value.filter(|&v| *self.mir.ty(v) != Type::Void);
        let ty = value.map(|v| self.ty(v)).unwrap_or(Type::Void);
        self.emit_k(ty, Instruction::Return { value }, span);
    }

    // ── Names ────────────────────────────────────────────────────────

    /// The external value for built-in `name`, created on first use.
    fn external(&mut self, name: &str) -> Option<ValueId> {
        if let Some(&id) = self.externals.get(name) {
            return Some(id);
        }
        let builtin = builtins::lookup(name)?;
        let id = self.new_value(
            builtin.name.to_string(),
            builtin.ty,
            ValueKind::External {
                backend: builtin.backend.to_string(),
            },
            Span::default(),
        );
        self.externals.insert(name.to_string(), id);
        Some(id)
    }

    fn read_symbol(&mut self, name: &str, span: Span) -> Result<ValueId, MirError> {
        if name == NOW {
            let getnow = self.external(GETNOW).ok_or_else(|| MirError::UnboundName {
                name: GETNOW.to_string(),
                span,
            })?;
            return Ok(self.emit_k(
                Type::Float,
                Instruction::Fcall {
                    callee: getnow,
                    args: Vec::new(),
                    kind: FcallKind::External,
                    time: None,
                },
                span,
            ));
        }
        match self.symbols.get(name).copied() {
            Some(Binding::Value(v)) => Ok(v),
            Some(Binding::Slot(ptr)) => {
                let ty = self.ty(ptr);
                Ok(self.emit_k(ty, Instruction::Load { ptr }, span))
            }
            None => self.external(name).ok_or_else(|| MirError::UnboundName {
                name: name.to_string(),
                span,
            }),
        }
    }

    /// A value usable as the target of a projection: the slot itself for a
    /// variable, otherwise the lowered expression.
    fn lower_place(&mut self, expr: &Expr) -> Result<ValueId, MirError> {
        if let Expr::Symbol { name, .. } = expr {
            if let Some(Binding::Slot(ptr)) = self.symbols.get(name).copied() {
                return Ok(ptr);
            }
        }
        self.lower_expr(expr)
    }

    /// Store `value` into the slot for `lvar`, allocating it on first
    /// assignment.
    fn store_var(&mut self, lvar: &Lvar, value: ValueId, span: Span) -> Result<(), MirError> {
        let ptr = match self.symbols.get(&lvar.name).copied() {
            Some(Binding::Slot(ptr)) => ptr,
            _ => {
                let ty = self
                    .env
                    .get(&lvar.name)
                    .cloned()
                    .unwrap_or_else(|| self.ty(value));
                let ptr = self.emit(
                    format!("{}$ptr", lvar.name),
                    ty,
                    Instruction::Allocate,
                    lvar.span,
                );
                self.symbols.insert(lvar.name.clone(), Binding::Slot(ptr));
                ptr
            }
        };
        self.emit_k(Type::Void, Instruction::Store { ptr, value }, span);
        Ok(())
    }

    fn self_value(&mut self, span: Span) -> Result<ValueId, MirError> {
        let (fid, existing) = match self.fn_stack.last() {
            Some(frame) => (frame.fid, frame.self_ref),
            None => {
                return Err(MirError::UnboundName {
                    name: "self".to_string(),
                    span,
                })
            }
        };
        if let Some(id) = existing {
            return Ok(id);
        }
        let name = format!("{}.self", self.mir.name(fid));
        let id = self.new_value(name, Type::Float, ValueKind::SelfRef, span);
        if let Some(frame) = self.fn_stack.last_mut() {
            frame.self_ref = Some(id);
        }
        Ok(id)
    }

    // ── Blocks and statements ────────────────────────────────────────

    /// Lower the statements of a block into the current block and return
    /// the value the block yields, if any.
    fn lower_body(&mut self, block: &AstBlock) -> Result<Option<ValueId>, MirError> {
        let mut last = None;
        for stmt in &block.stmts {
            last = self.lower_stmt(stmt)?;
        }
        match &block.expr {
            Some(expr) => Ok(Some(self.lower_expr(expr)?)),
            None => Ok(last),
        }
    }

    fn lower_stmt(&mut self, stmt: &Statement) -> Result<Option<ValueId>, MirError> {
        match stmt {
            Statement::Assign { target, expr, span } => {
                self.lower_assign(target, expr, *span)?;
                Ok(None)
            }
            Statement::Return { expr, span } => {
                let v = self.lower_expr(expr)?;
                let ty = self.ty(v);
                let value = (ty != Type::Void).then_some(v);
                self.emit_k(ty, Instruction::Return { value }, *span);
                Ok(Some(v))
            }
            Statement::Fdef { name, fun } => {
                if self.loop_depth > 0 {
                    return Err(MirError::FunctionInLoop {
                        name: name.name.clone(),
                        span: fun.span,
                    });
                }
                self.lower_function(Some(&name.name), fun)?;
                Ok(None)
            }
            Statement::For {
                var,
                iter,
                body,
                span,
            } => {
                self.lower_for(var, iter, body, *span)?;
                Ok(None)
            }
            Statement::If(i) => {
                let id = self.lower_if(i, false)?;
                Ok(i.else_block.as_ref().map(|_| id))
            }
            Statement::Expr(e) => {
                self.lower_expr(e)?;
                Ok(None)
            }
        }
    }

    fn lower_assign(
        &mut self,
        target: &AssignTarget,
        expr: &Expr,
        span: Span,
    ) -> Result<(), MirError> {
        match target {
            AssignTarget::Var(lvar) => {
                if let Expr::Lambda(fun) = expr {
                    if !self.symbols.contains_key(&lvar.name) {
                        if self.loop_depth > 0 {
                            return Err(MirError::FunctionInLoop {
                                name: lvar.name.clone(),
                                span: fun.span,
                            });
                        }
                        self.lower_function(Some(&lvar.name), fun)?;
                        return Ok(());
                    }
                }
                let v = self.lower_expr(expr)?;
                self.store_var(lvar, v, span)
            }
            AssignTarget::Array {
                array,
                index,
                span: target_span,
            } => {
                let target = match self.symbols.get(array).copied() {
                    Some(Binding::Slot(ptr)) | Some(Binding::Value(ptr)) => ptr,
                    None => {
                        return Err(MirError::UnboundName {
                            name: array.clone(),
                            span: *target_span,
                        })
                    }
                };
                let idx = self.lower_expr(index)?;
                let v = self.lower_expr(expr)?;
                let elem = self.element_type(target, *target_span)?;
                let field = self.emit_k(
                    elem,
                    Instruction::Field {
                        target,
                        index: FieldIndex::Value(idx),
                    },
                    *target_span,
                );
                self.emit_k(
                    Type::Void,
                    Instruction::Store {
                        ptr: field,
                        value: v,
                    },
                    span,
                );
                Ok(())
            }
            AssignTarget::Tuple(lvars) => {
                let v = self.lower_expr(expr)?;
                let tuple_ty = self.ty(v);
                let elems = match tuple_ty.strip_alias() {
                    Type::Tuple(elems) if elems.len() == lvars.len() => elems.clone(),
                    _ => {
                        return Err(MirError::MalformedProjection {
                            ty: tuple_ty.clone(),
                            span,
                        })
                    }
                };
                for (i, (lvar, elem_ty)) in lvars.iter().zip(elems).enumerate() {
                    let ptr = match self.symbols.get(&lvar.name).copied() {
                        Some(Binding::Slot(ptr)) => ptr,
                        _ => {
                            let ty = self.env.get(&lvar.name).cloned().unwrap_or(elem_ty.clone());
                            let ptr = self.emit(
                                format!("{}$ptr", lvar.name),
                                ty,
                                Instruction::Allocate,
                                lvar.span,
                            );
                            self.symbols.insert(lvar.name.clone(), Binding::Slot(ptr));
                            ptr
                        }
                    };
                    let field = self.emit_k(
                        elem_ty.clone(),
                        Instruction::Field {
                            target: v,
                            index: FieldIndex::Const(i),
                        },
                        lvar.span,
                    );
                    let loaded = self.emit_k(elem_ty, Instruction::Load { ptr: field }, lvar.span);
                    self.emit_k(
                        Type::Void,
                        Instruction::Store { ptr, value: loaded },
                        span,
                    );
                }
                Ok(())
            }
        }
    }

    /// Unroll a `for` loop: the body is generated once per element.
    fn lower_for(
        &mut self,
        var: &Lvar,
        iter: &Expr,
        body: &AstBlock,
        span: Span,
    ) -> Result<(), MirError> {
        let arr = self.lower_place(iter)?;
        let arr_ty = self.ty(arr);
        let (elem, size) = match arr_ty.strip_alias() {
            Type::Array { elem, size } => ((**elem).clone(), *size),
            _ => {
                return Err(MirError::MalformedProjection {
                    ty: arr_ty.clone(),
                    span: iter.span(),
                })
            }
        };
        if size == 0 {
            return Err(MirError::UnknownArraySize { span: iter.span() });
        }

        self.loop_depth += 1;
        let result = self.lower_iterations(var, arr, &elem, size, body, span);
        self.loop_depth -= 1;
        result
    }

    fn lower_iterations(
        &mut self,
        var: &Lvar,
        arr: ValueId,
        elem: &Type,
        size: usize,
        body: &AstBlock,
        span: Span,
    ) -> Result<(), MirError> {
        for i in 0..size {
            let field = self.emit_k(
                elem.clone(),
                Instruction::Field {
                    target: arr,
                    index: FieldIndex::Const(i),
                },
                span,
            );
            let item = self.emit_k(elem.clone(), Instruction::Load { ptr: field }, span);
            self.store_var(var, item, span)?;
            self.lower_body(body)?;
        }
        Ok(())
    }

    /// Lower an `if`. Each branch goes into its own block ending in
    /// `Return`. With `as_value`, a missing else branch is an error.
    fn lower_if(&mut self, i: &If, as_value: bool) -> Result<ValueId, MirError> {
        if as_value && i.else_block.is_none() {
            return Err(MirError::IfWithoutElse { span: i.span });
        }
        let cond = self.lower_expr(&i.cond)?;
        let name = self.fresh_name();
        let id = self.new_value(
            name.clone(),
            Type::Void,
            ValueKind::Instruction(Instruction::If {
                cond,
                then_block: Block::default(),
                else_block: None,
            }),
            i.span,
        );

        let (then_block, then_val) =
            self.lower_branch(format!("{}$then", name), &i.then_block, i.span)?;
        let else_block = match &i.else_block {
            Some(b) => Some(self.lower_branch(format!("{}$else", name), b, i.span)?.0),
            None => None,
        };

        let ty = match (&else_block, then_val) {
            (Some(_), Some(v)) => self.ty(v),
            _ => Type::Void,
        };
        let data = self.mir.value_mut(id);
        data.ty = ty;
        data.kind = ValueKind::Instruction(Instruction::If {
            cond,
            then_block,
            else_block,
        });
        self.append(id);
        Ok(id)
    }

    fn lower_branch(
        &mut self,
        label: String,
        body: &AstBlock,
        span: Span,
    ) -> Result<(Block, Option<ValueId>), MirError> {
        self.enter_block(label);
        let result = self.lower_body(body);
        if let Ok(v) = &result {
            self.finish_with_return(*v, span);
        }
        let block = self.leave_block();
        Ok((block, result?))
    }

    // ── Functions ────────────────────────────────────────────────────

    /// Lower a lambda to a `Function` instruction in the current block.
    ///
    /// A named function is bound before its body is generated so the body
    /// can refer to it.
    fn lower_function(&mut self, name: Option<&str>, fun: &Lambda) -> Result<ValueId, MirError> {
        let fname = match name {
            Some(n) => n.to_string(),
            None => self.fresh_name(),
        };
        let declared = name
            .and_then(|n| self.env.get(n))
            .filter(|t| t.as_callable().is_some())
            .cloned();

        let fid = self.emit(
            fname.clone(),
            declared.clone().unwrap_or(Type::Void),
            Instruction::Function {
                args: Vec::new(),
                body: Block::default(),
                free_variables: Vec::new(),
                self_ref: None,
            },
            fun.span,
        );
        if let Some(n) = name {
            self.symbols.insert(n.to_string(), Binding::Value(fid));
        }

        self.enter_block(fname);
        let mut args = Vec::with_capacity(fun.args.len());
        for (index, lvar) in fun.args.iter().enumerate() {
            let ty = self
                .env
                .get(&lvar.name)
                .cloned()
                .or_else(|| lvar.ty.clone())
                .unwrap_or(Type::Float);
            let arg = self.new_value(
                lvar.name.clone(),
                ty,
                ValueKind::Argument { index },
                lvar.span,
            );
            self.symbols.insert(lvar.name.clone(), Binding::Value(arg));
            args.push(arg);
        }

        self.fn_stack.push(FnFrame {
            fid,
            self_ref: None,
        });
        let result = self.lower_body(&fun.body);
        if let Ok(v) = &result {
            self.finish_with_return(*v, fun.span);
        }
        let frame = self.fn_stack.pop();
        let body = self.leave_block();
        let body_val = result?;

        let ret_ty = match declared.as_ref().and_then(|t| t.as_callable()) {
            Some((ret, _)) => ret.clone(),
            None => body_val.map(|v| self.ty(v)).unwrap_or(Type::Void),
        };
        let fn_ty = match declared {
            Some(t) => t,
            None => Type::function(
                ret_ty.clone(),
                args.iter().map(|&a| self.ty(a)).collect(),
            ),
        };
        let self_ref = frame.and_then(|f| f.self_ref);
        if let Some(s) = self_ref {
            self.mir.value_mut(s).ty = ret_ty;
        }

        let data = self.mir.value_mut(fid);
        data.ty = fn_ty;
        data.kind = ValueKind::Instruction(Instruction::Function {
            args,
            body,
            free_variables: Vec::new(),
            self_ref,
        });
        Ok(fid)
    }

    fn lower_fcall(
        &mut self,
        call: &Fcall,
        when: Option<&Expr>,
        span: Span,
    ) -> Result<ValueId, MirError> {
        let callee = self.lower_expr(&call.callee)?;
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.lower_expr(arg)?);
        }
        let time = match when {
            Some(w) => Some(self.lower_expr(w)?),
            None => None,
        };

        let callee_ty = self.ty(callee);
        let ret = match callee_ty.as_callable() {
            Some((ret, _)) => ret.clone(),
            None => {
                return Err(MirError::UnresolvedType {
                    name: self.mir.name(callee).to_string(),
                    ty: callee_ty,
                    span,
                })
            }
        };
        // Closure by default; closure conversion downgrades to Direct when
        // the callee captures nothing.
        let kind = if self.mir.value(callee).is_external() {
            FcallKind::External
        } else {
            FcallKind::Closure
        };
        Ok(self.emit_k(
            ret,
            Instruction::Fcall {
                callee,
                args,
                kind,
                time,
            },
            span,
        ))
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn lower_expr(&mut self, expr: &Expr) -> Result<ValueId, MirError> {
        match expr {
            Expr::Number { value, span } => {
                Ok(self.emit_k(Type::Float, Instruction::Number(*value), *span))
            }
            Expr::String { value, span } => Ok(self.emit_k(
                Type::String,
                Instruction::String(value.clone()),
                *span,
            )),
            Expr::Symbol { name, span } => self.read_symbol(name, *span),
            Expr::SelfRef { span } => self.self_value(*span),
            Expr::Op { op, lhs, rhs, span } => {
                let lhs = match lhs {
                    Some(l) => Some(self.lower_expr(l)?),
                    None => None,
                };
                let rhs = self.lower_expr(rhs)?;
                Ok(self.emit_k(Type::Float, Instruction::Op { op: *op, lhs, rhs }, *span))
            }
            Expr::Lambda(fun) => self.lower_function(None, fun),
            Expr::Fcall(call) => self.lower_fcall(call, None, call.span),
            Expr::Time(t) => self.lower_fcall(&t.fcall, Some(&t.when), t.span),
            Expr::If(i) => self.lower_if(i, true),
            Expr::ArrayInit { elems, span } => {
                let mut values = Vec::with_capacity(elems.len());
                for e in elems {
                    values.push(self.lower_expr(e)?);
                }
                let elem_ty = values
                    .first()
                    .map(|&v| self.ty(v))
                    .unwrap_or(Type::Float);
                Ok(self.emit_k(
                    Type::array(elem_ty, values.len()),
                    Instruction::Array { elements: values },
                    *span,
                ))
            }
            Expr::ArrayAccess { array, index, span } => {
                let target = self.lower_place(array)?;
                let idx = self.lower_expr(index)?;
                let elem = self.element_type(target, *span)?;
                let field = self.emit_k(
                    elem.clone(),
                    Instruction::Field {
                        target,
                        index: FieldIndex::Value(idx),
                    },
                    *span,
                );
                Ok(self.emit_k(elem, Instruction::Load { ptr: field }, *span))
            }
            Expr::Tuple { elems, span } => {
                let mut values = Vec::with_capacity(elems.len());
                for e in elems {
                    values.push(self.lower_expr(e)?);
                }
                let ty = Type::Tuple(values.iter().map(|&v| self.ty(v)).collect());
                Ok(self.build_aggregate(ty, values, *span))
            }
            Expr::Struct { fields, span } => {
                let mut values = Vec::with_capacity(fields.len());
                let mut field_tys = Vec::with_capacity(fields.len());
                for (name, e) in fields {
                    let v = self.lower_expr(e)?;
                    field_tys.push((name.clone(), self.ty(v)));
                    values.push(v);
                }
                Ok(self.build_aggregate(Type::Struct(field_tys), values, *span))
            }
            Expr::StructAccess {
                target,
                field,
                span,
            } => {
                let t = self.lower_place(target)?;
                let target_ty = self.ty(t);
                let found = match target_ty.strip_alias() {
                    Type::Struct(fields) => fields
                        .iter()
                        .position(|(n, _)| n == field)
                        .map(|i| (i, fields[i].1.clone())),
                    _ => None,
                };
                let (index, fty) = found.ok_or(MirError::MalformedProjection {
                    ty: target_ty,
                    span: *span,
                })?;
                let ptr = self.emit_k(
                    fty.clone(),
                    Instruction::Field {
                        target: t,
                        index: FieldIndex::Const(index),
                    },
                    *span,
                );
                Ok(self.emit_k(fty, Instruction::Load { ptr }, *span))
            }
        }
    }

    /// Allocate storage for an aggregate and store each element into its
    /// field, in order. The allocation is the aggregate's value.
    fn build_aggregate(&mut self, ty: Type, values: Vec<ValueId>, span: Span) -> ValueId {
        let alloc = self.emit_k(ty, Instruction::Allocate, span);
        for (i, v) in values.into_iter().enumerate() {
            let field_ty = self.ty(v);
            let field = self.emit_k(
                field_ty,
                Instruction::Field {
                    target: alloc,
                    index: FieldIndex::Const(i),
                },
                span,
            );
            self.emit_k(
                Type::Void,
                Instruction::Store {
                    ptr: field,
                    value: v,
                },
                span,
            );
        }
        alloc
    }

    fn element_type(&self, target: ValueId, span: Span) -> Result<Type, MirError> {
        match self.mir.ty(target).strip_alias() {
            Type::Array { elem, .. } => Ok((**elem).clone()),
            other => Err(MirError::MalformedProjection {
                ty: other.clone(),
                span,
            }),
        }
    }
}
