//! Type inference over the AST.
//!
//! A single pass assigns a type to every binding and every intermediate
//! expression, unifying as it goes. Bindings are recorded in a flat
//! [`TypeEnv`]; once the walk is complete, type variables that are still
//! unresolved are defaulted to Float.

use mimium_ast::{AssignTarget, Block, Expr, Fcall, If, Lambda, Statement};
use mimium_common::{Span, Type};
use rustc_hash::FxHashSet;

use crate::builtins;
use crate::env::TypeEnv;
use crate::error::TypeError;
use crate::recursive::find_recursive;

/// Name that reads the current logical time.
pub const NOW: &str = "now";

/// Infer types for a whole compilation unit.
pub fn infer(block: &Block) -> Result<TypeEnv, TypeError> {
    TypeInferer::new().infer(block)
}

pub struct TypeInferer {
    env: TypeEnv,
    /// Names of functions whose body refers to themselves.
    recursive: FxHashSet<String>,
    /// Return types of the lambdas currently being inferred, innermost last.
    /// `self` and `return` both refer to the top entry.
    ret_stack: Vec<Type>,
}

impl TypeInferer {
    pub fn new() -> Self {
        let mut env = TypeEnv::new();
        builtins::register_builtins(&mut env);
        env.insert(NOW.to_string(), Type::Float);
        TypeInferer {
            env,
            recursive: FxHashSet::default(),
            ret_stack: Vec::new(),
        }
    }

    pub fn infer(mut self, block: &Block) -> Result<TypeEnv, TypeError> {
        self.recursive = find_recursive(block);
        self.infer_block(block)?;
        self.env.replace_type_vars();
        Ok(self.env)
    }

    // ── Blocks and statements ───────────────────────────────────────────

    /// Infer a block and return the type of the value it yields.
    ///
    /// A block yields its trailing expression; failing that, the value of a
    /// final `return` or of a final `if` with an else branch; otherwise Void.
    fn infer_block(&mut self, block: &Block) -> Result<Type, TypeError> {
        let mut last = Type::Void;
        for stmt in &block.stmts {
            last = self.infer_stmt(stmt)?;
        }
        match &block.expr {
            Some(expr) => self.infer_expr(expr),
            None => Ok(last),
        }
    }

    /// Infer a statement. Returns the statement's value type when it can end
    /// a block with a value (`return`, `if`/`else`), Void otherwise.
    fn infer_stmt(&mut self, stmt: &Statement) -> Result<Type, TypeError> {
        match stmt {
            Statement::Assign { target, expr, span } => {
                self.infer_assign(target, expr, *span)?;
                Ok(Type::Void)
            }
            Statement::Return { expr, span } => {
                let ty = self.infer_expr(expr)?;
                if let Some(ret) = self.ret_stack.last().cloned() {
                    self.env.unify(ret, ty.clone(), *span)?;
                }
                Ok(ty)
            }
            Statement::Fdef { name, fun } => {
                self.infer_lambda(Some(&name.name), fun)?;
                Ok(Type::Void)
            }
            Statement::For {
                var,
                iter,
                body,
                span,
            } => {
                let iter_ty = self.infer_expr(iter)?;
                let elem = self.element_type(iter_ty, *span)?;
                if let Some(ann) = &var.ty {
                    self.env.unify(ann.clone(), elem.clone(), var.span)?;
                }
                self.env.insert(var.name.clone(), elem);
                self.infer_block(body)?;
                Ok(Type::Void)
            }
            Statement::If(i) => self.infer_if(i),
            Statement::Expr(e) => {
                self.infer_expr(e)?;
                Ok(Type::Void)
            }
        }
    }

    fn infer_assign(
        &mut self,
        target: &AssignTarget,
        expr: &Expr,
        span: Span,
    ) -> Result<(), TypeError> {
        match target {
            AssignTarget::Var(lvar) => {
                // Reassignment unifies with the existing binding; a new
                // binding is entered before the right-hand side so that a
                // lambda can refer to itself.
                let lty = match self.env.get(&lvar.name).cloned() {
                    Some(existing) => {
                        if let Some(ann) = &lvar.ty {
                            self.env.unify(existing.clone(), ann.clone(), lvar.span)?;
                        }
                        existing
                    }
                    None => {
                        let ty = match &lvar.ty {
                            Some(ann) => ann.clone(),
                            None => self.env.fresh_var(),
                        };
                        self.env.insert(lvar.name.clone(), ty.clone());
                        ty
                    }
                };
                let rty = match expr {
                    Expr::Lambda(fun) => self.infer_lambda(Some(&lvar.name), fun)?,
                    other => self.infer_expr(other)?,
                };
                self.env.unify(lty, rty, span)
            }
            AssignTarget::Array {
                array,
                index,
                span: target_span,
            } => {
                let arr_ty = self.lookup(array, *target_span)?;
                let elem = self.element_type(arr_ty, *target_span)?;
                let idx_ty = self.infer_expr(index)?;
                self.env.unify(Type::Float, idx_ty, index.span())?;
                let rty = self.infer_expr(expr)?;
                self.env.unify(elem, rty, span)
            }
            AssignTarget::Tuple(lvars) => {
                let rty = self.infer_expr(expr)?;
                let mut elems = Vec::with_capacity(lvars.len());
                for lvar in lvars {
                    let ty = match (&lvar.ty, self.env.get(&lvar.name).cloned()) {
                        (_, Some(existing)) => existing,
                        (Some(ann), None) => ann.clone(),
                        (None, None) => self.env.fresh_var(),
                    };
                    self.env.insert(lvar.name.clone(), ty.clone());
                    elems.push(ty);
                }
                self.env.unify(Type::Tuple(elems), rty, span)
            }
        }
    }

    fn infer_if(&mut self, i: &If) -> Result<Type, TypeError> {
        let cond = self.infer_expr(&i.cond)?;
        self.env.unify(Type::Float, cond, i.cond.span())?;
        let then_ty = self.infer_block(&i.then_block)?;
        match &i.else_block {
            Some(else_block) => {
                let else_ty = self.infer_block(else_block)?;
                self.env.unify(then_ty.clone(), else_ty, i.span)?;
                Ok(then_ty)
            }
            None => Ok(Type::Void),
        }
    }

    // ── Functions ───────────────────────────────────────────────────────

    /// Infer a lambda, optionally bound to `name`.
    ///
    /// The function type is built from the parameter types and the declared
    /// (or fresh) return type, and bound to `name` before the body is
    /// visited.
    fn infer_lambda(&mut self, name: Option<&str>, fun: &Lambda) -> Result<Type, TypeError> {
        let mut args = Vec::with_capacity(fun.args.len());
        for arg in &fun.args {
            let ty = match &arg.ty {
                Some(ann) => ann.clone(),
                None => self.env.fresh_var(),
            };
            self.env.insert(arg.name.clone(), ty.clone());
            args.push(ty);
        }

        let ret = match (&fun.ret_ty, name) {
            (Some(ann), _) => ann.clone(),
            (None, Some(n)) if self.recursive.contains(n) => {
                return Err(TypeError::MissingReturnType {
                    name: n.to_string(),
                    span: fun.span,
                });
            }
            (None, _) => self.env.fresh_var(),
        };

        let fn_ty = Type::function(ret.clone(), args);
        if let Some(n) = name {
            match self.env.get(n).cloned() {
                Some(existing) => self.env.unify(existing, fn_ty.clone(), fun.span)?,
                None => self.env.insert(n.to_string(), fn_ty.clone()),
            }
        }

        self.ret_stack.push(ret.clone());
        let body = self.infer_block(&fun.body);
        self.ret_stack.pop();
        let body_ty = body?;
        self.env.unify(ret, body_ty, fun.span)?;
        Ok(fn_ty)
    }

    fn infer_fcall(&mut self, call: &Fcall) -> Result<Type, TypeError> {
        let callee = self.infer_expr(&call.callee)?;
        let mut args = Vec::with_capacity(call.args.len());
        for arg in &call.args {
            args.push(self.infer_expr(arg)?);
        }

        let resolved = self.env.resolve(callee.clone());
        if resolved.is_type_var() {
            let ret = self.env.fresh_var();
            self.env
                .unify(callee, Type::function(ret.clone(), args), call.span)?;
            return Ok(ret);
        }

        let (ret, params) = match resolved.as_callable() {
            Some((ret, params)) => (ret.clone(), params.to_vec()),
            None => {
                return Err(TypeError::NotAFunction {
                    ty: resolved.clone(),
                    span: call.callee.span(),
                })
            }
        };
        if params.len() != args.len() {
            return Err(TypeError::ArityMismatch {
                expected: params.len(),
                found: args.len(),
                span: call.span,
            });
        }
        for ((param, arg), arg_expr) in params.into_iter().zip(args).zip(&call.args) {
            self.env.unify(param, arg, arg_expr.span())?;
        }
        Ok(ret)
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn infer_expr(&mut self, expr: &Expr) -> Result<Type, TypeError> {
        match expr {
            Expr::Number { .. } => Ok(Type::Float),
            Expr::String { .. } => Ok(Type::String),
            Expr::Symbol { name, span } => self.lookup(name, *span),
            Expr::SelfRef { span } => self
                .ret_stack
                .last()
                .cloned()
                .ok_or(TypeError::SelfOutsideFunction { span: *span }),
            Expr::Op { lhs, rhs, span, .. } => {
                let lty = match lhs {
                    Some(lhs) => Some(self.infer_expr(lhs)?),
                    None => None,
                };
                let rty = self.infer_expr(rhs)?;
                if let Some(lty) = lty {
                    self.env.unify(lty, rty, *span)?;
                }
                Ok(Type::Float)
            }
            Expr::Lambda(fun) => self.infer_lambda(None, fun),
            Expr::Fcall(call) => self.infer_fcall(call),
            Expr::Time(t) => {
                if let Expr::Time(inner) = &t.when {
                    return Err(TypeError::NestedTime { span: inner.span });
                }
                // A scheduled call has the type of the call's result.
                let ret = self.infer_fcall(&t.fcall)?;
                let when = self.infer_expr(&t.when)?;
                self.env.unify(Type::Float, when, t.when.span())?;
                Ok(ret)
            }
            Expr::If(i) => self.infer_if(i),
            Expr::ArrayInit { elems, span } => {
                if elems.is_empty() {
                    let elem = self.env.fresh_var();
                    return Ok(Type::array(elem, 0));
                }
                let elem = self.env.fresh_var();
                for e in elems {
                    let ty = self.infer_expr(e)?;
                    self.env.unify(elem.clone(), ty, *span)?;
                }
                Ok(Type::array(elem, elems.len()))
            }
            Expr::ArrayAccess { array, index, span } => {
                let arr_ty = self.infer_expr(array)?;
                let elem = self.element_type(arr_ty, *span)?;
                let idx_ty = self.infer_expr(index)?;
                self.env.unify(Type::Float, idx_ty, index.span())?;
                Ok(elem)
            }
            Expr::Tuple { elems, .. } => {
                let mut tys = Vec::with_capacity(elems.len());
                for e in elems {
                    tys.push(self.infer_expr(e)?);
                }
                Ok(Type::Tuple(tys))
            }
            Expr::Struct { fields, .. } => {
                let mut tys = Vec::with_capacity(fields.len());
                for (name, e) in fields {
                    tys.push((name.clone(), self.infer_expr(e)?));
                }
                Ok(Type::Struct(tys))
            }
            Expr::StructAccess {
                target,
                field,
                span,
            } => {
                let target_ty = self.infer_expr(target)?;
                let resolved = self.env.resolve(target_ty);
                match resolved.strip_alias() {
                    Type::Struct(fields) => fields
                        .iter()
                        .find(|(n, _)| n == field)
                        .map(|(_, t)| t.clone())
                        .ok_or_else(|| TypeError::NoSuchField {
                            ty: resolved.clone(),
                            field: field.clone(),
                            span: *span,
                        }),
                    _ => Err(TypeError::NotAStruct {
                        ty: resolved.clone(),
                        span: *span,
                    }),
                }
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn lookup(&mut self, name: &str, span: Span) -> Result<Type, TypeError> {
        self.env
            .get(name)
            .cloned()
            .ok_or_else(|| TypeError::UnboundVariable {
                name: name.to_string(),
                span,
            })
    }

    /// Element type of something being indexed or iterated.
    fn element_type(&mut self, ty: Type, span: Span) -> Result<Type, TypeError> {
        let resolved = self.env.resolve(ty.clone());
        match resolved.strip_alias() {
            Type::Array { elem, .. } => Ok((**elem).clone()),
            Type::TypeVar(_) => {
                let elem = self.env.fresh_var();
                self.env.unify(ty, Type::array(elem.clone(), 0), span)?;
                Ok(elem)
            }
            _ => Err(TypeError::NotIndexable {
                ty: resolved.clone(),
                span,
            }),
        }
    }
}

impl Default for TypeInferer {
    fn default() -> Self {
        Self::new()
    }
}
