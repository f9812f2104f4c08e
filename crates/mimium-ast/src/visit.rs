//! Read-only AST traversal.
//!
//! Implement [`Visitor`] and override the `visit_*` methods of interest; the
//! default methods descend into children through the `walk_*` functions, in
//! source order. Nested lambda bodies are visited too.

use crate::{AssignTarget, Block, Expr, Fcall, Statement};

pub trait Visitor {
    fn visit_block(&mut self, block: &Block) {
        walk_block(self, block);
    }

    fn visit_stmt(&mut self, stmt: &Statement) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &Expr) {
        walk_expr(self, expr);
    }
}

pub fn walk_block<V: Visitor + ?Sized>(v: &mut V, block: &Block) {
    for stmt in &block.stmts {
        v.visit_stmt(stmt);
    }
    if let Some(expr) = &block.expr {
        v.visit_expr(expr);
    }
}

pub fn walk_stmt<V: Visitor + ?Sized>(v: &mut V, stmt: &Statement) {
    match stmt {
        Statement::Assign { target, expr, .. } => {
            if let AssignTarget::Array { index, .. } = target {
                v.visit_expr(index);
            }
            v.visit_expr(expr);
        }
        Statement::Return { expr, .. } => v.visit_expr(expr),
        Statement::Fdef { fun, .. } => v.visit_block(&fun.body),
        Statement::For { iter, body, .. } => {
            v.visit_expr(iter);
            v.visit_block(body);
        }
        Statement::If(i) => {
            v.visit_expr(&i.cond);
            v.visit_block(&i.then_block);
            if let Some(e) = &i.else_block {
                v.visit_block(e);
            }
        }
        Statement::Expr(e) => v.visit_expr(e),
    }
}

fn walk_fcall<V: Visitor + ?Sized>(v: &mut V, call: &Fcall) {
    v.visit_expr(&call.callee);
    for arg in &call.args {
        v.visit_expr(arg);
    }
}

pub fn walk_expr<V: Visitor + ?Sized>(v: &mut V, expr: &Expr) {
    match expr {
        Expr::Number { .. } | Expr::String { .. } | Expr::Symbol { .. } | Expr::SelfRef { .. } => {}
        Expr::Op { lhs, rhs, .. } => {
            if let Some(lhs) = lhs {
                v.visit_expr(lhs);
            }
            v.visit_expr(rhs);
        }
        Expr::Lambda(l) => v.visit_block(&l.body),
        Expr::Fcall(c) => walk_fcall(v, c),
        Expr::Time(t) => {
            walk_fcall(v, &t.fcall);
            v.visit_expr(&t.when);
        }
        Expr::If(i) => {
            v.visit_expr(&i.cond);
            v.visit_block(&i.then_block);
            if let Some(e) = &i.else_block {
                v.visit_block(e);
            }
        }
        Expr::ArrayInit { elems, .. } | Expr::Tuple { elems, .. } => {
            for e in elems {
                v.visit_expr(e);
            }
        }
        Expr::ArrayAccess { array, index, .. } => {
            v.visit_expr(array);
            v.visit_expr(index);
        }
        Expr::Struct { fields, .. } => {
            for (_, e) in fields {
                v.visit_expr(e);
            }
        }
        Expr::StructAccess { target, .. } => v.visit_expr(target),
    }
}
