//! Constructor helpers for AST nodes.
//!
//! Nodes built here carry empty default spans. Tests and tools that produce
//! trees programmatically use these instead of spelling out every field.

use mimium_common::{Span, Type};

use crate::{AssignTarget, Block, Expr, Fcall, If, Lambda, Lvar, OpId, Statement, Time};

pub fn lvar(name: &str) -> Lvar {
    Lvar {
        name: name.to_string(),
        ty: None,
        span: Span::default(),
    }
}

pub fn lvar_typed(name: &str, ty: Type) -> Lvar {
    Lvar {
        ty: Some(ty),
        ..lvar(name)
    }
}

pub fn num(value: f64) -> Expr {
    Expr::Number {
        value,
        span: Span::default(),
    }
}

pub fn string(value: &str) -> Expr {
    Expr::String {
        value: value.to_string(),
        span: Span::default(),
    }
}

pub fn sym(name: &str) -> Expr {
    Expr::Symbol {
        name: name.to_string(),
        span: Span::default(),
    }
}

pub fn self_ref() -> Expr {
    Expr::SelfRef {
        span: Span::default(),
    }
}

pub fn op(op: OpId, lhs: Expr, rhs: Expr) -> Expr {
    Expr::Op {
        op,
        lhs: Some(Box::new(lhs)),
        rhs: Box::new(rhs),
        span: Span::default(),
    }
}

pub fn unary(op: OpId, rhs: Expr) -> Expr {
    Expr::Op {
        op,
        lhs: None,
        rhs: Box::new(rhs),
        span: Span::default(),
    }
}

pub fn block(stmts: Vec<Statement>, expr: Option<Expr>) -> Block {
    Block::new(stmts, expr)
}

pub fn lambda_node(args: Vec<Lvar>, ret_ty: Option<Type>, body: Block) -> Lambda {
    Lambda {
        args,
        ret_ty,
        body,
        span: Span::default(),
    }
}

/// Lambda with untyped parameters named `args`.
pub fn lambda(args: &[&str], body: Block) -> Expr {
    Expr::Lambda(Box::new(lambda_node(
        args.iter().map(|a| lvar(a)).collect(),
        None,
        body,
    )))
}

pub fn fcall(callee: Expr, args: Vec<Expr>) -> Fcall {
    Fcall {
        callee,
        args,
        span: Span::default(),
    }
}

pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Fcall(Box::new(fcall(callee, args)))
}

/// `name(args)`
pub fn call_named(name: &str, args: Vec<Expr>) -> Expr {
    call(sym(name), args)
}

pub fn time(fcall: Fcall, when: Expr) -> Expr {
    Expr::Time(Box::new(Time {
        fcall,
        when,
        span: Span::default(),
    }))
}

pub fn if_node(cond: Expr, then_block: Block, else_block: Option<Block>) -> If {
    If {
        cond,
        then_block,
        else_block,
        span: Span::default(),
    }
}

pub fn if_expr(cond: Expr, then_block: Block, else_block: Option<Block>) -> Expr {
    Expr::If(Box::new(if_node(cond, then_block, else_block)))
}

pub fn if_stmt(cond: Expr, then_block: Block, else_block: Option<Block>) -> Statement {
    Statement::If(if_node(cond, then_block, else_block))
}

pub fn array(elems: Vec<Expr>) -> Expr {
    Expr::ArrayInit {
        elems,
        span: Span::default(),
    }
}

pub fn index(array: Expr, index: Expr) -> Expr {
    Expr::ArrayAccess {
        array: Box::new(array),
        index: Box::new(index),
        span: Span::default(),
    }
}

pub fn tuple(elems: Vec<Expr>) -> Expr {
    Expr::Tuple {
        elems,
        span: Span::default(),
    }
}

pub fn struct_lit(fields: Vec<(&str, Expr)>) -> Expr {
    Expr::Struct {
        fields: fields
            .into_iter()
            .map(|(n, e)| (n.to_string(), e))
            .collect(),
        span: Span::default(),
    }
}

pub fn field(target: Expr, name: &str) -> Expr {
    Expr::StructAccess {
        target: Box::new(target),
        field: name.to_string(),
        span: Span::default(),
    }
}

pub fn assign(name: &str, expr: Expr) -> Statement {
    assign_to(lvar(name), expr)
}

pub fn assign_to(target: Lvar, expr: Expr) -> Statement {
    Statement::Assign {
        target: AssignTarget::Var(target),
        expr,
        span: Span::default(),
    }
}

pub fn assign_index(array: &str, idx: Expr, expr: Expr) -> Statement {
    Statement::Assign {
        target: AssignTarget::Array {
            array: array.to_string(),
            index: idx,
            span: Span::default(),
        },
        expr,
        span: Span::default(),
    }
}

pub fn assign_tuple(names: &[&str], expr: Expr) -> Statement {
    Statement::Assign {
        target: AssignTarget::Tuple(names.iter().map(|n| lvar(n)).collect()),
        expr,
        span: Span::default(),
    }
}

/// `fn name(args) -> ret_ty { body }`
pub fn fdef(name: &str, args: &[&str], ret_ty: Option<Type>, body: Block) -> Statement {
    Statement::Fdef {
        name: lvar(name),
        fun: lambda_node(args.iter().map(|a| lvar(a)).collect(), ret_ty, body),
    }
}

pub fn ret(expr: Expr) -> Statement {
    Statement::Return {
        expr,
        span: Span::default(),
    }
}

pub fn expr_stmt(expr: Expr) -> Statement {
    Statement::Expr(expr)
}

pub fn for_loop(var: &str, iter: Expr, body: Block) -> Statement {
    Statement::For {
        var: lvar(var),
        iter,
        body,
        span: Span::default(),
    }
}
