use mimium_common::Span;
use serde::{Deserialize, Serialize};

use crate::expr::{Expr, If, Lambda, Lvar};

/// Left-hand side of an assignment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AssignTarget {
    Var(Lvar),
    /// `arr[i] = ...`
    Array {
        array: String,
        index: Expr,
        span: Span,
    },
    /// `(a, b) = ...`, destructured left to right.
    Tuple(Vec<Lvar>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Assign {
        target: AssignTarget,
        expr: Expr,
        span: Span,
    },
    Return {
        expr: Expr,
        span: Span,
    },
    /// Named function definition: `fn name(args) -> ret { body }`.
    Fdef {
        name: Lvar,
        fun: Lambda,
    },
    /// `for var in iter { body }` over a fixed-size array.
    For {
        var: Lvar,
        iter: Expr,
        body: Block,
        span: Span,
    },
    If(If),
    Expr(Expr),
}

/// Ordered statements plus an optional trailing expression, which is the
/// value the block yields.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Statement>,
    pub expr: Option<Box<Expr>>,
}

impl Block {
    pub fn new(stmts: Vec<Statement>, expr: Option<Expr>) -> Self {
        Block {
            stmts,
            expr: expr.map(Box::new),
        }
    }
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Assign { span, .. }
            | Statement::Return { span, .. }
            | Statement::For { span, .. } => *span,
            Statement::Fdef { fun, .. } => fun.span,
            Statement::If(i) => i.span,
            Statement::Expr(e) => e.span(),
        }
    }
}
