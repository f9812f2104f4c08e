use std::fmt;

use mimium_common::{Span, Type};
use serde::{Deserialize, Serialize};

use crate::stmt::Block;

/// Operator tag of an [`Expr::Op`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpId {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEq,
    LessEq,
    GreaterEq,
    LessThan,
    GreaterThan,
    And,
    BitAnd,
    Or,
    BitOr,
    Xor,
    Exponent,
    Not,
    LShift,
    RShift,
}

impl OpId {
    pub fn as_str(self) -> &'static str {
        match self {
            OpId::Add => "+",
            OpId::Sub => "-",
            OpId::Mul => "*",
            OpId::Div => "/",
            OpId::Equal => "==",
            OpId::NotEq => "!=",
            OpId::LessEq => "<=",
            OpId::GreaterEq => ">=",
            OpId::LessThan => "<",
            OpId::GreaterThan => ">",
            OpId::And => "&&",
            OpId::BitAnd => "&",
            OpId::Or => "||",
            OpId::BitOr => "|",
            OpId::Xor => "^",
            OpId::Exponent => "**",
            OpId::Not => "!",
            OpId::LShift => "<<",
            OpId::RShift => ">>",
        }
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A binding site: assignment target, lambda parameter, loop variable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lvar {
    pub name: String,
    /// Declared type annotation, if any.
    pub ty: Option<Type>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub args: Vec<Lvar>,
    /// Declared return type. Required when the lambda calls itself.
    pub ret_ty: Option<Type>,
    pub body: Block,
    pub span: Span,
}

/// A function call. The callee may be any expression: a name, a lambda
/// literal or the result of another call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fcall {
    pub callee: Expr,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// A call scheduled at a logical time (`f(x)@when`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Time {
    pub fcall: Fcall,
    pub when: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct If {
    pub cond: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Number {
        value: f64,
        span: Span,
    },
    String {
        value: String,
        span: Span,
    },
    /// Read reference to a bound name.
    Symbol {
        name: String,
        span: Span,
    },
    /// Reference to the persistent feedback state of the enclosing function.
    SelfRef {
        span: Span,
    },
    /// Binary operator, or unary when `lhs` is absent (negation, `!`).
    Op {
        op: OpId,
        lhs: Option<Box<Expr>>,
        rhs: Box<Expr>,
        span: Span,
    },
    Lambda(Box<Lambda>),
    Fcall(Box<Fcall>),
    Time(Box<Time>),
    If(Box<If>),
    ArrayInit {
        elems: Vec<Expr>,
        span: Span,
    },
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
        span: Span,
    },
    Tuple {
        elems: Vec<Expr>,
        span: Span,
    },
    Struct {
        fields: Vec<(String, Expr)>,
        span: Span,
    },
    StructAccess {
        target: Box<Expr>,
        field: String,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Number { span, .. }
            | Expr::String { span, .. }
            | Expr::Symbol { span, .. }
            | Expr::SelfRef { span }
            | Expr::Op { span, .. }
            | Expr::ArrayInit { span, .. }
            | Expr::ArrayAccess { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Struct { span, .. }
            | Expr::StructAccess { span, .. } => *span,
            Expr::Lambda(l) => l.span,
            Expr::Fcall(c) => c.span,
            Expr::Time(t) => t.span,
            Expr::If(i) => i.span,
        }
    }
}
