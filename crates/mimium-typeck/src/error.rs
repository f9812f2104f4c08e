//! Type errors and recoverable type warnings.
//!
//! Every error carries the `Span` of the construct that produced the failing
//! constraint so diagnostics can point at it. All errors are fatal for the
//! compilation unit; warnings are collected and compilation continues.

use std::fmt;

use mimium_common::{Span, Type, TypeVar};

/// A fatal error raised during type inference.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeError {
    /// Two types that should be equal are structurally incompatible.
    Mismatch {
        expected: Type,
        found: Type,
        span: Span,
    },
    /// Wrong number of arguments at a call site, or tuples of different
    /// lengths.
    ArityMismatch {
        expected: usize,
        found: usize,
        span: Span,
    },
    /// A symbol was read that has no binding.
    UnboundVariable { name: String, span: Span },
    /// The callee of a call has a type that cannot be called.
    NotAFunction { ty: Type, span: Span },
    /// A function calls itself but declares no return type.
    MissingReturnType { name: String, span: Span },
    /// Indexing a value that is not an array.
    NotIndexable { ty: Type, span: Span },
    /// Field access naming a field the struct does not have.
    NoSuchField {
        ty: Type,
        field: String,
        span: Span,
    },
    /// Field access on a value that is not a struct.
    NotAStruct { ty: Type, span: Span },
    /// A scheduled call whose time is itself a scheduled call.
    NestedTime { span: Span },
    /// `self` used outside of any function body.
    SelfOutsideFunction { span: Span },
}

impl TypeError {
    pub fn span(&self) -> Span {
        match self {
            TypeError::Mismatch { span, .. }
            | TypeError::ArityMismatch { span, .. }
            | TypeError::UnboundVariable { span, .. }
            | TypeError::NotAFunction { span, .. }
            | TypeError::MissingReturnType { span, .. }
            | TypeError::NotIndexable { span, .. }
            | TypeError::NoSuchField { span, .. }
            | TypeError::NotAStruct { span, .. }
            | TypeError::NestedTime { span }
            | TypeError::SelfOutsideFunction { span } => *span,
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeError::Mismatch {
                expected, found, ..
            } => write!(f, "type mismatch: expected `{}`, found `{}`", expected, found),
            TypeError::ArityMismatch {
                expected, found, ..
            } => write!(
                f,
                "arity mismatch: expected {} arguments, found {}",
                expected, found
            ),
            TypeError::UnboundVariable { name, .. } => write!(f, "unbound variable `{}`", name),
            TypeError::NotAFunction { ty, .. } => write!(f, "`{}` is not a function", ty),
            TypeError::MissingReturnType { name, .. } => write!(
                f,
                "recursive function `{}` needs an explicit return type",
                name
            ),
            TypeError::NotIndexable { ty, .. } => write!(f, "`{}` cannot be indexed", ty),
            TypeError::NoSuchField { ty, field, .. } => {
                write!(f, "`{}` has no field `{}`", ty, field)
            }
            TypeError::NotAStruct { ty, .. } => write!(f, "`{}` is not a struct", ty),
            TypeError::NestedTime { .. } => write!(f, "time expressions cannot be nested"),
            TypeError::SelfOutsideFunction { .. } => {
                write!(f, "`self` can only be used inside a function")
            }
        }
    }
}

impl std::error::Error for TypeError {}

/// A recovered problem. Inference continues after recording one.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeWarning {
    /// Binding `var` to `ty` would create an infinite type; the variable was
    /// defaulted to Float instead.
    TypeLoop { var: TypeVar, ty: Type },
}

impl fmt::Display for TypeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeWarning::TypeLoop { var, ty } => write!(
                f,
                "type loop: `?{}` occurs in `{}`, defaulting to float",
                var.0, ty
            ),
        }
    }
}
