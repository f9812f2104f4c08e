use std::fmt;

use mimium_common::{Span, Type};

/// A fatal error raised while lowering to MIR.
#[derive(Clone, Debug, PartialEq)]
pub enum MirError {
    /// A name with no binding and no built-in of that name.
    UnboundName { name: String, span: Span },
    /// Indexing or projecting a value whose type has no such element.
    MalformedProjection { ty: Type, span: Span },
    /// An `if` without `else` whose value is used.
    IfWithoutElse { span: Span },
    /// A `for` loop over an array whose length is not known.
    UnknownArraySize { span: Span },
    /// A named function definition inside a `for` body.
    FunctionInLoop { name: String, span: Span },
    /// A value whose type is not usable where it appears, such as calling
    /// something that is not callable.
    UnresolvedType { name: String, ty: Type, span: Span },
}

impl MirError {
    pub fn span(&self) -> Span {
        match self {
            MirError::UnboundName { span, .. }
            | MirError::MalformedProjection { span, .. }
            | MirError::IfWithoutElse { span }
            | MirError::UnknownArraySize { span }
            | MirError::FunctionInLoop { span, .. }
            | MirError::UnresolvedType { span, .. } => *span,
        }
    }
}

impl fmt::Display for MirError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirError::UnboundName { name, .. } => write!(f, "unbound name `{}`", name),
            MirError::MalformedProjection { ty, .. } => {
                write!(f, "cannot project into a value of type `{}`", ty)
            }
            MirError::IfWithoutElse { .. } => {
                write!(f, "`if` used as a value needs an `else` branch")
            }
            MirError::UnknownArraySize { .. } => {
                write!(f, "cannot iterate over an array of unknown length")
            }
            MirError::FunctionInLoop { name, .. } => {
                write!(f, "function `{}` cannot be defined inside a loop", name)
            }
            MirError::UnresolvedType { name, ty, .. } => {
                write!(f, "`{}` has unusable type `{}`", name, ty)
            }
        }
    }
}

impl std::error::Error for MirError {}
