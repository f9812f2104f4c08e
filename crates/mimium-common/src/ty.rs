//! Type representation shared by every stage of the pipeline.
//!
//! `Type` is a closed, structurally compared sum type. During inference a
//! `Type::TypeVar` stands for an unresolved unification variable; after the
//! environment is finalized no `TypeVar` or `None` remains anywhere.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unification variable, identified by its creation index.
///
/// Two type variables are the same variable iff their indices are equal.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeVar(pub u32);

/// A mimium type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Not resolved yet (missing annotation).
    None,
    Void,
    Float,
    String,
    /// An inference variable.
    TypeVar(TypeVar),
    /// Reference-like wrapper.
    Ref(Box<Type>),
    Pointer(Box<Type>),
    Function { ret: Box<Type>, args: Vec<Type> },
    /// A function paired with the type of its captured environment.
    Closure { fun: Box<Type>, captures: Box<Type> },
    /// Fixed-size array. A size of `0` means the size is not known.
    Array { elem: Box<Type>, size: usize },
    Struct(Vec<(String, Type)>),
    Tuple(Vec<Type>),
    /// Nominal wrapper giving an aggregate a stable name.
    Alias { name: String, target: Box<Type> },
}

impl Type {
    pub fn function(ret: Type, args: Vec<Type>) -> Type {
        Type::Function {
            ret: Box::new(ret),
            args,
        }
    }

    pub fn array(elem: Type, size: usize) -> Type {
        Type::Array {
            elem: Box::new(elem),
            size,
        }
    }

    pub fn alias(name: impl Into<String>, target: Type) -> Type {
        Type::Alias {
            name: name.into(),
            target: Box::new(target),
        }
    }

    pub fn closure(fun: Type, captures: Type) -> Type {
        Type::Closure {
            fun: Box::new(fun),
            captures: Box::new(captures),
        }
    }

    pub fn is_type_var(&self) -> bool {
        matches!(self, Type::TypeVar(_))
    }

    /// Strip any number of `Alias` wrappers.
    pub fn strip_alias(&self) -> &Type {
        match self {
            Type::Alias { target, .. } => target.strip_alias(),
            other => other,
        }
    }

    /// View this type as something callable, returning `(ret, args)`.
    ///
    /// Looks through aliases, references and closures so that a closure
    /// value can be called like the function it wraps.
    pub fn as_callable(&self) -> Option<(&Type, &[Type])> {
        match self.strip_alias() {
            Type::Function { ret, args } => Some((ret, args)),
            Type::Closure { fun, .. } => fun.as_callable(),
            Type::Ref(inner) | Type::Pointer(inner) => inner.as_callable(),
            _ => None,
        }
    }

    /// Whether an unresolved `TypeVar` or `None` occurs anywhere inside.
    pub fn is_unresolved(&self) -> bool {
        match self {
            Type::None | Type::TypeVar(_) => true,
            Type::Void | Type::Float | Type::String => false,
            Type::Ref(inner) | Type::Pointer(inner) => inner.is_unresolved(),
            Type::Function { ret, args } => {
                ret.is_unresolved() || args.iter().any(Type::is_unresolved)
            }
            Type::Closure { fun, captures } => fun.is_unresolved() || captures.is_unresolved(),
            Type::Array { elem, .. } => elem.is_unresolved(),
            Type::Struct(fields) => fields.iter().any(|(_, t)| t.is_unresolved()),
            Type::Tuple(elems) => elems.iter().any(Type::is_unresolved),
            Type::Alias { target, .. } => target.is_unresolved(),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Type]) -> fmt::Result {
    for (i, t) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", t)?;
    }
    Ok(())
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::None => write!(f, "none"),
            Type::Void => write!(f, "void"),
            Type::Float => write!(f, "float"),
            Type::String => write!(f, "string"),
            Type::TypeVar(v) => write!(f, "?{}", v.0),
            Type::Ref(inner) => write!(f, "{}&", inner),
            Type::Pointer(inner) => write!(f, "{}*", inner),
            Type::Function { ret, args } => {
                write!(f, "(")?;
                write_joined(f, args)?;
                write!(f, ") -> {}", ret)
            }
            Type::Closure { fun, captures } => write!(f, "cls{{ {} , {} }}", fun, captures),
            Type::Array { elem, size } => write!(f, "[{} x {}]", elem, size),
            Type::Struct(fields) => {
                write!(f, "{{")?;
                for (i, (name, t)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", name, t)?;
                }
                write!(f, "}}")
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                write_joined(f, elems)?;
                write!(f, ")")
            }
            Type::Alias { name, .. } => write!(f, "{}", name),
        }
    }
}
