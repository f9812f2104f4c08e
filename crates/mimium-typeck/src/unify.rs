//! Unification engine.
//!
//! Type variables live in an `ena` union-find table. Each equivalence class
//! carries its binding (if any) and the lowest variable index in the class,
//! which is used as the canonical representative. Merging two classes always
//! keeps the lower index, so the canonical variable does not depend on the
//! order in which constraints were visited.

use ena::unify::{InPlaceUnificationTable, NoError, UnifyKey, UnifyValue};
use mimium_common::{Span, Type, TypeVar};

use crate::error::{TypeError, TypeWarning};

/// Table key for a type variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
struct TvKey(u32);

impl From<TypeVar> for TvKey {
    fn from(v: TypeVar) -> Self {
        TvKey(v.0)
    }
}

/// Value stored per equivalence class.
#[derive(Clone, Debug, PartialEq)]
struct VarValue {
    bound: Option<Type>,
    /// Lowest variable index in the class.
    rep: u32,
}

impl UnifyValue for VarValue {
    type Error = NoError;

    fn unify_values(a: &Self, b: &Self) -> Result<Self, NoError> {
        Ok(VarValue {
            bound: a.bound.clone().or_else(|| b.bound.clone()),
            rep: a.rep.min(b.rep),
        })
    }
}

impl UnifyKey for TvKey {
    type Value = VarValue;

    fn index(&self) -> u32 {
        self.0
    }

    fn from_index(u: u32) -> Self {
        TvKey(u)
    }

    fn tag() -> &'static str {
        "TvKey"
    }
}

/// The inference context: owns the unification table and the warnings
/// recorded while unifying.
pub struct InferCtx {
    table: InPlaceUnificationTable<TvKey>,
    var_count: u32,
    pub warnings: Vec<TypeWarning>,
}

impl InferCtx {
    pub fn new() -> Self {
        InferCtx {
            table: InPlaceUnificationTable::new(),
            var_count: 0,
            warnings: Vec::new(),
        }
    }

    // ── Type Variable Creation ──────────────────────────────────────────

    /// Create a fresh, unbound type variable.
    pub fn fresh_var(&mut self) -> Type {
        let index = self.var_count;
        let key = self.table.new_key(VarValue {
            bound: None,
            rep: index,
        });
        debug_assert_eq!(key.0, index);
        self.var_count += 1;
        Type::TypeVar(TypeVar(index))
    }

    /// Number of type variables created so far.
    pub fn var_count(&self) -> u32 {
        self.var_count
    }

    // ── Resolution ──────────────────────────────────────────────────────

    /// Resolve a type through the table, all the way down.
    ///
    /// Bound variables are replaced by their binding; unbound variables are
    /// replaced by the canonical (lowest-index) variable of their class.
    pub fn resolve(&mut self, ty: Type) -> Type {
        match ty {
            Type::TypeVar(v) => {
                let value = self.table.probe_value(TvKey::from(v));
                match value.bound {
                    Some(inner) => self.resolve(inner),
                    None => Type::TypeVar(TypeVar(value.rep)),
                }
            }
            Type::Ref(inner) => Type::Ref(Box::new(self.resolve(*inner))),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve(*inner))),
            Type::Function { ret, args } => {
                let args = args.into_iter().map(|a| self.resolve(a)).collect();
                let ret = self.resolve(*ret);
                Type::function(ret, args)
            }
            Type::Closure { fun, captures } => {
                let fun = self.resolve(*fun);
                let captures = self.resolve(*captures);
                Type::closure(fun, captures)
            }
            Type::Array { elem, size } => Type::array(self.resolve(*elem), size),
            Type::Struct(fields) => Type::Struct(
                fields
                    .into_iter()
                    .map(|(n, t)| (n, self.resolve(t)))
                    .collect(),
            ),
            Type::Tuple(elems) => {
                Type::Tuple(elems.into_iter().map(|e| self.resolve(e)).collect())
            }
            Type::Alias { name, target } => Type::alias(name, self.resolve(*target)),
            other => other,
        }
    }

    /// Resolve a type and default every variable still unbound to Float.
    ///
    /// The default is written back into the table, so every other type
    /// mentioning the same variable resolves to Float afterwards.
    pub fn resolve_defaulted(&mut self, ty: Type) -> Type {
        match self.resolve(ty) {
            Type::TypeVar(v) => {
                self.table.union_value(TvKey::from(v), VarValue::bound(Type::Float));
                Type::Float
            }
            Type::Ref(inner) => Type::Ref(Box::new(self.resolve_defaulted(*inner))),
            Type::Pointer(inner) => Type::Pointer(Box::new(self.resolve_defaulted(*inner))),
            Type::Function { ret, args } => {
                let args = args
                    .into_iter()
                    .map(|a| self.resolve_defaulted(a))
                    .collect();
                let ret = self.resolve_defaulted(*ret);
                Type::function(ret, args)
            }
            Type::Closure { fun, captures } => {
                let fun = self.resolve_defaulted(*fun);
                let captures = self.resolve_defaulted(*captures);
                Type::closure(fun, captures)
            }
            Type::Array { elem, size } => Type::array(self.resolve_defaulted(*elem), size),
            Type::Struct(fields) => Type::Struct(
                fields
                    .into_iter()
                    .map(|(n, t)| (n, self.resolve_defaulted(t)))
                    .collect(),
            ),
            Type::Tuple(elems) => Type::Tuple(
                elems
                    .into_iter()
                    .map(|e| self.resolve_defaulted(e))
                    .collect(),
            ),
            Type::Alias { name, target } => Type::alias(name, self.resolve_defaulted(*target)),
            Type::None => Type::Float,
            other => other,
        }
    }

    // ── Occurs Check ────────────────────────────────────────────────────

    /// Whether `var` (or any variable in its class) occurs inside `ty`.
    fn occurs_in(&mut self, var: TypeVar, ty: &Type) -> bool {
        match ty {
            Type::TypeVar(v) => {
                if self.table.find(TvKey::from(*v)) == self.table.find(TvKey::from(var)) {
                    return true;
                }
                match self.table.probe_value(TvKey::from(*v)).bound {
                    Some(inner) => self.occurs_in(var, &inner),
                    None => false,
                }
            }
            Type::None | Type::Void | Type::Float | Type::String => false,
            Type::Ref(inner) | Type::Pointer(inner) => self.occurs_in(var, inner),
            Type::Function { ret, args } => {
                args.iter().any(|a| self.occurs_in(var, a)) || self.occurs_in(var, ret)
            }
            Type::Closure { fun, captures } => {
                self.occurs_in(var, fun) || self.occurs_in(var, captures)
            }
            Type::Array { elem, .. } => self.occurs_in(var, elem),
            Type::Struct(fields) => fields.iter().any(|(_, t)| self.occurs_in(var, t)),
            Type::Tuple(elems) => elems.iter().any(|e| self.occurs_in(var, e)),
            Type::Alias { target, .. } => self.occurs_in(var, target),
        }
    }

    // ── Unification ─────────────────────────────────────────────────────

    /// Unify two types, making them equal.
    ///
    /// An occurs-check failure is not an error: it is recorded as a
    /// [`TypeWarning::TypeLoop`] and the variable is bound to Float.
    pub fn unify(&mut self, a: Type, b: Type, span: Span) -> Result<(), TypeError> {
        let a = self.resolve(a);
        let b = self.resolve(b);

        match (a, b) {
            (Type::TypeVar(v1), Type::TypeVar(v2)) if v1 == v2 => Ok(()),

            (Type::TypeVar(v1), Type::TypeVar(v2)) => {
                self.table.union(TvKey::from(v1), TvKey::from(v2));
                Ok(())
            }

            (Type::TypeVar(v), ty) | (ty, Type::TypeVar(v)) => {
                if self.occurs_in(v, &ty) {
                    let warning = TypeWarning::TypeLoop { var: v, ty };
                    log::warn!("{}", warning);
                    self.warnings.push(warning);
                    self.table
                        .union_value(TvKey::from(v), VarValue::bound(Type::Float));
                } else {
                    self.table.union_value(TvKey::from(v), VarValue::bound(ty));
                }
                Ok(())
            }

            // A missing annotation accepts anything.
            (Type::None, _) | (_, Type::None) => Ok(()),

            (Type::Void, Type::Void) | (Type::Float, Type::Float) | (Type::String, Type::String) => {
                Ok(())
            }

            (Type::Ref(a), Type::Ref(b)) | (Type::Pointer(a), Type::Pointer(b)) => {
                self.unify(*a, *b, span)
            }

            (
                Type::Function {
                    ret: r1,
                    args: p1,
                },
                Type::Function {
                    ret: r2,
                    args: p2,
                },
            ) => {
                if p1.len() != p2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: p1.len(),
                        found: p2.len(),
                        span,
                    });
                }
                for (a, b) in p1.into_iter().zip(p2) {
                    self.unify(a, b, span)?;
                }
                self.unify(*r1, *r2, span)
            }

            (
                Type::Closure {
                    fun: f1,
                    captures: c1,
                },
                Type::Closure {
                    fun: f2,
                    captures: c2,
                },
            ) => {
                self.unify(*f1, *f2, span)?;
                self.unify(*c1, *c2, span)
            }

            (Type::Array { elem: e1, size: s1 }, Type::Array { elem: e2, size: s2 }) => {
                // Size 0 is "not known yet" and matches any size.
                if s1 != 0 && s2 != 0 && s1 != s2 {
                    return Err(TypeError::Mismatch {
                        expected: Type::array(*e1, s1),
                        found: Type::array(*e2, s2),
                        span,
                    });
                }
                self.unify(*e1, *e2, span)
            }

            (Type::Tuple(e1), Type::Tuple(e2)) => {
                if e1.len() != e2.len() {
                    return Err(TypeError::ArityMismatch {
                        expected: e1.len(),
                        found: e2.len(),
                        span,
                    });
                }
                for (a, b) in e1.into_iter().zip(e2) {
                    self.unify(a, b, span)?;
                }
                Ok(())
            }

            (Type::Struct(f1), Type::Struct(f2)) => {
                let same_shape = f1.len() == f2.len()
                    && f1.iter().zip(&f2).all(|((n1, _), (n2, _))| n1 == n2);
                if !same_shape {
                    return Err(TypeError::Mismatch {
                        expected: Type::Struct(f1),
                        found: Type::Struct(f2),
                        span,
                    });
                }
                for ((_, a), (_, b)) in f1.into_iter().zip(f2) {
                    self.unify(a, b, span)?;
                }
                Ok(())
            }

            (
                Type::Alias {
                    name: n1,
                    target: t1,
                },
                Type::Alias {
                    name: n2,
                    target: t2,
                },
            ) => {
                if n1 != n2 {
                    return Err(TypeError::Mismatch {
                        expected: Type::alias(n1, *t1),
                        found: Type::alias(n2, *t2),
                        span,
                    });
                }
                self.unify(*t1, *t2, span)
            }

            (Type::Alias { target, .. }, other) | (other, Type::Alias { target, .. }) => {
                self.unify(*target, other, span)
            }

            (a, b) => Err(TypeError::Mismatch {
                expected: a,
                found: b,
                span,
            }),
        }
    }
}

impl VarValue {
    fn bound(ty: Type) -> Self {
        VarValue {
            bound: Some(ty),
            rep: u32::MAX,
        }
    }
}

impl Default for InferCtx {
    fn default() -> Self {
        Self::new()
    }
}
