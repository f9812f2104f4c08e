//! Type environment.
//!
//! Names are globally unique by the time inference runs, so the environment
//! is a single flat map rather than a scope stack. It also owns the
//! type-variable store: a binding may mention type variables that are only
//! resolved later, and `find_type_var` reads their current state.

use mimium_common::{Span, Type, TypeVar};
use rustc_hash::FxHashMap;

use crate::error::{TypeError, TypeWarning};
use crate::unify::InferCtx;

/// Mapping from binding name to type, plus the type-variable store.
///
/// Entries are only ever added or overwritten, never removed. After
/// [`TypeEnv::replace_type_vars`] every entry is fully resolved.
pub struct TypeEnv {
    bindings: FxHashMap<String, Type>,
    ctx: InferCtx,
}

impl TypeEnv {
    /// Create an empty environment with an empty type-variable store.
    pub fn new() -> Self {
        TypeEnv {
            bindings: FxHashMap::default(),
            ctx: InferCtx::new(),
        }
    }

    /// Insert or overwrite a binding.
    pub fn insert(&mut self, name: String, ty: Type) {
        self.bindings.insert(name, ty);
    }

    /// The type stored for `name`, as stored (variables not followed).
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// The type of `name` with every type variable followed.
    pub fn lookup(&mut self, name: &str) -> Option<Type> {
        let ty = self.bindings.get(name)?.clone();
        Some(self.ctx.resolve(ty))
    }

    /// Binding names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    // ── Type variables ──────────────────────────────────────────────────

    pub fn fresh_var(&mut self) -> Type {
        self.ctx.fresh_var()
    }

    /// Current state of type variable `i`: its binding if it has one,
    /// otherwise the canonical variable of its class.
    pub fn find_type_var(&mut self, var: TypeVar) -> Type {
        self.ctx.resolve(Type::TypeVar(var))
    }

    pub fn resolve(&mut self, ty: Type) -> Type {
        self.ctx.resolve(ty)
    }

    pub fn unify(&mut self, a: Type, b: Type, span: Span) -> Result<(), TypeError> {
        self.ctx.unify(a, b, span)
    }

    pub fn warnings(&self) -> &[TypeWarning] {
        &self.ctx.warnings
    }

    // ── Finalization ────────────────────────────────────────────────────

    /// Resolve every binding, defaulting unresolved type variables to Float.
    ///
    /// Entries are processed in name order so the outcome is independent of
    /// hash-map iteration order.
    pub fn replace_type_vars(&mut self) {
        let mut names: Vec<String> = self.bindings.keys().cloned().collect();
        names.sort_unstable();
        for name in names {
            if let Some(ty) = self.bindings.get(&name).cloned() {
                let resolved = self.ctx.resolve_defaulted(ty);
                self.bindings.insert(name, resolved);
            }
        }
        log::debug!(
            "type environment finalized: {} bindings, {} type variables",
            self.bindings.len(),
            self.ctx.var_count()
        );
    }

    /// Render the environment as `name : type` lines in name order.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for name in self.names() {
            if let Some(ty) = self.bindings.get(name) {
                out.push_str(&format!("{} : {}\n", name, ty));
            }
        }
        out
    }
}

impl Default for TypeEnv {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_follows_type_vars() {
        let mut env = TypeEnv::new();
        let v = env.fresh_var();
        env.insert("x".into(), v.clone());
        assert_eq!(env.lookup("x"), Some(v.clone()));
        env.unify(v, Type::String, Span::default()).unwrap();
        assert_eq!(env.lookup("x"), Some(Type::String));
        assert_eq!(env.lookup("y"), None);
    }

    #[test]
    fn finalization_defaults_to_float() {
        let mut env = TypeEnv::new();
        let v = env.fresh_var();
        env.insert("a".into(), v.clone());
        env.insert("b".into(), Type::function(v, vec![]));
        env.replace_type_vars();
        assert_eq!(env.get("a"), Some(&Type::Float));
        assert_eq!(env.get("b"), Some(&Type::function(Type::Float, vec![])));
        assert_eq!(env.find_type_var(TypeVar(0)), Type::Float);
    }

    #[test]
    fn dump_is_sorted() {
        let mut env = TypeEnv::new();
        env.insert("b".into(), Type::String);
        env.insert("a".into(), Type::Float);
        insta::assert_snapshot!(env.dump().trim_end(), @r"
        a : float
        b : string
        ");
    }
}
