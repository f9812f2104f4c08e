//! Recursion pre-pass.
//!
//! A function bound to a name is recursive when its own body mentions that
//! name. Inference needs to know this before it visits the body: a recursive
//! function must declare its return type.

use mimium_ast::visit::{self, Visitor};
use mimium_ast::{AssignTarget, Block, Expr, Lambda, Statement};
use rustc_hash::FxHashSet;

/// Names of all functions in `block` (at any depth) that refer to
/// themselves.
pub fn find_recursive(block: &Block) -> FxHashSet<String> {
    let mut finder = RecursionFinder {
        found: FxHashSet::default(),
    };
    finder.visit_block(block);
    finder.found
}

struct RecursionFinder {
    found: FxHashSet<String>,
}

impl RecursionFinder {
    fn check(&mut self, name: &str, fun: &Lambda) {
        let mut refs = NameRefs { name, hit: false };
        refs.visit_block(&fun.body);
        if refs.hit {
            log::debug!("`{}` is recursive", name);
            self.found.insert(name.to_string());
        }
    }
}

impl Visitor for RecursionFinder {
    fn visit_stmt(&mut self, stmt: &Statement) {
        match stmt {
            Statement::Fdef { name, fun } => self.check(&name.name, fun),
            Statement::Assign {
                target: AssignTarget::Var(lvar),
                expr: Expr::Lambda(fun),
                ..
            } => self.check(&lvar.name, fun),
            _ => {}
        }
        visit::walk_stmt(self, stmt);
    }
}

/// Looks for any read of `name`.
struct NameRefs<'a> {
    name: &'a str,
    hit: bool,
}

impl Visitor for NameRefs<'_> {
    fn visit_expr(&mut self, expr: &Expr) {
        if self.hit {
            return;
        }
        if let Expr::Symbol { name, .. } = expr {
            if name == self.name {
                self.hit = true;
                return;
            }
        }
        visit::walk_expr(self, expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mimium_ast::build::*;
    use mimium_ast::OpId;

    #[test]
    fn detects_direct_recursion() {
        // fn fact(n) { if (n) { n * fact(n - 1) } else { 1 } }
        let body = block(
            vec![],
            Some(if_expr(
                sym("n"),
                block(
                    vec![],
                    Some(op(
                        OpId::Mul,
                        sym("n"),
                        call_named("fact", vec![op(OpId::Sub, sym("n"), num(1.0))]),
                    )),
                ),
                Some(block(vec![], Some(num(1.0)))),
            )),
        );
        let prog = block(vec![fdef("fact", &["n"], None, body)], None);
        let rec = find_recursive(&prog);
        assert!(rec.contains("fact"));
        assert_eq!(rec.len(), 1);
    }

    #[test]
    fn lambda_assignment_and_nested_definitions() {
        let inner = fdef("g", &[], None, block(vec![], Some(call_named("g", vec![]))));
        let outer = assign(
            "h",
            lambda(&["x"], block(vec![inner], Some(sym("x")))),
        );
        let rec = find_recursive(&block(vec![outer], None));
        assert!(rec.contains("g"));
        assert!(!rec.contains("h"));
    }
}
