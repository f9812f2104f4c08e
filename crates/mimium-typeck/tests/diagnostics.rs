//! Rendering tests for type error diagnostics.
//!
//! Errors are constructed with spans into a small source string and rendered
//! through ariadne; the assertions check the pieces a reader relies on
//! (error code, message, label) rather than exact layout.

use mimium_common::{Span, Type};
use mimium_typeck::diagnostics::render_diagnostic;
use mimium_typeck::TypeError;

// ── Helpers ────────────────────────────────────────────────────────────

fn render(err: &TypeError, src: &str) -> String {
    render_diagnostic(err, src, "test.mmm")
}

// ── Diagnostic Tests ───────────────────────────────────────────────────

#[test]
fn diag_unbound_variable() {
    let src = "a = nope\n";
    let err = TypeError::UnboundVariable {
        name: "nope".into(),
        span: Span::new(4, 8),
    };
    let out = render(&err, src);
    assert!(out.contains("E0003"), "{}", out);
    assert!(out.contains("unbound variable `nope`"), "{}", out);
    assert!(out.contains("not found in this scope"), "{}", out);
    assert!(out.contains("a = nope"), "{}", out);
}

#[test]
fn diag_mismatch_shows_both_types() {
    let src = "s = \"a\" + 1\n";
    let err = TypeError::Mismatch {
        expected: Type::String,
        found: Type::Float,
        span: Span::new(4, 11),
    };
    let out = render(&err, src);
    assert!(out.contains("E0001"), "{}", out);
    assert!(out.contains("expected `string`, found `float`"), "{}", out);
}

#[test]
fn diag_arity_mismatch_has_help() {
    let src = "fn f(x, y) { x }\nr = f(1)\n";
    let err = TypeError::ArityMismatch {
        expected: 2,
        found: 1,
        span: Span::new(21, 25),
    };
    let out = render(&err, src);
    assert!(out.contains("E0002"), "{}", out);
    assert!(out.contains("missing 1 argument(s)"), "{}", out);
}

#[test]
fn diag_missing_return_type() {
    let src = "fn fact(n) { n * fact(n - 1) }\n";
    let err = TypeError::MissingReturnType {
        name: "fact".into(),
        span: Span::new(0, 30),
    };
    let out = render(&err, src);
    assert!(out.contains("E0005"), "{}", out);
    assert!(
        out.contains("recursive function `fact` needs an explicit return type"),
        "{}",
        out
    );
    assert!(out.contains("-> float"), "{}", out);
}

#[test]
fn diag_empty_span_at_end_of_source() {
    let src = "a = self";
    let err = TypeError::SelfOutsideFunction {
        span: Span::new(8, 8),
    };
    let out = render(&err, src);
    assert!(out.contains("E0009"), "{}", out);
    assert!(out.contains("`self` can only be used inside a function"), "{}", out);
}
