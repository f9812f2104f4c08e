//! Ariadne-based rendering of type errors.
//!
//! Output is colorless so it stays stable in tests. Each report has an error
//! code, a one-line message, a label on the offending span and, where there
//! is an obvious fix, a help line.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::error::TypeError;

// ── Error Codes ────────────────────────────────────────────────────────

fn error_code(err: &TypeError) -> &'static str {
    match err {
        TypeError::Mismatch { .. } => "E0001",
        TypeError::ArityMismatch { .. } => "E0002",
        TypeError::UnboundVariable { .. } => "E0003",
        TypeError::NotAFunction { .. } => "E0004",
        TypeError::MissingReturnType { .. } => "E0005",
        TypeError::NotIndexable { .. } => "E0006",
        TypeError::NoSuchField { .. } | TypeError::NotAStruct { .. } => "E0007",
        TypeError::NestedTime { .. } => "E0008",
        TypeError::SelfOutsideFunction { .. } => "E0009",
    }
}

fn label_message(err: &TypeError) -> String {
    match err {
        TypeError::Mismatch {
            expected, found, ..
        } => format!("expected {}, found {}", expected, found),
        TypeError::ArityMismatch { expected, .. } => {
            format!("expected {} argument(s)", expected)
        }
        TypeError::UnboundVariable { .. } => "not found in this scope".to_string(),
        TypeError::NotAFunction { ty, .. } => format!("this has type {}", ty),
        TypeError::MissingReturnType { .. } => "calls itself".to_string(),
        TypeError::NotIndexable { ty, .. } => format!("this has type {}", ty),
        TypeError::NoSuchField { field, .. } => format!("unknown field `{}`", field),
        TypeError::NotAStruct { ty, .. } => format!("this has type {}", ty),
        TypeError::NestedTime { .. } => "time given by another timed call".to_string(),
        TypeError::SelfOutsideFunction { .. } => "used here".to_string(),
    }
}

fn help(err: &TypeError) -> Option<String> {
    match err {
        TypeError::ArityMismatch {
            expected, found, ..
        } => Some(if expected > found {
            format!("missing {} argument(s)", expected - found)
        } else {
            format!("{} extra argument(s)", found - expected)
        }),
        TypeError::MissingReturnType { name, .. } => Some(format!(
            "annotate the return type: `fn {}(...) -> float`",
            name
        )),
        TypeError::SelfOutsideFunction { .. } => {
            Some("`self` refers to the previous output of a function".to_string())
        }
        _ => None,
    }
}

// ── Main Rendering Function ────────────────────────────────────────────

/// Render a type error into a formatted diagnostic string.
pub fn render_diagnostic(error: &TypeError, source: &str, filename: &str) -> String {
    let config = Config::default().with_color(false);
    let source_len = source.len();

    // Clamp to the source and make sure the span is non-empty.
    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        if s < e {
            s..e
        } else if s < source_len {
            s..s + 1
        } else {
            source_len.saturating_sub(1)..source_len
        }
    };

    let span = clamp(error.span().to_range());
    let mut builder = Report::build(ReportKind::Error, span.clone())
        .with_code(error_code(error))
        .with_message(error.to_string())
        .with_config(config)
        .with_label(
            Label::new(span)
                .with_message(label_message(error))
                .with_color(Color::Red),
        );
    if let Some(h) = help(error) {
        builder.set_help(h);
    }
    let report = builder.finish();

    let mut buf = Vec::new();
    if report.write(Source::from(source), &mut buf).is_err() {
        return format!("{}: {}", filename, error);
    }
    String::from_utf8(buf).unwrap_or_else(|_| format!("{}: {}", filename, error))
}
