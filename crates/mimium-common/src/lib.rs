//! Shared types for the mimium compiler.
//!
//! - [`span`]: byte-offset source spans and line/column lookup
//! - [`ty`]: the `Type` value every pipeline stage reads and writes

pub mod span;
pub mod ty;

pub use span::Span;
pub use ty::{Type, TypeVar};
