//! Abstract syntax tree for mimium.
//!
//! The parser produces one root [`Block`] per compilation unit. Every bound
//! identifier already carries a globally unique name (alpha conversion runs
//! before this tree reaches the type checker), so later stages can key their
//! tables by plain strings.
//!
//! The tree is plain owned data: each node exclusively owns its children.

pub mod build;
mod expr;
mod stmt;
pub mod visit;

pub use expr::{Expr, Fcall, If, Lambda, Lvar, OpId, Time};
pub use stmt::{AssignTarget, Block, Statement};
