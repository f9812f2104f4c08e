//! mimium type checker.
//!
//! Assigns a [`Type`](mimium_common::Type) to every binding of a mimium
//! program by unification. Variables that remain unresolved once the whole
//! unit has been visited default to Float.
//!
//! # Architecture
//!
//! - [`unify`]: union-find unification with occurs check
//! - [`env`]: flat name-to-type environment owning the type-variable store
//! - [`builtins`]: the external function table
//! - [`recursive`]: pre-pass finding self-referential functions
//! - [`infer`]: the inference walk
//! - [`error`]: type errors and recoverable warnings
//! - [`diagnostics`]: ariadne rendering of type errors

pub mod builtins;
pub mod diagnostics;
pub mod env;
pub mod error;
pub mod infer;
pub mod recursive;
pub mod unify;

pub use env::TypeEnv;
pub use error::{TypeError, TypeWarning};
pub use infer::{infer, TypeInferer};
