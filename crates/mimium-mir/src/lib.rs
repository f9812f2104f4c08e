//! Mid-level IR for mimium.
//!
//! A typed program is lowered to a K-normalized instruction tree
//! ([`lower`]), closure-converted so every call site knows how it reaches its
//! callee ([`closure`]), and annotated with the memory layout of stateful
//! functions ([`memobjs`]).
//!
//! All values live in one arena inside [`Mir`]; see [`value`].

pub mod closure;
pub mod error;
pub mod lower;
pub mod memobjs;
mod print;
pub mod value;

pub use closure::{convert_closures, ClosureConverter};
pub use error::MirError;
pub use lower::{generate, MirGenerator};
pub use memobjs::{collect_memory_objects, FunObjTree, MemoryObjsCollector};
pub use value::{
    Block, FcallKind, FieldIndex, Instruction, Mir, ValueData, ValueId, ValueKind,
};
