//! Function signature grammar for calls that cross a box boundary.
//!
//! A deliberately small, host-language-independent declaration language:
//! a handful of primitives, single-level pointers and arrays (optionally
//! sized by a sibling argument), and at most one return value.
//!
//! ## Modules
//!
//! - [`prim`]: Primitive types and their machine-word footprint
//! - [`arg`]: Argument / return declarations
//! - [`sig`]: Full signatures, validation and compatibility

pub mod arg;
pub mod error;
pub mod prim;
pub mod sig;

pub use arg::{parse_int, Arg, ArraySize, Modifiers};
pub use error::SigError;
pub use prim::{Prim, WORD_BITS};
pub use sig::{FnSig, MAX_ARG_WORDS};
