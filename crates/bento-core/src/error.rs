//! Box tree error types.

use bento_sig::SigError;

/// Errors raised while configuring, boxing, linking or building a box tree.
///
/// Every variant is fatal; the message carries enough context to fix the
/// recipe without rerunning under a debugger.
#[derive(Debug, thiserror::Error)]
pub enum BentoError {
    /// Malformed signature.
    #[error(transparent)]
    Sig(#[from] SigError),

    /// Malformed region, mode, memory or section string.
    #[error("invalid {what} {input:?}: {detail}")]
    Parse {
        what: &'static str,
        input: String,
        detail: String,
    },

    /// A memory has no room left for a request.
    #[error(
        "memory {memory}: cannot consume {requested:#x} bytes aligned to {align:#x}, \
         {available:#x} bytes remaining"
    )]
    Exhausted {
        memory: String,
        requested: u32,
        align: u32,
        available: u32,
    },

    /// Allocation from a memory that has no address yet.
    #[error("memory {memory} has no address")]
    Unplaced { memory: String },

    /// No memory of a box satisfies a request.
    #[error("box {box_name}: no memory satisfies {request}\nmemory usage:\n{usage}")]
    NoMemory {
        box_name: String,
        request: String,
        usage: String,
    },

    /// Two non-idempotent sibling boxes were placed on top of each other.
    #[error("overlapping boxes: {first} ({first_region}) overlaps {second} ({second_region})")]
    Overlap {
        first: String,
        second: String,
        first_region: String,
        second_region: String,
    },

    /// Same-named imports in one box disagree on their signature.
    #[error("incompatible imports in box {box_name}:\n  {first}\n  {second}")]
    IncompatibleImports {
        box_name: String,
        first: String,
        second: String,
    },

    /// Same-named exports in one box disagree on their signature.
    #[error("incompatible exports in box {box_name}:\n  {first}\n  {second}")]
    IncompatibleExports {
        box_name: String,
        first: String,
        second: String,
    },

    /// More than one non-weak export of the same name in one box.
    #[error("conflicting exports in box {box_name}:\n  {first}\n  {second}")]
    ConflictingExports {
        box_name: String,
        first: String,
        second: String,
    },

    /// An import found a same-named export whose signature does not match.
    #[error("incompatible import/export:\n  {import}\n  {export}")]
    IncompatibleLink { import: String, export: String },

    /// A non-weak import with no export to bind to.
    #[error("unresolved import {import}")]
    Unresolved { import: String },

    /// An import with several equally good exports to bind to.
    #[error("ambiguous import/export {import}, candidates:\n{candidates}")]
    Ambiguous { import: String, candidates: String },

    /// A declared scope does not name a reachable box.
    #[error("box {box_name}: scope {scope:?} of {decl} does not name the box, its parent or a child")]
    Scope {
        box_name: String,
        decl: String,
        scope: String,
    },

    /// A declared scope names more than one reachable box.
    #[error("box {box_name}: scope {scope:?} of {decl} names more than one of the box, its parent and its children")]
    AmbiguousScope {
        box_name: String,
        decl: String,
        scope: String,
    },

    /// Recipe names a runtime the registry does not know.
    #[error("unknown runtime {name:?}, available: {available}")]
    UnknownRuntime { name: String, available: String },

    /// A runtime name was registered twice.
    #[error("runtime {name:?} is already registered")]
    DuplicateRuntime { name: String },

    /// A runtime component rejected the tree.
    #[error("runtime {runtime}: {detail}")]
    Runtime { runtime: String, detail: String },

    /// A lifecycle stage was run out of order.
    #[error("cannot run {stage}: {detail}")]
    StageOrder { stage: &'static str, detail: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for box tree operations.
pub type Result<T> = std::result::Result<T, BentoError>;
