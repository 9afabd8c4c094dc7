//! Memory partitioning and cross-box linking for bento boxes.
//!
//! A system is a tree of boxes, each an isolated compartment with its own
//! memory, sections and function imports/exports. Building a system runs
//! three stages: `boxes` places memory top-down, `link` binds imports to
//! exports within each box's neighborhood, and `build` hands the resolved
//! tree to runtime components.
//!
//! ## Modules
//!
//! - [`region`]: Address intervals and interval subtraction
//! - [`mode`]: Memory access modes
//! - [`memory`]: Mode-tagged memories and best-fit selection
//! - [`section`]: Per-box memory requests
//! - [`decl`]: Imports, exports and links
//! - [`tree`]: The box arena
//! - [`config`]: TOML recipes
//! - [`hooks`]: Lifecycle observers
//! - [`runtime`]: Runtimes and the runtime registry
//! - [`system`]: Lifecycle driver

mod boxing;
pub mod config;
pub mod decl;
pub mod error;
pub mod hooks;
mod linker;
pub mod memory;
pub mod mode;
pub mod ordinal;
pub mod region;
pub mod runtime;
pub mod section;
pub mod system;
pub mod tree;

pub use bento_sig as sig;

pub use boxing::{BoxReport, Warning};
pub use config::BoxConfig;
pub use decl::{DeclRef, Export, FnDecl, Import, Link};
pub use error::{BentoError, Result};
pub use hooks::{Artifact, Artifacts, Hooks, OnBox, OnBuild, OnLink};
pub use memory::Memory;
pub use mode::Mode;
pub use ordinal::{export_ordinals, import_ordinals};
pub use region::Region;
pub use runtime::{Registry, Runtime, RuntimeCtor};
pub use section::Section;
pub use system::{Stage, System};
pub use tree::{BoxId, BoxNode, BoxTree};
