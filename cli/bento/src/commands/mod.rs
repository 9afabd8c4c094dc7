//! CLI command implementations.

pub mod boxes;
pub mod build;
pub mod errors;
pub mod links;
pub mod runtimes;
