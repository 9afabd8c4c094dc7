//! Built-in runtimes for bento.
//!
//! A runtime is a bundle of components that take part in the box, link and
//! build stages. This crate provides:
//!
//! - `system`: the root runtime. Publishes the shared error table.
//! - `jumptable`: boxes entered through a table of entry points, with
//!   abort and write hooks routed to the parent.
//! - `armv7m_mpu` / `armv8m_mpu`: jumptable boxes isolated by the MPU.
//!
//! [`registry`] returns a [`Registry`] knowing all of them plus `noop`.

pub mod abort;
pub mod error_table;
pub mod jumptable;
pub mod mpu;
pub mod write;

use bento_core::{BoxId, BoxTree, FnDecl, Registry, Result, Runtime};
use serde_json::json;

pub use abort::AbortHook;
pub use error_table::{ErrorCode, ErrorTable, ERRORS};
pub use jumptable::JumptableSection;
pub use mpu::{Descriptor, MpuArch, MpuRegions};
pub use write::WriteHook;

/// Restrict `decl` to links within `box_name` and tag it with the
/// component that declared it.
pub(crate) fn scoped(decl: FnDecl, box_name: &str, component: &str) -> FnDecl {
    decl.with_scope(box_name).with_source(component)
}

/// Link status of import `name` in `id`, for build artifacts.
///
/// `null` if the box has no such import.
pub(crate) fn import_status(tree: &BoxTree, id: BoxId, name: &str) -> serde_json::Value {
    let Some(import) = tree.get(id).import(name) else {
        return serde_json::Value::Null;
    };
    match import.link {
        Some(link) => json!({
            "linked": true,
            "box": tree.path(link.export.box_id),
            "symbol": tree.export(link.export).symbol(),
        }),
        None => json!({ "linked": false }),
    }
}

pub fn system() -> Runtime {
    let mut runtime = Runtime::new("system");
    runtime.hooks.register_on_build(Box::new(ErrorTable));
    runtime
}

pub fn jumptable() -> Runtime {
    let mut runtime = Runtime::new("jumptable");
    register_jumptable(&mut runtime);
    runtime
}

pub fn armv7m_mpu() -> Runtime {
    mpu_runtime(MpuArch::V7)
}

pub fn armv8m_mpu() -> Runtime {
    mpu_runtime(MpuArch::V8)
}

fn mpu_runtime(arch: MpuArch) -> Runtime {
    let mut runtime = Runtime::new(arch.name());
    register_jumptable(&mut runtime);
    let mpu = MpuRegions::new(arch);
    runtime.hooks.register_on_box(Box::new(mpu.clone()));
    runtime.hooks.register_on_build(Box::new(mpu));
    runtime
}

fn register_jumptable(runtime: &mut Runtime) {
    let hooks = &mut runtime.hooks;
    hooks.register_on_box(Box::new(AbortHook));
    hooks.register_on_box(Box::new(WriteHook));
    // after the hooks above, so their exports are counted
    hooks.register_on_box(Box::new(JumptableSection));
    hooks.register_on_build(Box::new(AbortHook));
    hooks.register_on_build(Box::new(WriteHook));
    hooks.register_on_build(Box::new(JumptableSection));
}

/// Every built-in runtime, plus `noop`.
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register("system", system)?;
    registry.register("jumptable", jumptable)?;
    registry.register("armv7m_mpu", armv7m_mpu)?;
    registry.register("armv8m_mpu", armv8m_mpu)?;
    Ok(registry)
}
