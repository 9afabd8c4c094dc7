//! `__box_write` / `__box_flush` plumbing for minimal stdout support.

use bento_core::{Artifacts, BoxId, BoxTree, FnDecl, OnBox, OnBuild, Result};
use serde_json::json;

use crate::{import_status, scoped};

pub const WRITE_SIG: &str = "fn(i32 fd, const u8[size] buffer, usize size) -> errsize";
pub const FLUSH_SIG: &str = "fn(i32 fd) -> err";

/// Adds write and flush hooks to every box of a runtime, plus per-child
/// overrides in the parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteHook;

impl OnBox for WriteHook {
    fn name(&self) -> &str {
        "write"
    }

    fn on_box_parent(&self, tree: &mut BoxTree, parent: BoxId, child: BoxId) -> Result<()> {
        let child_name = tree.get(child).name.clone();
        let parent_name = tree.get(parent).name.clone();
        let write = FnDecl::parse(format!("__box_{child_name}_write"), WRITE_SIG)?
            .with_doc(format!("Override __box_write for {child_name}."));
        let flush = FnDecl::parse(format!("__box_{child_name}_flush"), FLUSH_SIG)?
            .with_doc(format!("Override __box_flush for {child_name}."));
        let node = tree.get_mut(parent);
        node.add_import(scoped(write, &parent_name, OnBox::name(self)).weak());
        node.add_import(scoped(flush, &parent_name, OnBox::name(self)).weak());
        Ok(())
    }

    fn on_box(&self, tree: &mut BoxTree, id: BoxId) -> Result<()> {
        let name = tree.get(id).name.clone();
        let component = OnBox::name(self);
        let node = tree.get_mut(id);
        for (fn_name, sig) in [("__box_write", WRITE_SIG), ("__box_flush", FLUSH_SIG)] {
            let import = FnDecl::parse(fn_name, sig)?
                .with_doc("Minimal stdout; behavior depends on the parent's implementation.");
            node.add_import(scoped(import, &name, component).weak());
            node.add_export(scoped(FnDecl::parse(fn_name, sig)?, &name, component).weak());
        }
        Ok(())
    }
}

impl OnBuild for WriteHook {
    fn name(&self) -> &str {
        "write"
    }

    fn on_build(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()> {
        artifacts.push(
            &tree.get(id).name,
            OnBuild::name(self),
            "write",
            json!({
                "write": import_status(tree, id, "__box_write"),
                "flush": import_status(tree, id, "__box_flush"),
            }),
        );
        Ok(())
    }
}
