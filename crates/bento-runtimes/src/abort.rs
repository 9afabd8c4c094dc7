//! `__box_abort` plumbing.
//!
//! Each box gets a weak `__box_abort` import bound to a weak plug export in
//! the same box, which the runtime routes to the parent's optional
//! `__box_<box>_abort` handler.

use bento_core::{Artifacts, BoxId, BoxTree, FnDecl, OnBox, OnBuild, Result};
use serde_json::json;

use crate::{import_status, scoped};

pub const ABORT_SIG: &str = "fn(err) -> noreturn";

/// Adds the abort hook to every box of a runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct AbortHook;

impl OnBox for AbortHook {
    fn name(&self) -> &str {
        "abort"
    }

    fn on_box_parent(&self, tree: &mut BoxTree, parent: BoxId, child: BoxId) -> Result<()> {
        let child_name = tree.get(child).name.clone();
        let parent_name = tree.get(parent).name.clone();
        let decl = FnDecl::parse(format!("__box_{child_name}_abort"), "fn(err err) -> noreturn")?
            .with_doc(format!(
                "Called when {child_name} aborts, with the error code it aborted with."
            ));
        tree.get_mut(parent)
            .add_import(scoped(decl, &parent_name, OnBox::name(self)).weak());
        Ok(())
    }

    fn on_box(&self, tree: &mut BoxTree, id: BoxId) -> Result<()> {
        let name = tree.get(id).name.clone();
        let import = FnDecl::parse("__box_abort", ABORT_SIG)?.with_doc(
            "Terminate the box when execution cannot continue. Must not return.",
        );
        let plug = FnDecl::parse("__box_abort", ABORT_SIG)?;
        let component = OnBox::name(self);
        let node = tree.get_mut(id);
        node.add_import(scoped(import, &name, component).weak());
        node.add_export(scoped(plug, &name, component).weak());
        Ok(())
    }
}

impl OnBuild for AbortHook {
    fn name(&self) -> &str {
        "abort"
    }

    fn on_build(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()> {
        let status = import_status(tree, id, "__box_abort");
        artifacts.push(
            &tree.get(id).name,
            OnBuild::name(self),
            "abort",
            json!({ "hook": status }),
        );
        Ok(())
    }
}
