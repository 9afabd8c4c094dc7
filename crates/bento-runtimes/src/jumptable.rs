//! Jumptable section: a box's entry points, indexed by export ordinal.

use bento_core::{
    export_ordinals, Artifacts, BoxId, BoxTree, Mode, OnBox, OnBuild, Result, Section,
};
use serde_json::json;
use tracing::debug;

/// Bytes per table entry.
pub const ENTRY_SIZE: u32 = 4;

/// Reserves a read-only table with one slot for `__box_init` plus one per
/// export the box offers to others.
#[derive(Debug, Clone, Copy, Default)]
pub struct JumptableSection;

impl JumptableSection {
    fn entries(tree: &BoxTree, id: BoxId) -> u32 {
        let node = tree.get(id);
        let public = node
            .exports
            .iter()
            .filter(|e| e.scope.as_deref() != Some(node.name.as_str()))
            .count();
        1 + public as u32
    }
}

impl OnBox for JumptableSection {
    fn name(&self) -> &str {
        "jumptable"
    }

    fn on_box(&self, tree: &mut BoxTree, id: BoxId) -> Result<()> {
        let size = ENTRY_SIZE * Self::entries(tree, id);
        let node = tree.get_mut(id);
        debug!("box {}: jumptable of {size:#x} bytes", node.name);
        node.add_section(Section::new("jumptable", size, Mode::READ).with_align(ENTRY_SIZE)?);
        Ok(())
    }
}

impl OnBuild for JumptableSection {
    fn name(&self) -> &str {
        "jumptable"
    }

    fn on_build(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()> {
        let node = tree.get(id);
        let mut entries = vec!["__box_init".to_string()];
        if let Some(parent) = node.parent {
            entries.extend(
                export_ordinals(tree, id, Some(parent))
                    .into_iter()
                    .map(|(_, r)| tree.export(r).symbol().to_string()),
            );
        }
        let region = node
            .section("jumptable")
            .and_then(|s| s.memory.as_ref())
            .map(|m| m.region().to_string());
        artifacts.push(
            &node.name,
            OnBuild::name(self),
            "jumptable",
            json!({ "region": region, "entries": entries }),
        );
        Ok(())
    }
}
