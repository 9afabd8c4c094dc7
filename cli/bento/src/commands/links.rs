//! `bento links`: how every import was resolved.

use std::path::Path;

use anyhow::Result;
use bento_core::{DeclRef, System};

use crate::recipe;

pub fn run(path: &Path) -> Result<()> {
    let mut system = recipe::load(path)?;
    system.boxes()?;
    system.link()?;
    print!("{}", render(&system));
    Ok(())
}

pub fn render(system: &System) -> String {
    let tree = system.tree();
    let mut out = String::new();
    for id in tree.preorder() {
        let node = tree.get(id);
        out.push_str(&format!("box {}\n", tree.path(id)));
        for (index, import) in node.imports.iter().enumerate() {
            let r = DeclRef { box_id: id, index };
            let target = match import.link {
                Some(link) => format!(
                    "{}.{}",
                    tree.path(link.export.box_id),
                    tree.export(link.export).symbol()
                ),
                None => "(unlinked)".to_string(),
            };
            out.push_str(&format!("  {} -> {target}\n", tree.describe_import(r)));
        }
        for (index, export) in node.exports.iter().enumerate() {
            if export.links.is_empty() {
                continue;
            }
            let r = DeclRef { box_id: id, index };
            let users: Vec<_> = export
                .links
                .iter()
                .map(|l| tree.path(l.import.box_id))
                .collect();
            out.push_str(&format!("  {} <- {}\n", tree.describe_export(r), users.join(", ")));
        }
    }
    out
}
