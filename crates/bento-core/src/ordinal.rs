//! Dispatch ordinals.
//!
//! Code generators turn imports, exports and child boxes into table
//! indices. Ordinals are dense and sorted by name so that identical recipes
//! always produce identical tables.

use std::collections::BTreeMap;

use crate::decl::DeclRef;
use crate::tree::{BoxId, BoxTree};

/// Assign ordinals to linked imports, linked exports and child boxes.
pub(crate) fn assign(tree: &mut BoxTree) {
    let ids: Vec<BoxId> = tree.ids().collect();
    for id in ids {
        let imports = sorted(tree.get(id).imports.iter().map(|i| (&i.name, i.link.is_some())));
        let exports = sorted(tree.get(id).exports.iter().map(|e| (&e.name, !e.links.is_empty())));

        let mut by_runtime: BTreeMap<String, Vec<(String, BoxId)>> = BTreeMap::new();
        for &child in &tree.get(id).children {
            let node = tree.get(child);
            by_runtime
                .entry(node.runtime.clone())
                .or_default()
                .push((node.name.clone(), child));
        }

        let node = tree.get_mut(id);
        for (ordinal, index) in imports.into_iter().enumerate() {
            node.imports[index].ordinal = Some(ordinal);
        }
        for (ordinal, index) in exports.into_iter().enumerate() {
            node.exports[index].ordinal = Some(ordinal);
        }
        for mut siblings in by_runtime.into_values() {
            siblings.sort();
            for (ordinal, (_, child)) in siblings.into_iter().enumerate() {
                // 0 addresses the parent
                tree.get_mut(child).ordinal = Some(ordinal + 1);
            }
        }
    }
}

/// Indices of the entries that qualify, sorted by name.
fn sorted<'a>(entries: impl Iterator<Item = (&'a String, bool)>) -> Vec<usize> {
    let mut keep: Vec<(&String, usize)> = entries
        .enumerate()
        .filter(|(_, (_, linked))| *linked)
        .map(|(i, (name, _))| (name, i))
        .collect();
    keep.sort();
    keep.into_iter().map(|(_, i)| i).collect()
}

/// Ordinals of the linked imports of `id`, optionally only those bound to
/// exports of `counterpart`.
///
/// Filtered ordinals are dense within the filter.
pub fn import_ordinals(tree: &BoxTree, id: BoxId, counterpart: Option<BoxId>) -> Vec<(usize, DeclRef)> {
    let node = tree.get(id);
    let mut refs: Vec<(&String, DeclRef)> = node
        .imports
        .iter()
        .enumerate()
        .filter(|(_, i)| {
            i.link
                .is_some_and(|l| counterpart.map_or(true, |c| l.export.box_id == c))
        })
        .map(|(index, i)| (&i.name, DeclRef { box_id: id, index }))
        .collect();
    refs.sort();
    refs.into_iter().map(|(_, r)| r).enumerate().collect()
}

/// Ordinals of the linked exports of `id`, optionally only those with at
/// least one import from `counterpart`.
pub fn export_ordinals(tree: &BoxTree, id: BoxId, counterpart: Option<BoxId>) -> Vec<(usize, DeclRef)> {
    let node = tree.get(id);
    let mut refs: Vec<(&String, DeclRef)> = node
        .exports
        .iter()
        .enumerate()
        .filter(|(_, e)| match counterpart {
            Some(c) => e.links.iter().any(|l| l.import.box_id == c),
            None => !e.links.is_empty(),
        })
        .map(|(index, e)| (&e.name, DeclRef { box_id: id, index }))
        .collect();
    refs.sort();
    refs.into_iter().map(|(_, r)| r).enumerate().collect()
}
