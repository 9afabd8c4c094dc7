//! The link stage: binding imports to exports across box boundaries.
//!
//! A declaration can see exports in its own box, its parent and its
//! children. Linking runs in global passes (dedup and scope checks for every
//! box, then resolution, then ordinals) so the outcome does not depend on the
//! order boxes are visited in.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::decl::{DeclRef, Export, FnDecl, Import, Link};
use crate::error::{BentoError, Result};
use crate::ordinal;
use crate::tree::{describe, BoxId, BoxTree};

/// Run the link stage over the whole tree.
pub(crate) fn link_tree(tree: &mut BoxTree) -> Result<()> {
    clear(tree);

    let order = tree.preorder();
    for &id in &order {
        dedup_imports(tree, id)?;
        dedup_exports(tree, id)?;
        check_scopes(tree, id)?;
    }
    for &id in &order {
        resolve(tree, id)?;
    }
    ordinal::assign(tree);
    Ok(())
}

fn clear(tree: &mut BoxTree) {
    let ids: Vec<BoxId> = tree.ids().collect();
    for id in ids {
        let node = tree.get_mut(id);
        node.ordinal = None;
        for import in &mut node.imports {
            import.link = None;
            import.ordinal = None;
        }
        for export in &mut node.exports {
            export.links.clear();
            export.ordinal = None;
        }
    }
}

/// Group indices of same-named declarations, in order of first appearance.
fn group_by_name<'a>(decls: impl Iterator<Item = &'a FnDecl>) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, decl) in decls.enumerate() {
        match index.get(decl.name.as_str()) {
            Some(&g) => groups[g].push(i),
            None => {
                index.insert(&decl.name, groups.len());
                groups.push(vec![i]);
            }
        }
    }
    groups
}

/// Whether `decl` was declared by the box itself rather than added by a
/// runtime component.
fn is_own(decl: &FnDecl, box_name: &str) -> bool {
    decl.source.as_deref().map_or(true, |s| s == box_name)
}

/// Collapse same-named imports into one.
///
/// Signatures must agree. The box's own declaration wins over one added by
/// a runtime, and the survivor is weak only if every duplicate was.
fn dedup_imports(tree: &mut BoxTree, id: BoxId) -> Result<()> {
    let node = tree.get(id);
    let groups = group_by_name(node.imports.iter().map(|i| &i.decl));
    if groups.iter().all(|g| g.len() == 1) {
        return Ok(());
    }

    let mut kept = Vec::with_capacity(groups.len());
    for group in groups {
        let first = &node.imports[group[0]];
        for &i in &group[1..] {
            if !first.sig.is_compatible(&node.imports[i].sig) {
                return Err(BentoError::IncompatibleImports {
                    box_name: tree.path(id),
                    first: describe(tree, "import", id, &first.decl),
                    second: describe(tree, "import", id, &node.imports[i].decl),
                });
            }
        }
        let chosen = group
            .iter()
            .copied()
            .find(|&i| is_own(&node.imports[i], &node.name))
            .unwrap_or(group[0]);
        let mut import = node.imports[chosen].clone();
        import.weak = group.iter().all(|&i| node.imports[i].weak);
        if group.len() > 1 {
            debug!(
                "box {}: {} imports named {} collapsed",
                node.name,
                group.len(),
                import.name
            );
        }
        kept.push(import);
    }
    tree.get_mut(id).imports = kept;
    Ok(())
}

/// Collapse same-named exports into one.
///
/// At most one of them may be non-weak; it overrides the weak ones.
fn dedup_exports(tree: &mut BoxTree, id: BoxId) -> Result<()> {
    let node = tree.get(id);
    let groups = group_by_name(node.exports.iter().map(|e| &e.decl));
    if groups.iter().all(|g| g.len() == 1) {
        return Ok(());
    }

    let mut kept: Vec<Export> = Vec::with_capacity(groups.len());
    for group in groups {
        let strong: Vec<usize> = group
            .iter()
            .copied()
            .filter(|&i| !node.exports[i].weak)
            .collect();
        if let [a, b, ..] = strong[..] {
            return Err(BentoError::ConflictingExports {
                box_name: tree.path(id),
                first: describe(tree, "export", id, &node.exports[a].decl),
                second: describe(tree, "export", id, &node.exports[b].decl),
            });
        }

        let first = &node.exports[group[0]];
        for &i in &group[1..] {
            if !first.sig.is_compatible(&node.exports[i].sig) {
                return Err(BentoError::IncompatibleExports {
                    box_name: tree.path(id),
                    first: describe(tree, "export", id, &first.decl),
                    second: describe(tree, "export", id, &node.exports[i].decl),
                });
            }
        }

        let chosen = strong
            .first()
            .copied()
            .or_else(|| {
                group
                    .iter()
                    .copied()
                    .find(|&i| is_own(&node.exports[i], &node.name))
            })
            .unwrap_or(group[0]);
        kept.push(node.exports[chosen].clone());
    }
    tree.get_mut(id).exports = kept;
    Ok(())
}

/// Every declared scope must name exactly one of the box itself, its parent
/// and its children.
fn check_scopes(tree: &BoxTree, id: BoxId) -> Result<()> {
    let visible: Vec<&str> = tree
        .neighborhood(id)
        .into_iter()
        .map(|b| tree.get(b).name.as_str())
        .collect();
    let node = tree.get(id);
    let decls = node
        .imports
        .iter()
        .map(|i| ("import", &i.decl))
        .chain(node.exports.iter().map(|e| ("export", &e.decl)));
    for (kind, decl) in decls {
        let Some(scope) = &decl.scope else {
            continue;
        };
        match visible.iter().filter(|name| **name == scope.as_str()).count() {
            1 => {}
            0 => {
                return Err(BentoError::Scope {
                    box_name: tree.path(id),
                    decl: describe(tree, kind, id, decl),
                    scope: scope.clone(),
                })
            }
            _ => {
                return Err(BentoError::AmbiguousScope {
                    box_name: tree.path(id),
                    decl: describe(tree, kind, id, decl),
                    scope: scope.clone(),
                })
            }
        }
    }
    Ok(())
}

fn resolve(tree: &mut BoxTree, id: BoxId) -> Result<()> {
    let neighborhood = tree.neighborhood(id);
    for index in 0..tree.get(id).imports.len() {
        let import_ref = DeclRef { box_id: id, index };
        let Some(export_ref) = candidate(tree, &neighborhood, import_ref)? else {
            continue;
        };

        let link = Link {
            export: export_ref,
            import: import_ref,
        };
        debug!(
            "link {}.{} -> {}",
            tree.path(id),
            tree.import(import_ref).name,
            tree.path(export_ref.box_id)
        );
        tree.get_mut(id).imports[index].link = Some(link);
        tree.get_mut(export_ref.box_id).exports[export_ref.index]
            .links
            .push(link);
    }
    Ok(())
}

/// The single export an import binds to, or `None` for an unresolved weak import.
fn candidate(tree: &BoxTree, neighborhood: &[BoxId], import_ref: DeclRef) -> Result<Option<DeclRef>> {
    let id = import_ref.box_id;
    let import: &Import = tree.import(import_ref);
    let here = tree.get(id).name.as_str();

    let mut candidates = Vec::new();
    let mut mismatch = None;
    for &other in neighborhood {
        let there = tree.get(other).name.as_str();
        for (index, export) in tree.get(other).exports.iter().enumerate() {
            let r = DeclRef {
                box_id: other,
                index,
            };
            if import.is_linkable(here, export, there) {
                candidates.push(r);
            } else if import.name == export.name && import.scopes_allow(here, export, there) {
                mismatch.get_or_insert(r);
            }
        }
    }

    if candidates.iter().any(|r| !tree.export(*r).weak) {
        candidates.retain(|r| !tree.export(*r).weak);
    }

    match candidates[..] {
        [only] => Ok(Some(only)),
        [] => match mismatch {
            Some(export) if import.weak => {
                warn!(
                    "{}: weak import {} left unlinked, {} has a different signature",
                    tree.path(id),
                    import.name,
                    tree.describe_export(export)
                );
                Ok(None)
            }
            Some(export) => Err(BentoError::IncompatibleLink {
                import: tree.describe_import(import_ref),
                export: tree.describe_export(export),
            }),
            None if import.weak => {
                debug!("{}: weak import {} left unlinked", tree.path(id), import.name);
                Ok(None)
            }
            None => Err(BentoError::Unresolved {
                import: tree.describe_import(import_ref),
            }),
        },
        _ => Err(BentoError::Ambiguous {
            import: tree.describe_import(import_ref),
            candidates: candidates
                .iter()
                .map(|r| format!("  {}", tree.describe_export(*r)))
                .collect::<Vec<_>>()
                .join("\n"),
        }),
    }
}
