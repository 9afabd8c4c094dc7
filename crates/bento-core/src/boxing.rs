//! The boxes stage: memory placement and section allocation.
//!
//! Runs top-down. Each box first carves its children's memories out of its
//! own free list from the top (`reverse`), then allocates its own sections
//! from the bottom, so the two never have to coordinate.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{BentoError, Result};
use crate::memory::Memory;
use crate::mode::Mode;
use crate::region::Region;
use crate::runtime::Runtime;
use crate::tree::{BoxId, BoxTree};

/// A non-fatal finding of the boxes stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// The box has no stack.
    ZeroStack { box_name: String },
    /// The box shares writable memory with an idempotent roommate.
    SharedMemory {
        box_name: String,
        roommate: String,
        memory: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::ZeroStack { box_name } => write!(f, "box {box_name} has no stack"),
            Warning::SharedMemory {
                box_name,
                roommate,
                memory,
            } => write!(
                f,
                "box {box_name} shares memory {memory} with {roommate}, \
                 isolation between them is up to the runtime"
            ),
        }
    }
}

/// Outcome of the boxes stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BoxReport {
    pub warnings: Vec<Warning>,
}

impl BoxReport {
    fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }
}

/// Run the boxes stage over the whole tree.
///
/// `runtimes` is indexed by [`BoxId`].
pub(crate) fn box_tree(tree: &mut BoxTree, runtimes: &[Runtime]) -> Result<BoxReport> {
    let root = tree.root();
    let node = tree.get_mut(root);
    if let Some(memory) = node.memories.iter().find(|m| !m.region().is_placed()) {
        return Err(BentoError::Unplaced {
            memory: format!("{}.{}", node.name, memory.name),
        });
    }
    node.memoryslices = node.memories.clone();

    let mut report = BoxReport::default();
    box_one(tree, runtimes, root, &mut report)?;
    Ok(report)
}

fn box_one(
    tree: &mut BoxTree,
    runtimes: &[Runtime],
    id: BoxId,
    report: &mut BoxReport,
) -> Result<()> {
    let children = tree.get(id).children.clone();

    place_children(tree, id, &children, report)?;
    carve_slices(tree, id, &children);

    for &child in &children {
        runtimes[child.0].hooks.box_parent(tree, id, child)?;
    }
    runtimes[id.0].hooks.boxed(tree, id)?;

    alloc_sections(tree, id)?;

    let node = tree.get(id);
    if node.section("stack").map_or(true, |s| s.size == 0) {
        report.warn(Warning::ZeroStack {
            box_name: node.name.clone(),
        });
    }

    for child in children {
        let node = tree.get_mut(child);
        node.memoryslices = node.memories.clone();
        box_one(tree, runtimes, child, report)?;
    }
    Ok(())
}

/// Give every unaddressed child memory an address from the parent's free
/// list, then check siblings for overlap.
///
/// Explicitly addressed child memories are taken out of the free list
/// first, so unaddressed ones are never placed on top of them.
fn place_children(
    tree: &mut BoxTree,
    parent: BoxId,
    children: &[BoxId],
    report: &mut BoxReport,
) -> Result<()> {
    let fixed: Vec<Region> = children
        .iter()
        .flat_map(|c| tree.get(*c).memories.iter().map(Memory::region))
        .filter(Region::is_placed)
        .collect();
    if !fixed.is_empty() {
        let node = tree.get_mut(parent);
        node.memoryslices = split_slices(&node.memoryslices, &fixed);
    }

    for &child in children {
        for i in 0..tree.get(child).memories.len() {
            let node = tree.get(child);
            let memory = &node.memories[i];
            if memory.region().is_placed() {
                continue;
            }
            let what = format!("memory {}.{}", node.name, memory.name);
            let (mode, size, align) = (memory.mode, memory.size(), memory.align.unwrap_or(1));

            let carved = tree
                .get_mut(parent)
                .consume(mode, size, align, true)
                .map_err(|e| match e {
                    BentoError::NoMemory {
                        box_name,
                        request,
                        usage,
                    } => BentoError::NoMemory {
                        box_name,
                        request: format!("{what} ({request})"),
                        usage,
                    },
                    other => other,
                })?;

            let memory = &mut tree.get_mut(child).memories[i];
            memory.place(carved.addr().unwrap_or_default())?;
            debug!("{what} placed at {}", memory.region());
        }
    }

    for (n, &a) in children.iter().enumerate() {
        for &b in &children[n + 1..] {
            check_overlap(tree, a, b, report)?;
        }
    }
    Ok(())
}

/// Overlapping siblings must both be idempotent; they become roommates.
fn check_overlap(tree: &mut BoxTree, a: BoxId, b: BoxId, report: &mut BoxReport) -> Result<()> {
    let (na, nb) = (tree.get(a), tree.get(b));
    let mut overlaps = Vec::new();
    for ma in &na.memories {
        for mb in nb.memories.iter().filter(|mb| ma.region().overlaps(&mb.region())) {
            if !(na.idempotent && nb.idempotent) {
                return Err(BentoError::Overlap {
                    first: format!("{}.{}", tree.path(a), ma.name),
                    second: format!("{}.{}", tree.path(b), mb.name),
                    first_region: ma.region().to_string(),
                    second_region: mb.region().to_string(),
                });
            }
            overlaps.push((ma.name.clone(), (ma.mode | mb.mode).contains(Mode::WRITE)));
        }
    }
    if overlaps.is_empty() {
        return Ok(());
    }

    let (name_a, name_b) = (na.name.clone(), nb.name.clone());
    debug!("boxes {name_a} and {name_b} are roommates");
    if !tree.get(a).roommates.contains(&b) {
        tree.get_mut(a).roommates.push(b);
    }
    if !tree.get(b).roommates.contains(&a) {
        tree.get_mut(b).roommates.push(a);
    }
    for (memory, writable) in overlaps {
        if writable {
            report.warn(Warning::SharedMemory {
                box_name: name_a.clone(),
                roommate: name_b.clone(),
                memory,
            });
        }
    }
    Ok(())
}

/// Remove children's memories from the parent's free list.
///
/// A free memory may split into several fragments; the first fragment of
/// each name keeps it, later ones get a numeric suffix in address order.
fn carve_slices(tree: &mut BoxTree, parent: BoxId, children: &[BoxId]) {
    let cuts: Vec<Region> = children
        .iter()
        .flat_map(|c| tree.get(*c).memories.iter().map(Memory::region))
        .collect();

    let node = tree.get_mut(parent);
    let mut fragments = split_slices(&node.memoryslices, &cuts);

    let mut by_name: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (i, f) in fragments.iter().enumerate() {
        by_name.entry(f.name.clone()).or_default().push(i);
    }
    for indices in by_name.values_mut().filter(|v| v.len() > 1) {
        indices.sort_by_key(|i| fragments[*i].region().start());
        for (n, &i) in indices.iter().enumerate().skip(1) {
            fragments[i].name = format!("{}{}", fragments[i].name, n + 1);
        }
    }

    debug!(
        "box {}: {} free memories after placing children",
        node.name,
        fragments.len()
    );
    node.memoryslices = fragments;
}

/// The parts of `slices` not covered by `cuts`, keeping slice names.
fn split_slices(slices: &[Memory], cuts: &[Region]) -> Vec<Memory> {
    slices
        .iter()
        .flat_map(|slice| {
            slice
                .region()
                .subtract(cuts)
                .into_iter()
                .map(move |region| slice.fragment(region))
        })
        .collect()
}

fn alloc_sections(tree: &mut BoxTree, id: BoxId) -> Result<()> {
    let node = tree.get_mut(id);
    for i in 0..node.sections.len() {
        let section = &node.sections[i];
        if section.is_allocated() {
            continue;
        }
        let (mode, size) = (section.mode, section.size);
        let fits = node
            .bestmemory(
                mode,
                size,
                section.effective_align(),
                section.memory_name.as_deref(),
                false,
            )
            .is_some();
        if size == 0 && !fits {
            debug!("box {}: section {} left unbound", node.name, section.name);
            continue;
        }
        let box_name = node.name.clone();
        node.sections[i].alloc(&box_name, &mut node.memoryslices, mode, false)?;
    }
    Ok(())
}
