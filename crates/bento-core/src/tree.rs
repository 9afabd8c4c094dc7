//! The box arena.
//!
//! Boxes form a tree rooted at the system box. Nodes live in a flat arena
//! and refer to each other by [`BoxId`]; parent, children and roommate
//! relations are plain indices so the tree can be walked and mutated
//! without reference cycles.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::decl::{DeclRef, Export, FnDecl, Import};
use crate::error::{BentoError, Result};
use crate::memory::{bestmemory, usage_dump, Memory};
use crate::mode::Mode;
use crate::section::{Section, STANDARD_SECTIONS};

/// Index of a box in its [`BoxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BoxId(pub usize);

impl fmt::Display for BoxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A compartment: its memory, sections, declarations and place in the tree.
#[derive(Debug, Clone, Serialize)]
pub struct BoxNode {
    pub name: String,
    /// Name of the runtime that isolates this box.
    pub runtime: String,
    /// May share memory with other idempotent siblings.
    pub idempotent: bool,
    pub parent: Option<BoxId>,
    pub children: Vec<BoxId>,
    /// Memories as configured, placed during boxing.
    pub memories: Vec<Memory>,
    /// Free list the box allocates its sections and children from.
    pub memoryslices: Vec<Memory>,
    pub sections: Vec<Section>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    /// Idempotent siblings whose memory overlaps this box.
    pub roommates: Vec<BoxId>,
    /// 1-based index among siblings sharing a runtime; 0 is the parent.
    pub ordinal: Option<usize>,
}

impl BoxNode {
    /// A box with the standard sections, all empty.
    pub fn new(name: impl Into<String>, runtime: impl Into<String>) -> Self {
        let sections = STANDARD_SECTIONS
            .iter()
            .map(|(name, mode)| Section::new(*name, 0, *mode))
            .collect();
        Self {
            name: name.into(),
            runtime: runtime.into(),
            idempotent: false,
            parent: None,
            children: Vec::new(),
            memories: Vec::new(),
            memoryslices: Vec::new(),
            sections,
            imports: Vec::new(),
            exports: Vec::new(),
            roommates: Vec::new(),
            ordinal: None,
        }
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Add a section, replacing any section of the same name.
    pub fn add_section(&mut self, section: Section) {
        match self.section_mut(&section.name) {
            Some(existing) => *existing = section,
            None => self.sections.push(section),
        }
    }

    pub fn memory(&self, name: &str) -> Option<&Memory> {
        self.memories.iter().find(|m| m.name == name)
    }

    pub fn add_memory(&mut self, memory: Memory) {
        self.memories.push(memory);
    }

    pub fn add_import(&mut self, decl: FnDecl) {
        self.imports.push(Import::new(decl));
    }

    pub fn add_export(&mut self, decl: FnDecl) {
        self.exports.push(Export::new(decl));
    }

    pub fn import(&self, name: &str) -> Option<&Import> {
        self.imports.iter().find(|i| i.name == name)
    }

    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Index of the best free memory for a request, see [`bestmemory`].
    pub fn bestmemory(
        &self,
        mode: Mode,
        size: u32,
        align: u32,
        memory: Option<&str>,
        reverse: bool,
    ) -> Option<usize> {
        bestmemory(&self.memoryslices, mode, size, align, memory, reverse)
    }

    /// Carve `size` bytes out of the best free memory.
    pub fn consume(&mut self, mode: Mode, size: u32, align: u32, reverse: bool) -> Result<Memory> {
        let index = self
            .bestmemory(mode, size, align, None, reverse)
            .ok_or_else(|| BentoError::NoMemory {
                box_name: self.name.clone(),
                request: format!("{size:#x} bytes, mode {mode}, align {align:#x}"),
                usage: usage_dump(&self.memoryslices),
            })?;
        self.memoryslices[index].consume(size, align, reverse)
    }

    /// Allocate the named section from this box's free memory.
    pub fn alloc_section(&mut self, name: &str, mode: Mode, reverse: bool) -> Result<()> {
        let box_name = self.name.clone();
        let Some(index) = self.sections.iter().position(|s| s.name == name) else {
            return Err(BentoError::Runtime {
                runtime: self.runtime.clone(),
                detail: format!("box {box_name} has no section {name}"),
            });
        };
        self.sections[index].alloc(&box_name, &mut self.memoryslices, mode, reverse)
    }

    /// Multi-line memory usage.
    pub fn usage(&self) -> String {
        usage_dump(&self.memoryslices)
    }
}

/// Arena of boxes. The first box is the root.
#[derive(Debug, Clone, Serialize)]
pub struct BoxTree {
    nodes: Vec<BoxNode>,
}

impl BoxTree {
    /// A tree holding only `root`.
    pub fn new(root: BoxNode) -> Self {
        let mut root = root;
        root.parent = None;
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> BoxId {
        BoxId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Attach `child` under `parent` and return its id.
    pub fn add_child(&mut self, parent: BoxId, mut child: BoxNode) -> BoxId {
        let id = BoxId(self.nodes.len());
        child.parent = Some(parent);
        debug!("box {} added under {}", child.name, self.nodes[parent.0].name);
        self.nodes.push(child);
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Panics if `id` did not come from this tree.
    pub fn get(&self, id: BoxId) -> &BoxNode {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: BoxId) -> &mut BoxNode {
        &mut self.nodes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = BoxId> {
        (0..self.nodes.len()).map(BoxId)
    }

    /// Every box, parents before children, children in declaration order.
    pub fn preorder(&self) -> Vec<BoxId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(id).children.iter().rev().copied());
        }
        order
    }

    /// Look up a box by name.
    pub fn find(&self, name: &str) -> Option<BoxId> {
        self.ids().find(|id| self.get(*id).name == name)
    }

    /// The boxes a declaration in `id` can see: itself, its parent, its children.
    pub fn neighborhood(&self, id: BoxId) -> Vec<BoxId> {
        let node = self.get(id);
        std::iter::once(id)
            .chain(node.parent)
            .chain(node.children.iter().copied())
            .collect()
    }

    /// Full path of a box, e.g. `sys.box1`.
    pub fn path(&self, id: BoxId) -> String {
        let mut names = vec![self.get(id).name.as_str()];
        let mut at = self.get(id).parent;
        while let Some(p) = at {
            names.push(self.get(p).name.as_str());
            at = self.get(p).parent;
        }
        names.reverse();
        names.join(".")
    }

    pub fn import(&self, r: DeclRef) -> &Import {
        &self.get(r.box_id).imports[r.index]
    }

    pub fn export(&self, r: DeclRef) -> &Export {
        &self.get(r.box_id).exports[r.index]
    }

    /// One-line description of an import for diagnostics.
    pub fn describe_import(&self, r: DeclRef) -> String {
        describe(self, "import", r.box_id, &self.import(r).decl)
    }

    /// One-line description of an export for diagnostics.
    pub fn describe_export(&self, r: DeclRef) -> String {
        describe(self, "export", r.box_id, &self.export(r).decl)
    }
}

pub(crate) fn describe(tree: &BoxTree, kind: &str, id: BoxId, decl: &FnDecl) -> String {
    let mut s = format!("{kind} {}.{}: {}", tree.path(id), decl.name, decl.sig);
    if decl.weak {
        s.push_str(" (weak)");
    }
    if let Some(scope) = &decl.scope {
        s.push_str(&format!(" (scope {scope})"));
    }
    if let Some(source) = &decl.source {
        s.push_str(&format!(" (from {source})"));
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> BoxTree {
        let mut tree = BoxTree::new(BoxNode::new("sys", "system"));
        let a = tree.add_child(tree.root(), BoxNode::new("a", "noop"));
        tree.add_child(tree.root(), BoxNode::new("b", "noop"));
        tree.add_child(a, BoxNode::new("c", "noop"));
        tree
    }

    #[test]
    fn new_box_has_standard_sections() {
        let node = BoxNode::new("box1", "noop");
        let names: Vec<_> = node.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["text", "data", "bss", "heap", "stack"]);
        assert_eq!(node.section("text").unwrap().mode, Mode::parse("rx").unwrap());
        assert_eq!(node.section("stack").unwrap().mode, Mode::parse("rw").unwrap());
    }

    #[test]
    fn add_section_replaces() {
        let mut node = BoxNode::new("box1", "noop");
        node.add_section(Section::new("stack", 0x800, Mode::parse("rw").unwrap()));
        node.add_section(Section::new("jumptable", 0x10, Mode::READ));
        assert_eq!(node.sections.len(), 6);
        assert_eq!(node.section("stack").unwrap().size, 0x800);
    }

    #[test]
    fn walk_and_lookup() {
        let t = tree();
        let names: Vec<_> = t.preorder().iter().map(|id| t.get(*id).name.clone()).collect();
        assert_eq!(names, ["sys", "a", "c", "b"]);

        let c = t.find("c").unwrap();
        assert_eq!(t.path(c), "sys.a.c");
        let a = t.find("a").unwrap();
        assert_eq!(t.neighborhood(a), vec![a, t.root(), c]);
        assert_eq!(t.neighborhood(t.root()).len(), 3);
        assert!(t.find("zz").is_none());
    }

    #[test]
    fn consume_from_free_list() {
        let mut node = BoxNode::new("box1", "noop");
        node.memoryslices
            .push(Memory::parse("ram", "rw 0x20000000-0x20000fff").unwrap());
        let rw = Mode::parse("rw").unwrap();
        let m = node.consume(rw, 0x100, 1, true).unwrap();
        assert_eq!(m.addr(), Some(0x2000_0f00));
        let err = node.consume(rw, 0x1000, 1, true).unwrap_err();
        assert!(err.to_string().contains("box1"));
    }
}
