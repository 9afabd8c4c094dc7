//! Lifecycle hooks.
//!
//! Runtimes take part in each stage through small observer traits. A
//! [`Hooks`] value keeps one ordered list per capability and calls every
//! observer in the order it was registered.

use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::error::Result;
use crate::tree::{BoxId, BoxTree};

/// Observer of the boxes stage.
pub trait OnBox: fmt::Debug {
    /// Component name, for diagnostics.
    fn name(&self) -> &str;

    /// Called on the child's runtime once the child's memories are placed
    /// in `parent`, before `parent`'s sections are allocated.
    fn on_box_parent(&self, _tree: &mut BoxTree, _parent: BoxId, _child: BoxId) -> Result<()> {
        Ok(())
    }

    /// Called on a box's own runtime before its sections are allocated.
    fn on_box(&self, _tree: &mut BoxTree, _id: BoxId) -> Result<()> {
        Ok(())
    }
}

/// Observer of the link stage, called once every link in the tree is resolved.
pub trait OnLink: fmt::Debug {
    fn name(&self) -> &str;

    fn on_link(&self, tree: &BoxTree, id: BoxId) -> Result<()>;
}

/// Observer of the build stage.
pub trait OnBuild: fmt::Debug {
    fn name(&self) -> &str;

    fn on_build(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()>;
}

/// Ordered observers for each lifecycle stage.
#[derive(Debug, Default)]
pub struct Hooks {
    on_box: Vec<Box<dyn OnBox>>,
    on_link: Vec<Box<dyn OnLink>>,
    on_build: Vec<Box<dyn OnBuild>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_on_box(&mut self, hook: Box<dyn OnBox>) {
        self.on_box.push(hook);
    }

    pub fn register_on_link(&mut self, hook: Box<dyn OnLink>) {
        self.on_link.push(hook);
    }

    pub fn register_on_build(&mut self, hook: Box<dyn OnBuild>) {
        self.on_build.push(hook);
    }

    /// Names of all registered observers, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.on_box
            .iter()
            .map(|h| h.name())
            .chain(self.on_link.iter().map(|h| h.name()))
            .chain(self.on_build.iter().map(|h| h.name()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.on_box.is_empty() && self.on_link.is_empty() && self.on_build.is_empty()
    }

    pub fn box_parent(&self, tree: &mut BoxTree, parent: BoxId, child: BoxId) -> Result<()> {
        for hook in &self.on_box {
            trace!("{}: on_box_parent {}", hook.name(), tree.get(child).name);
            hook.on_box_parent(tree, parent, child)?;
        }
        Ok(())
    }

    pub fn boxed(&self, tree: &mut BoxTree, id: BoxId) -> Result<()> {
        for hook in &self.on_box {
            trace!("{}: on_box {}", hook.name(), tree.get(id).name);
            hook.on_box(tree, id)?;
        }
        Ok(())
    }

    pub fn linked(&self, tree: &BoxTree, id: BoxId) -> Result<()> {
        for hook in &self.on_link {
            trace!("{}: on_link {}", hook.name(), tree.get(id).name);
            hook.on_link(tree, id)?;
        }
        Ok(())
    }

    pub fn built(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()> {
        for hook in &self.on_build {
            trace!("{}: on_build {}", hook.name(), tree.get(id).name);
            hook.on_build(tree, id, artifacts)?;
        }
        Ok(())
    }
}

/// A piece of build output handed to code generators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    /// Box the artifact describes.
    pub box_name: String,
    /// Component that produced it.
    pub component: String,
    /// Artifact name, unique per box and component.
    pub name: String,
    pub content: serde_json::Value,
}

/// Everything produced by the build stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Artifacts {
    pub entries: Vec<Artifact>,
}

impl Artifacts {
    pub fn push(
        &mut self,
        box_name: impl Into<String>,
        component: impl Into<String>,
        name: impl Into<String>,
        content: serde_json::Value,
    ) {
        self.entries.push(Artifact {
            box_name: box_name.into(),
            component: component.into(),
            name: name.into(),
            content,
        });
    }

    /// Artifacts produced for one box.
    pub fn for_box<'a>(&'a self, box_name: &'a str) -> impl Iterator<Item = &'a Artifact> + 'a {
        self.entries.iter().filter(move |a| a.box_name == box_name)
    }

    pub fn find(&self, box_name: &str, name: &str) -> Option<&Artifact> {
        self.entries
            .iter()
            .find(|a| a.box_name == box_name && a.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
