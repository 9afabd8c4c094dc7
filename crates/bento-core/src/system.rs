//! A box tree with its runtimes, driven through the lifecycle stages.

use std::fmt;

use serde::Serialize;
use tracing::info;

use crate::boxing::{box_tree, BoxReport};
use crate::config::BoxConfig;
use crate::error::{BentoError, Result};
use crate::hooks::Artifacts;
use crate::linker::link_tree;
use crate::runtime::{Registry, Runtime};
use crate::tree::{BoxId, BoxTree};

/// How far a [`System`] has progressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Configured,
    Boxed,
    Linked,
    Built,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Configured => "configured",
            Stage::Boxed => "boxed",
            Stage::Linked => "linked",
            Stage::Built => "built",
        };
        f.write_str(s)
    }
}

/// The box tree plus one runtime instance per box.
///
/// Stages must run in order: [`boxes`](System::boxes), then
/// [`link`](System::link), then [`build`](System::build). Linking may be
/// repeated; boxing may not.
#[derive(Debug)]
pub struct System {
    tree: BoxTree,
    runtimes: Vec<Runtime>,
    stage: Stage,
}

impl System {
    /// Build the tree described by `config`, instantiating runtimes from `registry`.
    pub fn from_config(config: &BoxConfig, registry: &Registry) -> Result<Self> {
        let tree = config.to_tree()?;
        Self::from_tree(tree, registry)
    }

    /// Wrap an already constructed tree.
    pub fn from_tree(tree: BoxTree, registry: &Registry) -> Result<Self> {
        let runtimes = tree
            .ids()
            .map(|id| registry.instantiate(&tree.get(id).runtime))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            tree,
            runtimes,
            stage: Stage::Configured,
        })
    }

    pub fn tree(&self) -> &BoxTree {
        &self.tree
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn runtime(&self, id: BoxId) -> &Runtime {
        &self.runtimes[id.0]
    }

    /// Place every box's memories and allocate every section.
    pub fn boxes(&mut self) -> Result<BoxReport> {
        self.expect_stage("boxes", &[Stage::Configured])?;
        let report = box_tree(&mut self.tree, &self.runtimes)?;
        self.stage = Stage::Boxed;
        info!(
            "boxed {} boxes, {} warnings",
            self.tree.len(),
            report.warnings.len()
        );
        Ok(report)
    }

    /// Resolve every import, then let runtimes inspect the result.
    pub fn link(&mut self) -> Result<()> {
        self.expect_stage("link", &[Stage::Boxed, Stage::Linked])?;
        link_tree(&mut self.tree)?;
        for id in self.tree.preorder() {
            self.runtimes[id.0].hooks.linked(&self.tree, id)?;
        }
        self.stage = Stage::Linked;
        info!("linked {} boxes", self.tree.len());
        Ok(())
    }

    /// Collect build artifacts from every runtime.
    pub fn build(&mut self) -> Result<Artifacts> {
        self.expect_stage("build", &[Stage::Linked])?;
        let mut artifacts = Artifacts::default();
        for id in self.tree.preorder() {
            self.runtimes[id.0]
                .hooks
                .built(&self.tree, id, &mut artifacts)?;
        }
        self.stage = Stage::Built;
        info!("built {} artifacts", artifacts.len());
        Ok(artifacts)
    }

    fn expect_stage(&self, stage: &'static str, allowed: &[Stage]) -> Result<()> {
        if allowed.contains(&self.stage) {
            return Ok(());
        }
        let wanted = allowed
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(BentoError::StageOrder {
            stage,
            detail: format!("system is {}, expected {wanted}", self.stage),
        })
    }
}
