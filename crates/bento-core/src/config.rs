//! Recipe files.
//!
//! A recipe is a TOML description of the box tree:
//!
//! ```toml
//! name = "sys"
//! runtime = "system"
//!
//! [memory]
//! flash = "rx 0x08000000-0x080fffff"
//! ram = "rw 0x20000000-0x2003ffff"
//!
//! [section]
//! stack = 0x1000
//!
//! [box.box1]
//! runtime = "armv7m_mpu"
//! memory.flash = "rx 0x10000"
//! memory.ram = { mode = "rw", size = 0x4000, align = 0x4000 }
//! section.stack = 0x800
//! export.box1_main = "fn() -> err"
//! import.sys_hello = { type = "fn(const u8[n], usize n) -> errsize", weak = true }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::decl::FnDecl;
use crate::error::{BentoError, Result};
use crate::memory::Memory;
use crate::mode::Mode;
use crate::region::Region;
use crate::runtime::DEFAULT_RUNTIME;
use crate::section::Section;
use crate::tree::{BoxId, BoxNode, BoxTree};

/// Name of the root box when the recipe does not give one.
pub const DEFAULT_ROOT: &str = "sys";

/// One box of a recipe, with its children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoxConfig {
    /// Box name. Only used for the root; children are named by their key.
    #[serde(default)]
    pub name: Option<String>,
    /// Runtime name, `noop` if absent.
    #[serde(default)]
    pub runtime: Option<String>,
    /// May share memory with other idempotent siblings.
    #[serde(default)]
    pub idempotent: bool,
    #[serde(default)]
    pub memory: BTreeMap<String, MemoryConfig>,
    #[serde(default)]
    pub section: BTreeMap<String, SectionConfig>,
    #[serde(default)]
    pub import: BTreeMap<String, FnConfig>,
    #[serde(default)]
    pub export: BTreeMap<String, FnConfig>,
    /// Child boxes, keyed by name.
    #[serde(default, rename = "box")]
    pub boxes: BTreeMap<String, BoxConfig>,
}

/// A memory, as `"<mode> <region>"` or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MemoryConfig {
    Short(String),
    Full {
        mode: String,
        #[serde(default, alias = "start")]
        addr: Option<u64>,
        size: u64,
        #[serde(default)]
        align: Option<u64>,
    },
}

/// A section, as a bare size or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionConfig {
    Size(u64),
    Full {
        #[serde(default)]
        size: u64,
        #[serde(default)]
        align: Option<u64>,
        #[serde(default)]
        memory: Option<String>,
        #[serde(default)]
        mode: Option<String>,
    },
}

/// An import or export, as a signature string or a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FnConfig {
    Sig(String),
    Full {
        #[serde(rename = "type")]
        sig: String,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default)]
        weak: bool,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        doc: Option<String>,
    },
}

impl BoxConfig {
    /// Parse a recipe from a TOML string.
    pub fn parse(input: &str) -> Result<Self> {
        let config: BoxConfig = toml::from_str(input)?;
        Ok(config)
    }

    /// Parse a recipe from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Build the unallocated box tree this recipe describes.
    pub fn to_tree(&self) -> Result<BoxTree> {
        let name = self.name.as_deref().unwrap_or(DEFAULT_ROOT);
        let mut tree = BoxTree::new(self.to_node(name)?);
        let root = tree.root();
        self.add_children(&mut tree, root)?;
        Ok(tree)
    }

    fn add_children(&self, tree: &mut BoxTree, parent: BoxId) -> Result<()> {
        for (name, child) in &self.boxes {
            let id = tree.add_child(parent, child.to_node(name)?);
            child.add_children(tree, id)?;
        }
        Ok(())
    }

    fn to_node(&self, name: &str) -> Result<BoxNode> {
        let mut node = BoxNode::new(name, self.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME));
        node.idempotent = self.idempotent;

        for (memory_name, memory) in &self.memory {
            node.add_memory(memory.to_memory(memory_name)?);
        }
        for (section_name, section) in &self.section {
            let default_mode = node.section(section_name).map(|s| s.mode);
            node.add_section(section.to_section(section_name, default_mode)?);
        }
        for (fn_name, import) in &self.import {
            node.add_import(import.to_decl(fn_name, name)?);
        }
        for (fn_name, export) in &self.export {
            node.add_export(export.to_decl(fn_name, name)?);
        }
        Ok(node)
    }
}

fn word(what: &'static str, name: &str, value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| BentoError::Parse {
        what,
        input: format!("{name} = {value:#x}"),
        detail: "value does not fit in 32 bits".into(),
    })
}

impl MemoryConfig {
    pub fn to_memory(&self, name: &str) -> Result<Memory> {
        match self {
            MemoryConfig::Short(s) => Memory::parse(name, s),
            MemoryConfig::Full {
                mode,
                addr,
                size,
                align,
            } => {
                let size = word("memory", name, *size)?;
                let region = match addr {
                    Some(addr) => Region::new(word("memory", name, *addr)?, size)?,
                    None => Region::unplaced(size),
                };
                let memory = Memory::new(name, Mode::parse(mode)?, region);
                match align {
                    Some(align) => memory.with_align(word("memory", name, *align)?),
                    None => Ok(memory),
                }
            }
        }
    }
}

impl SectionConfig {
    /// Build the section; `default_mode` is the mode of the standard section
    /// of the same name, if there is one.
    pub fn to_section(&self, name: &str, default_mode: Option<Mode>) -> Result<Section> {
        let fallback = default_mode.unwrap_or(Mode::READ | Mode::WRITE);
        match self {
            SectionConfig::Size(size) => Ok(Section::new(name, word("section", name, *size)?, fallback)),
            SectionConfig::Full {
                size,
                align,
                memory,
                mode,
            } => {
                let mode = match mode {
                    Some(m) => Mode::parse(m)?,
                    None => fallback,
                };
                let mut section = Section::new(name, word("section", name, *size)?, mode);
                if let Some(align) = align {
                    section = section.with_align(word("section", name, *align)?)?;
                }
                if let Some(memory) = memory {
                    section = section.in_memory(memory.clone());
                }
                Ok(section)
            }
        }
    }
}

impl FnConfig {
    /// Build the declaration, recording `box_name` as its source.
    pub fn to_decl(&self, name: &str, box_name: &str) -> Result<FnDecl> {
        let decl = match self {
            FnConfig::Sig(sig) => FnDecl::parse(name, sig)?,
            FnConfig::Full {
                sig,
                scope,
                weak,
                alias,
                doc,
            } => {
                let mut decl = FnDecl::parse(name, sig)?;
                decl.scope = scope.clone();
                decl.weak = *weak;
                decl.alias = alias.clone();
                decl.doc = doc.clone();
                decl
            }
        };
        Ok(decl.with_source(box_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPE: &str = r#"
name = "sys"
runtime = "noop"

[memory]
flash = "rx 0x08000000-0x0800ffff"
ram = { mode = "rw", addr = 0x20000000, size = 0x10000 }

[section]
stack = 0x1000
rodata = { size = 0x100, mode = "r", memory = "flash" }

[box.box1]
memory.ram = "rw 0x4000"
memory.flash = { mode = "rx", size = 0x8000, align = 0x8000 }
section.stack = { size = 0x800, align = 16 }
export.box1_main = "fn() -> err"
import.__box_write = { type = "fn(i32, const u8[n], usize n) -> errsize", weak = true }

[box.box1.box.inner]
idempotent = true
"#;

    #[test]
    fn parse_recipe() {
        let config = BoxConfig::parse(RECIPE).unwrap();
        assert_eq!(config.name.as_deref(), Some("sys"));
        assert_eq!(config.memory.len(), 2);
        let box1 = &config.boxes["box1"];
        assert_eq!(box1.section["stack"], SectionConfig::Full {
            size: 0x800,
            align: Some(16),
            memory: None,
            mode: None,
        });
        assert!(box1.boxes["inner"].idempotent);
    }

    #[test]
    fn recipe_to_tree() {
        let tree = BoxConfig::parse(RECIPE).unwrap().to_tree().unwrap();
        assert_eq!(tree.len(), 3);

        let root = tree.get(tree.root());
        assert_eq!(root.name, "sys");
        assert_eq!(root.memory("ram").unwrap().addr(), Some(0x2000_0000));
        assert_eq!(root.section("stack").unwrap().size, 0x1000);
        let rodata = root.section("rodata").unwrap();
        assert_eq!(rodata.mode, Mode::READ);
        assert_eq!(rodata.memory_name.as_deref(), Some("flash"));

        let box1 = tree.get(tree.find("box1").unwrap());
        assert_eq!(box1.runtime, "noop");
        assert_eq!(box1.memory("ram").unwrap().addr(), None);
        assert_eq!(box1.memory("flash").unwrap().align, Some(0x8000));
        assert_eq!(box1.section("stack").unwrap().effective_align(), 16);

        let write = box1.import("__box_write").unwrap();
        assert!(write.weak);
        assert_eq!(write.source.as_deref(), Some("box1"));
        assert!(box1.export("box1_main").is_some());
    }

    #[test]
    fn default_root_name() {
        let tree = BoxConfig::parse("").unwrap().to_tree().unwrap();
        assert_eq!(tree.get(tree.root()).name, "sys");
    }

    #[test]
    fn bad_recipes() {
        let bad_sig = "[import]\nfoo = \"fn(i32 -> void\"";
        assert!(BoxConfig::parse(bad_sig).unwrap().to_tree().is_err());

        let bad_mode = "[memory]\nram = \"rwq 0x1000\"";
        assert!(BoxConfig::parse(bad_mode).unwrap().to_tree().is_err());

        let too_big = "[memory]\nram = { mode = \"rw\", size = 0x100000000 }";
        assert!(BoxConfig::parse(too_big).unwrap().to_tree().is_err());

        assert!(matches!(BoxConfig::parse("name = ["), Err(BentoError::Toml(_))));
    }
}
