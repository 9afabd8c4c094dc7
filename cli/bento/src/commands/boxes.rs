//! `bento boxes`: memory layout of every box.

use std::path::Path;

use anyhow::Result;
use bento_core::memory::usage_dump;
use bento_core::{BoxReport, System};

use crate::recipe;

pub fn run(path: &Path) -> Result<()> {
    let mut system = recipe::load(path)?;
    let report = system.boxes()?;
    print!("{}", render(&system, &report));
    Ok(())
}

/// Per-box memories, sections and remaining free space, then warnings.
pub fn render(system: &System, report: &BoxReport) -> String {
    let tree = system.tree();
    let mut out = String::new();
    for id in tree.preorder() {
        let node = tree.get(id);
        out.push_str(&format!("box {} ({})\n", tree.path(id), node.runtime));
        if !node.memories.is_empty() {
            out.push_str("  memories:\n");
            for memory in &node.memories {
                out.push_str(&format!("    {:<12} {memory}\n", memory.name));
            }
        }
        out.push_str("  sections:\n");
        for section in &node.sections {
            let placed = match &section.memory {
                Some(memory) => format!("{} in {}", memory.region(), memory.name),
                None => "-".to_string(),
            };
            out.push_str(&format!(
                "    {:<12} {:<4} {:#8x}  {placed}\n",
                section.name,
                section.mode.to_string(),
                section.size
            ));
        }
        out.push_str(&format!("  free:\n{}\n", usage_dump(&node.memoryslices)));
    }
    for warning in &report.warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    out
}
