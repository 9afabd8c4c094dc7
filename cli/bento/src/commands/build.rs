//! `bento build`: run every stage and emit the build artifacts.

use std::path::Path;

use anyhow::{Context, Result};
use bento_core::{Artifacts, System};
use serde_json::json;

use crate::recipe;

pub fn run(path: &Path, json: bool, output: Option<&Path>) -> Result<()> {
    let mut system = recipe::load(path)?;
    system.boxes()?;
    system.link()?;
    let artifacts = system.build()?;

    let rendered = if json || output.is_some() {
        to_json(&system, &artifacts)?
    } else {
        summary(&artifacts)
    };
    match output {
        Some(out) => {
            std::fs::write(out, rendered).with_context(|| format!("writing {}", out.display()))?;
            println!("wrote {} artifacts to {}", artifacts.len(), out.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}

/// The resolved tree and artifacts, for code generators.
pub fn to_json(system: &System, artifacts: &Artifacts) -> Result<String> {
    let doc = json!({
        "tree": system.tree(),
        "artifacts": artifacts,
    });
    let mut s = serde_json::to_string_pretty(&doc)?;
    s.push('\n');
    Ok(s)
}

pub fn summary(artifacts: &Artifacts) -> String {
    let mut out = String::new();
    for a in &artifacts.entries {
        out.push_str(&format!("{}/{}/{}: {}\n", a.box_name, a.component, a.name, a.content));
    }
    out
}
