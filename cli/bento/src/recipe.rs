//! Locating and loading `bento.toml` recipes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bento_core::{BoxConfig, System};
use tracing::debug;

/// File name searched for when no recipe is given.
pub const RECIPE_FILE: &str = "bento.toml";

/// Walk up from `start_dir` looking for `bento.toml`.
pub fn find(start_dir: &Path) -> Option<PathBuf> {
    let mut dir = start_dir.to_path_buf();
    loop {
        let candidate = dir.join(RECIPE_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// The explicit recipe path, or the nearest `bento.toml` above `cwd`.
pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => find(cwd).with_context(|| {
            format!("no {RECIPE_FILE} found in {} or its parents", cwd.display())
        }),
    }
}

/// Parse the recipe at `path` into a system using the built-in runtimes.
pub fn load(path: &Path) -> Result<System> {
    let config = BoxConfig::load(path).with_context(|| format!("loading {}", path.display()))?;
    debug!("recipe {}: {} top-level boxes", path.display(), config.boxes.len());
    let registry = bento_runtimes::registry()?;
    System::from_config(&config, &registry)
        .with_context(|| format!("building box tree from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_in_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RECIPE_FILE), "name = \"here\"\n").unwrap();
        assert_eq!(find(dir.path()), Some(dir.path().join(RECIPE_FILE)));
    }

    #[test]
    fn find_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(RECIPE_FILE), "").unwrap();
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find(&nested), Some(dir.path().join(RECIPE_FILE)));
    }

    #[test]
    fn explicit_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.toml");
        assert_eq!(resolve(Some(&path), dir.path()).unwrap(), path);
    }

    #[test]
    fn load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RECIPE_FILE);
        std::fs::write(&path, "[box.a]\nruntime = \"wasm3\"\n").unwrap();
        let err = load(&path).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("building box tree"), "{msg}");
        assert!(msg.contains("wasm3"), "{msg}");
    }

    #[test]
    fn load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(format!("{err:#}").contains("loading"));
    }
}
