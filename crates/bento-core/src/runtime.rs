//! Runtimes and the runtime registry.

use std::collections::BTreeMap;

use crate::error::{BentoError, Result};
use crate::hooks::Hooks;

/// Runtime used when a box does not name one.
pub const DEFAULT_RUNTIME: &str = "noop";

/// An isolation backend: a name plus the components that take part in
/// each lifecycle stage.
#[derive(Debug, Default)]
pub struct Runtime {
    pub name: String,
    pub hooks: Hooks,
}

impl Runtime {
    /// A runtime with no components.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hooks: Hooks::new(),
        }
    }

    /// Component names in registration order.
    pub fn components(&self) -> Vec<&str> {
        let mut names = self.hooks.names();
        let mut seen = Vec::new();
        names.retain(|n| {
            let fresh = !seen.contains(n);
            seen.push(*n);
            fresh
        });
        names
    }
}

/// Builds a fresh runtime instance for one box.
pub type RuntimeCtor = fn() -> Runtime;

fn noop() -> Runtime {
    Runtime::new(DEFAULT_RUNTIME)
}

/// Name to constructor table of available runtimes.
#[derive(Debug, Clone)]
pub struct Registry {
    runtimes: BTreeMap<String, RuntimeCtor>,
}

impl Registry {
    /// A registry knowing only the `noop` runtime.
    pub fn new() -> Self {
        let mut runtimes = BTreeMap::new();
        runtimes.insert(DEFAULT_RUNTIME.to_string(), noop as RuntimeCtor);
        Self { runtimes }
    }

    /// Register a runtime constructor under `name`.
    pub fn register(&mut self, name: impl Into<String>, ctor: RuntimeCtor) -> Result<()> {
        let name = name.into();
        if self.runtimes.contains_key(&name) {
            return Err(BentoError::DuplicateRuntime { name });
        }
        self.runtimes.insert(name, ctor);
        Ok(())
    }

    /// Instantiate the runtime registered under `name`.
    pub fn instantiate(&self, name: &str) -> Result<Runtime> {
        let ctor = self
            .runtimes
            .get(name)
            .ok_or_else(|| BentoError::UnknownRuntime {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;
        let mut runtime = ctor();
        runtime.name = name.to_string();
        Ok(runtime)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.runtimes.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.runtimes.keys().map(String::as_str).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
