//! Named, sized memory requests.

use serde::Serialize;
use tracing::debug;

use crate::error::{BentoError, Result};
use crate::memory::{bestmemory, usage_dump, Memory};
use crate::mode::Mode;

/// Sections every box carries, in allocation order, with the mode each needs.
pub const STANDARD_SECTIONS: [(&str, Mode); 5] = [
    ("text", Mode::READ.union(Mode::EXECUTE)),
    ("data", Mode::READ.union(Mode::WRITE)),
    ("bss", Mode::READ.union(Mode::WRITE)),
    ("heap", Mode::READ.union(Mode::WRITE)),
    ("stack", Mode::READ.union(Mode::WRITE)),
];

/// A memory request belonging to a box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    /// Section name.
    pub name: String,
    /// Requested size in bytes (may be zero).
    pub size: u32,
    /// Requested alignment; defaults to 8 for stack/heap, 4 otherwise.
    pub align: Option<u32>,
    /// Mode the backing memory must offer.
    pub mode: Mode,
    /// Explicitly requested memory name.
    pub memory_name: Option<String>,
    /// Backing memory, once allocated.
    pub memory: Option<Memory>,
}

impl Section {
    /// An unallocated section.
    pub fn new(name: impl Into<String>, size: u32, mode: Mode) -> Self {
        Self {
            name: name.into(),
            size,
            align: None,
            mode,
            memory_name: None,
            memory: None,
        }
    }

    /// Set the alignment. The size must be a multiple of it.
    pub fn with_align(mut self, align: u32) -> Result<Self> {
        if align > 1 && self.size % align != 0 {
            return Err(BentoError::Parse {
                what: "section",
                input: format!("{} {:#x}", self.name, self.size),
                detail: format!("size not aligned to {align:#x}"),
            });
        }
        self.align = Some(align);
        Ok(self)
    }

    /// Restrict allocation to the memory with this name.
    pub fn in_memory(mut self, memory: impl Into<String>) -> Self {
        self.memory_name = Some(memory.into());
        self
    }

    /// Alignment actually used for allocation.
    pub fn effective_align(&self) -> u32 {
        self.align.unwrap_or(match self.name.as_str() {
            "stack" | "heap" => 8,
            _ => 4,
        })
    }

    /// Whether backing memory has been assigned.
    pub fn is_allocated(&self) -> bool {
        self.memory.is_some()
    }

    /// Allocate this section from `slices`, the free list of `box_name`.
    ///
    /// On success the carved memory is attached to the section and the
    /// section is registered on the memory it came from.
    pub fn alloc(
        &mut self,
        box_name: &str,
        slices: &mut [Memory],
        mode: Mode,
        reverse: bool,
    ) -> Result<()> {
        let align = self.effective_align();
        let index = bestmemory(
            slices,
            mode,
            self.size,
            align,
            self.memory_name.as_deref(),
            reverse,
        )
        .ok_or_else(|| BentoError::NoMemory {
            box_name: box_name.to_string(),
            request: self.describe(mode),
            usage: usage_dump(slices),
        })?;

        let slice = &mut slices[index];
        let carved = slice.consume(self.size, align, reverse)?;
        debug!(
            "{}: section {} -> {} {}",
            box_name, self.name, slice.name, carved.region()
        );
        slice.sections.push(self.name.clone());
        self.memory = Some(carved);
        Ok(())
    }

    fn describe(&self, mode: Mode) -> String {
        let mut s = format!(
            "section {} ({:#x} bytes, mode {}, align {:#x}",
            self.name,
            self.size,
            mode,
            self.effective_align()
        );
        if let Some(name) = &self.memory_name {
            s.push_str(&format!(", memory {name}"));
        }
        s.push(')');
        s
    }
}
