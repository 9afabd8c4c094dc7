//! Mode-tagged memory with bump allocation from either end.

use std::cmp::Reverse;
use std::fmt;

use serde::Serialize;

use crate::error::{BentoError, Result};
use crate::mode::Mode;
use crate::region::{align_down, align_up, Region};

/// A named memory region a box allocates sections and child boxes from.
///
/// `remaining` starts out equal to the full extent and shrinks from either
/// end as sub-regions are consumed; it always stays inside `region`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Memory {
    /// Memory name (e.g. "flash", "ram").
    pub name: String,
    /// Access capabilities.
    pub mode: Mode,
    /// Required alignment of the start address, if any.
    pub align: Option<u32>,
    /// Names of the sections allocated from this memory.
    pub sections: Vec<String>,
    region: Region,
    remaining: Region,
    /// Name of the memory this one was split from; its own name otherwise.
    #[serde(skip)]
    origin: String,
}

impl Memory {
    /// Create a memory covering `region`.
    pub fn new(name: impl Into<String>, mode: Mode, region: Region) -> Self {
        let name = name.into();
        Self {
            origin: name.clone(),
            name,
            mode,
            align: None,
            sections: Vec::new(),
            region,
            remaining: region,
        }
    }

    /// A free piece of this memory covering `region`, with the same name,
    /// mode and alignment.
    pub fn fragment(&self, region: Region) -> Memory {
        Memory {
            name: self.name.clone(),
            mode: self.mode,
            align: self.align,
            sections: Vec::new(),
            region,
            remaining: region,
            origin: self.origin.clone(),
        }
    }

    /// Whether `name` refers to this memory, either directly or as the
    /// memory it was split from.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.origin == name
    }

    /// Parse `"<mode> <region>"`, e.g. `"rwx 0x20000000-0x2000ffff"` or `"rw 0x4000"`.
    pub fn parse(name: impl Into<String>, s: &str) -> Result<Self> {
        let mut parts = s.split_whitespace();
        let (Some(mode), Some(region), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(BentoError::Parse {
                what: "memory",
                input: s.to_string(),
                detail: "expected '<mode> <region>'".into(),
            });
        };
        Ok(Self::new(name, Mode::parse(mode)?, Region::parse(region)?))
    }

    /// Set the alignment requirement, checking placed regions against it.
    pub fn with_align(mut self, align: u32) -> Result<Self> {
        if align > 1 && (self.region.start() % u64::from(align) != 0 || self.region.size % align != 0) {
            return Err(BentoError::Parse {
                what: "memory",
                input: format!("{} {}", self.name, self.region),
                detail: format!("not aligned to {align:#x}"),
            });
        }
        self.align = Some(align);
        Ok(self)
    }

    /// Full extent of this memory.
    pub fn region(&self) -> Region {
        self.region
    }

    /// Part of the memory not yet consumed.
    pub fn remaining(&self) -> Region {
        self.remaining
    }

    /// Start address, if placed.
    pub fn addr(&self) -> Option<u32> {
        self.region.addr
    }

    /// Size of the full extent in bytes.
    pub fn size(&self) -> u32 {
        self.region.size
    }

    /// Give an unplaced memory its final address.
    pub(crate) fn place(&mut self, addr: u32) -> Result<()> {
        let region = Region::new(addr, self.region.size)?;
        self.region = region;
        self.remaining = region;
        Ok(())
    }

    /// Where a `consume` of `size` bytes would land, without consuming.
    pub fn plan(&self, size: u32, align: u32, reverse: bool) -> Option<Region> {
        self.remaining.addr?;
        let (lo, hi) = (self.remaining.start(), self.remaining.end());
        let start = if reverse {
            let top = hi.checked_sub(u64::from(size))?;
            align_down(top, align)
        } else {
            align_up(lo, align)
        };
        if start < lo || start + u64::from(size) > hi {
            return None;
        }
        // inside the remaining range, so it fits in 32 bits
        Some(Region {
            addr: Some(start as u32),
            size,
        })
    }

    /// Carve `size` bytes off the front (or back, if `reverse`) of the
    /// remaining range, aligned to `align`.
    ///
    /// Returns a memory describing the carved range with the same mode.
    /// Alignment padding is dropped from the remaining range.
    pub fn consume(&mut self, size: u32, align: u32, reverse: bool) -> Result<Memory> {
        if self.remaining.addr.is_none() {
            return Err(BentoError::Unplaced {
                memory: self.name.clone(),
            });
        }
        let carved = self.plan(size, align, reverse).ok_or_else(|| BentoError::Exhausted {
            memory: self.name.clone(),
            requested: size,
            align,
            available: self.remaining.size,
        })?;

        let (lo, hi) = (self.remaining.start(), self.remaining.end());
        let (new_lo, new_hi) = if reverse {
            (lo, carved.start())
        } else {
            (carved.end(), hi)
        };
        self.remaining = Region {
            addr: Some(new_lo as u32),
            size: (new_hi - new_lo) as u32,
        };

        let mut memory = Memory::new(self.name.clone(), self.mode, carved);
        memory.align = (align > 1).then_some(align);
        Ok(memory)
    }

    /// One-line usage summary for diagnostics.
    pub fn usage(&self) -> String {
        let sections = if self.sections.is_empty() {
            String::new()
        } else {
            format!(", sections: {}", self.sections.join(" "))
        };
        format!(
            "{:<16} {:<4} {}  {:#x} of {:#x} bytes free ({}){}",
            self.name,
            self.mode.to_string(),
            self.region,
            self.remaining.size,
            self.region.size,
            self.remaining,
            sections
        )
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.mode, self.region)
    }
}

/// Pick the best memory among `slices` for a request.
///
/// Candidates must offer a superset of `mode`, have room for `size` bytes
/// at `align`, and match `name` when given. A name also matches the
/// renamed fragments of a split memory. Ties are broken by the fewest
/// extra mode bits, then by address: ascending normally, descending when
/// `reverse`.
pub fn bestmemory(
    slices: &[Memory],
    mode: Mode,
    size: u32,
    align: u32,
    name: Option<&str>,
    reverse: bool,
) -> Option<usize> {
    let candidates = slices.iter().enumerate().filter(|(_, m)| {
        m.mode.contains(mode)
            && name.map_or(true, |n| m.answers_to(n))
            && m.plan(size, align, reverse).is_some()
    });
    if reverse {
        candidates
            .min_by_key(|(_, m)| (m.mode.waste(mode), Reverse(m.remaining.start())))
            .map(|(i, _)| i)
    } else {
        candidates
            .min_by_key(|(_, m)| (m.mode.waste(mode), m.remaining.start()))
            .map(|(i, _)| i)
    }
}

/// Multi-line usage dump of every memory in `slices`.
pub fn usage_dump(slices: &[Memory]) -> String {
    if slices.is_empty() {
        return "  (no memories)".to_string();
    }
    slices
        .iter()
        .map(|m| format!("  {}", m.usage()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ram() -> Memory {
        Memory::parse("ram", "rwx 0x20000000-0x2000ffff").unwrap()
    }

    #[test]
    fn parse_memory() {
        let m = ram();
        assert_eq!(m.addr(), Some(0x2000_0000));
        assert_eq!(m.size(), 0x1_0000);
        assert_eq!(m.mode, Mode::parse("rwx").unwrap());
        assert_eq!(m.remaining(), m.region());

        let unplaced = Memory::parse("box", "rw 0x4000").unwrap();
        assert_eq!(unplaced.addr(), None);
        assert!(Memory::parse("bad", "rw").is_err());
        assert!(Memory::parse("bad", "rw 0x10 extra").is_err());
    }

    #[test]
    fn alignment_checked() {
        assert!(ram().with_align(0x1000).is_ok());
        let odd = Memory::parse("odd", "rw 0x20000010+0x100").unwrap();
        assert!(odd.with_align(0x100).is_err());
    }

    #[test]
    fn consume_forward_and_reverse() {
        let mut m = ram();
        let a = m.consume(0x100, 1, false).unwrap();
        assert_eq!(a.region(), Region::new(0x2000_0000, 0x100).unwrap());
        let b = m.consume(0x4000, 1, true).unwrap();
        assert_eq!(b.region(), Region::new(0x2000_c000, 0x4000).unwrap());
        assert_eq!(m.remaining(), Region::new(0x2000_0100, 0xbf00).unwrap());
        assert_eq!(b.mode, m.mode);
    }

    #[test]
    fn consume_aligned() {
        let mut m = ram();
        m.consume(0x10, 1, false).unwrap();
        let a = m.consume(0x100, 0x100, false).unwrap();
        assert_eq!(a.addr(), Some(0x2000_0100));
        assert_eq!(m.remaining().addr, Some(0x2000_0200));

        m.consume(0x8, 1, true).unwrap();
        let b = m.consume(0x20, 0x100, true).unwrap();
        assert_eq!(b.addr(), Some(0x2000_ff00));
        assert_eq!(m.remaining().end(), 0x2000_ff00);
    }

    #[test]
    fn consume_sequence_is_disjoint_and_contained() {
        let mut m = ram();
        let sizes = [0x1000, 0x20, 0x3000, 0x800, 0x0, 0x4000, 0x7e0];
        let mut carved = Vec::new();
        let mut left = u64::from(m.size());
        for (i, size) in sizes.iter().enumerate() {
            let piece = m.consume(*size, 1, i % 2 == 1).unwrap();
            left -= u64::from(*size);
            assert_eq!(u64::from(m.remaining().size), left);
            assert!(m.region().contains(&piece.region()));
            assert!(m.region().contains(&m.remaining()));
            carved.push(piece.region());
        }
        for (i, a) in carved.iter().enumerate() {
            for b in &carved[i + 1..] {
                assert!(!a.overlaps(b), "{a} overlaps {b}");
            }
        }
    }

    #[test]
    fn consume_too_much_fails() {
        let mut m = ram();
        m.consume(0xff00, 1, false).unwrap();
        let err = m.consume(0x101, 1, false).unwrap_err();
        assert!(matches!(err, BentoError::Exhausted { available: 0x100, .. }));
        assert!(m.consume(0x100, 1, true).is_ok());
        assert!(m.consume(1, 1, true).is_err());
    }

    #[test]
    fn consume_unplaced_fails() {
        let mut m = Memory::parse("box", "rw 0x4000").unwrap();
        assert!(matches!(m.consume(0x10, 1, false), Err(BentoError::Unplaced { .. })));
    }

    #[test]
    fn bestmemory_prefers_least_privileged() {
        let slices = vec![
            Memory::parse("flash", "rx 0x08000000-0x080fffff").unwrap(),
            Memory::parse("ram", "rwx 0x20000000-0x2000ffff").unwrap(),
            Memory::parse("sram", "rw 0x30000000-0x3000ffff").unwrap(),
        ];
        let rw = Mode::parse("rw").unwrap();
        assert_eq!(bestmemory(&slices, rw, 0x100, 4, None, false), Some(2));
        assert_eq!(bestmemory(&slices, rw, 0x100, 4, Some("ram"), false), Some(1));
        assert_eq!(bestmemory(&slices, rw, 0x2_0000, 4, None, false), None);
        let rx = Mode::parse("rx").unwrap();
        assert_eq!(bestmemory(&slices, rx, 0, 4, None, false), Some(0));
        assert_eq!(bestmemory(&slices, Mode::parse("rwxp").unwrap(), 0, 4, None, false), None);
    }

    #[test]
    fn bestmemory_address_order_follows_direction() {
        let slices = vec![
            Memory::parse("lo", "rw 0x20000000-0x20000fff").unwrap(),
            Memory::parse("hi", "rw 0x20008000-0x20008fff").unwrap(),
        ];
        let rw = Mode::parse("rw").unwrap();
        assert_eq!(bestmemory(&slices, rw, 0x100, 1, None, false), Some(0));
        assert_eq!(bestmemory(&slices, rw, 0x100, 1, None, true), Some(1));
    }

    #[test]
    fn usage_mentions_sections() {
        let mut m = ram();
        m.sections.push("stack".into());
        assert!(m.usage().contains("stack"));
        assert!(usage_dump(&[m]).contains("ram"));
    }
}
