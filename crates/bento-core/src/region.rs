//! Address intervals.
//!
//! A region is a half-open interval `[addr, addr+size)` in the 32-bit
//! physical address space. The address may be absent for regions whose
//! placement is left to the allocator.

use std::fmt;

use bento_sig::parse_int;
use serde::Serialize;

use crate::error::{BentoError, Result};

/// Size of the physical address space.
pub const ADDRESS_SPACE: u64 = 1 << 32;

/// Largest region size. Sizes are 32-bit, so a region cannot cover the
/// whole address space.
pub const MAX_REGION: u32 = u32::MAX;

/// An address interval, possibly not yet placed.
///
/// At most [`MAX_REGION`] bytes long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Region {
    /// Start address, if placed.
    pub addr: Option<u32>,
    /// Length in bytes.
    pub size: u32,
}

impl Region {
    /// A placed region. Fails if it would run past the end of the address space.
    pub fn new(addr: u32, size: u32) -> Result<Self> {
        if u64::from(addr) + u64::from(size) > ADDRESS_SPACE {
            return Err(BentoError::Parse {
                what: "region",
                input: format!("{addr:#x}+{size:#x}"),
                detail: "region extends past the end of the address space".into(),
            });
        }
        Ok(Region {
            addr: Some(addr),
            size,
        })
    }

    /// A region with a size but no address.
    pub fn unplaced(size: u32) -> Self {
        Region { addr: None, size }
    }

    /// Parse `START-END` (inclusive end), `START+SIZE`, or a bare `SIZE`.
    ///
    /// Sizes above [`MAX_REGION`] are rejected, so `0x0-0xffffffff` is not
    /// a valid region while `0x0-0xfffffffe` is.
    pub fn parse(s: &str) -> Result<Self> {
        let err = |detail: &str| BentoError::Parse {
            what: "region",
            input: s.to_string(),
            detail: detail.to_string(),
        };
        let num = |t: &str| -> Result<u64> {
            parse_int(t).ok_or_else(|| err(&format!("invalid number '{}'", t.trim())))
        };
        let word = |v: u64| u32::try_from(v).map_err(|_| err("value does not fit in 32 bits"));
        let length = |v: u64| {
            u32::try_from(v).map_err(|_| {
                err(&format!(
                    "size {v:#x} is too large, regions are at most {MAX_REGION:#x} bytes"
                ))
            })
        };

        if let Some((start, end)) = s.split_once('-') {
            let (start, end) = (num(start)?, num(end)?);
            if end < start {
                return Err(err("end address is below start address"));
            }
            let size = end - start + 1;
            if start + size > ADDRESS_SPACE {
                return Err(err("region extends past the end of the address space"));
            }
            Region::new(word(start)?, length(size)?)
        } else if let Some((start, size)) = s.split_once('+') {
            let (start, size) = (num(start)?, num(size)?);
            if start + size > ADDRESS_SPACE {
                return Err(err("region extends past the end of the address space"));
            }
            Region::new(word(start)?, length(size)?)
        } else {
            Ok(Region::unplaced(length(num(s)?)?))
        }
    }

    /// Start address as a wide integer; unplaced regions start at 0.
    pub fn start(&self) -> u64 {
        self.addr.map_or(0, u64::from)
    }

    /// One past the last address.
    pub fn end(&self) -> u64 {
        self.start() + u64::from(self.size)
    }

    /// Whether this region has an address.
    pub fn is_placed(&self) -> bool {
        self.addr.is_some()
    }

    /// Whether two placed, non-empty regions share at least one address.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.is_placed()
            && other.is_placed()
            && self.size > 0
            && other.size > 0
            && self.start() < other.end()
            && other.start() < self.end()
    }

    /// Whether `other` lies entirely within this region.
    pub fn contains(&self, other: &Region) -> bool {
        self.is_placed()
            && other.is_placed()
            && self.start() <= other.start()
            && other.end() <= self.end()
    }

    /// Remove every cutting region from this one, returning what is left.
    ///
    /// The result may be empty, the region itself, or several fragments in
    /// ascending address order. Unplaced regions are returned unchanged.
    pub fn subtract(&self, cuts: &[Region]) -> Vec<Region> {
        if !self.is_placed() {
            return vec![*self];
        }
        let mut pieces = vec![(self.start(), self.end())];
        for cut in cuts.iter().filter(|c| c.is_placed() && c.size > 0) {
            let (cs, ce) = (cut.start(), cut.end());
            pieces = pieces
                .into_iter()
                .flat_map(|(s, e)| {
                    if ce <= s || e <= cs {
                        return vec![(s, e)];
                    }
                    let mut left = Vec::with_capacity(2);
                    if s < cs {
                        left.push((s, cs));
                    }
                    if ce < e {
                        left.push((ce, e));
                    }
                    left
                })
                .collect();
        }
        pieces
            .into_iter()
            .filter(|(s, e)| e > s)
            // both bounds lie inside the original region, which fits in 32 bits
            .map(|(s, e)| Region {
                addr: Some(s as u32),
                size: (e - s) as u32,
            })
            .collect()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.addr {
            Some(addr) if self.size > 0 => {
                write!(f, "{:#010x}-{:#010x}", addr, self.end() - 1)
            }
            Some(addr) => write!(f, "{addr:#010x}+0x0"),
            None => write!(f, "{:#x}", self.size),
        }
    }
}

/// Round `value` up to a multiple of `align`.
pub fn align_up(value: u64, align: u32) -> u64 {
    let align = u64::from(align.max(1));
    value.div_ceil(align) * align
}

/// Round `value` down to a multiple of `align`.
pub fn align_down(value: u64, align: u32) -> u64 {
    let align = u64::from(align.max(1));
    value / align * align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(addr: u32, size: u32) -> Region {
        Region::new(addr, size).unwrap()
    }

    #[test]
    fn parse_forms() {
        assert_eq!(
            Region::parse("0x1e000000-0x1fffffff").unwrap(),
            r(0x1e00_0000, 0x0200_0000)
        );
        assert_eq!(Region::parse("0x1000+0x100").unwrap(), r(0x1000, 0x100));
        assert_eq!(Region::parse("0x4000").unwrap(), Region::unplaced(0x4000));
        assert_eq!(Region::parse("0xfffff000-0xffffffff").unwrap().end(), ADDRESS_SPACE);
    }

    #[test]
    fn parse_errors() {
        assert!(Region::parse("0x2000-0x1000").is_err());
        assert!(Region::parse("zz").is_err());
        assert!(Region::parse("0xffffffff+0x10").is_err());
        assert!(Region::parse("0x100000000").is_err());
    }

    #[test]
    fn whole_address_space_is_too_large() {
        let err = Region::parse("0x0-0xffffffff").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("size 0x100000000 is too large"), "{msg}");
        assert!(msg.contains("at most 0xffffffff bytes"), "{msg}");

        let largest = Region::parse("0x0-0xfffffffe").unwrap();
        assert_eq!(largest.size, MAX_REGION);
        assert!(Region::parse("0x1+0xffffffff").is_ok());
    }

    #[test]
    fn display_reparses() {
        for region in [r(0x2000_0000, 0x1_0000), r(0x100, 0), Region::unplaced(0x40)] {
            assert_eq!(Region::parse(&region.to_string()).unwrap(), region);
        }
    }

    #[test]
    fn overlap() {
        assert!(r(0, 0x100).overlaps(&r(0xff, 1)));
        assert!(!r(0, 0x100).overlaps(&r(0x100, 1)));
        assert!(!r(0, 0x100).overlaps(&r(0x10, 0)));
        assert!(!r(0, 0x100).overlaps(&Region::unplaced(0x10)));
    }

    #[test]
    fn subtract_cases() {
        let base = r(0x1000, 0x1000);
        assert_eq!(base.subtract(&[]), vec![base]);
        assert_eq!(base.subtract(&[base]), vec![]);
        assert_eq!(
            base.subtract(&[r(0x1400, 0x100)]),
            vec![r(0x1000, 0x400), r(0x1500, 0xb00)]
        );
        assert_eq!(
            base.subtract(&[r(0x0, 0x1100), r(0x1f00, 0x1000)]),
            vec![r(0x1100, 0xe00)]
        );
        assert_eq!(base.subtract(&[r(0x3000, 0x10)]), vec![base]);
    }

    #[test]
    fn subtract_conserves_length() {
        let base = r(0x2000_0000, 0x1_0000);
        let cuts = [
            r(0x1fff_f000, 0x2000),
            r(0x2000_4000, 0x800),
            r(0x2000_4400, 0x800),
            r(0x2000_f000, 0x4000),
            r(0x2000_8000, 0),
        ];
        let left: u64 = base.subtract(&cuts).iter().map(|f| u64::from(f.size)).sum();

        // bytes of the base covered by at least one cut
        let covered = (base.start()..base.end())
            .step_by(0x100)
            .filter(|a| cuts.iter().any(|c| c.size > 0 && c.start() <= *a && *a < c.end()))
            .count() as u64
            * 0x100;
        assert_eq!(left + covered, u64::from(base.size));
    }

    #[test]
    fn alignment_helpers() {
        assert_eq!(align_up(0x1001, 0x100), 0x1100);
        assert_eq!(align_up(0x1000, 0x100), 0x1000);
        assert_eq!(align_down(0x10ff, 0x100), 0x1000);
        assert_eq!(align_up(7, 0), 7);
    }
}
