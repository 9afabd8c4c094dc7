//! MPU region descriptors for ARMv7-M and ARMv8-M.
//!
//! Every memory of an MPU-isolated box becomes one MPU region. The two
//! architectures differ in what a region can look like: ARMv7-M regions are
//! power-of-two sized and aligned to their size, ARMv8-M regions only need
//! 32-byte granularity.

use std::fmt;

use bento_core::{
    Artifacts, BentoError, BoxId, BoxTree, Memory, Mode, OnBox, OnBuild, Region, Result,
};
use serde::Serialize;
use serde_json::json;

/// Regions available to a box when the target does not say otherwise.
pub const DEFAULT_REGIONS: usize = 4;

/// Smallest region either architecture supports.
pub const MIN_REGION: u32 = 32;

/// Address range reserved for cross-box call trampolines.
pub const DEFAULT_CALL_REGION: Region = Region {
    addr: Some(0x1e00_0000),
    size: 0x0200_0000,
};

/// Which MPU programming model to target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MpuArch {
    /// ARMv7-M: RBAR/RASR pairs.
    V7,
    /// ARMv8-M: RBAR/RLAR pairs.
    V8,
}

impl MpuArch {
    pub fn name(&self) -> &'static str {
        match self {
            MpuArch::V7 => "armv7m_mpu",
            MpuArch::V8 => "armv8m_mpu",
        }
    }

    /// Why `region` cannot be an MPU region, if it cannot.
    pub fn check(&self, region: &Region) -> Option<String> {
        let (addr, size) = (region.start(), u64::from(region.size));
        if !region.is_placed() {
            return Some("has no address".into());
        }
        if region.size < MIN_REGION {
            return Some(format!("is smaller than {MIN_REGION} bytes"));
        }
        match self {
            MpuArch::V7 if !region.size.is_power_of_two() => {
                Some("size is not a power of two".into())
            }
            MpuArch::V7 if addr % size != 0 => Some("is not aligned to its size".into()),
            MpuArch::V8 if addr % 32 != 0 || size % 32 != 0 => {
                Some("is not aligned to 32 bytes".into())
            }
            _ => None,
        }
    }

    /// Encode one region. Assumes [`check`](Self::check) passed.
    pub fn encode(&self, region: &Region, mode: Mode) -> Descriptor {
        let addr = region.addr.unwrap_or_default();
        match self {
            MpuArch::V7 => {
                let xn = if mode.contains(Mode::EXECUTE) { 0 } else { 0x1000_0000 };
                let ap = if mode.contains(Mode::READ | Mode::WRITE) {
                    0x0300_0000
                } else if mode.contains(Mode::READ) {
                    0x0200_0000
                } else {
                    0
                };
                let log2 = region.size.trailing_zeros();
                Descriptor {
                    arch: *self,
                    rbar: addr,
                    attr: xn | ap | ((log2 - 1) << 1) | 1,
                }
            }
            MpuArch::V8 => {
                let xn = if mode.contains(Mode::EXECUTE) { 0 } else { 0x1 };
                let ap = if mode.contains(Mode::READ | Mode::WRITE) {
                    0x2
                } else if mode.contains(Mode::READ) {
                    0x6
                } else {
                    0x4
                };
                let last = (region.end() - 1) as u32;
                Descriptor {
                    arch: *self,
                    rbar: addr | xn | ap,
                    attr: (last & !0x1f) | 1,
                }
            }
        }
    }
}

/// An encoded MPU region: RBAR plus RASR (v7) or RLAR (v8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub arch: MpuArch,
    pub rbar: u32,
    pub attr: u32,
}

impl Descriptor {
    fn attr_name(&self) -> &'static str {
        match self.arch {
            MpuArch::V7 => "rasr",
            MpuArch::V8 => "rlar",
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "rbar": format!("{:#010x}", self.rbar),
            self.attr_name(): format!("{:#010x}", self.attr),
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rbar={:#010x} {}={:#010x}",
            self.rbar,
            self.attr_name(),
            self.attr
        )
    }
}

/// Validates and encodes the MPU regions of each box of a runtime.
#[derive(Debug, Clone)]
pub struct MpuRegions {
    pub arch: MpuArch,
    /// Regions one box may use.
    pub regions: usize,
    pub call_region: Region,
}

impl MpuRegions {
    pub fn new(arch: MpuArch) -> Self {
        Self {
            arch,
            regions: DEFAULT_REGIONS,
            call_region: DEFAULT_CALL_REGION,
        }
    }

    fn fail(&self, detail: String) -> BentoError {
        BentoError::Runtime {
            runtime: self.arch.name().to_string(),
            detail,
        }
    }

    fn descriptors(&self, memories: &[Memory]) -> Vec<Descriptor> {
        memories
            .iter()
            .map(|m| self.arch.encode(&m.region(), m.mode))
            .collect()
    }
}

impl OnBox for MpuRegions {
    fn name(&self) -> &str {
        self.arch.name()
    }

    fn on_box_parent(&self, tree: &mut BoxTree, _parent: BoxId, child: BoxId) -> Result<()> {
        if let Some(why) = self.arch.check(&self.call_region) {
            return Err(self.fail(format!("call region {} {why}", self.call_region)));
        }
        let node = tree.get(child);
        if node.memories.len() > self.regions {
            return Err(self.fail(format!(
                "box {} has {} memories but only {} MPU regions are available",
                node.name,
                node.memories.len(),
                self.regions
            )));
        }
        for memory in &node.memories {
            if let Some(why) = self.arch.check(&memory.region()) {
                return Err(self.fail(format!(
                    "memory {}.{} ({}) {why}",
                    node.name,
                    memory.name,
                    memory.region()
                )));
            }
        }
        Ok(())
    }
}

impl OnBuild for MpuRegions {
    fn name(&self) -> &str {
        self.arch.name()
    }

    fn on_build(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()> {
        let node = tree.get(id);
        let half = self.call_region.size / 2;
        let call = self.call_region.addr.unwrap_or_default();
        let regions: Vec<_> = self
            .descriptors(&node.memories)
            .iter()
            .map(Descriptor::to_json)
            .collect();
        artifacts.push(
            &node.name,
            OnBuild::name(self),
            "mpu_regions",
            json!({
                "arch": self.arch,
                "count": regions.len(),
                "regions": regions,
                "call_prefix": format!("{call:#010x}"),
                "call_mask": format!("{:#010x}", half.saturating_sub(1)),
                "ret_prefix": format!("{:#010x}", call.wrapping_add(half)),
            }),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(addr: u32, size: u32) -> Region {
        Region::new(addr, size).unwrap()
    }

    #[test]
    fn v7_constraints() {
        let v7 = MpuArch::V7;
        assert!(v7.check(&region(0x2000_0000, 0x4000)).is_none());
        assert!(v7.check(&region(0x2000_0000, 0x3000)).is_some());
        assert!(v7.check(&region(0x2000_2000, 0x4000)).is_some());
        assert!(v7.check(&region(0x2000_0000, 16)).is_some());
        assert!(v7.check(&Region::unplaced(0x4000)).is_some());
        assert!(v7.check(&DEFAULT_CALL_REGION).is_none());
    }

    #[test]
    fn v8_constraints() {
        let v8 = MpuArch::V8;
        assert!(v8.check(&region(0x2000_0020, 0x3000)).is_none());
        assert!(v8.check(&region(0x2000_0010, 0x3000)).is_some());
        assert!(v8.check(&region(0x2000_0000, 0x3010)).is_some());
    }

    #[test]
    fn v7_encoding() {
        let rw = Mode::READ | Mode::WRITE;
        let d = MpuArch::V7.encode(&region(0x2000_0000, 0x4000), rw);
        assert_eq!(d.rbar, 0x2000_0000);
        // xn, full access, size 2^14
        assert_eq!(d.attr, 0x1000_0000 | 0x0300_0000 | (13 << 1) | 1);

        let rx = Mode::READ | Mode::EXECUTE;
        let d = MpuArch::V7.encode(&region(0x0800_0000, 0x8000), rx);
        assert_eq!(d.attr, 0x0200_0000 | (14 << 1) | 1);
    }

    #[test]
    fn v8_encoding() {
        let rw = Mode::READ | Mode::WRITE;
        let d = MpuArch::V8.encode(&region(0x2000_0000, 0x3000), rw);
        assert_eq!(d.rbar, 0x2000_0000 | 0x1 | 0x2);
        assert_eq!(d.attr, 0x2000_2fe0 | 1);

        let rx = Mode::READ | Mode::EXECUTE;
        let d = MpuArch::V8.encode(&region(0x0800_0000, 0x1000), rx);
        assert_eq!(d.rbar, 0x0800_0000 | 0x6);
        assert_eq!(d.to_string(), "rbar=0x08000006 rlar=0x08000fe1");
    }
}
