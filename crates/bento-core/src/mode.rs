//! Memory access modes.

use std::fmt;

use bitflags::bitflags;
use serde::{Serialize, Serializer};

use crate::error::{BentoError, Result};

bitflags! {
    /// Set of access capabilities of a memory region.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Mode: u8 {
        /// Readable.
        const READ = 0b0001;
        /// Writable.
        const WRITE = 0b0010;
        /// Executable.
        const EXECUTE = 0b0100;
        /// Private to the owning box.
        const PRIVATE = 0b1000;
    }
}

const LETTERS: [(char, Mode); 4] = [
    ('r', Mode::READ),
    ('w', Mode::WRITE),
    ('x', Mode::EXECUTE),
    ('p', Mode::PRIVATE),
];

impl Mode {
    /// Parse a mode string made of the letters `r`, `w`, `x`, `p`.
    pub fn parse(s: &str) -> Result<Self> {
        let mut mode = Mode::empty();
        for c in s.trim().chars() {
            let (_, flag) = LETTERS
                .iter()
                .find(|(letter, _)| *letter == c)
                .ok_or_else(|| BentoError::Parse {
                    what: "memory mode",
                    input: s.to_string(),
                    detail: format!("unknown flag '{c}', expected a combination of r, w, x, p"),
                })?;
            mode |= *flag;
        }
        Ok(mode)
    }

    /// Capabilities this mode has beyond `requested`.
    ///
    /// Used to keep privileged memory free for requests that need it.
    pub fn waste(&self, requested: Mode) -> u32 {
        self.difference(requested).bits().count_ones()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (letter, flag) in LETTERS {
            if self.contains(flag) {
                write!(f, "{letter}")?;
            }
        }
        Ok(())
    }
}

impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let m = Mode::parse("xwr").unwrap();
        assert_eq!(m, Mode::READ | Mode::WRITE | Mode::EXECUTE);
        assert_eq!(m.to_string(), "rwx");
        assert_eq!(Mode::parse("").unwrap(), Mode::empty());
    }

    #[test]
    fn parse_rejects_unknown_flags() {
        let err = Mode::parse("rwz").unwrap_err();
        assert!(err.to_string().contains("rwz"));
    }

    #[test]
    fn waste_counts_extra_bits() {
        let rw = Mode::parse("rw").unwrap();
        assert_eq!(Mode::parse("rw").unwrap().waste(rw), 0);
        assert_eq!(Mode::parse("rwx").unwrap().waste(rw), 1);
        assert_eq!(Mode::parse("rwxp").unwrap().waste(rw), 2);
    }
}
