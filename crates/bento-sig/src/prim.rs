//! Primitive types that can cross a box boundary.
//!
//! Every primitive fits in at most two machine words. The `err` family
//! carries either a non-negative payload or a negated error code in a
//! single register.

use std::fmt;

/// Width of a machine word (and of pointers) in bits.
pub const WORD_BITS: u32 = 32;

/// A primitive argument or return type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// Error code or non-negative 32-bit payload.
    Err,
    Err8,
    Err16,
    Err32,
    Err64,
    /// Error code or non-negative pointer-width payload.
    Errsize,
}

const ALL: [Prim; 19] = [
    Prim::Bool,
    Prim::I8,
    Prim::I16,
    Prim::I32,
    Prim::I64,
    Prim::Isize,
    Prim::U8,
    Prim::U16,
    Prim::U32,
    Prim::U64,
    Prim::Usize,
    Prim::F32,
    Prim::F64,
    Prim::Err,
    Prim::Err8,
    Prim::Err16,
    Prim::Err32,
    Prim::Err64,
    Prim::Errsize,
];

impl Prim {
    /// Look up a primitive by its keyword.
    pub fn from_keyword(s: &str) -> Option<Self> {
        ALL.iter().copied().find(|p| p.keyword() == s)
    }

    /// The keyword used in signature strings.
    pub fn keyword(&self) -> &'static str {
        match self {
            Prim::Bool => "bool",
            Prim::I8 => "i8",
            Prim::I16 => "i16",
            Prim::I32 => "i32",
            Prim::I64 => "i64",
            Prim::Isize => "isize",
            Prim::U8 => "u8",
            Prim::U16 => "u16",
            Prim::U32 => "u32",
            Prim::U64 => "u64",
            Prim::Usize => "usize",
            Prim::F32 => "f32",
            Prim::F64 => "f64",
            Prim::Err => "err",
            Prim::Err8 => "err8",
            Prim::Err16 => "err16",
            Prim::Err32 => "err32",
            Prim::Err64 => "err64",
            Prim::Errsize => "errsize",
        }
    }

    /// Width in bits.
    pub fn width(&self) -> u32 {
        match self {
            Prim::Bool | Prim::I8 | Prim::U8 | Prim::Err8 => 8,
            Prim::I16 | Prim::U16 | Prim::Err16 => 16,
            Prim::I32 | Prim::U32 | Prim::F32 | Prim::Err | Prim::Err32 => 32,
            Prim::I64 | Prim::U64 | Prim::F64 | Prim::Err64 => 64,
            Prim::Isize | Prim::Usize | Prim::Errsize => WORD_BITS,
        }
    }

    /// Number of machine words needed to pass a value of this type.
    pub fn words(&self) -> u32 {
        self.width().div_ceil(WORD_BITS).max(1)
    }

    /// Whether this is a plain signed or unsigned integer.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Prim::I8
                | Prim::I16
                | Prim::I32
                | Prim::I64
                | Prim::Isize
                | Prim::U8
                | Prim::U16
                | Prim::U32
                | Prim::U64
                | Prim::Usize
        )
    }

    /// Whether this is one of the error-or-payload primitives.
    pub fn is_err(&self) -> bool {
        matches!(
            self,
            Prim::Err | Prim::Err8 | Prim::Err16 | Prim::Err32 | Prim::Err64 | Prim::Errsize
        )
    }

    /// Whether this is a floating-point type.
    pub fn is_float(&self) -> bool {
        matches!(self, Prim::F32 | Prim::F64)
    }
}

impl fmt::Display for Prim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_round_trip() {
        for p in ALL {
            assert_eq!(Prim::from_keyword(p.keyword()), Some(p));
        }
        assert_eq!(Prim::from_keyword("int"), None);
    }

    #[test]
    fn word_counts() {
        assert_eq!(Prim::U8.words(), 1);
        assert_eq!(Prim::Usize.words(), 1);
        assert_eq!(Prim::Errsize.words(), 1);
        assert_eq!(Prim::I64.words(), 2);
        assert_eq!(Prim::F64.words(), 2);
        assert_eq!(Prim::Err64.words(), 2);
    }

    #[test]
    fn classification() {
        assert!(Prim::Usize.is_integer());
        assert!(!Prim::Bool.is_integer());
        assert!(!Prim::Err.is_integer());
        assert!(Prim::Errsize.is_err());
        assert!(Prim::F32.is_float());
    }
}
