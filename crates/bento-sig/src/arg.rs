//! Single argument / return declarations.
//!
//! ```text
//! arg := [name ':'] modifiers primitive (pointer | array) [name]
//! ```
//!
//! Accepted spellings include `i32`, `len: usize`, `usize len`,
//! `const u8*`, `mut u8[16]` and `nullable mut u8[len] buf`.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{Result, SigError};
use crate::prim::Prim;

/// Qualifiers attached to an argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub is_const: bool,
    pub is_mut: bool,
    pub nullable: bool,
}

/// Element count of an array argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArraySize {
    /// A literal element count.
    Fixed(u32),
    /// Sized by the value of a sibling argument.
    Named(String),
}

impl ArraySize {
    /// The sibling argument name, if this is a dependent size.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            ArraySize::Named(name) => Some(name),
            ArraySize::Fixed(_) => None,
        }
    }
}

impl fmt::Display for ArraySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArraySize::Fixed(n) => write!(f, "{n}"),
            ArraySize::Named(name) => f.write_str(name),
        }
    }
}

/// A parsed argument or return value.
///
/// Equality is structural: names are ignored and two dependent array sizes
/// compare equal symbolically. Whether they point at the same sibling is
/// checked at the signature level.
#[derive(Debug, Clone)]
pub struct Arg {
    name: Option<String>,
    modifiers: Modifiers,
    prim: Prim,
    ptr: bool,
    asize: Option<ArraySize>,
}

impl Arg {
    /// Parse a single argument declaration.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SigError::arg(input, "empty argument"));
        }

        // leading `name:` form
        let (mut name, rest) = match s.split_once(':') {
            Some((name, rest)) => {
                let name = name.trim();
                if !is_ident(name) {
                    return Err(SigError::arg(input, format!("invalid name '{name}'")));
                }
                (Some(name.to_string()), rest)
            }
            None => (None, s),
        };

        let tokens = tokenize(rest);
        let mut pos = 0;

        let mut modifiers = Modifiers::default();
        while let Some(tok) = tokens.get(pos) {
            let slot = match *tok {
                "const" => &mut modifiers.is_const,
                "mut" => &mut modifiers.is_mut,
                "nullable" => &mut modifiers.nullable,
                _ => break,
            };
            if *slot {
                return Err(SigError::arg(input, format!("duplicate modifier '{tok}'")));
            }
            *slot = true;
            pos += 1;
        }

        let prim_tok = tokens
            .get(pos)
            .ok_or_else(|| SigError::arg(input, "expected type"))?;
        let prim = Prim::from_keyword(prim_tok)
            .ok_or_else(|| SigError::arg(input, format!("unknown type '{prim_tok}'")))?;
        pos += 1;

        let mut ptr = false;
        let mut asize = None;
        while let Some(tok) = tokens.get(pos) {
            match *tok {
                "*" => {
                    if ptr {
                        return Err(SigError::arg(
                            input,
                            "multi-level indirection is not supported",
                        ));
                    }
                    ptr = true;
                    pos += 1;
                }
                "[" => {
                    if ptr {
                        return Err(SigError::arg(
                            input,
                            "multi-level indirection is not supported",
                        ));
                    }
                    let size = tokens
                        .get(pos + 1)
                        .ok_or_else(|| SigError::arg(input, "expected array size"))?;
                    if tokens.get(pos + 2) != Some(&"]") {
                        return Err(SigError::arg(input, "missing ']'"));
                    }
                    asize = Some(parse_array_size(input, size)?);
                    ptr = true;
                    pos += 3;
                }
                _ => break,
            }
        }

        if let Some(tok) = tokens.get(pos) {
            if !is_ident(tok) {
                return Err(SigError::arg(input, format!("unexpected '{tok}'")));
            }
            if name.is_some() {
                return Err(SigError::arg(input, "argument named twice"));
            }
            name = Some(tok.to_string());
            pos += 1;
        }
        if let Some(tok) = tokens.get(pos) {
            return Err(SigError::arg(input, format!("unexpected '{tok}'")));
        }

        let arg = Arg {
            name,
            modifiers,
            prim,
            ptr,
            asize,
        };
        arg.validate(input)?;
        Ok(arg)
    }

    fn validate(&self, input: &str) -> Result<()> {
        let m = self.modifiers;
        if self.ptr {
            if m.is_const == m.is_mut {
                return Err(SigError::arg(
                    input,
                    "pointer arguments need exactly one of 'const' or 'mut'",
                ));
            }
        } else if m.is_const || m.is_mut || m.nullable {
            return Err(SigError::arg(
                input,
                "'const', 'mut' and 'nullable' only apply to pointers",
            ));
        }
        Ok(())
    }

    /// Argument name, if declared.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Qualifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// The underlying primitive (the pointee for pointers).
    pub fn prim(&self) -> Prim {
        self.prim
    }

    /// Whether this is a pointer or array.
    pub fn is_ptr(&self) -> bool {
        self.ptr
    }

    /// Array size, if this argument is an array.
    pub fn asize(&self) -> Option<&ArraySize> {
        self.asize.as_ref()
    }

    /// Number of machine words this argument occupies.
    pub fn words(&self) -> u32 {
        if self.ptr {
            1
        } else {
            self.prim.words()
        }
    }

    /// Copy of this argument under a different name.
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }
}

impl PartialEq for Arg {
    fn eq(&self, other: &Self) -> bool {
        let sizes_match = match (&self.asize, &other.asize) {
            (None, None) => true,
            (Some(ArraySize::Fixed(a)), Some(ArraySize::Fixed(b))) => a == b,
            (Some(ArraySize::Named(_)), Some(ArraySize::Named(_))) => true,
            _ => false,
        };
        self.modifiers == other.modifiers
            && self.prim == other.prim
            && self.ptr == other.ptr
            && sizes_match
    }
}

impl Eq for Arg {}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.is_const {
            f.write_str("const ")?;
        }
        if self.modifiers.is_mut {
            f.write_str("mut ")?;
        }
        if self.modifiers.nullable {
            f.write_str("nullable ")?;
        }
        write!(f, "{}", self.prim)?;
        match &self.asize {
            Some(size) => write!(f, "[{size}]")?,
            None if self.ptr => f.write_str("*")?,
            None => {}
        }
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        Ok(())
    }
}

impl Serialize for Arg {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Whether `s` is a valid identifier that is not a reserved word.
pub(crate) fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let head_ok = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    head_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(s, "const" | "mut" | "nullable" | "fn" | "void" | "noreturn")
        && Prim::from_keyword(s).is_none()
}

/// Parse an integer literal with an optional `0x`/`0o`/`0b` prefix.
pub fn parse_int(s: &str) -> Option<u64> {
    let s = s.trim().replace('_', "");
    let (digits, radix) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (rest, 16)
    } else if let Some(rest) = s.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = s.strip_prefix("0b") {
        (rest, 2)
    } else {
        (s.as_str(), 10)
    };
    u64::from_str_radix(digits, radix).ok()
}

fn parse_array_size(input: &str, tok: &str) -> Result<ArraySize> {
    if tok.starts_with(|c: char| c.is_ascii_digit()) {
        let n = parse_int(tok)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| SigError::arg(input, format!("invalid array size '{tok}'")))?;
        Ok(ArraySize::Fixed(n))
    } else if is_ident(tok) {
        Ok(ArraySize::Named(tok.to_string()))
    } else {
        Err(SigError::arg(input, format!("invalid array size '{tok}'")))
    }
}

/// Split on whitespace, keeping `*`, `[` and `]` as separate tokens.
fn tokenize(s: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    for part in s.split_whitespace() {
        let mut remaining = part;
        while !remaining.is_empty() {
            match remaining.find(['*', '[', ']']) {
                Some(pos) => {
                    if pos > 0 {
                        tokens.push(&remaining[..pos]);
                    }
                    tokens.push(&remaining[pos..pos + 1]);
                    remaining = &remaining[pos + 1..];
                }
                None => {
                    tokens.push(remaining);
                    break;
                }
            }
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_scalar() {
        let arg = Arg::parse("i32").unwrap();
        assert_eq!(arg.prim(), Prim::I32);
        assert!(!arg.is_ptr());
        assert!(arg.name().is_none());
        assert_eq!(arg.words(), 1);
    }

    #[test]
    fn parse_named_forms() {
        let a = Arg::parse("len: usize").unwrap();
        let b = Arg::parse("usize len").unwrap();
        assert_eq!(a.name(), Some("len"));
        assert_eq!(b.name(), Some("len"));
        assert_eq!(a, b);
    }

    #[test]
    fn parse_pointer() {
        let arg = Arg::parse("const u8*").unwrap();
        assert!(arg.is_ptr());
        assert!(arg.modifiers().is_const);
        assert!(arg.asize().is_none());

        let spaced = Arg::parse("mut u8 * buf").unwrap();
        assert!(spaced.modifiers().is_mut);
        assert_eq!(spaced.name(), Some("buf"));
    }

    #[test]
    fn parse_arrays() {
        let fixed = Arg::parse("mut u8[0x10]").unwrap();
        assert_eq!(fixed.asize(), Some(&ArraySize::Fixed(16)));

        let dependent = Arg::parse("mut u8[n]").unwrap();
        assert_eq!(dependent.asize().and_then(ArraySize::as_name), Some("n"));
        assert_eq!(dependent.words(), 1);
    }

    #[test]
    fn parse_nullable() {
        let arg = Arg::parse("nullable const u32*").unwrap();
        assert!(arg.modifiers().nullable);
    }

    #[test]
    fn pointer_needs_exactly_one_of_const_or_mut() {
        assert!(Arg::parse("u8*").is_err());
        assert!(Arg::parse("const mut u8*").is_err());
        assert!(Arg::parse("nullable u8*").is_err());
    }

    #[test]
    fn modifiers_rejected_on_scalars() {
        assert!(Arg::parse("const i32").is_err());
        assert!(Arg::parse("nullable i32").is_err());
    }

    #[test]
    fn multi_level_indirection_rejected() {
        assert!(Arg::parse("const u8**").is_err());
        assert!(Arg::parse("const u8*[4]").is_err());
    }

    #[test]
    fn malformed_inputs() {
        assert!(Arg::parse("").is_err());
        assert!(Arg::parse("int").is_err());
        assert!(Arg::parse("mut u8[").is_err());
        assert!(Arg::parse("x: i32 y").is_err());
        assert!(Arg::parse("i32 a b").is_err());
        assert!(Arg::parse("const const u8*").is_err());
    }

    #[test]
    fn error_mentions_input() {
        let err = Arg::parse("const i32").unwrap_err();
        assert!(err.to_string().contains("const i32"));
    }

    #[test]
    fn equality_ignores_names() {
        let a = Arg::parse("const u8[n] buf").unwrap();
        let b = Arg::parse("const u8[len] data").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, Arg::parse("const u8[4]").unwrap());
        assert_ne!(a, Arg::parse("mut u8[n]").unwrap());
    }

    #[test]
    fn display_reparses_equal() {
        for s in [
            "i32",
            "usize size",
            "const u8*",
            "mut u8[n]",
            "nullable mut u32[8] out",
            "f64",
        ] {
            let arg = Arg::parse(s).unwrap();
            let again = Arg::parse(&arg.to_string()).unwrap();
            assert_eq!(arg, again, "{s}");
            assert_eq!(arg.name(), again.name());
        }
    }

    #[test]
    fn parse_int_prefixes() {
        assert_eq!(parse_int("0x20"), Some(32));
        assert_eq!(parse_int("0b101"), Some(5));
        assert_eq!(parse_int("0o17"), Some(15));
        assert_eq!(parse_int("1_024"), Some(1024));
        assert_eq!(parse_int("zz"), None);
    }
}
