//! Function signatures.
//!
//! ```text
//! fn := 'fn' '(' arg-list ')' '->' (arg-list | 'void' | 'noreturn')
//! ```
//!
//! A signature is validated on construction against the cross-box calling
//! convention: at most four machine words of arguments, at most one return
//! value, unique names, and dependent array sizes that point at an integer
//! sibling argument.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::arg::{Arg, ArraySize};
use crate::error::{Result, SigError};

/// Maximum number of machine words that can be passed as arguments.
pub const MAX_ARG_WORDS: u32 = 4;

/// A validated function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    args: Vec<Arg>,
    rets: Vec<Arg>,
    noreturn: bool,
}

impl FnSig {
    /// Parse a signature string such as `fn(i32, const u8[n], usize n) -> errsize`.
    pub fn parse(input: &str) -> Result<Self> {
        let s = input.trim();
        let rest = s
            .strip_prefix("fn")
            .ok_or_else(|| SigError::sig(input, "expected 'fn'"))?
            .trim_start();
        let rest = rest
            .strip_prefix('(')
            .ok_or_else(|| SigError::sig(input, "missing '('"))?;
        let close = rest
            .find(')')
            .ok_or_else(|| SigError::sig(input, "missing ')'"))?;
        let (raw_args, rest) = (&rest[..close], rest[close + 1..].trim_start());
        let raw_rets = rest
            .strip_prefix("->")
            .ok_or_else(|| SigError::sig(input, "missing '->'"))?
            .trim();

        let args = parse_list(input, raw_args)?;
        let (rets, noreturn) = match raw_rets {
            "noreturn" => (Vec::new(), true),
            "" => return Err(SigError::sig(input, "missing return type")),
            _ => {
                let inner = raw_rets
                    .strip_prefix('(')
                    .and_then(|r| r.strip_suffix(')'))
                    .unwrap_or(raw_rets);
                (parse_list(input, inner)?, false)
            }
        };

        Self::build(input, args, rets, noreturn)
    }

    /// Construct a signature from already parsed parts.
    pub fn new(args: Vec<Arg>, rets: Vec<Arg>, noreturn: bool) -> Result<Self> {
        let rendered = render(&args, &rets, noreturn);
        Self::build(&rendered, args, rets, noreturn)
    }

    fn build(input: &str, args: Vec<Arg>, rets: Vec<Arg>, noreturn: bool) -> Result<Self> {
        if rets.len() > 1 {
            return Err(SigError::sig(
                input,
                format!("at most one return value is supported, found {}", rets.len()),
            ));
        }
        if noreturn && !rets.is_empty() {
            return Err(SigError::sig(input, "noreturn function cannot return a value"));
        }

        let words: u32 = args.iter().map(Arg::words).sum();
        if words > MAX_ARG_WORDS {
            return Err(SigError::sig(
                input,
                format!("arguments need {words} words, at most {MAX_ARG_WORDS} are supported"),
            ));
        }

        let mut seen: Vec<&str> = Vec::new();
        for name in args.iter().chain(rets.iter()).filter_map(Arg::name) {
            if seen.contains(&name) {
                return Err(SigError::sig(input, format!("duplicate name '{name}'")));
            }
            seen.push(name);
        }

        for (i, arg) in args.iter().enumerate() {
            let Some(dep) = arg.asize().and_then(ArraySize::as_name) else {
                continue;
            };
            let target = args
                .iter()
                .enumerate()
                .find(|(_, a)| a.name() == Some(dep));
            match target {
                None => {
                    return Err(SigError::sig(
                        input,
                        format!("array size '{dep}' does not name an argument"),
                    ));
                }
                Some((j, _)) if j == i => {
                    return Err(SigError::sig(
                        input,
                        format!("array '{dep}' cannot be sized by itself"),
                    ));
                }
                Some((_, a)) if a.is_ptr() || !a.prim().is_integer() => {
                    return Err(SigError::sig(
                        input,
                        format!("array size '{dep}' must name an integer argument"),
                    ));
                }
                Some(_) => {}
            }
        }

        if let Some(ret) = rets.iter().find(|r| r.asize().and_then(ArraySize::as_name).is_some()) {
            return Err(SigError::sig(
                input,
                format!("return value '{ret}' cannot have a dependent size"),
            ));
        }

        Ok(FnSig {
            args,
            rets,
            noreturn,
        })
    }

    /// Arguments in declaration order.
    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Return values (zero or one).
    pub fn rets(&self) -> &[Arg] {
        &self.rets
    }

    /// Whether the function never returns.
    pub fn is_noreturn(&self) -> bool {
        self.noreturn
    }

    /// Total argument payload in machine words.
    pub fn arg_words(&self) -> u32 {
        self.args.iter().map(Arg::words).sum()
    }

    /// Position of the sibling argument that sizes `args()[index]`, if any.
    pub fn dependent_index(&self, index: usize) -> Option<usize> {
        let dep = self.args.get(index)?.asize()?.as_name()?;
        self.args.iter().position(|a| a.name() == Some(dep))
    }

    /// Whether two signatures can be bound to each other.
    ///
    /// Argument names are irrelevant; dependent sizes must refer to the same
    /// argument position on both sides.
    pub fn is_compatible(&self, other: &FnSig) -> bool {
        self.noreturn == other.noreturn
            && self.args == other.args
            && self.rets == other.rets
            && (0..self.args.len()).all(|i| self.dependent_index(i) == other.dependent_index(i))
    }
}

impl fmt::Display for FnSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.args, &self.rets, self.noreturn))
    }
}

impl Serialize for FnSig {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn render(args: &[Arg], rets: &[Arg], noreturn: bool) -> String {
    let join = |list: &[Arg]| {
        list.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let rets = if noreturn {
        "noreturn".to_string()
    } else if rets.is_empty() {
        "void".to_string()
    } else {
        join(rets)
    };
    format!("fn({}) -> {}", join(args), rets)
}

fn parse_list(input: &str, list: &str) -> Result<Vec<Arg>> {
    let list = list.trim();
    if list.is_empty() || list == "void" {
        return Ok(Vec::new());
    }
    list.split(',')
        .map(|part| {
            if part.trim().is_empty() {
                Err(SigError::sig(input, "empty entry in list"))
            } else {
                Arg::parse(part)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prim::Prim;

    #[test]
    fn parse_write_signature() {
        let sig = FnSig::parse("fn(i32, const u8[size], usize size) -> errsize").unwrap();
        assert_eq!(sig.args().len(), 3);
        assert_eq!(sig.rets()[0].prim(), Prim::Errsize);
        assert_eq!(sig.dependent_index(1), Some(2));
        assert_eq!(sig.dependent_index(0), None);
        assert_eq!(sig.arg_words(), 3);
    }

    #[test]
    fn parse_void_and_noreturn() {
        let v = FnSig::parse("fn() -> void").unwrap();
        assert!(v.args().is_empty());
        assert!(v.rets().is_empty());
        assert!(!v.is_noreturn());

        let n = FnSig::parse("fn(err) -> noreturn").unwrap();
        assert!(n.is_noreturn());

        let paren = FnSig::parse("fn(void) -> (i32)").unwrap();
        assert!(paren.args().is_empty());
        assert_eq!(paren.rets().len(), 1);
    }

    #[test]
    fn malformed_signatures() {
        for s in ["", "fn", "fn(i32", "fn(i32) i32", "fn(i32) ->", "fn(i32,,i32) -> void", "fun() -> void"] {
            assert!(FnSig::parse(s).is_err(), "{s:?}");
        }
    }

    #[test]
    fn too_many_words() {
        assert!(FnSig::parse("fn(i32, i32, i32, i32) -> void").is_ok());
        assert!(FnSig::parse("fn(i32, i32, i32, i32, i32) -> void").is_err());
        assert!(FnSig::parse("fn(i64, i64, i32) -> void").is_err());
    }

    #[test]
    fn too_many_returns() {
        let err = FnSig::parse("fn() -> i32, i32").unwrap_err();
        assert!(err.to_string().contains("at most one return"));
    }

    #[test]
    fn duplicate_names() {
        assert!(FnSig::parse("fn(i32 a, i32 a) -> void").is_err());
        assert!(FnSig::parse("fn(i32 a) -> i32 a").is_err());
    }

    #[test]
    fn dependent_size_must_name_sibling() {
        assert!(FnSig::parse("fn(mut u8[n], usize n) -> err").is_ok());
        let err = FnSig::parse("fn(mut u8[n], usize) -> err").unwrap_err();
        assert!(err.to_string().contains("'n'"));
        assert!(FnSig::parse("fn(mut u8[n], const u8* n) -> err").is_err());
    }

    #[test]
    fn dependent_size_return_rejected() {
        assert!(FnSig::parse("fn(usize n) -> const u8[n]").is_err());
        assert!(FnSig::parse("fn() -> const u8[4]").is_ok());
    }

    #[test]
    fn compatibility_ignores_names() {
        let a = FnSig::parse("fn(i32 fd, const u8[len] buf, usize len) -> errsize").unwrap();
        let b = FnSig::parse("fn(i32, const u8[size], usize size) -> errsize").unwrap();
        assert!(a.is_compatible(&b));
        assert!(b.is_compatible(&a));
        assert!(a.is_compatible(&a));
    }

    #[test]
    fn compatibility_checks_dependent_positions() {
        let a = FnSig::parse("fn(const u8[x], usize x, usize y) -> void").unwrap();
        let b = FnSig::parse("fn(const u8[y], usize x, usize y) -> void").unwrap();
        assert!(!a.is_compatible(&b));
    }

    #[test]
    fn incompatible_shapes() {
        let base = FnSig::parse("fn(i32, const u8*) -> err").unwrap();
        for other in [
            "fn(i32) -> err",
            "fn(u32, const u8*) -> err",
            "fn(i32, u32) -> err",
            "fn(i32, mut u8*) -> err",
            "fn(i32, const u8*) -> void",
            "fn(i32, const u8*) -> noreturn",
        ] {
            let other = FnSig::parse(other).unwrap();
            assert!(!base.is_compatible(&other), "{other}");
            assert!(!other.is_compatible(&base), "{other}");
        }
    }

    #[test]
    fn display_reparses() {
        let sig = FnSig::parse("fn(i32, const u8[size], usize size) -> errsize").unwrap();
        assert_eq!(sig.to_string(), "fn(i32, const u8[size], usize size) -> errsize");
        let again = FnSig::parse(&sig.to_string()).unwrap();
        assert!(sig.is_compatible(&again));
    }

    #[test]
    fn construct_from_parts() {
        let sig = FnSig::new(
            vec![Arg::parse("u32").unwrap()],
            vec![Arg::parse("err").unwrap()],
            false,
        )
        .unwrap();
        assert_eq!(sig.to_string(), "fn(u32) -> err");
        assert!(FnSig::new(Vec::new(), vec![Arg::parse("i32").unwrap()], true).is_err());
    }
}
