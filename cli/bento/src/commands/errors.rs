//! `bento errors`: the shared error table.

use anyhow::{bail, Result};
use bento_runtimes::error_table::{by_code, by_name, ErrorCode, ERRORS};

pub fn run(query: Option<&str>) -> Result<()> {
    match query {
        Some(q) => {
            let code = lookup(q)?;
            println!("{}", line(code));
        }
        None => {
            for code in ERRORS {
                println!("{}", line(code));
            }
        }
    }
    Ok(())
}

/// Find an error by name (`ENOENT`, `noent`) or number (`2`, `-2`).
pub fn lookup(query: &str) -> Result<&'static ErrorCode> {
    let found = match query.parse::<i64>() {
        Ok(n) => by_code(n),
        Err(_) => by_name(query),
    };
    match found {
        Some(code) => Ok(code),
        None => bail!("unknown error: '{query}'. Use 'bento errors' to list them."),
    }
}

fn line(code: &ErrorCode) -> String {
    format!("  {:<16} {:>4}  {}", code.ident(), code.wire(), code.doc)
}
