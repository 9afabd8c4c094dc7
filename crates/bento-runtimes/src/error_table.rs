//! Error codes shared by every box.
//!
//! Codes follow POSIX errno numbering and travel negated: an `err` value
//! is non-negative on success and `-code` on failure.

use bento_core::{Artifacts, BoxId, BoxTree, OnBuild, Result};
use serde::Serialize;
use serde_json::json;

/// A named error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorCode {
    /// Name without the `E` prefix.
    pub name: &'static str,
    /// Positive code; the wire value is its negation.
    pub code: u32,
    pub doc: &'static str,
}

impl ErrorCode {
    /// Value passed across a box boundary.
    pub fn wire(&self) -> i32 {
        -(self.code as i32)
    }

    /// Identifier for generated code, e.g. `ENOENT`. Names starting with a
    /// digit use their spelled-out form (`2BIG` becomes `TOOBIG`).
    pub fn ident(&self) -> String {
        match self.name {
            "2BIG" => "ETOOBIG".to_string(),
            name => format!("E{name}"),
        }
    }
}

macro_rules! errors {
    ($(($name:literal, $code:literal, $doc:literal)),* $(,)?) => {
        &[$(ErrorCode { name: $name, code: $code, doc: $doc }),*]
    };
}

/// Every known error code, in ascending order.
pub const ERRORS: &[ErrorCode] = errors![
    ("OK", 0, "No error"),
    ("GENERAL", 1, "General error"),
    ("NOENT", 2, "No such file or directory"),
    ("SRCH", 3, "No such process"),
    ("INTR", 4, "Interrupted system call"),
    ("IO", 5, "I/O error"),
    ("NXIO", 6, "No such device or address"),
    ("2BIG", 7, "Argument list too long"),
    ("NOEXEC", 8, "Exec format error"),
    ("BADF", 9, "Bad file number"),
    ("CHILD", 10, "No child processes"),
    ("AGAIN", 11, "Try again"),
    ("NOMEM", 12, "Out of memory"),
    ("ACCES", 13, "Permission denied"),
    ("FAULT", 14, "Bad address"),
    ("BUSY", 16, "Device or resource busy"),
    ("EXIST", 17, "File exists"),
    ("XDEV", 18, "Cross-device link"),
    ("NODEV", 19, "No such device"),
    ("NOTDIR", 20, "Not a directory"),
    ("ISDIR", 21, "Is a directory"),
    ("INVAL", 22, "Invalid argument"),
    ("NFILE", 23, "File table overflow"),
    ("MFILE", 24, "Too many open files"),
    ("NOTTY", 25, "Not a typewriter"),
    ("TXTBSY", 26, "Text file busy"),
    ("FBIG", 27, "File too large"),
    ("NOSPC", 28, "No space left on device"),
    ("SPIPE", 29, "Illegal seek"),
    ("ROFS", 30, "Read-only file system"),
    ("MLINK", 31, "Too many links"),
    ("PIPE", 32, "Broken pipe"),
    ("DOM", 33, "Math argument out of domain of func"),
    ("RANGE", 34, "Math result not representable"),
    ("DEADLK", 35, "Resource deadlock would occur"),
    ("NAMETOOLONG", 36, "File name too long"),
    ("NOLCK", 37, "No record locks available"),
    ("NOSYS", 38, "Function not implemented"),
    ("NOTEMPTY", 39, "Directory not empty"),
    ("LOOP", 40, "Too many symbolic links encountered"),
    ("NOMSG", 42, "No message of desired type"),
    ("IDRM", 43, "Identifier removed"),
    ("NOSTR", 60, "Device not a stream"),
    ("NODATA", 61, "No data available"),
    ("TIME", 62, "Timer expired"),
    ("NOSR", 63, "Out of streams resources"),
    ("NOLINK", 67, "Link has been severed"),
    ("PROTO", 71, "Protocol error"),
    ("MULTIHOP", 72, "Multihop attempted"),
    ("BADMSG", 74, "Not a data message"),
    ("OVERFLOW", 75, "Value too large for defined data type"),
    ("ILSEQ", 84, "Illegal byte sequence"),
    ("NOTSOCK", 88, "Socket operation on non-socket"),
    ("DESTADDRREQ", 89, "Destination address required"),
    ("MSGSIZE", 90, "Message too long"),
    ("PROTOTYPE", 91, "Protocol wrong type for socket"),
    ("NOPROTOOPT", 92, "Protocol not available"),
    ("PROTONOSUPPORT", 93, "Protocol not supported"),
    ("OPNOTSUPP", 95, "Operation not supported on transport endpoint"),
    ("AFNOSUPPORT", 97, "Address family not supported by protocol"),
    ("ADDRINUSE", 98, "Address already in use"),
    ("ADDRNOTAVAIL", 99, "Cannot assign requested address"),
    ("NETDOWN", 100, "Network is down"),
    ("NETUNREACH", 101, "Network is unreachable"),
    ("NETRESET", 102, "Network dropped connection because of reset"),
    ("CONNABORTED", 103, "Software caused connection abort"),
    ("CONNRESET", 104, "Connection reset by peer"),
    ("NOBUFS", 105, "No buffer space available"),
    ("ISCONN", 106, "Transport endpoint is already connected"),
    ("NOTCONN", 107, "Transport endpoint is not connected"),
    ("TIMEDOUT", 110, "Connection timed out"),
    ("CONNREFUSED", 111, "Connection refused"),
    ("HOSTUNREACH", 113, "No route to host"),
    ("ALREADY", 114, "Operation already in progress"),
    ("INPROGRESS", 115, "Operation now in progress"),
    ("STALE", 116, "Stale NFS file handle"),
    ("DQUOT", 122, "Quota exceeded"),
    ("CANCELED", 125, "Operation Canceled"),
    ("OWNERDEAD", 130, "Owner died"),
    ("NOTRECOVERABLE", 131, "State not recoverable"),
];

/// Look up a code by name, with or without the `E` prefix.
pub fn by_name(name: &str) -> Option<&'static ErrorCode> {
    let upper = name.to_ascii_uppercase();
    ERRORS.iter().find(|e| {
        e.name == upper || e.ident() == upper || upper.strip_prefix('E') == Some(e.name)
    })
}

/// Look up a code by number; negative wire values are accepted too.
pub fn by_code(code: i64) -> Option<&'static ErrorCode> {
    let code = code.unsigned_abs();
    ERRORS.iter().find(|e| u64::from(e.code) == code)
}

/// Publishes the error table so generated code agrees on the numbering.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorTable;

impl OnBuild for ErrorTable {
    fn name(&self) -> &str {
        "error_table"
    }

    fn on_build(&self, tree: &BoxTree, id: BoxId, artifacts: &mut Artifacts) -> Result<()> {
        let entries: Vec<_> = ERRORS
            .iter()
            .map(|e| json!({ "name": e.ident(), "value": e.wire(), "doc": e.doc }))
            .collect();
        artifacts.push(&tree.get(id).name, self.name(), "errors", json!(entries));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bento_core::BoxNode;

    #[test]
    fn table_is_sorted_and_unique() {
        assert!(ERRORS.windows(2).all(|w| w[0].code < w[1].code));
        assert_eq!(ERRORS[0].name, "OK");
    }

    #[test]
    fn lookups() {
        assert_eq!(by_name("NOENT").unwrap().code, 2);
        assert_eq!(by_name("enomem").unwrap().code, 12);
        assert_eq!(by_name("ETOOBIG").unwrap().code, 7);
        assert_eq!(by_code(-22).unwrap().name, "INVAL");
        assert_eq!(by_code(22).unwrap().wire(), -22);
        assert!(by_code(15).is_none());
        assert!(by_name("EWHATEVER").is_none());
    }

    #[test]
    fn build_emits_table() {
        let tree = BoxTree::new(BoxNode::new("sys", "system"));
        let mut artifacts = Artifacts::default();
        ErrorTable.on_build(&tree, tree.root(), &mut artifacts).unwrap();
        let table = &artifacts.find("sys", "errors").unwrap().content;
        assert_eq!(table.as_array().unwrap().len(), ERRORS.len());
        assert_eq!(table[2]["name"], "ENOENT");
        assert_eq!(table[2]["value"], -2);
    }
}
