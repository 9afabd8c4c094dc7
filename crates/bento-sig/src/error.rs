//! Signature grammar error types.

/// Errors that can occur while parsing or validating a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SigError {
    /// A single argument or return declaration is malformed.
    #[error("invalid argument {input:?}: {detail}")]
    InvalidArg { input: String, detail: String },

    /// A full function signature is malformed or violates an ABI limit.
    #[error("invalid signature {input:?}: {detail}")]
    InvalidSignature { input: String, detail: String },
}

impl SigError {
    pub(crate) fn arg(input: &str, detail: impl Into<String>) -> Self {
        SigError::InvalidArg {
            input: input.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn sig(input: &str, detail: impl Into<String>) -> Self {
        SigError::InvalidSignature {
            input: input.to_string(),
            detail: detail.into(),
        }
    }
}

/// Result type alias for signature operations.
pub type Result<T> = std::result::Result<T, SigError>;
