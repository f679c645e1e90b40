//! Error types for diagnostic decoding and TAP serialization.
//!
//! Parsing TAP itself never fails: anomalies in the stream are recorded on the
//! summary instead. The errors here cover the two places where a caller gets
//! an explicit failure: a diagnostic block that cannot be decoded (attached to
//! its test point) and a serialization request that cannot be honoured.

use thiserror::Error;

/// Result type for serialization operations.
pub type Result<T> = std::result::Result<T, StringifyError>;

/// Failure to decode the content of a fenced diagnostic block.
///
/// Line numbers are one-based and count from the first line after the
/// opening `---` fence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticError {
    /// Tab character used for indentation.
    #[error("Tab not allowed in indentation at line {line}")]
    TabNotAllowed { line: usize },

    /// Line indented where no nested value may start.
    #[error("Unexpected indent at line {line}")]
    UnexpectedIndent { line: usize },

    /// Line inside a mapping that is not a `key: value` entry.
    #[error("Expected `key: value` at line {line}")]
    ExpectedKey { line: usize },

    /// Same key appears twice in one mapping.
    #[error("Duplicate key \"{key}\" at line {line}")]
    DuplicateKey { key: String, line: usize },

    /// Quoted scalar without its closing quote.
    #[error("Unterminated string at line {line}")]
    UnterminatedString { line: usize },

    /// Unknown or malformed backslash escape in a double-quoted scalar.
    #[error("Bad escape sequence at line {line}")]
    BadEscape { line: usize },

    /// Malformed flow collection (`[...]` or `{...}`).
    #[error("Malformed flow collection at line {line}")]
    InvalidFlow { line: usize },

    /// Trailing characters after a complete scalar.
    #[error("Unexpected extra content at line {line}")]
    ExtraContent { line: usize },

    /// The block decoded to something other than a mapping.
    #[error("Diagnostic block must be a mapping")]
    NotAMapping,

    /// Input ended, or indentation fell back, before the closing `...` fence.
    #[error("Diagnostic block is missing its closing fence")]
    Unterminated,
}

/// Failure to encode a value as a diagnostic block.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Diagnostics must be a mapping at the top level.
    #[error("Diagnostics must be a mapping, found {0}")]
    NotAMapping(&'static str),

    /// A mapping carries the same key more than once.
    #[error("Duplicate key \"{0}\" in diagnostics")]
    DuplicateKey(String),
}

/// Failure to serialize parse results back to TAP.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StringifyError {
    /// A test point's diagnostics cannot be written as a block.
    #[error("Cannot encode diagnostics of test point {id}: {source}")]
    Diagnostics {
        id: u64,
        #[source]
        source: EncodeError,
    },

    /// A plan whose range cannot be written as `start..end`.
    #[error("Invalid plan range {start}..{end}")]
    InvalidPlan { start: u64, end: u64 },
}
