//! Crate-wide error type.
//!
//! Mirrors the teacher's hand-rolled `Error` enum rather than reaching for
//! `thiserror`: one variant per `fails with X` in the spec, a manual
//! `Display`, and `From<io::Error>` for the `?` operator at I/O boundaries.

use std::fmt;

#[derive(Debug)]
pub enum Error {
    /// Read/write/open failure against the database file.
    Io(std::io::Error),
    /// Header magic or page size mismatch at open.
    Corruption(String),
    /// `insert` on a key already present.
    DuplicateKey(u32),
    /// `update`/`delete` on a key that isn't present.
    NotFound(u32),
    /// Malformed command or WHERE expression.
    Parse(String),
    /// A comparison whose literal doesn't match the column's type.
    Type(String),
    /// `COMMIT`/`ROLLBACK` without `BEGIN`, or nested `BEGIN`.
    TransactionState(String),
    /// Anything else internal (corrupt page layout, bad offsets, etc).
    Storage(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Corruption(msg) => write!(f, "Corruption error: {}", msg),
            Error::DuplicateKey(id) => write!(f, "Duplicate key: {}.", id),
            Error::NotFound(id) => write!(f, "Key not found: {}.", id),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Type(msg) => write!(f, "Type error: {}", msg),
            Error::TransactionState(msg) => write!(f, "Transaction error: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl Error {
    /// True for errors spec.md classifies as fatal (session must terminate
    /// with a non-zero exit code).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Corruption(_))
    }

    /// The `Error: <class>.` prefix used by the REPL's error line format.
    pub fn class(&self) -> &'static str {
        match self {
            Error::Io(_) => "I/O error",
            Error::Corruption(_) => "Corruption error",
            Error::DuplicateKey(_) => "Duplicate key",
            Error::NotFound(_) => "Not found",
            Error::Parse(_) => "Parse error",
            Error::Type(_) => "Type error",
            Error::TransactionState(_) => "Transaction error",
            Error::Storage(_) => "Storage error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
