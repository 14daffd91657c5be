//! Error types for lsmdb.

use std::fmt;

/// The main error type for lsmdb operations.
#[derive(Debug)]
pub enum Error {
    /// A lock was poisoned (internal error)
    LockPoisoned,

    /// I/O error
    Io(std::io::Error),

    /// Serialization/deserialization error
    Serialization(String),

    /// Storage engine error
    Storage(String),

    /// On-disk data failed a checksum or format check
    Corruption(String),

    /// Invalid or immutable configuration value
    Config(String),

    /// Rejected input (oversized key, non-numeric counter, ...)
    InvalidArgument(String),

    /// Operation is not valid in the current state
    Misuse(String),

    /// The database file is locked by another handle
    Busy(String),

    /// Key or seek target not found
    NotFound,
}

impl Error {
    /// Numeric result code, compatible with the LSM engine's `LSM_*` codes.
    pub fn code(&self) -> i32 {
        match self {
            Error::Busy(_) => 5,
            Error::Io(_) => 10,
            Error::Corruption(_) => 11,
            Error::NotFound => 16,
            Error::Misuse(_) => 21,
            _ => 1,
        }
    }

    /// Returns `true` for [`Error::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::LockPoisoned => write!(f, "Lock poisoned"),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Corruption(msg) => write!(f, "Corruption: {}", msg),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::Misuse(msg) => write!(f, "Misuse: {} ({})", self.code(), msg),
            Error::Busy(msg) => write!(f, "Busy: {}", msg),
            Error::NotFound => write!(f, "Not found"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// A specialized `Result` type for lsmdb operations.
pub type Result<T> = std::result::Result<T, Error>;
