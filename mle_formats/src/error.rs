use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Broad classification of a registry failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes on disk do not describe a valid registry.
    MalformedInput,
    /// The file could not be found, read, or was empty.
    Resource,
}

/// Error conditions returned by the registry readers.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("reading registry {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("registry file is empty")]
    EmptyFile,
    #[error("registry magic mismatch: expected {expected:?}, found {found:?}")]
    BadMagic { expected: String, found: String },
    #[error("{what} at offset {offset} needs {needed} bytes but the registry holds {len}")]
    Truncated {
        what: &'static str,
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("record {index} offset {offset} lies beyond the registry length {len}")]
    OffsetOutOfBounds {
        index: usize,
        offset: usize,
        len: usize,
    },
    #[error("registry text ended before {field}")]
    UnexpectedEof { field: &'static str },
    #[error("{field} is not a valid number: {token:?}")]
    InvalidNumber { field: &'static str, token: String },
    #[error("{field} {name:?} does not fit in {max} bytes")]
    NameTooLong {
        field: &'static str,
        name: String,
        max: usize,
    },
    #[error("text registry is not valid UTF-8")]
    NotUtf8,
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::Io { .. } | RegistryError::EmptyFile => ErrorKind::Resource,
            _ => ErrorKind::MalformedInput,
        }
    }
}

pub type Result<T, E = RegistryError> = std::result::Result<T, E>;
