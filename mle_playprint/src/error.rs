use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::class::ClassKind;
use crate::interp::ChunkKind;
use crate::opcode::Opcode;

/// Broad classification of a load failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes do not form a valid stream or container.
    MalformedInput,
    /// The stream is well formed but asks for something the encoder and the
    /// interpreter disagree on (missing prior opcode, bad index, reattachment).
    ContractViolation,
    /// The playprint could not be opened or read.
    Resource,
}

/// Error returned by a host object (property setter, set attachment).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        HostError(message.into())
    }
}

/// Error conditions returned while loading playprint content.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read of {needed} bytes at offset {offset} runs past the end of a {len}-byte stream")]
    OutOfBoundsRead {
        offset: usize,
        needed: usize,
        len: usize,
    },
    #[error("unknown opcode {opcode:#04x} at offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("index at offset {offset} does not fit in 31 bits")]
    IndexOverflow { offset: usize },
    #[error("malformed stream at offset {offset}: {reason}")]
    MalformedStream { offset: usize, reason: String },

    #[error("{opcode:?} requires a current actor")]
    NoCurrentActor { opcode: Opcode },
    #[error("{opcode:?} requires a current set")]
    NoCurrentSet { opcode: Opcode },
    #[error("bindRole without a preceding setSet")]
    NoPendingSet,
    #[error("{opcode:?} requires a preceding setPropertyOffset")]
    NoPropertySelected { opcode: Opcode },
    #[error("actor {child} has already been attached to a parent role")]
    DuplicateAttachment { child: usize },
    #[error("parent actor {parent:?} and child actor {child} are not bound to the same set")]
    SetMismatch { parent: Option<usize>, child: usize },
    #[error("actor {actor} has no role to attach")]
    MissingRole { actor: usize },
    #[error("actor index {index} refers past the {created} actors created so far")]
    ActorIndexOutOfRange { index: usize, created: usize },
    #[error("actor registry is full ({capacity} entries)")]
    RegistryFull { capacity: usize },
    #[error("no {kind:?} class registered at index {index}")]
    UnknownClass { kind: ClassKind, index: u32 },
    #[error("no {chunk:?} property registered at index {index}")]
    UnknownProperty { chunk: ChunkKind, index: u32 },
    #[error("property length {length} exceeds the {size}-byte actor class {class}")]
    PropertyTooLarge {
        class: String,
        length: usize,
        size: usize,
    },
    #[error("setting property {name}: {source}")]
    Property {
        name: String,
        #[source]
        source: HostError,
    },
    #[error("attaching role of actor {actor}: {source}")]
    Attach {
        actor: usize,
        #[source]
        source: HostError,
    },

    #[error("opening playprint {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("playprint is not a {expected} form (found {found:?})")]
    BadForm { expected: &'static str, found: String },
    #[error("playprint has no table of contents")]
    MissingToc,
    #[error("table of contents index {index} out of range ({len} entries)")]
    TocIndexOutOfRange { index: u32, len: usize },
    #[error("chunk at offset {offset} extends past the end of the playprint")]
    ChunkOutOfBounds { offset: usize },
    #[error("table of contents entry {index} is a {found} chunk, expected {expected}")]
    UnexpectedChunk {
        index: u32,
        expected: &'static str,
        found: String,
    },
}

impl LoadError {
    pub fn kind(&self) -> ErrorKind {
        use LoadError::*;
        match self {
            OutOfBoundsRead { .. }
            | UnknownOpcode { .. }
            | MalformedStream { .. }
            | BadForm { .. }
            | MissingToc
            | ChunkOutOfBounds { .. }
            | UnexpectedChunk { .. } => ErrorKind::MalformedInput,
            Io { .. } => ErrorKind::Resource,
            _ => ErrorKind::ContractViolation,
        }
    }
}

pub type Result<T, E = LoadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_errors() {
        assert_eq!(
            LoadError::UnknownOpcode { opcode: 0x42, offset: 0 }.kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            LoadError::IndexOverflow { offset: 3 }.kind(),
            ErrorKind::ContractViolation
        );
        assert_eq!(
            LoadError::DuplicateAttachment { child: 1 }.kind(),
            ErrorKind::ContractViolation
        );
        assert_eq!(
            LoadError::SetMismatch { parent: None, child: 1 }.kind(),
            ErrorKind::ContractViolation
        );
        let io = LoadError::Io {
            path: PathBuf::from("title.dpp"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(io.kind(), ErrorKind::Resource);
    }
}
