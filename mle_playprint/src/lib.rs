pub mod assemble;
pub mod class;
pub mod cursor;
pub mod disasm;
pub mod error;
pub mod interp;
pub mod loader;
pub mod media;
pub mod opcode;
pub mod playprint;
pub mod registry;
pub mod varint;

pub use assemble::{Assembler, group_chunk, scene_chunk};
pub use class::{
    Actor, ActorRef, ClassKind, ClassRegistry, Group, GroupRef, PropertyArray, PropertyEntry,
    PropertyTarget, PropertyValue, Role, RoleRef, Scene, SceneRef, Set, SetRef,
};
pub use cursor::ByteCursor;
pub use disasm::{GroupListing, Instruction, Operand, disassemble, disassemble_group};
pub use error::{ErrorKind, HostError, LoadError};
pub use interp::{ChunkKind, LoadContext, ParsedStream, SetTable, parse_stream};
pub use loader::{ChunkSource, ChunkTable, LoadedGroup, LoadedScene, Loader};
pub use media::{MediaRefChunk, MediaRefEntry, MediaRefInfo, MediaRefRecord};
pub use mle_formats::Endian;
pub use opcode::Opcode;
pub use playprint::{ChunkInfo, ChunkTag, Playprint, PlayprintHeader, PlayprintWriter, TocEntry};
pub use registry::{ActorRegistry, ActorRegistryEntry};
