pub mod anim;
pub mod chr;
pub mod endian;
pub mod error;
pub mod layout;

pub use anim::{Animation, AnimationRegistry, Sequence, Transform, ANIMATION_MAGIC};
pub use chr::{
    Character, CharacterFormat, CharacterRegistry, Snippet, Transition, CHARACTER_MAGIC,
};
pub use endian::Endian;
pub use error::{ErrorKind, RegistryError};
