use crate::class::{ActorRef, RoleRef};
use crate::error::{LoadError, Result};

/// One created actor, in stream order.
#[derive(Clone)]
pub struct ActorRegistryEntry {
    pub actor: ActorRef,
    pub role: Option<RoleRef>,
    pub class_index: u32,
}

impl std::fmt::Debug for ActorRegistryEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRegistryEntry")
            .field("class_index", &self.class_index)
            .field("has_role", &self.role.is_some())
            .finish()
    }
}

/// Actors created by one group stream. Later opcodes refer to actors by
/// their position here, so entries are only ever appended.
#[derive(Debug, Default)]
pub struct ActorRegistry {
    entries: Vec<ActorRegistryEntry>,
    capacity: usize,
}

impl ActorRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        ActorRegistry {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an actor and returns its index.
    pub fn push(&mut self, actor: ActorRef, class_index: u32) -> Result<usize> {
        if self.entries.len() >= self.capacity {
            return Err(LoadError::RegistryFull {
                capacity: self.capacity,
            });
        }
        self.entries.push(ActorRegistryEntry {
            actor,
            role: None,
            class_index,
        });
        Ok(self.entries.len() - 1)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ActorRegistryEntry> {
        self.entries.get(index)
    }

    pub fn last(&self) -> Option<&ActorRegistryEntry> {
        self.entries.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut ActorRegistryEntry> {
        self.entries.last_mut()
    }

    /// Looks up an actor named by a stream operand.
    pub fn entry(&self, index: usize) -> Result<&ActorRegistryEntry> {
        self.entries.get(index).ok_or(LoadError::ActorIndexOutOfRange {
            index,
            created: self.entries.len(),
        })
    }

    /// Records the role bound to actor `index`.
    pub fn set_role(&mut self, index: usize, role: RoleRef) -> Result<()> {
        let created = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(LoadError::ActorIndexOutOfRange { index, created })?;
        entry.role = Some(role);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ActorRegistryEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<ActorRegistryEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a ActorRegistry {
    type Item = &'a ActorRegistryEntry;
    type IntoIter = std::slice::Iter<'a, ActorRegistryEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
