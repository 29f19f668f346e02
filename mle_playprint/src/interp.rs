//! Actor-graph interpreter.
//!
//! [`parse_stream`] walks one opcode stream and builds actors, roles and sets
//! through the host's [`ClassRegistry`]. Everything a load mutates lives in
//! a [`LoadContext`] owned by the caller, so two loads never share state and
//! a failed load can be dropped wholesale.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::class::{
    ActorRef, ClassRegistry, PropertyArray, PropertyEntry, PropertyValue, RoleRef, SetRef,
};
use crate::cursor::ByteCursor;
use crate::error::{LoadError, Result};
use crate::opcode::Opcode;
use crate::registry::ActorRegistry;

/// The kind of chunk a stream came from. Selects the property table and
/// whether property opcodes write into the current actor or the current set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChunkKind {
    Group,
    Set,
}

/// Sets by set index.
pub type SetTable = BTreeMap<u32, SetRef>;

/// Mutable state of one group or set load.
pub struct LoadContext<'c> {
    classes: &'c ClassRegistry,
    sets: &'c SetTable,
    new_sets: SetTable,
    registry: ActorRegistry,
    actor_sets: Vec<Option<u32>>,
    attached: Vec<bool>,
    current_set: Option<(u32, SetRef)>,
}

/// What a successful load leaves behind.
pub struct ParsedStream {
    pub registry: ActorRegistry,
    /// Set index each actor's role was bound into, by actor index.
    pub actor_sets: Vec<Option<u32>>,
    /// Sets created by this stream, not yet in the caller's table.
    pub new_sets: SetTable,
}

impl std::fmt::Debug for ParsedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedStream")
            .field("registry", &self.registry)
            .field("actor_sets", &self.actor_sets)
            .field("new_sets", &self.new_sets.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<'c> LoadContext<'c> {
    /// `capacity` is the number of actors the stream may create.
    pub fn new(classes: &'c ClassRegistry, sets: &'c SetTable, capacity: usize) -> Self {
        LoadContext {
            classes,
            sets,
            new_sets: SetTable::new(),
            registry: ActorRegistry::with_capacity(capacity),
            actor_sets: Vec::with_capacity(capacity),
            attached: Vec::with_capacity(capacity),
            current_set: None,
        }
    }

    pub fn registry(&self) -> &ActorRegistry {
        &self.registry
    }

    /// A set created by this load or already present in the caller's table.
    pub fn set(&self, index: u32) -> Option<SetRef> {
        self.new_sets
            .get(&index)
            .or_else(|| self.sets.get(&index))
            .cloned()
    }

    /// Returns the set at `index`, constructing it on first use.
    pub fn load_set(&mut self, index: u32) -> Result<SetRef> {
        if let Some(set) = self.set(index) {
            return Ok(set);
        }
        let set = self.classes.create_set(index)?;
        log::debug!("created set {index} ({})", self.classes.set_class(index)?.name());
        self.new_sets.insert(index, set.clone());
        Ok(set)
    }

    pub fn current_set(&self) -> Option<&SetRef> {
        self.current_set.as_ref().map(|(_, set)| set)
    }

    pub fn actor_set(&self, actor: usize) -> Option<u32> {
        self.actor_sets.get(actor).copied().flatten()
    }

    pub fn is_attached(&self, actor: usize) -> bool {
        self.attached.get(actor).copied().unwrap_or(false)
    }

    pub fn finish(self) -> ParsedStream {
        ParsedStream {
            registry: self.registry,
            actor_sets: self.actor_sets,
            new_sets: self.new_sets,
        }
    }

    fn create_actor(&mut self, class_index: u32) -> Result<usize> {
        let actor = self.classes.create_actor(class_index)?;
        let index = self.registry.push(actor, class_index)?;
        self.actor_sets.push(None);
        self.attached.push(false);
        Ok(index)
    }

    fn bind_role(&mut self, actor: usize, set_index: u32, role_class: u32) -> Result<()> {
        let set = self.load_set(set_index)?;
        self.current_set = Some((set_index, set));
        self.actor_sets[actor] = Some(set_index);

        let actor_ref = self.registry.entry(actor)?.actor.clone();
        let role = self.classes.create_role(role_class, &actor_ref)?;
        actor_ref.borrow_mut().bind_role(role.clone());
        self.registry.set_role(actor, role)
    }

    fn attach_child(&mut self, parent: Option<usize>, child: usize) -> Result<()> {
        self.registry.entry(child)?;
        if self.attached[child] {
            return Err(LoadError::DuplicateAttachment { child });
        }
        let Some(parent) = parent else {
            return Err(LoadError::SetMismatch {
                parent: None,
                child,
            });
        };
        self.registry.entry(parent)?;

        let set_index = self.actor_sets[child];
        if self.actor_sets[parent] != set_index {
            return Err(LoadError::SetMismatch {
                parent: Some(parent),
                child,
            });
        }
        let set = set_index
            .and_then(|index| self.set(index))
            .ok_or(LoadError::MissingRole { actor: child })?;
        let parent_role = self.role_of(parent)?;
        let child_role = self.role_of(child)?;

        set.borrow_mut()
            .attach(Some(&parent_role), &child_role)
            .map_err(|source| LoadError::Attach {
                actor: child,
                source,
            })?;
        self.attached[child] = true;
        Ok(())
    }

    fn role_of(&self, actor: usize) -> Result<RoleRef> {
        self.registry
            .entry(actor)?
            .role
            .clone()
            .ok_or(LoadError::MissingRole { actor })
    }

    /// Attaches every role that no `childRole` placed to the top level of
    /// the set it was bound into.
    fn attach_remaining(&mut self) -> Result<()> {
        for actor in 0..self.registry.len() {
            if self.attached[actor] {
                continue;
            }
            let Some(role) = self.registry.entry(actor)?.role.clone() else {
                continue;
            };
            let set = self
                .actor_set(actor)
                .and_then(|index| self.set(index))
                .ok_or(LoadError::MissingRole { actor })?;
            set.borrow_mut()
                .attach(None, &role)
                .map_err(|source| LoadError::Attach { actor, source })?;
            self.attached[actor] = true;
            log::trace!("attached actor {actor} at the top level of its set");
        }
        Ok(())
    }
}

/// Interprets one opcode stream into `ctx`.
///
/// The stream ends at `endActorGroup` or when the bytes run out. Group
/// chunks finish by attaching every role that was never explicitly parented.
/// On error, `ctx` holds a partial graph and should be dropped.
pub fn parse_stream(
    cursor: &mut ByteCursor<'_>,
    chunk: ChunkKind,
    ctx: &mut LoadContext<'_>,
) -> Result<()> {
    let classes = ctx.classes;

    let mut current_actor: Option<usize> = None;
    let mut pending_set: Option<u32> = None;
    let mut parent_actor: Option<usize> = None;
    let mut property: Option<&PropertyEntry> = None;
    let mut property_length: usize = 0;

    log::debug!("parsing {chunk:?} stream of {} bytes", cursor.remaining());

    while !cursor.is_at_end() {
        let offset = cursor.position();
        let byte = cursor.read_byte()?;
        let opcode = Opcode::try_from(byte)
            .map_err(|_| LoadError::UnknownOpcode { opcode: byte, offset })?;

        match opcode {
            Opcode::CreateActor => {
                let class_index = cursor.read_var_index()?;
                let index = ctx.create_actor(class_index)?;
                log::trace!("{offset:#06x} createActor {class_index} -> actor {index}");
                current_actor = Some(index);
                pending_set = None;
                parent_actor = None;
            }
            Opcode::SetSet => {
                let set_index = cursor.read_var_index()?;
                log::trace!("{offset:#06x} setSet {set_index}");
                pending_set = Some(set_index);
            }
            Opcode::BindRole => {
                let actor = current_actor.ok_or(LoadError::NoCurrentActor { opcode })?;
                let set_index = pending_set.ok_or(LoadError::NoPendingSet)?;
                let role_class = cursor.read_var_index()?;
                log::trace!("{offset:#06x} bindRole {role_class} (actor {actor}, set {set_index})");
                ctx.bind_role(actor, set_index, role_class)?;
            }
            Opcode::ParentRole => {
                let parent = cursor.read_var_index()? as usize;
                log::trace!("{offset:#06x} parentRole {parent}");
                parent_actor = Some(parent);
            }
            Opcode::ChildRole => {
                if ctx.current_set.is_none() {
                    return Err(LoadError::NoCurrentSet { opcode });
                }
                let child = cursor.read_var_index()? as usize;
                log::trace!("{offset:#06x} childRole {child} (parent {parent_actor:?})");
                ctx.attach_child(parent_actor, child)?;
                parent_actor = None;
            }
            Opcode::SetPropertyOffset => {
                let index = cursor.read_var_index()?;
                let entry = classes.property(chunk, index)?;
                log::trace!("{offset:#06x} setPropertyOffset {index} ({})", entry.name());
                property = Some(entry);
            }
            Opcode::SetPropertyLength => {
                property_length = cursor.read_var_index()? as usize;
                log::trace!("{offset:#06x} setPropertyLength {property_length}");
            }
            Opcode::CopyProperty => {
                let entry = property.ok_or(LoadError::NoPropertySelected { opcode })?;
                if chunk == ChunkKind::Group {
                    check_actor_size(ctx, current_actor, opcode, property_length)?;
                }
                let bytes = cursor.read_bytes(property_length)?;
                log::trace!("{offset:#06x} copyProperty {} ({} bytes)", entry.name(), bytes.len());
                let value = PropertyValue::Fixed(bytes);
                write_property(ctx, chunk, current_actor, opcode, entry, value)?;
            }
            Opcode::CopyDynamicProperty => {
                let entry = property.ok_or(LoadError::NoPropertySelected { opcode })?;
                let length = read_length(cursor, "negative dynamic property length")?;
                let value = PropertyValue::Dynamic(cursor.read_bytes(length)?.to_vec());
                log::trace!("{offset:#06x} copyDynamicProperty {} ({length} bytes)", entry.name());
                write_property(ctx, chunk, current_actor, opcode, entry, value)?;
            }
            Opcode::CopyArrayProperty => {
                let entry = property.ok_or(LoadError::NoPropertySelected { opcode })?;
                let count_offset = cursor.position();
                let count = read_length(cursor, "negative array element count")?;
                let total = count.checked_mul(property_length).ok_or_else(|| {
                    LoadError::MalformedStream {
                        offset: count_offset,
                        reason: format!("{count} elements of {property_length} bytes overflow"),
                    }
                })?;
                let bytes = cursor.read_bytes(total)?.to_vec();
                let array = PropertyArray::new(count, property_length, bytes).ok_or_else(|| {
                    LoadError::MalformedStream {
                        offset: count_offset,
                        reason: "array property size mismatch".to_string(),
                    }
                })?;
                log::trace!("{offset:#06x} copyArrayProperty {} ({count} elements)", entry.name());
                let value = PropertyValue::Array(array);
                write_property(ctx, chunk, current_actor, opcode, entry, value)?;
            }
            Opcode::CopyMediaRef => {
                let entry = property.ok_or(LoadError::NoPropertySelected { opcode })?;
                let media = cursor.read_var_index()?;
                log::trace!("{offset:#06x} copyMediaRef {media} -> {}", entry.name());
                let value = PropertyValue::MediaRef(media);
                write_property(ctx, chunk, current_actor, opcode, entry, value)?;
            }
            Opcode::EndActorGroup => {
                log::trace!("{offset:#06x} endActorGroup");
                cursor.skip_to_end();
            }
            Opcode::CreateSet => {
                let set_index = cursor.read_var_index()?;
                let set = classes.create_set(set_index)?;
                log::trace!("{offset:#06x} createSet {set_index}");
                ctx.new_sets.insert(set_index, set.clone());
                ctx.current_set = Some((set_index, set));
            }
            Opcode::EndSet => {
                log::trace!("{offset:#06x} endSet");
            }
            Opcode::BeginActorSet => {
                return Err(LoadError::UnknownOpcode { opcode: byte, offset });
            }
        }
    }

    if chunk == ChunkKind::Group {
        ctx.attach_remaining()?;
    }
    log::debug!(
        "{chunk:?} stream created {} actors and {} sets",
        ctx.registry.len(),
        ctx.new_sets.len()
    );
    Ok(())
}

/// Reads a fixed 32-bit byte or element count; negative counts are malformed.
fn read_length(cursor: &mut ByteCursor<'_>, reason: &str) -> Result<usize> {
    let offset = cursor.position();
    let value = cursor.read_fixed_i32()?;
    usize::try_from(value).map_err(|_| LoadError::MalformedStream {
        offset,
        reason: format!("{reason} ({value})"),
    })
}

fn current_actor_ref(
    ctx: &LoadContext<'_>,
    actor: Option<usize>,
    opcode: Opcode,
) -> Result<ActorRef> {
    let index = actor.ok_or(LoadError::NoCurrentActor { opcode })?;
    Ok(ctx.registry.entry(index)?.actor.clone())
}

fn check_actor_size(
    ctx: &LoadContext<'_>,
    actor: Option<usize>,
    opcode: Opcode,
    length: usize,
) -> Result<()> {
    let index = actor.ok_or(LoadError::NoCurrentActor { opcode })?;
    let class = ctx.classes.actor_class(ctx.registry.entry(index)?.class_index)?;
    if class.size() > 0 && length > class.size() {
        return Err(LoadError::PropertyTooLarge {
            class: class.name().to_string(),
            length,
            size: class.size(),
        });
    }
    Ok(())
}

fn write_property(
    ctx: &LoadContext<'_>,
    chunk: ChunkKind,
    actor: Option<usize>,
    opcode: Opcode,
    entry: &PropertyEntry,
    value: PropertyValue<'_>,
) -> Result<()> {
    match chunk {
        ChunkKind::Group => {
            let actor = current_actor_ref(ctx, actor, opcode)?;
            let mut actor = actor.borrow_mut();
            entry.set(&mut *actor, value)
        }
        ChunkKind::Set => {
            let set = ctx
                .current_set()
                .ok_or(LoadError::NoCurrentSet { opcode })?;
            let mut set = set.borrow_mut();
            entry.set(&mut *set, value)
        }
    }
}
