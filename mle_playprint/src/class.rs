//! Host object contracts and the class tables the interpreter instantiates from.
//!
//! The interpreter never knows concrete actor, role or set types. A host
//! registers factories under integer class indices (the indices the
//! playprint compiler assigned) and property descriptors under property
//! indices; the bytecode only ever refers to those numbers.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use crate::error::{HostError, LoadError, Result};
use crate::interp::ChunkKind;

pub type ActorRef = Rc<RefCell<dyn Actor>>;
pub type RoleRef = Rc<RefCell<dyn Role>>;
pub type SetRef = Rc<RefCell<dyn Set>>;
pub type GroupRef = Rc<RefCell<dyn Group>>;
pub type SceneRef = Rc<RefCell<dyn Scene>>;

/// Which class table a lookup went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClassKind {
    Actor,
    Role,
    Set,
    Group,
    Scene,
}

/// Raw property bytes handed to a setter, in the form the opcode produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue<'a> {
    /// `copyProperty`: a borrowed scratch copy, only valid for the call.
    Fixed(&'a [u8]),
    /// `copyDynamicProperty`: the setter keeps the buffer.
    Dynamic(Vec<u8>),
    /// `copyArrayProperty`: `count` elements of the selected property length.
    Array(PropertyArray),
    /// `copyMediaRef`: index of a media reference in the playprint.
    MediaRef(u32),
}

impl PropertyValue<'_> {
    pub fn bytes(&self) -> &[u8] {
        match self {
            PropertyValue::Fixed(bytes) => bytes,
            PropertyValue::Dynamic(bytes) => bytes,
            PropertyValue::Array(array) => array.as_bytes(),
            PropertyValue::MediaRef(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyArray {
    count: usize,
    element_size: usize,
    bytes: Vec<u8>,
}

impl PropertyArray {
    /// `None` when `bytes` is not exactly `count * element_size` long.
    pub fn new(count: usize, element_size: usize, bytes: Vec<u8>) -> Option<Self> {
        if count.checked_mul(element_size)? != bytes.len() {
            return None;
        }
        Some(PropertyArray {
            count,
            element_size,
            bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn element(&self, index: usize) -> Option<&[u8]> {
        if index >= self.count {
            return None;
        }
        let start = index * self.element_size;
        self.bytes.get(start..start + self.element_size)
    }

    pub fn elements(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.count).filter_map(move |index| self.element(index))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Anything the property opcodes can write into: actors in group chunks,
/// sets in set chunks.
pub trait PropertyTarget {
    fn set_property(&mut self, name: &str, value: PropertyValue<'_>) -> Result<(), HostError>;

    fn property(&self, _name: &str) -> Option<Vec<u8>> {
        None
    }
}

pub trait Actor: PropertyTarget {
    /// Called once the role created by `bindRole` exists.
    fn bind_role(&mut self, _role: RoleRef) {}

    /// Called after the actor has been added to its group. `set` is the set
    /// its role was bound into, if any.
    fn init(&mut self, _set: Option<&SetRef>) {}
}

/// Renderable counterpart of an actor inside one set.
pub trait Role {}

pub trait Set: PropertyTarget {
    /// Places `child` under `parent`, or at the top level of the set when
    /// there is no parent.
    fn attach(&mut self, parent: Option<&RoleRef>, child: &RoleRef) -> Result<(), HostError>;

    fn init(&mut self) {}
}

pub trait Group {
    fn add(&mut self, actor: ActorRef);

    fn init(&mut self) {}
}

pub trait Scene {
    fn add(&mut self, group: GroupRef);

    fn init(&mut self) {}
}

type Setter = dyn Fn(&mut dyn PropertyTarget, &str, PropertyValue<'_>) -> Result<(), HostError>;
type Getter = dyn Fn(&dyn PropertyTarget, &str) -> Option<Vec<u8>>;

/// Property descriptor: a name plus the capabilities that move raw bytes in
/// and out of a target.
pub struct PropertyEntry {
    name: String,
    setter: Box<Setter>,
    getter: Box<Getter>,
}

impl PropertyEntry {
    /// Descriptor that forwards to the target's own [`PropertyTarget`] methods.
    pub fn new(name: impl Into<String>) -> Self {
        PropertyEntry {
            name: name.into(),
            setter: Box::new(
                |target: &mut dyn PropertyTarget, name: &str, value: PropertyValue<'_>| {
                    target.set_property(name, value)
                },
            ),
            getter: Box::new(|target: &dyn PropertyTarget, name: &str| target.property(name)),
        }
    }

    pub fn with_setter<F>(mut self, setter: F) -> Self
    where
        F: Fn(&mut dyn PropertyTarget, &str, PropertyValue<'_>) -> Result<(), HostError>
            + 'static,
    {
        self.setter = Box::new(setter);
        self
    }

    pub fn with_getter<F>(mut self, getter: F) -> Self
    where
        F: Fn(&dyn PropertyTarget, &str) -> Option<Vec<u8>> + 'static,
    {
        self.getter = Box::new(getter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set(&self, target: &mut dyn PropertyTarget, value: PropertyValue<'_>) -> Result<()> {
        (self.setter)(target, &self.name, value).map_err(|source| LoadError::Property {
            name: self.name.clone(),
            source,
        })
    }

    pub fn get(&self, target: &dyn PropertyTarget) -> Option<Vec<u8>> {
        (self.getter)(target, &self.name)
    }
}

impl fmt::Debug for PropertyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A registered class: name, instance byte size (actors only) and factory.
pub struct ClassEntry<F: ?Sized> {
    name: String,
    size: usize,
    factory: Box<F>,
}

impl<F: ?Sized> ClassEntry<F> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl<F: ?Sized> fmt::Debug for ClassEntry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassEntry")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

pub type ActorClass = ClassEntry<dyn Fn() -> ActorRef>;
pub type RoleClass = ClassEntry<dyn Fn(&ActorRef) -> RoleRef>;
pub type SetClass = ClassEntry<dyn Fn() -> SetRef>;
pub type GroupClass = ClassEntry<dyn Fn() -> GroupRef>;
pub type SceneClass = ClassEntry<dyn Fn() -> SceneRef>;

/// Factory and property tables for one title, indexed the way the
/// playprint compiler numbered them.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    actors: Vec<ActorClass>,
    roles: Vec<RoleClass>,
    sets: Vec<SetClass>,
    groups: Vec<GroupClass>,
    scenes: Vec<SceneClass>,
    actor_properties: Vec<PropertyEntry>,
    set_properties: Vec<PropertyEntry>,
}

fn push_entry<T>(table: &mut Vec<T>, entry: T) -> u32 {
    table.push(entry);
    (table.len() - 1) as u32
}

fn lookup<T>(table: &[T], kind: ClassKind, index: u32) -> Result<&T> {
    table
        .get(index as usize)
        .ok_or(LoadError::UnknownClass { kind, index })
}

impl ClassRegistry {
    pub fn new() -> Self {
        ClassRegistry::default()
    }

    /// Registers an actor class. `size` bounds fixed-length property copies;
    /// zero disables the check.
    pub fn register_actor<F>(&mut self, name: impl Into<String>, size: usize, factory: F) -> u32
    where
        F: Fn() -> ActorRef + 'static,
    {
        let entry = ClassEntry {
            name: name.into(),
            size,
            factory: Box::new(factory) as Box<dyn Fn() -> ActorRef>,
        };
        push_entry(&mut self.actors, entry)
    }

    pub fn register_role<F>(&mut self, name: impl Into<String>, factory: F) -> u32
    where
        F: Fn(&ActorRef) -> RoleRef + 'static,
    {
        let entry = ClassEntry {
            name: name.into(),
            size: 0,
            factory: Box::new(factory) as Box<dyn Fn(&ActorRef) -> RoleRef>,
        };
        push_entry(&mut self.roles, entry)
    }

    pub fn register_set<F>(&mut self, name: impl Into<String>, factory: F) -> u32
    where
        F: Fn() -> SetRef + 'static,
    {
        let entry = ClassEntry {
            name: name.into(),
            size: 0,
            factory: Box::new(factory) as Box<dyn Fn() -> SetRef>,
        };
        push_entry(&mut self.sets, entry)
    }

    pub fn register_group<F>(&mut self, name: impl Into<String>, factory: F) -> u32
    where
        F: Fn() -> GroupRef + 'static,
    {
        let entry = ClassEntry {
            name: name.into(),
            size: 0,
            factory: Box::new(factory) as Box<dyn Fn() -> GroupRef>,
        };
        push_entry(&mut self.groups, entry)
    }

    pub fn register_scene<F>(&mut self, name: impl Into<String>, factory: F) -> u32
    where
        F: Fn() -> SceneRef + 'static,
    {
        let entry = ClassEntry {
            name: name.into(),
            size: 0,
            factory: Box::new(factory) as Box<dyn Fn() -> SceneRef>,
        };
        push_entry(&mut self.scenes, entry)
    }

    pub fn register_actor_property(&mut self, entry: PropertyEntry) -> u32 {
        push_entry(&mut self.actor_properties, entry)
    }

    pub fn register_set_property(&mut self, entry: PropertyEntry) -> u32 {
        push_entry(&mut self.set_properties, entry)
    }

    pub fn actor_class(&self, index: u32) -> Result<&ActorClass> {
        lookup(&self.actors, ClassKind::Actor, index)
    }

    pub fn role_class(&self, index: u32) -> Result<&RoleClass> {
        lookup(&self.roles, ClassKind::Role, index)
    }

    pub fn set_class(&self, index: u32) -> Result<&SetClass> {
        lookup(&self.sets, ClassKind::Set, index)
    }

    pub fn group_class(&self, index: u32) -> Result<&GroupClass> {
        lookup(&self.groups, ClassKind::Group, index)
    }

    pub fn scene_class(&self, index: u32) -> Result<&SceneClass> {
        lookup(&self.scenes, ClassKind::Scene, index)
    }

    pub fn create_actor(&self, index: u32) -> Result<ActorRef> {
        Ok((self.actor_class(index)?.factory)())
    }

    pub fn create_role(&self, index: u32, actor: &ActorRef) -> Result<RoleRef> {
        Ok((self.role_class(index)?.factory)(actor))
    }

    pub fn create_set(&self, index: u32) -> Result<SetRef> {
        Ok((self.set_class(index)?.factory)())
    }

    pub fn create_group(&self, index: u32) -> Result<GroupRef> {
        Ok((self.group_class(index)?.factory)())
    }

    pub fn create_scene(&self, index: u32) -> Result<SceneRef> {
        Ok((self.scene_class(index)?.factory)())
    }

    /// Property descriptor for `index`, from the actor table in group chunks
    /// and the set table in set chunks.
    pub fn property(&self, chunk: ChunkKind, index: u32) -> Result<&PropertyEntry> {
        let table = match chunk {
            ChunkKind::Group => &self.actor_properties,
            ChunkKind::Set => &self.set_properties,
        };
        table
            .get(index as usize)
            .ok_or(LoadError::UnknownProperty { chunk, index })
    }

    pub fn actor_class_count(&self) -> usize {
        self.actors.len()
    }

    pub fn set_class_count(&self) -> usize {
        self.sets.len()
    }
}
