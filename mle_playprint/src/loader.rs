//! Group, scene and set chunk loading.

use mle_formats::Endian;

use crate::class::{ClassRegistry, GroupRef, SceneRef, SetRef};
use crate::cursor::ByteCursor;
use crate::error::{LoadError, Result};
use crate::interp::{ChunkKind, LoadContext, SetTable, parse_stream};
use crate::registry::ActorRegistryEntry;

/// Anything that can hand out chunk payloads by table-of-contents index.
pub trait ChunkSource {
    fn endian(&self) -> Endian;

    fn chunk(&self, index: u32) -> Result<&[u8]>;
}

/// Chunk payloads held in memory, indexed in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ChunkTable {
    endian: Endian,
    chunks: Vec<Vec<u8>>,
}

impl ChunkTable {
    pub fn new(endian: Endian) -> Self {
        ChunkTable {
            endian,
            chunks: Vec::new(),
        }
    }

    pub fn push(&mut self, payload: Vec<u8>) -> u32 {
        self.chunks.push(payload);
        (self.chunks.len() - 1) as u32
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

impl ChunkSource for ChunkTable {
    fn endian(&self) -> Endian {
        self.endian
    }

    fn chunk(&self, index: u32) -> Result<&[u8]> {
        self.chunks
            .get(index as usize)
            .map(Vec::as_slice)
            .ok_or(LoadError::TocIndexOutOfRange {
                index,
                len: self.chunks.len(),
            })
    }
}

/// A group and the actors it was built from, in creation order.
pub struct LoadedGroup {
    pub group: GroupRef,
    pub actors: Vec<ActorRegistryEntry>,
}

pub struct LoadedScene {
    pub scene: SceneRef,
    pub groups: Vec<LoadedGroup>,
}

/// Loads chunks from one source against one set of classes. Sets created
/// by successful loads are kept and shared by later loads.
pub struct Loader<'a, S: ChunkSource + ?Sized> {
    classes: &'a ClassRegistry,
    source: &'a S,
    sets: SetTable,
}

impl<'a, S: ChunkSource + ?Sized> Loader<'a, S> {
    pub fn new(classes: &'a ClassRegistry, source: &'a S) -> Self {
        Loader {
            classes,
            source,
            sets: SetTable::new(),
        }
    }

    pub fn sets(&self) -> &SetTable {
        &self.sets
    }

    pub fn set(&self, index: u32) -> Option<&SetRef> {
        self.sets.get(&index)
    }

    /// Builds the group stored at `toc_index`.
    ///
    /// Payload: `[i32 group class][varint actor count][opcode stream]`.
    /// Every actor is added to the group and initialised with the set its
    /// role was bound into, then the group itself is initialised. Nothing
    /// is kept when any step fails.
    pub fn load_group(&mut self, toc_index: u32) -> Result<LoadedGroup> {
        let (loaded, new_sets) = self.build_group(toc_index, &self.sets)?;
        self.commit_sets(new_sets);
        Ok(loaded)
    }

    /// Builds the scene stored at `toc_index` and every group it lists.
    ///
    /// Payload: `[i32 scene class][i32 group count][i32 group TOC index]*`.
    /// Later groups see the sets earlier groups created, but none of them
    /// reach the loader's set table unless every group loads.
    pub fn load_scene(&mut self, toc_index: u32) -> Result<LoadedScene> {
        let source = self.source;
        let mut cursor = ByteCursor::new(source.chunk(toc_index)?, source.endian());

        let scene_class = read_class_index(&mut cursor)?;
        let count = read_count(&mut cursor)?;
        let mut group_indices = Vec::with_capacity(count.min(cursor.remaining() / 4));
        for _ in 0..count {
            group_indices.push(read_class_index(&mut cursor)?);
        }

        let scene = self.classes.create_scene(scene_class)?;
        let mut visible = self.sets.clone();
        let mut staged = SetTable::new();
        let mut groups = Vec::with_capacity(group_indices.len());
        for group_index in group_indices {
            let (loaded, new_sets) = self.build_group(group_index, &visible)?;
            for (index, set) in new_sets {
                visible.insert(index, set.clone());
                staged.insert(index, set);
            }
            scene.borrow_mut().add(loaded.group.clone());
            groups.push(loaded);
        }
        self.commit_sets(staged);
        scene.borrow_mut().init();
        log::info!("loaded scene {toc_index}: {} groups", groups.len());
        Ok(LoadedScene { scene, groups })
    }

    /// Runs the set chunk at `toc_index` and returns the indices of the
    /// sets it created.
    pub fn load_set_chunk(&mut self, toc_index: u32) -> Result<Vec<u32>> {
        let source = self.source;
        let mut cursor = ByteCursor::new(source.chunk(toc_index)?, source.endian());
        let parsed = {
            let mut ctx = LoadContext::new(self.classes, &self.sets, 0);
            parse_stream(&mut cursor, ChunkKind::Set, &mut ctx)?;
            ctx.finish()
        };
        let created: Vec<u32> = parsed.new_sets.keys().copied().collect();
        self.commit_sets(parsed.new_sets);
        Ok(created)
    }

    /// Parses and initialises one group against `sets`, handing back the
    /// sets it created without committing them.
    fn build_group(&self, toc_index: u32, sets: &SetTable) -> Result<(LoadedGroup, SetTable)> {
        let classes = self.classes;
        let source = self.source;
        let mut cursor = ByteCursor::new(source.chunk(toc_index)?, source.endian());

        let group_class = read_class_index(&mut cursor)?;
        let capacity = cursor.read_var_index()? as usize;
        let parsed = {
            let mut ctx = LoadContext::new(classes, sets, capacity);
            parse_stream(&mut cursor, ChunkKind::Group, &mut ctx)?;
            ctx.finish()
        };

        let group = classes.create_group(group_class)?;
        let actors = parsed.registry.into_entries();
        for (entry, set_index) in actors.iter().zip(&parsed.actor_sets) {
            group.borrow_mut().add(entry.actor.clone());
            let set = set_index.and_then(|index| {
                parsed
                    .new_sets
                    .get(&index)
                    .or_else(|| sets.get(&index))
                    .cloned()
            });
            entry.actor.borrow_mut().init(set.as_ref());
        }
        group.borrow_mut().init();

        log::info!(
            "loaded group {toc_index} ({}): {} actors",
            classes.group_class(group_class)?.name(),
            actors.len()
        );
        Ok((LoadedGroup { group, actors }, parsed.new_sets))
    }

    fn commit_sets(&mut self, new_sets: SetTable) {
        for (index, set) in new_sets {
            set.borrow_mut().init();
            log::debug!("set {index} ready");
            self.sets.insert(index, set);
        }
    }
}

/// Reads a fixed 32-bit class or chunk index.
fn read_class_index(cursor: &mut ByteCursor<'_>) -> Result<u32> {
    let offset = cursor.position();
    let value = cursor.read_fixed_i32()?;
    u32::try_from(value).map_err(|_| LoadError::MalformedStream {
        offset,
        reason: format!("negative index {value}"),
    })
}

fn read_count(cursor: &mut ByteCursor<'_>) -> Result<usize> {
    Ok(read_class_index(cursor)? as usize)
}
