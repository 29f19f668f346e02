use std::borrow::Cow;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::endian::Endian;
use crate::error::{RegistryError, Result};
use crate::layout::{
    self, ANIMATION_HEADER_LEN, NAME_LEN, REGISTRY_HEADER_LEN, TRANSFORM_LEN,
};

/// Stored magic field of an animation registry.
///
/// The authoring tools write a five character literal (`MLEa1` big endian,
/// `MLEa2` little endian, `MLEa3`/`MLEa4` fixed point) into a four byte
/// field, so only the `MLEa` prefix survives on disk.
pub const ANIMATION_MAGIC: &[u8; 4] = b"MLEa";

/// One animation frame as a row-major 4x4 matrix.
pub type Transform = [[f32; 4]; 4];

/// A whole animation registry file held in a single buffer.
///
/// Animations and sequences are views computed into that buffer; they borrow
/// the registry and never own data of their own.
#[derive(Debug, Clone)]
pub struct AnimationRegistry {
    data: Vec<u8>,
    endian: Endian,
}

impl AnimationRegistry {
    /// Loads and validates the registry at `path`.
    pub fn read<P: AsRef<Path>>(path: P, endian: Endian) -> Result<Self> {
        let path = path.as_ref();
        let result = fs::read(path)
            .map_err(|source| RegistryError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|data| Self::from_bytes(data, endian));
        if let Err(err) = &result {
            log::error!(
                "could not load animation registry {}: {err}",
                path.display()
            );
        }
        result
    }

    /// Takes ownership of a registry image, rejecting it unless every record
    /// the header promises lies inside the buffer.
    pub fn from_bytes(data: Vec<u8>, endian: Endian) -> Result<Self> {
        validate(&data, endian)?;
        Ok(AnimationRegistry { data, endian })
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn name(&self) -> Cow<'_, str> {
        layout::name_str(&self.data[4..4 + NAME_LEN])
    }

    pub fn len(&self) -> usize {
        self.endian.read_u32(&self.data[4 + NAME_LEN..REGISTRY_HEADER_LEN]) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn animation(&self, index: usize) -> Option<Animation<'_>> {
        if index >= self.len() {
            return None;
        }
        let entry = layout::offset_table_entry(REGISTRY_HEADER_LEN, index)?;
        let offset = self.endian.read_u32(&self.data[entry..entry + 4]) as usize;
        Some(Animation {
            data: &self.data,
            offset,
            endian: self.endian,
        })
    }

    /// First animation whose stored name equals `name`.
    pub fn animation_by_name(&self, name: &str) -> Option<Animation<'_>> {
        self.animations().find(|animation| animation.name_matches(name))
    }

    pub fn animations(&self) -> impl Iterator<Item = Animation<'_>> + '_ {
        (0..self.len()).filter_map(move |index| self.animation(index))
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            name: self.name().into_owned(),
            animations: self.animations().map(|a| a.summary()).collect(),
        }
    }
}

fn validate(data: &[u8], endian: Endian) -> Result<()> {
    let len = data.len();
    if len == 0 {
        return Err(RegistryError::EmptyFile);
    }
    if len < REGISTRY_HEADER_LEN {
        return Err(RegistryError::Truncated {
            what: "animation registry header",
            offset: 0,
            needed: REGISTRY_HEADER_LEN,
            len,
        });
    }
    if &data[..4] != ANIMATION_MAGIC {
        return Err(RegistryError::BadMagic {
            expected: String::from_utf8_lossy(ANIMATION_MAGIC).into_owned(),
            found: String::from_utf8_lossy(&data[..4]).into_owned(),
        });
    }

    let count = endian.read_u32(&data[4 + NAME_LEN..REGISTRY_HEADER_LEN]) as usize;
    let table_end = layout::offset_table_end(REGISTRY_HEADER_LEN, count)
        .filter(|&end| end <= len)
        .ok_or(RegistryError::Truncated {
            what: "animation offset table",
            offset: REGISTRY_HEADER_LEN,
            needed: count.saturating_mul(4),
            len,
        })?;

    for (index, entry) in data[REGISTRY_HEADER_LEN..table_end]
        .chunks_exact(4)
        .enumerate()
    {
        let offset = endian.read_u32(entry) as usize;
        if offset > len {
            return Err(RegistryError::OffsetOutOfBounds { index, offset, len });
        }
        if offset + ANIMATION_HEADER_LEN > len {
            return Err(RegistryError::Truncated {
                what: "animation header",
                offset,
                needed: ANIMATION_HEADER_LEN,
                len,
            });
        }
        let header = &data[offset..offset + ANIMATION_HEADER_LEN];
        let num_sequences = endian.read_u32(&header[NAME_LEN..NAME_LEN + 4]) as usize;
        let num_frames = endian.read_u32(&header[NAME_LEN + 4..NAME_LEN + 8]) as usize;
        let extent = layout::animation_extent(num_sequences, num_frames);
        if extent.and_then(|extent| extent.checked_add(offset)).is_none_or(|end| end > len) {
            return Err(RegistryError::Truncated {
                what: "animation sequences",
                offset,
                needed: extent.unwrap_or(usize::MAX),
                len,
            });
        }
    }

    Ok(())
}

/// View of one animation record inside an [`AnimationRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct Animation<'a> {
    data: &'a [u8],
    offset: usize,
    endian: Endian,
}

impl<'a> Animation<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn name(&self) -> Cow<'a, str> {
        layout::name_str(&self.data[self.offset..self.offset + NAME_LEN])
    }

    fn name_matches(&self, query: &str) -> bool {
        layout::name_matches(&self.data[self.offset..self.offset + NAME_LEN], query)
    }

    pub fn num_sequences(&self) -> usize {
        let at = self.offset + NAME_LEN;
        self.endian.read_u32(&self.data[at..at + 4]) as usize
    }

    pub fn num_frames(&self) -> usize {
        let at = self.offset + NAME_LEN + 4;
        self.endian.read_u32(&self.data[at..at + 4]) as usize
    }

    pub fn sequence(&self, index: usize) -> Option<Sequence<'a>> {
        if index >= self.num_sequences() {
            return None;
        }
        let offset = layout::sequence_offset(self.offset, self.num_frames(), index)?;
        Some(Sequence {
            data: self.data,
            offset,
            num_frames: self.num_frames(),
            endian: self.endian,
        })
    }

    pub fn sequence_by_name(&self, name: &str) -> Option<Sequence<'a>> {
        self.sequences().find(|sequence| sequence.name_matches(name))
    }

    pub fn sequences(&self) -> impl Iterator<Item = Sequence<'a>> + 'a {
        let animation = *self;
        (0..animation.num_sequences()).filter_map(move |index| animation.sequence(index))
    }

    pub fn summary(&self) -> AnimationSummary {
        AnimationSummary {
            name: self.name().into_owned(),
            num_frames: self.num_frames(),
            sequences: self.sequences().map(|s| s.summary()).collect(),
        }
    }
}

/// View of one sequence (a transform track) inside an animation.
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    data: &'a [u8],
    offset: usize,
    num_frames: usize,
    endian: Endian,
}

impl<'a> Sequence<'a> {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn name(&self) -> Cow<'a, str> {
        layout::name_str(&self.data[self.offset..self.offset + NAME_LEN])
    }

    fn name_matches(&self, query: &str) -> bool {
        layout::name_matches(&self.data[self.offset..self.offset + NAME_LEN], query)
    }

    pub fn parent(&self) -> u32 {
        let at = self.offset + NAME_LEN;
        self.endian.read_u32(&self.data[at..at + 4])
    }

    pub fn start_frame(&self) -> u16 {
        let at = self.offset + NAME_LEN + 4;
        self.endian.read_u16(&self.data[at..at + 2])
    }

    pub fn kind(&self) -> u16 {
        let at = self.offset + NAME_LEN + 6;
        self.endian.read_u16(&self.data[at..at + 2])
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn frame(&self, index: usize) -> Option<Transform> {
        if index >= self.num_frames {
            return None;
        }
        let at = layout::frame_offset(self.offset, index)?;
        let raw = &self.data[at..at + TRANSFORM_LEN];
        let mut transform = [[0.0f32; 4]; 4];
        for (row, values) in transform.iter_mut().zip(raw.chunks_exact(16)) {
            for (cell, bytes) in row.iter_mut().zip(values.chunks_exact(4)) {
                *cell = self.endian.read_f32(bytes);
            }
        }
        Some(transform)
    }

    pub fn frames(&self) -> impl Iterator<Item = Transform> + 'a {
        let sequence = *self;
        (0..sequence.num_frames).filter_map(move |index| sequence.frame(index))
    }

    pub fn summary(&self) -> SequenceSummary {
        SequenceSummary {
            name: self.name().into_owned(),
            parent: self.parent(),
            start_frame: self.start_frame(),
            kind: self.kind(),
            first_frame: self.frame(0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrySummary {
    pub name: String,
    pub animations: Vec<AnimationSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnimationSummary {
    pub name: String,
    pub num_frames: usize,
    pub sequences: Vec<SequenceSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SequenceSummary {
    pub name: String,
    pub parent: u32,
    pub start_frame: u16,
    pub kind: u16,
    pub first_frame: Option<Transform>,
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SequenceSpec<'a> {
        name: &'a str,
        parent: u32,
        start_frame: u16,
        kind: u16,
    }

    fn identity_scaled(scale: f32) -> Transform {
        let mut t = [[0.0; 4]; 4];
        for (i, row) in t.iter_mut().enumerate() {
            row[i] = scale;
        }
        t
    }

    /// Builds a registry image with every sequence carrying `frames` frames.
    fn build(endian: Endian, animations: &[(&str, u32, Vec<SequenceSpec<'_>>)]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(ANIMATION_MAGIC);
        assert!(layout::put_name(&mut out, "registry"));
        endian.put_u32(&mut out, animations.len() as u32);
        let table_start = out.len();
        out.resize(table_start + animations.len() * 4, 0);

        for (index, (name, frames, sequences)) in animations.iter().enumerate() {
            let offset = out.len() as u32;
            let mut slot = Vec::new();
            endian.put_u32(&mut slot, offset);
            out[table_start + index * 4..table_start + index * 4 + 4].copy_from_slice(&slot);

            assert!(layout::put_name(&mut out, name));
            endian.put_u32(&mut out, sequences.len() as u32);
            endian.put_u32(&mut out, *frames);
            for sequence in sequences {
                assert!(layout::put_name(&mut out, sequence.name));
                endian.put_u32(&mut out, sequence.parent);
                endian.put_u16(&mut out, sequence.start_frame);
                endian.put_u16(&mut out, sequence.kind);
                for frame in 0..*frames {
                    for row in identity_scaled(frame as f32 + 1.0) {
                        for value in row {
                            endian.put_f32(&mut out, value);
                        }
                    }
                }
            }
        }
        out
    }

    fn two_animation_image(endian: Endian) -> Vec<u8> {
        build(
            endian,
            &[
                (
                    "walk",
                    2,
                    vec![
                        SequenceSpec { name: "hips", parent: 0, start_frame: 0, kind: 1 },
                        SequenceSpec { name: "knee", parent: 0, start_frame: 3, kind: 2 },
                    ],
                ),
                (
                    "run",
                    1,
                    vec![SequenceSpec { name: "hips", parent: 7, start_frame: 5, kind: 0 }],
                ),
            ],
        )
    }

    #[test]
    fn walks_animations_and_sequences() {
        let registry =
            AnimationRegistry::from_bytes(two_animation_image(Endian::Little), Endian::Little)
                .expect("registry loads");
        assert_eq!(registry.name(), "registry");
        assert_eq!(registry.len(), 2);

        let walk = registry.animation(0).unwrap();
        assert_eq!(walk.name(), "walk");
        assert_eq!(walk.num_sequences(), 2);
        assert_eq!(walk.num_frames(), 2);

        let knee = walk.sequence(1).unwrap();
        assert_eq!(knee.name(), "knee");
        assert_eq!(knee.start_frame(), 3);
        assert_eq!(knee.kind(), 2);
        assert_eq!(knee.frame(1).unwrap()[2][2], 2.0);
        assert!(knee.frame(2).is_none());
        assert_eq!(knee.frames().count(), 2);
        assert!(walk.sequence(2).is_none());

        let run = registry.animation_by_name("run").unwrap();
        assert_eq!(run.sequence(0).unwrap().parent(), 7);
        assert!(registry.animation(2).is_none());
    }

    #[test]
    fn big_endian_images_read_the_same() {
        let registry =
            AnimationRegistry::from_bytes(two_animation_image(Endian::Big), Endian::Big).unwrap();
        let run = registry.animation(1).unwrap();
        assert_eq!(run.name(), "run");
        assert_eq!(run.sequence(0).unwrap().start_frame(), 5);
    }

    #[test]
    fn name_lookups_take_first_match() {
        let registry =
            AnimationRegistry::from_bytes(two_animation_image(Endian::Little), Endian::Little)
                .unwrap();
        let walk = registry.animation(0).unwrap();
        assert_eq!(
            walk.sequence_by_name("hips").unwrap().offset(),
            walk.sequence(0).unwrap().offset()
        );
        assert!(walk.sequence_by_name("elbow").is_none());
        assert!(walk.sequence_by_name("").is_none());
        assert!(registry.animation_by_name("").is_none());
        assert!(registry.animation_by_name("swim").is_none());
    }

    #[test]
    fn header_only_registry_is_empty() {
        let image = build(Endian::Little, &[]);
        assert_eq!(image.len(), REGISTRY_HEADER_LEN);
        let registry = AnimationRegistry::from_bytes(image, Endian::Little).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.animations().count(), 0);
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut image = two_animation_image(Endian::Little);
        image[..4].copy_from_slice(b"FWc1");
        let err = AnimationRegistry::from_bytes(image, Endian::Little).unwrap_err();
        assert!(matches!(err, RegistryError::BadMagic { .. }));
    }

    #[test]
    fn rejects_offsets_past_end() {
        let mut image = two_animation_image(Endian::Little);
        let bogus = (image.len() + 1) as u32;
        image[REGISTRY_HEADER_LEN + 4..REGISTRY_HEADER_LEN + 8]
            .copy_from_slice(&bogus.to_le_bytes());
        let err = AnimationRegistry::from_bytes(image, Endian::Little).unwrap_err();
        assert!(matches!(err, RegistryError::OffsetOutOfBounds { index: 1, .. }));
    }

    #[test]
    fn rejects_sequence_counts_larger_than_file() {
        let mut image = two_animation_image(Endian::Little);
        let entry = &image[REGISTRY_HEADER_LEN..REGISTRY_HEADER_LEN + 4];
        let first = u32::from_le_bytes(entry.try_into().unwrap()) as usize;
        image[first + NAME_LEN..first + NAME_LEN + 4].copy_from_slice(&1000u32.to_le_bytes());
        let err = AnimationRegistry::from_bytes(image, Endian::Little).unwrap_err();
        assert!(matches!(err, RegistryError::Truncated { what: "animation sequences", .. }));
    }

    #[test]
    fn rejects_short_and_empty_files() {
        assert!(matches!(
            AnimationRegistry::from_bytes(Vec::new(), Endian::Little),
            Err(RegistryError::EmptyFile)
        ));
        assert!(matches!(
            AnimationRegistry::from_bytes(b"MLEa".to_vec(), Endian::Little),
            Err(RegistryError::Truncated { .. })
        ));
        let mut image = build(Endian::Little, &[]);
        image[4 + NAME_LEN..REGISTRY_HEADER_LEN].copy_from_slice(&3u32.to_le_bytes());
        assert!(matches!(
            AnimationRegistry::from_bytes(image, Endian::Little),
            Err(RegistryError::Truncated { what: "animation offset table", .. })
        ));
    }
}
