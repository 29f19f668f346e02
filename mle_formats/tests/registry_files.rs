use std::io::Write;

use mle_formats::{
    AnimationRegistry, CharacterFormat, CharacterRegistry, Endian, ErrorKind, RegistryError,
};
use tempfile::{NamedTempFile, tempdir};

fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

fn name_field(name: &str) -> [u8; 32] {
    let mut field = [0u8; 32];
    field[..name.len()].copy_from_slice(name.as_bytes());
    field
}

/// One animation, one sequence, one frame, little endian.
fn single_animation_file() -> Vec<u8> {
    let mut data = Vec::new();
    // header: magic, name, count(1), offset table
    data.extend_from_slice(b"MLEa");
    data.extend_from_slice(&name_field("hero"));
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&44u32.to_le_bytes());
    // animation at 44: name, numSequences(1), numFrames(1)
    data.extend_from_slice(&name_field("wave"));
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    // sequence: name, parent, startFrame, type, 16 floats
    data.extend_from_slice(&name_field("arm"));
    data.extend_from_slice(&3u32.to_le_bytes());
    data.extend_from_slice(&12u16.to_le_bytes());
    data.extend_from_slice(&1u16.to_le_bytes());
    for value in 0..16 {
        data.extend_from_slice(&(value as f32).to_le_bytes());
    }
    data
}

#[test]
fn reads_animation_registry_from_disk() {
    let file = write_temp(&single_animation_file());
    let registry = AnimationRegistry::read(file.path(), Endian::Little).expect("registry loads");

    assert_eq!(registry.name(), "hero");
    assert_eq!(registry.as_bytes().len(), 44 + 40 + 40 + 64);
    let wave = registry.animation_by_name("wave").unwrap();
    let arm = wave.sequence_by_name("arm").unwrap();
    assert_eq!(arm.parent(), 3);
    assert_eq!(arm.start_frame(), 12);
    let frame = arm.frame(0).unwrap();
    assert_eq!(frame[0], [0.0, 1.0, 2.0, 3.0]);
    assert_eq!(frame[3], [12.0, 13.0, 14.0, 15.0]);
}

#[test]
fn header_sized_animation_registry_has_no_animations() {
    let mut data = Vec::new();
    data.extend_from_slice(b"MLEa");
    data.extend_from_slice(&name_field("empty"));
    data.extend_from_slice(&0u32.to_le_bytes());
    let file = write_temp(&data);

    let registry = AnimationRegistry::read(file.path(), Endian::Little).unwrap();
    assert!(registry.is_empty());
    assert!(registry.animation(0).is_none());
}

#[test]
fn missing_and_empty_files_are_resource_errors() {
    let dir = tempdir().unwrap();
    let err = AnimationRegistry::read(dir.path().join("absent.anim"), Endian::Little).unwrap_err();
    assert!(matches!(err, RegistryError::Io { .. }));
    assert_eq!(err.kind(), ErrorKind::Resource);

    let empty = write_temp(&[]);
    let err = CharacterRegistry::read(empty.path(), Endian::Little).unwrap_err();
    assert!(matches!(err, RegistryError::EmptyFile));
    assert_eq!(err.kind(), ErrorKind::Resource);
}

#[test]
fn corrupt_animation_registries_are_rejected() {
    let mut bad_magic = single_animation_file();
    bad_magic[0] = b'X';
    let file = write_temp(&bad_magic);
    let err = AnimationRegistry::read(file.path(), Endian::Little).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);

    let mut bad_offset = single_animation_file();
    let past_end = (bad_offset.len() as u32 + 1).to_le_bytes();
    bad_offset[40..44].copy_from_slice(&past_end);
    let file = write_temp(&bad_offset);
    let err = AnimationRegistry::read(file.path(), Endian::Little).unwrap_err();
    assert!(matches!(err, RegistryError::OffsetOutOfBounds { .. }));
}

#[test]
fn reads_text_character_registry_from_disk() {
    let file = write_temp(
        b"FWc1\nmonkeys\n1\nbogen\n1\n  swing 0 24 2\n    grab hit 0 swing 12 0\n    drop miss 0 swing 24 0\n",
    );
    let registry = CharacterRegistry::read(file.path(), Endian::Little).unwrap();
    assert_eq!(registry.name, "monkeys");
    let swing = registry.characters[0].snippet_by_name("swing").unwrap();
    assert_eq!(swing.transitions.len(), 2);
    assert_eq!(swing.transition_by_name("drop").unwrap().from_frame, 24);
    assert_eq!(
        mle_formats::chr::sniff_format(b"FWc1\nmonkeys").unwrap(),
        CharacterFormat::Text
    );
}
