//! Fixed record sizes and offset arithmetic shared by the registry readers.
//!
//! Everything here is a pure function over sizes and counts so the stride
//! rules can be checked without touching a file.

use std::borrow::Cow;

/// Width of every embedded name field, including its NUL terminator.
pub const NAME_LEN: usize = 32;

/// One transform frame: a 4x4 matrix of 32-bit floats.
pub const TRANSFORM_LEN: usize = 4 * 4 * 4;

/// `[magic:4][name:32][u32 count]`, shared by both registry headers.
pub const REGISTRY_HEADER_LEN: usize = 4 + NAME_LEN + 4;

/// `[name:32][u32 numSequences][u32 numFrames]`.
pub const ANIMATION_HEADER_LEN: usize = NAME_LEN + 4 + 4;

/// `[name:32][u32 parent][u16 startFrame][u16 type]`, before the frames.
pub const SEQUENCE_HEADER_LEN: usize = NAME_LEN + 4 + 2 + 2;

/// `[magic:4][name:32][u32 count][u32 slot]`. The slot is an unused pointer
/// field that sits in front of the character offset table.
pub const CHARACTER_REGISTRY_HEADER_LEN: usize = REGISTRY_HEADER_LEN + 4;

/// `[name:32][u32 numSnippets][u32 slot]`, before the snippet offset table.
pub const CHARACTER_HEADER_LEN: usize = NAME_LEN + 4 + 4;

/// `[name:32][u16 startFrame][u16 endFrame][u32 numTransitions]`.
pub const SNIPPET_HEADER_LEN: usize = NAME_LEN + 2 + 2 + 4;

/// `[name:32][event:32][i32 target][targetName:32][u16 from][u16 to]`.
pub const TRANSITION_LEN: usize = NAME_LEN * 3 + 4 + 2 + 2;

/// Byte offset of entry `index` in an offset table of `u32`s starting at `table_start`.
pub fn offset_table_entry(table_start: usize, index: usize) -> Option<usize> {
    index.checked_mul(4)?.checked_add(table_start)
}

/// End of a `u32` offset table with `count` entries.
pub fn offset_table_end(table_start: usize, count: usize) -> Option<usize> {
    offset_table_entry(table_start, count)
}

/// Size of one sequence record for an animation with `num_frames` frames.
pub fn sequence_stride(num_frames: usize) -> Option<usize> {
    num_frames
        .checked_mul(TRANSFORM_LEN)?
        .checked_add(SEQUENCE_HEADER_LEN)
}

/// Address of sequence `index` inside the animation starting at `animation_offset`.
pub fn sequence_offset(animation_offset: usize, num_frames: usize, index: usize) -> Option<usize> {
    let stride = sequence_stride(num_frames)?;
    index
        .checked_mul(stride)?
        .checked_add(ANIMATION_HEADER_LEN)?
        .checked_add(animation_offset)
}

/// Total bytes covered by an animation header plus all of its sequences.
pub fn animation_extent(num_sequences: usize, num_frames: usize) -> Option<usize> {
    sequence_stride(num_frames)?
        .checked_mul(num_sequences)?
        .checked_add(ANIMATION_HEADER_LEN)
}

/// Address of frame `index` inside the sequence starting at `sequence_offset`.
pub fn frame_offset(sequence_offset: usize, index: usize) -> Option<usize> {
    index
        .checked_mul(TRANSFORM_LEN)?
        .checked_add(SEQUENCE_HEADER_LEN)?
        .checked_add(sequence_offset)
}

/// Address of transition `index` inside the snippet starting at `snippet_offset`.
pub fn transition_offset(snippet_offset: usize, index: usize) -> Option<usize> {
    index
        .checked_mul(TRANSITION_LEN)?
        .checked_add(SNIPPET_HEADER_LEN)?
        .checked_add(snippet_offset)
}

/// Bytes of a NUL-padded name field, up to (not including) the first NUL.
pub fn name_bytes(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

pub fn name_str(field: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(name_bytes(field))
}

/// `strcmp`-style match of a stored name field against a query.
pub fn name_matches(field: &[u8], query: &str) -> bool {
    !query.is_empty() && name_bytes(field) == query.as_bytes()
}

/// Appends `name` as a NUL-padded field. Returns `false` when it does not fit.
pub fn put_name(out: &mut Vec<u8>, name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() >= NAME_LEN {
        return false;
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + NAME_LEN - bytes.len(), 0);
    true
}
