//! Encoder for opcode streams and chunk payloads.

use mle_formats::Endian;

use crate::error::{LoadError, Result};
use crate::opcode::Opcode;
use crate::varint;

/// Builds an opcode stream one instruction at a time.
///
/// Operands are checked as they are written; the first index that does not
/// fit the varint format is reported by [`Assembler::finish`].
#[derive(Debug)]
pub struct Assembler {
    endian: Endian,
    bytes: Vec<u8>,
    error: Option<LoadError>,
}

impl Assembler {
    pub fn new(endian: Endian) -> Self {
        Assembler {
            endian,
            bytes: Vec::new(),
            error: None,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.bytes),
        }
    }

    fn op(mut self, opcode: Opcode) -> Self {
        self.bytes.push(opcode.byte());
        self
    }

    fn fail(&mut self, err: LoadError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn index(mut self, value: u32) -> Self {
        let offset = self.bytes.len();
        if varint::push_index(&mut self.bytes, value).is_none() {
            self.fail(LoadError::IndexOverflow { offset });
        }
        self
    }

    fn fixed(mut self, value: i32) -> Self {
        self.endian.put_i32(&mut self.bytes, value);
        self
    }

    fn count(mut self, value: usize) -> Self {
        match i32::try_from(value) {
            Ok(value) => self.fixed(value),
            Err(_) => {
                let offset = self.bytes.len();
                self.fail(LoadError::MalformedStream {
                    offset,
                    reason: format!("count {value} does not fit in 32 bits"),
                });
                self
            }
        }
    }

    /// Appends bytes verbatim.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn create_actor(self, class_index: u32) -> Self {
        self.op(Opcode::CreateActor).index(class_index)
    }

    pub fn set_set(self, set_index: u32) -> Self {
        self.op(Opcode::SetSet).index(set_index)
    }

    pub fn bind_role(self, role_class: u32) -> Self {
        self.op(Opcode::BindRole).index(role_class)
    }

    pub fn parent_role(self, actor: u32) -> Self {
        self.op(Opcode::ParentRole).index(actor)
    }

    pub fn child_role(self, actor: u32) -> Self {
        self.op(Opcode::ChildRole).index(actor)
    }

    pub fn set_property_offset(self, property: u32) -> Self {
        self.op(Opcode::SetPropertyOffset).index(property)
    }

    pub fn set_property_length(self, length: u32) -> Self {
        self.op(Opcode::SetPropertyLength).index(length)
    }

    /// Emits the value bytes; their length must match the last
    /// `set_property_length`.
    pub fn copy_property(self, value: &[u8]) -> Self {
        self.op(Opcode::CopyProperty).raw(value)
    }

    pub fn copy_dynamic_property(self, value: &[u8]) -> Self {
        self.op(Opcode::CopyDynamicProperty)
            .count(value.len())
            .raw(value)
    }

    pub fn copy_array_property(self, count: usize, elements: &[u8]) -> Self {
        self.op(Opcode::CopyArrayProperty).count(count).raw(elements)
    }

    pub fn copy_media_ref(self, media: u32) -> Self {
        self.op(Opcode::CopyMediaRef).index(media)
    }

    pub fn end_actor_group(self) -> Self {
        self.op(Opcode::EndActorGroup)
    }

    pub fn create_set(self, set_index: u32) -> Self {
        self.op(Opcode::CreateSet).index(set_index)
    }

    pub fn end_set(self) -> Self {
        self.op(Opcode::EndSet)
    }
}

/// Group chunk payload: class index, actor count, then the stream.
pub fn group_chunk(
    endian: Endian,
    group_class: i32,
    actor_count: u32,
    stream: &[u8],
) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(stream.len() + 9);
    endian.put_i32(&mut out, group_class);
    varint::push_index(&mut out, actor_count).ok_or(LoadError::IndexOverflow { offset: 4 })?;
    out.extend_from_slice(stream);
    Ok(out)
}

/// Scene chunk payload: class index, group count, group TOC indices.
pub fn scene_chunk(endian: Endian, scene_class: i32, groups: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + groups.len() * 4);
    endian.put_i32(&mut out, scene_class);
    endian.put_u32(&mut out, groups.len() as u32);
    for &group in groups {
        endian.put_u32(&mut out, group);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_operands_after_their_opcode() {
        let bytes = Assembler::new(Endian::Big)
            .create_actor(300)
            .set_property_length(4)
            .copy_property(&[1, 2, 3, 4])
            .copy_dynamic_property(&[7])
            .end_actor_group()
            .finish()
            .unwrap();
        assert_eq!(
            bytes,
            vec![
                0x81, 0x02, 0x2c, 0x87, 0x04, 0x88, 1, 2, 3, 4, 0x8b, 0, 0, 0, 1, 7, 0x8a
            ]
        );
    }

    #[test]
    fn oversized_index_fails_the_stream() {
        let err = Assembler::new(Endian::Little)
            .create_actor(0)
            .set_set(u32::MAX)
            .finish()
            .unwrap_err();
        assert!(matches!(err, LoadError::IndexOverflow { offset: 3 }));
    }

    #[test]
    fn chunk_headers_use_stream_byte_order() {
        let group = group_chunk(Endian::Little, 2, 129, &[0x8a]).unwrap();
        assert_eq!(group, vec![2, 0, 0, 0, 0x01, 0x01, 0x8a]);

        let scene = scene_chunk(Endian::Big, 1, &[4, 5]);
        assert_eq!(scene, vec![0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 4, 0, 0, 0, 5]);
    }
}
