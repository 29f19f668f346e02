//! Media reference lists.
//!
//! `copyMediaRef` hands a property setter the TOC index of a media list.
//! The entry points at a `LIST` chunk of form type `MRFL`:
//!
//! ```text
//! "info"   u32 flags, u32 media type, u32 count
//! "mref"*  u32 flags, u32 media type, u32 size, data[size]
//! ```
//!
//! A reference with flags `0` is external and its data is a file name.

use std::borrow::Cow;

use mle_formats::Endian;
use serde::Serialize;

use crate::error::{LoadError, Result};
use crate::playprint::{CHUNK_HEADER_LEN, ChunkInfo, ChunkTag, push_chunk, walk_chunks};

pub const MEDIA_LIST_TYPE: [u8; 4] = *b"MRFL";

const INFO_LEN: usize = 12;
const MREF_HEADER_LEN: usize = 12;

/// Contents of the `info` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MediaRefInfo {
    pub flags: u32,
    pub media_type: u32,
    pub count: u32,
}

/// One `mref` chunk, borrowing its data from the playprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaRefEntry<'a> {
    pub flags: u32,
    pub media_type: u32,
    pub data: &'a [u8],
}

impl<'a> MediaRefEntry<'a> {
    pub fn is_external(&self) -> bool {
        self.flags == 0
    }

    /// The referenced file of an external entry, up to any trailing NUL.
    pub fn file_name(&self) -> Option<Cow<'a, str>> {
        if !self.is_external() {
            return None;
        }
        let end = self
            .data
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.data.len());
        Some(String::from_utf8_lossy(&self.data[..end]))
    }
}

/// A decoded media list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRefChunk<'a> {
    pub info: MediaRefInfo,
    pub entries: Vec<MediaRefEntry<'a>>,
}

/// Decodes the media list whose `LIST` chunk header is described by `list`.
pub(crate) fn parse_media_list<'a>(
    data: &'a [u8],
    endian: Endian,
    index: u32,
    list: ChunkInfo,
) -> Result<MediaRefChunk<'a>> {
    let payload_start = list.offset + CHUNK_HEADER_LEN;
    let payload = &data[payload_start..payload_start + list.size];
    if list.tag != ChunkTag::LIST || payload.len() < 4 || payload[..4] != MEDIA_LIST_TYPE {
        let found = if list.tag == ChunkTag::LIST && payload.len() >= 4 {
            format!("LIST {}", String::from_utf8_lossy(&payload[..4]))
        } else {
            list.tag.to_string()
        };
        return Err(LoadError::UnexpectedChunk {
            index,
            expected: "LIST MRFL",
            found,
        });
    }

    let end = payload_start + list.size;
    let chunks = walk_chunks(data, endian, payload_start + 4, end)?;
    let mut chunks = chunks.into_iter();
    let info_chunk = chunks
        .next()
        .filter(|chunk| chunk.tag == ChunkTag::MEDIA_INFO)
        .ok_or_else(|| LoadError::MalformedStream {
            offset: payload_start + 4,
            reason: "media list does not start with an info chunk".to_string(),
        })?;
    let info = parse_info(data, endian, info_chunk)?;

    let mut entries = Vec::with_capacity((info.count as usize).min(list.size / MREF_HEADER_LEN));
    for chunk in chunks.filter(|chunk| chunk.tag == ChunkTag::MEDIA_REF) {
        if entries.len() == info.count as usize {
            break;
        }
        entries.push(parse_mref(data, endian, chunk)?);
    }
    if entries.len() != info.count as usize {
        return Err(LoadError::MalformedStream {
            offset: list.offset,
            reason: format!(
                "media list promises {} references but holds {}",
                info.count,
                entries.len()
            ),
        });
    }
    log::debug!(
        "media list {index}: type {} with {} references",
        info.media_type,
        entries.len()
    );
    Ok(MediaRefChunk { info, entries })
}

fn payload(data: &[u8], chunk: ChunkInfo) -> &[u8] {
    let start = chunk.offset + CHUNK_HEADER_LEN;
    &data[start..start + chunk.size]
}

fn parse_info(data: &[u8], endian: Endian, chunk: ChunkInfo) -> Result<MediaRefInfo> {
    let bytes = payload(data, chunk);
    if bytes.len() < INFO_LEN {
        return Err(LoadError::MalformedStream {
            offset: chunk.offset,
            reason: format!("media info chunk holds {} bytes, expected 12", bytes.len()),
        });
    }
    Ok(MediaRefInfo {
        flags: endian.read_u32(&bytes[0..4]),
        media_type: endian.read_u32(&bytes[4..8]),
        count: endian.read_u32(&bytes[8..12]),
    })
}

fn parse_mref(data: &[u8], endian: Endian, chunk: ChunkInfo) -> Result<MediaRefEntry<'_>> {
    let bytes = payload(data, chunk);
    let truncated = |reason: String| LoadError::MalformedStream {
        offset: chunk.offset,
        reason,
    };
    if bytes.len() < MREF_HEADER_LEN {
        return Err(truncated(format!("mref chunk holds {} bytes", bytes.len())));
    }
    let size = endian.read_u32(&bytes[8..12]) as usize;
    let body = &bytes[MREF_HEADER_LEN..];
    if size > body.len() {
        return Err(truncated(format!(
            "mref data of {size} bytes overruns its {}-byte chunk",
            body.len()
        )));
    }
    Ok(MediaRefEntry {
        flags: endian.read_u32(&bytes[0..4]),
        media_type: endian.read_u32(&bytes[4..8]),
        data: &body[..size],
    })
}

/// A media reference to be written by
/// [`PlayprintWriter::add_media_list`](crate::PlayprintWriter::add_media_list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRefRecord {
    pub flags: u32,
    pub media_type: u32,
    pub data: Vec<u8>,
}

impl MediaRefRecord {
    /// An external reference naming `file`.
    pub fn external(media_type: u32, file: &str) -> Self {
        MediaRefRecord {
            flags: 0,
            media_type,
            data: file.as_bytes().to_vec(),
        }
    }
}

/// Payload of a `LIST` chunk holding an `MRFL` media list.
pub(crate) fn media_list_payload(
    endian: Endian,
    flags: u32,
    media_type: u32,
    records: &[MediaRefRecord],
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&MEDIA_LIST_TYPE);

    let mut info = Vec::with_capacity(INFO_LEN);
    endian.put_u32(&mut info, flags);
    endian.put_u32(&mut info, media_type);
    endian.put_u32(&mut info, records.len() as u32);
    push_chunk(&mut out, endian, ChunkTag::MEDIA_INFO, &info);

    for record in records {
        let mut mref = Vec::with_capacity(MREF_HEADER_LEN + record.data.len());
        endian.put_u32(&mut mref, record.flags);
        endian.put_u32(&mut mref, record.media_type);
        endian.put_u32(&mut mref, record.data.len() as u32);
        mref.extend_from_slice(&record.data);
        push_chunk(&mut out, endian, ChunkTag::MEDIA_REF, &mref);
    }
    out
}
