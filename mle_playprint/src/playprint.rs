//! Digital playprint container.
//!
//! A playprint is an IFF-style form:
//!
//! ```text
//! "PPLE" | "PPBE"   form tag, also the byte order of everything inside
//! u32               form size (bytes after this field)
//! "MLRT"            form type
//! chunk*            [tag: 4][size: u32][payload][pad to even]
//! ```
//!
//! The `"hdr "` chunk holds the version and date, the `"toc "` chunk maps
//! table-of-contents indices to the file offset of a chunk header. Group,
//! set and scene chunks are only ever reached through the TOC.

use std::fmt;
use std::fs::File;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};
use mle_formats::Endian;
use serde::Serialize;

use crate::error::{LoadError, Result};
use crate::loader::ChunkSource;
use crate::media::{MediaRefChunk, MediaRefRecord, media_list_payload, parse_media_list};

pub const FORM_LITTLE: [u8; 4] = *b"PPLE";
pub const FORM_BIG: [u8; 4] = *b"PPBE";
pub const FORM_TYPE: [u8; 4] = *b"MLRT";

const FORM_HEADER_LEN: usize = 12;
pub(crate) const CHUNK_HEADER_LEN: usize = 8;
const TOC_ENTRY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkTag(pub [u8; 4]);

impl ChunkTag {
    pub const HEADER: ChunkTag = ChunkTag(*b"hdr ");
    pub const TOC: ChunkTag = ChunkTag(*b"toc ");
    pub const GROUP: ChunkTag = ChunkTag(*b"grp ");
    pub const SET: ChunkTag = ChunkTag(*b"set ");
    pub const SCENE: ChunkTag = ChunkTag(*b"scn ");
    pub const LIST: ChunkTag = ChunkTag(*b"LIST");
    pub const MEDIA_INFO: ChunkTag = ChunkTag(*b"info");
    pub const MEDIA_REF: ChunkTag = ChunkTag(*b"mref");

    pub fn as_string(self) -> String {
        String::from_utf8_lossy(&self.0).trim_end().to_string()
    }
}

impl fmt::Display for ChunkTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for ChunkTag {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.as_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayprintHeader {
    pub version: u32,
    pub date: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub label: u32,
    /// File offset of the chunk header.
    pub offset: u32,
}

/// A chunk found while walking the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    pub tag: ChunkTag,
    /// File offset of the chunk header.
    pub offset: usize,
    pub size: usize,
}

enum Bytes {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Bytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Bytes::Mapped(mmap) => &mmap[..],
            Bytes::Owned(bytes) => &bytes[..],
        }
    }
}

pub struct Playprint {
    path: Option<PathBuf>,
    bytes: Bytes,
    endian: Endian,
    header: Option<PlayprintHeader>,
    toc: Vec<TocEntry>,
    chunks: Vec<ChunkInfo>,
}

impl fmt::Debug for Playprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Playprint")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .field("endian", &self.endian)
            .field("header", &self.header)
            .field("toc", &self.toc.len())
            .finish()
    }
}

impl Playprint {
    /// Maps a playprint file and indexes its chunks.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let io_error = |source| LoadError::Io {
            path: path_buf.clone(),
            source,
        };
        let file = File::open(&path_buf).map_err(io_error)?;
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(io_error)?;

        let mut playprint = Self::parse(Bytes::Mapped(mmap)).inspect_err(|err| {
            log::error!("rejecting playprint {}: {err}", path_buf.display());
        })?;
        playprint.path = Some(path_buf);
        Ok(playprint)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::parse(Bytes::Owned(bytes))
    }

    fn parse(bytes: Bytes) -> Result<Self> {
        let data: &[u8] = &bytes;
        if data.len() < FORM_HEADER_LEN {
            return Err(LoadError::BadForm {
                expected: "PPLE or PPBE",
                found: String::from_utf8_lossy(&data[..data.len().min(4)]).into_owned(),
            });
        }
        let endian = match [data[0], data[1], data[2], data[3]] {
            FORM_LITTLE => Endian::Little,
            FORM_BIG => Endian::Big,
            other => {
                return Err(LoadError::BadForm {
                    expected: "PPLE or PPBE",
                    found: String::from_utf8_lossy(&other).into_owned(),
                });
            }
        };
        if data[8..12] != FORM_TYPE {
            return Err(LoadError::BadForm {
                expected: "MLRT",
                found: String::from_utf8_lossy(&data[8..12]).into_owned(),
            });
        }
        let form_size = endian.read_u32(&data[4..8]) as usize;
        let form_end = form_size
            .checked_add(8)
            .filter(|end| *end <= data.len())
            .ok_or(LoadError::ChunkOutOfBounds { offset: 0 })?;

        let chunks = walk_chunks(data, endian, FORM_HEADER_LEN, form_end)?;
        let mut header = None;
        let mut toc = None;
        for chunk in &chunks {
            let payload = &data[chunk.offset + CHUNK_HEADER_LEN..][..chunk.size];
            if chunk.tag == ChunkTag::HEADER {
                header = Some(parse_header(payload, endian, chunk.offset)?);
            } else if chunk.tag == ChunkTag::TOC {
                toc = Some(parse_toc(payload, endian, chunk.offset)?);
            }
        }
        let toc = toc.ok_or(LoadError::MissingToc)?;
        log::debug!(
            "playprint: {} chunks, {} toc entries, {endian:?}",
            chunks.len(),
            toc.len()
        );

        Ok(Playprint {
            path: None,
            bytes,
            endian,
            header,
            toc,
            chunks,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn header(&self) -> Option<PlayprintHeader> {
        self.header
    }

    pub fn toc(&self) -> &[TocEntry] {
        &self.toc
    }

    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }

    /// The chunk a TOC entry points at.
    pub fn toc_chunk(&self, index: u32) -> Result<ChunkInfo> {
        let entry = self
            .toc
            .get(index as usize)
            .ok_or(LoadError::TocIndexOutOfRange {
                index,
                len: self.toc.len(),
            })?;
        chunk_at(&self.bytes, self.endian, entry.offset as usize, self.bytes.len())
    }

    /// Payload of the chunk a TOC entry points at.
    pub fn chunk_payload(&self, index: u32) -> Result<&[u8]> {
        let info = self.toc_chunk(index)?;
        let start = info.offset + CHUNK_HEADER_LEN;
        Ok(&self.bytes[start..start + info.size])
    }

    /// The media list a TOC entry points at, as handed out by `copyMediaRef`.
    pub fn media_ref(&self, index: u32) -> Result<MediaRefChunk<'_>> {
        let info = self.toc_chunk(index)?;
        parse_media_list(&self.bytes, self.endian, index, info)
    }
}

impl ChunkSource for Playprint {
    fn endian(&self) -> Endian {
        self.endian
    }

    fn chunk(&self, index: u32) -> Result<&[u8]> {
        self.chunk_payload(index)
    }
}

pub(crate) fn chunk_at(
    data: &[u8],
    endian: Endian,
    offset: usize,
    end: usize,
) -> Result<ChunkInfo> {
    let payload_start = offset
        .checked_add(CHUNK_HEADER_LEN)
        .filter(|start| *start <= end)
        .ok_or(LoadError::ChunkOutOfBounds { offset })?;
    let size = endian.read_u32(&data[offset + 4..payload_start]) as usize;
    if size > end - payload_start {
        return Err(LoadError::ChunkOutOfBounds { offset });
    }
    let mut tag = [0u8; 4];
    tag.copy_from_slice(&data[offset..offset + 4]);
    Ok(ChunkInfo {
        tag: ChunkTag(tag),
        offset,
        size,
    })
}

/// Chunks laid end to end between `start` and `end`, each padded to even.
pub(crate) fn walk_chunks(
    data: &[u8],
    endian: Endian,
    start: usize,
    end: usize,
) -> Result<Vec<ChunkInfo>> {
    let mut chunks = Vec::new();
    let mut offset = start;
    while offset < end {
        let chunk = chunk_at(data, endian, offset, end)?;
        let padded = chunk.size + (chunk.size & 1);
        offset = (offset + CHUNK_HEADER_LEN + padded).min(end);
        chunks.push(chunk);
    }
    Ok(chunks)
}

fn parse_header(payload: &[u8], endian: Endian, offset: usize) -> Result<PlayprintHeader> {
    if payload.len() < 8 {
        return Err(LoadError::MalformedStream {
            offset,
            reason: format!("header chunk holds {} bytes, expected 8", payload.len()),
        });
    }
    Ok(PlayprintHeader {
        version: endian.read_u32(&payload[0..4]),
        date: endian.read_u32(&payload[4..8]),
    })
}

fn parse_toc(payload: &[u8], endian: Endian, offset: usize) -> Result<Vec<TocEntry>> {
    let truncated = || LoadError::MalformedStream {
        offset,
        reason: "table of contents is truncated".to_string(),
    };
    if payload.len() < 4 {
        return Err(truncated());
    }
    let count = endian.read_u32(&payload[0..4]) as usize;
    let entries = &payload[4..];
    if count > entries.len() / TOC_ENTRY_LEN {
        return Err(truncated());
    }
    Ok(entries
        .chunks_exact(TOC_ENTRY_LEN)
        .take(count)
        .map(|entry| TocEntry {
            label: endian.read_u32(&entry[0..4]),
            offset: endian.read_u32(&entry[4..8]),
        })
        .collect())
}

/// Writes playprint files; the counterpart of [`Playprint::from_bytes`].
#[derive(Debug, Clone)]
pub struct PlayprintWriter {
    endian: Endian,
    header: PlayprintHeader,
    chunks: Vec<(ChunkTag, Vec<u8>)>,
}

impl PlayprintWriter {
    pub fn new(endian: Endian, header: PlayprintHeader) -> Self {
        PlayprintWriter {
            endian,
            header,
            chunks: Vec::new(),
        }
    }

    /// Adds a chunk and returns its TOC index.
    pub fn add_chunk(&mut self, tag: ChunkTag, payload: Vec<u8>) -> u32 {
        self.chunks.push((tag, payload));
        (self.chunks.len() - 1) as u32
    }

    /// Adds an `MRFL` media list and returns its TOC index.
    pub fn add_media_list(
        &mut self,
        flags: u32,
        media_type: u32,
        records: &[MediaRefRecord],
    ) -> u32 {
        let payload = media_list_payload(self.endian, flags, media_type, records);
        self.add_chunk(ChunkTag::LIST, payload)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let endian = self.endian;
        let toc_len = 4 + self.chunks.len() * TOC_ENTRY_LEN;
        // hdr and toc come first, so every chunk offset is known up front
        let mut next = FORM_HEADER_LEN + CHUNK_HEADER_LEN + 8 + CHUNK_HEADER_LEN + toc_len;
        let mut offsets = Vec::with_capacity(self.chunks.len());
        for (_, payload) in &self.chunks {
            offsets.push(next as u32);
            next += CHUNK_HEADER_LEN + payload.len() + (payload.len() & 1);
        }

        let mut out = Vec::with_capacity(next);
        out.extend_from_slice(match endian {
            Endian::Little => &FORM_LITTLE,
            Endian::Big => &FORM_BIG,
        });
        endian.put_u32(&mut out, (next - 8) as u32);
        out.extend_from_slice(&FORM_TYPE);

        let mut header = Vec::with_capacity(8);
        endian.put_u32(&mut header, self.header.version);
        endian.put_u32(&mut header, self.header.date);
        push_chunk(&mut out, endian, ChunkTag::HEADER, &header);

        let mut toc = Vec::with_capacity(toc_len);
        endian.put_u32(&mut toc, self.chunks.len() as u32);
        for (index, offset) in offsets.iter().enumerate() {
            endian.put_u32(&mut toc, index as u32);
            endian.put_u32(&mut toc, *offset);
        }
        push_chunk(&mut out, endian, ChunkTag::TOC, &toc);

        for (tag, payload) in &self.chunks {
            push_chunk(&mut out, endian, *tag, payload);
        }
        out
    }
}

pub(crate) fn push_chunk(out: &mut Vec<u8>, endian: Endian, tag: ChunkTag, payload: &[u8]) {
    out.extend_from_slice(&tag.0);
    endian.put_u32(out, payload.len() as u32);
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(endian: Endian) -> Vec<u8> {
        let mut writer = PlayprintWriter::new(
            endian,
            PlayprintHeader {
                version: 3,
                date: 19_990_101,
            },
        );
        writer.add_chunk(ChunkTag::SET, vec![0x8d, 0x00, 0x8e]);
        writer.add_chunk(ChunkTag::GROUP, vec![0, 0, 0, 0, 0x01, 0x81, 0x00]);
        writer.to_bytes()
    }

    #[test]
    fn reads_header_toc_and_payloads() {
        for endian in [Endian::Little, Endian::Big] {
            let playprint = Playprint::from_bytes(sample(endian)).unwrap();
            assert_eq!(playprint.endian(), endian);
            assert_eq!(
                playprint.header(),
                Some(PlayprintHeader {
                    version: 3,
                    date: 19_990_101
                })
            );
            assert_eq!(playprint.toc().len(), 2);
            assert_eq!(playprint.chunks().len(), 4);
            assert_eq!(playprint.toc_chunk(0).unwrap().tag, ChunkTag::SET);
            assert_eq!(playprint.chunk_payload(0).unwrap(), &[0x8d, 0x00, 0x8e]);
            assert_eq!(playprint.chunk_payload(1).unwrap().len(), 7);
        }
    }

    #[test]
    fn odd_chunks_are_padded() {
        let bytes = sample(Endian::Little);
        let playprint = Playprint::from_bytes(bytes.clone()).unwrap();
        let set = playprint.toc_chunk(0).unwrap();
        let group = playprint.toc_chunk(1).unwrap();
        assert_eq!(group.offset, set.offset + 8 + 4);
        assert_eq!(bytes.len() % 2, 0);
    }

    #[test]
    fn rejects_foreign_forms() {
        let mut bytes = sample(Endian::Little);
        bytes[0..4].copy_from_slice(b"FORM");
        let err = Playprint::from_bytes(bytes).unwrap_err();
        assert!(matches!(err, LoadError::BadForm { .. }));

        let mut bytes = sample(Endian::Little);
        bytes[8..12].copy_from_slice(b"AIFF");
        let err = Playprint::from_bytes(bytes).unwrap_err();
        assert!(matches!(err, LoadError::BadForm { expected: "MLRT", .. }));

        assert!(matches!(
            Playprint::from_bytes(Vec::new()),
            Err(LoadError::BadForm { .. })
        ));
    }

    #[test]
    fn reports_missing_toc_and_bad_indices() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"PPLE");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(b"MLRT");
        assert!(matches!(
            Playprint::from_bytes(bytes),
            Err(LoadError::MissingToc)
        ));

        let playprint = Playprint::from_bytes(sample(Endian::Big)).unwrap();
        assert!(matches!(
            playprint.chunk_payload(2),
            Err(LoadError::TocIndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn media_lists_resolve_through_the_toc() {
        let mut writer = PlayprintWriter::new(Endian::Big, PlayprintHeader::default());
        let group = writer.add_chunk(ChunkTag::GROUP, vec![0, 0, 0, 0, 0x00]);
        let media = writer.add_media_list(
            0,
            2,
            &[
                MediaRefRecord::external(2, "stage.iv"),
                MediaRefRecord {
                    flags: 1,
                    media_type: 2,
                    data: vec![0xaa; 5],
                },
            ],
        );
        let playprint = Playprint::from_bytes(writer.to_bytes()).unwrap();

        assert_eq!(playprint.toc_chunk(media).unwrap().tag, ChunkTag::LIST);
        let list = playprint.media_ref(media).unwrap();
        assert_eq!(list.info.media_type, 2);
        assert_eq!(list.info.count, 2);
        assert_eq!(list.entries[0].file_name().unwrap(), "stage.iv");
        assert_eq!(list.entries[1].data, &[0xaa; 5]);

        let err = playprint.media_ref(group).unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnexpectedChunk { index: 0, expected: "LIST MRFL", .. }
        ));
        assert!(matches!(
            playprint.media_ref(5),
            Err(LoadError::TocIndexOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn truncated_chunks_are_out_of_bounds() {
        let mut bytes = sample(Endian::Little);
        bytes.truncate(bytes.len() - 4);
        let form_size = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&form_size.to_le_bytes());
        assert!(matches!(
            Playprint::from_bytes(bytes),
            Err(LoadError::ChunkOutOfBounds { .. })
        ));
    }
}
