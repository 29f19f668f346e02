use std::fmt;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::endian::Endian;
use crate::error::{RegistryError, Result};
use crate::layout::{
    self, CHARACTER_HEADER_LEN, CHARACTER_REGISTRY_HEADER_LEN, NAME_LEN, SNIPPET_HEADER_LEN,
    TRANSITION_LEN,
};

/// Magic shared by the binary header and the first token of the text form.
pub const CHARACTER_MAGIC: &str = "FWc1";

/// Which of the two on-disk encodings a character registry used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterFormat {
    Text,
    Binary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterRegistry {
    pub name: String,
    pub characters: Vec<Character>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Character {
    pub name: String,
    pub snippets: Vec<Snippet>,
}

/// A named frame range of a character's animation with its outgoing transitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snippet {
    pub name: String,
    pub start_frame: u16,
    pub end_frame: u16,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition {
    pub name: String,
    pub event: String,
    pub target_index: i32,
    pub target_name: String,
    pub from_frame: u16,
    pub to_frame: u16,
}

impl CharacterRegistry {
    /// Loads a registry file, picking the codec from its leading bytes.
    pub fn read<P: AsRef<Path>>(path: P, endian: Endian) -> Result<Self> {
        let path = path.as_ref();
        let result = fs::read(path)
            .map_err(|source| RegistryError::Io {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|bytes| Self::from_bytes(&bytes, endian));
        if let Err(err) = &result {
            log::error!(
                "could not load character registry {}: {err}",
                path.display()
            );
        }
        result
    }

    pub fn from_bytes(bytes: &[u8], endian: Endian) -> Result<Self> {
        match sniff_format(bytes)? {
            CharacterFormat::Text => {
                let text = std::str::from_utf8(bytes).map_err(|_| RegistryError::NotUtf8)?;
                Self::parse_text(text)
            }
            CharacterFormat::Binary => Self::parse_binary(bytes, endian),
        }
    }

    /// Parses the whitespace-separated text form.
    pub fn parse_text(text: &str) -> Result<Self> {
        let mut tokens = Tokens::new(text);
        let magic = tokens.next_token("magic")?;
        if magic != CHARACTER_MAGIC {
            return Err(RegistryError::BadMagic {
                expected: CHARACTER_MAGIC.to_string(),
                found: magic.to_string(),
            });
        }

        let name = tokens.name("registry name")?;
        let count = tokens.count("character count")?;
        let mut characters = Vec::with_capacity(count.min(tokens.remaining_hint()));
        for _ in 0..count {
            characters.push(read_text_character(&mut tokens)?);
        }
        log::debug!(
            "parsed text character registry {name} with {} characters",
            characters.len()
        );
        Ok(CharacterRegistry { name, characters })
    }

    /// Parses the packed binary form, checking every offset against the buffer.
    pub fn parse_binary(bytes: &[u8], endian: Endian) -> Result<Self> {
        let reader = BinaryReader { bytes, endian };
        reader.require("character registry header", 0, CHARACTER_REGISTRY_HEADER_LEN)?;
        if &bytes[..4] != CHARACTER_MAGIC.as_bytes() {
            return Err(RegistryError::BadMagic {
                expected: CHARACTER_MAGIC.to_string(),
                found: String::from_utf8_lossy(&bytes[..4]).into_owned(),
            });
        }

        let name = reader.name(4)?;
        let count = reader.u32(4 + NAME_LEN)? as usize;
        let offsets = reader.offset_table(
            "character offset table",
            CHARACTER_REGISTRY_HEADER_LEN,
            count,
        )?;
        let mut characters = Vec::with_capacity(offsets.len());
        for (index, offset) in offsets.into_iter().enumerate() {
            if offset > bytes.len() {
                return Err(RegistryError::OffsetOutOfBounds {
                    index,
                    offset,
                    len: bytes.len(),
                });
            }
            characters.push(reader.character(offset)?);
        }
        Ok(CharacterRegistry { name, characters })
    }

    pub fn character(&self, index: usize) -> Option<&Character> {
        self.characters.get(index)
    }

    pub fn character_by_name(&self, name: &str) -> Option<&Character> {
        find_named(&self.characters, name, |c| &c.name)
    }

    /// Writes the registry back out in the text form.
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CharacterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{CHARACTER_MAGIC}")?;
        writeln!(f, "{}", self.name)?;
        writeln!(f, "{}", self.characters.len())?;
        for character in &self.characters {
            writeln!(f, "{}", character.name)?;
            writeln!(f, "{}", character.snippets.len())?;
            for snippet in &character.snippets {
                writeln!(f, "\t{}", snippet.name)?;
                writeln!(f, "\t{} {}", snippet.start_frame, snippet.end_frame)?;
                writeln!(f, "\t{}", snippet.transitions.len())?;
                for t in &snippet.transitions {
                    writeln!(
                        f,
                        "\t\t{} {} {} {} {} {}",
                        t.name, t.event, t.target_index, t.target_name, t.from_frame, t.to_frame
                    )?;
                }
            }
        }
        Ok(())
    }
}

impl Character {
    pub fn snippet(&self, index: usize) -> Option<&Snippet> {
        self.snippets.get(index)
    }

    pub fn snippet_by_name(&self, name: &str) -> Option<&Snippet> {
        find_named(&self.snippets, name, |s| &s.name)
    }
}

impl Snippet {
    pub fn transition(&self, index: usize) -> Option<&Transition> {
        self.transitions.get(index)
    }

    pub fn transition_by_name(&self, name: &str) -> Option<&Transition> {
        find_named(&self.transitions, name, |t| &t.name)
    }
}

fn find_named<'a, T>(items: &'a [T], name: &str, key: impl Fn(&T) -> &String) -> Option<&'a T> {
    if name.is_empty() {
        return None;
    }
    items.iter().find(|item| key(item) == name)
}

/// Decides between the text and binary codecs.
///
/// The text form may start with whitespace and always separates the magic
/// token from the registry name; the binary form packs the name right after
/// the four magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Result<CharacterFormat> {
    if bytes.is_empty() {
        return Err(RegistryError::EmptyFile);
    }
    let magic = CHARACTER_MAGIC.as_bytes();
    let trimmed = bytes.trim_ascii_start();
    if let Some(rest) = trimmed.strip_prefix(magic) {
        if rest.first().is_none_or(|b| b.is_ascii_whitespace()) {
            return Ok(CharacterFormat::Text);
        }
    }
    if bytes.starts_with(magic) {
        return Ok(CharacterFormat::Binary);
    }
    let found_len = trimmed.len().min(magic.len());
    Err(RegistryError::BadMagic {
        expected: CHARACTER_MAGIC.to_string(),
        found: String::from_utf8_lossy(&trimmed[..found_len]).into_owned(),
    })
}

struct Tokens<'a> {
    inner: std::str::SplitAsciiWhitespace<'a>,
    remaining: usize,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Tokens {
            inner: text.split_ascii_whitespace(),
            remaining: text.len(),
        }
    }

    /// Upper bound on how many more records could possibly follow.
    fn remaining_hint(&self) -> usize {
        self.remaining / 2
    }

    fn next_token(&mut self, field: &'static str) -> Result<&'a str> {
        let token = self
            .inner
            .next()
            .ok_or(RegistryError::UnexpectedEof { field })?;
        self.remaining = self.remaining.saturating_sub(token.len() + 1);
        Ok(token)
    }

    fn name(&mut self, field: &'static str) -> Result<String> {
        let token = self.next_token(field)?;
        if token.len() >= NAME_LEN {
            return Err(RegistryError::NameTooLong {
                field,
                name: token.to_string(),
                max: NAME_LEN - 1,
            });
        }
        Ok(token.to_string())
    }

    fn number<T: std::str::FromStr>(&mut self, field: &'static str) -> Result<T> {
        let token = self.next_token(field)?;
        token.parse::<T>().map_err(|_| RegistryError::InvalidNumber {
            field,
            token: token.to_string(),
        })
    }

    fn count(&mut self, field: &'static str) -> Result<usize> {
        Ok(self.number::<u32>(field)? as usize)
    }
}

fn read_text_character(tokens: &mut Tokens<'_>) -> Result<Character> {
    let name = tokens.name("character name")?;
    let count = tokens.count("snippet count")?;
    let mut snippets = Vec::with_capacity(count.min(tokens.remaining_hint()));
    for _ in 0..count {
        let name = tokens.name("snippet name")?;
        let start_frame = tokens.number("snippet start frame")?;
        let end_frame = tokens.number("snippet end frame")?;
        let count = tokens.count("transition count")?;
        let mut transitions = Vec::with_capacity(count.min(tokens.remaining_hint()));
        for _ in 0..count {
            transitions.push(Transition {
                name: tokens.name("transition name")?,
                event: tokens.name("transition event")?,
                target_index: tokens.number("transition target index")?,
                target_name: tokens.name("transition target name")?,
                from_frame: tokens.number("transition from frame")?,
                to_frame: tokens.number("transition to frame")?,
            });
        }
        snippets.push(Snippet {
            name,
            start_frame,
            end_frame,
            transitions,
        });
    }
    Ok(Character { name, snippets })
}

struct BinaryReader<'a> {
    bytes: &'a [u8],
    endian: Endian,
}

impl<'a> BinaryReader<'a> {
    fn require(&self, what: &'static str, offset: usize, needed: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(needed)
            .filter(|&end| end <= self.bytes.len())
            .map(|end| &self.bytes[offset..end])
            .ok_or(RegistryError::Truncated {
                what,
                offset,
                needed,
                len: self.bytes.len(),
            })
    }

    fn name(&self, offset: usize) -> Result<String> {
        let field = self.require("name field", offset, NAME_LEN)?;
        Ok(layout::name_str(field).into_owned())
    }

    fn u32(&self, offset: usize) -> Result<u32> {
        Ok(self.endian.read_u32(self.require("u32 field", offset, 4)?))
    }

    fn offset_table(&self, what: &'static str, start: usize, count: usize) -> Result<Vec<usize>> {
        let needed = count.checked_mul(4).unwrap_or(usize::MAX);
        let table = self.require(what, start, needed)?;
        Ok(table
            .chunks_exact(4)
            .map(|entry| self.endian.read_u32(entry) as usize)
            .collect())
    }

    fn character(&self, offset: usize) -> Result<Character> {
        self.require("character header", offset, CHARACTER_HEADER_LEN)?;
        let name = self.name(offset)?;
        let count = self.u32(offset + NAME_LEN)? as usize;
        let offsets =
            self.offset_table("snippet offset table", offset + CHARACTER_HEADER_LEN, count)?;
        let mut snippets = Vec::with_capacity(offsets.len());
        for (index, relative) in offsets.into_iter().enumerate() {
            let absolute = offset
                .checked_add(relative)
                .filter(|&at| at <= self.bytes.len())
                .ok_or(RegistryError::OffsetOutOfBounds {
                    index,
                    offset: relative,
                    len: self.bytes.len(),
                })?;
            snippets.push(self.snippet(absolute)?);
        }
        Ok(Character { name, snippets })
    }

    fn snippet(&self, offset: usize) -> Result<Snippet> {
        let header = self.require("snippet header", offset, SNIPPET_HEADER_LEN)?;
        let name = layout::name_str(&header[..NAME_LEN]).into_owned();
        let start_frame = self.endian.read_u16(&header[NAME_LEN..NAME_LEN + 2]);
        let end_frame = self.endian.read_u16(&header[NAME_LEN + 2..NAME_LEN + 4]);
        let count = self.endian.read_u32(&header[NAME_LEN + 4..SNIPPET_HEADER_LEN]) as usize;
        let needed = count.checked_mul(TRANSITION_LEN).unwrap_or(usize::MAX);
        let block = self.require("snippet transitions", offset + SNIPPET_HEADER_LEN, needed)?;
        let transitions = block
            .chunks_exact(TRANSITION_LEN)
            .map(|record| self.transition(record))
            .collect();
        Ok(Snippet {
            name,
            start_frame,
            end_frame,
            transitions,
        })
    }

    fn transition(&self, record: &[u8]) -> Transition {
        let (name, rest) = record.split_at(NAME_LEN);
        let (event, rest) = rest.split_at(NAME_LEN);
        let (target, rest) = rest.split_at(4);
        let (target_name, frames) = rest.split_at(NAME_LEN);
        Transition {
            name: layout::name_str(name).into_owned(),
            event: layout::name_str(event).into_owned(),
            target_index: self.endian.read_i32(target),
            target_name: layout::name_str(target_name).into_owned(),
            from_frame: self.endian.read_u16(&frames[..2]),
            to_frame: self.endian.read_u16(&frames[2..4]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "FWc1 cast 2
        manny 2
            idle 0 10 1
                to_walk start 1 walk 10 0
            walk 11 30 0
        glottis 0
    ";

    #[test]
    fn parses_nested_text_registry() {
        let registry = CharacterRegistry::parse_text(SAMPLE).expect("text registry parses");
        assert_eq!(registry.name, "cast");
        assert_eq!(registry.characters.len(), 2);

        let manny = registry.character_by_name("manny").unwrap();
        assert_eq!(manny.snippets.len(), 2);
        let idle = manny.snippet(0).unwrap();
        assert_eq!((idle.start_frame, idle.end_frame), (0, 10));
        let to_walk = idle.transition_by_name("to_walk").unwrap();
        assert_eq!(to_walk.event, "start");
        assert_eq!(to_walk.target_index, 1);
        assert_eq!(to_walk.target_name, "walk");
        assert_eq!((to_walk.from_frame, to_walk.to_frame), (10, 0));

        assert!(registry.character(1).unwrap().snippets.is_empty());
        assert!(registry.character_by_name("").is_none());
        assert!(manny.snippet_by_name("run").is_none());
    }

    #[test]
    fn text_round_trips_through_writer() {
        let registry = CharacterRegistry::parse_text(SAMPLE).unwrap();
        let reparsed = CharacterRegistry::parse_text(&registry.to_text()).unwrap();
        assert_eq!(registry, reparsed);

        let text = registry.to_string();
        assert!(text.starts_with("FWc1\ncast\n2\nmanny\n2\n\tidle\n\t0 10\n\t1\n"));
        assert!(text.contains("\t\tto_walk start 1 walk 10 0\n"));
        assert!(text.ends_with("glottis\n0\n"));
    }

    #[test]
    fn text_rejects_wrong_magic_and_short_input() {
        let err = CharacterRegistry::parse_text("FWc2 cast 0").unwrap_err();
        assert!(matches!(err, RegistryError::BadMagic { .. }));

        let err = CharacterRegistry::parse_text("FWc1 cast 1 manny 1 idle 0").unwrap_err();
        assert!(matches!(
            err,
            RegistryError::UnexpectedEof { field: "snippet end frame" }
        ));

        let err = CharacterRegistry::parse_text("FWc1 cast 1 manny x").unwrap_err();
        assert!(matches!(err, RegistryError::InvalidNumber { field: "snippet count", .. }));
    }

    #[test]
    fn text_rejects_names_that_overflow_the_field() {
        let long = "n".repeat(NAME_LEN);
        let err = CharacterRegistry::parse_text(&format!("FWc1 {long} 0")).unwrap_err();
        assert!(matches!(err, RegistryError::NameTooLong { .. }));
    }

    #[test]
    fn sniffs_both_formats() {
        assert_eq!(sniff_format(b"  FWc1\ncast 0").unwrap(), CharacterFormat::Text);
        assert_eq!(sniff_format(b"FWc1").unwrap(), CharacterFormat::Text);
        assert_eq!(sniff_format(b"FWc1cast\0\0").unwrap(), CharacterFormat::Binary);
        assert!(matches!(sniff_format(b"MLEa"), Err(RegistryError::BadMagic { .. })));
        assert!(matches!(sniff_format(b""), Err(RegistryError::EmptyFile)));
    }

    fn binary_image(endian: Endian) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(CHARACTER_MAGIC.as_bytes());
        layout::put_name(&mut out, "cast");
        endian.put_u32(&mut out, 1);
        // the pointer slots are garbage on disk; fill them so a misread shows
        endian.put_u32(&mut out, 0xdead_beef);
        let character_offset = out.len() + 4;
        endian.put_u32(&mut out, character_offset as u32);

        // character: header, one snippet offset relative to the character
        layout::put_name(&mut out, "manny");
        endian.put_u32(&mut out, 1);
        endian.put_u32(&mut out, 0xdead_beef);
        endian.put_u32(&mut out, (CHARACTER_HEADER_LEN + 4) as u32);

        layout::put_name(&mut out, "idle");
        endian.put_u16(&mut out, 0);
        endian.put_u16(&mut out, 10);
        endian.put_u32(&mut out, 1);

        layout::put_name(&mut out, "to_walk");
        layout::put_name(&mut out, "start");
        endian.put_i32(&mut out, -1);
        layout::put_name(&mut out, "walk");
        endian.put_u16(&mut out, 10);
        endian.put_u16(&mut out, 0);
        out
    }

    #[test]
    fn parses_binary_registry() {
        for endian in [Endian::Little, Endian::Big] {
            let registry = CharacterRegistry::from_bytes(&binary_image(endian), endian).unwrap();
            assert_eq!(registry.name, "cast");
            assert_eq!(registry.characters[0].name, "manny");
            let idle = registry.characters[0].snippet_by_name("idle").unwrap();
            assert_eq!(idle.end_frame, 10);
            let t = idle.transition(0).unwrap();
            assert_eq!(t.target_index, -1);
            assert_eq!(t.target_name, "walk");
            assert_eq!(t.from_frame, 10);
        }
    }

    #[test]
    fn binary_rejects_out_of_range_offsets() {
        let mut image = binary_image(Endian::Little);
        let bogus = (image.len() + 10) as u32;
        image[CHARACTER_REGISTRY_HEADER_LEN..CHARACTER_REGISTRY_HEADER_LEN + 4]
            .copy_from_slice(&bogus.to_le_bytes());
        let err = CharacterRegistry::from_bytes(&image, Endian::Little).unwrap_err();
        assert!(matches!(err, RegistryError::OffsetOutOfBounds { index: 0, .. }));
    }

    #[test]
    fn binary_rejects_truncated_transitions() {
        let mut image = binary_image(Endian::Little);
        image.truncate(image.len() - 3);
        let err = CharacterRegistry::from_bytes(&image, Endian::Little).unwrap_err();
        assert!(matches!(err, RegistryError::Truncated { what: "snippet transitions", .. }));
    }
}
