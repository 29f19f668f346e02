use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use mle_playprint::{
    ChunkTag, Endian, GroupListing, Instruction, Playprint, PlayprintHeader, disassemble,
    disassemble_group,
};
use serde::Serialize;

/// Inspect a digital playprint: header, table of contents and chunk streams.
#[derive(Parser)]
struct Args {
    /// Path to the playprint file
    path: PathBuf,

    /// Decode group and set opcode streams, scene lists and media lists
    #[arg(long)]
    disassemble: bool,

    /// Only show this table-of-contents entry
    #[arg(long)]
    group: Option<u32>,

    /// Print the listing as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Dump {
    endian: Endian,
    header: Option<PlayprintHeader>,
    entries: Vec<EntryDump>,
}

#[derive(Serialize)]
struct EntryDump {
    index: u32,
    label: u32,
    tag: ChunkTag,
    offset: usize,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    contents: Option<Contents>,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Contents {
    Group(GroupListing),
    Set(Vec<Instruction>),
    Scene { scene_class: i32, groups: Vec<i32> },
    Media {
        flags: u32,
        media_type: u32,
        refs: Vec<MediaDump>,
    },
}

#[derive(Serialize)]
struct MediaDump {
    flags: u32,
    media_type: u32,
    size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    file: Option<String>,
}

fn decode(playprint: &Playprint, index: u32, tag: ChunkTag) -> Result<Option<Contents>> {
    let payload = playprint.chunk_payload(index)?;
    let endian = playprint.endian();
    let contents = match tag {
        ChunkTag::GROUP => Contents::Group(disassemble_group(payload, endian)?),
        ChunkTag::SET => Contents::Set(disassemble(payload, endian)?),
        ChunkTag::SCENE => {
            if payload.len() < 8 {
                bail!("scene chunk {index} is {} bytes", payload.len());
            }
            let scene_class = endian.read_i32(&payload[0..4]);
            let groups = payload[8..]
                .chunks_exact(4)
                .take(endian.read_u32(&payload[4..8]) as usize)
                .map(|bytes| endian.read_i32(bytes))
                .collect();
            Contents::Scene {
                scene_class,
                groups,
            }
        }
        ChunkTag::LIST => {
            let media = playprint.media_ref(index)?;
            Contents::Media {
                flags: media.info.flags,
                media_type: media.info.media_type,
                refs: media
                    .entries
                    .iter()
                    .map(|entry| MediaDump {
                        flags: entry.flags,
                        media_type: entry.media_type,
                        size: entry.data.len(),
                        file: entry.file_name().map(|name| name.into_owned()),
                    })
                    .collect(),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(contents))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let playprint = Playprint::open(&args.path)
        .with_context(|| format!("loading {}", args.path.display()))?;

    let mut entries = Vec::new();
    for (index, entry) in playprint.toc().iter().enumerate() {
        let index = index as u32;
        if args.group.is_some_and(|wanted| wanted != index) {
            continue;
        }
        let chunk = playprint
            .toc_chunk(index)
            .with_context(|| format!("resolving toc entry {index}"))?;
        let contents = if args.disassemble {
            decode(&playprint, index, chunk.tag)
                .with_context(|| format!("decoding {} chunk {index}", chunk.tag))?
        } else {
            None
        };
        entries.push(EntryDump {
            index,
            label: entry.label,
            tag: chunk.tag,
            offset: chunk.offset,
            size: chunk.size,
            contents,
        });
    }
    if let Some(wanted) = args.group {
        if entries.is_empty() {
            bail!("no toc entry {wanted} ({} entries)", playprint.toc().len());
        }
    }

    let dump = Dump {
        endian: playprint.endian(),
        header: playprint.header(),
        entries,
    };
    if args.json {
        println!("{}", serde_json::to_string_pretty(&dump)?);
        return Ok(());
    }

    match dump.header {
        Some(header) => println!(
            "{} ({:?}) version {} date {}",
            args.path.display(),
            dump.endian,
            header.version,
            header.date
        ),
        None => println!("{} ({:?}) no header", args.path.display(), dump.endian),
    }
    for entry in &dump.entries {
        println!(
            "{index:>4} {tag} label {label:>6} offset {offset:>10} size {size:>8}",
            index = entry.index,
            tag = entry.tag,
            label = entry.label,
            offset = entry.offset,
            size = entry.size
        );
        match &entry.contents {
            Some(Contents::Group(listing)) => {
                println!(
                    "     group class {} with {} actors",
                    listing.group_class, listing.actor_count
                );
                for instruction in &listing.instructions {
                    println!("     {instruction}");
                }
            }
            Some(Contents::Set(instructions)) => {
                for instruction in instructions {
                    println!("     {instruction}");
                }
            }
            Some(Contents::Scene {
                scene_class,
                groups,
            }) => println!("     scene class {scene_class} groups {groups:?}"),
            Some(Contents::Media {
                flags,
                media_type,
                refs,
            }) => {
                println!("     media type {media_type} flags {flags:#x}: {} refs", refs.len());
                for media in refs {
                    match &media.file {
                        Some(file) => println!("       external {file}"),
                        None => println!(
                            "       type {} flags {:#x} {} bytes",
                            media.media_type, media.flags, media.size
                        ),
                    }
                }
            }
            None => {}
        }
    }
    Ok(())
}
