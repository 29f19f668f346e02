use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mle_formats::{CharacterRegistry, Endian};

/// Inspect a 3D character registry (text or binary form).
#[derive(Parser)]
struct Args {
    /// Path to the character registry file
    path: PathBuf,

    /// Byte order of a binary registry; ignored for the text form
    #[arg(long, value_enum, default_value_t = Endian::Little)]
    endian: Endian,

    /// Print the registry as JSON
    #[arg(long)]
    json: bool,

    /// Re-emit the registry in the text form
    #[arg(long, conflicts_with = "json")]
    text: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let registry = CharacterRegistry::read(&args.path, args.endian)
        .with_context(|| format!("loading {}", args.path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&registry)?);
        return Ok(());
    }
    if args.text {
        print!("{}", registry.to_text());
        return Ok(());
    }

    println!(
        "registry {} ({} characters)",
        registry.name,
        registry.characters.len()
    );
    for character in &registry.characters {
        println!("{}", character.name);
        for snippet in &character.snippets {
            println!(
                "    {:<32} frames {:>5}..{:<5} transitions {}",
                snippet.name,
                snippet.start_frame,
                snippet.end_frame,
                snippet.transitions.len()
            );
            for t in &snippet.transitions {
                println!(
                    "        {} on {} -> {} ({}) {}..{}",
                    t.name, t.event, t.target_name, t.target_index, t.from_frame, t.to_frame
                );
            }
        }
    }
    Ok(())
}
