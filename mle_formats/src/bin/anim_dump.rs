use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mle_formats::{AnimationRegistry, Endian};

/// Inspect a 3D animation registry and list its animations and sequences.
#[derive(Parser)]
struct Args {
    /// Path to the animation registry file
    path: PathBuf,

    /// Byte order the registry was written in
    #[arg(long, value_enum, default_value_t = Endian::Little)]
    endian: Endian,

    /// Only show the animation with this name
    #[arg(long)]
    animation: Option<String>,

    /// Print the registry summary as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let registry = AnimationRegistry::read(&args.path, args.endian)
        .with_context(|| format!("loading {}", args.path.display()))?;

    let mut summary = registry.summary();
    if let Some(name) = &args.animation {
        summary.animations.retain(|animation| &animation.name == name);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "registry {} ({} animations)",
        summary.name,
        registry.len()
    );
    for animation in &summary.animations {
        println!(
            "{:<32} frames {:>5}  sequences {:>4}",
            animation.name,
            animation.num_frames,
            animation.sequences.len()
        );
        for sequence in &animation.sequences {
            println!(
                "    {:<32} parent {:>4}  start {:>5}  type {:>3}",
                sequence.name, sequence.parent, sequence.start_frame, sequence.kind
            );
        }
    }
    Ok(())
}
