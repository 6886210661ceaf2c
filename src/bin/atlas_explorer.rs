//! Interactive Harvard-Oxford atlas browser
//!
//! Lists the label tables of both atlases and renders preview images of
//! individual region masks. This is the tool the study's region indices
//! were chosen with.

// Interactive terminal tool; stdout is its user interface
#![allow(clippy::print_stdout)]

use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use valence::atlas::{AtlasKind, fetch_atlas};
use valence::io::configuration::ATLAS_CACHE_DIR;
use valence::io::error::fs_error;
use valence::io::plot::render_mask_preview;

/// Browse atlas regions and render mask previews
#[derive(Parser, Debug)]
#[command(name = "atlas-explorer", version, about)]
struct Cli {
    /// Cache directory for downloaded atlas volumes and previews
    #[arg(long, default_value = ATLAS_CACHE_DIR)]
    cache_dir: PathBuf,
}

fn main() -> valence::Result<()> {
    let cli = Cli::parse();
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        println!();
        println!("1) Browse cortical atlas");
        println!("2) Browse subcortical atlas");
        println!("3) Exit");
        let Some(choice) = prompt(&mut lines, "Choice: ")? else {
            break;
        };
        match choice.as_str() {
            "1" => browse(AtlasKind::Cortical, &cli.cache_dir, &mut lines)?,
            "2" => browse(AtlasKind::Subcortical, &cli.cache_dir, &mut lines)?,
            "3" => break,
            _ => println!("Please enter a valid number"),
        }
    }
    Ok(())
}

/// Read one trimmed line, `None` on end of input
fn prompt<B: BufRead>(
    lines: &mut std::io::Lines<B>,
    message: &str,
) -> valence::Result<Option<String>> {
    print!("{message}");
    std::io::stdout()
        .flush()
        .map_err(|e| fs_error("stdout", "flush prompt", e))?;
    match lines.next() {
        Some(line) => {
            let line = line.map_err(|e| fs_error("stdin", "read input", e))?;
            Ok(Some(line.trim().to_string()))
        }
        None => Ok(None),
    }
}

fn browse<B: BufRead>(
    kind: AtlasKind,
    cache_dir: &Path,
    lines: &mut std::io::Lines<B>,
) -> valence::Result<()> {
    for (index, label) in kind.labels().iter().enumerate().skip(1) {
        println!("{index:3}  {label}");
    }

    let Some(answer) = prompt(lines, "Region index to preview (blank to go back): ")? else {
        return Ok(());
    };
    if answer.is_empty() {
        return Ok(());
    }
    let Ok(index) = answer.parse::<u32>() else {
        println!("Please enter a valid number");
        return Ok(());
    };

    let atlas = fetch_atlas(kind, cache_dir)?;
    let Some(label) = atlas.label(index as usize) else {
        println!("No region with index {index}");
        return Ok(());
    };

    let mask = atlas.region_mask(index, label);
    if mask.n_voxels() == 0 {
        println!("Region '{label}' has no voxels in the max-probability volume");
        return Ok(());
    }

    let prefix = match kind {
        AtlasKind::Cortical => "cortical",
        AtlasKind::Subcortical => "subcortical",
    };
    let path = cache_dir.join(format!("{prefix}_region_{index}.png"));
    render_mask_preview(&mask, &path)?;
    println!(
        "Saved preview of '{label}' ({} voxels) to {}",
        mask.n_voxels(),
        path.display()
    );
    Ok(())
}
