use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bitsybox_core::cartridge::DEFAULT_FONT_NAME;
use bitsybox_core::{Cartridge, ScriptUnit};
use clap::Parser;

#[derive(Parser)]
#[command(name = "bitsybox-pack", about = "Bundle a Bitsy game into a .bbox cartridge")]
struct Cli {
    /// Compiled game data (Bitsy game text)
    #[arg(long)]
    game: PathBuf,

    /// Font data
    #[arg(long)]
    font: PathBuf,

    /// Engine script unit; repeat to add more, evaluated in the order given
    #[arg(long = "unit")]
    units: Vec<PathBuf>,

    /// Output .bbox file path (default: game file with .bbox extension)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn unit_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let output_path = cli.output.clone().unwrap_or_else(|| {
        let mut p = cli.game.clone();
        p.set_extension("bbox");
        p
    });

    let mut units = Vec::with_capacity(cli.units.len());
    for path in &cli.units {
        let code = read(path)?;
        log::info!("unit {}: {} bytes", path.display(), code.len());
        units.push(ScriptUnit { name: unit_name(path), code });
    }
    if units.is_empty() {
        log::warn!("no engine units given, the player will fall back to its demo host");
    }

    let cart = Cartridge {
        game: read(&cli.game)?,
        font: read(&cli.font)?,
        units,
    };
    log::info!("game: {} bytes, font: {} bytes", cart.game.len(), cart.font.len());

    let font_name = cli
        .font
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_FONT_NAME.to_string());

    let file = File::create(&output_path)
        .with_context(|| format!("failed to create {}", output_path.display()))?;
    cart.write(BufWriter::new(file), &font_name)?;
    log::info!("wrote {}", output_path.display());

    Ok(())
}
