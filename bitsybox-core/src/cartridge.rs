//! Asset bundle handed to a session: game data, font data and the engine
//! units evaluated before the load hook runs.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use crate::decode::CartReader;
use crate::encode::CartWriter;
use crate::error::{ConsoleError, Result};
use crate::format::EntryKind;

/// Entry name the packer gives the font when none is supplied.
pub const DEFAULT_FONT_NAME: &str = "default_font";

/// One engine script or bytecode unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptUnit {
    pub name: String,
    pub code: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cartridge {
    pub game: Vec<u8>,
    pub font: Vec<u8>,
    /// Engine units in evaluation order.
    pub units: Vec<ScriptUnit>,
}

fn asset_error(err: anyhow::Error) -> ConsoleError {
    ConsoleError::AssetLoad(format!("{err:#}"))
}

impl Cartridge {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| ConsoleError::AssetLoad(format!("{}: {e}", path.display())))?;
        let cart = Self::read(BufReader::new(file))?;
        log::info!(
            "loaded {}: {} engine units, game {} bytes, font {} bytes",
            path.display(),
            cart.units.len(),
            cart.game.len(),
            cart.font.len()
        );
        Ok(cart)
    }

    pub fn read<R: Read + Seek>(reader: R) -> Result<Self> {
        let mut reader = CartReader::new(reader).map_err(asset_error)?;

        let mut game = None;
        let mut font = None;
        let mut units = Vec::new();
        for idx in 0..reader.index.len() {
            let (kind, name) = (reader.index[idx].kind, reader.index[idx].name.clone());
            let data = reader
                .read_entry(idx)
                .map_err(|e| asset_error(e.context(format!("entry {name}"))))?;
            match kind {
                EntryKind::Script => units.push(ScriptUnit { name, code: data }),
                EntryKind::Game if game.is_none() => game = Some(data),
                EntryKind::Font if font.is_none() => font = Some(data),
                _ => log::warn!("ignoring duplicate {kind:?} entry {name}"),
            }
        }

        Ok(Self {
            game: game.ok_or_else(|| ConsoleError::AssetLoad("cartridge has no game data".into()))?,
            font: font.ok_or_else(|| ConsoleError::AssetLoad("cartridge has no font".into()))?,
            units,
        })
    }

    /// Write units first, then the game and font.
    pub fn write<W: Write + Seek>(&self, writer: W, font_name: &str) -> anyhow::Result<W> {
        let mut writer = CartWriter::new(writer)?;
        for unit in &self.units {
            writer.write_entry(EntryKind::Script, &unit.name, &unit.code)?;
        }
        writer.write_entry(EntryKind::Game, "game", &self.game)?;
        writer.write_entry(EntryKind::Font, font_name, &self.font)?;
        writer.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample() -> Cartridge {
        Cartridge {
            game: b"Write your game's title here\n\nPAL 0\n0,82,204\n".to_vec(),
            font: vec![7u8; 300],
            units: vec![
                ScriptUnit { name: "engine".into(), code: b"var a = 1;".to_vec() },
                ScriptUnit { name: "bitsy".into(), code: vec![0u8; 4096] },
            ],
        }
    }

    #[test]
    fn roundtrip_keeps_unit_order() {
        let cart = sample();
        let buf = cart.write(Cursor::new(Vec::new()), DEFAULT_FONT_NAME).unwrap();
        let back = Cartridge::read(Cursor::new(buf.into_inner())).unwrap();
        assert_eq!(back, cart);
        assert_eq!(back.units[0].name, "engine");
    }

    #[test]
    fn missing_font_is_an_asset_error() {
        let mut writer = CartWriter::new(Cursor::new(Vec::new())).unwrap();
        writer.write_entry(EntryKind::Game, "game", b"game").unwrap();
        let buf = writer.finish().unwrap();

        let err = Cartridge::read(Cursor::new(buf.into_inner())).unwrap_err();
        assert_eq!(err, ConsoleError::AssetLoad("cartridge has no font".into()));
    }

    #[test]
    fn bad_magic_is_an_asset_error() {
        let err = Cartridge::read(Cursor::new(vec![0u8; 64])).unwrap_err();
        assert!(matches!(err, ConsoleError::AssetLoad(msg) if msg.contains("magic")));
    }

    #[test]
    fn entry_past_end_of_file_is_rejected() {
        let buf = sample().write(Cursor::new(Vec::new()), DEFAULT_FONT_NAME).unwrap().into_inner();

        // first index record sits right after the payloads; inflate its size
        let index_offset = u64::from_le_bytes(buf[10..18].try_into().unwrap()) as usize;
        let mut forged = buf.clone();
        forged[index_offset + 10..index_offset + 14].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = Cartridge::read(Cursor::new(forged)).unwrap_err();
        assert!(matches!(err, ConsoleError::AssetLoad(msg) if msg.contains("past end of file")));

        let mut truncated = buf;
        truncated[10..18].copy_from_slice(&u64::MAX.to_le_bytes());
        assert!(Cartridge::read(Cursor::new(truncated)).is_err());
    }

    #[test]
    fn missing_file_is_an_asset_error() {
        let err = Cartridge::load(Path::new("/nonexistent/game.bbox")).unwrap_err();
        assert!(matches!(err, ConsoleError::AssetLoad(_)));
    }
}
