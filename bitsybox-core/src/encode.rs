use std::io::{Seek, SeekFrom, Write};

use crate::compress;
use crate::format::*;

/// Writes cartridge files incrementally.
pub struct CartWriter<W: Write + Seek> {
    writer: W,
    index: Vec<IndexEntry>,
}

impl<W: Write + Seek> CartWriter<W> {
    /// Create a new writer. Writes a placeholder header immediately.
    pub fn new(mut writer: W) -> anyhow::Result<Self> {
        let header = CartHeader { entry_count: 0, index_offset: 0 };
        writer.write_all(&header.to_bytes())?;
        Ok(Self { writer, index: Vec::new() })
    }

    /// Append one entry. Script units keep the order they are written in.
    pub fn write_entry(&mut self, kind: EntryKind, name: &str, data: &[u8]) -> anyhow::Result<()> {
        let compressed = compress::compress(data);
        let compressed_size = u32::try_from(compressed.len())
            .map_err(|_| anyhow::anyhow!("entry {name} is too large"))?;
        let offset = self.writer.stream_position()?;
        self.writer.write_all(&compressed)?;

        self.index.push(IndexEntry {
            kind,
            name: name.to_string(),
            offset,
            compressed_size,
        });
        Ok(())
    }

    /// Finalize: write the index, rewrite the header, flush.
    pub fn finish(mut self) -> anyhow::Result<W> {
        let index_offset = self.writer.stream_position()?;
        for entry in &self.index {
            self.writer.write_all(&entry.to_bytes()?)?;
        }

        let header = CartHeader {
            entry_count: self.index.len() as u32,
            index_offset,
        };
        self.writer.seek(SeekFrom::Start(0))?;
        self.writer.write_all(&header.to_bytes())?;

        self.writer.seek(SeekFrom::End(0))?;
        self.writer.flush()?;

        Ok(self.writer)
    }
}
