use std::io::{Read, Seek, SeekFrom};

use anyhow::Context;

use crate::compress;
use crate::format::*;

/// Reads cartridge files.
pub struct CartReader<R: Read + Seek> {
    reader: R,
    len: u64,
    pub index: Vec<IndexEntry>,
}

impl<R: Read + Seek> CartReader<R> {
    /// Open and parse header + index.
    pub fn new(mut reader: R) -> anyhow::Result<Self> {
        let mut header_buf = [0u8; HEADER_SIZE];
        reader.read_exact(&mut header_buf).context("reading cartridge header")?;
        let header = CartHeader::from_bytes(&header_buf)?;
        let len = reader.seek(SeekFrom::End(0))?;
        if header.index_offset > len {
            anyhow::bail!("index offset {} past end of file ({len} bytes)", header.index_offset);
        }

        reader.seek(SeekFrom::Start(header.index_offset))?;
        let mut index = Vec::with_capacity(header.entry_count.min(1024) as usize);
        for i in 0..header.entry_count {
            let mut fixed = [0u8; IndexEntry::FIXED_SIZE];
            reader
                .read_exact(&mut fixed)
                .with_context(|| format!("reading index entry {i}"))?;
            let (mut entry, name_len) = IndexEntry::from_fixed(&fixed)?;
            let mut name = vec![0u8; name_len];
            reader.read_exact(&mut name)?;
            entry.name = String::from_utf8(name).context("entry name is not utf-8")?;
            index.push(entry);
        }

        Ok(Self { reader, len, index })
    }

    /// Read and decompress one entry by position in the index.
    pub fn read_entry(&mut self, idx: usize) -> anyhow::Result<Vec<u8>> {
        let entry = self
            .index
            .get(idx)
            .with_context(|| format!("no entry {idx}"))?;
        let end = entry.offset.checked_add(entry.compressed_size as u64);
        if end.map_or(true, |end| end > self.len) {
            anyhow::bail!(
                "entry {} ({} bytes at {}) runs past end of file",
                entry.name,
                entry.compressed_size,
                entry.offset
            );
        }
        let size = entry.compressed_size as usize;
        self.reader.seek(SeekFrom::Start(entry.offset))?;
        let mut compressed = vec![0u8; size];
        self.reader.read_exact(&mut compressed)?;
        compress::decompress(&compressed)
    }
}
