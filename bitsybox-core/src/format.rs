//! On-disk layout of a cartridge file.
//!
//! ```text
//! header (32 bytes) | entry payloads (lz4, size-prepended) | index
//! ```
//!
//! The index is a sequence of variable-length records, one per entry, in the
//! order the entries were written. Engine units are evaluated in that order.

pub const MAGIC: &[u8; 4] = b"BBOX";
pub const VERSION: u16 = 1;
pub const HEADER_SIZE: usize = 32;

/// What an entry holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// Engine script or bytecode unit.
    Script = 0,
    /// Compiled game data.
    Game = 1,
    Font = 2,
}

impl EntryKind {
    pub fn from_u8(v: u8) -> anyhow::Result<Self> {
        match v {
            0 => Ok(EntryKind::Script),
            1 => Ok(EntryKind::Game),
            2 => Ok(EntryKind::Font),
            other => anyhow::bail!("unknown entry kind: {other}"),
        }
    }
}

/// File header, fixed 32 bytes at the start of a cartridge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartHeader {
    // magic: [u8; 4] = "BBOX"
    // version: u16
    pub entry_count: u32,
    pub index_offset: u64,
}

impl CartHeader {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..6].copy_from_slice(&VERSION.to_le_bytes());
        buf[6..10].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[10..18].copy_from_slice(&self.index_offset.to_le_bytes());
        // bytes 18..32 reserved
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> anyhow::Result<Self> {
        if &buf[0..4] != MAGIC {
            anyhow::bail!("invalid magic: expected BBOX");
        }
        let version = u16::from_le_bytes([buf[4], buf[5]]);
        if version != VERSION {
            anyhow::bail!("unsupported version: {version}");
        }
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&buf[10..18]);
        Ok(Self {
            entry_count: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
            index_offset: u64::from_le_bytes(offset),
        })
    }
}

/// One record of the trailing index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub kind: EntryKind,
    pub name: String,
    pub offset: u64,
    pub compressed_size: u32,
}

impl IndexEntry {
    /// Size of the record before the name bytes.
    pub const FIXED_SIZE: usize = 14;

    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let name = self.name.as_bytes();
        let name_len = u8::try_from(name.len())
            .map_err(|_| anyhow::anyhow!("entry name too long: {}", self.name))?;
        let mut buf = Vec::with_capacity(Self::FIXED_SIZE + name.len());
        buf.push(self.kind as u8);
        buf.push(name_len);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.compressed_size.to_le_bytes());
        buf.extend_from_slice(name);
        Ok(buf)
    }

    /// Parse the fixed part. Returns the entry with an empty name and the
    /// number of name bytes that follow.
    pub fn from_fixed(buf: &[u8; Self::FIXED_SIZE]) -> anyhow::Result<(Self, usize)> {
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&buf[2..10]);
        let entry = Self {
            kind: EntryKind::from_u8(buf[0])?,
            name: String::new(),
            offset: u64::from_le_bytes(offset),
            compressed_size: u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]),
        };
        Ok((entry, buf[1] as usize))
    }
}
