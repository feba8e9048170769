//! The buffer table: screen, textbox and tile pixel buffers.
//!
//! Slot 0 is the screen, slot 1 the textbox, slots from 2 up are tiles.
//! Tiles are handed out in order and reclaimed all at once by
//! [`Buffers::reset_tiles`]. Each tile slot carries a generation counter so a
//! [`TileHandle`] taken before a reset is detected instead of silently aliasing
//! whatever tile reuses the slot.

use crate::color::Color;
use crate::config::{ConsoleConfig, SCREEN_BUFFER_ID, TEXTBOX_BUFFER_ID, TILE_START_BUFFER_ID};
use crate::error::{out_of_range, ConsoleError, Result};

/// A tile slot plus the generation it was allocated in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileHandle {
    index: usize,
    generation: u32,
}

impl TileHandle {
    /// Buffer id as seen by scripts.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Role of a buffer id.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferKind {
    Screen,
    Textbox,
    Tile(usize),
}

impl BufferKind {
    pub fn of(id: usize) -> Self {
        match id {
            SCREEN_BUFFER_ID => BufferKind::Screen,
            TEXTBOX_BUFFER_ID => BufferKind::Textbox,
            _ => BufferKind::Tile(id),
        }
    }
}

struct TileSlot {
    pixels: Vec<Color>,
    generation: u32,
}

pub struct Buffers {
    screen: Vec<Color>,
    screen_size: usize,
    textbox: Vec<Color>,
    textbox_width: usize,
    textbox_height: usize,
    textbox_limit: usize,
    tiles: Vec<TileSlot>,
    tile_edge: usize,
    next_buffer_id: usize,
    max_buffers: usize,
    freed: bool,
}

fn alloc_zeroed(what: &'static str, len: usize) -> Result<Vec<Color>> {
    let bytes = len.saturating_mul(std::mem::size_of::<Color>());
    let mut pixels = Vec::new();
    pixels
        .try_reserve_exact(len)
        .map_err(|_| ConsoleError::AllocationFailure { what, bytes })?;
    pixels.resize(len, Color::BLACK);
    Ok(pixels)
}

fn area(what: &'static str, width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or(ConsoleError::AllocationFailure { what, bytes: usize::MAX })
}

impl Buffers {
    /// Allocate the screen and textbox buffers for a session.
    pub fn new(config: &ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let screen_len = area("screen buffer", config.screen_size, config.screen_size)?;
        let screen = alloc_zeroed("screen buffer", screen_len)?;
        let textbox_len = area("textbox buffer", config.textbox_width, config.textbox_height)?;
        let textbox = alloc_zeroed("textbox buffer", textbox_len)?;

        Ok(Self {
            screen,
            screen_size: config.screen_size,
            textbox,
            textbox_width: config.textbox_width,
            textbox_height: config.textbox_height,
            textbox_limit: config.textbox_limit(),
            tiles: Vec::new(),
            tile_edge: config.tile_edge(),
            next_buffer_id: TILE_START_BUFFER_ID,
            max_buffers: config.max_buffers,
            freed: false,
        })
    }

    /// Hand out the next tile slot. Its contents are zeroed.
    pub fn allocate_tile(&mut self) -> Result<TileHandle> {
        if self.freed {
            return Err(ConsoleError::SessionClosed);
        }
        if self.next_buffer_id >= self.max_buffers {
            return Err(ConsoleError::ResourceExhausted { max_buffers: self.max_buffers });
        }
        let slot = self.next_buffer_id - TILE_START_BUFFER_ID;
        let len = self.tile_edge * self.tile_edge;

        let generation = if let Some(existing) = self.tiles.get_mut(slot) {
            existing.pixels.fill(Color::BLACK);
            existing.generation
        } else {
            self.tiles
                .try_reserve(1)
                .map_err(|_| ConsoleError::AllocationFailure { what: "tile table", bytes: 0 })?;
            let pixels = alloc_zeroed("tile buffer", len)?;
            self.tiles.push(TileSlot { pixels, generation: 0 });
            0
        };

        let handle = TileHandle { index: self.next_buffer_id, generation };
        self.next_buffer_id += 1;
        Ok(handle)
    }

    /// Reclaim every tile id. Storage is kept for reuse; old handles go stale.
    pub fn reset_tiles(&mut self) {
        for slot in &mut self.tiles {
            slot.generation = slot.generation.wrapping_add(1);
        }
        self.next_buffer_id = TILE_START_BUFFER_ID;
        log::info!("reset tiles");
    }

    /// Replace the textbox buffer with a zeroed `width * height` one.
    ///
    /// Returns `Ok(false)` when the size is unchanged. Neither edge may
    /// exceed the screen edge times the textbox scale. On failure the old
    /// buffer and size are kept.
    pub fn resize_textbox(&mut self, width: usize, height: usize) -> Result<bool> {
        if width == self.textbox_width && height == self.textbox_height {
            return Ok(false);
        }
        for (what, edge) in [("textbox width", width), ("textbox height", height)] {
            if edge > self.textbox_limit {
                return Err(out_of_range(what, i64::try_from(edge).unwrap_or(i64::MAX)));
            }
        }
        let len = area("textbox buffer", width, height)?;
        let fresh = alloc_zeroed("textbox buffer", len)?;
        self.textbox = fresh;
        self.textbox_width = width;
        self.textbox_height = height;
        log::info!("set textbox size to {width} x {height}");
        Ok(true)
    }

    /// Release every buffer. Called once at teardown.
    pub fn free_all(&mut self) {
        self.screen = Vec::new();
        self.textbox = Vec::new();
        self.tiles = Vec::new();
        self.next_buffer_id = TILE_START_BUFFER_ID;
        self.freed = true;
    }

    pub fn is_freed(&self) -> bool {
        self.freed
    }

    /// Check a handle against the live tile range and its slot's generation.
    pub fn resolve(&self, handle: TileHandle) -> Result<usize> {
        if !self.is_live_tile(handle.index) {
            return Err(out_of_range("tile id", handle.index as i64));
        }
        let slot = &self.tiles[handle.index - TILE_START_BUFFER_ID];
        if slot.generation != handle.generation {
            return Err(ConsoleError::StaleHandle {
                index: handle.index,
                generation: handle.generation,
            });
        }
        Ok(handle.index)
    }

    pub fn is_live_tile(&self, id: usize) -> bool {
        id >= TILE_START_BUFFER_ID && id < self.next_buffer_id
    }

    /// Whether `id` names an allocated buffer right now.
    pub fn is_valid(&self, id: usize) -> bool {
        !self.freed && id < self.next_buffer_id
    }

    pub fn next_buffer_id(&self) -> usize {
        self.next_buffer_id
    }

    pub fn tile_edge(&self) -> usize {
        self.tile_edge
    }

    pub fn screen_size(&self) -> usize {
        self.screen_size
    }

    pub fn textbox_size(&self) -> (usize, usize) {
        (self.textbox_width, self.textbox_height)
    }

    /// Width and height of a live buffer.
    pub fn dimensions(&self, id: usize) -> Option<(usize, usize)> {
        if !self.is_valid(id) {
            return None;
        }
        match BufferKind::of(id) {
            BufferKind::Screen => Some((self.screen_size, self.screen_size)),
            BufferKind::Textbox => Some((self.textbox_width, self.textbox_height)),
            BufferKind::Tile(_) => Some((self.tile_edge, self.tile_edge)),
        }
    }

    pub fn pixels(&self, id: usize) -> Option<&[Color]> {
        if !self.is_valid(id) {
            return None;
        }
        match BufferKind::of(id) {
            BufferKind::Screen => Some(self.screen.as_slice()),
            BufferKind::Textbox => Some(self.textbox.as_slice()),
            BufferKind::Tile(id) => Some(self.tiles[id - TILE_START_BUFFER_ID].pixels.as_slice()),
        }
    }

    pub fn pixels_mut(&mut self, id: usize) -> Option<&mut [Color]> {
        if !self.is_valid(id) {
            return None;
        }
        match BufferKind::of(id) {
            BufferKind::Screen => Some(self.screen.as_mut_slice()),
            BufferKind::Textbox => Some(self.textbox.as_mut_slice()),
            BufferKind::Tile(id) => {
                Some(self.tiles[id - TILE_START_BUFFER_ID].pixels.as_mut_slice())
            }
        }
    }

    pub fn screen(&self) -> &[Color] {
        &self.screen
    }

    /// The screen for writing alongside a read-only source buffer.
    pub(crate) fn screen_with_source(&mut self, source: usize) -> Option<(&mut [Color], &[Color])> {
        if !self.is_valid(source) {
            return None;
        }
        match BufferKind::of(source) {
            BufferKind::Screen => None,
            BufferKind::Textbox => Some((self.screen.as_mut_slice(), self.textbox.as_slice())),
            BufferKind::Tile(id) => {
                let tile = self.tiles[id - TILE_START_BUFFER_ID].pixels.as_slice();
                Some((self.screen.as_mut_slice(), tile))
            }
        }
    }

    /// Live buffer count and their total size in bytes.
    pub fn usage(&self) -> (usize, usize) {
        if self.freed {
            return (0, 0);
        }
        let live_tiles = self.next_buffer_id - TILE_START_BUFFER_ID;
        let pixels = self.screen.len()
            + self.textbox.len()
            + self.tiles.iter().map(|t| t.pixels.len()).sum::<usize>();
        (2 + live_tiles, pixels * std::mem::size_of::<Color>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_table(max_buffers: usize) -> Buffers {
        let config = ConsoleConfig { max_buffers, ..ConsoleConfig::default() };
        Buffers::new(&config).unwrap()
    }

    #[test]
    fn tiles_are_increasing_until_exhausted() {
        let mut buffers = small_table(6);
        let ids: Vec<usize> = (0..4).map(|_| buffers.allocate_tile().unwrap().index()).collect();
        assert_eq!(ids, vec![2, 3, 4, 5]);
        assert_eq!(
            buffers.allocate_tile(),
            Err(ConsoleError::ResourceExhausted { max_buffers: 6 })
        );
        assert_eq!(buffers.next_buffer_id(), 6);
    }

    #[test]
    fn reset_rewinds_to_base_and_stales_handles() {
        let mut buffers = small_table(16);
        let first = buffers.allocate_tile().unwrap();
        buffers.allocate_tile().unwrap();
        buffers.pixels_mut(first.index()).unwrap()[0] = Color(0x1234);

        buffers.reset_tiles();
        assert!(!buffers.is_live_tile(first.index()));

        let again = buffers.allocate_tile().unwrap();
        assert_eq!(again.index(), TILE_START_BUFFER_ID);
        assert_ne!(again.generation(), first.generation());
        assert!(matches!(buffers.resolve(first), Err(ConsoleError::StaleHandle { .. })));
        assert_eq!(buffers.resolve(again), Ok(TILE_START_BUFFER_ID));
        assert_eq!(buffers.pixels(again.index()).unwrap()[0], Color::BLACK);
    }

    #[test]
    fn same_textbox_size_keeps_storage() {
        let mut buffers = small_table(16);
        let (w, h) = buffers.textbox_size();
        let before = buffers.pixels(TEXTBOX_BUFFER_ID).unwrap().as_ptr();
        assert_eq!(buffers.resize_textbox(w, h), Ok(false));
        assert_eq!(buffers.pixels(TEXTBOX_BUFFER_ID).unwrap().as_ptr(), before);
    }

    #[test]
    fn new_textbox_size_is_zeroed() {
        let mut buffers = small_table(16);
        buffers.pixels_mut(TEXTBOX_BUFFER_ID).unwrap().fill(Color(0xFFFF));
        assert_eq!(buffers.resize_textbox(104, 38), Ok(true));
        let pixels = buffers.pixels(TEXTBOX_BUFFER_ID).unwrap();
        assert_eq!(pixels.len(), 104 * 38);
        assert!(pixels.iter().all(|&c| c == Color::BLACK));
        assert_eq!(buffers.dimensions(TEXTBOX_BUFFER_ID), Some((104, 38)));
    }

    #[test]
    fn oversized_textbox_keeps_old_buffer() {
        let mut buffers = small_table(16);
        for (w, h) in [(usize::MAX, 2), (100_000, 100_000), (129, 10)] {
            let err = buffers.resize_textbox(w, h).unwrap_err();
            assert!(matches!(err, ConsoleError::OutOfRange { .. }), "{w}x{h}");
        }
        assert_eq!(buffers.textbox_size(), (100, 64));
        assert_eq!(buffers.pixels(TEXTBOX_BUFFER_ID).unwrap().len(), 100 * 64);
        assert_eq!(buffers.resize_textbox(128, 128), Ok(true));
    }

    #[test]
    fn textbox_limit_grows_with_its_scale() {
        let config = ConsoleConfig { textbox_render_scale: 2, ..ConsoleConfig::default() };
        let mut buffers = Buffers::new(&config).unwrap();
        assert_eq!(buffers.resize_textbox(256, 40), Ok(true));
        assert!(buffers.resize_textbox(257, 40).is_err());
    }

    #[test]
    fn unvalidated_config_is_rejected() {
        let config = ConsoleConfig { tile_size: 1 << 33, ..ConsoleConfig::default() };
        assert!(matches!(Buffers::new(&config), Err(ConsoleError::OutOfRange { .. })));
    }

    #[test]
    fn free_all_releases_everything() {
        let mut buffers = small_table(16);
        buffers.allocate_tile().unwrap();
        buffers.free_all();
        assert!(buffers.is_freed());
        assert_eq!(buffers.usage(), (0, 0));
        assert!(buffers.pixels(SCREEN_BUFFER_ID).is_none());
        assert_eq!(buffers.allocate_tile(), Err(ConsoleError::SessionClosed));
    }
}
