//! Drawing primitives against the bound buffer.
//!
//! Every call that does not match the current target and graphics mode is a
//! silent no-op; the return value says whether anything was written. All
//! writes are clipped to the destination buffer.

use crate::buffers::{BufferKind, TileHandle};
use crate::color::Color;
use crate::config::{SCREEN_BUFFER_ID, TEXTBOX_BUFFER_ID};
use crate::console::{Console, GraphicsMode};
use crate::error::Result;

/// Fill a `size`x`size` block at `(x0, y0)`, clipped.
fn fill_block(dst: &mut [Color], width: usize, height: usize, x0: i64, y0: i64, size: usize, color: Color) {
    let size = size as i64;
    let left = x0.max(0);
    let right = (x0 + size).min(width as i64);
    if left >= right {
        return;
    }
    for y in y0.max(0)..(y0 + size).min(height as i64) {
        let row = y as usize * width;
        dst[row + left as usize..row + right as usize].fill(color);
    }
}

/// Copy `src` into `dst` at `(x0, y0)` row by row, clipped.
fn blit(
    dst: &mut [Color],
    dst_width: usize,
    dst_height: usize,
    src: &[Color],
    src_width: usize,
    x0: i64,
    y0: i64,
) {
    if src_width == 0 {
        return;
    }
    let left = x0.max(0);
    let right = (x0 + src_width as i64).min(dst_width as i64);
    if left >= right {
        return;
    }
    let skip = (left - x0) as usize;
    let len = (right - left) as usize;

    for (sy, src_row) in src.chunks_exact(src_width).enumerate() {
        let y = y0 + sy as i64;
        if y < 0 {
            continue;
        }
        if y >= dst_height as i64 {
            break;
        }
        let start = y as usize * dst_width + left as usize;
        dst[start..start + len].copy_from_slice(&src_row[skip..skip + len]);
    }
}

impl Console {
    /// Buffer and replication factor a pixel write should use, if any.
    fn pixel_target(&self) -> Option<(usize, usize)> {
        let id = self.context.current?;
        if !self.buffers.is_valid(id) {
            return None;
        }
        let config = self.config();
        match (BufferKind::of(id), self.context.mode) {
            (BufferKind::Screen, GraphicsMode::Direct) => Some((id, config.render_scale)),
            (BufferKind::Textbox, GraphicsMode::Tile) => Some((id, config.textbox_render_scale)),
            (BufferKind::Tile(_), GraphicsMode::Tile) => Some((id, config.render_scale)),
            _ => None,
        }
    }

    /// Whether the screen is bound in tile mode, the precondition for blits.
    fn blitting_to_screen(&self) -> bool {
        self.context.current == Some(SCREEN_BUFFER_ID)
            && self.context.mode == GraphicsMode::Tile
            && !self.buffers.is_freed()
    }

    /// Write one logical pixel as a scaled block into the bound buffer.
    pub fn draw_pixel(&mut self, index: u8, x: i32, y: i32) -> bool {
        let Some((id, scale)) = self.pixel_target() else {
            return false;
        };
        let color = self.palette.color(index);
        let Some((width, height)) = self.buffers.dimensions(id) else {
            return false;
        };
        let Some(pixels) = self.buffers.pixels_mut(id) else {
            return false;
        };
        let x0 = x as i64 * scale as i64;
        let y0 = y as i64 * scale as i64;
        fill_block(pixels, width, height, x0, y0, scale, color);
        true
    }

    /// Fill the whole bound buffer. Independent of graphics mode.
    pub fn clear(&mut self, index: u8) -> bool {
        let Some(id) = self.context.current else {
            return false;
        };
        let color = self.palette.color(index);
        match self.buffers.pixels_mut(id) {
            Some(pixels) => {
                pixels.fill(color);
                true
            }
            None => false,
        }
    }

    /// Copy a tile onto the screen at tile-grid position `(x, y)`.
    pub fn draw_tile(&mut self, tile: usize, x: i32, y: i32) -> bool {
        if !self.blitting_to_screen() || !self.buffers.is_live_tile(tile) {
            return false;
        }
        let edge = self.buffers.tile_edge();
        let size = self.buffers.screen_size();
        let Some((screen, src)) = self.buffers.screen_with_source(tile) else {
            return false;
        };
        blit(screen, size, size, src, edge, x as i64 * edge as i64, y as i64 * edge as i64);
        true
    }

    /// Like [`Console::draw_tile`] for native callers holding a handle.
    pub fn draw_tile_handle(&mut self, handle: TileHandle, x: i32, y: i32) -> Result<bool> {
        let tile = self.buffers.resolve(handle)?;
        Ok(self.draw_tile(tile, x, y))
    }

    /// Copy the textbox onto the screen at `(x, y)` times the textbox scale.
    pub fn draw_textbox(&mut self, x: i32, y: i32) -> bool {
        if !self.blitting_to_screen() {
            return false;
        }
        let scale = self.config().textbox_render_scale as i64;
        let (width, _) = self.buffers.textbox_size();
        let size = self.buffers.screen_size();
        let Some((screen, src)) = self.buffers.screen_with_source(TEXTBOX_BUFFER_ID) else {
            return false;
        };
        blit(screen, size, size, src, width, x as i64 * scale, y as i64 * scale);
        true
    }

    /// Read back one physical pixel.
    pub fn pixel(&self, buffer: usize, x: usize, y: usize) -> Option<Color> {
        let (width, height) = self.buffers.dimensions(buffer)?;
        if x >= width || y >= height {
            return None;
        }
        self.buffers.pixels(buffer).map(|p| p[y * width + x])
    }

    /// Every physical pixel of a live buffer, row-major.
    pub fn buffer_pixels(&self, buffer: usize) -> Option<&[Color]> {
        self.buffers.pixels(buffer)
    }
}
