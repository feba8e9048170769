use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{out_of_range, Result};

/// Slot of the screen buffer.
pub const SCREEN_BUFFER_ID: usize = 0;
/// Slot of the textbox buffer.
pub const TEXTBOX_BUFFER_ID: usize = 1;
/// First slot handed out to tiles.
pub const TILE_START_BUFFER_ID: usize = 2;

/// Geometry and pacing of a console session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Edge length of the square physical screen, in pixels.
    pub screen_size: usize,
    /// Edge length of a logical tile.
    pub tile_size: usize,
    /// Replication factor for screen and tile pixels.
    pub render_scale: usize,
    /// Replication factor for textbox pixels.
    pub textbox_render_scale: usize,
    pub textbox_width: usize,
    pub textbox_height: usize,
    /// Size of the buffer table, screen and textbox included.
    pub max_buffers: usize,
    pub frame_budget_ms: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            screen_size: 128,
            tile_size: 8,
            render_scale: 1,
            textbox_render_scale: 1,
            textbox_width: 100,
            textbox_height: 64,
            max_buffers: 1024,
            frame_budget_ms: 16,
        }
    }
}

impl ConsoleConfig {
    pub fn validate(&self) -> Result<()> {
        let nonzero = [
            ("screen size", self.screen_size),
            ("tile size", self.tile_size),
            ("render scale", self.render_scale),
            ("textbox render scale", self.textbox_render_scale),
        ];
        for (what, value) in nonzero {
            if value == 0 {
                return Err(out_of_range(what, 0));
            }
        }
        if self.screen_size > u16::MAX as usize {
            return Err(out_of_range("screen size", self.screen_size as i64));
        }
        if self.screen_size % self.render_scale != 0 {
            return Err(out_of_range("render scale", self.render_scale as i64));
        }
        let tile_edge = self
            .tile_size
            .checked_mul(self.render_scale)
            .filter(|&edge| edge <= self.screen_size)
            .ok_or_else(|| out_of_range("tile size", clamp_i64(self.tile_size)))?;
        if tile_edge.checked_mul(tile_edge).is_none() {
            return Err(out_of_range("tile size", clamp_i64(self.tile_size)));
        }
        if self.textbox_render_scale > self.screen_size {
            return Err(out_of_range("textbox render scale", clamp_i64(self.textbox_render_scale)));
        }
        let limit = self.textbox_limit();
        if self.textbox_width > limit || self.textbox_height > limit {
            return Err(out_of_range("textbox size", clamp_i64(self.textbox_width.max(self.textbox_height))));
        }
        if self.max_buffers <= TILE_START_BUFFER_ID {
            return Err(out_of_range("max buffers", self.max_buffers as i64));
        }
        if self.frame_budget_ms == 0 {
            return Err(out_of_range("frame budget", 0));
        }
        Ok(())
    }

    /// Edge length of a tile buffer in physical pixels.
    pub fn tile_edge(&self) -> usize {
        self.tile_size.saturating_mul(self.render_scale)
    }

    /// Largest textbox edge, in physical pixels.
    pub fn textbox_limit(&self) -> usize {
        self.screen_size.saturating_mul(self.textbox_render_scale)
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }
}

fn clamp_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
