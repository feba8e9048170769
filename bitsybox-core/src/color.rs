//! RGB565 colors and the system palette.

use crate::error::{out_of_range, Result};

/// Number of entries in the system palette.
pub const PALETTE_SIZE: usize = 256;

/// A packed 16-bit pixel: 5 bits red, 6 bits green, 5 bits blue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Color(pub u16);

impl Color {
    pub const BLACK: Color = Color(0);

    /// Pack 8-bit channels by keeping their most significant bits. No rounding.
    pub const fn from_rgb888(r: u8, g: u8, b: u8) -> Self {
        Color(((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3))
    }

    pub const fn red5(self) -> u8 {
        (self.0 >> 11) as u8
    }

    pub const fn green6(self) -> u8 {
        ((self.0 >> 5) & 0x3F) as u8
    }

    pub const fn blue5(self) -> u8 {
        (self.0 & 0x1F) as u8
    }

    /// Expand back to 8-bit channels, replicating the high bits into the low ones.
    pub const fn to_rgb888(self) -> (u8, u8, u8) {
        let r = self.red5();
        let g = self.green6();
        let b = self.blue5();
        ((r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2))
    }
}

/// Fixed table mapping palette indices to colors.
#[derive(Clone, Debug)]
pub struct Palette {
    entries: [Color; PALETTE_SIZE],
}

impl Palette {
    /// An all-black palette.
    pub fn new() -> Self {
        Self { entries: [Color::BLACK; PALETTE_SIZE] }
    }

    /// The palette a session starts with: red, green, blue, then black.
    pub fn system_default() -> Self {
        let mut palette = Self::new();
        palette.entries[0] = Color::from_rgb888(255, 0, 0);
        palette.entries[1] = Color::from_rgb888(0, 255, 0);
        palette.entries[2] = Color::from_rgb888(0, 0, 255);
        palette
    }

    pub fn set_color(&mut self, index: u8, r: u8, g: u8, b: u8) {
        self.entries[index as usize] = Color::from_rgb888(r, g, b);
    }

    /// Checked variant for indices that arrive as wider integers.
    pub fn set_color_checked(&mut self, index: i64, r: u8, g: u8, b: u8) -> Result<()> {
        let index = u8::try_from(index).map_err(|_| out_of_range("palette index", index))?;
        self.set_color(index, r, g, b);
        Ok(())
    }

    pub fn reset_colors(&mut self) {
        self.entries = [Color::BLACK; PALETTE_SIZE];
    }

    pub fn color(&self, index: u8) -> Color {
        self.entries[index as usize]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing_keeps_top_bits() {
        let mut palette = Palette::new();
        for &v in &[0u8, 31, 32, 255] {
            palette.set_color(7, v, v, v);
            let c = palette.color(7);
            assert_eq!(c.red5(), v >> 3);
            assert_eq!(c.green6(), v >> 2);
            assert_eq!(c.blue5(), v >> 3);
        }
        assert_eq!(Color::from_rgb888(255, 0, 0), Color(0xF800));
        assert_eq!(Color::from_rgb888(0, 255, 0), Color(0x07E0));
        assert_eq!(Color::from_rgb888(0, 0, 255), Color(0x001F));
    }

    #[test]
    fn reset_clears_every_entry() {
        let mut palette = Palette::system_default();
        palette.set_color(255, 10, 20, 30);
        palette.reset_colors();
        assert!((0..=255u8).all(|i| palette.color(i) == Color::BLACK));
    }

    #[test]
    fn checked_set_rejects_out_of_range() {
        let mut palette = Palette::new();
        assert!(palette.set_color_checked(256, 1, 2, 3).is_err());
        assert!(palette.set_color_checked(-1, 1, 2, 3).is_err());
        assert!(palette.set_color_checked(255, 255, 255, 255).is_ok());
        assert_eq!(palette.color(255), Color(0xFFFF));
    }

    #[test]
    fn expansion_round_trips_extremes() {
        assert_eq!(Color(0xFFFF).to_rgb888(), (255, 255, 255));
        assert_eq!(Color::BLACK.to_rgb888(), (0, 0, 0));
    }
}
