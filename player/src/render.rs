use std::io::Write;

use bitsybox_core::{Color, PanelSink};

const HALF_BLOCK: &str = "▄";

/// One terminal cell: bg = top pixel, fg = bottom pixel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub top: (u8, u8, u8),
    pub bottom: (u8, u8, u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeltaCell {
    pub x: u16,
    pub y: u16,
    pub cell: Cell,
}

/// Convert an RGB565 bitmap into half-block cells, two pixel rows per cell
/// row. An odd last row is padded with black.
pub fn pixels_to_cells(pixels: &[Color], width: usize, height: usize) -> Vec<Cell> {
    let rows = (height + 1) / 2;
    let mut cells = Vec::with_capacity(width * rows);

    for row in 0..rows {
        let top_y = row * 2;
        let bot_y = top_y + 1;
        for col in 0..width {
            let top = pixels[top_y * width + col].to_rgb888();
            let bottom = if bot_y < height {
                pixels[bot_y * width + col].to_rgb888()
            } else {
                (0, 0, 0)
            };
            cells.push(Cell { top, bottom });
        }
    }

    cells
}

/// Cells of `current` that differ from `prev`.
pub fn changed_cells(prev: &[Cell], current: &[Cell], cols: usize) -> Vec<DeltaCell> {
    prev.iter()
        .zip(current)
        .enumerate()
        .filter(|(_, (old, new))| old != new)
        .map(|(i, (_, new))| DeltaCell {
            x: (i % cols) as u16,
            y: (i / cols) as u16,
            cell: *new,
        })
        .collect()
}

/// Render a full grid at terminal position (`col`, `row`), 0-based.
/// Skips color escapes that repeat the previous cell's.
pub fn render_keyframe(cells: &[Cell], cols: usize, col: u16, row: u16, buf: &mut Vec<u8>) {
    buf.clear();

    let mut prev: Option<Cell> = None;
    for (y, line) in cells.chunks_exact(cols.max(1)).enumerate() {
        write_cursor_pos(buf, row + y as u16 + 1, col + 1);
        for cell in line {
            if prev.map_or(true, |p| p.top != cell.top) {
                write_bg(buf, cell.top);
            }
            if prev.map_or(true, |p| p.bottom != cell.bottom) {
                write_fg(buf, cell.bottom);
            }
            prev = Some(*cell);
            buf.extend_from_slice(HALF_BLOCK.as_bytes());
        }
    }

    buf.extend_from_slice(b"\x1b[0m");
}

/// Render only the changed cells.
pub fn render_delta(deltas: &[DeltaCell], col: u16, row: u16, buf: &mut Vec<u8>) {
    buf.clear();

    for d in deltas {
        write_cursor_pos(buf, row + d.y + 1, col + d.x + 1);
        write_bg(buf, d.cell.top);
        write_fg(buf, d.cell.bottom);
        buf.extend_from_slice(HALF_BLOCK.as_bytes());
    }
    if !deltas.is_empty() {
        buf.extend_from_slice(b"\x1b[0m");
    }
}

/// Panel sink that draws into a truecolor terminal.
///
/// The first bitmap, and any bitmap whose geometry differs from the last
/// one, is written in full. Everything after that is a delta.
pub struct TerminalPanel<W: Write> {
    out: W,
    current: Vec<Cell>,
    geometry: Option<(u16, u16, u16, u16)>,
    buf: Vec<u8>,
    frames: u64,
}

impl<W: Write> TerminalPanel<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            current: Vec::new(),
            geometry: None,
            buf: Vec::with_capacity(256 * 1024),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> PanelSink for TerminalPanel<W> {
    fn draw_bitmap(&mut self, x: u16, y: u16, width: u16, height: u16, pixels: &[Color]) -> anyhow::Result<()> {
        let (w, h) = (width as usize, height as usize);
        if pixels.len() < w * h {
            anyhow::bail!("bitmap has {} pixels, expected {}x{}", pixels.len(), w, h);
        }
        let cells = pixels_to_cells(pixels, w, h);
        let (col, row) = (x, y / 2);

        if self.geometry == Some((x, y, width, height)) {
            let deltas = changed_cells(&self.current, &cells, w);
            render_delta(&deltas, col, row, &mut self.buf);
        } else {
            render_keyframe(&cells, w, col, row, &mut self.buf);
            self.geometry = Some((x, y, width, height));
        }

        self.out.write_all(&self.buf)?;
        self.out.flush()?;
        self.current = cells;
        self.frames += 1;
        Ok(())
    }
}

fn write_bg(buf: &mut Vec<u8>, (r, g, b): (u8, u8, u8)) {
    buf.extend_from_slice(b"\x1b[48;2;");
    write_rgb(buf, r, g, b);
}

fn write_fg(buf: &mut Vec<u8>, (r, g, b): (u8, u8, u8)) {
    buf.extend_from_slice(b"\x1b[38;2;");
    write_rgb(buf, r, g, b);
}

fn write_rgb(buf: &mut Vec<u8>, r: u8, g: u8, b: u8) {
    write_num(buf, r as u16);
    buf.push(b';');
    write_num(buf, g as u16);
    buf.push(b';');
    write_num(buf, b as u16);
    buf.push(b'm');
}

fn write_cursor_pos(buf: &mut Vec<u8>, row: u16, col: u16) {
    buf.extend_from_slice(b"\x1b[");
    write_num(buf, row);
    buf.push(b';');
    write_num(buf, col);
    buf.push(b'H');
}

/// Integer to ASCII without allocating.
fn write_num(buf: &mut Vec<u8>, v: u16) {
    let mut digits = [0u8; 5];
    let mut n = v;
    let mut i = digits.len();
    loop {
        i -= 1;
        digits[i] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    buf.extend_from_slice(&digits[i..]);
}
