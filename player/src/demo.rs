//! A tiny native stand-in for the Bitsy engine.
//!
//! It reads the first palette, the tile and sprite bitmaps, the first room
//! and the avatar position out of Bitsy game text, then draws them through
//! the same bindings a real engine would use.

use std::cell::RefCell;
use std::rc::Rc;

use bitsybox_core::{Bindings, Button, HookResult, ScriptHost, ScriptUnit, SCREEN_BUFFER_ID, TEXTBOX_BUFFER_ID};

const TILE: usize = 8;
const ROOM: usize = 16;

/// Palette slots, as Bitsy orders them.
const BACKGROUND: i64 = 0;
const FOREGROUND: i64 = 1;
const SPRITE: i64 = 2;

/// Frames between avatar steps while a direction is held.
const MOVE_COOLDOWN: u32 = 6;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    pub id: String,
    /// Drawn with the sprite color instead of the tile color.
    pub sprite: bool,
    pub rows: [[bool; TILE]; TILE],
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GameData {
    pub title: String,
    pub palette: Vec<(u8, u8, u8)>,
    pub bitmaps: Vec<Bitmap>,
    /// Tile ids, row-major, "0" for an empty cell.
    pub room: Vec<Vec<String>>,
    pub avatar: Option<Bitmap>,
    pub avatar_pos: (i64, i64),
}

fn parse_rgb(line: &str) -> Option<(u8, u8, u8)> {
    let mut parts = line.split(',').map(|p| p.trim().parse::<u8>());
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(Ok(r)), Some(Ok(g)), Some(Ok(b)), None) => Some((r, g, b)),
        _ => None,
    }
}

fn parse_bitmap(id: &str, sprite: bool, lines: &[&str]) -> Option<Bitmap> {
    let mut rows = [[false; TILE]; TILE];
    let mut taken = 0;
    for line in lines {
        if taken == TILE || line.len() != TILE || !line.bytes().all(|b| b == b'0' || b == b'1') {
            break;
        }
        for (x, b) in line.bytes().enumerate() {
            rows[taken][x] = b == b'1';
        }
        taken += 1;
    }
    (taken == TILE).then(|| Bitmap { id: id.to_string(), sprite, rows })
}

fn parse_room_row(line: &str) -> Vec<String> {
    if line.contains(',') {
        line.split(',').map(|s| s.trim().to_string()).collect()
    } else {
        line.chars().map(|c| c.to_string()).collect()
    }
}

/// Pull what the demo needs out of Bitsy game text. Unknown blocks are skipped.
pub fn parse_game(text: &str) -> GameData {
    let mut game = GameData::default();
    let blocks: Vec<Vec<&str>> = text
        .split("\n\n")
        .map(|b| b.lines().map(str::trim_end).filter(|l| !l.is_empty()).collect())
        .collect();

    if let Some(first) = blocks.first().and_then(|b| b.first()) {
        game.title = first.to_string();
    }

    for block in &blocks {
        let Some((head, body)) = block.split_first() else {
            continue;
        };
        let mut words = head.split_whitespace();
        let kind = words.next().unwrap_or("");
        let id = words.next().unwrap_or("");

        match kind {
            "PAL" if game.palette.is_empty() => {
                game.palette = body.iter().filter_map(|l| parse_rgb(l)).collect();
            }
            "TIL" => game.bitmaps.extend(parse_bitmap(id, false, body)),
            "SPR" if id == "A" => {
                game.avatar = parse_bitmap(id, true, body);
                let pos = body.iter().find_map(|l| l.strip_prefix("POS "));
                if let Some((x, y)) = pos
                    .and_then(|p| p.split_whitespace().nth(1))
                    .and_then(|xy| xy.split_once(','))
                {
                    if let (Ok(x), Ok(y)) = (x.parse(), y.parse()) {
                        game.avatar_pos = (x, y);
                    }
                }
            }
            "SPR" => game.bitmaps.extend(parse_bitmap(id, true, body)),
            "ROOM" | "SET" if game.room.is_empty() => {
                game.room = body
                    .iter()
                    .take_while(|l| !l.contains(' '))
                    .take(ROOM)
                    .map(|l| parse_room_row(l))
                    .collect();
            }
            _ => {}
        }
    }

    game
}

struct DemoState {
    /// Bitmap id and its tile buffer.
    tiles: Vec<(String, i64)>,
    room: Vec<Vec<String>>,
    avatar: Option<i64>,
    pos: (i64, i64),
    cooldown: u32,
}

impl DemoState {
    fn tile(&self, id: &str) -> Option<i64> {
        self.tiles.iter().find(|(name, _)| name == id).map(|&(_, buffer)| buffer)
    }
}

fn upload(b: &mut Bindings<'_>, bitmap: &Bitmap) -> Option<i64> {
    let buffer = b.add_tile()?;
    let color = if bitmap.sprite { SPRITE } else { FOREGROUND };
    b.draw_begin(buffer);
    b.clear(BACKGROUND);
    for (y, row) in bitmap.rows.iter().enumerate() {
        for (x, &on) in row.iter().enumerate() {
            if on {
                b.draw_pixel(color, x as i64, y as i64);
            }
        }
    }
    b.draw_end();
    Some(buffer)
}

fn draw_textbox_frame(b: &mut Bindings<'_>, width: i64, height: i64) {
    b.draw_begin(TEXTBOX_BUFFER_ID as i64);
    b.clear(BACKGROUND);
    for x in 0..width {
        b.draw_pixel(SPRITE, x, 0);
        b.draw_pixel(SPRITE, x, height - 1);
    }
    for y in 0..height {
        b.draw_pixel(SPRITE, 0, y);
        b.draw_pixel(SPRITE, width - 1, y);
    }
    b.draw_end();
}

/// Registers load, update and quit hooks for any engine unit it is given.
#[derive(Default)]
pub struct DemoHost {
    evaluated: usize,
}

impl DemoHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&mut self, bindings: &mut Bindings<'_>) {
        let state = Rc::new(RefCell::new(DemoState {
            tiles: Vec::new(),
            room: Vec::new(),
            avatar: None,
            pos: (0, 0),
            cooldown: 0,
        }));

        let load_state = Rc::clone(&state);
        bindings.on_load(Box::new(move |b: &mut Bindings<'_>, game: &[u8], font: &[u8]| -> HookResult {
            let game = parse_game(&String::from_utf8_lossy(game));
            if game.palette.is_empty() && game.bitmaps.is_empty() {
                return Err("no PAL or TIL blocks in game data".to_string());
            }
            b.log(&format!(
                "{}: {} bitmaps, font {} bytes",
                game.title,
                game.bitmaps.len(),
                font.len()
            ));

            for (i, &(r, g, bl)) in game.palette.iter().take(3).enumerate() {
                b.set_color(i as i64, r as i64, g as i64, bl as i64);
            }
            b.set_graphics_mode(1);

            let mut st = load_state.borrow_mut();
            for bitmap in &game.bitmaps {
                match upload(b, bitmap) {
                    Some(buffer) => st.tiles.push((bitmap.id.clone(), buffer)),
                    None => return Err(format!("out of tile buffers at {}", bitmap.id)),
                }
            }
            st.avatar = game.avatar.as_ref().and_then(|a| upload(b, a));
            st.room = game.room;
            st.pos = game.avatar_pos;

            b.set_textbox_size(100, 24);
            draw_textbox_frame(b, 100, 24);
            Ok(())
        }));

        let update_state = Rc::clone(&state);
        bindings.on_update(Box::new(move |b: &mut Bindings<'_>| -> HookResult {
            if b.get_button(Button::Cancel as i64) {
                b.log("cancel pressed, leaving");
                b.request_quit();
                return Ok(());
            }

            let mut st = update_state.borrow_mut();
            let dx = b.get_button(Button::Right as i64) as i64 - b.get_button(Button::Left as i64) as i64;
            let dy = b.get_button(Button::Down as i64) as i64 - b.get_button(Button::Up as i64) as i64;
            if st.cooldown > 0 {
                st.cooldown -= 1;
            } else if dx != 0 || dy != 0 {
                let last = ROOM as i64 - 1;
                st.pos = ((st.pos.0 + dx).clamp(0, last), (st.pos.1 + dy).clamp(0, last));
                st.cooldown = MOVE_COOLDOWN;
            }

            b.draw_begin(SCREEN_BUFFER_ID as i64);
            b.clear(BACKGROUND);
            for (y, row) in st.room.iter().enumerate() {
                for (x, id) in row.iter().enumerate() {
                    if let Some(tile) = st.tile(id) {
                        b.draw_tile(tile, x as i64, y as i64);
                    }
                }
            }
            if let Some(avatar) = st.avatar {
                b.draw_tile(avatar, st.pos.0, st.pos.1);
            }
            if b.get_button(Button::Confirm as i64) {
                b.draw_textbox(14, 100);
            }
            b.draw_end();
            Ok(())
        }));

        bindings.on_quit(Box::new(|b: &mut Bindings<'_>| -> HookResult {
            b.reset_tiles();
            b.log("goodbye");
            Ok(())
        }));
    }
}

impl ScriptHost for DemoHost {
    fn eval(&mut self, unit: &ScriptUnit, bindings: &mut Bindings<'_>) -> HookResult {
        log::info!("evaluating {} ({} bytes)", unit.name, unit.code.len());
        if self.evaluated == 0 {
            self.install(bindings);
        }
        self.evaluated += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bitsybox_core::{Color, ConsoleConfig, FrameScheduler, PanelSink, Session, Source};

    use super::*;

    const GAME: &str = "Write your game's title here

# BITSY VERSION 7.2

PAL 0
0,82,204
128,159,255
255,255,255

ROOM 0
0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0
0,a,a,a,a,a,a,a,a,a,a,a,a,a,a,0
0,a,0,0,0,0,0,0,0,0,0,0,0,0,a,0
NAME example room
PAL 0

TIL a
11111111
10000001
10000001
10011001
10011001
10000001
10000001
11111111
NAME block

SPR A
00011000
00011000
00011000
00111100
01111110
10111101
00100100
00100100
POS 0 4,4
";

    #[derive(Default)]
    struct Frames(Vec<Vec<Color>>);

    impl PanelSink for Frames {
        fn draw_bitmap(&mut self, _: u16, _: u16, _: u16, _: u16, pixels: &[Color]) -> anyhow::Result<()> {
            self.0.push(pixels.to_vec());
            Ok(())
        }
    }

    #[test]
    fn parses_palette_tiles_room_and_avatar() {
        let game = parse_game(GAME);
        assert_eq!(game.title, "Write your game's title here");
        assert_eq!(game.palette, vec![(0, 82, 204), (128, 159, 255), (255, 255, 255)]);
        assert_eq!(game.bitmaps.len(), 1);
        assert_eq!(game.bitmaps[0].id, "a");
        assert!(game.bitmaps[0].rows[3][3]);
        assert!(!game.bitmaps[0].rows[1][1]);
        assert_eq!(game.room.len(), 3);
        assert_eq!(game.room[1][1], "a");
        assert!(game.avatar.as_ref().map_or(false, |a| a.sprite));
        assert_eq!(game.avatar_pos, (4, 4));
    }

    #[test]
    fn short_bitmaps_are_dropped() {
        let game = parse_game("title\n\nTIL x\n1111\n0000\n");
        assert!(game.bitmaps.is_empty());
    }

    #[test]
    fn draws_room_and_moves_avatar() {
        let mut session = Session::new(ConsoleConfig::default()).unwrap();
        let input = session.input_handle();
        let mut host = DemoHost::new();
        session.boot(&mut host, &[ScriptUnit { name: "bitsy".into(), code: Vec::new() }]).unwrap();

        let mut scheduler = FrameScheduler::new(session, Frames::default());
        scheduler.start(GAME.as_bytes(), b"");
        assert_eq!(scheduler.session().rejected_calls(), 0);
        scheduler.step(Duration::from_millis(16));

        let wall = Color::from_rgb888(128, 159, 255);
        let avatar = Color::from_rgb888(255, 255, 255);
        let frame = &scheduler.panel().0[0];
        // top-left corner of tile a at room cell (1, 1)
        assert_eq!(frame[8 * 128 + 8], wall);
        // avatar head at cell (4, 4), pixel (3, 0)
        assert_eq!(frame[32 * 128 + 35], avatar);

        input.set(Source::KeyD, true);
        scheduler.step(Duration::from_millis(16));
        let frame = &scheduler.panel().0[1];
        assert_eq!(frame[32 * 128 + 43], avatar);

        input.release_all();
        input.set(Source::Escape, true);
        scheduler.step(Duration::from_millis(16));
        assert!(scheduler.session().is_game_over());
    }
}
