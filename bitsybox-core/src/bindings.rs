//! Native functions exposed to the script host.
//!
//! Arguments arrive as plain script integers. Anything that does not fit is
//! logged, counted as a rejected call and turned into a no-op or a default
//! return value, so a buggy game script cannot take the session down.

use crate::cartridge::ScriptUnit;
use crate::console::GraphicsMode;
use crate::error::{out_of_range, ConsoleError};
use crate::session::Session;

/// Error text raised by script code.
pub type HookResult = std::result::Result<(), String>;

/// Called once with the game data and font data.
pub type LoadHook = Box<dyn FnMut(&mut Bindings<'_>, &[u8], &[u8]) -> HookResult>;

/// Called once per frame (update) or once at shutdown (quit).
pub type Hook = Box<dyn FnMut(&mut Bindings<'_>) -> HookResult>;

#[derive(Default)]
pub struct HookSlots {
    pub(crate) load: Option<LoadHook>,
    pub(crate) update: Option<Hook>,
    pub(crate) quit: Option<Hook>,
}

impl HookSlots {
    pub fn is_empty(&self) -> bool {
        self.load.is_none() && self.update.is_none() && self.quit.is_none()
    }
}

/// The scripting runtime as seen from the console.
pub trait ScriptHost {
    /// Evaluate one engine unit. Units register their hooks through `bindings`.
    fn eval(&mut self, unit: &ScriptUnit, bindings: &mut Bindings<'_>) -> HookResult;
}

/// The binding surface handed to script code for the length of one call.
pub struct Bindings<'a> {
    pub(crate) session: &'a mut Session,
}

fn channel(value: i64) -> Result<u8, ConsoleError> {
    u8::try_from(value).map_err(|_| out_of_range("color channel", value))
}

fn palette_index(value: i64) -> Result<u8, ConsoleError> {
    u8::try_from(value).map_err(|_| out_of_range("palette index", value))
}

fn coord(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

impl<'a> Bindings<'a> {
    fn reject(&mut self, call: &str, err: ConsoleError) {
        log::warn!("{call}: {err}");
        self.session.rejected_calls += 1;
    }

    pub fn log(&self, message: &str) {
        log::info!(target: "bitsybox::script", "bitsy: {message}");
    }

    pub fn get_button(&self, code: i64) -> bool {
        self.session.input().button_code(code)
    }

    pub fn set_graphics_mode(&mut self, mode: i64) {
        match GraphicsMode::try_from(mode) {
            Ok(mode) => self.session.console.set_graphics_mode(mode),
            Err(err) => self.reject("setGraphicsMode", err),
        }
    }

    pub fn set_color(&mut self, index: i64, r: i64, g: i64, b: i64) {
        let parsed = palette_index(index)
            .and_then(|i| Ok((i, channel(r)?, channel(g)?, channel(b)?)));
        match parsed {
            Ok((i, r, g, b)) => self.session.console.set_color(i, r, g, b),
            Err(err) => self.reject("setColor", err),
        }
    }

    pub fn reset_colors(&mut self) {
        self.session.console.reset_colors();
    }

    /// Bind a buffer. Negative ids unbind.
    pub fn draw_begin(&mut self, buffer: i64) {
        match usize::try_from(buffer) {
            Ok(id) => self.session.console.begin_draw(id),
            Err(_) => self.session.console.end_draw(),
        }
    }

    pub fn draw_end(&mut self) {
        self.session.console.end_draw();
    }

    pub fn draw_pixel(&mut self, index: i64, x: i64, y: i64) {
        match palette_index(index) {
            Ok(i) => {
                self.session.console.draw_pixel(i, coord(x), coord(y));
            }
            Err(err) => self.reject("drawPixel", err),
        }
    }

    pub fn draw_tile(&mut self, tile: i64, x: i64, y: i64) {
        match usize::try_from(tile) {
            Ok(tile) => {
                self.session.console.draw_tile(tile, coord(x), coord(y));
            }
            Err(_) => self.reject("drawTile", out_of_range("tile id", tile)),
        }
    }

    pub fn draw_textbox(&mut self, x: i64, y: i64) {
        self.session.console.draw_textbox(coord(x), coord(y));
    }

    pub fn clear(&mut self, index: i64) {
        match palette_index(index) {
            Ok(i) => {
                self.session.console.clear(i);
            }
            Err(err) => self.reject("clear", err),
        }
    }

    /// Allocate a tile and return its id, or `None` when the table is full.
    pub fn add_tile(&mut self) -> Option<i64> {
        match self.session.console.add_tile() {
            Ok(handle) => Some(handle.index() as i64),
            Err(err) => {
                self.reject("addTile", err);
                None
            }
        }
    }

    pub fn reset_tiles(&mut self) {
        self.session.console.reset_tiles();
    }

    pub fn set_textbox_size(&mut self, width: i64, height: i64) {
        let size = usize::try_from(width)
            .map_err(|_| out_of_range("textbox width", width))
            .and_then(|w| {
                usize::try_from(height)
                    .map(|h| (w, h))
                    .map_err(|_| out_of_range("textbox height", height))
            })
            .and_then(|(w, h)| self.session.console.set_textbox_size(w, h));
        if let Err(err) = size {
            self.reject("setTextboxSize", err);
        }
    }

    pub fn on_load(&mut self, hook: LoadHook) {
        self.session.hooks.load = Some(hook);
        log::info!("load hook registered");
    }

    pub fn on_update(&mut self, hook: Hook) {
        self.session.hooks.update = Some(hook);
    }

    pub fn on_quit(&mut self, hook: Hook) {
        self.session.hooks.quit = Some(hook);
        log::info!("quit hook registered");
    }

    /// The host-visible game-over flag, polled by the frame loop.
    pub fn set_game_over(&mut self, over: bool) {
        self.session.game_over = over;
    }

    /// Ask the frame loop to wind down after this iteration.
    pub fn request_quit(&mut self) {
        self.set_game_over(true);
    }

    pub fn is_game_over(&self) -> bool {
        self.session.game_over
    }
}
