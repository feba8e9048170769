use crate::buffers::{Buffers, TileHandle};
use crate::color::{Color, Palette};
use crate::config::ConsoleConfig;
use crate::error::{out_of_range, ConsoleError, Result};

/// Which compositing rules apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GraphicsMode {
    /// Pixels go straight to the screen.
    #[default]
    Direct = 0,
    /// Pixels go to tiles and the textbox, which are then blitted to the screen.
    Tile = 1,
}

impl TryFrom<i64> for GraphicsMode {
    type Error = ConsoleError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(GraphicsMode::Direct),
            1 => Ok(GraphicsMode::Tile),
            other => Err(out_of_range("graphics mode", other)),
        }
    }
}

/// The bound draw target and graphics mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrawContext {
    pub current: Option<usize>,
    pub mode: GraphicsMode,
}

/// One console session: palette, buffer table and draw context.
pub struct Console {
    config: ConsoleConfig,
    pub(crate) palette: Palette,
    pub(crate) buffers: Buffers,
    pub(crate) context: DrawContext,
}

impl Console {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let buffers = Buffers::new(&config)?;
        Ok(Self {
            config,
            palette: Palette::system_default(),
            buffers,
            context: DrawContext::default(),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn buffers(&self) -> &Buffers {
        &self.buffers
    }

    pub fn context(&self) -> DrawContext {
        self.context
    }

    pub fn set_graphics_mode(&mut self, mode: GraphicsMode) {
        self.context.mode = mode;
    }

    /// Bind a draw target. Validity is checked by each drawing call.
    pub fn begin_draw(&mut self, buffer: usize) {
        self.context.current = Some(buffer);
    }

    pub fn end_draw(&mut self) {
        self.context.current = None;
    }

    pub fn set_color(&mut self, index: u8, r: u8, g: u8, b: u8) {
        self.palette.set_color(index, r, g, b);
    }

    pub fn reset_colors(&mut self) {
        self.palette.reset_colors();
        log::info!("reset colors");
    }

    pub fn color(&self, index: u8) -> Color {
        self.palette.color(index)
    }

    pub fn add_tile(&mut self) -> Result<TileHandle> {
        let handle = self.buffers.allocate_tile()?;
        log::debug!("allocated tile buffer {}", handle.index());
        Ok(handle)
    }

    pub fn reset_tiles(&mut self) {
        self.buffers.reset_tiles();
    }

    pub fn set_textbox_size(&mut self, width: usize, height: usize) -> Result<bool> {
        self.buffers.resize_textbox(width, height)
    }

    /// The physical screen, row-major, `screen_size` pixels per row.
    pub fn screen(&self) -> &[Color] {
        self.buffers.screen()
    }

    pub fn free_all(&mut self) {
        self.context = DrawContext::default();
        self.buffers.free_all();
    }

    /// Log live buffer count and bytes held.
    pub fn log_usage(&self, stage: &str) {
        let (count, bytes) = self.buffers.usage();
        log::info!("{stage}: {count} buffers, {} KB", bytes / 1024);
    }
}
