pub mod bindings;
pub mod buffers;
pub mod cartridge;
pub mod color;
pub mod compositor;
pub mod compress;
pub mod config;
pub mod console;
pub mod decode;
pub mod encode;
pub mod error;
pub mod format;
pub mod input;
pub mod scheduler;
pub mod session;

pub use bindings::{Bindings, HookResult, ScriptHost};
pub use buffers::TileHandle;
pub use cartridge::{Cartridge, ScriptUnit};
pub use color::{Color, Palette};
pub use config::{ConsoleConfig, SCREEN_BUFFER_ID, TEXTBOX_BUFFER_ID, TILE_START_BUFFER_ID};
pub use console::{Console, GraphicsMode};
pub use error::{ConsoleError, Result};
pub use input::{Button, ButtonState, Source};
pub use scheduler::{Clock, FrameScheduler, ManualClock, PanelSink, SchedulerState, SystemClock};
pub use session::Session;
