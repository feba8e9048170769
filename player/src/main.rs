mod demo;
mod input;
mod render;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use bitsybox_core::{Cartridge, ConsoleConfig, FrameScheduler, Session, SystemClock};
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::terminal;

use crate::demo::DemoHost;
use crate::render::TerminalPanel;

const DEFAULT_CONFIG: &str = "bitsybox.toml";

#[derive(Parser)]
#[command(name = "bitsybox", about = "Run Bitsy cartridges in the terminal")]
struct Cli {
    /// Path to .bbox cartridge
    cart: PathBuf,

    /// TOML console config (default: ./bitsybox.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Render scale; the logical screen size is kept
    #[arg(long)]
    scale: Option<usize>,

    /// Frame budget in milliseconds
    #[arg(long)]
    fps_budget_ms: Option<u64>,

    /// Log file (the terminal belongs to the renderer)
    #[arg(long, default_value = "bitsybox.log")]
    log_file: PathBuf,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ConsoleConfig> {
    let path = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG)).filter(|p| p.exists()),
    };

    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            log::info!("config from {}", path.display());
            toml::from_str::<ConsoleConfig>(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => ConsoleConfig::default(),
    };

    if let Some(scale) = cli.scale {
        let logical = config.screen_size / config.render_scale.max(1);
        config.screen_size = logical * scale;
        config.render_scale = scale;
    }
    if let Some(budget) = cli.fps_budget_ms {
        config.frame_budget_ms = budget;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let config = load_config(&cli)?;
    let cart = Cartridge::load(&cli.cart)?;

    let mut session = Session::new(config)?;
    let mut host = DemoHost::new();
    session.boot(&mut host, &cart.units)?;
    if session.hooks().is_empty() {
        log::info!("cartridge has no engine units, using the built-in demo");
        host.install(&mut session.bindings());
    }

    // Each cell shows two pixel rows
    let size = session.console.buffers().screen_size() as u16;
    let (term_cols, term_rows) = terminal::size()?;
    if term_cols < size || term_rows < size / 2 {
        eprintln!(
            "Warning: terminal is {}x{} but the screen needs {}x{}. Resize your terminal for best results.",
            term_cols,
            term_rows,
            size,
            size / 2
        );
    }

    // Set up panic hook for terminal cleanup
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        cleanup_terminal();
        original_hook(info);
    }));

    terminal::enable_raw_mode()?;
    let stdout = std::io::stdout();
    let mut stdout = BufWriter::with_capacity(256 * 1024, stdout.lock());
    stdout.write_all(b"\x1b[?1049h")?; // enter alternate screen
    stdout.write_all(b"\x1b[?25l")?; // hide cursor
    stdout.flush()?;

    show_splash(&mut stdout, &cart, term_cols, term_rows)?;

    let stop = Arc::new(AtomicBool::new(false));
    let input_thread = input::spawn(session.input_handle(), Arc::clone(&stop));

    let mut scheduler = FrameScheduler::new(session, TerminalPanel::new(stdout));
    let result = scheduler.run(&SystemClock::new(), &cart.game, &cart.font);
    let (session, panel) = scheduler.into_parts();
    log::info!(
        "{} frames drawn, {} binding calls rejected",
        panel.frames(),
        session.rejected_calls()
    );

    stop.store(true, Ordering::Relaxed);
    if input_thread.join().is_err() {
        log::error!("input thread panicked");
    }

    let mut stdout = panel.into_inner();
    stdout.write_all(b"\x1b[0m")?; // reset colors
    stdout.write_all(b"\x1b[?25h")?; // show cursor
    stdout.write_all(b"\x1b[?1049l")?; // leave alternate screen
    stdout.flush()?;
    terminal::disable_raw_mode()?;

    result
}

/// Title card shown until a key is pressed or a second passes.
fn show_splash(stdout: &mut impl Write, cart: &Cartridge, term_cols: u16, term_rows: u16) -> anyhow::Result<()> {
    const LOGO: &[&str] = &[
        "#####  # ##### ##### #   # #####  ##### #   #",
        "#    # #   #   #      # #  #    # #   #  # # ",
        "#####  #   #   #####   #   #####  #   #   #  ",
        "#    # #   #       #   #   #    # #   #  # # ",
        "#####  #   #   #####   #   #####  ##### #   #",
    ];
    let title = demo::parse_game(&String::from_utf8_lossy(&cart.game)).title;

    stdout.write_all(b"\x1b[48;2;8;8;16m\x1b[2J")?;

    let logo_width = LOGO.iter().map(|l| l.len()).max().unwrap_or(0) as u16;
    let logo_height = LOGO.len() as u16;
    let start_row = term_rows.saturating_sub(logo_height + 2) / 2;
    let start_col = term_cols.saturating_sub(logo_width) / 2;

    for (i, line) in LOGO.iter().enumerate() {
        let shade = 140 + 20 * i as u8;
        write!(
            stdout,
            "\x1b[{};{}H\x1b[38;2;{};{};255m{}",
            start_row + i as u16,
            start_col,
            shade / 2,
            shade,
            line
        )?;
    }

    let title_col = term_cols.saturating_sub(title.chars().count() as u16) / 2;
    write!(
        stdout,
        "\x1b[{};{}H\x1b[38;2;160;160;190m{}",
        start_row + logo_height + 2,
        title_col,
        title
    )?;
    stdout.write_all(b"\x1b[0m")?;
    stdout.flush()?;

    let deadline = Instant::now() + Duration::from_secs(1);
    while Instant::now() < deadline {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(_) = event::read()? {
                break;
            }
        }
    }

    stdout.write_all(b"\x1b[48;2;0;0;0m\x1b[2J")?;
    stdout.flush()?;
    Ok(())
}

fn cleanup_terminal() {
    let _ = std::io::stdout().write_all(b"\x1b[0m\x1b[?25h\x1b[?1049l");
    let _ = std::io::stdout().flush();
    let _ = terminal::disable_raw_mode();
}
