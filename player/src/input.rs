use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bitsybox_core::{ButtonState, Source};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// How long a key counts as held after its last press or repeat. Most
/// terminals never report releases.
const HOLD: Duration = Duration::from_millis(180);

const POLL: Duration = Duration::from_millis(5);

/// Physical sources a key event stands for.
pub fn key_sources(key: &KeyEvent) -> Vec<Source> {
    let mut sources = Vec::with_capacity(2);
    match key.code {
        KeyCode::Up => sources.push(Source::DpadUp),
        KeyCode::Down => sources.push(Source::DpadDown),
        KeyCode::Left => sources.push(Source::DpadLeft),
        KeyCode::Right => sources.push(Source::DpadRight),
        KeyCode::Enter => sources.push(Source::Return),
        KeyCode::Esc => sources.push(Source::Escape),
        KeyCode::Char(c) => match c.to_ascii_lowercase() {
            'w' => sources.push(Source::KeyW),
            'a' => sources.push(Source::KeyA),
            's' => sources.push(Source::KeyS),
            'd' => sources.push(Source::KeyD),
            'r' => sources.push(Source::KeyR),
            ' ' => sources.push(Source::Space),
            _ => {}
        },
        _ => {}
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        sources.push(Source::LeftCtrl);
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        sources.push(Source::LeftAlt);
    }
    sources
}

fn is_quit_key(key: &KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => key.modifiers.is_empty(),
        KeyCode::Char('c') => key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Keys currently held and when they were last seen.
#[derive(Default)]
pub struct Held {
    keys: Vec<(Source, Instant)>,
}

impl Held {
    pub fn press(&mut self, state: &ButtonState, source: Source, at: Instant) {
        state.set(source, true);
        match self.keys.iter_mut().find(|(s, _)| *s == source) {
            Some(entry) => entry.1 = at,
            None => self.keys.push((source, at)),
        }
    }

    pub fn release(&mut self, state: &ButtonState, source: Source) {
        state.set(source, false);
        self.keys.retain(|(s, _)| *s != source);
    }

    /// Release every key not refreshed within the hold window.
    pub fn expire(&mut self, state: &ButtonState, now: Instant) {
        self.keys.retain(|&(source, at)| {
            let live = now.duration_since(at) < HOLD;
            if !live {
                state.set(source, false);
            }
            live
        });
    }
}

/// Feed terminal key events into `state` until `stop` is set.
pub fn spawn(state: Arc<ButtonState>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let mut held = Held::default();
        while !stop.load(Ordering::Relaxed) {
            match event::poll(POLL) {
                Ok(true) => match event::read() {
                    Ok(Event::Key(key)) => handle_key(&state, &mut held, &key),
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("reading terminal input failed: {e}");
                        state.request_quit();
                        break;
                    }
                },
                Ok(false) => {}
                Err(e) => {
                    log::error!("polling terminal input failed: {e}");
                    state.request_quit();
                    break;
                }
            }
            held.expire(&state, Instant::now());
        }
        state.release_all();
    })
}

fn handle_key(state: &ButtonState, held: &mut Held, key: &KeyEvent) {
    if key.kind != KeyEventKind::Release && is_quit_key(key) {
        log::info!("quit key pressed");
        state.request_quit();
        return;
    }
    let now = Instant::now();
    for source in key_sources(key) {
        match key.kind {
            KeyEventKind::Release => held.release(state, source),
            KeyEventKind::Press | KeyEventKind::Repeat => held.press(state, source, now),
        }
    }
}
