//! Button state shared between an input producer and the frame loop.
//!
//! The producer sets and clears physical source flags; the loop only reads.
//! Last writer wins, no lock is taken.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// A physical input that can feed a button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Source {
    DpadUp = 0,
    DpadDown,
    DpadLeft,
    DpadRight,
    KeyW,
    KeyA,
    KeyS,
    KeyD,
    KeyR,
    Space,
    Return,
    Escape,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
    PadUp,
    PadDown,
    PadLeft,
    PadRight,
    PadA,
    PadB,
    PadX,
    PadY,
    PadStart,
}

impl Source {
    fn bit(self) -> u32 {
        1 << self as u32
    }
}

/// Logical buttons, numbered as scripts see them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Button {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Confirm = 4,
    Cancel = 5,
}

impl Button {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Button::Up),
            1 => Some(Button::Down),
            2 => Some(Button::Left),
            3 => Some(Button::Right),
            4 => Some(Button::Confirm),
            5 => Some(Button::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ButtonState {
    sources: AtomicU32,
    quit: AtomicBool,
}

impl ButtonState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, source: Source, down: bool) {
        if down {
            self.sources.fetch_or(source.bit(), Ordering::Relaxed);
        } else {
            self.sources.fetch_and(!source.bit(), Ordering::Relaxed);
        }
    }

    pub fn release_all(&self) {
        self.sources.store(0, Ordering::Relaxed);
    }

    pub fn is_down(&self, source: Source) -> bool {
        self.sources.load(Ordering::Relaxed) & source.bit() != 0
    }

    /// Resolve a button from every physical source that maps to it.
    pub fn button(&self, button: Button) -> bool {
        let bits = self.sources.load(Ordering::Relaxed);
        let down = |s: Source| bits & s.bit() != 0;

        match button {
            Button::Up => down(Source::DpadUp) || down(Source::KeyW) || down(Source::PadUp),
            Button::Down => down(Source::DpadDown) || down(Source::KeyS) || down(Source::PadDown),
            Button::Left => down(Source::DpadLeft) || down(Source::KeyA) || down(Source::PadLeft),
            Button::Right => {
                down(Source::DpadRight) || down(Source::KeyD) || down(Source::PadRight)
            }
            Button::Confirm => {
                let alt = down(Source::LeftAlt) || down(Source::RightAlt);
                let face = [Source::PadA, Source::PadB, Source::PadX, Source::PadY]
                    .into_iter()
                    .any(|s| down(s));
                down(Source::Space) || (down(Source::Return) && !alt) || face
            }
            Button::Cancel => {
                let ctrl = down(Source::LeftCtrl) || down(Source::RightCtrl);
                down(Source::Escape) || (ctrl && down(Source::KeyR)) || down(Source::PadStart)
            }
        }
    }

    /// Button lookup for raw script codes. Unknown codes read as released.
    pub fn button_code(&self, code: i64) -> bool {
        Button::from_code(code).map_or(false, |b| self.button(b))
    }

    /// All four directions held on the d-pad: the hardware exit chord.
    pub fn exit_chord(&self) -> bool {
        [Source::DpadUp, Source::DpadDown, Source::DpadLeft, Source::DpadRight]
            .into_iter()
            .all(|s| self.is_down(s))
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::Relaxed);
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_or_their_sources() {
        let state = ButtonState::new();
        assert!(!state.button(Button::Up));
        state.set(Source::KeyW, true);
        assert!(state.button(Button::Up));
        state.set(Source::KeyW, false);
        state.set(Source::PadUp, true);
        assert!(state.button(Button::Up));
        assert!(!state.button(Button::Down));
    }

    #[test]
    fn confirm_ignores_alt_return() {
        let state = ButtonState::new();
        state.set(Source::Return, true);
        assert!(state.button(Button::Confirm));
        state.set(Source::LeftAlt, true);
        assert!(!state.button(Button::Confirm));
        state.set(Source::PadX, true);
        assert!(state.button(Button::Confirm));
    }

    #[test]
    fn cancel_needs_ctrl_with_r() {
        let state = ButtonState::new();
        state.set(Source::KeyR, true);
        assert!(!state.button(Button::Cancel));
        state.set(Source::RightCtrl, true);
        assert!(state.button(Button::Cancel));
    }

    #[test]
    fn unknown_codes_are_released() {
        let state = ButtonState::new();
        state.set(Source::Space, true);
        assert!(state.button_code(4));
        assert!(!state.button_code(6));
        assert!(!state.button_code(-1));
    }

    #[test]
    fn exit_chord_needs_all_four() {
        let state = ButtonState::new();
        state.set(Source::DpadUp, true);
        state.set(Source::DpadDown, true);
        state.set(Source::DpadLeft, true);
        assert!(!state.exit_chord());
        state.set(Source::DpadRight, true);
        assert!(state.exit_chord());
        state.release_all();
        assert!(!state.exit_chord());
    }
}
