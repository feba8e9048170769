use std::sync::Arc;

use crate::bindings::{Bindings, HookSlots, ScriptHost};
use crate::cartridge::ScriptUnit;
use crate::config::ConsoleConfig;
use crate::console::Console;
use crate::error::{ConsoleError, Result};
use crate::input::ButtonState;

/// Everything one running game owns: the console, the registered hooks,
/// the game-over flag and a handle on the shared button state.
pub struct Session {
    pub console: Console,
    input: Arc<ButtonState>,
    pub(crate) hooks: HookSlots,
    pub(crate) game_over: bool,
    pub(crate) rejected_calls: u64,
}

impl Session {
    pub fn new(config: ConsoleConfig) -> Result<Self> {
        Self::with_input(config, Arc::new(ButtonState::new()))
    }

    pub fn with_input(config: ConsoleConfig, input: Arc<ButtonState>) -> Result<Self> {
        let console = Console::new(config)?;
        console.log_usage("session start");
        Ok(Self {
            console,
            input,
            hooks: HookSlots::default(),
            game_over: false,
            rejected_calls: 0,
        })
    }

    pub fn bindings(&mut self) -> Bindings<'_> {
        Bindings { session: self }
    }

    pub fn input(&self) -> &ButtonState {
        &self.input
    }

    /// Shared handle for an input producer thread.
    pub fn input_handle(&self) -> Arc<ButtonState> {
        Arc::clone(&self.input)
    }

    pub fn hooks(&self) -> &HookSlots {
        &self.hooks
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn set_game_over(&mut self, over: bool) {
        self.game_over = over;
    }

    /// Binding calls turned into no-ops because of bad arguments.
    pub fn rejected_calls(&self) -> u64 {
        self.rejected_calls
    }

    /// Evaluate the engine units in order. Every failure is logged; any
    /// failure makes the boot fatal.
    pub fn boot(&mut self, host: &mut dyn ScriptHost, units: &[ScriptUnit]) -> Result<()> {
        let mut failed = Vec::new();
        for unit in units {
            if let Err(msg) = host.eval(unit, &mut self.bindings()) {
                log::error!("failed to load script {}: {msg}", unit.name);
                failed.push(unit.name.clone());
            }
        }
        if !failed.is_empty() {
            return Err(ConsoleError::AssetLoad(format!("engine units failed: {}", failed.join(", "))));
        }
        log::info!("engine loaded ({} units)", units.len());
        Ok(())
    }

    pub fn call_load(&mut self, game: &[u8], font: &[u8]) -> Result<()> {
        let Some(mut hook) = self.hooks.load.take() else {
            return Err(missing("load"));
        };
        let result = hook(&mut self.bindings(), game, font);
        if self.hooks.load.is_none() {
            self.hooks.load = Some(hook);
        }
        result.map_err(|message| ConsoleError::ScriptHook { hook: "load", message })
    }

    pub fn call_update(&mut self) -> Result<()> {
        let Some(mut hook) = self.hooks.update.take() else {
            return Ok(());
        };
        let result = hook(&mut self.bindings());
        if self.hooks.update.is_none() {
            self.hooks.update = Some(hook);
        }
        result.map_err(|message| ConsoleError::ScriptHook { hook: "update", message })
    }

    pub fn call_quit(&mut self) -> Result<()> {
        let Some(mut hook) = self.hooks.quit.take() else {
            return Err(missing("quit"));
        };
        let result = hook(&mut self.bindings());
        if self.hooks.quit.is_none() {
            self.hooks.quit = Some(hook);
        }
        result.map_err(|message| ConsoleError::ScriptHook { hook: "quit", message })
    }

    /// Drop the hooks and release every buffer.
    pub fn teardown(&mut self) {
        self.hooks = HookSlots::default();
        self.console.free_all();
    }
}

fn missing(hook: &'static str) -> ConsoleError {
    ConsoleError::ScriptHook { hook, message: format!("no {hook} hook registered") }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::HookResult;

    struct Engine;

    impl ScriptHost for Engine {
        fn eval(&mut self, unit: &ScriptUnit, bindings: &mut Bindings<'_>) -> HookResult {
            match unit.name.as_str() {
                "broken" => Err("SyntaxError: unexpected token".into()),
                _ => {
                    bindings.on_update(Box::new(|b: &mut Bindings<'_>| {
                        b.set_game_over(true);
                        Ok(())
                    }));
                    Ok(())
                }
            }
        }
    }

    fn unit(name: &str) -> ScriptUnit {
        ScriptUnit { name: name.into(), code: Vec::new() }
    }

    #[test]
    fn boot_registers_hooks() {
        let mut s = Session::new(ConsoleConfig::default()).unwrap();
        s.boot(&mut Engine, &[unit("bitsy")]).unwrap();
        assert!(s.hooks().update.is_some());
        s.call_update().unwrap();
        assert!(s.is_game_over());
    }

    #[test]
    fn failed_unit_aborts_boot() {
        let mut s = Session::new(ConsoleConfig::default()).unwrap();
        let err = s.boot(&mut Engine, &[unit("world"), unit("broken")]).unwrap_err();
        assert!(matches!(err, ConsoleError::AssetLoad(msg) if msg.contains("broken")));
    }

    #[test]
    fn hook_may_replace_itself() {
        let mut s = Session::new(ConsoleConfig::default()).unwrap();
        s.bindings().on_update(Box::new(|b: &mut Bindings<'_>| {
            b.on_update(Box::new(|b: &mut Bindings<'_>| {
                b.set_game_over(true);
                Ok(())
            }));
            Ok(())
        }));
        s.call_update().unwrap();
        assert!(!s.is_game_over());
        s.call_update().unwrap();
        assert!(s.is_game_over());
    }

    #[test]
    fn missing_quit_hook_is_an_error() {
        let mut s = Session::new(ConsoleConfig::default()).unwrap();
        assert!(matches!(s.call_quit(), Err(ConsoleError::ScriptHook { hook: "quit", .. })));
        s.teardown();
        assert!(s.console.buffers().is_freed());
    }
}
