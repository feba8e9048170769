//! Fixed-timestep frame loop.
//!
//! `Idle -> Loading -> Running -> Quitting -> Terminated`. While running,
//! elapsed time is accumulated and once a full frame budget has passed the
//! update hook runs and the screen is pushed to the panel. The termination
//! flags are checked on every iteration, ticked or not.

use std::cell::Cell;
use std::time::{Duration, Instant};

use crate::color::Color;
use crate::session::Session;

/// Destination for finished frames.
pub trait PanelSink {
    fn draw_bitmap(&mut self, x: u16, y: u16, width: u16, height: u16, pixels: &[Color]) -> anyhow::Result<()>;
}

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Duration;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that moves forward by a fixed step every time it is read.
pub struct ManualClock {
    now: Cell<Duration>,
    step: Duration,
}

impl ManualClock {
    pub fn new(step: Duration) -> Self {
        Self { now: Cell::new(Duration::ZERO), step }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let now = self.now.get();
        self.now.set(now + self.step);
        now
    }
}

/// Accumulates elapsed time against a frame budget.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    budget: Duration,
    accumulated: Duration,
}

impl FrameClock {
    pub fn new(budget: Duration) -> Self {
        Self { budget, accumulated: Duration::ZERO }
    }

    /// Add `delta`. Returns true, and starts over from zero, once the budget is reached.
    pub fn accumulate(&mut self, delta: Duration) -> bool {
        self.accumulated += delta;
        if self.accumulated >= self.budget {
            self.accumulated = Duration::ZERO;
            true
        } else {
            false
        }
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Loading,
    Running,
    Quitting,
    Terminated,
}

/// Result of one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepOutcome {
    /// An update ran and a frame went to the panel.
    pub ticked: bool,
    pub state: SchedulerState,
}

pub struct FrameScheduler<P: PanelSink> {
    session: Session,
    panel: P,
    frame: FrameClock,
    state: SchedulerState,
    ticks: u64,
    panel_error: Option<anyhow::Error>,
}

impl<P: PanelSink> FrameScheduler<P> {
    pub fn new(session: Session, panel: P) -> Self {
        let frame = FrameClock::new(session.console.config().frame_budget());
        Self {
            session,
            panel,
            frame,
            state: SchedulerState::Idle,
            ticks: 0,
            panel_error: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Frames pushed to the panel so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn into_parts(self) -> (Session, P) {
        (self.session, self.panel)
    }

    fn transition(&mut self, next: SchedulerState) {
        log::info!("scheduler {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run the load hook and enter `Running`. Load errors are logged only.
    pub fn start(&mut self, game: &[u8], font: &[u8]) {
        if self.state != SchedulerState::Idle {
            log::warn!("start ignored in state {:?}", self.state);
            return;
        }
        self.transition(SchedulerState::Loading);
        if let Err(err) = self.session.call_load(game, font) {
            log::error!("Load Bitsy Error: {err}");
        }
        self.session.console.log_usage("after load");
        self.transition(SchedulerState::Running);
    }

    /// One loop iteration covering `delta` of elapsed time.
    pub fn step(&mut self, delta: Duration) -> StepOutcome {
        let mut ticked = false;
        match self.state {
            SchedulerState::Running => {
                if self.frame.accumulate(delta) {
                    self.tick();
                    ticked = true;
                }
                if self.state == SchedulerState::Running && self.termination_requested() {
                    self.transition(SchedulerState::Quitting);
                }
            }
            SchedulerState::Quitting => self.finish(),
            _ => {}
        }
        StepOutcome { ticked, state: self.state }
    }

    fn tick(&mut self) {
        if let Err(err) = self.session.call_update() {
            log::error!("Update Bitsy Error: {err}");
        }

        let size = self.session.console.buffers().screen_size() as u16;
        let screen = self.session.console.screen();
        if let Err(err) = self.panel.draw_bitmap(0, 0, size, size, screen) {
            log::error!("panel sink failed: {err:#}");
            self.panel_error = Some(err);
            self.transition(SchedulerState::Quitting);
        }
        self.ticks += 1;
    }

    fn termination_requested(&mut self) -> bool {
        if self.session.input().quit_requested() {
            log::info!("quit requested by input");
            self.session.set_game_over(true);
        } else if self.session.input().exit_chord() {
            log::info!("exit chord held");
            self.session.set_game_over(true);
        }
        self.session.is_game_over()
    }

    /// Run the quit hook, report memory and release everything.
    /// The hook runs at most once, whatever it returns.
    pub fn finish(&mut self) {
        if self.state == SchedulerState::Terminated {
            return;
        }
        if self.state != SchedulerState::Quitting {
            self.transition(SchedulerState::Quitting);
        }
        if let Err(err) = self.session.call_quit() {
            log::error!("Quit Bitsy Error: {err}");
        }
        self.session.console.log_usage("after quit");
        self.session.teardown();
        self.transition(SchedulerState::Terminated);
    }

    /// Start the session and drive it until it terminates.
    pub fn run(&mut self, clock: &impl Clock, game: &[u8], font: &[u8]) -> anyhow::Result<()> {
        if self.state == SchedulerState::Idle {
            self.start(game, font);
        }

        let mut last = clock.now();
        loop {
            let now = clock.now();
            let outcome = self.step(now.saturating_sub(last));
            last = now;

            if outcome.state == SchedulerState::Terminated {
                break;
            }
            if !outcome.ticked {
                std::thread::yield_now();
            }
        }

        match self.panel_error.take() {
            Some(err) => Err(err.context("panel sink failed")),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::bindings::Bindings;
    use crate::config::{ConsoleConfig, SCREEN_BUFFER_ID};
    use crate::input::Source;

    #[derive(Default)]
    struct RecordingPanel {
        frames: Vec<(u16, u16, u16, u16, Vec<Color>)>,
    }

    impl PanelSink for RecordingPanel {
        fn draw_bitmap(&mut self, x: u16, y: u16, w: u16, h: u16, pixels: &[Color]) -> anyhow::Result<()> {
            self.frames.push((x, y, w, h, pixels.to_vec()));
            Ok(())
        }
    }

    struct BrokenPanel;

    impl PanelSink for BrokenPanel {
        fn draw_bitmap(&mut self, _: u16, _: u16, _: u16, _: u16, _: &[Color]) -> anyhow::Result<()> {
            anyhow::bail!("spi bus timeout")
        }
    }

    fn budget() -> Duration {
        ConsoleConfig::default().frame_budget()
    }

    fn session_with_quit_counter() -> (Session, Rc<Cell<u32>>) {
        let mut session = Session::new(ConsoleConfig::default()).unwrap();
        let quits = Rc::new(Cell::new(0));
        let counter = quits.clone();
        let mut b = session.bindings();
        b.on_load(Box::new(|_: &mut Bindings<'_>, _: &[u8], _: &[u8]| Ok(())));
        b.on_quit(Box::new(move |_: &mut Bindings<'_>| {
            counter.set(counter.get() + 1);
            Ok(())
        }));
        (session, quits)
    }

    #[test]
    fn frame_clock_fires_on_budget() {
        let mut clock = FrameClock::new(Duration::from_millis(16));
        assert!(!clock.accumulate(Duration::from_millis(10)));
        assert!(clock.accumulate(Duration::from_millis(6)));
        assert_eq!(clock.accumulated(), Duration::ZERO);
    }

    #[test]
    fn manual_clock_steps_on_read() {
        let clock = ManualClock::new(Duration::from_millis(4));
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_millis(4));
        clock.advance(Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(18));
    }

    #[test]
    fn one_budget_is_one_update_and_one_bitmap() {
        let (mut session, _) = session_with_quit_counter();
        let updates = Rc::new(Cell::new(0));
        let counter = updates.clone();
        session.bindings().on_update(Box::new(move |b: &mut Bindings<'_>| {
            counter.set(counter.get() + 1);
            b.draw_begin(SCREEN_BUFFER_ID as i64);
            b.draw_pixel(1, 5, 7);
            b.draw_end();
            Ok(())
        }));

        let mut scheduler = FrameScheduler::new(session, RecordingPanel::default());
        scheduler.start(b"game", b"font");
        assert_eq!(scheduler.state(), SchedulerState::Running);

        let half = budget() / 2;
        assert!(!scheduler.step(half).ticked);
        let outcome = scheduler.step(budget() - half);
        assert_eq!(outcome, StepOutcome { ticked: true, state: SchedulerState::Running });

        assert_eq!(updates.get(), 1);
        let frames = &scheduler.panel().frames;
        assert_eq!(frames.len(), 1);
        let (x, y, w, h, pixels) = &frames[0];
        assert_eq!((*x, *y, *w, *h), (0, 0, 128, 128));
        assert_eq!(pixels.as_slice(), scheduler.session().console.screen());
        assert_eq!(pixels[7 * 128 + 5], Color(0x07E0));
    }

    #[test]
    fn game_over_before_tick_quits_once_and_frees() {
        let (session, quits) = session_with_quit_counter();
        let mut scheduler = FrameScheduler::new(session, RecordingPanel::default());
        scheduler.start(b"", b"");
        scheduler.session_mut().set_game_over(true);

        let outcome = scheduler.step(Duration::ZERO);
        assert_eq!(outcome, StepOutcome { ticked: false, state: SchedulerState::Quitting });
        assert_eq!(quits.get(), 0);

        assert_eq!(scheduler.step(Duration::ZERO).state, SchedulerState::Terminated);
        scheduler.finish();
        assert_eq!(quits.get(), 1);
        assert!(scheduler.session().console.buffers().is_freed());
        assert!(scheduler.panel().frames.is_empty());
    }

    #[test]
    fn hook_errors_do_not_stop_the_loop() {
        let mut session = Session::new(ConsoleConfig::default()).unwrap();
        session.bindings().on_update(Box::new(|_: &mut Bindings<'_>| Err(String::from("TypeError"))));
        let mut scheduler = FrameScheduler::new(session, RecordingPanel::default());

        // no load hook registered: logged, still running
        scheduler.start(b"", b"");
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(scheduler.step(budget()).ticked);
        assert!(scheduler.step(budget()).ticked);
        assert_eq!(scheduler.panel().frames.len(), 2);

        // no quit hook either: teardown still happens
        scheduler.finish();
        assert_eq!(scheduler.state(), SchedulerState::Terminated);
        assert!(scheduler.session().console.buffers().is_freed());
    }

    #[test]
    fn exit_chord_ends_the_session() {
        let (session, quits) = session_with_quit_counter();
        let input = session.input_handle();
        let mut scheduler = FrameScheduler::new(session, RecordingPanel::default());
        scheduler.start(b"", b"");

        for source in [Source::DpadUp, Source::DpadDown, Source::DpadLeft, Source::DpadRight] {
            input.set(source, true);
        }
        assert_eq!(scheduler.step(Duration::ZERO).state, SchedulerState::Quitting);
        assert!(scheduler.session().is_game_over());
        scheduler.step(Duration::ZERO);
        assert_eq!(quits.get(), 1);
    }

    #[test]
    fn run_paces_updates_against_the_clock() {
        let (mut session, quits) = session_with_quit_counter();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        session.bindings().on_update(Box::new(move |b: &mut Bindings<'_>| {
            log.borrow_mut().push(());
            if log.borrow().len() == 3 {
                b.request_quit();
            }
            Ok(())
        }));

        let mut scheduler = FrameScheduler::new(session, RecordingPanel::default());
        let clock = ManualClock::new(Duration::from_millis(4));
        scheduler.run(&clock, b"", b"").unwrap();

        assert_eq!(seen.borrow().len(), 3);
        assert_eq!(scheduler.ticks(), 3);
        assert_eq!(quits.get(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Terminated);
    }

    #[test]
    fn panel_failure_still_runs_quit_and_is_returned() {
        let (session, quits) = session_with_quit_counter();
        let mut scheduler = FrameScheduler::new(session, BrokenPanel);
        let clock = ManualClock::new(budget());

        let err = scheduler.run(&clock, b"", b"").unwrap_err();
        assert!(format!("{err:#}").contains("spi bus timeout"));
        assert_eq!(quits.get(), 1);
        assert!(scheduler.session().console.buffers().is_freed());
    }
}
