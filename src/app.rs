//! App: terminal init, the timer/input loop, game-over fade and teardown.

use crate::GameConfig;
use crate::engine::{Event, GameSession, RenderDelta};
use crate::input::{poll_event, wait_event};
use crate::piece::Randomizer;
use crate::scoring::Progress;
use crate::theme::Theme;
use crate::ui::{self, BoardView, GameOverFade};
use anyhow::{Result, bail};
use ratatui::DefaultTerminal;
use std::thread;
use std::time::{Duration, Instant};

/// Longest nap between input polls while a piece is falling.
const ACCEL_THRESHOLD_MS: u64 = 50;
/// Nap used when the next step is closer than [`ACCEL_THRESHOLD_MS`].
const SHORT_NAP_MS: u64 = 18;
/// Input is no longer polled once the next step is this close.
const INPUT_CUTOFF_MS: u64 = 20;
/// Frame interval for the game-over fade.
const FADE_FRAME: Duration = Duration::from_millis(16);
/// How long the final board stays up after the fade.
const GAME_OVER_HOLD: Duration = Duration::from_secs(1);

pub struct App {
    config: GameConfig,
    theme: Theme,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme) -> Self {
        Self { config, theme }
    }

    /// Sets up the terminal, plays one game and restores the terminal whatever happened.
    pub fn run(&mut self) -> Result<Progress> {
        use crossterm::{
            cursor::{Hide, Show},
            execute,
            terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let mut terminal =
            ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))?;

        let result = play_game(&mut terminal, &self.config, &self.theme);

        // Restore
        execute!(std::io::stdout(), Show, LeaveAlternateScreen)?;
        disable_raw_mode()?;

        result
    }
}

/// Runs one game to completion and returns the final progress.
pub fn play_game(
    terminal: &mut DefaultTerminal,
    config: &GameConfig,
    theme: &Theme,
) -> Result<Progress> {
    let size = terminal.size()?;
    if !ui::playfield_fits(config.width, config.height, size.width, size.height) {
        log::error!(
            "terminal {}x{} too small for a {}x{} field",
            size.width,
            size.height,
            config.width,
            config.height
        );
        bail!("Screen is too small to accommodate the playfield");
    }

    let rng = match config.seed {
        Some(seed) => fastrand::Rng::with_seed(seed),
        None => fastrand::Rng::new(),
    };
    log::info!(
        "new game: {}x{} field, seed {:?}",
        config.width,
        config.height,
        config.seed
    );
    let session = GameSession::new(usize::from(config.width), usize::from(config.height), rng);
    let view = BoardView::new(session.grid().width(), session.grid().visible_height());
    let mut game = Game {
        terminal,
        theme,
        session,
        view,
        clock: StepClock::new(Instant::now()),
    };
    game.run()
}

/// Wall-clock time not yet fed to the session.
#[derive(Debug, Clone, Copy)]
struct StepClock {
    since: Instant,
}

impl StepClock {
    fn new(now: Instant) -> Self {
        Self { since: now }
    }

    fn pending_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.since).as_millis() as u64
    }

    /// Returns the pending time and starts counting again from `now`.
    fn take_ms(&mut self, now: Instant) -> u64 {
        let ms = self.pending_ms(now);
        self.since = now;
        ms
    }
}

/// Applies one key. Time spent in the current step is fed to the session
/// before a pause takes effect, so only the paused span itself is skipped.
fn apply_event<R: Randomizer>(
    session: &mut GameSession<R>,
    clock: &mut StepClock,
    event: Event,
    now: Instant,
) -> RenderDelta {
    let mut delta = RenderDelta::default();
    if event == Event::Pause && !session.is_paused() {
        delta = session.advance(clock.take_ms(now));
    }
    delta.merge(session.handle(event));
    delta
}

struct Game<'a, R> {
    terminal: &'a mut DefaultTerminal,
    theme: &'a Theme,
    session: GameSession<R>,
    view: BoardView,
    clock: StepClock,
}

impl<R: Randomizer> Game<'_, R> {
    fn run(&mut self) -> Result<Progress> {
        let frame = self.session.full_frame();
        self.present(&frame)?;

        self.clock = StepClock::new(Instant::now());
        while !self.session.is_over() {
            if self.session.is_paused() {
                let event = wait_event()?;
                let now = Instant::now();
                let delta = apply_event(&mut self.session, &mut self.clock, event, now);
                self.present(&delta)?;
                // The paused span never reaches the session.
                self.clock = StepClock::new(Instant::now());
                continue;
            }

            let remaining = self
                .session
                .remaining_ms()
                .saturating_sub(self.clock.pending_ms(Instant::now()));
            if self.session.accepts_moves() && remaining > INPUT_CUTOFF_MS {
                let nap = if remaining < ACCEL_THRESHOLD_MS {
                    SHORT_NAP_MS
                } else {
                    ACCEL_THRESHOLD_MS
                };
                thread::sleep(Duration::from_millis(nap));
                self.drain_input()?;
                continue;
            }

            thread::sleep(Duration::from_millis(remaining));
            let elapsed = self.clock.take_ms(Instant::now());
            let delta = self.session.advance(elapsed);
            self.present(&delta)?;

            // Quit and pause still work while blocks blink or settle.
            if !self.session.accepts_moves() {
                self.drain_input()?;
            }
        }

        self.fade_out()?;
        Ok(self.session.progress().clone())
    }

    /// Applies every pending key in arrival order, repainting after each one.
    fn drain_input(&mut self) -> Result<()> {
        while let Some(event) = poll_event()? {
            let delta = apply_event(&mut self.session, &mut self.clock, event, Instant::now());
            self.present(&delta)?;
            if self.session.is_paused() || self.session.is_over() {
                break;
            }
        }
        Ok(())
    }

    fn present(&mut self, delta: &RenderDelta) -> Result<()> {
        if delta.is_empty() {
            return Ok(());
        }
        self.view.apply(delta);
        let (view, theme) = (&self.view, self.theme);
        self.terminal
            .draw(|f| ui::draw(f, view, theme, None, Instant::now()))?;
        Ok(())
    }

    fn fade_out(&mut self) -> Result<()> {
        let mut fade = GameOverFade::new(self.theme);
        let deadline = Instant::now() + Duration::from_millis(u64::from(ui::GAME_OVER_FADE_MS)) * 2;
        let (view, theme) = (&self.view, self.theme);
        while !fade.done() && Instant::now() < deadline {
            self.terminal
                .draw(|f| ui::draw(f, view, theme, Some(&mut fade), Instant::now()))?;
            thread::sleep(FADE_FRAME);
        }
        thread::sleep(GAME_OVER_HOLD);
        Ok(())
    }
}
