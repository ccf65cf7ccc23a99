//! Game state machine: Falling → Blinking → Gravity, driven by elapsed time and player events.
//!
//! A game in progress is always in one of these phases:
//!
//! - **Falling**: a 1x3 piece drops one row every `fall_delay` ms. The player may
//!   move it sideways, cycle its blocks or push it down. When it can drop no further
//!   the game either ends (piece still in the hidden rows), starts blinking matched
//!   blocks, or spawns the next piece.
//! - **Blinking**: matched blocks flash every [`BLINK_DELAY_MS`] for [`BLINK_TIMES`]
//!   toggles, then are destroyed and scored.
//! - **Gravity**: loose blocks drop one row every [`FALL_DELAY_GRAVITY_MS`]. Once
//!   nothing moves the chain bonus grows and the field is checked for new matches.
//!
//! [`GameSession::advance`] consumes elapsed time and [`GameSession::handle`] consumes
//! player input; both return a [`RenderDelta`] listing what the renderer must repaint.

use crate::grid::{Cell, Grid, HIDDEN_ROWS};
use crate::matcher::find_matches;
use crate::piece::{Descent, Piece, Randomizer};
use crate::scoring::Progress;

pub const BLINK_DELAY_MS: u64 = 33;
pub const BLINK_TIMES: u32 = 8;
pub const FALL_DELAY_GRAVITY_MS: u64 = 50;

/// Player command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    MoveLeft,
    MoveRight,
    RotateUp,
    SoftDrop,
    Pause,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Falling,
    Blinking,
    Gravity,
    GameOver,
}

/// A visible cell to repaint. `row` counts from the top visible row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellUpdate {
    pub row: usize,
    pub col: usize,
    pub cell: Cell,
}

/// Everything the renderer has to redraw after one engine call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderDelta {
    pub cells: Vec<CellUpdate>,
    pub level: Option<u32>,
    pub score: Option<u32>,
    pub paused: Option<bool>,
    pub game_over: bool,
}

impl RenderDelta {
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
            && self.level.is_none()
            && self.score.is_none()
            && self.paused.is_none()
            && !self.game_over
    }

    /// Appends `later` to this delta; its panel values win.
    pub fn merge(&mut self, later: Self) {
        self.cells.extend(later.cells);
        self.level = later.level.or(self.level);
        self.score = later.score.or(self.score);
        self.paused = later.paused.or(self.paused);
        self.game_over |= later.game_over;
    }
}

/// One game from first piece to game over.
#[derive(Debug)]
pub struct GameSession<R> {
    grid: Grid,
    piece: Piece,
    progress: Progress,
    phase: Phase,
    blink_count: u32,
    /// Cell a destroyer piece landed on, consumed by the next match pass.
    destroyer_hint: Option<Cell>,
    /// Time accumulated towards the next timed step.
    elapsed_ms: u64,
    paused: bool,
    rng: R,
}

impl<R: Randomizer> GameSession<R> {
    /// `height` is the visible height; the hidden spawn rows are added on top.
    pub fn new(width: usize, height: usize, rng: R) -> Self {
        Self::from_parts(Grid::new(width, height), Progress::new(), rng)
    }

    fn from_parts(mut grid: Grid, mut progress: Progress, mut rng: R) -> Self {
        let piece = Piece::spawn(&mut grid, &mut progress, &mut rng);
        Self {
            grid,
            piece,
            progress,
            phase: Phase::Falling,
            blink_count: 0,
            destroyer_hint: None,
            elapsed_ms: 0,
            paused: false,
            rng,
        }
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_over(&self) -> bool {
        self.phase == Phase::GameOver
    }

    /// True while player movement has an effect (piece falling, not paused).
    pub fn accepts_moves(&self) -> bool {
        self.phase == Phase::Falling && !self.paused
    }

    fn step_delay_ms(&self) -> u64 {
        match self.phase {
            Phase::Falling => self.progress.fall_delay_ms,
            Phase::Blinking => BLINK_DELAY_MS,
            Phase::Gravity => FALL_DELAY_GRAVITY_MS,
            Phase::GameOver => 0,
        }
    }

    /// Milliseconds until the next timed step.
    pub fn remaining_ms(&self) -> u64 {
        self.step_delay_ms().saturating_sub(self.elapsed_ms)
    }

    /// Repaint of the whole visible field plus the side panels.
    pub fn full_frame(&self) -> RenderDelta {
        let mut delta = RenderDelta {
            level: Some(self.progress.level),
            score: Some(self.progress.score),
            paused: Some(self.paused),
            game_over: self.is_over(),
            ..RenderDelta::default()
        };
        delta
            .cells
            .reserve(self.grid.width() * self.grid.visible_height());
        for row in HIDDEN_ROWS..self.grid.height() {
            for col in 0..self.grid.width() {
                self.paint(&mut delta, row as i32, col as i32);
            }
        }
        delta
    }

    /// Feeds elapsed wall-clock time and runs every timed step that became due.
    /// Does nothing while paused or after game over.
    pub fn advance(&mut self, elapsed_ms: u64) -> RenderDelta {
        let mut delta = RenderDelta::default();
        if self.paused || self.is_over() {
            return delta;
        }
        self.elapsed_ms += elapsed_ms;
        while !self.paused && !self.is_over() && self.elapsed_ms >= self.step_delay_ms() {
            self.elapsed_ms -= self.step_delay_ms();
            match self.phase {
                Phase::Falling => self.fall_step(&mut delta),
                Phase::Blinking => self.blink_step(&mut delta),
                Phase::Gravity => self.gravity_step(&mut delta),
                Phase::GameOver => {}
            }
        }
        delta
    }

    /// Applies one player command immediately.
    pub fn handle(&mut self, event: Event) -> RenderDelta {
        let mut delta = RenderDelta::default();
        if self.is_over() || event == Event::None {
            return delta;
        }

        if self.paused {
            // Any key resumes; the key itself is swallowed unless it is quit.
            self.paused = false;
            delta.paused = Some(false);
            if event == Event::Quit {
                self.end_game(&mut delta);
            }
            return delta;
        }

        match event {
            Event::Quit => self.end_game(&mut delta),
            Event::Pause => {
                self.paused = true;
                delta.paused = Some(true);
            }
            Event::MoveLeft | Event::MoveRight if self.phase == Phase::Falling => {
                let from = self.piece.col;
                let step = if event == Event::MoveLeft { -1 } else { 1 };
                if self.piece.try_move(&mut self.grid, step) {
                    for row in self.piece.rows() {
                        self.paint(&mut delta, row, from);
                        self.paint(&mut delta, row, self.piece.col);
                    }
                }
            }
            Event::RotateUp if self.phase == Phase::Falling => {
                self.piece.rotate(&mut self.grid);
                self.paint_piece(&mut delta);
            }
            Event::SoftDrop if self.phase == Phase::Falling => {
                // Landing is left to the timer.
                if self.piece.descend(&mut self.grid) == Descent::Moved {
                    self.paint(&mut delta, self.piece.row - 1, self.piece.col);
                    self.paint_piece(&mut delta);
                }
            }
            _ => {}
        }
        delta
    }

    fn fall_step(&mut self, delta: &mut RenderDelta) {
        match self.piece.descend(&mut self.grid) {
            Descent::Moved => {
                self.paint(delta, self.piece.row - 1, self.piece.col);
                self.paint_piece(delta);
            }
            Descent::Landed { hint } => {
                if hint.is_some() {
                    self.destroyer_hint = hint;
                }
                self.progress.reset_chain();
                if !self.grid.is_visible(self.piece.row) {
                    self.end_game(delta);
                } else if self.detect() > 0 {
                    self.start_blinking();
                } else {
                    self.spawn(delta);
                }
            }
        }
    }

    fn blink_step(&mut self, delta: &mut RenderDelta) {
        self.blink_count += 1;
        if self.blink_count == BLINK_TIMES {
            self.blink_count = 0;
            self.destroy_marked(delta);
            self.phase = Phase::Gravity;
        }
        let hidden = self.blink_count % 2 == 1;
        for (row, col) in self.grid.marked().filter(|&(row, _)| self.grid.is_visible(row as i32)) {
            let cell = if hidden {
                Cell::Empty
            } else {
                self.grid.get(row as i32, col as i32)
            };
            delta.cells.push(CellUpdate {
                row: row - HIDDEN_ROWS,
                col,
                cell,
            });
        }
    }

    fn gravity_step(&mut self, delta: &mut RenderDelta) {
        let mut moved = false;
        // Bottom-up, right-to-left: a block never drops twice in one pass.
        for row in (HIDDEN_ROWS as i32..self.grid.height() as i32).rev() {
            for col in (0..self.grid.width() as i32).rev() {
                if self.grid.can_fall(row, col) {
                    self.grid.lower(row, col);
                    self.paint(delta, row, col);
                    self.paint(delta, row + 1, col);
                    moved = true;
                }
            }
        }
        if moved {
            return;
        }

        self.progress.bump_chain();
        if self.detect() > 0 {
            log::debug!("chain reaction, bonus {}", self.progress.chain_bonus);
            self.start_blinking();
        } else {
            self.spawn(delta);
        }
    }

    fn detect(&mut self) -> usize {
        find_matches(&mut self.grid, self.destroyer_hint.take())
    }

    fn start_blinking(&mut self) {
        log::debug!("{} blocks marked", self.grid.marked_count());
        self.phase = Phase::Blinking;
        self.blink_count = 0;
    }

    fn destroy_marked(&mut self, delta: &mut RenderDelta) {
        let marked = self.grid.take_marks();
        for &(row, col) in &marked {
            self.grid.set(row as i32, col as i32, Cell::Empty);
            self.paint(delta, row as i32, col as i32);
        }
        let award = self.progress.apply_destruction(marked.len() as u32);
        log::debug!(
            "destroyed {} blocks for {} points (chain bonus {})",
            marked.len(),
            award.points,
            self.progress.chain_bonus
        );
        delta.score = Some(self.progress.score);
        if award.levels_gained > 0 {
            delta.level = Some(self.progress.level);
        }
    }

    fn spawn(&mut self, delta: &mut RenderDelta) {
        self.piece = Piece::spawn(&mut self.grid, &mut self.progress, &mut self.rng);
        self.phase = Phase::Falling;
        self.paint_piece(delta);
    }

    fn end_game(&mut self, delta: &mut RenderDelta) {
        self.phase = Phase::GameOver;
        delta.game_over = true;
        log::info!(
            "game over: score {}, level {}",
            self.progress.score,
            self.progress.level
        );
    }

    fn paint_piece(&self, delta: &mut RenderDelta) {
        for row in self.piece.rows() {
            self.paint(delta, row, self.piece.col);
        }
    }

    /// Queues a repaint of (row, col) if it is on the visible part of the field.
    fn paint(&self, delta: &mut RenderDelta, row: i32, col: i32) {
        if !self.grid.is_visible(row) || !self.grid.in_bounds(row, col) {
            return;
        }
        delta.cells.push(CellUpdate {
            row: row as usize - HIDDEN_ROWS,
            col: col as usize,
            cell: self.grid.get(row, col),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Scripted;

    /// Runs exactly one timed step.
    fn step(session: &mut GameSession<Scripted>) -> RenderDelta {
        let wait = session.remaining_ms();
        session.advance(wait)
    }

    fn step_until(session: &mut GameSession<Scripted>, phase: Phase) {
        for _ in 0..1000 {
            if session.phase() == phase {
                return;
            }
            step(session);
        }
        panic!("never reached {phase:?}, stuck in {:?}", session.phase());
    }

    fn column(session: &GameSession<Scripted>, col: i32, rows: std::ops::Range<i32>) -> Vec<Cell> {
        rows.map(|r| session.grid().get(r, col)).collect()
    }

    #[test]
    fn test_new_session_spawns_hidden_piece() {
        let session = GameSession::new(10, 15, Scripted::new(&[0, 1, 2]));
        assert_eq!(session.phase(), Phase::Falling);
        assert_eq!(
            column(&session, 5, 0..3),
            vec![Cell::Colored(0), Cell::Colored(1), Cell::Colored(2)]
        );
        let frame = session.full_frame();
        assert_eq!(frame.cells.len(), 10 * 15);
        assert!(frame.cells.iter().all(|u| u.cell.is_empty()));
        assert_eq!(frame.level, Some(1));
        assert_eq!(frame.score, Some(0));
    }

    #[test]
    fn test_piece_falls_once_per_delay() {
        let mut session = GameSession::new(10, 15, Scripted::new(&[0, 1, 2]));
        assert_eq!(session.remaining_ms(), 355);
        assert!(session.advance(354).is_empty());
        assert_eq!(session.piece.row, 0);

        let delta = session.advance(1);
        assert_eq!(session.piece.row, 1);
        // Only the bottom block entered the visible field.
        assert_eq!(
            delta.cells,
            vec![CellUpdate {
                row: 0,
                col: 5,
                cell: Cell::Colored(2)
            }]
        );
        assert_eq!(session.remaining_ms(), 355);
    }

    #[test]
    fn test_leftover_time_carries_over() {
        let mut session = GameSession::new(10, 15, Scripted::new(&[0, 1, 2]));
        session.advance(355 * 3 + 10);
        assert_eq!(session.piece.row, 3);
        assert_eq!(session.remaining_ms(), 345);
    }

    #[test]
    fn test_landing_without_match_spawns_next() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2, 3, 4, 0]));
        step_until(&mut session, Phase::Falling);
        for _ in 0..10 {
            step(&mut session);
        }
        assert_eq!(session.piece.row, 10);
        step(&mut session);
        assert_eq!(session.phase(), Phase::Falling);
        assert_eq!(session.piece, Piece { row: 0, col: 4 });
        assert_eq!(session.progress().live_blocks, 6);
        assert_eq!(
            column(&session, 4, 10..13),
            vec![Cell::Colored(0), Cell::Colored(1), Cell::Colored(2)]
        );
        assert_eq!(
            column(&session, 4, 0..3),
            vec![Cell::Colored(3), Cell::Colored(4), Cell::Colored(0)]
        );
    }

    #[test]
    fn test_landing_in_hidden_rows_ends_game() {
        // Column 4 filled from row 5 down: the piece stops with its top in row 2.
        let mut grid = Grid::new(8, 10);
        for row in 5..13 {
            grid.set(row, 4, Cell::Colored((row % 2) as u8));
        }
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[2, 3, 4]));
        step(&mut session);
        step(&mut session);
        assert_eq!(session.piece.row, 2);
        let delta = step(&mut session);
        assert!(delta.game_over);
        assert_eq!(session.phase(), Phase::GameOver);
        assert_eq!(session.progress().live_blocks, 3);
        // No second piece in the spawn rows.
        assert_eq!(column(&session, 4, 0..2), vec![Cell::Empty, Cell::Empty]);

        assert!(session.advance(10_000).is_empty());
        assert!(session.handle(Event::MoveLeft).is_empty());
    }

    #[test]
    fn test_landing_on_full_column_ends_game_immediately() {
        let mut grid = Grid::new(8, 10);
        for row in 3..13 {
            grid.set(row, 4, Cell::Colored((row % 2) as u8));
        }
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[2, 3, 4]));
        step(&mut session);
        assert!(session.is_over());
        assert_eq!(session.piece.row, 0);
    }

    #[test]
    fn test_match_blinks_then_destroys() {
        let grid = Grid::from_rows(8, 10, &["..00...."]);
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[1, 2, 0, 3]));
        step_until(&mut session, Phase::Blinking);
        assert_eq!(session.grid().marked_count(), 3);

        let delta = step(&mut session);
        assert_eq!(delta.cells.len(), 3);
        assert!(delta.cells.iter().all(|u| u.cell.is_empty()));
        let delta = step(&mut session);
        assert!(delta.cells.iter().all(|u| u.cell == Cell::Colored(0)));

        for _ in 2..BLINK_TIMES - 1 {
            step(&mut session);
            assert_eq!(session.phase(), Phase::Blinking);
        }
        let delta = step(&mut session);
        assert_eq!(session.phase(), Phase::Gravity);
        assert_eq!(delta.score, Some(3));
        assert_eq!(session.progress().score, 3);
        assert_eq!(session.grid().marked_count(), 0);
        assert!(session.grid().get(12, 2).is_empty());
        assert!(session.grid().get(12, 4).is_empty());
    }

    #[test]
    fn test_chain_reaction_scores_with_bonus() {
        // The piece (0 over 1 over 2) lands in column 4 and completes the 2-run.
        // After it clears, the 1 drops to the floor and completes the 1-run.
        let grid = Grid::from_rows(8, 10, &["..22.11."]);
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[0, 1, 2]));

        step_until(&mut session, Phase::Blinking);
        assert_eq!(session.progress().chain_bonus, 0);
        step_until(&mut session, Phase::Gravity);
        assert_eq!(session.progress().score, 3);
        assert_eq!(session.grid().get(12, 4), Cell::Empty);

        step_until(&mut session, Phase::Blinking);
        assert_eq!(session.progress().chain_bonus, 1);
        assert_eq!(session.grid().get(12, 4), Cell::Colored(1));
        assert_eq!(session.grid().get(11, 4), Cell::Colored(0));
        assert_eq!(session.grid().marked_count(), 3);

        step_until(&mut session, Phase::Gravity);
        assert_eq!(session.progress().score, 3 + 3 * 2);

        step_until(&mut session, Phase::Falling);
        assert_eq!(session.grid().get(12, 4), Cell::Colored(0));
        assert_eq!(session.progress().chain_bonus, 2);
    }

    #[test]
    fn test_destroyer_clears_landed_on_colour() {
        let grid = Grid::from_rows(
            8,
            10,
            &["2......2", ".2...2..", "..1....2", "2.0.2..2"],
        );
        let mut progress = Progress::new();
        progress.level = 2;
        progress.countdown = 25;
        progress.live_blocks = 30;
        let mut session = GameSession::from_parts(grid, progress, Scripted::new(&[0, 1, 3, 4]));
        assert_eq!(column(&session, 4, 0..3), vec![Cell::Destroyer; 3]);

        step_until(&mut session, Phase::Blinking);
        let grid = session.grid();
        let twos: Vec<(usize, usize)> = (0..grid.height())
            .flat_map(|r| (0..grid.width()).map(move |c| (r, c)))
            .filter(|&(r, c)| grid.get(r as i32, c as i32) == Cell::Colored(2))
            .collect();
        assert_eq!(twos.len(), 8);
        for &(r, c) in &twos {
            assert!(grid.is_marked(r, c), "({r}, {c}) not marked");
        }
        for r in 9..12 {
            assert!(grid.is_marked(r, 4));
        }
        assert!(session.destroyer_hint.is_none());
    }

    #[test]
    fn test_moves_and_rotation() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2]));
        session.advance(355 * 5);
        assert_eq!(session.piece, Piece { row: 5, col: 4 });

        let delta = session.handle(Event::MoveLeft);
        assert_eq!(session.piece.col, 3);
        assert_eq!(delta.cells.len(), 6);
        assert!(session.grid().get(5, 4).is_empty());

        session.handle(Event::MoveRight);
        session.handle(Event::MoveRight);
        assert_eq!(session.piece.col, 5);

        let delta = session.handle(Event::RotateUp);
        assert_eq!(delta.cells.len(), 3);
        assert_eq!(
            column(&session, 5, 5..8),
            vec![Cell::Colored(2), Cell::Colored(0), Cell::Colored(1)]
        );
    }

    #[test]
    fn test_blocked_move_paints_nothing() {
        let mut grid = Grid::new(8, 10);
        grid.set(2, 3, Cell::Colored(4));
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[0]));
        let delta = session.handle(Event::MoveLeft);
        assert!(delta.is_empty());
        assert_eq!(session.piece.col, 4);
        assert_eq!(session.grid().get(2, 3), Cell::Colored(4));
    }

    #[test]
    fn test_soft_drop_moves_without_resetting_timer() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2]));
        session.advance(100);
        session.handle(Event::SoftDrop);
        session.handle(Event::SoftDrop);
        assert_eq!(session.piece.row, 2);
        assert_eq!(session.remaining_ms(), 255);
    }

    #[test]
    fn test_soft_drop_never_lands_the_piece() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2]));
        for _ in 0..20 {
            session.handle(Event::SoftDrop);
        }
        assert_eq!(session.piece.row, 10);
        assert_eq!(session.phase(), Phase::Falling);
        assert_eq!(session.progress().live_blocks, 3);
    }

    #[test]
    fn test_moves_ignored_while_blinking() {
        let grid = Grid::from_rows(8, 10, &["..00...."]);
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[1, 2, 0]));
        step_until(&mut session, Phase::Blinking);
        let before = column(&session, 4, 0..13);
        assert!(session.handle(Event::MoveLeft).is_empty());
        assert!(session.handle(Event::RotateUp).is_empty());
        assert!(session.handle(Event::SoftDrop).is_empty());
        assert_eq!(column(&session, 4, 0..13), before);
        assert!(!session.accepts_moves());
    }

    #[test]
    fn test_quit_ends_game_from_any_phase() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2]));
        let delta = session.handle(Event::Quit);
        assert!(delta.game_over);
        assert!(session.is_over());

        let grid = Grid::from_rows(8, 10, &["..00...."]);
        let mut session = GameSession::from_parts(grid, Progress::new(), Scripted::new(&[1, 2, 0]));
        step_until(&mut session, Phase::Blinking);
        session.handle(Event::Quit);
        assert!(session.is_over());
    }

    #[test]
    fn test_pause_stops_the_clock() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2]));
        session.advance(300);
        let delta = session.handle(Event::Pause);
        assert_eq!(delta.paused, Some(true));
        assert!(session.advance(60_000).is_empty());
        assert_eq!(session.piece.row, 0);

        // The resuming key is swallowed.
        let delta = session.handle(Event::MoveLeft);
        assert_eq!(delta.paused, Some(false));
        assert_eq!(session.piece.col, 4);
        assert_eq!(session.remaining_ms(), 55);
        session.advance(55);
        assert_eq!(session.piece.row, 1);
    }

    #[test]
    fn test_quit_while_paused() {
        let mut session = GameSession::new(8, 10, Scripted::new(&[0, 1, 2]));
        session.handle(Event::Pause);
        assert!(session.handle(Event::None).is_empty());
        assert!(session.is_paused());
        let delta = session.handle(Event::Quit);
        assert!(delta.game_over);
    }
}
