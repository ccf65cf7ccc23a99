//! The falling 1x3 piece: spawn, sideways moves, rotation and descent.

use crate::grid::{Cell, Grid, NUM_COLORS};
use crate::scoring::Progress;

/// Destroyer pieces appear at most once per level, and only from this level on.
pub const DESTROYER_BLOCK_MINLEVEL: u32 = 2;
/// Minimum number of blocks on the field before a destroyer can appear.
pub const DESTROYER_BLOCK_MINCOUNT: u32 = 16;
/// Chance of a destroyer, 1 in this many, once every other condition holds.
pub const DESTROYER_BLOCK_CHANCE: u32 = 4;
/// Countdown-to-next-level window in which a destroyer may appear: [WINSTART, WINEND).
pub const DESTROYER_BLOCK_WINSTART: i64 = 22;
pub const DESTROYER_BLOCK_WINEND: i64 = DESTROYER_BLOCK_WINSTART + 8;

/// Source of randomness for piece generation.
pub trait Randomizer {
    /// Uniform value in `0..bound`.
    fn below(&mut self, bound: u32) -> u32;
}

impl Randomizer for fastrand::Rng {
    fn below(&mut self, bound: u32) -> u32 {
        self.u32(0..bound)
    }
}

/// Result of trying to drop the piece by one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descent {
    Moved,
    /// Blocked below. `hint` is the cell a destroyer piece came to rest on.
    Landed { hint: Option<Cell> },
}

/// Active piece: three vertically stacked grid cells starting at (row, col).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub row: i32,
    pub col: i32,
}

impl Piece {
    /// Places a fresh piece in the top hidden rows of the middle column.
    pub fn spawn(grid: &mut Grid, progress: &mut Progress, rng: &mut impl Randomizer) -> Self {
        let piece = Self {
            row: 0,
            col: (grid.width() / 2) as i32,
        };

        if destroyer_allowed(progress) && rng.below(DESTROYER_BLOCK_CHANCE) == 0 {
            for r in piece.rows() {
                grid.set(r, piece.col, Cell::Destroyer);
            }
            progress.destroyer_level = progress.level;
            log::debug!("destroyer piece spawned at level {}", progress.level);
        } else {
            for r in piece.rows() {
                let color = rng.below(u32::from(NUM_COLORS)) as u8;
                grid.set(r, piece.col, Cell::Colored(color));
            }
        }
        progress.live_blocks += 3;
        piece
    }

    #[inline]
    pub fn rows(&self) -> std::ops::Range<i32> {
        self.row..self.row + 3
    }

    #[inline]
    pub fn bottom(&self) -> i32 {
        self.row + 2
    }

    /// Shifts the piece one column left (-1) or right (+1). Returns false and
    /// leaves everything untouched when the target column is blocked.
    pub fn try_move(&mut self, grid: &mut Grid, delta: i32) -> bool {
        let target = self.col + delta;
        if target < 0 || target >= grid.width() as i32 {
            return false;
        }
        if self.rows().any(|r| !grid.get(r, target).is_empty()) {
            return false;
        }
        for r in self.rows() {
            let cell = grid.get(r, self.col);
            grid.set(r, target, cell);
            grid.set(r, self.col, Cell::Empty);
        }
        self.col = target;
        true
    }

    /// Cycles the contents downward: bottom goes to the top.
    pub fn rotate(&self, grid: &mut Grid) {
        let (top, mid, bottom) = (
            grid.get(self.row, self.col),
            grid.get(self.row + 1, self.col),
            grid.get(self.row + 2, self.col),
        );
        grid.set(self.row, self.col, bottom);
        grid.set(self.row + 1, self.col, top);
        grid.set(self.row + 2, self.col, mid);
    }

    /// Drops the piece one row, or reports that it has landed.
    pub fn descend(&mut self, grid: &mut Grid) -> Descent {
        if !grid.can_fall(self.bottom(), self.col) {
            let below = grid.get(self.bottom() + 1, self.col);
            let hint = (grid.get(self.bottom(), self.col) == Cell::Destroyer
                && !below.is_empty())
            .then_some(below);
            return Descent::Landed { hint };
        }
        for r in self.rows().rev() {
            grid.lower(r, self.col);
        }
        self.row += 1;
        Descent::Moved
    }
}

fn destroyer_allowed(progress: &Progress) -> bool {
    progress.destroyer_level < progress.level
        && (DESTROYER_BLOCK_WINSTART..DESTROYER_BLOCK_WINEND).contains(&progress.countdown)
        && progress.level >= DESTROYER_BLOCK_MINLEVEL
        && progress.live_blocks > DESTROYER_BLOCK_MINCOUNT
}

/// Replays a fixed list of values, then repeats the last one.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    values: std::collections::VecDeque<u32>,
    last: u32,
}

#[cfg(test)]
impl Scripted {
    pub fn new(values: &[u32]) -> Self {
        Self {
            values: values.iter().copied().collect(),
            last: values.last().copied().unwrap_or(0),
        }
    }
}

#[cfg(test)]
impl Randomizer for Scripted {
    fn below(&mut self, bound: u32) -> u32 {
        self.values.pop_front().unwrap_or(self.last) % bound
    }
}
