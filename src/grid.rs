//! Playfield store: cell matrix plus the set of cells pending destruction.

use std::collections::HashSet;

/// Rows above the visible field. A spawned piece starts here, out of sight.
pub const HIDDEN_ROWS: usize = 3;

/// Number of ordinary block colours.
pub const NUM_COLORS: u8 = 5;

/// Single cell: empty, an ordinary colour (0..NUM_COLORS) or a destroyer block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Colored(u8),
    Destroyer,
}

impl Cell {
    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

/// Playfield: `width` columns by `visible + HIDDEN_ROWS` rows. Row 0 is the top hidden row.
#[derive(Debug, Clone)]
pub struct Grid {
    width: usize,
    height: usize,
    /// rows[row][col]; rows[0] is the top.
    rows: Vec<Vec<Cell>>,
    marked: HashSet<(usize, usize)>,
}

impl Grid {
    /// `visible_height` excludes the hidden rows; they are added here.
    pub fn new(width: usize, visible_height: usize) -> Self {
        let height = visible_height + HIDDEN_ROWS;
        Self {
            width,
            height,
            rows: vec![vec![Cell::Empty; width]; height],
            marked: HashSet::new(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total rows including the hidden ones.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn visible_height(&self) -> usize {
        self.height - HIDDEN_ROWS
    }

    #[inline]
    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.height && (col as usize) < self.width
    }

    /// Cell at (row, col); anything off the grid reads as `Empty`.
    #[inline]
    pub fn get(&self, row: i32, col: i32) -> Cell {
        if !self.in_bounds(row, col) {
            return Cell::Empty;
        }
        self.rows[row as usize][col as usize]
    }

    /// Writes a cell. Writing off the grid is a bug in the caller.
    #[inline]
    pub fn set(&mut self, row: i32, col: i32, cell: Cell) {
        assert!(
            self.in_bounds(row, col),
            "grid write out of bounds: ({row}, {col}) on {}x{}",
            self.width,
            self.height
        );
        self.rows[row as usize][col as usize] = cell;
    }

    /// True if the cell is occupied and the one directly below is an empty in-bounds cell.
    pub fn can_fall(&self, row: i32, col: i32) -> bool {
        (row + 1) < self.height as i32
            && self.get(row + 1, col).is_empty()
            && !self.get(row, col).is_empty()
    }

    /// Moves the content of (row, col) one row down and empties the source.
    pub fn lower(&mut self, row: i32, col: i32) {
        let cell = self.get(row, col);
        self.set(row + 1, col, cell);
        self.set(row, col, Cell::Empty);
    }

    /// True for rows on screen, false for the hidden spawn rows and anything off the grid.
    #[inline]
    pub fn is_visible(&self, row: i32) -> bool {
        row >= HIDDEN_ROWS as i32 && (row as usize) < self.height
    }

    /// Marks a cell for destruction. Returns false if it was already marked.
    pub fn mark(&mut self, row: usize, col: usize) -> bool {
        self.marked.insert((row, col))
    }

    #[cfg(test)]
    pub fn is_marked(&self, row: usize, col: usize) -> bool {
        self.marked.contains(&(row, col))
    }

    pub fn marked_count(&self) -> usize {
        self.marked.len()
    }

    pub fn marked(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.marked.iter().copied()
    }

    /// Drains the pending-destruction set.
    pub fn take_marks(&mut self) -> Vec<(usize, usize)> {
        self.marked.drain().collect()
    }

    /// Test helper: fills cells from rows of text, bottom-aligned.
    /// `.` is empty, `0`..`4` are colours, `%` is a destroyer.
    #[cfg(test)]
    pub fn from_rows(width: usize, visible_height: usize, rows: &[&str]) -> Self {
        let mut grid = Self::new(width, visible_height);
        let top = grid.height - rows.len();
        for (i, line) in rows.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let cell = match ch {
                    '.' => Cell::Empty,
                    '%' => Cell::Destroyer,
                    d => Cell::Colored(d.to_digit(10).expect("colour digit") as u8),
                };
                grid.set((top + i) as i32, col as i32, cell);
            }
        }
        grid
    }
}
