//! Match detection: runs of three or more equal cells on four axes, plus the destroyer sweep.

use crate::grid::{Cell, Grid, HIDDEN_ROWS};

/// Unit steps for the four axes, as (row, col). Each axis is scanned in both directions.
const AXES: [(i32, i32); 4] = [
    (1, 0),  // vertical
    (0, 1),  // horizontal
    (1, 1),  // diagonal, down-right
    (1, -1), // diagonal, down-left
];

/// Marks every cell to destroy and returns how many were newly marked (0 = no matches).
///
/// `destroyer_hint` is the cell a destroyer piece landed on. Every visible cell equal
/// to it is marked before the run scan; the caller drops the hint afterwards.
pub fn find_matches(grid: &mut Grid, destroyer_hint: Option<Cell>) -> usize {
    let mut found = 0;

    if let Some(hint) = destroyer_hint.filter(|c| !c.is_empty()) {
        for row in HIDDEN_ROWS..grid.height() {
            for col in 0..grid.width() {
                if grid.get(row as i32, col as i32) == hint && grid.mark(row, col) {
                    found += 1;
                }
            }
        }
    }

    for row in HIDDEN_ROWS..grid.height() {
        for col in 0..grid.width() {
            found += find_matches_from(grid, row as i32, col as i32);
        }
    }
    found
}

/// Runs through (row, col) on any axis. The candidate is inside a run when
/// `(back1 && (back2 || fwd1)) || (fwd1 && fwd2)`; a hit walks both ways marking.
fn find_matches_from(grid: &mut Grid, row: i32, col: i32) -> usize {
    let color = grid.get(row, col);
    if color.is_empty() {
        return 0;
    }
    let same = |grid: &Grid, r: i32, c: i32| grid.get(r, c) == color;

    let mut found = 0;
    for (dr, dc) in AXES {
        let back1 = same(grid, row - dr, col - dc);
        let back2 = same(grid, row - 2 * dr, col - 2 * dc);
        let fwd1 = same(grid, row + dr, col + dc);
        let fwd2 = same(grid, row + 2 * dr, col + 2 * dc);
        if !((back1 && (back2 || fwd1)) || (fwd1 && fwd2)) {
            continue;
        }

        let (mut r, mut c) = (row - dr, col - dc);
        while same(grid, r, c) {
            if grid.mark(r as usize, c as usize) {
                found += 1;
            }
            r -= dr;
            c -= dc;
        }
        let (mut r, mut c) = (row, col);
        while same(grid, r, c) {
            if grid.mark(r as usize, c as usize) {
                found += 1;
            }
            r += dr;
            c += dc;
        }
    }
    found
}
