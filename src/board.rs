use rand::Rng;

use crate::piece::{Color, GARBAGE_COLOR};

pub const BASE_COLS: usize = 10;
pub const BASE_ROWS: usize = 20;

/// Fixed-height, variable-width grid of color cells. Width changes only via
/// `resize`, which re-centers surviving content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Option<Color>>>,
}

impl Board {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![None; cols]; rows],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn grid(&self) -> &[Vec<Option<Color>>] {
        &self.cells
    }

    pub fn cell(&self, r: usize, c: usize) -> Option<Color> {
        self.cells[r][c]
    }

    pub fn set_cell(&mut self, r: usize, c: usize, color: Color) {
        self.cells[r][c] = Some(color);
    }

    /// Sole collision authority. A placement is valid iff every filled shape
    /// cell lands within `[0, cols)` horizontally and `< rows` vertically,
    /// and does not overlap an occupied cell. Cells above row 0 are permitted;
    /// overlap is only checked once `y >= 0`.
    pub fn is_valid_position(&self, shape: &[Vec<u8>], x: i32, y: i32) -> bool {
        for (r, row) in shape.iter().enumerate() {
            for (c, &cell) in row.iter().enumerate() {
                if cell == 0 {
                    continue;
                }
                let nx = x + c as i32;
                let ny = y + r as i32;
                if nx < 0 || nx >= self.cols as i32 || ny >= self.rows as i32 {
                    return false;
                }
                if ny >= 0 && self.cells[ny as usize][nx as usize].is_some() {
                    return false;
                }
            }
        }
        true
    }

    /// Remove every full row and prepend empty rows to preserve row count.
    /// Returns the number of rows cleared.
    pub fn clear_full_rows(&mut self) -> u32 {
        let mut remaining: Vec<Vec<Option<Color>>> = Vec::with_capacity(self.rows);
        for row in self.cells.drain(..) {
            if !row.iter().all(|c| c.is_some()) {
                remaining.push(row);
            }
        }
        let cleared = (self.rows - remaining.len()) as u32;
        let mut cells = vec![vec![None; self.cols]; cleared as usize];
        cells.append(&mut remaining);
        self.cells = cells;
        cleared
    }

    /// Empty `count` rows starting from the topmost occupied row.
    pub fn clear_top_rows(&mut self, count: usize) {
        let top = match self.cells.iter().position(|row| row.iter().any(|c| c.is_some())) {
            Some(r) => r,
            None => return,
        };
        for i in 0..count {
            let r = top + i;
            if r >= self.rows {
                break;
            }
            self.cells[r] = vec![None; self.cols];
        }
    }

    /// Remove the lowest occupied row, prepending an empty row on top.
    /// Returns false when the board is empty.
    pub fn clear_bottom_row(&mut self) -> bool {
        for r in (0..self.rows).rev() {
            if self.cells[r].iter().any(|c| c.is_some()) {
                self.cells.remove(r);
                self.cells.insert(0, vec![None; self.cols]);
                return true;
            }
        }
        false
    }

    /// Drop the top row and append a bottom garbage row with one random gap.
    /// Returns the gap column.
    pub fn add_garbage_row<R: Rng>(&mut self, rng: &mut R) -> usize {
        self.cells.remove(0);
        let gap = rng.gen_range(0..self.cols);
        let mut row = vec![Some(GARBAGE_COLOR); self.cols];
        row[gap] = None;
        self.cells.push(row);
        gap
    }

    /// Fill up to `count` uniformly-chosen empty cells with random piece
    /// colors. Degrades to a partial or no-op fill when the board runs out of
    /// empty cells.
    pub fn add_random_blocks<R: Rng>(&mut self, count: u32, rng: &mut R) {
        let mut empty: Vec<(usize, usize)> = Vec::new();
        for r in 0..self.rows {
            for c in 0..self.cols {
                if self.cells[r][c].is_none() {
                    empty.push((r, c));
                }
            }
        }
        for _ in 0..count {
            if empty.is_empty() {
                break;
            }
            let idx = rng.gen_range(0..empty.len());
            let (r, c) = empty.swap_remove(idx);
            self.cells[r][c] = Some(rng.gen_range(1..=7));
        }
    }

    /// Re-allocate at the new width, shifting every surviving cell by half the
    /// delta so content stays centered. Cells shifted out of range are
    /// dropped. Returns the signed column delta.
    pub fn resize(&mut self, new_cols: usize) -> i32 {
        let diff = new_cols as i32 - self.cols as i32;
        if diff == 0 {
            return 0;
        }
        let offset = (diff.unsigned_abs() / 2) as i32;
        let mut next = vec![vec![None; new_cols]; self.rows];
        for r in 0..self.rows {
            for c in 0..self.cols {
                let nc = if diff > 0 {
                    c as i32 + offset
                } else {
                    c as i32 - offset
                };
                if nc >= 0 && (nc as usize) < new_cols {
                    next[r][nc as usize] = self.cells[r][c];
                }
            }
        }
        self.cols = new_cols;
        self.cells = next;
        diff
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|c| c.is_some()).count())
            .sum()
    }

    pub fn occupied_rows(&self) -> usize {
        self.cells
            .iter()
            .filter(|row| row.iter().any(|c| c.is_some()))
            .count()
    }
}
