use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use crate::enums::Stone;

pub type Cell = Option<Stone>;

/// Board coordinate. Signed so that out-of-range input from clients is
/// representable and rejected by the bounds check instead of by parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: i32,
    pub col: i32,
}

impl Position {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self::new(self.row + d_row, self.col + d_col)
    }
}

const ORTHOGONAL: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Square grid of cells. Serialized as rows of cells (`null`, `"black"`, `"white"`).
///
/// The side length is fixed when the board is created; nothing in this type can
/// grow or shrink it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Board {
    rows: Vec<Vec<Cell>>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            rows: vec![vec![None; size]; size],
        }
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    pub fn contains(&self, pos: Position) -> bool {
        let size = self.size() as i32;
        (0..size).contains(&pos.row) && (0..size).contains(&pos.col)
    }

    /// Returns `None` when `pos` is off the board.
    pub fn get(&self, pos: Position) -> Option<Cell> {
        if !self.contains(pos) {
            return None;
        }
        Some(self.rows[pos.row as usize][pos.col as usize])
    }

    pub fn is_empty_at(&self, pos: Position) -> bool {
        matches!(self.get(pos), Some(None))
    }

    /// Writes a cell. Returns `false` and leaves the board untouched when `pos`
    /// is off the board.
    pub fn set(&mut self, pos: Position, cell: Cell) -> bool {
        if !self.contains(pos) {
            return false;
        }
        self.rows[pos.row as usize][pos.col as usize] = cell;
        true
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> {
        let size = self.size() as i32;
        iproduct!(0..size, 0..size).map(|(row, col)| Position::new(row, col))
    }

    pub fn has_empty_cell(&self) -> bool {
        self.rows.iter().flatten().any(Option::is_none)
    }

    pub fn stone_count(&self, stone: Stone) -> usize {
        self.rows
            .iter()
            .flatten()
            .filter(|cell| **cell == Some(stone))
            .count()
    }

    pub fn neighbours(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        ORTHOGONAL
            .iter()
            .map(move |&(dr, dc)| pos.offset(dr, dc))
            .filter(move |p| self.contains(*p))
    }

    /// Counts same-coloured stones walking from `pos` (exclusive) in one direction.
    pub fn run_length(&self, pos: Position, d_row: i32, d_col: i32, stone: Stone) -> usize {
        let mut count = 0;
        let mut cursor = pos.offset(d_row, d_col);
        while self.get(cursor) == Some(Some(stone)) {
            count += 1;
            cursor = cursor.offset(d_row, d_col);
        }
        count
    }

    /// Breadth-first search over the 4-connected same-coloured group containing
    /// `pos`. Returns the members and whether any member touches an empty cell.
    /// An empty or off-board `pos` yields an empty group.
    pub fn group(&self, pos: Position) -> Group {
        let Some(Some(stone)) = self.get(pos) else {
            return Group::default();
        };

        let mut visited = HashSet::from([pos]);
        let mut queue = VecDeque::from([pos]);
        let mut has_liberty = false;

        while let Some(current) = queue.pop_front() {
            for next in self.neighbours(current) {
                match self.get(next) {
                    Some(None) => has_liberty = true,
                    Some(Some(s)) if s == stone && visited.insert(next) => {
                        queue.push_back(next);
                    }
                    _ => {}
                }
            }
        }

        Group {
            stones: visited,
            has_liberty,
        }
    }

    /// Clears every cell in `stones`, returning how many stones were removed.
    pub fn remove(&mut self, stones: &HashSet<Position>) -> usize {
        let mut removed = 0;
        for &pos in stones {
            if self.get(pos).flatten().is_some() && self.set(pos, None) {
                removed += 1;
            }
        }
        removed
    }
}

/// A connected set of same-coloured stones.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub stones: HashSet<Position>,
    pub has_liberty: bool,
}

impl Group {
    pub fn len(&self) -> usize {
        self.stones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stones.is_empty()
    }
}
