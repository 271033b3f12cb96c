//! Fixed 3x3 grid and the line-completion query used for win detection.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{CellEntity, MarkEntity};

/// Number of cells on the board (row-major 3x3).
pub const CELL_COUNT: usize = 9;

/// Winning lines in evaluation order: rows, then columns, then diagonals.
const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Symbol held by a cell or assigned to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    /// Nobody played here yet.
    #[default]
    Empty,
    /// First mark.
    X,
    /// Second mark.
    O,
}

impl Mark {
    /// The other player mark. `Empty` stays `Empty`.
    pub fn opposite(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
            Mark::Empty => Mark::Empty,
        }
    }
}

/// Errors raised by board operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoardError {
    /// Position lies outside `0..CELL_COUNT`.
    #[error("position {position} is outside the board")]
    InvalidPosition {
        /// Rejected position.
        position: usize,
    },
}

/// One square of the board, tagged with the match that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    /// Row-major index in `0..CELL_COUNT`.
    pub position: usize,
    /// Current mark.
    pub mark: Mark,
    /// Owning match.
    pub match_id: Uuid,
}

/// The nine cells of a single match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [Cell; CELL_COUNT],
}

impl Board {
    /// Build an empty board owned by `match_id`.
    pub fn generate(match_id: Uuid) -> Self {
        Self {
            cells: std::array::from_fn(|position| Cell {
                position,
                mark: Mark::Empty,
                match_id,
            }),
        }
    }

    /// Place `mark` at `position`.
    ///
    /// Returns `Ok(false)` and leaves the board untouched when the cell is already taken.
    pub fn apply_move(&mut self, position: usize, mark: Mark) -> Result<bool, BoardError> {
        let cell = self
            .cells
            .get_mut(position)
            .ok_or(BoardError::InvalidPosition { position })?;

        if cell.mark != Mark::Empty {
            return Ok(false);
        }

        cell.mark = mark;
        Ok(true)
    }

    /// Reset every cell to [`Mark::Empty`].
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.mark = Mark::Empty;
        }
    }

    /// Mark of the first completed line, scanning rows, columns, then diagonals.
    pub fn winning_mark(&self) -> Option<Mark> {
        LINES.iter().find_map(|&[a, b, c]| {
            let mark = self.cells[a].mark;
            (mark != Mark::Empty && mark == self.cells[b].mark && mark == self.cells[c].mark)
                .then_some(mark)
        })
    }

    /// True once no empty cell is left.
    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|cell| cell.mark != Mark::Empty)
    }

    /// Cells in position order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Rebuild a board from persisted cells, which must cover every position exactly once.
    pub(crate) fn from_cells(match_id: Uuid, cells: &[CellEntity]) -> Option<Self> {
        if cells.len() != CELL_COUNT {
            return None;
        }

        let mut board = Self::generate(match_id);
        let mut seen = [false; CELL_COUNT];
        for cell in cells {
            let position = usize::from(cell.position);
            if position >= CELL_COUNT || seen[position] || cell.match_id != match_id {
                return None;
            }
            seen[position] = true;
            board.cells[position].mark = cell.mark.into();
        }

        Some(board)
    }
}

impl From<MarkEntity> for Mark {
    fn from(value: MarkEntity) -> Self {
        match value {
            MarkEntity::Empty => Mark::Empty,
            MarkEntity::X => Mark::X,
            MarkEntity::O => Mark::O,
        }
    }
}

impl From<Mark> for MarkEntity {
    fn from(value: Mark) -> Self {
        match value {
            Mark::Empty => MarkEntity::Empty,
            Mark::X => MarkEntity::X,
            Mark::O => MarkEntity::O,
        }
    }
}

impl From<Cell> for CellEntity {
    fn from(value: Cell) -> Self {
        Self {
            // Positions are bounded by CELL_COUNT.
            position: value.position as u8,
            mark: value.mark.into(),
            match_id: value.match_id,
        }
    }
}

#[cfg(test)]
pub(crate) fn seeded(match_id: Uuid, marks: [Mark; CELL_COUNT]) -> Board {
    let mut board = Board::generate(match_id);
    for (cell, mark) in board.cells.iter_mut().zip(marks) {
        cell.mark = mark;
    }
    board
}
