//! Sudoku board state and move validation.
//!
//! A board is built from a fixed pool of pre-baked clue/solution pairs.
//! Clue cells are immutable for the board's lifetime; every other cell holds
//! 0 (empty) or a 1-9 guess. All scoring decisions derive from the single
//! [`EntryOutcome`] returned by [`PuzzleBoard::enter_number`].

use rand::Rng;
use shared::wire::{Grid, GRID_SIZE};

/// Result of one number entry attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The cell is a server-given clue; nothing changed.
    Fixed,
    /// The entered value equals the cell's current value, or an empty/wrong
    /// cell was "cleared"; nothing changed and nothing is scored.
    NoChange,
    /// The entry matches the solution.
    Correct,
    /// A non-zero entry that does not match the solution.
    Incorrect,
    /// A previously correct entry was erased with 0.
    Cleared,
}

impl EntryOutcome {
    /// Score delta applied to the acting player.
    pub fn score_delta(self) -> i32 {
        match self {
            EntryOutcome::Correct => 1,
            EntryOutcome::Incorrect | EntryOutcome::Cleared => -1,
            EntryOutcome::Fixed | EntryOutcome::NoChange => 0,
        }
    }
}

/// The 9x9 puzzle state machine.
///
/// Invariant: for every clue cell, `current == solution` at all times.
#[derive(Debug, Clone)]
pub struct PuzzleBoard {
    fixed: [[bool; GRID_SIZE]; GRID_SIZE],
    solution: Grid,
    current: Grid,
}

impl PuzzleBoard {
    /// Builds a board from the pool entry at `index` (wraps around).
    ///
    /// Clue cells start at their solution value, all others at 0.
    pub fn from_pool(index: usize) -> Self {
        let seed = &POOL[index % POOL.len()];
        let mut fixed = [[false; GRID_SIZE]; GRID_SIZE];
        let mut current = [[0u8; GRID_SIZE]; GRID_SIZE];

        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                if seed.clues[row][col] != 0 {
                    fixed[row][col] = true;
                    current[row][col] = seed.solution[row][col];
                }
            }
        }

        Self {
            fixed,
            solution: seed.solution,
            current,
        }
    }

    /// Builds a board from a uniformly random pool entry.
    pub fn random() -> Self {
        Self::from_pool(rand::thread_rng().gen_range(0..POOL.len()))
    }

    /// Number of pre-baked puzzles available.
    pub fn pool_len() -> usize {
        POOL.len()
    }

    /// Applies one entry attempt and reports what happened.
    ///
    /// `row` and `col` must be in 0..9 and `value` in 0..=9; the caller
    /// validates request payloads before getting here.
    pub fn enter_number(&mut self, row: usize, col: usize, value: u8) -> EntryOutcome {
        debug_assert!(row < GRID_SIZE && col < GRID_SIZE && value <= 9);

        if self.fixed[row][col] {
            return EntryOutcome::Fixed;
        }

        let prior = self.current[row][col];
        if value == prior {
            return EntryOutcome::NoChange;
        }

        if value == 0 {
            // Erasing only scores (and mutates) when the prior entry was
            // actually correct; clearing a wrong guess is a no-op.
            if prior == self.solution[row][col] {
                self.current[row][col] = 0;
                return EntryOutcome::Cleared;
            }
            return EntryOutcome::NoChange;
        }

        self.current[row][col] = value;
        if value == self.solution[row][col] {
            EntryOutcome::Correct
        } else {
            EntryOutcome::Incorrect
        }
    }

    /// True iff every cell matches the solution.
    pub fn is_solved(&self) -> bool {
        self.current == self.solution
    }

    pub fn is_fixed(&self, row: usize, col: usize) -> bool {
        self.fixed[row][col]
    }

    pub fn solution(&self) -> &Grid {
        &self.solution
    }

    pub fn current(&self) -> &Grid {
        &self.current
    }

    /// The clue mask as wire bytes (1 = clue, 0 = open).
    pub fn fixed_mask(&self) -> Grid {
        let mut mask = [[0u8; GRID_SIZE]; GRID_SIZE];
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                mask[row][col] = self.fixed[row][col] as u8;
            }
        }
        mask
    }
}

struct PuzzleSeed {
    /// 1 marks a clue cell.
    clues: Grid,
    solution: Grid,
}

/// Hard-coded puzzle pool. Real generation is out of scope; sessions draw
/// uniformly from these pairs.
const POOL: [PuzzleSeed; 3] = [
    PuzzleSeed {
        clues: [
            [0, 1, 1, 0, 1, 0, 1, 0, 0],
            [1, 0, 1, 0, 1, 1, 0, 0, 0],
            [1, 0, 0, 1, 0, 0, 0, 0, 0],
            [1, 0, 0, 0, 0, 0, 1, 0, 1],
            [0, 0, 1, 0, 0, 0, 1, 0, 0],
            [1, 0, 1, 0, 0, 0, 0, 0, 1],
            [0, 0, 0, 0, 0, 1, 0, 0, 1],
            [0, 0, 0, 1, 1, 0, 1, 0, 1],
            [0, 0, 1, 0, 1, 0, 1, 1, 0],
        ],
        solution: [
            [4, 2, 3, 6, 9, 7, 8, 1, 5],
            [6, 9, 1, 5, 3, 8, 4, 7, 2],
            [5, 8, 7, 4, 2, 1, 6, 3, 9],
            [3, 1, 9, 8, 7, 5, 2, 6, 4],
            [2, 5, 6, 1, 4, 9, 3, 8, 7],
            [7, 4, 8, 3, 6, 2, 5, 9, 1],
            [9, 6, 4, 2, 1, 3, 7, 5, 8],
            [1, 3, 5, 7, 8, 4, 9, 2, 6],
            [8, 7, 2, 9, 5, 6, 1, 4, 3],
        ],
    },
    PuzzleSeed {
        clues: [
            [0, 1, 0, 1, 0, 1, 0, 1, 0],
            [0, 0, 1, 1, 0, 1, 1, 0, 0],
            [1, 0, 0, 0, 0, 0, 0, 0, 1],
            [1, 0, 0, 1, 0, 1, 0, 0, 1],
            [0, 0, 1, 0, 0, 0, 1, 0, 0],
            [1, 0, 0, 1, 0, 1, 0, 0, 1],
            [1, 0, 0, 0, 0, 0, 0, 0, 1],
            [0, 0, 1, 1, 0, 1, 1, 0, 0],
            [0, 1, 0, 1, 0, 1, 0, 1, 0],
        ],
        solution: [
            [9, 6, 3, 1, 7, 4, 2, 5, 8],
            [1, 7, 8, 3, 2, 5, 6, 4, 9],
            [2, 5, 4, 6, 8, 9, 7, 3, 1],
            [8, 2, 1, 4, 3, 7, 5, 9, 6],
            [4, 9, 6, 8, 5, 2, 3, 1, 7],
            [7, 3, 5, 9, 6, 1, 8, 2, 4],
            [5, 8, 9, 7, 1, 3, 4, 6, 2],
            [3, 1, 7, 2, 4, 6, 9, 8, 5],
            [6, 4, 2, 5, 9, 8, 1, 7, 3],
        ],
    },
    PuzzleSeed {
        clues: [
            [1, 0, 0, 1, 0, 1, 0, 0, 1],
            [0, 1, 0, 0, 1, 0, 0, 1, 0],
            [0, 0, 1, 0, 0, 0, 1, 0, 0],
            [1, 0, 0, 1, 0, 1, 0, 0, 1],
            [0, 1, 0, 0, 1, 0, 0, 1, 0],
            [1, 0, 0, 1, 0, 1, 0, 0, 1],
            [0, 0, 1, 0, 0, 0, 1, 0, 0],
            [0, 1, 0, 0, 1, 0, 0, 1, 0],
            [1, 0, 0, 1, 0, 1, 0, 0, 1],
        ],
        solution: [
            [7, 2, 6, 4, 9, 3, 8, 1, 5],
            [3, 1, 5, 7, 2, 8, 9, 4, 6],
            [4, 8, 9, 6, 5, 1, 2, 3, 7],
            [8, 5, 2, 1, 4, 7, 6, 9, 3],
            [6, 7, 3, 9, 8, 5, 1, 2, 4],
            [9, 4, 1, 3, 6, 2, 7, 5, 8],
            [1, 9, 4, 8, 3, 6, 5, 7, 2],
            [5, 6, 7, 2, 1, 4, 3, 8, 9],
            [2, 3, 8, 5, 7, 9, 4, 6, 1],
        ],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    /// Finds a non-clue cell on the given board.
    fn open_cell(board: &PuzzleBoard) -> (usize, usize) {
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                if !board.is_fixed(row, col) {
                    return (row, col);
                }
            }
        }
        panic!("pool puzzle has no open cells");
    }

    #[test]
    fn pool_solutions_are_valid_sudoku() {
        for index in 0..PuzzleBoard::pool_len() {
            let board = PuzzleBoard::from_pool(index);
            let solution = board.solution();

            let expected: u16 = (1u16..=9).fold(0, |acc, v| acc | (1 << v));
            for i in 0..GRID_SIZE {
                let row_bits: u16 =
                    (0..GRID_SIZE).fold(0, |acc, c| acc | (1u16 << solution[i][c]));
                let col_bits: u16 =
                    (0..GRID_SIZE).fold(0, |acc, r| acc | (1u16 << solution[r][i]));
                assert_eq!(row_bits, expected, "puzzle {} row {}", index, i);
                assert_eq!(col_bits, expected, "puzzle {} col {}", index, i);
            }
            for band in 0..3 {
                for stack in 0..3 {
                    let mut bits: u16 = 0;
                    for r in 0..3 {
                        for c in 0..3 {
                            bits |= 1u16 << solution[band * 3 + r][stack * 3 + c];
                        }
                    }
                    assert_eq!(bits, expected, "puzzle {} box ({},{})", index, band, stack);
                }
            }
        }
    }

    #[test]
    fn clue_cells_start_solved_and_open_cells_empty() {
        for index in 0..PuzzleBoard::pool_len() {
            let board = PuzzleBoard::from_pool(index);
            for row in 0..GRID_SIZE {
                for col in 0..GRID_SIZE {
                    if board.is_fixed(row, col) {
                        assert_eq!(board.current()[row][col], board.solution()[row][col]);
                    } else {
                        assert_eq!(board.current()[row][col], 0);
                    }
                }
            }
        }
    }

    #[test]
    fn fixed_cell_never_mutates() {
        let mut board = PuzzleBoard::from_pool(0);
        // (0,1) is a clue in the first pool puzzle.
        assert!(board.is_fixed(0, 1));
        let before = *board.current();

        for value in 0..=9 {
            assert_eq!(board.enter_number(0, 1, value), EntryOutcome::Fixed);
        }
        assert_eq!(*board.current(), before);
    }

    #[test]
    fn repeated_entry_is_no_change() {
        let mut board = PuzzleBoard::from_pool(0);
        let (row, col) = open_cell(&board);
        let right = board.solution()[row][col];

        assert_eq!(board.enter_number(row, col, right), EntryOutcome::Correct);
        assert_eq!(board.enter_number(row, col, right), EntryOutcome::NoChange);

        let wrong = if right == 9 { 1 } else { right + 1 };
        assert_eq!(board.enter_number(row, col, wrong), EntryOutcome::Incorrect);
        assert_eq!(board.enter_number(row, col, wrong), EntryOutcome::NoChange);
    }

    #[test]
    fn clearing_semantics() {
        let mut board = PuzzleBoard::from_pool(1);
        let (row, col) = open_cell(&board);
        let right = board.solution()[row][col];
        let wrong = if right == 9 { 1 } else { right + 1 };

        // Clearing an empty cell changes nothing.
        assert_eq!(board.enter_number(row, col, 0), EntryOutcome::NoChange);

        // Clearing a wrong entry is also unscored and leaves the cell as-is.
        assert_eq!(board.enter_number(row, col, wrong), EntryOutcome::Incorrect);
        assert_eq!(board.enter_number(row, col, 0), EntryOutcome::NoChange);
        assert_eq!(board.current()[row][col], wrong);

        // Erasing a correct entry is penalized and empties the cell.
        assert_eq!(board.enter_number(row, col, right), EntryOutcome::Correct);
        assert_eq!(board.enter_number(row, col, 0), EntryOutcome::Cleared);
        assert_eq!(board.current()[row][col], 0);
    }

    #[test]
    fn solving_every_open_cell_solves_board() {
        let mut board = PuzzleBoard::from_pool(2);
        assert!(!board.is_solved());

        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                if !board.is_fixed(row, col) {
                    let value = board.solution()[row][col];
                    assert_eq!(board.enter_number(row, col, value), EntryOutcome::Correct);
                }
            }
        }
        assert!(board.is_solved());
    }

    #[test]
    fn score_deltas() {
        assert_eq!(EntryOutcome::Correct.score_delta(), 1);
        assert_eq!(EntryOutcome::Incorrect.score_delta(), -1);
        assert_eq!(EntryOutcome::Cleared.score_delta(), -1);
        assert_eq!(EntryOutcome::Fixed.score_delta(), 0);
        assert_eq!(EntryOutcome::NoChange.score_delta(), 0);
    }

    #[test]
    fn fixed_mask_matches_clues() {
        let board = PuzzleBoard::from_pool(0);
        let mask = board.fixed_mask();
        for row in 0..GRID_SIZE {
            for col in 0..GRID_SIZE {
                assert_eq!(mask[row][col] == 1, board.is_fixed(row, col));
            }
        }
    }
}
