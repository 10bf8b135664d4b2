//! Board geometry: square coordinates, dimensions, diagonal directions

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default board width and height
pub const DEFAULT_SIZE: u8 = 8;

/// Default number of rows each side fills at the start
pub const DEFAULT_PIECE_ROWS: u8 = 3;

/// Consecutive non-capturing plies before the game is a tie
pub const DEFAULT_TIE_LIMIT: u16 = 40;

/// Largest supported board edge
pub const MAX_SIZE: u8 = 26;

/// Diagonal direction vectors (drow, dcol)
/// Index: 0=down-left, 1=down-right, 2=up-left, 3=up-right
pub const DIAGONALS: [(i8, i8); 4] = [
    (1, -1),
    (1, 1),
    (-1, -1),
    (-1, 1),
];

/// Square coordinates (row 0 is the top edge)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: u8,
    pub col: u8,
}

impl Position {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Playable squares are the dark ones
    pub fn is_dark(&self) -> bool {
        (self.row + self.col) % 2 == 1
    }

    /// Step `distance` squares along a diagonal, if still on the board
    pub fn offset(&self, (dr, dc): (i8, i8), distance: i8, cols: u8, rows: u8) -> Option<Position> {
        let row = self.row as i16 + (dr * distance) as i16;
        let col = self.col as i16 + (dc * distance) as i16;
        if row < 0 || col < 0 || row >= rows as i16 || col >= cols as i16 {
            None
        } else {
            Some(Position::new(row as u8, col as u8))
        }
    }

    /// Chebyshev distance to the nearest of the central squares, scaled to [0, 1]
    /// (0 = center, 1 = corner)
    pub fn distance_to_center(&self, cols: u8, rows: u8) -> f32 {
        let center_r = (rows as f32 - 1.0) / 2.0;
        let center_c = (cols as f32 - 1.0) / 2.0;
        let dr = (self.row as f32 - center_r).abs() / center_r.max(1.0);
        let dc = (self.col as f32 - center_c).abs() / center_c.max(1.0);
        dr.max(dc)
    }

    /// On the left or right edge
    pub fn is_side_edge(&self, cols: u8) -> bool {
        self.col == 0 || self.col + 1 == cols
    }
}

/// Invalid board dimensions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("board dimensions {cols}x{rows} out of range (3..=26)")]
    Dimensions { cols: u8, rows: u8 },

    #[error("{piece_rows} piece rows per side do not fit on {rows} rows")]
    PieceRows { piece_rows: u8, rows: u8 },

    #[error("tie limit must be positive")]
    TieLimit,
}

/// Board dimensions and draw rule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub cols: u8,
    pub rows: u8,
    /// Rows filled by each side at the start
    pub piece_rows: u8,
    /// Consecutive non-capturing plies that end the game in a tie
    pub tie_limit: u16,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            cols: DEFAULT_SIZE,
            rows: DEFAULT_SIZE,
            piece_rows: DEFAULT_PIECE_ROWS,
            tie_limit: DEFAULT_TIE_LIMIT,
        }
    }
}

impl BoardConfig {
    pub fn new(cols: u8, rows: u8, piece_rows: u8) -> Result<Self, BoardError> {
        let config = Self {
            cols,
            rows,
            piece_rows,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_tie_limit(mut self, tie_limit: u16) -> Self {
        self.tie_limit = tie_limit;
        self
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        let in_range = |n: u8| (3..=MAX_SIZE).contains(&n);
        if !in_range(self.cols) || !in_range(self.rows) {
            return Err(BoardError::Dimensions {
                cols: self.cols,
                rows: self.rows,
            });
        }
        if self.piece_rows == 0 || u16::from(self.piece_rows) * 2 >= u16::from(self.rows) {
            return Err(BoardError::PieceRows {
                piece_rows: self.piece_rows,
                rows: self.rows,
            });
        }
        if self.tie_limit == 0 {
            return Err(BoardError::TieLimit);
        }
        Ok(())
    }

    /// Is this position on the board?
    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    /// Flat index of a square
    pub fn index(&self, pos: Position) -> usize {
        pos.row as usize * self.cols as usize + pos.col as usize
    }

    pub fn square_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }

    /// Pieces each side starts with
    pub fn pieces_per_side(&self) -> usize {
        (0..self.piece_rows)
            .map(|row| (0..self.cols).filter(|&col| Position::new(row, col).is_dark()).count())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dark_squares() {
        assert!(Position::new(0, 1).is_dark());
        assert!(Position::new(1, 0).is_dark());
        assert!(!Position::new(0, 0).is_dark());
        assert!(!Position::new(3, 3).is_dark());
    }

    #[test]
    fn test_offset_stays_on_board() {
        let pos = Position::new(0, 1);
        assert_eq!(pos.offset(DIAGONALS[1], 1, 8, 8), Some(Position::new(1, 2)));
        assert_eq!(pos.offset(DIAGONALS[2], 1, 8, 8), None);
        assert_eq!(pos.offset(DIAGONALS[0], 2, 8, 8), None); // col would be -1
    }

    #[test]
    fn test_distance_to_center() {
        let corner = Position::new(0, 0).distance_to_center(8, 8);
        let middle = Position::new(3, 4).distance_to_center(8, 8);
        assert!((corner - 1.0).abs() < 1e-6);
        assert!(middle < 0.2);
    }

    #[test]
    fn test_config_validation() {
        assert!(BoardConfig::new(8, 8, 3).is_ok());
        assert!(BoardConfig::new(7, 7, 2).is_ok());
        assert_eq!(
            BoardConfig::new(8, 6, 3),
            Err(BoardError::PieceRows { piece_rows: 3, rows: 6 })
        );
        assert!(matches!(BoardConfig::new(2, 8, 1), Err(BoardError::Dimensions { .. })));
        assert_eq!(BoardConfig::default().with_tie_limit(0).validate(), Err(BoardError::TieLimit));
    }

    #[test]
    fn test_oversized_piece_rows_rejected() {
        // Would overflow or wrap if doubled in u8
        for piece_rows in [128, 130, 200, u8::MAX] {
            assert_eq!(
                BoardConfig::new(8, 8, piece_rows),
                Err(BoardError::PieceRows { piece_rows, rows: 8 })
            );
        }
    }

    #[test]
    fn test_pieces_per_side() {
        assert_eq!(BoardConfig::default().pieces_per_side(), 12);
        assert_eq!(BoardConfig::new(7, 7, 2).unwrap().pieces_per_side(), 7);
    }
}
