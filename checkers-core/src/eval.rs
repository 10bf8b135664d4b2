//! Static position evaluation

use serde::{Deserialize, Serialize};

use crate::board::Position;
use crate::game::{Board, Piece, Player};

/// Weights for the positional terms of [`evaluate`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionWeights {
    /// Value of a man
    pub man: f32,
    /// Extra value of a king over a man
    pub king: f32,
    /// Bonus for standing near the center (scaled by closeness)
    pub centrality: f32,
    /// Bonus for standing on a side edge (cannot be jumped sideways)
    pub edge: f32,
    /// Bonus for men still guarding their home row
    pub back_row: f32,
    /// Bonus for a piece backed by a friendly piece diagonally behind it
    pub mutual_protection: f32,
}

impl Default for PositionWeights {
    fn default() -> Self {
        Self {
            man: 1.0,
            king: 0.5,
            centrality: 0.2,
            edge: 0.1,
            back_row: 0.15,
            mutual_protection: 0.1,
        }
    }
}

/// Evaluate the board for `player`: own terms minus opponent terms,
/// divided by the starting piece count so boards of any size score alike.
pub fn evaluate(board: &Board, player: Player, weights: &PositionWeights) -> f32 {
    let config = board.config();
    let scale = config.pieces_per_side().max(1) as f32;

    let score: f32 = board
        .pieces()
        .map(|(pos, piece)| {
            let value = piece_value(board, pos, piece, weights);
            if piece.owner == player {
                value
            } else {
                -value
            }
        })
        .sum();

    score / scale
}

fn piece_value(board: &Board, pos: Position, piece: Piece, weights: &PositionWeights) -> f32 {
    let config = board.config();
    let mut value = weights.man;

    if piece.is_king() {
        value += weights.king;
    } else if pos.row == board.home_row(piece.owner) {
        value += weights.back_row;
    }

    value += weights.centrality * (1.0 - pos.distance_to_center(config.cols, config.rows));

    if pos.is_side_edge(config.cols) {
        value += weights.edge;
    }

    if is_protected(board, pos, piece) {
        value += weights.mutual_protection;
    }

    value
}

/// A friendly piece sits on a rear diagonal
fn is_protected(board: &Board, pos: Position, piece: Piece) -> bool {
    let config = board.config();
    let back: i8 = match piece.owner {
        Player::Black => -1,
        Player::White => 1,
    };
    [-1i8, 1]
        .iter()
        .filter_map(|&dc| pos.offset((back, dc), 1, config.cols, config.rows))
        .any(|behind| matches!(board.piece_at(behind), Some(p) if p.owner == piece.owner))
}
