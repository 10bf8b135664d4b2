//! Checkers Core - Game rules and position evaluation
//!
//! This crate provides the state adapter consumed by the search engine:
//! - Board geometry (dark squares, diagonal directions, configurable size)
//! - Pieces, moves and move notation
//! - Legal-move generation with forced captures and capture chains
//! - Apply/undo and scoped probe moves
//! - Win/tie detection and static evaluation

pub mod board;
pub mod game;
pub mod eval;

// Re-exports for convenient access
pub use board::{BoardConfig, BoardError, Position, DIAGONALS};
pub use game::{Board, GameResult, Move, MoveError, Piece, PieceKind, Player, Probe};
pub use eval::{evaluate, PositionWeights};
