//! Game state, move generation, apply/undo

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{BoardConfig, BoardError, Position, DIAGONALS};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Player color. Black is player 1 and starts on the top rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    Black = 1,
    White = 2,
}

impl Player {
    pub fn opponent(self) -> Self {
        match self {
            Player::Black => Player::White,
            Player::White => Player::Black,
        }
    }

    /// Row direction a man of this color moves in
    fn forward(self) -> i8 {
        match self {
            Player::Black => 1,
            Player::White => -1,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Player::Black => write!(f, "Black"),
            Player::White => write!(f, "White"),
        }
    }
}

/// Game result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    BlackWins,
    WhiteWins,
    Tie,
}

impl GameResult {
    pub fn win_for(player: Player) -> Self {
        match player {
            Player::Black => GameResult::BlackWins,
            Player::White => GameResult::WhiteWins,
        }
    }

    /// Winner, if the game was decided
    pub fn winner(self) -> Option<Player> {
        match self {
            GameResult::BlackWins => Some(Player::Black),
            GameResult::WhiteWins => Some(Player::White),
            GameResult::Ongoing | GameResult::Tie => None,
        }
    }

    pub fn is_over(self) -> bool {
        self != GameResult::Ongoing
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    Man,
    King,
}

/// A piece on the board
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Piece {
    pub owner: Player,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn man(owner: Player) -> Self {
        Self { owner, kind: PieceKind::Man }
    }

    pub const fn king(owner: Player) -> Self {
        Self { owner, kind: PieceKind::King }
    }

    pub fn is_king(&self) -> bool {
        self.kind == PieceKind::King
    }

    /// Diagonals this piece may move along
    fn directions(&self) -> &'static [(i8, i8)] {
        match (self.kind, self.owner.forward()) {
            (PieceKind::King, _) => &DIAGONALS,
            (PieceKind::Man, 1) => &DIAGONALS[..2],
            (PieceKind::Man, _) => &DIAGONALS[2..],
        }
    }

    fn symbol(&self) -> char {
        match (self.owner, self.kind) {
            (Player::Black, PieceKind::Man) => 'b',
            (Player::Black, PieceKind::King) => 'B',
            (Player::White, PieceKind::Man) => 'w',
            (Player::White, PieceKind::King) => 'W',
        }
    }
}

/// A move: the squares visited by the moving piece.
///
/// Two squares for a simple step or a single jump, more for a chained
/// capture. Moves compare equal when their paths do.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    path: Vec<Position>,
}

impl Move {
    pub fn new(path: Vec<Position>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &[Position] {
        &self.path
    }

    pub fn from(&self) -> Option<Position> {
        self.path.first().copied()
    }

    pub fn to(&self) -> Option<Position> {
        self.path.last().copied()
    }

    /// Does this move jump at least one piece?
    pub fn is_capture(&self) -> bool {
        match self.path.as_slice() {
            [a, b, ..] => a.row.abs_diff(b.row) == 2,
            _ => false,
        }
    }

    /// Does this move jump more than one piece?
    pub fn is_multi_capture(&self) -> bool {
        self.is_capture() && self.path.len() > 2
    }

    /// Squares of the pieces jumped by this move
    pub fn captured_squares(&self) -> impl Iterator<Item = Position> + '_ {
        self.path.windows(2).filter_map(|step| {
            let (a, b) = (step[0], step[1]);
            if a.row.abs_diff(b.row) == 2 {
                Some(Position::new((a.row + b.row) / 2, (a.col + b.col) / 2))
            } else {
                None
            }
        })
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pos) in self.path.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "({},{})", pos.row, pos.col)?;
        }
        Ok(())
    }
}

impl FromStr for Move {
    type Err = MoveError;

    /// Parse `(r,c)-(r,c)[-(r,c)...]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || MoveError::Parse(s.to_string());

        let path = s
            .trim()
            .split('-')
            .map(|square| -> Result<Position, MoveError> {
                let inner = square
                    .trim()
                    .strip_prefix('(')
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(parse_err)?;
                let (row, col) = inner.split_once(',').ok_or_else(parse_err)?;
                let row = row.trim().parse::<u8>().map_err(|_| parse_err())?;
                let col = col.trim().parse::<u8>().map_err(|_| parse_err())?;
                Ok(Position::new(row, col))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if path.len() < 2 {
            return Err(parse_err());
        }
        Ok(Move::new(path))
    }
}

/// Move rejected by the rules or by the parser
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("illegal move {mv} for {player}")]
    Illegal { mv: String, player: Player },

    #[error("cannot parse move '{0}', expected (r,c)-(r,c)")]
    Parse(String),
}

/// Everything needed to revert one applied move
#[derive(Clone, Debug)]
struct Undo {
    from: Position,
    to: Position,
    piece: Piece,
    captured: Vec<(Position, Piece)>,
    prev_inactivity: u16,
}

// ============================================================================
// BOARD
// ============================================================================

/// Board state.
///
/// Applied moves are kept on an undo stack; snapshots created with
/// [`Board::successor`] start with an empty stack.
#[derive(Clone, Debug)]
pub struct Board {
    config: BoardConfig,
    squares: Vec<Option<Piece>>,
    /// Consecutive plies without a capture
    inactivity: u16,
    history: Vec<Undo>,
}

impl PartialEq for Board {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
            && self.squares == other.squares
            && self.inactivity == other.inactivity
    }
}

impl Eq for Board {}

impl Board {
    // ========================================================================
    // CONSTRUCTORS
    // ========================================================================

    /// Standard starting position
    pub fn new(config: BoardConfig) -> Result<Self, BoardError> {
        config.validate()?;
        let mut board = Self::empty(config);

        for row in 0..config.rows {
            let owner = if row < config.piece_rows {
                Player::Black
            } else if row >= config.rows - config.piece_rows {
                Player::White
            } else {
                continue;
            };
            for col in 0..config.cols {
                let pos = Position::new(row, col);
                if pos.is_dark() {
                    board.place(pos, Piece::man(owner));
                }
            }
        }

        Ok(board)
    }

    /// Board with no pieces (dimensions are not validated)
    pub fn empty(config: BoardConfig) -> Self {
        Self {
            config,
            squares: vec![None; config.square_count()],
            inactivity: 0,
            history: Vec::new(),
        }
    }

    /// Arbitrary position, for tests and analysis
    pub fn from_pieces(config: BoardConfig, pieces: &[(Position, Piece)]) -> Self {
        let mut board = Self::empty(config);
        for &(pos, piece) in pieces {
            board.place(pos, piece);
        }
        board
    }

    pub fn with_inactivity(mut self, inactivity: u16) -> Self {
        self.inactivity = inactivity;
        self
    }

    /// Copy of the position without the undo history
    pub fn snapshot(&self) -> Self {
        Self {
            config: self.config,
            squares: self.squares.clone(),
            inactivity: self.inactivity,
            history: Vec::new(),
        }
    }

    /// Copy of this board with `mv` applied and no undo history
    pub fn successor(&self, mv: &Move, player: Player) -> Self {
        let mut next = self.snapshot();
        next.apply_move(mv, player);
        next.history.clear();
        next
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn inactivity(&self) -> u16 {
        self.inactivity
    }

    pub fn piece_at(&self, pos: Position) -> Option<Piece> {
        if self.config.contains(pos) {
            self.squares[self.config.index(pos)]
        } else {
            None
        }
    }

    pub fn place(&mut self, pos: Position, piece: Piece) {
        if self.config.contains(pos) {
            let idx = self.config.index(pos);
            self.squares[idx] = Some(piece);
        }
    }

    fn take(&mut self, pos: Position) -> Option<Piece> {
        if self.config.contains(pos) {
            let idx = self.config.index(pos);
            self.squares[idx].take()
        } else {
            None
        }
    }

    /// Iterate pieces in row-major order
    pub fn pieces(&self) -> impl Iterator<Item = (Position, Piece)> + '_ {
        let cols = self.config.cols;
        self.squares.iter().enumerate().filter_map(move |(idx, square)| {
            square.map(|piece| {
                let pos = Position::new((idx / cols as usize) as u8, (idx % cols as usize) as u8);
                (pos, piece)
            })
        })
    }

    pub fn piece_count(&self, player: Player) -> usize {
        self.pieces().filter(|(_, p)| p.owner == player).count()
    }

    pub fn king_count(&self, player: Player) -> usize {
        self.pieces()
            .filter(|(_, p)| p.owner == player && p.is_king())
            .count()
    }

    /// Row on which a man of `player` is crowned
    pub fn king_row(&self, player: Player) -> u8 {
        match player {
            Player::Black => self.config.rows - 1,
            Player::White => 0,
        }
    }

    /// Row a side starts from
    pub fn home_row(&self, player: Player) -> u8 {
        self.king_row(player.opponent())
    }

    // ========================================================================
    // MOVE GENERATION
    // ========================================================================

    /// Legal moves grouped per movable piece.
    ///
    /// Captures are compulsory: when any piece can jump, only capture chains
    /// are returned. Chains are always played to completion.
    pub fn legal_moves(&self, player: Player) -> Vec<Vec<Move>> {
        let mut captures = Vec::new();
        let mut steps = Vec::new();

        for (pos, piece) in self.pieces() {
            if piece.owner != player {
                continue;
            }

            let chains = self.capture_chains(pos, piece);
            if !chains.is_empty() {
                captures.push(chains);
            } else if captures.is_empty() {
                let simple = self.simple_moves(pos, piece);
                if !simple.is_empty() {
                    steps.push(simple);
                }
            }
        }

        if captures.is_empty() {
            steps
        } else {
            captures
        }
    }

    /// Legal moves as one list, in generation order
    pub fn legal_moves_flat(&self, player: Player) -> Vec<Move> {
        self.legal_moves(player).into_iter().flatten().collect()
    }

    pub fn has_legal_moves(&self, player: Player) -> bool {
        self.pieces()
            .filter(|(_, p)| p.owner == player)
            .any(|(pos, piece)| {
                !self.simple_moves(pos, piece).is_empty()
                    || !self.capture_chains(pos, piece).is_empty()
            })
    }

    /// Number of capture moves `player` could make right now
    pub fn capture_count(&self, player: Player) -> usize {
        self.pieces()
            .filter(|(_, p)| p.owner == player)
            .map(|(pos, piece)| self.capture_chains(pos, piece).len())
            .sum()
    }

    fn simple_moves(&self, pos: Position, piece: Piece) -> Vec<Move> {
        let (cols, rows) = (self.config.cols, self.config.rows);
        piece
            .directions()
            .iter()
            .filter_map(|&dir| pos.offset(dir, 1, cols, rows))
            .filter(|&dest| self.piece_at(dest).is_none())
            .map(|dest| Move::new(vec![pos, dest]))
            .collect()
    }

    fn capture_chains(&self, pos: Position, piece: Piece) -> Vec<Move> {
        let mut chains = Vec::new();
        let mut path = vec![pos];
        let mut jumped = Vec::new();
        self.extend_chain(pos, piece, &mut path, &mut jumped, &mut chains);
        chains
    }

    /// Depth-first search over jump sequences from the end of `path`.
    /// The origin square counts as empty; no piece is jumped twice.
    fn extend_chain(
        &self,
        origin: Position,
        piece: Piece,
        path: &mut Vec<Position>,
        jumped: &mut Vec<Position>,
        out: &mut Vec<Move>,
    ) {
        let Some(&at) = path.last() else {
            return;
        };

        // Crowning ends the chain
        if path.len() > 1 && !piece.is_king() && at.row == self.king_row(piece.owner) {
            out.push(Move::new(path.clone()));
            return;
        }

        let (cols, rows) = (self.config.cols, self.config.rows);
        let mut extended = false;

        for &dir in piece.directions() {
            let (Some(over), Some(land)) = (at.offset(dir, 1, cols, rows), at.offset(dir, 2, cols, rows)) else {
                continue;
            };
            let capturable = matches!(
                self.piece_at(over),
                Some(victim) if victim.owner != piece.owner && !jumped.contains(&over)
            );
            let landing_free = land == origin || self.piece_at(land).is_none();
            if !capturable || !landing_free {
                continue;
            }

            path.push(land);
            jumped.push(over);
            self.extend_chain(origin, piece, path, jumped, out);
            jumped.pop();
            path.pop();
            extended = true;
        }

        if !extended && path.len() > 1 {
            out.push(Move::new(path.clone()));
        }
    }

    /// Would `mv` crown a man of `player`?
    pub fn promotes(&self, mv: &Move, player: Player) -> bool {
        match (mv.from().and_then(|from| self.piece_at(from)), mv.to()) {
            (Some(piece), Some(to)) => {
                piece.owner == player && !piece.is_king() && to.row == self.king_row(player)
            }
            _ => false,
        }
    }

    // ========================================================================
    // APPLY / UNDO
    // ========================================================================

    /// Validate `mv` against the legal moves of `player`, then apply it
    pub fn make_move(&mut self, mv: &Move, player: Player) -> Result<(), MoveError> {
        let legal = self
            .legal_moves(player)
            .iter()
            .flatten()
            .any(|candidate| candidate == mv);
        if !legal {
            return Err(MoveError::Illegal {
                mv: mv.to_string(),
                player,
            });
        }
        self.apply_move(mv, player);
        Ok(())
    }

    /// Apply a move produced by [`Board::legal_moves`] without re-validating it
    pub fn apply_move(&mut self, mv: &Move, player: Player) {
        let (Some(from), Some(to)) = (mv.from(), mv.to()) else {
            return;
        };
        let Some(piece) = self.take(from) else {
            debug_assert!(false, "no piece at {:?} for {}", from, mv);
            return;
        };
        debug_assert_eq!(piece.owner, player);

        let captured: Vec<(Position, Piece)> = mv
            .captured_squares()
            .filter_map(|sq| self.take(sq).map(|victim| (sq, victim)))
            .collect();

        let mut moved = piece;
        if to.row == self.king_row(player) {
            moved.kind = PieceKind::King;
        }
        self.place(to, moved);

        let prev_inactivity = self.inactivity;
        self.inactivity = if captured.is_empty() {
            self.inactivity.saturating_add(1)
        } else {
            0
        };

        self.history.push(Undo {
            from,
            to,
            piece,
            captured,
            prev_inactivity,
        });
    }

    /// Revert the most recent applied move. Returns false if there is none.
    pub fn undo(&mut self) -> bool {
        let Some(undo) = self.history.pop() else {
            return false;
        };
        self.take(undo.to);
        self.place(undo.from, undo.piece);
        for (sq, victim) in undo.captured {
            self.place(sq, victim);
        }
        self.inactivity = undo.prev_inactivity;
        true
    }

    /// Apply `mv` for the lifetime of the returned guard; dropping the guard
    /// restores the board.
    pub fn probe(&mut self, mv: &Move, player: Player) -> Probe<'_> {
        self.apply_move(mv, player);
        Probe { board: self }
    }

    // ========================================================================
    // RESULT
    // ========================================================================

    /// Game result with `to_move` about to play.
    ///
    /// The tie rule is checked first; a side that cannot move loses.
    pub fn result(&self, to_move: Player) -> GameResult {
        if self.inactivity >= self.config.tie_limit {
            GameResult::Tie
        } else if !self.has_legal_moves(to_move) {
            GameResult::win_for(to_move.opponent())
        } else if self.piece_count(to_move.opponent()) == 0 {
            GameResult::win_for(to_move)
        } else {
            GameResult::Ongoing
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  ")?;
        for col in 0..self.config.cols {
            write!(f, "{:>3}", col)?;
        }
        writeln!(f)?;
        for row in 0..self.config.rows {
            write!(f, "{:>2}", row)?;
            for col in 0..self.config.cols {
                let symbol = self
                    .piece_at(Position::new(row, col))
                    .map_or('.', |p| p.symbol());
                write!(f, "{:>3}", symbol)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Scoped trial move: derefs to the board with the move applied and
/// undoes it when dropped.
pub struct Probe<'a> {
    board: &'a mut Board,
}

impl Deref for Probe<'_> {
    type Target = Board;

    fn deref(&self) -> &Board {
        &*self.board
    }
}

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        self.board.undo();
    }
}

// ============================================================================
// TESTS
// ============================================================================
