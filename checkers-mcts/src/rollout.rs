//! Rollout (simulation) strategies for MCTS
//!
//! Rollouts play a bounded game from a leaf with a cheap move policy. The
//! default policy is greedy over a weighted set of move features; uniform
//! random play is kept for comparison.
//!
//! ## Architecture
//! - Level 2: Playout loop
//! - Level 3: Move policies
//! - Level 4: Move feature scoring

use checkers_core::{evaluate, Board, GameResult, Move, Player, PositionWeights};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::MctsConfig;

// ============================================================================
// ROLLOUT RESULT
// ============================================================================

/// Result of a rollout simulation
#[derive(Clone, Debug, PartialEq)]
pub struct RolloutResult {
    /// Final game result; cut-off rollouts are ties
    pub result: GameResult,
    /// Number of plies played
    pub plies: u32,
}

/// Length limits for a rollout
#[derive(Clone, Copy, Debug)]
pub struct RolloutLimits {
    /// Quiet plies (no capture) that end the rollout in a draw
    pub inactivity_limit: u16,
    /// Hard cap on plies
    pub max_plies: u32,
}

impl From<&MctsConfig> for RolloutLimits {
    fn from(config: &MctsConfig) -> Self {
        Self {
            inactivity_limit: config.inactivity_limit,
            max_plies: config.max_rollout_plies,
        }
    }
}

/// Maps game results onto [0, 1] for the searching player
#[derive(Clone, Copy, Debug)]
pub struct OutcomeScale {
    pub player: Player,
    pub draw_value: f64,
}

impl OutcomeScale {
    pub fn value(&self, result: GameResult) -> f64 {
        match result.winner() {
            Some(winner) if winner == self.player => 1.0,
            Some(_) => 0.0,
            None => self.draw_value,
        }
    }
}

// ============================================================================
// PLAYOUT (Level 2)
// ============================================================================

/// Play from `start` with `to_move` to play until one side cannot move or
/// the game goes quiet for too long.
pub fn play_out<P: RolloutPolicy, R: Rng>(
    policy: &P,
    start: &Board,
    to_move: Player,
    limits: &RolloutLimits,
    rng: &mut R,
) -> RolloutResult {
    let mut board = start.snapshot();
    let mut player = to_move;
    let mut plies = 0;
    let quiet_limit = limits.inactivity_limit.min(board.config().tie_limit);

    loop {
        if board.inactivity() >= quiet_limit || plies >= limits.max_plies {
            return RolloutResult {
                result: GameResult::Tie,
                plies,
            };
        }

        let moves = board.legal_moves_flat(player);
        if moves.is_empty() {
            return RolloutResult {
                result: GameResult::win_for(player.opponent()),
                plies,
            };
        }

        let idx = policy.select_move(&mut board, &moves, player, rng);
        board.apply_move(&moves[idx], player);
        player = player.opponent();
        plies += 1;
    }
}

// ============================================================================
// ROLLOUT POLICIES (Level 3)
// ============================================================================

/// A rollout policy determines how to select moves during simulation
pub trait RolloutPolicy {
    /// Index into `moves` (never empty) of the move to play. The board may
    /// be probed but must be left unchanged.
    fn select_move<R: Rng>(&self, board: &mut Board, moves: &[Move], player: Player, rng: &mut R) -> usize;
}

/// Uniform random policy - all moves equally likely
pub struct UniformPolicy;

impl RolloutPolicy for UniformPolicy {
    fn select_move<R: Rng>(&self, _board: &mut Board, moves: &[Move], _player: Player, rng: &mut R) -> usize {
        rng.gen_range(0..moves.len())
    }
}

/// Feature weights for the greedy rollout policy
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Any capture
    pub capture: f32,
    /// Per piece jumped beyond the first
    pub chain_capture: f32,
    /// Per extra capture the opponent gains after the move
    pub vulnerability: f32,
    /// Crowning a man
    pub promotion: f32,
    /// Scale of the static evaluation after the move (0 disables it)
    pub positional: f32,
    pub position: PositionWeights,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            capture: 10.0,
            chain_capture: 5.0,
            vulnerability: 4.0,
            promotion: 8.0,
            positional: 1.0,
            position: PositionWeights::default(),
        }
    }
}

/// Greedy policy: plays the highest-scoring move, first on ties
#[derive(Clone, Debug, Default)]
pub struct HeuristicPolicy {
    pub weights: ScoringWeights,
}

impl HeuristicPolicy {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score a candidate move for `player`. The board is probed and
    /// restored before returning.
    pub fn score_move(&self, board: &mut Board, mv: &Move, player: Player) -> f32 {
        let threats_before = board.capture_count(player.opponent());
        self.score_move_with_threats(board, mv, player, threats_before)
    }

    /// As [`score_move`](Self::score_move), with the opponent's capture
    /// count on the unmoved board already known.
    pub fn score_move_with_threats(&self, board: &mut Board, mv: &Move, player: Player, threats_before: usize) -> f32 {
        let w = &self.weights;
        let mut score = 0.0;

        if mv.is_capture() {
            let jumped = mv.captured_squares().count();
            score += w.capture + w.chain_capture * jumped.saturating_sub(1) as f32;
        }

        if board.promotes(mv, player) {
            score += w.promotion;
        }

        let after = board.probe(mv, player);

        let threats_after = after.capture_count(player.opponent());
        if threats_after > threats_before {
            score -= w.vulnerability * (threats_after - threats_before) as f32;
        }

        if w.positional != 0.0 {
            score += w.positional * evaluate(&after, player, &w.position);
        }

        score
    }
}

impl RolloutPolicy for HeuristicPolicy {
    fn select_move<R: Rng>(&self, board: &mut Board, moves: &[Move], player: Player, _rng: &mut R) -> usize {
        let threats_before = board.capture_count(player.opponent());
        let mut best = (0, f32::NEG_INFINITY);
        for (idx, mv) in moves.iter().enumerate() {
            let score = self.score_move_with_threats(board, mv, player, threats_before);
            if score > best.1 {
                best = (idx, score);
            }
        }
        best.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use checkers_core::{BoardConfig, Piece, Position};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn pos(row: u8, col: u8) -> Position {
        Position::new(row, col)
    }

    fn limits() -> RolloutLimits {
        RolloutLimits::from(&MctsConfig::default())
    }

    #[test]
    fn test_outcome_scale() {
        let scale = OutcomeScale { player: Player::White, draw_value: 0.3 };
        assert_eq!(scale.value(GameResult::WhiteWins), 1.0);
        assert_eq!(scale.value(GameResult::BlackWins), 0.0);
        assert_eq!(scale.value(GameResult::Tie), 0.3);
    }

    #[test]
    fn test_uniform_policy() {
        let mut board = Board::new(BoardConfig::default()).unwrap();
        let moves = board.legal_moves_flat(Player::Black);
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        let idx = UniformPolicy.select_move(&mut board, &moves, Player::Black, &mut rng);
        assert!(idx < moves.len());
    }

    #[test]
    fn test_prefers_double_jump() {
        let config = BoardConfig::default();
        // Black king at (3,2) may take one piece toward (1,0) or two via (5,4)-(7,6)
        let mut board = Board::from_pieces(
            config,
            &[
                (pos(3, 2), Piece::king(Player::Black)),
                (pos(2, 1), Piece::man(Player::White)),
                (pos(4, 3), Piece::man(Player::White)),
                (pos(6, 5), Piece::man(Player::White)),
            ],
        );
        let moves = board.legal_moves_flat(Player::Black);
        assert_eq!(moves.len(), 2);

        let policy = HeuristicPolicy::default();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let idx = policy.select_move(&mut board, &moves, Player::Black, &mut rng);
        assert!(moves[idx].is_multi_capture());
    }

    #[test]
    fn test_penalises_hanging_move() {
        let config = BoardConfig::default();
        // Stepping to (3,2) lets White jump from (4,1); stepping to (3,0) does not
        let mut board = Board::from_pieces(
            config,
            &[
                (pos(2, 1), Piece::man(Player::Black)),
                (pos(4, 1), Piece::man(Player::White)),
                (pos(7, 6), Piece::man(Player::White)),
            ],
        );
        let policy = HeuristicPolicy::default();
        let safe = Move::new(vec![pos(2, 1), pos(3, 0)]);
        let hanging = Move::new(vec![pos(2, 1), pos(3, 2)]);

        let before = board.clone();
        let safe_score = policy.score_move(&mut board, &safe, Player::Black);
        let hanging_score = policy.score_move(&mut board, &hanging, Player::Black);
        assert!(safe_score > hanging_score);
        assert_eq!(board, before, "scoring must leave the board untouched");

        // Selection shares one threat count across candidates
        let moves = vec![hanging.clone(), safe.clone()];
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(policy.select_move(&mut board, &moves, Player::Black, &mut rng), 1);
        let threats = board.capture_count(Player::White);
        assert_eq!(policy.score_move_with_threats(&mut board, &hanging, Player::Black, threats), hanging_score);
        assert_eq!(board, before);
    }

    #[test]
    fn test_rewards_promotion() {
        let config = BoardConfig::default();
        let mut board = Board::from_pieces(
            config,
            &[
                (pos(6, 1), Piece::man(Player::Black)),
                (pos(0, 7), Piece::man(Player::White)),
            ],
        );
        let policy = HeuristicPolicy::default();
        let crown = Move::new(vec![pos(6, 1), pos(7, 2)]);
        let score = policy.score_move(&mut board, &crown, Player::Black);
        assert!(score >= policy.weights.promotion);
    }

    #[test]
    fn test_rollout_detects_win() {
        let config = BoardConfig::default();
        let board = Board::from_pieces(
            config,
            &[
                (pos(2, 1), Piece::man(Player::Black)),
                (pos(3, 2), Piece::man(Player::White)),
            ],
        );
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let result = play_out(&HeuristicPolicy::default(), &board, Player::Black, &limits(), &mut rng);
        assert_eq!(result, RolloutResult { result: GameResult::BlackWins, plies: 1 });
    }

    #[test]
    fn test_rollout_inactivity_draw() {
        let config = BoardConfig::default();
        // Two lone kings far apart never force a capture
        let board = Board::from_pieces(
            config,
            &[
                (pos(0, 1), Piece::king(Player::Black)),
                (pos(7, 6), Piece::king(Player::White)),
            ],
        )
        .with_inactivity(39);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let result = play_out(&HeuristicPolicy::default(), &board, Player::Black, &limits(), &mut rng);
        assert_eq!(result.result, GameResult::Tie);
        assert_eq!(result.plies, 1);
    }

    #[test]
    fn test_rollout_respects_ply_cap() {
        let board = Board::new(BoardConfig::default()).unwrap();
        let limits = RolloutLimits { inactivity_limit: 40, max_plies: 5 };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let result = play_out(&UniformPolicy, &board, Player::Black, &limits, &mut rng);
        assert!(result.plies <= 5);
    }
}
