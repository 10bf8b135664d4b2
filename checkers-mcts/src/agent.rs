//! Match session: one MCTS player across a whole game
//!
//! The agent owns the authoritative board and the search tree. Each call
//! to [`MctsAgent::decide_move`] applies the opponent's move, keeps the
//! matching subtree, searches within the turn's time slice and commits
//! the chosen move.

use std::time::{Duration, Instant};

use checkers_core::{Board, Move, MoveError, Player};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

use crate::search::{run_search, SearchBudget, StopReason};
use crate::tree::MctsTree;
use crate::MctsConfig;

/// Shortest slice ever handed to the search
const MIN_SLICE: Duration = Duration::from_millis(1);

/// Errors returned by [`MctsAgent::decide_move`]
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("opponent move rejected: {0}")]
    IllegalOpponentMove(#[from] MoveError),

    #[error("{0} has no legal moves")]
    NoLegalMoves(Player),
}

/// Why a turn was played without search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fallback {
    /// Remaining match time fell below the safety margin
    LowTime,
    /// The search left the root without children (node cap)
    NoSearchResult,
}

/// What happened during one call to `decide_move`
#[derive(Clone, Debug, PartialEq)]
pub struct TurnReport {
    pub iterations: u32,
    pub elapsed: Duration,
    /// The previous tree supplied the root for this turn
    pub reused_tree: bool,
    /// Root visits inherited from earlier turns
    pub root_visits_before: u32,
    /// Live nodes after the search
    pub nodes: usize,
    pub risk_mode: bool,
    pub fallback: Option<Fallback>,
}

/// MCTS player bound to one game
#[derive(Debug)]
pub struct MctsAgent {
    config: MctsConfig,
    board: Board,
    /// Decided on the first call unless seated up front
    player: Option<Player>,
    tree: Option<MctsTree>,
    time_used: Duration,
    rng: ChaCha8Rng,
    last_report: Option<TurnReport>,
}

impl MctsAgent {
    /// New session at `board`. The agent plays Black if its first call has
    /// no opponent move, White otherwise.
    pub fn new(board: Board, config: MctsConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            config,
            board: board.snapshot(),
            player: None,
            tree: None,
            time_used: Duration::ZERO,
            rng,
            last_report: None,
        }
    }

    /// New session with the colour fixed in advance
    pub fn seated(board: Board, config: MctsConfig, player: Player) -> Self {
        let mut agent = Self::new(board, config);
        agent.player = Some(player);
        agent
    }

    // ========================================================================
    // Level 2: Turn orchestration
    // ========================================================================

    /// Play one turn.
    ///
    /// `opponent_move` is None only when the agent opens the game.
    pub fn decide_move(&mut self, opponent_move: Option<&Move>) -> Result<Move, AgentError> {
        let start = Instant::now();
        let player = self.seat_for(opponent_move.is_some());

        if let Some(mv) = opponent_move {
            if let Err(e) = self.board.make_move(mv, player.opponent()) {
                self.time_used += start.elapsed();
                return Err(e.into());
            }
            self.tree = self.tree.take().and_then(|tree| tree.reroot(mv));
            tracing::trace!(opponent_move = %mv, kept = self.tree.is_some(), "re-rooted on opponent move");
        }
        self.player = Some(player);

        let moves = self.board.legal_moves_flat(player);
        if moves.is_empty() {
            self.tree = None;
            self.time_used += start.elapsed();
            return Err(AgentError::NoLegalMoves(player));
        }

        let safety = Duration::from_millis(self.config.safety_margin_ms);
        let remaining = self.remaining_time();
        if remaining < safety {
            tracing::warn!(
                remaining_ms = remaining.as_millis() as u64,
                "match clock below safety margin, playing a random move"
            );
            let report = TurnReport {
                iterations: 0,
                elapsed: Duration::ZERO,
                reused_tree: false,
                root_visits_before: 0,
                nodes: 0,
                risk_mode: false,
                fallback: Some(Fallback::LowTime),
            };
            return Ok(self.play_random(moves, player, start, report));
        }

        let (mut tree, reused_tree) = self.take_tree(player);
        let root_visits_before = tree.total_simulations();

        let risk_mode = self.in_risk_mode(player);
        let draw_value = if risk_mode {
            self.config.risk_draw_value
        } else {
            self.config.draw_value
        };

        let slice = Duration::from_millis(self.config.move_time_ms)
            .min(remaining - safety)
            .max(MIN_SLICE);
        let budget = SearchBudget::time(slice).with_iterations(self.config.iterations);
        let stats = run_search(&mut tree, &self.config, draw_value, budget, &mut self.rng);
        if stats.stopped_by == StopReason::NodeLimit {
            tracing::warn!(nodes = tree.len(), "node cap reached");
        }

        let mut report = TurnReport {
            iterations: stats.iterations,
            elapsed: stats.elapsed,
            reused_tree,
            root_visits_before,
            nodes: tree.len(),
            risk_mode,
            fallback: None,
        };

        let Some(best) = tree.best_move(self.config.final_selection) else {
            tracing::warn!("search produced no root child, playing a random move");
            report.fallback = Some(Fallback::NoSearchResult);
            return Ok(self.play_random(moves, player, start, report));
        };

        self.board.apply_move(&best, player);
        self.tree = tree.reroot(&best);
        Ok(self.finish(best, start, report))
    }

    // ========================================================================
    // Level 3: Helpers
    // ========================================================================

    /// Colour for this turn; fixed once an opening is accepted
    fn seat_for(&self, has_opponent_move: bool) -> Player {
        self.player.unwrap_or(if has_opponent_move {
            Player::White
        } else {
            Player::Black
        })
    }

    /// The stored tree if it describes the current position, else a fresh one
    fn take_tree(&mut self, player: Player) -> (MctsTree, bool) {
        match self.tree.take() {
            Some(tree) if tree.root_player() == player && tree.get(tree.root()).board == self.board => {
                (tree, true)
            }
            Some(_) => {
                tracing::trace!("stored tree does not match the board, rebuilding");
                (MctsTree::new(self.board.snapshot(), player), false)
            }
            None => (MctsTree::new(self.board.snapshot(), player), false),
        }
    }

    /// Endgame with level material: draws are worth less
    fn in_risk_mode(&self, player: Player) -> bool {
        let own = self.board.piece_count(player);
        let opponent = self.board.piece_count(player.opponent());
        let initial = 2 * self.board.config().pieces_per_side();

        let endgame = ((own + opponent) as f64) < self.config.endgame_fraction * initial as f64;
        endgame && own == opponent
    }

    fn play_random(&mut self, mut moves: Vec<Move>, player: Player, start: Instant, report: TurnReport) -> Move {
        let idx = self.rng.gen_range(0..moves.len());
        let mv = moves.swap_remove(idx);
        self.board.apply_move(&mv, player);
        self.tree = None;
        self.finish(mv, start, report)
    }

    fn finish(&mut self, mv: Move, start: Instant, mut report: TurnReport) -> Move {
        let elapsed = start.elapsed();
        self.time_used += elapsed;
        report.elapsed = elapsed;

        tracing::debug!(
            chosen = %mv,
            iterations = report.iterations,
            elapsed_ms = elapsed.as_millis() as u64,
            reused = report.reused_tree,
            root_visits_before = report.root_visits_before,
            nodes = report.nodes,
            risk_mode = report.risk_mode,
            fallback = ?report.fallback,
            "turn complete"
        );
        self.last_report = Some(report);
        mv
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Authoritative board, after the agent's last move
    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn player(&self) -> Option<Player> {
        self.player
    }

    /// Tree kept for the next turn, if any
    pub fn tree(&self) -> Option<&MctsTree> {
        self.tree.as_ref()
    }

    /// Wall time spent inside `decide_move` so far
    pub fn time_used(&self) -> Duration {
        self.time_used
    }

    pub fn remaining_time(&self) -> Duration {
        Duration::from_millis(self.config.match_time_ms).saturating_sub(self.time_used)
    }

    pub fn last_report(&self) -> Option<&TurnReport> {
        self.last_report.as_ref()
    }
}

// ============================================================================
// TESTS
// ============================================================================
