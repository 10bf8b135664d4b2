//! MCTS Search Loop
//!
//! Implements the core MCTS algorithm:
//! 1. Selection - Use UCT to traverse tree
//! 2. Expansion - Add one child node
//! 3. Simulation - Rollout from the new child
//! 4. Backpropagation - Update statistics
//!
//! ## Architecture
//! - Level 2: Search loop coordination
//! - Level 3: Individual MCTS phases

use std::time::{Duration, Instant};

use rand::Rng;

use crate::rollout::{play_out, HeuristicPolicy, OutcomeScale, RolloutLimits, RolloutPolicy, UniformPolicy};
use crate::tree::{Expansion, MctsTree};
use crate::{MctsConfig, RolloutKind};

// ============================================================================
// BUDGET AND RESULT
// ============================================================================

/// Limits on one search. At least one of the two is always set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchBudget {
    iterations: Option<u32>,
    time: Option<Duration>,
}

impl SearchBudget {
    /// Stop after `iterations` iterations
    pub fn iterations(iterations: u32) -> Self {
        Self {
            iterations: Some(iterations),
            time: None,
        }
    }

    /// Stop once `time` has elapsed
    pub fn time(time: Duration) -> Self {
        Self {
            iterations: None,
            time: Some(time),
        }
    }

    /// Add an iteration cap to a time budget (or replace the cap)
    pub fn with_iterations(mut self, iterations: Option<u32>) -> Self {
        if iterations.is_some() || self.time.is_some() {
            self.iterations = iterations;
        }
        self
    }

    pub fn iteration_cap(&self) -> Option<u32> {
        self.iterations
    }

    pub fn time_limit(&self) -> Option<Duration> {
        self.time
    }
}

/// Why the search loop ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Iterations,
    Deadline,
    /// The tree reached `max_nodes`
    NodeLimit,
}

/// Summary of one search
#[derive(Clone, Debug)]
pub struct SearchStats {
    pub iterations: u32,
    pub elapsed: Duration,
    pub stopped_by: StopReason,
}

// ============================================================================
// SEARCH LOOP (Level 2 - Main Coordination)
// ============================================================================

/// Grow `tree` until the budget runs out.
///
/// Rewards are scored for the tree's root player, with a draw worth
/// `draw_value`. The clock is read before every iteration.
pub fn run_search<R: Rng>(
    tree: &mut MctsTree,
    config: &MctsConfig,
    draw_value: f64,
    budget: SearchBudget,
    rng: &mut R,
) -> SearchStats {
    let stats = match config.rollout {
        RolloutKind::Heuristic => {
            let policy = HeuristicPolicy::new(config.scoring.clone());
            search_with(&policy, tree, config, draw_value, budget, rng)
        }
        RolloutKind::Uniform => search_with(&UniformPolicy, tree, config, draw_value, budget, rng),
    };

    tracing::debug!(
        iterations = stats.iterations,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        nodes = tree.len(),
        root_visits = tree.total_simulations(),
        stopped_by = ?stats.stopped_by,
        "search finished"
    );
    stats
}

fn search_with<P: RolloutPolicy, R: Rng>(
    policy: &P,
    tree: &mut MctsTree,
    config: &MctsConfig,
    draw_value: f64,
    budget: SearchBudget,
    rng: &mut R,
) -> SearchStats {
    let start = Instant::now();
    let scale = OutcomeScale {
        player: tree.root_player(),
        draw_value,
    };
    let limits = RolloutLimits::from(config);
    let mut iterations = 0u32;

    let stopped_by = loop {
        if budget.iterations.is_some_and(|cap| iterations >= cap) {
            break StopReason::Iterations;
        }
        if budget.time.is_some_and(|limit| start.elapsed() >= limit) {
            break StopReason::Deadline;
        }
        if tree.len() >= config.max_nodes {
            break StopReason::NodeLimit;
        }

        run_single_iteration(tree, policy, config.exploration, &scale, &limits, rng);
        iterations += 1;
    };

    SearchStats {
        iterations,
        elapsed: start.elapsed(),
        stopped_by,
    }
}

// ============================================================================
// MCTS PHASES (Level 3)
// ============================================================================

/// Single MCTS iteration
fn run_single_iteration<P: RolloutPolicy, R: Rng>(
    tree: &mut MctsTree,
    policy: &P,
    exploration: f64,
    scale: &OutcomeScale,
    limits: &RolloutLimits,
    rng: &mut R,
) {
    // Phase 1: Selection
    let leaf = tree.select_leaf(exploration);

    // Phase 2: Expansion
    match tree.expand(leaf, rng) {
        Expansion::Child(child) => {
            // Phase 3: Simulation
            let node = tree.get(child);
            let rollout = play_out(policy, &node.board, node.to_move, limits, rng);
            tracing::trace!(plies = rollout.plies, result = ?rollout.result, "rollout");

            // Phase 4: Backpropagation
            tree.backpropagate(child, scale.value(rollout.result));
        }
        Expansion::Terminal(result) => tree.backpropagate(leaf, scale.value(result)),
        Expansion::Exhausted => {}
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use checkers_core::{Board, BoardConfig, Piece, Player, Position};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn small_tree() -> MctsTree {
        let board = Board::new(BoardConfig::new(6, 6, 2).unwrap()).unwrap();
        MctsTree::new(board, Player::Black)
    }

    #[test]
    fn test_iteration_budget() {
        let mut tree = small_tree();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let config = MctsConfig::default();

        let stats = run_search(&mut tree, &config, 0.5, SearchBudget::iterations(200), &mut rng);

        assert_eq!(stats.iterations, 200);
        assert_eq!(stats.stopped_by, StopReason::Iterations);
        assert_eq!(tree.total_simulations(), 200);
        assert!(tree.len() > 1 && tree.len() <= 201);
        // All five opening moves got tried
        assert_eq!(tree.get(tree.root()).children.len(), 5);
    }

    #[test]
    fn test_time_budget() {
        let mut tree = small_tree();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let config = MctsConfig::default();
        let limit = Duration::from_millis(30);

        let stats = run_search(&mut tree, &config, 0.5, SearchBudget::time(limit), &mut rng);

        assert_eq!(stats.stopped_by, StopReason::Deadline);
        assert!(stats.iterations > 0);
        assert!(stats.elapsed < limit + Duration::from_millis(200));
    }

    #[test]
    fn test_node_limit() {
        let mut tree = small_tree();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let config = MctsConfig {
            max_nodes: 10,
            ..MctsConfig::default()
        };

        let stats = run_search(&mut tree, &config, 0.5, SearchBudget::iterations(1000), &mut rng);

        assert_eq!(stats.stopped_by, StopReason::NodeLimit);
        assert_eq!(tree.len(), 10);
    }

    #[test]
    fn test_finds_winning_capture() {
        let board = Board::from_pieces(
            BoardConfig::default(),
            &[
                (Position::new(2, 1), Piece::man(Player::Black)),
                (Position::new(3, 2), Piece::man(Player::White)),
            ],
        );
        let mut tree = MctsTree::new(board, Player::Black);
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        run_search(&mut tree, &MctsConfig::default(), 0.5, SearchBudget::iterations(20), &mut rng);

        let best = tree.best_child(crate::FinalSelection::MeanScore).unwrap();
        let child = tree.get(best);
        assert!(child.is_terminal());
        assert_eq!(child.stats.mean(), 1.0);
        assert_eq!(tree.get(tree.root()).stats.mean(), 1.0);
    }

    #[test]
    fn test_draw_value_scores_ties() {
        // Every move reaches the tie limit
        let board = Board::from_pieces(
            BoardConfig::default(),
            &[
                (Position::new(0, 1), Piece::king(Player::Black)),
                (Position::new(7, 6), Piece::king(Player::White)),
            ],
        )
        .with_inactivity(39);
        let mut tree = MctsTree::new(board, Player::Black);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        run_search(&mut tree, &MctsConfig::default(), 0.2, SearchBudget::iterations(10), &mut rng);

        for (_, visits, mean) in tree.move_statistics() {
            assert!(visits > 0);
            assert!((mean - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_uniform_rollouts() {
        let mut tree = small_tree();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let config = MctsConfig {
            rollout: RolloutKind::Uniform,
            ..MctsConfig::default()
        };

        let stats = run_search(&mut tree, &config, 0.5, SearchBudget::iterations(50), &mut rng);
        assert_eq!(stats.iterations, 50);
        assert!(tree.move_statistics().iter().all(|(_, _, mean)| (0.0..=1.0).contains(mean)));
    }

    #[test]
    fn test_budget_builders() {
        let budget = SearchBudget::time(Duration::from_millis(5)).with_iterations(Some(10));
        assert_eq!(budget.iteration_cap(), Some(10));
        assert_eq!(budget.time_limit(), Some(Duration::from_millis(5)));

        // Clearing the cap of an iteration-only budget is ignored
        let fixed = SearchBudget::iterations(3).with_iterations(None);
        assert_eq!(fixed.iteration_cap(), Some(3));
    }
}
