//! MCTS Search Throughput Benchmark
//!
//! Measures:
//! 1. Iterations per second for each rollout policy
//! 2. Cost of re-rooting a grown tree
//! 3. Full turns through the agent session

use std::time::Instant;

use checkers_core::{Board, BoardConfig, Piece, Player, Position};
use checkers_mcts::{run_search, MctsAgent, MctsConfig, MctsTree, RolloutKind, SearchBudget};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// TEST POSITIONS
// ============================================================================

fn opening() -> Board {
    Board::new(BoardConfig::default()).expect("default board is valid")
}

/// Sparse middle game with kings on both sides
fn midgame() -> Board {
    let pieces = [
        (Position::new(0, 1), Piece::man(Player::Black)),
        (Position::new(1, 2), Piece::man(Player::Black)),
        (Position::new(2, 5), Piece::man(Player::Black)),
        (Position::new(3, 4), Piece::man(Player::Black)),
        (Position::new(4, 1), Piece::king(Player::Black)),
        (Position::new(3, 0), Piece::man(Player::White)),
        (Position::new(5, 2), Piece::man(Player::White)),
        (Position::new(5, 6), Piece::man(Player::White)),
        (Position::new(6, 7), Piece::man(Player::White)),
        (Position::new(2, 3), Piece::king(Player::White)),
    ];
    Board::from_pieces(BoardConfig::default(), &pieces)
}

// ============================================================================
// BENCHMARK STRUCTURES
// ============================================================================

#[derive(Clone, Debug)]
struct BenchmarkResult {
    position: String,
    config: String,
    iterations: u32,
    total_time_ms: f64,
}

impl BenchmarkResult {
    fn per_second(&self) -> f64 {
        self.iterations as f64 / (self.total_time_ms / 1000.0)
    }

    fn to_table_row(&self) -> String {
        format!(
            "| {:<10} | {:<18} | {:>8} | {:>9.0}ms | {:>10.0} |",
            self.position,
            self.config,
            self.iterations,
            self.total_time_ms,
            self.per_second()
        )
    }
}

// ============================================================================
// BENCHMARK: Iterations per second
// ============================================================================

fn benchmark_iterations(board: &Board, position_name: &str) -> Vec<BenchmarkResult> {
    println!("\n=== ITERATION BENCHMARK: {} ===", position_name);
    let mut results = Vec::new();

    for (kind, label) in [(RolloutKind::Heuristic, "heuristic"), (RolloutKind::Uniform, "uniform")] {
        for iterations in [1_000, 5_000] {
            print!("  {} rollouts, {} iterations ... ", label, iterations);
            let config = MctsConfig {
                rollout: kind,
                ..MctsConfig::default()
            };
            let mut tree = MctsTree::new(board.snapshot(), Player::Black);
            let mut rng = ChaCha8Rng::seed_from_u64(42);

            let start = Instant::now();
            let stats = run_search(&mut tree, &config, config.draw_value, SearchBudget::iterations(iterations), &mut rng);
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;

            let result = BenchmarkResult {
                position: position_name.to_string(),
                config: format!("{} x{}", label, iterations),
                iterations: stats.iterations,
                total_time_ms: elapsed,
            };
            println!("{:.0}ms ({:.0}/sec, {} nodes)", elapsed, result.per_second(), tree.len());
            results.push(result);
        }
    }

    results
}

// ============================================================================
// BENCHMARK: Re-rooting
// ============================================================================

fn benchmark_reroot(board: &Board) {
    println!("\n=== RE-ROOT BENCHMARK ===");
    let config = MctsConfig::default();
    let mut tree = MctsTree::new(board.snapshot(), Player::Black);
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    run_search(&mut tree, &config, config.draw_value, SearchBudget::iterations(20_000), &mut rng);

    let before = tree.len();
    let Some(best) = tree.best_move(config.final_selection) else {
        println!("  no root child, skipping");
        return;
    };

    let start = Instant::now();
    let kept = tree.reroot(&best).map_or(0, |tree| tree.len());
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;
    println!("  {} nodes -> {} kept in {:.3}ms", before, kept, elapsed);
}

// ============================================================================
// BENCHMARK: Agent turns
// ============================================================================

fn benchmark_turns(board: &Board) {
    println!("\n=== AGENT TURN BENCHMARK ===");
    let config = MctsConfig::default().with_iterations(2_000).with_seed(1);
    let mut black = MctsAgent::new(board.snapshot(), config.clone());
    let mut white = MctsAgent::new(board.snapshot(), config.with_seed(2));

    let start = Instant::now();
    let mut last = None;
    let mut plies = 0;
    for _ in 0..10 {
        let Ok(mv) = black.decide_move(last.as_ref()) else { break };
        let Ok(reply) = white.decide_move(Some(&mv)) else { break };
        last = Some(reply);
        plies += 2;
    }
    let elapsed = start.elapsed().as_secs_f64() * 1000.0;

    let reused = black.last_report().map_or(0, |r| r.root_visits_before);
    println!("  {} plies in {:.0}ms ({:.1}ms/ply), last reuse {} visits", plies, elapsed, elapsed / plies.max(1) as f64, reused);
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    print_header("CHECKERS: MCTS Search Throughput");

    let opening = opening();
    let midgame = midgame();

    let mut all_results = Vec::new();
    all_results.extend(benchmark_iterations(&opening, "Opening"));
    all_results.extend(benchmark_iterations(&midgame, "Mid-Game"));

    benchmark_reroot(&opening);
    benchmark_turns(&opening);

    print_header("BENCHMARK RESULTS TABLE");
    println!("| Position   | Config             | Iters    | Total Time  | Iters/Sec  |");
    println!("|------------|--------------------|----------|-------------|------------|");
    for result in &all_results {
        println!("{}", result.to_table_row());
    }
    println!();
}

fn print_header(title: &str) {
    println!("\n╔{}╗", "═".repeat(title.len() + 4));
    println!("║  {}  ║", title);
    println!("╚{}╝", "═".repeat(title.len() + 4));
}
