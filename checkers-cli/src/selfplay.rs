//! Selfplay command - play a series of games with the MCTS agent
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: play_match(), report_results()
//! - Level 3: play_single_game(), compute_match_statistics()
//! - Level 4: seats, formatting utilities

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use checkers_core::{Board, BoardConfig, GameResult, Move, Player};
use checkers_mcts::{AgentError, MctsAgent, MctsConfig};

use crate::EngineArgs;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SelfplayArgs {
    #[command(flatten)]
    pub engine: EngineArgs,

    /// Number of games to play (the agent alternates colors)
    #[arg(long, default_value = "2")]
    pub games: usize,

    /// Who the agent plays against
    #[arg(long, value_enum, default_value = "random")]
    pub opponent: OpponentKind,

    /// Plies after which an unfinished game is scored as a draw
    #[arg(long, default_value = "400")]
    pub max_plies: u32,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OpponentKind {
    /// A second MCTS agent with the same settings
    Mcts,
    /// Uniformly random legal moves
    Random,
}

/// Result of a single game
#[derive(Clone, Debug)]
struct GameRecord {
    game_number: usize,
    result: GameResult,
    plies: u32,
    /// Color played by the agent under test
    agent_color: Player,
    /// Search iterations spent by the agent over the game
    agent_iterations: u64,
    moves: Vec<Move>,
}

impl GameRecord {
    fn agent_won(&self) -> bool {
        self.result.winner() == Some(self.agent_color)
    }

    fn agent_lost(&self) -> bool {
        self.result.winner() == Some(self.agent_color.opponent())
    }
}

/// Aggregated match results
#[derive(Clone, Debug)]
struct MatchResults {
    games: Vec<GameRecord>,
    wins: usize,
    losses: usize,
    draws: usize,
    black_wins: usize,
    white_wins: usize,
    avg_plies: f32,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run selfplay command
///
/// 1. Build board and engine configuration
/// 2. Play the match (multiple games)
/// 3. Report results
pub fn run(args: SelfplayArgs, seed: Option<u64>) -> Result<()> {
    let board_config = args.engine.board_config()?;
    let config = args.engine.mcts_config(None)?;
    let seed = seed.or(config.seed);

    tracing::info!(
        "Starting selfplay: {} games on {}x{} vs {:?} (iterations={:?}, move_time={}ms)",
        args.games,
        board_config.cols,
        board_config.rows,
        args.opponent,
        config.iterations,
        config.move_time_ms
    );

    let results = play_match(board_config, &config, &args, seed)?;

    report_results(&results, &args);

    Ok(())
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Play all games in the match
fn play_match(
    board_config: BoardConfig,
    config: &MctsConfig,
    args: &SelfplayArgs,
    seed: Option<u64>,
) -> Result<MatchResults> {
    let mut rng = create_rng(seed);
    let mut games = Vec::with_capacity(args.games);

    for game_num in 0..args.games {
        // Alternate colors for fairness
        let agent_color = if game_num % 2 == 0 {
            Player::Black
        } else {
            Player::White
        };

        let record = play_single_game(
            board_config,
            config,
            args.opponent,
            agent_color,
            game_num + 1,
            args.max_plies,
            &mut rng,
        )?;

        tracing::info!(
            "Game {}: {:?} ({} plies, agent {})",
            record.game_number,
            record.result,
            record.plies,
            record.agent_color
        );

        games.push(record);
    }

    Ok(compute_match_statistics(games))
}

/// Report match results
fn report_results(results: &MatchResults, args: &SelfplayArgs) {
    if args.json {
        print_json_results(results);
    } else {
        print_text_results(results);
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Play one game; the referee board validates every move
fn play_single_game(
    board_config: BoardConfig,
    config: &MctsConfig,
    opponent: OpponentKind,
    agent_color: Player,
    game_number: usize,
    max_plies: u32,
    rng: &mut ChaCha8Rng,
) -> Result<GameRecord> {
    let mut board = Board::new(board_config)?;

    let agent = Seat::mcts(&board, config, agent_color, rng.gen());
    let other = match opponent {
        OpponentKind::Mcts => Seat::mcts(&board, config, agent_color.opponent(), rng.gen()),
        OpponentKind::Random => Seat::random(&board, agent_color.opponent(), rng.gen()),
    };
    let (mut black, mut white) = match agent_color {
        Player::Black => (agent, other),
        Player::White => (other, agent),
    };

    let mut to_move = Player::Black;
    let mut moves: Vec<Move> = Vec::new();

    let result = loop {
        let result = board.result(to_move);
        if result.is_over() {
            break result;
        }
        if moves.len() as u32 >= max_plies {
            break GameResult::Tie;
        }

        let seat = match to_move {
            Player::Black => &mut black,
            Player::White => &mut white,
        };
        let mv = seat
            .play(moves.last())
            .with_context(|| format!("{} failed to move in game {}", to_move, game_number))?;
        board
            .make_move(&mv, to_move)
            .with_context(|| format!("{} played an illegal move in game {}", to_move, game_number))?;

        moves.push(mv);
        to_move = to_move.opponent();
    };

    let agent_seat = match agent_color {
        Player::Black => &black,
        Player::White => &white,
    };

    Ok(GameRecord {
        game_number,
        result,
        plies: moves.len() as u32,
        agent_color,
        agent_iterations: agent_seat.iterations(),
        moves,
    })
}

/// Compute aggregate statistics from game records
fn compute_match_statistics(games: Vec<GameRecord>) -> MatchResults {
    let wins = games.iter().filter(|g| g.agent_won()).count();
    let losses = games.iter().filter(|g| g.agent_lost()).count();
    let draws = games.len() - wins - losses;
    let black_wins = games.iter().filter(|g| g.result == GameResult::BlackWins).count();
    let white_wins = games.iter().filter(|g| g.result == GameResult::WhiteWins).count();

    let total_plies: u32 = games.iter().map(|g| g.plies).sum();
    let avg_plies = if games.is_empty() {
        0.0
    } else {
        total_plies as f32 / games.len() as f32
    };

    MatchResults {
        games,
        wins,
        losses,
        draws,
        black_wins,
        white_wins,
        avg_plies,
    }
}

// ============================================================================
// LEVEL 4 - SEATS
// ============================================================================

/// A player at the table
enum Seat {
    Mcts {
        agent: Box<MctsAgent>,
        iterations: u64,
    },
    Random {
        board: Board,
        player: Player,
        rng: ChaCha8Rng,
    },
}

impl Seat {
    fn mcts(board: &Board, config: &MctsConfig, player: Player, seed: u64) -> Self {
        let config = config.clone().with_seed(seed);
        Seat::Mcts {
            agent: Box::new(MctsAgent::seated(board.snapshot(), config, player)),
            iterations: 0,
        }
    }

    fn random(board: &Board, player: Player, seed: u64) -> Self {
        Seat::Random {
            board: board.snapshot(),
            player,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Answer the opponent's last move (None on the opening turn)
    fn play(&mut self, last: Option<&Move>) -> Result<Move, AgentError> {
        match self {
            Seat::Mcts { agent, iterations } => {
                let mv = agent.decide_move(last)?;
                *iterations += agent.last_report().map_or(0, |r| r.iterations as u64);
                Ok(mv)
            }
            Seat::Random { board, player, rng } => {
                if let Some(mv) = last {
                    board.make_move(mv, player.opponent())?;
                }
                let mut moves = board.legal_moves_flat(*player);
                if moves.is_empty() {
                    return Err(AgentError::NoLegalMoves(*player));
                }
                let mv = moves.swap_remove(rng.gen_range(0..moves.len()));
                board.apply_move(&mv, *player);
                Ok(mv)
            }
        }
    }

    fn iterations(&self) -> u64 {
        match self {
            Seat::Mcts { iterations, .. } => *iterations,
            Seat::Random { .. } => 0,
        }
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Create RNG from seed or random
fn create_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

fn percent(count: usize, total: usize) -> f32 {
    if total > 0 {
        count as f32 / total as f32 * 100.0
    } else {
        0.0
    }
}

/// Print results as JSON
fn print_json_results(results: &MatchResults) {
    #[derive(serde::Serialize)]
    struct JsonGame {
        game_number: usize,
        result: GameResult,
        plies: u32,
        agent_color: Player,
        agent_iterations: u64,
        moves: Vec<String>,
    }

    #[derive(serde::Serialize)]
    struct JsonOutput {
        total_games: usize,
        wins: usize,
        losses: usize,
        draws: usize,
        black_wins: usize,
        white_wins: usize,
        avg_plies: f32,
        win_rate: f32,
        games: Vec<JsonGame>,
    }

    let total = results.games.len();
    let output = JsonOutput {
        total_games: total,
        wins: results.wins,
        losses: results.losses,
        draws: results.draws,
        black_wins: results.black_wins,
        white_wins: results.white_wins,
        avg_plies: results.avg_plies,
        win_rate: percent(results.wins, total) / 100.0,
        games: results
            .games
            .iter()
            .map(|g| JsonGame {
                game_number: g.game_number,
                result: g.result,
                plies: g.plies,
                agent_color: g.agent_color,
                agent_iterations: g.agent_iterations,
                moves: g.moves.iter().map(Move::to_string).collect(),
            })
            .collect(),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize results: {}", e),
    }
}

/// Print results as text
fn print_text_results(results: &MatchResults) {
    let total = results.games.len();

    println!("\n=== Selfplay Results ===");
    println!("Total games: {}", total);
    println!("Wins:        {} ({:.1}%)", results.wins, percent(results.wins, total));
    println!("Losses:      {} ({:.1}%)", results.losses, percent(results.losses, total));
    println!("Draws:       {} ({:.1}%)", results.draws, percent(results.draws, total));
    println!("Black/White: {}/{}", results.black_wins, results.white_wins);
    println!("Avg plies:   {:.1}", results.avg_plies);

    println!("\nGame details:");
    for game in &results.games {
        println!(
            "  Game {}: {:?} in {} plies (agent {}, {} iterations)",
            game.game_number, game.result, game.plies, game.agent_color, game.agent_iterations
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(game_number: usize, result: GameResult, plies: u32, agent_color: Player) -> GameRecord {
        GameRecord {
            game_number,
            result,
            plies,
            agent_color,
            agent_iterations: 0,
            moves: vec![],
        }
    }

    fn quick_config() -> MctsConfig {
        MctsConfig::default().with_iterations(50).with_move_time_ms(200)
    }

    #[test]
    fn test_compute_match_statistics_empty() {
        let results = compute_match_statistics(vec![]);
        assert_eq!(results.wins, 0);
        assert_eq!(results.losses, 0);
        assert_eq!(results.draws, 0);
        assert_eq!(results.avg_plies, 0.0);
    }

    #[test]
    fn test_compute_match_statistics() {
        let games = vec![
            record(1, GameResult::BlackWins, 10, Player::Black),
            record(2, GameResult::BlackWins, 20, Player::White),
            record(3, GameResult::Tie, 30, Player::Black),
        ];

        let results = compute_match_statistics(games);
        assert_eq!(results.wins, 1);
        assert_eq!(results.losses, 1);
        assert_eq!(results.draws, 1);
        assert_eq!(results.black_wins, 2);
        assert_eq!(results.white_wins, 0);
        assert_eq!(results.avg_plies, 20.0);
    }

    #[test]
    fn test_game_against_random_finishes() {
        let board_config = BoardConfig::new(6, 6, 2).unwrap();
        let mut rng = create_rng(Some(42));

        let record = play_single_game(
            board_config,
            &quick_config(),
            OpponentKind::Random,
            Player::White,
            1,
            200,
            &mut rng,
        )
        .unwrap();

        assert!(record.result.is_over());
        assert_eq!(record.moves.len() as u32, record.plies);
        assert!(record.plies <= 200);
        assert!(record.agent_iterations > 0);
    }

    #[test]
    fn test_game_replays_on_fresh_board() {
        let board_config = BoardConfig::new(6, 6, 2).unwrap();
        let mut rng = create_rng(Some(9));
        let record = play_single_game(
            board_config,
            &quick_config(),
            OpponentKind::Mcts,
            Player::Black,
            1,
            60,
            &mut rng,
        )
        .unwrap();

        let mut board = Board::new(board_config).unwrap();
        let mut player = Player::Black;
        for mv in &record.moves {
            board.make_move(mv, player).unwrap();
            player = player.opponent();
        }
    }

    #[test]
    fn test_create_rng_deterministic() {
        let mut rng1 = create_rng(Some(42));
        let mut rng2 = create_rng(Some(42));
        assert_eq!(rng1.gen::<u64>(), rng2.gen::<u64>());
    }
}
