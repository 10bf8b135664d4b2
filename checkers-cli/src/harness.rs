//! Harness command - play one game over a line protocol
//!
//! stdin carries the opponent's moves, one per line, in `(r,c)-(r,c)`
//! notation. The first line is either `Begin` (the agent opens as Black)
//! or the opponent's opening move. Every reply is written to stdout on
//! its own line. `-1` or end of input ends the session.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::Args;

use checkers_core::{Board, Move};
use checkers_mcts::{AgentError, MctsAgent};

use crate::EngineArgs;

#[derive(Args)]
pub struct HarnessArgs {
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// One line of input
#[derive(Clone, Debug, PartialEq)]
enum Command {
    Begin,
    Opponent(Move),
    Quit,
}

fn parse_command(line: &str) -> Result<Command> {
    match line {
        "Begin" => Ok(Command::Begin),
        "-1" => Ok(Command::Quit),
        other => {
            let mv = other
                .parse()
                .with_context(|| format!("Unrecognised harness input: {}", other))?;
            Ok(Command::Opponent(mv))
        }
    }
}

pub fn run(args: HarnessArgs, seed: Option<u64>) -> Result<()> {
    let board = Board::new(args.engine.board_config()?)?;
    let config = args.engine.mcts_config(seed)?;
    let mut agent = MctsAgent::new(board, config);

    tracing::info!(
        "Harness ready on {}x{} board",
        agent.board().config().cols,
        agent.board().config().rows
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_session(&mut agent, stdin.lock(), stdout.lock())
}

/// Drive `agent` from `input` until the game or the input ends
fn run_session<R: BufRead, W: Write>(agent: &mut MctsAgent, input: R, mut output: W) -> Result<()> {
    let mut opening = true;

    for line in input.lines() {
        let line = line.context("Failed to read harness input")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let opponent_move = match parse_command(line)? {
            Command::Quit => break,
            Command::Begin if opening => None,
            Command::Begin => bail!("Begin is only valid as the first line"),
            Command::Opponent(mv) => Some(mv),
        };
        opening = false;

        let reply = match agent.decide_move(opponent_move.as_ref()) {
            Ok(mv) => mv,
            Err(AgentError::NoLegalMoves(player)) => {
                tracing::info!("{} has no legal moves, game over", player);
                break;
            }
            Err(e) => return Err(e).context("Harness turn failed"),
        };

        writeln!(output, "{}", reply).context("Failed to write reply")?;
        output.flush().context("Failed to flush reply")?;
    }

    if let Some(player) = agent.player() {
        tracing::info!(
            "Session over: {} used {:.1}s",
            player,
            agent.time_used().as_secs_f64()
        );
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
