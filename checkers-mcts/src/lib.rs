//! Checkers MCTS - Monte Carlo Tree Search agent
//!
//! This crate provides a time-bounded MCTS player:
//! - Arena-allocated search tree with subtree re-rooting
//! - Tree policy (UCT)
//! - Greedy heuristic rollouts
//! - Backpropagation with per-node perspective
//! - A match session that reuses the tree across turns

pub mod tree;
pub mod rollout;
pub mod search;
pub mod agent;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use agent::{AgentError, Fallback, MctsAgent, TurnReport};
pub use rollout::{HeuristicPolicy, OutcomeScale, RolloutLimits, RolloutPolicy, RolloutResult, ScoringWeights, UniformPolicy};
pub use search::{run_search, SearchBudget, SearchStats, StopReason};
pub use tree::{Expansion, MctsNode, MctsTree, NodeId, NodeStats};

/// Accepted values of the UCT exploration constant
const EXPLORATION_RANGE: std::ops::RangeInclusive<f64> = 1.0..=2.0;

/// How the final move is picked among the root's children
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalSelection {
    /// Highest mean score, ties broken by visits
    #[default]
    MeanScore,
    /// Most visits, ties broken by mean score
    MostVisited,
}

/// Move choice during simulation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutKind {
    /// Greedy on [`ScoringWeights`]
    #[default]
    Heuristic,
    /// Uniformly random legal moves
    Uniform,
}

/// MCTS configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// UCT exploration constant
    pub exploration: f64,
    /// Iteration cap per move (None = time-bound only)
    pub iterations: Option<u32>,
    /// Upper bound on search time per move
    pub move_time_ms: u64,
    /// Wall-clock budget for the whole match
    pub match_time_ms: u64,
    /// Below this much remaining match time the agent stops searching
    pub safety_margin_ms: u64,
    /// Quiet plies after which a rollout is scored as a draw
    pub inactivity_limit: u16,
    /// Hard cap on rollout length
    pub max_rollout_plies: u32,
    /// Value of a draw for the searching player
    pub draw_value: f64,
    /// Value of a draw while in risk mode
    pub risk_draw_value: f64,
    /// Endgame starts once fewer than this fraction of the initial pieces remain
    pub endgame_fraction: f64,
    /// Largest number of live nodes the tree may hold
    pub max_nodes: usize,
    pub final_selection: FinalSelection,
    pub rollout: RolloutKind,
    /// Random seed for reproducibility (None = from entropy)
    pub seed: Option<u64>,
    pub scoring: ScoringWeights,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            exploration: 1.41, // sqrt(2)
            iterations: None,
            move_time_ms: 5_000,
            match_time_ms: 8 * 60 * 1000,
            safety_margin_ms: 2_000,
            inactivity_limit: 40,
            max_rollout_plies: 200,
            draw_value: 0.5,
            risk_draw_value: 0.2,
            endgame_fraction: 0.5,
            max_nodes: 2_000_000,
            final_selection: FinalSelection::MeanScore,
            rollout: RolloutKind::Heuristic,
            seed: None,
            scoring: ScoringWeights::default(),
        }
    }
}

impl MctsConfig {
    /// Iteration-bound configuration (no practical time limit per move)
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    pub fn with_move_time_ms(mut self, move_time_ms: u64) -> Self {
        self.move_time_ms = move_time_ms;
        self
    }

    pub fn with_match_time_ms(mut self, match_time_ms: u64) -> Self {
        self.match_time_ms = match_time_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_final_selection(mut self, selection: FinalSelection) -> Self {
        self.final_selection = selection;
        self
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: MctsConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = 0.0..=1.0;
        if !EXPLORATION_RANGE.contains(&self.exploration) {
            return Err(ConfigError::Invalid(format!(
                "exploration must be in [1, 2], got {}",
                self.exploration
            )));
        }
        for (name, value) in [
            ("draw_value", self.draw_value),
            ("risk_draw_value", self.risk_draw_value),
            ("endgame_fraction", self.endgame_fraction),
        ] {
            if !unit.contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::Invalid("iterations must be positive".to_string()));
        }
        if self.max_nodes < 2 {
            return Err(ConfigError::Invalid("max_nodes must allow at least one child".to_string()));
        }
        if self.inactivity_limit == 0 || self.max_rollout_plies == 0 {
            return Err(ConfigError::Invalid("rollout limits must be positive".to_string()));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = MctsConfig::default();
        assert!(config.validate().is_ok());
        assert!((1.0..=2.0).contains(&config.exploration));
        assert_eq!(config.inactivity_limit, 40);
        assert_eq!(config.final_selection, FinalSelection::MeanScore);
    }

    #[test]
    fn test_exploration_bounds() {
        for c in [1.0, 1.41, 2.0] {
            let config = MctsConfig { exploration: c, ..Default::default() };
            assert!(config.validate().is_ok(), "{c} rejected");
        }
        for c in [0.0, 0.99, 2.01, f64::NAN, f64::INFINITY] {
            let config = MctsConfig { exploration: c, ..Default::default() };
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))), "{c} accepted");
        }
    }

    #[test]
    fn test_builders() {
        let config = MctsConfig::default().with_iterations(500).with_seed(7);
        assert_eq!(config.iterations, Some(500));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "exploration": 2.0, "final_selection": "most_visited", "scoring": {{ "capture": 3.0 }} }}"#
        )
        .unwrap();

        let config = MctsConfig::load(file.path()).unwrap();
        assert_eq!(config.exploration, 2.0);
        assert_eq!(config.final_selection, FinalSelection::MostVisited);
        assert_eq!(config.scoring.capture, 3.0);
        // Untouched fields keep defaults
        assert_eq!(config.draw_value, 0.5);
        assert_eq!(config.scoring.promotion, ScoringWeights::default().promotion);
    }

    #[test]
    fn test_load_rejects_bad_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "draw_value": 1.5 }}"#).unwrap();
        assert!(matches!(MctsConfig::load(file.path()), Err(ConfigError::Invalid(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "exploration": 0.5 }}"#).unwrap();
        assert!(matches!(MctsConfig::load(file.path()), Err(ConfigError::Invalid(_))));

        let missing = Path::new("/nonexistent/mcts.json");
        assert!(matches!(MctsConfig::load(missing), Err(ConfigError::Io { .. })));
    }
}
