//! MCTS Tree structure and node management
//!
//! Uses arena allocation for efficient tree operations. Pruned nodes are
//! released immediately and their slots recycled through a free list, so
//! re-rooting costs O(#pruned) and never recurses.
//!
//! ## Architecture
//! - Level 2: Tree operations (select, expand, backpropagate, reroot)
//! - Level 3: UCT calculation, node accessors
//! - Level 4: Statistics, utilities

use checkers_core::{Board, GameResult, Move, Player};
use rand::Rng;

use crate::FinalSelection;

/// Added to child visits in the exploration term
const VISIT_EPSILON: f64 = 1e-6;

// ============================================================================
// TYPES
// ============================================================================

/// Node identifier (index into arena)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Statistics for a tree node
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStats {
    /// Number of simulations that passed through this node
    pub visits: u32,
    /// Accumulated reward, from the perspective of the player who chose
    /// this node (the parent's player to move; the root uses its own)
    pub score: f64,
}

impl NodeStats {
    /// Mean reward, 0 for unvisited nodes
    pub fn mean(&self) -> f64 {
        if self.visits == 0 {
            0.0
        } else {
            self.score / self.visits as f64
        }
    }
}

/// A node in the MCTS tree
#[derive(Clone, Debug)]
pub struct MctsNode {
    /// Board at this node
    pub board: Board,
    /// Parent node (None for root)
    pub parent: Option<NodeId>,
    /// Move that led to this node (None for root)
    pub incoming_move: Option<Move>,
    pub children: Vec<NodeId>,
    /// Side to move on `board`
    pub to_move: Player,
    pub stats: NodeStats,
    /// Set once the node is found to have no legal continuation
    pub terminal: Option<GameResult>,
    /// Moves not yet expanded; None until the legal moves are first listed
    pub untried_moves: Option<Vec<Move>>,
}

impl MctsNode {
    pub fn new(board: Board, parent: Option<NodeId>, incoming_move: Option<Move>, to_move: Player) -> Self {
        Self {
            board,
            parent,
            incoming_move,
            children: Vec::new(),
            to_move,
            stats: NodeStats::default(),
            terminal: None,
            untried_moves: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Terminal, or every legal move already has a child
    pub fn is_fully_expanded(&self) -> bool {
        self.is_terminal() || self.untried_moves.as_ref().is_some_and(|m| m.is_empty())
    }
}

/// Outcome of one expansion attempt
#[derive(Clone, Debug, PartialEq)]
pub enum Expansion {
    /// A new child was created
    Child(NodeId),
    /// The node is decided; nothing to simulate
    Terminal(GameResult),
    /// No untried move left
    Exhausted,
}

// ============================================================================
// MCTS TREE (Level 2 - Tree Operations)
// ============================================================================

/// MCTS search tree with arena allocation
#[derive(Debug)]
pub struct MctsTree {
    /// Arena storage; freed slots hold None
    nodes: Vec<Option<MctsNode>>,
    free: Vec<NodeId>,
    root: NodeId,
    live: usize,
}

impl MctsTree {
    /// Create a single-node tree for `board` with `to_move` to play
    pub fn new(board: Board, to_move: Player) -> Self {
        Self {
            nodes: vec![Some(MctsNode::new(board, None, None, to_move))],
            free: Vec::new(),
            root: NodeId(0),
            live: 1,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The player the search is run for
    pub fn root_player(&self) -> Player {
        self.get(self.root).to_move
    }

    /// Get a reference to a node.
    ///
    /// Panics if `id` was freed.
    pub fn get(&self, id: NodeId) -> &MctsNode {
        match self.nodes.get(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale node id {:?}", id),
        }
    }

    /// Get a mutable reference to a node.
    ///
    /// Panics if `id` was freed.
    pub fn get_mut(&mut self, id: NodeId) -> &mut MctsNode {
        match self.nodes.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("stale node id {:?}", id),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.nodes.get(id.0), Some(Some(_)))
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn alloc(&mut self, node: MctsNode) -> NodeId {
        self.live += 1;
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = Some(node);
                id
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Append the child reached by `mv`; the child has the other side to move
    pub fn add_child(&mut self, parent: NodeId, mv: Move) -> NodeId {
        let parent_node = self.get(parent);
        let to_move = parent_node.to_move;
        let board = parent_node.board.successor(&mv, to_move);

        let child = self.alloc(MctsNode::new(board, Some(parent), Some(mv), to_move.opponent()));
        self.get_mut(parent).children.push(child);
        child
    }

    /// Child of `parent` reached by `mv`
    pub fn find_child(&self, parent: NodeId, mv: &Move) -> Option<NodeId> {
        self.get(parent)
            .children
            .iter()
            .copied()
            .find(|&child| self.get(child).incoming_move.as_ref() == Some(mv))
    }

    // ========================================================================
    // Level 2: Selection
    // ========================================================================

    /// Walk from the root to a frontier node (terminal or not fully expanded)
    pub fn select_leaf(&self, exploration: f64) -> NodeId {
        let mut current = self.root;

        loop {
            let node = self.get(current);
            if node.children.is_empty() || !node.is_fully_expanded() {
                return current;
            }
            match self.select_best_child(current, exploration) {
                Some(best) => current = best,
                None => return current,
            }
        }
    }

    // ========================================================================
    // Level 2: Expansion
    // ========================================================================

    /// Expand `id` by one untried move, or report why it cannot be.
    ///
    /// The legal moves are listed on the first call only. A node whose board
    /// is decided becomes terminal and never gains children.
    pub fn expand<R: Rng>(&mut self, id: NodeId, rng: &mut R) -> Expansion {
        let node = self.get(id);
        if let Some(result) = node.terminal {
            return Expansion::Terminal(result);
        }

        if node.untried_moves.is_none() {
            let result = node.board.result(node.to_move);
            if result.is_over() {
                let node = self.get_mut(id);
                node.terminal = Some(result);
                node.untried_moves = Some(Vec::new());
                return Expansion::Terminal(result);
            }
            let moves = node.board.legal_moves_flat(node.to_move);
            self.get_mut(id).untried_moves = Some(moves);
        }

        let mv = match self.get_mut(id).untried_moves.as_mut() {
            Some(untried) if !untried.is_empty() => {
                let idx = rng.gen_range(0..untried.len());
                untried.swap_remove(idx)
            }
            _ => return Expansion::Exhausted,
        };

        Expansion::Child(self.add_child(id, mv))
    }

    // ========================================================================
    // Level 3: Selection Helpers
    // ========================================================================

    /// Select best child using UCT; the first maximal child wins ties
    fn select_best_child(&self, node_id: NodeId, exploration: f64) -> Option<NodeId> {
        let node = self.get(node_id);
        let parent_visits = node.stats.visits;

        let mut best: Option<(NodeId, f64)> = None;
        for &child in &node.children {
            let value = self.uct(child, parent_visits, exploration);
            if best.map_or(true, |(_, best_value)| value > best_value) {
                best = Some((child, value));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Calculate UCT value for a node
    ///
    /// UCT = mean + C * sqrt(ln(parent_visits) / (visits + eps))
    fn uct(&self, node_id: NodeId, parent_visits: u32, exploration: f64) -> f64 {
        let stats = &self.get(node_id).stats;

        if stats.visits == 0 {
            return f64::INFINITY; // Prioritize unexplored nodes
        }

        let parent_visits = parent_visits.max(1) as f64;
        let exploration_term =
            exploration * (parent_visits.ln() / (stats.visits as f64 + VISIT_EPSILON)).sqrt();

        stats.mean() + exploration_term
    }

    // ========================================================================
    // Level 2: Backpropagation
    // ========================================================================

    /// Backpropagate a result from `leaf` to the root.
    ///
    /// `outcome` is in [0, 1] from the root player's point of view. Each
    /// node is credited from the perspective of the player who chose it:
    /// the outcome itself when that is the root player, `1 - outcome`
    /// otherwise.
    pub fn backpropagate(&mut self, leaf: NodeId, outcome: f64) {
        let root_player = self.root_player();
        let mut current = Some(leaf);

        while let Some(node_id) = current {
            let parent = self.get(node_id).parent;
            let chooser = match parent {
                Some(parent_id) => self.get(parent_id).to_move,
                None => self.get(node_id).to_move,
            };
            let reward = if chooser == root_player {
                outcome
            } else {
                1.0 - outcome
            };

            let node = self.get_mut(node_id);
            node.stats.visits += 1;
            node.stats.score += reward;
            current = parent;
        }
    }

    // ========================================================================
    // Level 2: Re-rooting
    // ========================================================================

    /// Promote the root's child reached by `mv` to be the new root and free
    /// everything else.
    ///
    /// Returns None (dropping the whole tree) when no child matches; the
    /// caller then starts a fresh tree at the current board.
    pub fn reroot(mut self, mv: &Move) -> Option<Self> {
        let old_root = self.root;
        let new_root = self.find_child(old_root, mv)?;

        self.get_mut(old_root).children.retain(|&child| child != new_root);
        self.get_mut(new_root).parent = None;
        self.free_subtree(old_root);
        self.root = new_root;

        Some(self)
    }

    /// Release `id` and all its descendants
    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
                stack.extend(node.children);
                self.free.push(id);
                self.live -= 1;
            }
        }
    }

    // ========================================================================
    // Level 3: Best Move Selection
    // ========================================================================

    /// Best child of the root, or None if the root was never expanded
    pub fn best_child(&self, selection: FinalSelection) -> Option<NodeId> {
        let root = self.get(self.root);

        let mut best: Option<(NodeId, f64, u32)> = None;
        for &child in &root.children {
            let stats = &self.get(child).stats;
            let mean = if stats.visits > 0 {
                stats.mean()
            } else {
                f64::NEG_INFINITY
            };

            let better = match best {
                None => true,
                Some((_, best_mean, best_visits)) => match selection {
                    FinalSelection::MeanScore => {
                        mean > best_mean || (mean == best_mean && stats.visits > best_visits)
                    }
                    FinalSelection::MostVisited => {
                        stats.visits > best_visits || (stats.visits == best_visits && mean > best_mean)
                    }
                },
            };
            if better {
                best = Some((child, mean, stats.visits));
            }
        }

        best.map(|(id, _, _)| id)
    }

    /// Best move from the root
    pub fn best_move(&self, selection: FinalSelection) -> Option<Move> {
        self.best_child(selection)
            .and_then(|id| self.get(id).incoming_move.clone())
    }

    /// All root moves with their visit counts and mean scores (for analysis)
    pub fn move_statistics(&self) -> Vec<(Move, u32, f64)> {
        self.get(self.root)
            .children
            .iter()
            .filter_map(|&id| {
                let node = self.get(id);
                node.incoming_move
                    .clone()
                    .map(|mv| (mv, node.stats.visits, node.stats.mean()))
            })
            .collect()
    }

    /// Total simulations run through the root
    pub fn total_simulations(&self) -> u32 {
        self.get(self.root).stats.visits
    }

    /// Nodes of the subtree under `id`, pre-order
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(id).children.iter().rev());
        }
        order
    }
}

// ============================================================================
// TESTS
// ============================================================================
