//! Best-first (A*) temple search.
//!
//! Each expanded node owns its own `TempleState`; no two branches share
//! mutable data. Queued children are only a parent pointer plus one
//! placement, and are built into a full state when popped. Nodes keep an
//! `Rc` to their parent to recover the placement sequence at the end.
//!
//! The open queue is bounded by `max_open_nodes`: when an expansion leaves
//! it longer, the least promising half is dropped.
//!
//! The search is single-threaded and deterministic. Equal-priority nodes are
//! popped in insertion order. It stops on the first goal state, or when the
//! iteration or wall-clock budget runs out, in which case the best partial
//! state seen so far is returned with `found = false`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::actions::{generate_actions, generate_path_actions, prioritize_actions, ResourcePool, Stock};
use crate::connectivity::update_connectivity;
use crate::constants::{defaults, GRID_SIZE};
use crate::grid::{PlacementAction, StateKey, TempleState};
use crate::heuristic::{evaluate_heuristic, is_goal_state, progress_score, Goal};
use crate::rules::RoomRuleTable;
use crate::validation::ConstraintValidator;

/// Search budgets and switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Maximum number of nodes popped from the open queue.
    pub max_iterations: usize,
    pub time_limit_ms: u64,
    /// Also prune states whose left-right mirror image was already expanded.
    /// Only applies when the starting layout is itself left-right symmetric.
    pub use_symmetry: bool,
    pub architect_max_neighbors: usize,
    /// A success within this many iterations is labelled `likely_optimal`.
    pub optimal_node_threshold: usize,
    pub max_open_nodes: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_iterations: defaults::MAX_ITERATIONS,
            time_limit_ms: defaults::TIME_LIMIT_MS,
            use_symmetry: true,
            architect_max_neighbors: defaults::ARCHITECT_MAX_NEIGHBORS,
            optimal_node_threshold: defaults::OPTIMAL_NODE_THRESHOLD,
            max_open_nodes: defaults::MAX_OPEN_NODES,
        }
    }
}

/// Why the search loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Goal,
    IterationBudget,
    TimeBudget,
    /// The open queue ran dry: no reachable state satisfies the goal.
    Exhausted,
}

impl StopReason {
    pub fn name(self) -> &'static str {
        match self {
            StopReason::Goal => "goal reached",
            StopReason::IterationBudget => "iteration budget",
            StopReason::TimeBudget => "time budget",
            StopReason::Exhausted => "search space exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub iterations: usize,
    pub generated: usize,
    pub closed: usize,
    pub symmetry_prunes: usize,
    /// Queued children discarded by open-queue trimming.
    pub dropped: usize,
    /// Longest the open queue got between expansions.
    pub peak_open: usize,
    pub elapsed_ms: u64,
    pub stop_reason: StopReason,
}

/// Result of a search. Budget exhaustion is a normal outcome, not an error.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub found: bool,
    /// Found within `optimal_node_threshold` iterations. The heuristic is
    /// not admissible, so this is a hint, never a proof.
    pub likely_optimal: bool,
    /// Placements from the initial state to `final_state`, in order.
    pub actions: Vec<PlacementAction>,
    /// The goal state, or the best partial state when `found` is false.
    pub final_state: TempleState,
    /// Best-so-far score of `final_state`.
    pub score: i64,
    pub stats: SearchStats,
}

/// One node of the search tree.
#[derive(Debug)]
pub struct SearchNode {
    pub state: TempleState,
    /// Placements made since the initial state.
    pub g: u32,
    pub h: f64,
    pub parent: Option<Rc<SearchNode>>,
    /// The placement that produced this node from its parent.
    pub action: Option<PlacementAction>,
}

impl SearchNode {
    pub fn f(&self) -> f64 {
        self.g as f64 + self.h
    }
}

/// Placements from the root down to `node`, root side first.
pub fn extract_action_path(node: &SearchNode) -> Vec<PlacementAction> {
    let mut actions = Vec::with_capacity(node.g as usize);
    if let Some(action) = node.action {
        actions.push(action);
    }
    let mut current = node.parent.as_deref();
    while let Some(n) = current {
        if let Some(action) = n.action {
            actions.push(action);
        }
        current = n.parent.as_deref();
    }
    actions.reverse();
    actions
}

/// What a queue entry will become once popped.
enum Pending {
    Root(Box<TempleState>),
    Child {
        parent: Rc<SearchNode>,
        action: PlacementAction,
    },
}

impl Pending {
    fn key(&self) -> StateKey {
        match self {
            Pending::Root(state) => state.canonical_key(),
            Pending::Child { parent, action } => parent.state.key_after(action),
        }
    }
}

/// Open-queue entry. `BinaryHeap` is a max-heap, so the ordering is
/// reversed: lowest f first, then lowest h (deeper nodes on f ties), then
/// earliest insertion.
struct QueueEntry {
    f: f64,
    h: f64,
    seq: u64,
    g: u32,
    pending: Pending,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A* over placement sequences. Borrows the rule table for its lifetime.
pub struct SearchEngine<'a> {
    rules: &'a RoomRuleTable,
    options: SearchOptions,
}

impl<'a> SearchEngine<'a> {
    pub fn new(rules: &'a RoomRuleTable, options: SearchOptions) -> Self {
        Self { rules, options }
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Search from `initial` for a state satisfying `goal`, placing only
    /// what `pool` allows.
    pub fn search(&self, initial: TempleState, goal: &Goal, pool: &ResourcePool) -> SearchOutcome {
        let start = Instant::now();
        let time_limit = Duration::from_millis(self.options.time_limit_ms);
        let validator =
            ConstraintValidator::with_architect_limit(self.rules, self.options.architect_max_neighbors);

        let mut initial = initial;
        update_connectivity(&mut initial, self.rules);
        // Mirror pruning is only sound when the starting layout is its own
        // mirror image, which needs the Architect on the central column.
        let symmetric = self.options.use_symmetry
            && initial.architect().x == (GRID_SIZE + 1) / 2
            && initial.canonical_key() == initial.mirrored_key();

        log::debug!(
            "search started: architect {}, goal {:?}, budget {} iterations / {} ms",
            initial.architect(),
            goal,
            self.options.max_iterations,
            self.options.time_limit_ms
        );

        let max_neighbors = self.options.architect_max_neighbors;
        // Paths do everything rooms do for connection, so a goal that counts
        // no rooms only branches on Paths while they are unlimited.
        let paths_only = goal.count_targets().is_empty() && pool.paths == Stock::Unlimited;

        let root_state = initial.clone();
        let h = evaluate_heuristic(&initial, goal, self.rules, max_neighbors);
        let mut open = BinaryHeap::new();
        let mut seq = 0u64;
        // Every path to a given state has the same length, since g counts
        // placements. The first time a state is queued is therefore as good
        // as any later time.
        let mut queued: HashSet<StateKey> = HashSet::new();
        let mut closed: HashSet<StateKey> = HashSet::new();
        queued.insert(initial.canonical_key());
        open.push(QueueEntry {
            f: h,
            h,
            seq,
            g: 0,
            pending: Pending::Root(Box::new(initial)),
        });

        let mut best: Option<(Rc<SearchNode>, i64)> = None;
        let mut iterations = 0;
        let mut generated = 0;
        let mut symmetry_prunes = 0;
        let mut dropped = 0;
        let mut peak_open = open.len();

        let (stop_reason, terminal) = loop {
            if iterations >= self.options.max_iterations {
                log::debug!("search stopped: iteration budget of {} spent", iterations);
                break (StopReason::IterationBudget, None);
            }
            if start.elapsed() >= time_limit {
                log::debug!(
                    "search stopped: time budget of {} ms spent after {} iterations",
                    self.options.time_limit_ms,
                    iterations
                );
                break (StopReason::TimeBudget, None);
            }
            let Some(entry) = open.pop() else {
                break (StopReason::Exhausted, None);
            };
            iterations += 1;
            let node = self.materialize(entry);

            if is_goal_state(&node.state, goal) {
                break (StopReason::Goal, Some(node));
            }

            let key = node.state.canonical_key();
            if closed.contains(&key) {
                continue;
            }
            if symmetric && closed.contains(&node.state.mirrored_key()) {
                symmetry_prunes += 1;
                continue;
            }
            closed.insert(key);

            let score = progress_score(&node.state);
            if best.as_ref().map_or(true, |(_, best_score)| score > *best_score) {
                best = Some((Rc::clone(&node), score));
            }

            let mut actions = if paths_only {
                generate_path_actions(&node.state, &validator, pool)
            } else {
                generate_actions(&node.state, &validator, pool)
            };
            prioritize_actions(&mut actions, self.rules);
            log::trace!(
                "expand g={} h={:.1} with {} actions",
                node.g,
                node.h,
                actions.len()
            );

            for action in actions {
                if !queued.insert(node.state.key_after(&action)) {
                    continue;
                }
                let mut child = node.state.clone();
                child.apply(&action);
                update_connectivity(&mut child, self.rules);
                let h = evaluate_heuristic(&child, goal, self.rules, max_neighbors);
                let g = node.g + 1;
                seq += 1;
                generated += 1;
                open.push(QueueEntry {
                    f: g as f64 + h,
                    h,
                    seq,
                    g,
                    pending: Pending::Child {
                        parent: Rc::clone(&node),
                        action,
                    },
                });
            }

            if open.len() > self.options.max_open_nodes {
                let keep = (self.options.max_open_nodes / 2).max(1);
                let removed = trim_open(&mut open, &mut queued, keep);
                log::debug!("open queue trimmed: {} entries dropped, {} kept", removed, open.len());
                dropped += removed;
            }
            peak_open = peak_open.max(open.len());
        };

        let stats = SearchStats {
            iterations,
            generated,
            closed: closed.len(),
            symmetry_prunes,
            dropped,
            peak_open,
            elapsed_ms: start.elapsed().as_millis() as u64,
            stop_reason,
        };

        let outcome = match (terminal, best) {
            (Some(node), _) => SearchOutcome {
                found: true,
                likely_optimal: iterations <= self.options.optimal_node_threshold,
                actions: extract_action_path(&node),
                score: progress_score(&node.state),
                final_state: node.state.clone(),
                stats,
            },
            (None, Some((node, score))) => SearchOutcome {
                found: false,
                likely_optimal: false,
                actions: extract_action_path(&node),
                score,
                final_state: node.state.clone(),
                stats,
            },
            // Stopped before the root was expanded.
            (None, None) => SearchOutcome {
                found: false,
                likely_optimal: false,
                actions: Vec::new(),
                score: progress_score(&root_state),
                final_state: root_state,
                stats,
            },
        };

        log::info!(
            "search {}: {} placements, score {}, {} iterations, {} generated, {} ms ({})",
            if outcome.found { "succeeded" } else { "gave up" },
            outcome.actions.len(),
            outcome.score,
            outcome.stats.iterations,
            outcome.stats.generated,
            outcome.stats.elapsed_ms,
            outcome.stats.stop_reason.name()
        );
        outcome
    }

    /// Build the node a popped entry stands for.
    fn materialize(&self, entry: QueueEntry) -> Rc<SearchNode> {
        match entry.pending {
            Pending::Root(state) => Rc::new(SearchNode {
                state: *state,
                g: 0,
                h: entry.h,
                parent: None,
                action: None,
            }),
            Pending::Child { parent, action } => {
                let mut state = parent.state.clone();
                state.apply(&action);
                update_connectivity(&mut state, self.rules);
                Rc::new(SearchNode {
                    state,
                    g: entry.g,
                    h: entry.h,
                    parent: Some(parent),
                    action: Some(action),
                })
            }
        }
    }
}

/// Keep the `keep` most promising entries and return how many were dropped.
/// Dropped states leave `queued` so a later expansion may queue them again.
fn trim_open(open: &mut BinaryHeap<QueueEntry>, queued: &mut HashSet<StateKey>, keep: usize) -> usize {
    // Ascending by priority: least promising first.
    let mut entries = std::mem::take(open).into_sorted_vec();
    let dropped = entries.len().saturating_sub(keep);
    for entry in entries.drain(..dropped) {
        queued.remove(&entry.pending.key());
    }
    *open = BinaryHeap::from(entries);
    dropped
}
