//! Goals, the search heuristic, and the best-so-far score.
//!
//! The heuristic estimates how many placements remain. Its estimators are
//! approximations, not proven lower bounds, so a result found with it is not
//! guaranteed optimal. The progress score is a separate ranking used only to
//! pick the best partial result when a search runs out of budget.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::connectivity::cells_connect;
use crate::constants::{defaults, scoring, RoomType, EXIT_POS, FOYER_POS};
use crate::grid::{Coord, TempleState};
use crate::rules::RoomRuleTable;

/// What a finished temple must satisfy. Every active predicate must hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Goal {
    /// The Architect must be connected to the Foyer.
    pub reach_architect: bool,
    /// The Exit must be connected through the Architect.
    pub reach_exit: bool,
    /// Minimum number of rooms per type.
    pub min_counts: BTreeMap<RoomType, u32>,
    /// Require `min_spymasters` Spymasters and `min_corruption_chambers`
    /// Corruption Chambers together.
    pub best_configuration: bool,
    pub min_spymasters: u32,
    pub min_corruption_chambers: u32,
}

impl Default for Goal {
    fn default() -> Self {
        Self {
            reach_architect: true,
            reach_exit: false,
            min_counts: BTreeMap::new(),
            best_configuration: false,
            min_spymasters: defaults::MIN_SPYMASTERS,
            min_corruption_chambers: defaults::MIN_CORRUPTION_CHAMBERS,
        }
    }
}

impl Goal {
    /// Connect the Architect, nothing else.
    pub fn reach_architect() -> Self {
        Self::default()
    }

    /// No predicates at all; add some with the builder methods.
    pub fn none() -> Self {
        Self {
            reach_architect: false,
            ..Self::default()
        }
    }

    pub fn reach_exit() -> Self {
        Self {
            reach_exit: true,
            ..Self::default()
        }
    }

    /// The composite Spymaster + Corruption Chamber target at the stock
    /// minimums, with the Architect connected. Same as deserializing
    /// `{"best_configuration": true}`.
    pub fn best_configuration() -> Self {
        Self {
            best_configuration: true,
            ..Self::default()
        }
    }

    pub fn with_min_count(mut self, room_type: RoomType, count: u32) -> Self {
        self.min_counts.insert(room_type, count);
        self
    }

    pub fn with_best_configuration(mut self, spymasters: u32, corruption_chambers: u32) -> Self {
        self.best_configuration = true;
        self.min_spymasters = spymasters;
        self.min_corruption_chambers = corruption_chambers;
        self
    }

    /// All active count targets. Where the composite target and an explicit
    /// minimum name the same type, the larger wins.
    pub fn count_targets(&self) -> BTreeMap<RoomType, u32> {
        let mut targets = self.min_counts.clone();
        if self.best_configuration {
            for (rt, n) in [
                (RoomType::Spymaster, self.min_spymasters),
                (RoomType::CorruptionChamber, self.min_corruption_chambers),
            ] {
                let entry = targets.entry(rt).or_insert(0);
                *entry = (*entry).max(n);
            }
        }
        targets.retain(|_, n| *n > 0);
        targets
    }
}

/// Whether `state` satisfies every active predicate of `goal`.
pub fn is_goal_state(state: &TempleState, goal: &Goal) -> bool {
    if goal.reach_architect && !state.architect_reached() {
        return false;
    }
    if goal.reach_exit && !state.exit_reached() {
        return false;
    }
    goal.count_targets()
        .iter()
        .all(|(&rt, &target)| state.count_of(rt) >= target)
}

/// Estimated placements still needed to reach `goal`.
///
/// Distances are measured from the nearest growth cell: a Foyer-connected
/// cell with a free side, other than an Architect that already has all the
/// neighbours it may have. Sums, where active:
/// - while the Architect is unreached, the distance to the nearest cell a
///   connection can still come in through. That is the Architect itself,
///   or once its sides are used up, the free cells next to the neighbours
///   it connects to;
/// - while the Exit is unreached, the distance to the Exit;
/// - the unit-cost-weighted deficit of every count target.
pub fn evaluate_heuristic(
    state: &TempleState,
    goal: &Goal,
    rules: &RoomRuleTable,
    architect_max_neighbors: usize,
) -> f64 {
    let mut h = 0.0;
    let reach_pending = (goal.reach_architect || goal.reach_exit) && !state.architect_reached();
    let exit_pending = goal.reach_exit && !state.exit_reached();

    if reach_pending || exit_pending {
        let sources = growth_cells(state, architect_max_neighbors);
        if reach_pending {
            let entries = architect_entries(state, rules, architect_max_neighbors);
            h += nearest_distance(&sources, &entries) as f64;
        }
        if exit_pending {
            h += nearest_distance(&sources, &[EXIT_POS]) as f64;
        }
    }

    for (rt, target) in goal.count_targets() {
        let deficit = target.saturating_sub(state.count_of(rt));
        h += deficit as f64 * rules.unit_cost(rt);
    }

    h
}

fn architect_saturated(state: &TempleState, architect_max_neighbors: usize) -> bool {
    state.occupied_neighbors(state.architect()).count() >= architect_max_neighbors
}

fn growth_cells(state: &TempleState, architect_max_neighbors: usize) -> Vec<Coord> {
    let architect = state.architect();
    let saturated = architect_saturated(state, architect_max_neighbors);
    let cells: Vec<Coord> = state
        .foyer_connected()
        .iter()
        .filter(|&c| !(saturated && c == architect))
        .filter(|&c| c.neighbors().any(|n| state.is_empty(n)))
        .collect();
    if cells.is_empty() {
        vec![FOYER_POS]
    } else {
        cells
    }
}

/// Cells whose placement would connect the Architect.
fn architect_entries(state: &TempleState, rules: &RoomRuleTable, architect_max_neighbors: usize) -> Vec<Coord> {
    let architect = state.architect();
    if !architect_saturated(state, architect_max_neighbors) {
        return vec![architect];
    }
    let entries: Vec<Coord> = state
        .occupied_neighbors(architect)
        .filter(|&n| cells_connect(state, rules, architect, n))
        .flat_map(|n| n.neighbors())
        .filter(|&c| state.is_empty(c) && c.manhattan(architect) != 1)
        .collect();
    if entries.is_empty() {
        vec![architect]
    } else {
        entries
    }
}

fn nearest_distance(sources: &[Coord], targets: &[Coord]) -> u32 {
    sources
        .iter()
        .flat_map(|s| targets.iter().map(move |t| s.manhattan(*t)))
        .min()
        .unwrap_or(0)
}

/// Best-so-far ranking for partial results. Higher is better.
pub fn progress_score(state: &TempleState) -> i64 {
    let mut score = state.room_count() as i64 * scoring::ROOM_WEIGHT
        + state.count_of(RoomType::Spymaster) as i64 * scoring::SPYMASTER_WEIGHT
        + state.count_of(RoomType::CorruptionChamber) as i64 * scoring::CORRUPTION_WEIGHT
        + state.tier3_count() as i64 * scoring::TIER3_WEIGHT;
    if state.architect_reached() {
        score += scoring::ARCHITECT_REACHED_BONUS;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::update_connectivity;
    use crate::constants::Tier;

    fn fresh(architect: Coord) -> (TempleState, RoomRuleTable) {
        let rules = RoomRuleTable::standard();
        let mut state = TempleState::create_empty(architect).unwrap();
        update_connectivity(&mut state, &rules);
        (state, rules)
    }

    fn fill(state: &mut TempleState, room_type: RoomType, n: usize) {
        let free: Vec<Coord> = (1..=9)
            .flat_map(|y| (1..=9).map(move |x| Coord::new(x, y)))
            .filter(|&c| state.is_empty(c))
            .take(n)
            .collect();
        for c in free {
            state.place_room(room_type, Tier::One, c);
        }
    }

    #[test]
    fn test_reach_architect_heuristic_is_tip_distance() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        let goal = Goal::reach_architect();
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 5.0);

        state.place_path(Coord::new(6, 1));
        update_connectivity(&mut state, &rules);
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 4.0);
        assert!(!is_goal_state(&state, &goal));
    }

    #[test]
    fn test_reached_architect_zeroes_distance_term() {
        let (mut state, rules) = fresh(Coord::new(5, 3));
        state.place_path(Coord::new(5, 2));
        update_connectivity(&mut state, &rules);
        let goal = Goal::reach_architect();
        assert!(is_goal_state(&state, &goal));
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 0.0);

        // The Architect's only side is taken, so the Exit is measured from
        // (5,2), not from the Architect.
        let goal = Goal::reach_exit();
        assert!(!is_goal_state(&state, &goal));
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 7.0);
    }

    #[test]
    fn test_exit_distance_after_reaching_architect_keeps_falling() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        let goal = Goal::reach_exit();
        // Foyer (5,1) to Architect (7,4) plus Foyer to Exit (5,9).
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 5.0 + 8.0);

        for c in [Coord::new(5, 2), Coord::new(5, 3), Coord::new(5, 4), Coord::new(6, 4)] {
            state.place_path(c);
        }
        update_connectivity(&mut state, &rules);
        assert!(state.architect_reached());
        assert!(!is_goal_state(&state, &goal));
        // Measured from (5,4), the nearest cell that can still grow.
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 5.0);

        for y in 5..=8 {
            state.place_path(Coord::new(5, y));
        }
        update_connectivity(&mut state, &rules);
        assert!(is_goal_state(&state, &goal));
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 0.0);
    }

    #[test]
    fn test_blocked_architect_is_approached_through_its_neighbor() {
        // The Exit takes the Architect's only side; the way in is through
        // the free cells next to the Exit.
        let (state, rules) = fresh(Coord::new(5, 8));
        let goal = Goal::reach_architect();
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 9.0);
        // With a second side allowed the Architect itself is the target.
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 2), 7.0);
    }

    #[test]
    fn test_count_deficit_uses_unit_cost() {
        let (state, rules) = fresh(Coord::new(7, 4));
        let goal = Goal::none()
            .with_min_count(RoomType::Spymaster, 2)
            .with_min_count(RoomType::Garrison, 3);
        assert_eq!(evaluate_heuristic(&state, &goal, &rules, 1), 2.0 * 2.0 + 3.0);
    }

    #[test]
    fn test_composite_goal_needs_both_counts() {
        let (mut state, _) = fresh(Coord::new(7, 4));
        let goal = Goal {
            reach_architect: false,
            ..Goal::best_configuration()
        };
        // Goal checks counts only; placement legality is irrelevant here.
        fill(&mut state, RoomType::Spymaster, 8);
        fill(&mut state, RoomType::CorruptionChamber, 5);
        assert!(!is_goal_state(&state, &goal));
        fill(&mut state, RoomType::CorruptionChamber, 1);
        assert!(is_goal_state(&state, &goal));
    }

    #[test]
    fn test_count_targets_take_the_larger_minimum() {
        let goal = Goal::best_configuration().with_min_count(RoomType::Spymaster, 10);
        let targets = goal.count_targets();
        assert_eq!(targets[&RoomType::Spymaster], 10);
        assert_eq!(targets[&RoomType::CorruptionChamber], 6);

        let goal = Goal::none().with_best_configuration(3, 0);
        assert_eq!(goal.count_targets().len(), 1);
    }

    #[test]
    fn test_goal_deserializes_with_defaults() {
        let goal: Goal = serde_json::from_str(r#"{"best_configuration": true}"#).unwrap();
        assert!(goal.reach_architect);
        assert_eq!(goal.min_spymasters, 8);
        assert_eq!(goal.min_corruption_chambers, 6);
        assert_eq!(goal, Goal::best_configuration());
    }

    #[test]
    fn test_progress_score_weights() {
        let (mut state, rules) = fresh(Coord::new(5, 4));
        assert_eq!(progress_score(&state), 0);
        state.place_room(RoomType::Garrison, Tier::Three, Coord::new(5, 2));
        state.place_room(RoomType::Spymaster, Tier::One, Coord::new(4, 2));
        state.place_path(Coord::new(5, 3));
        update_connectivity(&mut state, &rules);
        assert!(state.architect_reached());
        // 2 rooms, 1 Spymaster, 1 tier-3, architect reached.
        assert_eq!(progress_score(&state), 20 + 40 + 5 + 100);
    }
}
