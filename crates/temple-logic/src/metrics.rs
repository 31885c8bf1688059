//! Read-only summary of a temple for reports.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::connectivity::connected_degree;
use crate::constants::{scoring, RoomType, Tier};
use crate::grid::{Coord, TempleState, TileKind};
use crate::heuristic::{is_goal_state, Goal};
use crate::rules::RoomRuleTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempleMetrics {
    pub room_count: usize,
    pub path_count: usize,
    /// Only types with at least one room appear.
    pub type_counts: BTreeMap<RoomType, u32>,
    pub tier3_count: u32,
    /// Room and path values plus the synergy bonus.
    pub total_value: u32,
    pub synergy_edges: u32,
    /// Connected cells with three or more connected neighbours.
    pub junctions: u32,
    /// Every connected cell has at most two connected neighbours.
    pub is_snake: bool,
    pub architect_reached: bool,
    pub exit_reached: bool,
    pub goal_met: bool,
}

impl TempleMetrics {
    pub fn from_state(state: &TempleState, rules: &RoomRuleTable, goal: &Goal) -> Self {
        let mut type_counts = BTreeMap::new();
        for room in state.rooms() {
            *type_counts.entry(room.room_type).or_insert(0) += 1;
        }

        let synergy_edges = count_synergy_edges(state, rules);
        let room_value: u32 = state
            .rooms()
            .map(|r| rules.room_value(r.room_type, r.tier))
            .sum();
        let path_value = state.path_count() as u32 * rules.value(TileKind::Path, Tier::One);

        let mut junctions = 0;
        let mut is_snake = true;
        for c in state.foyer_connected().iter() {
            let degree = connected_degree(state, rules, c);
            if degree >= 3 {
                junctions += 1;
            }
            if degree > 2 {
                is_snake = false;
            }
        }

        Self {
            room_count: state.room_count(),
            path_count: state.path_count(),
            type_counts,
            tier3_count: state.tier3_count(),
            total_value: room_value + path_value + synergy_edges * scoring::SYNERGY_BONUS,
            synergy_edges,
            junctions,
            is_snake,
            architect_reached: state.architect_reached(),
            exit_reached: state.exit_reached(),
            goal_met: is_goal_state(state, goal),
        }
    }
}

/// Unordered pairs of orthogonally adjacent rooms with synergy.
fn count_synergy_edges(state: &TempleState, rules: &RoomRuleTable) -> u32 {
    let mut edges = 0;
    for room in state.rooms() {
        let p = room.position;
        // Right and up only, so each pair is seen once.
        for n in [Coord::new(p.x + 1, p.y), Coord::new(p.x, p.y + 1)] {
            if let Some(other) = state.room_at(n) {
                if rules.triggers_synergy(room.room_type, other.room_type) {
                    edges += 1;
                }
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::update_connectivity;

    #[test]
    fn test_metrics_of_small_temple() {
        let rules = RoomRuleTable::standard();
        let mut state = TempleState::create_empty(Coord::new(5, 4)).unwrap();
        state.place_room(RoomType::Garrison, Tier::Three, Coord::new(5, 2));
        state.place_room(RoomType::Spymaster, Tier::One, Coord::new(4, 2));
        state.place_path(Coord::new(5, 3));
        update_connectivity(&mut state, &rules);

        let m = TempleMetrics::from_state(&state, &rules, &Goal::reach_architect());
        assert_eq!(m.room_count, 2);
        assert_eq!(m.path_count, 1);
        assert_eq!(m.type_counts[&RoomType::Spymaster], 1);
        assert_eq!(m.tier3_count, 1);
        assert_eq!(m.synergy_edges, 1);
        // Garrison T3 18 + Spymaster T1 20 + path 1 + one synergy edge.
        assert_eq!(m.total_value, 18 + 20 + 1 + 5);
        // The Garrison touches Foyer, Spymaster and path.
        assert_eq!(m.junctions, 1);
        assert!(!m.is_snake);
        assert!(m.architect_reached);
        assert!(!m.exit_reached);
        assert!(m.goal_met);
    }

    #[test]
    fn test_straight_corridor_is_a_snake() {
        let rules = RoomRuleTable::standard();
        let mut state = TempleState::create_empty(Coord::new(7, 4)).unwrap();
        for y in 2..=4 {
            state.place_path(Coord::new(5, y));
        }
        update_connectivity(&mut state, &rules);
        let m = TempleMetrics::from_state(&state, &rules, &Goal::reach_architect());
        assert!(m.is_snake);
        assert_eq!(m.junctions, 0);
        assert_eq!(m.synergy_edges, 0);
        assert!(!m.goal_met);
        assert!(m.type_counts.is_empty());
    }
}
