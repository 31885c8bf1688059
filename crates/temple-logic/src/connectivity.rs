//! Connectivity and cycle detection over a `TempleState`.
//!
//! Traversals only cross an edge when both endpoints are occupied *and* the
//! rule table lets their kinds connect. Occupancy alone is not enough.
//! The derived sets on the state are always rebuilt from scratch.

use std::collections::VecDeque;

use crate::constants::{CELL_COUNT, FOYER_POS};
use crate::grid::{CellSet, Coord, TempleState};
use crate::rules::RoomRuleTable;

/// Whether the occupants of two adjacent cells are rule-connectable.
pub fn cells_connect(state: &TempleState, rules: &RoomRuleTable, a: Coord, b: Coord) -> bool {
    match (state.tile_kind(a), state.tile_kind(b)) {
        (Some(ka), Some(kb)) => rules.can_connect(ka, kb),
        _ => false,
    }
}

/// Rule-respecting BFS from `root`. Returns the visited set and BFS parents.
fn rule_bfs(
    state: &TempleState,
    rules: &RoomRuleTable,
    root: Coord,
) -> (CellSet, [Option<Coord>; CELL_COUNT]) {
    let mut visited = CellSet::new();
    let mut parents = [None; CELL_COUNT];
    if !state.is_occupied(root) {
        return (visited, parents);
    }

    let mut queue = VecDeque::new();
    visited.insert(root);
    queue.push_back(root);

    while let Some(current) = queue.pop_front() {
        for next in current.neighbors() {
            if visited.contains(next) || !cells_connect(state, rules, current, next) {
                continue;
            }
            visited.insert(next);
            parents[next.index()] = Some(current);
            queue.push_back(next);
        }
    }

    (visited, parents)
}

/// Recompute both derived connectivity sets and the BFS parent chain.
///
/// The Architect-connected set is only populated when the Architect is
/// itself reachable from the Foyer.
pub fn update_connectivity(state: &mut TempleState, rules: &RoomRuleTable) {
    let (foyer_set, parents) = rule_bfs(state, rules, FOYER_POS);
    let architect = state.architect();
    let architect_set = if foyer_set.contains(architect) {
        rule_bfs(state, rules, architect).0
    } else {
        CellSet::new()
    };
    state.set_connectivity(foyer_set, parents, architect_set);
}

/// Parent-tracking BFS from the Foyer. Any connected, already-visited
/// neighbour that is not the current cell's parent closes a cycle.
pub fn has_loop(state: &TempleState, rules: &RoomRuleTable) -> bool {
    let mut visited = CellSet::new();
    let mut parents = [None; CELL_COUNT];
    let mut queue = VecDeque::new();
    visited.insert(FOYER_POS);
    queue.push_back(FOYER_POS);

    while let Some(current) = queue.pop_front() {
        let parent: Option<Coord> = parents[current.index()];
        for next in current.neighbors() {
            if !cells_connect(state, rules, current, next) {
                continue;
            }
            if visited.contains(next) {
                if Some(next) != parent {
                    return true;
                }
                continue;
            }
            visited.insert(next);
            parents[next.index()] = Some(current);
            queue.push_back(next);
        }
    }
    false
}

/// Whether occupying `candidate` would close a cycle.
///
/// With fewer than two occupied neighbours no cycle is possible. Otherwise
/// the candidate closes one exactly when two of its neighbours are already
/// joined by occupied cells that avoid the candidate.
pub fn would_create_loop(state: &TempleState, candidate: Coord) -> bool {
    let neighbors: Vec<Coord> = state.occupied_neighbors(candidate).collect();
    if neighbors.len() < 2 {
        return false;
    }

    let mut seen = CellSet::new();
    for &start in &neighbors {
        if seen.contains(start) {
            // Already flooded from an earlier neighbour that did not reach
            // any other neighbour, so this one cannot either.
            continue;
        }
        let component = occupied_flood(state, start, candidate);
        if neighbors
            .iter()
            .any(|&other| other != start && component.contains(other))
        {
            return true;
        }
        for c in component.iter() {
            seen.insert(c);
        }
    }
    false
}

/// All occupied cells reachable from `start` without stepping on `excluded`.
fn occupied_flood(state: &TempleState, start: Coord, excluded: Coord) -> CellSet {
    let mut visited = CellSet::new();
    let mut queue = VecDeque::new();
    visited.insert(start);
    queue.push_back(start);
    while let Some(current) = queue.pop_front() {
        for next in state.occupied_neighbors(current) {
            if next == excluded || visited.contains(next) {
                continue;
            }
            visited.insert(next);
            queue.push_back(next);
        }
    }
    visited
}

/// Branch endpoints of the Foyer-rooted structure: connected cells with no
/// unvisited connected neighbour when the BFS reaches them.
pub fn chain_tips(state: &TempleState, rules: &RoomRuleTable) -> Vec<Coord> {
    let mut tips = Vec::new();
    let mut visited = CellSet::new();
    let mut queue = VecDeque::new();
    visited.insert(FOYER_POS);
    queue.push_back(FOYER_POS);

    while let Some(current) = queue.pop_front() {
        let mut expanded = false;
        for next in current.neighbors() {
            if visited.contains(next) || !cells_connect(state, rules, current, next) {
                continue;
            }
            visited.insert(next);
            queue.push_back(next);
            expanded = true;
        }
        if !expanded {
            tips.push(current);
        }
    }
    tips
}

/// Number of rule-connected occupied neighbours of `c`.
pub fn connected_degree(state: &TempleState, rules: &RoomRuleTable, c: Coord) -> usize {
    c.neighbors()
        .filter(|&n| cells_connect(state, rules, c, n))
        .count()
}

/// Cells from `c` back to the Foyer along the recorded BFS parents,
/// `c` first. Empty when `c` is not Foyer-connected.
pub fn path_to_foyer(state: &TempleState, c: Coord) -> Vec<Coord> {
    if !state.foyer_connected().contains(c) {
        return Vec::new();
    }
    let mut chain = vec![c];
    let mut current = c;
    while let Some(parent) = state.parent_of(current) {
        chain.push(parent);
        current = parent;
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RoomType, Tier, EXIT_POS};
    use crate::grid::TileKind;

    fn fresh(architect: Coord) -> (TempleState, RoomRuleTable) {
        let rules = RoomRuleTable::standard();
        let mut state = TempleState::create_empty(architect).unwrap();
        update_connectivity(&mut state, &rules);
        (state, rules)
    }

    #[test]
    fn test_empty_state_only_foyer_connected() {
        let (state, _) = fresh(Coord::new(7, 4));
        assert_eq!(state.foyer_connected().len(), 1);
        assert!(state.foyer_connected().contains(FOYER_POS));
        assert!(state.architect_connected().is_empty());
    }

    #[test]
    fn test_paths_extend_connectivity() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        state.place_path(Coord::new(5, 2));
        state.place_path(Coord::new(5, 3));
        update_connectivity(&mut state, &rules);
        assert!(state.foyer_connected().contains(Coord::new(5, 3)));
        assert_eq!(state.parent_of(Coord::new(5, 3)), Some(Coord::new(5, 2)));
        assert_eq!(
            path_to_foyer(&state, Coord::new(5, 3)),
            vec![Coord::new(5, 3), Coord::new(5, 2), FOYER_POS]
        );
    }

    #[test]
    fn test_occupancy_alone_does_not_connect() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        // Spymaster next to the Foyer: occupied, but not rule-connectable.
        state.place_room(RoomType::Spymaster, Tier::One, Coord::new(5, 2));
        update_connectivity(&mut state, &rules);
        assert!(!state.foyer_connected().contains(Coord::new(5, 2)));
    }

    #[test]
    fn test_architect_set_populated_once_reached() {
        let (mut state, rules) = fresh(Coord::new(5, 3));
        state.place_path(Coord::new(5, 2));
        update_connectivity(&mut state, &rules);
        assert!(state.architect_reached());
        assert!(state.architect_connected().contains(FOYER_POS));
        assert!(!state.exit_reached());
    }

    #[test]
    fn test_would_create_loop_square() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        for c in [Coord::new(5, 2), Coord::new(6, 2), Coord::new(6, 1)] {
            state.place_path(c);
        }
        update_connectivity(&mut state, &rules);
        assert!(!would_create_loop(&state, Coord::new(4, 1)));

        state.place_path(Coord::new(4, 2));
        update_connectivity(&mut state, &rules);
        assert!(would_create_loop(&state, Coord::new(4, 1)));
    }

    #[test]
    fn test_has_loop_detects_square() {
        let rules = RoomRuleTable::standard();
        let mut tree = TempleState::create_empty(Coord::new(7, 4)).unwrap();
        tree.place_path(Coord::new(5, 2));
        tree.place_path(Coord::new(6, 2));
        assert!(!has_loop(&tree, &rules));

        // Foyer-(5,2)-(6,2)-(6,1)-Foyer closes a square.
        tree.place_path(Coord::new(6, 1));
        assert!(has_loop(&tree, &rules));
    }

    #[test]
    fn test_has_loop_on_closed_square() {
        let rules = RoomRuleTable::standard();
        let mut state = TempleState::create_empty(Coord::new(7, 4)).unwrap();
        for c in [Coord::new(5, 2), Coord::new(4, 2), Coord::new(4, 1)] {
            state.place_path(c);
        }
        assert!(has_loop(&state, &rules));
    }

    #[test]
    fn test_chain_tips() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        assert_eq!(chain_tips(&state, &rules), vec![FOYER_POS]);

        state.place_path(Coord::new(5, 2));
        state.place_path(Coord::new(4, 2));
        state.place_path(Coord::new(6, 2));
        let tips = chain_tips(&state, &rules);
        assert_eq!(tips.len(), 2);
        assert!(tips.contains(&Coord::new(4, 2)));
        assert!(tips.contains(&Coord::new(6, 2)));
    }

    #[test]
    fn test_connected_degree_respects_rules() {
        let (mut state, rules) = fresh(Coord::new(7, 4));
        state.place_room(RoomType::Garrison, Tier::One, Coord::new(5, 2));
        state.place_room(RoomType::Spymaster, Tier::One, Coord::new(5, 3));
        state.place_room(RoomType::Smithy, Tier::One, Coord::new(4, 2));
        assert_eq!(connected_degree(&state, &rules, Coord::new(5, 2)), 3);
        assert_eq!(connected_degree(&state, &rules, Coord::new(5, 3)), 1);
        assert_eq!(state.tile_kind(EXIT_POS), Some(TileKind::Exit));
    }
}
