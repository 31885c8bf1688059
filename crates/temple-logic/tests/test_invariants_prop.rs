//! Property tests over random sequences of validated placements.
//!
//! Invariants covered:
//! - A state built only from validated placements never contains a loop.
//! - The Foyer-connected set equals rule-respecting reachability from the
//!   Foyer, computed independently here.
//! - The Architect never has more occupied neighbours than allowed.
//! - Cloning yields an equal, independent state.

use std::collections::VecDeque;

use proptest::prelude::*;
use temple_logic::actions::{generate_actions, ResourcePool};
use temple_logic::connectivity::{has_loop, update_connectivity};
use temple_logic::constants::{EXIT_POS, FOYER_POS, GRID_SIZE};
use temple_logic::grid::{CellSet, Coord, TempleState};
use temple_logic::rules::RoomRuleTable;
use temple_logic::validation::ConstraintValidator;

/// Plain BFS over occupied cells whose kinds can connect.
fn reference_reachable(state: &TempleState, rules: &RoomRuleTable) -> CellSet {
    let mut seen = CellSet::new();
    let mut queue = VecDeque::from([FOYER_POS]);
    seen.insert(FOYER_POS);
    while let Some(c) = queue.pop_front() {
        for n in c.neighbors() {
            if seen.contains(n) {
                continue;
            }
            let (Some(a), Some(b)) = (state.tile_kind(c), state.tile_kind(n)) else {
                continue;
            };
            if rules.can_connect(a, b) {
                seen.insert(n);
                queue.push_back(n);
            }
        }
    }
    seen
}

fn architect_strategy() -> impl Strategy<Value = Coord> {
    (1..=GRID_SIZE, 1..=GRID_SIZE)
        .prop_map(|(x, y)| Coord::new(x, y))
        .prop_filter("architect on a fixed cell", |c| *c != FOYER_POS && *c != EXIT_POS)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn validated_placements_keep_invariants(
        architect in architect_strategy(),
        choices in prop::collection::vec(any::<u16>(), 1..40),
        max_neighbors in 1usize..=2,
    ) {
        let rules = RoomRuleTable::standard();
        let validator = ConstraintValidator::with_architect_limit(&rules, max_neighbors);
        let pool = ResourcePool::unlimited();
        let mut state = TempleState::create_empty(architect).unwrap();
        update_connectivity(&mut state, &rules);

        for choice in choices {
            let actions = generate_actions(&state, &validator, &pool);
            if actions.is_empty() {
                break;
            }
            let action = actions[choice as usize % actions.len()];
            prop_assert!(validator.is_valid(&state, &action));

            let before = state.clone();
            state.apply(&action);
            update_connectivity(&mut state, &rules);

            prop_assert!(!has_loop(&state, &rules));
            prop_assert_eq!(*state.foyer_connected(), reference_reachable(&state, &rules));
            prop_assert!(state.occupied_neighbors(architect).count() <= max_neighbors);
            prop_assert!(state.foyer_connected().contains(action.coord));

            // The snapshot taken before the placement is untouched.
            prop_assert!(before.is_empty(action.coord));
            prop_assert_eq!(before.path_count() + before.room_count() + 1,
                state.path_count() + state.room_count());
        }

        let copy = state.clone();
        prop_assert_eq!(copy.canonical_key(), state.canonical_key());
        prop_assert_eq!(copy.foyer_connected(), state.foyer_connected());
        prop_assert_eq!(copy.architect_connected(), state.architect_connected());
    }
}
