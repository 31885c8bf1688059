//! Candidate placement generation and ordering.
//!
//! Candidates come from the frontier: empty cells orthogonally adjacent to
//! the Foyer-connected structure. The work per state therefore grows with
//! the structure, not the grid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::constants::{RoomType, Tier};
use crate::grid::{CellSet, Coord, Placement, PlacementAction, TempleState};
use crate::rules::RoomRuleTable;
use crate::validation::ConstraintValidator;

/// How many of something may be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stock {
    Unlimited,
    Limited(u32),
}

impl Stock {
    /// Remaining after `used` placements. `None` means unlimited.
    pub fn remaining(self, used: u32) -> Option<u32> {
        match self {
            Stock::Unlimited => None,
            Stock::Limited(limit) => Some(limit.saturating_sub(used)),
        }
    }

    fn allows(self, used: u32) -> bool {
        self.remaining(used).map_or(true, |left| left > 0)
    }
}

/// Which rooms, tiers and paths the search may place.
///
/// Stock is a total limit per (type, tier). What is left is derived from the
/// state being expanded, so search nodes carry no pool bookkeeping. A type
/// missing from `rooms` is not available at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub rooms: BTreeMap<RoomType, [Stock; 3]>,
    pub paths: Stock,
}

impl Default for ResourcePool {
    fn default() -> Self {
        Self::unlimited()
    }
}

impl ResourcePool {
    /// Every room type at every tier, and paths, without limit.
    pub fn unlimited() -> Self {
        let rooms = RoomType::all()
            .iter()
            .map(|&rt| (rt, [Stock::Unlimited; 3]))
            .collect();
        Self {
            rooms,
            paths: Stock::Unlimited,
        }
    }

    /// Every room type, unlimited, at one tier only.
    pub fn single_tier(tier: Tier) -> Self {
        let mut stocks = [Stock::Limited(0); 3];
        stocks[tier.index()] = Stock::Unlimited;
        let rooms = RoomType::all().iter().map(|&rt| (rt, stocks)).collect();
        Self {
            rooms,
            paths: Stock::Unlimited,
        }
    }

    /// No rooms; paths as given. Add rooms with [`ResourcePool::with_room`].
    pub fn empty(paths: Stock) -> Self {
        Self {
            rooms: BTreeMap::new(),
            paths,
        }
    }

    pub fn with_room(mut self, room_type: RoomType, tier: Tier, stock: Stock) -> Self {
        self.rooms.entry(room_type).or_insert([Stock::Limited(0); 3])[tier.index()] = stock;
        self
    }

    pub fn with_paths(mut self, paths: Stock) -> Self {
        self.paths = paths;
        self
    }

    pub fn room_stock(&self, room_type: RoomType, tier: Tier) -> Stock {
        self.rooms
            .get(&room_type)
            .map_or(Stock::Limited(0), |stocks| stocks[tier.index()])
    }

    /// Whether one more `room_type` at `tier` may go into `state`.
    pub fn has_room(&self, state: &TempleState, room_type: RoomType, tier: Tier) -> bool {
        self.room_stock(room_type, tier)
            .allows(state.count_of_tier(room_type, tier))
    }

    pub fn has_path(&self, state: &TempleState) -> bool {
        self.paths.allows(state.path_count() as u32)
    }
}

/// Empty cells next to the Foyer-connected set, row-major.
pub fn candidate_cells(state: &TempleState) -> Vec<Coord> {
    let frontier: CellSet = state
        .foyer_connected()
        .iter()
        .flat_map(|c| c.neighbors())
        .filter(|&n| state.is_empty(n))
        .collect();
    frontier.iter().collect()
}

/// Every legal placement the pool allows in `state`.
pub fn generate_actions(
    state: &TempleState,
    validator: &ConstraintValidator<'_>,
    pool: &ResourcePool,
) -> Vec<PlacementAction> {
    let mut actions = Vec::new();
    for coord in candidate_cells(state) {
        for &room_type in RoomType::all() {
            for &tier in Tier::all() {
                if !pool.has_room(state, room_type, tier) {
                    continue;
                }
                let action = PlacementAction::room(room_type, tier, coord);
                if validator.is_valid(state, &action) {
                    actions.push(action);
                }
            }
        }
        if pool.has_path(state) {
            let action = PlacementAction::path(coord);
            if validator.is_valid(state, &action) {
                actions.push(action);
            }
        }
    }
    actions
}

/// Legal Path placements only.
///
/// A Path connects to every kind and triggers no room rule, so wherever a
/// room could go a Path could too. When a goal counts no rooms, these are
/// the only placements worth branching on.
pub fn generate_path_actions(
    state: &TempleState,
    validator: &ConstraintValidator<'_>,
    pool: &ResourcePool,
) -> Vec<PlacementAction> {
    if !pool.has_path(state) {
        return Vec::new();
    }
    candidate_cells(state)
        .into_iter()
        .map(PlacementAction::path)
        .filter(|action| validator.is_valid(state, action))
        .collect()
}

/// Stable sort: rooms before paths, then higher value priority, then
/// higher tier. Only affects search order and tie-breaks.
pub fn prioritize_actions(actions: &mut [PlacementAction], rules: &RoomRuleTable) {
    actions.sort_by_key(|action| match action.placement {
        Placement::Room { room_type, tier } => {
            (0u8, u8::MAX - rules.value_priority(room_type), 3 - tier as u8)
        }
        Placement::Path => (1, 0, 0),
    });
}
