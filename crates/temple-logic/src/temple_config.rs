//! Temple input configuration.
//!
//! A temple to solve is described by where the Architect stands, what has
//! already been built, what the finished temple must achieve, and what the
//! search may place. This module holds that data model, its validation, and
//! the conversion into a searchable [`TempleState`].
//!
//! # Flow
//!
//! 1. Deserialize a `TempleConfig` (or start from `Default`)
//! 2. `validate_config` lists every input problem at once
//! 3. `build_state` turns a valid config into a connected `TempleState`
//! 4. `solve` runs the search; `diagnose` explains likely failures
//!
//! ```
//! use temple_logic::temple_config::{validate_config, TempleConfig};
//!
//! let config = TempleConfig::from_json(r#"{ "architect": { "x": 7, "y": 4 } }"#).unwrap();
//! assert!(validate_config(&config).is_empty());
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::{ResourcePool, Stock};
use crate::connectivity::update_connectivity;
use crate::constants::{RoomType, Tier, EXIT_POS, FOYER_POS, PLACEABLE_CELLS};
use crate::error::{TempleError, TempleResult};
use crate::grid::{Coord, TempleState};
use crate::heuristic::Goal;
use crate::rules::{RoomRuleTable, TierValues};
use crate::search::{SearchEngine, SearchOptions, SearchOutcome};

/// A room that already exists in the temple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingRoom {
    #[serde(rename = "type")]
    pub room_type: RoomType,
    /// 1, 2 or 3. Kept raw so bad input is reported, not rejected by serde.
    #[serde(default = "default_tier")]
    pub tier: u8,
    pub x: i32,
    pub y: i32,
}

impl ExistingRoom {
    pub fn position(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

fn default_tier() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingPath {
    pub x: i32,
    pub y: i32,
}

impl ExistingPath {
    pub fn position(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// Everything needed to set up and run one temple search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TempleConfig {
    pub architect: Coord,
    pub rooms: Vec<ExistingRoom>,
    pub paths: Vec<ExistingPath>,
    /// Mark every existing room and path as locked in the built state.
    pub lock_existing: bool,
    pub goal: Goal,
    pub pool: ResourcePool,
    pub options: SearchOptions,
    /// Per-type value overrides, `[T1, T2, T3]`.
    pub room_values: BTreeMap<RoomType, TierValues>,
}

impl Default for TempleConfig {
    fn default() -> Self {
        Self {
            architect: Coord::new(7, 4),
            rooms: Vec::new(),
            paths: Vec::new(),
            lock_existing: false,
            goal: Goal::default(),
            pool: ResourcePool::unlimited(),
            options: SearchOptions::default(),
            room_values: BTreeMap::new(),
        }
    }
}

impl TempleConfig {
    pub fn from_json(json: &str) -> TempleResult<Self> {
        serde_json::from_str(json).map_err(|e| TempleError::Config(e.to_string()))
    }

    /// The stock rule table with this config's value overrides applied.
    pub fn rule_table(&self) -> RoomRuleTable {
        RoomRuleTable::with_values(&self.room_values)
    }

    fn occupied_positions(&self) -> impl Iterator<Item = Coord> + '_ {
        self.rooms
            .iter()
            .map(ExistingRoom::position)
            .chain(self.paths.iter().map(ExistingPath::position))
    }
}

/// Input problems found by [`validate_config`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("architect cannot stand on fixed cell {0}")]
    ArchitectOnFixedCell(Coord),
    #[error("{0} is outside the grid")]
    OutOfBounds(Coord),
    #[error("more than one entity at {0}")]
    Overlap(Coord),
    #[error("invalid tier {0}")]
    InvalidTier(u8),
    #[error("{count} existing {} rooms, at most one allowed", .room_type.name())]
    DuplicateUnique { room_type: RoomType, count: u32 },
    #[error("minimum counts need {required} rooms but only {available} cells are free")]
    TargetsExceedGrid { required: u32, available: usize },
}

impl From<ConfigError> for TempleError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::ArchitectOnFixedCell(c) => TempleError::ArchitectOnFixedCell(c),
            ConfigError::OutOfBounds(c) => TempleError::OutOfBounds(c),
            ConfigError::Overlap(c) => TempleError::CellOccupied(c),
            ConfigError::InvalidTier(t) => TempleError::InvalidTier(t),
            other => TempleError::Config(other.to_string()),
        }
    }
}

/// Every problem with `config`. Empty means `build_state` will succeed.
pub fn validate_config(config: &TempleConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();
    let rules = RoomRuleTable::standard();

    let architect = config.architect;
    if !architect.in_bounds() {
        errors.push(ConfigError::OutOfBounds(architect));
    } else if architect == FOYER_POS || architect == EXIT_POS {
        errors.push(ConfigError::ArchitectOnFixedCell(architect));
    }

    let mut taken: HashSet<Coord> = [FOYER_POS, EXIT_POS, architect].into_iter().collect();
    for c in config.occupied_positions() {
        if !c.in_bounds() {
            errors.push(ConfigError::OutOfBounds(c));
        } else if !taken.insert(c) {
            errors.push(ConfigError::Overlap(c));
        }
    }

    for room in &config.rooms {
        if Tier::from_u8(room.tier).is_none() {
            errors.push(ConfigError::InvalidTier(room.tier));
        }
    }

    for &rt in RoomType::all() {
        if !rules.is_unique(rt) {
            continue;
        }
        let count = config.rooms.iter().filter(|r| r.room_type == rt).count() as u32;
        if count > 1 {
            errors.push(ConfigError::DuplicateUnique { room_type: rt, count });
        }
    }

    let required: u32 = config.goal.count_targets().values().sum();
    if required as usize > PLACEABLE_CELLS {
        errors.push(ConfigError::TargetsExceedGrid {
            required,
            available: PLACEABLE_CELLS,
        });
    }

    errors
}

/// Build the starting state, with connectivity computed. Fails on the first
/// problem `validate_config` would report.
pub fn build_state(config: &TempleConfig, rules: &RoomRuleTable) -> TempleResult<TempleState> {
    if let Some(err) = validate_config(config).into_iter().next() {
        return Err(err.into());
    }

    let mut state = TempleState::create_empty(config.architect)?;
    for room in &config.rooms {
        let tier = Tier::from_u8(room.tier).ok_or(TempleError::InvalidTier(room.tier))?;
        let id = state
            .place_room(room.room_type, tier, room.position())
            .ok_or(TempleError::OutOfBounds(room.position()))?;
        if config.lock_existing {
            state.lock(id);
        }
    }
    for path in &config.paths {
        let id = state
            .place_path(path.position())
            .ok_or(TempleError::OutOfBounds(path.position()))?;
        if config.lock_existing {
            state.lock(id);
        }
    }
    update_connectivity(&mut state, rules);
    Ok(state)
}

/// Validate, build and search in one step.
pub fn solve(config: &TempleConfig) -> TempleResult<SearchOutcome> {
    let rules = config.rule_table();
    let state = build_state(config, &rules)?;
    let engine = SearchEngine::new(&rules, config.options.clone());
    Ok(engine.search(state, &config.goal, &config.pool))
}

/// Human-readable hints about why a config may be hard or impossible to
/// solve. Never blocks anything; purely advisory.
pub fn diagnose(config: &TempleConfig) -> Vec<String> {
    let mut hints = Vec::new();
    let rules = RoomRuleTable::standard();
    let architect = config.architect;

    if config.pool.paths == Stock::Limited(0) {
        hints.push("no paths may be placed: every connection has to be made through rooms".to_string());
        let generator_wanted = config.goal.count_targets().contains_key(&RoomType::Generator);
        let generator_stocked = Tier::all()
            .iter()
            .any(|&t| config.pool.room_stock(RoomType::Generator, t) != Stock::Limited(0));
        if generator_wanted || generator_stocked {
            hints.push(
                "a Generator must touch a Path, so none can be placed while paths are disabled".to_string(),
            );
        }
    }

    // Distance from the Architect to the nearest thing it could attach to.
    let nearest = config
        .occupied_positions()
        .chain(std::iter::once(FOYER_POS))
        .min_by_key(|&c| c.manhattan(architect));
    if let Some(nearest) = nearest {
        let needed = nearest.manhattan(architect).saturating_sub(1);
        match config.pool.paths {
            Stock::Limited(max) if needed > max && config.pool.rooms.is_empty() => {
                hints.push(format!(
                    "architect at {} is {} cells from {}: {} placements needed to connect, but only {} paths allowed",
                    architect,
                    needed + 1,
                    nearest,
                    needed,
                    max
                ));
            }
            _ if needed > 0 => {
                hints.push(format!(
                    "architect at {} needs at least {} placements to connect to {}",
                    architect, needed, nearest
                ));
            }
            _ => {}
        }
    }

    let mut existing: BTreeMap<RoomType, u32> = BTreeMap::new();
    for room in &config.rooms {
        *existing.entry(room.room_type).or_insert(0) += 1;
    }

    // Requirement pressure against the cells still free.
    let free = PLACEABLE_CELLS.saturating_sub(config.rooms.len() + config.paths.len());
    let mut pressure = 0.0;
    for (rt, target) in config.goal.count_targets() {
        let have = existing.get(&rt).copied().unwrap_or(0);
        let missing = target.saturating_sub(have);
        if missing > 0 && config.lock_existing {
            hints.push(format!(
                "existing rooms have {} {}, need {}: {} more must be added",
                have,
                rt.name(),
                target,
                missing
            ));
        }
        pressure += missing as f64 * rules.unit_cost(rt);
    }
    if pressure > free as f64 {
        hints.push(format!(
            "minimum counts need roughly {:.0} cells including enabling rooms, but only {} are free",
            pressure, free
        ));
    }

    for (&rt, &count) in &existing {
        if rules.is_unique(rt) && count > 1 {
            hints.push(format!("{} existing {} rooms, only one is allowed", count, rt.name()));
        }
    }

    let by_position: BTreeMap<Coord, RoomType> = config
        .rooms
        .iter()
        .map(|r| (r.position(), r.room_type))
        .collect();
    for (&pos, &rt) in &by_position {
        // Right and up only, so each pair is reported once.
        for n in [Coord::new(pos.x + 1, pos.y), Coord::new(pos.x, pos.y + 1)] {
            if by_position.get(&n) == Some(&rt) && rules.forbids_self_adjacency(rt) {
                hints.push(format!("{} at {} is next to another at {}", rt.name(), pos, n));
            }
        }
    }

    hints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(room_type: RoomType, tier: u8, x: i32, y: i32) -> ExistingRoom {
        ExistingRoom {
            room_type,
            tier,
            x,
            y,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TempleConfig::default()).is_empty());
    }

    #[test]
    fn test_architect_on_fixed_cell() {
        let config = TempleConfig {
            architect: FOYER_POS,
            ..TempleConfig::default()
        };
        assert!(validate_config(&config).contains(&ConfigError::ArchitectOnFixedCell(FOYER_POS)));
        assert_eq!(
            build_state(&config, &RoomRuleTable::standard()),
            Err(TempleError::ArchitectOnFixedCell(FOYER_POS))
        );
    }

    #[test]
    fn test_reports_every_problem() {
        let config = TempleConfig {
            rooms: vec![
                room(RoomType::Garrison, 4, 5, 2),
                room(RoomType::SacrificialChamber, 1, 5, 2),
                room(RoomType::SacrificialChamber, 1, 0, 3),
            ],
            paths: vec![ExistingPath { x: 5, y: 9 }],
            goal: Goal::none().with_min_count(RoomType::Smithy, 80),
            ..TempleConfig::default()
        };
        let errors = validate_config(&config);
        assert!(errors.contains(&ConfigError::InvalidTier(4)));
        assert!(errors.contains(&ConfigError::Overlap(Coord::new(5, 2))));
        assert!(errors.contains(&ConfigError::OutOfBounds(Coord::new(0, 3))));
        assert!(errors.contains(&ConfigError::Overlap(EXIT_POS)));
        assert!(errors.contains(&ConfigError::DuplicateUnique {
            room_type: RoomType::SacrificialChamber,
            count: 2
        }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::TargetsExceedGrid { required: 80, .. })));
    }

    #[test]
    fn test_build_state_places_and_connects() {
        let config = TempleConfig {
            architect: Coord::new(5, 4),
            rooms: vec![room(RoomType::Garrison, 2, 5, 2)],
            paths: vec![ExistingPath { x: 5, y: 3 }],
            lock_existing: true,
            ..TempleConfig::default()
        };
        let state = build_state(&config, &config.rule_table()).unwrap();
        assert_eq!(state.room_count(), 1);
        assert_eq!(state.path_count(), 1);
        // Existing paths are locked along with the rooms.
        assert_eq!(state.locked_ids().len(), 2);
        assert!(state.architect_reached());
    }

    #[test]
    fn test_from_json_with_defaults_and_overrides() {
        let json = r#"{
            "architect": { "x": 3, "y": 6 },
            "rooms": [ { "type": "SMITHY", "tier": 3, "x": 5, "y": 2 } ],
            "goal": { "reach_architect": false, "min_counts": { "SPYMASTER": 2 } },
            "options": { "max_iterations": 500 },
            "room_values": { "SMITHY": [1, 2, 3] }
        }"#;
        let config = TempleConfig::from_json(json).unwrap();
        assert_eq!(config.architect, Coord::new(3, 6));
        assert_eq!(config.rooms[0].room_type, RoomType::Smithy);
        assert_eq!(config.goal.min_counts[&RoomType::Spymaster], 2);
        assert_eq!(config.options.max_iterations, 500);
        assert_eq!(config.options.time_limit_ms, 5_000);
        assert_eq!(config.pool, ResourcePool::unlimited());
        assert_eq!(config.rule_table().room_value(RoomType::Smithy, Tier::Three), 3);
    }

    #[test]
    fn test_from_json_reports_parse_errors() {
        assert!(matches!(
            TempleConfig::from_json("{ not json"),
            Err(TempleError::Config(_))
        ));
    }

    #[test]
    fn test_diagnose_hints() {
        let config = TempleConfig {
            architect: Coord::new(2, 8),
            rooms: vec![
                room(RoomType::Smithy, 1, 5, 2),
                room(RoomType::Smithy, 1, 5, 3),
            ],
            pool: ResourcePool::unlimited().with_paths(Stock::Limited(0)),
            goal: Goal::best_configuration(),
            lock_existing: true,
            ..TempleConfig::default()
        };
        let hints = diagnose(&config);
        assert!(hints.iter().any(|h| h.starts_with("no paths")));
        assert!(hints.iter().any(|h| h.starts_with("a Generator must touch a Path")));
        assert!(hints.iter().any(|h| h.contains("architect at (2,8)")));
        assert!(hints.iter().any(|h| h.contains("Smithy at (5,2) is next to another at (5,3)")));
        assert!(hints.iter().any(|h| h.contains("0 Spymaster, need 8")));
    }

    #[test]
    fn test_diagnose_skips_generator_hint_without_generators() {
        let config = TempleConfig {
            pool: ResourcePool::empty(Stock::Limited(0)).with_room(
                RoomType::Garrison,
                Tier::One,
                Stock::Unlimited,
            ),
            ..TempleConfig::default()
        };
        let hints = diagnose(&config);
        assert!(hints.iter().any(|h| h.starts_with("no paths")));
        assert!(!hints.iter().any(|h| h.contains("Generator")));
    }

    #[test]
    fn test_solve_runs_search() {
        let config = TempleConfig::default();
        let outcome = solve(&config).unwrap();
        assert!(outcome.found);
        assert!(outcome.final_state.architect_reached());
    }
}
