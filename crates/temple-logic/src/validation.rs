//! Placement legality.
//!
//! Combines the rule table with connectivity analysis. Failures are data:
//! a caller can validate many candidates cheaply and show every reason at
//! once. Nothing here returns `Err` or panics.
//!
//! Check order:
//! 1. on the grid, 2. cell empty, 3. touches the Foyer-connected structure
//!    (each of these short-circuits), then, accumulating:
//! 4. every occupied neighbour is connectable,
//! 5. special rules (unique types, ancestor block, self-adjacency,
//!    adjacency limits, banned chains, required Path neighbour),
//! 6. the Architect's neighbour limit,
//! 7. no cycle.

use thiserror::Error;

use crate::connectivity::{cells_connect, path_to_foyer, would_create_loop};
use crate::constants::{defaults, RoomType};
use crate::grid::{Coord, PlacementAction, TempleState, TileKind};
use crate::rules::RoomRuleTable;

/// A single reason a placement was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("{0} is outside the grid")]
    OutOfBounds(Coord),
    #[error("{0} is already occupied")]
    CellOccupied(Coord),
    #[error("{0} does not touch the structure connected to the Foyer")]
    Disconnected(Coord),
    #[error("{candidate} cannot connect to {neighbor} at {at}")]
    Incompatible {
        candidate: TileKind,
        neighbor: TileKind,
        at: Coord,
    },
    #[error("{0} has no compatible neighbour")]
    NoCompatibleNeighbor(TileKind),
    #[error("only one {} is allowed", .0.name())]
    UniqueExceeded(RoomType),
    #[error("{} cannot be placed below the {} at {at}", .blocked.name(), .blocker.name())]
    AncestorBlocked {
        blocked: RoomType,
        blocker: RoomType,
        at: Coord,
    },
    #[error("{} cannot be adjacent to another {} at {}", .0.name(), .0.name(), .1)]
    SelfAdjacent(RoomType, Coord),
    #[error("{} at {at} already has {limit} adjacent {}", .room_type.name(), .neighbor_type.name())]
    AdjacencyLimit {
        room_type: RoomType,
        neighbor_type: RoomType,
        limit: u32,
        at: Coord,
    },
    #[error("{} - {} - {} chain is not allowed at {at}", .first.name(), .middle.name(), .last.name())]
    ChainBanned {
        first: RoomType,
        middle: RoomType,
        last: RoomType,
        /// The middle room of the chain.
        at: Coord,
    },
    #[error("{} must touch a Path", .0.name())]
    NeedsPathNeighbor(RoomType),
    #[error("architect would have {count} connections (maximum {max})")]
    ArchitectOverloaded { count: usize, max: usize },
    #[error("placing at {0} would create a loop")]
    CreatesLoop(Coord),
}

/// Outcome of validating one placement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationResult {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }

    fn rejected(violation: Violation) -> Self {
        Self::from_violations(vec![violation])
    }
}

/// Placement legality checker. Borrows the rule table.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintValidator<'a> {
    rules: &'a RoomRuleTable,
    architect_max_neighbors: usize,
}

impl<'a> ConstraintValidator<'a> {
    pub fn new(rules: &'a RoomRuleTable) -> Self {
        Self::with_architect_limit(rules, defaults::ARCHITECT_MAX_NEIGHBORS)
    }

    pub fn with_architect_limit(rules: &'a RoomRuleTable, architect_max_neighbors: usize) -> Self {
        Self {
            rules,
            architect_max_neighbors,
        }
    }

    pub fn rules(&self) -> &'a RoomRuleTable {
        self.rules
    }

    pub fn architect_max_neighbors(&self) -> usize {
        self.architect_max_neighbors
    }

    /// Check whether `action` may be applied to `state`.
    ///
    /// Expects the state's connectivity to be current.
    pub fn validate_placement(&self, state: &TempleState, action: &PlacementAction) -> ValidationResult {
        let at = action.coord;
        let kind = action.placement.kind();

        // ── Structural checks (short-circuit) ──
        if !at.in_bounds() {
            return ValidationResult::rejected(Violation::OutOfBounds(at));
        }
        if !state.is_empty(at) {
            return ValidationResult::rejected(Violation::CellOccupied(at));
        }
        if !at.neighbors().any(|n| state.foyer_connected().contains(n)) {
            return ValidationResult::rejected(Violation::Disconnected(at));
        }

        // ── Rule checks (accumulate) ──
        let mut violations = Vec::new();
        self.check_neighbors(state, at, kind, &mut violations);
        if let TileKind::Room(room_type) = kind {
            self.check_special_rules(state, at, room_type, &mut violations);
        }
        self.check_architect_limit(state, at, &mut violations);
        if would_create_loop(state, at) {
            violations.push(Violation::CreatesLoop(at));
        }

        ValidationResult::from_violations(violations)
    }

    /// Shorthand for `validate_placement(..).valid`.
    pub fn is_valid(&self, state: &TempleState, action: &PlacementAction) -> bool {
        self.validate_placement(state, action).valid
    }

    fn check_neighbors(
        &self,
        state: &TempleState,
        at: Coord,
        kind: TileKind,
        violations: &mut Vec<Violation>,
    ) {
        let mut occupied = 0;
        let mut compatible = 0;
        for n in at.neighbors() {
            let Some(neighbor) = state.tile_kind(n) else {
                continue;
            };
            occupied += 1;
            if self.rules.can_connect(kind, neighbor) {
                compatible += 1;
            } else {
                violations.push(Violation::Incompatible {
                    candidate: kind,
                    neighbor,
                    at: n,
                });
            }
        }
        if occupied > 0 && compatible == 0 {
            violations.push(Violation::NoCompatibleNeighbor(kind));
        }
    }

    fn check_special_rules(
        &self,
        state: &TempleState,
        at: Coord,
        room_type: RoomType,
        violations: &mut Vec<Violation>,
    ) {
        if self.rules.is_unique(room_type) && state.count_of(room_type) >= 1 {
            violations.push(Violation::UniqueExceeded(room_type));
        }

        if let Some(v) = self.ancestor_block(state, at, room_type) {
            violations.push(v);
        }

        for n in at.neighbors() {
            let Some(TileKind::Room(neighbor_type)) = state.tile_kind(n) else {
                continue;
            };
            if neighbor_type == room_type && self.rules.forbids_self_adjacency(room_type) {
                violations.push(Violation::SelfAdjacent(room_type, n));
            }
            // The neighbour's own limit, counting the candidate as one more.
            if let Some(limit) = self.rules.adjacency_limit(neighbor_type, room_type) {
                if count_adjacent(state, n, room_type) + 1 > limit {
                    violations.push(Violation::AdjacencyLimit {
                        room_type: neighbor_type,
                        neighbor_type: room_type,
                        limit,
                        at: n,
                    });
                }
            }
        }

        // The candidate's own limits.
        for &other in RoomType::all() {
            if let Some(limit) = self.rules.adjacency_limit(room_type, other) {
                if count_adjacent(state, at, other) > limit {
                    violations.push(Violation::AdjacencyLimit {
                        room_type,
                        neighbor_type: other,
                        limit,
                        at,
                    });
                }
            }
        }

        if let Some(v) = self.chain_ban(state, at, room_type) {
            violations.push(v);
        }

        if self.rules.requires_path_neighbor(room_type)
            && !at.neighbors().any(|n| state.tile_kind(n) == Some(TileKind::Path))
        {
            violations.push(Violation::NeedsPathNeighbor(room_type));
        }
    }

    /// A banned chain is completed either with the candidate in the middle,
    /// joining two end rooms, or with the candidate at one end, joining a
    /// middle room that already holds the other end.
    fn chain_ban(&self, state: &TempleState, at: Coord, room_type: RoomType) -> Option<Violation> {
        let kind = TileKind::Room(room_type);
        let linked: Vec<(Coord, RoomType)> = at
            .neighbors()
            .filter_map(|n| match state.tile_kind(n) {
                Some(TileKind::Room(rt)) if self.rules.can_connect(kind, TileKind::Room(rt)) => Some((n, rt)),
                _ => None,
            })
            .collect();
        let linked_of = |rt: RoomType| linked.iter().filter(|&&(_, t)| t == rt).count();

        for &(first, middle, last) in self.rules.chain_bans() {
            let banned = ChainBan { first, middle, last };
            if middle == room_type {
                let closes = if first == last {
                    linked_of(first) >= 2
                } else {
                    linked_of(first) >= 1 && linked_of(last) >= 1
                };
                if closes {
                    return Some(banned.at(at));
                }
            }

            let other_ends = [(first, last), (last, first)];
            for (end, other) in other_ends {
                if end != room_type {
                    continue;
                }
                for &(n, t) in &linked {
                    if t != middle {
                        continue;
                    }
                    let holds_other = n.neighbors().any(|m| {
                        m != at
                            && state.tile_kind(m) == Some(TileKind::Room(other))
                            && cells_connect(state, self.rules, n, m)
                    });
                    if holds_other {
                        return Some(banned.at(n));
                    }
                }
            }
        }
        None
    }

    /// Walks the BFS parent chain from each connected neighbour back to the
    /// Foyer. Only `blocker`-above-`blocked` is rejected, never the reverse.
    fn ancestor_block(&self, state: &TempleState, at: Coord, room_type: RoomType) -> Option<Violation> {
        for &(blocker, blocked) in self.rules.ancestor_blocks() {
            if blocked != room_type {
                continue;
            }
            for n in at.neighbors() {
                let found = path_to_foyer(state, n)
                    .into_iter()
                    .find(|&c| state.tile_kind(c) == Some(TileKind::Room(blocker)));
                if let Some(c) = found {
                    return Some(Violation::AncestorBlocked {
                        blocked,
                        blocker,
                        at: c,
                    });
                }
            }
        }
        None
    }

    fn check_architect_limit(&self, state: &TempleState, at: Coord, violations: &mut Vec<Violation>) {
        let architect = state.architect();
        if at.manhattan(architect) != 1 {
            return;
        }
        let count = state.occupied_neighbors(architect).count() + 1;
        if count > self.architect_max_neighbors {
            violations.push(Violation::ArchitectOverloaded {
                count,
                max: self.architect_max_neighbors,
            });
        }
    }
}

struct ChainBan {
    first: RoomType,
    middle: RoomType,
    last: RoomType,
}

impl ChainBan {
    fn at(self, at: Coord) -> Violation {
        Violation::ChainBanned {
            first: self.first,
            middle: self.middle,
            last: self.last,
            at,
        }
    }
}

fn count_adjacent(state: &TempleState, c: Coord, room_type: RoomType) -> u32 {
    c.neighbors()
        .filter(|&n| state.tile_kind(n) == Some(TileKind::Room(room_type)))
        .count() as u32
}
