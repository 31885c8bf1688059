//! Temple grid state: cells, placed entities, mutation primitives.
//!
//! `TempleState` is the aggregate root the search branches on. It is a plain
//! value: `clone()` is a full deep copy with no shared references, so sibling
//! branches can never observe each other's placements.
//!
//! Placement methods are unconditional writes. Legality is checked by
//! [`crate::validation`], and the derived connectivity sets are only refreshed
//! by [`crate::connectivity::update_connectivity`].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{RoomType, Tier, CELL_COUNT, EXIT_POS, FOYER_POS, GRID_SIZE};
use crate::error::{TempleError, TempleResult};

/// A grid position, 1-indexed on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

const NEIGHBOR_OFFSETS: [(i32, i32); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_bounds(self) -> bool {
        (1..=GRID_SIZE).contains(&self.x) && (1..=GRID_SIZE).contains(&self.y)
    }

    /// Orthogonal neighbours that lie on the grid.
    pub fn neighbors(self) -> impl Iterator<Item = Coord> {
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |&(dx, dy)| Coord::new(self.x + dx, self.y + dy))
            .filter(|c| c.in_bounds())
    }

    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Reflection about the central column.
    pub fn mirrored(self) -> Coord {
        Coord::new(GRID_SIZE + 1 - self.x, self.y)
    }

    /// Row-major cell index. Only meaningful for in-bounds coordinates.
    pub(crate) fn index(self) -> usize {
        ((self.y - 1) * GRID_SIZE + (self.x - 1)) as usize
    }

    pub(crate) fn from_index(index: usize) -> Coord {
        let i = index as i32;
        Coord::new(i % GRID_SIZE + 1, i / GRID_SIZE + 1)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// A set of grid cells packed into one bitmask. Iterates in row-major order,
/// which keeps every traversal over it deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CellSet(u128);

impl CellSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn insert(&mut self, c: Coord) -> bool {
        if !c.in_bounds() {
            return false;
        }
        let bit = 1u128 << c.index();
        let fresh = self.0 & bit == 0;
        self.0 |= bit;
        fresh
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.in_bounds() && self.0 & (1u128 << c.index()) != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        let bits = self.0;
        (0..CELL_COUNT)
            .filter(move |&i| bits & (1u128 << i) != 0)
            .map(Coord::from_index)
    }
}

impl FromIterator<Coord> for CellSet {
    fn from_iter<I: IntoIterator<Item = Coord>>(iter: I) -> Self {
        let mut set = CellSet::new();
        for c in iter {
            set.insert(c);
        }
        set
    }
}

pub type RoomId = u32;
pub type PathId = u32;

/// A placed room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub room_type: RoomType,
    pub tier: Tier,
    pub position: Coord,
}

/// A room-less connector cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathTile {
    pub id: PathId,
    pub position: Coord,
}

/// What a grid cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellContent {
    #[default]
    Empty,
    Foyer,
    Exit,
    Architect,
    Room(RoomId),
    Path(PathId),
}

/// The connection-relevant kind of an occupied cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileKind {
    Foyer,
    Exit,
    Architect,
    Path,
    Room(RoomType),
}

impl TileKind {
    pub fn room_type(self) -> Option<RoomType> {
        match self {
            TileKind::Room(rt) => Some(rt),
            _ => None,
        }
    }

    pub fn is_marker(self) -> bool {
        matches!(self, TileKind::Foyer | TileKind::Exit | TileKind::Architect)
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TileKind::Foyer => write!(f, "Foyer"),
            TileKind::Exit => write!(f, "Exit"),
            TileKind::Architect => write!(f, "Architect"),
            TileKind::Path => write!(f, "Path"),
            TileKind::Room(rt) => write!(f, "{}", rt.name()),
        }
    }
}

/// What to put down in a single placement step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Room { room_type: RoomType, tier: Tier },
    Path,
}

impl Placement {
    pub fn kind(self) -> TileKind {
        match self {
            Placement::Room { room_type, .. } => TileKind::Room(room_type),
            Placement::Path => TileKind::Path,
        }
    }

    /// Per-cell byte used in [`StateKey`].
    fn key_code(self) -> u8 {
        match self {
            Placement::Room { room_type, tier } => 8 + (room_type.index() as u8) * 4 + tier as u8,
            Placement::Path => 4,
        }
    }
}

/// A placement at a specific cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlacementAction {
    pub coord: Coord,
    pub placement: Placement,
}

impl PlacementAction {
    pub fn room(room_type: RoomType, tier: Tier, coord: Coord) -> Self {
        Self {
            coord,
            placement: Placement::Room { room_type, tier },
        }
    }

    pub fn path(coord: Coord) -> Self {
        Self {
            coord,
            placement: Placement::Path,
        }
    }
}

impl fmt::Display for PlacementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.placement {
            Placement::Room { room_type, tier } => {
                write!(f, "{} T{} at {}", room_type.name(), tier as u8, self.coord)
            }
            Placement::Path => write!(f, "Path at {}", self.coord),
        }
    }
}

/// Canonical per-cell serialization used for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateKey([u8; CELL_COUNT]);

/// The temple: a 9×9 grid, its entities, and derived connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempleState {
    cells: [CellContent; CELL_COUNT],
    rooms: BTreeMap<RoomId, Room>,
    paths: BTreeMap<PathId, PathTile>,
    architect: Coord,
    next_id: u32,
    /// Protected room and path ids. Only the presentation layer reads these.
    locked: BTreeSet<u32>,
    // Derived by connectivity analysis, never patched incrementally.
    foyer_connected: CellSet,
    architect_connected: CellSet,
    parents: [Option<Coord>; CELL_COUNT],
}

impl TempleState {
    /// Create an empty temple with the fixed cells in place.
    ///
    /// The Architect must lie on the grid and must not coincide with the
    /// Foyer or the Exit. Connectivity starts as just the Foyer; run
    /// `update_connectivity` before relying on it.
    pub fn create_empty(architect: Coord) -> TempleResult<Self> {
        if !architect.in_bounds() {
            return Err(TempleError::OutOfBounds(architect));
        }
        if architect == FOYER_POS || architect == EXIT_POS {
            return Err(TempleError::ArchitectOnFixedCell(architect));
        }

        let mut cells = [CellContent::Empty; CELL_COUNT];
        cells[FOYER_POS.index()] = CellContent::Foyer;
        cells[EXIT_POS.index()] = CellContent::Exit;
        cells[architect.index()] = CellContent::Architect;

        let mut foyer_connected = CellSet::new();
        foyer_connected.insert(FOYER_POS);

        Ok(Self {
            cells,
            rooms: BTreeMap::new(),
            paths: BTreeMap::new(),
            architect,
            next_id: 1,
            locked: BTreeSet::new(),
            foyer_connected,
            architect_connected: CellSet::new(),
            parents: [None; CELL_COUNT],
        })
    }

    pub fn architect(&self) -> Coord {
        self.architect
    }

    /// Content at `c`, or `None` off the grid.
    pub fn cell(&self, c: Coord) -> Option<CellContent> {
        c.in_bounds().then(|| self.cells[c.index()])
    }

    /// Overwrite a cell. No-op off the grid.
    pub fn set_cell(&mut self, c: Coord, content: CellContent) {
        if c.in_bounds() {
            self.cells[c.index()] = content;
        }
    }

    pub fn is_empty(&self, c: Coord) -> bool {
        self.cell(c) == Some(CellContent::Empty)
    }

    pub fn is_occupied(&self, c: Coord) -> bool {
        matches!(self.cell(c), Some(content) if content != CellContent::Empty)
    }

    /// Kind of the occupant at `c`, or `None` for empty / off-grid cells.
    pub fn tile_kind(&self, c: Coord) -> Option<TileKind> {
        match self.cell(c)? {
            CellContent::Empty => None,
            CellContent::Foyer => Some(TileKind::Foyer),
            CellContent::Exit => Some(TileKind::Exit),
            CellContent::Architect => Some(TileKind::Architect),
            CellContent::Path(_) => Some(TileKind::Path),
            CellContent::Room(id) => self.rooms.get(&id).map(|r| TileKind::Room(r.room_type)),
        }
    }

    /// Occupied orthogonal neighbours of `c`.
    pub fn occupied_neighbors(&self, c: Coord) -> impl Iterator<Item = Coord> + '_ {
        c.neighbors().filter(move |&n| self.is_occupied(n))
    }

    /// Put a room down. Assumes legality was already checked.
    /// Returns `None` only when `c` is off the grid.
    pub fn place_room(&mut self, room_type: RoomType, tier: Tier, c: Coord) -> Option<RoomId> {
        if !c.in_bounds() {
            return None;
        }
        let id = self.allocate_id();
        self.rooms.insert(
            id,
            Room {
                id,
                room_type,
                tier,
                position: c,
            },
        );
        self.cells[c.index()] = CellContent::Room(id);
        Some(id)
    }

    /// Put a path down. Assumes legality was already checked.
    pub fn place_path(&mut self, c: Coord) -> Option<PathId> {
        if !c.in_bounds() {
            return None;
        }
        let id = self.allocate_id();
        self.paths.insert(id, PathTile { id, position: c });
        self.cells[c.index()] = CellContent::Path(id);
        Some(id)
    }

    /// Apply a placement action. Does not refresh connectivity.
    pub fn apply(&mut self, action: &PlacementAction) -> Option<u32> {
        match action.placement {
            Placement::Room { room_type, tier } => self.place_room(room_type, tier, action.coord),
            Placement::Path => self.place_path(action.coord),
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Mark a room or path as protected. Returns false for unknown ids.
    pub fn lock(&mut self, id: u32) -> bool {
        if !self.rooms.contains_key(&id) && !self.paths.contains_key(&id) {
            return false;
        }
        self.locked.insert(id);
        true
    }

    pub fn is_locked(&self, id: u32) -> bool {
        self.locked.contains(&id)
    }

    /// Locked room and path ids, ascending.
    pub fn locked_ids(&self) -> Vec<u32> {
        self.locked.iter().copied().collect()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &PathTile> {
        self.paths.values()
    }

    pub fn room_at(&self, c: Coord) -> Option<&Room> {
        match self.cell(c)? {
            CellContent::Room(id) => self.rooms.get(&id),
            _ => None,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn count_of(&self, room_type: RoomType) -> u32 {
        self.rooms
            .values()
            .filter(|r| r.room_type == room_type)
            .count() as u32
    }

    pub fn count_of_tier(&self, room_type: RoomType, tier: Tier) -> u32 {
        self.rooms
            .values()
            .filter(|r| r.room_type == room_type && r.tier == tier)
            .count() as u32
    }

    pub fn tier3_count(&self) -> u32 {
        self.rooms.values().filter(|r| r.tier == Tier::Three).count() as u32
    }

    // ── Derived connectivity ────────────────────────────────────────────

    /// Cells rule-connected to the Foyer, as of the last connectivity update.
    pub fn foyer_connected(&self) -> &CellSet {
        &self.foyer_connected
    }

    /// Cells rule-connected to the Architect. Empty while the Architect is
    /// not itself connected to the Foyer.
    pub fn architect_connected(&self) -> &CellSet {
        &self.architect_connected
    }

    pub fn architect_reached(&self) -> bool {
        self.foyer_connected.contains(self.architect)
    }

    pub fn exit_reached(&self) -> bool {
        self.architect_connected.contains(EXIT_POS)
    }

    /// BFS parent of `c` in the Foyer-rooted traversal.
    pub fn parent_of(&self, c: Coord) -> Option<Coord> {
        if !c.in_bounds() {
            return None;
        }
        self.parents[c.index()]
    }

    pub(crate) fn set_connectivity(
        &mut self,
        foyer_connected: CellSet,
        parents: [Option<Coord>; CELL_COUNT],
        architect_connected: CellSet,
    ) {
        self.foyer_connected = foyer_connected;
        self.parents = parents;
        self.architect_connected = architect_connected;
    }

    // ── Canonical keys ──────────────────────────────────────────────────

    /// Per-cell type+tier serialization. Two states with equal keys hold the
    /// same things in the same cells.
    pub fn canonical_key(&self) -> StateKey {
        let mut bytes = [0u8; CELL_COUNT];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.cell_code(Coord::from_index(i));
        }
        StateKey(bytes)
    }

    /// Key of the state `action` would produce, without building that state.
    pub fn key_after(&self, action: &PlacementAction) -> StateKey {
        let mut key = self.canonical_key();
        if action.coord.in_bounds() {
            key.0[action.coord.index()] = action.placement.key_code();
        }
        key
    }

    /// Key of this state reflected about the central column.
    pub fn mirrored_key(&self) -> StateKey {
        let mut bytes = [0u8; CELL_COUNT];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.cell_code(Coord::from_index(i).mirrored());
        }
        StateKey(bytes)
    }

    fn cell_code(&self, c: Coord) -> u8 {
        match self.cells[c.index()] {
            CellContent::Empty => 0,
            CellContent::Foyer => 1,
            CellContent::Exit => 2,
            CellContent::Architect => 3,
            CellContent::Path(_) => 4,
            CellContent::Room(id) => match self.rooms.get(&id) {
                Some(r) => Placement::Room {
                    room_type: r.room_type,
                    tier: r.tier,
                }
                .key_code(),
                None => 0,
            },
        }
    }

    /// Text dump, top row first, for logs and the harness.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for y in (1..=GRID_SIZE).rev() {
            for x in 1..=GRID_SIZE {
                let c = Coord::new(x, y);
                let label = match self.cells[c.index()] {
                    CellContent::Empty => " . ".to_string(),
                    CellContent::Foyer => "FOY".to_string(),
                    CellContent::Exit => "EXT".to_string(),
                    CellContent::Architect => "ARC".to_string(),
                    CellContent::Path(_) => " # ".to_string(),
                    CellContent::Room(id) => self
                        .rooms
                        .get(&id)
                        .map_or(" ? ".to_string(), |r| r.room_type.abbrev().to_string()),
                };
                out.push_str(&label);
                if x < GRID_SIZE {
                    out.push(' ');
                }
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arch() -> Coord {
        Coord::new(7, 4)
    }

    #[test]
    fn test_create_empty_places_fixed_cells() {
        let s = TempleState::create_empty(arch()).unwrap();
        assert_eq!(s.cell(FOYER_POS), Some(CellContent::Foyer));
        assert_eq!(s.cell(EXIT_POS), Some(CellContent::Exit));
        assert_eq!(s.cell(arch()), Some(CellContent::Architect));
        assert_eq!(s.room_count(), 0);
        assert_eq!(s.path_count(), 0);
    }

    #[test]
    fn test_create_empty_rejects_fixed_cells() {
        assert_eq!(
            TempleState::create_empty(FOYER_POS),
            Err(TempleError::ArchitectOnFixedCell(FOYER_POS))
        );
        assert_eq!(
            TempleState::create_empty(EXIT_POS),
            Err(TempleError::ArchitectOnFixedCell(EXIT_POS))
        );
        let off = Coord::new(0, 4);
        assert_eq!(
            TempleState::create_empty(off),
            Err(TempleError::OutOfBounds(off))
        );
    }

    #[test]
    fn test_cell_access_out_of_bounds() {
        let mut s = TempleState::create_empty(arch()).unwrap();
        assert_eq!(s.cell(Coord::new(10, 1)), None);
        assert!(!s.is_empty(Coord::new(0, 0)));
        s.set_cell(Coord::new(-3, 2), CellContent::Foyer); // no-op
        assert_eq!(s.place_room(RoomType::Garrison, Tier::One, Coord::new(1, 10)), None);
        assert_eq!(s.room_count(), 0);
    }

    #[test]
    fn test_place_room_and_path() {
        let mut s = TempleState::create_empty(arch()).unwrap();
        let id = s
            .place_room(RoomType::Garrison, Tier::Two, Coord::new(5, 2))
            .unwrap();
        s.place_path(Coord::new(4, 2)).unwrap();
        assert_eq!(s.tile_kind(Coord::new(5, 2)), Some(TileKind::Room(RoomType::Garrison)));
        assert_eq!(s.tile_kind(Coord::new(4, 2)), Some(TileKind::Path));
        assert_eq!(s.room_at(Coord::new(5, 2)).unwrap().id, id);
        assert_eq!(s.count_of(RoomType::Garrison), 1);
        assert_eq!(s.path_count(), 1);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut s = TempleState::create_empty(arch()).unwrap();
        s.place_path(Coord::new(5, 2));
        let mut c = s.clone();
        assert_eq!(c.canonical_key(), s.canonical_key());
        c.place_room(RoomType::Smithy, Tier::Three, Coord::new(5, 3));
        assert!(s.is_empty(Coord::new(5, 3)));
        assert_ne!(c.canonical_key(), s.canonical_key());
    }

    #[test]
    fn test_lock_covers_rooms_and_paths() {
        let mut s = TempleState::create_empty(arch()).unwrap();
        let room = s
            .place_room(RoomType::Armoury, Tier::One, Coord::new(5, 2))
            .unwrap();
        let path = s.place_path(Coord::new(5, 3)).unwrap();
        let free = s.place_path(Coord::new(5, 4)).unwrap();
        assert!(s.lock(room));
        assert!(s.lock(path));
        assert!(!s.lock(999));
        assert_eq!(s.locked_ids(), vec![room, path]);
        assert!(!s.is_locked(free));

        let copy = s.clone();
        assert!(copy.is_locked(path));
    }

    #[test]
    fn test_key_after_matches_applied_state() {
        let mut s = TempleState::create_empty(arch()).unwrap();
        s.place_path(Coord::new(5, 2));
        for action in [
            PlacementAction::path(Coord::new(5, 3)),
            PlacementAction::room(RoomType::Smithy, Tier::Two, Coord::new(4, 2)),
        ] {
            let predicted = s.key_after(&action);
            let mut applied = s.clone();
            applied.apply(&action);
            assert_eq!(predicted, applied.canonical_key());
        }
    }

    #[test]
    fn test_cell_set_iterates_row_major() {
        let set: CellSet = [Coord::new(3, 2), Coord::new(1, 1), Coord::new(9, 1)]
            .into_iter()
            .collect();
        let order: Vec<Coord> = set.iter().collect();
        assert_eq!(order, vec![Coord::new(1, 1), Coord::new(9, 1), Coord::new(3, 2)]);
        assert_eq!(set.len(), 3);
        assert!(!set.contains(Coord::new(2, 2)));
    }

    #[test]
    fn test_mirrored_key_matches_reflected_layout() {
        // Architect on the central column so the fixed cells are symmetric.
        let mut a = TempleState::create_empty(Coord::new(5, 5)).unwrap();
        let mut b = a.clone();
        a.place_path(Coord::new(4, 1));
        b.place_path(Coord::new(6, 1));
        assert_ne!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.mirrored_key(), b.canonical_key());
    }

    #[test]
    fn test_coord_neighbors_clip_to_grid() {
        assert_eq!(Coord::new(1, 1).neighbors().count(), 2);
        assert_eq!(Coord::new(5, 1).neighbors().count(), 3);
        assert_eq!(Coord::new(5, 5).neighbors().count(), 4);
        assert_eq!(Coord::new(5, 1).manhattan(Coord::new(7, 4)), 5);
    }

    #[test]
    fn test_render_marks_fixed_cells() {
        let s = TempleState::create_empty(arch()).unwrap();
        let dump = s.render();
        assert!(dump.contains("FOY"));
        assert!(dump.contains("EXT"));
        assert!(dump.contains("ARC"));
        assert_eq!(dump.lines().count(), 9);
    }
}
