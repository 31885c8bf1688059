//! Temple constants: grid geometry, fixed cells, room types and tiers.
//!
//! Everything here is plain data with no behaviour beyond lookups. The rule
//! tables that relate room types to each other live in [`crate::rules`].

use serde::{Deserialize, Serialize};

use crate::grid::Coord;

/// Side length of the temple grid. Coordinates run 1..=GRID_SIZE on both axes.
pub const GRID_SIZE: i32 = 9;

/// Total number of cells on the grid.
pub const CELL_COUNT: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// The entrance. Connectivity is always rooted here.
pub const FOYER_POS: Coord = Coord::new(5, 1);

/// The fixed terminal cell opposite the entrance.
pub const EXIT_POS: Coord = Coord::new(5, 9);

/// Cells left for rooms and paths once Foyer, Exit and Architect are fixed.
pub const PLACEABLE_CELLS: usize = CELL_COUNT - 3;

pub mod defaults {
    /// Spymaster minimum for the "best configuration" goal.
    pub const MIN_SPYMASTERS: u32 = 8;
    /// Corruption Chamber minimum for the "best configuration" goal.
    pub const MIN_CORRUPTION_CHAMBERS: u32 = 6;
    /// The Architect may touch at most this many occupied cells.
    pub const ARCHITECT_MAX_NEIGHBORS: usize = 1;
    pub const MAX_ITERATIONS: usize = 20_000;
    pub const TIME_LIMIT_MS: u64 = 5_000;
    /// Open-queue length that triggers trimming back to half.
    pub const MAX_OPEN_NODES: usize = 100_000;
    /// A search that succeeds within this many expansions is labelled
    /// `likely_optimal`. Heuristic label only.
    pub const OPTIMAL_NODE_THRESHOLD: usize = 1_000;
}

pub mod scoring {
    /// Bonus added to total value for every synergy edge.
    pub const SYNERGY_BONUS: u32 = 5;

    // Best-so-far weights. Kept apart from the search heuristic on purpose:
    // this ranks partial results, it does not guide expansion.
    pub const ROOM_WEIGHT: i64 = 10;
    pub const SPYMASTER_WEIGHT: i64 = 40;
    pub const CORRUPTION_WEIGHT: i64 = 40;
    pub const TIER3_WEIGHT: i64 = 5;
    pub const ARCHITECT_REACHED_BONUS: i64 = 100;
}

/// The fourteen placeable room types. Paths are not rooms; see
/// [`crate::grid::TileKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum RoomType {
    Garrison = 0,
    Spymaster = 1,
    Commander = 2,
    Armoury = 3,
    AlchemyLab = 4,
    Smithy = 5,
    CorruptionChamber = 6,
    SacrificialChamber = 7,
    Thaumaturge = 8,
    Generator = 9,
    GolemWorks = 10,
    FleshSurgeon = 11,
    Synthflesh = 12,
    LegionBarracks = 13,
}

impl RoomType {
    pub fn all() -> &'static [RoomType] {
        &[
            Self::Garrison,
            Self::Spymaster,
            Self::Commander,
            Self::Armoury,
            Self::AlchemyLab,
            Self::Smithy,
            Self::CorruptionChamber,
            Self::SacrificialChamber,
            Self::Thaumaturge,
            Self::Generator,
            Self::GolemWorks,
            Self::FleshSurgeon,
            Self::Synthflesh,
            Self::LegionBarracks,
        ]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Garrison => "Garrison",
            Self::Spymaster => "Spymaster",
            Self::Commander => "Commander",
            Self::Armoury => "Armoury",
            Self::AlchemyLab => "Alchemy Lab",
            Self::Smithy => "Smithy",
            Self::CorruptionChamber => "Corruption Chamber",
            Self::SacrificialChamber => "Sacrificial Chamber",
            Self::Thaumaturge => "Thaumaturge",
            Self::Generator => "Generator",
            Self::GolemWorks => "Golem Works",
            Self::FleshSurgeon => "Flesh Surgeon",
            Self::Synthflesh => "Synthflesh",
            Self::LegionBarracks => "Legion Barracks",
        }
    }

    /// Short label for grid dumps.
    pub fn abbrev(self) -> &'static str {
        match self {
            Self::Garrison => "GAR",
            Self::Spymaster => "SPY",
            Self::Commander => "CMD",
            Self::Armoury => "ARM",
            Self::AlchemyLab => "ALC",
            Self::Smithy => "SMI",
            Self::CorruptionChamber => "COR",
            Self::SacrificialChamber => "SAC",
            Self::Thaumaturge => "THA",
            Self::Generator => "GEN",
            Self::GolemWorks => "GOL",
            Self::FleshSurgeon => "FLE",
            Self::Synthflesh => "SYN",
            Self::LegionBarracks => "LEG",
        }
    }
}

/// Upgrade level of a placed room. Affects value only, never legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum Tier {
    One = 1,
    Two = 2,
    Three = 3,
}

impl Tier {
    pub fn all() -> &'static [Tier] {
        &[Self::One, Self::Two, Self::Three]
    }

    pub fn from_u8(value: u8) -> Option<Tier> {
        match value {
            1 => Some(Self::One),
            2 => Some(Self::Two),
            3 => Some(Self::Three),
            _ => None,
        }
    }

    /// Zero-based index into per-tier tables.
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Tier::from_u8(value).ok_or_else(|| format!("tier must be 1, 2 or 3 (got {})", value))
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> u8 {
        tier as u8
    }
}
