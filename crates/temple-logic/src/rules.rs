//! Room rule tables for connection legality, synergy, values and special rules.
//!
//! Asymmetric rules are kept as observed in play, notably the
//! Commander/Spymaster ancestor block.
//!
//! A `RoomRuleTable` is immutable once built. Consumers borrow it; nothing
//! copies or mutates it during search.

use std::collections::BTreeMap;

use crate::constants::{RoomType, Tier};
use crate::grid::TileKind;

/// Per-tier values for one tile kind, `[T1, T2, T3]`.
pub type TierValues = [u32; 3];

const PATH_VALUE: TierValues = [1, 1, 1];

/// Immutable rule and value configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomRuleTable {
    values: [TierValues; 14],
}

impl Default for RoomRuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl RoomRuleTable {
    /// The rule set with stock room values.
    pub fn standard() -> Self {
        let mut values = [[0; 3]; 14];
        for &rt in RoomType::all() {
            values[rt.index()] = default_values(rt);
        }
        Self { values }
    }

    /// The rule set with some room values replaced. Legality is unaffected.
    pub fn with_values(overrides: &BTreeMap<RoomType, TierValues>) -> Self {
        let mut table = Self::standard();
        for (&rt, &v) in overrides {
            table.values[rt.index()] = v;
        }
        table
    }

    // ── Connection legality ─────────────────────────────────────────────

    /// Rooms this type will accept as tree neighbours, or `None` when it
    /// accepts anything. Paths are always accepted by everyone.
    pub fn required_parents(&self, room_type: RoomType) -> Option<&'static [RoomType]> {
        use RoomType::*;
        match room_type {
            Spymaster => Some(&[Garrison, LegionBarracks]),
            GolemWorks => Some(&[Smithy]),
            Thaumaturge => Some(&[Generator, AlchemyLab, CorruptionChamber, SacrificialChamber]),
            _ => None,
        }
    }

    /// Whether `kind` is willing to connect to `other`, from `kind`'s side.
    fn accepts(&self, kind: TileKind, other: TileKind) -> bool {
        let TileKind::Room(rt) = kind else {
            // Paths and fixed markers impose no restriction of their own.
            return true;
        };
        match self.required_parents(rt) {
            None => true,
            Some(parents) => match other {
                TileKind::Path => true,
                TileKind::Room(o) => parents.contains(&o),
                // A restricted room will not hang directly off a marker.
                TileKind::Foyer | TileKind::Exit | TileKind::Architect => false,
            },
        }
    }

    /// Whether two adjacent tiles can be tree-connected. Both sides'
    /// restrictions must be satisfied.
    pub fn can_connect(&self, a: TileKind, b: TileKind) -> bool {
        self.accepts(a, b) && self.accepts(b, a)
    }

    // ── Scoring-only relations ──────────────────────────────────────────

    /// Scoring-only adjacency bonus. Independent of connection legality.
    pub fn triggers_synergy(&self, room_type: RoomType, neighbor: RoomType) -> bool {
        synergy_partners(room_type).contains(&neighbor)
            || synergy_partners(neighbor).contains(&room_type)
    }

    pub fn value(&self, kind: TileKind, tier: Tier) -> u32 {
        match kind {
            TileKind::Room(rt) => self.values[rt.index()][tier.index()],
            TileKind::Path => PATH_VALUE[tier.index()],
            _ => 0,
        }
    }

    pub fn room_value(&self, room_type: RoomType, tier: Tier) -> u32 {
        self.values[room_type.index()][tier.index()]
    }

    // ── Special rules ───────────────────────────────────────────────────

    /// Types that may appear at most once in a temple.
    pub fn is_unique(&self, room_type: RoomType) -> bool {
        matches!(room_type, RoomType::SacrificialChamber)
    }

    /// `(blocker, blocked)`: `blocked` may not be placed anywhere below
    /// `blocker` on the Foyer-rooted tree. The reverse order is allowed.
    pub fn ancestor_blocks(&self) -> &'static [(RoomType, RoomType)] {
        &[(RoomType::Commander, RoomType::Spymaster)]
    }

    /// Whether two rooms of this type may not sit orthogonally next to each
    /// other. Holds for every type observed so far.
    pub fn forbids_self_adjacency(&self, _room_type: RoomType) -> bool {
        true
    }

    /// Maximum number of `neighbor` rooms a `room_type` room may touch.
    pub fn adjacency_limit(&self, room_type: RoomType, neighbor: RoomType) -> Option<u32> {
        match (room_type, neighbor) {
            (RoomType::Armoury, RoomType::Smithy) => Some(1),
            (RoomType::AlchemyLab, RoomType::Thaumaturge) => Some(2),
            _ => None,
        }
    }

    /// `(a, b, c)`: a `b` room may not be connected to both an `a` and a
    /// `c` room at once.
    pub fn chain_bans(&self) -> &'static [(RoomType, RoomType, RoomType)] {
        use RoomType::*;
        &[
            (Armoury, Garrison, Armoury),
            (AlchemyLab, Armoury, AlchemyLab),
            (Thaumaturge, CorruptionChamber, Thaumaturge),
            (GolemWorks, Smithy, GolemWorks),
            (Spymaster, LegionBarracks, Spymaster),
            (LegionBarracks, Spymaster, LegionBarracks),
        ]
    }

    /// Types that must touch a Path when placed.
    pub fn requires_path_neighbor(&self, room_type: RoomType) -> bool {
        matches!(room_type, RoomType::Generator)
    }

    // ── Search hints ────────────────────────────────────────────────────

    /// Fixed ranking used to order candidate actions. Types that enable
    /// otherwise-blocked placements rank above the types they enable.
    pub fn value_priority(&self, room_type: RoomType) -> u8 {
        use RoomType::*;
        match room_type {
            Garrison => 14,
            LegionBarracks => 13,
            Smithy => 12,
            Generator => 11,
            AlchemyLab => 10,
            SacrificialChamber => 9,
            CorruptionChamber => 8,
            Thaumaturge => 7,
            Spymaster => 6,
            Armoury => 5,
            Commander => 4,
            Synthflesh => 3,
            FleshSurgeon => 2,
            GolemWorks => 1,
        }
    }

    /// Approximate cells needed to add one more room of this type. Types
    /// that need an enabling neighbour cost more.
    pub fn unit_cost(&self, room_type: RoomType) -> f64 {
        if self.required_parents(room_type).is_some() {
            2.0
        } else {
            1.0
        }
    }
}

fn default_values(room_type: RoomType) -> TierValues {
    use RoomType::*;
    match room_type {
        Garrison => [8, 12, 18],
        Spymaster => [20, 35, 50],
        Commander => [12, 20, 35],
        Armoury => [10, 18, 28],
        AlchemyLab => [14, 24, 40],
        Smithy => [12, 22, 38],
        CorruptionChamber => [25, 45, 70],
        SacrificialChamber => [30, 50, 80],
        Thaumaturge => [15, 30, 50],
        Generator => [10, 18, 30],
        GolemWorks => [8, 14, 22],
        FleshSurgeon => [15, 28, 45],
        Synthflesh => [10, 18, 28],
        LegionBarracks => [12, 22, 35],
    }
}

/// One direction of the synergy table; lookups use the symmetric closure.
fn synergy_partners(room_type: RoomType) -> &'static [RoomType] {
    use RoomType::*;
    match room_type {
        Garrison => &[Commander, Armoury, Spymaster, Synthflesh],
        LegionBarracks => &[Commander, Armoury, Spymaster],
        Armoury => &[Smithy, AlchemyLab],
        Smithy => &[GolemWorks],
        Generator => &[Thaumaturge, SacrificialChamber],
        Synthflesh => &[FleshSurgeon],
        AlchemyLab => &[Thaumaturge],
        Thaumaturge => &[SacrificialChamber, CorruptionChamber],
        CorruptionChamber => &[SacrificialChamber],
        _ => &[],
    }
}
