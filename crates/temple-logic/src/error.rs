//! Fatal input errors.
//!
//! Only malformed input is an error. Illegal placements are reported as
//! [`crate::validation::Violation`] data and exhausted search budgets as an
//! unsuccessful [`crate::search::SearchOutcome`].

use thiserror::Error;

use crate::grid::Coord;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TempleError {
    /// The Architect was put on the Foyer or the Exit.
    #[error("architect cannot be placed on fixed cell {0}")]
    ArchitectOnFixedCell(Coord),
    #[error("coordinate {0} is outside the 9x9 grid")]
    OutOfBounds(Coord),
    /// Two entities were supplied for the same cell.
    #[error("cell {0} is already occupied")]
    CellOccupied(Coord),
    #[error("tier must be 1, 2 or 3 (got {0})")]
    InvalidTier(u8),
    #[error("invalid temple configuration: {0}")]
    Config(String),
}

pub type TempleResult<T> = Result<T, TempleError>;
