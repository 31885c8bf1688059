//! Pure layout logic for temple planning.
//!
//! This crate contains the rules, state model, and search for laying out a
//! 9×9 temple of rooms and paths as a tree rooted at the Foyer. Functions
//! take plain data and return results, with no I/O or rendering, so they
//! are unit-testable and usable from any front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`actions`] | Resource pool, frontier candidate generation, action ordering |
//! | [`connectivity`] | Rule-respecting BFS, loop detection, chain tips |
//! | [`constants`] | Grid size, fixed cells, room types, tiers, defaults |
//! | [`error`] | Fatal input errors |
//! | [`grid`] | Coordinates, cell sets, placed entities, `TempleState` |
//! | [`heuristic`] | Goals, the search heuristic, best-so-far score |
//! | [`metrics`] | Read-only summary of a finished or partial temple |
//! | [`rules`] | Connection legality, synergy, room values, special rules |
//! | [`search`] | A* search engine with time and iteration budgets |
//! | [`temple_config`] | Serde input model, validation, diagnostics, `solve` |
//! | [`validation`] | Placement legality with structured violations |

pub mod actions;
pub mod connectivity;
pub mod constants;
pub mod error;
pub mod grid;
pub mod heuristic;
pub mod metrics;
pub mod rules;
pub mod search;
pub mod temple_config;
pub mod validation;

pub use error::{TempleError, TempleResult};
