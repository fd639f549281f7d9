//! Match decision algorithm and persistent decision cache.
//!
//! `matcher` compares a searchee's file tree against a fetched candidate's
//! and returns a `DecisionKind`; `cache` persists that decision (and
//! per-searchee search timestamps) in SQLite so repeat cycles don't re-fetch
//! or re-evaluate what's already been decided.

pub mod cache;
pub mod matcher;

pub use cache::DecisionCache;
pub use matcher::{KnownState, MatchEngine};
