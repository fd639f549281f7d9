//! Torznab indexer gateway: capability probing, search dispatch, response
//! parsing, and per-indexer rate limiting/backoff.

pub mod torznab;
pub mod xml;

pub use torznab::{
    apply_backoff, reset_backoff, RateLimiter, SearchMode, SearchQuery, SharedTorznabClient, TorznabClient,
};
