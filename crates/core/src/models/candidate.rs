//! The Candidate model: a release advertised by a Torznab indexer.
//!
//! Field shape follows the Torznab/Jackett RSS convention (the same fields
//! other Torznab-speaking Rust clients in the wild model their result types
//! on): a GUID unique within the indexer, a download link or magnet, and
//! optional torznab:attr-sourced metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub indexer_id: i64,
    pub indexer_name: String,
    pub guid: String,
    pub name: String,
    pub size: u64,
    pub link: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub info_hash: Option<String>,
    pub seeders: Option<i64>,
    pub category: Vec<i64>,
}
