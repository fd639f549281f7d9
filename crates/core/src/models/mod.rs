//! Core domain models for cross-seed: Searchee, Candidate, TorrentMetadata,
//! Decision, SearcheeTimestamp, IndexerRecord.

pub mod candidate;
pub mod decision;
pub mod indexer;
pub mod searchee;
pub mod torrent;

pub use candidate::*;
pub use decision::*;
pub use indexer::*;
pub use searchee::*;
pub use torrent::*;
