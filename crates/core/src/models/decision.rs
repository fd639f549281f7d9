//! The Decision and SearcheeTimestamp records persisted by the decision cache.

use crate::error::DecisionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub searchee_name: String,
    pub indexer_id: i64,
    pub guid: String,
    pub decision: DecisionKind,
    pub info_hash: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearcheeTimestamp {
    pub searchee_name: String,
    pub first_searched: DateTime<Utc>,
    pub last_searched: DateTime<Utc>,
}

/// The action dispatcher's delivery state for an accepted match, tracked
/// separately from the cached `Decision` so a CLIENT_ERROR retry doesn't
/// disturb the MATCH/MATCH_PARTIAL/MATCH_SIZE_ONLY verdict that earned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchJobState {
    Success,
    Conflict,
    ClientError,
}

impl DispatchJobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Conflict => "CONFLICT",
            Self::ClientError => "CLIENT_ERROR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "SUCCESS" => Self::Success,
            "CONFLICT" => Self::Conflict,
            "CLIENT_ERROR" => Self::ClientError,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJob {
    pub searchee_name: String,
    pub indexer_id: i64,
    pub guid: String,
    pub state: DispatchJobState,
    pub retry_count: i64,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
