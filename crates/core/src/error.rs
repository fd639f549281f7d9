//! Error taxonomy for cross-seed.
//!
//! One variant family per failure class described by the matching/dispatch
//! pipeline. Transient failures are recovered locally by the owning
//! component (indexer backoff, client retry); only `ConfigurationError` and
//! `InvariantViolation` are expected to escape to the binary's top level.

use std::fmt;

/// The crate-wide result alias.
pub type Result<T> = std::result::Result<T, CrossSeedError>;

#[derive(Debug, thiserror::Error)]
pub enum CrossSeedError {
    /// Fatal at startup: missing apikey, unreachable arr on probe, invalid path.
    #[error("configuration error: {message}")]
    ConfigurationError { message: String },

    /// Timeout, 5xx, malformed response from an indexer. Recoverable by backoff.
    #[error("transient indexer error ({indexer}): {message}")]
    TransientIndexerError { indexer: String, message: String },

    /// 401/403 from an indexer. The indexer is disabled until reconfigured.
    #[error("permanent indexer error ({indexer}): {message}")]
    PermanentIndexerError { indexer: String, message: String },

    /// Download failed, non-torrent payload, bencode parse failure.
    #[error("candidate error: {message}")]
    CandidateError { message: String },

    /// A match was rejected for a reason the decision cache should remember.
    #[error("match rejected: {reason}")]
    MatchRejection { reason: String },

    /// Injection into a BitTorrent client failed.
    #[error("client error ({client}): {message}")]
    ClientError { client: String, message: String },

    /// Unexpected schema/state; aborts the current cycle only.
    #[error("invariant violation: {message}")]
    InvariantViolation { message: String },

    /// A single operation exceeded its deadline.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// A circuit breaker rejected the call because the service is unhealthy.
    #[error("circuit breaker open for {service}")]
    CircuitBreakerOpen { service: String },

    /// `retry_with_backoff` exhausted its attempt budget.
    #[error("{operation} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last_error: Box<CrossSeedError>,
    },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bencode decode error: {0}")]
    Bencode(String),

    #[error("xml parse error: {0}")]
    Xml(String),

    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CrossSeedError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    pub fn transient_indexer(indexer: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransientIndexerError {
            indexer: indexer.into(),
            message: message.into(),
        }
    }

    pub fn candidate(message: impl Into<String>) -> Self {
        Self::CandidateError {
            message: message.into(),
        }
    }

    pub fn client(client: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ClientError {
            client: client.into(),
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Tag used by the decision cache to record *why* a candidate was rejected.
    pub fn decision_tag(&self) -> &'static str {
        match self {
            Self::TransientIndexerError { .. } => "rate_limited",
            Self::CandidateError { .. } => "download_failed",
            Self::MatchRejection { .. } => "match_rejection",
            _ => "error",
        }
    }
}

/// The discrete verdicts the matcher/cache can record, per the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum DecisionKind {
    Match,
    MatchPartial,
    MatchSizeOnly,
    NoMatch,
    InfoHashAlreadyExists,
    SizeMismatch,
    FileTreeMismatch,
    RateLimited,
    DownloadFailed,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Match => "MATCH",
            Self::MatchPartial => "MATCH_PARTIAL",
            Self::MatchSizeOnly => "MATCH_SIZE_ONLY",
            Self::NoMatch => "NO_MATCH",
            Self::InfoHashAlreadyExists => "INFO_HASH_ALREADY_EXISTS",
            Self::SizeMismatch => "SIZE_MISMATCH",
            Self::FileTreeMismatch => "FILE_TREE_MISMATCH",
            Self::RateLimited => "RATE_LIMITED",
            Self::DownloadFailed => "DOWNLOAD_FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "MATCH" => Self::Match,
            "MATCH_PARTIAL" => Self::MatchPartial,
            "MATCH_SIZE_ONLY" => Self::MatchSizeOnly,
            "NO_MATCH" => Self::NoMatch,
            "INFO_HASH_ALREADY_EXISTS" => Self::InfoHashAlreadyExists,
            "SIZE_MISMATCH" => Self::SizeMismatch,
            "FILE_TREE_MISMATCH" => Self::FileTreeMismatch,
            "RATE_LIMITED" => Self::RateLimited,
            "DOWNLOAD_FAILED" => Self::DownloadFailed,
            _ => return None,
        })
    }

    /// Whether this decision is one the action dispatcher should act on.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Match | Self::MatchPartial | Self::MatchSizeOnly)
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
