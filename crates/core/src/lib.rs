//! Core domain models, error taxonomy, and resilience primitives for
//! cross-seed: the Searchee/Candidate/TorrentMetadata/Decision data model,
//! the release-name parser, configuration, retry/circuit-breaker helpers,
//! and logging setup shared by every other crate in the workspace.

pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod models;
pub mod parser;
pub mod retry;
pub mod tracing_init;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics, CircuitBreakerState};
pub use config::*;
pub use error::*;
pub use models::*;
pub use parser::{parse_release_name, MediaType, ParsedName};
pub use retry::{retry_with_backoff, RetryConfig, RetryPolicy};
pub use tracing_init::init_tracing;
