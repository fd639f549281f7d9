//! Embedded SQLite pool and schema migrations backing the decision cache.

pub mod migrations;
pub mod pool;

pub use migrations::run_migrations;
pub use pool::{create_pool, PoolConfig, PoolMetrics, PoolMonitor};
