//! SQLite connection pool for the decision cache.
//!
//! Adapted from the teacher's `database/pool.rs`: same `PoolConfig`
//! (production/development presets) and `PoolMonitor` shape, `PgPool`/
//! `PgPoolOptions` replaced with `SqlitePool`/`SqlitePoolOptions` and the
//! `after_connect` hook trimmed to the WAL pragmas a single-file embedded
//! database actually needs (Postgres-only settings like `statement_timeout`
//! don't apply here).

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Executor;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
    pub test_on_acquire: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            min_connections: 1,
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
            test_on_acquire: true,
        }
    }
}

impl PoolConfig {
    pub fn production() -> Self {
        Self {
            max_connections: 16,
            min_connections: 2,
            connection_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(300),
            max_lifetime: Duration::from_secs(3600),
            test_on_acquire: true,
        }
    }

    pub fn development() -> Self {
        Self {
            max_connections: 4,
            min_connections: 1,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(900),
            max_lifetime: Duration::from_secs(3600),
            test_on_acquire: false,
        }
    }
}

/// Open (creating if absent) a WAL-journaled SQLite database at `path`.
pub async fn create_pool(database_path: &std::path::Path, config: PoolConfig) -> Result<SqlitePool, sqlx::Error> {
    info!(
        path = %database_path.display(),
        max_connections = config.max_connections,
        "opening decision cache database"
    );

    let url = format!("sqlite://{}?mode=rwc", database_path.display());

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .test_before_acquire(config.test_on_acquire)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("PRAGMA journal_mode=WAL;").await?;
                conn.execute("PRAGMA foreign_keys=ON;").await?;
                conn.execute("PRAGMA busy_timeout=5000;").await?;
                debug!("sqlite connection configured with WAL journaling");
                Ok(())
            })
        })
        .connect(&url)
        .await?;

    Ok(pool)
}

pub struct PoolMonitor {
    pool: SqlitePool,
}

impl PoolMonitor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn start_monitoring(self, interval: Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval);
            loop {
                interval.tick().await;
                self.log_pool_metrics();
            }
        });
    }

    fn log_pool_metrics(&self) {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        let usage = if size > 0 {
            ((size - idle) as f64 / size as f64 * 100.0) as u32
        } else {
            0
        };

        debug!("decision cache pool: {} connections ({} idle, {}% usage)", size, idle, usage);
        if usage > 80 {
            warn!("decision cache pool usage is high: {}%", usage);
        }
    }

    pub fn get_metrics(&self) -> PoolMetrics {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;
        PoolMetrics {
            total_connections: size,
            idle_connections: idle,
            active_connections: size - idle,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub total_connections: u32,
    pub idle_connections: u32,
    pub active_connections: u32,
}
