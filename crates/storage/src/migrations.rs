//! Versioned SQL migration runner, applied once at startup.
//!
//! The teacher runs `sqlx::migrate!` against Postgres from its own
//! `migrations/` directory; this crate uses the same `sqlx` migration
//! mechanism, pointed at a sqlite-flavored `migrations/` directory instead.

use sqlx::sqlite::SqlitePool;

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
