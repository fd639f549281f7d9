//! The persistent decision cache: records per-(searchee, candidate) verdicts
//! and per-searchee last-search timestamps.
//!
//! Grounded on the teacher's `repositories/indexer.rs` (raw `sqlx::query` +
//! `Row::try_get`, one method per operation) with Postgres `$1` placeholders
//! swapped for SQLite's `?`.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use cross_seed_core::error::DecisionKind;
use cross_seed_core::models::{Decision, DispatchJobState, IndexerCategory, IndexerRecord, SearcheeTimestamp};
use cross_seed_core::RetentionConfig;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::time::Duration;

pub struct DecisionCache {
    pool: SqlitePool,
    retention: RetentionConfig,
}

impl DecisionCache {
    pub fn new(pool: SqlitePool, retention: RetentionConfig) -> Self {
        Self { pool, retention }
    }

    /// Upsert a decision, bumping `last_seen`.
    pub async fn record_decision(
        &self,
        searchee_name: &str,
        indexer_id: i64,
        guid: &str,
        decision: DecisionKind,
        info_hash: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO decision (searchee_name, indexer_id, guid, decision, info_hash, first_seen, last_seen)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(searchee_name, indexer_id, guid)
            DO UPDATE SET decision = excluded.decision, info_hash = excluded.info_hash, last_seen = excluded.last_seen
            "#,
        )
        .bind(searchee_name)
        .bind(indexer_id)
        .bind(guid)
        .bind(decision.as_str())
        .bind(info_hash)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Look up a cached decision, honoring retention: a stale
    /// DOWNLOAD_FAILED decision is treated as absent so it gets re-checked.
    pub async fn has_decision(
        &self,
        searchee_name: &str,
        indexer_id: i64,
        guid: &str,
    ) -> Result<Option<Decision>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT searchee_name, indexer_id, guid, decision, info_hash, first_seen, last_seen \
             FROM decision WHERE searchee_name = ? AND indexer_id = ? AND guid = ?",
        )
        .bind(searchee_name)
        .bind(indexer_id)
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let decision = row_to_decision(&row);

        if decision.decision == DecisionKind::DownloadFailed {
            let recheck_after = decision.last_seen
                + ChronoDuration::from_std(self.retention.download_failed_recheck).unwrap_or_default();
            if Utc::now() >= recheck_after {
                return Ok(None);
            }
        }

        Ok(Some(decision))
    }

    pub async fn mark_searched(&self, searchee_name: &str, timestamp: DateTime<Utc>) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO searchee_timestamp (searchee_name, first_searched, last_searched)
            VALUES (?, ?, ?)
            ON CONFLICT(searchee_name)
            DO UPDATE SET last_searched = excluded.last_searched
            "#,
        )
        .bind(searchee_name)
        .bind(timestamp.to_rfc3339())
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// The due searchee with the globally oldest `last_searched`, never-searched
    /// names sorting first. `candidates` scopes the search to names that still
    /// exist on disk this cycle; ordering comes entirely from the query.
    pub async fn next_due_searchee(
        &self,
        candidates: &[String],
        cadence: std::time::Duration,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, sqlx::Error> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let placeholders = candidates.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT searchee_name, last_searched FROM searchee_timestamp \
             WHERE searchee_name IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for name in candidates {
            query = query.bind(name);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut seen: std::collections::HashMap<String, DateTime<Utc>> = std::collections::HashMap::new();
        for row in rows {
            let name: String = row.try_get("searchee_name")?;
            let last_searched: String = row.try_get("last_searched")?;
            let last_searched = DateTime::parse_from_rfc3339(&last_searched)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now);
            seen.insert(name, last_searched);
        }

        let mut best: Option<(String, Option<DateTime<Utc>>)> = None;
        for name in candidates {
            let last_searched = seen.get(name).copied();
            let due = match last_searched {
                None => true,
                Some(ts) => ts + ChronoDuration::from_std(cadence).unwrap_or_default() < now,
            };
            if !due {
                continue;
            }

            match &best {
                None => best = Some((name.clone(), last_searched)),
                Some((_, best_ts)) => {
                    let is_older = match (last_searched, best_ts) {
                        (None, _) => true,
                        (Some(_), None) => false,
                        (Some(a), Some(b)) => a < *b,
                    };
                    if is_older {
                        best = Some((name.clone(), last_searched));
                    }
                }
            }
        }

        Ok(best.map(|(name, _)| name))
    }

    pub async fn get_timestamp(&self, searchee_name: &str) -> Result<Option<SearcheeTimestamp>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT searchee_name, first_searched, last_searched FROM searchee_timestamp WHERE searchee_name = ?",
        )
        .bind(searchee_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| SearcheeTimestamp {
            searchee_name: row.get("searchee_name"),
            first_searched: parse_ts(row.get("first_searched")),
            last_searched: parse_ts(row.get("last_searched")),
        }))
    }

    /// Record an action-dispatcher outcome. SUCCESS/CONFLICT clear any
    /// pending retry; CLIENT_ERROR schedules the next attempt with doubling
    /// backoff up to `retry_ceiling`, per §4.8's CLIENT_ERROR requeue rule.
    pub async fn record_dispatch_outcome(
        &self,
        searchee_name: &str,
        indexer_id: i64,
        guid: &str,
        state: DispatchJobState,
        retry_ceiling: Duration,
        last_error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        let previous_retries: Option<i64> = sqlx::query(
            "SELECT retry_count FROM job_status WHERE searchee_name = ? AND indexer_id = ? AND guid = ?",
        )
        .bind(searchee_name)
        .bind(indexer_id)
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| row.try_get::<i64, _>("retry_count"))
        .transpose()?;

        let (retry_count, next_retry_at): (i64, Option<DateTime<Utc>>) = match state {
            DispatchJobState::ClientError => {
                let retry_count = previous_retries.unwrap_or(0) + 1;
                let exponent = retry_count.clamp(0, 10) as u32;
                let backoff = Duration::from_secs(30)
                    .saturating_mul(2u32.saturating_pow(exponent))
                    .min(retry_ceiling);
                (retry_count, Some(now + ChronoDuration::from_std(backoff).unwrap_or_default()))
            }
            DispatchJobState::Success | DispatchJobState::Conflict => (0, None),
        };

        sqlx::query(
            r#"
            INSERT INTO job_status (searchee_name, indexer_id, guid, state, retry_count, next_retry_at, last_error, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(searchee_name, indexer_id, guid)
            DO UPDATE SET state = excluded.state, retry_count = excluded.retry_count,
                next_retry_at = excluded.next_retry_at, last_error = excluded.last_error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(searchee_name)
        .bind(indexer_id)
        .bind(guid)
        .bind(state.as_str())
        .bind(retry_count)
        .bind(next_retry_at.map(|t| t.to_rfc3339()))
        .bind(last_error)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether an accepted match is ready to be (re)dispatched: true if it's
    /// never been attempted, or its CLIENT_ERROR backoff window has elapsed.
    /// False once a dispatch has already reached SUCCESS or CONFLICT.
    pub async fn dispatch_is_due(
        &self,
        searchee_name: &str,
        indexer_id: i64,
        guid: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let row = sqlx::query(
            "SELECT state, next_retry_at FROM job_status WHERE searchee_name = ? AND indexer_id = ? AND guid = ?",
        )
        .bind(searchee_name)
        .bind(indexer_id)
        .bind(guid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(true) };
        let state: String = row.try_get("state")?;
        if state != DispatchJobState::ClientError.as_str() {
            return Ok(false);
        }

        let next_retry_at: Option<String> = row.try_get("next_retry_at")?;
        Ok(match next_retry_at {
            None => true,
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|d| now >= d.with_timezone(&Utc))
                .unwrap_or(true),
        })
    }

    /// Upsert the configured-indexer row `indexer_category` foreign-keys against.
    pub async fn upsert_indexer(&self, record: &IndexerRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO indexer (id, name, url, apikey, active, capabilities_json, disabled_until)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name, url = excluded.url, apikey = excluded.apikey,
                active = excluded.active, disabled_until = excluded.disabled_until
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(&record.url)
        .bind(&record.apikey)
        .bind(record.active)
        .bind(record.capabilities.as_ref().and_then(|c| serde_json::to_string(c).ok()))
        .bind(record.disabled_until.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist the categories an indexer advertised on its last `t=caps` probe.
    pub async fn record_indexer_categories(&self, categories: &[IndexerCategory]) -> Result<(), sqlx::Error> {
        for category in categories {
            sqlx::query(
                r#"
                INSERT INTO indexer_category (indexer_id, category_id, media_type)
                VALUES (?, ?, ?)
                ON CONFLICT(indexer_id, category_id) DO UPDATE SET media_type = excluded.media_type
                "#,
            )
            .bind(category.indexer_id)
            .bind(category.category_id)
            .bind(&category.media_type)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

fn parse_ts(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Decision {
    let decision_str: String = row.get("decision");
    Decision {
        searchee_name: row.get("searchee_name"),
        indexer_id: row.get("indexer_id"),
        guid: row.get("guid"),
        decision: DecisionKind::from_str(&decision_str).unwrap_or(DecisionKind::NoMatch),
        info_hash: row.get("info_hash"),
        first_seen: parse_ts(row.get("first_seen")),
        last_seen: parse_ts(row.get("last_seen")),
    }
}
