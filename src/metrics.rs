//! Metrics Store
//!
//! Persistence for call telemetry: the append-only call log, the
//! per-(provider, owner, period) usage counters, and the fallback-event
//! log, plus the aggregation queries the report generator and dashboard
//! layer read from.
//!
//! Quota correctness under concurrent callers is delegated entirely to a
//! single SQL upsert-increment statement; no client-side read-modify-write
//! is performed anywhere in this module.

use chrono::{DateTime, Utc};
use rusqlite::{Row, params};
use serde::Serialize;

use crate::db::Database;
use crate::error::GatewayError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Immutable record of one executed provider invocation. Written exactly
/// once per gateway call; never mutated or deleted in normal operation.
#[derive(Debug, Clone, Serialize)]
pub struct CallLogEntry {
    pub id: String,
    /// UTC, `"%Y-%m-%d %H:%M:%S"`.
    pub timestamp: String,
    pub provider: String,
    pub endpoint: String,
    pub key_owner: String,
    pub duration_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub tokens_used: u64,
    pub rate_limit_remaining: Option<i64>,
    pub rate_limit_reset: Option<i64>,
}

/// Immutable record of a secondary-provider attempt after a primary
/// failure. Stored independently of the call log, with no foreign key;
/// it lets the report distinguish total failures from failures masked by
/// a working fallback.
#[derive(Debug, Clone, Serialize)]
pub struct FallbackEvent {
    pub id: String,
    pub timestamp: String,
    pub primary_provider: String,
    pub fallback_provider: String,
    pub success: bool,
    pub original_error: String,
}

/// One aggregated row of `usage_stats`, grouped by (provider, owner).
#[derive(Debug, Clone, Serialize)]
pub struct UsageStat {
    pub provider: String,
    pub key_owner: String,
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub total_tokens: u64,
    pub avg_duration_ms: f64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
}

/// Average response time of successful calls on one calendar day.
#[derive(Debug, Clone, Serialize)]
pub struct DailyResponseTime {
    pub provider: String,
    /// `"YYYY-MM-DD"`.
    pub date: String,
    pub avg_duration_ms: f64,
}

// ---------------------------------------------------------------------------
// Time helpers
// ---------------------------------------------------------------------------

/// The current quota accounting bucket, a calendar month (`"YYYY-MM"`, UTC).
pub fn current_period() -> String {
    Utc::now().format("%Y-%m").to_string()
}

/// Format a timestamp the way the store persists and compares them.
pub fn format_timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// MetricsStore
// ---------------------------------------------------------------------------

/// Query and write interface over the metering tables.
pub struct MetricsStore {
    db: Database,
}

impl MetricsStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // -- writes --------------------------------------------------------------

    /// Append one call log entry. Pure insert; ordering across calls is
    /// guaranteed only by `timestamp`.
    pub async fn log_call(&self, entry: &CallLogEntry) -> Result<(), GatewayError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO call_log (id, timestamp, provider, endpoint, key_owner, \
                 duration_ms, success, error, tokens_used, rate_limit_remaining, rate_limit_reset) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    entry.id,
                    entry.timestamp,
                    entry.provider,
                    entry.endpoint,
                    entry.key_owner,
                    entry.duration_ms,
                    entry.success,
                    entry.error,
                    entry.tokens_used,
                    entry.rate_limit_remaining,
                    entry.rate_limit_reset,
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    /// Append one fallback event.
    pub async fn log_fallback(&self, event: &FallbackEvent) -> Result<(), GatewayError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO fallback_log (id, timestamp, primary_provider, \
                 fallback_provider, success, original_error) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    event.id,
                    event.timestamp,
                    event.primary_provider,
                    event.fallback_provider,
                    event.success,
                    event.original_error,
                ],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    /// Atomically add to the usage counters for one (provider, owner, period)
    /// triple, creating the row on first use.
    ///
    /// This is the load-bearing concurrency guarantee of the subsystem: the
    /// whole upsert-increment is one SQL statement, so N concurrent callers
    /// sum exactly regardless of interleaving.
    pub async fn increment_usage(
        &self,
        provider: &str,
        owner: &str,
        period: &str,
        calls: u64,
        tokens: u64,
        errors: u64,
    ) -> Result<(), GatewayError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO usage_quota (provider, key_owner, period, calls, tokens, errors, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now')) \
                 ON CONFLICT(provider, key_owner, period) DO UPDATE SET \
                   calls = calls + excluded.calls, \
                   tokens = tokens + excluded.tokens, \
                   errors = errors + excluded.errors, \
                   updated_at = excluded.updated_at",
                params![provider, owner, period, calls, tokens, errors],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    // -- queries -------------------------------------------------------------

    /// Aggregate the call log over the half-open window `[start, end)`,
    /// grouped by (provider, owner) and optionally filtered.
    pub async fn usage_stats(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        provider: Option<&str>,
        owner: Option<&str>,
    ) -> Result<Vec<UsageStat>, GatewayError> {
        let mut bind_values: Vec<String> = vec![format_timestamp(start), format_timestamp(end)];
        let mut where_sql = String::from("WHERE timestamp >= ?1 AND timestamp < ?2");

        if let Some(provider) = provider {
            bind_values.push(provider.to_string());
            where_sql.push_str(&format!(" AND provider = ?{}", bind_values.len()));
        }
        if let Some(owner) = owner {
            bind_values.push(owner.to_string());
            where_sql.push_str(&format!(" AND key_owner = ?{}", bind_values.len()));
        }

        let sql = format!(
            "SELECT provider, key_owner, \
                    COUNT(*) AS total_calls, \
                    SUM(success) AS successful_calls, \
                    COUNT(*) - SUM(success) AS failed_calls, \
                    SUM(tokens_used) AS total_tokens, \
                    AVG(duration_ms) AS avg_duration_ms, \
                    MIN(duration_ms) AS min_duration_ms, \
                    MAX(duration_ms) AS max_duration_ms \
             FROM call_log {where_sql} \
             GROUP BY provider, key_owner \
             ORDER BY provider, key_owner"
        );

        let stats = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let p: Vec<&dyn rusqlite::ToSql> =
                bind_values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            let rows = stmt.query_map(p.as_slice(), |row| {
                Ok(UsageStat {
                    provider: row.get(0)?,
                    key_owner: row.get(1)?,
                    total_calls: row.get(2)?,
                    successful_calls: row.get(3)?,
                    failed_calls: row.get(4)?,
                    total_tokens: row.get(5)?,
                    avg_duration_ms: row.get(6)?,
                    min_duration_ms: row.get(7)?,
                    max_duration_ms: row.get(8)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;

        Ok(stats)
    }

    /// Calls recorded against a provider for one period, summed across
    /// owners. Returns 0 when no row exists; absence is not an error.
    pub async fn monthly_usage(&self, provider: &str, period: &str) -> Result<u64, GatewayError> {
        let calls = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT COALESCE(SUM(calls), 0) FROM usage_quota \
                 WHERE provider = ?1 AND period = ?2",
                params![provider, period],
                |row| row.get::<_, u64>(0),
            )
        })?;
        Ok(calls)
    }

    /// Most recent failed calls, newest first.
    pub async fn recent_errors(&self, limit: u32) -> Result<Vec<CallLogEntry>, GatewayError> {
        let entries = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, provider, endpoint, key_owner, duration_ms, \
                        success, error, tokens_used, rate_limit_remaining, rate_limit_reset \
                 FROM call_log WHERE success = 0 \
                 ORDER BY timestamp DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_entry)?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(entries)
    }

    /// Fallback events within the half-open window `[start, end)`, newest
    /// first.
    pub async fn fallback_events(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<FallbackEvent>, GatewayError> {
        let events = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, primary_provider, fallback_provider, success, original_error \
                 FROM fallback_log WHERE timestamp >= ?1 AND timestamp < ?2 \
                 ORDER BY timestamp DESC",
            )?;
            let rows = stmt.query_map(
                params![format_timestamp(start), format_timestamp(end)],
                |row| {
                    Ok(FallbackEvent {
                        id: row.get(0)?,
                        timestamp: row.get(1)?,
                        primary_provider: row.get(2)?,
                        fallback_provider: row.get(3)?,
                        success: row.get(4)?,
                        original_error: row.get(5)?,
                    })
                },
            )?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;
        Ok(events)
    }

    /// Average duration of successful calls per provider per calendar day,
    /// ascending by date (shaped for charting).
    pub async fn response_times(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        provider: Option<&str>,
    ) -> Result<Vec<DailyResponseTime>, GatewayError> {
        let mut bind_values: Vec<String> = vec![format_timestamp(start), format_timestamp(end)];
        let mut where_sql =
            String::from("WHERE success = 1 AND timestamp >= ?1 AND timestamp < ?2");

        if let Some(provider) = provider {
            bind_values.push(provider.to_string());
            where_sql.push_str(&format!(" AND provider = ?{}", bind_values.len()));
        }

        let sql = format!(
            "SELECT provider, date(timestamp) AS day, AVG(duration_ms) AS avg_duration_ms \
             FROM call_log {where_sql} \
             GROUP BY provider, date(timestamp) \
             ORDER BY day ASC, provider ASC"
        );

        let times = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let p: Vec<&dyn rusqlite::ToSql> =
                bind_values.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
            let rows = stmt.query_map(p.as_slice(), |row| {
                Ok(DailyResponseTime {
                    provider: row.get(0)?,
                    date: row.get(1)?,
                    avg_duration_ms: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })?;

        Ok(times)
    }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<CallLogEntry> {
    Ok(CallLogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        provider: row.get(2)?,
        endpoint: row.get(3)?,
        key_owner: row.get(4)?,
        duration_ms: row.get(5)?,
        success: row.get(6)?,
        error: row.get(7)?,
        tokens_used: row.get(8)?,
        rate_limit_remaining: row.get(9)?,
        rate_limit_reset: row.get(10)?,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Property-based tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    /// Per-writer (calls, tokens, errors) increments.
    fn increments_strategy() -> impl Strategy<Value = Vec<(u64, u64, u64)>> {
        proptest::collection::vec((1u64..20, 0u64..500, 0u64..2), 1..25)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Issuing the increments concurrently against a single
        /// (provider, owner, period) triple must leave counters equal to the
        /// arithmetic sum, independent of interleaving order.
        #[test]
        fn prop_concurrent_increments_sum_exactly(increments in increments_strategy()) {
            let expected_calls: u64 = increments.iter().map(|i| i.0).sum();
            let expected_tokens: u64 = increments.iter().map(|i| i.1).sum();
            let expected_errors: u64 = increments.iter().map(|i| i.2).sum();

            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            let (calls, tokens, errors) = rt.block_on(async {
                let store = Arc::new(MetricsStore::new(
                    crate::db::Database::open_in_memory().unwrap(),
                ));

                let mut handles = Vec::new();
                for (calls, tokens, errors) in increments {
                    let store = Arc::clone(&store);
                    handles.push(tokio::spawn(async move {
                        store
                            .increment_usage("cohere", "alice", "2025-03", calls, tokens, errors)
                            .await
                            .unwrap();
                    }));
                }
                for result in futures::future::join_all(handles).await {
                    result.unwrap();
                }

                store
                    .db
                    .with_conn(|conn| {
                        conn.query_row(
                            "SELECT calls, tokens, errors FROM usage_quota \
                             WHERE provider = 'cohere' AND key_owner = 'alice' \
                             AND period = '2025-03'",
                            [],
                            |row| {
                                Ok((
                                    row.get::<_, u64>(0)?,
                                    row.get::<_, u64>(1)?,
                                    row.get::<_, u64>(2)?,
                                ))
                            },
                        )
                    })
                    .unwrap()
            });

            prop_assert_eq!(calls, expected_calls);
            prop_assert_eq!(tokens, expected_tokens);
            prop_assert_eq!(errors, expected_errors);
        }
    }
}
