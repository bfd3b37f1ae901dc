use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Thread-safe database handle wrapping a SQLite connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create the database at the given path with WAL mode.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Execute a closure with access to the database connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, rusqlite::Error>
    where
        F: FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    {
        let conn = self.conn.lock().expect("database mutex poisoned");
        f(&conn)
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS call_log (
    id                   TEXT PRIMARY KEY,
    timestamp            TEXT NOT NULL,
    provider             TEXT NOT NULL,
    endpoint             TEXT NOT NULL,
    key_owner            TEXT NOT NULL,
    duration_ms          INTEGER NOT NULL DEFAULT 0,
    success              INTEGER NOT NULL,
    error                TEXT,
    tokens_used          INTEGER NOT NULL DEFAULT 0,
    rate_limit_remaining INTEGER,
    rate_limit_reset     INTEGER
);
CREATE INDEX IF NOT EXISTS idx_call_log_timestamp ON call_log(timestamp);
CREATE INDEX IF NOT EXISTS idx_call_log_provider ON call_log(provider);
CREATE INDEX IF NOT EXISTS idx_call_log_success ON call_log(success);

CREATE TABLE IF NOT EXISTS usage_quota (
    provider    TEXT NOT NULL,
    key_owner   TEXT NOT NULL,
    period      TEXT NOT NULL,
    calls       INTEGER NOT NULL DEFAULT 0,
    tokens      INTEGER NOT NULL DEFAULT 0,
    errors      INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (provider, key_owner, period)
);

CREATE TABLE IF NOT EXISTS fallback_log (
    id                TEXT PRIMARY KEY,
    timestamp         TEXT NOT NULL,
    primary_provider  TEXT NOT NULL,
    fallback_provider TEXT NOT NULL,
    success           INTEGER NOT NULL,
    original_error    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_fallback_log_timestamp ON fallback_log(timestamp);
"#;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_schema() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('call_log', 'usage_quota', 'fallback_log')",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_open_creates_file_and_is_reopenable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.db");

        {
            let db = Database::open(&path).unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO usage_quota (provider, key_owner, period, calls) \
                     VALUES ('cohere', 'alice', '2025-01', 3)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        }

        // Reopen and verify the row survived; migrations must be idempotent.
        let db = Database::open(&path).unwrap();
        let calls: i64 = db
            .with_conn(|conn| {
                conn.query_row(
                    "SELECT calls FROM usage_quota WHERE provider = 'cohere'",
                    [],
                    |row| row.get(0),
                )
            })
            .unwrap();
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_quota_composite_key_is_unique() {
        let db = Database::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO usage_quota (provider, key_owner, period) \
                 VALUES ('cohere', 'alice', '2025-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let dup = db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO usage_quota (provider, key_owner, period) \
                 VALUES ('cohere', 'alice', '2025-01')",
                [],
            )?;
            Ok(())
        });
        assert!(dup.is_err());
    }
}
