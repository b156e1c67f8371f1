//! Agent Database
//!
//! SQLite-backed persistent state for the agent.
//! Uses rusqlite for synchronous, single-process access. Four tables:
//! the seen-post membership set, the append-only action log, the budget
//! counters, and the quota-event record. Crash safety during writes is
//! delegated to SQLite journaling; on read, a row that fails to decode
//! is skipped rather than failing the whole load.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS seen_posts (
    post_id      TEXT PRIMARY KEY,
    processed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS actions (
    id        TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    kind      TEXT NOT NULL,
    target_id TEXT,
    payload   TEXT,
    outcome   TEXT
);

CREATE TABLE IF NOT EXISTS budget_counters (
    name       TEXT PRIMARY KEY,
    value      INTEGER NOT NULL,
    scope_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quota_events (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp  TEXT NOT NULL,
    limit_kind TEXT NOT NULL,
    detail     TEXT NOT NULL
);
"#;

/// Name of the daily post counter row in `budget_counters`.
pub const POSTS_TODAY_COUNTER: &str = "posts_today";

/// The agent's SQLite database handle.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `db_path` and initialize the schema.
    pub fn open(db_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create db directory: {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database: {db_path}"))?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        // Actions and counters must be on disk before the call returns.
        conn.pragma_update(None, "synchronous", "FULL")?;

        conn.execute_batch(CREATE_TABLES)
            .context("failed to create tables")?;

        Ok(Self { conn })
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)
            .context("failed to create tables")?;
        Ok(Self { conn })
    }

    // ─── Seen Posts ──────────────────────────────────────────────

    /// Insert a post id into the seen set. A no-op if already present.
    pub fn insert_seen(&self, post_id: &str, processed_at: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO seen_posts (post_id, processed_at) VALUES (?1, ?2)",
            params![post_id, processed_at],
        )?;
        Ok(())
    }

    /// Load every seen post id, for the startup cache.
    pub fn load_seen_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT post_id FROM seen_posts")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    pub fn seen_count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM seen_posts", [], |row| row.get(0))?;
        Ok(count)
    }

    // ─── Actions ─────────────────────────────────────────────────

    pub fn insert_action(
        &self,
        id: &str,
        timestamp: &str,
        kind: &str,
        target_id: Option<&str>,
        payload: Option<&str>,
        outcome: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO actions (id, timestamp, kind, target_id, payload, outcome)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, timestamp, kind, target_id, payload, outcome],
        )?;
        Ok(())
    }

    /// Count actions of `kind` whose timestamp starts with `date_prefix`
    /// (an ISO date, e.g. "2026-08-26").
    pub fn count_actions_on(&self, kind: &str, date_prefix: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM actions WHERE kind = ?1 AND timestamp LIKE ?2 || '%'",
            params![kind, date_prefix],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Fetch the most recent `limit` raw action rows, newest first.
    pub fn recent_action_rows(
        &self,
        limit: i64,
    ) -> Result<Vec<(String, String, String, Option<String>, Option<String>, Option<String>)>>
    {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, kind, target_id, payload, outcome
             FROM actions ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ─── Budget Counters ─────────────────────────────────────────

    /// Read a named counter and the date it is scoped to.
    pub fn get_counter(&self, name: &str) -> Result<Option<(u32, String)>> {
        let result = self
            .conn
            .query_row(
                "SELECT value, scope_date FROM budget_counters WHERE name = ?1",
                params![name],
                |row| Ok((row.get::<_, i64>(0)? as u32, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(result)
    }

    /// Write a named counter together with its scope date. Durable before
    /// return; the daily budget must survive a crash mid-cycle.
    pub fn set_counter(&self, name: &str, value: u32, scope_date: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO budget_counters (name, value, scope_date)
             VALUES (?1, ?2, ?3)",
            params![name, value as i64, scope_date],
        )?;
        Ok(())
    }

    // ─── Quota Events ────────────────────────────────────────────

    pub fn insert_quota_event(
        &self,
        timestamp: &str,
        limit_kind: &str,
        detail: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO quota_events (timestamp, limit_kind, detail) VALUES (?1, ?2, ?3)",
            params![timestamp, limit_kind, detail],
        )?;
        Ok(())
    }

    pub fn quota_event_count(&self) -> Result<i64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM quota_events", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_seen_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.insert_seen("p1", "2026-08-26T00:00:00Z").unwrap();
        db.insert_seen("p1", "2026-08-26T01:00:00Z").unwrap();
        assert_eq!(db.seen_count().unwrap(), 1);
    }

    #[test]
    fn test_counter_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_counter(POSTS_TODAY_COUNTER).unwrap().is_none());
        db.set_counter(POSTS_TODAY_COUNTER, 2, "2026-08-26").unwrap();
        assert_eq!(
            db.get_counter(POSTS_TODAY_COUNTER).unwrap(),
            Some((2, "2026-08-26".to_string()))
        );
    }

    #[test]
    fn test_count_actions_on_filters_by_date_and_kind() {
        let db = Database::open_in_memory().unwrap();
        db.insert_action("a", "2026-08-26T10:00:00Z", "post_created", None, None, None)
            .unwrap();
        db.insert_action("b", "2026-08-25T10:00:00Z", "post_created", None, None, None)
            .unwrap();
        db.insert_action("c", "2026-08-26T11:00:00Z", "comment", None, None, None)
            .unwrap();
        assert_eq!(db.count_actions_on("post_created", "2026-08-26").unwrap(), 1);
    }

    #[test]
    fn test_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let path_str = path.to_string_lossy().to_string();

        {
            let db = Database::open(&path_str).unwrap();
            db.insert_seen("p1", "2026-08-26T00:00:00Z").unwrap();
            db.set_counter(POSTS_TODAY_COUNTER, 3, "2026-08-26").unwrap();
        }

        let db = Database::open(&path_str).unwrap();
        assert_eq!(db.load_seen_ids().unwrap(), vec!["p1".to_string()]);
        assert_eq!(
            db.get_counter(POSTS_TODAY_COUNTER).unwrap(),
            Some((3, "2026-08-26".to_string()))
        );
    }
}
