//! Seen-Item Tracker
//!
//! Durable membership set over post identifiers, the exactly-once
//! backbone of the cycle. The full set is loaded into memory at startup
//! for constant-cost lookups; every mark is persisted before it is added
//! to the cache, so a crash between the two loses nothing.
//!
//! No expiry policy: ids are never removed. Acceptable under the bounded
//! feed-volume assumption documented in DESIGN.md.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;

use super::database::Database;

pub struct SeenTracker {
    ids: HashSet<String>,
}

impl SeenTracker {
    /// Load the full seen set from durable storage.
    pub fn load(db: &Database) -> Result<Self> {
        let ids = db.load_seen_ids()?.into_iter().collect();
        Ok(Self { ids })
    }

    /// Membership test against the in-memory cache.
    pub fn contains(&self, post_id: &str) -> bool {
        self.ids.contains(post_id)
    }

    /// Mark a post id as seen. Idempotent: a second call with the same id
    /// leaves both the database and the cache unchanged.
    pub fn mark(&mut self, db: &Database, post_id: &str) -> Result<()> {
        if self.ids.contains(post_id) {
            return Ok(());
        }
        db.insert_seen(post_id, &Utc::now().to_rfc3339())?;
        self.ids.insert(post_id.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_twice_equals_mark_once() {
        let db = Database::open_in_memory().unwrap();
        let mut tracker = SeenTracker::load(&db).unwrap();

        tracker.mark(&db, "p1").unwrap();
        let after_first = (tracker.len(), db.seen_count().unwrap());
        tracker.mark(&db, "p1").unwrap();
        let after_second = (tracker.len(), db.seen_count().unwrap());

        assert_eq!(after_first, after_second);
        assert_eq!(after_second, (1, 1));
    }

    #[test]
    fn test_contains_reflects_marks() {
        let db = Database::open_in_memory().unwrap();
        let mut tracker = SeenTracker::load(&db).unwrap();
        assert!(!tracker.contains("p1"));
        tracker.mark(&db, "p1").unwrap();
        assert!(tracker.contains("p1"));
        assert!(!tracker.contains("p2"));
    }

    #[test]
    fn test_load_restores_marks_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db").to_string_lossy().to_string();

        {
            let db = Database::open(&path).unwrap();
            let mut tracker = SeenTracker::load(&db).unwrap();
            tracker.mark(&db, "p1").unwrap();
            tracker.mark(&db, "p2").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let tracker = SeenTracker::load(&db).unwrap();
        assert!(tracker.contains("p1"));
        assert!(tracker.contains("p2"));
        assert_eq!(tracker.len(), 2);
    }
}
