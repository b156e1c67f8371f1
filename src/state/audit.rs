//! Audit Log
//!
//! Append-only durable record of every action the agent takes, plus the
//! separate quota-event artifact. `append` completes its durable write
//! before returning; nothing is buffered in memory. Entries are never
//! edited or deleted. The core exposes no query API; the read helpers
//! here exist for tests and operator tooling.

use anyhow::{Context, Result};
use tracing::warn;

use crate::types::{ActionEntry, ActionKind, QuotaEvent};

use super::database::Database;

/// Append one entry to the action log. Durable before return.
pub fn append(db: &Database, entry: &ActionEntry) -> Result<()> {
    let payload = entry
        .payload
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("failed to serialize action payload")?;

    db.insert_action(
        &entry.id,
        &entry.timestamp,
        entry.kind.as_str(),
        entry.target_id.as_deref(),
        payload.as_deref(),
        entry.outcome.as_deref(),
    )
    .context("failed to append audit entry")?;
    Ok(())
}

/// Record a quota condition in the quota-event artifact.
pub fn record_quota_event(db: &Database, event: &QuotaEvent) -> Result<()> {
    db.insert_quota_event(&event.timestamp, &event.limit_kind, &event.detail)
        .context("failed to record quota event")?;
    Ok(())
}

/// Count actions of one kind on a calendar day (ISO date string).
pub fn count_for_day(db: &Database, kind: ActionKind, date: &str) -> Result<i64> {
    db.count_actions_on(kind.as_str(), date)
}

/// The most recent `limit` entries, newest first. A row whose kind or
/// payload no longer decodes is logged and skipped, never a load failure.
pub fn recent(db: &Database, limit: i64) -> Result<Vec<ActionEntry>> {
    let rows = db.recent_action_rows(limit)?;
    let mut entries = Vec::with_capacity(rows.len());

    for (id, timestamp, kind_str, target_id, payload_str, outcome) in rows {
        let Some(kind) = ActionKind::parse(&kind_str) else {
            warn!("skipping audit row {id} with unknown kind '{kind_str}'");
            continue;
        };
        let payload = match payload_str {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!("skipping audit row {id} with corrupt payload: {e}");
                    continue;
                }
            },
            None => None,
        };
        entries.push(ActionEntry {
            id,
            timestamp,
            kind,
            target_id,
            payload,
            outcome,
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_append_and_read_back() {
        let db = Database::open_in_memory().unwrap();
        let entry = ActionEntry::new(ActionKind::Comment)
            .target("p1")
            .payload(json!({"verdict": "false"}))
            .outcome("ok");
        append(&db, &entry).unwrap();

        let entries = recent(&db, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ActionKind::Comment);
        assert_eq!(entries[0].target_id.as_deref(), Some("p1"));
        assert_eq!(entries[0].payload, Some(json!({"verdict": "false"})));
    }

    #[test]
    fn test_corrupt_row_is_skipped_on_read() {
        let db = Database::open_in_memory().unwrap();
        append(&db, &ActionEntry::new(ActionKind::CycleStart)).unwrap();
        // A record written by a future version, or half a record from a
        // crashed write: reads must treat it as absent and continue.
        db.insert_action("bad", "2026-08-26T00:00:00Z", "unknown_kind", None, None, None)
            .unwrap();
        db.insert_action(
            "bad2",
            "2026-08-26T00:00:01Z",
            "comment",
            None,
            Some("{truncated"),
            None,
        )
        .unwrap();

        let entries = recent(&db, 10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, ActionKind::CycleStart);
    }

    #[test]
    fn test_count_for_day() {
        let db = Database::open_in_memory().unwrap();
        let mut entry = ActionEntry::new(ActionKind::PostCreated);
        entry.timestamp = "2026-08-26T09:00:00Z".to_string();
        append(&db, &entry).unwrap();

        assert_eq!(
            count_for_day(&db, ActionKind::PostCreated, "2026-08-26").unwrap(),
            1
        );
        assert_eq!(
            count_for_day(&db, ActionKind::PostCreated, "2026-08-25").unwrap(),
            0
        );
    }

    #[test]
    fn test_quota_event_recorded() {
        let db = Database::open_in_memory().unwrap();
        record_quota_event(&db, &QuotaEvent::new("language", "429: slow down")).unwrap();
        assert_eq!(db.quota_event_count().unwrap(), 1);
    }
}
