//! Budget Enforcer
//!
//! Owns the two resource counters: original posts per calendar day and
//! comments per heartbeat cycle. The daily counter is persisted on every
//! increment so a crash between a remote post succeeding and the next
//! action can never let a restart exceed the cap. The cycle counter is
//! in-memory only; a restart begins a new cycle by definition.
//!
//! No other component mutates these counters. Resets happen only at the
//! defined boundaries: the daily counter at a date crossing, the cycle
//! counter at cycle start.

use anyhow::Result;
use chrono::{Local, NaiveDate};

use super::database::{Database, POSTS_TODAY_COUNTER};

pub struct BudgetEnforcer {
    daily_post_cap: u32,
    cycle_comment_cap: u32,
    posts_today: u32,
    counter_date: NaiveDate,
    comments_this_cycle: u32,
}

impl BudgetEnforcer {
    /// Reload the daily counter from durable storage. A missing or
    /// unparseable stored date starts the counter fresh for today.
    pub fn load(db: &Database, daily_post_cap: u32, cycle_comment_cap: u32) -> Result<Self> {
        let today = Local::now().date_naive();
        let (posts_today, counter_date) = match db.get_counter(POSTS_TODAY_COUNTER)? {
            Some((value, date_str)) => match date_str.parse::<NaiveDate>() {
                Ok(date) => (value, date),
                Err(_) => {
                    tracing::warn!("unparseable budget counter date '{date_str}', resetting");
                    (0, today)
                }
            },
            None => (0, today),
        };

        Ok(Self {
            daily_post_cap,
            cycle_comment_cap,
            posts_today,
            counter_date,
            comments_this_cycle: 0,
        })
    }

    // ─── Daily Post Budget ───────────────────────────────────────

    pub fn can_post(&mut self, db: &Database) -> Result<bool> {
        self.can_post_on(db, Local::now().date_naive())
    }

    pub fn record_post(&mut self, db: &Database) -> Result<()> {
        self.record_post_on(db, Local::now().date_naive())
    }

    /// Date-injected variant for tests. Rolls the counter to `today`
    /// before comparing: a stored counter from a previous date resets to
    /// zero, and the reset is persisted so it happens exactly once.
    pub fn can_post_on(&mut self, db: &Database, today: NaiveDate) -> Result<bool> {
        self.roll_date(db, today)?;
        Ok(self.posts_today < self.daily_post_cap)
    }

    pub fn record_post_on(&mut self, db: &Database, today: NaiveDate) -> Result<()> {
        self.roll_date(db, today)?;
        self.posts_today += 1;
        db.set_counter(
            POSTS_TODAY_COUNTER,
            self.posts_today,
            &today.to_string(),
        )?;
        Ok(())
    }

    fn roll_date(&mut self, db: &Database, today: NaiveDate) -> Result<()> {
        if self.counter_date != today {
            self.posts_today = 0;
            self.counter_date = today;
            db.set_counter(POSTS_TODAY_COUNTER, 0, &today.to_string())?;
        }
        Ok(())
    }

    pub fn posts_today(&self) -> u32 {
        self.posts_today
    }

    // ─── Per-Cycle Comment Budget ────────────────────────────────

    /// Called once at the start of every heartbeat cycle, never mid-cycle.
    pub fn reset_cycle(&mut self) {
        self.comments_this_cycle = 0;
    }

    pub fn can_comment(&self) -> bool {
        self.comments_this_cycle < self.cycle_comment_cap
    }

    pub fn record_comment(&mut self) {
        self.comments_this_cycle += 1;
    }

    pub fn comments_this_cycle(&self) -> u32 {
        self.comments_this_cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_daily_cap_enforced() {
        let db = Database::open_in_memory().unwrap();
        let mut budget = BudgetEnforcer::load(&db, 2, 10).unwrap();
        let today = date("2026-08-26");

        assert!(budget.can_post_on(&db, today).unwrap());
        budget.record_post_on(&db, today).unwrap();
        assert!(budget.can_post_on(&db, today).unwrap());
        budget.record_post_on(&db, today).unwrap();
        assert!(!budget.can_post_on(&db, today).unwrap());
    }

    #[test]
    fn test_counter_resets_only_at_date_boundary() {
        let db = Database::open_in_memory().unwrap();
        let mut budget = BudgetEnforcer::load(&db, 1, 10).unwrap();

        budget.record_post_on(&db, date("2026-08-26")).unwrap();
        assert!(!budget.can_post_on(&db, date("2026-08-26")).unwrap());

        // Same day, later call: still capped.
        assert!(!budget.can_post_on(&db, date("2026-08-26")).unwrap());

        // Next day: fresh budget.
        assert!(budget.can_post_on(&db, date("2026-08-27")).unwrap());
        assert_eq!(budget.posts_today(), 0);
    }

    #[test]
    fn test_daily_counter_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db").to_string_lossy().to_string();
        let today = Local::now().date_naive();

        {
            let db = Database::open(&path).unwrap();
            let mut budget = BudgetEnforcer::load(&db, 3, 10).unwrap();
            budget.record_post_on(&db, today).unwrap();
            budget.record_post_on(&db, today).unwrap();
        }

        // Simulated restart mid-day: no double-count, no premature reset.
        let db = Database::open(&path).unwrap();
        let mut budget = BudgetEnforcer::load(&db, 3, 10).unwrap();
        assert_eq!(budget.posts_today(), 2);
        assert!(budget.can_post(&db).unwrap());
        budget.record_post(&db).unwrap();
        assert!(!budget.can_post(&db).unwrap());
    }

    #[test]
    fn test_date_rollover_is_persisted() {
        let db = Database::open_in_memory().unwrap();
        let mut budget = BudgetEnforcer::load(&db, 1, 10).unwrap();
        budget.record_post_on(&db, date("2026-08-26")).unwrap();

        assert!(budget.can_post_on(&db, date("2026-08-27")).unwrap());
        assert_eq!(
            db.get_counter(POSTS_TODAY_COUNTER).unwrap(),
            Some((0, "2026-08-27".to_string()))
        );
    }

    #[test]
    fn test_cycle_comment_budget() {
        let db = Database::open_in_memory().unwrap();
        let mut budget = BudgetEnforcer::load(&db, 3, 2).unwrap();

        budget.reset_cycle();
        assert!(budget.can_comment());
        budget.record_comment();
        budget.record_comment();
        assert!(!budget.can_comment());

        // Next cycle starts fresh.
        budget.reset_cycle();
        assert!(budget.can_comment());
        assert_eq!(budget.comments_this_cycle(), 0);
    }
}
