//! Durable agent state: SQLite handle, seen-item tracker, budget
//! enforcer, and the append-only audit log.

pub mod audit;
pub mod budget;
pub mod database;
pub mod seen;

pub use budget::BudgetEnforcer;
pub use database::Database;
pub use seen::SeenTracker;
