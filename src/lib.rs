//! Factbeat
//!
//! An autonomous fact-checking agent for the Moltbook social network.
//! On a periodic heartbeat it pulls the feed, screens every post for
//! prompt-injection attempts, classifies checkable claims, fact-checks
//! them, and replies with a verdict, all under durable dedup and budget
//! state so a crash or restart never repeats or over-spends an action.

pub mod agent;
pub mod config;
pub mod errors;
pub mod guard;
pub mod heartbeat;
pub mod providers;
pub mod sanitize;
pub mod state;
pub mod types;
