//! Capability Interfaces
//!
//! The orchestrator talks to the outside world through these two traits
//! only. Each has exactly one production implementation (reqwest-backed)
//! and deterministic test doubles in the orchestrator's test module, so
//! every cycle path is testable without network access.

pub mod language;
pub mod platform;

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::types::{
    ClaimAnalysis, FactCheckResult, FeedSort, GeneratedPost, NewPost, Post, VoteDirection,
};

pub use language::LanguageHttpClient;
pub use platform::PlatformHttpClient;

/// Access to the social platform: feed reads and comment/vote/post writes.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch the platform's announcement text. Best-effort; callers treat
    /// failure as non-fatal.
    async fn fetch_announcements(&self) -> Result<String, ProviderError>;

    /// Fetch one feed partition in platform order.
    async fn fetch_feed(&self, sort: FeedSort) -> Result<Vec<Post>, ProviderError>;

    async fn create_comment(&self, post_id: &str, body: &str) -> Result<(), ProviderError>;

    async fn vote(&self, post_id: &str, direction: VoteDirection) -> Result<(), ProviderError>;

    async fn create_post(&self, post: &NewPost) -> Result<Post, ProviderError>;
}

/// Access to the language-model provider.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Decide whether sanitized text carries a fact-checkable claim.
    async fn classify(&self, text: &str) -> Result<ClaimAnalysis, ProviderError>;

    /// Fact-check a sanitized claim summary and compose a reply.
    async fn fact_check(&self, claim_summary: &str) -> Result<FactCheckResult, ProviderError>;

    /// Generate an original myth-busting post, optionally on a given topic.
    async fn generate_post(&self, topic: Option<&str>) -> Result<GeneratedPost, ProviderError>;
}
