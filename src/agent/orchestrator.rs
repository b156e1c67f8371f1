//! Heartbeat Orchestrator
//!
//! Runs one complete fetch-analyze-act cycle per trigger. The orchestrator
//! owns the durable dedup/budget/audit state and sequences every call to
//! the capability interfaces; `run_cycle` takes `&mut self`, so two cycles
//! can never overlap.
//!
//! Commit discipline: local state (seen marks, budget counters, audit
//! entries) is written immediately after the corresponding remote action
//! succeeds, never before and never batched. A crash can lose the record
//! of an action already taken, but can never cause a duplicate action or
//! an over-budget action.

use std::collections::HashSet;

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::errors::ProviderError;
use crate::guard::RetryPolicy;
use crate::providers::{LanguageModel, PlatformClient};
use crate::sanitize::{Sanitizer, Scanned};
use crate::state::{audit, BudgetEnforcer, Database, SeenTracker};
use crate::types::{ActionEntry, ActionKind, CycleSummary, FeedSort, NewPost, Post, QuotaEvent};

/// Classification results below this confidence are not worth a reply.
const MIN_CLAIM_CONFIDENCE: f64 = 0.6;

// ─── Cycle Error Plumbing ────────────────────────────────────────

/// Errors that end a cycle early. Everything per-item is absorbed at the
/// post boundary and never reaches this type.
enum CycleError {
    /// A provider hit a quota wall. Abort the rest of the cycle, no retry.
    Quota {
        provider: &'static str,
        detail: String,
    },
    /// Fatal provider failure or a persistence failure. Halts the process.
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for CycleError {
    fn from(err: anyhow::Error) -> Self {
        CycleError::Fatal(err)
    }
}

/// Route a classified provider failure: transient comes back to the caller
/// to absorb as a per-item skip, quota and fatal end the cycle.
fn triage(provider: &'static str, err: ProviderError) -> Result<ProviderError, CycleError> {
    match err {
        ProviderError::Quota { detail } => Err(CycleError::Quota { provider, detail }),
        ProviderError::Fatal { detail } => Err(CycleError::Fatal(anyhow::anyhow!(
            "{provider} provider failure: {detail}"
        ))),
        transient => Ok(transient),
    }
}

/// How one post's processing ended. Whatever the outcome, the post is
/// marked seen exactly when it is determined.
enum PostOutcome {
    Commented,
    Injection,
    NotCheckable,
    Skipped,
}

// ─── Feed Merge ──────────────────────────────────────────────────

/// Merge the hot and new partitions, preserving platform order within
/// each and placing hot entries before new entries on any tie. The first
/// occurrence of an id wins.
pub fn merge_feed(hot: Vec<Post>, new: Vec<Post>) -> Vec<Post> {
    let mut ids = HashSet::new();
    let mut merged = Vec::with_capacity(hot.len() + new.len());
    for post in hot.into_iter().chain(new) {
        if ids.insert(post.id.clone()) {
            merged.push(post);
        }
    }
    merged
}

// ─── Orchestrator ────────────────────────────────────────────────

pub struct Orchestrator<P, L> {
    platform: P,
    language: L,
    sanitizer: Sanitizer,
    retry: RetryPolicy,
    db: Database,
    seen: SeenTracker,
    budget: BudgetEnforcer,
    max_posts_per_cycle: usize,
}

impl<P: PlatformClient, L: LanguageModel> Orchestrator<P, L> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        platform: P,
        language: L,
        sanitizer: Sanitizer,
        retry: RetryPolicy,
        db: Database,
        seen: SeenTracker,
        budget: BudgetEnforcer,
        max_posts_per_cycle: usize,
    ) -> Self {
        Self {
            platform,
            language,
            sanitizer,
            retry,
            db,
            seen,
            budget,
            max_posts_per_cycle,
        }
    }

    /// Execute one full heartbeat cycle.
    ///
    /// A quota wall aborts the remainder of the cycle but still emits the
    /// cycle-end entry; unprocessed posts stay unseen and become eligible
    /// again next cycle. Fatal and persistence errors propagate.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        audit::append(&self.db, &ActionEntry::new(ActionKind::CycleStart))?;
        self.budget.reset_cycle();
        info!("cycle start");

        let mut summary = CycleSummary::default();
        match self.cycle_body(&mut summary).await {
            Ok(()) => {}
            Err(CycleError::Quota { provider, detail }) => {
                warn!("quota wall from {provider} provider, aborting cycle: {detail}");
                audit::record_quota_event(&self.db, &QuotaEvent::new(provider, detail.clone()))?;
                audit::append(
                    &self.db,
                    &ActionEntry::new(ActionKind::QuotaAbort)
                        .payload(json!({ "provider": provider, "detail": detail })),
                )?;
                summary.quota_aborted = true;
            }
            Err(CycleError::Fatal(err)) => return Err(err),
        }

        audit::append(
            &self.db,
            &ActionEntry::new(ActionKind::CycleEnd).payload(json!(summary)),
        )?;
        info!(
            "cycle end: fetched={} skipped_seen={} injections={} commented={} posted={} quota_aborted={}",
            summary.fetched,
            summary.skipped_seen,
            summary.injections,
            summary.commented,
            summary.posted,
            summary.quota_aborted
        );
        Ok(summary)
    }

    async fn cycle_body(&mut self, summary: &mut CycleSummary) -> Result<(), CycleError> {
        self.fetch_announcements().await?;

        let merged = self.fetch_merged_feed(summary).await?;

        let unseen: Vec<Post> = merged
            .into_iter()
            .filter(|post| {
                let fresh = !self.seen.contains(&post.id);
                if !fresh {
                    summary.skipped_seen += 1;
                }
                fresh
            })
            .take(self.max_posts_per_cycle)
            .collect();

        for post in unseen {
            match self.process_post(&post).await? {
                PostOutcome::Commented => summary.commented += 1,
                PostOutcome::Injection => summary.injections += 1,
                PostOutcome::NotCheckable | PostOutcome::Skipped => {}
            }
        }

        self.maybe_create_post(summary).await?;
        Ok(())
    }

    /// Best-effort announcement fetch. Quota and fatal still end the
    /// cycle; anything transient is only logged.
    async fn fetch_announcements(&self) -> Result<(), CycleError> {
        let result = self
            .retry
            .run("announcements", || self.platform.fetch_announcements())
            .await;
        match result {
            Ok(text) => debug!("announcements fetched ({} chars)", text.len()),
            Err(err) => {
                let transient = triage("platform", err)?;
                warn!("announcement fetch failed: {}", transient.detail());
            }
        }
        Ok(())
    }

    /// Fetch both feed partitions and merge them. A partition that stays
    /// transient after retries contributes nothing this cycle.
    async fn fetch_merged_feed(
        &self,
        summary: &mut CycleSummary,
    ) -> Result<Vec<Post>, CycleError> {
        let mut partitions = Vec::with_capacity(2);
        for sort in [FeedSort::Hot, FeedSort::New] {
            let result = self
                .retry
                .run("fetch_feed", || self.platform.fetch_feed(sort))
                .await;
            match result {
                Ok(posts) => partitions.push(posts),
                Err(err) => {
                    let transient = triage("platform", err)?;
                    warn!(
                        "feed fetch ({}) failed: {}",
                        sort.as_str(),
                        transient.detail()
                    );
                    partitions.push(Vec::new());
                }
            }
        }
        let new = partitions.pop().unwrap_or_default();
        let hot = partitions.pop().unwrap_or_default();
        let merged = merge_feed(hot, new);
        summary.fetched = merged.len();
        Ok(merged)
    }

    /// Process one post end to end. The post is marked seen exactly when
    /// its outcome is determined; a quota abort leaves it unmarked so the
    /// next cycle picks it up again.
    async fn process_post(&mut self, post: &Post) -> Result<PostOutcome, CycleError> {
        // First sanitization pass: the raw platform text.
        let clean_text = match self.sanitizer.scan(&post.full_text()) {
            Scanned::Flagged { category } => {
                return self.skip_injection(post, category.as_str(), "ingest");
            }
            Scanned::Clean { text, truncated } => {
                if truncated {
                    debug!("post {} truncated before analysis", post.id);
                }
                text
            }
        };

        let analysis = match self.retry.run("classify", || self.language.classify(&clean_text)).await
        {
            Ok(analysis) => analysis,
            Err(err) => {
                let transient = triage("language", err)?;
                return self.skip_post(post, "classify failed", transient.detail());
            }
        };

        if !analysis.checkable || analysis.confidence < MIN_CLAIM_CONFIDENCE {
            debug!(
                "post {} not checkable (confidence {:.2})",
                post.id, analysis.confidence
            );
            self.seen.mark(&self.db, &post.id)?;
            return Ok(PostOutcome::NotCheckable);
        }

        // Second sanitization pass, on text the classifier produced. The
        // first pass vetted the post, not what a compromised or sloppy
        // classifier might echo back into the next prompt.
        let claim_summary = analysis.claim_summary.unwrap_or_else(|| clean_text.clone());
        let clean_claim = match self.sanitizer.scan(&claim_summary) {
            Scanned::Flagged { category } => {
                return self.skip_injection(post, category.as_str(), "derived");
            }
            Scanned::Clean { text, .. } => text,
        };

        let check = match self
            .retry
            .run("fact_check", || self.language.fact_check(&clean_claim))
            .await
        {
            Ok(check) => check,
            Err(err) => {
                let transient = triage("language", err)?;
                return self.skip_post(post, "fact-check failed", transient.detail());
            }
        };

        if !self.budget.can_comment() {
            debug!("comment budget exhausted, skipping reply to {}", post.id);
            self.seen.mark(&self.db, &post.id)?;
            return Ok(PostOutcome::Skipped);
        }

        let comment_result = self
            .retry
            .run("create_comment", || {
                self.platform.create_comment(&post.id, &check.reply_text)
            })
            .await;
        if let Err(err) = comment_result {
            let transient = triage("platform", err)?;
            return self.skip_post(post, "comment failed", transient.detail());
        }

        // Remote action succeeded: commit locally before anything else.
        self.budget.record_comment();
        self.seen.mark(&self.db, &post.id)?;
        audit::append(
            &self.db,
            &ActionEntry::new(ActionKind::Comment)
                .target(&post.id)
                .payload(json!({ "verdict": check.verdict.as_str() }))
                .outcome("ok"),
        )?;
        info!("commented on {} (verdict: {})", post.id, check.verdict.as_str());

        self.cast_vote(post, check.verdict).await?;
        Ok(PostOutcome::Commented)
    }

    /// Vote according to the verdict. Vote failures are non-fatal: the
    /// comment already landed, so a lost vote is only logged. Quota and
    /// fatal still end the cycle.
    async fn cast_vote(
        &mut self,
        post: &Post,
        verdict: crate::types::Verdict,
    ) -> Result<(), CycleError> {
        let Some(direction) = verdict.vote_direction() else {
            return Ok(());
        };
        let result = self
            .retry
            .run("vote", || self.platform.vote(&post.id, direction))
            .await;
        match result {
            Ok(()) => {
                audit::append(
                    &self.db,
                    &ActionEntry::new(ActionKind::Vote)
                        .target(&post.id)
                        .payload(json!({ "direction": direction.as_str() }))
                        .outcome("ok"),
                )?;
            }
            Err(err) => {
                let transient = triage("platform", err)?;
                warn!("vote on {} failed: {}", post.id, transient.detail());
            }
        }
        Ok(())
    }

    /// Publish one original post if the daily budget allows it.
    async fn maybe_create_post(&mut self, summary: &mut CycleSummary) -> Result<(), CycleError> {
        if !self.budget.can_post(&self.db)? {
            debug!(
                "daily post budget exhausted ({} posted)",
                self.budget.posts_today()
            );
            return Ok(());
        }

        let generated = match self
            .retry
            .run("generate_post", || self.language.generate_post(None))
            .await
        {
            Ok(generated) => generated,
            Err(err) => {
                let transient = triage("language", err)?;
                warn!("post generation failed: {}", transient.detail());
                return Ok(());
            }
        };

        let new_post = NewPost {
            title: generated.title,
            body: generated.body,
            submolt: generated
                .target_submolt
                .unwrap_or_else(|| "science".to_string()),
        };
        let created = match self
            .retry
            .run("create_post", || self.platform.create_post(&new_post))
            .await
        {
            Ok(created) => created,
            Err(err) => {
                let transient = triage("platform", err)?;
                warn!("post publish failed: {}", transient.detail());
                return Ok(());
            }
        };

        // Persist the counter before anything else can happen; a crash
        // here must not let a restart post over budget.
        self.budget.record_post(&self.db)?;
        audit::append(
            &self.db,
            &ActionEntry::new(ActionKind::PostCreated)
                .target(&created.id)
                .payload(json!({ "topic": generated.topic }))
                .outcome("ok"),
        )?;
        summary.posted += 1;
        info!("published original post {}", created.id);
        Ok(())
    }

    // ─── Per-Post Skips ──────────────────────────────────────────

    /// Injection outcome: mark seen, log, never analyze further.
    fn skip_injection(
        &mut self,
        post: &Post,
        category: &str,
        stage: &str,
    ) -> Result<PostOutcome, CycleError> {
        warn!(
            "injection attempt in {} ({} at {} stage), skipping",
            post.id, category, stage
        );
        self.seen.mark(&self.db, &post.id)?;
        audit::append(
            &self.db,
            &ActionEntry::new(ActionKind::InjectionSkip)
                .target(&post.id)
                .payload(json!({ "category": category, "stage": stage })),
        )?;
        Ok(PostOutcome::Injection)
    }

    /// Poison-item rule: a post whose processing keeps failing is marked
    /// seen so it cannot produce an endless retry loop across cycles.
    fn skip_post(
        &mut self,
        post: &Post,
        what: &str,
        detail: &str,
    ) -> Result<PostOutcome, CycleError> {
        warn!("{what} for {}: {detail}; marking seen and moving on", post.id);
        self.seen.mark(&self.db, &post.id)?;
        Ok(PostOutcome::Skipped)
    }

    // ─── Accessors (tests and status reporting) ──────────────────

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn seen(&self) -> &SeenTracker {
        &self.seen
    }
}
