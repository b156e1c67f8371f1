//! Factbeat - Type Definitions
//!
//! Shared types for the fact-checking agent: platform objects,
//! analysis results, audit records, and cycle bookkeeping.

use serde::{Deserialize, Serialize};

// ─── Platform Objects ────────────────────────────────────────────

/// A post fetched from the social feed. Read-only to the agent core.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub submolt: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub comment_count: i64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Post {
    /// Title and body concatenated, for analysis.
    pub fn full_text(&self) -> String {
        match &self.body {
            Some(body) if !body.is_empty() => format!("{}\n\n{}", self.title, body),
            _ => self.title.clone(),
        }
    }
}

/// Feed partitions the platform can be asked for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSort {
    Hot,
    New,
}

impl FeedSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedSort::Hot => "hot",
            FeedSort::New => "new",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Upvote,
    Downvote,
}

impl VoteDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteDirection::Upvote => "upvote",
            VoteDirection::Downvote => "downvote",
        }
    }
}

/// Content for a new original post.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub body: String,
    pub submolt: String,
}

// ─── Analysis Results ────────────────────────────────────────────

/// Outcome of the classification stage for one post.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClaimAnalysis {
    pub checkable: bool,
    #[serde(default)]
    pub claim_summary: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Fact-check outcome classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    True,
    False,
    Misleading,
    Unverifiable,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::True => "true",
            Verdict::False => "false",
            Verdict::Misleading => "misleading",
            Verdict::Unverifiable => "unverifiable",
        }
    }

    /// How the agent votes on a post once the verdict is in.
    /// Unverifiable claims get no vote.
    pub fn vote_direction(&self) -> Option<VoteDirection> {
        match self {
            Verdict::True => Some(VoteDirection::Upvote),
            Verdict::False | Verdict::Misleading => Some(VoteDirection::Downvote),
            Verdict::Unverifiable => None,
        }
    }
}

/// Generated fact-check reply for a claim.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FactCheckResult {
    pub verdict: Verdict,
    pub reply_text: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Generated content for an original post.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeneratedPost {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub target_submolt: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
}

// ─── Audit Records ───────────────────────────────────────────────

/// Kind of action recorded in the audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    CycleStart,
    CycleEnd,
    Comment,
    Vote,
    PostCreated,
    InjectionSkip,
    QuotaAbort,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::CycleStart => "cycle_start",
            ActionKind::CycleEnd => "cycle_end",
            ActionKind::Comment => "comment",
            ActionKind::Vote => "vote",
            ActionKind::PostCreated => "post_created",
            ActionKind::InjectionSkip => "injection_skip",
            ActionKind::QuotaAbort => "quota_abort",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cycle_start" => Some(ActionKind::CycleStart),
            "cycle_end" => Some(ActionKind::CycleEnd),
            "comment" => Some(ActionKind::Comment),
            "vote" => Some(ActionKind::Vote),
            "post_created" => Some(ActionKind::PostCreated),
            "injection_skip" => Some(ActionKind::InjectionSkip),
            "quota_abort" => Some(ActionKind::QuotaAbort),
            _ => None,
        }
    }
}

/// One immutable entry in the append-only action log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionEntry {
    pub id: String,
    pub timestamp: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub outcome: Option<String>,
}

impl ActionEntry {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            kind,
            target_id: None,
            payload: None,
            outcome: None,
        }
    }

    pub fn target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }
}

/// Durable record of a quota condition reported by a provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuotaEvent {
    pub timestamp: String,
    /// Which provider hit the wall ("platform" or "language").
    pub limit_kind: String,
    pub detail: String,
}

impl QuotaEvent {
    pub fn new(limit_kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            limit_kind: limit_kind.into(),
            detail: detail.into(),
        }
    }
}

// ─── Cycle Bookkeeping ───────────────────────────────────────────

/// Counts carried by the cycle-end audit entry.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct CycleSummary {
    pub fetched: usize,
    pub skipped_seen: usize,
    pub injections: usize,
    pub commented: usize,
    pub posted: usize,
    pub quota_aborted: bool,
}
