//! Provider Error Taxonomy
//!
//! Every external capability call resolves to success or exactly one of
//! three failure classes. The class decides what the orchestrator does:
//! quota aborts the rest of the cycle, transient gets a bounded retry then
//! a per-item skip, fatal halts the process.

use thiserror::Error;

/// Classified failure from an external capability (platform or language).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Hard provider-side limit. Retrying cannot succeed before the limit
    /// resets, so this is never retried.
    #[error("quota exceeded: {detail}")]
    Quota { detail: String },

    /// Recoverable failure (network hiccup, 5xx, timeout, malformed body).
    #[error("transient provider failure: {detail}")]
    Transient { detail: String },

    /// Unrecoverable failure (bad credentials, misconfiguration).
    #[error("fatal provider failure: {detail}")]
    Fatal { detail: String },
}

impl ProviderError {
    pub fn quota(detail: impl Into<String>) -> Self {
        ProviderError::Quota {
            detail: detail.into(),
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        ProviderError::Transient {
            detail: detail.into(),
        }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        ProviderError::Fatal {
            detail: detail.into(),
        }
    }

    pub fn is_quota(&self) -> bool {
        matches!(self, ProviderError::Quota { .. })
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ProviderError::Fatal { .. })
    }

    pub fn detail(&self) -> &str {
        match self {
            ProviderError::Quota { detail }
            | ProviderError::Transient { detail }
            | ProviderError::Fatal { detail } => detail,
        }
    }
}

/// Startup configuration error. Always fatal; the process refuses to run
/// with an out-of-range or unreadable configuration.
#[derive(Debug, Error)]
#[error("configuration error: {0}")]
pub struct ConfigError(pub String);
