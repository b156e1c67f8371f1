//! Agent Configuration
//!
//! Loads the agent's configuration from `~/.factbeat/config.json`,
//! merges missing fields with defaults, and validates operational
//! limits. An out-of-range limit is a startup-fatal error: the agent
//! refuses to run with budgets it cannot honor.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Config file name within the agent directory.
const CONFIG_FILENAME: &str = "config.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentConfig {
    /// Base URL of the social platform API.
    pub platform_api_url: String,
    /// Bearer token for the platform API.
    pub platform_api_key: String,
    /// Base URL of the OpenAI-compatible language provider.
    pub llm_api_url: String,
    pub llm_api_key: String,
    pub llm_model: String,
    /// Hours between heartbeat cycles. Allowed range 1-24.
    pub heartbeat_interval_hours: u32,
    /// Hard daily cap on original posts. Allowed range 1-10.
    pub max_posts_per_day: u32,
    /// Hard per-cycle cap on comments. Allowed range 1-50.
    pub max_comments_per_cycle: u32,
    /// Per-cycle cap on posts pulled through analysis.
    pub max_posts_per_cycle: u32,
    /// Per-call timeout for platform requests, seconds. Allowed range 1-300.
    pub platform_timeout_secs: u64,
    /// Per-call timeout for language requests, seconds. Allowed range 1-300.
    pub llm_timeout_secs: u64,
    /// SQLite database path. A leading `~` resolves to the home directory.
    pub db_path: String,
    /// tracing env-filter directive, e.g. "info" or "factbeat=debug".
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            platform_api_url: "https://www.moltbook.com/api/v1".to_string(),
            platform_api_key: String::new(),
            llm_api_url: "https://api.openai.com".to_string(),
            llm_api_key: String::new(),
            llm_model: "gpt-4o".to_string(),
            heartbeat_interval_hours: 4,
            max_posts_per_day: 3,
            max_comments_per_cycle: 10,
            max_posts_per_cycle: 25,
            platform_timeout_secs: 30,
            llm_timeout_secs: 60,
            db_path: "~/.factbeat/state.db".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Check every bounded field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "heartbeatIntervalHours",
            self.heartbeat_interval_hours as u64,
            1,
            24,
        )?;
        check_range("maxPostsPerDay", self.max_posts_per_day as u64, 1, 10)?;
        check_range(
            "maxCommentsPerCycle",
            self.max_comments_per_cycle as u64,
            1,
            50,
        )?;
        check_range("maxPostsPerCycle", self.max_posts_per_cycle as u64, 1, 100)?;
        check_range("platformTimeoutSecs", self.platform_timeout_secs, 1, 300)?;
        check_range("llmTimeoutSecs", self.llm_timeout_secs, 1, 300)?;
        if self.platform_api_key.is_empty() {
            return Err(ConfigError("platformApiKey is not set".to_string()));
        }
        if self.llm_api_key.is_empty() {
            return Err(ConfigError("llmApiKey is not set".to_string()));
        }
        Ok(())
    }
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError(format!(
            "{name} = {value} is outside the allowed range {min}-{max}"
        )));
    }
    Ok(())
}

/// Returns the default agent directory: `~/.factbeat`.
pub fn get_agent_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/root"))
        .join(".factbeat")
}

/// Returns the default config file path.
pub fn get_config_path() -> PathBuf {
    get_agent_dir().join(CONFIG_FILENAME)
}

/// Load and validate the agent config from `path`.
///
/// Missing fields take their defaults; a malformed file or an out-of-range
/// value is a hard error.
pub fn load_config(path: &PathBuf) -> Result<AgentConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: AgentConfig = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Resolve a path that may start with `~` to an absolute path.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}
