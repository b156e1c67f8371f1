//! Factbeat Runtime
//!
//! Entry point for the fact-checking agent. Handles CLI args, config
//! loading, subsystem wiring, and starting the heartbeat loop.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use factbeat::agent::Orchestrator;
use factbeat::config::{self, AgentConfig};
use factbeat::guard::RetryPolicy;
use factbeat::heartbeat::Heartbeat;
use factbeat::providers::{LanguageHttpClient, PlatformHttpClient};
use factbeat::sanitize::Sanitizer;
use factbeat::state::{audit, BudgetEnforcer, Database, SeenTracker};
use factbeat::types::ActionKind;

const VERSION: &str = "0.1.0";

/// Factbeat -- autonomous fact-checking agent
#[derive(Parser, Debug)]
#[command(
    name = "factbeat",
    version = VERSION,
    about = "Factbeat -- autonomous fact-checking agent for Moltbook"
)]
struct Cli {
    /// Start the heartbeat loop (runs until SIGINT/SIGTERM)
    #[arg(long)]
    run: bool,

    /// Execute exactly one cycle and exit
    #[arg(long)]
    once: bool,

    /// Show agent status and recent actions
    #[arg(long)]
    status: bool,

    /// Write a default config file and exit
    #[arg(long)]
    init: bool,

    /// Config file path (default: ~/.factbeat/config.json)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::get_config_path);

    if cli.init {
        return init_config(&config_path);
    }

    let cfg = config::load_config(&config_path)?;
    init_tracing(&cfg.log_level);

    if cli.status {
        return show_status(&cfg);
    }

    if cli.once {
        let mut orchestrator = build_orchestrator(&cfg)?;
        let summary = orchestrator.run_cycle().await?;
        println!(
            "cycle done: fetched={} commented={} posted={} injections={} quota_aborted={}",
            summary.fetched,
            summary.commented,
            summary.posted,
            summary.injections,
            summary.quota_aborted
        );
        return Ok(());
    }

    if cli.run {
        let orchestrator = build_orchestrator(&cfg)?;
        return Heartbeat::new(orchestrator, cfg.heartbeat_interval_hours)
            .run()
            .await;
    }

    bail!("no command given; try --run, --once, --status, or --init")
}

fn init_tracing(log_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wire every subsystem from the validated config.
fn build_orchestrator(
    cfg: &AgentConfig,
) -> Result<Orchestrator<PlatformHttpClient, LanguageHttpClient>> {
    let platform = PlatformHttpClient::new(
        &cfg.platform_api_url,
        &cfg.platform_api_key,
        cfg.platform_timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("platform client setup failed: {e}"))?;

    let language = LanguageHttpClient::new(
        &cfg.llm_api_url,
        &cfg.llm_api_key,
        &cfg.llm_model,
        cfg.llm_timeout_secs,
    )
    .map_err(|e| anyhow::anyhow!("language client setup failed: {e}"))?;

    let db_path = config::resolve_path(&cfg.db_path);
    let db = Database::open(&db_path)?;
    let seen = SeenTracker::load(&db)?;
    let budget = BudgetEnforcer::load(&db, cfg.max_posts_per_day, cfg.max_comments_per_cycle)?;
    let sanitizer = Sanitizer::with_default_rules()?;

    Ok(Orchestrator::new(
        platform,
        language,
        sanitizer,
        RetryPolicy::default(),
        db,
        seen,
        budget,
        cfg.max_posts_per_cycle as usize,
    ))
}

// ─── Init Command ────────────────────────────────────────────────

/// Write a default config, refusing to clobber an existing one.
fn init_config(path: &PathBuf) -> Result<()> {
    if path.exists() {
        bail!("config already exists at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let default = serde_json::to_string_pretty(&AgentConfig::default())?;
    fs::write(path, default)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("wrote default config to {}", path.display());
    println!("fill in platformApiKey and llmApiKey before running.");
    Ok(())
}

// ─── Status Command ──────────────────────────────────────────────

fn show_status(cfg: &AgentConfig) -> Result<()> {
    let db_path = config::resolve_path(&cfg.db_path);
    let db = Database::open(&db_path)?;
    let today = chrono::Local::now().date_naive().to_string();

    println!("=== FACTBEAT STATUS ===");
    println!("Version:         {VERSION}");
    println!("Platform:        {}", cfg.platform_api_url);
    println!("Model:           {}", cfg.llm_model);
    println!("DB path:         {db_path}");
    println!("Seen posts:      {}", db.seen_count()?);
    println!(
        "Posts today:     {} (cap {})",
        audit::count_for_day(&db, ActionKind::PostCreated, &today)?,
        cfg.max_posts_per_day
    );
    println!("Quota events:    {}", db.quota_event_count()?);

    let recent = audit::recent(&db, 10)?;
    if !recent.is_empty() {
        println!("\nRecent actions:");
        for entry in recent {
            println!(
                "  {}  {:<14} {}",
                entry.timestamp,
                entry.kind.as_str(),
                entry.target_id.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}
