//! Heartbeat Driver
//!
//! Owns the orchestrator and triggers one cycle per interval tick. The
//! first tick fires immediately so a freshly started agent acts without
//! waiting out a full interval. A cycle that is already in flight when a
//! shutdown signal arrives runs to completion; the loop exits at the next
//! decision point. A fatal cycle error ends the loop and the process.

use std::time::Duration;

use anyhow::Result;
use tokio::signal;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::agent::Orchestrator;
use crate::providers::{LanguageModel, PlatformClient};

pub struct Heartbeat<P, L> {
    orchestrator: Orchestrator<P, L>,
    period: Duration,
}

impl<P: PlatformClient, L: LanguageModel> Heartbeat<P, L> {
    pub fn new(orchestrator: Orchestrator<P, L>, interval_hours: u32) -> Self {
        Self {
            orchestrator,
            period: Duration::from_secs(u64::from(interval_hours) * 3600),
        }
    }

    /// Run cycles until a shutdown signal or a fatal error.
    pub async fn run(mut self) -> Result<()> {
        info!(
            "heartbeat started, one cycle every {}h",
            self.period.as_secs() / 3600
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = Box::pin(shutdown_signal());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Runs to completion before the next select: a signal
                    // arriving mid-cycle never truncates the cycle.
                    if let Err(e) = self.orchestrator.run_cycle().await {
                        error!("fatal cycle error, terminating: {e:#}");
                        return Err(e);
                    }
                }
                _ = &mut shutdown => {
                    info!("shutdown signal received, stopping heartbeat");
                    return Ok(());
                }
            }
        }
    }
}

/// Resolves on SIGINT or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to register SIGTERM handler: {e}");
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
