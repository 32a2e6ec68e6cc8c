//! Campaign scheduler background task.
//!
//! Runs inside the backend process: every cycle it assigns pending leads
//! for active campaigns inside their send window, then dispatches queued
//! emails that have come due. A companion task zeroes daily send counters
//! at local midnight.

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Local, Utc};
use dealpig_types::CycleStats;
use std::time::Duration;

use super::{assignment, dispatch};
use crate::db::{self, DbPool};

/// Configuration for the campaign scheduler task
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to run a scheduling cycle (default: 5 minutes)
    pub cycle_interval: Duration,
    /// Maximum queued emails sent per cycle
    pub dispatch_batch_size: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(300),
            dispatch_batch_size: 50,
        }
    }
}

impl SchedulerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let cycle_interval_secs = std::env::var("SCHEDULER_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300);

        let dispatch_batch_size = std::env::var("DISPATCH_BATCH_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(50);

        Self {
            cycle_interval: Duration::from_secs(cycle_interval_secs),
            dispatch_batch_size,
        }
    }
}

/// Start the campaign scheduler background task
pub async fn start_scheduler_task(pool: DbPool) {
    let config = SchedulerConfig::from_env();

    tracing::info!(
        "Starting campaign scheduler (interval: {:?}, dispatch batch: {})",
        config.cycle_interval,
        config.dispatch_batch_size
    );

    loop {
        match run_cycle_with(&pool, &config).await {
            Ok(stats) => {
                if stats.campaigns_processed > 0 || stats.emails_sent > 0 {
                    tracing::info!(
                        campaigns = stats.campaigns_processed,
                        assigned = stats.leads_assigned,
                        sent = stats.emails_sent,
                        failed = stats.emails_failed,
                        "Scheduler cycle completed"
                    );
                }
            }
            Err(e) => {
                tracing::error!("Scheduler cycle failed: {}", e);
            }
        }

        tokio::time::sleep(config.cycle_interval).await;
    }
}

/// Run one scheduling cycle. Also used by the manual API trigger.
pub async fn run_cycle(pool: &DbPool) -> Result<CycleStats> {
    run_cycle_with(pool, &SchedulerConfig::from_env()).await
}

async fn run_cycle_with(pool: &DbPool, config: &SchedulerConfig) -> Result<CycleStats> {
    let mut stats = CycleStats::default();

    let mut conn = pool.get().await.context("Failed to get DB connection")?;

    let campaigns = db::campaigns::list_active(&mut conn).await?;
    let local_time = Local::now().time();

    for campaign in campaigns {
        if !assignment::within_send_window(local_time, campaign.start_time, campaign.end_time) {
            tracing::debug!(campaign_id = %campaign.id, "Outside send window, skipping");
            continue;
        }

        match assignment::assign_campaign_leads(&mut conn, &campaign, Utc::now()).await {
            Ok(assigned) => {
                stats.campaigns_processed += 1;
                stats.leads_assigned += assigned;
            }
            Err(e) => {
                // One broken campaign must not stall the others
                tracing::error!(campaign_id = %campaign.id, error = %e, "Assignment failed");
            }
        }
    }

    drop(conn);

    let outcome = dispatch::dispatch_due_emails(pool, config.dispatch_batch_size).await?;
    stats.emails_sent = outcome.sent;
    stats.emails_failed = outcome.failed;

    Ok(stats)
}

/// Start the daily counter reset task: zero `emails_sent_today` on
/// senders and campaign senders at every local midnight.
pub async fn start_daily_reset_task(pool: DbPool) {
    tracing::info!("Starting daily quota reset task");

    loop {
        tokio::time::sleep(until_local_midnight()).await;

        match reset_daily_counts(&pool).await {
            Ok((senders, campaign_senders)) => {
                tracing::info!(
                    senders,
                    campaign_senders,
                    "Daily send counters reset"
                );
            }
            Err(e) => {
                tracing::error!("Daily counter reset failed: {}", e);
            }
        }
    }
}

async fn reset_daily_counts(pool: &DbPool) -> Result<(usize, usize)> {
    let mut conn = pool.get().await.context("Failed to get DB connection")?;

    let senders = db::senders::reset_daily_counts(&mut conn).await?;
    let campaign_senders = db::campaign_senders::reset_daily_counts(&mut conn).await?;

    Ok((senders, campaign_senders))
}

fn until_local_midnight() -> Duration {
    let now = Local::now();
    let next_midnight = (now + ChronoDuration::days(1))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap_or_default());

    (next_midnight - now.naive_local())
        .to_std()
        .unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_env_fallbacks() {
        let defaults = SchedulerConfig::default();
        assert_eq!(defaults.cycle_interval, Duration::from_secs(300));
        assert_eq!(defaults.dispatch_batch_size, 50);
    }

    #[test]
    fn midnight_is_at_most_a_day_away() {
        let until = until_local_midnight();
        assert!(until <= Duration::from_secs(24 * 60 * 60));
        assert!(until > Duration::ZERO);
    }
}
