//! Periodic cleanup of expired sessions and revocation entries.
//!
//! The sweeper owns no state besides its interval. It runs until the
//! shutdown channel flips to `true` (or its sender is dropped); a sweep
//! already in progress is allowed to finish first.

use std::sync::Arc;
use std::time::Duration;

use podid_auth::SessionManager;
use podid_core::repository::{AuditLogRepository, RevocationRepository, SessionRepository};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Counts removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub sessions: u64,
    pub revocations: u64,
}

/// Run one sweep. Failures are logged and counted as zero so the next
/// tick can retry.
pub async fn sweep_once<S, R, A>(sessions: &SessionManager<S, R, A>) -> SweepReport
where
    S: SessionRepository,
    R: RevocationRepository,
    A: AuditLogRepository,
{
    let mut report = SweepReport::default();

    match sessions.cleanup_expired().await {
        Ok(removed) => report.sessions = removed,
        Err(e) => warn!(error = %e, "Session cleanup failed"),
    }
    match sessions.tokens().cleanup_expired_revocations().await {
        Ok(removed) => report.revocations = removed,
        Err(e) => warn!(error = %e, "Revocation cleanup failed"),
    }

    debug!(
        sessions = report.sessions,
        revocations = report.revocations,
        "Cleanup sweep finished"
    );
    report
}

/// Sweep every `interval` until `shutdown` is signalled.
pub async fn run_sweeper<S, R, A>(
    sessions: Arc<SessionManager<S, R, A>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) where
    S: SessionRepository,
    R: RevocationRepository,
    A: AuditLogRepository,
{
    let interval = if interval.is_zero() {
        Duration::from_secs(1)
    } else {
        interval
    };
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = interval.as_secs(), "Cleanup sweeper started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                sweep_once(&sessions).await;
            }
        }
    }
    info!("Cleanup sweeper stopped");
}

pub fn spawn_sweeper<S, R, A>(
    sessions: Arc<SessionManager<S, R, A>>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()>
where
    S: SessionRepository + 'static,
    R: RevocationRepository + 'static,
    A: AuditLogRepository + 'static,
{
    tokio::spawn(run_sweeper(sessions, interval, shutdown))
}
