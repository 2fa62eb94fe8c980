//! Retention service for time-based data purge.
//!
//! Runs as a background task clearing expired advisory locks and
//! paused-turn records, plus dedupe entries older than one day.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::db::Database;
use super::dedupe_repo::DedupeRepo;
use super::lock_repo::ProjectLockRepo;
use super::paused_turn_repo::PausedTurnRepo;
use crate::Result;

const PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Spawn the retention purge background task. Runs hourly until the
/// token fires.
#[must_use]
pub fn spawn_retention_task(db: Arc<Database>, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("retention task shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = purge(&db).await {
                        error!(?err, "retention purge failed");
                    }
                }
            }
        }
    })
}

async fn purge(db: &Arc<Database>) -> Result<()> {
    let locks = ProjectLockRepo::new(Arc::clone(db)).purge_expired().await?;
    let paused = PausedTurnRepo::new(Arc::clone(db)).purge_expired().await?;
    let dedupe_cutoff = Utc::now() - chrono::Duration::days(1);
    let dedupe = DedupeRepo::new(Arc::clone(db)).purge(dedupe_cutoff).await?;

    info!(locks, paused, dedupe, "retention purge completed");
    Ok(())
}
