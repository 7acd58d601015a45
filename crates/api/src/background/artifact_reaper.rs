//! Periodic cleanup of stale OCR artifacts.
//!
//! Every OCR call leaves a raw-response file behind. Files older than the
//! configured TTL are deleted unless a work still references them.

use std::time::{Duration, SystemTime};

use inkstone_db::repositories::WorkRepo;
use inkstone_pipeline::artifacts::ArtifactStore;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

/// Run the artifact reaper loop until `cancel` is triggered.
pub async fn run(
    pool: PgPool,
    store: ArtifactStore,
    ttl: Duration,
    every: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        dir = %store.dir().display(),
        ttl_secs = ttl.as_secs(),
        interval_secs = every.as_secs(),
        "Artifact reaper started"
    );

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Artifact reaper stopping");
                break;
            }
            _ = interval.tick() => sweep(&pool, &store, ttl).await,
        }
    }
}

async fn sweep(pool: &PgPool, store: &ArtifactStore, ttl: Duration) {
    let referenced = match WorkRepo::referenced_artifact_paths(pool).await {
        Ok(paths) => paths,
        Err(e) => {
            tracing::error!(error = %e, "Artifact reaper: failed to load referenced paths");
            return;
        }
    };

    match store.reap(ttl, &referenced, SystemTime::now()).await {
        Ok(report) if report.deleted > 0 => {
            tracing::info!(
                scanned = report.scanned,
                deleted = report.deleted,
                referenced = report.referenced,
                "Artifact reaper: purged stale artifacts"
            );
        }
        Ok(report) => {
            tracing::debug!(scanned = report.scanned, "Artifact reaper: nothing to purge");
        }
        Err(e) => {
            tracing::error!(error = %e, "Artifact reaper: sweep failed");
        }
    }
}
