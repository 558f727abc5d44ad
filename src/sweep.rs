//! Batch reconciliation sweep.
//!
//! Signatures are discovered and catalogued after reports arrive, so the
//! backlog of unmatched records is periodically re-triaged against the
//! current catalog: for each signature in catalog order, every unresolved
//! record whose version and log text match is resolved and counted, with
//! the same paired effect the live path applies.
//!
//! The sweep is idempotent per (signature, record) pair — resolving a
//! record excludes it from every later pass — and a failure on one pair is
//! logged and skipped rather than aborting the batch.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::catalog::Signature;
use crate::config::SweepSettings;
use crate::store::{StoreError, TriageStore};

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Signatures examined.
    pub signatures: u64,
    /// Records newly resolved.
    pub resolved: u64,
    /// (signature, record) pairs skipped after a storage failure.
    pub skipped: u64,
}

/// Run one full pass over the catalog and backlog.
///
/// Records are fetched in bounded batches per signature so a mid-pass
/// failure wastes only a bounded amount of idempotent work.
///
/// # Errors
///
/// Returns [`StoreError`] only when the catalog itself cannot be read;
/// per-record failures are logged and counted in
/// [`SweepStats::skipped`].
pub async fn run_sweep_once(
    store: &TriageStore,
    batch_size: u32,
) -> Result<SweepStats, StoreError> {
    let signatures = store.signatures().await?;
    let mut stats = SweepStats::default();

    for signature in &signatures {
        stats.signatures = stats.signatures.saturating_add(1);
        if let Err(err) = sweep_signature(store, signature, batch_size, &mut stats).await {
            stats.skipped = stats.skipped.saturating_add(1);
            warn!(
                signature_id = signature.id,
                error = %err,
                "sweep failed for signature, continuing with next"
            );
        }
    }

    info!(
        signatures = stats.signatures,
        resolved = stats.resolved,
        skipped = stats.skipped,
        "sweep pass complete"
    );
    Ok(stats)
}

/// Resolve the backlog for one signature, batch by batch.
///
/// The cursor advances past every fetched id whether or not it resolved,
/// so a persistently failing record cannot stall the pass.
async fn sweep_signature(
    store: &TriageStore,
    signature: &Signature,
    batch_size: u32,
    stats: &mut SweepStats,
) -> Result<(), StoreError> {
    let batch_len = usize::try_from(batch_size).unwrap_or(usize::MAX);
    let mut after_id = 0_i64;

    loop {
        let batch = store
            .unresolved_matches(signature, after_id, batch_size)
            .await?;
        let Some(&last_id) = batch.last() else {
            break;
        };

        for &record_id in &batch {
            match store.resolve_record(record_id, signature.id).await {
                Ok(true) => stats.resolved = stats.resolved.saturating_add(1),
                // Already resolved by a live submission or an earlier pass.
                Ok(false) => {}
                Err(err) => {
                    stats.skipped = stats.skipped.saturating_add(1);
                    warn!(
                        record_id,
                        signature_id = signature.id,
                        error = %err,
                        "failed to resolve record, skipping"
                    );
                }
            }
        }

        if batch.len() < batch_len {
            break;
        }
        after_id = last_id;
    }

    Ok(())
}

/// Run the sweep on an interval until shutdown.
///
/// The first tick fires immediately, so a freshly started loop reconciles
/// the backlog before settling into its cadence. A failed pass is logged
/// and the loop keeps running.
pub async fn run_sweep_loop(
    store: &TriageStore,
    settings: &SweepSettings,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    info!(
        interval_secs = settings.interval_secs,
        batch_size = settings.batch_size,
        "sweep loop started"
    );
    let mut interval = tokio::time::interval(Duration::from_secs(settings.interval_secs.max(1)));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(err) = run_sweep_once(store, settings.batch_size).await {
                    warn!(error = %err, "sweep pass failed");
                }
            }
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    info!("sweep loop shutting down");
                    break;
                }
            }
        }
    }

    info!("sweep loop stopped");
}
