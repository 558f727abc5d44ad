//! The triage decision algorithm.
//!
//! Identical whether invoked for a fresh submission or for a backlog record
//! during the reconciliation sweep: exclude memory-pressure crashes, scan
//! the candidate signatures in catalog order, and resolve the remediation
//! status of the first pattern found in the log text.
//!
//! The matching and status rules are pure functions; [`classify`] is the
//! async driver that feeds them from the store.

use serde::{Deserialize, Serialize};

use crate::catalog::{RemediationStatus, Signature, MEMORY_PRESSURE_SENTINEL};
use crate::store::{StoreError, TriageStore};

/// Outcome of triaging one report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageResult {
    /// Whether a catalog signature matched the log text.
    pub matched: bool,
    /// The matched signature's id, set exactly when `matched` is true.
    pub signature_id: Option<i64>,
    /// Remediation status to report back to the submitter.
    pub status: RemediationStatus,
}

impl TriageResult {
    /// An unmatched outcome carrying the given status.
    pub fn unmatched(status: RemediationStatus) -> Self {
        Self {
            matched: false,
            signature_id: None,
            status,
        }
    }
}

/// First signature whose pattern occurs in the log text, in slice order.
///
/// First-match-wins, not best-match: the catalog is small, append-only and
/// scanned in insertion order, so the first hit is the deterministic answer.
/// Empty patterns never match.
pub fn match_candidate<'a>(log_text: &str, candidates: &'a [Signature]) -> Option<&'a Signature> {
    candidates
        .iter()
        .find(|sig| !sig.pattern.is_empty() && log_text.contains(sig.pattern.as_str()))
}

/// Remediation status for a matched signature.
///
/// When the fix version cannot be told apart from the affected range the
/// fix target is undefined and the status is pinned to
/// [`FixPendingReview`](RemediationStatus::FixPendingReview) without
/// consulting the release table. Otherwise a non-empty fix version maps
/// through the recorded release-status code, and an empty one means no fix
/// is known yet.
pub fn resolve_status(signature: &Signature, release_code: Option<i64>) -> RemediationStatus {
    if signature.fix_version == signature.affected_versions {
        RemediationStatus::FixPendingReview
    } else if !signature.fix_version.is_empty() {
        release_code
            .map(RemediationStatus::from_release_code)
            .unwrap_or(RemediationStatus::KnownUnfixed)
    } else {
        RemediationStatus::KnownUnfixed
    }
}

/// Triage one report against the current catalog.
///
/// Memory-pressure crashes short-circuit as unmatched before any catalog
/// access — they are a distinct, already-understood cause and are stored
/// without a signature reference.
///
/// # Errors
///
/// Propagates [`StoreError`] from candidate or release-status reads.
pub async fn classify(
    store: &TriageStore,
    log_text: &str,
    crash_app_version: &str,
) -> Result<TriageResult, StoreError> {
    if log_text.contains(MEMORY_PRESSURE_SENTINEL) {
        return Ok(TriageResult::unmatched(RemediationStatus::MemoryPressure));
    }

    let candidates = store.find_candidates(crash_app_version).await?;
    let Some(signature) = match_candidate(log_text, &candidates) else {
        return Ok(TriageResult::unmatched(RemediationStatus::Unknown));
    };

    let needs_release_lookup = signature.fix_version != signature.affected_versions
        && !signature.fix_version.is_empty();
    let release_code = if needs_release_lookup {
        store.release_status(&signature.fix_version).await?
    } else {
        None
    };

    Ok(TriageResult {
        matched: true,
        signature_id: Some(signature.id),
        status: resolve_status(signature, release_code),
    })
}
