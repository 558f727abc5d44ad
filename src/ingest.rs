//! The submission pipeline: parse, validate, triage, persist, answer.
//!
//! [`handle_submission`] is the machine-to-machine boundary. Whatever
//! happens — successful triage, dropped submission, parse failure, storage
//! failure — the caller gets back the fixed-shape result document and
//! nothing else. Code `0` is shared between "no known issue" and every
//! rejection path; consumers depend on that shape, so the ambiguity is
//! preserved deliberately.

use tracing::{debug, info, warn};

use crate::report::parser::{parse_submission, ParseLimits};
use crate::report::ParseError;
use crate::store::{StoreError, TriageStore};
use crate::triage::{classify, TriageResult};

/// Errors rejecting a single submission.
///
/// Handled entirely at the submission boundary; nothing here propagates
/// past [`handle_submission`].
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The submission failed to parse or validate.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A catalog read or record write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A successfully processed submission.
#[derive(Debug, Clone, Copy)]
pub struct IngestOutcome {
    /// Id of the crash record created for this submission.
    pub record_id: i64,
    /// The triage decision that was persisted.
    pub result: TriageResult,
}

/// Parse, triage and persist one submission.
///
/// Returns `Ok(None)` when the document is incomplete (no log content or no
/// version): the submission is dropped without creating a record. Exactly
/// one crash record is created otherwise, with the matched signature's
/// occurrence counter incremented in the same transaction.
///
/// # Errors
///
/// [`IngestError::Parse`] for malformed, oversized or invalid-field input;
/// [`IngestError::Store`] when a read or write fails (no partial writes
/// survive — the record insert and counter increment are one transaction).
pub async fn ingest_submission(
    store: &TriageStore,
    limits: &ParseLimits,
    xmlstring: &str,
) -> Result<Option<IngestOutcome>, IngestError> {
    let Some(report) = parse_submission(xmlstring, limits)? else {
        return Ok(None);
    };

    let result = classify(store, &report.log_text, &report.crash_app_version).await?;
    let record_id = store.record_submission(&report, &result).await?;

    Ok(Some(IngestOutcome { record_id, result }))
}

/// The ingestion boundary: always answers with a result document.
///
/// Empty input, dropped submissions and every error path collapse onto
/// code `0`; errors are logged here and never escape.
pub async fn handle_submission(
    store: &TriageStore,
    limits: &ParseLimits,
    xmlstring: &str,
) -> String {
    if xmlstring.trim().is_empty() {
        debug!("empty submission");
        return render_result(0);
    }

    match ingest_submission(store, limits, xmlstring).await {
        Ok(Some(outcome)) => {
            info!(
                record_id = outcome.record_id,
                matched = outcome.result.matched,
                signature_id = outcome.result.signature_id,
                code = outcome.result.status.code(),
                "submission triaged"
            );
            render_result(outcome.result.status.code())
        }
        Ok(None) => {
            debug!("submission dropped: incomplete report");
            render_result(0)
        }
        Err(err) => {
            warn!(error = %err, "submission rejected");
            render_result(0)
        }
    }
}

/// Render the fixed-shape result document.
///
/// The prolog and element shape match what existing consumers parse; only
/// the integer code varies.
pub fn render_result(code: u8) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><result>{code}</result>")
}
