//! Signature catalog domain types.
//!
//! A [`Signature`] pairs a literal log pattern with the app versions it
//! affects and its remediation metadata. Catalog entries are authored
//! externally; the engine only ever increments the occurrence counter.

use serde::{Deserialize, Serialize};

/// Sentinel substring marking an out-of-memory crash.
///
/// Reports whose log contains this string are deliberately excluded from
/// pattern classification — memory pressure is a distinct, already
/// understood cause.
pub const MEMORY_PRESSURE_SENTINEL: &str = "Memory Warning!";

/// A known crash signature from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Database row id.
    pub id: i64,
    /// Literal substring searched for inside report log text.
    pub pattern: String,
    /// Version in which a fix ships. Empty means not yet fixed.
    pub fix_version: String,
    /// Version descriptor this signature applies to — an exact version or a
    /// SQL-LIKE wildcard pattern.
    pub affected_versions: String,
    /// How many reports have matched this signature so far.
    pub occurrences: i64,
}

/// Remediation lifecycle stage of a triaged report.
///
/// The wire protocol collapses several variants onto code `0`; the enum
/// keeps the causes distinct so logs and tests can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemediationStatus {
    /// No known signature matched.
    Unknown,
    /// The report was an out-of-memory crash; never pattern-classified.
    MemoryPressure,
    /// A signature matched but no fix is available yet.
    KnownUnfixed,
    /// A signature matched and the issue is newly catalogued.
    KnownNewSignature,
    /// A fix exists and will ship in the next release.
    FixPendingReview,
    /// A fixed release has been submitted for store approval.
    FixSubmittedForApproval,
    /// A fixed release has shipped.
    FixShipped,
}

impl RemediationStatus {
    /// Integer code emitted in the result document.
    ///
    /// `0` is shared by [`Unknown`](Self::Unknown),
    /// [`MemoryPressure`](Self::MemoryPressure) and
    /// [`KnownUnfixed`](Self::KnownUnfixed), and doubles as the uniform
    /// rejection code at the ingestion boundary.
    pub fn code(self) -> u8 {
        match self {
            Self::Unknown | Self::MemoryPressure | Self::KnownUnfixed => 0,
            Self::KnownNewSignature => 1,
            Self::FixPendingReview => 2,
            Self::FixSubmittedForApproval => 3,
            Self::FixShipped => 4,
        }
    }

    /// Map a stored release-status code back to a status.
    ///
    /// Unregistered or out-of-range codes fall back to
    /// [`KnownUnfixed`](Self::KnownUnfixed) — a match without a usable
    /// release entry still identifies a known issue.
    pub fn from_release_code(code: i64) -> Self {
        match code {
            1 => Self::KnownNewSignature,
            2 => Self::FixPendingReview,
            3 => Self::FixSubmittedForApproval,
            4 => Self::FixShipped,
            _ => Self::KnownUnfixed,
        }
    }
}
