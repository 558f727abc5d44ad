//! Incoming crash-report parsing and field validation.
//!
//! A submission is one XML document; [`parser`] turns it into a typed
//! [`IncomingReport`] in a single streaming pass, and [`validate`] gates the
//! untrusted fields before anything downstream touches them. The report
//! value is immutable once built — there is no shared state between the
//! parse and classify phases.

pub mod parser;
pub mod validate;

use serde::{Deserialize, Serialize};

/// A parsed crash submission, consumed once by the triage pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingReport {
    /// Version of the app at submission time.
    pub app_version: String,
    /// Version of the app that produced the crash.
    pub crash_app_version: String,
    /// Free memory when the app started.
    pub start_memory: String,
    /// Free memory when the app crashed.
    pub end_memory: String,
    /// Optional reporter contact string.
    pub contact: String,
    /// The crash log body.
    pub log_text: String,
}

/// Errors rejecting a crash submission before triage.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The submission is not well-formed XML.
    #[error("malformed crash report: {0}")]
    Malformed(#[from] quick_xml::Error),

    /// A field accumulated more bytes than the configured cap.
    #[error("field {field} exceeds {max} byte limit")]
    FieldTooLarge {
        /// Element name of the oversized field.
        field: &'static str,
        /// The configured cap in bytes.
        max: usize,
    },

    /// A field failed its character-class contract.
    #[error("field {field} contains characters outside its allowed set")]
    InvalidField {
        /// Element name of the rejected field.
        field: &'static str,
    },
}
