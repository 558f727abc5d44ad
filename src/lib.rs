//! Crashtriage — a crash-report triage engine.
//!
//! Deployed applications submit XML crash documents; the engine parses them
//! in a single streaming pass, matches the log text against a catalog of
//! known crash signatures, counts how often each signature recurs, and
//! answers with the remediation status of the matched issue as a single
//! integer code. A scheduled reconciliation sweep re-applies the current
//! catalog to reports that were unmatched when they arrived.
//!
//! See `DESIGN.md` for the grounding ledger and open-question decisions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod report;
pub mod store;
pub mod sweep;
pub mod triage;
