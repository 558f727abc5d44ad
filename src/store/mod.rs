//! SQLite persistence for crash records, the signature catalog, and
//! release statuses.
//!
//! The [`TriageStore`] is the sole gateway to the database. All untrusted
//! values reach SQL through parameter binds — never through interpolated
//! query text. The two-write effects of a triage decision (insert record,
//! bump the matched signature's counter) commit as one transaction, so a
//! partially applied decision cannot persist.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::catalog::Signature;
use crate::report::IncomingReport;
use crate::triage::TriageResult;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A persisted crash report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Database row id.
    pub id: i64,
    /// Reporter contact string.
    pub contact: String,
    /// App version at submission time.
    pub app_version: String,
    /// App version that produced the crash.
    pub crash_app_version: String,
    /// Free memory at app start.
    pub start_memory: String,
    /// Free memory at crash time.
    pub end_memory: String,
    /// The crash log body.
    pub log_text: String,
    /// Whether a signature match has been found.
    pub resolved: bool,
    /// The matched signature, set exactly when `resolved` is true.
    pub signature_id: Option<i64>,
    /// RFC 3339 ingestion timestamp.
    pub received_at: String,
}

/// Gateway to the triage database.
#[derive(Debug, Clone)]
pub struct TriageStore {
    db: SqlitePool,
}

impl TriageStore {
    /// Open (creating if missing) the database at `path`.
    pub async fn connect(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true);
        let db = SqlitePoolOptions::new().connect_with(options).await?;
        info!(path = %path.display(), "triage database opened");
        Ok(Self { db })
    }

    /// Open an in-memory database (tests and ephemeral runs).
    ///
    /// Pinned to a single connection so every query sees the same database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true)
            .foreign_keys(true);
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Ok(Self { db })
    }

    /// Apply the schema. Idempotent — every statement is `IF NOT EXISTS`.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let schema = include_str!("../../migrations/001_schema.sql");
        sqlx::raw_sql(schema).execute(&self.db).await?;
        Ok(())
    }

    /// Returns a reference to the underlying pool (tests, ad-hoc queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    // -----------------------------------------------------------------
    // Signature catalog (read side)
    // -----------------------------------------------------------------

    /// Every signature whose affected-version descriptor contains
    /// `crash_app_version` as a substring, in insertion order.
    ///
    /// Deterministic `id` ordering is what makes first-match-wins
    /// reproducible; callers must not re-sort.
    pub async fn find_candidates(
        &self,
        crash_app_version: &str,
    ) -> Result<Vec<Signature>, StoreError> {
        let rows: Vec<(i64, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, pattern, fix_version, affected_versions, occurrences \
             FROM signatures \
             WHERE affected_versions LIKE '%' || ?1 || '%' \
             ORDER BY id ASC",
        )
        .bind(crash_app_version)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(signature_from_row).collect())
    }

    /// The full catalog in insertion order (sweep outer loop).
    pub async fn signatures(&self) -> Result<Vec<Signature>, StoreError> {
        let rows: Vec<(i64, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, pattern, fix_version, affected_versions, occurrences \
             FROM signatures ORDER BY id ASC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(signature_from_row).collect())
    }

    /// Look up the release-status code recorded for a version string.
    ///
    /// The version column is unique; the `rowid DESC` tie-break keeps the
    /// lookup deterministic (last-written-wins) against databases created
    /// before the constraint existed.
    pub async fn release_status(&self, version: &str) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT status FROM release_status WHERE version = ?1 \
             ORDER BY rowid DESC LIMIT 1",
        )
        .bind(version)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(status,)| status))
    }

    // -----------------------------------------------------------------
    // Persistence effects
    // -----------------------------------------------------------------

    /// Persist a fresh submission and its triage outcome as one unit of work.
    ///
    /// Inserts the crash record and, when the outcome names a signature,
    /// increments that signature's occurrence counter in the same
    /// transaction. Returns the new record id.
    pub async fn record_submission(
        &self,
        report: &IncomingReport,
        outcome: &TriageResult,
    ) -> Result<i64, StoreError> {
        let mut tx = self.db.begin().await?;

        let received_at = Utc::now().to_rfc3339();
        let resolved = i64::from(outcome.signature_id.is_some());
        let inserted = sqlx::query(
            "INSERT INTO crash_reports \
             (contact, app_version, crash_app_version, start_memory, end_memory, \
              log_text, resolved, signature_id, received_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(&report.contact)
        .bind(&report.app_version)
        .bind(&report.crash_app_version)
        .bind(&report.start_memory)
        .bind(&report.end_memory)
        .bind(&report.log_text)
        .bind(resolved)
        .bind(outcome.signature_id)
        .bind(&received_at)
        .execute(&mut *tx)
        .await?;

        if let Some(signature_id) = outcome.signature_id {
            sqlx::query("UPDATE signatures SET occurrences = occurrences + 1 WHERE id = ?1")
                .bind(signature_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted.last_insert_rowid())
    }

    /// Ids of unresolved records matching a signature, for the sweep.
    ///
    /// A record matches when its stored `app_version` satisfies the
    /// signature's affected-version LIKE pattern and its log contains the
    /// signature's pattern literally. Cursor pagination (`id > after_id`)
    /// keeps each batch bounded and guarantees forward progress even when
    /// an individual record fails to resolve.
    pub async fn unresolved_matches(
        &self,
        signature: &Signature,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<i64>, StoreError> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT id FROM crash_reports \
             WHERE resolved = 0 AND id > ?1 \
               AND app_version LIKE ?2 \
               AND log_text LIKE '%' || ?3 || '%' ESCAPE '\\' \
             ORDER BY id ASC LIMIT ?4",
        )
        .bind(after_id)
        .bind(&signature.affected_versions)
        .bind(escape_like(&signature.pattern))
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Mark a record resolved against a signature and bump the counter.
    ///
    /// Guarded by `resolved = 0`: a record resolved by a concurrent live
    /// submission or an earlier pass is left untouched and the counter is
    /// not incremented, which is what makes re-running the sweep
    /// idempotent. Returns whether the effect was applied.
    pub async fn resolve_record(
        &self,
        record_id: i64,
        signature_id: i64,
    ) -> Result<bool, StoreError> {
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE crash_reports SET resolved = 1, signature_id = ?1 \
             WHERE id = ?2 AND resolved = 0",
        )
        .bind(signature_id)
        .bind(record_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE signatures SET occurrences = occurrences + 1 WHERE id = ?1")
            .bind(signature_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    // -----------------------------------------------------------------
    // Catalog authoring hooks (externally driven; also used by tests)
    // -----------------------------------------------------------------

    /// Insert a new signature, returning its id.
    pub async fn add_signature(
        &self,
        pattern: &str,
        fix_version: &str,
        affected_versions: &str,
    ) -> Result<i64, StoreError> {
        let inserted = sqlx::query(
            "INSERT INTO signatures (pattern, fix_version, affected_versions) \
             VALUES (?1, ?2, ?3)",
        )
        .bind(pattern)
        .bind(fix_version)
        .bind(affected_versions)
        .execute(&self.db)
        .await?;
        Ok(inserted.last_insert_rowid())
    }

    /// Record (or replace) the release-status code for a version string.
    pub async fn set_release_status(&self, version: &str, status: i64) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO release_status (version, status) VALUES (?1, ?2) \
             ON CONFLICT (version) DO UPDATE SET status = excluded.status",
        )
        .bind(version)
        .bind(status)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Fetch one crash record by id.
    pub async fn record(&self, id: i64) -> Result<Option<CrashRecord>, StoreError> {
        let row: Option<(
            i64,
            String,
            String,
            String,
            String,
            String,
            String,
            i64,
            Option<i64>,
            String,
        )> = sqlx::query_as(
            "SELECT id, contact, app_version, crash_app_version, start_memory, \
                    end_memory, log_text, resolved, signature_id, received_at \
             FROM crash_reports WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(
            |(
                id,
                contact,
                app_version,
                crash_app_version,
                start_memory,
                end_memory,
                log_text,
                resolved,
                signature_id,
                received_at,
            )| CrashRecord {
                id,
                contact,
                app_version,
                crash_app_version,
                start_memory,
                end_memory,
                log_text,
                resolved: resolved != 0,
                signature_id,
                received_at,
            },
        ))
    }

    /// Fetch one signature by id.
    pub async fn signature(&self, id: i64) -> Result<Option<Signature>, StoreError> {
        let row: Option<(i64, String, String, String, i64)> = sqlx::query_as(
            "SELECT id, pattern, fix_version, affected_versions, occurrences \
             FROM signatures WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(signature_from_row))
    }
}

fn signature_from_row(
    (id, pattern, fix_version, affected_versions, occurrences): (i64, String, String, String, i64),
) -> Signature {
    Signature {
        id,
        pattern,
        fix_version,
        affected_versions,
        occurrences,
    }
}

/// Escape LIKE metacharacters so a signature pattern matches literally.
fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
