//! End-to-end submission tests: raw document in, result document out,
//! storage effects checked.

use crashtriage::ingest::handle_submission;
use crashtriage::report::parser::ParseLimits;
use crashtriage::store::TriageStore;

async fn setup_store() -> TriageStore {
    let store = TriageStore::in_memory().await.expect("store should open");
    store.migrate().await.expect("schema should apply");
    store
}

fn submission(crash_app_version: &str, log_body: &str) -> String {
    format!(
        "<crashlog>\
         <version>{crash_app_version}</version>\
         <crashappversion>{crash_app_version}</crashappversion>\
         <startmemory>10000</startmemory>\
         <endmemory>5000</endmemory>\
         <contact>no contact</contact>\
         <log><![CDATA[{log_body}]]></log>\
         </crashlog>"
    )
}

fn result_doc(code: u8) -> String {
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?><result>{code}</result>")
}

async fn record_count(store: &TriageStore) -> i64 {
    let row: (i64,) = sqlx::query_as("SELECT count(*) FROM crash_reports")
        .fetch_one(store.pool())
        .await
        .expect("count should succeed");
    row.0
}

#[tokio::test]
async fn shipped_fix_reports_code_four_and_applies_both_writes() {
    let store = setup_store().await;
    let sig_id = store
        .add_signature("0x000b0419", "1.3.0", "1.2.2.1")
        .await
        .expect("insert should succeed");
    store
        .set_release_status("1.3.0", 4)
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.2.2.1", "0x000b0419 0x1000 + 717849");
    let result = handle_submission(&store, &limits, &doc).await;

    assert_eq!(result, result_doc(4));
    assert_eq!(record_count(&store).await, 1);

    let signature = store
        .signature(sig_id)
        .await
        .expect("fetch should succeed")
        .expect("signature should exist");
    assert_eq!(signature.occurrences, 1);

    let (resolved, signature_id): (i64, Option<i64>) =
        sqlx::query_as("SELECT resolved, signature_id FROM crash_reports LIMIT 1")
            .fetch_one(store.pool())
            .await
            .expect("fetch should succeed");
    assert_eq!(resolved, 1);
    assert_eq!(signature_id, Some(sig_id));
}

#[tokio::test]
async fn empty_log_creates_no_record() {
    let store = setup_store().await;
    let limits = ParseLimits::default();

    let doc = "<crashlog><version>1.0</version><log></log></crashlog>";
    let result = handle_submission(&store, &limits, doc).await;

    assert_eq!(result, result_doc(0));
    assert_eq!(record_count(&store).await, 0);
}

#[tokio::test]
async fn empty_submission_is_rejected_without_record() {
    let store = setup_store().await;
    let limits = ParseLimits::default();

    let result = handle_submission(&store, &limits, "   ").await;

    assert_eq!(result, result_doc(0));
    assert_eq!(record_count(&store).await, 0);
}

#[tokio::test]
async fn malformed_submission_is_rejected_without_record() {
    let store = setup_store().await;
    let limits = ParseLimits::default();

    let result = handle_submission(&store, &limits, "<crashlog><version>1.0</oops>").await;

    assert_eq!(result, result_doc(0));
    assert_eq!(record_count(&store).await, 0);
}

#[tokio::test]
async fn memory_pressure_bypasses_the_catalog_entirely() {
    let store = setup_store().await;
    // A pattern that would match the log body if scanning happened.
    let sig_id = store
        .add_signature("Memory", "1.1", "1.0")
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.0", "Memory Warning!");
    let result = handle_submission(&store, &limits, &doc).await;

    assert_eq!(result, result_doc(0));
    assert_eq!(record_count(&store).await, 1);

    let signature = store
        .signature(sig_id)
        .await
        .expect("fetch should succeed")
        .expect("signature should exist");
    assert_eq!(signature.occurrences, 0);

    let (resolved, signature_id): (i64, Option<i64>) =
        sqlx::query_as("SELECT resolved, signature_id FROM crash_reports LIMIT 1")
            .fetch_one(store.pool())
            .await
            .expect("fetch should succeed");
    assert_eq!(resolved, 0, "memory-pressure reports stay unmatched");
    assert_eq!(signature_id, None);
}

#[tokio::test]
async fn invalid_crash_app_version_is_rejected_before_any_write() {
    let store = setup_store().await;
    let limits = ParseLimits::default();

    let doc = "<crashlog><version>1.0</version>\
               <crashappversion>1.2.3&lt;script&gt;</crashappversion>\
               <log>some crash</log></crashlog>";
    let result = handle_submission(&store, &limits, doc).await;

    assert_eq!(result, result_doc(0));
    assert_eq!(record_count(&store).await, 0);
}

#[tokio::test]
async fn identical_fix_and_affected_reports_pending_review() {
    let store = setup_store().await;
    store
        .add_signature("0xdead", "1.0", "1.0")
        .await
        .expect("insert should succeed");
    // Release table contents must not influence the degenerate case.
    store
        .set_release_status("1.0", 4)
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.0", "crash at 0xdead");
    let result = handle_submission(&store, &limits, &doc).await;

    assert_eq!(result, result_doc(2));
}

#[tokio::test]
async fn unmatched_report_is_stored_unresolved_with_code_zero() {
    let store = setup_store().await;
    store
        .add_signature("0xdead", "", "1.0")
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.0", "a crash nothing in the catalog explains");
    let result = handle_submission(&store, &limits, &doc).await;

    assert_eq!(result, result_doc(0));

    let (resolved, signature_id): (i64, Option<i64>) =
        sqlx::query_as("SELECT resolved, signature_id FROM crash_reports LIMIT 1")
            .fetch_one(store.pool())
            .await
            .expect("fetch should succeed");
    assert_eq!(resolved, 0);
    assert_eq!(signature_id, None);
}

#[tokio::test]
async fn first_catalogued_signature_wins() {
    let store = setup_store().await;
    let first = store
        .add_signature("A", "", "1.0")
        .await
        .expect("insert should succeed");
    let second = store
        .add_signature("AB", "", "1.0")
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.0", "log containing AB here");
    let result = handle_submission(&store, &limits, &doc).await;

    // Both patterns are substrings; the first catalog entry takes the match.
    assert_eq!(result, result_doc(0));
    let winner = store
        .signature(first)
        .await
        .expect("fetch should succeed")
        .expect("signature should exist");
    assert_eq!(winner.occurrences, 1);
    let loser = store
        .signature(second)
        .await
        .expect("fetch should succeed")
        .expect("signature should exist");
    assert_eq!(loser.occurrences, 0);
}

#[tokio::test]
async fn known_unfixed_signature_reports_code_zero_but_resolves_record() {
    let store = setup_store().await;
    let sig_id = store
        .add_signature("0xdead", "", "1.0")
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.0", "crash at 0xdead");
    let result = handle_submission(&store, &limits, &doc).await;

    assert_eq!(result, result_doc(0));

    let (resolved, signature_id): (i64, Option<i64>) =
        sqlx::query_as("SELECT resolved, signature_id FROM crash_reports LIMIT 1")
            .fetch_one(store.pool())
            .await
            .expect("fetch should succeed");
    assert_eq!(resolved, 1, "a known-unfixed match still resolves the record");
    assert_eq!(signature_id, Some(sig_id));
}

#[tokio::test]
async fn release_status_of_fix_version_selects_the_code() {
    let store = setup_store().await;
    store
        .add_signature("0xdead", "2.0", "1.0")
        .await
        .expect("insert should succeed");
    store
        .set_release_status("2.0", 3)
        .await
        .expect("insert should succeed");

    let limits = ParseLimits::default();
    let doc = submission("1.0", "crash at 0xdead");
    let result = handle_submission(&store, &limits, &doc).await;

    assert_eq!(result, result_doc(3));
}
