use crate::db::*;
use crate::types::{FailureKind, ReportFigures, ReportKey, TaskStatus};
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Claim horizon that makes every RETRIEVAL_FAILED row eligible
const RETRY_EVERYTHING: i64 = i64::MAX;

fn key(county: &str, municipality: &str, year: i64) -> ReportKey {
    ReportKey::new(county, municipality, year)
}

fn figures(police: f64, total: f64) -> ReportFigures {
    ReportFigures {
        police_expenditure: Some(police),
        total_expenditure: Some(total),
    }
}

#[tokio::test]
async fn test_seeding_is_idempotent() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let k = key("Adams", "Gettysburg Borough", 2021);

    db.upsert_if_absent(&k).await.unwrap();
    db.upsert_if_absent(&k).await.unwrap();

    let counts = db.status_counts().await.unwrap();
    assert_eq!(counts.total(), 1, "duplicate seeding must not add rows");

    let row = db.get_report(&k).await.unwrap().unwrap();
    assert_eq!(row.status(), TaskStatus::NotAttempted);

    db.close().await;
}

#[tokio::test]
async fn test_seeding_never_disturbs_existing_results() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let k = key("Adams", "Gettysburg Borough", 2021);

    db.upsert_if_absent(&k).await.unwrap();
    db.record_success(&k, &figures(1.0, 2.0), None).await.unwrap();

    // Re-seeding the same key leaves the retrieved row untouched
    db.upsert_if_absent(&k).await.unwrap();
    let row = db.get_report(&k).await.unwrap().unwrap();
    assert_eq!(row.status(), TaskStatus::Retrieved);
    assert_eq!(row.police_expenditure, Some(1.0));

    db.close().await;
}

#[tokio::test]
async fn test_claim_returns_rows_in_key_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    db.upsert_if_absent(&key("Berks", "Reading City", 2020))
        .await
        .unwrap();
    db.upsert_if_absent(&key("Adams", "Gettysburg Borough", 2021))
        .await
        .unwrap();
    db.upsert_if_absent(&key("Adams", "Gettysburg Borough", 2020))
        .await
        .unwrap();

    let first = db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();
    let second = db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();
    let third = db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();

    assert_eq!(first.key(), key("Adams", "Gettysburg Borough", 2020));
    assert_eq!(second.key(), key("Adams", "Gettysburg Borough", 2021));
    assert_eq!(third.key(), key("Berks", "Reading City", 2020));
    assert_eq!(first.status(), TaskStatus::InProcess);

    assert!(db.claim_next(RETRY_EVERYTHING).await.unwrap().is_none());

    db.close().await;
}

#[tokio::test]
async fn test_concurrent_claims_never_hand_out_the_same_row() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Arc::new(Database::new(temp_file.path()).await.unwrap());

    let total_rows = 24;
    for i in 0..total_rows {
        db.upsert_if_absent(&key("Adams", &format!("Municipality {i:02}"), 2020))
            .await
            .unwrap();
    }

    let claimed = Arc::new(tokio::sync::Mutex::new(Vec::new()));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = db.clone();
        let claimed = claimed.clone();
        handles.push(tokio::spawn(async move {
            while let Some(row) = db.claim_next(RETRY_EVERYTHING).await.unwrap() {
                claimed.lock().await.push(row.id);
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let claimed = claimed.lock().await;
    assert_eq!(claimed.len(), total_rows, "every row claimed exactly once");
    let unique: HashSet<_> = claimed.iter().collect();
    assert_eq!(unique.len(), total_rows, "no row handed to two claimers");

    db.close().await;
}

#[tokio::test]
async fn test_terminal_rows_are_never_claimed_again() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let retrieved = key("Adams", "Gettysburg Borough", 2020);
    let unavailable = key("Adams", "Gettysburg Borough", 2021);

    db.upsert_if_absent(&retrieved).await.unwrap();
    db.upsert_if_absent(&unavailable).await.unwrap();
    db.record_success(&retrieved, &figures(10.0, 100.0), None)
        .await
        .unwrap();
    db.record_failure(&unavailable, FailureKind::Unavailable, None)
        .await
        .unwrap();

    assert!(db.claim_next(RETRY_EVERYTHING).await.unwrap().is_none());

    // Neither reset nor drop touches terminal rows
    assert_eq!(db.reset_incomplete().await.unwrap(), 0);
    assert_eq!(db.drop_incomplete().await.unwrap(), 0);
    assert!(db.claim_next(RETRY_EVERYTHING).await.unwrap().is_none());

    let counts = db.status_counts().await.unwrap();
    assert_eq!(counts.retrieved, 1);
    assert_eq!(counts.unavailable, 1);

    db.close().await;
}

#[tokio::test]
async fn test_failed_rows_stay_claimable_across_runs_but_not_within_one() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let k = key("Adams", "Gettysburg Borough", 2020);

    db.upsert_if_absent(&k).await.unwrap();
    let claimed = db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();
    db.record_failure(&claimed.key(), FailureKind::Failed, Some("render timeout"))
        .await
        .unwrap();

    // A horizon before the failure (a run already underway) skips the row
    assert!(db.claim_next(0).await.unwrap().is_none());

    // A later run (horizon after the failure) retries it
    let retried = db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();
    assert_eq!(retried.key(), k);
    assert_eq!(retried.error_message.as_deref(), Some("render timeout"));

    db.close().await;
}

#[tokio::test]
async fn test_reset_incomplete_recovers_crashed_claims() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let k = key("Adams", "Gettysburg Borough", 2020);

    db.upsert_if_absent(&k).await.unwrap();
    db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();
    // Simulated crash: the claim is never reconciled
    assert!(db.claim_next(RETRY_EVERYTHING).await.unwrap().is_none());

    assert_eq!(db.reset_incomplete().await.unwrap(), 1);

    let reclaimed = db.claim_next(RETRY_EVERYTHING).await.unwrap().unwrap();
    assert_eq!(reclaimed.key(), k);

    db.close().await;
}

#[tokio::test]
async fn test_record_success_stores_figures_and_clears_errors() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let k = key("Adams", "Gettysburg Borough", 2020);

    db.upsert_if_absent(&k).await.unwrap();
    db.record_failure(&k, FailureKind::Failed, Some("first try failed"))
        .await
        .unwrap();
    db.record_success(
        &k,
        &ReportFigures {
            police_expenditure: Some(125_000.5),
            total_expenditure: None,
        },
        Some("https://example.test/export/1"),
    )
    .await
    .unwrap();

    let row = db.get_report(&k).await.unwrap().unwrap();
    assert_eq!(row.status(), TaskStatus::Retrieved);
    assert_eq!(row.police_expenditure, Some(125_000.5));
    assert_eq!(row.total_expenditure, None);
    assert_eq!(
        row.export_url.as_deref(),
        Some("https://example.test/export/1")
    );
    assert!(row.error_message.is_none(), "success clears the failure message");

    db.close().await;
}

#[tokio::test]
async fn test_recording_against_missing_key_is_not_found() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let ghost = key("Nowhere", "Ghost Borough", 1999);

    let success = db.record_success(&ghost, &figures(1.0, 2.0), None).await;
    assert!(matches!(
        success,
        Err(crate::Error::Database(
            crate::error::DatabaseError::NotFound(_)
        ))
    ));

    let failure = db.record_failure(&ghost, FailureKind::Failed, None).await;
    assert!(matches!(
        failure,
        Err(crate::Error::Database(
            crate::error::DatabaseError::NotFound(_)
        ))
    ));

    db.close().await;
}

#[tokio::test]
async fn test_drop_incomplete_removes_only_claimable_rows() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let fresh = key("Adams", "Gettysburg Borough", 2020);
    let failed = key("Adams", "Gettysburg Borough", 2021);
    let done = key("Adams", "Gettysburg Borough", 2022);
    for k in [&fresh, &failed, &done] {
        db.upsert_if_absent(k).await.unwrap();
    }
    db.record_failure(&failed, FailureKind::Failed, None)
        .await
        .unwrap();
    db.record_success(&done, &figures(1.0, 2.0), None)
        .await
        .unwrap();

    assert_eq!(db.drop_incomplete().await.unwrap(), 2);

    assert!(db.get_report(&fresh).await.unwrap().is_none());
    assert!(db.get_report(&failed).await.unwrap().is_none());
    assert!(db.get_report(&done).await.unwrap().is_some());

    db.close().await;
}

#[tokio::test]
async fn test_updated_at_is_written_by_the_store() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    let k = key("Adams", "Gettysburg Borough", 2020);

    let before = chrono::Utc::now().timestamp_millis();
    db.upsert_if_absent(&k).await.unwrap();
    let seeded = db.get_report(&k).await.unwrap().unwrap();
    assert!(seeded.updated_at >= before);

    db.record_failure(&k, FailureKind::Failed, None)
        .await
        .unwrap();
    let failed = db.get_report(&k).await.unwrap().unwrap();
    assert!(failed.updated_at >= seeded.updated_at);

    db.close().await;
}

#[tokio::test]
async fn test_list_retrieved_returns_only_successes_in_key_order() {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();

    let b = key("Berks", "Reading City", 2020);
    let a = key("Adams", "Gettysburg Borough", 2020);
    let skipped = key("Adams", "Gettysburg Borough", 2021);
    for k in [&b, &a, &skipped] {
        db.upsert_if_absent(k).await.unwrap();
    }
    db.record_success(&b, &figures(3.0, 4.0), None).await.unwrap();
    db.record_success(&a, &figures(1.0, 2.0), None).await.unwrap();

    let rows = db.list_retrieved().await.unwrap();
    let keys: Vec<_> = rows.iter().map(|r| r.key()).collect();
    assert_eq!(keys, vec![a, b]);

    db.close().await;
}
