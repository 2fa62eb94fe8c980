//! Unit tests for database connection and schema bootstrap.

use agent_dispatch::persistence::db;

#[tokio::test]
async fn connect_creates_missing_parent_directories() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join("ledger.db");

    let pool = db::connect(&path).await.expect("connect");
    assert!(path.exists(), "database file created");

    // Schema is applied; core tables are queryable.
    sqlx::query("SELECT COUNT(*) FROM jobs")
        .execute(&pool)
        .await
        .expect("jobs table");
    sqlx::query("SELECT COUNT(*) FROM paused_turn")
        .execute(&pool)
        .await
        .expect("paused_turn table");
}

#[tokio::test]
async fn bootstrap_is_idempotent_across_connects() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("ledger.db");

    let first = db::connect(&path).await.expect("first connect");
    first.close().await;
    db::connect(&path).await.expect("second connect");
}
