//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` and are safe
//! to re-run on every startup. Produces a convergent result.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS jobs (
    id                  TEXT PRIMARY KEY NOT NULL,
    external_task_id    TEXT,
    project_id          TEXT NOT NULL,
    status              TEXT NOT NULL CHECK(status IN ('pending','running','completed','failed')),
    created_at          TEXT NOT NULL,
    completed_at        TEXT,
    total_input_tokens  INTEGER NOT NULL DEFAULT 0,
    total_output_tokens INTEGER NOT NULL DEFAULT 0,
    total_cost          TEXT NOT NULL DEFAULT '0',
    total_sessions      INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS sessions (
    id                  TEXT PRIMARY KEY NOT NULL,
    job_id              TEXT NOT NULL,
    external_session_id TEXT,
    started_at          TEXT NOT NULL,
    ended_at            TEXT,
    input_tokens        INTEGER NOT NULL DEFAULT 0,
    output_tokens       INTEGER NOT NULL DEFAULT 0,
    cost                TEXT NOT NULL DEFAULT '0'
);

CREATE TABLE IF NOT EXISTS advisory_lock (
    key                 TEXT PRIMARY KEY NOT NULL,
    acquired_at         TEXT NOT NULL,
    expires_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS paused_turn (
    session_id          TEXT PRIMARY KEY NOT NULL,
    job_id              TEXT NOT NULL,
    created_at          TEXT NOT NULL,
    expires_at          TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_request (
    request_id          TEXT PRIMARY KEY NOT NULL,
    processed_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_job ON sessions(job_id);
CREATE INDEX IF NOT EXISTS idx_jobs_project ON jobs(project_id);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
