/// Inline SQL migrations for the record store schema.
///
/// Records are stored as JSON documents; secondary indexes are expression
/// indexes over the fields `Index` can query.
pub const MIGRATIONS: &[&str] = &[
    // Migration 1: records table
    r#"
CREATE TABLE IF NOT EXISTS records (
    kind       TEXT NOT NULL,
    key        TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (kind, key)
);
"#,
    // Migration 2: owner index (jobs by user, newest first)
    r#"
CREATE INDEX IF NOT EXISTS idx_records_owner
    ON records(kind, json_extract(body, '$.user_id'), created_at);
"#,
    // Migration 3: parent-job index (kits and tasks by job)
    r#"
CREATE INDEX IF NOT EXISTS idx_records_job
    ON records(kind, json_extract(body, '$.job_id'), created_at);
"#,
    // Migration 4: status index (tasks by status, for the stale-task sweep)
    r#"
CREATE INDEX IF NOT EXISTS idx_records_status
    ON records(kind, json_extract(body, '$.status'), created_at);
"#,
];
