//! SQL DDL for initializing the email storage.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema with:
/// - `id` INTEGER PRIMARY KEY AUTOINCREMENT
/// - All fields mirrored from `EmailRecord`
/// - `external_id` UNIQUE, so an interleaved concurrent run cannot write a
///   duplicate row between the existence check and the insert
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS emails (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    external_id TEXT NOT NULL UNIQUE,
    thread_id TEXT NOT NULL,
    label_ids TEXT NOT NULL, -- JSON array, serialized as text
    snippet TEXT NOT NULL,
    history_id TEXT NOT NULL,
    internal_date TEXT NOT NULL,
    payload TEXT NOT NULL, -- provider payload, verbatim JSON
    size_estimate INTEGER NOT NULL,
    raw TEXT NULL,
    sender TEXT NOT NULL,
    received_date TEXT NOT NULL, -- RFC3339
    subject TEXT NOT NULL,
    body TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_emails_external_id ON emails(external_id);
"#;
