use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized, persisted representation of one email. Created once on first
/// ingestion of its external id; never updated or deleted by this system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailRecord {
    /// Provider-assigned unique message id; the natural de-duplication key.
    pub external_id: String,
    pub thread_id: String,
    pub label_ids: Vec<String>,
    pub snippet: String,
    pub history_id: String,
    /// Received timestamp, epoch milliseconds as a string, as the provider
    /// sent it.
    pub internal_date: String,
    /// Provider payload, verbatim.
    pub payload: Value,
    pub size_estimate: i64,
    pub raw: Option<String>,
    pub sender: String,
    pub received_date: DateTime<Utc>,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Inserted,
    SkippedDuplicate,
}
