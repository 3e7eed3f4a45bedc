//! The sequential ingestion pipeline: enumerate, normalize, persist.

use crate::api::gmail_api::GmailApi;
use crate::db::models::IngestOutcome;
use crate::db::sqlite::EmailStorage;
use crate::error::SinkError;
use crate::service::normalizer::normalize;
use tracing::{error, info};

/// Counts for one ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub listed: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// List one page of recent messages and ingest them one at a time.
///
/// Fetch and normalization failures abort the remaining batch; storage
/// failures are logged per message and the loop continues.
pub async fn run_ingestion(
    api: &GmailApi,
    access_token: &str,
    storage: &EmailStorage,
    page_size: u32,
) -> Result<IngestReport, SinkError> {
    let refs = api.list_message_ids(access_token, page_size).await?;
    let mut report = IngestReport {
        listed: refs.len(),
        ..Default::default()
    };
    if refs.is_empty() {
        info!("no messages found");
        return Ok(report);
    }

    for msg_ref in &refs {
        let raw = api.get_message(access_token, &msg_ref.id).await?;
        let record = normalize(&raw)?;
        match storage.ingest(&record).await {
            Ok(IngestOutcome::Inserted) => {
                info!(id = %record.external_id, "stored email");
                report.inserted += 1;
            }
            Ok(IngestOutcome::SkippedDuplicate) => {
                info!(id = %record.external_id, "email already exists, skipping");
                report.skipped += 1;
            }
            Err(e) => {
                error!(id = %record.external_id, error = %e, "failed to store email");
            }
        }
    }

    info!(
        listed = report.listed,
        inserted = report.inserted,
        skipped = report.skipped,
        "ingestion run complete"
    );
    Ok(report)
}
