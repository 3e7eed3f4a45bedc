use crate::db::models::{EmailRecord, IngestOutcome};
use crate::db::schema::SQLITE_INIT;
use crate::error::SinkError;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

/// Open the process-wide pool and initialize the schema. Called once at
/// startup; the pool is reused for every operation afterwards.
pub async fn connect(database_url: &str) -> Result<EmailStorage, SinkError> {
    let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(connect_opts).await?;
    let storage = EmailStorage::new(pool);
    storage.init_schema().await?;
    Ok(storage)
}

#[derive(Clone)]
pub struct EmailStorage {
    pool: SqlitePool,
}

impl EmailStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), SinkError> {
        // execute multiple statements safely (SQLite supports multi-commands but sqlx::query doesn't)
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Check-then-insert: a record whose external id already exists is
    /// skipped without writing. The two steps are separate statements; the
    /// UNIQUE constraint on `external_id` is the backstop for interleaved
    /// runs, surfacing as an insert error rather than a duplicate row.
    pub async fn ingest(&self, record: &EmailRecord) -> Result<IngestOutcome, SinkError> {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM emails WHERE external_id = ?")
                .bind(&record.external_id)
                .fetch_optional(&self.pool)
                .await?;
        if existing.is_some() {
            return Ok(IngestOutcome::SkippedDuplicate);
        }
        self.insert(record).await?;
        Ok(IngestOutcome::Inserted)
    }

    async fn insert(&self, record: &EmailRecord) -> Result<(), SinkError> {
        let label_ids = serde_json::to_string(&record.label_ids)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let payload = serde_json::to_string(&record.payload)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let received_date = record.received_date.to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO emails (
                external_id, thread_id, label_ids, snippet, history_id,
                internal_date, payload, size_estimate, raw, sender,
                received_date, subject, body
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.external_id)
        .bind(&record.thread_id)
        .bind(label_ids)
        .bind(&record.snippet)
        .bind(&record.history_id)
        .bind(&record.internal_date)
        .bind(payload)
        .bind(record.size_estimate)
        .bind(&record.raw)
        .bind(&record.sender)
        .bind(received_date)
        .bind(&record.subject)
        .bind(&record.body)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<EmailRecord>, SinkError> {
        let row = sqlx::query(
            r#"SELECT external_id, thread_id, label_ids, snippet, history_id,
               internal_date, payload, size_estimate, raw, sender,
               received_date, subject, body
               FROM emails WHERE external_id = ?"#,
        )
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_model).transpose()
    }

    pub async fn count(&self) -> Result<i64, SinkError> {
        let rec: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM emails")
            .fetch_one(&self.pool)
            .await?;
        Ok(rec.0)
    }

    fn row_to_model(row: SqliteRow) -> Result<EmailRecord, SinkError> {
        let external_id: String = row.try_get("external_id")?;
        let thread_id: String = row.try_get("thread_id")?;
        let label_ids_json: String = row.try_get("label_ids")?;
        let snippet: String = row.try_get("snippet")?;
        let history_id: String = row.try_get("history_id")?;
        let internal_date: String = row.try_get("internal_date")?;
        let payload_json: String = row.try_get("payload")?;
        let size_estimate: i64 = row.try_get("size_estimate")?;
        let raw: Option<String> = row.try_get("raw")?;
        let sender: String = row.try_get("sender")?;
        let received_str: String = row.try_get("received_date")?;
        let subject: String = row.try_get("subject")?;
        let body: String = row.try_get("body")?;

        let label_ids: Vec<String> = serde_json::from_str(&label_ids_json)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let payload: serde_json::Value =
            serde_json::from_str(&payload_json).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let received_date: DateTime<Utc> = DateTime::parse_from_rfc3339(&received_str)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
            .with_timezone(&Utc);

        Ok(EmailRecord {
            external_id,
            thread_id,
            label_ids,
            snippet,
            history_id,
            internal_date,
            payload,
            size_estimate,
            raw,
            sender,
            received_date,
            subject,
            body,
        })
    }
}
