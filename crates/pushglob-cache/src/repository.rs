//! SQLite implementation of ILedgerStore
//!
//! This module provides the concrete SQLite-based implementation of the
//! ledger store port defined in pushglob-core. It owns the SQL and the
//! conversion between rows and domain types.
//!
//! ## Type Mapping
//!
//! | Domain Type         | SQL Type | Strategy                                     |
//! |---------------------|----------|----------------------------------------------|
//! | FileId, JobId       | INTEGER  | row id                                       |
//! | SpaceName, EndpointName, TaskId | TEXT | `.as_str()` / validating `new()`     |
//! | RelativePath        | TEXT     | normalized `/`-separated string              |
//! | mtime / timestamp   | REAL     | seconds since the Unix epoch                 |
//! | JobStatus           | TEXT     | external status string, passed through       |
//! | JobLink             | INTEGER  | job id, or `-1` once detached                |
//! | DateTime<Utc>       | TEXT     | RFC 3339                                     |
//! | registered batch    | TEXT     | serde_json `[[file_id, mtime], ...]`, or NULL |

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use pushglob_core::domain::{
    EndpointName, FileId, FileSyncStatus, JobId, JobLink, JobStatus, LedgerAction, RelativePath,
    SpaceName, SyncRecord, TaskId, TrackedFile, TransferJob,
};
use pushglob_core::ports::{FileObservation, ILedgerStore, NewDispatch, OpenJob, UpsertSummary};

use crate::CacheError;

/// Stored `transfer_id` of a record whose job has been resolved
const DETACHED_JOB: i64 = -1;

/// SQLite-based implementation of the ledger store port
///
/// Every multi-row mutation runs inside one transaction.
#[derive(Debug, Clone)]
pub struct SqliteLedgerStore {
    pool: SqlitePool,
}

impl SqliteLedgerStore {
    /// Creates a new store on the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::CorruptRow(format!("bad datetime '{}': {}", s, e)))
}

fn record_count(count: i64) -> Result<usize, CacheError> {
    usize::try_from(count).map_err(|_| CacheError::CorruptRow(format!("bad record count {}", count)))
}

fn job_link_from_column(transfer_id: i64) -> JobLink {
    if transfer_id < 0 {
        JobLink::Detached
    } else {
        JobLink::Attached(JobId::new(transfer_id))
    }
}

fn job_link_to_column(link: JobLink) -> i64 {
    link.job_id().map_or(DETACHED_JOB, JobId::get)
}

// ============================================================================
// Row mapping functions
// ============================================================================

fn tracked_file_from_row(row: &SqliteRow) -> Result<TrackedFile, CacheError> {
    let space: String = row.try_get("space")?;
    let name: String = row.try_get("name")?;
    Ok(TrackedFile {
        id: FileId::new(row.try_get("id")?),
        space: SpaceName::new(space).map_err(|e| CacheError::CorruptRow(e.to_string()))?,
        path: RelativePath::new(name).map_err(|e| CacheError::CorruptRow(e.to_string()))?,
        mtime: row.try_get("timestamp")?,
    })
}

fn file_status_from_row(row: &SqliteRow) -> Result<FileSyncStatus, CacheError> {
    let name: String = row.try_get("name")?;
    let unresolved: i64 = row.try_get("unresolved")?;
    Ok(FileSyncStatus {
        file_id: FileId::new(row.try_get("id")?),
        path: RelativePath::new(name).map_err(|e| CacheError::CorruptRow(e.to_string()))?,
        mtime: row.try_get("timestamp")?,
        has_unresolved: unresolved > 0,
        last_confirmed: row.try_get("last_confirmed")?,
    })
}

fn sync_record_from_row(row: &SqliteRow) -> Result<SyncRecord, CacheError> {
    let endpoint: String = row.try_get("endpoint")?;
    let ok: i64 = row.try_get("ok")?;
    let transfer_id: i64 = row.try_get("transfer_id")?;
    Ok(SyncRecord {
        file_id: FileId::new(row.try_get("file_id")?),
        endpoint: EndpointName::new(endpoint).map_err(|e| CacheError::CorruptRow(e.to_string()))?,
        timestamp: row.try_get("timestamp")?,
        confirmed: ok != 0,
        job: job_link_from_column(transfer_id),
    })
}

fn transfer_job_from_row(row: &SqliteRow) -> Result<TransferJob, CacheError> {
    let task_id: String = row.try_get("task_id")?;
    let status: String = row.try_get("status")?;
    let endpoint: String = row.try_get("endpoint")?;
    let file_count: i64 = row.try_get("file_count")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(TransferJob {
        id: JobId::new(row.try_get("id")?),
        task_id: TaskId::new(task_id).map_err(|e| CacheError::CorruptRow(e.to_string()))?,
        status: JobStatus::from_external(&status),
        endpoint: EndpointName::new(endpoint).map_err(|e| CacheError::CorruptRow(e.to_string()))?,
        file_count: u32::try_from(file_count)
            .map_err(|_| CacheError::CorruptRow(format!("bad file_count {}", file_count)))?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

const JOB_COLUMNS: &str = "t.id, t.task_id, t.status, t.endpoint, t.file_count, \
                           t.created_at, t.updated_at";

// ============================================================================
// ILedgerStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILedgerStore for SqliteLedgerStore {
    // --- File Inventory ---

    async fn upsert_files(
        &self,
        space: &SpaceName,
        observations: &[FileObservation],
    ) -> anyhow::Result<UpsertSummary> {
        let mut summary = UpsertSummary::default();
        let mut tx = self.pool.begin().await?;

        for obs in observations {
            let existing: Option<(i64, f64)> =
                sqlx::query_as("SELECT id, timestamp FROM files WHERE space = ? AND name = ?")
                    .bind(space.as_str())
                    .bind(obs.path.as_str())
                    .fetch_optional(&mut *tx)
                    .await?;

            match existing {
                None => {
                    sqlx::query("INSERT INTO files (space, name, timestamp) VALUES (?, ?, ?)")
                        .bind(space.as_str())
                        .bind(obs.path.as_str())
                        .bind(obs.mtime)
                        .execute(&mut *tx)
                        .await?;
                    summary.inserted += 1;
                }
                Some((_, stored)) if stored == obs.mtime => summary.unchanged += 1,
                Some((id, _)) => {
                    sqlx::query("UPDATE files SET timestamp = ? WHERE id = ?")
                        .bind(obs.mtime)
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                    summary.updated += 1;
                }
            }
        }

        tx.commit().await?;

        tracing::trace!(
            space = %space,
            inserted = summary.inserted,
            updated = summary.updated,
            "Upserted files"
        );
        Ok(summary)
    }

    async fn file_statuses(
        &self,
        space: &SpaceName,
        endpoint: &EndpointName,
    ) -> anyhow::Result<Vec<FileSyncStatus>> {
        let rows = sqlx::query(
            "SELECT f.id, f.name, f.timestamp, \
                    COALESCE(SUM(CASE WHEN s.ok = 0 THEN 1 ELSE 0 END), 0) AS unresolved, \
                    MAX(CASE WHEN s.ok = 1 THEN s.timestamp END) AS last_confirmed \
             FROM files f \
             LEFT JOIN syncs s ON s.file_id = f.id AND s.endpoint = ? \
             WHERE f.space = ? \
             GROUP BY f.id, f.name, f.timestamp \
             ORDER BY f.name",
        )
        .bind(endpoint.as_str())
        .bind(space.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| file_status_from_row(row).map_err(Into::into))
            .collect()
    }

    // --- Dispatch ---

    async fn record_dispatch(&self, dispatch: &NewDispatch) -> anyhow::Result<JobId> {
        let requested_at = dispatch.requested_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let job_id = sqlx::query(
            "INSERT INTO transfers (task_id, status, endpoint, file_count, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(dispatch.task_id.as_str())
        .bind(JobStatus::Unknown.as_str())
        .bind(dispatch.endpoint.as_str())
        .bind(dispatch.files.len() as i64)
        .bind(&requested_at)
        .bind(&requested_at)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let link = job_link_to_column(JobLink::Attached(JobId::new(job_id)));
        for file in &dispatch.files {
            sqlx::query(
                "INSERT INTO syncs (file_id, endpoint, timestamp, ok, transfer_id) \
                 VALUES (?, ?, ?, 0, ?)",
            )
            .bind(file.file_id.get())
            .bind(dispatch.endpoint.as_str())
            .bind(file.mtime)
            .bind(link)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            job_id,
            task_id = %dispatch.task_id,
            count = dispatch.files.len(),
            "Recorded dispatch"
        );
        Ok(JobId::new(job_id))
    }

    async fn register_job(&self, dispatch: &NewDispatch) -> anyhow::Result<JobId> {
        let requested_at = dispatch.requested_at.to_rfc3339();
        let batch: Vec<(i64, f64)> = dispatch
            .files
            .iter()
            .map(|f| (f.file_id.get(), f.mtime))
            .collect();
        let job_id = sqlx::query(
            "INSERT INTO transfers \
                 (task_id, status, endpoint, file_count, created_at, updated_at, batch) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(dispatch.task_id.as_str())
        .bind(JobStatus::Unknown.as_str())
        .bind(dispatch.endpoint.as_str())
        .bind(dispatch.files.len() as i64)
        .bind(&requested_at)
        .bind(&requested_at)
        .bind(serde_json::to_string(&batch)?)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        tracing::debug!(job_id, task_id = %dispatch.task_id, "Registered job without records");
        Ok(JobId::new(job_id))
    }

    async fn attach_registered_batches(&self) -> anyhow::Result<usize> {
        let mut tx = self.pool.begin().await?;
        let registered: Vec<(i64, String, String)> = sqlx::query_as(
            "SELECT id, endpoint, batch FROM transfers WHERE batch IS NOT NULL ORDER BY id",
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut attached = 0;
        for (job_id, endpoint, batch) in registered {
            let files: Vec<(i64, f64)> = serde_json::from_str(&batch).map_err(|e| {
                CacheError::CorruptRow(format!("bad batch of transfer {}: {}", job_id, e))
            })?;
            for &(file_id, mtime) in &files {
                sqlx::query(
                    "INSERT INTO syncs (file_id, endpoint, timestamp, ok, transfer_id) \
                     VALUES (?, ?, ?, 0, ?)",
                )
                .bind(file_id)
                .bind(&endpoint)
                .bind(mtime)
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            }
            sqlx::query("UPDATE transfers SET batch = NULL WHERE id = ?")
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            attached += files.len();
        }

        tx.commit().await?;

        if attached > 0 {
            tracing::info!(attached, "Attached sync records of registered jobs");
        }
        Ok(attached)
    }

    // --- Reconcile ---

    async fn open_jobs(&self) -> anyhow::Result<Vec<OpenJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS}, COUNT(s.id) AS open_records \
             FROM transfers t \
             JOIN syncs s ON s.transfer_id = t.id AND s.ok = 0 \
             GROUP BY t.id \
             ORDER BY t.id"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            let open_records: i64 = row.try_get("open_records")?;
            jobs.push(OpenJob {
                job: transfer_job_from_row(row)?,
                open_records: record_count(open_records)?,
            });
        }
        Ok(jobs)
    }

    async fn apply_job_status(&self, job_id: JobId, status: &JobStatus) -> anyhow::Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE transfers \
             SET updated_at = CASE WHEN status = ?1 THEN updated_at ELSE ?2 END, \
                 status = ?1 \
             WHERE id = ?3",
        )
        .bind(status.as_str())
        .bind(&now)
        .bind(job_id.get())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            anyhow::bail!("transfer job {} does not exist", job_id);
        }

        let affected = match status.ledger_action() {
            LedgerAction::Confirm => sqlx::query(
                "UPDATE syncs SET ok = 1, transfer_id = ? WHERE transfer_id = ? AND ok = 0",
            )
            .bind(DETACHED_JOB)
            .bind(job_id.get())
            .execute(&mut *tx)
            .await?
            .rows_affected(),
            LedgerAction::Discard => {
                sqlx::query("DELETE FROM syncs WHERE transfer_id = ? AND ok = 0")
                    .bind(job_id.get())
                    .execute(&mut *tx)
                    .await?
                    .rows_affected()
            }
            LedgerAction::Keep => 0,
        };

        tx.commit().await?;

        tracing::trace!(job_id = %job_id, status = %status, affected, "Applied job status");
        Ok(usize::try_from(affected)?)
    }

    // --- Reporting ---

    async fn list_files(&self, space: &SpaceName) -> anyhow::Result<Vec<TrackedFile>> {
        let rows =
            sqlx::query("SELECT id, space, name, timestamp FROM files WHERE space = ? ORDER BY name")
                .bind(space.as_str())
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| tracked_file_from_row(row).map_err(Into::into))
            .collect()
    }

    async fn list_sync_records(
        &self,
        endpoint: Option<&EndpointName>,
    ) -> anyhow::Result<Vec<SyncRecord>> {
        let rows = sqlx::query(
            "SELECT file_id, endpoint, timestamp, ok, transfer_id FROM syncs \
             WHERE ?1 IS NULL OR endpoint = ?1 \
             ORDER BY id",
        )
        .bind(endpoint.map(EndpointName::as_str))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| sync_record_from_row(row).map_err(Into::into))
            .collect()
    }

    async fn list_jobs(&self) -> anyhow::Result<Vec<TransferJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM transfers t ORDER BY t.id DESC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| transfer_job_from_row(row).map_err(Into::into))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_link_column_roundtrip() {
        assert_eq!(job_link_from_column(-1), JobLink::Detached);
        assert_eq!(job_link_from_column(7), JobLink::Attached(JobId::new(7)));
        assert_eq!(job_link_to_column(JobLink::Detached), -1);
        assert_eq!(job_link_to_column(JobLink::Attached(JobId::new(3))), 3);
    }

    #[test]
    fn record_count_rejects_negative() {
        assert_eq!(record_count(3).unwrap(), 3);
        assert!(matches!(record_count(-1), Err(CacheError::CorruptRow(_))));
    }

    #[test]
    fn parse_datetime_rejects_garbage() {
        assert!(parse_datetime("2026-01-02T03:04:05+00:00").is_ok());
        assert!(matches!(parse_datetime("yesterday"), Err(CacheError::CorruptRow(_))));
    }
}
