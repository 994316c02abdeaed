//! Job repository: statements against the `fax_jobs` table.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::job::{Job, JobMetadata, JobStatus};

const SELECT_COLUMNS: &str = "SELECT id, source_reference, destination, status, created_at,
     updated_at, error_message, converted_artifact_path, request_user, file_name,
     callback_url, order_destination FROM fax_jobs";

/// A raw row from `fax_jobs`.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub source_reference: String,
    pub destination: String,
    pub status: i64,
    pub created_at: String,
    pub updated_at: String,
    pub error_message: Option<String>,
    pub converted_artifact_path: Option<String>,
    pub request_user: Option<String>,
    pub file_name: Option<String>,
    pub callback_url: Option<String>,
    pub order_destination: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source_reference: row.get("source_reference")?,
            destination: row.get("destination")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            error_message: row.get("error_message")?,
            converted_artifact_path: row.get("converted_artifact_path")?,
            request_user: row.get("request_user")?,
            file_name: row.get("file_name")?,
            callback_url: row.get("callback_url")?,
            order_destination: row.get("order_destination")?,
        })
    }

    pub fn from_job(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            source_reference: job.source_reference.clone(),
            destination: job.destination.clone(),
            status: job.status.code(),
            created_at: format_timestamp(job.created_at),
            updated_at: format_timestamp(job.updated_at),
            error_message: job.error_message.clone(),
            converted_artifact_path: job.converted_artifact_path.clone(),
            request_user: job.metadata.request_user.clone(),
            file_name: job.metadata.file_name.clone(),
            callback_url: job.metadata.callback_url.clone(),
            order_destination: job.metadata.order_destination.clone(),
        }
    }

    pub fn into_job(self) -> Result<Job, DatabaseError> {
        let status = JobStatus::from_code(self.status).ok_or_else(|| DatabaseError::CorruptRow {
            id: self.id.clone(),
            reason: format!("unknown status code {}", self.status),
        })?;
        let created_at = parse_timestamp(&self.created_at, &self.id)?;
        let updated_at = parse_timestamp(&self.updated_at, &self.id)?;

        Ok(Job {
            id: self.id,
            source_reference: self.source_reference,
            destination: self.destination,
            status,
            created_at,
            updated_at,
            error_message: self.error_message,
            converted_artifact_path: self.converted_artifact_path,
            metadata: JobMetadata {
                request_user: self.request_user,
                file_name: self.file_name,
                callback_url: self.callback_url,
                order_destination: self.order_destination,
            },
        })
    }
}

/// Fixed-width RFC 3339 so that lexical order matches time order.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str, id: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptRow {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", s, e),
        })
}

pub fn insert(db: &Database, row: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO fax_jobs (id, source_reference, destination, status, created_at,
             updated_at, error_message, converted_artifact_path, request_user, file_name,
             callback_url, order_destination)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                row.id,
                row.source_reference,
                row.destination,
                row.status,
                row.created_at,
                row.updated_at,
                row.error_message,
                row.converted_artifact_path,
                row.request_user,
                row.file_name,
                row.callback_url,
                row.order_destination,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        let row = conn
            .query_row(&sql, params![id], JobRow::from_row)
            .optional()?;
        Ok(row)
    })
}

/// All rows, oldest first; ties keep insertion order.
pub fn list(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let sql = format!("{} ORDER BY created_at ASC, rowid ASC", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Sets status and error message. Returns the number of rows touched.
pub fn update_status(
    db: &Database,
    id: &str,
    status: i64,
    error_message: Option<&str>,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE fax_jobs SET status = ?2, error_message = ?3, updated_at = ?4 WHERE id = ?1",
            params![id, status, error_message, updated_at],
        )?;
        Ok(changed)
    })
}

/// Moves a row from `from` to `to` only if it is still in `from`.
pub fn transition(
    db: &Database,
    id: &str,
    from: i64,
    to: i64,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE fax_jobs SET status = ?3, error_message = NULL, updated_at = ?4
             WHERE id = ?1 AND status = ?2",
            params![id, from, to, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Moves every row in `from` to `to`, clearing error messages.
pub fn transition_all(
    db: &Database,
    from: i64,
    to: i64,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE fax_jobs SET status = ?2, error_message = NULL, updated_at = ?3
             WHERE status = ?1",
            params![from, to, updated_at],
        )?;
        Ok(changed)
    })
}

pub fn update_artifact_path(
    db: &Database,
    id: &str,
    path: &str,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE fax_jobs SET converted_artifact_path = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, path, updated_at],
        )?;
        Ok(changed)
    })
}

/// Marks Processing rows last touched before `cutoff` as Error.
pub fn fail_stale_processing(
    db: &Database,
    processing: i64,
    error: i64,
    cutoff: &str,
    message: &str,
    updated_at: &str,
) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE fax_jobs SET status = ?2, error_message = ?4, updated_at = ?5
             WHERE status = ?1 AND updated_at < ?3",
            params![processing, error, cutoff, message, updated_at],
        )?;
        Ok(changed)
    })
}

pub fn delete_by_status(db: &Database, status: i64) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| Ok(conn.execute("DELETE FROM fax_jobs WHERE status = ?1", params![status])?))
}

pub fn delete_all(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| Ok(conn.execute("DELETE FROM fax_jobs", [])?))
}

/// Returns (status, count) pairs.
pub fn count_by_status(db: &Database) -> Result<Vec<(i64, u64)>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM fax_jobs GROUP BY status")?;
        let counts = stmt
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewJob;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_row(created_at: &str) -> JobRow {
        let mut row = JobRow::from_job(&NewJob::new("https://x/test.png", "0432119261").into_job());
        row.created_at = created_at.to_string();
        row.updated_at = created_at.to_string();
        row
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        let row = sample_row("2026-01-01T00:00:00.000000Z");
        insert(&db, &row).unwrap();

        let found = find_by_id(&db, &row.id).unwrap().unwrap();
        assert_eq!(found.destination, "0432119261");
        assert_eq!(found.status, 0);
        assert!(found.error_message.is_none());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "missing").unwrap().is_none());
    }

    #[test]
    fn test_list_orders_by_created_at_then_insertion() {
        let db = test_db();
        let late = sample_row("2026-01-03T00:00:00.000000Z");
        let tie_a = sample_row("2026-01-01T00:00:00.000000Z");
        let tie_b = sample_row("2026-01-01T00:00:00.000000Z");
        insert(&db, &late).unwrap();
        insert(&db, &tie_a).unwrap();
        insert(&db, &tie_b).unwrap();

        let ids: Vec<String> = list(&db).unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![tie_a.id, tie_b.id, late.id]);
    }

    #[test]
    fn test_transition_is_conditional() {
        let db = test_db();
        let row = sample_row("2026-01-01T00:00:00.000000Z");
        insert(&db, &row).unwrap();

        assert!(transition(&db, &row.id, 0, 2, "2026-01-01T00:00:01.000000Z").unwrap());
        assert!(!transition(&db, &row.id, 0, 2, "2026-01-01T00:00:02.000000Z").unwrap());
        assert_eq!(find_by_id(&db, &row.id).unwrap().unwrap().status, 2);
    }

    #[test]
    fn test_stale_processing_cutoff() {
        let db = test_db();
        let mut old = sample_row("2026-01-01T00:00:00.000000Z");
        old.status = 2;
        let mut fresh = sample_row("2026-01-01T00:00:00.000000Z");
        fresh.status = 2;
        fresh.updated_at = "2026-01-02T00:00:00.000000Z".to_string();
        insert(&db, &old).unwrap();
        insert(&db, &fresh).unwrap();

        let changed = fail_stale_processing(
            &db,
            2,
            -1,
            "2026-01-01T12:00:00.000000Z",
            "interrupted",
            "2026-01-02T00:00:00.000000Z",
        )
        .unwrap();
        assert_eq!(changed, 1);
        let old = find_by_id(&db, &old.id).unwrap().unwrap();
        assert_eq!(old.status, -1);
        assert_eq!(old.error_message.as_deref(), Some("interrupted"));
    }

    #[test]
    fn test_corrupt_status_is_reported() {
        let mut row = sample_row("2026-01-01T00:00:00.000000Z");
        row.status = 42;
        assert!(matches!(
            row.into_job(),
            Err(DatabaseError::CorruptRow { .. })
        ));
    }

    #[test]
    fn test_count_by_status() {
        let db = test_db();
        insert(&db, &sample_row("2026-01-01T00:00:00.000000Z")).unwrap();
        let mut failed = sample_row("2026-01-01T00:00:00.000000Z");
        failed.status = -1;
        insert(&db, &failed).unwrap();

        let mut counts = count_by_status(&db).unwrap();
        counts.sort();
        assert_eq!(counts, vec![(-1, 1), (0, 1)]);
    }
}
