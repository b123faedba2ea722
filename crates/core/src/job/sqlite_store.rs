//! SQLite-backed job store implementation.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{JobError, JobFilter, JobOrder, JobRecord, JobStatus, JobStore, TrackSummary};

const SELECT_COLUMNS: &str = "id, external_track_id, status, artifact_reference, title, artists, album, duration_ms, created_at, updated_at";

/// Max bound parameters per `IN (...)` query.
const STATUS_QUERY_CHUNK: usize = 500;

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        // `seq` breaks created_at ties so discovery order is total.
        conn.execute_batch(
            r#"
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS jobs (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                external_track_id TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL,
                artifact_reference TEXT,
                title TEXT,
                artists TEXT,
                album TEXT,
                duration_ms INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at, seq);
            CREATE INDEX IF NOT EXISTS idx_jobs_updated_at ON jobs(updated_at);
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("job store connection lock poisoned".to_string()))
    }

    /// Fixed-width UTC timestamps so lexical order matches time order.
    fn timestamp(at: DateTime<Utc>) -> String {
        at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let status_str: String = row.get(2)?;
        let status = status_str.parse::<JobStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                e.into(),
            )
        })?;

        let title: Option<String> = row.get(4)?;
        let track = match title {
            Some(title) => Some(TrackSummary {
                title,
                artists: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                album: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                duration_ms: row.get::<_, Option<i64>>(7)?.unwrap_or(0).max(0) as u64,
            }),
            None => None,
        };

        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;

        Ok(JobRecord {
            id: row.get(0)?,
            external_track_id: row.get(1)?,
            status,
            artifact_reference: row.get(3)?,
            track,
            created_at: Self::parse_timestamp(8, &created_at)?,
            updated_at: Self::parse_timestamp(9, &updated_at)?,
        })
    }

    fn order_clause(order: JobOrder) -> &'static str {
        match order {
            JobOrder::OldestFirst => "ORDER BY created_at ASC, seq ASC",
            JobOrder::NewestFirst => "ORDER BY created_at DESC, seq DESC",
        }
    }

    fn get_with(conn: &Connection, column: &str, value: &str) -> Result<Option<JobRecord>, JobError> {
        let sql = format!("SELECT {} FROM jobs WHERE {} = ?", SELECT_COLUMNS, column);
        Ok(conn
            .query_row(&sql, params![value], Self::row_to_job)
            .optional()?)
    }
}

impl JobStore for SqliteJobStore {
    fn create_if_absent(&self, external_track_id: &str) -> Result<JobRecord, JobError> {
        let conn = self.lock()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = Self::timestamp(now);

        // The UNIQUE constraint is the duplicate check; no read beforehand.
        let inserted = conn.execute(
            "INSERT INTO jobs (id, external_track_id, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
            params![
                id,
                external_track_id,
                JobStatus::Queued.as_str(),
                now_str,
                now_str,
            ],
        );

        match inserted {
            Ok(_) => Ok(JobRecord {
                id,
                external_track_id: external_track_id.to_string(),
                status: JobStatus::Queued,
                artifact_reference: None,
                track: None,
                created_at: now,
                updated_at: now,
            }),
            Err(e) if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Err(JobError::Duplicate(external_track_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobError> {
        let conn = self.lock()?;
        Self::get_with(&conn, "id", id)
    }

    fn get_by_track_id(&self, external_track_id: &str) -> Result<Option<JobRecord>, JobError> {
        let conn = self.lock()?;
        Self::get_with(&conn, "external_track_id", external_track_id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, JobError> {
        let conn = self.lock()?;

        let where_clause = if filter.status.is_some() {
            "WHERE status = ?1"
        } else {
            "WHERE ?1 IS NULL"
        };
        let sql = format!(
            "SELECT {} FROM jobs {} {} LIMIT ?2 OFFSET ?3",
            SELECT_COLUMNS,
            where_clause,
            Self::order_clause(filter.order)
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![
                filter.status.map(|s| s.as_str()),
                filter.limit,
                filter.offset
            ],
            Self::row_to_job,
        )?;

        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    }

    fn count(&self, status: Option<JobStatus>) -> Result<i64, JobError> {
        let conn = self.lock()?;
        let count = match status {
            Some(status) => conn.query_row(
                "SELECT COUNT(*) FROM jobs WHERE status = ?",
                params![status.as_str()],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))?,
        };
        Ok(count)
    }

    fn compare_and_set_status(
        &self,
        id: &str,
        expected: JobStatus,
        new: JobStatus,
    ) -> Result<bool, JobError> {
        // Completion must carry an artifact reference; see `complete`.
        if !expected.can_transition_to(new) || new == JobStatus::Completed {
            return Err(JobError::InvalidTransition {
                from: expected,
                to: new,
            });
        }

        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
            params![
                new.as_str(),
                Self::timestamp(Utc::now()),
                id,
                expected.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    fn complete(
        &self,
        id: &str,
        artifact_reference: &str,
        track: &TrackSummary,
    ) -> Result<bool, JobError> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE jobs SET status = ?, artifact_reference = ?, title = ?, artists = ?, album = ?, duration_ms = ?, updated_at = ? WHERE id = ? AND status = ?",
            params![
                JobStatus::Completed.as_str(),
                artifact_reference,
                track.title,
                track.artists,
                track.album,
                track.duration_ms as i64,
                Self::timestamp(Utc::now()),
                id,
                JobStatus::Downloading.as_str(),
            ],
        )?;
        Ok(changed == 1)
    }

    fn statuses(
        &self,
        external_track_ids: &[String],
    ) -> Result<HashMap<String, JobStatus>, JobError> {
        let conn = self.lock()?;
        let mut statuses = HashMap::with_capacity(external_track_ids.len());

        for chunk in external_track_ids.chunks(STATUS_QUERY_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT external_track_id, status FROM jobs WHERE external_track_id IN ({})",
                placeholders
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?;

            for row in rows {
                let (track_id, status) = row?;
                let status = status.parse::<JobStatus>().map_err(JobError::Database)?;
                statuses.insert(track_id, status);
            }
        }

        Ok(statuses)
    }

    fn reclaim_stale(
        &self,
        cutoff: DateTime<Utc>,
        held: &HashSet<String>,
    ) -> Result<Vec<JobRecord>, JobError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let cutoff_str = Self::timestamp(cutoff);

        let stale = {
            let sql = format!(
                "SELECT {} FROM jobs WHERE status = ? AND updated_at < ? ORDER BY created_at ASC, seq ASC",
                SELECT_COLUMNS
            );
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt.query_map(
                params![JobStatus::Downloading.as_str(), cutoff_str],
                Self::row_to_job,
            )?;
            let mut jobs = Vec::new();
            for row in rows {
                jobs.push(row?);
            }
            jobs
        };

        let now = Utc::now();
        let mut reclaimed = Vec::with_capacity(stale.len());
        for job in stale.into_iter().filter(|job| !held.contains(&job.id)) {
            let changed = tx.execute(
                "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                params![
                    JobStatus::Queued.as_str(),
                    Self::timestamp(now),
                    job.id,
                    JobStatus::Downloading.as_str(),
                ],
            )?;
            if changed == 1 {
                reclaimed.push(JobRecord {
                    status: JobStatus::Queued,
                    updated_at: now,
                    ..job
                });
            }
        }

        tx.commit()?;
        Ok(reclaimed)
    }

    fn delete(&self, id: &str) -> Result<JobRecord, JobError> {
        let conn = self.lock()?;
        let job = Self::get_with(&conn, "id", id)?.ok_or_else(|| JobError::NotFound(id.to_string()))?;
        conn.execute("DELETE FROM jobs WHERE id = ?", params![id])?;
        Ok(job)
    }
}
