//! SQLite-backed job store implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{
    CollectionItem, CollectionLog, ContentMode, ContentType, CreateJobRequest, Identification,
    Job, JobError, JobFilter, JobStatus, JobStore, JobUpdate, ModeSettings, NewCollectionItem,
};
use crate::external_catalog::MovieCandidate;

const JOB_COLUMNS: &str = "id, drive_id, disc_label, content_mode, content_type, status, \
    identified_title, identified_year, external_id, confidence, poster_ref, alternatives, \
    rip_path, encode_path, final_path, error_message, move_retry_count, created_at, updated_at";

const CURRENT_MODE_KEY: &str = "current_mode";

/// SQLite-backed job store.
///
/// Also holds the collection log and the operator settings, which live in
/// the same database file.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Create a new SQLite job store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                drive_id TEXT NOT NULL,
                disc_label TEXT NOT NULL,
                content_mode TEXT NOT NULL DEFAULT 'movie',
                content_type TEXT NOT NULL DEFAULT 'unknown',
                status TEXT NOT NULL DEFAULT 'pending',
                identified_title TEXT,
                identified_year INTEGER,
                external_id INTEGER,
                confidence REAL,
                poster_ref TEXT,
                alternatives TEXT,
                rip_path TEXT,
                encode_path TEXT,
                final_path TEXT,
                error_message TEXT,
                move_retry_count INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
            CREATE INDEX IF NOT EXISTS idx_jobs_drive_id ON jobs(drive_id);

            CREATE TABLE IF NOT EXISTS collection (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                year INTEGER,
                content_mode TEXT NOT NULL DEFAULT 'movie',
                external_id INTEGER,
                file_path TEXT NOT NULL,
                added_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::Database("connection mutex poisoned".to_string()))
    }

    fn now() -> (DateTime<Utc>, String) {
        let now = Utc::now();
        // Microsecond precision keeps created_at ordering FIFO for jobs created in quick succession
        let text = now.to_rfc3339_opts(SecondsFormat::Micros, true);
        (now, text)
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn path_to_sql(path: &Option<PathBuf>) -> Option<String> {
        path.as_ref().map(|p| p.to_string_lossy().into_owned())
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let content_mode: String = row.get(3)?;
        let content_type: String = row.get(4)?;
        let status: String = row.get(5)?;
        let alternatives_json: Option<String> = row.get(11)?;
        let created_at: String = row.get(17)?;
        let updated_at: String = row.get(18)?;

        // Unknown enum values can only come from a hand-edited database
        let status = status.parse::<JobStatus>().unwrap_or(JobStatus::Failed);
        let content_mode = content_mode.parse::<ContentMode>().unwrap_or_default();
        let content_type = content_type.parse::<ContentType>().unwrap_or_default();

        let alternatives: Vec<MovieCandidate> = alternatives_json
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default();

        Ok(Job {
            id: row.get(0)?,
            drive_id: row.get(1)?,
            disc_label: row.get(2)?,
            content_mode,
            content_type,
            status,
            identified_title: row.get(6)?,
            identified_year: row.get(7)?,
            external_id: row.get(8)?,
            confidence: row.get(9)?,
            poster_ref: row.get(10)?,
            alternatives,
            rip_path: row.get::<_, Option<String>>(12)?.map(PathBuf::from),
            encode_path: row.get::<_, Option<String>>(13)?.map(PathBuf::from),
            final_path: row.get::<_, Option<String>>(14)?.map(PathBuf::from),
            error_message: row.get(15)?,
            move_retry_count: row.get::<_, Option<u32>>(16)?.unwrap_or(0),
            created_at: Self::parse_timestamp(&created_at),
            updated_at: Self::parse_timestamp(&updated_at),
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<Option<Job>, JobError> {
        conn.query_row(
            &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
            params![id],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn fetch_existing(conn: &Connection, id: i64) -> Result<Job, JobError> {
        Self::fetch(conn, id)?.ok_or(JobError::NotFound(id))
    }

    fn query_jobs(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Job>, JobError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params, Self::row_to_job)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut jobs = Vec::new();
        for row_result in rows {
            jobs.push(row_result.map_err(|e| JobError::Database(e.to_string()))?);
        }
        Ok(jobs)
    }

    fn build_where_clause(filter: &JobFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params.push(Box::new(status.as_str()));
        } else if !filter.include_archived {
            conditions.push("status != 'archived'");
        }

        if let Some(ref drive_id) = filter.drive_id {
            conditions.push("drive_id = ?");
            params.push(Box::new(drive_id.clone()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }
}

impl JobStore for SqliteJobStore {
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError> {
        let conn = self.conn()?;
        let (_, now) = Self::now();

        conn.execute(
            "INSERT INTO jobs (drive_id, disc_label, content_mode, content_type, status, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                request.drive_id,
                request.disc_label,
                request.content_mode.as_str(),
                ContentType::Unknown.as_str(),
                JobStatus::Pending.as_str(),
                now,
                now,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        Self::fetch_existing(&conn, id)
    }

    fn get(&self, id: i64) -> Result<Option<Job>, JobError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError> {
        let conn = self.conn()?;

        let (where_clause, params) = Self::build_where_clause(filter);
        let sql = format!(
            "SELECT {} FROM jobs {} ORDER BY created_at DESC, id DESC LIMIT ?",
            JOB_COLUMNS, where_clause
        );

        let mut all_params = params;
        all_params.push(Box::new(filter.limit));
        let param_refs: Vec<&dyn rusqlite::ToSql> = all_params.iter().map(|p| p.as_ref()).collect();

        Self::query_jobs(&conn, &sql, &param_refs)
    }

    fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, JobError> {
        let conn = self.conn()?;
        Self::query_jobs(
            &conn,
            &format!(
                "SELECT {} FROM jobs WHERE status = ? ORDER BY created_at ASC, id ASC",
                JOB_COLUMNS
            ),
            &[&status.as_str()],
        )
    }

    fn list_active(&self) -> Result<Vec<Job>, JobError> {
        let conn = self.conn()?;
        Self::query_jobs(
            &conn,
            &format!(
                "SELECT {} FROM jobs WHERE status NOT IN ('complete', 'failed', 'archived') ORDER BY created_at ASC, id ASC",
                JOB_COLUMNS
            ),
            &[],
        )
    }

    fn active_job_for_drive(&self, drive_id: &str) -> Result<Option<Job>, JobError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM jobs WHERE drive_id = ? AND status IN ('pending', 'ripping') ORDER BY created_at ASC, id ASC LIMIT 1",
                JOB_COLUMNS
            ),
            params![drive_id],
            Self::row_to_job,
        )
        .optional()
        .map_err(|e| JobError::Database(e.to_string()))
    }

    fn claim(&self, id: i64, expected: JobStatus, next: JobStatus) -> Result<bool, JobError> {
        if !expected.can_transition_to(next) {
            return Err(JobError::InvalidState {
                job_id: id,
                current_state: expected,
                operation: format!("move to {}", next),
            });
        }

        let conn = self.conn()?;
        let (_, now) = Self::now();

        let changed = conn
            .execute(
                "UPDATE jobs SET status = ?, updated_at = ? WHERE id = ? AND status = ?",
                params![next.as_str(), now, id, expected.as_str()],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(changed == 1)
    }

    fn update_status(
        &self,
        id: i64,
        status: JobStatus,
        update: JobUpdate,
    ) -> Result<Job, JobError> {
        let conn = self.conn()?;

        let current = Self::fetch_existing(&conn, id)?;
        if !current.status.can_transition_to(status) {
            return Err(JobError::InvalidState {
                job_id: id,
                current_state: current.status,
                operation: format!("move to {}", status),
            });
        }

        let (_, now) = Self::now();

        conn.execute(
            r#"
            UPDATE jobs SET
                status = ?1,
                rip_path = COALESCE(?2, rip_path),
                encode_path = COALESCE(?3, encode_path),
                final_path = COALESCE(?4, final_path),
                error_message = CASE WHEN ?1 = 'complete' THEN NULL ELSE COALESCE(?5, error_message) END,
                move_retry_count = CASE WHEN ?1 = 'moving' THEN move_retry_count ELSE 0 END,
                updated_at = ?6
            WHERE id = ?7
            "#,
            params![
                status.as_str(),
                Self::path_to_sql(&update.rip_path),
                Self::path_to_sql(&update.encode_path),
                Self::path_to_sql(&update.final_path),
                update.error_message,
                now,
                id,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Self::fetch_existing(&conn, id)
    }

    fn update_identification(
        &self,
        id: i64,
        identification: Identification,
    ) -> Result<Job, JobError> {
        let conn = self.conn()?;
        let (_, now) = Self::now();

        let alternatives_json = serde_json::to_string(&identification.alternatives)
            .map_err(|e| JobError::Database(e.to_string()))?;

        let changed = conn
            .execute(
                r#"
                UPDATE jobs SET
                    content_type = ?, identified_title = ?, identified_year = ?,
                    external_id = ?, confidence = ?, poster_ref = ?, alternatives = ?,
                    updated_at = ?
                WHERE id = ?
                "#,
                params![
                    identification.content_type.as_str(),
                    identification.title,
                    identification.year,
                    identification.external_id,
                    identification.confidence,
                    identification.poster_ref,
                    alternatives_json,
                    now,
                    id,
                ],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(JobError::NotFound(id));
        }

        Self::fetch_existing(&conn, id)
    }

    fn update_content_mode(&self, id: i64, mode: ContentMode) -> Result<Job, JobError> {
        let conn = self.conn()?;
        let (_, now) = Self::now();

        let changed = conn
            .execute(
                "UPDATE jobs SET content_mode = ?, updated_at = ? WHERE id = ?",
                params![mode.as_str(), now, id],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(JobError::NotFound(id));
        }

        Self::fetch_existing(&conn, id)
    }

    fn increment_move_retry(&self, id: i64) -> Result<u32, JobError> {
        let conn = self.conn()?;
        let (_, now) = Self::now();

        let changed = conn
            .execute(
                "UPDATE jobs SET move_retry_count = move_retry_count + 1, updated_at = ? WHERE id = ? AND status = 'moving'",
                params![now, id],
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        let job = Self::fetch_existing(&conn, id)?;
        if changed == 0 {
            return Err(JobError::InvalidState {
                job_id: id,
                current_state: job.status,
                operation: "retry move of".to_string(),
            });
        }

        Ok(job.move_retry_count)
    }

    fn count_by_status(&self) -> Result<HashMap<JobStatus, usize>, JobError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")
            .map_err(|e| JobError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut counts = HashMap::new();
        for row in rows {
            let (status, count) = row.map_err(|e| JobError::Database(e.to_string()))?;
            let status: JobStatus = status.parse().map_err(JobError::Database)?;
            counts.insert(status, count as usize);
        }
        Ok(counts)
    }
}

impl CollectionLog for SqliteJobStore {
    fn record(&self, item: NewCollectionItem) -> Result<CollectionItem, JobError> {
        let conn = self.conn()?;
        let (added_at, now) = Self::now();

        conn.execute(
            "INSERT INTO collection (title, year, content_mode, external_id, file_path, added_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                item.title,
                item.year,
                item.content_mode.as_str(),
                item.external_id,
                item.file_path.to_string_lossy().into_owned(),
                now,
            ],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;

        Ok(CollectionItem {
            id: conn.last_insert_rowid(),
            title: item.title,
            year: item.year,
            content_mode: item.content_mode,
            external_id: item.external_id,
            file_path: item.file_path,
            added_at,
        })
    }

    fn list_collection(&self, limit: i64) -> Result<Vec<CollectionItem>, JobError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT id, title, year, content_mode, external_id, file_path, added_at FROM collection ORDER BY added_at DESC, id DESC LIMIT ?",
            )
            .map_err(|e| JobError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let content_mode: String = row.get(3)?;
                let file_path: String = row.get(5)?;
                let added_at: String = row.get(6)?;
                Ok(CollectionItem {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    year: row.get(2)?,
                    content_mode: content_mode.parse().unwrap_or_default(),
                    external_id: row.get(4)?,
                    file_path: PathBuf::from(file_path),
                    added_at: Self::parse_timestamp(&added_at),
                })
            })
            .map_err(|e| JobError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row_result in rows {
            items.push(row_result.map_err(|e| JobError::Database(e.to_string()))?);
        }
        Ok(items)
    }
}

impl ModeSettings for SqliteJobStore {
    fn current_mode(&self) -> Result<ContentMode, JobError> {
        let conn = self.conn()?;

        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?",
                params![CURRENT_MODE_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| JobError::Database(e.to_string()))?;

        match value {
            Some(v) => Ok(v.parse().unwrap_or_else(|e| {
                warn!("Ignoring stored mode: {}", e);
                ContentMode::default()
            })),
            None => Ok(ContentMode::default()),
        }
    }

    fn set_mode(&self, mode: ContentMode) -> Result<(), JobError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?, ?) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![CURRENT_MODE_KEY, mode.as_str()],
        )
        .map_err(|e| JobError::Database(e.to_string()))?;
        Ok(())
    }
}
