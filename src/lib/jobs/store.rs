use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::types::{Job, JobError, JobKind, JobResult, JobStatus};

const SELECT_COLUMNS: &str =
    "id, kind, app_id, action, status, created_at, started_at, finished_at, message";

/// Append-only SQLite store over the job schema. Every update is a
/// single-record write; there is no read-then-act transaction, so two
/// racing updates to one job converge to whichever committed last.
#[derive(Clone)]
pub struct JobStore {
    conn: Arc<Mutex<Connection>>,
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Raw row image, converted after the query so an unrecognized status
/// surfaces as a storage error instead of a silent default.
struct RawJob {
    id: String,
    kind: String,
    app_id: String,
    action: Option<String>,
    status: String,
    created_at: String,
    started_at: Option<String>,
    finished_at: Option<String>,
    message: Option<String>,
}

impl RawJob {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RawJob {
            id: row.get(0)?,
            kind: row.get(1)?,
            app_id: row.get(2)?,
            action: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            started_at: row.get(6)?,
            finished_at: row.get(7)?,
            message: row.get(8)?,
        })
    }

    fn into_job(self) -> JobResult<Job> {
        let kind = JobKind::parse(&self.kind)
            .ok_or_else(|| JobError::Storage(format!("unrecognized job kind: {}", self.kind)))?;
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            JobError::Storage(format!("unrecognized job status: {}", self.status))
        })?;
        Ok(Job {
            id: self.id,
            kind,
            app_id: self.app_id,
            action: self.action,
            status,
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            message: self.message,
        })
    }
}

impl JobStore {
    pub fn open(path: &Path) -> JobResult<Self> {
        Self::init(Connection::open(path).map_err(JobError::from)?)
    }

    pub fn open_in_memory() -> JobResult<Self> {
        Self::init(Connection::open_in_memory().map_err(JobError::from)?)
    }

    fn init(conn: Connection) -> JobResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS jobs (
              id TEXT PRIMARY KEY,
              kind TEXT NOT NULL,
              app_id TEXT NOT NULL,
              action TEXT,
              status TEXT NOT NULL,
              created_at TEXT NOT NULL,
              started_at TEXT,
              finished_at TEXT,
              message TEXT
            )",
            [],
        )?;
        Ok(JobStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("job store lock poisoned")
    }

    pub fn create(&self, kind: JobKind, app_id: &str, action: Option<&str>) -> JobResult<Job> {
        let job = Job {
            id: Uuid::new_v4().simple().to_string(),
            kind,
            app_id: app_id.to_string(),
            action: action.map(str::to_string),
            status: JobStatus::Queued,
            created_at: now_iso(),
            started_at: None,
            finished_at: None,
            message: None,
        };

        self.conn().execute(
            "INSERT INTO jobs (id, kind, app_id, action, status, created_at, started_at, finished_at, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, NULL, NULL)",
            params![
                job.id,
                job.kind.as_str(),
                job.app_id,
                job.action,
                job.status.as_str(),
                job.created_at
            ],
        )?;

        Ok(job)
    }

    /// Move a job to running. `started_at` is set-if-null: a second call
    /// never overwrites the first start time.
    pub fn mark_running(&self, job_id: &str) -> JobResult<()> {
        self.conn().execute(
            "UPDATE jobs SET status = ?1, started_at = COALESCE(started_at, ?2) WHERE id = ?3",
            params![JobStatus::Running.as_str(), now_iso(), job_id],
        )?;
        Ok(())
    }

    pub fn finish(&self, job_id: &str, ok: bool, message: &str) -> JobResult<()> {
        let status = if ok { JobStatus::Success } else { JobStatus::Error };
        self.conn().execute(
            "UPDATE jobs SET status = ?1, message = ?2, finished_at = ?3 WHERE id = ?4",
            params![status.as_str(), message, now_iso(), job_id],
        )?;
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> JobResult<Option<Job>> {
        let raw = self
            .conn()
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?1", SELECT_COLUMNS),
                params![job_id],
                RawJob::read,
            )
            .optional()?;

        raw.map(RawJob::into_job).transpose()
    }

    pub fn recent(&self, limit: usize) -> JobResult<Vec<Job>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            SELECT_COLUMNS
        ))?;

        let raws = stmt
            .query_map(params![limit as i64], RawJob::read)?
            .collect::<rusqlite::Result<Vec<RawJob>>>()?;

        raws.into_iter().map(RawJob::into_job).collect()
    }

    pub fn active_count(&self) -> JobResult<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM jobs WHERE status IN ('queued', 'running')",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
