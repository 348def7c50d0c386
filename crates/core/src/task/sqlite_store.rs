//! SQLite-backed mirror task store implementation.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{
    MirrorPriority, MirrorTask, MirrorTaskEvent, MirrorTaskStatus, MirrorTaskStore, NewMirrorTask,
    TaskStoreError,
};

/// SQLite-backed mirror task store.
pub struct SqliteMirrorTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteMirrorTaskStore {
    /// Create a new store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, TaskStoreError> {
        let conn = Connection::open(path).map_err(|e| TaskStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, TaskStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TaskStoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), TaskStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mirror_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 1,
                source_url TEXT NOT NULL,
                repo_path TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                payload TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_mirror_tasks_status ON mirror_tasks(status);
            CREATE INDEX IF NOT EXISTS idx_mirror_tasks_mirror_id ON mirror_tasks(mirror_id);
            CREATE INDEX IF NOT EXISTS idx_mirror_tasks_priority ON mirror_tasks(priority DESC);
            "#,
        )
        .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<MirrorTask> {
        let status_str: String = row.get(2)?;
        let priority_rank: i64 = row.get(3)?;
        let created_at_str: String = row.get(10)?;
        let updated_at_str: String = row.get(11)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(MirrorTask {
            id: row.get(0)?,
            mirror_id: row.get(1)?,
            status: MirrorTaskStatus::parse(&status_str).unwrap_or(MirrorTaskStatus::Queued),
            priority: MirrorPriority::from_rank(priority_rank),
            source_url: row.get(4)?,
            repo_path: row.get(5)?,
            progress: row.get(6)?,
            error_message: row.get(7)?,
            retry_count: row.get::<_, Option<u32>>(8)?.unwrap_or(0),
            payload: row.get(9)?,
            created_at,
            updated_at,
        })
    }

    const SELECT_COLUMNS: &'static str = "id, mirror_id, status, priority, source_url, repo_path, \
         progress, error_message, retry_count, payload, created_at, updated_at";

    fn status_placeholders(statuses: &[MirrorTaskStatus]) -> (String, Vec<String>) {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let values = statuses.iter().map(|s| s.as_str().to_string()).collect();
        (placeholders, values)
    }
}

#[async_trait]
impl MirrorTaskStore for SqliteMirrorTaskStore {
    async fn create(&self, task: NewMirrorTask) -> Result<MirrorTask, TaskStoreError> {
        let now = Utc::now();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO mirror_tasks \
             (mirror_id, status, priority, source_url, repo_path, progress, retry_count, payload, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, ?6, ?7, ?7)",
            params![
                task.mirror_id,
                task.status.as_str(),
                task.priority.rank(),
                task.source_url,
                task.repo_path,
                task.payload,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        let id = conn.last_insert_rowid();
        Ok(MirrorTask {
            id,
            mirror_id: task.mirror_id,
            status: task.status,
            priority: task.priority,
            source_url: task.source_url,
            repo_path: task.repo_path,
            progress: 0,
            error_message: None,
            retry_count: 0,
            payload: task.payload,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(&self, task: &MirrorTask) -> Result<(), TaskStoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE mirror_tasks SET mirror_id = ?1, status = ?2, priority = ?3, \
                 source_url = ?4, repo_path = ?5, progress = ?6, error_message = ?7, \
                 retry_count = ?8, payload = ?9, updated_at = ?10 WHERE id = ?11",
                params![
                    task.mirror_id,
                    task.status.as_str(),
                    task.priority.rank(),
                    task.source_url,
                    task.repo_path,
                    task.progress,
                    task.error_message,
                    task.retry_count,
                    task.payload,
                    Utc::now().to_rfc3339(),
                    task.id,
                ],
            )
            .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(TaskStoreError::NotFound);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: i64) -> Result<MirrorTask, TaskStoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM mirror_tasks WHERE id = ?1",
            Self::SELECT_COLUMNS
        );
        conn.query_row(&sql, params![id], Self::row_to_task)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => TaskStoreError::NotFound,
                other => TaskStoreError::Database(other.to_string()),
            })
    }

    async fn find_by_mirror_id(&self, mirror_id: i64) -> Result<MirrorTask, TaskStoreError> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT {} FROM mirror_tasks WHERE mirror_id = ?1 ORDER BY id DESC LIMIT 1",
            Self::SELECT_COLUMNS
        );
        conn.query_row(&sql, params![mirror_id], Self::row_to_task)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => TaskStoreError::NotFound,
                other => TaskStoreError::Database(other.to_string()),
            })
    }

    async fn find_highest_priority_by_status(
        &self,
        statuses: &[MirrorTaskStatus],
    ) -> Result<MirrorTask, TaskStoreError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn
            .transaction()
            .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        let (placeholders, values) = Self::status_placeholders(statuses);
        let sql = format!(
            "SELECT {} FROM mirror_tasks WHERE status IN ({}) \
             ORDER BY priority DESC, updated_at DESC LIMIT 1",
            Self::SELECT_COLUMNS,
            placeholders
        );

        let mut task = tx
            .query_row(
                &sql,
                rusqlite::params_from_iter(values.iter()),
                Self::row_to_task,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => TaskStoreError::NotFound,
                other => TaskStoreError::Database(other.to_string()),
            })?;

        // Claim: advance the status machine inside the same transaction so
        // the task can never be dispatched twice.
        let next = task.status.apply(MirrorTaskEvent::Continue).ok_or_else(|| {
            TaskStoreError::InvalidTransition {
                status: task.status.to_string(),
                event: "continue".to_string(),
            }
        })?;
        task.status = next;
        task.updated_at = Utc::now();

        tx.execute(
            "UPDATE mirror_tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![task.status.as_str(), task.updated_at.to_rfc3339(), task.id],
        )
        .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        tx.commit()
            .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        Ok(task)
    }

    async fn reset_status(
        &self,
        from: MirrorTaskStatus,
        to: MirrorTaskStatus,
    ) -> Result<u64, TaskStoreError> {
        let conn = self.conn.lock().unwrap();
        let changed = conn
            .execute(
                "UPDATE mirror_tasks SET status = ?1, updated_at = ?2 WHERE status = ?3",
                params![to.as_str(), Utc::now().to_rfc3339(), from.as_str()],
            )
            .map_err(|e| TaskStoreError::Database(e.to_string()))?;
        Ok(changed as u64)
    }

    async fn list_by_status_with_priority(
        &self,
        statuses: &[MirrorTaskStatus],
        per: i64,
        page: i64,
    ) -> Result<Vec<MirrorTask>, TaskStoreError> {
        let page = page.max(1);
        let conn = self.conn.lock().unwrap();
        let (placeholders, values) = Self::status_placeholders(statuses);
        let sql = format!(
            "SELECT {} FROM mirror_tasks WHERE status IN ({}) \
             ORDER BY priority DESC, created_at DESC LIMIT ? OFFSET ?",
            Self::SELECT_COLUMNS,
            placeholders,
        );

        let mut params: Vec<Box<dyn rusqlite::ToSql>> = values
            .into_iter()
            .map(|v| Box::new(v) as Box<dyn rusqlite::ToSql>)
            .collect();
        params.push(Box::new(per));
        params.push(Box::new((page - 1) * per));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| TaskStoreError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                Self::row_to_task,
            )
            .map_err(|e| TaskStoreError::Database(e.to_string()))?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row.map_err(|e| TaskStoreError::Database(e.to_string()))?);
        }
        Ok(tasks)
    }
}
