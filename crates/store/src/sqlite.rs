//! SQLite store.
//!
//! One database file holds every record store plus chat history:
//! - `journals`, `tasks`, `notifications`
//! - `notes` and `integrations` (which users linked Notion)
//! - `chat_threads` and `chat_messages`
//!
//! Timestamps are stored as fixed-width RFC 3339 text so that string order
//! matches time order.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use slo_core::error::StoreError;
use slo_core::store::*;
use slo_core::{ConversationTurn, Role, ToolCallRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "journals table",
        r#"
        CREATE TABLE IF NOT EXISTS journals (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        )
        "#,
    ),
    (
        "journals index",
        "CREATE INDEX IF NOT EXISTS idx_journals_user_created ON journals(user_id, created_at DESC)",
    ),
    (
        "tasks table",
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL,
            title         TEXT NOT NULL,
            description   TEXT,
            status        TEXT NOT NULL DEFAULT 'todo',
            priority      TEXT NOT NULL DEFAULT 'medium',
            due_at        TEXT,
            completed_at  TEXT,
            source        TEXT NOT NULL DEFAULT 'manual',
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        )
        "#,
    ),
    (
        "tasks index",
        "CREATE INDEX IF NOT EXISTS idx_tasks_user_status ON tasks(user_id, status)",
    ),
    (
        "notifications table",
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            kind        TEXT NOT NULL,
            title       TEXT NOT NULL,
            body        TEXT,
            created_at  TEXT NOT NULL,
            read_at     TEXT
        )
        "#,
    ),
    (
        "notes table",
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            page_id           TEXT PRIMARY KEY,
            user_id           INTEGER NOT NULL,
            title             TEXT NOT NULL,
            url               TEXT,
            content           TEXT,
            last_edited_time  TEXT
        )
        "#,
    ),
    (
        "integrations table",
        r#"
        CREATE TABLE IF NOT EXISTS integrations (
            user_id   INTEGER NOT NULL,
            provider  TEXT NOT NULL,
            PRIMARY KEY (user_id, provider)
        )
        "#,
    ),
    (
        "chat_threads table",
        r#"
        CREATE TABLE IF NOT EXISTS chat_threads (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL,
            title       TEXT NOT NULL,
            created_at  TEXT NOT NULL,
            UNIQUE (user_id, title)
        )
        "#,
    ),
    (
        "chat_messages table",
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id   INTEGER NOT NULL REFERENCES chat_threads(id) ON DELETE CASCADE,
            user_id     INTEGER NOT NULL,
            role        TEXT NOT NULL,
            content     TEXT NOT NULL,
            tools_json  TEXT,
            created_at  TEXT NOT NULL
        )
        "#,
    ),
    (
        "chat_messages index",
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_thread ON chat_messages(thread_id, id)",
    ),
];

/// A SQLite store implementing every record store and chat history.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite store.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // Every pooled connection to `:memory:` would see its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Connection(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Open a database file, creating parent directories as needed.
    pub async fn open_file(path: &std::path::Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Storage(format!("Failed to create {}: {e}", parent.display())))?;
        }
        Self::new(&format!("sqlite://{}", path.display())).await
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        for (name, sql) in MIGRATIONS {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }
        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Mark the user's Notion workspace as linked.
    pub async fn connect_notes(&self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query("INSERT OR IGNORE INTO integrations (user_id, provider) VALUES (?1, 'notion')")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(query_failed)?;
        Ok(())
    }

    /// Insert or refresh a synced note.
    pub async fn upsert_note(&self, note: &Note) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO notes (page_id, user_id, title, url, content, last_edited_time)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(page_id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                content = excluded.content,
                last_edited_time = excluded.last_edited_time
            "#,
        )
        .bind(&note.page_id)
        .bind(note.user_id)
        .bind(&note.title)
        .bind(&note.url)
        .bind(&note.content)
        .bind(note.last_edited_time.map(ts))
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(())
    }

    pub async fn add_notification(
        &self,
        user_id: UserId,
        kind: &str,
        title: &str,
        body: Option<&str>,
    ) -> Result<Notification, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO notifications (user_id, kind, title, body, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(body)
        .bind(ts(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;
        row_to_notification(&row)
    }

    /// Row counts per table, for `slo status`.
    pub async fn table_counts(&self) -> Result<Vec<(&'static str, i64)>, StoreError> {
        let mut counts = Vec::new();
        for table in ["journals", "tasks", "notifications", "notes", "chat_messages"] {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&self.pool)
                .await
                .map_err(query_failed)?;
            counts.push((table, count));
        }
        Ok(counts)
    }
}

fn query_failed(e: sqlx::Error) -> StoreError {
    StoreError::QueryFailed(e.to_string())
}

fn ts(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("bad timestamp '{raw}': {e}")))
}

fn col<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| StoreError::QueryFailed(format!("{name} column: {e}")))
}

fn ts_col(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, StoreError> {
    let raw: String = col(row, name)?;
    parse_ts(&raw)
}

fn opt_ts_col(row: &SqliteRow, name: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
    let raw: Option<String> = col(row, name)?;
    raw.as_deref().map(parse_ts).transpose()
}

fn row_to_journal(row: &SqliteRow) -> Result<JournalEntry, StoreError> {
    Ok(JournalEntry {
        id: col(row, "id")?,
        user_id: col(row, "user_id")?,
        content: col(row, "content")?,
        created_at: ts_col(row, "created_at")?,
    })
}

fn row_to_task(row: &SqliteRow) -> Result<Task, StoreError> {
    let status: String = col(row, "status")?;
    let priority: String = col(row, "priority")?;
    Ok(Task {
        id: col(row, "id")?,
        user_id: col(row, "user_id")?,
        title: col(row, "title")?,
        description: col(row, "description")?,
        status: status.parse().map_err(StoreError::QueryFailed)?,
        priority: priority.parse().map_err(StoreError::QueryFailed)?,
        due_at: opt_ts_col(row, "due_at")?,
        completed_at: opt_ts_col(row, "completed_at")?,
        source: col(row, "source")?,
        created_at: ts_col(row, "created_at")?,
        updated_at: ts_col(row, "updated_at")?,
    })
}

fn row_to_notification(row: &SqliteRow) -> Result<Notification, StoreError> {
    Ok(Notification {
        id: col(row, "id")?,
        user_id: col(row, "user_id")?,
        kind: col(row, "kind")?,
        title: col(row, "title")?,
        body: col(row, "body")?,
        created_at: ts_col(row, "created_at")?,
        read_at: opt_ts_col(row, "read_at")?,
    })
}

fn row_to_note(row: &SqliteRow) -> Result<Note, StoreError> {
    Ok(Note {
        page_id: col(row, "page_id")?,
        user_id: col(row, "user_id")?,
        title: col(row, "title")?,
        url: col(row, "url")?,
        content: col(row, "content")?,
        last_edited_time: opt_ts_col(row, "last_edited_time")?,
    })
}

fn row_to_message(row: &SqliteRow) -> Result<StoredMessage, StoreError> {
    let role: String = col(row, "role")?;
    let tools_json: Option<String> = col(row, "tools_json")?;
    let tools = tools_json
        .as_deref()
        .map(serde_json::from_str::<Vec<ToolCallRecord>>)
        .transpose()
        .map_err(|e| StoreError::QueryFailed(format!("tools_json column: {e}")))?;
    Ok(StoredMessage {
        id: col(row, "id")?,
        thread_id: col(row, "thread_id")?,
        user_id: col(row, "user_id")?,
        role: role.parse().map_err(StoreError::QueryFailed)?,
        content: col(row, "content")?,
        tools,
        created_at: ts_col(row, "created_at")?,
    })
}

#[async_trait]
impl JournalStore for SqliteStore {
    async fn recent(&self, user_id: UserId, query: &JournalQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM journals
            WHERE user_id = ?1
              AND (?2 IS NULL OR content LIKE '%' || ?2 || '%')
              AND (?3 IS NULL OR created_at >= ?3)
            ORDER BY created_at DESC, id DESC
            LIMIT ?4
            "#,
        )
        .bind(user_id)
        .bind(query.text.as_deref())
        .bind(query.since.map(ts))
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(row_to_journal).collect()
    }

    async fn create(&self, user_id: UserId, content: &str) -> Result<JournalEntry, StoreError> {
        let row = sqlx::query(
            "INSERT INTO journals (user_id, content, created_at) VALUES (?1, ?2, ?3) RETURNING *",
        )
        .bind(user_id)
        .bind(content)
        .bind(ts(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;
        row_to_journal(&row)
    }

    async fn delete(&self, user_id: UserId, id: i64) -> Result<Option<JournalEntry>, StoreError> {
        let row = sqlx::query("DELETE FROM journals WHERE id = ?1 AND user_id = ?2 RETURNING *")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;
        row.as_ref().map(row_to_journal).transpose()
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn list(&self, user_id: UserId, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE user_id = ?1
              AND (?2 IS NULL OR status = ?2)
              AND (?3 IS NULL OR title LIKE '%' || ?3 || '%' OR description LIKE '%' || ?3 || '%')
              AND (?4 IS NULL OR (due_at IS NOT NULL AND due_at <= ?4))
              AND (?5 IS NULL OR (due_at IS NOT NULL AND due_at >= ?5))
            ORDER BY due_at IS NULL, due_at ASC, created_at DESC, id DESC
            LIMIT ?6
            "#,
        )
        .bind(user_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.text.as_deref())
        .bind(query.due_before.map(ts))
        .bind(query.due_after.map(ts))
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(row_to_task).collect()
    }

    async fn create(&self, user_id: UserId, task: NewTask) -> Result<Task, StoreError> {
        let now = ts(Utc::now());
        let row = sqlx::query(
            r#"
            INSERT INTO tasks (user_id, title, description, status, priority, due_at, source, created_at, updated_at)
            VALUES (?1, ?2, ?3, 'todo', ?4, ?5, ?6, ?7, ?7)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.priority.as_str())
        .bind(task.due_at.map(ts))
        .bind(&task.source)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;
        row_to_task(&row)
    }

    async fn update(&self, user_id: UserId, id: i64, patch: TaskPatch) -> Result<Option<Task>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(query_failed)?;

        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_failed)?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut task = row_to_task(&row)?;
        task.apply(patch, Utc::now());

        sqlx::query(
            r#"
            UPDATE tasks SET
                title = ?1, description = ?2, status = ?3, priority = ?4,
                due_at = ?5, completed_at = ?6, updated_at = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.due_at.map(ts))
        .bind(task.completed_at.map(ts))
        .bind(ts(task.updated_at))
        .bind(task.id)
        .execute(&mut *tx)
        .await
        .map_err(query_failed)?;

        tx.commit().await.map_err(query_failed)?;
        Ok(Some(task))
    }

    async fn recently_completed(&self, user_id: UserId, limit: usize) -> Result<Vec<Task>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM tasks
            WHERE user_id = ?1 AND status = 'done'
            ORDER BY completed_at IS NULL, completed_at DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(row_to_task).collect()
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn unread(&self, user_id: UserId, limit: usize) -> Result<Vec<Notification>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM notifications
            WHERE user_id = ?1 AND read_at IS NULL
            ORDER BY created_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(row_to_notification).collect()
    }
}

#[async_trait]
impl NoteStore for SqliteStore {
    async fn is_connected(&self, user_id: UserId) -> Result<bool, StoreError> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM integrations WHERE user_id = ?1 AND provider = 'notion'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_failed)?;
        Ok(found.is_some())
    }

    async fn search(&self, user_id: UserId, text: Option<&str>, limit: usize) -> Result<Vec<Note>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM notes
            WHERE user_id = ?1
              AND (?2 IS NULL OR title LIKE '%' || ?2 || '%' OR content LIKE '%' || ?2 || '%')
            ORDER BY last_edited_time IS NULL, last_edited_time DESC
            LIMIT ?3
            "#,
        )
        .bind(user_id)
        .bind(text)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;
        rows.iter().map(row_to_note).collect()
    }

    async fn delete(&self, user_id: UserId, page_id: &str) -> Result<Option<Note>, StoreError> {
        let row = sqlx::query("DELETE FROM notes WHERE page_id = ?1 AND user_id = ?2 RETURNING *")
            .bind(page_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_failed)?;
        row.as_ref().map(row_to_note).transpose()
    }
}

#[async_trait]
impl HistoryStore for SqliteStore {
    async fn thread_for(&self, user_id: UserId, title: &str) -> Result<ThreadId, StoreError> {
        sqlx::query(
            "INSERT OR IGNORE INTO chat_threads (user_id, title, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(title)
        .bind(ts(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(query_failed)?;

        sqlx::query_scalar("SELECT id FROM chat_threads WHERE user_id = ?1 AND title = ?2")
            .bind(user_id)
            .bind(title)
            .fetch_one(&self.pool)
            .await
            .map_err(query_failed)
    }

    async fn fetch_recent(&self, user_id: UserId, thread_id: ThreadId, limit: usize) -> Result<Vec<ConversationTurn>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM chat_messages
            WHERE thread_id = ?1 AND user_id = ?2
            ORDER BY id DESC
            LIMIT ?3
            "#,
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(query_failed)?;

        let mut turns = rows
            .iter()
            .map(|row| row_to_message(row).map(|m| m.to_turn()))
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn append(
        &self,
        thread_id: ThreadId,
        user_id: UserId,
        role: Role,
        content: &str,
        tool_trace: Option<&[ToolCallRecord]>,
    ) -> Result<StoredMessage, StoreError> {
        let tools_json = tool_trace
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Storage(format!("Tool trace serialization: {e}")))?;

        let row = sqlx::query(
            r#"
            INSERT INTO chat_messages (thread_id, user_id, role, content, tools_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            RETURNING *
            "#,
        )
        .bind(thread_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(tools_json)
        .bind(ts(Utc::now()))
        .fetch_one(&self.pool)
        .await
        .map_err(query_failed)?;
        row_to_message(&row)
    }
}
