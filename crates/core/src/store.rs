//! Store traits: the data the agent's tools read and write.
//!
//! Journals, tasks, notes, notifications, the calendar and chat history are
//! external collaborators. The agent only ever touches them through these
//! contracts; `slo-store` provides in-memory and SQLite implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::error::StoreError;
use crate::message::{ConversationTurn, Role};
use crate::tool::ToolCallRecord;

pub type UserId = i64;
pub type ThreadId = i64;

/// A tagged field update: leave the field alone, or set it.
///
/// Nullable fields use `Patch<Option<T>>`, so `Set(None)` clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Keep,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    /// Write the new value into `target` if one is present.
    pub fn apply_to(self, target: &mut T) {
        if let Patch::Set(value) = self {
            *target = value;
        }
    }
}

// ── Journals ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct JournalQuery {
    pub limit: usize,
    /// Case-insensitive substring filter on content
    pub text: Option<String>,
    pub since: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Entries newest first.
    async fn recent(&self, user_id: UserId, query: &JournalQuery) -> Result<Vec<JournalEntry>, StoreError>;
    async fn create(&self, user_id: UserId, content: &str) -> Result<JournalEntry, StoreError>;
    /// Delete an entry owned by `user_id`, returning it if it existed.
    async fn delete(&self, user_id: UserId, id: i64) -> Result<Option<JournalEntry>, StoreError>;
}

// ── Tasks ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            other => Err(format!("unknown task status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            other => Err(format!("unknown task priority '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub user_id: UserId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// manual | agent | journal_extract | chat_quickadd | notion
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Apply an update. Moving into `done` stamps `completed_at`.
    pub fn apply(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        let was_done = self.status == TaskStatus::Done;
        patch.title.apply_to(&mut self.title);
        patch.description.apply_to(&mut self.description);
        patch.priority.apply_to(&mut self.priority);
        patch.status.apply_to(&mut self.status);
        patch.due_at.apply_to(&mut self.due_at);
        if !was_done && self.status == TaskStatus::Done {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    /// Case-insensitive substring filter on title or description
    pub text: Option<String>,
    pub due_before: Option<DateTime<Utc>>,
    pub due_after: Option<DateTime<Utc>>,
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_at: Option<DateTime<Utc>>,
    pub source: String,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Patch<String>,
    pub description: Patch<Option<String>>,
    pub priority: Patch<TaskPriority>,
    pub status: Patch<TaskStatus>,
    pub due_at: Patch<Option<DateTime<Utc>>>,
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Matching tasks ordered by due date ascending (undated last), then newest.
    async fn list(&self, user_id: UserId, query: &TaskQuery) -> Result<Vec<Task>, StoreError>;
    async fn create(&self, user_id: UserId, task: NewTask) -> Result<Task, StoreError>;
    /// Update a task owned by `user_id`; `None` when it does not exist.
    async fn update(&self, user_id: UserId, id: i64, patch: TaskPatch) -> Result<Option<Task>, StoreError>;
    /// Done tasks, most recently completed first.
    async fn recently_completed(&self, user_id: UserId, limit: usize) -> Result<Vec<Task>, StoreError>;
}

// ── Notifications ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: UserId,
    /// e.g. task_due_soon, task_overdue
    pub kind: String,
    pub title: String,
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Unread notifications, newest first.
    async fn unread(&self, user_id: UserId, limit: usize) -> Result<Vec<Notification>, StoreError>;
}

// ── Notes (synced from Notion) ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub page_id: String,
    pub user_id: UserId,
    pub title: String,
    pub url: Option<String>,
    pub content: Option<String>,
    pub last_edited_time: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Whether the user has linked a Notion workspace.
    async fn is_connected(&self, user_id: UserId) -> Result<bool, StoreError>;
    /// Notes whose title or content contains `text`, most recently edited first.
    async fn search(&self, user_id: UserId, text: Option<&str>, limit: usize) -> Result<Vec<Note>, StoreError>;
    async fn delete(&self, user_id: UserId, page_id: &str) -> Result<Option<Note>, StoreError>;
}

// ── Calendar ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub body: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub subject: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventPatch {
    pub subject: Patch<String>,
    pub start: Patch<DateTime<Utc>>,
    pub end: Patch<DateTime<Utc>>,
    pub body: Patch<String>,
}

impl CalendarEvent {
    pub fn apply(&mut self, patch: EventPatch) {
        patch.subject.apply_to(&mut self.subject);
        patch.start.apply_to(&mut self.start);
        patch.end.apply_to(&mut self.end);
        if let Patch::Set(body) = patch.body {
            self.body = Some(body);
        }
    }
}

/// The user's external calendar. Implementations fail with
/// [`StoreError::NotConnected`] when no account is linked.
#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Events starting within `[from, until]`, soonest first.
    async fn list_events(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, StoreError>;
    async fn create_event(&self, user_id: UserId, event: NewEvent) -> Result<CalendarEvent, StoreError>;
    async fn update_event(&self, user_id: UserId, event_id: &str, patch: EventPatch) -> Result<CalendarEvent, StoreError>;
    async fn delete_event(&self, user_id: UserId, event_id: &str) -> Result<(), StoreError>;
}

// ── Conversation history ─────────────────────────────────────────────────

/// A persisted chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub thread_id: ThreadId,
    pub user_id: UserId,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolCallRecord>>,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    pub fn to_turn(&self) -> ConversationTurn {
        ConversationTurn {
            role: self.role,
            content: crate::message::TurnContent::Text(self.content.clone()),
            created_at: self.created_at,
        }
    }
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Get the user's thread with this title, creating it if needed.
    async fn thread_for(&self, user_id: UserId, title: &str) -> Result<ThreadId, StoreError>;

    /// The latest `limit` turns of a thread, oldest first.
    async fn fetch_recent(&self, user_id: UserId, thread_id: ThreadId, limit: usize) -> Result<Vec<ConversationTurn>, StoreError>;

    async fn append(
        &self,
        thread_id: ThreadId,
        user_id: UserId,
        role: Role,
        content: &str,
        tool_trace: Option<&[ToolCallRecord]>,
    ) -> Result<StoredMessage, StoreError>;
}

/// Handles to every data store a tool or the context pack may read.
#[derive(Clone)]
pub struct DataStores {
    pub journals: Arc<dyn JournalStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub notes: Arc<dyn NoteStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub calendar: Arc<dyn CalendarService>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        let now = Utc::now();
        Task {
            id: 1,
            user_id: 1,
            title: "Read chapter 4".into(),
            description: Some("OOP in Java".into()),
            status: TaskStatus::Todo,
            priority: TaskPriority::Medium,
            due_at: None,
            completed_at: None,
            source: "manual".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn keep_leaves_fields_untouched() {
        let mut t = task();
        t.apply(TaskPatch::default(), Utc::now());
        assert_eq!(t.title, "Read chapter 4");
        assert_eq!(t.description.as_deref(), Some("OOP in Java"));
    }

    #[test]
    fn set_none_clears_nullable_field() {
        let mut t = task();
        t.apply(
            TaskPatch {
                description: Patch::Set(None),
                ..TaskPatch::default()
            },
            Utc::now(),
        );
        assert!(t.description.is_none());
    }

    #[test]
    fn completing_stamps_completed_at_once() {
        let mut t = task();
        let first = Utc::now();
        t.apply(TaskPatch { status: Patch::Set(TaskStatus::Done), ..TaskPatch::default() }, first);
        assert_eq!(t.completed_at, Some(first));

        let later = first + chrono::Duration::hours(1);
        t.apply(TaskPatch { status: Patch::Set(TaskStatus::Done), ..TaskPatch::default() }, later);
        assert_eq!(t.completed_at, Some(first));
    }

    #[test]
    fn status_and_priority_parse() {
        assert_eq!("in_progress".parse::<TaskStatus>().unwrap(), TaskStatus::InProgress);
        assert_eq!("high".parse::<TaskPriority>().unwrap(), TaskPriority::High);
        assert!("urgent".parse::<TaskPriority>().is_err());
    }
}
