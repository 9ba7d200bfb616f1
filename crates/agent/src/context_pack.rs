//! The context pack: a compact snapshot of the user's current state that
//! grounds every turn.
//!
//! The pack is small and structured, never a raw dump. Building it only
//! reads from the stores, and a failed lookup leaves its section empty
//! instead of failing the turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slo_core::store::{DataStores, JournalQuery, TaskPriority, TaskQuery, TaskStatus, UserId};
use tracing::warn;

const JOURNAL_LIMIT: usize = 5;
const JOURNAL_PREVIEW_CHARS: usize = 300;
const TODO_LIMIT: usize = 10;
const DONE_LIMIT: usize = 5;
const NOTIFICATION_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentTime {
    pub current_datetime: String,
    pub current_date: String,
    pub current_time: String,
    pub timezone: String,
    pub day_of_week: String,
    pub month: String,
    pub year: i32,
}

impl CurrentTime {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            current_datetime: now.to_rfc3339_opts(chrono::SecondsFormat::Micros, false),
            current_date: now.format("%Y-%m-%d").to_string(),
            current_time: now.format("%H:%M:%S").to_string(),
            timezone: "UTC".into(),
            day_of_week: now.format("%A").to_string(),
            month: now.format("%B").to_string(),
            year: chrono::Datelike::year(&now),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalPreview {
    pub id: i64,
    pub preview: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTask {
    pub id: i64,
    pub title: String,
    pub due_at: Option<String>,
    pub priority: TaskPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub id: i64,
    pub title: String,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub todo: Vec<OpenTask>,
    pub done_recent: Vec<CompletedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub id: i64,
    pub kind: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextPack {
    pub current_time: CurrentTime,
    pub journals: Vec<JournalPreview>,
    pub tasks: TaskSnapshot,
    pub notifications: Vec<NotificationSummary>,
}

impl ContextPack {
    /// The pack as compact JSON for the user message.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

/// Builds context packs from the data stores.
#[derive(Clone)]
pub struct ContextPackBuilder {
    stores: DataStores,
}

impl ContextPackBuilder {
    pub fn new(stores: DataStores) -> Self {
        Self { stores }
    }

    /// Build the pack for `user_id` as of now.
    ///
    /// `include_recent_actions` is accepted for callers that pass it but does
    /// not change the pack.
    pub async fn build(&self, user_id: UserId, include_recent_actions: bool) -> ContextPack {
        self.build_at(user_id, include_recent_actions, Utc::now()).await
    }

    pub async fn build_at(
        &self,
        user_id: UserId,
        _include_recent_actions: bool,
        now: DateTime<Utc>,
    ) -> ContextPack {
        ContextPack {
            current_time: CurrentTime::at(now),
            journals: self.journals(user_id).await,
            tasks: TaskSnapshot {
                todo: self.open_tasks(user_id).await,
                done_recent: self.completed_tasks(user_id).await,
            },
            notifications: self.notifications(user_id).await,
        }
    }

    async fn journals(&self, user_id: UserId) -> Vec<JournalPreview> {
        let query = JournalQuery {
            limit: JOURNAL_LIMIT,
            ..Default::default()
        };
        match self.stores.journals.recent(user_id, &query).await {
            Ok(entries) => entries
                .into_iter()
                .map(|j| JournalPreview {
                    id: j.id,
                    preview: j.content.chars().take(JOURNAL_PREVIEW_CHARS).collect(),
                    created_at: j.created_at.to_rfc3339(),
                })
                .collect(),
            Err(e) => {
                warn!(user_id, error = %e, "context pack: journal lookup failed");
                Vec::new()
            }
        }
    }

    async fn open_tasks(&self, user_id: UserId) -> Vec<OpenTask> {
        let query = TaskQuery {
            status: Some(TaskStatus::Todo),
            limit: TODO_LIMIT,
            ..Default::default()
        };
        match self.stores.tasks.list(user_id, &query).await {
            Ok(tasks) => tasks
                .into_iter()
                .map(|t| OpenTask {
                    id: t.id,
                    title: t.title,
                    due_at: t.due_at.map(|d| d.to_rfc3339()),
                    priority: t.priority,
                })
                .collect(),
            Err(e) => {
                warn!(user_id, error = %e, "context pack: open task lookup failed");
                Vec::new()
            }
        }
    }

    async fn completed_tasks(&self, user_id: UserId) -> Vec<CompletedTask> {
        match self.stores.tasks.recently_completed(user_id, DONE_LIMIT).await {
            Ok(tasks) => tasks
                .into_iter()
                .map(|t| CompletedTask {
                    id: t.id,
                    title: t.title,
                    completed_at: t.completed_at.map(|d| d.to_rfc3339()),
                })
                .collect(),
            Err(e) => {
                warn!(user_id, error = %e, "context pack: completed task lookup failed");
                Vec::new()
            }
        }
    }

    async fn notifications(&self, user_id: UserId) -> Vec<NotificationSummary> {
        match self.stores.notifications.unread(user_id, NOTIFICATION_LIMIT).await {
            Ok(items) => items
                .into_iter()
                .map(|n| NotificationSummary {
                    id: n.id,
                    kind: n.kind,
                    title: n.title,
                })
                .collect(),
            Err(e) => {
                warn!(user_id, error = %e, "context pack: notification lookup failed");
                Vec::new()
            }
        }
    }
}
