//! In-memory store: useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slo_core::error::StoreError;
use slo_core::store::*;
use slo_core::{ConversationTurn, Role, ToolCallRecord};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    next_id: i64,
    journals: Vec<JournalEntry>,
    tasks: Vec<Task>,
    notes: Vec<Note>,
    notion_users: HashSet<UserId>,
    notifications: Vec<Notification>,
    threads: Vec<(ThreadId, UserId, String)>,
    messages: Vec<StoredMessage>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Implements every record store and the history store over plain vectors.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the user's Notion workspace as linked.
    pub async fn connect_notes(&self, user_id: UserId) {
        self.state.write().await.notion_users.insert(user_id);
    }

    /// Insert a synced note (replacing one with the same page id).
    pub async fn upsert_note(&self, note: Note) {
        let mut state = self.state.write().await;
        state.notes.retain(|n| n.page_id != note.page_id);
        state.notes.push(note);
    }

    pub async fn add_notification(
        &self,
        user_id: UserId,
        kind: &str,
        title: &str,
        body: Option<&str>,
    ) -> Notification {
        let mut state = self.state.write().await;
        let notification = Notification {
            id: state.next_id(),
            user_id,
            kind: kind.into(),
            title: title.into(),
            body: body.map(str::to_string),
            created_at: Utc::now(),
            read_at: None,
        };
        state.notifications.push(notification.clone());
        notification
    }

    /// All stored messages of a thread, oldest first.
    pub async fn messages(&self, thread_id: ThreadId) -> Vec<StoredMessage> {
        self.state
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Ascending with `None` last.
fn nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending with `None` last.
fn desc_nulls_last(a: &Option<DateTime<Utc>>, b: &Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        _ => nulls_last(a, b),
    }
}

#[async_trait]
impl JournalStore for InMemoryStore {
    async fn recent(&self, user_id: UserId, query: &JournalQuery) -> Result<Vec<JournalEntry>, StoreError> {
        let state = self.state.read().await;
        let mut results: Vec<JournalEntry> = state
            .journals
            .iter()
            .filter(|j| j.user_id == user_id)
            .filter(|j| query.text.as_deref().is_none_or(|t| contains_ci(&j.content, t)))
            .filter(|j| query.since.is_none_or(|since| j.created_at >= since))
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        results.truncate(query.limit);
        Ok(results)
    }

    async fn create(&self, user_id: UserId, content: &str) -> Result<JournalEntry, StoreError> {
        let mut state = self.state.write().await;
        let entry = JournalEntry {
            id: state.next_id(),
            user_id,
            content: content.into(),
            created_at: Utc::now(),
        };
        state.journals.push(entry.clone());
        Ok(entry)
    }

    async fn delete(&self, user_id: UserId, id: i64) -> Result<Option<JournalEntry>, StoreError> {
        let mut state = self.state.write().await;
        let position = state
            .journals
            .iter()
            .position(|j| j.id == id && j.user_id == user_id);
        Ok(position.map(|i| state.journals.remove(i)))
    }
}

#[async_trait]
impl TaskStore for InMemoryStore {
    async fn list(&self, user_id: UserId, query: &TaskQuery) -> Result<Vec<Task>, StoreError> {
        let state = self.state.read().await;
        let mut results: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| query.status.is_none_or(|s| t.status == s))
            .filter(|t| {
                query.text.as_deref().is_none_or(|q| {
                    contains_ci(&t.title, q)
                        || t.description.as_deref().is_some_and(|d| contains_ci(d, q))
                })
            })
            .filter(|t| query.due_before.is_none_or(|b| t.due_at.is_some_and(|d| d <= b)))
            .filter(|t| query.due_after.is_none_or(|a| t.due_at.is_some_and(|d| d >= a)))
            .cloned()
            .collect();
        results.sort_by(|a, b| {
            nulls_last(&a.due_at, &b.due_at)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        results.truncate(query.limit);
        Ok(results)
    }

    async fn create(&self, user_id: UserId, task: NewTask) -> Result<Task, StoreError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let task = Task {
            id: state.next_id(),
            user_id,
            title: task.title,
            description: task.description,
            status: TaskStatus::Todo,
            priority: task.priority,
            due_at: task.due_at,
            completed_at: None,
            source: task.source,
            created_at: now,
            updated_at: now,
        };
        state.tasks.push(task.clone());
        Ok(task)
    }

    async fn update(&self, user_id: UserId, id: i64, patch: TaskPatch) -> Result<Option<Task>, StoreError> {
        let mut state = self.state.write().await;
        let Some(task) = state
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.user_id == user_id)
        else {
            return Ok(None);
        };
        task.apply(patch, Utc::now());
        Ok(Some(task.clone()))
    }

    async fn recently_completed(&self, user_id: UserId, limit: usize) -> Result<Vec<Task>, StoreError> {
        let state = self.state.read().await;
        let mut done: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id && t.status == TaskStatus::Done)
            .cloned()
            .collect();
        done.sort_by(|a, b| desc_nulls_last(&a.completed_at, &b.completed_at));
        done.truncate(limit);
        Ok(done)
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn unread(&self, user_id: UserId, limit: usize) -> Result<Vec<Notification>, StoreError> {
        let state = self.state.read().await;
        let mut unread: Vec<Notification> = state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && n.read_at.is_none())
            .cloned()
            .collect();
        unread.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        unread.truncate(limit);
        Ok(unread)
    }
}

#[async_trait]
impl NoteStore for InMemoryStore {
    async fn is_connected(&self, user_id: UserId) -> Result<bool, StoreError> {
        Ok(self.state.read().await.notion_users.contains(&user_id))
    }

    async fn search(&self, user_id: UserId, text: Option<&str>, limit: usize) -> Result<Vec<Note>, StoreError> {
        let state = self.state.read().await;
        let mut notes: Vec<Note> = state
            .notes
            .iter()
            .filter(|n| n.user_id == user_id)
            .filter(|n| {
                text.is_none_or(|q| {
                    contains_ci(&n.title, q) || n.content.as_deref().is_some_and(|c| contains_ci(c, q))
                })
            })
            .cloned()
            .collect();
        notes.sort_by(|a, b| desc_nulls_last(&a.last_edited_time, &b.last_edited_time));
        notes.truncate(limit);
        Ok(notes)
    }

    async fn delete(&self, user_id: UserId, page_id: &str) -> Result<Option<Note>, StoreError> {
        let mut state = self.state.write().await;
        let position = state
            .notes
            .iter()
            .position(|n| n.page_id == page_id && n.user_id == user_id);
        Ok(position.map(|i| state.notes.remove(i)))
    }
}

#[async_trait]
impl HistoryStore for InMemoryStore {
    async fn thread_for(&self, user_id: UserId, title: &str) -> Result<ThreadId, StoreError> {
        let mut state = self.state.write().await;
        if let Some((id, _, _)) = state
            .threads
            .iter()
            .find(|(_, owner, t)| *owner == user_id && t == title)
        {
            return Ok(*id);
        }
        let id = state.next_id();
        state.threads.push((id, user_id, title.to_string()));
        Ok(id)
    }

    async fn fetch_recent(&self, user_id: UserId, thread_id: ThreadId, limit: usize) -> Result<Vec<ConversationTurn>, StoreError> {
        let state = self.state.read().await;
        let thread: Vec<&StoredMessage> = state
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id && m.user_id == user_id)
            .collect();
        let skip = thread.len().saturating_sub(limit);
        Ok(thread.into_iter().skip(skip).map(StoredMessage::to_turn).collect())
    }

    async fn append(
        &self,
        thread_id: ThreadId,
        user_id: UserId,
        role: Role,
        content: &str,
        tool_trace: Option<&[ToolCallRecord]>,
    ) -> Result<StoredMessage, StoreError> {
        let mut state = self.state.write().await;
        if !state.threads.iter().any(|(id, _, _)| *id == thread_id) {
            return Err(StoreError::NotFound(format!("thread {thread_id}")));
        }
        let message = StoredMessage {
            id: state.next_id(),
            thread_id,
            user_id,
            role,
            content: content.into(),
            tools: tool_trace.map(<[ToolCallRecord]>::to_vec),
            created_at: Utc::now(),
        };
        state.messages.push(message.clone());
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_task(title: &str, due_in_days: Option<i64>) -> NewTask {
        NewTask {
            title: title.into(),
            description: None,
            priority: TaskPriority::Medium,
            due_at: due_in_days.map(|d| Utc::now() + Duration::days(d)),
            source: "agent".into(),
        }
    }

    #[tokio::test]
    async fn journals_newest_first_with_filter() {
        let store = InMemoryStore::new();
        JournalStore::create(&store, 1, "Studied calculus").await.unwrap();
        JournalStore::create(&store, 1, "Gym day").await.unwrap();
        JournalStore::create(&store, 2, "Other user calculus").await.unwrap();

        let all = JournalStore::recent(&store, 1, &JournalQuery { limit: 10, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].content, "Gym day");

        let filtered = JournalStore::recent(
            &store,
            1,
            &JournalQuery { limit: 10, text: Some("CALCULUS".into()), since: None },
        )
        .await
        .unwrap();
        assert_eq!(filtered.len(), 1);
    }

    #[tokio::test]
    async fn journal_delete_is_owner_scoped() {
        let store = InMemoryStore::new();
        let entry = JournalStore::create(&store, 1, "Private").await.unwrap();
        assert!(JournalStore::delete(&store, 2, entry.id).await.unwrap().is_none());
        assert!(JournalStore::delete(&store, 1, entry.id).await.unwrap().is_some());
        assert!(JournalStore::delete(&store, 1, entry.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tasks_due_ascending_nulls_last() {
        let store = InMemoryStore::new();
        TaskStore::create(&store, 1, new_task("undated", None)).await.unwrap();
        TaskStore::create(&store, 1, new_task("later", Some(5))).await.unwrap();
        TaskStore::create(&store, 1, new_task("soon", Some(1))).await.unwrap();

        let tasks = TaskStore::list(&store, 1, &TaskQuery { limit: 10, ..Default::default() })
            .await
            .unwrap();
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["soon", "later", "undated"]);
    }

    #[tokio::test]
    async fn task_update_and_recent_completions() {
        let store = InMemoryStore::new();
        let task = TaskStore::create(&store, 1, new_task("Essay", None)).await.unwrap();
        let updated = TaskStore::update(
            &store,
            1,
            task.id,
            TaskPatch { status: Patch::Set(TaskStatus::Done), ..Default::default() },
        )
        .await
        .unwrap()
        .unwrap();
        assert!(updated.completed_at.is_some());

        let done = store.recently_completed(1, 5).await.unwrap();
        assert_eq!(done.len(), 1);
        assert!(TaskStore::update(&store, 1, 999, TaskPatch::default()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unread_notifications_only() {
        let store = InMemoryStore::new();
        store.add_notification(1, "task_due_soon", "Essay due", None).await;
        store.add_notification(2, "task_overdue", "Other", None).await;
        let unread = store.unread(1, 10).await.unwrap();
        assert_eq!(unread.len(), 1);
        assert_eq!(unread[0].kind, "task_due_soon");
    }

    #[tokio::test]
    async fn history_round_trip_oldest_first() {
        let store = InMemoryStore::new();
        let thread = store.thread_for(1, "Agent Conversations").await.unwrap();
        assert_eq!(store.thread_for(1, "Agent Conversations").await.unwrap(), thread);

        for i in 0..4 {
            store.append(thread, 1, Role::User, &format!("q{i}"), None).await.unwrap();
        }
        let recent = store.fetch_recent(1, thread, 2).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["q2", "q3"]);
    }

    #[tokio::test]
    async fn append_to_unknown_thread_fails() {
        let store = InMemoryStore::new();
        let err = store.append(42, 1, Role::User, "hi", None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
