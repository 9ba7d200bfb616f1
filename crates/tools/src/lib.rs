//! Built-in tool implementations for Slo.
//!
//! Tools give the agent access to the student's data: journals, tasks,
//! Notion notes, the Outlook calendar and notifications. Every tool checks
//! its capability scope before touching a store.

pub mod args;
pub mod calendar;
pub mod journals;
pub mod notes;
pub mod notifications;
pub mod tasks;

use slo_core::store::DataStores;
use slo_core::tool::ToolRegistry;

/// Create a registry with every built-in tool, wired to `stores`.
///
/// Registration order is the order tool definitions are offered to the model.
pub fn default_registry(stores: &DataStores) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Box::new(journals::GetJournalsTool::new(stores.journals.clone())));
    registry.register(Box::new(journals::CreateJournalTool::new(stores.journals.clone())));
    registry.register(Box::new(journals::DeleteJournalTool::new(stores.journals.clone())));

    registry.register(Box::new(tasks::ListTasksTool::new(stores.tasks.clone())));
    registry.register(Box::new(tasks::CreateTaskTool::new(stores.tasks.clone())));
    registry.register(Box::new(tasks::UpdateTaskTool::new(stores.tasks.clone())));

    registry.register(Box::new(notes::ListNotesTool::new(stores.notes.clone())));
    registry.register(Box::new(notes::DeleteNoteTool::new(stores.notes.clone())));

    registry.register(Box::new(calendar::CalendarListTool::new(stores.calendar.clone())));
    registry.register(Box::new(calendar::CalendarCreateTool::new(stores.calendar.clone())));
    registry.register(Box::new(calendar::CalendarUpdateTool::new(stores.calendar.clone())));
    registry.register(Box::new(calendar::CalendarDeleteTool::new(stores.calendar.clone())));

    registry.register(Box::new(notifications::NotificationsUnreadTool::new(stores.notifications.clone())));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use slo_core::tool::ToolContext;
    use slo_core::{ScopeSet, ToolError};
    use slo_store::{InMemoryCalendar, InMemoryStore, data_stores};
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        let store = Arc::new(InMemoryStore::new());
        default_registry(&data_stores(store, Arc::new(InMemoryCalendar::new())))
    }

    #[test]
    fn registers_all_tools_in_order() {
        let registry = registry();
        assert_eq!(
            registry.names(),
            vec![
                "get_journals",
                "create_journal",
                "delete_journal",
                "list_tasks",
                "create_task",
                "update_task",
                "list_notes",
                "delete_note",
                "calendar_list",
                "calendar_create_event",
                "calendar_update_event",
                "calendar_delete_event",
                "notifications_unread",
            ]
        );
        assert_eq!(registry.definitions().len(), 13);
    }

    #[test]
    fn write_classification() {
        let registry = registry();
        let writes: Vec<&str> = registry
            .names()
            .into_iter()
            .filter(|name| registry.is_write(name))
            .collect();
        assert_eq!(
            writes,
            vec![
                "create_journal",
                "delete_journal",
                "create_task",
                "update_task",
                "delete_note",
                "calendar_create_event",
                "calendar_update_event",
                "calendar_delete_event",
            ]
        );
    }

    #[tokio::test]
    async fn registry_validates_before_dispatch() {
        let registry = registry();
        let ctx = ToolContext { user_id: 1, scopes: ScopeSet::all() };

        let missing = registry.execute("create_task", &ctx, json!({})).await.unwrap();
        assert_eq!(missing["error"], "invalid_arguments: missing required argument 'title'");

        let wrong_type = registry
            .execute("delete_journal", &ctx, json!({"id": "seven"}))
            .await
            .unwrap();
        assert!(wrong_type["error"].as_str().unwrap().contains("must be of type integer"));

        let unknown = registry.execute("send_email", &ctx, json!({})).await.unwrap_err();
        assert!(matches!(unknown, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn out_of_vocabulary_values_are_rejected() {
        let registry = registry();
        let ctx = ToolContext { user_id: 1, scopes: ScopeSet::all() };

        let created = registry
            .execute("create_task", &ctx, json!({"title": "Essay", "priority": "urgent"}))
            .await
            .unwrap();
        assert!(created["error"].as_str().unwrap().starts_with("invalid_arguments: argument 'priority'"));

        let ok = registry.execute("create_task", &ctx, json!({"title": "Essay"})).await.unwrap();
        let id = ok["id"].as_i64().unwrap();
        let updated = registry
            .execute("update_task", &ctx, json!({"id": id, "status": "completed"}))
            .await
            .unwrap();
        assert!(updated["error"].as_str().unwrap().contains("must be one of"));

        let listed = registry.execute("list_tasks", &ctx, json!({})).await.unwrap();
        assert_eq!(listed["items"][0]["status"], "todo");
    }
}
