use crate::args::to_json;
use async_trait::async_trait;
use serde_json::{Value, json};
use slo_core::error::ToolError;
use slo_core::store::NotificationStore;
use slo_core::tool::{Tool, ToolContext};
use slo_core::Scope;
use slo_security::check_scope;
use std::sync::Arc;

const UNREAD_LIMIT: usize = 20;

/// Unread notifications, newest first.
pub struct NotificationsUnreadTool {
    notifications: Arc<dyn NotificationStore>,
}

impl NotificationsUnreadTool {
    pub fn new(notifications: Arc<dyn NotificationStore>) -> Self {
        Self { notifications }
    }
}

#[async_trait]
impl Tool for NotificationsUnreadTool {
    fn name(&self) -> &str {
        "notifications_unread"
    }

    fn description(&self) -> &str {
        "List unread notifications."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {}, "required": [] })
    }

    async fn execute(&self, ctx: &ToolContext, _arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::NotificationsRead)?;
        let items = self.notifications.unread(ctx.user_id, UNREAD_LIMIT).await?;
        Ok(json!({ "items": to_json(self.name(), &items)? }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slo_core::ScopeSet;
    use slo_store::InMemoryStore;

    #[tokio::test]
    async fn lists_unread_for_user() {
        let store = Arc::new(InMemoryStore::new());
        store.add_notification(2, "task_due_soon", "Essay due tomorrow", None).await;
        store.add_notification(9, "task_overdue", "Someone else's", None).await;

        let tool = NotificationsUnreadTool::new(store);
        let ctx = ToolContext { user_id: 2, scopes: ScopeSet::all() };
        let result = tool.execute(&ctx, json!({})).await.unwrap();
        let items = result["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["kind"], "task_due_soon");
    }
}
