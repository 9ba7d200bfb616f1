//! Journal tools. Journals are entries written directly in the app.

use crate::args::{clamp_limit, invalid, opt_datetime, opt_str};
use async_trait::async_trait;
use serde_json::{Value, json};
use slo_core::error::ToolError;
use slo_core::store::{JournalQuery, JournalStore};
use slo_core::tool::{Tool, ToolContext};
use slo_core::Scope;
use slo_security::check_scope;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 100;

pub struct GetJournalsTool {
    journals: Arc<dyn JournalStore>,
}

impl GetJournalsTool {
    pub fn new(journals: Arc<dyn JournalStore>) -> Self {
        Self { journals }
    }
}

#[async_trait]
impl Tool for GetJournalsTool {
    fn name(&self) -> &str {
        "get_journals"
    }

    fn description(&self) -> &str {
        "Fetch local journal entries (written directly in SLO app). Use this when user specifically \
         mentions 'journal', 'journal entry', or personal reflections. NOT for Notion notes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "description": "Maximum entries to return (1-50, default 10)" },
                "query": { "type": "string", "description": "Text to search for in entries" },
                "since_iso": { "type": "string", "description": "Only entries created at or after this ISO time" }
            },
            "required": []
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::JournalsRead)?;

        let query = JournalQuery {
            limit: clamp_limit(&arguments, "limit", 10, 50),
            text: opt_str(&arguments, "query").map(str::to_string),
            since: opt_datetime(&arguments, "since_iso"),
        };
        let entries = self.journals.recent(ctx.user_id, &query).await?;
        let items: Vec<Value> = entries
            .iter()
            .map(|j| json!({ "id": j.id, "content": j.content, "created_at": j.created_at.to_rfc3339() }))
            .collect();
        Ok(json!({ "items": items }))
    }
}

pub struct CreateJournalTool {
    journals: Arc<dyn JournalStore>,
}

impl CreateJournalTool {
    pub fn new(journals: Arc<dyn JournalStore>) -> Self {
        Self { journals }
    }
}

#[async_trait]
impl Tool for CreateJournalTool {
    fn name(&self) -> &str {
        "create_journal"
    }

    fn description(&self) -> &str {
        "Create a new journal entry."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": { "type": "string" }
            },
            "required": ["content"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::JournalsWrite)?;

        let Some(content) = opt_str(&arguments, "content") else {
            return Ok(invalid("content must not be empty"));
        };
        let entry = self.journals.create(ctx.user_id, content).await?;
        tracing::info!(user_id = ctx.user_id, id = entry.id, "journal_create");
        Ok(json!({ "id": entry.id }))
    }
}

pub struct DeleteJournalTool {
    journals: Arc<dyn JournalStore>,
}

impl DeleteJournalTool {
    pub fn new(journals: Arc<dyn JournalStore>) -> Self {
        Self { journals }
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() > PREVIEW_CHARS {
        let head: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        content.to_string()
    }
}

#[async_trait]
impl Tool for DeleteJournalTool {
    fn name(&self) -> &str {
        "delete_journal"
    }

    fn description(&self) -> &str {
        "Delete a journal entry by ID. Use this when user confirms deletion."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer", "description": "Journal entry ID to delete" }
            },
            "required": ["id"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::JournalsWrite)?;

        let Some(id) = arguments["id"].as_i64() else {
            return Ok(invalid("id must be an integer"));
        };
        let Some(entry) = self.journals.delete(ctx.user_id, id).await? else {
            return Ok(json!({ "error": "Journal entry not found or you don't have permission to delete it" }));
        };

        tracing::info!(user_id = ctx.user_id, id, "journal_delete");
        Ok(json!({
            "success": true,
            "deleted_journal": {
                "id": entry.id,
                "content_preview": preview(&entry.content),
                "created_at": entry.created_at.to_rfc3339(),
            },
            "message": format!("Successfully deleted journal entry (ID: {id})"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slo_core::ScopeSet;
    use slo_store::InMemoryStore;

    fn ctx(scopes: ScopeSet) -> ToolContext {
        ToolContext { user_id: 1, scopes }
    }

    #[tokio::test]
    async fn create_then_list() {
        let store = Arc::new(InMemoryStore::new());
        let create = CreateJournalTool::new(store.clone());
        let get = GetJournalsTool::new(store.clone());

        let created = create
            .execute(&ctx(ScopeSet::all()), json!({"content": "Finished problem set 4"}))
            .await
            .unwrap();
        assert!(created["id"].as_i64().is_some());

        let listed = get.execute(&ctx(ScopeSet::all()), json!({"query": "problem"})).await.unwrap();
        assert_eq!(listed["items"].as_array().unwrap().len(), 1);
        assert_eq!(listed["items"][0]["content"], "Finished problem set 4");
    }

    #[tokio::test]
    async fn write_requires_scope() {
        let store = Arc::new(InMemoryStore::new());
        let create = CreateJournalTool::new(store);
        let read_only: ScopeSet = [Scope::JournalsRead].into_iter().collect();
        let err = create
            .execute(&ctx(read_only), json!({"content": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ScopeDenied { ref needed } if needed == "journals:write"));
    }

    #[tokio::test]
    async fn delete_reports_preview_and_missing() {
        let store = Arc::new(InMemoryStore::new());
        let long = "a".repeat(150);
        let entry = JournalStore::create(store.as_ref(), 1, &long).await.unwrap();
        let delete = DeleteJournalTool::new(store);

        let result = delete.execute(&ctx(ScopeSet::all()), json!({"id": entry.id})).await.unwrap();
        assert_eq!(result["success"], true);
        let preview = result["deleted_journal"]["content_preview"].as_str().unwrap();
        assert_eq!(preview.len(), 103);
        assert!(preview.ends_with("..."));

        let again = delete.execute(&ctx(ScopeSet::all()), json!({"id": entry.id})).await.unwrap();
        assert!(again["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn blank_content_is_validation_error() {
        let store = Arc::new(InMemoryStore::new());
        let create = CreateJournalTool::new(store);
        let result = create.execute(&ctx(ScopeSet::all()), json!({"content": "   "})).await.unwrap();
        assert!(result["error"].as_str().unwrap().starts_with("invalid_arguments"));
    }
}
