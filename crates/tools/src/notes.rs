//! Notion-synced notes.

use crate::args::{clamp_limit, invalid, opt_str};
use async_trait::async_trait;
use serde_json::{Value, json};
use slo_core::error::ToolError;
use slo_core::store::NoteStore;
use slo_core::tool::{Tool, ToolContext};
use slo_core::Scope;
use slo_security::check_scope;
use std::sync::Arc;

pub struct ListNotesTool {
    notes: Arc<dyn NoteStore>,
}

impl ListNotesTool {
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl Tool for ListNotesTool {
    fn name(&self) -> &str {
        "list_notes"
    }

    fn description(&self) -> &str {
        "Search and list Notion notes/pages synced from the user's Notion workspace. Use this when \
         user mentions 'notes', 'Notion', or wants to find documents. NOT for journal entries."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "q": { "type": "string", "description": "Text to search in title or content" },
                "limit": { "type": "integer", "description": "1-20, default 10" }
            },
            "required": []
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::NotesRead)?;

        let limit = clamp_limit(&arguments, "limit", 10, 20);
        let notes = self
            .notes
            .search(ctx.user_id, opt_str(&arguments, "q"), limit)
            .await?;
        let items: Vec<Value> = notes
            .iter()
            .map(|n| {
                json!({
                    "page_id": n.page_id,
                    "title": n.title,
                    "url": n.url,
                    "content": n.content,
                    "last_edited_time": n.last_edited_time.map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        Ok(json!({ "items": items }))
    }
}

pub struct DeleteNoteTool {
    notes: Arc<dyn NoteStore>,
}

impl DeleteNoteTool {
    pub fn new(notes: Arc<dyn NoteStore>) -> Self {
        Self { notes }
    }
}

#[async_trait]
impl Tool for DeleteNoteTool {
    fn name(&self) -> &str {
        "delete_note"
    }

    fn description(&self) -> &str {
        "Delete (archive) a Notion note by page ID. Use this when user confirms deletion of a Notion note."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "page_id": { "type": "string", "description": "Notion page ID to delete" }
            },
            "required": ["page_id"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::NotesWrite)?;

        let Some(page_id) = opt_str(&arguments, "page_id") else {
            return Ok(invalid("page_id must not be empty"));
        };
        if !self.notes.is_connected(ctx.user_id).await? {
            return Ok(json!({ "error": "Not connected to Notion" }));
        }
        let Some(note) = self.notes.delete(ctx.user_id, page_id).await? else {
            return Ok(json!({ "error": "Note not found or access denied" }));
        };

        tracing::info!(user_id = ctx.user_id, page_id, "note_delete");
        Ok(json!({
            "success": true,
            "message": format!("Note '{}' deleted successfully", note.title),
            "page_id": note.page_id,
            "title": note.title,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slo_core::store::Note;
    use slo_core::ScopeSet;
    use slo_store::InMemoryStore;

    fn ctx() -> ToolContext {
        ToolContext { user_id: 3, scopes: ScopeSet::all() }
    }

    fn note(page_id: &str, title: &str) -> Note {
        Note {
            page_id: page_id.into(),
            user_id: 3,
            title: title.into(),
            url: None,
            content: Some("Krebs cycle summary".into()),
            last_edited_time: None,
        }
    }

    #[tokio::test]
    async fn delete_requires_connection() {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_note(note("p1", "Biology")).await;
        let delete = DeleteNoteTool::new(store);
        let result = delete.execute(&ctx(), json!({"page_id": "p1"})).await.unwrap();
        assert_eq!(result["error"], "Not connected to Notion");
    }

    #[tokio::test]
    async fn delete_connected_note() {
        let store = Arc::new(InMemoryStore::new());
        store.connect_notes(3).await;
        store.upsert_note(note("p1", "Biology")).await;
        let delete = DeleteNoteTool::new(store.clone());

        let result = delete.execute(&ctx(), json!({"page_id": "p1"})).await.unwrap();
        assert_eq!(result["message"], "Note 'Biology' deleted successfully");

        let missing = delete.execute(&ctx(), json!({"page_id": "p1"})).await.unwrap();
        assert_eq!(missing["error"], "Note not found or access denied");
    }

    #[tokio::test]
    async fn list_searches_content() {
        let store = Arc::new(InMemoryStore::new());
        store.upsert_note(note("p1", "Biology")).await;
        store.upsert_note(Note { content: None, ..note("p2", "History") }).await;
        let list = ListNotesTool::new(store);

        let result = list.execute(&ctx(), json!({"q": "krebs"})).await.unwrap();
        let items = result["items"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["page_id"], "p1");
    }

    #[tokio::test]
    async fn list_needs_read_scope() {
        let store = Arc::new(InMemoryStore::new());
        let list = ListNotesTool::new(store);
        let scopes: ScopeSet = [Scope::TasksRead].into_iter().collect();
        let err = list
            .execute(&ToolContext { user_id: 3, scopes }, json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "scope_denied:notes:read");
    }
}
