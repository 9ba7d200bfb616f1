//! Task tools: list, create and update the user's study tasks.

use crate::args::{clamp_limit, datetime_patch, invalid, opt_datetime, opt_str, text_patch, to_json, truncate_chars};
use async_trait::async_trait;
use serde_json::{Value, json};
use slo_core::error::ToolError;
use slo_core::store::{NewTask, Patch, TaskPatch, TaskPriority, TaskQuery, TaskStatus, TaskStore};
use slo_core::tool::{Tool, ToolContext};
use slo_core::Scope;
use slo_security::check_scope;
use std::sync::Arc;

const TITLE_MAX_CHARS: usize = 200;

fn parse_status(args: &Value) -> Option<TaskStatus> {
    opt_str(args, "status").and_then(|s| s.parse().ok())
}

fn parse_priority(args: &Value) -> Option<TaskPriority> {
    opt_str(args, "priority").and_then(|s| s.parse().ok())
}

pub struct ListTasksTool {
    tasks: Arc<dyn TaskStore>,
}

impl ListTasksTool {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for ListTasksTool {
    fn name(&self) -> &str {
        "list_tasks"
    }

    fn description(&self) -> &str {
        "List tasks with optional filters."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "status": { "type": "string", "enum": ["todo", "in_progress", "done"] },
                "q": { "type": "string", "description": "Text to search in title or description" },
                "due_before": { "type": "string", "description": "ISO timestamp" },
                "due_after": { "type": "string", "description": "ISO timestamp" },
                "limit": { "type": "integer", "description": "1-50, default 20" }
            },
            "required": []
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::TasksRead)?;

        let query = TaskQuery {
            status: parse_status(&arguments),
            text: opt_str(&arguments, "q").map(str::to_string),
            due_before: opt_datetime(&arguments, "due_before"),
            due_after: opt_datetime(&arguments, "due_after"),
            limit: clamp_limit(&arguments, "limit", 20, 50),
        };
        let tasks = self.tasks.list(ctx.user_id, &query).await?;
        Ok(json!({ "items": to_json(self.name(), &tasks)? }))
    }
}

pub struct CreateTaskTool {
    tasks: Arc<dyn TaskStore>,
}

impl CreateTaskTool {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for CreateTaskTool {
    fn name(&self) -> &str {
        "create_task"
    }

    fn description(&self) -> &str {
        "Create a new task."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "description": { "type": "string" },
                "priority": { "type": "string", "enum": ["low", "medium", "high"] },
                "due_at": { "type": "string", "description": "ISO timestamp" }
            },
            "required": ["title"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::TasksWrite)?;

        let Some(title) = opt_str(&arguments, "title") else {
            return Ok(invalid("title must not be empty"));
        };
        let task = NewTask {
            title: truncate_chars(title, TITLE_MAX_CHARS),
            description: opt_str(&arguments, "description").map(str::to_string),
            priority: parse_priority(&arguments).unwrap_or(TaskPriority::Medium),
            due_at: opt_datetime(&arguments, "due_at"),
            source: "agent".into(),
        };
        let created = self.tasks.create(ctx.user_id, task).await?;
        tracing::info!(user_id = ctx.user_id, id = created.id, "task_create");
        Ok(json!({ "id": created.id }))
    }
}

pub struct UpdateTaskTool {
    tasks: Arc<dyn TaskStore>,
}

impl UpdateTaskTool {
    pub fn new(tasks: Arc<dyn TaskStore>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Tool for UpdateTaskTool {
    fn name(&self) -> &str {
        "update_task"
    }

    fn description(&self) -> &str {
        "Update fields on an existing task."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "id": { "type": "integer" },
                "title": { "type": "string" },
                "description": { "type": ["string", "null"] },
                "priority": { "type": "string", "enum": ["low", "medium", "high"] },
                "status": { "type": "string", "enum": ["todo", "in_progress", "done"] },
                "due_at": { "type": ["string", "null"], "description": "ISO timestamp, or null to clear" }
            },
            "required": ["id"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::TasksWrite)?;

        let Some(id) = arguments["id"].as_i64() else {
            return Ok(invalid("id must be an integer"));
        };
        let patch = TaskPatch {
            title: opt_str(&arguments, "title")
                .map_or(Patch::Keep, |t| Patch::Set(truncate_chars(t, TITLE_MAX_CHARS))),
            description: text_patch(&arguments, "description"),
            priority: parse_priority(&arguments).map_or(Patch::Keep, Patch::Set),
            status: parse_status(&arguments).map_or(Patch::Keep, Patch::Set),
            due_at: datetime_patch(&arguments, "due_at"),
        };

        match self.tasks.update(ctx.user_id, id, patch).await? {
            Some(task) => {
                tracing::info!(user_id = ctx.user_id, id, status = task.status.as_str(), "task_update");
                Ok(json!({ "id": task.id, "status": task.status.as_str() }))
            }
            None => Ok(json!({ "error": "not_found" })),
        }
    }
}
