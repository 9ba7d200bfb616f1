//! Calendar tools backed by the user's linked Outlook calendar.
//!
//! An unlinked account surfaces as [`StoreError::NotConnected`]. Listing and
//! deleting turn that into a friendly result; creating and updating let it
//! propagate so the agent loop can categorise it. Other backend failures
//! always propagate.

use crate::args::{clamp_limit, invalid, opt_datetime, opt_str, to_json, truncate_chars};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use slo_core::error::{StoreError, ToolError};
use slo_core::store::{CalendarService, EventPatch, NewEvent, Patch};
use slo_core::tool::{Tool, ToolContext};
use slo_core::Scope;
use slo_security::check_scope;
use std::sync::Arc;

const SUBJECT_MAX_CHARS: usize = 120;
const MAX_RANGE_DAYS: i64 = 90;

pub struct CalendarListTool {
    calendar: Arc<dyn CalendarService>,
}

impl CalendarListTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarListTool {
    fn name(&self) -> &str {
        "calendar_list"
    }

    fn description(&self) -> &str {
        "List calendar events for next N days. Returns empty list with helpful message if calendar not connected."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "range_days": { "type": "integer", "description": "Number of days to look ahead (default: 7)" }
            },
            "required": []
        })
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::CalendarRead)?;

        let days = clamp_limit(&arguments, "range_days", 7, MAX_RANGE_DAYS) as i64;
        let now = Utc::now();
        match self.calendar.list_events(ctx.user_id, now, now + Duration::days(days)).await {
            Ok(events) => Ok(json!({ "items": to_json(self.name(), &events)? })),
            Err(StoreError::NotConnected(_)) => Ok(json!({
                "items": [],
                "message": "Calendar access not configured. Please connect your Outlook account to view calendar events.",
            })),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct CalendarCreateTool {
    calendar: Arc<dyn CalendarService>,
}

impl CalendarCreateTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarCreateTool {
    fn name(&self) -> &str {
        "calendar_create_event"
    }

    fn description(&self) -> &str {
        "Create a new calendar event. Requires Outlook calendar connection."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "subject": { "type": "string", "description": "Event title/subject" },
                "start_iso": { "type": "string", "description": "Start time in ISO format" },
                "end_iso": { "type": "string", "description": "End time in ISO format" },
                "body": { "type": "string", "description": "Event description (optional)" }
            },
            "required": ["subject", "start_iso", "end_iso"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::CalendarWrite)?;

        let Some(subject) = opt_str(&arguments, "subject") else {
            return Ok(invalid("subject must not be empty"));
        };
        let (Some(start), Some(end)) = (
            opt_datetime(&arguments, "start_iso"),
            opt_datetime(&arguments, "end_iso"),
        ) else {
            return Ok(invalid("start_iso and end_iso must be ISO timestamps"));
        };
        if end < start {
            return Ok(invalid("end_iso is before start_iso"));
        }

        let event = self
            .calendar
            .create_event(
                ctx.user_id,
                NewEvent {
                    subject: truncate_chars(subject, SUBJECT_MAX_CHARS),
                    start,
                    end,
                    body: opt_str(&arguments, "body").map(str::to_string),
                },
            )
            .await?;
        tracing::info!(user_id = ctx.user_id, event_id = %event.id, "calendar_create");
        Ok(json!({ "event_id": event.id }))
    }
}

pub struct CalendarUpdateTool {
    calendar: Arc<dyn CalendarService>,
}

impl CalendarUpdateTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarUpdateTool {
    fn name(&self) -> &str {
        "calendar_update_event"
    }

    fn description(&self) -> &str {
        "Update an existing calendar event. Requires event ID and Outlook connection."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": { "type": "string", "description": "Unique event identifier" },
                "subject": { "type": "string", "description": "New event title" },
                "start_iso": { "type": "string", "description": "New start time" },
                "end_iso": { "type": "string", "description": "New end time" },
                "body": { "type": "string", "description": "New event description" }
            },
            "required": ["event_id"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::CalendarWrite)?;

        let Some(event_id) = opt_str(&arguments, "event_id") else {
            return Ok(invalid("event_id must not be empty"));
        };
        let patch = EventPatch {
            subject: opt_str(&arguments, "subject")
                .map_or(Patch::Keep, |s| Patch::Set(truncate_chars(s, SUBJECT_MAX_CHARS))),
            start: opt_datetime(&arguments, "start_iso").map_or(Patch::Keep, Patch::Set),
            end: opt_datetime(&arguments, "end_iso").map_or(Patch::Keep, Patch::Set),
            // An explicit empty body clears the description.
            body: arguments["body"]
                .as_str()
                .map_or(Patch::Keep, |b| Patch::Set(b.to_string())),
        };

        match self.calendar.update_event(ctx.user_id, event_id, patch).await {
            Ok(event) => Ok(json!({ "event_id": event.id })),
            Err(StoreError::NotFound(msg)) => Ok(json!({ "error": msg })),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct CalendarDeleteTool {
    calendar: Arc<dyn CalendarService>,
}

impl CalendarDeleteTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl Tool for CalendarDeleteTool {
    fn name(&self) -> &str {
        "calendar_delete_event"
    }

    fn description(&self) -> &str {
        "Delete a calendar event by ID. Provides helpful error messages if event not found."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "event_id": { "type": "string", "description": "Unique event identifier to delete" }
            },
            "required": ["event_id"]
        })
    }

    fn is_write(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ToolContext, arguments: Value) -> Result<Value, ToolError> {
        check_scope(&ctx.scopes, Scope::CalendarWrite)?;

        let Some(event_id) = opt_str(&arguments, "event_id") else {
            return Ok(json!({ "error": "Event ID is required for deletion" }));
        };

        match self.calendar.delete_event(ctx.user_id, event_id).await {
            Ok(()) => {
                tracing::info!(user_id = ctx.user_id, event_id, "calendar_delete");
                Ok(json!({ "event_id": event_id, "deleted": true, "message": "Event successfully deleted" }))
            }
            Err(StoreError::NotConnected(_)) => Ok(json!({
                "error": "Calendar access not configured. Please connect your Outlook account to manage calendar events.",
            })),
            Err(StoreError::NotFound(_)) => Ok(json!({ "error": "Event not found. It may have already been deleted." })),
            Err(e) => Err(e.into()),
        }
    }
}
