//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what let the agent act on the user's data: list journals,
//! create tasks, move calendar events, and so on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::scope::ScopeSet;
use crate::store::UserId;

/// Who a tool runs for, and with which scopes.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub user_id: UserId,
    pub scopes: ScopeSet,
}

/// The core Tool trait.
///
/// `execute` must not fail for validation problems; it returns an
/// `{"error": ...}` mapping instead. `Err` is reserved for scope denial and
/// infrastructure failures, which the agent loop translates for the user.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "create_task").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input object.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether this tool mutates user data. Drives the write quota.
    fn is_write(&self) -> bool {
        false
    }

    /// Execute the tool with already-validated arguments.
    async fn execute(
        &self,
        ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.parameters_schema(),
        }
    }
}

/// One executed tool invocation within a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub name: String,
    pub input: serde_json::Value,
    #[serde(flatten)]
    pub outcome: ToolCallOutcome,
}

/// Exactly one of `result` or `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallOutcome {
    Result(serde_json::Value),
    Error(String),
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the model
/// 2. Classify a requested tool as read or write
/// 3. Validate arguments and execute tools when the model requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        if !self.tools.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Whether the named tool is classified as a write.
    pub fn is_write(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.is_write())
    }

    /// Tool definitions in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.to_definition())
            .collect()
    }

    /// Validate arguments against the tool's schema, then execute it.
    ///
    /// Schema violations come back as an `{"error": "invalid_arguments: ..."}`
    /// result, never as an `Err`.
    pub async fn execute(
        &self,
        name: &str,
        ctx: &ToolContext,
        arguments: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        let arguments = match arguments {
            serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
            other => other,
        };
        if let Err(reason) = validate_arguments(&tool.parameters_schema(), &arguments) {
            return Ok(serde_json::json!({ "error": format!("invalid_arguments: {reason}") }));
        }
        tool.execute(ctx, arguments).await
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Check an argument object against a flat JSON object schema.
///
/// Supports what tool schemas here declare: `required`, and a `type` and
/// optional `enum` per property. Unknown properties are rejected. `null` is accepted for optional
/// properties.
pub fn validate_arguments(schema: &serde_json::Value, arguments: &serde_json::Value) -> Result<(), String> {
    let args = arguments
        .as_object()
        .ok_or_else(|| "arguments must be a JSON object".to_string())?;
    let properties = schema["properties"].as_object();

    if let Some(required) = schema["required"].as_array() {
        for key in required.iter().filter_map(|k| k.as_str()) {
            if args.get(key).is_none_or(|v| v.is_null()) {
                return Err(format!("missing required argument '{key}'"));
            }
        }
    }

    for (key, value) in args {
        let Some(property) = properties.and_then(|p| p.get(key)) else {
            return Err(format!("unexpected argument '{key}'"));
        };
        if value.is_null() {
            continue;
        }
        let expected = property["type"].as_str().unwrap_or("");
        let ok = match expected {
            "string" => value.is_string(),
            "integer" => value.is_i64() || value.is_u64(),
            "number" => value.is_number(),
            "boolean" => value.is_boolean(),
            "object" => value.is_object(),
            "array" => value.is_array(),
            _ => true,
        };
        if !ok {
            return Err(format!("argument '{key}' must be of type {expected}"));
        }
        if let Some(allowed) = property["enum"].as_array() {
            if !allowed.contains(value) {
                let names: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
                return Err(format!("argument '{key}' must be one of {}", names.join(", ")));
            }
        }
    }
    Ok(())
}
