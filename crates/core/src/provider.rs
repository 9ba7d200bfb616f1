//! Provider trait: the abstraction over the language model backend.
//!
//! A Provider receives the system instructions, the ordered conversation and
//! the advertised tool schemas, and answers with an ordered list of content
//! blocks (text and/or `tool_use`). Block order is significant: the agent loop
//! dispatches the *first* `tool_use` block only.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::{ContentBlock, ConversationTurn};

/// A single request to the language model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-3-haiku-20240307")
    pub model: String,

    /// System instructions, sent separately from the conversation
    pub system: String,

    /// Ordered conversation turns, oldest first
    pub messages: Vec<ConversationTurn>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

/// A tool definition sent to the model so it knows what it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input object
    pub input_schema: serde_json::Value,
}

/// A complete response from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Provider-assigned response id
    #[serde(default)]
    pub id: String,

    /// Which model actually responded
    #[serde(default)]
    pub model: String,

    /// Ordered content blocks
    pub content: Vec<ContentBlock>,

    /// Token usage statistics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
}

impl ProviderResponse {
    /// A response holding a single text block.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            model: String::new(),
            content: vec![ContentBlock::Text { text: text.into() }],
            usage: None,
            stop_reason: Some("end_turn".into()),
        }
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// The core Provider trait.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// Whether a usable credential is configured. Turns are rejected up front
    /// when this is false.
    fn has_credentials(&self) -> bool {
        true
    }

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_definition_serialization() {
        let tool = ToolDefinition {
            name: "create_task".into(),
            description: "Create a task.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": { "title": { "type": "string" } },
                "required": ["title"]
            }),
        };
        let json = serde_json::to_value(&tool).unwrap();
        assert_eq!(json["name"], "create_task");
        assert_eq!(json["input_schema"]["required"][0], "title");
    }

    #[test]
    fn text_response_helper() {
        let resp = ProviderResponse::text("Hello");
        assert_eq!(resp.content, vec![ContentBlock::Text { text: "Hello".into() }]);
    }
}
