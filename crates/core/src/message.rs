//! Conversation turn domain types.
//!
//! A turn is either plain text or an ordered list of content blocks. Blocks
//! mirror the language model's wire format: the assistant emits `tool_use`
//! blocks and the loop answers with `tool_result` blocks that echo the id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user (also carries tool results back to the model)
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// One structured block inside a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        /// JSON-encoded result mapping
        content: String,
    },
}

/// Turn content: raw text or structured blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TurnContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// A single turn in a conversation. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: TurnContent,
    pub created_at: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a plain-text user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Text(text.into()),
            created_at: Utc::now(),
        }
    }

    /// Create a plain-text assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Text(text.into()),
            created_at: Utc::now(),
        }
    }

    /// An assistant turn carrying exactly one `tool_use` block.
    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            role: Role::Assistant,
            content: TurnContent::Blocks(vec![ContentBlock::ToolUse {
                id: id.into(),
                name: name.into(),
                input,
            }]),
            created_at: Utc::now(),
        }
    }

    /// A user turn answering a `tool_use` block.
    pub fn tool_result(tool_use_id: impl Into<String>, payload: &serde_json::Value) -> Self {
        Self {
            role: Role::User,
            content: TurnContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: payload.to_string(),
            }]),
            created_at: Utc::now(),
        }
    }

    /// The human-readable text of this turn.
    ///
    /// Block content contributes only its text blocks, joined by newlines;
    /// tool traffic is skipped.
    pub fn text(&self) -> String {
        match &self.content {
            TurnContent::Text(text) => text.clone(),
            TurnContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_turn_is_plain_text() {
        let turn = ConversationTurn::user("Hello, agent!");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text(), "Hello, agent!");
    }

    #[test]
    fn tool_result_keeps_tool_use_id() {
        let turn = ConversationTurn::tool_result("toolu_1", &serde_json::json!({"id": 3}));
        let json = serde_json::to_value(&turn.content).unwrap();
        assert_eq!(json[0]["type"], "tool_result");
        assert_eq!(json[0]["tool_use_id"], "toolu_1");
        assert_eq!(json[0]["content"], r#"{"id":3}"#);
    }

    #[test]
    fn block_text_skips_tool_traffic() {
        let turn = ConversationTurn {
            role: Role::Assistant,
            content: TurnContent::Blocks(vec![
                ContentBlock::Text { text: "Let me check".into() },
                ContentBlock::ToolUse {
                    id: "t1".into(),
                    name: "list_tasks".into(),
                    input: serde_json::json!({}),
                },
                ContentBlock::Text { text: "done".into() },
            ]),
            created_at: Utc::now(),
        };
        assert_eq!(turn.text(), "Let me check\ndone");
    }

    #[test]
    fn untagged_content_parses_both_shapes() {
        let text: TurnContent = serde_json::from_str(r#""hi""#).unwrap();
        assert_eq!(text, TurnContent::Text("hi".into()));

        let blocks: TurnContent =
            serde_json::from_str(r#"[{"type":"text","text":"hi"}]"#).unwrap();
        assert!(matches!(blocks, TurnContent::Blocks(b) if b.len() == 1));
    }

    #[test]
    fn role_parses_from_storage_strings() {
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
        assert!("system".parse::<Role>().is_err());
    }
}
