//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks, order
//!   preserved in both directions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slo_core::error::ProviderError;
use slo_core::message::{ContentBlock, ConversationTurn, TurnContent};
use slo_core::provider::*;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            client: build_client(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Build from the `[provider]` config section.
    pub fn from_config(config: &slo_config::ProviderConfig) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            client: build_client(config.timeout_secs),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert turns to Anthropic API messages.
    fn to_api_messages(turns: &[ConversationTurn]) -> Vec<AnthropicMessage<'_>> {
        turns
            .iter()
            .map(|turn| AnthropicMessage {
                role: turn.role.as_str(),
                content: &turn.content,
            })
            .collect()
    }

    fn response_to_provider_response(resp: AnthropicResponse) -> ProviderResponse {
        let content = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(ContentBlock::Text { text }),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    Some(ContentBlock::ToolUse { id, name, input })
                }
                ResponseContentBlock::Other => None,
            })
            .collect();

        ProviderResponse {
            id: resp.id,
            model: resp.model,
            content,
            usage: resp.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
            stop_reason: resp.stop_reason,
        }
    }
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

fn map_send_error(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string())
    } else {
        ProviderError::Network(format!("connection error: {e}"))
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    /// Keys that do not look like Anthropic secret keys are treated as absent.
    fn has_credentials(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| k.starts_with("sk-"))
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if key.starts_with("sk-") => key,
            _ => return Err(ProviderError::NotConfigured("anthropic_key_missing".into())),
        };

        let url = format!("{}/v1/messages", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "system": request.system,
            "messages": Self::to_api_messages(&request.messages),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(request.tools);
        }

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "unauthorized: invalid Anthropic API key".into(),
            ));
        }
        if !(200..300).contains(&status) {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_resp: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ApiError {
                status_code: status,
                message: format!("Failed to parse Anthropic response: {e}"),
            })?;

        Ok(Self::response_to_provider_response(api_resp))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a TurnContent,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    content: Vec<ResponseContentBlock>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Thinking and any future block types are dropped.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
