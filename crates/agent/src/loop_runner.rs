//! The agent turn loop.
//!
//! One turn runs as a bounded state machine:
//!
//! 1. **Preconditions**: the provider must hold a credential and the user
//!    must be inside their rate limit. Failing either rejects the turn.
//! 2. **Grounding**: build the context pack and resolve short confirm/deny
//!    replies against recent history.
//! 3. **Loop** (at most `max_tool_calls` model calls): the first `tool_use`
//!    block in a response is dispatched through the write quota and the
//!    registry, and its result is fed back; a response without one ends the
//!    turn with its text.
//! 4. **Exhaustion**: running out of steps ends the turn with a fixed notice.
//!
//! Only the two preconditions reject a turn. Every tool failure becomes a
//! tool result the model can react to.

use crate::context_pack::ContextPackBuilder;
use crate::conversation::{classify_intent, extract_pending_action, PendingAction};
use crate::prompt::{augmented_instruction, user_message, SYSTEM_PROMPT};
use serde::Serialize;
use serde_json::{json, Value};
use slo_config::AppConfig;
use slo_core::error::ToolError;
use slo_core::message::{ContentBlock, ConversationTurn, Role};
use slo_core::policy::AgentPolicy;
use slo_core::provider::{Provider, ProviderRequest};
use slo_core::store::{DataStores, HistoryStore, ThreadId, UserId};
use slo_core::tool::{ToolCallOutcome, ToolCallRecord, ToolContext, ToolRegistry};
use slo_security::{agent_rate_key, AuditLogger, FullAccess, RateLimiter, ScopeResolver};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Text returned when a turn runs out of steps.
pub const LOOP_EXHAUSTED_TEXT: &str = "Tool loop ended (max steps reached).";

/// Suggestion attached to every categorised tool failure.
pub const FAILURE_SUGGESTION: &str =
    "The operation couldn't be completed. You may need to check your settings or try again later.";

/// Synthetic tool-result error codes injected by the loop.
pub mod codes {
    pub const UNKNOWN_TOOL: &str = "unknown_tool";
    pub const WRITE_LIMIT_EXCEEDED: &str = "write_limit_exceeded";
    pub const CONFIRMATION_REQUIRED: &str = "confirmation_required";
}

/// One user request to the agent.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: UserId,
    pub user_text: String,
    /// Ask the user before writes beyond the confirmation threshold.
    pub confirm_writes: bool,
    /// Thread whose recent turns ground this one.
    pub thread_id: Option<ThreadId>,
}

impl TurnRequest {
    pub fn new(user_id: UserId, user_text: impl Into<String>) -> Self {
        Self {
            user_id,
            user_text: user_text.into(),
            confirm_writes: true,
            thread_id: None,
        }
    }

    pub fn with_thread(mut self, thread_id: ThreadId) -> Self {
        self.thread_id = Some(thread_id);
        self
    }

    pub fn with_confirm_writes(mut self, confirm_writes: bool) -> Self {
        self.confirm_writes = confirm_writes;
        self
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model answered with text.
    Final,
    /// The step bound was reached.
    LoopExhausted,
    /// The model could not be reached mid-turn.
    ModelUnavailable,
    /// A precondition failed before the loop started.
    Rejected,
}

/// What the caller gets back. Always well-formed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnResponse {
    #[serde(skip)]
    pub status: TurnStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub text: String,
    pub tool_calls: Vec<ToolCallRecord>,
}

impl TurnResponse {
    fn finished(status: TurnStatus, text: impl Into<String>, tool_calls: Vec<ToolCallRecord>) -> Self {
        Self {
            status,
            error: None,
            text: text.into(),
            tool_calls,
        }
    }

    /// A turn rejected before the loop started.
    pub fn rejected(err: &TurnError) -> Self {
        Self {
            status: TurnStatus::Rejected,
            error: Some(err.code().to_string()),
            text: err.user_message().to_string(),
            tool_calls: Vec::new(),
        }
    }
}

/// Reasons a turn is rejected outright.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error("language model credential missing or invalid")]
    CredentialMissing,

    #[error("rate limit exceeded for {key}")]
    RateLimited { key: String },

    #[error("message required")]
    EmptyMessage,
}

impl TurnError {
    /// Stable error code for callers.
    pub fn code(&self) -> &'static str {
        match self {
            TurnError::CredentialMissing => "anthropic_key_missing",
            TurnError::RateLimited { .. } => "rate_limited",
            TurnError::EmptyMessage => "message_required",
        }
    }

    /// Text safe to show the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            TurnError::CredentialMissing => {
                "❌ ANTHROPIC_API_KEY environment variable not set or invalid. Please configure your Claude API key to use the agent."
            }
            TurnError::RateLimited { .. } => {
                "You're sending requests too quickly. Please wait a moment and try again."
            }
            TurnError::EmptyMessage => "Please enter a message.",
        }
    }
}

/// Map a tool failure to the message the model (and so the user) sees.
///
/// Raw failure text stays in logs and the audit trail.
pub fn categorize_failure(err: &ToolError) -> &'static str {
    if matches!(err, ToolError::ScopeDenied { .. }) {
        return "Access denied. Please check your account permissions.";
    }
    let raw = err.to_string();
    let lower = raw.to_lowercase();
    if raw.contains("No valid Outlook token") {
        "Calendar access not configured. Please connect your Outlook account in settings."
    } else if lower.contains("rate limit") {
        "Service temporarily busy. Please try again in a moment."
    } else if lower.contains("connection") || lower.contains("timeout") {
        "Service temporarily unavailable. Please try again later."
    } else if lower.contains("permission") || lower.contains("unauthorized") {
        "Access denied. Please check your account permissions."
    } else {
        "The operation couldn't be completed."
    }
}

/// Shape stored history into a user-first, strictly alternating sequence
/// ending with an assistant turn, ready for the new user message.
///
/// Empty turns are dropped. Of two consecutive turns with the same role the
/// later one is kept.
fn alternating_turns(turns: Vec<ConversationTurn>) -> Vec<ConversationTurn> {
    let mut out: Vec<ConversationTurn> = Vec::with_capacity(turns.len());
    for turn in turns {
        if turn.text().trim().is_empty() {
            continue;
        }
        match out.last() {
            None if turn.role == Role::Assistant => continue,
            Some(prev) if prev.role == turn.role => {
                out.pop();
            }
            _ => {}
        }
        out.push(turn);
    }
    if out.last().is_some_and(|t| t.role == Role::User) {
        out.pop();
    }
    out
}

/// The agent loop: model calls, guarded tool dispatch, and grounding.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    context: ContextPackBuilder,
    model: String,
    temperature: f32,
    max_tokens: u32,
    policy: AgentPolicy,
    rate_limiter: Arc<RateLimiter>,
    rate_max_calls: usize,
    rate_window: Duration,
    audit: Arc<AuditLogger>,
    scopes: Arc<dyn ScopeResolver>,
    history: Option<Arc<dyn HistoryStore>>,
    history_limit: usize,
}

impl AgentLoop {
    /// Create a loop with default settings.
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, stores: DataStores) -> Self {
        let defaults = AppConfig::default();
        Self {
            provider,
            tools,
            context: ContextPackBuilder::new(stores),
            model: defaults.provider.model,
            temperature: defaults.provider.temperature,
            max_tokens: defaults.provider.max_tokens,
            policy: defaults.agent,
            rate_limiter: Arc::new(RateLimiter::new()),
            rate_max_calls: defaults.rate_limit.max_calls,
            rate_window: defaults.rate_limit.window(),
            audit: Arc::new(AuditLogger::new()),
            scopes: Arc::new(FullAccess),
            history: None,
            history_limit: defaults.history.limit,
        }
    }

    /// Apply model, policy, rate limit and history settings from config.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.model = config.provider.model.clone();
        self.temperature = config.provider.temperature;
        self.max_tokens = config.provider.max_tokens;
        self.policy = config.agent;
        self.rate_max_calls = config.rate_limit.max_calls;
        self.rate_window = config.rate_limit.window();
        self.history_limit = config.history.limit;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_policy(mut self, policy: AgentPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share a rate limiter across loops.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }

    pub fn with_rate_limit(mut self, max_calls: usize, window: Duration) -> Self {
        self.rate_max_calls = max_calls;
        self.rate_window = window;
        self
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_scope_resolver(mut self, scopes: Arc<dyn ScopeResolver>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Ground turns that name a thread in that thread's recent turns.
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>, limit: usize) -> Self {
        self.history = Some(history);
        self.history_limit = limit;
        self
    }

    pub fn policy(&self) -> &AgentPolicy {
        &self.policy
    }

    pub fn audit(&self) -> &Arc<AuditLogger> {
        &self.audit
    }

    /// Run a turn, folding precondition failures into the response.
    pub async fn run(&self, request: TurnRequest) -> TurnResponse {
        match self.try_run(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(error = %err, "Turn rejected");
                TurnResponse::rejected(&err)
            }
        }
    }

    /// Run a turn. `Err` only for the preconditions.
    pub async fn try_run(&self, request: TurnRequest) -> Result<TurnResponse, TurnError> {
        if !self.provider.has_credentials() {
            return Err(TurnError::CredentialMissing);
        }
        if request.user_text.trim().is_empty() {
            return Err(TurnError::EmptyMessage);
        }

        let key = agent_rate_key(request.user_id);
        self.rate_limiter
            .check(&key, self.rate_max_calls, self.rate_window)
            .map_err(|_| TurnError::RateLimited { key })?;

        let ctx = ToolContext {
            user_id: request.user_id,
            scopes: self.scopes.resolve(request.user_id),
        };

        let history = self.load_history(&request).await;
        let pack = self.context.build(request.user_id, true).await;
        let intent = classify_intent(&request.user_text);
        let pending = if history.is_empty() {
            PendingAction::none()
        } else {
            extract_pending_action(&history)
        };
        let instruction = augmented_instruction(intent, &pending);
        if !instruction.is_empty() {
            info!(user_id = request.user_id, ?intent, action = ?pending.action, "Resolved pending action");
        }

        let mut messages = history;
        messages.push(ConversationTurn::user(user_message(
            &pack.to_json(),
            &request.user_text,
            request.confirm_writes,
            &instruction,
        )));

        Ok(self.drive(&ctx, request.confirm_writes, messages).await)
    }

    async fn load_history(&self, request: &TurnRequest) -> Vec<ConversationTurn> {
        let (Some(store), Some(thread_id)) = (&self.history, request.thread_id) else {
            return Vec::new();
        };
        match store.fetch_recent(request.user_id, thread_id, self.history_limit).await {
            Ok(turns) => alternating_turns(turns),
            Err(e) => {
                warn!(user_id = request.user_id, thread_id, error = %e, "History fetch failed");
                Vec::new()
            }
        }
    }

    async fn drive(&self, ctx: &ToolContext, confirm_writes: bool, mut messages: Vec<ConversationTurn>) -> TurnResponse {
        let definitions = self.tools.definitions();
        let mut trace: Vec<ToolCallRecord> = Vec::new();
        let mut writes: u32 = 0;

        for step in 1..=self.policy.max_tool_calls {
            debug!(user_id = ctx.user_id, step, "Agent loop iteration");

            let request = ProviderRequest {
                model: self.model.clone(),
                system: SYSTEM_PROMPT.to_string(),
                messages: messages.clone(),
                tools: definitions.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            };
            let response = match self.provider.complete(request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!(user_id = ctx.user_id, step, error = %e, "Model call failed");
                    return TurnResponse {
                        status: TurnStatus::ModelUnavailable,
                        error: Some("model_unavailable".into()),
                        text: "The assistant is temporarily unavailable. Please try again later.".into(),
                        tool_calls: trace,
                    };
                }
            };

            let mut final_text: Vec<String> = Vec::new();
            let mut tool_use = None;
            for block in response.content {
                match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_use = Some((id, name, input));
                        break;
                    }
                    ContentBlock::Text { text } => final_text.push(text),
                    ContentBlock::ToolResult { .. } => {}
                }
            }

            let Some((id, name, input)) = tool_use else {
                info!(user_id = ctx.user_id, steps = step, tool_calls = trace.len(), "Turn complete");
                return TurnResponse::finished(TurnStatus::Final, final_text.join("\n"), trace);
            };

            messages.push(ConversationTurn::tool_use(&id, &name, input.clone()));

            if !self.tools.contains(&name) {
                warn!(tool = %name, "Model requested unknown tool");
                self.reject(ctx, &mut messages, &id, &name, &input, codes::UNKNOWN_TOOL);
                continue;
            }

            if self.tools.is_write(&name) {
                writes += 1;
                if writes > self.policy.max_writes_per_turn {
                    self.reject(ctx, &mut messages, &id, &name, &input, codes::WRITE_LIMIT_EXCEEDED);
                    continue;
                }
                if confirm_writes && writes > self.policy.require_confirm_threshold {
                    self.reject(ctx, &mut messages, &id, &name, &input, codes::CONFIRMATION_REQUIRED);
                    continue;
                }
            }

            let record = self.dispatch(ctx, &name, input).await;
            let payload = match &record.outcome {
                ToolCallOutcome::Result(result) => result.clone(),
                ToolCallOutcome::Error(message) => json!({
                    "error": message,
                    "tool_name": name,
                    "suggestion": FAILURE_SUGGESTION,
                }),
            };
            messages.push(ConversationTurn::tool_result(&id, &payload));
            trace.push(record);
        }

        warn!(
            user_id = ctx.user_id,
            steps = self.policy.max_tool_calls,
            "Max tool iterations reached"
        );
        TurnResponse::finished(TurnStatus::LoopExhausted, LOOP_EXHAUSTED_TEXT, trace)
    }

    /// Execute one tool and audit the attempt.
    async fn dispatch(&self, ctx: &ToolContext, name: &str, input: Value) -> ToolCallRecord {
        let started = std::time::Instant::now();
        let result = self.tools.execute(name, ctx, input.clone()).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match result {
            Ok(value) => {
                debug!(tool = name, duration_ms, "Tool executed");
                self.audit.record_audit(ctx.user_id, name, &input, Some(&value), None);
                ToolCallOutcome::Result(value)
            }
            Err(e) => {
                let message = categorize_failure(&e);
                warn!(tool = name, duration_ms, error = %e, "Tool execution failed");
                self.audit.record_audit(ctx.user_id, name, &input, None, Some(&e.to_string()));
                ToolCallOutcome::Error(message.to_string())
            }
        };

        ToolCallRecord {
            name: name.to_string(),
            input,
            outcome,
        }
    }

    /// Answer a tool_use with a synthetic error without executing it.
    fn reject(
        &self,
        ctx: &ToolContext,
        messages: &mut Vec<ConversationTurn>,
        id: &str,
        name: &str,
        input: &Value,
        code: &str,
    ) {
        debug!(tool = name, code, "Tool call rejected by loop");
        self.audit.record_audit(ctx.user_id, name, input, None, Some(code));
        messages.push(ConversationTurn::tool_result(id, &json!({ "error": code })));
    }
}
