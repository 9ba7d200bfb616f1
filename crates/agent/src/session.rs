//! Chat sessions that persist agent turns to history.

use crate::loop_runner::{AgentLoop, TurnRequest, TurnResponse};
use slo_core::message::Role;
use slo_core::store::{HistoryStore, ThreadId, UserId};
use std::sync::Arc;
use tracing::warn;

/// Title of the thread every agent conversation is kept in.
pub const AGENT_THREAD_TITLE: &str = "Agent Conversations";

/// Runs turns inside the user's agent thread and records them.
///
/// History is read before the new user message is stored, so a turn never
/// sees its own request twice. Storage failures are logged and never fail
/// the turn.
pub struct ChatService {
    agent: Arc<AgentLoop>,
    history: Arc<dyn HistoryStore>,
    history_enabled: bool,
}

impl ChatService {
    pub fn new(agent: Arc<AgentLoop>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            agent,
            history,
            history_enabled: true,
        }
    }

    /// Stop recording turns. Recent history is still read.
    pub fn with_history_enabled(mut self, enabled: bool) -> Self {
        self.history_enabled = enabled;
        self
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }

    /// Send one message as `user_id` and return the agent's reply.
    pub async fn send(&self, user_id: UserId, text: &str, confirm_writes: bool) -> TurnResponse {
        let text = text.trim();
        let thread_id = match self.history.thread_for(user_id, AGENT_THREAD_TITLE).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(user_id, error = %e, "Could not open agent thread");
                None
            }
        };

        let mut request = TurnRequest::new(user_id, text).with_confirm_writes(confirm_writes);
        if let Some(id) = thread_id {
            request = request.with_thread(id);
        }
        let response = self.agent.run(request).await;

        if let (true, Some(thread_id)) = (self.history_enabled, thread_id) {
            if !text.is_empty() {
                self.record(thread_id, user_id, text, &response).await;
            }
        }
        response
    }

    async fn record(&self, thread_id: ThreadId, user_id: UserId, text: &str, response: &TurnResponse) {
        if let Err(e) = self.history.append(thread_id, user_id, Role::User, text, None).await {
            warn!(user_id, thread_id, error = %e, "Failed to save user message");
        }
        let trace = (!response.tool_calls.is_empty()).then_some(response.tool_calls.as_slice());
        if let Err(e) = self
            .history
            .append(thread_id, user_id, Role::Assistant, &response.text, trace)
            .await
        {
            warn!(user_id, thread_id, error = %e, "Failed to save assistant message");
        }
    }
}
