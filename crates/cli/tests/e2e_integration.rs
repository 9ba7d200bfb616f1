//! End-to-end tests: Anthropic wire format, SQLite storage, and the agent
//! loop wired together the way `slo agent` wires them.

use serde_json::{Value, json};
use slo_agent::{AgentLoop, ChatService, TurnStatus};
use slo_core::store::{HistoryStore, TaskQuery, TaskStore};
use slo_core::ToolCallOutcome;
use slo_providers::AnthropicProvider;
use slo_store::{DisconnectedCalendar, SqliteStore, data_stores};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn chat_against(server: &MockServer) -> (ChatService, Arc<SqliteStore>) {
    let store = Arc::new(SqliteStore::new("sqlite::memory:").await.unwrap());
    let stores = data_stores(store.clone(), Arc::new(DisconnectedCalendar));
    let tools = Arc::new(slo_tools::default_registry(&stores));
    let provider =
        Arc::new(AnthropicProvider::new(Some("sk-ant-test".into())).with_base_url(server.uri()));
    let agent = AgentLoop::new(provider, tools, stores).with_history(store.clone(), 10);
    (ChatService::new(Arc::new(agent), store.clone()), store)
}

fn message(content: Value, stop_reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_e2e",
        "model": "claude-3-haiku-20240307",
        "content": content,
        "usage": {"input_tokens": 100, "output_tokens": 20},
        "stop_reason": stop_reason,
    }))
}

#[tokio::test]
async fn tool_turn_persists_task_and_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(message(
            json!([
                {"type": "text", "text": "Let me add that."},
                {"type": "tool_use", "id": "toolu_e2e", "name": "create_task",
                 "input": {"title": "Review lecture notes", "priority": "high"}}
            ]),
            "tool_use",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(message(json!([{"type": "text", "text": "Added 'Review lecture notes'."}]), "end_turn"))
        .mount(&server)
        .await;

    let (chat, store) = chat_against(&server).await;
    let response = chat.send(3, "remind me to review lecture notes", true).await;

    assert_eq!(response.text, "Added 'Review lecture notes'.");
    assert_eq!(response.tool_calls.len(), 1);
    assert!(matches!(response.tool_calls[0].outcome, ToolCallOutcome::Result(_)));

    let tasks = TaskStore::list(store.as_ref(), 3, &TaskQuery { limit: 10, ..Default::default() })
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Review lecture notes");

    // The second model call carries the tool result keyed by the tool_use id.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    let body: Value = serde_json::from_slice(&requests[1].body).unwrap();
    let last = body["messages"].as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["role"], "user");
    assert_eq!(last["content"][0]["type"], "tool_result");
    assert_eq!(last["content"][0]["tool_use_id"], "toolu_e2e");
    assert_eq!(body["tools"].as_array().unwrap().len(), 13);

    let thread = store.thread_for(3, slo_agent::AGENT_THREAD_TITLE).await.unwrap();
    let history = store.fetch_recent(3, thread, 10).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].text(), "remind me to review lecture notes");
    assert_eq!(history[1].text(), "Added 'Review lecture notes'.");
}

#[tokio::test]
async fn provider_auth_failure_ends_turn_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (chat, _store) = chat_against(&server).await;
    let response = chat.send(1, "what's due this week?", true).await;

    assert_eq!(response.status, TurnStatus::ModelUnavailable);
    assert_eq!(response.error.as_deref(), Some("model_unavailable"));
    assert!(response.tool_calls.is_empty());
}

#[tokio::test]
async fn calendar_without_outlook_reports_setup_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(message(
            json!([{"type": "tool_use", "id": "toolu_cal", "name": "calendar_list", "input": {}}]),
            "tool_use",
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(message(json!([{"type": "text", "text": "Connect Outlook first."}]), "end_turn"))
        .mount(&server)
        .await;

    let (chat, _store) = chat_against(&server).await;
    let response = chat.send(1, "what's on my calendar?", true).await;

    assert_eq!(response.status, TurnStatus::Final);
    match &response.tool_calls[0].outcome {
        ToolCallOutcome::Result(value) => {
            assert!(value["message"].as_str().unwrap().contains("Outlook"));
        }
        other => panic!("expected a friendly result, got {other:?}"),
    }
}
