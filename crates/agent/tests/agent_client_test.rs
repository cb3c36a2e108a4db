//! End-to-end behaviour of the agent step loop against scripted providers

use async_trait::async_trait;
use bizreg_agent::{
    remote_handler, ActionDescriptor, AgentAction, AgentError, AgentProvider, AgentType,
    BrowserEnvironment, ClientOptions, Endpoint, ProviderRequest, ProviderTransport, Result,
    TaskExecutionRequest,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Replays canned provider responses and records every request
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<Result<Value>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    async fn send(&self, request: ProviderRequest) -> Result<Value> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"content": []})))
    }
}

fn shared(transport: &Arc<ScriptedTransport>) -> Arc<dyn ProviderTransport> {
    transport.clone()
}

#[derive(Default)]
struct FakeBrowser {
    performed: Mutex<Vec<(AgentAction, Instant)>>,
    fail_actions: bool,
    fail_screenshot: bool,
}

#[async_trait]
impl BrowserEnvironment for FakeBrowser {
    async fn navigate_to(&self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn perform_action(&self, _action: &ActionDescriptor) -> Result<()> {
        Ok(())
    }

    async fn observe_candidate_actions(
        &self,
        _instruction: &str,
    ) -> Result<Option<ActionDescriptor>> {
        Ok(None)
    }

    async fn extract_structured(&self, _instruction: &str, _schema: &Value) -> Result<Value> {
        Ok(json!({}))
    }

    async fn perform_computer_action(&self, action: &AgentAction) -> Result<()> {
        self.performed
            .lock()
            .unwrap()
            .push((action.clone(), Instant::now()));
        if self.fail_actions {
            return Err(AgentError::environment("element is not visible"));
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<String> {
        if self.fail_screenshot {
            return Err(AgentError::environment("page crashed"));
        }
        Ok("iVBORw0KGgo=".to_string())
    }

    async fn current_url(&self) -> Result<String> {
        Ok("https://registry.example/search".to_string())
    }
}

fn anthropic_click(id: &str) -> Value {
    json!({
        "content": [{
            "type": "tool_use",
            "id": id,
            "name": "computer",
            "input": {"action": "left_click", "coordinate": [100, 200]}
        }],
        "usage": {"input_tokens": 50, "output_tokens": 5}
    })
}

fn anthropic_done(text: &str) -> Value {
    json!({
        "content": [{"type": "text", "text": text}],
        "usage": {"input_tokens": 60, "output_tokens": 12}
    })
}

const ANTHROPIC_MODEL: &str = "claude-3-7-sonnet-20250219";

#[tokio::test]
async fn test_completes_when_model_stops_acting() {
    let transport = ScriptedTransport::new(vec![
        Ok(anthropic_click("toolu_1")),
        Ok(anthropic_done("{\"noResults\": true}")),
    ]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();
    let browser = FakeBrowser::default();

    let result = client
        .execute(&browser, &TaskExecutionRequest::new("Find Tech9", 10))
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.completed);
    assert_eq!(result.steps_taken, 2);
    assert_eq!(result.message, "{\"noResults\": true}");
    assert_eq!(result.actions.len(), 1);
    assert_eq!(result.usage.input_tokens, 110);
    assert_eq!(result.usage.output_tokens, 17);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.provider == AgentType::Anthropic && r.endpoint == Endpoint::Messages));
    let second_messages = requests[1].body["messages"].as_array().unwrap();
    assert_eq!(second_messages.len(), 3);
    assert_eq!(second_messages[2]["content"][0]["tool_use_id"], "toolu_1");
}

#[tokio::test]
async fn test_step_budget_is_never_exceeded() {
    let transport = ScriptedTransport::new(
        (0..10)
            .map(|i| Ok(anthropic_click(&format!("toolu_{i}"))))
            .collect(),
    );
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();
    let browser = FakeBrowser::default();

    let result = client
        .execute(&browser, &TaskExecutionRequest::new("Find Tech9", 3))
        .await
        .unwrap();

    assert!(!result.completed);
    assert!(!result.success);
    assert_eq!(result.steps_taken, 3);
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(browser.performed.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_actions_are_paced() {
    let transport = ScriptedTransport::new(vec![
        Ok(anthropic_click("toolu_1")),
        Ok(anthropic_click("toolu_2")),
        Ok(anthropic_done("done")),
    ]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();
    let browser = FakeBrowser::default();
    let request = TaskExecutionRequest::new("Find Tech9", 10).with_wait_between_actions(60_000);

    let started = Instant::now();
    client.execute(&browser, &request).await.unwrap();

    let performed = browser.performed.lock().unwrap();
    assert_eq!(performed.len(), 2);
    assert!(performed[0].1 - started >= Duration::from_millis(60_000));
    assert!(performed[1].1 - performed[0].1 >= Duration::from_millis(60_000));
}

#[tokio::test(start_paused = true)]
async fn test_steps_are_paced_when_configured() {
    let transport = ScriptedTransport::new(vec![
        Ok(anthropic_click("toolu_1")),
        Ok(anthropic_done("done")),
    ]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();
    let browser = FakeBrowser::default();
    let request = TaskExecutionRequest::new("Find Tech9", 10).with_wait_between_steps(Some(5_000));

    let started = Instant::now();
    client.execute(&browser, &request).await.unwrap();

    assert!(started.elapsed() >= Duration::from_millis(10_000));
}

#[tokio::test]
async fn test_transport_failure_surfaces_as_execution_error() {
    let transport = ScriptedTransport::new(vec![Err(AgentError::execution(
        AgentType::Anthropic,
        "HTTP 529: overloaded",
    ))]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();

    let result = client
        .execute(&FakeBrowser::default(), &TaskExecutionRequest::new("Find Tech9", 5))
        .await;

    assert!(matches!(
        result,
        Err(AgentError::Execution { provider: AgentType::Anthropic, ref detail }) if detail.contains("529")
    ));
}

#[tokio::test]
async fn test_error_body_surfaces_as_execution_error() {
    let transport = ScriptedTransport::new(vec![Ok(json!({
        "type": "error",
        "error": {"type": "invalid_request_error", "message": "bad tool"}
    }))]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();

    let err = client
        .execute(&FakeBrowser::default(), &TaskExecutionRequest::new("Find Tech9", 5))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("bad tool"));
}

#[tokio::test]
async fn test_failed_action_is_reported_to_model() {
    let transport = ScriptedTransport::new(vec![
        Ok(anthropic_click("toolu_1")),
        Ok(anthropic_done("gave up")),
    ]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();
    let browser = FakeBrowser {
        fail_actions: true,
        ..Default::default()
    };

    let result = client
        .execute(&browser, &TaskExecutionRequest::new("Find Tech9", 5))
        .await
        .unwrap();

    assert!(result.completed);
    let requests = transport.requests();
    let tool_result = &requests[1].body["messages"][2]["content"][0];
    assert_eq!(tool_result["is_error"], true);
    assert!(tool_result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("element is not visible"));
}

#[tokio::test]
async fn test_screenshot_failure_aborts() {
    let transport = ScriptedTransport::new(vec![Ok(anthropic_click("toolu_1"))]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();
    let browser = FakeBrowser {
        fail_screenshot: true,
        ..Default::default()
    };

    let result = client
        .execute(&browser, &TaskExecutionRequest::new("Find Tech9", 5))
        .await;
    assert!(matches!(result, Err(AgentError::Environment(_))));
}

#[tokio::test]
async fn test_invalid_request_makes_no_provider_call() {
    let transport = ScriptedTransport::new(vec![]);
    let client = AgentProvider::new()
        .get_client(ANTHROPIC_MODEL, None, None, Some(shared(&transport)))
        .unwrap();

    let result = client
        .execute(&FakeBrowser::default(), &TaskExecutionRequest::new("Find Tech9", 0))
        .await;

    assert!(matches!(result, Err(AgentError::InvalidRequest(_))));
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_openai_variant_chains_responses() {
    let transport = ScriptedTransport::new(vec![
        Ok(json!({
            "id": "resp_1",
            "output": [{
                "type": "computer_call",
                "call_id": "call_1",
                "action": {"type": "type", "text": "Tech9"},
                "pending_safety_checks": []
            }],
            "usage": {"input_tokens": 10, "output_tokens": 1}
        })),
        Ok(json!({
            "id": "resp_2",
            "output": [{"type": "message", "content": [{"type": "output_text", "text": "finished"}]}],
            "usage": {"input_tokens": 20, "output_tokens": 3}
        })),
    ]);
    let client = AgentProvider::new()
        .get_client(
            "computer-use-preview-2025-03-11",
            Some(ClientOptions::new().with_api_key("sk-test")),
            None,
            Some(shared(&transport)),
        )
        .unwrap();
    let browser = FakeBrowser::default();

    let result = client
        .execute(&browser, &TaskExecutionRequest::new("Find Tech9", 5))
        .await
        .unwrap();

    assert_eq!(result.message, "finished");
    assert_eq!(
        result.actions,
        vec![AgentAction::Type {
            text: "Tech9".to_string()
        }]
    );

    let requests = transport.requests();
    assert_eq!(requests[0].endpoint, Endpoint::Responses);
    assert_eq!(requests[0].client_options.api_key(), Some("sk-test"));
    assert_eq!(requests[1].body["previous_response_id"], "resp_1");
    assert_eq!(requests[1].body["input"][0]["call_id"], "call_1");
    assert_eq!(
        requests[1].body["input"][0]["current_url"],
        "https://registry.example/search"
    );
}

#[tokio::test]
async fn test_remote_handler_closure_routes_every_call() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_by_handler = seen.clone();
    let handler = remote_handler(move |request: ProviderRequest| {
        let seen = seen_by_handler.clone();
        async move {
            seen.lock().unwrap().push(request.body["model"].clone());
            Ok(anthropic_done("ok"))
        }
    });
    let client = AgentProvider::new()
        .get_client("claude-3-5-sonnet-20240620", None, None, Some(handler))
        .unwrap();

    client
        .execute(&FakeBrowser::default(), &TaskExecutionRequest::new("Find Tech9", 5))
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![json!("claude-3-5-sonnet-20240620")]);
}
