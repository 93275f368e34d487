use std::sync::Arc;
use std::time::Duration;

use returns_concierge::conversation::{Message, MessageRole, Transcript};
use returns_concierge::llm::orchestrator::DEFAULT_FALLBACK_MESSAGE;
use returns_concierge::llm::{
    ChatCompletionsClient, CompletionSettings, Orchestrator, Provider, TurnSettings, TurnStatus,
};
use returns_concierge::mcp::{HttpToolProvider, ToolProviderSettings};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const COMPLETIONS_PATH: &str = "/api/v1/chat/completions";

struct Harness {
    completion: MockServer,
    tools: MockServer,
}

impl Harness {
    async fn start() -> Self {
        Self {
            completion: MockServer::start().await,
            tools: MockServer::start().await,
        }
    }

    fn orchestrator(&self, settings: TurnSettings) -> Orchestrator {
        let completion = ChatCompletionsClient::new(CompletionSettings {
            base_url: format!("{}/api", self.completion.uri()),
            api_key: Some("test-key".to_string()),
            provider: Provider::OpenRouter,
            timeout: Duration::from_secs(5),
            ..CompletionSettings::default()
        });
        let tools = HttpToolProvider::new(ToolProviderSettings {
            url: format!("{}/mcp", self.tools.uri()),
            timeout: Duration::from_secs(5),
            ..ToolProviderSettings::default()
        });
        Orchestrator::new(Arc::new(completion), Arc::new(tools), settings)
    }

    async fn serve_lookup_tool(&self) {
        Mock::given(method("POST"))
            .and(path("/mcp"))
            .and(body_partial_json(json!({"method": "tools/list"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "jsonrpc": "2.0",
                "id": 1,
                "result": {"tools": [{
                    "name": "get_return_by_confirmation_code",
                    "description": "Look up a return by its confirmation code",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"confirmation_code": {"type": "string"}},
                        "required": ["confirmation_code"]
                    }
                }]}
            })))
            .mount(&self.tools)
            .await;
    }

    /// Replies are served in mount order, one request each.
    async fn reply_once(&self, response: ResponseTemplate) {
        Mock::given(method("POST"))
            .and(path(COMPLETIONS_PATH))
            .respond_with(response)
            .up_to_n_times(1)
            .mount(&self.completion)
            .await;
    }

    async fn completion_bodies(&self) -> Vec<Value> {
        self.completion
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

fn text_reply(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    }))
}

fn tool_call_reply(calls: &[(&str, &str, Value)]) -> ResponseTemplate {
    let tool_calls: Vec<Value> = calls
        .iter()
        .map(|(id, name, args)| {
            json!({
                "id": id,
                "type": "function",
                "function": {"name": name, "arguments": args.to_string()}
            })
        })
        .collect();
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": tool_calls}}]
    }))
}

fn roles(transcript: &Transcript) -> Vec<MessageRole> {
    transcript.messages().iter().map(Message::role).collect()
}

#[tokio::test]
async fn test_return_status_lookup_end_to_end() {
    let h = Harness::start().await;
    h.serve_lookup_tool().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {
                "name": "get_return_by_confirmation_code",
                "arguments": {"confirmation_code": "HR123456"}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0",
            "id": 2,
            "result": {"content": [{"type": "text", "text": "{\"status\":\"in_transit\"}"}]}
        })))
        .expect(1)
        .mount(&h.tools)
        .await;

    h.reply_once(tool_call_reply(&[(
        "call_1",
        "get_return_by_confirmation_code",
        json!({"confirmation_code": "HR123456"}),
    )]))
    .await;
    h.reply_once(text_reply("Your return HR123456 is in transit.")).await;

    let outcome = h
        .orchestrator(TurnSettings::default())
        .respond(Transcript::new(), "What's my return status for order HR123456?")
        .await;

    assert_eq!(outcome.status, TurnStatus::AnsweredWithTools { tool_calls: 1 });
    assert_eq!(outcome.response_text, "Your return HR123456 is in transit.");
    assert_eq!(
        roles(&outcome.transcript),
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::Tool,
            MessageRole::Assistant,
        ]
    );

    let tool_message = &outcome.transcript.messages()[3];
    let payload: Value = serde_json::from_str(tool_message.content().unwrap()).unwrap();
    assert_eq!(payload["content"][0]["text"], "{\"status\":\"in_transit\"}");

    let bodies = h.completion_bodies().await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["tool_choice"], "auto");
    assert_eq!(
        bodies[0]["tools"][0]["function"]["name"],
        "get_return_by_confirmation_code"
    );
    assert!(bodies[1].get("tools").is_none());
    assert_eq!(bodies[1]["messages"].as_array().unwrap().len(), 4);
    assert_eq!(bodies[1]["messages"][3]["tool_call_id"], "call_1");
}

#[tokio::test]
async fn test_plain_reply_grows_transcript_by_two() {
    let h = Harness::start().await;
    h.serve_lookup_tool().await;
    h.reply_once(text_reply("I can only help with return status inquiries."))
        .await;

    let history = Transcript::from_messages(vec![
        Message::user("Hi"),
        Message::assistant("Hello! How can I help with your return?"),
    ]);
    let settings = TurnSettings::default();
    let seeded_len = history.clone().seed(&settings.directive).len();

    let outcome = h
        .orchestrator(settings)
        .respond(history, "Tell me a joke")
        .await;

    assert_eq!(outcome.status, TurnStatus::Answered);
    assert_eq!(outcome.transcript.len(), seeded_len + 2);
    assert_eq!(
        outcome.transcript.last(),
        Some(&Message::assistant("I can only help with return status inquiries."))
    );
}

#[tokio::test]
async fn test_discovery_failure_omits_tools_field() {
    let h = Harness::start().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&h.tools)
        .await;
    h.reply_once(text_reply("Hello!")).await;

    let outcome = h
        .orchestrator(TurnSettings::default())
        .respond(Transcript::new(), "Hi")
        .await;

    assert_eq!(outcome.response_text, "Hello!");
    let bodies = h.completion_bodies().await;
    assert!(bodies[0].get("tools").is_none());
    assert!(bodies[0].get("tool_choice").is_none());
}

#[tokio::test]
async fn test_completion_failure_returns_fallback() {
    let h = Harness::start().await;
    h.serve_lookup_tool().await;
    h.reply_once(ResponseTemplate::new(500).set_body_string("upstream down"))
        .await;

    let outcome = h
        .orchestrator(TurnSettings::default())
        .respond(Transcript::new(), "Where is HR123456?")
        .await;

    assert_eq!(outcome.status, TurnStatus::Fallback);
    assert_eq!(outcome.response_text, DEFAULT_FALLBACK_MESSAGE);
    assert_eq!(
        roles(&outcome.transcript),
        vec![MessageRole::System, MessageRole::User, MessageRole::Assistant]
    );
    assert_eq!(
        outcome.transcript.last(),
        Some(&Message::assistant(DEFAULT_FALLBACK_MESSAGE))
    );
}

#[tokio::test]
async fn test_parallel_tool_results_keep_request_order() {
    let h = Harness::start().await;
    h.serve_lookup_tool().await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"arguments": {"confirmation_code": "HR000001"}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(300))
                .set_body_json(json!({
                    "jsonrpc": "2.0", "id": 2,
                    "result": {"content": [{"type": "text", "text": "first"}]}
                })),
        )
        .mount(&h.tools)
        .await;
    Mock::given(method("POST"))
        .and(path("/mcp"))
        .and(body_partial_json(json!({
            "method": "tools/call",
            "params": {"arguments": {"confirmation_code": "HR000002"}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 3,
            "error": {"code": -32000, "message": "return not found"}
        })))
        .mount(&h.tools)
        .await;

    h.reply_once(tool_call_reply(&[
        (
            "call_a",
            "get_return_by_confirmation_code",
            json!({"confirmation_code": "HR000001"}),
        ),
        (
            "call_b",
            "get_return_by_confirmation_code",
            json!({"confirmation_code": "HR000002"}),
        ),
    ]))
    .await;
    h.reply_once(text_reply("One return is on its way; the other was not found."))
        .await;

    let outcome = h
        .orchestrator(TurnSettings::default())
        .respond(Transcript::new(), "Check HR000001 and HR000002")
        .await;

    assert_eq!(outcome.status, TurnStatus::AnsweredWithTools { tool_calls: 2 });
    let messages = outcome.transcript.messages();
    assert_eq!(messages.len(), 6);
    match (&messages[3], &messages[4]) {
        (
            Message::Tool {
                tool_call_id: first_id,
                content: first,
                ..
            },
            Message::Tool {
                tool_call_id: second_id,
                content: second,
                ..
            },
        ) => {
            assert_eq!(first_id, "call_a");
            assert!(!first.starts_with("Error:"));
            assert_eq!(second_id, "call_b");
            assert!(second.starts_with("Error:"));
            assert!(second.contains("return not found"));
        }
        other => panic!("expected two tool messages, got {other:?}"),
    }
}

#[tokio::test]
async fn test_turn_timeout_returns_fallback() {
    let h = Harness::start().await;
    h.serve_lookup_tool().await;
    h.reply_once(text_reply("too late").set_delay(Duration::from_secs(3)))
        .await;

    let outcome = h
        .orchestrator(TurnSettings {
            turn_timeout: Duration::from_millis(300),
            ..TurnSettings::default()
        })
        .respond(Transcript::new(), "Hi")
        .await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.transcript.len(), 3);
}

#[tokio::test]
async fn test_stale_system_message_is_replaced() {
    let h = Harness::start().await;
    h.serve_lookup_tool().await;
    h.reply_once(text_reply("Hello!")).await;

    let history = Transcript::from_messages(vec![Message::system("Old instructions")]);
    let outcome = h
        .orchestrator(TurnSettings::default())
        .respond(history, "Hi")
        .await;

    let bodies = h.completion_bodies().await;
    assert_eq!(
        bodies[0]["messages"][0]["content"],
        TurnSettings::default().directive.text()
    );
    assert_eq!(outcome.transcript.len(), 3);
}
