//! OpenAI Chat Completions API client.
//!
//! Non-streaming `POST /v1/chat/completions` with optional function tools.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::{Message, ToolCallRequest};
use crate::error::{CompletionError, truncate_body};
use crate::mcp::ToolDefinition;

use super::{CompletionClient, CompletionReply, CompletionRequest, CompletionSettings};

/// Client for OpenAI-compatible Chat Completions endpoints.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    http: reqwest::Client,
    settings: CompletionSettings,
    url: String,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("url", &self.url)
            .field("settings", &self.settings)
            .finish()
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Deserialize)]
struct ResponseBody {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallRequest>>,
}

impl ChatCompletionsClient {
    #[must_use]
    pub fn new(settings: CompletionSettings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    #[must_use]
    pub fn with_client(http: reqwest::Client, settings: CompletionSettings) -> Self {
        let url = settings.provider.build_chat_url(&settings.base_url);
        Self {
            http,
            settings,
            url,
        }
    }

    /// Resolved endpoint URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, e: reqwest::Error) -> CompletionError {
        if e.is_timeout() {
            CompletionError::Timeout(self.settings.timeout)
        } else {
            CompletionError::Transport(e)
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn api_error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| error.to_string(), str::to_string)
}

#[async_trait::async_trait]
impl CompletionClient for ChatCompletionsClient {
    async fn complete(
        &self,
        request: CompletionRequest<'_>,
    ) -> Result<CompletionReply, CompletionError> {
        let (tools, tool_choice) = if request.tools.is_empty() {
            (None, None)
        } else {
            (
                Some(
                    request
                        .tools
                        .iter()
                        .map(ToolDefinition::to_function_spec)
                        .collect::<Vec<_>>(),
                ),
                Some("auto"),
            )
        };

        let body = RequestBody {
            model: &self.settings.model,
            messages: request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools,
            tool_choice,
        };

        tracing::debug!(
            url = %self.url,
            model = %self.settings.model,
            message_count = request.messages.len(),
            tool_count = request.tools.len(),
            "Sending completion request"
        );

        let mut rb = self
            .http
            .post(&self.url)
            .timeout(self.settings.timeout)
            .json(&body);

        if let Some(key) = &self.settings.api_key {
            rb = match self.settings.provider.auth_header() {
                (_, true) => rb.bearer_auth(key),
                (name, false) => rb.header(name, key),
            };
        }
        for (name, value) in self
            .settings
            .provider
            .attribution_headers(self.settings.site_url.as_deref(), self.settings.site_name.as_deref())
        {
            rb = rb.header(name, value);
        }

        let resp = rb.send().await.map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(resp.headers());
            let body = resp.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: truncate_body(body),
                retry_after,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: ResponseBody = serde_json::from_slice(&bytes)
            .map_err(|e| CompletionError::Malformed(format!("reply is not valid JSON: {e}")))?;

        if let Some(error) = parsed.error.filter(|e| !e.is_null()) {
            return Err(CompletionError::Api(api_error_message(&error)));
        }

        let message = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .ok_or_else(|| CompletionError::Malformed("reply has no choices[0].message".to_string()))?;

        let reply = CompletionReply {
            content: message.content,
            tool_calls: message.tool_calls.unwrap_or_default(),
        };

        if reply.content.is_none() && reply.tool_calls.is_empty() {
            return Err(CompletionError::Malformed(
                "assistant message has neither content nor tool calls".to_string(),
            ));
        }

        tracing::debug!(
            has_content = reply.content.is_some(),
            tool_call_count = reply.tool_calls.len(),
            "Completion reply received"
        );

        Ok(reply)
    }
}
