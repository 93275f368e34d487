//! Completion service client and the turn orchestrator.
//!
//! The [`CompletionClient`] trait is the seam between the orchestrator and
//! whatever answers chat completion requests. [`ChatCompletionsClient`] speaks
//! the OpenAI-compatible `/v1/chat/completions` protocol used by `OpenAI`,
//! `OpenRouter`, Azure and most self-hosted gateways.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use returns_concierge::conversation::Transcript;
//! use returns_concierge::llm::{ChatCompletionsClient, CompletionSettings, Orchestrator, TurnSettings};
//! use returns_concierge::mcp::{HttpToolProvider, ToolProviderSettings};
//!
//! # async fn run() {
//! let completion = ChatCompletionsClient::new(CompletionSettings {
//!     api_key: Some("sk-or-...".to_string()),
//!     ..CompletionSettings::default()
//! });
//! let tools = HttpToolProvider::new(ToolProviderSettings::default());
//! let orchestrator = Orchestrator::new(Arc::new(completion), Arc::new(tools), TurnSettings::default());
//!
//! let outcome = orchestrator
//!     .respond(Transcript::new(), "What's my return status for order HR123456?")
//!     .await;
//! println!("{}", outcome.response_text);
//! # }
//! ```

pub mod chat_completions;
pub mod orchestrator;
pub mod provider;
pub mod retry;

pub use chat_completions::ChatCompletionsClient;
pub use orchestrator::{Orchestrator, TurnOutcome, TurnSettings, TurnStatus};
pub use provider::Provider;
pub use retry::RetryPolicy;

use std::time::Duration;

use crate::conversation::{Message, ToolCallRequest};
use crate::error::CompletionError;
use crate::mcp::ToolDefinition;

/// Default completion endpoint base (`OpenRouter`).
pub const DEFAULT_COMPLETION_BASE_URL: &str = "https://openrouter.ai/api";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";
/// Default per-request timeout for completions.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Completion service connection and model settings.
#[derive(Clone)]
pub struct CompletionSettings {
    /// Base URL for the API (e.g., `https://openrouter.ai/api`).
    pub base_url: String,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `openai/gpt-3.5-turbo`).
    pub model: String,
    /// Provider type (auto-detected from `base_url` when built from config).
    pub provider: Provider,
    /// Bound on each completion request.
    pub timeout: Duration,
    /// `OpenRouter` attribution: `HTTP-Referer`.
    pub site_url: Option<String>,
    /// `OpenRouter` attribution: `X-Title`.
    pub site_name: Option<String>,
}

impl std::fmt::Debug for CompletionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("timeout", &self.timeout)
            .field("site_url", &self.site_url)
            .field("site_name", &self.site_name)
            .finish()
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMPLETION_BASE_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            provider: Provider::OpenRouter,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
            site_url: None,
            site_name: None,
        }
    }
}

/// One completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub messages: &'a [Message],
    /// Empty means "no tools": neither `tools` nor `tool_choice` is sent.
    pub tools: &'a [ToolDefinition],
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The assistant message from the first choice of a completion reply.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl CompletionReply {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Anything that can answer a chat completion request.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send one request. Implementations do not retry.
    async fn complete(&self, request: CompletionRequest<'_>) -> Result<CompletionReply, CompletionError>;
}
