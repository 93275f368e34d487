//! Turn orchestrator with a single level of tool execution.
//!
//! One call to [`Orchestrator::respond`] runs one conversation turn:
//! 1. Seed the caller's transcript with the system directive and append the
//!    user message
//! 2. Fetch the current tool catalog
//! 3. Ask the completion service for a reply, offering the tools
//! 4. If it requested tools, run them and ask again with tools disabled
//! 5. Return the reply text and the extended transcript
//!
//! A turn never fails. If either completion fails, or the turn runs out of
//! time, the caller gets the fixed fallback reply appended to the seeded
//! transcript instead. Tool failures are reported to the model as tool-result
//! messages and do not abort the turn.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::conversation::{SystemDirective, Transcript};
use crate::error::{CompletionError, TurnError};
use crate::mcp::{ToolBridge, ToolCatalog, ToolDefinition, ToolProvider};

use super::{CompletionClient, CompletionReply, CompletionRequest, RetryPolicy};

/// Reply used whenever a turn cannot produce one of its own.
pub const DEFAULT_FALLBACK_MESSAGE: &str =
    "I'm sorry, but I'm unable to process your request at the moment.";
/// Upper bound on a whole turn, tool calls included.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Per-turn behaviour.
#[derive(Debug, Clone)]
pub struct TurnSettings {
    pub directive: SystemDirective,
    pub fallback_message: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Run the tool calls of one reply concurrently.
    pub parallel_tool_calls: bool,
    pub turn_timeout: Duration,
    /// Applied to each completion request separately.
    pub retry: RetryPolicy,
}

impl Default for TurnSettings {
    fn default() -> Self {
        Self {
            directive: SystemDirective::default(),
            fallback_message: DEFAULT_FALLBACK_MESSAGE.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            parallel_tool_calls: true,
            turn_timeout: DEFAULT_TURN_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    /// The first reply answered directly.
    Answered,
    /// The reply came after running this many tool calls.
    AnsweredWithTools { tool_calls: usize },
    /// The fallback reply was used.
    Fallback,
}

/// Result of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub response_text: String,
    pub transcript: Transcript,
    pub status: TurnStatus,
}

impl TurnOutcome {
    pub fn into_parts(self) -> (String, Transcript) {
        (self.response_text, self.transcript)
    }

    pub fn is_fallback(&self) -> bool {
        self.status == TurnStatus::Fallback
    }
}

#[derive(Debug, Clone, Copy)]
enum TurnState {
    Init,
    FirstCompletion,
    ExecutingTools,
    FinalCompletion,
    Done,
    Fallback,
}

impl TurnState {
    fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::FirstCompletion => "first_completion",
            Self::ExecutingTools => "executing_tools",
            Self::FinalCompletion => "final_completion",
            Self::Done => "done",
            Self::Fallback => "fallback",
        }
    }
}

/// Runs conversation turns against a completion service and a tool provider.
///
/// Holds no conversation state; clones share the underlying clients.
#[derive(Clone)]
pub struct Orchestrator {
    completion: Arc<dyn CompletionClient>,
    catalog: ToolCatalog,
    bridge: ToolBridge,
    settings: TurnSettings,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("settings", &self.settings)
            .finish()
    }
}

impl Orchestrator {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        tools: Arc<dyn ToolProvider>,
        settings: TurnSettings,
    ) -> Self {
        Self {
            completion,
            catalog: ToolCatalog::new(Arc::clone(&tools)),
            bridge: ToolBridge::new(tools),
            settings,
        }
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Run one turn with tools.
    pub async fn respond(&self, history: Transcript, user_message: &str) -> TurnOutcome {
        let request_id = Uuid::new_v4().to_string();
        let seeded = self.begin(&request_id, history, user_message);

        let turn = tokio::time::timeout(
            self.settings.turn_timeout,
            self.run_with_tools(&request_id, seeded.clone()),
        )
        .await;

        self.finish(&request_id, seeded, turn)
    }

    /// Run one turn with a single completion and no tools offered.
    pub async fn respond_without_tools(
        &self,
        history: Transcript,
        user_message: &str,
    ) -> TurnOutcome {
        let request_id = Uuid::new_v4().to_string();
        let seeded = self.begin(&request_id, history, user_message);

        let turn = tokio::time::timeout(
            self.settings.turn_timeout,
            self.run_plain(&request_id, seeded.clone()),
        )
        .await;

        self.finish(&request_id, seeded, turn)
    }

    fn begin(&self, request_id: &str, history: Transcript, user_message: &str) -> Transcript {
        tracing::info!(
            request_id = %request_id,
            correlation_id = ?history.correlation_id(),
            state = TurnState::Init.as_str(),
            history_len = history.len(),
            "Starting turn"
        );
        history
            .seed(&self.settings.directive)
            .append_user(user_message)
    }

    fn finish(
        &self,
        request_id: &str,
        seeded: Transcript,
        turn: Result<Result<TurnOutcome, TurnError>, tokio::time::error::Elapsed>,
    ) -> TurnOutcome {
        let err = match turn {
            Ok(Ok(outcome)) => {
                tracing::info!(
                    request_id = %request_id,
                    state = TurnState::Done.as_str(),
                    status = ?outcome.status,
                    transcript_len = outcome.transcript.len(),
                    "Turn complete"
                );
                return outcome;
            }
            Ok(Err(e)) => e,
            Err(_) => TurnError::TimedOut(self.settings.turn_timeout),
        };

        tracing::error!(
            request_id = %request_id,
            state = TurnState::Fallback.as_str(),
            error = %err,
            "Turn failed, replying with fallback"
        );

        let text = self.settings.fallback_message.clone();
        TurnOutcome {
            transcript: seeded.append_assistant(text.clone()),
            response_text: text,
            status: TurnStatus::Fallback,
        }
    }

    async fn run_with_tools(
        &self,
        request_id: &str,
        transcript: Transcript,
    ) -> Result<TurnOutcome, TurnError> {
        let tools = self.catalog.fetch_tools().await;

        tracing::info!(
            request_id = %request_id,
            state = TurnState::FirstCompletion.as_str(),
            tool_count = tools.len(),
            "Requesting first completion"
        );
        let first = self
            .complete(&transcript, &tools)
            .await
            .map_err(TurnError::FirstCompletion)?;

        if !first.has_tool_calls() {
            let text = first.content.ok_or_else(|| {
                TurnError::FirstCompletion(CompletionError::Malformed(
                    "reply has no content".to_string(),
                ))
            })?;
            return Ok(TurnOutcome {
                transcript: transcript.append_assistant(text.clone()),
                response_text: text,
                status: TurnStatus::Answered,
            });
        }

        let calls = first.tool_calls;
        for call in &calls {
            tracing::info!(
                request_id = %request_id,
                tool_name = %call.tool_name,
                tool_call_id = %call.id,
                "Tool call requested"
            );
        }

        // The assistant message goes in before any tool runs.
        let transcript = transcript
            .append_tool_calls(first.content, calls.clone())
            .map_err(|e| TurnError::FirstCompletion(CompletionError::Malformed(e.to_string())))?;

        tracing::info!(
            request_id = %request_id,
            state = TurnState::ExecutingTools.as_str(),
            tool_call_count = calls.len(),
            parallel = self.settings.parallel_tool_calls,
            "Executing tool calls"
        );
        let results = self
            .bridge
            .invoke_all(&calls, self.settings.parallel_tool_calls)
            .await;
        let failed = results.iter().filter(|r| r.is_error()).count();
        let transcript = results
            .into_iter()
            .fold(transcript, Transcript::append_tool_result);

        tracing::info!(
            request_id = %request_id,
            state = TurnState::FinalCompletion.as_str(),
            failed_tool_calls = failed,
            "Requesting final completion"
        );
        let last = self
            .complete(&transcript, &[])
            .await
            .map_err(TurnError::FinalCompletion)?;

        if last.has_tool_calls() {
            tracing::warn!(
                request_id = %request_id,
                ignored = last.tool_calls.len(),
                "Ignoring tool calls in final completion"
            );
        }
        let text = last.content.ok_or_else(|| {
            TurnError::FinalCompletion(CompletionError::Malformed(
                "final reply has no content".to_string(),
            ))
        })?;

        Ok(TurnOutcome {
            transcript: transcript.append_assistant(text.clone()),
            response_text: text,
            status: TurnStatus::AnsweredWithTools {
                tool_calls: calls.len(),
            },
        })
    }

    async fn run_plain(
        &self,
        request_id: &str,
        transcript: Transcript,
    ) -> Result<TurnOutcome, TurnError> {
        tracing::info!(
            request_id = %request_id,
            state = TurnState::FirstCompletion.as_str(),
            "Requesting completion without tools"
        );
        let reply = self
            .complete(&transcript, &[])
            .await
            .map_err(TurnError::FirstCompletion)?;

        let text = reply.content.ok_or_else(|| {
            TurnError::FirstCompletion(CompletionError::Malformed(
                "reply has no content".to_string(),
            ))
        })?;

        Ok(TurnOutcome {
            transcript: transcript.append_assistant(text.clone()),
            response_text: text,
            status: TurnStatus::Answered,
        })
    }

    async fn complete(
        &self,
        transcript: &Transcript,
        tools: &[ToolDefinition],
    ) -> Result<CompletionReply, CompletionError> {
        let request = CompletionRequest {
            messages: transcript.messages(),
            tools,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        self.settings
            .retry
            .run("chat_completion", || self.completion.complete(request))
            .await
    }
}
